//! Fire-rule parsing and next-occurrence computation.
//!
//! A [`FireRule`] is the recurrence part of a trigger: a cron expression
//! (5-field, 6-field with seconds, or an `@` shortcut) or a fixed interval
//! (`@every 5m`). Timezones apply to cron rules only; intervals are
//! wall-clock independent.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;
use thiserror::Error;

/// Errors that can occur when parsing a fire rule.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Invalid cron expression.
    #[error("invalid cron expression: {0}")]
    InvalidCron(String),

    /// Invalid interval expression.
    #[error("invalid interval expression: {0}")]
    InvalidInterval(String),

    /// Invalid timezone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),
}

/// A recurrence rule for trigger fire times.
#[derive(Debug, Clone)]
pub struct FireRule {
    expression: String,
    timezone: Tz,
    kind: RuleKind,
}

#[derive(Debug, Clone)]
enum RuleKind {
    Cron(Box<CronSchedule>),
    Interval(chrono::Duration),
}

impl FireRule {
    /// Parse a rule in UTC.
    ///
    /// Supports:
    /// - Standard 5-field cron: `minute hour day month weekday`
    /// - Extended 6-field cron: `second minute hour day month weekday`
    /// - Shortcuts: `@yearly`, `@monthly`, `@weekly`, `@daily`, `@hourly`
    /// - Intervals: `@every 30s`, `@every 1h30m`
    pub fn parse(expression: impl Into<String>) -> Result<Self, RuleError> {
        Self::parse_in_timezone(expression, "UTC")
    }

    /// Parse a rule with cron occurrences evaluated in the given timezone.
    pub fn parse_in_timezone(
        expression: impl Into<String>,
        timezone: impl AsRef<str>,
    ) -> Result<Self, RuleError> {
        let expression = expression.into();
        let timezone = timezone.as_ref();

        let tz: Tz = timezone
            .parse()
            .map_err(|_| RuleError::InvalidTimezone(timezone.to_string()))?;

        let kind = Self::parse_expression(&expression)?;

        Ok(Self {
            expression,
            timezone: tz,
            kind,
        })
    }

    fn parse_expression(expression: &str) -> Result<RuleKind, RuleError> {
        let trimmed = expression.trim();
        if trimmed.starts_with('@') {
            return Self::parse_shortcut(trimmed);
        }
        Self::parse_cron(trimmed)
    }

    fn parse_shortcut(expression: &str) -> Result<RuleKind, RuleError> {
        match expression.to_lowercase().as_str() {
            "@yearly" | "@annually" => Self::parse_cron("0 0 1 1 *"),
            "@monthly" => Self::parse_cron("0 0 1 * *"),
            "@weekly" => Self::parse_cron("0 0 * * SUN"),
            "@daily" | "@midnight" => Self::parse_cron("0 0 * * *"),
            "@hourly" => Self::parse_cron("0 * * * *"),
            s if s.starts_with("@every ") => Self::parse_interval(&s[7..]),
            _ => Err(RuleError::InvalidCron(format!(
                "unknown shortcut: {}",
                expression
            ))),
        }
    }

    fn parse_interval(interval: &str) -> Result<RuleKind, RuleError> {
        let trimmed = interval.trim();
        let mut total_secs: i64 = 0;
        let mut current_num = String::new();

        for c in trimmed.chars() {
            if c.is_ascii_digit() {
                current_num.push(c);
            } else {
                let num: i64 = current_num
                    .parse()
                    .map_err(|_| RuleError::InvalidInterval(trimmed.to_string()))?;
                current_num.clear();

                match c {
                    's' => total_secs += num,
                    'm' => total_secs += num * 60,
                    'h' => total_secs += num * 3600,
                    'd' => total_secs += num * 86400,
                    _ => return Err(RuleError::InvalidInterval(trimmed.to_string())),
                }
            }
        }

        if total_secs == 0 || !current_num.is_empty() {
            return Err(RuleError::InvalidInterval(trimmed.to_string()));
        }

        Ok(RuleKind::Interval(chrono::Duration::seconds(total_secs)))
    }

    fn parse_cron(expression: &str) -> Result<RuleKind, RuleError> {
        let fields: Vec<&str> = expression.split_whitespace().collect();

        let cron_expr = match fields.len() {
            // Standard 5-field cron, add a seconds field.
            5 => format!("0 {}", expression),
            6 => expression.to_string(),
            _ => {
                return Err(RuleError::InvalidCron(format!(
                    "expected 5 or 6 fields, got {}",
                    fields.len()
                )));
            }
        };

        let schedule = CronSchedule::from_str(&cron_expr)
            .map_err(|e| RuleError::InvalidCron(e.to_string()))?;

        Ok(RuleKind::Cron(Box::new(schedule)))
    }

    /// The next occurrence strictly after `after`, or `None` when the rule
    /// has no further occurrences.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match &self.kind {
            RuleKind::Cron(schedule) => {
                let local = after.with_timezone(&self.timezone);
                schedule.after(&local).next().map(|dt| dt.with_timezone(&Utc))
            }
            RuleKind::Interval(interval) => after.checked_add_signed(*interval),
        }
    }

    /// For interval rules, the smallest `anchor + k * interval` strictly
    /// after `after` (the anchored sequence a bounded trigger fires on).
    /// Cron rules ignore the anchor.
    pub fn next_after_anchored(
        &self,
        anchor: DateTime<Utc>,
        after: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match &self.kind {
            RuleKind::Cron(_) => self.next_after(after),
            RuleKind::Interval(interval) => {
                if after < anchor {
                    return Some(anchor);
                }
                let elapsed = (after - anchor).num_seconds();
                let step = interval.num_seconds();
                let k = elapsed / step + 1;
                anchor.checked_add_signed(chrono::Duration::seconds(k * step))
            }
        }
    }

    /// Whether this is an interval (`@every`) rule.
    pub fn is_interval(&self) -> bool {
        matches!(self.kind, RuleKind::Interval(_))
    }

    /// The original expression string.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The timezone cron occurrences are evaluated in.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parse_standard_5_field_cron() {
        let rule = FireRule::parse("0 * * * *").unwrap();
        assert_eq!(rule.expression(), "0 * * * *");

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        assert_eq!(next.minute(), 0);
        assert!(next > base);
    }

    #[test]
    fn test_parse_extended_6_field_cron() {
        let rule = FireRule::parse("15 * * * * *").unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        assert_eq!(next.second(), 15);
    }

    #[test]
    fn test_daily_shortcut_fires_at_midnight() {
        let rule = FireRule::parse("@daily").unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn test_interval_rule_adds_duration() {
        let rule = FireRule::parse("@every 5m").unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        assert_eq!((next - base).num_minutes(), 5);
    }

    #[test]
    fn test_compound_interval() {
        let rule = FireRule::parse("@every 1h30m").unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        assert_eq!((next - base).num_minutes(), 90);
    }

    #[test]
    fn test_anchored_interval_before_anchor_fires_at_anchor() {
        let rule = FireRule::parse("@every 60s").unwrap();
        let anchor = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let before = anchor - chrono::Duration::minutes(5);

        assert_eq!(rule.next_after_anchored(anchor, before), Some(anchor));
    }

    #[test]
    fn test_anchored_interval_snaps_to_sequence() {
        let rule = FireRule::parse("@every 60s").unwrap();
        let anchor = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();

        // 12:00:30 is between the k=0 and k=1 fires.
        let mid = anchor + chrono::Duration::seconds(30);
        let next = rule.next_after_anchored(anchor, mid).unwrap();
        assert_eq!(next, anchor + chrono::Duration::seconds(60));

        // Exactly on a fire: next is the following one.
        let on_fire = anchor + chrono::Duration::seconds(60);
        let next = rule.next_after_anchored(anchor, on_fire).unwrap();
        assert_eq!(next, anchor + chrono::Duration::seconds(120));
    }

    #[test]
    fn test_timezone_aware_cron() {
        let rule = FireRule::parse_in_timezone("0 9 * * *", "America/New_York").unwrap();

        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let next = rule.next_after(base).unwrap();
        // 9 AM New York in January is 14:00 UTC.
        assert_eq!(next.hour(), 14);
    }

    #[test]
    fn test_invalid_cron_is_rejected() {
        assert!(matches!(
            FireRule::parse("not a cron"),
            Err(RuleError::InvalidCron(_))
        ));
    }

    #[test]
    fn test_invalid_timezone_is_rejected() {
        assert!(matches!(
            FireRule::parse_in_timezone("0 * * * *", "Mars/Olympus"),
            Err(RuleError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_invalid_interval_is_rejected() {
        assert!(FireRule::parse("@every bogus").is_err());
        assert!(FireRule::parse("@every 0s").is_err());
        assert!(FireRule::parse("@every 5").is_err());
    }

    #[test]
    fn test_unknown_shortcut_is_rejected() {
        assert!(FireRule::parse("@fortnightly").is_err());
    }
}
