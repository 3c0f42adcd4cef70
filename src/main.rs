//! quartzite - scheduler management from the command line.
//!
//! Usage:
//!   quartzite validate <doc>      Parse a job document and report its contents
//!   quartzite list <doc>          List jobs and triggers in a document
//!   quartzite next-times <expr>   Project upcoming fire times for a schedule
//!   quartzite run <doc>           Load a document into a scheduler and run it

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use quartzite::{
    loader, FireRule, FireTime, SchedulerService, SchedulerServiceContainer, ServiceConfig,
    TriggerDefinition,
};
use tracing::info;

/// quartzite - scheduler service management
#[derive(Parser)]
#[command(name = "quartzite")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a job document and report whether it is valid
    Validate {
        /// Path to the job document
        #[arg(value_name = "DOC")]
        doc: PathBuf,
    },

    /// List the jobs and triggers in a document
    List {
        /// Path to the job document
        #[arg(value_name = "DOC")]
        doc: PathBuf,
    },

    /// Project upcoming fire times for a schedule expression
    NextTimes {
        /// Schedule expression (cron, shortcut, or "@every <dur>")
        #[arg(value_name = "EXPR")]
        expression: String,

        /// How many fire times to project
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,

        /// Projection start (RFC 3339); defaults to now
        #[arg(long)]
        from: Option<DateTime<Utc>>,

        /// Timezone for cron evaluation
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },

    /// Load a document into a scheduler service and run it
    Run {
        /// Path to the job document
        #[arg(value_name = "DOC")]
        doc: PathBuf,

        /// Engine/service configuration properties file
        #[arg(short, long)]
        props: Option<PathBuf>,

        /// Stop after this many seconds; runs until killed when omitted
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { doc } => validate(doc),
        Commands::List { doc } => list(doc),
        Commands::NextTimes {
            expression,
            count,
            from,
            timezone,
        } => next_times(expression, count, from, timezone),
        Commands::Run {
            doc,
            props,
            duration_secs,
        } => run(doc, props, duration_secs),
    }
}

fn validate(doc: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&doc)?;
    let document = loader::parse(&text)?;
    println!(
        "{}: OK ({} job(s), {} trigger(s))",
        doc.display(),
        document.jobs.len(),
        document.triggers.len()
    );
    Ok(())
}

fn list(doc: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&doc)?;
    let document = loader::parse(&text)?;

    println!("Jobs in {}:", doc.display());
    for job in &document.jobs {
        println!("  {}.{}", job.group, job.name);
        if let Some(description) = &job.description {
            println!("    Description: {}", description);
        }
        println!("    Durable: {}", job.durable);
        println!("    Command: {}", job.command.program);
    }

    println!("Triggers:");
    for trigger in &document.triggers {
        println!(
            "  {}.{} -> {}.{} ({})",
            trigger.group, trigger.name, trigger.job_group, trigger.job, trigger.schedule
        );
    }
    Ok(())
}

fn next_times(
    expression: String,
    count: usize,
    from: Option<DateTime<Utc>>,
    timezone: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let rule = FireRule::parse_in_timezone(&expression, &timezone)?;
    let trigger = TriggerDefinition::new(
        quartzite::TriggerKey::with_default_group("projection"),
        quartzite::JobKey::with_default_group("projection"),
        rule,
    );

    let start = from.unwrap_or_else(Utc::now);
    println!("Fire times for '{}' after {}:", expression, start);
    for fire in SchedulerService::next_fire_times(&trigger, start, count) {
        match fire {
            FireTime::At(t) => println!("  {}", t),
            FireTime::Exhausted => println!("  (no further fire times)"),
        }
    }
    Ok(())
}

fn run(
    doc: PathBuf,
    props: Option<PathBuf>,
    duration_secs: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = match props {
        Some(path) => ServiceConfig::from_properties_file(path)?,
        None => ServiceConfig::new(),
    };

    let container = Arc::new(SchedulerServiceContainer::new());
    let service = Arc::new(SchedulerService::with_config(config));
    container.add_scheduler_service("default", Arc::clone(&service))?;
    container.init()?;

    let text = std::fs::read_to_string(&doc)?;
    let report = service.load_jobs(&text)?;
    info!(
        jobs = report.jobs().len(),
        triggers = report.triggers().len(),
        "loaded job document"
    );

    match duration_secs {
        Some(secs) => {
            info!(secs, "scheduler running for a bounded duration");
            std::thread::sleep(Duration::from_secs(secs));
            container.destroy()?;
            info!("scheduler stopped");
        }
        None => {
            info!("scheduler running; stop with Ctrl+C");
            loop {
                std::thread::park();
            }
        }
    }
    Ok(())
}
