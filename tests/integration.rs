//! Integration tests for the quartzite scheduler management layer.
//!
//! These tests verify end-to-end scenarios including:
//! - Service lifecycle guards and idempotence
//! - Job/trigger CRUD against a live local engine
//! - Fire-time projection
//! - Container registration and per-session resolution
//! - Declarative document loading

mod common;

mod integration {
    pub mod container;
    pub mod jobs;
    pub mod lifecycle;
    pub mod loading;
}
