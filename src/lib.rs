//! Reminder scheduling: time-frame bucketing, recurrence, and notification
//! triggers over a pluggable task store and alarm scheduler.

pub mod alarm;
pub mod buckets;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod recurrence;
pub mod reminders;
pub mod storage;
pub mod subscription;
pub mod trigger;
pub mod views;
