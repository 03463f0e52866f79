//! Bounded retention cleanup for a time-series annotation store.
//!
//! Annotations older than a configured number of days are deleted together
//! with their `annotation_tag` rows, at most a capped number per run, each run
//! in a single transaction. See [`retention`] for the cleanup itself and
//! [`db`] for the SQLite and PostgreSQL stores.

pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod retention;
