//! Check plugin for MySQL-compatible servers.
//!
//! Each invocation runs one check (uptime, connection count, replication,
//! read_only, Group Replication) and reports a severity plus a one-line
//! message. The severity doubles as the process exit code.

pub mod cli;
pub mod config;
pub mod core;
