//! Waypoint CLI - Command-line interface for Waypoint migrations.
//!
//! This crate provides the `waypoint` binary, which plans and applies SQL
//! migration files against a PostgreSQL ledger.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod output;
pub mod reporter;
