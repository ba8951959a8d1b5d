//! Subcommands of the `concord` binary.

pub mod api;
pub mod config;
pub mod context;
pub mod contract;
pub mod error;
pub mod notifications;
pub mod output;
pub mod user;
