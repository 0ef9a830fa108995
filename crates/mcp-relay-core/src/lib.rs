//! Core types, config, and errors for the MCP notification relay.

pub mod config;
pub mod error;
pub mod notification;
pub mod types;
