//! webgl-host Core Library
//!
//! Configuration loading, pre-flight checks and logging for the `webgl-host`
//! binary.

pub mod check;
pub mod colored_logger;
pub mod config;
