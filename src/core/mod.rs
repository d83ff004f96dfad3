//! Core module - Ambient plumbing shared by both engines and the CLI
//!
//! This module provides:
//! - Environment-driven configuration
//! - Tracing subscriber setup
//! - Unified result model and rendering for CLI output
//! - Path normalization utilities
//! - Hashing and file metadata helpers

pub mod config;
pub mod logging;
pub mod model;
pub mod paths;
pub mod render;
pub mod util;
