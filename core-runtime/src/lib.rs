//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the backup engine:
//! - Logging and tracing infrastructure
//! - Configuration loading and validation
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on. It
//! establishes the logging conventions, the configuration boundary, and the
//! event broadcasting used to relay progress out of the upload engine.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
