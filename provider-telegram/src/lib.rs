//! # Telegram Provider
//!
//! Implements the `ChatTransport` trait over the Telegram Bot API.
//!
//! ## Overview
//!
//! This module provides:
//! - Text messages with reply keyboards
//! - Photo, video and document sends by upload or by existing file id
//! - Object downloads through `getFile` and the file endpoint
//! - Long-poll `getUpdates` with offset tracking
//! - Flood-control responses surfaced as rate limits with their retry hint

pub mod connector;
pub mod error;
pub mod types;

pub use connector::TelegramBotClient;
pub use error::{Result, TelegramError};
