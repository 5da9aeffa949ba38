//! Core components, types, and utilities for hookbot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Built-in announcement templates.
//! - The outbound rate limiter.
//! - Common types and result handling.

pub mod config;
pub mod ratelimit;
pub mod templates;
pub mod types;
