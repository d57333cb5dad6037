//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the session core:
//! - Logging and tracing infrastructure
//! - Session configuration (durations and injected bridges)
//! - Event bus used to broadcast session state changes, including the
//!   global sign-out signal
//!
//! ## Overview
//!
//! This crate holds the runtime conventions the rest of the workspace relies
//! on. `core-session` builds its components from a [`config::SessionConfig`]
//! and reports everything it does through [`events::EventBus`].

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
