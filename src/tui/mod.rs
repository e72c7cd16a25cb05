//! Terminal dashboard for crowsnest.
//!
//! A keyboard-driven ratatui interface showing all assigned issues with
//! their per-issue execution status, driven by a fixed-interval poll loop
//! that auto-invokes the assistant for newly triggered issues.

mod app;
mod views;

pub use app::run_tui;
pub use views::{PromptAction, PromptInput};
