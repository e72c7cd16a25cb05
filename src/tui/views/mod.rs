//! Dashboard views.

mod dashboard;
mod prompt_input;

pub use dashboard::{DashboardProps, render_dashboard};
pub use prompt_input::{PromptAction, PromptInput};
