//! One module per `recur` subcommand; `core` also holds `open_db`

pub mod core;
pub mod import;
pub mod merchant;
pub mod recurring;
pub mod serve;

// Flat re-exports so main.rs dispatches through `commands::`
pub use core::*;
pub use import::*;
pub use merchant::*;
pub use recurring::*;
pub use serve::*;

/// Clip `s` to `max` chars for table columns, ending in "..." when clipped
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
