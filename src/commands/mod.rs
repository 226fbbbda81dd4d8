mod config_cmd;
mod item;
mod outfit;
mod sync_cmd;

use clap::ValueEnum;
use std::io::{self, Write};

use closet_core::{SyncOutcome, SyncTicket};

use crate::engine::Engine;

pub use config_cmd::ConfigCommand;
pub use item::ItemCommand;
pub use outfit::OutfitCommand;
pub use sync_cmd::SyncCommand;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Waits for a mutation's background sync, then drains anything it queued.
async fn settle(engine: &Engine, ticket: SyncTicket) -> SyncOutcome {
    let outcome = ticket.settled().await;
    engine.flush().await;
    outcome
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Synced => "synced".to_string(),
        SyncOutcome::Queued => "queued for sync".to_string(),
        SyncOutcome::LocalOnly => "local only".to_string(),
        SyncOutcome::Failed(e) => format!("sync failed: {}", e),
    }
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use closet_core::SyncError;

    #[test]
    fn test_describe_outcome() {
        assert_eq!(describe(&SyncOutcome::Queued), "queued for sync");
        assert_eq!(
            describe(&SyncOutcome::Failed(SyncError::Retryable("timeout".into()))),
            format!("sync failed: {}", SyncError::Retryable("timeout".into()))
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Shirt", 10), "Shirt");
        assert_eq!(truncate("Very long jacket name", 10), "Very lo...");
    }
}
