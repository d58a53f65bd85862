use std::path::PathBuf;

use crate::world::MapParseError;

/// Errors surfaced by the escape room core.
#[derive(Debug, thiserror::Error)]
pub enum EscapeRoomError {
    /// A command index or name outside the six known commands. Always a caller bug.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// Landmarks or the initial pose do not form a playable room.
    #[error("Misconfigured map: {0}")]
    MisconfiguredMap(String),

    /// `step()` was called after the exit was reached. Call `reset()` first.
    #[error("Episode already terminated; reset() must be called before stepping again")]
    EpisodeAlreadyTerminated,

    /// `step()` was called after a time limit cut the episode short.
    #[error("Episode truncated after {steps} steps; reset() must be called before stepping again")]
    EpisodeTruncated { steps: usize },

    #[error(transparent)]
    MapParse(#[from] MapParseError),

    #[error("Failed to read map config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid map config: {0}")]
    Config(#[from] toml::de::Error),
}
