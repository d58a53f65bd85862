use serde::{Deserialize, Serialize};

pub mod agent;
pub mod command;
pub mod config;
pub mod episode;
pub mod error;
pub mod map;
pub mod pipeline;
pub mod world;

pub use command::Command;
pub use config::MapConfig;
pub use episode::{EpisodeController, Landmarks, Observation, Step, StepInfo};
pub use error::EscapeRoomError;
pub use pipeline::{Pipeline, Stage};
pub use world::{GridWorld, World};

/// A discrete grid cell. Landmark checks compare cells, never raw poses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }
}

/// The raw agent coordinate handed to and returned by the world.
///
/// Signed so that a move off the top or left edge produces a pose the world
/// can reject, instead of wrapping around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pose {
    pub x: isize,
    pub y: isize,
}

impl Pose {
    pub const fn new(x: isize, y: isize) -> Self {
        Pose { x, y }
    }

    /// Returns the pose shifted by `(dx, dy)`.
    #[inline]
    pub fn offset(self, (dx, dy): (isize, isize)) -> Self {
        Pose {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Manhattan distance between two poses.
    pub fn manhattan(self, other: Pose) -> usize {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<Position> for Pose {
    fn from(cell: Position) -> Self {
        Pose {
            x: cell.x as isize,
            y: cell.y as isize,
        }
    }
}
