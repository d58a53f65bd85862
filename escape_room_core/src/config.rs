use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    EscapeRoomError, Pose, Position,
    episode::{EpisodeController, Landmarks},
    pipeline::{Pipeline, StepPenalty, TimeLimit},
    world::GridWorld,
};

/// The stock escape room: a walled room with the key (`r`) in its top-left
/// corner, a single gap in the east wall and the exit (`g`) outside.
pub const ESCAPE_ROOM1_LAYOUT: &str = "\
|#######    |
|#r    #    |
|#     #    |
|#        g |
|#     #    |
|#     #    |
|#######    |";

/// Static description of an escape room, loaded once.
///
/// ```toml
/// layout = """
/// |#####|
/// |#r  #|
/// |#   g|
/// |#####|"""
/// key_cell = { x = 1, y = 1 }
/// door_cell = { x = 3, y = 2 }
/// exit_cell = { x = 4, y = 2 }
/// initial_pose = { x = 2, y = 1 }
/// max_episode_steps = 200
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapConfig {
    pub layout: String,
    pub key_cell: Position,
    pub door_cell: Position,
    pub exit_cell: Position,
    pub initial_pose: Pose,
    /// Adds a time limit stage when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_episode_steps: Option<usize>,
    /// Adds a per-step cost stage when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_penalty: Option<f64>,
}

impl MapConfig {
    /// The built-in escape room.
    pub fn escape_room1() -> Self {
        MapConfig {
            layout: ESCAPE_ROOM1_LAYOUT.to_string(),
            key_cell: Position::new(1, 1),
            door_cell: Position::new(6, 3),
            exit_cell: Position::new(9, 3),
            initial_pose: Pose::new(2, 3),
            max_episode_steps: None,
            step_penalty: None,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, EscapeRoomError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, EscapeRoomError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| EscapeRoomError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn landmarks(&self) -> Landmarks {
        Landmarks {
            key: self.key_cell,
            door: self.door_cell,
            exit: self.exit_cell,
        }
    }

    /// Parses the layout and builds a validated controller.
    pub fn build(&self) -> Result<EpisodeController<GridWorld>, EscapeRoomError> {
        let world = GridWorld::from_layout(&self.layout)?;
        EpisodeController::new(world, self.landmarks(), self.initial_pose)
    }

    /// Like [`MapConfig::build`], with the configured stages attached: the step
    /// penalty first, then the time limit.
    pub fn build_pipeline(&self) -> Result<Pipeline<GridWorld>, EscapeRoomError> {
        let mut pipeline = Pipeline::new(self.build()?);
        if let Some(cost) = self.step_penalty {
            pipeline = pipeline.with_stage(StepPenalty::new(cost));
        }
        if let Some(max_steps) = self.max_episode_steps {
            pipeline = pipeline.with_stage(TimeLimit::new(max_steps));
        }
        Ok(pipeline)
    }
}
