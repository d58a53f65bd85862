use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::{Command, EscapeRoomError, Pose, Position, world::World};

/// Reward granted for reaching the exit cell.
pub const EXIT_REWARD: f64 = 1.0;

/// The three cells with special meaning in an escape room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Landmarks {
    /// Visiting this cell unlocks the door for the rest of the episode.
    pub key: Position,
    /// Cannot be entered until the key has been visited.
    pub door: Position,
    /// Reaching this cell ends the episode with [`EXIT_REWARD`].
    pub exit: Position,
}

/// What the caller sees after `reset()` and each `step()`.
///
/// Key possession is hidden state and deliberately absent here; it is
/// reported separately through [`StepInfo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub pose: Pose,
    pub cell: Option<Position>,
}

/// Diagnostics attached to every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub has_key: bool,
    /// The command would have entered the door while locked and was undone.
    pub blocked_by_door: bool,
    /// Steps taken in the current episode, this one included.
    pub steps: usize,
    /// Color of the cell the agent beeped on, if it beeped on a colored cell.
    pub beeped_on: Option<char>,
}

/// Result of a single transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub observation: Observation,
    pub reward: f64,
    pub terminated: bool,
    /// Set by a time limit stage; the controller itself never truncates.
    pub truncated: bool,
    pub info: StepInfo,
}

impl Step {
    /// Whether the episode is over for either reason.
    pub fn done(&self) -> bool {
        self.terminated || self.truncated
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Active,
    Terminated,
}

/// Runs escape room episodes on top of a [`World`].
///
/// Owns the has-key flag for exactly one episode at a time. Every instance is
/// independent, so parallel episodes just use one controller each.
#[derive(Debug, Clone)]
pub struct EpisodeController<W> {
    world: W,
    landmarks: Landmarks,
    initial_pose: Pose,
    pose: Pose,
    has_key: bool,
    phase: Phase,
    steps: usize,
}

impl<W: World> EpisodeController<W> {
    /// Validates the room and returns a controller ready for its first episode.
    pub fn new(world: W, landmarks: Landmarks, initial_pose: Pose) -> Result<Self, EscapeRoomError> {
        let named = [
            ("key", landmarks.key),
            ("door", landmarks.door),
            ("exit", landmarks.exit),
        ];
        for (name, cell) in named {
            if !world.contains(cell) {
                return Err(EscapeRoomError::MisconfiguredMap(format!(
                    "{name} cell ({}, {}) is outside the grid",
                    cell.x, cell.y
                )));
            }
        }
        if landmarks.key == landmarks.door {
            return Err(EscapeRoomError::MisconfiguredMap(format!(
                "key and door share cell ({}, {})",
                landmarks.key.x, landmarks.key.y
            )));
        }
        let Some(start) = world.discretize(initial_pose) else {
            return Err(EscapeRoomError::MisconfiguredMap(format!(
                "initial pose {initial_pose:?} is outside the grid"
            )));
        };
        if !world.is_traversable(initial_pose) {
            return Err(EscapeRoomError::MisconfiguredMap(format!(
                "initial pose {initial_pose:?} is not traversable"
            )));
        }
        if start == landmarks.exit {
            return Err(EscapeRoomError::MisconfiguredMap(
                "initial pose is already on the exit".to_string(),
            ));
        }

        Ok(EpisodeController {
            world,
            landmarks,
            initial_pose,
            pose: initial_pose,
            has_key: false,
            phase: Phase::Active,
            steps: 0,
        })
    }

    /// Starts a new episode, abandoning the current one if it is still running.
    pub fn reset(&mut self) -> Observation {
        self.pose = self.initial_pose;
        self.has_key = false;
        self.phase = Phase::Active;
        self.steps = 0;
        debug!(pose = ?self.pose, "episode reset");
        self.observation()
    }

    /// Advances the episode by one command.
    ///
    /// Fails with [`EscapeRoomError::EpisodeAlreadyTerminated`] once the exit
    /// has been reached; nothing is mutated in that case.
    pub fn step(&mut self, command: Command) -> Result<Step, EscapeRoomError> {
        if self.phase == Phase::Terminated {
            return Err(EscapeRoomError::EpisodeAlreadyTerminated);
        }

        let candidate = command.apply(self.pose, &self.world);
        let candidate_cell = self.world.discretize(candidate);

        // Key pickup is judged on the candidate, before the gate.
        if !self.has_key && candidate_cell == Some(self.landmarks.key) {
            self.has_key = true;
            debug!(steps = self.steps + 1, "key collected");
        }

        let blocked_by_door = !self.has_key && candidate_cell == Some(self.landmarks.door);
        if blocked_by_door {
            debug!(pose = ?self.pose, "door is locked");
        } else {
            self.pose = candidate;
        }

        let cell = self.world.discretize(self.pose);
        let terminated = cell == Some(self.landmarks.exit);
        let mut reward = self.world.step_reward(self.pose);
        if terminated {
            reward += EXIT_REWARD;
            self.phase = Phase::Terminated;
        }
        self.steps += 1;

        let beeped_on = match command {
            Command::Beep => cell.and_then(|c| self.world.color_at(c)),
            _ => None,
        };

        trace!(command = %command, pose = ?self.pose, reward, "step");
        if terminated {
            info!(steps = self.steps, reward, "exit reached");
        }

        Ok(Step {
            observation: Observation {
                pose: self.pose,
                cell,
            },
            reward,
            terminated,
            truncated: false,
            info: StepInfo {
                has_key: self.has_key,
                blocked_by_door,
                steps: self.steps,
                beeped_on,
            },
        })
    }

    /// Observation of the current pose without advancing the episode.
    pub fn observation(&self) -> Observation {
        Observation {
            pose: self.pose,
            cell: self.world.discretize(self.pose),
        }
    }

    /// Whether the key has been collected this episode.
    pub fn has_key(&self) -> bool {
        self.has_key
    }

    /// Current raw pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Whether the exit has been reached. Only `reset` clears this.
    pub fn is_terminated(&self) -> bool {
        self.phase == Phase::Terminated
    }

    /// Steps taken since the last reset.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Key, door and exit cells.
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Pose restored by `reset`.
    pub fn initial_pose(&self) -> Pose {
        self.initial_pose
    }

    /// The world this controller steps through.
    pub fn world(&self) -> &W {
        &self.world
    }
}
