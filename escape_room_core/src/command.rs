use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{EscapeRoomError, Pose, world::World};

/// The discrete commands an agent can issue.
///
/// The four directions move the agent by one cell; `Beep` and `Nop` leave the
/// pose alone and are passed to the world as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Left,
    Up,
    Right,
    Down,
    Beep,
    Nop,
}

impl Command {
    /// Every command, ordered by its action index.
    pub const ALL: [Command; 6] = [
        Command::Left,
        Command::Up,
        Command::Right,
        Command::Down,
        Command::Beep,
        Command::Nop,
    ];

    /// The four commands that can change the agent's pose.
    pub const MOVES: [Command; 4] = [Command::Left, Command::Up, Command::Right, Command::Down];

    /// Pose delta for this command. `y` grows downwards.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Command::Left => (-1, 0),
            Command::Right => (1, 0),
            Command::Up => (0, -1),
            Command::Down => (0, 1),
            Command::Beep | Command::Nop => (0, 0),
        }
    }

    /// Display glyph used by renderers and logs.
    pub fn to_glyph(self) -> char {
        match self {
            Command::Left => '<',
            Command::Right => '>',
            Command::Up => '^',
            Command::Down => 'v',
            Command::Beep => 'o',
            Command::Nop => '_',
        }
    }

    /// Discrete action index, the position of the command in [`Command::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// Moves `pose` by this command's delta if the world lets the agent stand
    /// there. Bumping into a wall is a no-op, never an error.
    ///
    /// This knows nothing about keys or doors; the gate is applied by the
    /// episode controller on top of the pose returned here.
    pub fn apply<W: World + ?Sized>(self, pose: Pose, world: &W) -> Pose {
        let candidate = pose.offset(self.delta());
        if candidate != pose && world.is_traversable(candidate) {
            candidate
        } else {
            pose
        }
    }
}

impl TryFrom<usize> for Command {
    type Error = EscapeRoomError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Command::ALL.get(index).copied().ok_or_else(|| {
            EscapeRoomError::InvalidCommand(format!(
                "action index {index} is outside 0..{}",
                Command::ALL.len()
            ))
        })
    }
}

impl FromStr for Command {
    type Err = EscapeRoomError;

    /// Accepts either a glyph (`<`, `^`, ...) or a case-insensitive name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(command) = Command::ALL
            .into_iter()
            .find(|c| trimmed.len() == 1 && trimmed.starts_with(c.to_glyph()))
        {
            return Ok(command);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "left" => Ok(Command::Left),
            "up" => Ok(Command::Up),
            "right" => Ok(Command::Right),
            "down" => Ok(Command::Down),
            "beep" => Ok(Command::Beep),
            "nop" | "noop" => Ok(Command::Nop),
            _ => Err(EscapeRoomError::InvalidCommand(format!(
                "unknown command '{s}'"
            ))),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_glyph())
    }
}
