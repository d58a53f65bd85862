use serde::{Deserialize, Serialize};

use crate::{
    Pose, Position,
    map::{Grid, GridError},
};

/// The grid simulation the escape room runs inside.
///
/// The episode controller only ever asks the world these questions; it never
/// looks at terrain directly.
pub trait World {
    /// Collision oracle: can the agent stand at `pose`?
    fn is_traversable(&self, pose: Pose) -> bool;

    /// Maps a raw pose to the grid cell used for landmark checks.
    /// Returns `None` for poses that fall outside the grid.
    fn discretize(&self, pose: Pose) -> Option<Position>;

    /// Whether `cell` lies inside the world's grid.
    fn contains(&self, cell: Position) -> bool;

    /// Base reward the simulation itself contributes for arriving at `pose`.
    fn step_reward(&self, _pose: Pose) -> f64 {
        0.0
    }

    /// Color of a colored floor cell, reported when the agent beeps on it.
    fn color_at(&self, _cell: Position) -> Option<char> {
        None
    }
}

/// Static type of a cell in a [`GridWorld`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellType {
    #[default]
    Floor,
    Wall,
    /// Floor painted with a color, written as a lowercase letter in layouts.
    Colored(char),
}

impl CellType {
    pub fn is_traversable(self) -> bool {
        !matches!(self, CellType::Wall)
    }
}

/// Errors raised while parsing a layout string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapParseError {
    #[error("Map layout is empty")]
    Empty,
    #[error("Inconsistent width at row {row}: expected {expected}, found {found}")]
    InconsistentWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Unknown map character '{ch}' at ({x}, {y})")]
    UnknownCell { ch: char, x: usize, y: usize },
}

/// A world backed by a static terrain grid. Anything outside the grid is solid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridWorld {
    terrain: Grid<CellType>,
}

impl GridWorld {
    pub fn new(terrain: Grid<CellType>) -> Self {
        GridWorld { terrain }
    }

    /// Parses a layout string.
    ///
    /// Each non-blank line is one row and may be wrapped in `|` delimiters,
    /// which keeps trailing floor cells visible. `#` is a wall, a space or `.`
    /// is floor and a lowercase letter is a colored floor cell.
    pub fn from_layout(layout: &str) -> Result<Self, MapParseError> {
        let rows: Vec<&str> = layout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(strip_delimiters)
            .collect();
        let Some(first) = rows.first() else {
            return Err(MapParseError::Empty);
        };

        let width = first.chars().count();
        if width == 0 {
            return Err(MapParseError::Empty);
        }
        let mut terrain: Grid<CellType> = Grid::new(width, rows.len());

        for (y, row) in rows.iter().enumerate() {
            let found = row.chars().count();
            if found != width {
                return Err(MapParseError::InconsistentWidth {
                    row: y,
                    expected: width,
                    found,
                });
            }
            for (x, ch) in row.chars().enumerate() {
                terrain[Position::new(x, y)] = match ch {
                    ' ' | '.' => CellType::Floor,
                    '#' => CellType::Wall,
                    c if c.is_ascii_lowercase() => CellType::Colored(c),
                    ch => return Err(MapParseError::UnknownCell { ch, x, y }),
                };
            }
        }

        Ok(GridWorld { terrain })
    }

    /// The underlying cell grid, for renderers that walk every cell.
    pub fn terrain(&self) -> &Grid<CellType> {
        &self.terrain
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.terrain.width()
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.terrain.height()
    }

    /// Cell type at `cell`, or `None` outside the grid.
    pub fn cell(&self, cell: Position) -> Option<CellType> {
        self.terrain.get(cell).copied()
    }

    /// Replaces a single cell, e.g. to wall off a route in a test room.
    pub fn set_cell(&mut self, cell: Position, cell_type: CellType) -> Result<(), GridError> {
        self.terrain.set(cell, cell_type)
    }
}

fn strip_delimiters(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    match line.strip_prefix('|').and_then(|l| l.strip_suffix('|')) {
        Some(inner) => inner,
        None => line,
    }
}

impl World for GridWorld {
    fn is_traversable(&self, pose: Pose) -> bool {
        self.discretize(pose)
            .and_then(|cell| self.cell(cell))
            .is_some_and(CellType::is_traversable)
    }

    fn discretize(&self, pose: Pose) -> Option<Position> {
        let x = usize::try_from(pose.x).ok()?;
        let y = usize::try_from(pose.y).ok()?;
        let cell = Position::new(x, y);
        self.terrain.contains(cell).then_some(cell)
    }

    fn contains(&self, cell: Position) -> bool {
        self.terrain.contains(cell)
    }

    fn color_at(&self, cell: Position) -> Option<char> {
        match self.cell(cell)? {
            CellType::Colored(color) => Some(color),
            _ => None,
        }
    }
}
