use thiserror::Error;

use crate::spatial::{Admissibility, Position, SpatialValidator};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid map is empty")]
    Empty,

    #[error("grid map has no start cell ('S')")]
    MissingStart,

    #[error("grid map has more than one start cell (rows {first} and {second})")]
    DuplicateStart { first: usize, second: usize },

    #[error("unknown grid cell '{ch}' at row {row}, column {column}")]
    UnknownCell { ch: char, row: usize, column: usize },

    #[error("grid cell size must be positive, got {0}")]
    InvalidCellSize(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Blocked,
    Path,
    Goal,
}

/// A walkable path drawn as ASCII art.
///
/// `#` is path, `S` the start (also path), `G` a goal, `.` or a space is
/// blocked. Rows are written top to bottom; the bottom row is `y = 0` and the
/// leftmost column is `x = 0`. One cell is `cell_size` world units wide.
#[derive(Debug, Clone)]
pub struct GridPath {
    /// Indexed `[y][x]`.
    cells: Vec<Vec<Cell>>,
    start: (usize, usize),
    cell_size: f64,
}

impl GridPath {
    pub fn parse(map: &str, cell_size: f64) -> Result<Self, GridError> {
        if !(cell_size > 0.0 && cell_size.is_finite()) {
            return Err(GridError::InvalidCellSize(cell_size));
        }

        let lines: Vec<&str> = map.lines().map(str::trim_end).collect();
        let first = lines.iter().position(|l| !l.trim().is_empty());
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        let (Some(first), Some(last)) = (first, last) else {
            return Err(GridError::Empty);
        };
        let rows = &lines[first..=last];

        let mut cells = vec![Vec::new(); rows.len()];
        let mut start: Option<(usize, usize, usize)> = None;
        for (row, line) in rows.iter().enumerate() {
            let y = rows.len() - 1 - row;
            for (column, ch) in line.chars().enumerate() {
                let cell = match ch {
                    '#' => Cell::Path,
                    'G' | 'g' => Cell::Goal,
                    'S' | 's' => {
                        if let Some((_, _, first_row)) = start {
                            return Err(GridError::DuplicateStart {
                                first: first_row + 1,
                                second: row + 1,
                            });
                        }
                        start = Some((column, y, row));
                        Cell::Path
                    }
                    '.' | ' ' => Cell::Blocked,
                    other => {
                        return Err(GridError::UnknownCell {
                            ch: other,
                            row: row + 1,
                            column: column + 1,
                        });
                    }
                };
                cells[y].push(cell);
            }
        }

        let (x, y, _) = start.ok_or(GridError::MissingStart)?;
        Ok(GridPath {
            cells,
            start: (x, y),
            cell_size,
        })
    }

    pub fn width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// World position of the start cell.
    pub fn start_position(&self) -> Position {
        self.world(self.start.0, self.start.1)
    }

    fn world(&self, x: usize, y: usize) -> Position {
        Position::new(x as f64 * self.cell_size, y as f64 * self.cell_size)
    }

    /// Grid cell under a world position, if it lies on the map.
    fn cell_at(&self, position: Position) -> Option<(usize, usize, Cell)> {
        let x = (position.x / self.cell_size).round();
        let y = (position.y / self.cell_size).round();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        let cell = *self.cells.get(y)?.get(x)?;
        Some((x, y, cell))
    }

    /// The map with the player drawn as `@`.
    pub fn render(&self, player: Position) -> String {
        let player = self.cell_at(player).map(|(x, y, _)| (x, y));
        let mut out = String::new();
        for (y, row) in self.cells.iter().enumerate().rev() {
            for (x, cell) in row.iter().enumerate() {
                let ch = if player == Some((x, y)) {
                    '@'
                } else if (x, y) == self.start {
                    'S'
                } else {
                    match cell {
                        Cell::Blocked => '.',
                        Cell::Path => '#',
                        Cell::Goal => 'G',
                    }
                };
                out.push(ch);
            }
            out.push('\n');
        }
        out
    }
}

impl SpatialValidator for GridPath {
    fn classify(&self, position: Position) -> Admissibility {
        match self.cell_at(position) {
            Some((_, _, Cell::Path)) => Admissibility::Admissible,
            Some((_, _, Cell::Goal)) => Admissibility::AdmissibleAndGoal,
            Some((_, _, Cell::Blocked)) | None => Admissibility::Inadmissible,
        }
    }
}
