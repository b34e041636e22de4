use std::fmt;

use blocks::Direction;
use serde::Deserialize;

/// Tolerance used when comparing positions produced by repeated moves.
pub const POSITION_EPSILON: f64 = 1e-9;

/// A point on the movement plane, in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Position { x, y }
    }

    /// This position moved `distance` world units towards `direction`.
    /// Negative distances move the other way.
    pub fn offset(self, direction: Direction, distance: f64) -> Position {
        let (dx, dy) = unit(direction);
        Position {
            x: self.x + dx * distance,
            y: self.y + dy * distance,
        }
    }

    pub fn approx_eq(self, other: Position) -> bool {
        (self.x - other.x).abs() <= POSITION_EPSILON && (self.y - other.y).abs() <= POSITION_EPSILON
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Unit vector for a direction: right is +x, up is +y.
pub fn unit(direction: Direction) -> (f64, f64) {
    match direction {
        Direction::Right => (1.0, 0.0),
        Direction::Left => (-1.0, 0.0),
        Direction::Up => (0.0, 1.0),
        Direction::Down => (0.0, -1.0),
    }
}

/// Verdict of the spatial validator on a candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admissibility {
    Admissible,
    AdmissibleAndGoal,
    Inadmissible,
}

impl Admissibility {
    pub fn is_admissible(self) -> bool {
        !matches!(self, Admissibility::Inadmissible)
    }

    pub fn is_goal(self) -> bool {
        matches!(self, Admissibility::AdmissibleAndGoal)
    }
}

/// Decides whether the player may stand at a position. Called once per move
/// with the move's target; must not have side effects.
pub trait SpatialValidator {
    fn classify(&self, position: Position) -> Admissibility;
}

impl<F> SpatialValidator for F
where
    F: Fn(Position) -> Admissibility,
{
    fn classify(&self, position: Position) -> Admissibility {
        self(position)
    }
}
