use serde::Deserialize;

use stepper::{
    Admissibility, Executor, ExecutorConfig, GridError, GridPath, Position, SpatialValidator,
    StepOutcome,
};

/// TOML frontmatter of a level file. Every field is optional; a file without
/// frontmatter is a plain sketch run on an open plane.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Human-readable description, shown by the test runner.
    pub description: Option<String>,

    /// Structure to run (case-insensitive). Defaults to "main".
    pub entry: String,

    /// ASCII map the player must stay on. Without it every position is
    /// admissible.
    pub grid: Option<String>,

    /// Starting position when there is no grid.
    pub start: Option<Position>,

    pub move_unit: Option<f64>,
    pub error_display_secs: Option<f64>,

    /// Step script run by the test runner (`f`, `b`, `r`, `c`).
    pub steps: Option<String>,

    /// Expected `[x, y]` after the script.
    pub expect_position: Option<[f64; 2]>,
    pub expect_cursor: Option<usize>,
    /// `idle`, `running` or `complete`.
    pub expect_state: Option<String>,
    /// Substring of the last error message shown.
    pub expect_error: Option<String>,
    /// Whether the goal was reached at some point during the script.
    pub expect_goal: Option<bool>,
    /// Labels of the blocks marked failed at the end of the script.
    pub expect_failed: Option<Vec<String>>,
    /// The sketch itself must fail to parse.
    pub expect_parse_error: bool,
    pub expect_trace_len: Option<usize>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        LevelConfig {
            description: None,
            entry: "main".to_string(),
            grid: None,
            start: None,
            move_unit: None,
            error_display_secs: None,
            steps: None,
            expect_position: None,
            expect_cursor: None,
            expect_state: None,
            expect_error: None,
            expect_goal: None,
            expect_failed: None,
            expect_parse_error: false,
            expect_trace_len: None,
        }
    }
}

impl LevelConfig {
    pub fn executor_config(&self) -> ExecutorConfig {
        let defaults = ExecutorConfig::default();
        ExecutorConfig {
            move_unit: self.move_unit.unwrap_or(defaults.move_unit),
            error_display_secs: self.error_display_secs.unwrap_or(defaults.error_display_secs),
        }
    }

    /// The spatial validator for this level and where the player starts.
    pub fn terrain(&self) -> Result<(Terrain, Position), GridError> {
        match &self.grid {
            Some(map) => {
                let grid = GridPath::parse(map, self.executor_config().move_unit)?;
                let start = grid.start_position();
                Ok((Terrain::Grid(grid), start))
            }
            None => Ok((Terrain::Open, self.start.unwrap_or(Position::ORIGIN))),
        }
    }

    pub fn executor(&self) -> Result<Executor<Terrain>, GridError> {
        let (terrain, start) = self.terrain()?;
        Ok(Executor::with_config(terrain, start, self.executor_config()))
    }
}

/// Where a level's player may walk.
#[derive(Debug, Clone)]
pub enum Terrain {
    Open,
    Grid(GridPath),
}

impl Terrain {
    pub fn grid(&self) -> Option<&GridPath> {
        match self {
            Terrain::Open => None,
            Terrain::Grid(grid) => Some(grid),
        }
    }
}

impl SpatialValidator for Terrain {
    fn classify(&self, position: Position) -> Admissibility {
        match self {
            Terrain::Open => Admissibility::Admissible,
            Terrain::Grid(grid) => grid.classify(position),
        }
    }
}

/// Split a level file into its frontmatter and the Markdown sketch.
pub fn parse_level_file(content: &str) -> Result<(LevelConfig, &str), String> {
    let content = content.trim_start_matches('\u{feff}'); // strip BOM

    if !content.starts_with("---") {
        return Ok((LevelConfig::default(), content));
    }

    let after_open = &content[3..];
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))
        .unwrap_or(after_open);

    let close_pos = after_open
        .find("\n---")
        .ok_or("missing closing --- frontmatter delimiter")?;

    let toml_str = after_open[..close_pos].trim_end_matches('\r');
    let rest_start = close_pos + 4; // skip \n---
    let source = after_open[rest_start..]
        .strip_prefix("\r\n")
        .or_else(|| after_open[rest_start..].strip_prefix('\n'))
        .unwrap_or(&after_open[rest_start..]);

    let config: LevelConfig =
        toml::from_str(toml_str).map_err(|e| format!("TOML parse error: {}", e))?;

    Ok((config, source))
}

/// One action of a step script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Forward,
    Backward,
    Reset,
    ClearFailures,
}

impl Action {
    pub fn apply<V: SpatialValidator>(self, exec: &mut Executor<V>) -> Option<StepOutcome> {
        match self {
            Action::Forward => Some(exec.step_forward()),
            Action::Backward => Some(exec.step_backward()),
            Action::Reset => {
                exec.reset();
                None
            }
            Action::ClearFailures => {
                exec.clear_failures();
                None
            }
        }
    }
}

/// Largest repeat count accepted in front of a step.
pub const MAX_REPEAT: usize = 10_000;

/// Parse a step script such as `fff b r`. Whitespace and commas are ignored;
/// a digit repeats the action after it, so `3f` is `fff`.
pub fn parse_script(script: &str) -> Result<Vec<Action>, String> {
    let mut actions = Vec::new();
    let mut repeat: Option<usize> = None;

    for ch in script.chars() {
        if ch.is_whitespace() || ch == ',' {
            continue;
        }
        if let Some(digit) = ch.to_digit(10) {
            let count = repeat.unwrap_or(0) * 10 + digit as usize;
            if count > MAX_REPEAT {
                return Err(format!("step count too large (at most {})", MAX_REPEAT));
            }
            repeat = Some(count);
            continue;
        }
        let action = match ch.to_ascii_lowercase() {
            'f' => Action::Forward,
            'b' => Action::Backward,
            'r' => Action::Reset,
            'c' => Action::ClearFailures,
            other => {
                return Err(format!("unknown step '{}' (expected f, b, r or c)", other));
            }
        };
        let count = repeat.take().unwrap_or(1);
        actions.extend(std::iter::repeat_n(action, count));
    }

    if repeat.is_some() {
        return Err("step count without an action".to_string());
    }
    Ok(actions)
}
