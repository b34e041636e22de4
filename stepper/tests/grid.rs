use blocks::parser::Parser;
use stepper::{
    Admissibility, ExecError, Executor, ExecutorConfig, GridError, GridPath, Position,
    SpatialValidator, StepOutcome,
};

const MAP: &str = "
..G.
..#.
S###
";

#[test]
fn parse_and_classify() {
    let grid = GridPath::parse(MAP, 0.25).unwrap();
    assert_eq!(grid.width(), 4);
    assert_eq!(grid.height(), 3);
    assert_eq!(grid.start_position(), Position::new(0.0, 0.0));

    assert_eq!(grid.classify(Position::new(0.5, 0.0)), Admissibility::Admissible);
    assert_eq!(grid.classify(Position::new(0.5, 0.5)), Admissibility::AdmissibleAndGoal);
    assert_eq!(grid.classify(Position::new(0.0, 0.25)), Admissibility::Inadmissible);
    assert_eq!(grid.classify(Position::new(-0.25, 0.0)), Admissibility::Inadmissible);
    assert_eq!(grid.classify(Position::new(1.0, 0.0)), Admissibility::Inadmissible);
}

#[test]
fn render_marks_player() {
    let grid = GridPath::parse(MAP, 0.25).unwrap();
    assert_eq!(grid.render(Position::new(0.5, 0.25)), "..G.\n..@.\nS###\n");
}

#[test]
fn map_errors() {
    assert_eq!(GridPath::parse("\n  \n", 1.0).unwrap_err(), GridError::Empty);
    assert_eq!(GridPath::parse("###", 1.0).unwrap_err(), GridError::MissingStart);
    assert!(matches!(
        GridPath::parse("S#\nS#", 1.0),
        Err(GridError::DuplicateStart { first: 1, second: 2 })
    ));
    assert!(matches!(
        GridPath::parse("S#x", 1.0),
        Err(GridError::UnknownCell {
            ch: 'x',
            row: 1,
            column: 3
        })
    ));
    assert!(matches!(
        GridPath::parse("S#", 0.0),
        Err(GridError::InvalidCellSize(_))
    ));
}

#[test]
fn walking_the_path_reaches_goal() {
    let source = "# Main\n- move right 2\n- move up 2\n";
    let sketch = Parser::new(source.to_string(), 0).parse().unwrap();
    let root = sketch.structures[0].root.unwrap();
    let grid = GridPath::parse(MAP, 0.25).unwrap();
    let start = grid.start_position();

    let mut exec = Executor::new(grid, start);
    exec.set_root(&sketch.graph, Some(root)).unwrap();

    assert!(matches!(exec.step_forward(), StepOutcome::Moved(r) if !r.goal));
    assert!(matches!(exec.step_forward(), StepOutcome::Moved(r) if r.goal));
}

#[test]
fn leaving_the_path_is_rejected() {
    let source = "# Main\n- move up 1\n";
    let sketch = Parser::new(source.to_string(), 0).parse().unwrap();
    let root = sketch.structures[0].root.unwrap();
    let grid = GridPath::parse(MAP, 0.25).unwrap();
    let start = grid.start_position();

    let mut exec = Executor::new(grid, start);
    exec.set_root(&sketch.graph, Some(root)).unwrap();
    match exec.step_forward() {
        StepOutcome::Failed(err @ ExecError::MovementRejected { .. }) => {
            assert!(err.to_string().contains("outside the path"));
        }
        other => panic!("expected a rejected move, got {:?}", other),
    }
}

#[test]
fn config_defaults() {
    let config = ExecutorConfig::default();
    assert_eq!(config.move_unit, 0.25);
    assert_eq!(config.error_display().as_secs(), 3);

    let partial: ExecutorConfig = toml::from_str("move_unit = 1.0").unwrap();
    assert_eq!(partial.move_unit, 1.0);
    assert_eq!(partial.error_display_secs, 3.0);
}
