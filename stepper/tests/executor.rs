use std::time::Duration;

use blocks::parser::Parser;
use blocks::{BlockGraph, BlockId};
use stepper::{
    Admissibility, BlockState, ExecError, ExecState, Executor, ExecutorConfig, ExecutorEvent,
    Position, SpatialValidator, StepOutcome, StructuralError,
};

struct Program {
    graph: BlockGraph,
    root: BlockId,
}

impl Program {
    fn load(source: &str) -> Program {
        let sketch = Parser::new(source.to_string(), 0)
            .parse()
            .unwrap_or_else(|errs| panic!("parse failed: {:?}", errs));
        let root = sketch.structures[0].root.expect("structure has no blocks");
        Program {
            graph: sketch.graph,
            root,
        }
    }

    /// Blocks of the main chain.
    fn chain(&self) -> Vec<BlockId> {
        self.graph.chain(self.root)
    }

    fn run<V: SpatialValidator>(&self, validator: V) -> Executor<V> {
        let mut exec = Executor::new(validator, Position::ORIGIN);
        exec.set_root(&self.graph, Some(self.root)).unwrap();
        exec.drain_events();
        exec
    }
}

fn open_plane(_: Position) -> Admissibility {
    Admissibility::Admissible
}

fn moved<V: SpatialValidator>(exec: &mut Executor<V>) -> stepper::MoveReport {
    match exec.step_forward() {
        StepOutcome::Moved(report) => report,
        other => panic!("expected a move, got {:?}", other),
    }
}

#[test]
fn single_move_then_complete() {
    let program = Program::load("# Main\n- move right 3\n");
    let block = program.root;
    let mut exec = program.run(|p: Position| {
        if p.x <= 0.75 + 1e-9 {
            Admissibility::Admissible
        } else {
            Admissibility::Inadmissible
        }
    });
    assert_eq!(exec.block_state(block), BlockState::Pending);

    let report = moved(&mut exec);
    assert!(report.to.approx_eq(Position::new(0.75, 0.0)));
    assert_eq!(exec.cursor(), 1);
    assert_eq!(exec.state(), ExecState::Complete);
    assert_eq!(exec.block_state(block), BlockState::Done);
    assert!(exec.drain_events().contains(&ExecutorEvent::Completed));

    assert_eq!(exec.step_forward(), StepOutcome::AlreadyComplete);
    assert!(exec.drain_events().is_empty());
    assert!(exec.position().approx_eq(Position::new(0.75, 0.0)));
}

#[test]
fn loop_repeats_body() {
    let program = Program::load("# Main\n- loop 0..3\n  - move up 1\n  - end loop\n");
    let mut exec = program.run(open_plane);

    for _ in 0..3 {
        moved(&mut exec);
    }
    assert!(exec.position().approx_eq(Position::new(0.0, 0.75)));
    assert_eq!(exec.state(), ExecState::Complete);
    assert_eq!(exec.cursor(), exec.trace().len());
    assert_eq!(exec.step_forward(), StepOutcome::AlreadyComplete);
}

#[test]
fn loop_runs_end_minus_start_times() {
    let program = Program::load("# Main\n- loop 2..5\n  - move up 1\n  - end\n- move right 1\n");
    let mut exec = program.run(open_plane);

    let mut ups = 0;
    loop {
        match exec.step_forward() {
            StepOutcome::Moved(report) if report.direction == blocks::Direction::Up => ups += 1,
            StepOutcome::Moved(_) => {}
            StepOutcome::AlreadyComplete => break,
            other => panic!("unexpected outcome {:?}", other),
        }
    }
    assert_eq!(ups, 3);
    assert!(exec.position().approx_eq(Position::new(0.25, 0.75)));
}

#[test]
fn empty_range_skips_body() {
    let program = Program::load("# Main\n- loop 5..2\n  - move up 1\n  - end\n- move right 1\n");
    let mut exec = program.run(open_plane);

    let report = moved(&mut exec);
    assert_eq!(report.direction, blocks::Direction::Right);
    assert_eq!(exec.state(), ExecState::Complete);
    assert!(exec.position().approx_eq(Position::new(0.25, 0.0)));
}

#[test]
fn program_without_moves_finishes() {
    let program = Program::load("# Main\n- loop 0..0\n  - move up 1\n  - end\n");
    let mut exec = program.run(open_plane);

    assert_eq!(exec.step_forward(), StepOutcome::Finished);
    assert_eq!(exec.state(), ExecState::Complete);
    assert_eq!(exec.position(), Position::ORIGIN);
}

#[test]
fn backward_undoes_forward() {
    let program = Program::load("# Main\n- move right 2\n- move up 3\n- move left 1\n");
    let mut exec = program.run(open_plane);

    for _ in 0..3 {
        let before = exec.position();
        let cursor = exec.cursor();
        moved(&mut exec);
        match exec.step_backward() {
            StepOutcome::Rewound(report) => assert!(report.to.approx_eq(before)),
            other => panic!("expected a rewind, got {:?}", other),
        }
        assert!(exec.position().approx_eq(before));
        assert_eq!(exec.cursor(), cursor);
        moved(&mut exec);
    }

    assert_eq!(exec.state(), ExecState::Complete);
    assert!(matches!(exec.step_backward(), StepOutcome::Rewound(_)));
    assert_eq!(exec.state(), ExecState::Running);
}

#[test]
fn backward_at_start() {
    let program = Program::load("# Main\n- move right 1\n");
    let mut exec = program.run(open_plane);
    assert_eq!(exec.step_backward(), StepOutcome::AtStart);
    assert!(!exec.can_step_backward());
}

#[test]
fn backward_across_loop_boundary_restores_counter() {
    let program = Program::load("# Main\n- loop 0..2\n  - move up 1\n  - end\n");
    let lp = program.root;
    let mut exec = program.run(open_plane);

    moved(&mut exec);
    assert_eq!(exec.remaining(lp), Some(0));
    assert_eq!(exec.cursor(), 1);

    exec.step_backward();
    assert_eq!(exec.remaining(lp), None);
    assert_eq!(exec.cursor(), 0);
    assert_eq!(exec.position(), Position::ORIGIN);

    moved(&mut exec);
    moved(&mut exec);
    assert_eq!(exec.state(), ExecState::Complete);
    assert_eq!(exec.remaining(lp), None);

    exec.step_backward();
    assert_eq!(exec.remaining(lp), Some(0));
    assert_eq!(exec.cursor(), 1);
    moved(&mut exec);
    assert_eq!(exec.state(), ExecState::Complete);
    assert!(exec.position().approx_eq(Position::new(0.0, 0.5)));
}

#[test]
fn nested_loops_multiply() {
    let program = Program::load(concat!(
        "# Main\n",
        "- loop 0..2\n",
        "  - loop 0..3\n",
        "    - move right 1\n",
        "    - end\n",
        "  - move up 1\n",
        "  - end\n",
    ));
    let mut exec = program.run(open_plane);

    let mut moves = 0;
    while let StepOutcome::Moved(_) = exec.step_forward() {
        moves += 1;
    }
    assert_eq!(moves, 8);
    assert!(exec.position().approx_eq(Position::new(1.5, 0.5)));

    while exec.can_step_backward() {
        exec.step_backward();
    }
    assert!(exec.position().approx_eq(Position::ORIGIN));
    assert_eq!(exec.cursor(), 0);
}

#[test]
fn rejected_move_resets_fully() {
    for failing_step in 1..=3usize {
        let source = "# Main\n- move right 1\n- move right 1\n- move right 1\n";
        let program = Program::load(source);
        let chain = program.chain();
        let limit = (failing_step - 1) as f64 * 0.25;
        let mut exec = program.run(move |p: Position| {
            if p.x <= limit + 1e-9 {
                Admissibility::Admissible
            } else {
                Admissibility::Inadmissible
            }
        });

        for _ in 1..failing_step {
            moved(&mut exec);
        }
        match exec.step_forward() {
            StepOutcome::Failed(ExecError::MovementRejected { block, .. }) => {
                assert_eq!(block, chain[failing_step - 1]);
            }
            other => panic!("expected a rejected move, got {:?}", other),
        }

        assert_eq!(exec.cursor(), 0);
        assert_eq!(exec.position(), Position::ORIGIN);
        assert!(!exec.can_step_backward());
        assert_eq!(exec.block_state(chain[failing_step - 1]), BlockState::Failed);

        let events = exec.drain_events();
        assert!(events.contains(&ExecutorEvent::Reset));
        assert!(events.iter().any(|e| matches!(
            e,
            ExecutorEvent::ErrorDisplayed(message) if message.starts_with("Execution failed:")
        )));
    }
}

#[test]
fn structural_error_surfaces_when_reached() {
    let program = Program::load("# Main\n- move right 1\n- move up\n");
    let chain = program.chain();
    let mut exec = program.run(open_plane);

    moved(&mut exec);
    match exec.step_forward() {
        StepOutcome::Failed(ExecError::Structural(StructuralError::MissingOperand {
            block, ..
        })) => assert_eq!(block, chain[1]),
        other => panic!("expected a structural failure, got {:?}", other),
    }
    assert_eq!(exec.position(), Position::ORIGIN);
    let banner = exec.error_banner().unwrap();
    assert!(banner.message().contains("missing a value block"));
}

#[test]
fn loop_without_bounds_fails_on_entry() {
    let program = Program::load("# Main\n- loop\n  - move up 1\n  - end\n");
    let lp = program.root;
    let mut exec = program.run(open_plane);

    assert!(exec.at_loop_boundary());
    assert!(matches!(
        exec.step_forward(),
        StepOutcome::Failed(ExecError::Structural(StructuralError::MissingBounds {
            missing: "start and end",
            ..
        }))
    ));
    assert_eq!(exec.block_state(lp), BlockState::Failed);
}

#[test]
fn failed_mark_is_sticky_until_cleared() {
    let program = Program::load("# Main\n- move right 1\n");
    let block = program.root;
    let mut exec = program.run(|_: Position| Admissibility::Inadmissible);

    assert!(matches!(exec.step_forward(), StepOutcome::Failed(_)));
    assert_eq!(exec.block_state(block), BlockState::Failed);
    assert!(exec.palette().is_failed(block));

    exec.set_root(&program.graph, Some(program.root)).unwrap();
    exec.reset();
    assert_eq!(exec.block_state(block), BlockState::Failed);
    assert!(exec.palette().is_failed(block));

    exec.clear_failures();
    assert_eq!(exec.block_state(block), BlockState::Pending);
    assert!(!exec.palette().is_failed(block));
}

#[test]
fn unloading_clears_everything() {
    let program = Program::load("# Main\n- move right 1\n- move up 1\n");
    let chain = program.chain();
    let mut exec = program.run(open_plane);
    moved(&mut exec);

    exec.set_root(&program.graph, None).unwrap();
    assert_eq!(exec.state(), ExecState::Idle);
    assert_eq!(exec.step_forward(), StepOutcome::NothingLoaded);
    assert_eq!(exec.step_backward(), StepOutcome::NothingLoaded);
    for block in chain {
        assert_eq!(exec.block_state(block), BlockState::Cleared);
    }
    assert!(exec.palette().painted().is_empty());
}

#[test]
fn switching_programs_clears_old_colors() {
    let source = "# First\n- move right 1\n- move right 1\n\n# Second\n- move up 1\n";
    let sketch = Parser::new(source.to_string(), 0).parse().unwrap();
    let first = sketch.structure("First").unwrap().root.unwrap();
    let second = sketch.structure("Second").unwrap().root.unwrap();

    let mut exec = Executor::new(open_plane, Position::ORIGIN);
    exec.set_root(&sketch.graph, Some(first)).unwrap();
    moved(&mut exec);
    assert_eq!(exec.block_state(first), BlockState::Done);

    exec.set_root(&sketch.graph, Some(second)).unwrap();
    assert_eq!(exec.block_state(first), BlockState::Cleared);
    assert_eq!(exec.block_state(second), BlockState::Pending);
    assert_eq!(exec.position(), Position::ORIGIN);
}

#[test]
fn repaint_follows_cursor() {
    let program = Program::load("# Main\n- move right 1\n- move right 1\n- move right 1\n");
    let chain = program.chain();
    let mut exec = program.run(open_plane);

    moved(&mut exec);
    assert_eq!(exec.block_state(chain[0]), BlockState::Done);
    assert_eq!(exec.block_state(chain[1]), BlockState::Pending);
    assert_eq!(exec.block_state(chain[2]), BlockState::Cleared);

    let painted: Vec<_> = exec
        .drain_events()
        .into_iter()
        .filter_map(|e| match e {
            ExecutorEvent::BlockPainted { block, state } => Some((block, state)),
            _ => None,
        })
        .collect();
    assert_eq!(
        painted,
        vec![(chain[0], BlockState::Done), (chain[1], BlockState::Pending)]
    );
}

#[test]
fn goal_is_reported() {
    let program = Program::load("# Main\n- move up 2\n");
    let mut exec = program.run(|p: Position| {
        if p.approx_eq(Position::new(0.0, 0.5)) {
            Admissibility::AdmissibleAndGoal
        } else {
            Admissibility::Admissible
        }
    });

    let report = moved(&mut exec);
    assert!(report.goal);
    assert!(exec.drain_events().iter().any(|e| matches!(e, ExecutorEvent::GoalReached { .. })));
}

#[test]
fn banner_expires() {
    let program = Program::load("# Main\n- move right 1\n");
    let config = ExecutorConfig {
        move_unit: 0.25,
        error_display_secs: 3.0,
    };
    let mut exec = Executor::with_config(
        |_: Position| Admissibility::Inadmissible,
        Position::ORIGIN,
        config,
    );
    exec.set_root(&program.graph, Some(program.root)).unwrap();
    exec.step_forward();

    let banner = exec.error_banner().unwrap().clone();
    let raised = banner.raised_at();
    assert!(exec.visible_error(raised + Duration::from_secs(2)).is_some());
    assert!(exec.visible_error(raised + Duration::from_secs(3)).is_none());
    assert_eq!(banner.expires_at(), raised + Duration::from_secs(3));
}

#[test]
fn select_runs_whole_structure() {
    let program = Program::load("# Main\n- move right 1\n- loop 0..2\n  - move up 1\n  - end\n");
    let lp = program.chain()[1];
    let inner = program.graph.body_head(lp).unwrap();

    let mut exec = Executor::new(open_plane, Position::ORIGIN);
    exec.select(&program.graph, inner).unwrap();
    assert_eq!(exec.trace().root(), Some(program.root));
    assert_eq!(exec.trace().move_count(), 2);
}

#[test]
fn move_unit_scales_displacement() {
    let program = Program::load("# Main\n- move left 2\n");
    let config = ExecutorConfig {
        move_unit: 1.0,
        ..ExecutorConfig::default()
    };
    let mut exec = Executor::with_config(open_plane, Position::new(5.0, 5.0), config);
    exec.set_root(&program.graph, Some(program.root)).unwrap();

    let report = moved(&mut exec);
    assert!(report.to.approx_eq(Position::new(3.0, 5.0)));
}
