use std::io::{self, BufRead, Write};
use std::ops::Range;
use std::path::Path;
use std::process;
use std::time::Instant;

use clap::{Parser, Subcommand};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};
use tracing_subscriber::EnvFilter;

use blocks::parser::{ParseError, Sketch};
use blocks::{BlockGraph, BlockId};
use blockstep_cli::level::{self, Action, Terrain};
use blockstep_cli::test_runner;
use stepper::{ExecError, Executor, StepOutcome};

const SUBCOMMANDS: &[&str] = &["run", "test", "help"];

#[derive(Parser)]
#[command(name = "blockstep", version, about = "Step through block programs")]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log more (-v info, -vv debug). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a level and step through its program
    Run(RunArgs),

    /// Run .test.md level files and check their expectations
    Test(TestArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Level file (Markdown sketch, optional TOML frontmatter)
    file: String,

    /// Structure to run (case-insensitive); overrides the level's entry
    #[arg(short, long)]
    entry: Option<String>,

    /// Parse only, don't execute (exit 0 if valid)
    #[arg(long)]
    check: bool,

    /// Print the flattened trace and exit
    #[arg(long)]
    trace: bool,

    /// List the structures and their blocks
    #[arg(long)]
    list_blocks: bool,

    /// Step script to run instead of the interactive prompt, e.g. "ffbf" or "3f r"
    #[arg(short, long)]
    steps: Option<String>,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to a .test.md file or directory containing them
    path: String,

    /// Run only levels in these categories (subfolder names). Repeatable.
    #[arg(short, long)]
    category: Vec<String>,

    /// List available categories and exit
    #[arg(long)]
    list_categories: bool,
}

fn main() {
    // `blockstep level.md` works like `blockstep run level.md`.
    let mut args: Vec<String> = std::env::args().collect();
    let first_positional = args
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, a)| !a.starts_with('-'))
        .map(|(pos, a)| (pos, a.clone()));
    if let Some((pos, first)) = first_positional {
        if !SUBCOMMANDS.contains(&first.as_str()) {
            args.insert(pos, "run".to_string());
        }
    }

    let cli = Cli::parse_from(&args);
    init_logging(cli.verbose);

    match cli.command {
        Command::Run(run_args) => do_run(run_args, cli.no_color),
        Command::Test(test_args) => {
            let path = Path::new(&test_args.path);
            if test_args.list_categories {
                test_runner::list_categories(path);
                return;
            }
            let exit_code = test_runner::run_tests(path, cli.no_color, &test_args.category);
            process::exit(exit_code);
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Everything needed to point diagnostics at the level file.
struct Report {
    files: SimpleFiles<String, String>,
    file_id: usize,
    /// Byte offset of the sketch inside the file (frontmatter length).
    offset: usize,
    writer: StandardStream,
    config: term::Config,
}

impl Report {
    fn emit(&self, diagnostic: &Diagnostic<usize>) {
        let _ = term::emit_to_write_style(
            &mut self.writer.lock(),
            &self.config,
            &self.files,
            diagnostic,
        );
    }

    fn shift(&self, span: &Range<usize>) -> Range<usize> {
        span.start + self.offset..span.end + self.offset
    }

    fn parse_errors(&self, errors: &[ParseError]) {
        for error in errors {
            let mut diagnostic = error.to_diagnostic();
            for label in &mut diagnostic.labels {
                label.range = self.shift(&label.range);
            }
            self.emit(&diagnostic);
        }
    }

    /// Point at the block that made a step fail.
    fn step_failure(&self, sketch: &Sketch, err: &ExecError) {
        let Some(span) = sketch.span_of(err.block()) else {
            eprintln!("error: {}", err);
            return;
        };
        let note = if err.is_structural() {
            "attach the missing value block and run again"
        } else {
            "the move would leave the path"
        };
        let diagnostic = Diagnostic::error()
            .with_message(err.to_string())
            .with_labels(vec![
                Label::primary(self.file_id, self.shift(&span)).with_message("this block failed"),
            ])
            .with_notes(vec![
                note.to_string(),
                "the run was reset to its starting position".to_string(),
            ]);
        self.emit(&diagnostic);
    }
}

fn do_run(args: RunArgs, no_color: bool) {
    let color_choice = if no_color {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    };

    let content = match std::fs::read_to_string(&args.file) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: cannot read '{}': {}", args.file, e);
            process::exit(1);
        }
    };

    let (mut config, source) = match level::parse_level_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("error: {}: {}", args.file, e);
            process::exit(1);
        }
    };
    if let Some(entry) = args.entry.clone() {
        config.entry = entry;
    }

    let mut files = SimpleFiles::new();
    let file_id = files.add(args.file.clone(), content.clone());
    let report = Report {
        files,
        file_id,
        offset: content.len() - source.len(),
        writer: StandardStream::stderr(color_choice),
        config: term::Config::default(),
    };

    let sketch = match blocks::parser::Parser::new(source.to_string(), file_id).parse() {
        Ok(sketch) => sketch,
        Err(errors) => {
            report.parse_errors(&errors);
            process::exit(1);
        }
    };

    if args.check {
        eprintln!("ok: {} parsed successfully", args.file);
        return;
    }

    if args.list_blocks {
        for structure in &sketch.structures {
            println!("# {}", structure.name);
            if let Some(root) = structure.root {
                print_chain(&sketch.graph, root, 1);
            }
        }
        return;
    }

    let Some(structure) = sketch.structure(&config.entry) else {
        eprintln!(
            "error: no structure named '{}' (available: {})",
            config.entry,
            sketch.structure_names().join(", ")
        );
        process::exit(1);
    };

    let mut exec = match config.executor() {
        Ok(exec) => exec,
        Err(e) => {
            eprintln!("error: {}: {}", args.file, e);
            process::exit(1);
        }
    };
    if let Err(e) = exec.set_root(&sketch.graph, structure.root) {
        eprintln!("error: cannot load '{}': {}", structure.name, e);
        process::exit(1);
    }

    if args.trace {
        print!("{}", exec.trace());
        return;
    }

    let failed = match &args.steps {
        Some(script) => {
            let actions = match level::parse_script(script) {
                Ok(actions) => actions,
                Err(e) => {
                    eprintln!("error: {}", e);
                    process::exit(1);
                }
            };
            let mut failed = false;
            for action in actions {
                failed |= perform(&mut exec, action, &sketch, &report);
            }
            failed
        }
        None => interactive(&mut exec, &sketch, &report),
    };

    if failed {
        process::exit(1);
    }
}

/// Print a chain with loop bodies indented under their loop.
fn print_chain(graph: &BlockGraph, start: BlockId, indent: usize) {
    for id in graph.chain(start) {
        let Some(block) = graph.get(id) else {
            continue;
        };
        println!("{}- {}  [{}]", "  ".repeat(indent), block.describe(), id);
        if let Some(body) = graph.body_head(id) {
            print_chain(graph, body, indent + 1);
        }
    }
}

/// Run one action and print the result. Returns true if a step failed.
fn perform(
    exec: &mut Executor<Terrain>,
    action: Action,
    sketch: &Sketch,
    report: &Report,
) -> bool {
    let outcome = action.apply(exec);
    let failed = match &outcome {
        Some(StepOutcome::Failed(err)) => {
            report.step_failure(sketch, err);
            true
        }
        _ => false,
    };

    match outcome {
        Some(outcome) => println!("{}", describe_outcome(&outcome)),
        None if action == Action::Reset => println!("reset"),
        None => println!("failures cleared"),
    }
    print_status(exec);
    failed
}

fn describe_outcome(outcome: &StepOutcome) -> String {
    match outcome {
        StepOutcome::Moved(report) => format!(
            "moved {} {}: {} -> {}{}",
            report.direction,
            report.steps,
            report.from,
            report.to,
            if report.goal { " (goal!)" } else { "" }
        ),
        StepOutcome::Finished => "finished".to_string(),
        StepOutcome::AlreadyComplete => "code execution complete".to_string(),
        StepOutcome::NothingLoaded => "nothing to run".to_string(),
        StepOutcome::Failed(err) => format!("failed: {}", err),
        StepOutcome::Rewound(report) => format!("undone: {} -> {}", report.from, report.to),
        StepOutcome::AtStart => "already at the start of the execution".to_string(),
    }
}

fn print_status(exec: &Executor<Terrain>) {
    println!(
        "  cursor {}/{}, position {}, {}",
        exec.cursor(),
        exec.trace().len(),
        exec.position(),
        test_runner::state_name(exec.state())
    );
    if let Some(message) = exec.visible_error(Instant::now()) {
        println!("  ! {}", message);
    }
    if let Some(grid) = exec.validator().grid() {
        for row in grid.render(exec.position()).lines() {
            println!("    {}", row);
        }
    }
}

/// Read actions from stdin until `q` or end of input. Returns true if any
/// step failed.
fn interactive(exec: &mut Executor<Terrain>, sketch: &Sketch, report: &Report) -> bool {
    println!("f = step forward, b = step back, r = reset, c = clear failures, q = quit");
    print_status(exec);

    let stdin = io::stdin();
    let mut failed = false;
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
            break;
        }

        match level::parse_script(line) {
            Ok(actions) => {
                for action in actions {
                    failed |= perform(exec, action, sketch, report);
                }
            }
            Err(e) => println!("{}", e),
        }
    }
    failed
}
