use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use blocks::parser::{Parser, Sketch};
use stepper::{BlockState, ExecState, Executor, ExecutorEvent, Position};

use crate::level::{self, LevelConfig, Terrain};

pub enum TestOutcome {
    Pass,
    Fail(String),
}

pub struct TestResult {
    pub path: PathBuf,
    pub description: Option<String>,
    pub outcome: TestOutcome,
}

impl TestResult {
    fn new(path: &Path, description: Option<String>, outcome: TestOutcome) -> Self {
        TestResult {
            path: path.to_path_buf(),
            description,
            outcome,
        }
    }
}

/// What happened while a level's step script ran.
#[derive(Default)]
struct RunLog {
    goal_reached: bool,
    last_error: Option<String>,
}

pub fn state_name(state: ExecState) -> &'static str {
    match state {
        ExecState::Idle => "idle",
        ExecState::Running => "running",
        ExecState::Complete => "complete",
    }
}

/// Run one level file and check its expectations.
pub fn run_single_test(path: &Path) -> TestResult {
    // 1. Read file
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            let reason = format!("cannot read file: {}", e);
            return TestResult::new(path, None, TestOutcome::Fail(reason));
        }
    };

    // 2. Parse frontmatter
    let (config, source) = match level::parse_level_file(&content) {
        Ok(pair) => pair,
        Err(e) => {
            let reason = format!("frontmatter error: {}", e);
            return TestResult::new(path, None, TestOutcome::Fail(reason));
        }
    };
    let description = config.description.clone();

    // 3. Parse the sketch
    let parse_result = Parser::new(source.to_string(), 0).parse();
    if config.expect_parse_error {
        let outcome = match parse_result {
            Err(_) => TestOutcome::Pass,
            Ok(_) => TestOutcome::Fail("expected parse error, but parsing succeeded".into()),
        };
        return TestResult::new(path, description, outcome);
    }
    let sketch = match parse_result {
        Ok(sketch) => sketch,
        Err(errs) => {
            let msgs: Vec<String> = errs
                .iter()
                .map(|e| format!("line {}: {}", e.line(source), e))
                .collect();
            let reason = format!("unexpected parse error: {}", msgs.join("; "));
            return TestResult::new(path, description, TestOutcome::Fail(reason));
        }
    };

    // 4. Run the script and compare
    let outcome = match run_level(&config, &sketch) {
        Ok(()) => TestOutcome::Pass,
        Err(reason) => TestOutcome::Fail(reason),
    };
    TestResult::new(path, description, outcome)
}

fn run_level(config: &LevelConfig, sketch: &Sketch) -> Result<(), String> {
    let structure = sketch.structure(&config.entry).ok_or_else(|| {
        format!(
            "entry structure '{}' not found (available: {})",
            config.entry,
            sketch.structure_names().join(", ")
        )
    })?;

    let mut exec = config.executor().map_err(|e| format!("grid error: {}", e))?;
    exec.set_root(&sketch.graph, structure.root)
        .map_err(|e| format!("cannot load program: {}", e))?;

    let script = level::parse_script(config.steps.as_deref().unwrap_or(""))?;
    let mut log = RunLog::default();
    for action in script {
        action.apply(&mut exec);
        record_events(&mut exec, &mut log);
    }

    let mismatches = check_expectations(config, sketch, &exec, &log);
    if mismatches.is_empty() {
        Ok(())
    } else {
        Err(mismatches.join("\n"))
    }
}

fn record_events(exec: &mut Executor<Terrain>, log: &mut RunLog) {
    for event in exec.drain_events() {
        match event {
            ExecutorEvent::GoalReached { .. } => log.goal_reached = true,
            ExecutorEvent::ErrorDisplayed(message) => log.last_error = Some(message),
            _ => {}
        }
    }
}

/// Compare the executor's final state with the level's expectations.
/// Returns one line per mismatch.
fn check_expectations(
    config: &LevelConfig,
    sketch: &Sketch,
    exec: &Executor<Terrain>,
    log: &RunLog,
) -> Vec<String> {
    let mut mismatches = Vec::new();

    if let Some(expected) = config.expect_trace_len {
        let actual = exec.trace().len();
        if actual != expected {
            mismatches.push(format!("trace length: expected {}, got {}", expected, actual));
        }
    }

    if let Some([x, y]) = config.expect_position {
        let expected = Position::new(x, y);
        if !exec.position().approx_eq(expected) {
            mismatches.push(format!(
                "position: expected {}, got {}",
                expected,
                exec.position()
            ));
        }
    }

    if let Some(expected) = config.expect_cursor {
        if exec.cursor() != expected {
            mismatches.push(format!("cursor: expected {}, got {}", expected, exec.cursor()));
        }
    }

    if let Some(expected) = &config.expect_state {
        let actual = state_name(exec.state());
        if !actual.eq_ignore_ascii_case(expected) {
            mismatches.push(format!("state: expected {}, got {}", expected, actual));
        }
    }

    match (&config.expect_error, &log.last_error) {
        (Some(expected), Some(actual)) if !actual.contains(expected.as_str()) => {
            mismatches.push(format!(
                "expected error containing \"{}\", got: {}",
                expected, actual
            ));
        }
        (Some(expected), None) => {
            mismatches.push(format!(
                "expected error containing \"{}\", but no step failed",
                expected
            ));
        }
        _ => {}
    }

    if let Some(expected) = config.expect_goal {
        if log.goal_reached != expected {
            mismatches.push(format!(
                "goal: expected {}, got {}",
                if expected { "reached" } else { "not reached" },
                if log.goal_reached { "reached" } else { "not reached" }
            ));
        }
    }

    if let Some(expected) = &config.expect_failed {
        let mut expected = expected.clone();
        expected.sort();
        let mut actual: Vec<String> = exec
            .palette()
            .painted()
            .into_iter()
            .filter(|(_, state)| *state == BlockState::Failed)
            .map(|(block, _)| {
                sketch
                    .graph
                    .get(block)
                    .and_then(|b| b.label())
                    .map(str::to_string)
                    .unwrap_or_else(|| block.to_string())
            })
            .collect();
        actual.sort();
        if actual != expected {
            mismatches.push(format!(
                "failed blocks: expected [{}], got [{}]",
                expected.join(", "),
                actual.join(", ")
            ));
        }
    }

    mismatches
}

/// Level files under `root`, grouped by the subfolder they sit in. Files
/// directly in `root` get the empty category.
fn discover_categorized(root: &Path) -> BTreeMap<String, Vec<PathBuf>> {
    let mut categories: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    collect_tests(root, root, &mut categories);
    for files in categories.values_mut() {
        files.sort();
    }
    categories
}

fn collect_tests(dir: &Path, root: &Path, out: &mut BTreeMap<String, Vec<PathBuf>>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            collect_tests(&path, root, out);
            continue;
        }
        let is_level = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.ends_with(".test.md"));
        if is_level {
            let category = path
                .parent()
                .and_then(|p| p.strip_prefix(root).ok())
                .map(|p| p.to_string_lossy().replace('\\', "/"))
                .unwrap_or_default();
            out.entry(category).or_default().push(path);
        }
    }
}

fn category_label(category: &str) -> &str {
    if category.is_empty() { "(root)" } else { category }
}

pub fn list_categories(path: &Path) {
    if path.is_file() {
        eprintln!("(single file, no categories)");
        return;
    }

    let categories = discover_categorized(path);
    if categories.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return;
    }

    eprintln!("available categories:");
    for (category, files) in &categories {
        eprintln!("  {} ({} levels)", category_label(category), files.len());
    }
}

fn paint(text: &str, code: &str, no_color: bool) -> String {
    if no_color {
        text.to_string()
    } else {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    }
}

/// Pick the categories to run. Requested names match a category and all of
/// its subfolders.
fn select_categories<'a>(
    all: &'a BTreeMap<String, Vec<PathBuf>>,
    requested: &[String],
) -> BTreeMap<&'a str, &'a [PathBuf]> {
    if requested.is_empty() {
        return all.iter().map(|(k, v)| (k.as_str(), v.as_slice())).collect();
    }

    let mut selected = BTreeMap::new();
    for request in requested {
        let request = request.trim_matches('/');
        let prefix = format!("{}/", request);
        let before = selected.len();
        for (category, files) in all {
            if category == request || category.starts_with(&prefix) {
                selected.insert(category.as_str(), files.as_slice());
            }
        }
        if selected.len() == before {
            let available: Vec<&str> = all.keys().map(|k| category_label(k)).collect();
            eprintln!(
                "warning: category '{}' not found (available: {})",
                request,
                available.join(", ")
            );
        }
    }
    selected
}

/// Run every level file under `path` (or the single file `path`) and print a
/// report. Returns the process exit code: 0 when everything passed.
pub fn run_tests(path: &Path, no_color: bool, categories: &[String]) -> i32 {
    let discovered = if path.is_file() {
        BTreeMap::from([(String::new(), vec![path.to_path_buf()])])
    } else {
        discover_categorized(path)
    };
    if discovered.is_empty() {
        eprintln!("no .test.md files found in {}", path.display());
        return 1;
    }

    let selected = if path.is_file() {
        select_categories(&discovered, &[])
    } else {
        select_categories(&discovered, categories)
    };
    if selected.is_empty() {
        eprintln!("no matching categories found");
        return 1;
    }

    let mut passed = 0usize;
    let mut failures: Vec<TestResult> = Vec::new();

    for (category, files) in &selected {
        if !path.is_file() {
            eprintln!();
            eprintln!("{}", paint(category_label(category), "1", no_color));
        }

        for file in files.iter() {
            let result = run_single_test(file);
            let label = result.description.clone().unwrap_or_else(|| {
                file.file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("?")
                    .to_string()
            });

            match result.outcome {
                TestOutcome::Pass => {
                    passed += 1;
                    eprintln!("  {}  {}", paint("PASS", "32", no_color), label);
                }
                TestOutcome::Fail(_) => {
                    eprintln!("  {}  {}", paint("FAIL", "31", no_color), label);
                    failures.push(result);
                }
            }
        }
    }

    if !failures.is_empty() {
        eprintln!();
        eprintln!("failures:");
        for failure in &failures {
            eprintln!();
            eprintln!("  --- {} ---", failure.path.display());
            if let TestOutcome::Fail(reason) = &failure.outcome {
                for line in reason.lines() {
                    eprintln!("  {}", line);
                }
            }
        }
    }

    eprintln!();
    let failed = failures.len();
    if failed == 0 {
        eprintln!(
            "test result: {}. {} passed, 0 failed",
            paint("ok", "32", no_color),
            passed
        );
        0
    } else {
        eprintln!(
            "test result: {}. {} passed, {} failed (of {})",
            paint("FAILED", "31", no_color),
            passed,
            failed,
            passed + failed
        );
        1
    }
}
