use super::{
    drive,
    exec::{ExecConnection, SIMULATE_COMMAND},
    Connection, ConnectionError, Operation,
};
use crate::{
    config::{ConfigErrors, ConnectionConfig},
    inputs::{Machine, Material, PorosityInput, SimulationInput},
    progress::{NullProgress, Progress, ProgressSink, ProgressState},
    summary::{Outcome, Summary},
};
use parking_lot::FairMutex;
use std::{fs, path::Path, time::Duration};

const POLL: Duration = Duration::from_millis(50);

/// Echoes the request back as a porosity summary
const SUMMARY_SCRIPT: &str = r#"
[ "$1" = "simulate" ] || exit 9
request=$(cat)
echo "PROGRESS Running 50 Solve: half way" >&2
echo "plain log line" >&2
echo "PROGRESS Running 60 Solve: SOLVERINFO residual 1e-3" >&2
echo "summary:"
echo "  type: porosity"
echo "  input:"
printf '%s\n' "$request" | sed 's/^/    /'
echo "  relative_density: 0.995"
"#;

const ERROR_SCRIPT: &str = r#"
cat > /dev/null
echo "error:"
echo "  message: out of licenses"
"#;

const CRASH_SCRIPT: &str = r#"
cat > /dev/null
echo "segmentation fault in solver" >&2
exit 3
"#;

const GARBAGE_SCRIPT: &str = r#"
cat > /dev/null
echo "this is: [not a response"
"#;

const MISMATCH_SCRIPT: &str = r#"
request=$(cat)
echo "summary:"
echo "  type: porosity"
echo "  input:"
printf '%s\n' "$request" | sed -e 's/^id: .*/id: someone_else/' -e 's/^/    /'
echo "  relative_density: 0.5"
"#;

const SLOW_SCRIPT: &str = r#"
cat > /dev/null
sleep 1
echo "error:"
echo "  message: slow"
"#;

#[derive(Default)]
struct Recorder(FairMutex<Vec<Progress>>);

impl ProgressSink for Recorder {
    fn update(&self, progress: &Progress) {
        self.0.lock().push(progress.clone());
    }
}

fn connection(dir: &Path, script: &str) -> ExecConnection {
    let path = dir.join("solver.sh");
    fs::write(&path, script).unwrap();

    // run through the shell, no executable bit needed
    ExecConnection::load(
        "local",
        &ConnectionConfig {
            exec: "/bin/sh".into(),
            params: vec![path.to_string_lossy().into_owned()],
            slots: 1,
        },
    )
    .unwrap()
}

fn input(id: &str) -> SimulationInput {
    PorosityInput::new(id, Material::named("IN625"), Machine::default(), [3e-3; 3])
        .unwrap()
        .into()
}

fn run(connection: &ExecConnection, input: &SimulationInput, sink: &dyn ProgressSink) -> Outcome {
    let mut operation = connection.submit(input).unwrap();
    drive(&mut operation, POLL, sink).unwrap()
}

fn error_message(outcome: Outcome) -> (String, String) {
    match outcome {
        Outcome::Error(error) => (error.message, error.logs),
        other => panic!("expected an error, got {other:?}"),
    }
}

#[test]
pub fn summary_is_returned() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), SUMMARY_SCRIPT);
    let input = input("por_0_1");
    let recorder = Recorder::default();

    let outcome = run(&connection, &input, &recorder);

    match outcome {
        Outcome::Summary(Summary::Porosity(summary)) => {
            assert_eq!(SimulationInput::from(summary.input), input);
            assert_eq!(summary.relative_density, 0.995);
        }
        other => panic!("unexpected outcome {other:?}"),
    }

    let progress = recorder.0.lock();
    assert_eq!(progress.len(), 2);
    assert_eq!(progress[0].sim_id, "por_0_1");
    assert_eq!(progress[0].state, ProgressState::Running);
    assert_eq!(progress[0].percent_complete, 50);
    assert!(progress[1].is_solver_info());
    assert!(connection.outstanding().is_empty());
}

#[test]
pub fn reported_errors_become_error_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), ERROR_SCRIPT);

    let (message, _) = error_message(run(&connection, &input("e"), &NullProgress));

    assert_eq!(message, "out of licenses");
}

#[test]
pub fn crashes_keep_the_logs() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), CRASH_SCRIPT);

    let (message, logs) = error_message(run(&connection, &input("c"), &NullProgress));

    assert!(message.contains("exited"), "{message}");
    assert!(logs.contains("segmentation fault in solver"));
}

#[test]
pub fn undecodable_output_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), GARBAGE_SCRIPT);

    let (message, _) = error_message(run(&connection, &input("g"), &NullProgress));

    assert!(message.starts_with("Failed to decode"), "{message}");
}

#[test]
pub fn responses_for_other_simulations_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), MISMATCH_SCRIPT);

    let (message, _) = error_message(run(&connection, &input("mine"), &NullProgress));

    assert!(message.contains("someone_else"), "{message}");
}

#[test]
pub fn running_ids_are_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let connection = connection(dir.path(), SLOW_SCRIPT);
    let input = input("slow");

    let mut operation = connection.submit(&input).unwrap();
    assert_eq!(connection.outstanding(), vec!["slow".to_owned()]);
    assert!(matches!(
        connection.submit(&input),
        Err(ConnectionError::AlreadyRunning(id)) if id == "slow"
    ));

    let first = operation.wait(Duration::from_millis(10)).unwrap();
    assert!(first.outcome.is_none());

    let outcome = drive(&mut operation, POLL, &NullProgress).unwrap();
    assert!(outcome.is_error());
    assert_eq!(operation.id(), "slow");
    assert!(connection.outstanding().is_empty());
}

#[test]
pub fn missing_executable_fails_to_spawn() {
    let connection = ExecConnection::load(
        "broken",
        &ConnectionConfig {
            exec: "/nonexistent/solver".into(),
            params: vec![],
            slots: 1,
        },
    )
    .unwrap();

    assert!(matches!(
        connection.submit(&input("x")),
        Err(ConnectionError::Spawn(_))
    ));
    assert!(connection.outstanding().is_empty());
}

#[test]
pub fn zero_slots_are_rejected() {
    let result = ExecConnection::load(
        "empty",
        &ConnectionConfig {
            exec: "/bin/sh".into(),
            params: vec![SIMULATE_COMMAND.to_owned()],
            slots: 0,
        },
    );

    assert!(matches!(result, Err(ConfigErrors::InvalidSlots(name)) if name == "empty"));
}
