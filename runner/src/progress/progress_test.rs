use super::{LogProgress, Progress, ProgressSink, ProgressState};

#[test]
pub fn progress_line_with_context() {
    let progress =
        Progress::parse_line("sb_0_1", "PROGRESS Running 40 Meshing: building mesh\n").unwrap();

    assert_eq!(progress.sim_id, "sb_0_1");
    assert_eq!(progress.state, ProgressState::Running);
    assert_eq!(progress.percent_complete, 40);
    assert_eq!(progress.context, "Meshing");
    assert_eq!(progress.message, "building mesh");
}

#[test]
pub fn progress_line_without_message() {
    let progress = Progress::parse_line("x", "PROGRESS completed 100").unwrap();

    assert_eq!(progress.state, ProgressState::Completed);
    assert_eq!(progress.context, "");
    assert_eq!(progress.message, "");
}

#[test]
pub fn percent_is_capped() {
    assert_eq!(
        Progress::parse_line("x", "PROGRESS running 250 solve")
            .unwrap()
            .percent_complete,
        100
    );
    assert_eq!(Progress::parse_line("x", "PROGRESS running 300 solve"), None);
}

#[test]
pub fn other_lines_are_ignored() {
    assert_eq!(Progress::parse_line("x", "starting solver"), None);
    assert_eq!(Progress::parse_line("x", "PROGRESS sleeping 10"), None);
    assert_eq!(Progress::parse_line("x", "PROGRESS"), None);
}

#[test]
pub fn solver_info_is_detected() {
    let progress =
        Progress::parse_line("x", "PROGRESS running 10 solve: SOLVERINFO iteration 4").unwrap();

    assert!(progress.is_solver_info());
}

#[test]
pub fn states_are_numbered() {
    assert_eq!(serde_yaml::to_string(&ProgressState::Warning).unwrap().trim(), "6");
    assert_eq!(
        serde_yaml::from_str::<ProgressState>("3").unwrap(),
        ProgressState::Completed
    );
    assert_eq!("ERROR".parse::<ProgressState>(), Ok(ProgressState::Error));
}

#[test]
pub fn log_sink_forgets_finished_simulations() {
    let sink = LogProgress::new();

    sink.update(&Progress::new("a", ProgressState::Running));
    sink.update(&Progress::new("b", ProgressState::Waiting));
    assert_eq!(sink.last.lock().len(), 2);

    sink.update(&Progress::new("a", ProgressState::Completed));
    let last = sink.last.lock();
    assert_eq!(last.len(), 1);
    assert_eq!(last["b"].0, ProgressState::Waiting);
}
