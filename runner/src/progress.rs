#[cfg(test)]
mod progress_test;

use parking_lot::FairMutex;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{collections::HashMap, fmt, str::FromStr};
use tracing::{debug, error, info, trace, warn};

/// Marker of solver chatter inside progress messages
const SOLVER_INFO: &str = "SOLVERINFO";

#[derive(Serialize_repr, Deserialize_repr, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProgressState {
    New = 0,
    Waiting = 1,
    Running = 2,
    Completed = 3,
    Error = 4,
    Cancelled = 5,
    Warning = 6,
}

impl ProgressState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Waiting => "Waiting",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
            Self::Warning => "Warning",
        }
    }

    /// whether no further progress follows
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for ProgressState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressState {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "new" => Ok(Self::New),
            "waiting" => Ok(Self::Waiting),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            "warning" => Ok(Self::Warning),
            other => Err(format!("Unknown progress state {other}")),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Progress {
    pub sim_id: String,
    pub state: ProgressState,
    pub percent_complete: u8,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub context: String,
}

impl Progress {
    pub fn new(sim_id: &str, state: ProgressState) -> Self {
        Self {
            sim_id: sim_id.to_owned(),
            state,
            percent_complete: 0,
            message: String::new(),
            context: String::new(),
        }
    }

    /// Parse a `PROGRESS <state> <percent> <context>: <message>` line, other lines yield `None`
    pub fn parse_line(sim_id: &str, line: &str) -> Option<Self> {
        let rest = line.trim_end().strip_prefix("PROGRESS ")?;
        let mut parts = rest.splitn(3, ' ');

        let state = parts.next()?.parse().ok()?;
        let percent_complete = parts.next()?.parse::<u8>().ok()?.min(100);
        let (context, message) = match parts.next() {
            Some(tail) => match tail.split_once(':') {
                Some((context, message)) => (context.trim(), message.trim()),
                None => (tail.trim(), ""),
            },
            None => ("", ""),
        };

        Some(Self {
            sim_id: sim_id.to_owned(),
            state,
            percent_complete,
            message: message.to_owned(),
            context: context.to_owned(),
        })
    }

    pub fn is_solver_info(&self) -> bool {
        self.message.contains(SOLVER_INFO)
    }
}

/// Receiver of progress updates, shared by all workers of a run
pub trait ProgressSink: Send + Sync {
    fn update(&self, progress: &Progress);
}

/// Sink that reports through `tracing`, state changes at info level
#[derive(Debug, Default)]
pub struct LogProgress {
    last: FairMutex<HashMap<String, (ProgressState, String)>>,
}

impl LogProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for LogProgress {
    fn update(&self, progress: &Progress) {
        if progress.is_solver_info() {
            trace!(id = %progress.sim_id, "{}", progress.message);
            return;
        }

        let changed = {
            let mut last = self.last.lock();
            let current = (progress.state, progress.context.clone());
            let changed = last.get(&progress.sim_id) != Some(&current);

            if progress.state.is_terminal() {
                last.remove(&progress.sim_id);
            } else {
                last.insert(progress.sim_id.clone(), current);
            }

            changed
        };

        match progress.state {
            ProgressState::Error => error!(
                id = %progress.sim_id,
                context = %progress.context,
                "Simulation reported an error: {}",
                progress.message
            ),
            ProgressState::Warning => warn!(
                id = %progress.sim_id,
                context = %progress.context,
                "{}",
                progress.message
            ),
            _ if changed => info!(
                id = %progress.sim_id,
                state = %progress.state,
                context = %progress.context,
                percent = progress.percent_complete,
                "Simulation progress"
            ),
            _ => debug!(
                id = %progress.sim_id,
                state = %progress.state,
                percent = progress.percent_complete,
                "Simulation progress"
            ),
        }
    }
}

/// Sink that drops every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _progress: &Progress) {}
}
