pub mod exec;

#[cfg(all(test, unix))]
mod exec_test;

use crate::{
    config::{ConfigErrors, ConnectionConfig},
    inputs::SimulationInput,
    progress::{Progress, ProgressSink},
    summary::Outcome,
};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Failed to spawn simulation process: {0}")]
    Spawn(std::io::Error),
    #[error("Failed to encode simulation request: {0}")]
    Encode(#[from] serde_yaml::Error),
    #[error("Failed to wait for a child process: {0}")]
    Child(#[from] std::io::Error),
    #[error("Simulation {0} is already running on this connection")]
    AlreadyRunning(String),
}

/// Result of one bounded wait on an operation
#[derive(Debug, Default)]
pub struct Poll {
    /// progress received since the previous wait
    pub progress: Vec<Progress>,
    /// set once the operation is done
    pub outcome: Option<Outcome>,
}

/// A simulation submitted to a connection, keyed by its simulation id
pub trait Operation: Send {
    fn id(&self) -> &str;

    /// Wait at most `timeout` for the operation to finish
    fn wait(&mut self, timeout: Duration) -> Result<Poll, ConnectionError>;
}

/// Remote endpoint able to run simulations, `slots` of them at the same time
pub trait Connection: Send + Sync {
    type Operation: Operation;

    fn name(&self) -> &str;

    fn slots(&self) -> usize;

    fn submit(&self, input: &SimulationInput) -> Result<Self::Operation, ConnectionError>;

    /// ids of the submitted operations that are not done yet
    fn outstanding(&self) -> Vec<String>;
}

/// Poll `operation` until it is done, forwarding progress to `sink`
pub fn drive<O: Operation>(
    operation: &mut O,
    poll_interval: Duration,
    sink: &dyn ProgressSink,
) -> Result<Outcome, ConnectionError> {
    loop {
        let poll = operation.wait(poll_interval)?;

        for progress in poll.progress.iter() {
            sink.update(progress);
        }

        if let Some(outcome) = poll.outcome {
            debug!(id = %operation.id(), error = outcome.is_error(), "Operation done");

            return Ok(outcome);
        }
    }
}

#[derive(Debug)]
pub enum Connections {
    Exec(exec::ExecConnection),
}

#[derive(Debug)]
pub enum Operations {
    Exec(exec::ExecOperation),
}

impl Connections {
    pub fn load(name: &str, config: &ConnectionConfig) -> Result<Self, ConfigErrors> {
        Ok(Self::Exec(exec::ExecConnection::load(name, config)?))
    }
}

impl Operation for Operations {
    fn id(&self) -> &str {
        match self {
            Self::Exec(operation) => operation.id(),
        }
    }

    fn wait(&mut self, timeout: Duration) -> Result<Poll, ConnectionError> {
        match self {
            Self::Exec(operation) => operation.wait(timeout),
        }
    }
}

impl Connection for Connections {
    type Operation = Operations;

    fn name(&self) -> &str {
        match self {
            Self::Exec(connection) => connection.name(),
        }
    }

    fn slots(&self) -> usize {
        match self {
            Self::Exec(connection) => connection.slots(),
        }
    }

    fn submit(&self, input: &SimulationInput) -> Result<Self::Operation, ConnectionError> {
        match self {
            Self::Exec(connection) => connection.submit(input).map(Operations::Exec),
        }
    }

    fn outstanding(&self) -> Vec<String> {
        match self {
            Self::Exec(connection) => connection.outstanding(),
        }
    }
}
