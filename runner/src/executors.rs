pub mod local;


use crate::{
    config::{ConfigErrors, StudyConfig},
    connection::Connection,
    inputs::SimulationInput,
    progress::ProgressSink,
    summary::Outcome,
};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("No connections to run simulations on")]
    NoConnections,
    #[error("Simulation ids must be unique within a batch, duplicates: {0:?}")]
    DuplicateIds(Vec<String>),
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// How inputs are spread over connections
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Assignment {
    /// input `i` runs on connection `i mod N`
    #[default]
    RoundRobin,
    /// idle workers take the next input of a shared queue
    Stream,
}

/// Stops the submission of further simulations, running ones are not recalled
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub enum Executors<C: Connection> {
    Local(local::LocalExecutor<C>),
}

impl<C: Connection> Executors<C> {
    pub fn load(config: &StudyConfig, connections: Vec<C>) -> Result<Self, ConfigErrors> {
        if connections.is_empty() {
            return Err(ConfigErrors::NoConnections);
        }

        Ok(Self::Local(local::LocalExecutor::new(
            connections,
            config.executor.assignment,
            config.poll_interval(),
        )))
    }

    pub fn abort_handle(&self) -> AbortHandle {
        match self {
            Self::Local(executor) => executor.abort_handle(),
        }
    }

    pub fn execute(
        &self,
        inputs: Vec<SimulationInput>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Outcome>, ExecutorError> {
        match self {
            Self::Local(executor) => executor.execute(inputs, sink),
        }
    }
}
