use super::{AbortHandle, Assignment, ExecutorError};
use crate::{
    connection::{drive, Connection},
    inputs::SimulationInput,
    progress::ProgressSink,
    study::ids::unique_id,
    summary::{Outcome, SimulationError},
};
use itertools::Itertools;
use parking_lot::FairMutex;
use rayon::ThreadPoolBuilder;
use std::{
    collections::{HashSet, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing::{debug, error, info, instrument, warn};
use tracing_unwrap::ResultExt;

type Queue = Arc<FairMutex<VecDeque<SimulationInput>>>;

/// Executor that runs simulations on a local thread pool, one worker per connection slot
#[derive(Debug)]
pub struct LocalExecutor<C: Connection> {
    connections: Vec<C>,
    assignment: Assignment,
    poll_interval: Duration,
    abort: AbortHandle,
}

impl<C: Connection> LocalExecutor<C> {
    pub fn new(connections: Vec<C>, assignment: Assignment, poll_interval: Duration) -> Self {
        Self {
            connections,
            assignment,
            poll_interval,
            abort: AbortHandle::new(),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn connections(&self) -> &[C] {
        &self.connections
    }

    /// Give inputs without an id a generated one, fail on ids used twice
    fn prepare(inputs: &mut [SimulationInput]) -> Result<(), ExecutorError> {
        let mut seen: HashSet<String> = inputs
            .iter()
            .map(|input| input.id().to_owned())
            .filter(|id| !id.is_empty())
            .collect();

        for input in inputs.iter_mut().filter(|input| input.id().is_empty()) {
            let id = unique_id(&seen, Some("sim"), None);
            seen.insert(id.clone());
            input.set_id(id);
        }

        let duplicates = inputs
            .iter()
            .map(|input| input.id())
            .duplicates()
            .map(str::to_owned)
            .collect_vec();

        if duplicates.is_empty() {
            Ok(())
        } else {
            error!(duplicates = ?duplicates, "Batch contains duplicate simulation ids");

            Err(ExecutorError::DuplicateIds(duplicates))
        }
    }

    /// one queue per connection for round robin, a single shared queue for streaming
    fn queues(&self, inputs: Vec<SimulationInput>) -> Vec<Queue> {
        match self.assignment {
            Assignment::RoundRobin => {
                let mut queues = vec![VecDeque::new(); self.connections.len()];

                for (index, input) in inputs.into_iter().enumerate() {
                    queues[index % self.connections.len()].push_back(input);
                }

                queues
                    .into_iter()
                    .map(|queue| Arc::new(FairMutex::new(queue)))
                    .collect()
            }
            Assignment::Stream => {
                let queue = Arc::new(FairMutex::new(VecDeque::from(inputs)));

                self.connections.iter().map(|_| queue.clone()).collect()
            }
        }
    }

    /// Run one simulation to its end, failures become error outcomes
    fn run_one(
        &self,
        connection: &C,
        input: &SimulationInput,
        sink: &dyn ProgressSink,
    ) -> Outcome {
        let result = connection
            .submit(input)
            .and_then(|mut operation| drive(&mut operation, self.poll_interval, sink));

        match result {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(
                    error = ?error,
                    id = %input.id(),
                    connection = %connection.name(),
                    "Simulation failed on connection: {error}"
                );

                Outcome::Error(SimulationError::new(input.clone(), error.to_string(), ""))
            }
        }
    }

    /// Run all inputs, outcomes are returned in completion order
    #[instrument(skip_all, level = "info", fields(inputs = inputs.len()))]
    pub fn execute(
        &self,
        mut inputs: Vec<SimulationInput>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<Outcome>, ExecutorError> {
        if self.connections.is_empty() {
            return Err(ExecutorError::NoConnections);
        }

        Self::prepare(&mut inputs)?;

        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let slots: usize = self
            .connections
            .iter()
            .map(|connection| connection.slots().max(1))
            .sum();

        debug!("Starting thread pool with {slots} threads");

        let pool = ThreadPoolBuilder::new().num_threads(slots).build()?;

        // general counters to provide progress
        let total = inputs.len() as u64;
        let processed = AtomicU64::new(0);
        let outcomes = Arc::new(FairMutex::new(Vec::with_capacity(inputs.len())));
        let queues = self.queues(inputs);

        pool.scope(|scope| {
            for (connection, queue) in self.connections.iter().zip(queues.iter()) {
                for slot in 0..connection.slots().max(1) {
                    let queue = queue.clone();
                    let outcomes = outcomes.clone();
                    let processed = &processed;

                    scope.spawn(move |_| loop {
                        if self.abort.is_aborted() {
                            debug!(connection = %connection.name(), slot, "Aborted, not submitting");
                            break;
                        }

                        let input = match queue.lock().pop_front() {
                            Some(input) => input,
                            None => break,
                        };

                        debug!(
                            id = %input.id(),
                            connection = %connection.name(),
                            slot,
                            "Submitting simulation"
                        );

                        let outcome = self.run_one(connection, &input, sink);
                        outcomes.lock().push(outcome);

                        info!(
                            "Done with {}/{}",
                            processed.fetch_add(1, Ordering::SeqCst) + 1,
                            total
                        );
                    });
                }
            }
        });

        let outcomes = Arc::try_unwrap(outcomes).unwrap_or_log().into_inner();

        if (outcomes.len() as u64) < total {
            warn!(
                finished = outcomes.len(),
                total, "Run aborted, remaining simulations were not submitted"
            );
        }

        info!("Done with processing");

        Ok(outcomes)
    }
}
