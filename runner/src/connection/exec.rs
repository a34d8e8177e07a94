use super::{Connection, ConnectionError, Operation, Poll};
use crate::{
    config::{ConfigErrors, ConnectionConfig},
    inputs::SimulationInput,
    progress::Progress,
    summary::{Outcome, SimulationError, Summary},
};
use parking_lot::FairMutex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    io::{BufRead, BufReader, Read, Write},
    path::PathBuf,
    process::{Child, Command, ExitStatus, Stdio},
    sync::{
        mpsc::{self, Receiver},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};
use tracing::{debug, error, warn};
use wait_timeout::ChildExt;

/// Argument appended to the configured parameters of every simulation process
pub const SIMULATE_COMMAND: &str = "simulate";

/// Document a simulation process writes to stdout once it is done
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Summary(Summary),
    Error { message: String },
}

/// Connection that runs every simulation as a child process.
///
/// The request is written to stdin as YAML, `PROGRESS` lines on stderr are forwarded as progress
/// and stdout carries one `Response`.
#[derive(Debug)]
pub struct ExecConnection {
    name: String,
    exec: PathBuf,
    params: Vec<String>,
    slots: usize,
    outstanding: Arc<FairMutex<BTreeSet<String>>>,
}

impl ExecConnection {
    pub fn load(name: &str, config: &ConnectionConfig) -> Result<Self, ConfigErrors> {
        if config.slots == 0 {
            error!(connection = %name, "Connections need at least one slot");

            return Err(ConfigErrors::InvalidSlots(name.to_owned()));
        }

        Ok(Self {
            name: name.to_owned(),
            exec: config.exec.clone(),
            params: config.params.clone(),
            slots: config.slots,
            outstanding: Arc::new(FairMutex::new(BTreeSet::new())),
        })
    }

    fn spawn(&self, input: &SimulationInput) -> Result<ExecOperation, ConnectionError> {
        let request = serde_yaml::to_string(input)?;
        let id = input.id().to_owned();

        let mut child = Command::new(&self.exec)
            .args(self.params.iter())
            .arg(SIMULATE_COMMAND)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(ConnectionError::Spawn)?;

        debug!(connection = %self.name, id = %id, pid = child.id(), "Spawned simulation");

        let (sender, receiver) = mpsc::channel();
        let logs = Arc::new(FairMutex::new(String::new()));

        let stderr = child.stderr.take().map(|stderr| {
            let logs = logs.clone();
            let id = id.clone();

            thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(_) => break,
                    };

                    if let Some(progress) = Progress::parse_line(&id, &line) {
                        // the operation may already be gone, progress is dropped then
                        let _ = sender.send(progress);
                    }

                    let mut logs = logs.lock();
                    logs.push_str(&line);
                    logs.push('\n');
                }
            })
        });

        let stdout = child.stdout.take().map(|mut stdout| {
            thread::spawn(move || {
                let mut output = String::new();
                stdout.read_to_string(&mut output).map(|_| output)
            })
        });

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(error) = stdin.write_all(request.as_bytes()) {
                // the exit of the process decides the outcome
                warn!(error = ?error, id = %id, "Failed to write simulation request: {error}");
            }
            // Dropping stdin closes the pipe, the process sees the end of the request
            drop(stdin);
        }

        Ok(ExecOperation {
            input: input.clone(),
            child,
            progress: receiver,
            logs,
            stdout,
            stderr,
            outstanding: self.outstanding.clone(),
            done: false,
        })
    }
}

impl Connection for ExecConnection {
    type Operation = ExecOperation;

    fn name(&self) -> &str {
        &self.name
    }

    fn slots(&self) -> usize {
        self.slots
    }

    fn submit(&self, input: &SimulationInput) -> Result<ExecOperation, ConnectionError> {
        let id = input.id().to_owned();

        if !self.outstanding.lock().insert(id.clone()) {
            return Err(ConnectionError::AlreadyRunning(id));
        }

        let operation = self.spawn(input);
        if operation.is_err() {
            self.outstanding.lock().remove(&id);
        }

        operation
    }

    fn outstanding(&self) -> Vec<String> {
        self.outstanding.lock().iter().cloned().collect()
    }
}

#[derive(Debug)]
pub struct ExecOperation {
    input: SimulationInput,
    child: Child,
    progress: Receiver<Progress>,
    logs: Arc<FairMutex<String>>,
    stdout: Option<JoinHandle<std::io::Result<String>>>,
    stderr: Option<JoinHandle<()>>,
    outstanding: Arc<FairMutex<BTreeSet<String>>>,
    done: bool,
}

impl ExecOperation {
    fn finish(&mut self, status: ExitStatus) -> Outcome {
        let stdout = match self.stdout.take().map(JoinHandle::join) {
            Some(Ok(Ok(output))) => output,
            Some(Ok(Err(error))) => {
                warn!(error = ?error, id = %self.input.id(), "Failed to read simulation output: {error}");
                String::new()
            }
            Some(Err(_)) | None => String::new(),
        };

        if let Some(stderr) = self.stderr.take() {
            if stderr.join().is_err() {
                warn!(id = %self.input.id(), "Progress reader stopped unexpectedly");
            }
        }

        let logs = self.logs.lock().clone();

        match serde_yaml::from_str::<Response>(&stdout) {
            Ok(Response::Summary(summary))
                if summary.id() == self.input.id() && summary.kind() == self.input.kind() =>
            {
                Outcome::Summary(summary)
            }
            Ok(Response::Summary(summary)) => Outcome::Error(SimulationError::new(
                self.input.clone(),
                format!(
                    "Response for {} {} does not match the submitted {} {}",
                    summary.kind(),
                    summary.id(),
                    self.input.kind(),
                    self.input.id()
                ),
                logs,
            )),
            Ok(Response::Error { message }) => {
                Outcome::Error(SimulationError::new(self.input.clone(), message, logs))
            }
            Err(error) => {
                let message = if status.success() {
                    format!("Failed to decode simulation response: {error}")
                } else {
                    format!("Simulation process exited with {status}")
                };

                Outcome::Error(SimulationError::new(self.input.clone(), message, logs))
            }
        }
    }
}

impl Operation for ExecOperation {
    fn id(&self) -> &str {
        self.input.id()
    }

    fn wait(&mut self, timeout: Duration) -> Result<Poll, ConnectionError> {
        if self.done {
            return Ok(Poll::default());
        }

        let status = self.child.wait_timeout(timeout)?;
        let mut progress: Vec<Progress> = self.progress.try_iter().collect();

        match status {
            None => Ok(Poll {
                progress,
                outcome: None,
            }),
            Some(status) => {
                debug!(id = %self.input.id(), status = ?status, "Simulation process exited");

                let outcome = self.finish(status);
                progress.extend(self.progress.try_iter());

                self.done = true;
                self.outstanding.lock().remove(self.input.id());

                Ok(Poll {
                    progress,
                    outcome: Some(outcome),
                })
            }
        }
    }
}

impl Drop for ExecOperation {
    fn drop(&mut self) {
        if !self.done {
            // the process is left running, it is only no longer tracked
            self.outstanding.lock().remove(self.input.id());
        }
    }
}
