//! Bounded pool of worker processes for batch precompilation
//!
//! Workers speak a line protocol: the pool writes `kind\tpath` to a worker's
//! stdin and waits for `ok` or `fail\t<message>` on its stdout before handing
//! it the next job. Closing the job channel closes every worker's stdin, which
//! is the worker's signal to exit once its current job is done.

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::cache::store::ArtifactKind;

/// One file to precompile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

impl Job {
    pub fn new(kind: ArtifactKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Wire form: `kind\tpath`
    pub fn to_line(&self) -> String {
        format!("{}\t{}", self.kind, self.path.display())
    }

    pub fn parse_line(line: &str) -> Option<Self> {
        let (kind, path) = line.trim_end_matches(['\r', '\n']).split_once('\t')?;
        if path.is_empty() {
            return None;
        }
        Some(Self::new(kind.parse().ok()?, path))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job: Job,
    pub ok: bool,
    pub message: Option<String>,
}

/// Everything a pool did, returned by [`WorkerPool::shutdown`]
#[derive(Debug, Default)]
pub struct PoolReport {
    pub outcomes: Vec<JobOutcome>,
    /// First non-zero worker exit status, if any
    pub exit_status: Option<i32>,
}

impl PoolReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.ok).count()
    }

    pub fn is_success(&self) -> bool {
        self.failures() == 0 && self.exit_status.is_none()
    }
}

type InlineRun<'a> = Box<dyn FnMut(&Job) -> Result<(), String> + 'a>;

pub enum WorkerPool<'a> {
    /// Runs each job on the calling thread as it is pushed
    Inline {
        run: InlineRun<'a>,
        outcomes: Vec<JobOutcome>,
    },
    Processes {
        sender: Option<SyncSender<Job>>,
        feeders: Vec<JoinHandle<()>>,
        children: Vec<Child>,
        outcomes: Arc<Mutex<Vec<JobOutcome>>>,
    },
}

impl<'a> WorkerPool<'a> {
    pub fn inline(run: impl FnMut(&Job) -> Result<(), String> + 'a) -> Self {
        WorkerPool::Inline {
            run: Box::new(run),
            outcomes: Vec::new(),
        }
    }

    /// Start `size` workers from `command` (stdin/stdout are piped by the pool)
    pub fn spawn(size: usize, command: impl Fn() -> Command) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel::<Job>(size.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let outcomes = Arc::new(Mutex::new(Vec::new()));

        let mut children = Vec::with_capacity(size);
        let mut feeders = Vec::with_capacity(size);
        for id in 0..size {
            let (child, stdin, stdout) = match start_worker(&command) {
                Ok(parts) => parts,
                Err(err) => {
                    reap(sender, feeders, children);
                    return Err(err);
                }
            };
            let receiver = Arc::clone(&receiver);
            let outcomes = Arc::clone(&outcomes);
            feeders.push(thread::spawn(move || feed(id, stdin, stdout, &receiver, &outcomes)));
            children.push(child);
        }

        tracing::debug!(target: "prewarm::precompile", workers = size, "worker pool started");
        Ok(WorkerPool::Processes {
            sender: Some(sender),
            feeders,
            children,
            outcomes,
        })
    }

    /// Create a pool: inline when `size` is zero, otherwise `size` worker processes
    pub fn create(
        size: usize,
        command: impl Fn() -> Command,
        inline: impl FnMut(&Job) -> Result<(), String> + 'a,
    ) -> io::Result<Self> {
        if size == 0 {
            Ok(Self::inline(inline))
        } else {
            Self::spawn(size, command)
        }
    }

    /// Queue a job; blocks while every worker is busy and the queue is full
    pub fn push(&mut self, job: Job) -> io::Result<()> {
        match self {
            WorkerPool::Inline { run, outcomes } => {
                let result = run(&job);
                outcomes.push(JobOutcome {
                    ok: result.is_ok(),
                    message: result.err(),
                    job,
                });
                Ok(())
            }
            WorkerPool::Processes { sender, .. } => {
                let Some(sender) = sender else {
                    return Err(io::Error::other("worker pool is shut down"));
                };
                sender
                    .send(job)
                    .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "all workers exited"))
            }
        }
    }

    /// Close the queue, wait for every worker and collect outcomes
    pub fn shutdown(self) -> PoolReport {
        match self {
            WorkerPool::Inline { outcomes, .. } => PoolReport {
                outcomes,
                exit_status: None,
            },
            WorkerPool::Processes {
                sender,
                feeders,
                children,
                outcomes,
            } => {
                drop(sender);
                for feeder in feeders {
                    let _ = feeder.join();
                }

                let mut exit_status = None;
                for mut child in children {
                    match child.wait() {
                        Ok(status) if status.success() => {}
                        Ok(status) => {
                            tracing::debug!(target: "prewarm::precompile", %status, "worker exited unsuccessfully");
                            exit_status.get_or_insert(status.code().unwrap_or(1));
                        }
                        Err(err) => {
                            tracing::warn!(target: "prewarm::precompile", error = %err, "failed to wait for worker");
                            exit_status.get_or_insert(1);
                        }
                    }
                }

                let outcomes = match Arc::try_unwrap(outcomes) {
                    Ok(mutex) => mutex.into_inner().unwrap_or_else(|e| e.into_inner()),
                    Err(shared) => shared.lock().unwrap_or_else(|e| e.into_inner()).clone(),
                };
                PoolReport {
                    outcomes,
                    exit_status,
                }
            }
        }
    }
}

fn start_worker(command: &impl Fn() -> Command) -> io::Result<(Child, ChildStdin, ChildStdout)> {
    let mut child = command()
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()?;
    match (child.stdin.take(), child.stdout.take()) {
        (Some(stdin), Some(stdout)) => Ok((child, stdin, stdout)),
        _ => {
            let _ = child.kill();
            let _ = child.wait();
            Err(io::Error::other("worker pipes unavailable"))
        }
    }
}

/// Stop a partially started pool: close the queue so every feeder drops its
/// worker's stdin, then wait for the workers to exit.
fn reap(sender: SyncSender<Job>, feeders: Vec<JoinHandle<()>>, children: Vec<Child>) {
    drop(sender);
    for feeder in feeders {
        let _ = feeder.join();
    }
    for mut child in children {
        if let Err(err) = child.wait() {
            tracing::warn!(target: "prewarm::precompile", error = %err, "failed to wait for worker");
        }
    }
}

/// Per-worker dispatcher: pull a job, send it, wait for the ack
fn feed(
    id: usize,
    mut stdin: ChildStdin,
    stdout: ChildStdout,
    receiver: &Mutex<Receiver<Job>>,
    outcomes: &Mutex<Vec<JobOutcome>>,
) {
    let mut acks = BufReader::new(stdout);
    loop {
        let job = {
            let receiver = receiver.lock().unwrap_or_else(|e| e.into_inner());
            match receiver.recv() {
                Ok(job) => job,
                Err(_) => break,
            }
        };

        let outcome = match exchange(&mut stdin, &mut acks, &job) {
            Ok(ack) => parse_ack(job, &ack),
            Err(err) => {
                tracing::warn!(
                    target: "prewarm::precompile",
                    worker = id,
                    error = %err,
                    "lost contact with worker"
                );
                let outcome = JobOutcome {
                    job,
                    ok: false,
                    message: Some(format!("worker {id} exited: {err}")),
                };
                outcomes.lock().unwrap_or_else(|e| e.into_inner()).push(outcome);
                // This worker is gone; leave the remaining jobs to the others.
                return;
            }
        };
        outcomes.lock().unwrap_or_else(|e| e.into_inner()).push(outcome);
    }
    // Dropping stdin here tells the worker to exit.
}

fn exchange(stdin: &mut ChildStdin, acks: &mut impl BufRead, job: &Job) -> io::Result<String> {
    writeln!(stdin, "{}", job.to_line())?;
    stdin.flush()?;
    let mut ack = String::new();
    if acks.read_line(&mut ack)? == 0 {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no acknowledgement"));
    }
    Ok(ack)
}

fn parse_ack(job: Job, ack: &str) -> JobOutcome {
    let ack = ack.trim_end_matches(['\r', '\n']);
    let (status, message) = match ack.split_once('\t') {
        Some((status, message)) => (status, Some(message.to_string())),
        None => (ack, None),
    };
    JobOutcome {
        job,
        ok: status == "ok",
        message,
    }
}

/// Worker side of the protocol: handle jobs from `input` until it closes.
///
/// Returns whether every job succeeded.
pub fn work_loop(
    input: impl BufRead,
    mut output: impl Write,
    mut handle: impl FnMut(&Job) -> Result<(), String>,
) -> io::Result<bool> {
    let mut all_ok = true;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = match Job::parse_line(&line) {
            Some(job) => handle(&job),
            None => Err(format!("malformed job: {line}")),
        };
        match result {
            Ok(()) => writeln!(output, "ok")?,
            Err(message) => {
                all_ok = false;
                writeln!(output, "fail\t{}", message.replace(['\n', '\r', '\t'], " "))?;
            }
        }
        output.flush()?;
    }
    Ok(all_ok)
}
