use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Done,
    Exited(i32),
    Killed(i32),
}

impl JobStatus {
    /// Maps a shell-style status code (signal deaths are `128 + signal`).
    pub fn from_code(code: i32, signaled: bool) -> Self {
        match (code, signaled) {
            (_, true) => JobStatus::Killed(code - 128),
            (0, false) => JobStatus::Done,
            (code, false) => JobStatus::Exited(code),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Exited(code) => write!(f, "Exit {}", code),
            JobStatus::Killed(sig) => write!(f, "Killed (signal {})", sig),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Job {
    pub pid: u32,
    pub index: usize,
    pub command: String,
    pub status: JobStatus,
    pub is_current: bool,
    pub is_previous: bool,
}

/// `[index]<mark> <status> <command>`, the same line for `jobs` and for
/// the completion notice.
impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.is_current {
            "+"
        } else if self.is_previous {
            "-"
        } else {
            " "
        };
        write!(f, "[{}]{} {} {}", self.index, mark, self.status, self.command)
    }
}

/// Table of background jobs.
///
/// Cloning shares the table: the waiter thread of each job holds a clone so
/// it can retire the job when the process exits.
#[derive(Clone, Default)]
pub struct JobManager {
    jobs: Arc<Mutex<Vec<Job>>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_jobs(&self) -> Vec<Job> {
        self.lock().clone()
    }

    fn find_available_index(jobs: &[Job]) -> usize {
        let mut index = 1;
        while jobs.iter().any(|job| job.index == index) {
            index += 1;
        }
        index
    }

    /// Registers a freshly started job and prints `[index] pid`.
    pub fn add_job(&self, pid: u32, command: String) -> usize {
        let index = {
            let mut jobs = self.lock();
            let index = Self::find_available_index(&jobs);
            for job in jobs.iter_mut() {
                job.is_previous = job.is_current;
                job.is_current = false;
            }
            jobs.push(Job {
                pid,
                index,
                command,
                status: JobStatus::Running,
                is_current: true,
                is_previous: false,
            });
            index
        };
        debug!("job [{}] started as pid {}", index, pid);
        announce(format_args!("[{}] {}", index, pid));
        index
    }

    /// Removes a job (called from its waiter thread) and prints the
    /// completion notice.
    pub fn finish_job(&self, index: usize, status: JobStatus) -> Option<Job> {
        let mut job = self.remove_job(index)?;
        job.status = status;
        debug!("job [{}] (pid {}) finished: {}", index, job.pid, status);
        announce(format_args!("{}", job));
        Some(job)
    }

    fn remove_job(&self, index: usize) -> Option<Job> {
        let mut jobs = self.lock();
        let pos = jobs.iter().position(|job| job.index == index)?;
        let job = jobs.remove(pos);

        if job.is_current && !jobs.is_empty() {
            // promote the previous job, or the newest one if none is marked
            if let Some(prev) = jobs.iter_mut().find(|job| job.is_previous) {
                prev.is_current = true;
                prev.is_previous = false;
            } else if let Some(last) = jobs.last_mut() {
                last.is_current = true;
            }
        }
        Some(job)
    }
}

fn announce(args: fmt::Arguments<'_>) {
    let mut out = io::stdout().lock();
    if let Err(e) = writeln!(out, "{}", args).and_then(|_| out.flush()) {
        warn!("could not print job notice: {}", e);
    }
}
