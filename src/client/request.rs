//! Job request definitions
//!
//! A submitted job and everything the server reported back about it.

use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::GearmanError;

/// A job request shared between its caller and a connection handler
pub type SharedRequest = Arc<Mutex<JobRequest>>;

/// Lifecycle of a job request
///
/// ```text
/// UNKNOWN ──submit──▶ PENDING ──JOB_CREATED──▶ CREATED ──▶ COMPLETE | FAILED
///    ▲                                            │
///    └──────────── connection lost ───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobState {
    /// Not submitted, or reset after a lost connection
    #[default]
    Unknown,

    /// Sent, waiting for the server to assign a handle
    Pending,

    /// Handle assigned, work events may arrive
    Created,

    /// Finished with a result
    Complete,

    /// Finished without a result
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Unknown => "UNKNOWN",
            JobState::Pending => "PENDING",
            JobState::Created => "CREATED",
            JobState::Complete => "COMPLETE",
            JobState::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Complete | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submission priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Priority {
    #[default]
    Normal,
    High,
    Low,
}

impl FromStr for Priority {
    type Err = GearmanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "low" => Ok(Priority::Low),
            other => Err(GearmanError::Config(format!("unknown priority: {other}"))),
        }
    }
}

/// The unit of work as the server knows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Server-assigned handle, absent until JOB_CREATED
    pub handle: Option<Bytes>,

    /// Function name the job is submitted to
    pub task: String,

    /// Client-supplied de-duplication token
    pub unique: String,

    /// Opaque job payload
    pub data: Bytes,
}

/// Last STATUS_RES reported by the server
#[derive(Debug, Clone, PartialEq)]
pub struct ServerStatus {
    pub handle: Bytes,
    pub known: bool,
    pub running: bool,
    pub numerator: f64,
    pub denominator: f64,
    pub time_received: SystemTime,
}

/// A job submission and its accumulated outcome
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub job: Job,
    pub priority: Priority,
    pub background: bool,
    pub state: JobState,

    /// WORK_DATA chunks, in arrival order
    pub data_updates: Vec<Bytes>,

    /// WORK_WARNING chunks, in arrival order
    pub warning_updates: Vec<Bytes>,

    /// WORK_STATUS (numerator, denominator) snapshots, in arrival order
    pub status_updates: Vec<(f64, f64)>,

    /// Set only on WORK_COMPLETE
    pub result: Option<Bytes>,

    /// Set on WORK_EXCEPTION; does not end the job
    pub exception: Option<Bytes>,

    pub server_status: Option<ServerStatus>,
}

impl JobRequest {
    /// Create a normal-priority foreground request
    pub fn new(task: impl Into<String>, unique: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            job: Job {
                handle: None,
                task: task.into(),
                unique: unique.into(),
                data: data.into(),
            },
            priority: Priority::Normal,
            background: false,
            state: JobState::Unknown,
            data_updates: Vec::new(),
            warning_updates: Vec::new(),
            status_updates: Vec::new(),
            result: None,
            exception: None,
            server_status: None,
        }
    }

    /// Set the submission priority
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Submit as fire-and-forget
    pub fn background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    /// Wrap for sharing with a connection handler
    pub fn shared(self) -> SharedRequest {
        Arc::new(Mutex::new(self))
    }

    pub fn handle(&self) -> Option<&Bytes> {
        self.job.handle.as_ref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Nothing more is expected from the server for this request
    ///
    /// Background jobs are done once they have a handle.
    pub fn is_complete(&self) -> bool {
        self.is_terminal() || (self.background && self.state == JobState::Created)
    }
}
