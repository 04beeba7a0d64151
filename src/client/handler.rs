//! Client command handler
//!
//! Per-connection job tracking for a client.
//!
//! ## Handle Correlation
//! SUBMIT_JOB carries no correlation id, and JOB_CREATED carries only the new
//! handle. Submissions therefore wait in a FIFO queue and each JOB_CREATED is
//! matched to the oldest one. This only holds on an ordered, reliable byte
//! stream such as TCP; a reordering transport would bind handles to the wrong
//! requests and nothing here can detect it.
//!
//! ## Concurrency
//! The handler is not synchronized. One task per connection drives
//! parse → `handle_packet` in the order bytes arrive.

use std::collections::{HashMap, VecDeque};
use std::time::SystemTime;

use bytes::{Bytes, BytesMut};

use super::{DataEncoder, IdentityEncoder, JobRequest, JobState, ServerStatus, SharedRequest};
use crate::error::{GearmanError, Result};
use crate::protocol::{Arguments, Codec, CommandType, Packet};

/// Tracks the jobs submitted over one connection
pub struct ClientCommandHandler<E = IdentityEncoder> {
    /// Frame codec (requests out, responses in)
    codec: Codec,

    /// Payload strategy for job data and results
    encoder: E,

    /// Submitted requests still waiting for JOB_CREATED, oldest first
    requests_awaiting_handles: VecDeque<SharedRequest>,

    /// Requests that have a server handle
    handle_to_request: HashMap<Bytes, SharedRequest>,

    /// Packed frames not yet taken by the transport
    output: BytesMut,
}

impl ClientCommandHandler<IdentityEncoder> {
    /// Create a handler with pass-through payloads
    pub fn new() -> Self {
        Self::with_encoder(IdentityEncoder)
    }
}

impl Default for ClientCommandHandler<IdentityEncoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DataEncoder> ClientCommandHandler<E> {
    /// Create a handler with a custom payload encoder
    pub fn with_encoder(encoder: E) -> Self {
        Self::with_codec(Codec::default(), encoder)
    }

    /// Create a handler with a custom codec and payload encoder
    pub fn with_codec(codec: Codec, encoder: E) -> Self {
        Self {
            codec,
            encoder,
            requests_awaiting_handles: VecDeque::new(),
            handle_to_request: HashMap::new(),
            output: BytesMut::new(),
        }
    }

    // =========================================================================
    // Outbound
    // =========================================================================

    /// Submit a job request
    ///
    /// The request must be in UNKNOWN; it moves to PENDING and joins the
    /// back of the awaiting-handle queue.
    pub fn send_job_request(&mut self, request: &SharedRequest) -> Result<()> {
        let mut current = request.lock();
        assert_state(&current, JobState::Unknown)?;

        let command = CommandType::submit_for(current.priority, current.background);
        let data = self.encoder.encode(current.job.data.clone())?;
        let args = Arguments::new()
            .with("func", current.job.task.clone())
            .with("unique", current.job.unique.clone())
            .with("data", data);
        self.send_command(command, &args)?;

        current.state = JobState::Pending;
        drop(current);

        self.requests_awaiting_handles.push_back(request.clone());
        Ok(())
    }

    /// Ask the server for the status of an already created job
    pub fn send_get_status_of_job(&mut self, request: &SharedRequest) -> Result<()> {
        let handle = {
            let current = request.lock();
            current
                .job
                .handle
                .clone()
                .ok_or_else(|| {
                    GearmanError::invalid_state(None, JobState::Created, Some(current.state))
                })?
        };

        let args = Arguments::new().with("handle", handle);
        self.send_command(CommandType::GetStatus, &args)
    }

    fn send_command(&mut self, command: CommandType, args: &Arguments) -> Result<()> {
        let frame = self.codec.pack_command(command, args, false)?;
        tracing::trace!("Queued {} ({} bytes)", command, frame.len());
        self.output.extend_from_slice(&frame);
        Ok(())
    }

    /// Take every frame packed since the last call
    pub fn take_output(&mut self) -> Bytes {
        self.output.split().freeze()
    }

    pub fn has_output(&self) -> bool {
        !self.output.is_empty()
    }

    // =========================================================================
    // Connection Lifecycle
    // =========================================================================

    pub fn on_connection_established(&mut self) {
        tracing::debug!("Connection established");
    }

    pub fn on_connection_lost(&mut self) {
        self.on_connection_error();
    }

    /// Reset every tracked request to UNKNOWN and forget them
    ///
    /// Owners must resubmit; handles from the old connection mean nothing on
    /// a new one.
    pub fn on_connection_error(&mut self) {
        let pending = self.requests_awaiting_handles.len();
        let inflight = self.handle_to_request.len();

        for request in self.requests_awaiting_handles.drain(..) {
            request.lock().state = JobState::Unknown;
        }
        for (_, request) in self.handle_to_request.drain() {
            request.lock().state = JobState::Unknown;
        }
        self.output.clear();

        if pending + inflight > 0 {
            tracing::warn!(
                "Connection lost: reset {} pending and {} in-flight requests",
                pending,
                inflight
            );
        }
    }

    // =========================================================================
    // Inbound Dispatch
    // =========================================================================

    /// Route a decoded response packet to its callback
    ///
    /// Returns `Ok(true)` once the event has been consumed.
    pub fn handle_packet(&mut self, packet: &Packet) -> Result<bool> {
        let command = packet.command_type()?;
        let args = &packet.args;
        tracing::trace!("Received {}", command);

        match command {
            CommandType::JobCreated => self.recv_job_created(args.get_or_empty("handle")),
            CommandType::WorkData => {
                self.recv_work_data(&args.get_or_empty("handle"), args.get_or_empty("data"))
            }
            CommandType::WorkWarning => {
                self.recv_work_warning(&args.get_or_empty("handle"), args.get_or_empty("data"))
            }
            CommandType::WorkStatus => self.recv_work_status(
                &args.get_or_empty("handle"),
                &args.get_or_empty("numerator"),
                &args.get_or_empty("denominator"),
            ),
            CommandType::WorkComplete => {
                self.recv_work_complete(&args.get_or_empty("handle"), args.get_or_empty("data"))
            }
            CommandType::WorkFail => self.recv_work_fail(&args.get_or_empty("handle")),
            CommandType::WorkException => {
                self.recv_work_exception(&args.get_or_empty("handle"), args.get_or_empty("data"))
            }
            CommandType::StatusRes => self.recv_status_res(
                &args.get_or_empty("handle"),
                &args.get_or_empty("known"),
                &args.get_or_empty("running"),
                &args.get_or_empty("numerator"),
                &args.get_or_empty("denominator"),
            ),
            CommandType::EchoRes | CommandType::OptionRes => {
                tracing::debug!("Ignoring {} on client connection", command);
                Ok(true)
            }
            CommandType::Error => Err(GearmanError::Server {
                code: args.get_str("err_code").unwrap_or_default(),
                text: args.get_str("err_text").unwrap_or_default(),
            }),
            other => Err(GearmanError::UnexpectedCommand(other.name())),
        }
    }

    // =========================================================================
    // Command Callbacks
    // =========================================================================

    /// Bind a new handle to the oldest pending request
    pub fn recv_job_created(&mut self, handle: Bytes) -> Result<bool> {
        let request = self
            .requests_awaiting_handles
            .pop_front()
            .ok_or_else(|| {
                GearmanError::invalid_state(Some(&handle[..]), JobState::Pending, None)
            })?;

        let mut current = request.lock();
        assert_state(&current, JobState::Pending)?;

        current.job.handle = Some(handle.clone());
        current.state = JobState::Created;
        drop(current);

        tracing::debug!("Job created: {}", String::from_utf8_lossy(&handle));
        self.handle_to_request.insert(handle, request);
        Ok(true)
    }

    pub fn recv_work_data(&mut self, handle: &[u8], data: Bytes) -> Result<bool> {
        let data = self.encoder.decode(data)?;
        self.with_created(handle, |request| {
            request.data_updates.push(data);
            Ok(true)
        })
    }

    pub fn recv_work_warning(&mut self, handle: &[u8], data: Bytes) -> Result<bool> {
        let data = self.encoder.decode(data)?;
        self.with_created(handle, |request| {
            request.warning_updates.push(data);
            Ok(true)
        })
    }

    /// Record a progress snapshot
    ///
    /// The protocol leaves the numeric type open, so both parts parse as f64.
    pub fn recv_work_status(
        &mut self,
        handle: &[u8],
        numerator: &[u8],
        denominator: &[u8],
    ) -> Result<bool> {
        self.with_created(handle, |request| {
            let status = (
                parse_float("numerator", numerator)?,
                parse_float("denominator", denominator)?,
            );
            request.status_updates.push(status);
            Ok(true)
        })
    }

    pub fn recv_work_complete(&mut self, handle: &[u8], data: Bytes) -> Result<bool> {
        let data = self.encoder.decode(data)?;
        self.with_created(handle, |request| {
            request.result = Some(data);
            request.state = JobState::Complete;
            tracing::debug!("Job complete: {}", String::from_utf8_lossy(handle));
            Ok(true)
        })
    }

    pub fn recv_work_fail(&mut self, handle: &[u8]) -> Result<bool> {
        self.with_created(handle, |request| {
            request.state = JobState::Failed;
            tracing::debug!("Job failed: {}", String::from_utf8_lossy(handle));
            Ok(true)
        })
    }

    /// Store an exception payload; the job stays CREATED
    pub fn recv_work_exception(&mut self, handle: &[u8], data: Bytes) -> Result<bool> {
        let data = self.encoder.decode(data)?;
        self.with_created(handle, |request| {
            request.exception = Some(data);
            Ok(true)
        })
    }

    /// Replace the server status snapshot
    ///
    /// `known`/`running` are true only for the literal `1`.
    pub fn recv_status_res(
        &mut self,
        handle: &[u8],
        known: &[u8],
        running: &[u8],
        numerator: &[u8],
        denominator: &[u8],
    ) -> Result<bool> {
        self.with_created(handle, |request| {
            request.server_status = Some(ServerStatus {
                handle: Bytes::copy_from_slice(handle),
                known: known == b"1",
                running: running == b"1",
                numerator: parse_float("numerator", numerator)?,
                denominator: parse_float("denominator", denominator)?,
                time_received: SystemTime::now(),
            });
            Ok(true)
        })
    }

    fn with_created<T>(
        &self,
        handle: &[u8],
        update: impl FnOnce(&mut JobRequest) -> Result<T>,
    ) -> Result<T> {
        let request = self
            .handle_to_request
            .get(handle)
            .ok_or_else(|| {
                GearmanError::UnknownHandle(String::from_utf8_lossy(handle).into_owned())
            })?;

        let mut current = request.lock();
        assert_state(&current, JobState::Created)?;
        update(&mut *current)
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Requests still waiting for JOB_CREATED
    pub fn pending_count(&self) -> usize {
        self.requests_awaiting_handles.len()
    }

    /// Requests bound to a handle
    pub fn created_count(&self) -> usize {
        self.handle_to_request.len()
    }

    pub fn request_for_handle(&self, handle: &[u8]) -> Option<SharedRequest> {
        self.handle_to_request.get(handle).cloned()
    }
}

fn assert_state(request: &JobRequest, expected: JobState) -> Result<()> {
    if request.state != expected {
        return Err(GearmanError::invalid_state(
            request.handle().map(|h| &h[..]),
            expected,
            Some(request.state),
        ));
    }
    Ok(())
}

fn parse_float(field: &'static str, raw: &[u8]) -> Result<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|text| text.trim().parse::<f64>().ok())
        .ok_or_else(|| GearmanError::InvalidNumber {
            field,
            value: String::from_utf8_lossy(raw).into_owned(),
        })
}
