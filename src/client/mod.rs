//! Client Module
//!
//! Job submission and per-connection job state tracking.
//!
//! ## Responsibilities
//! - Pack SUBMIT_JOB / GET_STATUS requests into the outbound buffer
//! - Correlate JOB_CREATED handles with submissions (strict FIFO)
//! - Apply work events to the owning request, enforcing legal transitions
//! - Reset tracked requests when the connection goes away
//!
//! The handler performs no I/O. A transport appends received bytes to a
//! buffer, decodes packets with the [`Codec`](crate::protocol::Codec), feeds
//! them to [`ClientCommandHandler::handle_packet`] and writes whatever
//! [`ClientCommandHandler::take_output`] returns.

mod encoder;
mod handler;
mod request;

pub use encoder::{DataEncoder, IdentityEncoder};
pub use handler::ClientCommandHandler;
pub use request::{Job, JobRequest, JobState, Priority, ServerStatus, SharedRequest};
