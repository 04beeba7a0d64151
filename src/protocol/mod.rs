//! Protocol Module
//!
//! Defines the binary job protocol spoken between clients, workers and the
//! job server.
//!
//! ## Frame Format
//! ```text
//! ┌───────────┬───────────┬───────────┬──────────────────────────────┐
//! │ Magic (4) │ Type (4)  │  Len (4)  │  Payload (Len bytes)         │
//! └───────────┴───────────┴───────────┴──────────────────────────────┘
//! ```
//!
//! ### Client Commands
//! - 7/18/21/32/33/34: SUBMIT_JOB variants - Payload: func \0 unique \0 data
//! - 15: GET_STATUS - Payload: handle
//!
//! ### Server Events
//! - 8:  JOB_CREATED    - Payload: handle
//! - 12: WORK_STATUS    - Payload: handle \0 numerator \0 denominator
//! - 13: WORK_COMPLETE  - Payload: handle \0 data
//! - 14: WORK_FAIL      - Payload: handle
//! - 20: STATUS_RES     - Payload: handle \0 known \0 running \0 num \0 den
//! - 25/28/29: WORK_EXCEPTION / WORK_DATA / WORK_WARNING - Payload: handle \0 data
//!
//! ### Admin Text
//! Lines such as `status\n` or `version\n`, used when a buffer does not begin
//! with the binary magic.

mod admin;
mod args;
mod codec;
mod command;

pub use admin::{pack_admin, AdminCommand};
pub use args::Arguments;
pub use codec::{pack, parse, Codec, Packet, Parsed, HEADER_SIZE, NULL_BYTE, REQ_MAGIC, RES_MAGIC};
pub use command::{CommandSpec, CommandTable, CommandType};

/// Registered job server port
pub const DEFAULT_PORT: u16 = 4730;
