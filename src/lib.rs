//! # gearwire
//!
//! Client side of the Gearman binary job protocol:
//! - Frame codec with admin text fallback, safe for partial reads and
//!   binary payloads containing NUL bytes
//! - Client job state machine correlating handle-less submissions with
//!   server handles in strict FIFO order
//! - Blocking TCP connection for a single job server
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Caller (JobRequest)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ submit / get_status
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                ClientCommandHandler                          │
//! │   awaiting-handle FIFO  │  handle → request map              │
//! └──────────┬──────────────────────────────────▲───────────────┘
//!            │ pack                             │ handle_packet
//!            ▼                                  │
//!   ┌─────────────┐                     ┌───────┴─────┐
//!   │    Codec    │                     │    Codec    │
//!   │   (pack)    │                     │   (parse)   │
//!   └──────┬──────┘                     └───────▲─────┘
//!          │                                    │
//!          ▼                                    │
//! ┌─────────────────────────────────────────────┴───────────────┐
//! │                 Connection (TCP, byte buffer)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod client;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{GearmanError, Result};
pub use config::Config;
pub use client::{ClientCommandHandler, JobRequest, JobState, Priority, SharedRequest};
pub use network::Connection;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of gearwire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
