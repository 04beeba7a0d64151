//! Network Module
//!
//! Blocking TCP transport for a single job server.
//!
//! ## Architecture
//! - One `Connection` per job server, driven from one thread
//! - Socket reads append to a byte buffer; complete packets go to the
//!   client handler in arrival order
//! - Frames packed by the handler are flushed after each request and poll

mod connection;

pub use connection::Connection;
