//! Job Server Connection
//!
//! Blocking TCP transport driving a [`ClientCommandHandler`].

use std::io::{BufWriter, ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use bytes::BytesMut;

use crate::client::{ClientCommandHandler, DataEncoder, IdentityEncoder, SharedRequest};
use crate::config::Config;
use crate::error::{GearmanError, Result};
use crate::protocol::{pack_admin, AdminCommand, Codec, Parsed};

/// A single client connection to a job server
pub struct Connection<E = IdentityEncoder> {
    /// TCP stream reader
    reader: TcpStream,

    /// TCP stream writer (buffered for efficiency)
    writer: BufWriter<TcpStream>,

    /// Job state for everything submitted on this connection
    handler: ClientCommandHandler<E>,

    /// Response decoder
    codec: Codec,

    /// Received bytes not yet parsed
    buffer: BytesMut,

    config: Config,

    /// Peer address for logging
    peer_addr: String,
}

impl Connection<IdentityEncoder> {
    /// Connect with pass-through payloads
    pub fn connect(config: Config) -> Result<Self> {
        Self::connect_with_encoder(config, IdentityEncoder)
    }
}

impl<E: DataEncoder> Connection<E> {
    /// Connect with a custom payload encoder
    pub fn connect_with_encoder(config: Config, encoder: E) -> Result<Self> {
        let stream = TcpStream::connect(&config.server_addr)?;
        Self::from_stream(stream, config, ClientCommandHandler::with_encoder(encoder))
    }

    /// Wrap an already connected stream
    pub fn from_stream(
        stream: TcpStream,
        config: Config,
        mut handler: ClientCommandHandler<E>,
    ) -> Result<Self> {
        if config.read_chunk_size == 0 {
            return Err(GearmanError::Config(
                "read_chunk_size must be greater than zero".to_string(),
            ));
        }

        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;
        if config.read_timeout_ms > 0 {
            stream.set_read_timeout(Some(Duration::from_millis(config.read_timeout_ms)))?;
        }
        if config.write_timeout_ms > 0 {
            stream.set_write_timeout(Some(Duration::from_millis(config.write_timeout_ms)))?;
        }

        let read_stream = stream.try_clone()?;
        handler.on_connection_established();
        tracing::debug!("Connected to job server {}", peer_addr);

        Ok(Self {
            reader: read_stream,
            writer: BufWriter::new(stream),
            handler,
            codec: Codec::default(),
            buffer: BytesMut::with_capacity(config.read_chunk_size),
            config,
            peer_addr,
        })
    }

    // =========================================================================
    // Requests
    // =========================================================================

    /// Submit a job and flush it to the server
    pub fn submit(&mut self, request: &SharedRequest) -> Result<()> {
        self.handler.send_job_request(request)?;
        self.flush_output()
    }

    /// Request a STATUS_RES for a created job
    pub fn get_status(&mut self, request: &SharedRequest) -> Result<()> {
        self.handler.send_get_status_of_job(request)?;
        self.flush_output()
    }

    /// Block until every request is complete
    ///
    /// Foreground jobs complete on WORK_COMPLETE or WORK_FAIL, background
    /// jobs once they have a handle. A read timeout returns an `Io` error
    /// with every request still tracked, so the call can be retried.
    pub fn wait_for(&mut self, requests: &[SharedRequest]) -> Result<()> {
        while !requests.iter().all(|request| request.lock().is_complete()) {
            self.poll()?;
        }
        Ok(())
    }

    /// Read once from the socket and dispatch every complete packet
    ///
    /// Returns the number of packets handled.
    pub fn poll(&mut self) -> Result<usize> {
        self.fill_buffer()?;

        let handled = match self.dispatch_buffered() {
            Ok(handled) => handled,
            Err(e) => {
                if e.is_protocol_error() {
                    tracing::warn!("Protocol error from {}: {}", self.peer_addr, e);
                    self.handler.on_connection_error();
                }
                return Err(e);
            }
        };

        self.flush_output()?;
        Ok(handled)
    }

    fn dispatch_buffered(&mut self) -> Result<usize> {
        let mut handled = 0;
        while let Some(parsed) = self.codec.decode_next(&mut self.buffer, true)? {
            match parsed {
                Parsed::Command(packet) => {
                    self.handler.handle_packet(&packet)?;
                    handled += 1;
                }
                Parsed::Admin(line) => {
                    tracing::warn!("Ignoring admin text from {}: {:?}", self.peer_addr, line);
                }
                Parsed::NoData => break,
            }
        }
        Ok(handled)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Run an admin command and collect its response lines
    ///
    /// Listings (`status`, `workers`) end at a lone `.`; other commands
    /// answer with one line. Responses are read as raw text, so the
    /// connection must have no jobs in flight.
    pub fn admin(&mut self, command: AdminCommand) -> Result<Vec<String>> {
        let in_flight = self.handler.pending_count() + self.handler.created_count();
        if in_flight > 0 {
            return Err(GearmanError::Busy(in_flight));
        }

        self.write_frame(&pack_admin(command))?;

        let mut lines = Vec::new();
        loop {
            while let Some(line) = take_line(&mut self.buffer) {
                if !command.is_multiline() {
                    lines.push(line);
                    return Ok(lines);
                }
                if line == "." {
                    return Ok(lines);
                }
                lines.push(line);
            }
            self.fill_buffer()?;
        }
    }

    // =========================================================================
    // Socket I/O
    // =========================================================================

    fn fill_buffer(&mut self) -> Result<()> {
        if self.buffer.len() >= self.config.max_buffer_size {
            self.handler.on_connection_error();
            return Err(GearmanError::PayloadTooLarge(self.buffer.len()));
        }

        let mut chunk = vec![0u8; self.config.read_chunk_size];
        match self.reader.read(&mut chunk) {
            Ok(0) => {
                tracing::debug!("Job server {} closed the connection", self.peer_addr);
                self.handler.on_connection_lost();
                Err(GearmanError::Io(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "job server closed the connection",
                )))
            }
            Ok(n) => {
                tracing::trace!("Read {} bytes from {}", n, self.peer_addr);
                self.buffer.extend_from_slice(&chunk[..n]);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => Ok(()),
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                // The server still owns every job; keep tracking them
                tracing::debug!("Read timeout for job server {}", self.peer_addr);
                Err(e.into())
            }
            Err(e) => {
                tracing::warn!("Error reading from {}: {}", self.peer_addr, e);
                self.handler.on_connection_error();
                Err(e.into())
            }
        }
    }

    fn flush_output(&mut self) -> Result<()> {
        if !self.handler.has_output() {
            return Ok(());
        }
        let output = self.handler.take_output();
        self.write_frame(&output)
    }

    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        let result = self
            .writer
            .write_all(bytes)
            .and_then(|_| self.writer.flush());
        if let Err(e) = result {
            tracing::warn!("Error writing to {}: {}", self.peer_addr, e);
            self.handler.on_connection_error();
            return Err(e.into());
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn handler(&self) -> &ClientCommandHandler<E> {
        &self.handler
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}

/// Split one text line off the front of the buffer
fn take_line(buffer: &mut BytesMut) -> Option<String> {
    let end = buffer.iter().position(|&b| b == b'\n')?;
    let line = buffer.split_to(end + 1);
    Some(
        String::from_utf8_lossy(&line[..end])
            .trim_end_matches('\r')
            .to_string(),
    )
}
