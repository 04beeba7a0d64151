//! Protocol codec
//!
//! Packing and parsing of binary frames, plus the admin text fallback.
//!
//! ## Wire Format
//! ```text
//! ┌───────────┬───────────┬───────────┬──────────────────────────────┐
//! │ Magic (4) │ Type (4)  │  Len (4)  │  Payload (Len bytes)         │
//! └───────────┴───────────┴───────────┴──────────────────────────────┘
//! ```
//!
//! Magic is `\0REQ` for requests and `\0RES` for responses; type and length
//! are big-endian. The payload is the command's fields joined by a single NUL
//! byte. The final field is never split, so it may carry arbitrary binary
//! data including NUL bytes.
//!
//! A buffer that does not start with the expected magic is treated as an
//! admin text line (`[\w\n\r]+ ... \n`).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Arguments, CommandTable, CommandType};
use crate::error::{GearmanError, Result};

/// Header size: magic (4) + command type (4) + payload length (4)
pub const HEADER_SIZE: usize = 12;

/// Magic preamble of request frames
pub const REQ_MAGIC: [u8; 4] = *b"\0REQ";

/// Magic preamble of response frames
pub const RES_MAGIC: [u8; 4] = *b"\0RES";

/// Field separator inside a payload
pub const NULL_BYTE: u8 = 0x00;

fn magic_for(is_response: bool) -> &'static [u8; 4] {
    if is_response {
        &RES_MAGIC
    } else {
        &REQ_MAGIC
    }
}

// =============================================================================
// Decoded Items
// =============================================================================

/// A decoded binary command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Wire code of the command
    pub code: u32,

    /// Field values keyed by field name
    pub args: Arguments,
}

impl Packet {
    pub fn new(command: CommandType, args: Arguments) -> Self {
        Self {
            code: command.code(),
            args,
        }
    }

    /// Resolve the wire code to a known command type
    pub fn command_type(&self) -> Result<CommandType> {
        CommandType::try_from(self.code)
    }
}

/// Outcome of a single parse attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    /// Not enough bytes yet; retry once more have arrived
    NoData,

    /// An admin text line, whitespace-trimmed
    Admin(String),

    /// A binary command
    Command(Packet),
}

// =============================================================================
// Codec
// =============================================================================

/// Stateless frame codec over an injected command table
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    table: CommandTable,
}

impl Codec {
    /// Create a codec speaking the given command table
    pub const fn new(table: CommandTable) -> Self {
        Self { table }
    }

    /// The command table used on both pack and parse paths
    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    /// Pack a command into a complete frame
    ///
    /// The argument names must match the command's field list exactly.
    pub fn pack(&self, code: u32, args: &Arguments, is_response: bool) -> Result<Bytes> {
        let fields = self
            .table
            .fields(code)
            .ok_or(GearmanError::UnknownCommand(code))?;

        if args.len() != fields.len() || !fields.iter().all(|field| args.contains(field)) {
            return Err(GearmanError::ArgumentMismatch {
                command: code,
                expected: fields.to_vec(),
                actual: args.names().map(str::to_string).collect(),
            });
        }

        let separators = fields.len().saturating_sub(1);
        let payload_len: usize = fields
            .iter()
            .filter_map(|field| args.get(field))
            .map(Bytes::len)
            .sum::<usize>()
            + separators;
        let wire_len =
            u32::try_from(payload_len).map_err(|_| GearmanError::PayloadTooLarge(payload_len))?;

        let mut frame = BytesMut::with_capacity(HEADER_SIZE + payload_len);
        frame.put_slice(magic_for(is_response));
        frame.put_u32(code);
        frame.put_u32(wire_len);
        for (index, field) in fields.iter().enumerate() {
            if index > 0 {
                frame.put_u8(NULL_BYTE);
            }
            if let Some(value) = args.get(field) {
                frame.put_slice(value);
            }
        }

        Ok(frame.freeze())
    }

    /// Pack a known command type
    pub fn pack_command(
        &self,
        command: CommandType,
        args: &Arguments,
        is_response: bool,
    ) -> Result<Bytes> {
        self.pack(command.code(), args, is_response)
    }

    /// Parse the front of an accumulated buffer
    ///
    /// Returns the parse outcome and the number of bytes it consumed. A
    /// `NoData` outcome always consumes zero bytes, so the call can be
    /// repeated once more bytes have been appended.
    pub fn parse(&self, buffer: &[u8], is_response: bool) -> Result<(Parsed, usize)> {
        if buffer.is_empty() {
            return Ok((Parsed::NoData, 0));
        }

        let expected_magic = magic_for(is_response);

        if buffer.len() < HEADER_SIZE {
            // A partial header still counts as binary while it agrees with the magic
            let prefix = buffer.len().min(expected_magic.len());
            if buffer[..prefix] == expected_magic[..prefix] {
                return Ok((Parsed::NoData, 0));
            }
            return parse_admin(buffer);
        }

        if buffer[..4] != expected_magic[..] {
            return parse_admin(buffer);
        }

        let mut header = &buffer[4..HEADER_SIZE];
        let code = header.get_u32();
        let payload_len = header.get_u32() as usize;

        let packet_len = HEADER_SIZE
            .checked_add(payload_len)
            .ok_or(GearmanError::PayloadTooLarge(payload_len))?;
        if buffer.len() < packet_len {
            return Ok((Parsed::NoData, 0));
        }

        let fields = self
            .table
            .fields(code)
            .ok_or(GearmanError::UnknownCommand(code))?;

        let payload = Bytes::copy_from_slice(&buffer[HEADER_SIZE..packet_len]);
        let values = split_fields(payload, fields.len());
        if values.len() != fields.len() {
            return Err(GearmanError::ArgumentCountMismatch {
                command: code,
                expected: fields.len(),
                actual: values.len(),
            });
        }

        let args = fields.iter().copied().zip(values).collect();
        Ok((Parsed::Command(Packet { code, args }), packet_len))
    }

    /// Parse one item off the front of a stream buffer
    ///
    /// Consumed bytes are removed from `buffer`; `Ok(None)` means more bytes
    /// are needed and the buffer was left untouched.
    pub fn decode_next(&self, buffer: &mut BytesMut, is_response: bool) -> Result<Option<Parsed>> {
        let (parsed, consumed) = self.parse(buffer, is_response)?;
        match parsed {
            Parsed::NoData => Ok(None),
            parsed => {
                buffer.advance(consumed);
                Ok(Some(parsed))
            }
        }
    }
}

/// Split a payload into at most `count` fields
///
/// Only the first `count - 1` NUL bytes separate fields; everything after
/// them belongs to the final field.
fn split_fields(mut payload: Bytes, count: usize) -> Vec<Bytes> {
    if count == 0 {
        return Vec::new();
    }

    let mut values = Vec::with_capacity(count);
    while values.len() + 1 < count {
        match payload.iter().position(|&b| b == NULL_BYTE) {
            Some(index) => {
                values.push(payload.split_to(index));
                payload.advance(1);
            }
            None => break,
        }
    }
    values.push(payload);
    values
}

/// Word characters plus line breaks
fn is_admin_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'\n' | b'\r')
}

fn parse_admin(buffer: &[u8]) -> Result<(Parsed, usize)> {
    if !is_admin_byte(buffer[0]) {
        return Err(GearmanError::MalformedMagic);
    }

    match buffer.iter().position(|&b| b == b'\n') {
        Some(line_len) => {
            let line = String::from_utf8_lossy(&buffer[..line_len]).trim().to_string();
            Ok((Parsed::Admin(line), line_len + 1))
        }
        None => Ok((Parsed::NoData, 0)),
    }
}

// =============================================================================
// Standard Table Shortcuts
// =============================================================================

/// Pack a command using the standard command table
pub fn pack(code: u32, args: &Arguments, is_response: bool) -> Result<Bytes> {
    Codec::default().pack(code, args, is_response)
}

/// Parse a buffer using the standard command table
pub fn parse(buffer: &[u8], is_response: bool) -> Result<(Parsed, usize)> {
    Codec::default().parse(buffer, is_response)
}
