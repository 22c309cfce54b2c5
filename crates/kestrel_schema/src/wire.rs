//! Binary layer: header packing and little-endian body (de)serialization.

use crate::frames::{
    Action, ActionBody, ErrorBody, Frame, FrameBody, FrameType, Kind, Location, LogBody, Status,
    StatusBody, WireContext,
};

/// Length of the `suiteId` and `runnerId` header fields.
pub const ID_LENGTH: usize = 14;

/// Length of the fixed frame header: type byte plus two identifiers.
pub const HEADER_LENGTH: usize = 1 + 2 * ID_LENGTH;

/// Errors raised while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The header type byte does not name a known frame type.
    #[error("invalid schema type: {0}")]
    InvalidSchemaType(u8),

    /// A body enum byte is outside its defined range.
    #[error("invalid value {value} for `{field}`")]
    InvalidEnum {
        /// Name of the offending field.
        field: &'static str,
        /// The raw byte.
        value: u8,
    },

    /// The buffer ended before the field could be read.
    #[error("frame truncated while reading `{field}` at offset {offset}")]
    Truncated {
        /// Name of the field being read.
        field: &'static str,
        /// Byte offset at which the read started.
        offset: usize,
    },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid utf-8 in `{field}`")]
    InvalidString {
        /// Name of the offending field.
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Encodes a body into one wire frame, stamping the header from `ctx`.
///
/// Identifiers longer than [`ID_LENGTH`] are truncated; shorter ones are
/// NUL-padded.
pub fn encode(body: &FrameBody, ctx: &WireContext) -> Vec<u8> {
    let mut w = Writer::with_header(body.frame_type(), ctx);

    match body {
        FrameBody::Log(log) => {
            w.put_u8(log.level);
            w.put_str(&log.context);
            w.put_str(&log.timestamp);
            w.put_location(log.location);
            w.put_str(&log.description);
        }
        FrameBody::Error(error) => {
            w.put_str(&error.error);
        }
        FrameBody::Status(status) => {
            w.put_u8(status.kind as u8);
            w.put_u8(status.status as u8);
            w.put_str(&status.ancestry);
            w.put_str(&status.description);
        }
        FrameBody::Action(action) => {
            w.put_u8(action.kind as u8);
            w.put_u8(action.action as u8);
            w.put_str(&action.ancestry);
            w.put_str(&action.description);
            w.put_str(&action.errors);
            w.put_u32(action.duration);
            w.put_location(action.location);
        }
    }

    w.into_bytes()
}

/// Decodes one wire frame.
pub fn decode(bytes: &[u8]) -> Result<Frame, SchemaError> {
    let mut r = Reader::new(bytes);

    let frame_type = FrameType::from_u8(r.u8("type")?)?;
    let suite_id = r.id("suiteId")?;
    let runner_id = r.id("runnerId")?;

    let body = match frame_type {
        FrameType::Log => FrameBody::Log(LogBody {
            level: r.u8("level")?,
            context: r.str("context")?,
            timestamp: r.str("timestamp")?,
            location: r.location()?,
            description: r.str("description")?,
        }),
        FrameType::Error => FrameBody::Error(ErrorBody {
            error: r.str("error")?,
        }),
        FrameType::Status => FrameBody::Status(StatusBody {
            kind: Kind::from_u8(r.u8("kind")?)?,
            status: Status::from_u8(r.u8("status")?)?,
            ancestry: r.str("ancestry")?,
            description: r.str("description")?,
        }),
        FrameType::Action => FrameBody::Action(ActionBody {
            kind: Kind::from_u8(r.u8("kind")?)?,
            action: Action::from_u8(r.u8("action")?)?,
            ancestry: r.str("ancestry")?,
            description: r.str("description")?,
            errors: r.str("errors")?,
            duration: r.u32("duration")?,
            location: r.location()?,
        }),
    };

    Ok(Frame {
        suite_id,
        runner_id,
        body,
    })
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn with_header(frame_type: FrameType, ctx: &WireContext) -> Self {
        let mut writer = Self {
            buf: Vec::with_capacity(HEADER_LENGTH + 64),
        };
        writer.put_u8(frame_type as u8);
        writer.put_id(&ctx.suite_id);
        writer.put_id(&ctx.runner_id);
        writer
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    fn put_id(&mut self, id: &str) {
        let bytes = id.as_bytes();
        let take = bytes.len().min(ID_LENGTH);
        self.buf.extend_from_slice(&bytes[..take]);
        self.buf.extend(std::iter::repeat_n(0u8, ID_LENGTH - take));
    }

    fn put_str(&mut self, value: &str) {
        self.put_u32(value.len() as u32);
        self.buf.extend_from_slice(value.as_bytes());
    }

    fn put_location(&mut self, location: Location) {
        self.put_u32(location.line);
        self.put_u32(location.column);
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], SchemaError> {
        let end = self.offset.checked_add(len).filter(|end| *end <= self.buf.len());
        let Some(end) = end else {
            return Err(SchemaError::Truncated {
                field,
                offset: self.offset,
            });
        };
        let slice = &self.buf[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, SchemaError> {
        Ok(self.take(1, field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, SchemaError> {
        let bytes = self.take(4, field)?;
        Ok(u32::from_le_bytes(
            bytes.try_into().expect("slice has length 4"),
        ))
    }

    fn id(&mut self, field: &'static str) -> Result<String, SchemaError> {
        let bytes = self.take(ID_LENGTH, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|source| SchemaError::InvalidString { field, source })
    }

    fn str(&mut self, field: &'static str) -> Result<String, SchemaError> {
        let len = self.u32(field)? as usize;
        let bytes = self.take(len, field)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|source| SchemaError::InvalidString { field, source })
    }

    fn location(&mut self) -> Result<Location, SchemaError> {
        Ok(Location {
            line: self.u32("location.line")?,
            column: self.u32("location.column")?,
        })
    }
}
