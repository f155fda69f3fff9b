use bytes::Bytes;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Fixed header: version/direction byte, flags, u16 stream id, opcode,
/// u32 big-endian body length.
pub const HEADER_LEN: usize = 9;

const DIRECTION_BIT: u8 = 0x80;

// -----------------------------------------------------------------------------
// ----- Direction -------------------------------------------------------------

/// Which side of the proxied protocol produced a frame, derived from the
/// high bit of the version byte (clear = client-originated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub fn from_version_byte(version: u8) -> Self {
        if version & DIRECTION_BIT == 0 {
            Direction::Request
        } else {
            Direction::Response
        }
    }
}

// -----------------------------------------------------------------------------
// ----- FrameHeader -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub direction: Direction,
    pub flags: u8,
    pub stream: u16,
    pub opcode: u8,
    pub body_len: u32,
}

impl FrameHeader {
    pub fn decode(header: &[u8; HEADER_LEN]) -> Self {
        Self {
            direction: Direction::from_version_byte(header[0]),
            flags: header[1],
            stream: u16::from_be_bytes([header[2], header[3]]),
            opcode: header[4],
            body_len: u32::from_be_bytes([header[5], header[6], header[7], header[8]]),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Frame -----------------------------------------------------------------

/// One complete unit of the proxied wire protocol: the fixed header plus the
/// body it declared. `bytes` always holds the full frame, so forwarding a
/// frame is a verbatim copy of what was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub direction: Direction,
    pub stream: u16,
    pub opcode: u8,
    bytes: Bytes,
}

impl Frame {
    pub fn new(header: FrameHeader, bytes: Bytes) -> Self {
        debug_assert_eq!(bytes.len(), HEADER_LEN + header.body_len as usize);

        Self {
            direction: header.direction,
            stream: header.stream,
            opcode: header.opcode,
            bytes,
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.bytes[HEADER_LEN..]
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
