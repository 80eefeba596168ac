//! RPC extended buffer framing.
//!
//! A ROP buffer travels as one or more chunks, each an 8-byte header
//! followed by its payload:
//!
//! ```text
//! +---------+--------+--------+------------+
//! | version | flags  |  size  | size_actual|
//! | 2 bytes |2 bytes |2 bytes |  2 bytes   |
//! +---------+--------+--------+------------+
//! | RopSize | ROPs ...      | handle table |
//! | 2 bytes | RopSize - 2   | u32 each     |
//! +---------+---------------+--------------+
//! ```
//!
//! All integers are little-endian. Requests are a single chunk flagged
//! `LAST`; responses may chain chunks until one is flagged `LAST`.

use crate::error::ProtocolError;
use crate::wire::Reader;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Size of `RPC_HEADER_EXT`.
pub const RPC_HEADER_EXT_SIZE: usize = 8;

/// Byte every payload byte is XORed with when obfuscated.
pub const XOR_MAGIC: u8 = 0xA5;

/// Offset of the first RopId in a single-chunk buffer.
pub const FIRST_ROP_OFFSET: usize = RPC_HEADER_EXT_SIZE + 2;

const MAX_CHUNK_PAYLOAD: usize = u16::MAX as usize;

/// `RPC_HEADER_EXT` flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderFlags(u16);

impl HeaderFlags {
    /// Payload is LZ77 compressed.
    pub const COMPRESSED: u16 = 0x0001;
    /// Payload is XORed with [`XOR_MAGIC`].
    pub const XOR_MAGIC: u16 = 0x0002;
    /// Final chunk of the buffer.
    pub const LAST: u16 = 0x0004;

    const VALID_MASK: u16 = 0x0007;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_xor_magic(mut self) -> Self {
        self.0 |= Self::XOR_MAGIC;
        self
    }

    pub fn with_last(mut self) -> Self {
        self.0 |= Self::LAST;
        self
    }

    pub fn is_compressed(&self) -> bool {
        self.0 & Self::COMPRESSED != 0
    }

    pub fn has_xor_magic(&self) -> bool {
        self.0 & Self::XOR_MAGIC != 0
    }

    pub fn is_last(&self) -> bool {
        self.0 & Self::LAST != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }

    fn without_xor_magic(self) -> Self {
        Self(self.0 & !Self::XOR_MAGIC)
    }
}

/// A parsed `RPC_HEADER_EXT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcHeaderExt {
    pub version: u16,
    pub flags: HeaderFlags,
    pub size: u16,
    pub size_actual: u16,
}

impl RpcHeaderExt {
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.flags.bits());
        buf.put_u16_le(self.size);
        buf.put_u16_le(self.size_actual);
    }

    pub fn decode(src: &mut Reader) -> Result<Self, ProtocolError> {
        let version = src.u16("RPC_HEADER_EXT.Version")?;
        if version != 0 {
            return Err(ProtocolError::InvalidHeader(format!(
                "unsupported version {}",
                version
            )));
        }
        let flags = HeaderFlags::from_bits(src.u16("RPC_HEADER_EXT.Flags")?)?;
        let size = src.u16("RPC_HEADER_EXT.Size")?;
        let size_actual = src.u16("RPC_HEADER_EXT.SizeActual")?;
        Ok(Self {
            version,
            flags,
            size,
            size_actual,
        })
    }
}

/// Contents of one chunk: ROP bytes and the Server Object handle table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RopPayload {
    pub rops: Bytes,
    pub handles: Vec<u32>,
}

impl RopPayload {
    pub fn new(rops: impl Into<Bytes>, handles: Vec<u32>) -> Self {
        Self {
            rops: rops.into(),
            handles,
        }
    }

    /// Length of the payload once framed.
    pub fn encoded_len(&self) -> usize {
        2 + self.rops.len() + 4 * self.handles.len()
    }

    /// Writes header and payload. The payload is XORed if `flags` asks for it.
    pub fn frame(&self, flags: HeaderFlags, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if flags.is_compressed() {
            return Err(ProtocolError::CompressedPayload);
        }
        let rop_size = 2 + self.rops.len();
        if rop_size > MAX_CHUNK_PAYLOAD {
            return Err(ProtocolError::TooLarge {
                what: "ROP section",
                size: rop_size,
                max: MAX_CHUNK_PAYLOAD,
            });
        }
        let size = self.encoded_len();
        if size > MAX_CHUNK_PAYLOAD {
            return Err(ProtocolError::TooLarge {
                what: "RPC payload",
                size,
                max: MAX_CHUNK_PAYLOAD,
            });
        }

        buf.reserve(RPC_HEADER_EXT_SIZE + size);
        RpcHeaderExt {
            version: 0,
            flags,
            size: size as u16,
            size_actual: size as u16,
        }
        .encode(buf);

        let start = buf.len();
        buf.put_u16_le(rop_size as u16);
        buf.put_slice(&self.rops);
        for handle in &self.handles {
            buf.put_u32_le(*handle);
        }
        if flags.has_xor_magic() {
            xor_in_place(&mut buf[start..]);
        }
        Ok(())
    }

    fn parse(payload: Bytes) -> Result<Self, ProtocolError> {
        let size = payload.len();
        let mut src = Reader::new(payload);
        let rop_size = src.u16("RopSize")? as usize;
        if rop_size < 2 || rop_size > size {
            return Err(ProtocolError::InvalidHeader(format!(
                "RopSize {} outside payload of {} bytes",
                rop_size, size
            )));
        }
        let rops = src.bytes(rop_size - 2, "ROPs")?;
        let table_len = src.remaining();
        if table_len % 4 != 0 {
            return Err(ProtocolError::InvalidHandleTable(table_len));
        }
        let handles = (0..table_len / 4)
            .map(|_| src.u32("ServerObjectHandle"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rops, handles })
    }
}

/// A decoded chunk. XOR obfuscation is already undone and its flag cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub header: RpcHeaderExt,
    pub payload: RopPayload,
}

fn xor_in_place(bytes: &mut [u8]) {
    for byte in bytes {
        *byte ^= XOR_MAGIC;
    }
}

/// Frames a request: one chunk, flagged `LAST`.
pub fn frame_request(payload: &RopPayload, xor_magic: bool) -> Result<BytesMut, ProtocolError> {
    let mut flags = HeaderFlags::new().with_last();
    if xor_magic {
        flags = flags.with_xor_magic();
    }
    let mut buf = BytesMut::with_capacity(RPC_HEADER_EXT_SIZE + payload.encoded_len());
    payload.frame(flags, &mut buf)?;
    Ok(buf)
}

/// Frames response chunks; only the final one is flagged `LAST`.
pub fn frame_response(chunks: &[RopPayload], xor_magic: bool) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let mut flags = HeaderFlags::new();
        if xor_magic {
            flags = flags.with_xor_magic();
        }
        if i + 1 == chunks.len() {
            flags = flags.with_last();
        }
        chunk.frame(flags, &mut buf)?;
    }
    Ok(buf)
}

/// Parses chunks up to and including the first flagged `LAST`.
///
/// Bytes after that chunk are not examined. Running out of input before a
/// `LAST` chunk is a truncation error.
pub fn parse_chunks(buf: Bytes) -> Result<Vec<Chunk>, ProtocolError> {
    let mut src = Reader::new(buf);
    let mut chunks = Vec::new();
    loop {
        let mut header = RpcHeaderExt::decode(&mut src)?;
        if header.flags.is_compressed() {
            return Err(ProtocolError::CompressedPayload);
        }
        if header.size != header.size_actual {
            return Err(ProtocolError::InvalidHeader(format!(
                "Size {} differs from SizeActual {} on an uncompressed payload",
                header.size, header.size_actual
            )));
        }
        let mut payload = src.bytes(header.size as usize, "RPC payload")?;
        if header.flags.has_xor_magic() {
            let mut plain = payload.to_vec();
            xor_in_place(&mut plain);
            payload = Bytes::from(plain);
            header.flags = header.flags.without_xor_magic();
        }
        let last = header.flags.is_last();
        chunks.push(Chunk {
            header,
            payload: RopPayload::parse(payload)?,
        });
        if last {
            return Ok(chunks);
        }
    }
}

/// Parses a request buffer, which must be exactly one `LAST` chunk.
pub fn parse_request(buf: Bytes) -> Result<Chunk, ProtocolError> {
    let total = buf.len();
    let mut chunks = parse_chunks(buf)?;
    let consumed: usize = chunks
        .iter()
        .map(|chunk| RPC_HEADER_EXT_SIZE + chunk.header.size as usize)
        .sum();
    if chunks.len() != 1 {
        return Err(ProtocolError::InvalidHeader(format!(
            "request spans {} chunks",
            chunks.len()
        )));
    }
    if consumed != total {
        return Err(ProtocolError::TrailingBytes(total - consumed));
    }
    chunks
        .pop()
        .ok_or_else(|| ProtocolError::InvalidHeader("empty request".into()))
}
