//! Frame encoding and decoding for the SRAM mailbox.
//!
//! Frame format (4-byte blocks):
//! - Block 0: `[magic_hi, magic_lo, flags, length]`
//! - Block 1: CRC32-IEEE of the payload, little-endian
//! - Blocks 2..N: payload bytes, four per block, zero-padded in the final block
//!
//! The length field is a single byte. The protocol ceiling is therefore 255
//! even though the effective maximum is bounded by the mailbox window.

use heapless::Vec;

/// Magic pattern in the first two header bytes
pub const MAGIC: [u8; 2] = [0xE1, 0xED];

/// Size of one mailbox block in bytes, the atomic unit of bus transfer
pub const BLOCK_SIZE: usize = 4;

/// Total size of the SRAM mailbox window in bytes
pub const WINDOW_SIZE: usize = 256;

/// Mailbox window size in blocks
pub const WINDOW_BLOCKS: usize = WINDOW_SIZE / BLOCK_SIZE;

/// Header overhead: magic/flags/length block plus CRC block
pub const HEADER_BLOCKS: usize = 2;

/// Maximum payload size in bytes (window minus header and CRC)
pub const MAX_PAYLOAD_SIZE: usize = WINDOW_SIZE - HEADER_BLOCKS * BLOCK_SIZE;

/// Flag bit: request handled successfully (set by the application layer)
pub const FLAG_OK: u8 = 1 << 0;

/// Flag bit: request failed (set by the application layer)
pub const FLAG_ERR: u8 = 1 << 1;

/// One mailbox block
pub type Block = [u8; BLOCK_SIZE];

/// Errors from frame encoding or decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Payload exceeds the mailbox capacity
    PayloadTooLarge,
    /// Destination buffer has too few blocks
    BufferTooSmall,
    /// Header magic mismatch (foreign or spurious mailbox activity)
    BadMagic,
    /// Declared length exceeds the maximum payload size
    TooLong,
    /// CRC over the declared payload does not match the CRC block
    CrcMismatch,
}

/// CRC32-IEEE (reflected, poly 0xEDB88320) over `data`.
///
/// Used for transport integrity only, not security.
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ 0xEDB8_8320;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

/// A parsed or constructed mailbox frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Application flags (`FLAG_OK` / `FLAG_ERR`)
    pub flags: u8,
    /// Payload data
    pub payload: Vec<u8, MAX_PAYLOAD_SIZE>,
}

impl Frame {
    /// Create a new frame with the given flags and payload
    pub fn new(flags: u8, payload: &[u8]) -> Result<Self, FrameError> {
        let mut payload_vec = Vec::new();
        payload_vec
            .extend_from_slice(payload)
            .map_err(|_| FrameError::PayloadTooLarge)?;

        Ok(Self {
            flags,
            payload: payload_vec,
        })
    }

    /// Create a frame with no payload
    pub fn empty(flags: u8) -> Self {
        Self {
            flags,
            payload: Vec::new(),
        }
    }

    /// Number of blocks this frame occupies on the wire
    pub fn block_count(&self) -> usize {
        HEADER_BLOCKS + self.payload.len().div_ceil(BLOCK_SIZE)
    }

    /// Whether the OK flag is set
    pub fn is_ok(&self) -> bool {
        self.flags & FLAG_OK != 0
    }

    /// Whether the ERR flag is set
    pub fn is_err(&self) -> bool {
        self.flags & FLAG_ERR != 0
    }

    /// Encode this frame into a block buffer
    ///
    /// Returns the number of blocks written.
    pub fn encode(&self, blocks: &mut [Block]) -> Result<usize, FrameError> {
        let count = self.block_count();
        if blocks.len() < count {
            return Err(FrameError::BufferTooSmall);
        }

        blocks[0] = [MAGIC[0], MAGIC[1], self.flags, self.payload.len() as u8];
        blocks[1] = crc32(&self.payload).to_le_bytes();

        for (i, chunk) in self.payload.chunks(BLOCK_SIZE).enumerate() {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            blocks[HEADER_BLOCKS + i] = block;
        }

        Ok(count)
    }
}

/// State machine for parsing an inbound frame one block at a time
///
/// Every terminal outcome, validated or rejected, resets the reader back to
/// the header state; a rejected parse never carries state into the next cycle.
#[derive(Debug, Clone)]
pub struct FrameReader {
    state: ReadState,
    flags: u8,
    expected_length: usize,
    expected_crc: u32,
    buffer: Vec<u8, MAX_PAYLOAD_SIZE>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// Waiting for the magic/flags/length block
    AwaitingHeader,
    /// Waiting for the CRC block
    AwaitingCrc,
    /// Collecting payload blocks
    AwaitingPayload,
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameReader {
    /// Create a new frame reader
    pub fn new() -> Self {
        Self {
            state: ReadState::AwaitingHeader,
            flags: 0,
            expected_length: 0,
            expected_crc: 0,
            buffer: Vec::new(),
        }
    }

    /// Reset the reader state
    pub fn reset(&mut self) {
        self.state = ReadState::AwaitingHeader;
        self.flags = 0;
        self.expected_length = 0;
        self.expected_crc = 0;
        self.buffer.clear();
    }

    /// Feed a single block to the reader
    ///
    /// Returns `Ok(Some(frame))` when a complete frame validated, `Ok(None)`
    /// when more blocks are needed, or `Err` when the frame is rejected.
    pub fn feed(&mut self, block: &Block) -> Result<Option<Frame>, FrameError> {
        match self.state {
            ReadState::AwaitingHeader => {
                if block[0] != MAGIC[0] || block[1] != MAGIC[1] {
                    self.reset();
                    return Err(FrameError::BadMagic);
                }
                let length = block[3] as usize;
                if length > MAX_PAYLOAD_SIZE {
                    self.reset();
                    return Err(FrameError::TooLong);
                }
                self.flags = block[2];
                self.expected_length = length;
                self.state = ReadState::AwaitingCrc;
                Ok(None)
            }
            ReadState::AwaitingCrc => {
                self.expected_crc = u32::from_le_bytes(*block);
                if self.expected_length == 0 {
                    self.finish()
                } else {
                    self.buffer.clear();
                    self.state = ReadState::AwaitingPayload;
                    Ok(None)
                }
            }
            ReadState::AwaitingPayload => {
                let remaining = self.expected_length - self.buffer.len();
                let take = remaining.min(BLOCK_SIZE);
                // Cannot overflow: expected_length is bounded by the capacity
                let _ = self.buffer.extend_from_slice(&block[..take]);
                if self.buffer.len() == self.expected_length {
                    self.finish()
                } else {
                    Ok(None)
                }
            }
        }
    }

    /// Number of further blocks the reader needs, given what it has seen
    ///
    /// Before the header arrives this is the minimum frame size.
    pub fn blocks_remaining(&self) -> usize {
        match self.state {
            ReadState::AwaitingHeader => HEADER_BLOCKS,
            ReadState::AwaitingCrc => 1 + self.expected_length.div_ceil(BLOCK_SIZE),
            ReadState::AwaitingPayload => {
                (self.expected_length - self.buffer.len()).div_ceil(BLOCK_SIZE)
            }
        }
    }

    fn finish(&mut self) -> Result<Option<Frame>, FrameError> {
        let actual = crc32(&self.buffer);
        if actual != self.expected_crc {
            self.reset();
            return Err(FrameError::CrcMismatch);
        }

        let frame = Frame {
            flags: self.flags,
            payload: self.buffer.clone(),
        };

        self.reset();
        Ok(Some(frame))
    }
}
