//! SRAM mailbox transfers
//!
//! The mailbox is the tag's 256-byte SRAM window shared between the I2C
//! host and the NFC field side. The arbiter grants one direction at a
//! time; the session CONFIG register selects which. Reading the trailer
//! block hands the window to the opposite side, so every transfer path
//! must end with exactly one trailer access.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use amulet_protocol::{Frame, FrameError, FrameReader};

use super::ndef::{split_prefix, NdefError};
use super::{mem, Block, Ntag5, Ntag5Error};

/// First block of the SRAM window
pub const SRAM_BASE: u16 = mem::SRAM_START;

/// Trailer block; reading it completes a transfer and flips arbitration
const SRAM_TRAILER: u16 = mem::SRAM_END;

/// Mailbox transfer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MailboxError {
    /// Payload exceeds the window capacity
    PayloadTooLarge,
    /// Window does not start with the frame magic
    BadMagic,
    /// Declared length exceeds the window capacity
    TooLong,
    /// Payload checksum mismatch, frame discarded
    CrcMismatch,
    /// I2C transport failed mid-transfer
    Bus(Ntag5Error),
}

impl From<FrameError> for MailboxError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::PayloadTooLarge | FrameError::BufferTooSmall => {
                MailboxError::PayloadTooLarge
            }
            FrameError::BadMagic => MailboxError::BadMagic,
            FrameError::TooLong => MailboxError::TooLong,
            FrameError::CrcMismatch => MailboxError::CrcMismatch,
        }
    }
}

impl From<Ntag5Error> for MailboxError {
    fn from(err: Ntag5Error) -> Self {
        MailboxError::Bus(err)
    }
}

/// Frame-level outcome of servicing one ED event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventStatus {
    /// A frame was drained and accepted by the queue
    Queued,
    /// A frame was drained but the queue was full; the frame is gone
    QueueFull,
    /// ED pulse without a frame behind it (arbitration noise)
    NoFrame,
}

impl<I2C: I2c, D: DelayNs> Ntag5<I2C, D> {
    /// Hand the SRAM window to the NFC side
    ///
    /// A dummy read of the trailer block tells the arbiter the host is
    /// done with the window. Must follow every host-side transfer, both
    /// after writing a response and after consuming (or rejecting) an
    /// inbound frame, or the mailbox deadlocks.
    pub fn control_switch(&mut self) -> Result<(), Ntag5Error> {
        let mut scratch: Block = [0u8; 4];
        self.read_blocks(SRAM_TRAILER, core::slice::from_mut(&mut scratch))
    }

    /// Write a framed message into the mailbox and pass it to the NFC side
    pub fn write_message(&mut self, flags: u8, payload: &[u8]) -> Result<(), MailboxError> {
        let frame = Frame::new(flags, payload).map_err(MailboxError::from)?;

        let mut blocks = [[0u8; 4]; amulet_protocol::WINDOW_BLOCKS];
        let used = frame.encode(&mut blocks)?;

        self.write_blocks(SRAM_BASE, &blocks[..used])?;
        self.control_switch()?;
        Ok(())
    }

    /// Read one framed message out of the mailbox
    ///
    /// Blocks are fetched one at a time as the frame header dictates, so a
    /// short frame costs three reads rather than a full window sweep. On
    /// any terminal outcome, valid frame or reject, the caller still owns
    /// the window and must call [`control_switch`](Self::control_switch).
    pub fn receive_frame(&mut self) -> Result<Frame, MailboxError> {
        let mut reader = FrameReader::new();
        let mut addr = SRAM_BASE;

        loop {
            let mut block: Block = [0u8; 4];
            self.read_blocks(addr, core::slice::from_mut(&mut block))?;
            addr += 1;

            if let Some(frame) = reader.feed(&block)? {
                return Ok(frame);
            }
        }
    }

    /// Service one ED event end to end
    ///
    /// Drains a frame out of the window if one is present and offers it
    /// to `enqueue`, which keeps the frame by returning `Ok` or hands it
    /// back when the queue is full. The window is returned to the NFC
    /// side and the ED interrupt acknowledged on every outcome, full
    /// queue and rejected frame included; a window left owned by the
    /// host deadlocks the peer.
    pub fn service_event<E>(&mut self, enqueue: E) -> Result<EventStatus, MailboxError>
    where
        E: FnOnce(Frame) -> Result<(), Frame>,
    {
        let status = match self.receive_frame() {
            Ok(frame) => match enqueue(frame) {
                Ok(()) => Ok(EventStatus::Queued),
                Err(_) => Ok(EventStatus::QueueFull),
            },
            Err(MailboxError::BadMagic) => Ok(EventStatus::NoFrame),
            Err(err) => Err(err),
        };

        let switch = self.control_switch();
        let clear = self.write_session_reg(
            mem::SESSION_REG_ED_INTR_CLEAR,
            mem::REG_BYTE_0,
            0x01,
            0x01,
        );

        match (status, switch.and(clear)) {
            (Ok(status), Ok(())) => Ok(status),
            (Ok(_), Err(err)) => Err(err.into()),
            (Err(err), _) => Err(err),
        }
    }

    /// Publish `url` as the tag's NDEF URI record
    ///
    /// User memory writes require the I2C-to-NFC direction while the
    /// arbiter owns the SRAM pass-through, so the direction is flipped for
    /// the duration and restored to receiving afterwards, also when the
    /// write fails partway.
    pub fn set_ndef_url(&mut self, url: &str) -> Result<(), NdefError> {
        let (prefix_code, rest) = split_prefix(url);
        self.with_host_transfer(|tag| tag.write_uri_record(prefix_code, rest))
    }

    /// Run `f` with the pass-through direction set to I2C-to-NFC
    ///
    /// Restores NFC-to-I2C before returning, regardless of the outcome of
    /// `f`. A failure while restoring takes precedence only if `f` itself
    /// succeeded.
    pub fn with_host_transfer<T, E>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<Ntag5Error>,
    {
        self.write_session_reg(
            mem::SESSION_REG_CONFIG,
            mem::REG_BYTE_1,
            mem::PT_DIR_MASK,
            mem::PT_DIR_I2C_TO_NFC,
        )?;

        let result = f(self);

        let restore = self.write_session_reg(
            mem::SESSION_REG_CONFIG,
            mem::REG_BYTE_1,
            mem::PT_DIR_MASK,
            mem::PT_DIR_NFC_TO_I2C,
        );

        match (result, restore) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(E::from(err)),
            (Err(err), _) => Err(err),
        }
    }
}
