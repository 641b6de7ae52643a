//! Mailbox wire protocol for the Amulet NFC tag link
//!
//! This crate defines the framed message format carried through the NTAG 5
//! Link SRAM mailbox, the ~256-byte shared-memory window arbitrated between
//! the I2C host and the NFC field side.
//!
//! # Protocol Overview
//!
//! A frame occupies consecutive 4-byte blocks at the start of the window:
//! ```text
//! ┌──────────────────────────────┬──────────────────────┬─────────────────┐
//! │ Block 0                      │ Block 1              │ Blocks 2..N     │
//! │ magic_hi magic_lo flags len  │ crc0 crc1 crc2 crc3  │ payload, padded │
//! └──────────────────────────────┴──────────────────────┴─────────────────┘
//! ```
//!
//! The CRC is CRC32-IEEE, little-endian, computed over exactly `len` payload
//! bytes and never over the zero padding of the final block. The reader on
//! either side is half-duplex and unsynchronized, so the CRC is what guards
//! a frame against a peer interleaving with an in-progress write.

#![no_std]
#![deny(unsafe_code)]

pub mod frame;

pub use frame::{
    crc32, Block, Frame, FrameError, FrameReader, BLOCK_SIZE, FLAG_ERR, FLAG_OK, MAGIC,
    MAX_PAYLOAD_SIZE, WINDOW_BLOCKS, WINDOW_SIZE,
};
