//! Hardware driver implementations
//!
//! This crate provides the driver for the NXP NTAG 5 Link tag controller,
//! the passive NFC IC that carries the Amulet message channel:
//!
//! - Partitioned register/block transport over I2C
//! - Session register access (masked volatile updates)
//! - NDEF URI record writer
//! - SRAM mailbox read/write paths
//!
//! The driver is generic over `embedded-hal` 1.0 `I2c` and `DelayNs`, so it
//! runs unchanged against the RP2040 bus in firmware and a fake bus in host
//! tests.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod ntag5;
