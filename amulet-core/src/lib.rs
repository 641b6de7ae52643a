//! Application logic for the Amulet tag link
//!
//! Everything in this crate is hardware-independent: the wallet and URL
//! signer run against the [`traits::CryptoProvider`] and
//! [`traits::KeyValueStore`] seams, and [`command`] turns inbound mailbox
//! frames into replies. The firmware crate supplies the real flash store
//! and crypto provider; host tests supply fakes.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod command;
pub mod traits;
pub mod url_sign;
pub mod wallet;
