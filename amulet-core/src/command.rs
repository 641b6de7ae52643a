//! Mailbox command dispatch
//!
//! The first payload byte of an inbound frame selects the command; the
//! rest is the command argument. Replies carry `FLAG_OK` with a
//! command-specific payload, or `FLAG_ERR` with a one-byte status code.

use amulet_protocol::{Frame, FLAG_ERR, FLAG_OK};
use heapless::String;

use crate::traits::{CryptoProvider, KeyValueStore};
use crate::url_sign::{UrlSignError, UrlSigner, URL_MAX};
use crate::wallet::{Wallet, WalletError};

/// Liveness probe, echoes its argument
pub const CMD_PING: u8 = 0x01;
/// Returns the 64-byte wallet public key
pub const CMD_WALLET_PUBLIC_KEY: u8 = 0x10;
/// Signs the argument with the wallet key, returns the 64-byte signature
pub const CMD_WALLET_SIGN: u8 = 0x11;
/// Returns the 32-byte wallet seed hash, for device-to-device backup
pub const CMD_WALLET_SEED: u8 = 0x12;
/// Programs the URL signer: `[pw_len, password, base_url]`
pub const CMD_URL_PROGRAM: u8 = 0x20;
/// Resets the URL signer, argument is the password
pub const CMD_URL_RESET: u8 = 0x21;
/// Re-publishes a freshly signed URL
pub const CMD_URL_REFRESH: u8 = 0x22;

/// Error status codes carried in `FLAG_ERR` replies
pub mod status {
    pub const UNKNOWN_COMMAND: u8 = 0x01;
    pub const MALFORMED: u8 = 0x02;
    pub const NOT_PROGRAMMED: u8 = 0x20;
    pub const ALREADY_PROGRAMMED: u8 = 0x21;
    pub const BAD_PASSWORD: u8 = 0x22;
    pub const URL_TOO_LONG: u8 = 0x23;
    pub const STORAGE: u8 = 0x30;
    pub const CRYPTO: u8 = 0x31;
}

/// A parsed inbound command, borrowing the frame payload
#[derive(Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Ping(&'a [u8]),
    WalletPublicKey,
    WalletSign(&'a [u8]),
    WalletSeed,
    UrlProgram {
        password: &'a [u8],
        base_url: &'a str,
    },
    UrlReset {
        password: &'a [u8],
    },
    UrlRefresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandError {
    /// Empty payload, no opcode
    Empty,
    /// Unrecognized opcode
    Unknown(u8),
    /// Argument does not match the opcode's shape
    Malformed,
}

impl<'a> Command<'a> {
    pub fn parse(payload: &'a [u8]) -> Result<Self, CommandError> {
        let (&opcode, args) = payload.split_first().ok_or(CommandError::Empty)?;

        match opcode {
            CMD_PING => Ok(Command::Ping(args)),
            CMD_WALLET_PUBLIC_KEY => Ok(Command::WalletPublicKey),
            CMD_WALLET_SIGN => Ok(Command::WalletSign(args)),
            CMD_WALLET_SEED => Ok(Command::WalletSeed),
            CMD_URL_PROGRAM => {
                let (&pw_len, rest) = args.split_first().ok_or(CommandError::Malformed)?;
                if rest.len() < pw_len as usize {
                    return Err(CommandError::Malformed);
                }
                let (password, url_bytes) = rest.split_at(pw_len as usize);
                let base_url =
                    core::str::from_utf8(url_bytes).map_err(|_| CommandError::Malformed)?;
                if base_url.is_empty() {
                    return Err(CommandError::Malformed);
                }
                Ok(Command::UrlProgram { password, base_url })
            }
            CMD_URL_RESET => Ok(Command::UrlReset { password: args }),
            CMD_URL_REFRESH => Ok(Command::UrlRefresh),
            other => Err(CommandError::Unknown(other)),
        }
    }
}

/// Side effect a reply asks the caller to perform
///
/// Effects touch the tag outside the mailbox window, which is the
/// transport layer's business, so they travel back out of [`App::handle`]
/// instead of being performed here.
#[derive(Debug, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Publish this URL as the tag's NDEF record
    PublishUrl(String<URL_MAX>),
}

/// The device application: wallet plus URL signer behind the command set
pub struct App {
    wallet: Wallet,
    signer: UrlSigner,
}

impl App {
    /// Load both subsystems, generating keys on first boot
    pub fn open(
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
    ) -> Result<Self, AppError> {
        let wallet = Wallet::open(store, crypto)?;
        let signer = UrlSigner::open(store, crypto)?;
        Ok(Self { wallet, signer })
    }

    pub fn signer_programmed(&self) -> bool {
        self.signer.is_programmed()
    }

    /// Signed URL for publication, if the signer is programmed
    pub fn refresh_url(&mut self, crypto: &mut impl CryptoProvider) -> Option<String<URL_MAX>> {
        self.signer.generate(crypto).ok()
    }

    /// Execute one inbound frame and produce the reply
    ///
    /// Always yields a reply frame; failures become `FLAG_ERR` status
    /// frames rather than errors, because the peer is waiting either way.
    pub fn handle(
        &mut self,
        store: &mut impl KeyValueStore,
        crypto: &mut impl CryptoProvider,
        frame: &Frame,
    ) -> (Frame, Effect) {
        let command = match Command::parse(&frame.payload) {
            Ok(command) => command,
            Err(err) => return (error_reply(command_status(err)), Effect::None),
        };

        match command {
            Command::Ping(echo) => (ok_reply(echo), Effect::None),
            Command::WalletPublicKey => (ok_reply(self.wallet.public_key()), Effect::None),
            Command::WalletSign(message) => match self.wallet.sign(crypto, message) {
                Ok(signature) => (ok_reply(&signature), Effect::None),
                Err(err) => (error_reply(wallet_status(err)), Effect::None),
            },
            Command::WalletSeed => (ok_reply(&self.wallet.seed(crypto)), Effect::None),
            Command::UrlProgram { password, base_url } => {
                match self.signer.program(store, crypto, password, base_url) {
                    Ok(()) => self.reply_with_fresh_url(crypto),
                    Err(err) => (error_reply(signer_status(err)), Effect::None),
                }
            }
            Command::UrlReset { password } => {
                match self.signer.reset(store, crypto, password) {
                    Ok(()) => (ok_reply(&[]), Effect::None),
                    Err(err) => (error_reply(signer_status(err)), Effect::None),
                }
            }
            Command::UrlRefresh => match self.signer.generate(crypto) {
                Ok(url) => (ok_reply(&[]), Effect::PublishUrl(url)),
                Err(err) => (error_reply(signer_status(err)), Effect::None),
            },
        }
    }

    fn reply_with_fresh_url(&mut self, crypto: &mut impl CryptoProvider) -> (Frame, Effect) {
        match self.signer.generate(crypto) {
            Ok(url) => (ok_reply(&[]), Effect::PublishUrl(url)),
            Err(err) => (error_reply(signer_status(err)), Effect::None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppError {
    Wallet(WalletError),
    Signer(UrlSignError),
}

impl From<WalletError> for AppError {
    fn from(err: WalletError) -> Self {
        AppError::Wallet(err)
    }
}

impl From<UrlSignError> for AppError {
    fn from(err: UrlSignError) -> Self {
        AppError::Signer(err)
    }
}

/// Reply payloads never exceed the frame maximum: the largest is a ping
/// echo, one byte shorter than the inbound payload. The fallback keeps
/// the function total anyway.
fn ok_reply(payload: &[u8]) -> Frame {
    Frame::new(FLAG_OK, payload).unwrap_or_else(|_| Frame::empty(FLAG_ERR))
}

fn error_reply(status: u8) -> Frame {
    Frame::new(FLAG_ERR, &[status]).unwrap_or_else(|_| Frame::empty(FLAG_ERR))
}

fn command_status(err: CommandError) -> u8 {
    match err {
        CommandError::Empty | CommandError::Malformed => status::MALFORMED,
        CommandError::Unknown(_) => status::UNKNOWN_COMMAND,
    }
}

fn wallet_status(err: WalletError) -> u8 {
    match err {
        WalletError::AlreadyExists | WalletError::Storage(_) => status::STORAGE,
        WalletError::Crypto(_) => status::CRYPTO,
    }
}

fn signer_status(err: UrlSignError) -> u8 {
    match err {
        UrlSignError::NotProgrammed => status::NOT_PROGRAMMED,
        UrlSignError::AlreadyProgrammed => status::ALREADY_PROGRAMMED,
        UrlSignError::BadPassword => status::BAD_PASSWORD,
        UrlSignError::UrlTooLong => status::URL_TOO_LONG,
        UrlSignError::Storage(_) => status::STORAGE,
        UrlSignError::Crypto(_) => status::CRYPTO,
    }
}
