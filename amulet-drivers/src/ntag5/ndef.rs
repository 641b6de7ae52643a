//! NDEF URI record writer
//!
//! Lays out a Type-5 capability container plus a single well-known URI
//! record in the tag's user memory, which is what a phone reads when it
//! taps the tag outside a mailbox exchange.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use super::{mem, Block, Ntag5, Ntag5Error, BLOCK_SIZE};

/// NFC Forum URI identifier codes (NFCForum-TS-RTD_URI_1.0)
pub mod prefix {
    pub const NONE: u8 = 0x00;
    pub const HTTP_WWW: u8 = 0x01;
    pub const HTTPS_WWW: u8 = 0x02;
    pub const HTTP: u8 = 0x03;
    pub const HTTPS: u8 = 0x04;
    pub const TEL: u8 = 0x05;
    pub const MAILTO: u8 = 0x06;
    pub const FTP_ANON: u8 = 0x07;
    pub const FTP_FTP: u8 = 0x08;
    pub const FTPS: u8 = 0x09;
    pub const SFTP: u8 = 0x0A;
    pub const SMB: u8 = 0x0B;
    pub const NFS: u8 = 0x0C;
    pub const FTP: u8 = 0x0D;
    pub const DAV: u8 = 0x0E;
    pub const NEWS: u8 = 0x0F;
    pub const TELNET: u8 = 0x10;
    pub const IMAP: u8 = 0x11;
    pub const RTSP: u8 = 0x12;
    pub const URN: u8 = 0x13;
    pub const POP: u8 = 0x14;
    pub const SIP: u8 = 0x15;
    pub const SIPS: u8 = 0x16;
    pub const TFTP: u8 = 0x17;
    pub const BTSPP: u8 = 0x18;
    pub const BTL2CAP: u8 = 0x19;
    pub const BTGOEP: u8 = 0x1A;
    pub const TCPOBEX: u8 = 0x1B;
    pub const IRDAOBEX: u8 = 0x1C;
    pub const FILE: u8 = 0x1D;
    pub const URN_EPC_ID: u8 = 0x1E;
    pub const URN_EPC_TAG: u8 = 0x1F;
    pub const URN_EPC_PAT: u8 = 0x20;
    pub const URN_EPC_RAW: u8 = 0x21;
    pub const URN_EPC: u8 = 0x22;
    pub const URN_NFC: u8 = 0x23;
}

/// Type-5 capability container: magic 0xE1, version 1.0 with free
/// read/write access, 1024 bytes of data area, no special features
const CAPABILITY_CONTAINER: Block = [0xE1, 0x40, 0x80, 0x01];

/// Block address of the capability container
const CC_ADDRESS: u16 = 0x0000;

/// First block of the NDEF TLV area
const NDEF_START_ADDRESS: u16 = 0x0001;

/// TLV tag for an NDEF message
const TLV_NDEF_MESSAGE: u8 = 0x03;

/// Record header: MB | ME | SR, TNF = well-known
const RECORD_HEADER: u8 = 0xD1;

/// Well-known type "U" (URI)
const RECORD_TYPE_URI: u8 = b'U';

/// TLV terminator
const TLV_TERMINATOR: u8 = 0xFE;

/// Longest URI (after prefix substitution) that fits the one-byte TLV
/// length: 255 minus the 5 record bytes that share the TLV value
pub const MAX_URI_LEN: usize = 250;

/// Schemes with a URI identifier code, longest match first
const PREFIX_TABLE: &[(&str, u8)] = &[
    ("https://www.", prefix::HTTPS_WWW),
    ("http://www.", prefix::HTTP_WWW),
    ("https://", prefix::HTTPS),
    ("http://", prefix::HTTP),
    ("mailto:", prefix::MAILTO),
    ("tel:", prefix::TEL),
];

/// NDEF writer errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NdefError {
    /// URI exceeds [`MAX_URI_LEN`] after prefix substitution
    UriTooLong,
    /// Underlying tag transport failed
    Tag(Ntag5Error),
}

impl From<Ntag5Error> for NdefError {
    fn from(err: Ntag5Error) -> Self {
        NdefError::Tag(err)
    }
}

/// Split a URL into its URI identifier code and remainder
///
/// Returns `(prefix::NONE, url)` when no table entry matches.
pub fn split_prefix(url: &str) -> (u8, &str) {
    for (scheme, code) in PREFIX_TABLE {
        if let Some(rest) = url.strip_prefix(scheme) {
            return (*code, rest);
        }
    }
    (prefix::NONE, url)
}

impl<I2C: I2c, D: DelayNs> Ntag5<I2C, D> {
    /// Write the capability container and a single URI record
    ///
    /// `uri` is the URI with the prefix already stripped; `prefix_code` is
    /// the matching identifier code. The record replaces whatever NDEF
    /// content was present.
    pub fn write_uri_record(&mut self, prefix_code: u8, uri: &str) -> Result<(), NdefError> {
        if uri.len() > MAX_URI_LEN {
            return Err(NdefError::UriTooLong);
        }

        self.write_blocks(CC_ADDRESS, &[CAPABILITY_CONTAINER])?;

        // TLV header and record header share the first blocks with the URI
        let header = [
            TLV_NDEF_MESSAGE,
            (uri.len() + 5) as u8,
            RECORD_HEADER,
            0x01,
            (uri.len() + 1) as u8,
            RECORD_TYPE_URI,
            prefix_code,
        ];

        let mut addr = NDEF_START_ADDRESS;
        let mut block = [0u8; BLOCK_SIZE];
        let mut fill = 0usize;

        let bytes = header
            .iter()
            .copied()
            .chain(uri.bytes())
            .chain(core::iter::once(TLV_TERMINATOR));

        for byte in bytes {
            block[fill] = byte;
            fill += 1;
            if fill == BLOCK_SIZE {
                self.write_blocks(addr, &[block])?;
                addr += 1;
                block = [0u8; BLOCK_SIZE];
                fill = 0;
            }
        }
        if fill > 0 {
            self.write_blocks(addr, &[block])?;
        }

        debug_assert!(addr <= mem::USER_MEMORY_END);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testutil::tag;
    use super::*;

    #[test]
    fn test_split_prefix_longest_match() {
        assert_eq!(
            split_prefix("https://www.example.com"),
            (prefix::HTTPS_WWW, "example.com")
        );
        assert_eq!(
            split_prefix("https://example.com"),
            (prefix::HTTPS, "example.com")
        );
        assert_eq!(
            split_prefix("http://www.example.com"),
            (prefix::HTTP_WWW, "example.com")
        );
        assert_eq!(split_prefix("tel:+1555"), (prefix::TEL, "+1555"));
        assert_eq!(
            split_prefix("geo:48.2,16.3"),
            (prefix::NONE, "geo:48.2,16.3")
        );
    }

    #[test]
    fn test_uri_record_layout() {
        let mut tag = tag();
        tag.write_uri_record(prefix::HTTPS, "ab.cd").unwrap();

        assert_eq!(tag.i2c.block(0x0000), [0xE1, 0x40, 0x80, 0x01]);

        // TLV: type 0x03, length = 5 + 5; record D1 01 06 'U' prefix
        assert_eq!(tag.i2c.block(0x0001), [0x03, 0x0A, 0xD1, 0x01]);
        assert_eq!(tag.i2c.block(0x0002), [0x06, b'U', 0x04, b'a']);
        assert_eq!(tag.i2c.block(0x0003), [b'b', b'.', b'c', b'd']);
        assert_eq!(tag.i2c.block(0x0004), [0xFE, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_uri_record_exact_block_boundary() {
        let mut tag = tag();
        // 7 header bytes + 5 uri bytes + terminator = 13 bytes, 4 blocks
        tag.write_uri_record(prefix::NONE, "abcde").unwrap();
        assert_eq!(tag.i2c.block(0x0004), [0xFE, 0x00, 0x00, 0x00]);
        assert_eq!(tag.i2c.block(0x0005), [0x00; 4]);
    }

    #[test]
    fn test_max_uri_len() {
        let mut tag = tag();
        let uri: std::string::String = core::iter::repeat('a').take(MAX_URI_LEN).collect();
        tag.write_uri_record(prefix::HTTPS, &uri).unwrap();

        // TLV length saturates the one-byte field
        assert_eq!(tag.i2c.block(0x0001)[1], 0xFF);
        // 7 + 250 bytes fill blocks 1..=65; terminator lands at 0x41 byte 1
        assert_eq!(tag.i2c.block(0x0041), [b'a', 0xFE, 0x00, 0x00]);
    }

    #[test]
    fn test_uri_too_long() {
        let mut tag = tag();
        let uri: std::string::String =
            core::iter::repeat('a').take(MAX_URI_LEN + 1).collect();
        assert_eq!(
            tag.write_uri_record(prefix::HTTPS, &uri),
            Err(NdefError::UriTooLong)
        );
        assert_eq!(tag.i2c.transactions, 0);
    }
}
