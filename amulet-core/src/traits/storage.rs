//! Persistent key-value storage seam
//!
//! Records are postcard-encoded by their owners; the store only moves
//! opaque bytes. Keys are a closed set so a store implementation can
//! size its buffers for the worst case.

/// Well-known record identifiers
///
/// The numeric values are stable; they name flash records and must not
/// be reused for new record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageKey {
    /// URL signer keypair
    SignerKeys = 0x0B01,
    /// URL signer configuration
    SignerConfig = 0x0B02,
    /// Wallet keypair
    Wallet = 0x2B01,
}

impl StorageKey {
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0x0B01 => Some(StorageKey::SignerKeys),
            0x0B02 => Some(StorageKey::SignerConfig),
            0x2B01 => Some(StorageKey::Wallet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// No record under this key
    NotFound,
    /// Backend I/O failure
    Io,
    /// Caller buffer too small for the stored record
    BufferTooSmall,
    /// Record present but undecodable
    Corrupted,
}

/// Byte-oriented record store
pub trait KeyValueStore {
    /// Load a record into `buf`, returning the record length
    fn load(&mut self, key: StorageKey, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn save(&mut self, key: StorageKey, value: &[u8]) -> Result<(), StorageError>;

    /// Remove a record; removing an absent record is not an error
    fn delete(&mut self, key: StorageKey) -> Result<(), StorageError>;
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        if buffer.len() < 2 {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        buffer[..2].copy_from_slice(&self.as_u16().to_le_bytes());
        Ok(2)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        if buffer.len() < 2 {
            return Err(sequential_storage::map::SerializationError::BufferTooSmall);
        }
        let raw = u16::from_le_bytes([buffer[0], buffer[1]]);
        let key = StorageKey::from_u16(raw)
            .ok_or(sequential_storage::map::SerializationError::InvalidFormat)?;
        Ok((key, 2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_codes_roundtrip() {
        for key in [
            StorageKey::SignerKeys,
            StorageKey::SignerConfig,
            StorageKey::Wallet,
        ] {
            assert_eq!(StorageKey::from_u16(key.as_u16()), Some(key));
        }
        assert_eq!(StorageKey::from_u16(0x0000), None);
        assert_eq!(StorageKey::from_u16(0xFFFF), None);
    }
}
