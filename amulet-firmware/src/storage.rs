//! Flash-backed key-value store
//!
//! Uses sequential-storage for wear-leveled records in the last 64KB of
//! flash. The application's `KeyValueStore` seam is synchronous, so the
//! async flash futures are driven to completion inline with `block_on`;
//! flash traffic here is rare (key generation, programming) and small.

use embassy_futures::block_on;
use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map;

use amulet_core::traits::{KeyValueStore, StorageError, StorageKey};

/// Total flash size (2MB on the target board)
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Record partition: last 64KB of flash
const STORE_PARTITION_SIZE: usize = 64 * 1024;
const STORE_PARTITION_START: usize = FLASH_SIZE - STORE_PARTITION_SIZE;

const STORE_RANGE: core::ops::Range<u32> =
    (STORE_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Largest record: the signer config at a few hundred bytes
const VALUE_BUF: usize = 512;

pub struct FlashStore<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> FlashStore<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }
}

impl KeyValueStore for FlashStore<'_> {
    fn load(&mut self, key: StorageKey, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut data_buffer = [0u8; VALUE_BUF];

        let result = block_on(map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        ));

        match result {
            Ok(Some(data)) => {
                if buf.len() < data.len() {
                    return Err(StorageError::BufferTooSmall);
                }
                buf[..data.len()].copy_from_slice(data);
                Ok(data.len())
            }
            Ok(None) => Err(StorageError::NotFound),
            Err(_) => Err(StorageError::Io),
        }
    }

    fn save(&mut self, key: StorageKey, value: &[u8]) -> Result<(), StorageError> {
        let mut data_buffer = [0u8; VALUE_BUF];

        block_on(map::store_item(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &value,
        ))
        .map_err(|_| StorageError::Io)
    }

    fn delete(&mut self, key: StorageKey) -> Result<(), StorageError> {
        let mut data_buffer = [0u8; VALUE_BUF];

        block_on(map::remove_item(
            &mut self.flash,
            STORE_RANGE,
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        ))
        .map_err(|_| StorageError::Io)
    }
}
