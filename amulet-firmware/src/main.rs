//! Amulet - NFC Tag-Link Firmware
//!
//! Firmware binary for RP2040 boards carrying an NXP NTAG 5 Link.
//! Bridges the tag's SRAM mailbox to the on-device wallet and URL
//! signer, and keeps the tag's NDEF record pointing at a freshly
//! signed URL.

#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_rp::gpio::{Input, Pull};
use embassy_rp::i2c::{Config as I2cConfig, I2c};
use embassy_sync::mutex::Mutex;
use embassy_time::{Delay, Duration, Timer};
use static_cell::StaticCell;
use {defmt_rtt as _, panic_probe as _};

use amulet_drivers::ntag5::Ntag5;

use crate::board::TagMutex;
use crate::crypto::SoftCrypto;
use crate::storage::FlashStore;

mod board;
mod channels;
mod crypto;
mod storage;
mod tasks;

// The tag mutex must live forever for task references
static TAG: StaticCell<TagMutex> = StaticCell::new();

/// Main entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Amulet firmware starting...");

    // Initialize RP2040 peripherals
    let p = embassy_rp::init(Default::default());
    info!("Peripherals initialized");

    // Setup I2C0 for the tag (SDA=GPIO4, SCL=GPIO5)
    let i2c = I2c::new_blocking(p.I2C0, p.PIN_5, p.PIN_4, I2cConfig::default());
    let mut tag = Ntag5::new(i2c, Delay);

    // Let the tag finish power-up before the first transaction
    Timer::after_millis(100).await;

    match tag.configure() {
        Ok(()) => info!("Tag configured, mailbox armed"),
        Err(e) => error!("Tag configuration failed: {}", e),
    }

    let tag: &'static TagMutex = TAG.init(Mutex::new(tag));

    // ED interrupt line (open drain, active low)
    let ed = Input::new(p.PIN_6, Pull::Up);

    let store = FlashStore::new(p.FLASH, p.DMA_CH0);
    let crypto = SoftCrypto::new();

    // Spawn tasks
    spawner.spawn(tasks::nfc_rx_task(ed, tag)).unwrap();
    spawner
        .spawn(tasks::dispatcher_task(tag, store, crypto))
        .unwrap();

    info!("All tasks spawned, firmware running");

    // Main task doubles as a field-activity heartbeat
    loop {
        if channels::wait_on_event(Duration::from_secs(1)).await {
            trace!("NFC field activity");
        }
    }
}
