//! Board wiring types
//!
//! One NTAG 5 Link on I2C0 (SDA=GPIO4, SCL=GPIO5), its ED interrupt line
//! on GPIO6. The tag sits behind an async mutex because both the receive
//! task and the dispatcher touch the bus.

use embassy_rp::i2c::{Blocking, I2c};
use embassy_rp::peripherals::I2C0;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::Delay;

use amulet_drivers::ntag5::Ntag5;

pub type TagBus = I2c<'static, I2C0, Blocking>;
pub type Tag = Ntag5<TagBus, Delay>;
pub type TagMutex = Mutex<CriticalSectionRawMutex, Tag>;
