//! NFC receive task
//!
//! Services the tag's ED interrupt line: on every falling edge, drains
//! one frame out of the SRAM mailbox and queues it for the dispatcher.
//! The per-event work (drain, enqueue, window handback, interrupt
//! acknowledge) is the driver's `service_event`; this task only supplies
//! the wakeup and the queue.

use defmt::*;
use embassy_rp::gpio::Input;
use embassy_sync::channel::TrySendError;

use amulet_drivers::ntag5::mailbox::EventStatus;

use crate::board::TagMutex;
use crate::channels::{ED_EVENT, INBOUND};

/// NFC RX task - turns ED interrupts into inbound frames
#[embassy_executor::task]
pub async fn nfc_rx_task(mut ed: Input<'static>, tag: &'static TagMutex) {
    info!("NFC RX task started");

    loop {
        // ED line is open drain, active low
        ed.wait_for_falling_edge().await;
        ED_EVENT.signal(());

        let mut tag = tag.lock().await;

        let result = tag.service_event(|frame| {
            INBOUND.try_send(frame).map_err(|err| {
                let TrySendError::Full(frame) = err;
                frame
            })
        });

        match result {
            Ok(EventStatus::Queued) => {
                debug!("RX frame queued");
            }
            Ok(EventStatus::QueueFull) => {
                warn!("Inbound queue full, dropping frame");
            }
            // An ED pulse without a frame behind it is routine: the field
            // side also raises events for arbitration changes
            Ok(EventStatus::NoFrame) => {
                trace!("ED event without frame");
            }
            Err(e) => {
                warn!("Mailbox event service failed: {}", e);
            }
        }
    }
}
