//! Inter-task communication channels
//!
//! Static embassy-sync primitives connecting the NFC receive task to the
//! command dispatcher.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{with_timeout, Duration};

use amulet_protocol::Frame;

/// Inbound frame queue, depth 1
///
/// The mailbox is half-duplex: while the dispatcher is busy the reader
/// side holds the window anyway, so queueing deeper than one frame only
/// delays the error the peer will see. A frame arriving while one is
/// pending is dropped.
pub static INBOUND: Channel<CriticalSectionRawMutex, Frame, 1> = Channel::new();

/// Pulsed on every ED interrupt edge, for field-activity diagnostics
pub static ED_EVENT: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Wait up to `timeout` for an inbound frame
pub async fn read_message(timeout: Duration) -> Option<Frame> {
    with_timeout(timeout, INBOUND.receive()).await.ok()
}

/// Wait up to `timeout` for NFC field activity
pub async fn wait_on_event(timeout: Duration) -> bool {
    with_timeout(timeout, ED_EVENT.wait()).await.is_ok()
}
