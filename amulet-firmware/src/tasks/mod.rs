//! Embassy tasks

mod dispatcher;
mod nfc_rx;

pub use dispatcher::dispatcher_task;
pub use nfc_rx::nfc_rx_task;
