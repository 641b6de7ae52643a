//! Command dispatcher task
//!
//! Owns the application state. Pulls inbound frames off the queue, runs
//! them through the command layer, writes the reply into the mailbox and
//! performs any NDEF publication the reply asks for.

use defmt::*;
use embassy_time::Duration;

use amulet_core::command::{App, Effect};

use crate::board::TagMutex;
use crate::channels::read_message;
use crate::crypto::SoftCrypto;
use crate::storage::FlashStore;

/// Idle poll interval when no frames arrive
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Dispatcher task - application logic behind the mailbox
#[embassy_executor::task]
pub async fn dispatcher_task(
    tag: &'static TagMutex,
    mut store: FlashStore<'static>,
    mut crypto: SoftCrypto,
) {
    info!("Dispatcher task started");

    let mut app = match App::open(&mut store, &mut crypto) {
        Ok(app) => app,
        Err(e) => {
            error!("Application state unrecoverable: {}", e);
            return;
        }
    };
    info!("Application opened, signer programmed: {}", app.signer_programmed());

    // A programmed signer publishes a fresh URL on boot, so a tap works
    // before the first mailbox exchange
    if app.signer_programmed() {
        if let Some(url) = app.refresh_url(&mut crypto) {
            publish_url(tag, &url).await;
        }
    }

    loop {
        let Some(frame) = read_message(IDLE_TIMEOUT).await else {
            trace!("Dispatcher idle");
            continue;
        };

        let (reply, effect) = app.handle(&mut store, &mut crypto, &frame);

        {
            let mut tag = tag.lock().await;
            if let Err(e) = tag.write_message(reply.flags, &reply.payload) {
                warn!("Reply write failed: {}", e);
            }
        }

        if let Effect::PublishUrl(url) = effect {
            publish_url(tag, &url).await;
        }
    }
}

async fn publish_url(tag: &'static TagMutex, url: &str) {
    let mut tag = tag.lock().await;
    match tag.set_ndef_url(url) {
        Ok(()) => info!("Published URL, {} bytes", url.len()),
        Err(e) => warn!("NDEF publish failed: {}", e),
    }
}
