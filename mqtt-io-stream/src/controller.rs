//! Stream lifecycle driver.
//!
//! Runs one [`Stream`] from setup to cleanup: payloads arriving on a
//! channel are written between polls, and every frame read is forwarded
//! on another channel. The loop is synchronous, because streams are, and
//! is meant to sit on a blocking thread (e.g. `spawn_blocking`) next to
//! async code that owns the other ends of the channels.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::Stream;
use crate::tracing::prelude::*;

/// Open `stream`, poll it until `running` is cancelled or the read
/// receiver goes away, then clean it up.
///
/// Only setup failures are returned. Write failures are reported and the
/// loop carries on; cleanup failures are reported and ignored.
pub fn run<S: Stream>(
    stream: &mut S,
    idle_interval: Duration,
    mut writes: mpsc::Receiver<Bytes>,
    reads: mpsc::Sender<Bytes>,
    running: CancellationToken,
) -> Result<()> {
    stream.setup()?;
    trace!("Polling started.");

    let mut writes_open = true;
    while !running.is_cancelled() {
        while writes_open {
            match writes.try_recv() {
                Ok(data) => {
                    if let Err(e) = stream.write(data) {
                        error!("Dropping payload: {e}");
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Write channel closed.");
                    writes_open = false;
                }
            }
        }

        match stream.read() {
            Some(frame) => {
                if reads.blocking_send(frame).is_err() {
                    debug!("Read channel closed, stopping.");
                    break;
                }
            }
            None => thread::sleep(idle_interval),
        }
    }

    trace!("Polling stopped.");
    if let Err(e) = stream.cleanup() {
        warn!("Ignoring cleanup failure: {e}");
    }
    Ok(())
}
