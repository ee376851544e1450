//! Stream daemon.
//!
//! Opens the stream described by a JSON config file, logs every frame it
//! reads, and writes hex-encoded payloads read line by line from stdin.
//!
//! Usage: `mqtt-io-streamd <config.json>`, or set `MQTT_IO_STREAM_CONFIG`.

use std::io::{self, BufRead};
use std::{env, path::PathBuf, thread};

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::mpsc;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use mqtt_io_stream::config::Config;
use mqtt_io_stream::tracing::{self, prelude::*};
use mqtt_io_stream::{controller, stream};

const CONFIG_ENV: &str = "MQTT_IO_STREAM_CONFIG";

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .with_context(|| format!("usage: mqtt-io-streamd <config.json> (or set {CONFIG_ENV})"))?;
    let config = Config::load_from(&path)?;
    let mut stream = stream::build(&config.stream)?;

    let running = CancellationToken::new();
    let tracker = TaskTracker::new();
    let (write_tx, write_rx) = mpsc::channel(16);
    let (read_tx, read_rx) = mpsc::channel(16);

    let mut poller = tracker.spawn_blocking({
        let running = running.clone();
        let idle = config.poll_interval();
        move || controller::run(&mut stream, idle, write_rx, read_tx, running)
    });
    tracker.spawn(log_reads(read_rx));
    spawn_stdin_writes(write_tx);
    tracker.close();
    info!("Started.");

    let mut sigint = unix::signal(SignalKind::interrupt())?;
    let mut sigterm = unix::signal(SignalKind::terminate())?;
    let outcome = tokio::select! {
        _ = sigint.recv() => None,
        _ = sigterm.recv() => None,
        joined = &mut poller => Some(joined),
    };

    trace!("Shutting down.");
    running.cancel();
    let joined = match outcome {
        Some(joined) => joined,
        None => poller.await,
    };
    tracker.wait().await;

    joined.context("stream task panicked")??;
    info!("Exiting.");
    Ok(())
}

async fn log_reads(mut reads: mpsc::Receiver<Bytes>) {
    while let Some(frame) = reads.recv().await {
        info!(len = frame.len(), data = %hex::encode(&frame), "Read frame.");
    }
}

// Stdin is read on a plain thread: tokio's stdin blocks runtime shutdown
// until the next line arrives.
fn spawn_stdin_writes(writes: mpsc::Sender<Bytes>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Error {e} reading stdin.");
                    break;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match hex::decode(line) {
                Ok(payload) => {
                    if writes.blocking_send(Bytes::from(payload)).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("Ignoring input that is not hex: {e}"),
            }
        }
        trace!("Stdin closed.");
    });
}
