//! Fan three telemetry streams over one socket pair and read them back.
//!
//! Run with:
//!
//! ```sh
//! cargo run --example telemetry-fanout
//! ```

use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;

use muxlane::engine::{Demultiplexer, Multiplexer, MuxConfig};
use muxlane::frame::FrameReader;
use muxlane::{run_delivery_pump, run_ticket_pump, WireInbound, WireOutbound};
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = MuxConfig::new(3).with_blocking_factor(4);

    let (data_tx, data_rx) = UnixStream::pair()?;
    let (ticket_tx, ticket_rx) = UnixStream::pair()?;
    let data_ctl = data_tx.try_clone()?;
    let ticket_ctl = ticket_tx.try_clone()?;

    let outbound = Arc::new(WireOutbound::new(data_tx, config.streams));
    let mux = Arc::new(Multiplexer::new(config.clone(), Arc::clone(&outbound))?);
    let demux = Arc::new(Demultiplexer::new(config, WireInbound::new(ticket_tx))?);

    let scheduler = {
        let mux = Arc::clone(&mux);
        thread::spawn(move || mux.run())
    };
    let delivery = {
        let demux = Arc::clone(&demux);
        thread::spawn(move || {
            let mut reader = FrameReader::new(data_rx);
            run_delivery_pump(&mut reader, &demux)
        })
    };
    let tickets = {
        let mux = Arc::clone(&mux);
        thread::spawn(move || {
            let mut reader = FrameReader::new(ticket_rx);
            run_ticket_pump(&mut reader, &mux)
        })
    };

    // Three producers, one per logical stream.
    let sensors = ["pressure", "flow", "temperature"];
    for (stream, sensor) in sensors.iter().enumerate() {
        let queue = outbound.queue(stream as u32);
        let sensor = sensor.to_string();
        thread::spawn(move || {
            for reading in 0..5 {
                queue.push(format!("{sensor} reading {reading}").into_bytes());
            }
            queue.close();
        });
    }

    // Three consumers, draining their streams to completion.
    let consumers: Vec<_> = (0..sensors.len() as u32)
        .map(|stream| {
            let demux = Arc::clone(&demux);
            thread::spawn(move || -> Result<u32, muxlane::engine::EngineError> {
                let mut count = 0;
                while let Some(payload) = demux.take(stream)? {
                    info!(stream, payload = %String::from_utf8_lossy(&payload), "received");
                    count += 1;
                }
                Ok(count)
            })
        })
        .collect();

    for (stream, consumer) in consumers.into_iter().enumerate() {
        let count = consumer.join().expect("consumer panicked")?;
        info!(stream, count, "stream drained");
    }

    scheduler.join().expect("scheduler panicked")?;

    // Close the channel write sides so the pumps see end-of-channel.
    data_ctl.shutdown(Shutdown::Write)?;
    delivery.join().expect("delivery pump panicked")?;
    ticket_ctl.shutdown(Shutdown::Write)?;
    tickets.join().expect("ticket pump panicked")?;

    let sent = mux.stats();
    let received = demux.stats();
    info!(
        frames_sent = sent.frames_sent,
        frames_received = received.frames_received,
        tickets = received.tickets_sent,
        "transfer complete"
    );
    Ok(())
}
