// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

//! Serial port bridge.
//!
//! The panel's COM port runs at 19200 baud, 8 data bits, no parity, 1 stop
//! bit, raw mode. Reads and writes are done by two tokio tasks connected to a
//! [`ChannelTransport`], so the gateway tick never blocks on the port.

use std::sync::Arc;

use serial2_tokio::{CharSize, FlowControl, Parity, SerialPort, Settings, StopBits};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::channel::{ChannelTransport, PanelLink};
use crate::constants::BAUD_RATE;
use crate::error::Result;

/// Open a serial port with the panel's line settings.
pub fn open(path: &str) -> Result<SerialPort> {
    info!("Opening serial port {path} at {BAUD_RATE} baud");
    let port = SerialPort::open(path, |mut settings: Settings| {
        settings.set_raw();
        settings.set_baud_rate(BAUD_RATE)?;
        settings.set_char_size(CharSize::Bits8);
        settings.set_parity(Parity::None);
        settings.set_stop_bits(StopBits::One);
        settings.set_flow_control(FlowControl::None);
        Ok(settings)
    })?;
    port.discard_buffers()?;
    Ok(port)
}

/// Connect a port to a new [`ChannelTransport`].
///
/// Returns the transport plus the reader and writer task handles. Both tasks
/// end when the port fails or the transport is dropped.
pub fn spawn_bridge(port: SerialPort) -> (ChannelTransport, JoinHandle<()>, JoinHandle<()>) {
    let (transport, link) = ChannelTransport::pair();
    let PanelLink {
        to_gateway,
        mut from_gateway,
    } = link;
    let port = Arc::new(port);

    let reader_port = Arc::clone(&port);
    let reader = tokio::spawn(async move {
        let mut buf = vec![0u8; 256];
        loop {
            match reader_port.read(&mut buf).await {
                Ok(0) => {
                    debug!("Serial reader: port closed");
                    break;
                }
                Ok(n) => {
                    if to_gateway.send(buf[..n].to_vec()).is_err() {
                        debug!("Serial reader: gateway gone");
                        break;
                    }
                }
                Err(e) => {
                    error!("Serial reader: read error: {}", e);
                    break;
                }
            }
        }
    });

    let writer = tokio::spawn(async move {
        while let Some(bytes) = from_gateway.recv().await {
            if let Err(e) = port.write_all(&bytes).await {
                error!("Serial writer: write error: {}", e);
                break;
            }
        }
        debug!("Serial writer: stopped");
    });

    (transport, reader, writer)
}
