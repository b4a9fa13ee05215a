// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use std::collections::VecDeque;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::Transport;
use crate::error::{BridgeError, Result};

/// Gateway side of an in-memory byte link.
///
/// The other side is a [`PanelLink`], held either by the serial port tasks
/// or by a test playing the panel.
#[derive(Debug)]
pub struct ChannelTransport {
    rx: UnboundedReceiver<Vec<u8>>,
    tx: UnboundedSender<Vec<u8>>,
    pending: VecDeque<u8>,
}

/// Panel side of an in-memory byte link.
#[derive(Debug)]
pub struct PanelLink {
    pub to_gateway: UnboundedSender<Vec<u8>>,
    pub from_gateway: UnboundedReceiver<Vec<u8>>,
}

impl ChannelTransport {
    /// Create a connected transport and panel link.
    pub fn pair() -> (Self, PanelLink) {
        let (to_gateway, rx) = mpsc::unbounded_channel();
        let (tx, from_gateway) = mpsc::unbounded_channel();
        (
            Self {
                rx,
                tx,
                pending: VecDeque::new(),
            },
            PanelLink {
                to_gateway,
                from_gateway,
            },
        )
    }
}

impl Transport for ChannelTransport {
    fn read_byte(&mut self) -> Option<u8> {
        while self.pending.is_empty() {
            let chunk = self.rx.try_recv().ok()?;
            self.pending.extend(chunk);
        }
        self.pending.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.tx
            .send(bytes.to_vec())
            .map_err(|_| BridgeError::ChannelClosed)
    }
}

impl PanelLink {
    /// Deliver bytes to the gateway.
    pub fn send(&self, bytes: &[u8]) -> Result<()> {
        self.to_gateway
            .send(bytes.to_vec())
            .map_err(|_| BridgeError::ChannelClosed)
    }

    /// Everything the gateway has written so far, one entry per write.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let mut writes = Vec::new();
        while let Ok(chunk) = self.from_gateway.try_recv() {
            writes.push(chunk);
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_flow_both_ways() {
        let (mut transport, mut panel) = ChannelTransport::pair();
        assert_eq!(transport.read_byte(), None);

        panel.send(b"ab").unwrap();
        panel.send(b"c").unwrap();
        assert_eq!(transport.read_byte(), Some(b'a'));
        assert_eq!(transport.read_byte(), Some(b'b'));
        assert_eq!(transport.read_byte(), Some(b'c'));
        assert_eq!(transport.read_byte(), None);

        transport.write(b"KEYR\r\n").unwrap();
        assert_eq!(panel.drain(), vec![b"KEYR\r\n".to_vec()]);
    }

    #[test]
    fn test_write_after_panel_dropped() {
        let (mut transport, panel) = ChannelTransport::pair();
        drop(panel);
        assert!(matches!(transport.write(b"x"), Err(BridgeError::ChannelClosed)));
    }
}
