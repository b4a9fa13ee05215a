// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

pub mod channel;
pub mod serial;

use crate::error::Result;

/// Byte-level duplex link to the panel, driven from the gateway tick.
///
/// Reads never block: `None` means nothing is buffered right now.
pub trait Transport: Send {
    fn read_byte(&mut self) -> Option<u8>;

    fn write(&mut self, bytes: &[u8]) -> Result<()>;
}

pub use channel::{ChannelTransport, PanelLink};
