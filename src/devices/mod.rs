// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

pub mod alarm;
pub mod inputs;
pub mod zone;
