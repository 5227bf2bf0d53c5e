// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory register bank behaving like a USART, for tests.
//!
//! Every access is recorded in [`SimulatedBackend::trace`].

use crate::ErrorMask;
use crate::backend::Backend;
use crate::hw::registers::{UCSRA, UCSRB, offsets};
use std::collections::VecDeque;
use std::vec::Vec;

/// A single register access.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Access {
    Read(usize, u8),
    Write(usize, u8),
    Read16(usize, u16),
    Write16(usize, u16),
}

impl Access {
    pub const fn offset(self) -> usize {
        match self {
            Self::Read(offset, _)
            | Self::Write(offset, _)
            | Self::Read16(offset, _)
            | Self::Write16(offset, _) => offset,
        }
    }

    pub const fn is_write(self) -> bool {
        matches!(self, Self::Write(..) | Self::Write16(..))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedBackend {
    registers: [u8; offsets::MAX],
    /// Bytes the remote sent to us, with the errors the hardware flags them
    /// with.
    pub rx: VecDeque<(u8, ErrorMask)>,
    /// Bytes written to the data register.
    pub tx: Vec<u8>,
    /// Whether the transmit buffer accepts data.
    pub tx_busy: bool,
    pub trace: Vec<Access>,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes without errors.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().map(|&byte| (byte, ErrorMask::NONE)));
    }

    /// Sets a register without recording an access.
    pub fn poke(&mut self, offset: usize, value: u8) {
        self.registers[offset] = value;
    }

    /// Reads a register without recording an access.
    pub fn peek(&self, offset: usize) -> u8 {
        self.registers[offset]
    }

    pub fn writes(&self) -> Vec<Access> {
        self.trace.iter().copied().filter(|a| a.is_write()).collect()
    }

    fn ucsrb(&self) -> UCSRB {
        UCSRB::from_bits_retain(self.registers[offsets::UCSRB])
    }

    fn ucsra(&self) -> UCSRA {
        let mut ucsra = UCSRA::from_bits_retain(self.registers[offsets::UCSRA])
            & (UCSRA::DOUBLE_SPEED | UCSRA::MULTI_PROCESSOR);
        ucsra.set(UCSRA::DATA_REGISTER_EMPTY, !self.tx_busy);
        let pending = self
            .rx
            .front()
            .filter(|_| self.ucsrb().contains(UCSRB::RX_ENABLE));
        if let Some(&(_, errors)) = pending {
            ucsra |= UCSRA::RX_COMPLETE;
            ucsra |= UCSRA::from_bits_truncate((errors.bits() & 0b111) << 2);
        }
        ucsra
    }
}

impl Backend for SimulatedBackend {
    unsafe fn read_register(&mut self, offset: u8) -> u8 {
        let offset = offset as usize;
        let value = match offset {
            offsets::UCSRA => self.ucsra().bits(),
            offsets::UDR => self.rx.pop_front().map_or(0, |(byte, _)| byte),
            _ => self.registers[offset],
        };
        self.trace.push(Access::Read(offset, value));
        value
    }

    unsafe fn write_register(&mut self, offset: u8, value: u8) {
        let offset = offset as usize;
        self.trace.push(Access::Write(offset, value));
        match offset {
            // TX_COMPLETE is cleared by writing one, so it is never stored.
            offsets::UCSRA => {
                self.registers[offset] =
                    value & (UCSRA::DOUBLE_SPEED | UCSRA::MULTI_PROCESSOR).bits();
            }
            offsets::UCSRB => {
                // Disabling the receiver flushes the receive buffer.
                if self.ucsrb().contains(UCSRB::RX_ENABLE)
                    && !UCSRB::from_bits_retain(value).contains(UCSRB::RX_ENABLE)
                {
                    self.rx.clear();
                }
                self.registers[offset] = value;
            }
            offsets::UDR => self.tx.push(value),
            _ => self.registers[offset] = value,
        }
    }

    unsafe fn read_register_u16(&mut self, offset: u8) -> u16 {
        let offset = offset as usize;
        let value = u16::from_le_bytes([self.registers[offset], self.registers[offset + 1]]);
        self.trace.push(Access::Read16(offset, value));
        value
    }

    unsafe fn write_register_u16(&mut self, offset: u8, value: u16) {
        let offset = offset as usize;
        self.trace.push(Access::Write16(offset, value));
        let [low, high] = value.to_le_bytes();
        self.registers[offset] = low;
        self.registers[offset + 1] = high;
    }
}
