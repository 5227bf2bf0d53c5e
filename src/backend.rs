// SPDX-License-Identifier: MIT OR Apache-2.0

//! Abstraction over the I/O backend (Hardware Abstraction Layer (HAL)).
//!
//! Main exports:
//! - [`Backend`]
//! - [`MmioBackend`]

use crate::hw::registers::offsets;
use core::ptr::{read_volatile, write_volatile};

/// Memory-mapped I/O (MMIO) address.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
pub struct MmioAddress(pub(crate) *mut u8);

impl MmioAddress {
    /// Adds the offset onto the address.
    fn add_offset(self, offset: u8) -> Self {
        // SAFETY: We ensure on a higher level that the base address is valid
        // and that this will not wrap.
        let address = unsafe { self.0.add(offset as usize) };
        Self(address)
    }
}

fn assert_offset(offset: u8, width: usize) {
    assert!(
        offset as usize + width <= offsets::MAX,
        "the register should be within the expected range: {offset}+{width}, expected: <= {}",
        offsets::MAX
    );
}

/// Abstraction over the I/O backend of an AVR USART.
///
/// This acts as Hardware Abstraction Layer (HAL). Every call must reach the
/// device exactly once and in program order; implementations must not cache,
/// merge, or reorder accesses.
pub trait Backend {
    /// Reads one byte from the specified register.
    ///
    /// This needs a mutable reference as reads can have side effects on the
    /// device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to read.
    unsafe fn read_register(&mut self, offset: u8) -> u8;

    /// Writes one byte to the specified register.
    ///
    /// Writes can have side effects on the device, depending on the register.
    ///
    /// # Arguments
    ///
    /// - `offset`: Offset regarding the base address.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to write.
    unsafe fn write_register(&mut self, offset: u8, value: u8);

    /// Reads a little-endian 16-bit register spanning `offset` and
    /// `offset + 1`.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to read.
    unsafe fn read_register_u16(&mut self, offset: u8) -> u16;

    /// Writes a little-endian 16-bit register spanning `offset` and
    /// `offset + 1`.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the provided address is valid and safe to write.
    unsafe fn write_register_u16(&mut self, offset: u8, value: u16);
}

/// MMIO-mapped USART.
#[derive(Debug)]
pub struct MmioBackend(pub(crate) MmioAddress /* base address, non-null */);

impl Backend for MmioBackend {
    unsafe fn read_register(&mut self, offset: u8) -> u8 {
        assert_offset(offset, 1);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { read_volatile(address.0) }
    }

    unsafe fn write_register(&mut self, offset: u8, value: u8) {
        assert_offset(offset, 1);
        let address = self.0.add_offset(offset);

        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { write_volatile(address.0, value) }
    }

    unsafe fn read_register_u16(&mut self, offset: u8) -> u16 {
        assert_offset(offset, 2);
        let low = self.0.add_offset(offset);
        let high = self.0.add_offset(offset + 1);

        // Low byte first.
        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe { u16::from_le_bytes([read_volatile(low.0), read_volatile(high.0)]) }
    }

    unsafe fn write_register_u16(&mut self, offset: u8, value: u16) {
        assert_offset(offset, 2);
        let low = self.0.add_offset(offset);
        let high = self.0.add_offset(offset + 1);
        let [low_byte, high_byte] = value.to_le_bytes();

        // High byte first: writing the low byte latches the new value.
        // SAFETY: The caller ensured that the MMIO address is safe to use.
        unsafe {
            write_volatile(high.0, high_byte);
            write_volatile(low.0, low_byte);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mmio_backend_on_plain_memory() {
        let mut memory = [0_u8; offsets::MAX];
        let mut backend = MmioBackend(MmioAddress(memory.as_mut_ptr()));

        // SAFETY: The memory is valid for offsets::MAX bytes.
        unsafe {
            backend.write_register(offsets::UCSRC as u8, 0x06);
            backend.write_register_u16(offsets::UBRR as u8, 0x0123);
            assert_eq!(backend.read_register(offsets::UCSRC as u8), 0x06);
            assert_eq!(backend.read_register_u16(offsets::UBRR as u8), 0x0123);
        }
        assert_eq!(memory[offsets::UBRR], 0x23);
        assert_eq!(memory[offsets::UBRR + 1], 0x01);
    }

    #[test]
    #[should_panic]
    fn test_mmio_backend_rejects_offset() {
        let mut memory = [0_u8; offsets::MAX];
        let mut backend = MmioBackend(MmioAddress(memory.as_mut_ptr()));
        // SAFETY: The offset is checked before the memory is touched.
        unsafe {
            backend.write_register_u16(offsets::UDR as u8, 0);
        }
    }
}
