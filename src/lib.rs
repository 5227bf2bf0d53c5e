// SPDX-License-Identifier: MIT OR Apache-2.0

//! # avr_usart
//!
//! Simple, polling driver for the "standard" [USART][usart] found in Atmel
//! AVR microcontrollers such as the ATmega328P. It configures baud rate,
//! framing, and enable state via memory-mapped registers and performs
//! blocking byte-, buffer-, and line-oriented I/O with hardware error
//! reporting.
//!
//! See [`Usart`] to get started.
//!
//! ## Features
//!
//! - ✅ Blocking transmit and receive of bytes, buffers, and delimited lines
//! - ✅ `no_std`-compatible and allocation-free by design
//! - ✅ Parity, overrun, and frame errors reported per operation
//! - ✅ Operations on a disabled direction fail fast instead of hanging
//! - ✅ Software cache of the active configuration, no redundant register reads
//! - ✅ Register access behind a [`Backend`] trait, testable without hardware
//!
//! ## Focus, Scope & Limitations
//!
//! The driver is strictly polling: there is no interrupt or DMA support, and
//! all waits are busy-spins without a timeout. Frames always have 8 data
//! bits and the USART always operates in asynchronous mode.
//!
//! The number of ports and their base addresses depend on the target and are
//! provided by the caller, e.g., `0xc0` for USART0 of the ATmega328P.
//!
//! [usart]: https://en.wikipedia.org/wiki/Universal_synchronous_and_asynchronous_receiver-transmitter
//! [`Backend`]: crate::backend::Backend

#![no_std]
#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks
)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(rustdoc::all)]

#[cfg(test)]
extern crate std;

use crate::backend::{Backend, MmioAddress, MmioBackend};
pub use crate::config::{BaudDivisor, Config, ConfigRegisters};
pub use crate::error::*;
use crate::hw::registers::{UBRR, UCSRA, UCSRB, UCSRC, offsets};
pub use crate::hw::registers::{Parity, StopBits};
pub use crate::tty::UsartTty;

pub mod backend;
pub mod hw;

mod config;
mod error;
#[cfg(test)]
mod sim;
mod tty;

/// Result of a multi-byte receive operation.
///
/// See [`Usart::getn`] and [`Usart::gets`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub struct ReadOutcome {
    /// How many bytes were stored in the buffer, including a byte that
    /// carried an error.
    pub count: usize,
    /// The errors of the byte that stopped the operation, or
    /// [`ErrorMask::NONE`].
    pub error: ErrorMask,
}

/// Abstraction over an AVR [USART][usart] with access to low-level details
/// but also high usability for higher-level layers.
///
/// All reads and writes involving device registers operate on the underlying
/// hardware. The last configuration applied via [`Usart::configure`] is cached
/// in software; the data path consults the cache to check whether a direction
/// is enabled, without touching the hardware.
///
/// # Example
///
/// ```rust,no_run
/// use avr_usart::{Config, Usart};
/// use avr_usart::hw::CPU_FREQUENCY_HZ;
///
/// // SAFETY: USART0 of the ATmega328P lives at 0xc0.
/// let mut usart = unsafe { Usart::new_mmio(0xc0 as *mut u8) }.unwrap();
/// let config = Config::from_baud_rate(CPU_FREQUENCY_HZ, 115_200, true)
///     .unwrap()
///     .receiver(true)
///     .transmitter(true);
/// usart.configure(config);
///
/// let mut line = [0_u8; 64];
/// let outcome = usart.gets(&mut line, b'\n');
/// let _ = usart.putn(&line[..outcome.count]);
/// ```
///
/// # Sending and Receiving Data
///
/// - [`Usart::putc`]: send a single byte
/// - [`Usart::putn`]: send all provided bytes
/// - [`Usart::puts`]: send a string up to its null terminator
/// - [`Usart::getc`]: receive a single byte
/// - [`Usart::getn`]: receive bytes until the buffer is full or an error
///   occurs
/// - [`Usart::gets`]: receive a null-terminated line
/// - [`Usart::try_putc`] / [`Usart::try_getc`]: non-blocking variants, e.g.,
///   to implement timeouts
///
/// # Concurrency
///
/// The driver has no internal locking. All calls against one instance must be
/// serialized by the caller. Using the same instance from an interrupt
/// handler and from normal program flow is undefined behavior with regard to
/// the device state.
///
/// [usart]: https://en.wikipedia.org/wiki/Universal_synchronous_and_asynchronous_receiver-transmitter
#[derive(Debug)]
pub struct Usart<B: Backend> {
    backend: B,
    // The currently active config.
    config: Config,
}

impl Usart<MmioBackend> {
    /// Creates a new [`Usart`] backed by MMIO.
    ///
    /// The device is not touched; call [`Usart::configure`] before using the
    /// data path.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address is valid and safe to use, and
    /// that no other [`Usart`] operates on the same device.
    pub unsafe fn new_mmio(base_address: *mut u8) -> Result<Self, InvalidAddressError> {
        if base_address.is_null() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }
        if (base_address as usize).checked_add(offsets::MAX).is_none() {
            return Err(InvalidAddressError(MmioAddress(base_address)));
        }

        let backend = MmioBackend(MmioAddress(base_address));

        Ok(Self::new(backend))
    }
}

impl<B: Backend> Usart<B> {
    /// Creates a new [`Usart`] on top of the given backend.
    ///
    /// The cached configuration starts as [`Config::STARTUP`].
    pub const fn new(backend: B) -> Self {
        Self {
            backend,
            config: Config::STARTUP,
        }
    }

    /* ----- Configuration -------------------------------------------------- */

    /// Configures the device according to the provided [`Config`].
    ///
    /// The device is disabled first, then reconfigured, and finally enabled
    /// according to the configuration. Afterwards, the configuration is
    /// cached and returned by [`Self::configuration`].
    ///
    /// Ongoing transmissions are cut off.
    pub fn configure(&mut self, config: Config) {
        log::debug!("configuring USART: {config:?}");
        let registers = config.to_registers();

        // SAFETY: We operate on valid register addresses.
        unsafe {
            // Disable the device, all interrupts, and 9-bit mode.
            self.backend
                .write_register(offsets::UCSRB as u8, UCSRB::empty().bits());

            // Clear TX_COMPLETE, disable multi-processor mode, set speed.
            self.backend
                .write_register(offsets::UCSRA as u8, registers.ucsra.bits());

            // Asynchronous 8-bit frames with the requested parity and stop bits.
            self.backend
                .write_register(offsets::UCSRC as u8, registers.ucsrc.bits());

            self.backend
                .write_register_u16(offsets::UBRR as u8, registers.ubrr);

            // Enabling comes last.
            self.backend
                .write_register(offsets::UCSRB as u8, registers.ucsrb.bits());
        }

        self.config = config;
    }

    /// Returns the cached configuration, i.e., the one last applied via
    /// [`Self::configure`].
    #[must_use]
    pub const fn configuration(&self) -> &Config {
        &self.config
    }

    /// Reads the configuration back from the hardware registers.
    ///
    /// The registers are only read, never written. For every configuration
    /// applied via [`Self::configure`], this returns the same value.
    pub fn read_configuration(&mut self) -> Result<Config, ReservedParityError> {
        let registers = ConfigRegisters {
            ucsra: self.ucsra(),
            ucsrb: self.ucsrb(),
            ucsrc: self.ucsrc(),
            ubrr: self.ubrr(),
        };
        Config::from_registers(&registers)
    }

    /// Returns the error flags of the next byte in the receive buffer.
    ///
    /// This only reads the status register. Note however that reading the
    /// received byte clears these flags.
    pub fn error(&mut self) -> ErrorMask {
        self.ucsra().errors()
    }

    /// Discards unread data in the receive buffer by toggling the receiver.
    ///
    /// Does nothing if the receiver is disabled. All other bits of the
    /// control register are preserved.
    pub fn flush_rx(&mut self) {
        if !self.config.receive_enabled {
            return;
        }
        log::trace!("flushing receive buffer");

        let original = self.ucsrb();
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(
                offsets::UCSRB as u8,
                original.difference(UCSRB::RX_ENABLE).bits(),
            );
            self.backend
                .write_register(offsets::UCSRB as u8, original.bits());
        }
    }

    /* ----- User I/O ------------------------------------------------------- */

    /// Tries to write a raw byte to the device without blocking.
    ///
    /// This will be transmitted to the remote.
    pub fn try_putc(&mut self, byte: u8) -> Result<(), ByteSendError> {
        if !self.config.transmit_enabled {
            return Err(ByteSendError::Disabled);
        }

        if !self.ucsra().contains(UCSRA::DATA_REGISTER_EMPTY) {
            return Err(ByteSendError::NoCapacity);
        }

        self.write_data(byte);
        Ok(())
    }

    /// Tries to read a raw byte from the device without blocking.
    ///
    /// This will receive whatever a remote has sent to us.
    pub fn try_getc(&mut self) -> Result<u8, ByteReceiveError> {
        if !self.config.receive_enabled {
            return Err(ByteReceiveError::Disabled);
        }

        let ucsra = self.ucsra();
        if !ucsra.contains(UCSRA::RX_COMPLETE) {
            return Err(ByteReceiveError::NoData);
        }

        let errors = ucsra.errors();
        let byte = self.read_data();
        if errors.is_empty() {
            Ok(byte)
        } else {
            Err(ByteReceiveError::Corrupted { byte, errors })
        }
    }

    /// Writes a byte to the device, blocking until the transmit buffer has
    /// room for it.
    ///
    /// Returns [`ErrorMask::DISABLED`] without touching the device if the
    /// transmitter is disabled, and [`ErrorMask::NONE`] otherwise; the
    /// hardware reports no transmit errors.
    pub fn putc(&mut self, byte: u8) -> ErrorMask {
        if !self.config.transmit_enabled {
            return ErrorMask::DISABLED;
        }
        self.transmit(byte)
    }

    /// Reads a byte from the device, blocking until one was received.
    ///
    /// Returns the byte together with its error flags. If the receiver is
    /// disabled, returns `0` and [`ErrorMask::DISABLED`] without touching the
    /// device.
    pub fn getc(&mut self) -> (u8, ErrorMask) {
        if !self.config.receive_enabled {
            return (0, ErrorMask::DISABLED);
        }
        self.receive()
    }

    /// Writes all bytes to the device, see [`Self::putc`].
    ///
    /// The errors of all bytes are combined.
    pub fn putn(&mut self, bytes: &[u8]) -> ErrorMask {
        if !self.config.transmit_enabled {
            return ErrorMask::DISABLED;
        }
        bytes
            .iter()
            .fold(ErrorMask::NONE, |errors, &byte| errors | self.transmit(byte))
    }

    /// Writes the string up to its first null byte (or entirely, if there is
    /// none), see [`Self::putn`].
    ///
    /// The null byte itself is not sent.
    pub fn puts(&mut self, string: &str) -> ErrorMask {
        if !self.config.transmit_enabled {
            return ErrorMask::DISABLED;
        }
        string
            .bytes()
            .take_while(|&byte| byte != 0)
            .fold(ErrorMask::NONE, |errors, byte| errors | self.transmit(byte))
    }

    /// Receives bytes into the buffer until it is full or a byte carries an
    /// error.
    ///
    /// The byte that carried the error is still stored and counted.
    pub fn getn(&mut self, buffer: &mut [u8]) -> ReadOutcome {
        if !self.config.receive_enabled {
            return ReadOutcome {
                count: 0,
                error: ErrorMask::DISABLED,
            };
        }

        let mut outcome = ReadOutcome::default();
        for slot in buffer.iter_mut() {
            let (byte, errors) = self.receive();
            *slot = byte;
            outcome.count += 1;
            if !errors.is_empty() {
                log::debug!("receive stopped after {} bytes: {errors}", outcome.count);
                outcome.error = errors;
                break;
            }
        }
        outcome
    }

    /// Receives a line into the buffer and null-terminates it.
    ///
    /// Reads at most `buffer.len() - 1` bytes and stops early after the
    /// `delimiter` was stored or after a byte carried an error. The
    /// delimiter is included in the count. A null byte is written behind the
    /// last stored byte, regardless of why reception stopped.
    ///
    /// An empty buffer can't hold the terminator; nothing is received then.
    pub fn gets(&mut self, buffer: &mut [u8], delimiter: u8) -> ReadOutcome {
        if !self.config.receive_enabled {
            return ReadOutcome {
                count: 0,
                error: ErrorMask::DISABLED,
            };
        }

        let Some(capacity) = buffer.len().checked_sub(1) else {
            return ReadOutcome::default();
        };

        let mut outcome = ReadOutcome::default();
        for slot in &mut buffer[..capacity] {
            let (byte, errors) = self.receive();
            *slot = byte;
            outcome.count += 1;
            if !errors.is_empty() {
                log::debug!("line receive stopped after {} bytes: {errors}", outcome.count);
                outcome.error = errors;
                break;
            }
            if byte == delimiter {
                break;
            }
        }

        buffer[outcome.count] = 0;
        outcome
    }

    /* ----- Data Path Internals -------------------------------------------- */

    /// Spins until the transmit buffer is empty, then writes the byte.
    fn transmit(&mut self, byte: u8) -> ErrorMask {
        while !self.ucsra().contains(UCSRA::DATA_REGISTER_EMPTY) {
            core::hint::spin_loop();
        }
        self.write_data(byte);
        ErrorMask::NONE
    }

    /// Spins until a byte was received, then reads it.
    ///
    /// The error flags are taken from the same status read that reported the
    /// byte, as reading the data clears them.
    fn receive(&mut self) -> (u8, ErrorMask) {
        let ucsra = loop {
            let ucsra = self.ucsra();
            if ucsra.contains(UCSRA::RX_COMPLETE) {
                break ucsra;
            }
            core::hint::spin_loop();
        };
        let errors = ucsra.errors();
        (self.read_data(), errors)
    }

    fn read_data(&mut self) -> u8 {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.read_register(offsets::UDR as u8) }
    }

    fn write_data(&mut self, byte: u8) {
        // SAFETY: We operate on valid register addresses.
        unsafe {
            self.backend.write_register(offsets::UDR as u8, byte);
        }
    }

    /* ----- Typed Register Getters ----------------------------------------- */

    /// Fetches the current value from the [`UCSRA`].
    pub fn ucsra(&mut self) -> UCSRA {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRA as u8) };
        UCSRA::from_bits_retain(val)
    }

    /// Fetches the current value from the [`UCSRB`].
    pub fn ucsrb(&mut self) -> UCSRB {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRB as u8) };
        UCSRB::from_bits_retain(val)
    }

    /// Fetches the current value from the [`UCSRC`].
    pub fn ucsrc(&mut self) -> UCSRC {
        // SAFETY: We operate on valid register addresses.
        let val = unsafe { self.backend.read_register(offsets::UCSRC as u8) };
        UCSRC::from_bits_retain(val)
    }

    /// Fetches the current value from the [`UBRR`].
    pub fn ubrr(&mut self) -> UBRR {
        // SAFETY: We operate on valid register addresses.
        unsafe { self.backend.read_register_u16(offsets::UBRR as u8) }
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Backend> embedded_io::ErrorType for Usart<B> {
    type Error = ErrorMask;
}

#[cfg(feature = "embedded-io")]
impl<B: Backend> embedded_io::Read for Usart<B> {
    /// Reads at most one byte per call.
    ///
    /// A byte flagged with a hardware error is consumed and dropped; only its
    /// [`ErrorMask`] is returned.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if buf.is_empty() {
            return Ok(0);
        }
        // Block for the first byte only.
        let outcome = self.getn(&mut buf[..1]);
        outcome.error.into_result().map(|()| outcome.count)
    }
}

#[cfg(feature = "embedded-io")]
impl<B: Backend> embedded_io::Write for Usart<B> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.putn(buf).into_result().map(|()| buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        if !self.config.transmit_enabled {
            return Err(ErrorMask::DISABLED);
        }
        // Does not wait for TX_COMPLETE: the last frame may still be in the
        // shift register when this returns.
        while !self.ucsra().contains(UCSRA::DATA_REGISTER_EMPTY) {
            core::hint::spin_loop();
        }
        Ok(())
    }
}
