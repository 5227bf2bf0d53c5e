// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provides a thin abstraction over a [`Usart`] for VT102-like terminal
//! emulators on the receiving side.
//!
//! This module is suited for basic use cases such as debug output, but full
//! VT102 compatibility is explicitly not a goal.
//!
//! For lower-level access of the underlying hardware, use [`Usart`]
//! instead.
//!
//! See [`UsartTty`].

use crate::backend::{Backend, MmioBackend};
use crate::{Config, InvalidAddressError, Usart};
use core::fmt;

/// Thin opinionated abstraction over [`Usart`] that helps to send Rust
/// strings easily to the other side, assuming the remote is a TTY (terminal).
///
/// It implements [`fmt::Write`]. Writing fails with [`fmt::Error`] if the
/// transmitter is disabled.
///
/// # Example
/// ```rust,no_run
/// use avr_usart::{Config, UsartTty};
/// use avr_usart::hw::CPU_FREQUENCY_HZ;
/// use core::fmt::Write;
///
/// let config = Config::from_baud_rate(CPU_FREQUENCY_HZ, 9600, false)
///     .unwrap()
///     .transmitter(true);
/// let mut tty = unsafe { UsartTty::new_mmio(0xc0 as *mut u8, config).expect("should be valid address") };
/// write!(tty, "hello world\nhow's it going?").unwrap();
/// ```
#[derive(Debug)]
pub struct UsartTty<B: Backend>(Usart<B>);

impl UsartTty<MmioBackend> {
    /// Creates a new [`UsartTty`] backed by MMIO and applies the
    /// configuration.
    ///
    /// # Safety
    ///
    /// Callers must ensure that the address is valid and safe to use.
    pub unsafe fn new_mmio(
        base_address: *mut u8,
        config: Config,
    ) -> Result<Self, InvalidAddressError> {
        // SAFETY: The MMIO address is valid and we have exclusive access.
        let mut inner = unsafe { Usart::new_mmio(base_address)? };
        inner.configure(config);
        Ok(Self(inner))
    }
}

impl<B: Backend> UsartTty<B> {
    /// Wraps an already configured [`Usart`].
    pub const fn new(inner: Usart<B>) -> Self {
        Self(inner)
    }

    /// Returns a reference to the underlying [`Usart`].
    pub const fn inner(&self) -> &Usart<B> {
        &self.0
    }

    /// Returns a mutable reference to the underlying [`Usart`].
    pub const fn inner_mut(&mut self) -> &mut Usart<B> {
        &mut self.0
    }

    /// Returns the underlying [`Usart`].
    pub fn into_inner(self) -> Usart<B> {
        self.0
    }
}

impl<B: Backend> fmt::Write for UsartTty<B> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            let errors = match byte {
                // backspace or delete
                8 | 0x7F => self.0.putn(&[8, b' ', 8]),
                // Normal Rust newlines to terminal-compatible newlines.
                b'\n' => self.0.putn(b"\r\n"),
                data => self.0.putc(data),
            };
            errors.into_result().map_err(|_| fmt::Error)?;
        }

        Ok(())
    }
}
