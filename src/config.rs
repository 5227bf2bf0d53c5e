// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for [`Usart`].
//!
//! [`Usart`]: crate::Usart

use crate::error::{DivisorOutOfRangeError, ReservedParityError};
use crate::hw::registers::{Parity, StopBits, UBRR, UBRR_MASK, UCSRA, UCSRB, UCSRC};
use crate::hw::{InvalidBaudRateError, calc_divisor};

/// Value of the baud rate register, guaranteed to fit into its 12 bits.
///
/// Use [`calc_divisor`] to get the divisor for a given baud rate.
///
/// [`calc_divisor`]: crate::hw::calc_divisor
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudDivisor(u16);

impl BaudDivisor {
    /// The largest divisor the hardware can hold.
    pub const MAX: Self = Self(UBRR_MASK);

    /// The smallest divisor, resulting in the highest baud rate.
    pub const MIN: Self = Self(0);

    /// Creates a new divisor, rejecting values wider than 12 bits.
    pub const fn new(value: u16) -> Result<Self, DivisorOutOfRangeError> {
        if value > UBRR_MASK {
            return Err(DivisorOutOfRangeError(value));
        }
        Ok(Self(value))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for BaudDivisor {
    type Error = DivisorOutOfRangeError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BaudDivisor> for u16 {
    fn from(value: BaudDivisor) -> Self {
        value.0
    }
}

/// Configuration for [`Usart`].
///
/// Please note that sender and receiver **must agree** on the transmission
/// settings, otherwise you receive garbage.
///
/// The frame always has 8 data bits and the USART always operates in
/// asynchronous mode; neither is configurable.
///
/// # Example
///
/// ```rust
/// use avr_usart::{Config, Parity, StopBits};
/// use avr_usart::hw::CPU_FREQUENCY_HZ;
///
/// let config = Config::from_baud_rate(CPU_FREQUENCY_HZ, 115_200, true)
///     .unwrap()
///     .receiver(true)
///     .transmitter(true)
///     .parity(Parity::Even)
///     .stop_bits(StopBits::One);
/// assert_eq!(config.baud_divisor.get(), 16);
/// ```
///
/// [`Usart`]: crate::Usart
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Value for the baud rate register.
    pub baud_divisor: BaudDivisor,
    /// Whether to use double speed mode, which halves the samples per bit
    /// and thus doubles the baud rate for a given divisor.
    pub use_double_speed: bool,
    /// Whether the receiver is enabled.
    pub receive_enabled: bool,
    /// Whether the transmitter is enabled.
    pub transmit_enabled: bool,
    /// The number of stop bits.
    pub stop_bits: StopBits,
    /// The parity mode.
    pub parity: Parity,
}

impl Config {
    /// The state a [`Usart`] assumes before it was configured: everything
    /// disabled, 8-N-1 framing, divisor zero.
    ///
    /// [`Usart`]: crate::Usart
    pub const STARTUP: Self = Self {
        baud_divisor: BaudDivisor::MIN,
        use_double_speed: false,
        receive_enabled: false,
        transmit_enabled: false,
        stop_bits: StopBits::One,
        parity: Parity::None,
    };

    /// Creates a disabled 8-N-1 configuration for the given baud rate.
    ///
    /// See [`calc_divisor`].
    pub fn from_baud_rate(
        frequency: u32,
        baud_rate: u32,
        double_speed: bool,
    ) -> Result<Self, InvalidBaudRateError> {
        let divisor = calc_divisor(frequency, baud_rate, double_speed)?;
        Ok(Self::STARTUP.baud_divisor(divisor).double_speed(double_speed))
    }

    /// Sets the `baud_divisor` field.
    #[must_use]
    pub const fn baud_divisor(mut self, divisor: BaudDivisor) -> Self {
        self.baud_divisor = divisor;
        self
    }

    /// Sets the `use_double_speed` field.
    #[must_use]
    pub const fn double_speed(mut self, enabled: bool) -> Self {
        self.use_double_speed = enabled;
        self
    }

    /// Sets the `receive_enabled` field.
    #[must_use]
    pub const fn receiver(mut self, enabled: bool) -> Self {
        self.receive_enabled = enabled;
        self
    }

    /// Sets the `transmit_enabled` field.
    #[must_use]
    pub const fn transmitter(mut self, enabled: bool) -> Self {
        self.transmit_enabled = enabled;
        self
    }

    /// Sets the `stop_bits` field.
    #[must_use]
    pub const fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Sets the `parity` field.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Encodes the configuration into the register values written by
    /// [`Usart::configure`].
    ///
    /// [`Usart::configure`]: crate::Usart::configure
    #[must_use]
    pub fn to_registers(&self) -> ConfigRegisters {
        // Writing one clears the flag.
        let mut ucsra = UCSRA::TX_COMPLETE;
        ucsra.set(UCSRA::DOUBLE_SPEED, self.use_double_speed);

        // Asynchronous mode: both mode bits stay cleared.
        let ucsrc = UCSRC::EIGHT_BIT_CHARS
            .set_parity(self.parity)
            .set_stop_bits(self.stop_bits);

        // No interrupts, no 9-bit frames.
        let mut ucsrb = UCSRB::empty();
        ucsrb.set(UCSRB::RX_ENABLE, self.receive_enabled);
        ucsrb.set(UCSRB::TX_ENABLE, self.transmit_enabled);

        ConfigRegisters {
            ucsra,
            ucsrb,
            ucsrc,
            ubrr: self.baud_divisor.get(),
        }
    }

    /// Decodes a configuration from register values, the reverse of
    /// [`Self::to_registers`].
    ///
    /// Status bits and bits this driver does not configure are ignored.
    pub const fn from_registers(registers: &ConfigRegisters) -> Result<Self, ReservedParityError> {
        let Some(parity) = registers.ucsrc.parity() else {
            return Err(ReservedParityError);
        };

        Ok(Self {
            baud_divisor: BaudDivisor(registers.ubrr & UBRR_MASK),
            use_double_speed: registers.ucsra.contains(UCSRA::DOUBLE_SPEED),
            receive_enabled: registers.ucsrb.contains(UCSRB::RX_ENABLE),
            transmit_enabled: registers.ucsrb.contains(UCSRB::TX_ENABLE),
            stop_bits: registers.ucsrc.stop_bits(),
            parity,
        })
    }
}

/// Raw register image of a [`Config`].
///
/// [`ConfigRegisters::ucsrb`] is the *final* value of control register B,
/// i.e., with the enable bits set.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConfigRegisters {
    /// Control and status register A.
    pub ucsra: UCSRA,
    /// Control and status register B.
    pub ucsrb: UCSRB,
    /// Control and status register C.
    pub ucsrc: UCSRC,
    /// Baud rate register.
    pub ubrr: UBRR,
}
