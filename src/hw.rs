// SPDX-License-Identifier: MIT OR Apache-2.0

//! # Constants, Register Offsets, and Register Bits.
//!
//! Models the raw low-level details of the "standard" Atmel USART as found in
//! the [ATmega328P datasheet] (chapter 20, USART0), and avoids too
//! opinionated abstractions.
//!
//! [ATmega328P datasheet]: https://ww1.microchip.com/downloads/en/DeviceDoc/Atmel-7810-Automotive-Microcontrollers-ATmega328P_Datasheet.pdf

pub use crate::hw::errors::*;
use crate::config::BaudDivisor;

/// Most typical CPU clock of 16 MHz (e.g., Arduino Uno).
pub const CPU_FREQUENCY_HZ: u32 = 16_000_000;

mod errors {
    use core::error::Error;
    use core::fmt::{self, Display, Formatter};

    /// Error that is returned when [`calc_divisor`] can not find a divisor
    /// for the requested baud rate.
    ///
    /// This happens if the baud rate is zero, too high for the clock, or so
    /// low that the divisor exceeds the 12 bits of the baud register.
    ///
    /// [`calc_divisor`]: crate::hw::calc_divisor
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Hash)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub struct InvalidBaudRateError {
        /// The CPU clock frequency.
        pub frequency: u32,
        /// The requested baud rate.
        pub baud_rate: u32,
        /// Whether double speed mode was requested.
        pub double_speed: bool,
    }

    impl Display for InvalidBaudRateError {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(
                f,
                "no 12-bit divisor for baud rate! frequency={}, baud_rate={}, double_speed={}",
                self.frequency, self.baud_rate, self.double_speed,
            )
        }
    }

    impl Error for InvalidBaudRateError {}
}

/// Returns the number of clock cycles per bit divided by the divisor + 1.
const fn samples_per_bit(double_speed: bool) -> u32 {
    if double_speed { 8 } else { 16 }
}

/// Calculates the baud rate resulting from a divisor.
///
/// The result is truncated towards zero.
///
/// # Arguments
/// - `frequency`: The CPU clock, typically [`CPU_FREQUENCY_HZ`].
/// - `divisor`: The value of the baud register.
/// - `double_speed`: Whether [`registers::UCSRA::DOUBLE_SPEED`] is set.
#[must_use]
pub const fn calc_baud_rate(frequency: u32, divisor: BaudDivisor, double_speed: bool) -> u32 {
    frequency / (samples_per_bit(double_speed) * (divisor.get() as u32 + 1))
}

/// Similar to [`calc_baud_rate`] but with known baud rate to calculate the
/// divisor.
///
/// The divisor is rounded to the nearest value, so the effective baud rate
/// (see [`calc_baud_rate`]) may deviate slightly from the requested one.
pub fn calc_divisor(
    frequency: u32,
    baud_rate: u32,
    double_speed: bool,
) -> Result<BaudDivisor, InvalidBaudRateError> {
    let err = InvalidBaudRateError {
        frequency,
        baud_rate,
        double_speed,
    };

    let denominator = samples_per_bit(double_speed)
        .checked_mul(baud_rate)
        .filter(|&d| d != 0)
        .ok_or(err)?;

    // frequency / denominator, rounded to nearest
    let divisor_plus_one = (frequency / denominator)
        + u32::from(frequency % denominator >= denominator.div_ceil(2));

    let divisor = divisor_plus_one.checked_sub(1).ok_or(err)?;
    let divisor = u16::try_from(divisor).map_err(|_| err)?;
    BaudDivisor::new(divisor).map_err(|_| err)
}

/// Exposes low-level information about the on-chip register layout and provides
/// types that model individual registers.
///
/// The getters and setters in this module operate exclusively on raw bit
/// representations within the local computing context. They are limited to
/// extracting or updating the corresponding fields and do not perform direct
/// hardware access.
pub mod registers {
    use crate::ErrorMask;
    use bitflags::bitflags;

    /// Provides the register offset from the base register.
    pub mod offsets {
        /// The amount of bytes spanned by the register block.
        ///
        /// The highest valid offset is therefore this value decremented by one.
        pub const MAX: usize = 7;

        /// Control and Status Register A (UCSRnA).
        pub const UCSRA: usize = 0;

        /// Control and Status Register B (UCSRnB).
        pub const UCSRB: usize = 1;

        /// Control and Status Register C (UCSRnC).
        pub const UCSRC: usize = 2;

        /* offset 3 is reserved */

        /// Baud Rate Register (UBRRn), 16 bit little-endian.
        ///
        /// The low byte (UBRRnL) is at this offset, the high byte (UBRRnH) at
        /// the next one.
        pub const UBRR: usize = 4;

        /// I/O Data Register (UDRn).
        ///
        /// Reads return the receive buffer, writes go to the transmit buffer.
        pub const UDR: usize = 6;
    }

    /// Typing of the data register (UDRn).
    pub type UDR = u8;

    /// Typing of the baud rate register (UBRRn).
    ///
    /// Only the lower 12 bits are significant, see [`UBRR_MASK`].
    pub type UBRR = u16;

    /// The bits of [`UBRR`] that are backed by hardware.
    pub const UBRR_MASK: UBRR = 0x0fff;

    bitflags! {
        /// Typing of the Control and Status Register A (UCSRnA).
        ///
        /// Mostly reports status. Only [`UCSRA::TX_COMPLETE`],
        /// [`UCSRA::DOUBLE_SPEED`] and [`UCSRA::MULTI_PROCESSOR`] are
        /// writable.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRA: u8 {
            /// Multi-processor Communication Mode (MPCMn).
            ///
            /// When set, all incoming frames without address information are
            /// ignored.
            const MULTI_PROCESSOR = 1 << 0;
            /// Double the USART Transmission Speed (U2Xn).
            ///
            /// Reduces the divisor of the baud rate from 16 to 8.
            const DOUBLE_SPEED = 1 << 1;
            /// USART Parity Error (UPEn).
            ///
            /// The next character in the receive buffer had a parity error.
            /// Valid until the receive buffer (UDRn) is read.
            const PARITY_ERROR = 1 << 2;
            /// Data OverRun (DORn).
            ///
            /// The receive buffer was full, and a new start bit was detected.
            /// Valid until the receive buffer (UDRn) is read.
            const DATA_OVERRUN = 1 << 3;
            /// Frame Error (FEn).
            ///
            /// The first stop bit of the next character in the receive buffer
            /// was zero. Valid until the receive buffer (UDRn) is read.
            const FRAME_ERROR = 1 << 4;
            /// USART Data Register Empty (UDREn).
            ///
            /// The transmit buffer is ready to receive new data.
            const DATA_REGISTER_EMPTY = 1 << 5;
            /// USART Transmit Complete (TXCn).
            ///
            /// Set when the entire frame was shifted out and the transmit
            /// buffer is empty. Cleared by writing a one to it.
            const TX_COMPLETE = 1 << 6;
            /// USART Receive Complete (RXCn).
            ///
            /// There is unread data in the receive buffer.
            const RX_COMPLETE = 1 << 7;
        }
    }

    impl UCSRA {
        /// All error flags.
        pub const ERRORS: Self = Self::PARITY_ERROR
            .union(Self::DATA_OVERRUN)
            .union(Self::FRAME_ERROR);

        /// Returns the error flags as [`ErrorMask`].
        #[must_use]
        pub const fn errors(self) -> ErrorMask {
            ErrorMask::from_bits_truncate((self.bits() & Self::ERRORS.bits()) >> 2)
        }
    }

    bitflags! {
        /// Typing of the Control and Status Register B (UCSRnB).
        ///
        /// Enables the receiver, the transmitter, and the interrupts.
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRB: u8 {
            /// Transmit Data Bit 8 (TXB8n) for 9-bit frames.
            const TX_DATA_BIT8 = 1 << 0;
            /// Receive Data Bit 8 (RXB8n) for 9-bit frames.
            const RX_DATA_BIT8 = 1 << 1;
            /// Character Size high bit (UCSZn2).
            ///
            /// Combined with [`UCSRC::CHAR_SIZE0`] and [`UCSRC::CHAR_SIZE1`].
            /// Always cleared for 8-bit frames.
            const CHAR_SIZE2 = 1 << 2;
            /// Transmitter Enable (TXENn).
            const TX_ENABLE = 1 << 3;
            /// Receiver Enable (RXENn).
            ///
            /// Disabling the receiver flushes the receive buffer.
            const RX_ENABLE = 1 << 4;
            /// USART Data Register Empty Interrupt Enable (UDRIEn).
            const DATA_REGISTER_EMPTY_INT = 1 << 5;
            /// TX Complete Interrupt Enable (TXCIEn).
            const TX_COMPLETE_INT = 1 << 6;
            /// RX Complete Interrupt Enable (RXCIEn).
            const RX_COMPLETE_INT = 1 << 7;
        }
    }

    bitflags! {
        /// Typing of the Control and Status Register C (UCSRnC).
        ///
        /// Configures the frame format: mode, parity, stop bits, and
        /// character size.
        ///
        /// This is a **read/write** register.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct UCSRC: u8 {
            /// Clock Polarity (UCPOLn). Synchronous mode only.
            const CLOCK_POLARITY = 1 << 0;
            /// Character Size (UCSZn0).
            const CHAR_SIZE0 = 1 << 1;
            /// Character Size (UCSZn1).
            const CHAR_SIZE1 = 1 << 2;
            /// Stop Bit Select (USBSn). See [`StopBits`].
            const TWO_STOP_BITS = 1 << 3;
            /// First bit of [`Parity`] (UPMn0).
            const PARITY0 = 1 << 4;
            /// Second bit of [`Parity`] (UPMn1).
            const PARITY1 = 1 << 5;
            /// First bit of the USART Mode Select (UMSELn0).
            ///
            /// Both mode bits cleared selects asynchronous mode.
            const MODE0 = 1 << 6;
            /// Second bit of the USART Mode Select (UMSELn1).
            const MODE1 = 1 << 7;
        }
    }

    impl UCSRC {
        /// Character size bits selecting 8-bit frames (with
        /// [`UCSRB::CHAR_SIZE2`] cleared).
        pub const EIGHT_BIT_CHARS: Self = Self::CHAR_SIZE0.union(Self::CHAR_SIZE1);

        /// Returns the [`StopBits`].
        #[must_use]
        pub const fn stop_bits(self) -> StopBits {
            StopBits::from_raw_bits((self.bits() >> 3) & 0b1)
        }

        /// Sets the [`StopBits`].
        #[must_use]
        pub fn set_stop_bits(self, value: StopBits) -> Self {
            self.difference(Self::TWO_STOP_BITS) | Self::from_bits_retain(value.to_raw_bits() << 3)
        }

        /// Returns the [`Parity`], or `None` for the reserved encoding.
        #[must_use]
        pub const fn parity(self) -> Option<Parity> {
            Parity::from_raw_bits((self.bits() >> 4) & 0b11)
        }

        /// Sets the [`Parity`].
        #[must_use]
        pub fn set_parity(self, value: Parity) -> Self {
            self.difference(Self::PARITY0 | Self::PARITY1)
                | Self::from_bits_retain(value.to_raw_bits() << 4)
        }
    }

    /// The number of stop bits in [`UCSRC`].
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`StopBits::from_raw_bits`] and
    /// [`StopBits::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum StopBits {
        /// One stop bit.
        #[default]
        One,
        /// Two stop bits.
        Two,
    }

    impl StopBits {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Self {
            if bits & 1 == 0 { Self::One } else { Self::Two }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::One => 0b0,
                Self::Two => 0b1,
            }
        }
    }

    /// The parity mode for transmission as well as reception.
    ///
    /// This type is a convenient and non-ABI compatible abstraction. ABI
    /// compatibility is given via [`Parity::from_raw_bits`] and
    /// [`Parity::to_raw_bits`].
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Parity {
        /// No parity bit is transmitted nor expected.
        #[default]
        None,
        /// The number of bits including the parity bit must be even.
        Even,
        /// The number of bits including the parity bit must be odd.
        Odd,
    }

    impl Parity {
        /// Translates the raw encoding into the corresponding value.
        ///
        /// Returns `None` for `0b01`, which the hardware reserves.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting bits.
        #[must_use]
        pub const fn from_raw_bits(bits: u8) -> Option<Self> {
            match bits & 0b11 {
                0b00 => Some(Self::None),
                0b10 => Some(Self::Even),
                0b11 => Some(Self::Odd),
                _ => None,
            }
        }

        /// Translates the value into the corresponding raw encoding.
        ///
        /// This function operates on the value as-is and does not perform any
        /// shifting bits.
        #[must_use]
        pub const fn to_raw_bits(self) -> u8 {
            match self {
                Self::None => 0b00,
                Self::Even => 0b10,
                Self::Odd => 0b11,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::registers::*;
    use super::*;
    use crate::ErrorMask;

    fn divisor(value: u16) -> BaudDivisor {
        BaudDivisor::new(value).unwrap()
    }

    #[test]
    fn test_calc_baud_rate() {
        assert_eq!(calc_baud_rate(CPU_FREQUENCY_HZ, divisor(103), false), 9615);
        assert_eq!(calc_baud_rate(CPU_FREQUENCY_HZ, divisor(207), true), 9615);
        assert_eq!(calc_baud_rate(CPU_FREQUENCY_HZ, divisor(16), true), 117_647);
        assert_eq!(calc_baud_rate(CPU_FREQUENCY_HZ, divisor(0), false), 1_000_000);
    }

    #[test]
    fn test_calc_divisor() {
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 9600, false), Ok(divisor(103)));
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 9600, true), Ok(divisor(207)));
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 115_200, true), Ok(divisor(16)));
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 115_200, false), Ok(divisor(8)));
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 1_000_000, false), Ok(divisor(0)));
    }

    #[test]
    fn test_calc_divisor_invalid() {
        let err = |baud_rate, double_speed| InvalidBaudRateError {
            frequency: CPU_FREQUENCY_HZ,
            baud_rate,
            double_speed,
        };
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 0, false), Err(err(0, false)));
        // too fast for the clock
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 4_000_000, false), Err(err(4_000_000, false)));
        // divisor needs more than 12 bits
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, 110, false), Err(err(110, false)));
        assert_eq!(calc_divisor(CPU_FREQUENCY_HZ, u32::MAX, true), Err(err(u32::MAX, true)));
    }

    #[test]
    fn test_ucsra_errors() {
        assert_eq!(UCSRA::empty().errors(), ErrorMask::NONE);
        assert_eq!(UCSRA::PARITY_ERROR.errors(), ErrorMask::PARITY);
        assert_eq!(UCSRA::DATA_OVERRUN.errors(), ErrorMask::OVERRUN);
        assert_eq!(UCSRA::FRAME_ERROR.errors(), ErrorMask::FRAME);
        assert_eq!(
            (UCSRA::all() - UCSRA::DATA_OVERRUN).errors(),
            ErrorMask::PARITY | ErrorMask::FRAME
        );
    }

    #[test]
    fn test_ucsrc_fields() {
        let ucsrc = UCSRC::EIGHT_BIT_CHARS
            .set_parity(Parity::Odd)
            .set_stop_bits(StopBits::Two);
        assert_eq!(ucsrc.bits(), 0b0011_1110);
        assert_eq!(ucsrc.parity(), Some(Parity::Odd));
        assert_eq!(ucsrc.stop_bits(), StopBits::Two);

        let ucsrc = ucsrc.set_parity(Parity::Even).set_stop_bits(StopBits::One);
        assert_eq!(ucsrc.bits(), 0b0010_0110);
        assert_eq!(ucsrc.parity(), Some(Parity::Even));
        assert_eq!(ucsrc.stop_bits(), StopBits::One);

        assert_eq!(UCSRC::PARITY0.parity(), None);
    }
}
