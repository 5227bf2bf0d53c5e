// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors that can happen when working with [`Usart`].

use crate::backend::MmioAddress;
use bitflags::bitflags;
use core::error::Error;
use core::fmt::Display;

#[cfg(doc)]
use crate::Usart;

bitflags! {
    /// Errors reported by the data path of a [`Usart`].
    ///
    /// [`ErrorMask::PARITY`], [`ErrorMask::OVERRUN`] and
    /// [`ErrorMask::FRAME`] are reported by the hardware for received bytes.
    /// [`ErrorMask::DISABLED`] is reported by the driver if the requested
    /// direction is not enabled.
    ///
    /// Several flags may be set at once; results of multi-byte operations
    /// are combined with `|`. An empty mask ([`ErrorMask::NONE`]) means
    /// success.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ErrorMask: u8 {
        /// The received byte had a parity error.
        const PARITY = 1 << 0;
        /// The receive buffer overflowed; at least one byte was lost.
        const OVERRUN = 1 << 1;
        /// The received byte had no valid stop bit.
        const FRAME = 1 << 2;
        /// The transmitter or receiver is disabled.
        const DISABLED = 1 << 3;
    }
}

impl ErrorMask {
    /// No error.
    pub const NONE: Self = Self::empty();

    /// Converts the mask into a [`Result`], which is `Ok` for
    /// [`ErrorMask::NONE`].
    pub const fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Display for ErrorMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return write!(f, "no error");
        }
        let mut separator = "";
        for (name, _) in self.iter_names() {
            let name = match name {
                "PARITY" => "parity error",
                "OVERRUN" => "data overrun",
                "FRAME" => "frame error",
                "DISABLED" => "direction disabled",
                other => other,
            };
            write!(f, "{separator}{name}")?;
            separator = ", ";
        }
        Ok(())
    }
}

impl Error for ErrorMask {}

#[cfg(feature = "defmt")]
impl defmt::Format for ErrorMask {
    fn format(&self, f: defmt::Formatter<'_>) {
        defmt::write!(f, "ErrorMask({=u8:#x})", self.bits());
    }
}

#[cfg(feature = "embedded-io")]
impl embedded_io::Error for ErrorMask {
    fn kind(&self) -> embedded_io::ErrorKind {
        if self.contains(Self::DISABLED) {
            embedded_io::ErrorKind::NotConnected
        } else {
            embedded_io::ErrorKind::InvalidData
        }
    }
}

/// The specified address is invalid because it is either null or doesn't offer
/// [`offsets::MAX`] subsequent addresses.
///
/// [`offsets::MAX`]: crate::hw::registers::offsets::MAX
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InvalidAddressError(pub(crate) MmioAddress);

impl Display for InvalidAddressError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "invalid register address: {:x?}", self.0)
    }
}

impl Error for InvalidAddressError {}

/// The divisor does not fit into the 12 bits of the baud rate register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DivisorOutOfRangeError(pub(crate) u16);

impl DivisorOutOfRangeError {
    /// Returns the rejected value.
    #[must_use]
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl Display for DivisorOutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "baud divisor {:#x} exceeds 12 bits", self.0)
    }
}

impl Error for DivisorOutOfRangeError {}

/// The parity field of the hardware holds the reserved encoding `0b01`.
///
/// [`Usart::configure`] never writes this encoding, so it only shows up if
/// something else touched the registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReservedParityError;

impl Display for ReservedParityError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "the parity mode register holds the reserved encoding")
    }
}

impl Error for ReservedParityError {}

/// Errors that happen when trying to receive a byte without blocking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteReceiveError {
    /// The receiver is disabled.
    Disabled,
    /// There is currently no data to read.
    NoData,
    /// A byte was received, but the hardware flagged it.
    Corrupted {
        /// The received byte.
        byte: u8,
        /// The hardware errors, never empty.
        errors: ErrorMask,
    },
}

impl Display for ByteReceiveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disabled => write!(f, "the receiver is disabled"),
            Self::NoData => write!(f, "there is no data to read"),
            Self::Corrupted { byte, errors } => {
                write!(f, "received byte {byte:#04x} with errors: {errors}")
            }
        }
    }
}

impl Error for ByteReceiveError {}

/// Errors that happen when trying to send a byte without blocking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteSendError {
    /// The transmitter is disabled.
    Disabled,
    /// There is currently no capacity to send another byte.
    ///
    /// The transmit buffer still holds the previous byte.
    NoCapacity,
}

impl Display for ByteSendError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Disabled => write!(f, "the transmitter is disabled"),
            Self::NoCapacity => write!(f, "the transmit buffer is full"),
        }
    }
}

impl Error for ByteSendError {}
