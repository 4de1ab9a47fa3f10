//! Bit-banged protocol driver for the HX711.
//!
//! The chip has no command interface: the host pulses PD_SCK and the chip
//! shifts one bit of the pending conversion out on DOUT per rising edge,
//! MSB first. The number of pulses sent beyond the 24 data bits selects
//! the gain and input channel of the *next* conversion. Readiness is
//! signalled by the chip driving DOUT low, and holding PD_SCK high for
//! more than 60 us powers the chip down.

use core::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

#[cfg(feature = "rppal")]
pub mod rpi;

/// Smallest raw sample the chip can produce (24-bit two's complement).
pub const SAMPLE_MIN: i32 = -(1 << 23);
/// Largest raw sample the chip can produce.
pub const SAMPLE_MAX: i32 = (1 << 23) - 1;

/// The time between PD_SCK edges should, per the datasheet, be at least
/// 200 ns and at most 50 us. 1 us keeps slow hosts comfortably inside that.
const SCK_DELAY_US: u32 = 1;

/// PD_SCK hold time for a power-cycle. The datasheet requires more than
/// 60 us; 70 us leaves margin.
const RESET_HOLD_US: u32 = 70;

/// How many times to check the edge latch while waiting for DOUT to drop,
/// and how long to sleep between checks. Without an interrupt path the
/// latch has to be re-read in a bounded loop; 1500 x 250 us gives a
/// ceiling of about 375 ms, several conversion periods at the slowest
/// 10 SPS rate.
const READY_RETRY_COUNT: u32 = 1500;
const READY_RETRY_DELAY_US: u32 = 250;

/// Gain and input channel for the next conversion, selected by the number
/// of extra clock pulses sent after the 24 data bits.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GainMode {
    /// Channel A, gain 128 (one extra pulse).
    A128 = 1,
    /// Channel B, gain 32 (two extra pulses).
    B32 = 2,
    /// Channel A, gain 64 (three extra pulses).
    A64 = 3,
}

/// Read-path failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// An operation on one of the pins failed.
    Pin(E),
    /// DOUT never signalled data-ready within the polling window.
    /// Usually a wiring fault or a chip left powered down; callers
    /// typically issue a [`Hx711::reset`] and retry.
    Timeout,
}

impl<E: fmt::Display> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Pin(e) => write!(f, "pin error: {e}"),
            Error::Timeout => write!(f, "timed out waiting for data ready"),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> core::error::Error for Error<E> {}

/// A digital input that can latch falling edges.
///
/// DOUT needs more than level reads: the data-ready wait arms a falling
/// edge latch so a short ready pulse between two polls is not missed.
/// Platforms with real edge interrupts can back this with them; the
/// driver only ever uses it through a bounded polling loop.
pub trait EdgeInput: InputPin {
    /// Start latching falling edges on this pin.
    fn listen_falling_edge(&mut self) -> Result<(), Self::Error>;

    /// Stop latching edges and clear any pending latch.
    fn unlisten(&mut self) -> Result<(), Self::Error>;

    /// Take the latch: returns whether a falling edge was seen since the
    /// last call, clearing the flag.
    fn edge_detected(&mut self) -> Result<bool, Self::Error>;
}

/// Malformed pin name passed to [`parse_pin_name`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidPinName;

impl fmt::Display for InvalidPinName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin name is not a valid BCM pin number")
    }
}

impl core::error::Error for InvalidPinName {}

/// Parse a pin name in BCM numbering, e.g. `"5"` or `"GPIO5"`.
///
/// The `GPIO` prefix printed on most breakout boards is accepted and
/// stripped; anything that does not then parse as a pin number fails.
pub fn parse_pin_name(name: &str) -> Result<u8, InvalidPinName> {
    let digits = name.strip_prefix("GPIO").unwrap_or(name);
    digits.parse().map_err(|_| InvalidPinName)
}

/// HX711 driver over two GPIO lines.
///
/// `Sck` is the clock output (PD_SCK), `Dt` the data input (DOUT). The
/// pins are owned exclusively; the protocol is not safe to interleave
/// from multiple threads, so a driver instance must be serialized by its
/// owner.
pub struct Hx711<Sck, Dt, Delay> {
    sck_pin: Sck,
    dt_pin: Dt,
    delay: Delay,
    gain_mode: GainMode,
    offset: i32,
    scale: f32,
}

impl<Sck, Dt, Delay, E> Hx711<Sck, Dt, Delay>
where
    Sck: OutputPin<Error = E>,
    Dt: InputPin<Error = E> + EdgeInput,
    Delay: DelayNs,
{
    /// Create a driver from configured pins.
    ///
    /// The data pin must already be an input and the clock pin an output.
    /// Defaults to channel A with gain 128. Call [`Self::reset`] before
    /// the first read: the chip enters power-down whenever PD_SCK sits
    /// high for 60 us, including before the host has driven it at all.
    pub fn new(sck_pin: Sck, dt_pin: Dt, delay: Delay) -> Self {
        Self {
            sck_pin,
            dt_pin,
            delay,
            gain_mode: GainMode::A128,
            offset: 0,
            scale: 1.0,
        }
    }

    /// Power-cycle the chip.
    ///
    /// Drives PD_SCK low, high for 70 us, then low again, clearing any
    /// power-down latch. Needed before the first read and again after
    /// any period of 60 us or more without clock activity, since the
    /// chip powers itself down over such a gap.
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(RESET_HOLD_US);
        self.sck_pin.set_low().map_err(Error::Pin)?;
        Ok(())
    }

    /// Start powering the chip down by driving PD_SCK high and leaving
    /// it there. The chip is in its low-current state once the line has
    /// been high for 60 us; this call only initiates the condition, the
    /// caller waits out the interval if it must be guaranteed.
    pub fn power_down(&mut self) -> Result<(), Error<E>> {
        self.sck_pin.set_high().map_err(Error::Pin)
    }

    /// Whether a conversion is waiting to be clocked out (DOUT low).
    pub fn is_ready(&mut self) -> Result<bool, Error<E>> {
        self.dt_pin.is_low().map_err(Error::Pin)
    }

    /// Get the gain and channel the next conversion will use.
    pub fn gain_mode(&self) -> GainMode {
        self.gain_mode
    }

    /// Select gain and channel. Takes effect on the conversion after the
    /// next completed read, since the selection rides on its end pulses.
    pub fn set_gain_mode(&mut self, gain_mode: GainMode) {
        self.gain_mode = gain_mode;
    }

    /// Read one raw sample, blocking until the chip is ready.
    ///
    /// Waits for DOUT to drop (bounded, roughly 375 ms at worst), clocks
    /// out 24 data bits plus the gain-select pulses, and sign-extends the
    /// 24-bit two's-complement result. On [`Error::Timeout`] no data
    /// pulses have been sent, so the chip's shift register is untouched
    /// and the driver stays usable.
    pub fn read_raw(&mut self) -> Result<i32, Error<E>> {
        self.wait_for_ready()?;

        // A preemption while PD_SCK is high could stretch the pulse past
        // the 60 us power-down threshold and corrupt the sample, so the
        // whole shift runs with interrupts masked.
        let raw = critical_section::with(|_| -> Result<u32, Error<E>> {
            let mut raw: u32 = 0;
            for _ in 0..24 {
                // bits arrive MSB first
                raw = (raw << 1) | u32::from(self.read_bit()?);
            }
            // select gain and channel for the next conversion
            for _ in 0..self.gain_mode as u8 {
                self.toggle_sck()?;
            }
            Ok(raw)
        })?;

        Ok(extend_sign(raw))
    }

    /// Wait for DOUT to go low sans interrupts: arm the falling-edge
    /// latch, then poll it with a fixed retry budget. The latch is always
    /// disarmed on the way out, success or not, so it never bleeds into
    /// later reads.
    fn wait_for_ready(&mut self) -> Result<(), Error<E>> {
        self.dt_pin.listen_falling_edge().map_err(Error::Pin)?;
        let waited = self.poll_until_ready();
        let unlistened = self.dt_pin.unlisten().map_err(Error::Pin);
        waited.and(unlistened)
    }

    fn poll_until_ready(&mut self) -> Result<(), Error<E>> {
        // The bit clocking below requires PD_SCK low before the first
        // rising edge.
        self.sck_pin.set_low().map_err(Error::Pin)?;
        // The conversion may have finished before the latch was armed.
        if self.dt_pin.is_low().map_err(Error::Pin)? {
            return Ok(());
        }
        for _ in 0..READY_RETRY_COUNT {
            if self.dt_pin.edge_detected().map_err(Error::Pin)? {
                return Ok(());
            }
            self.delay.delay_us(READY_RETRY_DELAY_US);
        }
        Err(Error::Timeout)
    }

    /// One clock pulse, sampling DOUT while PD_SCK is high.
    fn read_bit(&mut self) -> Result<bool, Error<E>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(SCK_DELAY_US);

        let bit = self.dt_pin.is_high().map_err(Error::Pin)?;

        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(SCK_DELAY_US);

        Ok(bit)
    }

    /// One clock pulse with no data sampled.
    fn toggle_sck(&mut self) -> Result<(), Error<E>> {
        self.sck_pin.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(SCK_DELAY_US);
        self.sck_pin.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(SCK_DELAY_US);
        Ok(())
    }
}

impl<Sck, Dt, Delay, E> crate::LoadCell for Hx711<Sck, Dt, Delay>
where
    Sck: OutputPin<Error = E>,
    Dt: InputPin<Error = E> + EdgeInput,
    Delay: DelayNs,
{
    type Error = Error<E>;

    fn read_raw(&mut self) -> Result<i32, Self::Error> {
        Hx711::read_raw(self)
    }

    fn read_scaled(&mut self) -> Result<f32, Self::Error> {
        let raw = Hx711::read_raw(self)?;
        Ok((raw - self.offset) as f32 / self.scale)
    }

    fn offset(&self) -> i32 {
        self.offset
    }

    fn set_offset(&mut self, offset: i32) {
        self.offset = offset;
    }

    fn scale(&self) -> f32 {
        self.scale
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }
}

/// Sign-extend a 24-bit two's-complement value to an `i32`.
fn extend_sign(raw: u32) -> i32 {
    let raw = raw & 0x00ff_ffff;
    if raw & 0x0080_0000 != 0 {
        // negative, fill the high byte with ones
        (raw | 0xff00_0000) as i32
    } else {
        raw as i32
    }
}
