//! Raspberry Pi bindings built on `rppal`.
//!
//! The HX711 in its most common hobbyist home: two header pins on a Pi,
//! driven from userspace through `/dev/gpiomem`. [`host_init`] opens the
//! GPIO device once per process and [`open`] claims a pin pair by BCM
//! name, yielding a ready-to-use [`Hx711`].

use std::fmt;
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use rppal::gpio::{Gpio, Trigger};
use rppal::hal::Delay;

use super::{parse_pin_name, EdgeInput, Hx711};

/// Driver wired to Raspberry Pi GPIO pins.
pub type RpiHx711 = Hx711<ClockPin, DataPin, Delay>;

/// Construction failures.
#[derive(Debug)]
pub enum ConfigError {
    /// A pin name did not parse as a BCM pin number.
    InvalidPinName(String),
    /// The GPIO device could not be opened or a pin could not be claimed.
    Gpio(rppal::gpio::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPinName(name) => {
                write!(f, "invalid pin name {name:?} (expected e.g. \"5\" or \"GPIO5\")")
            }
            ConfigError::Gpio(e) => write!(f, "gpio error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPinName(_) => None,
            ConfigError::Gpio(e) => Some(e),
        }
    }
}

impl From<rppal::gpio::Error> for ConfigError {
    fn from(e: rppal::gpio::Error) -> Self {
        ConfigError::Gpio(e)
    }
}

/// Pin operation failure, satisfying the `embedded-hal` error contract.
#[derive(Debug)]
pub struct GpioError(pub rppal::gpio::Error);

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for GpioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl digital::Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

static GPIO: OnceLock<Gpio> = OnceLock::new();
static GPIO_INIT: Mutex<()> = Mutex::new(());

/// Open the memory-mapped GPIO device.
///
/// Must succeed before any pins can be claimed; idempotent, so later
/// calls return the handle already opened. A failed open is not cached,
/// so the call can be retried. The handle lives for the rest of the
/// process.
pub fn host_init() -> Result<&'static Gpio, ConfigError> {
    if let Some(gpio) = GPIO.get() {
        return Ok(gpio);
    }
    // First-time opens are serialized so racing callers cannot construct
    // a second device handle behind the winner's back.
    let _guard = GPIO_INIT.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(gpio) = GPIO.get() {
        return Ok(gpio);
    }
    let gpio = Gpio::new()?;
    Ok(GPIO.get_or_init(|| gpio))
}

/// Claim a clock/data pin pair by BCM name and build a driver.
///
/// Accepts names like `"6"` or `"GPIO6"`. The clock pin is configured as
/// an output driven low, the data pin as an input. Opens the GPIO device
/// first if [`host_init`] has not been called yet.
///
/// ```no_run
/// let mut scale = hx711::rpi::open("GPIO6", "GPIO5")?;
/// scale.reset()?;
/// let raw = scale.read_raw()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn open(clock_pin: &str, data_pin: &str) -> Result<RpiHx711, ConfigError> {
    let gpio = host_init()?;
    let clock = parse_pin_name(clock_pin)
        .map_err(|_| ConfigError::InvalidPinName(clock_pin.to_owned()))?;
    let data =
        parse_pin_name(data_pin).map_err(|_| ConfigError::InvalidPinName(data_pin.to_owned()))?;
    let sck = ClockPin(gpio.get(clock)?.into_output_low());
    let dout = DataPin(gpio.get(data)?.into_input());
    Ok(Hx711::new(sck, dout, Delay::new()))
}

/// PD_SCK on a Pi GPIO output.
pub struct ClockPin(rppal::gpio::OutputPin);

impl ErrorType for ClockPin {
    type Error = GpioError;
}

impl OutputPin for ClockPin {
    fn set_low(&mut self) -> Result<(), GpioError> {
        self.0.set_low();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), GpioError> {
        self.0.set_high();
        Ok(())
    }
}

/// DOUT on a Pi GPIO input, with the falling-edge latch backed by the
/// kernel's line-event queue.
pub struct DataPin(rppal::gpio::InputPin);

impl ErrorType for DataPin {
    type Error = GpioError;
}

impl InputPin for DataPin {
    fn is_high(&mut self) -> Result<bool, GpioError> {
        Ok(self.0.is_high())
    }

    fn is_low(&mut self) -> Result<bool, GpioError> {
        Ok(self.0.is_low())
    }
}

impl EdgeInput for DataPin {
    fn listen_falling_edge(&mut self) -> Result<(), GpioError> {
        self.0
            .set_interrupt(Trigger::FallingEdge, None)
            .map_err(GpioError)
    }

    fn unlisten(&mut self) -> Result<(), GpioError> {
        self.0.clear_interrupt().map_err(GpioError)
    }

    fn edge_detected(&mut self) -> Result<bool, GpioError> {
        // Edges are queued by the kernel while armed, so a zero timeout
        // is a pure "has one happened yet" check.
        let event = self
            .0
            .poll_interrupt(true, Some(Duration::ZERO))
            .map_err(GpioError)?;
        Ok(event.is_some())
    }
}
