//! A platform-agnostic driver for the HX711 24-bit load cell ADC.
//!
//! The HX711 speaks a two-wire, clock-driven serial protocol that has no
//! hardware peripheral behind it: the host bit-bangs a clock line (PD_SCK)
//! and shifts conversion data in on a data line (DOUT). This crate drives
//! that protocol through the `embedded-hal` 1.0 digital pin and delay
//! traits, so it runs anywhere those are implemented.
//!
//! The `rppal` feature adds ready-made bindings for the Raspberry Pi,
//! including resolving BCM pin names such as `"GPIO5"` and the one-time
//! `/dev/gpiomem` setup. See the `hx711::rpi` module.

#![cfg_attr(not(any(test, feature = "rppal")), no_std)]

pub mod hx711;

pub use crate::hx711::{
    parse_pin_name, EdgeInput, Error, GainMode, Hx711, InvalidPinName, SAMPLE_MAX, SAMPLE_MIN,
};

#[cfg(feature = "rppal")]
pub use crate::hx711::rpi;

/// Common interface for load cell frontends.
pub trait LoadCell {
    type Error;

    /// Read one raw two's-complement sample from the cell.
    fn read_raw(&mut self) -> Result<i32, Self::Error>;

    /// Read one sample and apply the offset/scale calibration transform.
    fn read_scaled(&mut self) -> Result<f32, Self::Error>;

    /// Get the zero offset subtracted from scaled readings.
    fn offset(&self) -> i32;

    /// Set the zero offset (AKA tare point).
    fn set_offset(&mut self, offset: i32);

    /// Get the scale divisor.
    fn scale(&self) -> f32;

    /// Set the scale divisor (AKA calibrate the scale).
    /// Use this to ensure that 1kg ~ 1kg.
    fn set_scale(&mut self, scale: f32);
}
