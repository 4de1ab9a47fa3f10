//! HX711 polling example for the Raspberry Pi.
//!
//! Wiring (BCM numbering): PD_SCK on GPIO6, DOUT on GPIO5.
//!
//! ```sh
//! RUST_LOG=info cargo run --example raspi --features rppal
//! ```

use std::thread;
use std::time::Duration;

use hx711::{rpi, LoadCell};
use log::{info, warn};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut scale = rpi::open("GPIO6", "GPIO5")?;

    // The chip powers itself down over any idle gap, so wake it first.
    scale.reset()?;
    scale.set_scale(1.0);

    loop {
        match scale.read_raw() {
            Ok(raw) => info!("raw reading = {raw}"),
            Err(hx711::Error::Timeout) => {
                warn!("chip not ready, resetting");
                scale.reset()?;
            }
            Err(e) => return Err(Box::new(e)),
        }
        thread::sleep(Duration::from_millis(100));
    }
}
