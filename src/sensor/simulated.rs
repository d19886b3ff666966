//! Software sensors for hosts without attached hardware
//!
//! Both sources random-walk around plausible values so consecutive telemetry
//! looks like a car on track rather than noise.

use super::{AnalogInput, ClimateReading, ClimateSensor, SensorError};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// DHT22 operating range
const TEMPERATURE_RANGE: (f32, f32) = (-40.0, 80.0);
const HUMIDITY_RANGE: (f32, f32) = (0.0, 100.0);

/// 12-bit ADC full scale
pub const ADC_FULL_SCALE: u16 = 4095;

fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Round to the DHT22's 0.1 resolution
fn round_tenth(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

/// Simulated DHT22 on a given data pin
pub struct SimulatedClimateSensor {
    pin: u8,
    temperature: f32,
    humidity: f32,
    dropout: f64,
    rng: StdRng,
}

impl SimulatedClimateSensor {
    pub fn new(pin: u8, dropout: f64, seed: Option<u64>) -> Self {
        Self {
            pin,
            temperature: 24.0,
            humidity: 60.0,
            dropout: dropout.clamp(0.0, 1.0),
            rng: rng_from(seed),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

#[async_trait]
impl ClimateSensor for SimulatedClimateSensor {
    async fn read(&mut self) -> Result<ClimateReading, SensorError> {
        // A failed transfer reads back as NaN, exactly like the real driver
        if self.dropout > 0.0 && self.rng.gen_bool(self.dropout) {
            return Ok(ClimateReading {
                temperature: f32::NAN,
                humidity: f32::NAN,
            });
        }

        self.temperature = (self.temperature + self.rng.gen_range(-0.3..=0.3))
            .clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);
        self.humidity = (self.humidity + self.rng.gen_range(-1.0..=1.0))
            .clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1);

        Ok(ClimateReading {
            temperature: round_tenth(self.temperature),
            humidity: round_tenth(self.humidity),
        })
    }
}

/// Simulated potentiometer on a given analog pin
pub struct SimulatedPotentiometer {
    pin: u8,
    position: i32,
    rng: StdRng,
}

impl SimulatedPotentiometer {
    pub fn new(pin: u8, seed: Option<u64>) -> Self {
        Self {
            pin,
            position: i32::from(ADC_FULL_SCALE / 2),
            rng: rng_from(seed.map(|s| s.wrapping_add(1))),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

#[async_trait]
impl AnalogInput for SimulatedPotentiometer {
    async fn read_raw(&mut self) -> Result<u16, SensorError> {
        self.position =
            (self.position + self.rng.gen_range(-200..=200)).clamp(0, i32::from(ADC_FULL_SCALE));
        Ok(self.position as u16)
    }
}
