//! Potentiometer-to-speed mapping

/// Linear integer mapping from the raw analog range onto a speed range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedSimulator {
    in_min: i32,
    in_max: i32,
    out_min: i32,
    out_max: i32,
}

impl Default for SpeedSimulator {
    /// 12-bit ADC onto 0..=250 km/h
    fn default() -> Self {
        Self::new(0, 4095, 0, 250)
    }
}

impl SpeedSimulator {
    pub fn new(in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> Self {
        Self {
            in_min,
            in_max,
            out_min,
            out_max,
        }
    }

    /// Speed for a raw analog sample
    pub fn speed_for(&self, raw: u16) -> i32 {
        Self::scale(
            i32::from(raw),
            self.in_min,
            self.in_max,
            self.out_min,
            self.out_max,
        )
    }

    /// Integer linear interpolation with truncating division, no clamping.
    ///
    /// A degenerate input range yields `out_min`.
    pub fn scale(raw: i32, in_min: i32, in_max: i32, out_min: i32, out_max: i32) -> i32 {
        if in_max == in_min {
            return out_min;
        }
        let numerator = (i64::from(raw) - i64::from(in_min)) * (i64::from(out_max) - i64::from(out_min));
        let scaled = numerator / (i64::from(in_max) - i64::from(in_min)) + i64::from(out_min);
        scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
    }
}
