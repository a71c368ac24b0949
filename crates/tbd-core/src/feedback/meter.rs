//! Peak level meter

/// Release speed in 1/s
const LAMBDA: f32 = 30.0;

/// Peak-follow meter: jumps up to any louder sample at once, falls back
/// exponentially with a rate of [`LAMBDA`] per second.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PeakMeter {
    value: f32,
}

impl PeakMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample taken `delta_time` seconds after the previous one
    pub fn process(&mut self, delta_time: f32, sample: f32) {
        let level = sample.abs();
        if level >= self.value {
            self.value = level;
        } else {
            self.value += (level - self.value) * LAMBDA * delta_time;
        }
    }

    /// Current peak amplitude
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Peak in dB mapped linearly from `[db_min, db_max]` to `[0, 1]`
    pub fn brightness(&self, db_min: f32, db_max: f32) -> f32 {
        if self.value <= 0.0 {
            return 0.0;
        }
        let db = 20.0 * self.value.log10();
        if db >= db_max {
            return 1.0;
        }
        ((db - db_min) / (db_max - db_min)).clamp(0.0, 1.0)
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}
