//! Indicator lights
//!
//! Two lights per module:
//!
//! - **RGB**: a blue attention pulse for half a second after the engine
//!   reports a status event; otherwise level metering (red = output,
//!   green = input).
//! - **WiFi**: a slow white ramp between 0.3 and 0.7 on the active instance,
//!   dark everywhere else.
//!
//! [`Feedback::update`] runs once per host tick and never allocates.

mod meter;

pub use meter::PeakMeter;

/// Metering floor in dB (brightness 0)
pub const METER_DB_MIN: f32 = -30.0;
/// Metering ceiling in dB (brightness 1)
pub const METER_DB_MAX: f32 = 0.0;

/// WiFi pulse lower bound
pub const PULSE_LOW: f32 = 0.3;
/// WiFi pulse upper bound; the phase wraps once it exceeds this
pub const PULSE_HIGH: f32 = 0.7;
/// WiFi pulse ramp speed per second
pub const PULSE_RATE: f32 = 0.25;

/// Light brightnesses for one tick, each channel in 0.0-1.0
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lights {
    /// Status light (red, green, blue)
    pub rgb: [f32; 3],
    /// Connectivity light (red, green, blue)
    pub wifi: [f32; 3],
}

/// Everything the lights react to on one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedbackInput {
    pub sample_rate: f32,
    pub sample_time: f32,
    /// Engine status flag for this tick
    pub status: bool,
    /// Sum of the two normalized input voltages
    pub input_level: f32,
    /// Sum of the two normalized output voltages
    pub output_level: f32,
    /// Whether this instance owns the configuration server
    pub active: bool,
}

/// Per-instance light state
#[derive(Debug, Clone)]
pub struct Feedback {
    attention: u32,
    input_meter: PeakMeter,
    output_meter: PeakMeter,
    pulse_phase: f32,
    lights: Lights,
}

impl Feedback {
    pub fn new() -> Self {
        Self {
            attention: 0,
            input_meter: PeakMeter::new(),
            output_meter: PeakMeter::new(),
            pulse_phase: PULSE_LOW,
            lights: Lights::default(),
        }
    }

    /// Ticks left in the attention pulse
    pub fn attention_remaining(&self) -> u32 {
        self.attention
    }

    pub fn lights(&self) -> Lights {
        self.lights
    }

    /// Advance one host tick and return the new light state
    ///
    /// A non-finite sample time counts as zero.
    pub fn update(&mut self, input: &FeedbackInput) -> Lights {
        let sample_time = if input.sample_time.is_finite() { input.sample_time } else { 0.0 };

        self.lights.wifi = if input.active {
            if self.pulse_phase.is_nan() || self.pulse_phase > PULSE_HIGH {
                self.pulse_phase = PULSE_LOW;
            }
            let shown = [self.pulse_phase; 3];
            self.pulse_phase += sample_time * PULSE_RATE;
            shown
        } else {
            [0.0; 3]
        };

        if input.status {
            // Re-arming restarts the full window
            self.attention = (input.sample_rate / 2.0).max(0.0) as u32;
        }

        self.lights.rgb = if self.attention > 0 {
            self.attention -= 1;
            [0.0, 0.0, 1.0]
        } else {
            self.input_meter.process(sample_time, input.input_level);
            self.output_meter.process(sample_time, input.output_level);
            [
                self.output_meter.brightness(METER_DB_MIN, METER_DB_MAX),
                self.input_meter.brightness(METER_DB_MIN, METER_DB_MAX),
                0.0,
            ]
        };

        self.lights
    }
}

impl Default for Feedback {
    fn default() -> Self {
        Self::new()
    }
}
