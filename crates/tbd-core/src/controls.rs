//! Control-voltage and trigger sampling
//!
//! Controls are read once per engine block, not per frame, so changes are
//! quantized to 32-sample block boundaries at the internal rate. That matches
//! the cadence the engine expects its control inputs at.

use crate::types::{ControlVector, TriggerVector, NUM_TRIGGERS, VOLTAGE_SCALE};

/// Gate inputs above this voltage count as high
pub const GATE_THRESHOLD: f32 = 2.5;

/// Momentary buttons above this position count as pressed
pub const BUTTON_THRESHOLD: f32 = 0.5;

/// Trigger value stored for an asserted channel (active-low)
pub const TRIGGER_ACTIVE: u8 = 0;

/// Trigger value stored for an idle channel
pub const TRIGGER_IDLE: u8 = 1;

/// Raw control state read from the host for one block
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlInputs {
    /// CV input voltages (±5V)
    pub cv: [f32; 2],
    /// Potentiometer positions (0.0-1.0)
    pub pots: [f32; 2],
    /// Momentary trigger button positions (0.0 or 1.0)
    pub buttons: [f32; NUM_TRIGGERS],
    /// Gate input voltages
    pub gates: [f32; NUM_TRIGGERS],
}

impl ControlInputs {
    /// Pack the control vector in the engine's fixed order
    /// `[cv0, cv1, pot0, pot1]`
    pub fn control_vector(&self) -> ControlVector {
        [
            self.cv[0] / VOLTAGE_SCALE,
            self.cv[1] / VOLTAGE_SCALE,
            self.pots[0],
            self.pots[1],
        ]
    }

    /// Pack the trigger vector
    ///
    /// Each channel is button OR gate, stored inverted because the engine's
    /// trigger inputs are active-low.
    pub fn trigger_vector(&self) -> TriggerVector {
        let mut triggers = [TRIGGER_IDLE; NUM_TRIGGERS];
        for (i, trig) in triggers.iter_mut().enumerate() {
            let pressed = self.buttons[i] > BUTTON_THRESHOLD;
            let gated = self.gates[i] > GATE_THRESHOLD;
            *trig = if pressed || gated { TRIGGER_ACTIVE } else { TRIGGER_IDLE };
        }
        triggers
    }

    /// Sample both vectors at once (one block's worth of controls)
    pub fn sample(&self) -> (ControlVector, TriggerVector) {
        (self.control_vector(), self.trigger_vector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_trigger(button: f32, gate: f32) -> ControlInputs {
        ControlInputs {
            buttons: [button, 0.0],
            gates: [gate, 0.0],
            ..Default::default()
        }
    }

    #[test]
    fn test_trigger_inversion() {
        // button alone, gate alone, both: asserted (0)
        assert_eq!(with_trigger(1.0, 0.0).trigger_vector()[0], TRIGGER_ACTIVE);
        assert_eq!(with_trigger(0.0, 5.0).trigger_vector()[0], TRIGGER_ACTIVE);
        assert_eq!(with_trigger(1.0, 5.0).trigger_vector()[0], TRIGGER_ACTIVE);
        // neither: idle (1)
        assert_eq!(with_trigger(0.0, 0.0).trigger_vector()[0], TRIGGER_IDLE);
        // untouched second channel stays idle
        assert_eq!(with_trigger(1.0, 5.0).trigger_vector()[1], TRIGGER_IDLE);
    }

    #[test]
    fn test_gate_threshold_is_exclusive() {
        assert_eq!(with_trigger(0.0, 2.5).trigger_vector()[0], TRIGGER_IDLE);
        assert_eq!(with_trigger(0.0, 2.51).trigger_vector()[0], TRIGGER_ACTIVE);
        assert_eq!(with_trigger(0.5, 0.0).trigger_vector()[0], TRIGGER_IDLE);
    }

    #[test]
    fn test_control_vector_order() {
        let inputs = ControlInputs {
            cv: [5.0, -2.5],
            pots: [0.25, 0.75],
            ..Default::default()
        };
        assert_eq!(inputs.control_vector(), [1.0, -0.5, 0.25, 0.75]);
    }
}
