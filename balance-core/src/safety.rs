//! Safety envelope around the balance controller.
//!
//! The supervisor runs first in every cycle and is the only thing deciding
//! whether controller output reaches the motors. It has no timers: the start
//! threshold being tighter than the failure thresholds is the only hysteresis.

use micromath::F32Ext;

use crate::config::SafetyLimits;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SafetyState {
    /// Motors held at neutral.
    Disabled,
    /// Controller output drives the motors.
    Balancing,
}

impl SafetyState {
    pub fn is_balancing(self) -> bool {
        self == SafetyState::Balancing
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SafetyState::Disabled => "DISABLED",
            SafetyState::Balancing => "BALANCING",
        }
    }
}

/// Why balancing was given up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisableReason {
    /// Leaning past the recoverable angle.
    Fallen,
    /// The control error ran away.
    Diverged,
    LowBattery,
    /// The tilt estimate or its inputs are not finite numbers.
    InvalidEstimate,
    /// The IMU stopped delivering samples.
    SensorFault,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
    None,
    /// Disabled -> Balancing. Estimator and integrators must be reset.
    Engaged,
    /// Balancing -> Disabled.
    Disengaged(DisableReason),
}

pub struct SafetySupervisor {
    limits: SafetyLimits,
    state: SafetyState,
}

impl SafetySupervisor {
    pub fn new(limits: SafetyLimits) -> Self {
        Self {
            limits,
            state: SafetyState::Disabled,
        }
    }

    pub fn state(&self) -> SafetyState {
        self.state
    }

    /// Evaluate the envelope for this cycle.
    ///
    /// `angle` is the current estimate and `target_angle` the tilt the angle
    /// loop is currently aiming for, both in degrees.
    pub fn update(&mut self, angle: f32, target_angle: f32, battery_voltage: f32) -> Transition {
        let angle_error = (target_angle - angle).abs();
        let battery_ok = battery_voltage >= self.limits.min_battery_voltage;

        match self.state {
            SafetyState::Disabled => {
                if angle_error < self.limits.start_angle_error && battery_ok {
                    self.state = SafetyState::Balancing;
                    Transition::Engaged
                } else {
                    Transition::None
                }
            }
            SafetyState::Balancing => {
                // NaN fails every comparison below, so it is caught first.
                let reason = if !angle.is_finite() || !target_angle.is_finite() {
                    Some(DisableReason::InvalidEstimate)
                } else if angle.abs() > self.limits.max_angle {
                    Some(DisableReason::Fallen)
                } else if angle_error > self.limits.max_angle_error {
                    Some(DisableReason::Diverged)
                } else if !battery_ok {
                    Some(DisableReason::LowBattery)
                } else {
                    None
                };

                match reason {
                    Some(reason) => {
                        self.state = SafetyState::Disabled;
                        Transition::Disengaged(reason)
                    }
                    None => Transition::None,
                }
            }
        }
    }

    /// Drop to Disabled for a reason found outside the envelope check,
    /// e.g. a sensor sample that cannot be used.
    pub fn fault(&mut self, reason: DisableReason) -> Transition {
        match self.state {
            SafetyState::Balancing => {
                self.state = SafetyState::Disabled;
                Transition::Disengaged(reason)
            }
            SafetyState::Disabled => Transition::None,
        }
    }
}
