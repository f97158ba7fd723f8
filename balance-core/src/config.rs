//! Tuning constants of the robot, grouped per concern.
//!
//! `Default` carries the values the robot was tuned with. The firmware builds
//! one `BalanceConfig` at boot and hands it to [`crate::BalanceCycle::new`].

use core::fmt;

/// Gains and integrator clamp of one PID loop.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PidGains {
    pub p: f32,
    pub i: f32,
    pub d: f32,
    pub i_limit: f32,
}

impl PidGains {
    pub const fn new(p: f32, i: f32, d: f32, i_limit: f32) -> Self {
        Self { p, i, d, i_limit }
    }
}

/// Thresholds of the safety envelope, all in degrees except the voltage.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SafetyLimits {
    /// Balancing stops once the robot leans further than this.
    pub max_angle: f32,
    /// Balancing stops once |target - angle| grows past this.
    pub max_angle_error: f32,
    /// Balancing starts once |target - angle| is below this.
    pub start_angle_error: f32,
    /// Below this battery voltage the motors are never driven.
    pub min_battery_voltage: f32,
}

/// Per-cycle change allowed on the operator's forward and turn targets.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RampSteps {
    pub speed_acceleration: f32,
    pub turn_acceleration: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BalanceConfig {
    pub angle: PidGains,
    pub speed: PidGains,
    pub limits: SafetyLimits,
    pub ramp: RampSteps,
    /// Weight of the integrated gyro rate in the complementary filter.
    pub gyro_weight: f32,
    /// Tilt the angle loop aims for when the speed loop asks for nothing.
    pub nominal_tilt: f32,
    /// Bound applied to each wheel command.
    pub max_motor_speed: f32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            angle: PidGains::new(30.0, 2.5, 40.0, 15.0),
            speed: PidGains::new(800.0, 20.0, 0.0, 20.0),
            limits: SafetyLimits {
                max_angle: 20.0,
                max_angle_error: 50.0,
                start_angle_error: 3.0,
                min_battery_voltage: 10.5,
            },
            ramp: RampSteps {
                speed_acceleration: 0.003,
                turn_acceleration: 0.003,
            },
            gyro_weight: 0.999,
            nominal_tilt: 0.0,
            max_motor_speed: 1.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// A threshold that must be strictly positive is not.
    NonPositiveThreshold,
    /// The start threshold leaves no hysteresis against the failure threshold.
    NoHysteresis,
    /// The gyro weight must lie strictly between 0 and 1.
    GyroWeightOutOfRange,
    NegativeRampStep,
    NegativeIntegratorLimit,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConfigError::NonPositiveThreshold => "safety thresholds must be positive",
            ConfigError::NoHysteresis => "start angle error must be below max angle error",
            ConfigError::GyroWeightOutOfRange => "gyro weight must be in (0, 1)",
            ConfigError::NegativeRampStep => "ramp steps must not be negative",
            ConfigError::NegativeIntegratorLimit => "integrator limits must not be negative",
        };
        f.write_str(msg)
    }
}

impl BalanceConfig {
    /// Check the relations the control law relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let l = &self.limits;
        if !positive(l.max_angle)
            || !positive(l.max_angle_error)
            || !positive(l.start_angle_error)
            || !positive(l.min_battery_voltage)
            || !positive(self.max_motor_speed)
        {
            return Err(ConfigError::NonPositiveThreshold);
        }
        if l.start_angle_error >= l.max_angle_error {
            return Err(ConfigError::NoHysteresis);
        }
        if !(self.gyro_weight > 0.0 && self.gyro_weight < 1.0) {
            return Err(ConfigError::GyroWeightOutOfRange);
        }
        if !non_negative(self.ramp.speed_acceleration) || !non_negative(self.ramp.turn_acceleration) {
            return Err(ConfigError::NegativeRampStep);
        }
        if !non_negative(self.angle.i_limit) || !non_negative(self.speed.i_limit) {
            return Err(ConfigError::NegativeIntegratorLimit);
        }
        Ok(())
    }
}

// Both are false for NaN.
fn positive(x: f32) -> bool {
    x > 0.0
}

fn non_negative(x: f32) -> bool {
    x >= 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(BalanceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_default_matches_tuned_constants() {
        let c = BalanceConfig::default();
        assert_eq!(c.angle, PidGains::new(30.0, 2.5, 40.0, 15.0));
        assert_eq!(c.speed, PidGains::new(800.0, 20.0, 0.0, 20.0));
        assert_eq!(c.limits.min_battery_voltage, 10.5);
        assert_eq!(c.limits.max_angle, 20.0);
        assert_eq!(c.ramp.speed_acceleration, 0.003);
    }

    #[test]
    fn test_start_threshold_must_be_tighter() {
        let mut c = BalanceConfig::default();
        c.limits.start_angle_error = c.limits.max_angle_error;
        assert_eq!(c.validate(), Err(ConfigError::NoHysteresis));
    }

    #[test]
    fn test_gyro_weight_bounds() {
        let mut c = BalanceConfig::default();
        c.gyro_weight = 1.0;
        assert_eq!(c.validate(), Err(ConfigError::GyroWeightOutOfRange));
        c.gyro_weight = 0.0;
        assert_eq!(c.validate(), Err(ConfigError::GyroWeightOutOfRange));
    }

    #[test]
    fn test_rejects_negative_values() {
        let mut c = BalanceConfig::default();
        c.ramp.turn_acceleration = -0.1;
        assert_eq!(c.validate(), Err(ConfigError::NegativeRampStep));

        let mut c = BalanceConfig::default();
        c.speed.i_limit = -1.0;
        assert_eq!(c.validate(), Err(ConfigError::NegativeIntegratorLimit));

        let mut c = BalanceConfig::default();
        c.limits.min_battery_voltage = 0.0;
        assert_eq!(c.validate(), Err(ConfigError::NonPositiveThreshold));
    }

    #[test]
    fn test_rejects_nan() {
        let mut c = BalanceConfig::default();
        c.max_motor_speed = f32::NAN;
        assert_eq!(c.validate(), Err(ConfigError::NonPositiveThreshold));

        let mut c = BalanceConfig::default();
        c.angle.i_limit = f32::NAN;
        assert_eq!(c.validate(), Err(ConfigError::NegativeIntegratorLimit));
    }
}
