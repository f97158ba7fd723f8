//! Turns raw IMU vectors into the two scalars the filter consumes.

use micromath::F32Ext;

/// How the IMU sits in the chassis.
///
/// Angles follow the robot's convention: negative when leaning forward,
/// positive when leaning backward.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TiltAxes {
    /// Accelerometer axis pointing toward the front of the robot.
    pub accel_forward: usize,
    /// Accelerometer axis pointing up when the robot is upright.
    pub accel_up: usize,
    /// Gyro axis the robot pitches around.
    pub gyro_axis: usize,
    /// +1.0 or -1.0 so that leaning forward gives a negative rate.
    pub gyro_sign: f32,
}

impl Default for TiltAxes {
    /// X forward, Y left, Z up.
    fn default() -> Self {
        Self {
            accel_forward: 0,
            accel_up: 2,
            gyro_axis: 1,
            gyro_sign: -1.0,
        }
    }
}

impl TiltAxes {
    /// Tilt from the gravity vector, degrees. Any accel unit works.
    ///
    /// `None` when the vector carries no direction: both tilt-plane
    /// components zero (a dead bus reads as all zeros) or not finite.
    pub fn absolute_angle(&self, accel: [f32; 3]) -> Option<f32> {
        let forward = accel[self.accel_forward];
        let up = accel[self.accel_up];
        if !forward.is_finite() || !up.is_finite() || (forward == 0.0 && up == 0.0) {
            return None;
        }
        let angle = forward.atan2(up).to_degrees();
        angle.is_finite().then_some(angle)
    }

    /// Pitch rate in the same unit as `gyro`, sign adjusted.
    pub fn angular_rate(&self, gyro: [f32; 3]) -> f32 {
        gyro[self.gyro_axis] * self.gyro_sign
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upright_is_zero() {
        let axes = TiltAxes::default();
        let angle = axes.absolute_angle([0.0, 0.0, 1.0]).unwrap();
        assert!(angle.abs() < 1e-4);
    }

    #[test]
    fn test_leaning_forward_is_negative() {
        let axes = TiltAxes::default();
        // nose 30 deg down: gravity reaction has a backward x component
        let a = 30f32.to_radians();
        let angle = axes.absolute_angle([-a.sin(), 0.0, a.cos()]).unwrap();
        assert!((angle + 30.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_or_invalid_gravity_has_no_angle() {
        let axes = TiltAxes::default();
        assert_eq!(axes.absolute_angle([0.0, 0.0, 0.0]), None);
        // only the off-plane axis reads: still no tilt information
        assert_eq!(axes.absolute_angle([0.0, 1.0, 0.0]), None);
        assert_eq!(axes.absolute_angle([f32::NAN, 0.0, 1.0]), None);
        assert_eq!(axes.absolute_angle([0.0, 0.0, f32::INFINITY]), None);
    }

    #[test]
    fn test_lying_flat_on_front_is_valid() {
        let axes = TiltAxes::default();
        let angle = axes.absolute_angle([-1.0, 0.0, 0.0]).unwrap();
        assert!((angle + 90.0).abs() < 0.5);
    }

    #[test]
    fn test_rate_sign_follows_mounting() {
        let axes = TiltAxes::default();
        assert_eq!(axes.angular_rate([0.0, 12.0, 3.0]), -12.0);

        let flipped = TiltAxes {
            gyro_sign: 1.0,
            ..TiltAxes::default()
        };
        assert_eq!(flipped.angular_rate([0.0, 12.0, 3.0]), 12.0);
    }
}
