/// Complementary filter fusing accelerometer tilt with the gyro rate.
///
/// Short-term motion follows the integrated gyro, the accelerometer only
/// pulls the long-term bias back. The defining property is the 999:1 ratio
/// between the two.
pub struct ComplementaryFilter {
    gyro_weight: f32,
    accel_weight: f32,
    angle: f32,
}

impl ComplementaryFilter {
    pub const DEFAULT_GYRO_WEIGHT: f32 = 0.999;

    pub fn new(gyro_weight: f32) -> Self {
        Self {
            gyro_weight,
            accel_weight: 1.0 - gyro_weight,
            angle: 0.0,
        }
    }

    /// Fuse one sample and return the new estimate.
    ///
    /// * `absolute_angle` - tilt from the accelerometer, degrees
    /// * `angular_rate` - gyro rate around the same axis, degrees/s
    /// * `dt` - seconds since the previous call, must be positive
    ///
    /// A sample that would make the estimate non-finite is ignored and the
    /// previous estimate returned, so one bad read cannot poison the state.
    pub fn calculate(&mut self, absolute_angle: f32, angular_rate: f32, dt: f32) -> f32 {
        let angle = self.gyro_weight * (self.angle + angular_rate * dt)
            + self.accel_weight * absolute_angle;
        if angle.is_finite() {
            self.angle = angle;
        }
        self.angle
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn reset(&mut self) {
        self.angle = 0.0;
    }
}

impl Default for ComplementaryFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_GYRO_WEIGHT)
    }
}

/// First order low pass, seeded with the first sample.
pub struct LowPassFilter {
    alpha: f32,
    output: Option<f32>,
}

impl LowPassFilter {
    pub fn new(alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            output: None,
        }
    }

    pub fn filter(&mut self, input: f32) -> f32 {
        let out = match self.output {
            None => input,
            Some(prev) => prev + self.alpha * (input - prev),
        };
        self.output = Some(out);
        out
    }

}
