use micromath::F32Ext;

/// PID loop with a clamped integrator.
///
/// The error is scaled by `dt` before it enters any of the three terms, so
/// the I and D gains do not carry the textbook units. Tuned gains depend on
/// this, keep it.
#[derive(Clone, Debug)]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    i_limit: f32,
    integrated_error: f32,
    last_error: f32,
}

impl Pid {
    pub fn new(kp: f32, ki: f32, kd: f32, i_limit: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            i_limit,
            integrated_error: 0.0,
            last_error: 0.0,
        }
    }

    /// Run one step. `dt` is the elapsed time in seconds and must be positive.
    pub fn update(&mut self, target: f32, current: f32, dt: f32) -> f32 {
        let error = (target - current) * dt;

        let p_term = self.kp * error;

        let limit = self.i_limit.abs();
        // Total for any limit, negative or NaN included.
        self.integrated_error = (self.integrated_error + error).max(-limit).min(limit);
        let i_term = self.ki * self.integrated_error;

        let d_term = self.kd * (error - self.last_error);
        self.last_error = error;

        p_term + i_term + d_term
    }

    pub fn reset(&mut self) {
        self.integrated_error = 0.0;
        self.last_error = 0.0;
    }

    pub fn integrated_error(&self) -> f32 {
        self.integrated_error
    }

    pub fn p(&self) -> f32 {
        self.kp
    }

    pub fn set_p(&mut self, kp: f32) {
        self.kp = kp;
    }

    pub fn i(&self) -> f32 {
        self.ki
    }

    pub fn set_i(&mut self, ki: f32) {
        self.ki = ki;
    }

    pub fn d(&self) -> f32 {
        self.kd
    }

    pub fn set_d(&mut self, kd: f32) {
        self.kd = kd;
    }

    pub fn integrator_limit(&self) -> f32 {
        self.i_limit
    }

    pub fn set_integrator_limit(&mut self, limit: f32) {
        self.i_limit = limit;
    }
}

impl From<crate::config::PidGains> for Pid {
    fn from(g: crate::config::PidGains) -> Self {
        Self::new(g.p, g.i, g.d, g.i_limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_first_update_terms() {
        let mut pid = Pid::new(2.0, 3.0, 4.0, 100.0);
        // error = (10 - 4) * 0.5 = 3
        // p = 6, i = 9, d = 12
        let out = pid.update(10.0, 4.0, 0.5);
        assert!(approx_eq(out, 27.0));
        assert!(approx_eq(pid.integrated_error(), 3.0));
    }

    #[test]
    fn test_derivative_uses_scaled_error_delta() {
        let mut pid = Pid::new(0.0, 0.0, 1.0, 10.0);
        pid.update(1.0, 0.0, 0.1); // error 0.1
        let out = pid.update(3.0, 0.0, 0.1); // error 0.3
        assert!(approx_eq(out, 0.2));
    }

    #[test]
    fn test_integrator_saturates_positive() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 15.0);
        for _ in 0..10_000 {
            pid.update(5.0, 0.0, 0.01);
            assert!(pid.integrated_error() <= 15.0);
        }
        assert_eq!(pid.integrated_error(), 15.0);
        assert!(approx_eq(pid.update(5.0, 0.0, 0.01), 15.0));
    }

    #[test]
    fn test_integrator_saturates_negative() {
        let mut pid = Pid::new(0.0, 1.0, 0.0, 15.0);
        for _ in 0..10_000 {
            pid.update(-5.0, 0.0, 0.01);
            assert!(pid.integrated_error() >= -15.0);
        }
        assert_eq!(pid.integrated_error(), -15.0);
    }

    #[test]
    fn test_reset_matches_fresh_instance() {
        let inputs = [(1.0, 0.0), (0.5, 0.2), (-3.0, 1.0), (0.0, 0.0), (7.0, -2.0)];

        let mut used = Pid::new(30.0, 2.5, 40.0, 15.0);
        for (t, c) in inputs.iter() {
            used.update(*t * 5.0, *c, 0.02);
        }
        used.reset();

        let mut fresh = Pid::new(30.0, 2.5, 40.0, 15.0);
        for (t, c) in inputs.iter() {
            assert_eq!(used.update(*t, *c, 0.005), fresh.update(*t, *c, 0.005));
        }
    }

    #[test]
    fn test_gain_change_applies_on_next_update() {
        let mut pid = Pid::new(1.0, 0.0, 0.0, 1.0);
        assert!(approx_eq(pid.update(1.0, 0.0, 1.0), 1.0));
        pid.set_p(4.0);
        assert_eq!(pid.p(), 4.0);
        assert!(approx_eq(pid.update(1.0, 0.0, 1.0), 4.0));
    }

    #[test]
    fn test_negative_integrator_limit_acts_as_magnitude() {
        let mut pid = Pid::new(1.0, 1.0, 0.0, 15.0);
        pid.set_integrator_limit(-1.0);
        for _ in 0..500 {
            pid.update(1.0, 0.0, 0.01);
        }
        assert_eq!(pid.integrated_error(), 1.0);
        for _ in 0..500 {
            pid.update(-1.0, 0.0, 0.01);
        }
        assert_eq!(pid.integrated_error(), -1.0);
    }

    #[test]
    fn test_nan_integrator_limit_does_not_panic() {
        let mut pid = Pid::new(1.0, 1.0, 0.0, 15.0);
        pid.set_integrator_limit(f32::NAN);
        let out = pid.update(1.0, 0.0, 0.01);
        assert!(out.is_finite());
    }

    #[test]
    fn test_accessors_round_trip() {
        let mut pid = Pid::new(0.0, 0.0, 0.0, 0.0);
        pid.set_i(2.5);
        pid.set_d(40.0);
        pid.set_integrator_limit(15.0);
        assert_eq!((pid.i(), pid.d(), pid.integrator_limit()), (2.5, 40.0, 15.0));
    }
}
