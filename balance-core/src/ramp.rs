use micromath::F32Ext;

use crate::config::RampSteps;

/// Rate limiter for the operator's forward and turn requests.
///
/// The angle loop reacts badly to steps in its target, so both commands only
/// move toward the request by a fixed amount per cycle.
#[derive(Clone, Debug)]
pub struct ActuatorRamp {
    steps: RampSteps,
    speed: f32,
    turn: f32,
}

impl ActuatorRamp {
    pub fn new(steps: RampSteps) -> Self {
        Self {
            steps,
            speed: 0.0,
            turn: 0.0,
        }
    }

    /// Advance one cycle toward the targets and return `(speed, turn)`.
    pub fn update(&mut self, target_speed: f32, target_turn: f32) -> (f32, f32) {
        self.speed = approach(self.speed, target_speed, self.steps.speed_acceleration);
        self.turn = approach(self.turn, target_turn, self.steps.turn_acceleration);
        (self.speed, self.turn)
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn reset(&mut self) {
        self.speed = 0.0;
        self.turn = 0.0;
    }
}

fn approach(current: f32, target: f32, step: f32) -> f32 {
    let step = step.abs();
    current + (target - current).max(-step).min(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(step: f32) -> ActuatorRamp {
        ActuatorRamp::new(RampSteps {
            speed_acceleration: step,
            turn_acceleration: step,
        })
    }

    #[test]
    fn test_speed_climbs_by_one_step_per_cycle() {
        let mut r = ramp(0.003);
        let mut prev = 0.0;
        for n in 1..=1_000 {
            let (speed, _) = r.update(100.0, 0.0);
            let expected = (n as f32 * 0.003).min(100.0);
            assert!((speed - expected).abs() < 1e-3, "cycle {}: {} vs {}", n, speed, expected);
            assert!(speed >= prev);
            assert!(speed <= 100.0);
            prev = speed;
        }
    }

    #[test]
    fn test_never_overshoots_target() {
        let mut r = ramp(0.4);
        let mut last = (0.0, 0.0);
        for _ in 0..10 {
            last = r.update(1.0, -1.0);
            assert!(last.0 <= 1.0);
            assert!(last.1 >= -1.0);
        }
        assert_eq!(last, (1.0, -1.0));
    }

    #[test]
    fn test_turn_follows_its_own_step() {
        let mut r = ActuatorRamp::new(RampSteps {
            speed_acceleration: 0.1,
            turn_acceleration: 0.5,
        });
        let (speed, turn) = r.update(1.0, 1.0);
        assert!((speed - 0.1).abs() < 1e-6);
        assert!((turn - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_negative_step_is_a_magnitude() {
        let mut r = ramp(-0.5);
        assert_eq!(r.update(1.0, -1.0), (0.5, -0.5));
    }

    #[test]
    fn test_reset_returns_to_standstill() {
        let mut r = ramp(1.0);
        r.update(3.0, 2.0);
        r.reset();
        assert_eq!(r.speed(), 0.0);
        // both start again from zero
        assert_eq!(r.update(3.0, 2.0), (1.0, 1.0));
    }
}
