use micromath::F32Ext;

use crate::config::BalanceConfig;
use crate::pid::Pid;

/// Left/right wheel speed command, normalized to `±max_motor_speed`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorCommand {
    pub left: f32,
    pub right: f32,
}

impl MotorCommand {
    pub const NEUTRAL: MotorCommand = MotorCommand {
        left: 0.0,
        right: 0.0,
    };

    /// Mean of both wheels, what the speed loop sees as forward speed.
    pub fn forward(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

/// Speed loop feeding the angle loop's setpoint.
///
/// On an inverted pendulum the way to accelerate is to lean, so the speed
/// loop output shifts the tilt the angle loop holds. It is never summed into
/// the motor command directly.
pub struct BalanceController {
    angle_pid: Pid,
    speed_pid: Pid,
    nominal_tilt: f32,
    max_motor_speed: f32,
    angle_target: f32,
}

impl BalanceController {
    pub fn new(config: &BalanceConfig) -> Self {
        Self {
            angle_pid: Pid::from(config.angle),
            speed_pid: Pid::from(config.speed),
            nominal_tilt: config.nominal_tilt,
            max_motor_speed: config.max_motor_speed,
            angle_target: config.nominal_tilt,
        }
    }

    /// One control step.
    ///
    /// * `angle` - fused tilt estimate, degrees
    /// * `wheel_speed` - measured or estimated forward speed
    /// * `target_speed`, `turn` - ramped operator request
    /// * `dt` - seconds since the last step, must be positive
    pub fn update(
        &mut self,
        angle: f32,
        wheel_speed: f32,
        target_speed: f32,
        turn: f32,
        dt: f32,
    ) -> MotorCommand {
        let tilt_offset = self.speed_pid.update(target_speed, wheel_speed, dt);
        self.angle_target = self.nominal_tilt + tilt_offset;

        let drive = self.angle_pid.update(self.angle_target, angle, dt);

        let limit = self.max_motor_speed.abs();
        MotorCommand {
            left: (drive + turn).max(-limit).min(limit),
            right: (drive - turn).max(-limit).min(limit),
        }
    }

    /// Tilt the angle loop aimed for on the last step.
    pub fn angle_target(&self) -> f32 {
        self.angle_target
    }

    pub fn reset(&mut self) {
        self.angle_pid.reset();
        self.speed_pid.reset();
        self.angle_target = self.nominal_tilt;
    }

    pub fn angle_pid(&self) -> &Pid {
        &self.angle_pid
    }

    pub fn angle_pid_mut(&mut self) -> &mut Pid {
        &mut self.angle_pid
    }

    pub fn speed_pid(&self) -> &Pid {
        &self.speed_pid
    }

    pub fn speed_pid_mut(&mut self) -> &mut Pid {
        &mut self.speed_pid
    }
}
