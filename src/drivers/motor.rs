use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::timer::simple_pwm::SimplePwm;
use embassy_stm32::timer::{Channel, CaptureCompare16bitInstance};
use micromath::F32Ext;

use crate::state::MotorOutput;

/// H-bridge pair: one PWM channel plus a direction pin per wheel and a shared
/// driver enable.
pub struct MotorDriver<'d, T: CaptureCompare16bitInstance> {
    pwm: SimplePwm<'d, T>,
    left_dir: Output<'d, AnyPin>,
    right_dir: Output<'d, AnyPin>,
    enable: Output<'d, AnyPin>,
    max_duty: u16,
}

const LEFT: Channel = Channel::Ch1;
const RIGHT: Channel = Channel::Ch2;

impl<'d, T: CaptureCompare16bitInstance> MotorDriver<'d, T> {
    pub fn new(
        mut pwm: SimplePwm<'d, T>,
        left_dir: Output<'d, AnyPin>,
        right_dir: Output<'d, AnyPin>,
        mut enable: Output<'d, AnyPin>,
    ) -> Self {
        enable.set_low();
        let max_duty = pwm.get_max_duty();
        pwm.set_duty(LEFT, 0);
        pwm.set_duty(RIGHT, 0);
        pwm.enable(LEFT);
        pwm.enable(RIGHT);
        Self {
            pwm,
            left_dir,
            right_dir,
            enable,
            max_duty,
        }
    }

    pub fn apply(&mut self, output: MotorOutput) {
        let finite = output.command.left.is_finite() && output.command.right.is_finite();
        if !output.enabled || !finite {
            self.pwm.set_duty(LEFT, 0);
            self.pwm.set_duty(RIGHT, 0);
            self.enable.set_low();
            return;
        }

        let left = self.duty(output.command.left);
        let right = self.duty(output.command.right);
        self.left_dir.set_level((output.command.left >= 0.0).into());
        // right motor is mounted mirrored
        self.right_dir.set_level((output.command.right < 0.0).into());
        self.pwm.set_duty(LEFT, left);
        self.pwm.set_duty(RIGHT, right);
        self.enable.set_high();
    }

    fn duty(&self, command: f32) -> u16 {
        (command.abs().min(1.0) * self.max_duty as f32) as u16
    }
}
