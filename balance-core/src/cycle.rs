//! One control cycle, executed in a fixed order:
//! filter -> supervisor -> ramp -> cascade -> motor command.
//!
//! `BalanceCycle` owns every piece of control state, so nothing else mutates
//! it and no locking is needed. Tuning requests are applied between cycles via
//! [`BalanceCycle::apply_gains`].

use crate::cascade::{BalanceController, MotorCommand};
use crate::config::BalanceConfig;
use crate::filter::ComplementaryFilter;
use crate::ramp::ActuatorRamp;
use crate::safety::{DisableReason, SafetyState, SafetySupervisor, Transition};

/// Sensor and operator inputs of one cycle.
#[derive(Clone, Copy, Debug, Default)]
pub struct CycleInput {
    /// Accelerometer tilt, degrees.
    pub absolute_angle: f32,
    /// Gyro rate around the tilt axis, degrees/s.
    pub angular_rate: f32,
    /// Seconds since the previous cycle, must be positive.
    pub dt: f32,
    pub battery_voltage: f32,
    /// Measured or estimated forward wheel speed.
    pub wheel_speed: f32,
    pub target_speed: f32,
    pub target_turn: f32,
}

impl CycleInput {
    /// Every field finite and `dt` positive. Battery voltage is left to the
    /// supervisor, which treats NaN as a flat pack.
    pub fn is_usable(&self) -> bool {
        self.absolute_angle.is_finite()
            && self.angular_rate.is_finite()
            && self.dt.is_finite()
            && self.dt > 0.0
            && self.wheel_speed.is_finite()
            && self.target_speed.is_finite()
            && self.target_turn.is_finite()
    }
}

#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleOutput {
    pub angle: f32,
    pub angle_target: f32,
    pub state: SafetyState,
    pub transition: Transition,
    pub motors: MotorCommand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Loop {
    Angle,
    Speed,
}

/// A single gain change requested by a tuning collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GainUpdate {
    P(Loop, f32),
    I(Loop, f32),
    D(Loop, f32),
    ILimit(Loop, f32),
}

impl GainUpdate {
    pub fn target(&self) -> Loop {
        match *self {
            GainUpdate::P(lp, _)
            | GainUpdate::I(lp, _)
            | GainUpdate::D(lp, _)
            | GainUpdate::ILimit(lp, _) => lp,
        }
    }
}

pub struct BalanceCycle {
    filter: ComplementaryFilter,
    supervisor: SafetySupervisor,
    ramp: ActuatorRamp,
    controller: BalanceController,
}

impl BalanceCycle {
    pub fn new(config: BalanceConfig) -> Self {
        Self {
            filter: ComplementaryFilter::new(config.gyro_weight),
            supervisor: SafetySupervisor::new(config.limits),
            ramp: ActuatorRamp::new(config.ramp),
            controller: BalanceController::new(&config),
        }
    }

    pub fn step(&mut self, input: &CycleInput) -> CycleOutput {
        if !input.is_usable() {
            let transition = self.disengage(DisableReason::InvalidEstimate);
            return CycleOutput {
                angle: self.filter.angle(),
                angle_target: self.controller.angle_target(),
                state: self.supervisor.state(),
                transition,
                motors: MotorCommand::NEUTRAL,
            };
        }

        let mut angle = self
            .filter
            .calculate(input.absolute_angle, input.angular_rate, input.dt);

        let transition = self.supervisor.update(
            angle,
            self.controller.angle_target(),
            input.battery_voltage,
        );

        match transition {
            Transition::Engaged => {
                info!("balancing engaged at {=f32} deg", angle);
                self.filter.reset();
                self.controller.reset();
                self.ramp.reset();
                angle = self.filter.angle();
            }
            Transition::Disengaged(reason) => {
                warn!("balancing disengaged: {}", reason);
            }
            Transition::None => {}
        }

        let motors = if self.supervisor.state().is_balancing() {
            let (speed, turn) = self.ramp.update(input.target_speed, input.target_turn);
            self.controller
                .update(angle, input.wheel_speed, speed, turn, input.dt)
        } else {
            // Integrators must not wind up against a robot lying on the floor.
            self.controller.reset();
            MotorCommand::NEUTRAL
        };

        CycleOutput {
            angle,
            angle_target: self.controller.angle_target(),
            state: self.supervisor.state(),
            transition,
            motors,
        }
    }

    /// Drop to Disabled outside the normal envelope checks, e.g. when the
    /// IMU stops answering.
    pub fn disengage(&mut self, reason: DisableReason) -> Transition {
        let transition = self.supervisor.fault(reason);
        if transition != Transition::None {
            warn!("balancing disengaged: {}", reason);
        }
        self.controller.reset();
        transition
    }

    pub fn apply_gains(&mut self, update: GainUpdate) {
        let pid = match update.target() {
            Loop::Angle => self.controller.angle_pid_mut(),
            Loop::Speed => self.controller.speed_pid_mut(),
        };
        match update {
            GainUpdate::P(_, v) => pid.set_p(v),
            GainUpdate::I(_, v) => pid.set_i(v),
            GainUpdate::D(_, v) => pid.set_d(v),
            GainUpdate::ILimit(_, v) => pid.set_integrator_limit(v),
        }
        info!("gains updated: {}", update);
    }

    pub fn state(&self) -> SafetyState {
        self.supervisor.state()
    }

    pub fn angle(&self) -> f32 {
        self.filter.angle()
    }

    pub fn controller(&self) -> &BalanceController {
        &self.controller
    }

    pub fn ramp(&self) -> &ActuatorRamp {
        &self.ramp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upright(voltage: f32) -> CycleInput {
        CycleInput {
            dt: 0.005,
            battery_voltage: voltage,
            ..CycleInput::default()
        }
    }

    #[test]
    fn test_neutral_while_disabled() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        let out = cycle.step(&upright(9.0));
        assert_eq!(out.state, SafetyState::Disabled);
        assert_eq!(out.motors, MotorCommand::NEUTRAL);
    }

    #[test]
    fn test_engage_resets_filter() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        let out = cycle.step(&CycleInput {
            absolute_angle: 1.0,
            angular_rate: 20.0,
            ..upright(12.0)
        });
        assert_eq!(out.transition, Transition::Engaged);
        assert_eq!(cycle.angle(), 0.0);
    }

    #[test]
    fn test_ramp_only_advances_while_balancing() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        let input = CycleInput {
            target_speed: 1.0,
            ..upright(9.0)
        };
        for _ in 0..10 {
            cycle.step(&input);
        }
        assert_eq!(cycle.ramp().speed(), 0.0);
    }

    #[test]
    fn test_integrators_held_reset_while_disabled() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        cycle.step(&upright(12.0));
        for _ in 0..50 {
            cycle.step(&CycleInput {
                absolute_angle: 2.0,
                ..upright(12.0)
            });
        }
        assert!(cycle.controller().angle_pid().integrated_error() != 0.0);

        cycle.step(&upright(9.0));
        assert_eq!(cycle.state(), SafetyState::Disabled);
        assert_eq!(cycle.controller().angle_pid().integrated_error(), 0.0);
        assert_eq!(cycle.controller().speed_pid().integrated_error(), 0.0);
    }

    #[test]
    fn test_apply_gains_targets_one_loop() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        cycle.apply_gains(GainUpdate::P(Loop::Angle, 12.0));
        cycle.apply_gains(GainUpdate::ILimit(Loop::Speed, 4.0));
        cycle.apply_gains(GainUpdate::D(Loop::Speed, 1.5));
        assert_eq!(cycle.controller().angle_pid().p(), 12.0);
        assert_eq!(cycle.controller().speed_pid().p(), 800.0);
        assert_eq!(cycle.controller().speed_pid().integrator_limit(), 4.0);
        assert_eq!(cycle.controller().speed_pid().d(), 1.5);
    }

    #[test]
    fn test_disengage_forces_neutral() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        cycle.step(&upright(12.0));
        assert_eq!(
            cycle.disengage(DisableReason::SensorFault),
            Transition::Disengaged(DisableReason::SensorFault)
        );
        assert_eq!(cycle.state(), SafetyState::Disabled);
        assert_eq!(cycle.disengage(DisableReason::SensorFault), Transition::None);
    }

    #[test]
    fn test_unusable_input_is_rejected() {
        assert!(upright(12.0).is_usable());
        assert!(!CycleInput { dt: 0.0, ..upright(12.0) }.is_usable());
        assert!(!CycleInput { absolute_angle: f32::NAN, ..upright(12.0) }.is_usable());
        assert!(!CycleInput { wheel_speed: f32::INFINITY, ..upright(12.0) }.is_usable());
        // a NaN battery reading is a supervisor matter, not a bad sample
        assert!(CycleInput { battery_voltage: f32::NAN, ..upright(12.0) }.is_usable());
    }

    #[test]
    fn test_nan_sample_disengages_with_neutral_output() {
        let mut cycle = BalanceCycle::new(BalanceConfig::default());
        cycle.step(&upright(12.0));
        let out = cycle.step(&CycleInput {
            absolute_angle: f32::NAN,
            ..upright(12.0)
        });
        assert_eq!(
            out.transition,
            Transition::Disengaged(DisableReason::InvalidEstimate)
        );
        assert_eq!(out.motors, MotorCommand::NEUTRAL);
        assert!(out.angle.is_finite());
    }
}
