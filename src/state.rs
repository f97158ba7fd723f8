//! Data exchanged between tasks.
//!
//! The control loop is the only owner of control state. Everything here is a
//! `Copy` snapshot sent over channels or parked in a critical-section cell.

use core::cell::Cell;

use balance_core::cycle::GainUpdate;
use balance_core::{MotorCommand, SafetyState};
use critical_section::Mutex;

/// Text sent back to the console (gain listings, command errors).
pub type ReplyText = heapless::String<128>;

#[derive(Clone, Copy, Default)]
pub struct BatteryData {
    pub voltage: f32,
}

/// Requests for the control loop, applied between two cycles.
#[derive(Clone, Copy)]
pub enum ControlRequest {
    Gains(GainUpdate),
    Forward(f32),
    Turn(f32),
    Stop,
    ReportGains,
}

/// Snapshot of the last control cycle for the debug stream.
#[derive(Clone, Copy)]
pub struct Telemetry {
    pub angle: f32,
    pub angle_target: f32,
    pub state: SafetyState,
    pub motors: MotorCommand,
    pub battery_voltage: f32,
    pub loop_time_us: u32,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            angle: 0.0,
            angle_target: 0.0,
            state: SafetyState::Disabled,
            motors: MotorCommand::NEUTRAL,
            battery_voltage: 0.0,
            loop_time_us: 0,
        }
    }
}

/// What the motor task drives. `enabled` is false whenever the supervisor
/// is not balancing.
#[derive(Clone, Copy)]
pub struct MotorOutput {
    pub command: MotorCommand,
    pub enabled: bool,
}

impl MotorOutput {
    pub const OFF: MotorOutput = MotorOutput {
        command: MotorCommand::NEUTRAL,
        enabled: false,
    };
}

static MOTOR_OUTPUT: Mutex<Cell<MotorOutput>> = Mutex::new(Cell::new(MotorOutput::OFF));

pub fn publish_motor_output(output: MotorOutput) {
    critical_section::with(|cs| MOTOR_OUTPUT.borrow(cs).set(output));
}

pub fn latest_motor_output() -> MotorOutput {
    critical_section::with(|cs| MOTOR_OUTPUT.borrow(cs).get())
}
