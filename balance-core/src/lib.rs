#![cfg_attr(not(test), no_std)]

//! Control core of the two-wheeled balancing robot.
//!
//! Everything in here is hardware independent and allocation free, so the same
//! code runs in the firmware's control loop and in host tests.
//!
//! ```text
//! accel tilt ─┐
//!             ├─ ComplementaryFilter ─ angle ─ SafetySupervisor ─┐
//! gyro rate ──┘                                                  │ Balancing
//! fwd/turn ─── ActuatorRamp ──────────── BalanceController ◄─────┘
//!                                               │
//!                                          MotorCommand
//! ```

#[macro_use]
mod log;

pub mod battery;
pub mod cascade;
pub mod config;
pub mod console;
pub mod cycle;
pub mod filter;
pub mod pid;
pub mod ramp;
pub mod safety;
pub mod tilt;

pub use cascade::{BalanceController, MotorCommand};
pub use config::{BalanceConfig, ConfigError, PidGains, RampSteps, SafetyLimits};
pub use cycle::{BalanceCycle, CycleInput, CycleOutput, GainUpdate, Loop};
pub use filter::ComplementaryFilter;
pub use pid::Pid;
pub use ramp::ActuatorRamp;
pub use safety::{DisableReason, SafetyState, SafetySupervisor, Transition};
