pub mod battery_task;
pub mod console_task;
pub mod control_loop;
pub mod motor_task;
pub mod telemetry_task;
