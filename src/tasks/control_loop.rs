use embassy_executor::task;
use embassy_stm32::peripherals::SPI1;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, Ticker};

use balance_core::console::write_gains;
use balance_core::tilt::TiltAxes;
use balance_core::{BalanceConfig, BalanceCycle, CycleInput, DisableReason, MotorCommand};

use crate::drivers::imu::Imu;
use crate::state::{
    publish_motor_output, BatteryData, ControlRequest, MotorOutput, ReplyText, Telemetry,
};

/// Control cycle rate.
const CONTROL_LOOP_HZ: u64 = 200;
/// Bounds for the measured cycle time, seconds. Keeps `dt` positive.
const DT_MIN: f32 = 0.001;
const DT_MAX: f32 = 0.02;
/// Consecutive unusable IMU samples (bus error or an accel vector with no
/// direction) tolerated before the robot is disengaged.
const IMU_FAILURE_LIMIT: u8 = 5;

pub struct ControlLoopConfig {
    pub balance: BalanceConfig,
    pub axes: TiltAxes,
}

/// The only owner of the control state. Runs one `BalanceCycle::step` per
/// tick; everything else talks to it through channels.
#[task]
pub async fn control_loop_task(
    mut imu: Imu<'static, SPI1>,
    config: ControlLoopConfig,
    battery_rx: Receiver<'static, CriticalSectionRawMutex, BatteryData, 1>,
    request_rx: Receiver<'static, CriticalSectionRawMutex, ControlRequest, 4>,
    telemetry: &'static Signal<CriticalSectionRawMutex, Telemetry>,
    reply_tx: Sender<'static, CriticalSectionRawMutex, ReplyText, 2>,
) {
    let mut cycle = BalanceCycle::new(config.balance);
    let axes = config.axes;

    // Zero volts until the battery task reports: never engage blind.
    let mut battery = BatteryData::default();
    let mut target_speed = 0.0f32;
    let mut target_turn = 0.0f32;
    let mut last_command = MotorCommand::NEUTRAL;
    let mut imu_failures: u8 = 0;

    let mut ticker = Ticker::every(Duration::from_hz(CONTROL_LOOP_HZ));
    let mut last = Instant::now();

    defmt::info!("control loop running at {=u64} Hz", CONTROL_LOOP_HZ);

    loop {
        ticker.next().await;

        let start = Instant::now();

        // ── Inputs from other tasks, applied before the cycle ─────────────────
        if let Ok(b) = battery_rx.try_receive() {
            battery = b;
        }
        while let Ok(request) = request_rx.try_receive() {
            match request {
                ControlRequest::Gains(update) => cycle.apply_gains(update),
                ControlRequest::Forward(v) => target_speed = v,
                ControlRequest::Turn(v) => target_turn = v,
                ControlRequest::Stop => {
                    target_speed = 0.0;
                    target_turn = 0.0;
                }
                ControlRequest::ReportGains => {
                    let mut text = ReplyText::new();
                    if write_gains(&mut text, cycle.controller()).is_ok() {
                        let _ = reply_tx.try_send(text);
                    }
                }
            }
        }

        // ── Sensors ───────────────────────────────────────────────────────────
        // A stuck MISO line reads as all zeros, which has no tilt.
        let reading = imu
            .read_sample()
            .ok()
            .and_then(|s| axes.absolute_angle(s.accel).map(|angle| (angle, s.gyro)));
        let (absolute_angle, gyro) = match reading {
            Some(r) => {
                imu_failures = 0;
                r
            }
            None => {
                imu_failures = imu_failures.saturating_add(1);
                if imu_failures == IMU_FAILURE_LIMIT {
                    defmt::warn!("IMU samples unusable, motors off");
                    cycle.disengage(DisableReason::SensorFault);
                    last_command = MotorCommand::NEUTRAL;
                    publish_motor_output(MotorOutput::OFF);
                }
                continue;
            }
        };

        // Measured from the last cycle that actually ran, so skipped ticks are
        // still integrated by the filter.
        let dt = ((start - last).as_micros() as f32 / 1_000_000.0).clamp(DT_MIN, DT_MAX);
        last = start;

        // ── Control cycle ─────────────────────────────────────────────────────
        let out = cycle.step(&CycleInput {
            absolute_angle,
            angular_rate: axes.angular_rate(gyro),
            dt,
            battery_voltage: battery.voltage,
            // Open-loop drive: the last command is the best speed estimate.
            wheel_speed: last_command.forward(),
            target_speed,
            target_turn,
        });

        publish_motor_output(MotorOutput {
            command: out.motors,
            enabled: out.state.is_balancing(),
        });
        last_command = out.motors;

        // ── Telemetry (latest value wins) ─────────────────────────────────────
        telemetry.signal(Telemetry {
            angle: out.angle,
            angle_target: out.angle_target,
            state: out.state,
            motors: out.motors,
            battery_voltage: battery.voltage,
            loop_time_us: (Instant::now() - start).as_micros() as u32,
        });
    }
}
