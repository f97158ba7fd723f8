use embassy_executor::task;
use embassy_stm32::peripherals::TIM3;
use embassy_time::{Duration, Ticker};

use crate::drivers::motor::MotorDriver;
use crate::state::latest_motor_output;

const MOTOR_UPDATE_HZ: u64 = 1000;

/// Motor task: copies the control loop's latest output to the H-bridges.
#[task]
pub async fn motor_task(mut driver: MotorDriver<'static, TIM3>) {
    let mut ticker = Ticker::every(Duration::from_hz(MOTOR_UPDATE_HZ));
    loop {
        ticker.next().await;
        driver.apply(latest_motor_output());
    }
}
