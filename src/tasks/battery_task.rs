use embassy_executor::task;
use embassy_stm32::adc::{Adc, SampleTime};
use embassy_stm32::peripherals::{ADC1, PC0};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_time::{Duration, Ticker};

use balance_core::battery::BatteryMonitor;

use crate::state::BatteryData;

const BATTERY_HZ: u64 = 10;
/// Volts per ADC count through the pack divider. Calibrate against a
/// multimeter.
const VOLTAGE_CALIB_FACTOR: f32 = 0.00625;
const VOLTAGE_FILTER_ALPHA: f32 = 0.2;

/// Battery task: samples the pack voltage at 10 Hz for the control loop.
#[task]
pub async fn battery_task(
    mut adc: Adc<'static, ADC1>,
    mut pin: PC0,
    battery_tx: Sender<'static, CriticalSectionRawMutex, BatteryData, 1>,
) {
    adc.set_sample_time(SampleTime::Cycles480);
    let mut monitor = BatteryMonitor::new(VOLTAGE_CALIB_FACTOR, VOLTAGE_FILTER_ALPHA);

    let mut ticker = Ticker::every(Duration::from_hz(BATTERY_HZ));
    loop {
        ticker.next().await;

        let raw = adc.read(&mut pin);
        let voltage = monitor.update(raw);
        // Slot still full means the loop has not taken the previous reading;
        // this one is dropped and the next arrives one period later.
        let _ = battery_tx.try_send(BatteryData { voltage });
    }
}
