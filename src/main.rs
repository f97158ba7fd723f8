#![no_std]
#![no_main]

mod board;
mod drivers;
mod state;
mod tasks;
mod usb;

use embassy_executor::Spawner;
use embassy_stm32::adc::Adc;
use embassy_stm32::gpio::{Level, Output, OutputType, Pin, Speed};
use embassy_stm32::spi::{Config as SpiConfig, Spi};
use embassy_stm32::time::Hertz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_stm32::timer::CountingMode;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Timer};
use {defmt_rtt as _, panic_probe as _};

use balance_core::console::DebugView;
use balance_core::tilt::TiltAxes;
use balance_core::BalanceConfig;

use crate::board::Board;
use crate::drivers::imu::Imu;
use crate::drivers::motor::MotorDriver;
use crate::state::{BatteryData, ControlRequest, ReplyText, Telemetry};
use crate::tasks::control_loop::{control_loop_task, ControlLoopConfig};

// ── Inter-task plumbing ───────────────────────────────────────────────────────
//  Cap=1: the control loop only cares about the newest battery reading.
static BATTERY_CHAN: Channel<CriticalSectionRawMutex, BatteryData, 1> = Channel::new();
static REQUEST_CHAN: Channel<CriticalSectionRawMutex, ControlRequest, 4> = Channel::new();
static REPLY_CHAN: Channel<CriticalSectionRawMutex, ReplyText, 2> = Channel::new();

static TELEMETRY: Signal<CriticalSectionRawMutex, Telemetry> = Signal::new();
static DEBUG_VIEW: Signal<CriticalSectionRawMutex, DebugView> = Signal::new();

/// Robot must be standing still (any tilt) while this runs.
const GYRO_CALIB_SAMPLES: usize = 100;
const MOTOR_PWM_HZ: u32 = 20_000;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    // 1. Board init (168 MHz PLL)
    let board = Board::init();
    let p = board.p;

    let balance = BalanceConfig::default();
    if let Err(e) = balance.validate() {
        defmt::panic!("invalid balance config: {}", e);
    }

    // 2. USB CDC-ACM: console in, telemetry out
    let (usb_dev, usb_tx, usb_rx) = usb::init(p.USB_OTG_FS, p.PA12, p.PA11);
    spawner.spawn(usb::usb_task(usb_dev)).unwrap();

    // 3. SPI1 @ 10 MHz: ICM-42688 (SCK=PA5, MOSI=PA7, MISO=PA6, CS=PB12)
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = Hertz(10_000_000);

    use embassy_stm32::dma::NoDma;
    let spi = Spi::new(p.SPI1, p.PA5, p.PA7, p.PA6, NoDma, NoDma, spi_config);
    let cs_imu = Output::new(p.PB12.degrade(), Level::High, Speed::VeryHigh);
    let mut imu = Imu::new(spi, cs_imu);

    // 4. Motor H-bridges: TIM3 CH1=PB4 (left), CH2=PB5 (right),
    //    DIR_L=PB6, DIR_R=PB7, EN=PC8 (low = outputs off)
    let pwm = SimplePwm::new(
        p.TIM3,
        Some(PwmPin::new_ch1(p.PB4, OutputType::PushPull)),
        Some(PwmPin::new_ch2(p.PB5, OutputType::PushPull)),
        None,
        None,
        Hertz(MOTOR_PWM_HZ),
        CountingMode::EdgeAlignedUp,
    );
    let motors = MotorDriver::new(
        pwm,
        Output::new(p.PB6.degrade(), Level::Low, Speed::Low),
        Output::new(p.PB7.degrade(), Level::Low, Speed::Low),
        Output::new(p.PC8.degrade(), Level::Low, Speed::Low),
    );
    spawner.spawn(tasks::motor_task::motor_task(motors)).unwrap();

    // 5. Battery divider on PC0 / ADC1
    let adc = Adc::new(p.ADC1, &mut Delay);
    spawner
        .spawn(tasks::battery_task::battery_task(
            adc,
            p.PC0,
            BATTERY_CHAN.sender(),
        ))
        .unwrap();

    // 6. Heartbeat LED (PC13)
    let mut led = Output::new(p.PC13, Level::High, Speed::Low);

    // 7. IMU init
    Timer::after(Duration::from_millis(100)).await;
    if imu.init().await.is_err() {
        defmt::error!("IMU init failed, reads will keep retrying");
    }

    // 8. Static gyro calibration: 100 samples × 10 ms = 1 s
    let mut gyro_bias = [0.0f32; 3];
    let mut samples = 0u32;
    for i in 0..GYRO_CALIB_SAMPLES {
        if let Ok((_, gyro)) = imu.read_raw() {
            for (bias, g) in gyro_bias.iter_mut().zip(gyro.iter()) {
                *bias += *g as f32;
            }
            samples += 1;
        }
        if i % 10 == 0 {
            led.toggle();
        }
        Timer::after(Duration::from_millis(10)).await;
    }
    if samples > 0 {
        for bias in gyro_bias.iter_mut() {
            *bias /= samples as f32;
        }
    }
    imu.set_gyro_bias(gyro_bias);
    defmt::info!(
        "gyro bias [{=f32}, {=f32}, {=f32}] LSB from {=u32} samples",
        gyro_bias[0],
        gyro_bias[1],
        gyro_bias[2],
        samples
    );
    led.set_high();

    // 9. Control loop and the USB-side tasks
    spawner
        .spawn(control_loop_task(
            imu,
            ControlLoopConfig {
                balance,
                axes: TiltAxes::default(),
            },
            BATTERY_CHAN.receiver(),
            REQUEST_CHAN.receiver(),
            &TELEMETRY,
            REPLY_CHAN.sender(),
        ))
        .unwrap();

    spawner
        .spawn(tasks::console_task::console_task(
            usb_rx,
            REQUEST_CHAN.sender(),
            REPLY_CHAN.sender(),
            &DEBUG_VIEW,
        ))
        .unwrap();

    spawner
        .spawn(tasks::telemetry_task::telemetry_task(
            usb_tx,
            &TELEMETRY,
            &DEBUG_VIEW,
            REPLY_CHAN.receiver(),
        ))
        .unwrap();

    // 10. Heartbeat @ 1 Hz
    loop {
        led.toggle();
        Timer::after(Duration::from_millis(500)).await;
    }
}
