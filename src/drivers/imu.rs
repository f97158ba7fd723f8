use embassy_stm32::dma::NoDma;
use embassy_stm32::gpio::{AnyPin, Output};
use embassy_stm32::spi::{Error, Instance, Spi};
use embassy_time::{Duration, Timer};

const REG_DEVICE_CONFIG: u8 = 0x11;
const REG_ACCEL_DATA_X1: u8 = 0x1F;
const REG_PWR_MGMT0: u8 = 0x4E;
const REG_WHO_AM_I: u8 = 0x75;

const WHO_AM_I_ICM42688: u8 = 0x47;

/// ±2000 dps full scale.
const GYRO_LSB_PER_DPS: f32 = 16.4;
/// ±16 g full scale.
const ACCEL_LSB_PER_G: f32 = 2048.0;

/// One IMU reading in physical units, gyro bias removed.
#[derive(Clone, Copy, Default)]
pub struct ImuSample {
    /// g
    pub accel: [f32; 3],
    /// degrees/s
    pub gyro: [f32; 3],
}

/// ICM-42688 on SPI, polled once per control cycle.
pub struct Imu<'d, T: Instance> {
    spi: Spi<'d, T, NoDma, NoDma>,
    cs: Output<'d, AnyPin>,
    gyro_bias_lsb: [f32; 3],
}

impl<'d, T: Instance> Imu<'d, T> {
    pub fn new(spi: Spi<'d, T, NoDma, NoDma>, cs: Output<'d, AnyPin>) -> Self {
        Self {
            spi,
            cs,
            gyro_bias_lsb: [0.0; 3],
        }
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Error> {
        self.cs.set_low();
        let res = self.spi.blocking_write(&[reg & 0x7F, value]);
        self.cs.set_high();
        res
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, Error> {
        let tx = [reg | 0x80, 0x00];
        let mut rx = [0u8; 2];
        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;
        Ok(rx[1])
    }

    /// Soft reset, then gyro and accel in low noise mode.
    pub async fn init(&mut self) -> Result<(), Error> {
        self.write_reg(REG_DEVICE_CONFIG, 0x01)?;
        Timer::after(Duration::from_millis(10)).await;

        let id = self.read_reg(REG_WHO_AM_I)?;
        if id != WHO_AM_I_ICM42688 {
            defmt::warn!("unexpected IMU id {=u8:#x}", id);
        }

        self.write_reg(REG_PWR_MGMT0, 0x0F)?;
        // gyro needs ~45 ms after power up
        Timer::after(Duration::from_millis(50)).await;
        Ok(())
    }

    /// Raw accel and gyro counts.
    pub fn read_raw(&mut self) -> Result<([i16; 3], [i16; 3]), Error> {
        let mut tx = [0u8; 13];
        tx[0] = REG_ACCEL_DATA_X1 | 0x80;
        let mut rx = [0u8; 13];

        self.cs.set_low();
        let res = self.spi.blocking_transfer(&mut rx, &tx);
        self.cs.set_high();
        res?;

        let word = |i: usize| i16::from_be_bytes([rx[i], rx[i + 1]]);
        Ok(([word(1), word(3), word(5)], [word(7), word(9), word(11)]))
    }

    /// Gyro offset measured at rest, in raw counts.
    pub fn set_gyro_bias(&mut self, bias_lsb: [f32; 3]) {
        self.gyro_bias_lsb = bias_lsb;
    }

    pub fn read_sample(&mut self) -> Result<ImuSample, Error> {
        let (accel_raw, gyro_raw) = self.read_raw()?;
        let mut sample = ImuSample::default();
        for i in 0..3 {
            sample.accel[i] = accel_raw[i] as f32 / ACCEL_LSB_PER_G;
            sample.gyro[i] = (gyro_raw[i] as f32 - self.gyro_bias_lsb[i]) / GYRO_LSB_PER_DPS;
        }
        Ok(sample)
    }
}
