pub mod imu;
pub mod motor;
