use crate::filter::LowPassFilter;

/// ADC counts to volts through the divider's calibration factor.
///
/// Adjust the factor until the reading matches a multimeter on the pack.
pub fn battery_voltage(raw: u16, calib_factor: f32) -> f32 {
    raw as f32 * calib_factor
}

/// Smoothed pack voltage, so a single noisy conversion cannot trip the
/// low-battery check.
pub struct BatteryMonitor {
    calib_factor: f32,
    filter: LowPassFilter,
}

impl BatteryMonitor {
    pub fn new(calib_factor: f32, alpha: f32) -> Self {
        Self {
            calib_factor,
            filter: LowPassFilter::new(alpha),
        }
    }

    pub fn update(&mut self, raw: u16) -> f32 {
        self.filter.filter(battery_voltage(raw, self.calib_factor))
    }
}
