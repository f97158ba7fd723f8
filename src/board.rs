use embassy_stm32::rcc::*;
use embassy_stm32::time::Hertz;
use embassy_stm32::Config;

/// External crystal on the controller board.
const HSE_HZ: u32 = 8_000_000;

pub struct Board {
    pub p: embassy_stm32::Peripherals,
}

impl Board {
    /// 168 MHz core from the 8 MHz crystal, 48 MHz for USB.
    pub fn init() -> Self {
        let mut config = Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(HSE_HZ),
            mode: HseMode::Oscillator,
        });
        config.rcc.pll_src = PllSource::HSE;
        config.rcc.pll = Some(Pll {
            prediv: PllPreDiv::DIV4,
            mul: PllMul::MUL168,
            divp: Some(PllPDiv::DIV2),
            divq: Some(PllQDiv::DIV7),
            divr: None,
        });
        config.rcc.sys = Sysclk::PLL1_P;
        config.rcc.ahb_pre = AHBPrescaler::DIV1;
        // APB1 at 42 MHz feeds TIM3 with 84 MHz for the motor PWM
        config.rcc.apb1_pre = APBPrescaler::DIV4;
        config.rcc.apb2_pre = APBPrescaler::DIV2;

        defmt::info!("clock init: HSE {} Hz -> 168 MHz", HSE_HZ);
        Self {
            p: embassy_stm32::init(config),
        }
    }
}
