use embassy_stm32::usb_otg::{self, Driver};
use embassy_stm32::{bind_interrupts, peripherals};
use embassy_usb::class::cdc_acm::{CdcAcmClass, Receiver, Sender, State};
use embassy_usb::driver::EndpointError;
use embassy_usb::{Builder, Config, UsbDevice};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    OTG_FS => usb_otg::InterruptHandler<peripherals::USB_OTG_FS>;
});

pub type UsbDriver = Driver<'static, peripherals::USB_OTG_FS>;
pub type UsbTx = Sender<'static, UsbDriver>;
pub type UsbRx = Receiver<'static, UsbDriver>;

/// Full-speed CDC bulk packet size.
pub const MAX_PACKET: usize = 64;

struct UsbBuffers {
    ep_out: [u8; 256],
    config_desc: [u8; 256],
    bos_desc: [u8; 256],
    control: [u8; 64],
}

static BUFFERS: StaticCell<UsbBuffers> = StaticCell::new();
static CDC_STATE: StaticCell<State<'static>> = StaticCell::new();

#[embassy_executor::task]
pub async fn usb_task(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Bring up the OTG_FS port as a CDC-ACM serial console.
/// Must be called once.
pub fn init(
    usb_periph: peripherals::USB_OTG_FS,
    pa12: peripherals::PA12,
    pa11: peripherals::PA11,
) -> (UsbDevice<'static, UsbDriver>, UsbTx, UsbRx) {
    let UsbBuffers {
        ep_out,
        config_desc,
        bos_desc,
        control,
    } = BUFFERS.init(UsbBuffers {
        ep_out: [0; 256],
        config_desc: [0; 256],
        bos_desc: [0; 256],
        control: [0; 64],
    });

    let mut usb_config = usb_otg::Config::default();
    usb_config.vbus_detection = false;
    let driver = Driver::new_fs(usb_periph, Irqs, pa12, pa11, ep_out, usb_config);

    let mut config = Config::new(0xc0de, 0xcafe);
    config.manufacturer = Some("balancebot");
    config.product = Some("Balancing robot console");
    config.serial_number = Some("00000001");

    let mut builder = Builder::new(driver, config, config_desc, bos_desc, &mut [], control);
    let class = CdcAcmClass::new(&mut builder, CDC_STATE.init(State::new()), MAX_PACKET as u16);
    let device = builder.build();

    let (tx, rx) = class.split();
    (device, tx, rx)
}

/// Write `text` in packets short enough to never need a zero length packet.
pub async fn write_text(tx: &mut UsbTx, text: &str) -> Result<(), EndpointError> {
    for chunk in text.as_bytes().chunks(MAX_PACKET - 1) {
        tx.write_packet(chunk).await?;
    }
    Ok(())
}
