use core::fmt::Write;

use embassy_executor::task;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Sender;
use embassy_sync::signal::Signal;
use embassy_usb::driver::EndpointError;

use balance_core::console::{parse_command, ConsoleCommand, DebugView, LineBuffer};

use crate::state::{ControlRequest, ReplyText};
use crate::usb::{UsbRx, MAX_PACKET};

/// Console task: turns lines typed on the USB serial port into requests for
/// the control loop.
#[task]
pub async fn console_task(
    mut usb_rx: UsbRx,
    request_tx: Sender<'static, CriticalSectionRawMutex, ControlRequest, 4>,
    reply_tx: Sender<'static, CriticalSectionRawMutex, ReplyText, 2>,
    view: &'static Signal<CriticalSectionRawMutex, DebugView>,
) {
    let mut line = LineBuffer::<64>::new();
    let mut buf = [0u8; MAX_PACKET];

    loop {
        usb_rx.wait_connection().await;
        defmt::info!("console connected");

        loop {
            let n = match usb_rx.read_packet(&mut buf).await {
                Ok(n) => n,
                Err(EndpointError::BufferOverflow) => continue,
                Err(EndpointError::Disabled) => break,
            };

            for &byte in &buf[..n] {
                let Some(text) = line.push(byte) else {
                    continue;
                };
                let request = match parse_command(text) {
                    Ok(ConsoleCommand::Gain(update)) => ControlRequest::Gains(update),
                    Ok(ConsoleCommand::Forward(v)) => ControlRequest::Forward(v),
                    Ok(ConsoleCommand::Turn(v)) => ControlRequest::Turn(v),
                    Ok(ConsoleCommand::Stop) => ControlRequest::Stop,
                    Ok(ConsoleCommand::PrintGains) => ControlRequest::ReportGains,
                    Ok(ConsoleCommand::Show(v)) => {
                        view.signal(v);
                        continue;
                    }
                    Err(e) => {
                        defmt::warn!("console: {}", e);
                        let mut reply = ReplyText::new();
                        let _ = write!(reply, "error: {}\r\n", e);
                        let _ = reply_tx.try_send(reply);
                        continue;
                    }
                };
                request_tx.send(request).await;
            }
        }

        defmt::info!("console disconnected");
    }
}
