use core::fmt::Write;

use embassy_executor::task;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Ticker};

use balance_core::console::DebugView;

use crate::state::{ReplyText, Telemetry};
use crate::usb::{write_text, UsbTx};

const TELEMETRY_HZ: u64 = 10;

/// Telemetry task: 10 Hz debug line on USB plus console replies.
/// Writes nothing while no terminal holds the port open.
#[task]
pub async fn telemetry_task(
    mut usb_tx: UsbTx,
    telemetry: &'static Signal<CriticalSectionRawMutex, Telemetry>,
    view: &'static Signal<CriticalSectionRawMutex, DebugView>,
    reply_rx: Receiver<'static, CriticalSectionRawMutex, ReplyText, 2>,
) {
    let mut latest = Telemetry::default();
    let mut current_view = DebugView::default();
    let mut ticker = Ticker::every(Duration::from_hz(TELEMETRY_HZ));

    loop {
        match select(ticker.next(), reply_rx.receive()).await {
            Either::First(()) => {
                if let Some(t) = telemetry.try_take() {
                    latest = t;
                }
                if let Some(v) = view.try_take() {
                    current_view = v;
                }
                if !usb_tx.dtr() {
                    continue;
                }

                let mut m = heapless::String::<64>::new();
                let _ = match current_view {
                    DebugView::Angle => write!(
                        m,
                        "angle={:.2} target={:.2}\r\n",
                        latest.angle, latest.angle_target
                    ),
                    DebugView::Battery => write!(m, "battery={:.2}V\r\n", latest.battery_voltage),
                    DebugView::LoopTime => write!(m, "loop={}us\r\n", latest.loop_time_us),
                    DebugView::State => write!(
                        m,
                        "{} l={:.3} r={:.3}\r\n",
                        latest.state.as_str(),
                        latest.motors.left,
                        latest.motors.right
                    ),
                    DebugView::Off => continue,
                };
                let _ = write_text(&mut usb_tx, &m).await;
            }
            Either::Second(reply) => {
                if usb_tx.dtr() {
                    let _ = write_text(&mut usb_tx, &reply).await;
                }
            }
        }
    }
}
