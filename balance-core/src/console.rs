//! Text commands for live tuning over the debug serial link.
//!
//! ```text
//! ap 30      angle loop P        sp 800     speed loop P
//! ai 2.5     angle loop I        si 20      speed loop I
//! ad 40      angle loop D        sd 0       speed loop D
//! al 15      angle loop I limit  sl 20      speed loop I limit
//! fwd 0.2    forward target      turn -0.1  turn target
//! stop       both targets to 0   gains      print all gains
//! show angle|battery|looptime|state|off
//! ```

use core::fmt::{self, Write};

use crate::cascade::BalanceController;
use crate::cycle::{GainUpdate, Loop};

/// Which value the telemetry stream prints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DebugView {
    #[default]
    Angle,
    Battery,
    LoopTime,
    State,
    Off,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleCommand {
    Gain(GainUpdate),
    Forward(f32),
    Turn(f32),
    Stop,
    Show(DebugView),
    PrintGains,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    Empty,
    UnknownCommand,
    MissingArgument,
    InvalidNumber,
    NegativeLimit,
    UnexpectedArgument,
}

impl fmt::Display for ConsoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ConsoleError::Empty => "empty line",
            ConsoleError::UnknownCommand => "unknown command",
            ConsoleError::MissingArgument => "missing argument",
            ConsoleError::InvalidNumber => "invalid number",
            ConsoleError::NegativeLimit => "integrator limit must not be negative",
            ConsoleError::UnexpectedArgument => "unexpected argument",
        };
        f.write_str(msg)
    }
}

pub fn parse_command(line: &str) -> Result<ConsoleCommand, ConsoleError> {
    let mut words = line.split_whitespace();
    let name = words.next().ok_or(ConsoleError::Empty)?;
    let arg = words.next();
    if words.next().is_some() {
        return Err(ConsoleError::UnexpectedArgument);
    }

    let command = match name {
        "ap" => ConsoleCommand::Gain(GainUpdate::P(Loop::Angle, number(arg)?)),
        "ai" => ConsoleCommand::Gain(GainUpdate::I(Loop::Angle, number(arg)?)),
        "ad" => ConsoleCommand::Gain(GainUpdate::D(Loop::Angle, number(arg)?)),
        "al" => ConsoleCommand::Gain(GainUpdate::ILimit(Loop::Angle, limit(arg)?)),
        "sp" => ConsoleCommand::Gain(GainUpdate::P(Loop::Speed, number(arg)?)),
        "si" => ConsoleCommand::Gain(GainUpdate::I(Loop::Speed, number(arg)?)),
        "sd" => ConsoleCommand::Gain(GainUpdate::D(Loop::Speed, number(arg)?)),
        "sl" => ConsoleCommand::Gain(GainUpdate::ILimit(Loop::Speed, limit(arg)?)),
        "fwd" => ConsoleCommand::Forward(number(arg)?),
        "turn" => ConsoleCommand::Turn(number(arg)?),
        "show" => ConsoleCommand::Show(view(arg)?),
        "stop" | "gains" => {
            if arg.is_some() {
                return Err(ConsoleError::UnexpectedArgument);
            }
            if name == "stop" {
                ConsoleCommand::Stop
            } else {
                ConsoleCommand::PrintGains
            }
        }
        _ => return Err(ConsoleError::UnknownCommand),
    };
    Ok(command)
}

fn number(arg: Option<&str>) -> Result<f32, ConsoleError> {
    let arg = arg.ok_or(ConsoleError::MissingArgument)?;
    let value: f32 = arg.parse().map_err(|_| ConsoleError::InvalidNumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ConsoleError::InvalidNumber)
    }
}

fn limit(arg: Option<&str>) -> Result<f32, ConsoleError> {
    let value = number(arg)?;
    if value < 0.0 {
        return Err(ConsoleError::NegativeLimit);
    }
    Ok(value)
}

fn view(arg: Option<&str>) -> Result<DebugView, ConsoleError> {
    match arg.ok_or(ConsoleError::MissingArgument)? {
        "angle" => Ok(DebugView::Angle),
        "battery" => Ok(DebugView::Battery),
        "looptime" => Ok(DebugView::LoopTime),
        "state" => Ok(DebugView::State),
        "off" => Ok(DebugView::Off),
        _ => Err(ConsoleError::UnexpectedArgument),
    }
}

/// Print both loops' gains, one line each.
pub fn write_gains<W: Write>(out: &mut W, controller: &BalanceController) -> fmt::Result {
    let a = controller.angle_pid();
    let s = controller.speed_pid();
    write!(
        out,
        "angle p={} i={} d={} lim={}\r\n",
        a.p(),
        a.i(),
        a.d(),
        a.integrator_limit()
    )?;
    write!(
        out,
        "speed p={} i={} d={} lim={}\r\n",
        s.p(),
        s.i(),
        s.d(),
        s.integrator_limit()
    )
}

/// Collects received bytes into lines.
///
/// Lines longer than `N` are dropped whole instead of being cut, so a
/// truncated command can never be applied.
pub struct LineBuffer<const N: usize> {
    buf: heapless::Vec<u8, N>,
    overflowed: bool,
    line_done: bool,
}

impl<const N: usize> LineBuffer<N> {
    pub fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
            overflowed: false,
            line_done: false,
        }
    }

    /// Feed one byte. Returns the finished line on `\n` or `\r`.
    pub fn push(&mut self, byte: u8) -> Option<&str> {
        if self.line_done {
            self.buf.clear();
            self.line_done = false;
        }
        match byte {
            b'\n' | b'\r' => {
                let overflowed = core::mem::replace(&mut self.overflowed, false);
                if overflowed || self.buf.is_empty() {
                    self.buf.clear();
                    return None;
                }
                self.line_done = true;
                core::str::from_utf8(&self.buf).ok()
            }
            _ => {
                if self.buf.push(byte).is_err() {
                    self.overflowed = true;
                }
                None
            }
        }
    }
}

impl<const N: usize> Default for LineBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
