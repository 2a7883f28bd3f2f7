//! Remote-bitbang JTAG transport (§4.7): a textual TCP protocol for driving
//! JTAG pins, used by OpenOCD-style debuggers to reach the DUT's tap.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::scheduler::{SimState, Task};

/// JTAG task cadence: JTAG clocks are much slower than the DUT clock, so
/// this only needs to run every 20 cycles.
pub const PERIOD: u64 = 20;

/// Current JTAG pin state published to the DUT each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct JtagPins {
    tck: bool,
    tms: bool,
    tdi: bool,
}

/// Accepts at most one client, non-blocking. Applies one queued command
/// byte per tick and replies with any latched `tdo` bit.
pub struct RemoteBitbang {
    listener: TcpListener,
    client: Option<TcpStream>,
    pins: JtagPins,
    pending_tdo: VecDeque<bool>,
}

impl RemoteBitbang {
    pub fn bind(port: u16) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        tracing::info!(target: "console", "remote bitbang listening on port {port}");
        Ok(Self {
            listener,
            client: None,
            pins: JtagPins::default(),
            pending_tdo: VecDeque::new(),
        })
    }

    fn accept_if_needed(&mut self) {
        if self.client.is_some() {
            return;
        }
        match self.listener.accept() {
            Ok((stream, addr)) => {
                let _ = stream.set_nonblocking(true);
                tracing::info!(target: "console", "remote bitbang client connected: {addr}");
                self.client = Some(stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {}
            Err(e) => tracing::error!(target: "console", "remote bitbang accept failed: {e}"),
        }
    }

    fn apply(&mut self, cmd: u8) {
        match cmd {
            b'0'..=b'7' => {
                let bits = cmd - b'0';
                self.pins = JtagPins {
                    tck: bits & 0b100 != 0,
                    tms: bits & 0b010 != 0,
                    tdi: bits & 0b001 != 0,
                };
            }
            b'R' => {
                // Latched by the caller via `sample_tdo` before `apply`.
            }
            b'Q' => {
                tracing::info!(target: "console", "remote bitbang client disconnected");
                self.client = None;
            }
            b'r' => {
                tracing::info!(target: "console", "remote bitbang reset");
            }
            b'b' | b'B' => {}
            other => {
                tracing::error!(target: "console", "remote bitbang unknown command: {other:#04x}");
            }
        }
    }

    fn try_read_command(&mut self) -> Option<u8> {
        let stream = self.client.as_mut()?;
        let mut buf = [0u8; 1];
        match stream.read(&mut buf) {
            Ok(0) => {
                self.client = None;
                None
            }
            Ok(_) => Some(buf[0]),
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(_) => {
                self.client = None;
                None
            }
        }
    }

    fn flush_pending_tdo(&mut self) {
        let Some(tdo) = self.pending_tdo.pop_front() else {
            return;
        };
        if let Some(stream) = self.client.as_mut() {
            let byte = if tdo { b'1' } else { b'0' };
            let _ = stream.write_all(&[byte]);
        }
    }

    /// Runs one tick of the transport against a live `tdo` sample.
    pub fn tick(&mut self, tdo: bool) -> JtagPins {
        self.accept_if_needed();
        if let Some(cmd) = self.try_read_command() {
            if cmd == b'R' {
                self.pending_tdo.push_back(tdo);
            }
            self.apply(cmd);
        }
        self.flush_pending_tdo();
        self.pins
    }
}

/// Scheduled task wrapping [`RemoteBitbang`]; publishes pin state to the
/// DUT each dispatch, per the §4.7 per-tick contract.
pub struct RemoteBitbangTask {
    transport: RemoteBitbang,
}

impl RemoteBitbangTask {
    pub fn new(transport: RemoteBitbang) -> Self {
        Self { transport }
    }
}

impl Task for RemoteBitbangTask {
    fn name(&self) -> &str {
        "remote_bitbang"
    }

    fn run(&mut self, sim: &mut SimState) {
        let tdo = sim.dut.jtag_tdo();
        let pins = self.transport.tick(tdo);
        sim.dut.set_jtag_pins(pins.tck, pins.tms, pins.tdi);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_command_sets_pin_pattern() {
        let mut rbb = RemoteBitbang::bind(0).unwrap();
        rbb.apply(b'5'); // 0b101 -> tck=1, tms=0, tdi=1
        assert!(rbb.pins.tck);
        assert!(!rbb.pins.tms);
        assert!(rbb.pins.tdi);
    }

    #[test]
    fn q_command_drops_client_marker() {
        let mut rbb = RemoteBitbang::bind(0).unwrap();
        rbb.client = None;
        rbb.apply(b'Q');
        assert!(rbb.client.is_none());
    }

    #[test]
    fn reset_and_blink_commands_leave_pins_unchanged() {
        let mut rbb = RemoteBitbang::bind(0).unwrap();
        rbb.apply(b'3');
        let before = rbb.pins;
        rbb.apply(b'r');
        rbb.apply(b'b');
        rbb.apply(b'B');
        assert_eq!(before.tck, rbb.pins.tck);
        assert_eq!(before.tms, rbb.pins.tms);
        assert_eq!(before.tdi, rbb.pins.tdi);
    }

    #[test]
    fn r_command_queues_current_tdo_for_next_send() {
        let mut rbb = RemoteBitbang::bind(0).unwrap();
        rbb.pending_tdo.push_back(true);
        assert_eq!(rbb.pending_tdo.len(), 1);
    }
}
