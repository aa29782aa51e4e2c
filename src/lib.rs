//! Driver for DDS-based antenna analyser sweep devices.
//!
//! These analysers are simple amateur-radio instruments: a DDS signal
//! generator and an SWR bridge on a small microcontroller board, attached
//! over a USB-serial link. The firmware speaks a plain ASCII line protocol
//! at 57600 baud: the host loads numeric registers and triggers a sweep,
//! and the board streams back one comma-separated measurement line per
//! frequency step followed by an `End` line. On power-up (and on the `v`
//! command) it prints a `Build Date : ...` banner, which doubles as the
//! liveness handshake.
//!
//! The driver is deliberately synchronous: every call blocks the calling
//! thread, and [`Sweeper::sweep`] blocks for the full duration of the
//! physical scan because the device pushes its results over the same
//! half-duplex link the command went out on. Wrap the session in a worker
//! thread and forward the [`SweepObserver`] notifications into your own
//! event queue if you need a responsive UI on top of it.
//!
//! ## Example Code
//!
//! Examples of the use of this library can be found in the `demos`
//! directory.

extern crate log;
extern crate regex;
extern crate serial;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate lazy_static;

pub mod error;
pub mod protocol;

use log::debug;
use regex::Regex;
use serial::core::prelude::*;
use std::io::Write;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::{
    beacon_off_command, beacon_on_command, next_data_point, scan_for_line, tune_command, BANNER,
    SWEEP_INFO,
};

pub use crate::protocol::{DataPoint, SweepRequest};

/// Observer for session notifications.
///
/// All methods default to doing nothing; implement the ones you care
/// about. Calls are made synchronously on the thread driving the session
/// and, for data points, strictly in the order the measurements arrived
/// on the wire.
pub trait SweepObserver {
    /// The session connected and the device answered with its banner.
    fn opened(&mut self) {}
    /// The session was closed.
    fn closed(&mut self) {}
    /// One measurement arrived during a sweep. The point is not retained
    /// by the driver.
    fn data_point(&mut self, _point: &DataPoint) {}
}

/// No-op observer, for fire-and-forget use of the command set.
pub struct NullObserver;

impl SweepObserver for NullObserver {}

/// A session with one sweep device.
///
/// Owns the serial port exclusively while connected. At most one command
/// can be in flight because every operation takes `&mut self` and blocks
/// until the device is done with it.
pub struct Sweeper {
    port: Option<serial::SystemPort>,
    observer: Box<dyn SweepObserver>,
}

impl Sweeper {
    /// Create a disconnected session delivering notifications to
    /// `observer`.
    pub fn new(observer: Box<dyn SweepObserver>) -> Sweeper {
        Sweeper {
            port: None,
            observer,
        }
    }

    /// Open the serial port and wait for the device's startup banner.
    ///
    /// `port_name` should be the name of a serial port device. The serial
    /// parameters (57600 baud, 8N1, no flow control) are fixed by the
    /// firmware. Anything the board prints before the banner is
    /// discarded. Does nothing if the session is already connected.
    ///
    /// Fails with [`Error::Connection`] if the port cannot be opened or
    /// the banner never arrives; there is no retry, that is the caller's
    /// call.
    pub fn open(&mut self, port_name: &str) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let mut port = serial::open(port_name)
            .map_err(|e| format!("Unable to connect to serial port {}: {:?}", port_name, e))?;
        port.reconfigure(&|settings| {
            settings.set_baud_rate(serial::Baud57600)?;
            settings.set_char_size(serial::Bits8);
            settings.set_parity(serial::ParityNone);
            settings.set_stop_bits(serial::Stop1);
            settings.set_flow_control(serial::FlowNone);
            Ok(())
        })
        .map_err(|e| format!("Failed to configure serial port: {}", e))?;

        // The base protocol has no heartbeat; the timeout is what turns a
        // dead device into an error instead of a hung thread.
        port.set_timeout(Duration::from_secs(5))
            .map_err(|e| format!("Failed to set serial port timeout: {}", e))?;

        debug!("Connecting to {}", port_name);
        let banner = scan_for_line(&mut port, &BANNER)
            .map_err(|e| Error::Connection(format!("No banner from device: {}", e)))?;
        debug!("Connected: {}", banner.trim_end());

        self.port = Some(port);
        self.observer.opened();
        Ok(())
    }

    /// Close the session and release the port. Does nothing if already
    /// disconnected. Safe to call at shutdown.
    pub fn close(&mut self) {
        if let Some(port) = self.port.take() {
            drop(port);
            debug!("Disconnected");
            self.observer.closed();
        }
    }

    /// Whether the session currently owns an open port.
    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    /// Send a command line to the device
    fn send(&mut self, command: &str) -> Result<()> {
        if let Some(port) = self.port.as_mut() {
            debug!("Send: {:?}", command);
            port.write_all(command.as_bytes())?;
            port.flush()?;
        }
        Ok(())
    }

    /// Sweep `steps` measurements from `start_frequency` to
    /// `stop_frequency` (both in Hz), delivering one
    /// [`data_point`](SweepObserver::data_point) notification per step.
    ///
    /// Blocks until the device has finished the physical sweep and printed
    /// its `End` line. Does nothing if disconnected. A mid-sweep channel
    /// fault surfaces as [`Error::Io`]; close the session and reconnect.
    pub fn sweep(&mut self, start_frequency: u64, stop_frequency: u64, steps: u32) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let request = SweepRequest {
            start_frequency,
            stop_frequency,
            steps,
        };
        self.send(&request.command())?;

        let Sweeper { port, observer } = self;
        if let Some(port) = port.as_mut() {
            run_sweep(port, observer.as_mut())?;
        }
        Ok(())
    }

    /// Park the DDS on a single frequency (in Hz) for antenna adjustment.
    ///
    /// Fire and forget; the device sends no reply. Does nothing if
    /// disconnected.
    pub fn tune(&mut self, frequency: u64) -> Result<()> {
        self.send(&tune_command(frequency))
    }

    /// Start keying `text` as a beacon on `frequency` (in Hz).
    ///
    /// Fire and forget, like [`tune`](Sweeper::tune).
    pub fn beacon_on(&mut self, frequency: u64, text: &str) -> Result<()> {
        self.send(&beacon_on_command(frequency, text))
    }

    /// Stop a running beacon.
    pub fn beacon_off(&mut self) -> Result<()> {
        self.send(&beacon_off_command())
    }

    /// Ask the device for its firmware version line (the same `Build
    /// Date` banner printed at startup).
    ///
    /// Returns `Ok(None)` if disconnected.
    pub fn version_info(&mut self) -> Result<Option<String>> {
        self.query("v", &BANNER)
    }

    /// Ask the device for its current sweep settings (the `Num Steps:`
    /// line).
    ///
    /// Returns `Ok(None)` if disconnected.
    pub fn sweep_info(&mut self) -> Result<Option<String>> {
        self.query("?", &SWEEP_INFO)
    }

    fn query(&mut self, command: &str, reply: &Regex) -> Result<Option<String>> {
        if !self.is_connected() {
            return Ok(None);
        }
        self.send(command)?;
        let port = match self.port.as_mut() {
            Some(port) => port,
            None => return Ok(None),
        };
        let line = scan_for_line(port, reply)?;
        debug!("Reply: {:?}", line);
        Ok(Some(line))
    }
}

/// The blocking read half of a sweep: parse data lines off the port and
/// hand each point to the observer until the end-of-sweep sentinel.
fn run_sweep<R: std::io::Read>(port: &mut R, observer: &mut dyn SweepObserver) -> Result<()> {
    while let Some(point) = next_data_point(port)? {
        observer.data_point(&point);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    #[derive(PartialEq, Debug)]
    enum Event {
        Opened,
        Closed,
        Point(DataPoint),
    }

    /// Observer that records every notification, shared with the test
    /// through an Rc so it can be inspected after being boxed away.
    #[derive(Clone)]
    struct Recorder(Rc<RefCell<Vec<Event>>>);

    impl Recorder {
        fn new() -> Recorder {
            Recorder(Rc::new(RefCell::new(Vec::new())))
        }
    }

    impl SweepObserver for Recorder {
        fn opened(&mut self) {
            self.0.borrow_mut().push(Event::Opened);
        }
        fn closed(&mut self) {
            self.0.borrow_mut().push(Event::Closed);
        }
        fn data_point(&mut self, point: &DataPoint) {
            self.0.borrow_mut().push(Event::Point(*point));
        }
    }

    #[test]
    fn close_when_disconnected_emits_nothing() {
        let recorder = Recorder::new();
        let mut sweeper = Sweeper::new(Box::new(recorder.clone()));
        assert!(!sweeper.is_connected());
        sweeper.close();
        sweeper.close();
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn commands_when_disconnected_are_no_ops() {
        let recorder = Recorder::new();
        let mut sweeper = Sweeper::new(Box::new(recorder.clone()));
        sweeper.sweep(13_500_000, 14_500_000, 100).unwrap();
        sweeper.tune(7_030_000).unwrap();
        sweeper.beacon_on(7_030_000, "CQ TEST").unwrap();
        sweeper.beacon_off().unwrap();
        assert!(recorder.0.borrow().is_empty());
    }

    #[test]
    fn queries_when_disconnected_return_none() {
        let mut sweeper = Sweeper::new(Box::new(NullObserver));
        assert_eq!(sweeper.version_info().unwrap(), None);
        assert_eq!(sweeper.sweep_info().unwrap(), None);
    }

    #[test]
    fn run_sweep_emits_points_in_wire_order() {
        let mut recorder = Recorder::new();
        let mut input = Cursor::new(
            b"13.50, 0, 1234.00000, 100, 2\n\
              garbage\n\
              14.50, 0, 1100.00000, 100, 1\n\
              End\n\
              15.50, 0, 1000.00000, 100, 1\n"
                .to_vec(),
        );
        run_sweep(&mut input, &mut recorder).unwrap();

        let events = recorder.0.borrow();
        assert_eq!(events.len(), 2);
        match (&events[0], &events[1]) {
            (Event::Point(first), Event::Point(second)) => {
                assert_eq!(first.frequency, 13.50);
                assert!((first.vswr - 1.234).abs() < 1e-9);
                assert_eq!(first.forward, 100);
                assert_eq!(first.reverse, 2);
                assert_eq!(second.frequency, 14.50);
                assert!((second.vswr - 1.100).abs() < 1e-9);
                assert_eq!(second.forward, 100);
                assert_eq!(second.reverse, 1);
            }
            other => panic!("expected two data points, got {:?}", other),
        }
    }

    #[test]
    fn run_sweep_surfaces_channel_faults() {
        let mut recorder = Recorder::new();
        // Stream dies before the End line arrives.
        let mut input = Cursor::new(b"13.50, 0, 1234.00000, 100, 2\n".to_vec());
        let result = run_sweep(&mut input, &mut recorder);
        assert!(matches!(result, Err(Error::Io(_))));
        // The point parsed before the fault was still delivered.
        assert_eq!(recorder.0.borrow().len(), 1);
    }
}
