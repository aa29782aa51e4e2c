//! Wire protocol for the sweep device.
//!
//! Everything on the wire is ASCII in newline-terminated lines. Commands
//! follow a register grammar: a decimal number followed by a letter loads
//! that register (`a` start frequency, `b` stop frequency, `n` step
//! count), and a bare letter executes an action (`s` sweep, `t` tune,
//! `m`/`o` beacon on/off, `v` version, `?` sweep info). There is no
//! framing, no checksum and no length prefix; the only way to make sense
//! of the stream is to match whole lines against the patterns the
//! firmware is known to print and skip everything else.

use std::io;
use std::io::Read;

use regex::Regex;

use crate::error::Result;

/// Prefix of the line the device prints when a sweep has finished.
pub(crate) const END_OF_SWEEP: &str = "End";

lazy_static! {
    /// Startup banner, also the reply to the `v` (version) command.
    pub(crate) static ref BANNER: Regex = Regex::new(r"Build Date\s+:").unwrap();
    /// Reply to the `?` (sweep info) command.
    pub(crate) static ref SWEEP_INFO: Regex = Regex::new(r"Num Steps:\s+").unwrap();
    /// One sweep telemetry line: frequency with two decimal digits, a
    /// literal zero, raw VSWR (scaled by 1000) with five decimal digits,
    /// then the forward and reverse power readings.
    static ref DATA_LINE: Regex =
        Regex::new(r"^(\d+\.\d{2}), 0, (\d+\.\d{5}), (\d+), (\d+)").unwrap();
}

/// Parameters for one sweep. Built per call, not retained.
///
/// The driver does not validate the range; the firmware accepts whatever
/// it is given. Callers are expected to pass `start_frequency <=
/// stop_frequency` and a positive step count.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct SweepRequest {
    /// Start of the scanned range, in Hz
    pub start_frequency: u64,
    /// End of the scanned range, in Hz
    pub stop_frequency: u64,
    /// Number of measurement steps across the range
    pub steps: u32,
}

impl SweepRequest {
    /// Encode the request as a single command line: start and stop
    /// frequency into the `a` and `b` registers, step count into `n`,
    /// then `s` to start the sweep.
    pub(crate) fn command(&self) -> String {
        format!(
            "{}a{}b{}ns",
            self.start_frequency, self.stop_frequency, self.steps
        )
    }
}

pub(crate) fn tune_command(frequency: u64) -> String {
    format!("{}t", frequency)
}

pub(crate) fn beacon_on_command(frequency: u64, text: &str) -> String {
    // `a` loads the frequency register, `m` starts the beacon with the
    // `$`-terminated message.
    format!("{}am{}$", frequency, text)
}

pub(crate) fn beacon_off_command() -> String {
    "o".to_string()
}

/// One VSWR measurement from a sweep
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct DataPoint {
    /// Frequency the measurement was taken at, in Hz
    pub frequency: f64,
    /// Voltage standing wave ratio at that frequency
    pub vswr: f64,
    /// Forward power reading (raw detector counts)
    pub forward: u32,
    /// Reverse power reading (raw detector counts)
    pub reverse: u32,
}

impl DataPoint {
    /// Parse one response line. The firmware reports VSWR multiplied by
    /// 1000, so the raw field is divided back down here.
    ///
    /// Returns `None` for anything that is not a well-formed data line.
    /// This also drops a data line truncated by a transmission error --
    /// the protocol carries no checksum, so a mangled line is
    /// indistinguishable from the echo and banner noise we have to skip
    /// anyway.
    pub(crate) fn from_line(line: &str) -> Option<DataPoint> {
        let fields = DATA_LINE.captures(line)?;
        Some(DataPoint {
            frequency: fields[1].parse().ok()?,
            vswr: fields[2].parse::<f64>().ok()? / 1000.0,
            forward: fields[3].parse().ok()?,
            reverse: fields[4].parse().ok()?,
        })
    }
}

/// Read a single newline-terminated line, one byte at a time.
///
/// The link is half duplex with no framing, so buffered read-ahead is
/// avoided: a byte read too early would belong to the next command's
/// response. At 57600 baud single-byte reads cost nothing.
pub(crate) fn read_line<R: Read>(port: &mut R) -> io::Result<String> {
    let mut line: Vec<u8> = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        port.read_exact(&mut byte)?;
        if byte[0] == b'\n' {
            return Ok(String::from_utf8_lossy(&line).into_owned());
        }
        line.push(byte[0]);
    }
}

/// Scan the incoming stream for a line matching `pattern`, discarding
/// every other line. Used for the startup banner handshake and the
/// version/info replies, which arrive mixed with echo and boot noise.
pub(crate) fn scan_for_line<R: Read>(port: &mut R, pattern: &Regex) -> io::Result<String> {
    loop {
        let line = read_line(port)?;
        if pattern.is_match(&line) {
            return Ok(line);
        }
    }
}

/// Read response lines until the next data point or the end-of-sweep
/// sentinel.
///
/// Returns `Ok(Some(point))` per parsed data line and `Ok(None)` once a
/// line starting with `End` arrives. Unrecognised lines between data
/// points are skipped silently; garbage on the wire must not abort a
/// sweep.
pub(crate) fn next_data_point<R: Read>(port: &mut R) -> Result<Option<DataPoint>> {
    loop {
        let line = read_line(port)?;
        if let Some(point) = DataPoint::from_line(&line) {
            return Ok(Some(point));
        }
        if line.starts_with(END_OF_SWEEP) {
            return Ok(None);
        }
    }
}

#[test]
fn test_sweep_command() {
    let request = SweepRequest {
        start_frequency: 13_500_000,
        stop_frequency: 14_500_000,
        steps: 100,
    };
    assert_eq!(request.command(), "13500000a14500000b100ns");
}

#[test]
fn test_tune_and_beacon_commands() {
    assert_eq!(tune_command(7_030_000), "7030000t");
    assert_eq!(beacon_on_command(7_030_000, "CQ TEST"), "7030000amCQ TEST$");
    assert_eq!(beacon_off_command(), "o");
}

#[test]
fn test_parse_data_line() {
    let point = DataPoint::from_line("13.50, 0, 1234.00000, 100, 2").unwrap();
    assert_eq!(point.frequency, 13.50);
    assert!((point.vswr - 1.234).abs() < 1e-9);
    assert_eq!(point.forward, 100);
    assert_eq!(point.reverse, 2);
}

#[test]
fn test_parse_rejects_malformed_lines() {
    assert_eq!(DataPoint::from_line(""), None);
    assert_eq!(DataPoint::from_line("garbage"), None);
    assert_eq!(DataPoint::from_line("Build Date : 2013-01-01"), None);
    // Wrong decimal widths
    assert_eq!(DataPoint::from_line("13.5, 0, 1234.00000, 100, 2"), None);
    assert_eq!(DataPoint::from_line("13.50, 0, 1234.000, 100, 2"), None);
    // Second field must be the literal zero
    assert_eq!(DataPoint::from_line("13.50, 1, 1234.00000, 100, 2"), None);
    // Truncated line
    assert_eq!(DataPoint::from_line("13.50, 0, 1234.00000, 100"), None);
}

#[test]
fn test_banner_scan_skips_leading_noise() {
    let mut input = std::io::Cursor::new(
        b"\x00\x00boot\nAntenna analyser ready\nBuild Date : 2013-01-01\n".to_vec(),
    );
    let line = scan_for_line(&mut input, &BANNER).unwrap();
    assert_eq!(line, "Build Date : 2013-01-01");
}

#[test]
fn test_next_data_point_skips_garbage() {
    let mut input =
        std::io::Cursor::new(b"garbage\n13.50, 0, 1234.00000, 100, 2\nEnd\n".to_vec());
    let point = next_data_point(&mut input).unwrap().unwrap();
    assert_eq!(point.frequency, 13.50);
    assert_eq!(next_data_point(&mut input).unwrap(), None);
}

#[test]
fn test_end_sentinel_matches_on_prefix() {
    let mut input = std::io::Cursor::new(b"End of sweep\n".to_vec());
    assert_eq!(next_data_point(&mut input).unwrap(), None);
}
