extern crate antsweep;
extern crate env_logger;

use antsweep::{DataPoint, SweepObserver, Sweeper};
use std::env;

struct Printer;

impl SweepObserver for Printer {
    fn opened(&mut self) {
        println!("Connected");
    }
    fn closed(&mut self) {
        println!("Disconnected");
    }
    fn data_point(&mut self, point: &DataPoint) {
        println!(
            "{:.2} Hz: VSWR {:.3} (fwd {}, rev {})",
            point.frequency, point.vswr, point.forward, point.reverse
        );
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let start: u64 = args[2].parse().unwrap();
    let stop: u64 = args[3].parse().unwrap();
    let steps: u32 = args[4].parse().unwrap();

    let mut sweeper = Sweeper::new(Box::new(Printer));
    sweeper.open(&args[1]).unwrap();
    sweeper.sweep(start, stop, steps).unwrap();
    sweeper.close();
}
