extern crate antsweep;
extern crate env_logger;

use antsweep::{NullObserver, Sweeper};
use std::env;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();
    let frequency: u64 = args[2].parse().unwrap();

    let mut sweeper = Sweeper::new(Box::new(NullObserver));
    sweeper.open(&args[1]).unwrap();
    if let Some(version) = sweeper.version_info().unwrap() {
        println!("{}", version.trim_end());
    }
    sweeper.tune(frequency).unwrap();
    println!("Tuned to {} Hz", frequency);
    sweeper.close();
}
