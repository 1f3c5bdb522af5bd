extern crate consheap;

use std::process;

use structopt::StructOpt;

use consheap::driver::{churn, options::ConsheapOptions, statistics::Statistics};

pub fn main() {
    env_logger::init();

    let opt = ConsheapOptions::from_args();
    let mut statistics = Statistics::default();

    match churn::run(&opt, &mut statistics) {
        Ok(()) => exit(&opt, 0, &statistics),
        Err(e) => {
            eprintln!("{e}");
            exit(&opt, e.exit_code(), &statistics)
        }
    }
}

/// Optionally dump stats to stderr then exit
pub fn exit(opts: &ConsheapOptions, code: i32, stats: &Statistics) {
    if opts.statistics {
        eprintln!();
        eprintln!("~~~~~~~~~~");
        eprintln!("STATISTICS");
        eprintln!("~~~~~~~~~~");
        eprintln!();
        eprintln!("{stats}");
    }
    process::exit(code)
}
