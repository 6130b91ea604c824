// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! CLI tool to run the parallel sieve and print its report.

use clap::{Parser, ValueEnum};
use parasieve::{CpuPinningPolicy, SieveBuilder};

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let builder = SieveBuilder {
        num_threads: cli.num_threads,
        upper_bound: cli.upper_bound,
        cpu_pinning: match cli.cpu_pinning {
            CpuPinningCli::No => CpuPinningPolicy::No,
            CpuPinningCli::IfSupported => CpuPinningPolicy::IfSupported,
            CpuPinningCli::Always => CpuPinningPolicy::Always,
        },
    };

    let mut run = match builder.start() {
        Ok(run) => run,
        Err(e) => {
            eprintln!("failed to start the sieve: {e}");
            std::process::exit(1);
        }
    };

    run.wait();
    match run.report() {
        Ok(report) => println!("{report}"),
        Err(e) => {
            eprintln!("failed to report the run: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Number of worker threads to spawn.
    #[arg(long, default_value_t = 1)]
    num_threads: usize,

    /// Sieve upper bound; candidates are the integers in [2, upper_bound).
    #[arg(long, default_value_t = 10)]
    upper_bound: usize,

    /// Policy to pin worker threads to CPUs.
    #[arg(long, value_enum, default_value = "no")]
    cpu_pinning: CpuPinningCli,
}

#[derive(Clone, Copy, ValueEnum)]
enum CpuPinningCli {
    /// Don't pin worker threads to CPUs.
    No,
    /// Pin worker threads to CPUs, if supported on this platform.
    IfSupported,
    /// Pin worker threads to CPUs, panicking if unsupported.
    Always,
}
