// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

#![doc = include_str!("../README.md")]
#![forbid(missing_docs, unsafe_code)]

mod array;
mod barrier;
mod cursor;
mod error;
mod macros;
mod report;
mod runner;

pub use array::SieveArray;
pub use barrier::{Arrival, Phase, TwoPhaseBarrier};
pub use cursor::WorkCursor;
pub use error::Error;
pub use report::{interval, RunReport};
pub use runner::{CpuPinningPolicy, SieveBuilder, SieveRun};
