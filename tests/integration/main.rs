//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  Nothing here needs a broker or a real shutter.

mod dispatch_tests;
mod gate_tests;
mod rule_tests;
mod timing_tests;
