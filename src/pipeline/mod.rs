//! Pipeline entry points for monitor operations.
//!
//! - `Engine`: owns registry, ledger and session; runs check cycles
//! - `Scheduler`: daily trigger that never interleaves cycles

pub mod engine;
pub mod schedule;

pub use engine::{CycleReport, Engine, Trigger};
pub use schedule::{
    Scheduler, SharedEngine, StopHandle, StopSignal, next_run_after, stop_signal, trigger_cycle,
};
