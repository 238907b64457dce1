//! EventsTrace harness library
//!
//! Drives a single EventsTrace child for a test session. The heavy lifting
//! lives in [`etrace_session`]; this crate adds the command-line runner.

pub mod runner;

pub use runner::{run_trace, TraceOptions};

#[cfg(test)]
mod tests {
    use super::*;
    use etrace_core::HarnessConfig;

    #[test]
    fn test_root_exports_leave_core_paths_alone() {
        let options = TraceOptions::new(HarnessConfig::default());
        assert_eq!(options.count, 1);
        assert_eq!(core::mem::size_of::<u32>(), 4);
    }
}
