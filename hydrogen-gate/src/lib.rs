//! The launch/landing readiness protocol (C10): a fixed subsystem ordering,
//! NULL-terminated go/no-go message arrays, and the two aggregate decisions
//! (`handle_landing_plan`, `check_dependent_states`) that drive the daemon's
//! startup and shutdown sequencing.

pub mod readiness;
pub mod subsystem;

pub use readiness::{
    check_dependent_states, handle_landing_plan, run_landing_sequence, run_launch_sequence,
    LaunchReadiness, ReadinessResults, SubsystemReadiness,
};
pub use subsystem::SubsystemName;
