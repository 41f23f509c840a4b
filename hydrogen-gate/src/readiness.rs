use std::collections::HashMap;
use std::sync::Arc;

use slog_scope::info;

use crate::subsystem::SubsystemName;

/// One subsystem's go/no-go report. `messages` is shaped like a
/// NULL-terminated C-string array: the first entry is always the
/// subsystem's own registry name, the last is always `None` (the
/// terminator), and everything between is a `"  Go: …"` / `"  No-Go: …"` /
/// `"  Decide: …"` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaunchReadiness {
    pub subsystem: SubsystemName,
    pub ready: bool,
    pub messages: Vec<Option<String>>,
}

impl LaunchReadiness {
    /// Builds a properly-shaped report from the header-less body lines;
    /// callers supply only the `"  Go: …"`-style lines.
    pub fn new(subsystem: SubsystemName, ready: bool, lines: Vec<String>) -> Self {
        let mut messages = Vec::with_capacity(lines.len() + 2);
        messages.push(Some(subsystem.registry_name().to_owned()));
        messages.extend(lines.into_iter().map(Some));
        messages.push(None);
        LaunchReadiness {
            subsystem,
            ready,
            messages,
        }
    }

    /// NULL-terminated, first element is the registry name.
    pub fn is_well_formed(&self) -> bool {
        self.messages.last() == Some(&None)
            && self.messages.first()
                == Some(&Some(self.subsystem.registry_name().to_owned()))
    }
}

/// Implemented by every subsystem the gate coordinates. `hydrogen-dqm`'s
/// Database subsystem is one instance; the HTTP/WebSocket/mDNS/print-job
/// surfaces this workspace doesn't implement are represented by thin
/// placeholder implementations in `hydrogen-server`.
pub trait SubsystemReadiness: Send + Sync {
    fn name(&self) -> SubsystemName;
    fn check_launch_readiness(&self) -> LaunchReadiness;
    fn check_landing_readiness(&self) -> LaunchReadiness;
    /// Whether this subsystem currently has any active work a dependent
    /// landing check should wait on.
    fn is_active(&self) -> bool {
        false
    }
}

/// Per-subsystem decisions plus the gate-wide totals.
#[derive(Debug, Default)]
pub struct ReadinessResults {
    pub reports: Vec<LaunchReadiness>,
    pub ready_count: usize,
    pub not_ready_count: usize,
    pub any_ready: bool,
}

/// Runs every registered subsystem's launch check in the fixed startup
/// order. Subsystems not present in `registered` are skipped; subsystems
/// present more than once are not supported and the first registration
/// wins.
pub fn run_launch_sequence(
    registered: &[Arc<dyn SubsystemReadiness>],
) -> ReadinessResults {
    let mut by_name: HashMap<SubsystemName, &Arc<dyn SubsystemReadiness>> = HashMap::new();
    for subsystem in registered {
        by_name.entry(subsystem.name()).or_insert(subsystem);
    }

    let mut results = ReadinessResults::default();
    for name in SubsystemName::STARTUP_ORDER {
        let Some(subsystem) = by_name.get(&name) else {
            continue;
        };
        let report = subsystem.check_launch_readiness();
        if report.ready {
            results.ready_count += 1;
        } else {
            results.not_ready_count += 1;
            info!("subsystem reported not ready for launch"; "subsystem" => %name);
        }
        results.reports.push(report);
    }
    results.any_ready = results.ready_count > 0;
    results
}

/// Mirrors `run_launch_sequence` but in landing (reverse) order, and asks
/// each subsystem's *landing* readiness rather than launch readiness.
pub fn run_landing_sequence(
    registered: &[Arc<dyn SubsystemReadiness>],
) -> ReadinessResults {
    let mut by_name: HashMap<SubsystemName, &Arc<dyn SubsystemReadiness>> = HashMap::new();
    for subsystem in registered {
        by_name.entry(subsystem.name()).or_insert(subsystem);
    }

    let mut results = ReadinessResults::default();
    for name in SubsystemName::STARTUP_ORDER.iter().rev() {
        let Some(subsystem) = by_name.get(name) else {
            continue;
        };
        let report = subsystem.check_landing_readiness();
        if report.ready {
            results.ready_count += 1;
        } else {
            results.not_ready_count += 1;
        }
        results.reports.push(report);
    }
    results.any_ready = results.ready_count > 0;
    results
}

/// `handle_landing_plan(results)`: true iff at least one subsystem reported
/// ready to land; an empty or all-false result set returns false.
pub fn handle_landing_plan(results: &ReadinessResults) -> bool {
    results.any_ready
}

/// `check_dependent_states(name, registered)`: conservative -- `true` (safe
/// to land) only when every dependent subsystem reports itself inactive.
/// A subsystem with no registered dependents always passes.
pub fn check_dependent_states(
    name: SubsystemName,
    registered: &[Arc<dyn SubsystemReadiness>],
) -> bool {
    let by_name: HashMap<SubsystemName, &Arc<dyn SubsystemReadiness>> = registered
        .iter()
        .map(|subsystem| (subsystem.name(), subsystem))
        .collect();
    name.dependents()
        .iter()
        .all(|dependent| match by_name.get(dependent) {
            Some(subsystem) => !subsystem.is_active(),
            None => true,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Always {
        name: SubsystemName,
        ready: bool,
        active: bool,
    }

    impl SubsystemReadiness for Always {
        fn name(&self) -> SubsystemName {
            self.name
        }

        fn check_launch_readiness(&self) -> LaunchReadiness {
            LaunchReadiness::new(
                self.name,
                self.ready,
                vec![if self.ready {
                    "  Go:      ready".to_owned()
                } else {
                    "  No-Go:   not ready".to_owned()
                }],
            )
        }

        fn check_landing_readiness(&self) -> LaunchReadiness {
            self.check_launch_readiness()
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    #[test]
    fn webserver_landing_readiness_has_expected_message_shape() {
        struct WebServerLanding;
        impl SubsystemReadiness for WebServerLanding {
            fn name(&self) -> SubsystemName {
                SubsystemName::WebServer
            }

            fn check_launch_readiness(&self) -> LaunchReadiness {
                unreachable!("test only exercises landing readiness")
            }

            fn check_landing_readiness(&self) -> LaunchReadiness {
                LaunchReadiness::new(
                    SubsystemName::WebServer,
                    true,
                    vec![
                        "  Go:      WebServer thread ready for shutdown".to_owned(),
                        "  Go:      All resources ready for cleanup".to_owned(),
                        "  Decide:  Go For Landing of WebServer".to_owned(),
                    ],
                )
            }
        }

        let report = WebServerLanding.check_landing_readiness();
        let expected: Vec<Option<String>> = vec![
            Some("SR_WEBSERVER".to_owned()),
            Some("  Go:      WebServer thread ready for shutdown".to_owned()),
            Some("  Go:      All resources ready for cleanup".to_owned()),
            Some("  Decide:  Go For Landing of WebServer".to_owned()),
            None,
        ];
        assert_eq!(report.messages, expected);
        assert!(report.is_well_formed());
    }

    #[test]
    fn launch_sequence_preserves_fixed_order_and_skips_unregistered() {
        let registered: Vec<Arc<dyn SubsystemReadiness>> = vec![
            Arc::new(Always { name: SubsystemName::WebServer, ready: true, active: false }),
            Arc::new(Always { name: SubsystemName::Registry, ready: true, active: false }),
            Arc::new(Always { name: SubsystemName::Database, ready: false, active: false }),
        ];
        let results = run_launch_sequence(&registered);
        let order: Vec<SubsystemName> = results.reports.iter().map(|r| r.subsystem).collect();
        assert_eq!(order, vec![SubsystemName::Registry, SubsystemName::Database, SubsystemName::WebServer]);
        assert_eq!(results.ready_count, 2);
        assert_eq!(results.not_ready_count, 1);
    }

    #[test]
    fn empty_results_do_not_clear_landing() {
        let results = ReadinessResults::default();
        assert!(!handle_landing_plan(&results));
    }

    #[test]
    fn all_false_results_do_not_clear_landing() {
        let registered: Vec<Arc<dyn SubsystemReadiness>> =
            vec![Arc::new(Always { name: SubsystemName::Database, ready: false, active: false })];
        let results = run_launch_sequence(&registered);
        assert!(!handle_landing_plan(&results));
    }

    #[test]
    fn any_ready_subsystem_clears_landing() {
        let registered: Vec<Arc<dyn SubsystemReadiness>> =
            vec![Arc::new(Always { name: SubsystemName::Database, ready: true, active: false })];
        let results = run_launch_sequence(&registered);
        assert!(handle_landing_plan(&results));
    }

    #[test]
    fn dependent_states_blocks_on_active_dependents() {
        let registered: Vec<Arc<dyn SubsystemReadiness>> = vec![
            Arc::new(Always { name: SubsystemName::WebServer, ready: true, active: true }),
        ];
        assert!(!check_dependent_states(SubsystemName::Database, &registered));
    }

    #[test]
    fn dependent_states_passes_once_dependents_go_inactive() {
        let registered: Vec<Arc<dyn SubsystemReadiness>> = vec![
            Arc::new(Always { name: SubsystemName::WebServer, ready: true, active: false }),
        ];
        assert!(check_dependent_states(SubsystemName::Database, &registered));
    }

    #[test]
    fn subsystem_with_no_dependents_always_passes() {
        assert!(check_dependent_states(SubsystemName::Print, &[]));
    }
}
