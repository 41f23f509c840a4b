//! Subsystem readiness implementations registered with the gate. `Database`
//! is real, backed by `hydrogen-dqm`'s `QueueManager`; every other surface
//! (HTTP/WebSocket/mDNS/print-job/etc.) is a thin always-ready placeholder,
//! present only so the gate's fixed ordering and `check_dependent_states`
//! have a full registry to walk.

use std::sync::Arc;

use hydrogen_dqm::QueueManager;
use hydrogen_gate::{LaunchReadiness, SubsystemName, SubsystemReadiness};

/// The real Database subsystem: launch readiness holds until every
/// registered Lead queue has converged its migrations (`APPLIED ==
/// AVAILABLE`); landing readiness holds until no queue has a query in
/// flight.
pub struct DatabaseSubsystem {
    queue_manager: Arc<QueueManager>,
}

impl DatabaseSubsystem {
    pub fn new(queue_manager: Arc<QueueManager>) -> Self {
        DatabaseSubsystem { queue_manager }
    }
}

impl SubsystemReadiness for DatabaseSubsystem {
    fn name(&self) -> SubsystemName {
        SubsystemName::Database
    }

    fn check_launch_readiness(&self) -> LaunchReadiness {
        let queues = self.queue_manager.all();
        let pending: Vec<&str> = queues
            .iter()
            .filter(|q| q.is_lead())
            .filter(|q| {
                let (available, _loaded, applied) = q.migration_counters();
                available != applied
            })
            .map(|q| q.database_name())
            .collect();
        let ready = pending.is_empty();
        let line = if ready {
            format!("  Go:      {} database lead(s) fully migrated", queues.iter().filter(|q| q.is_lead()).count())
        } else {
            format!("  No-Go:   migrations pending for: {}", pending.join(", "))
        };
        LaunchReadiness::new(SubsystemName::Database, ready, vec![line])
    }

    fn check_landing_readiness(&self) -> LaunchReadiness {
        let queues = self.queue_manager.all();
        let still_processing: Vec<&str> = queues
            .iter()
            .filter(|q| q.oldest_in_flight_query_age().is_some())
            .map(|q| q.database_name())
            .collect();
        let ready = still_processing.is_empty();
        let line = if ready {
            "  Go:      all database queues idle".to_owned()
        } else {
            format!("  No-Go:   still processing on: {}", still_processing.join(", "))
        };
        LaunchReadiness::new(SubsystemName::Database, ready, vec![line])
    }

    fn is_active(&self) -> bool {
        self.queue_manager
            .all()
            .iter()
            .any(|q| q.oldest_in_flight_query_age().is_some() || q.queries().depth() > 0)
    }
}

/// An always-ready stand-in for a subsystem whose actual protocol logic
/// isn't implemented here: it still participates in the gate's ordering
/// and message-shape contract.
pub struct PlaceholderSubsystem {
    name: SubsystemName,
    description: &'static str,
}

impl PlaceholderSubsystem {
    pub fn new(name: SubsystemName, description: &'static str) -> Self {
        PlaceholderSubsystem { name, description }
    }
}

impl SubsystemReadiness for PlaceholderSubsystem {
    fn name(&self) -> SubsystemName {
        self.name
    }

    fn check_launch_readiness(&self) -> LaunchReadiness {
        LaunchReadiness::new(
            self.name,
            true,
            vec![
                format!("  Go:      {}", self.description),
                format!("  Decide:  Go For Launch of {}", self.name),
            ],
        )
    }

    fn check_landing_readiness(&self) -> LaunchReadiness {
        LaunchReadiness::new(
            self.name,
            true,
            vec![
                format!("  Go:      {} ready for shutdown", self.description),
                format!("  Decide:  Go For Landing of {}", self.name),
            ],
        )
    }

    fn is_active(&self) -> bool {
        false
    }
}

/// Builds the full fifteen-subsystem registry: the real Database subsystem
/// plus a placeholder for every other entry in the fixed startup order.
pub fn build_registry(queue_manager: Arc<QueueManager>) -> Vec<Arc<dyn SubsystemReadiness>> {
    vec![
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Registry, "subsystem registry")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Payload, "embedded payload assets")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Threads, "worker thread pool")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Network, "network interfaces")),
        Arc::new(DatabaseSubsystem::new(queue_manager)),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::WebServer, "HTTP/MHD webserver")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::WebSocket, "WebSocket/PTY terminal bridge")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Terminal, "terminal session manager")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Mdns, "mDNS responder")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::MailRelay, "mail relay")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Oidc, "OIDC configuration surface")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Notify, "notification dispatch")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Resources, "static resource cache")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Logging, "logging sink")),
        Arc::new(PlaceholderSubsystem::new(SubsystemName::Print, "print-job Gcode parser")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use hydrogen_db_core::test_support::MockAdapter;
    use hydrogen_db_core::{ConnectionConfig, EngineAdapter, EngineKind};
    use hydrogen_dqm::{ConnectionPool, DatabaseQueue};
    use std::time::Duration;

    fn queue_manager_with_unmigrated_lead() -> Arc<QueueManager> {
        let adapter: Arc<dyn EngineAdapter> = Arc::new(MockAdapter::new(EngineKind::Sqlite));
        let pool = Arc::new(ConnectionPool::new("primary", adapter, ConnectionConfig::default(), 2));
        let lead = Arc::new(DatabaseQueue::new_lead("primary", ":memory:", 4, Duration::from_secs(30), pool));
        lead.set_available_migration(1000);
        let mgr = Arc::new(QueueManager::new());
        mgr.add(lead).unwrap();
        mgr
    }

    #[test]
    fn database_launch_readiness_is_not_ready_with_pending_migrations() {
        let mgr = queue_manager_with_unmigrated_lead();
        let subsystem = DatabaseSubsystem::new(mgr);
        let report = subsystem.check_launch_readiness();
        assert!(!report.ready);
        assert!(report.is_well_formed());
    }

    #[test]
    fn database_launch_readiness_is_ready_once_migrated() {
        let mgr = queue_manager_with_unmigrated_lead();
        let lead = mgr.get("primary").unwrap();
        lead.tick(); // establishes the persistent connection migrations run through
        let mut cache = hydrogen_dqm::MigrationCache::new();
        cache.insert(hydrogen_dqm::MigrationRecord {
            migration_id: 1000,
            forward_sql: "create table t (id int)".into(),
            reverse_sql: Some("drop table t".into()),
        });
        lead.run_migration(&cache, true, 8).unwrap();
        let subsystem = DatabaseSubsystem::new(mgr);
        assert!(subsystem.check_launch_readiness().ready);
    }

    #[test]
    fn placeholder_subsystems_are_always_ready_and_well_formed() {
        for name in SubsystemName::STARTUP_ORDER {
            if name == SubsystemName::Database {
                continue;
            }
            let subsystem = PlaceholderSubsystem::new(name, "test");
            let launch = subsystem.check_launch_readiness();
            let landing = subsystem.check_landing_readiness();
            assert!(launch.ready && launch.is_well_formed());
            assert!(landing.ready && landing.is_well_formed());
        }
    }
}
