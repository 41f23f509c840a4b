use crate::engine_kind::EngineKind;

/// Connection options, as either a pre-built connection string or the
/// decomposed fields used to build one. `connection_string` always takes
/// priority over the decomposed fields, for every engine.
#[derive(Clone, Debug, Default)]
pub struct ConnectionConfig {
    pub connection_string: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub prepared_statement_cache_size: Option<u32>,
}

impl ConnectionConfig {
    pub fn cache_size(&self) -> u32 {
        self.prepared_statement_cache_size.unwrap_or(1000).max(1)
    }
}

/// Builds the connection string the adapter will hand its driver, following
/// each engine's own composition rules. Never returns `None` except for the
/// degenerate "config itself absent" case, which isn't representable
/// by-value here -- callers that hold an `Option<ConnectionConfig>` should
/// short-circuit before calling this.
pub fn build_connection_string(kind: EngineKind, config: &ConnectionConfig) -> String {
    if let Some(cs) = &config.connection_string {
        return cs.clone();
    }
    match kind {
        EngineKind::MySql => {
            let host = config.host.as_deref().unwrap_or("localhost");
            let port = config.port.unwrap_or(3306);
            let user = config.username.as_deref().unwrap_or("");
            let pass = config.password.as_deref().unwrap_or("");
            let db = config.database.as_deref().unwrap_or("");
            format!("mysql://{user}:{pass}@{host}:{port}/{db}")
        }
        EngineKind::PostgreSql => {
            let host = config.host.as_deref().unwrap_or("localhost");
            let port = config.port.unwrap_or(5432);
            let user = config.username.as_deref().unwrap_or("");
            let pass = config.password.as_deref().unwrap_or("");
            let db = config.database.as_deref().unwrap_or("");
            format!("postgresql://{user}:{pass}@{host}:{port}/{db}")
        }
        EngineKind::Sqlite => config
            .database
            .clone()
            .unwrap_or_else(|| ":memory:".to_owned()),
        EngineKind::Db2 => config
            .database
            .clone()
            .unwrap_or_else(|| "SAMPLE".to_owned()),
        EngineKind::Ai => String::new(),
    }
}

/// The one engine-independent validity check on a connection string: it must
/// be non-empty. Per-engine grammar checks belong to the adapter.
pub fn non_empty(s: &str) -> bool {
    !s.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    // MySQL connection string default.
    #[test]
    fn mysql_defaults() {
        let cfg = ConnectionConfig::default();
        assert_eq!(
            build_connection_string(EngineKind::MySql, &cfg),
            "mysql://:@localhost:3306/"
        );
    }

    #[test]
    fn mysql_with_host_and_database() {
        let cfg = ConnectionConfig {
            host: Some("remotehost".to_owned()),
            database: Some("mydb".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_connection_string(EngineKind::MySql, &cfg),
            "mysql://:@remotehost:3306/mydb"
        );
    }

    #[test]
    fn mysql_with_host_port_and_database() {
        let cfg = ConnectionConfig {
            host: Some("localhost".to_owned()),
            port: Some(3307),
            database: Some("testdb".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_connection_string(EngineKind::MySql, &cfg),
            "mysql://:@localhost:3307/testdb"
        );
    }

    // SQLite default database.
    #[test]
    fn sqlite_defaults_to_memory() {
        let cfg = ConnectionConfig::default();
        assert_eq!(build_connection_string(EngineKind::Sqlite, &cfg), ":memory:");
    }

    #[test]
    fn sqlite_with_database() {
        let cfg = ConnectionConfig {
            database: Some("mydb.sqlite".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_connection_string(EngineKind::Sqlite, &cfg),
            "mydb.sqlite"
        );
    }

    #[test]
    fn sqlite_connection_string_overrides_database() {
        let cfg = ConnectionConfig {
            connection_string: Some("override.db".to_owned()),
            database: Some("mydb.sqlite".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_connection_string(EngineKind::Sqlite, &cfg),
            "override.db"
        );
    }

    // DB2 default.
    #[test]
    fn db2_defaults_to_sample() {
        let cfg = ConnectionConfig::default();
        assert_eq!(build_connection_string(EngineKind::Db2, &cfg), "SAMPLE");
    }

    #[test]
    fn db2_with_database() {
        let cfg = ConnectionConfig {
            database: Some("TESTDB".to_owned()),
            ..Default::default()
        };
        assert_eq!(build_connection_string(EngineKind::Db2, &cfg), "TESTDB");
    }

    #[test]
    fn db2_connection_string_takes_priority() {
        let cfg = ConnectionConfig {
            connection_string: Some("PRIORITYDB".to_owned()),
            database: Some("TESTDB".to_owned()),
            ..Default::default()
        };
        assert_eq!(
            build_connection_string(EngineKind::Db2, &cfg),
            "PRIORITYDB"
        );
    }

    #[test]
    fn cache_size_floor_is_one() {
        let cfg = ConnectionConfig {
            prepared_statement_cache_size: Some(0),
            ..Default::default()
        };
        assert_eq!(cfg.cache_size(), 1);
    }

    #[test]
    fn cache_size_defaults_to_a_thousand() {
        assert_eq!(ConnectionConfig::default().cache_size(), 1000);
    }
}
