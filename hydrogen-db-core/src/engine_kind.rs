use std::fmt;

/// The closed tag set of storage engines the registry knows about.
/// `Ai` is reserved for a future engine adapter and always reports
/// unavailable until one is compiled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineKind {
    PostgreSql,
    MySql,
    Sqlite,
    Db2,
    Ai,
}

impl EngineKind {
    pub const ALL: [EngineKind; 5] = [
        EngineKind::PostgreSql,
        EngineKind::MySql,
        EngineKind::Sqlite,
        EngineKind::Db2,
        EngineKind::Ai,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EngineKind::PostgreSql => "postgresql",
            EngineKind::MySql => "mysql",
            EngineKind::Sqlite => "sqlite",
            EngineKind::Db2 => "db2",
            EngineKind::Ai => "ai",
        }
    }

    pub fn parse(s: &str) -> Option<EngineKind> {
        match s {
            "postgresql" | "postgres" => Some(EngineKind::PostgreSql),
            "mysql" => Some(EngineKind::MySql),
            "sqlite" => Some(EngineKind::Sqlite),
            "db2" => Some(EngineKind::Db2),
            "ai" => Some(EngineKind::Ai),
            _ => None,
        }
    }

    pub fn default_port(self) -> Option<u16> {
        match self {
            EngineKind::MySql => Some(3306),
            EngineKind::PostgreSql => Some(5432),
            EngineKind::Sqlite | EngineKind::Db2 | EngineKind::Ai => None,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_kind() {
        for kind in EngineKind::ALL {
            assert_eq!(EngineKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_string_parses_to_none() {
        assert_eq!(EngineKind::parse("oracle"), None);
        assert_eq!(EngineKind::parse(""), None);
    }
}
