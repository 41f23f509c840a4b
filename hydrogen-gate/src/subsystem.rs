use std::fmt;

/// The fixed fifteen-subsystem startup ordering. Shutdown ("landing") walks
/// the same set in reverse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SubsystemName {
    Registry,
    Payload,
    Threads,
    Network,
    Database,
    WebServer,
    WebSocket,
    Terminal,
    Mdns,
    MailRelay,
    Oidc,
    Notify,
    Resources,
    Logging,
    Print,
}

impl SubsystemName {
    /// `Registry -> Payload -> Threads -> Network -> Database -> WebServer
    /// -> WebSocket -> Terminal -> mDNS -> Mail Relay -> OIDC -> Notify ->
    /// Resources -> Logging -> Print`.
    pub const STARTUP_ORDER: [SubsystemName; 15] = [
        SubsystemName::Registry,
        SubsystemName::Payload,
        SubsystemName::Threads,
        SubsystemName::Network,
        SubsystemName::Database,
        SubsystemName::WebServer,
        SubsystemName::WebSocket,
        SubsystemName::Terminal,
        SubsystemName::Mdns,
        SubsystemName::MailRelay,
        SubsystemName::Oidc,
        SubsystemName::Notify,
        SubsystemName::Resources,
        SubsystemName::Logging,
        SubsystemName::Print,
    ];

    /// The registry-name constant a subsystem's own readiness messages lead
    /// with (e.g. `SR_WEBSERVER`).
    pub fn registry_name(self) -> &'static str {
        match self {
            SubsystemName::Registry => "SR_REGISTRY",
            SubsystemName::Payload => "SR_PAYLOAD",
            SubsystemName::Threads => "SR_THREADS",
            SubsystemName::Network => "SR_NETWORK",
            SubsystemName::Database => "SR_DATABASE",
            SubsystemName::WebServer => "SR_WEBSERVER",
            SubsystemName::WebSocket => "SR_WEBSOCKET",
            SubsystemName::Terminal => "SR_TERMINAL",
            SubsystemName::Mdns => "SR_MDNS",
            SubsystemName::MailRelay => "SR_MAIL_RELAY",
            SubsystemName::Oidc => "SR_OIDC",
            SubsystemName::Notify => "SR_NOTIFY",
            SubsystemName::Resources => "SR_RESOURCES",
            SubsystemName::Logging => "SR_LOGGING",
            SubsystemName::Print => "SR_PRINT",
        }
    }

    /// Subsystems this one may not land until they report inactive, used by
    /// [`crate::check_dependent_states`]. Chosen to match the layering a
    /// reader would expect: network-facing subsystems sit above
    /// Database/Network.
    pub fn dependents(self) -> &'static [SubsystemName] {
        match self {
            SubsystemName::Network => &[SubsystemName::WebServer, SubsystemName::WebSocket, SubsystemName::Mdns],
            SubsystemName::Database => &[SubsystemName::WebServer, SubsystemName::WebSocket],
            SubsystemName::Threads => &[SubsystemName::Database, SubsystemName::WebServer, SubsystemName::WebSocket, SubsystemName::Terminal],
            SubsystemName::Registry => &[SubsystemName::Payload, SubsystemName::Threads],
            _ => &[],
        }
    }
}

impl fmt::Display for SubsystemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.registry_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startup_order_is_fixed_and_registry_first() {
        assert_eq!(SubsystemName::STARTUP_ORDER[0], SubsystemName::Registry);
        assert_eq!(SubsystemName::STARTUP_ORDER[4], SubsystemName::Database);
        assert_eq!(SubsystemName::STARTUP_ORDER[14], SubsystemName::Print);
    }

    #[test]
    fn registry_names_are_prefixed() {
        for name in SubsystemName::STARTUP_ORDER {
            assert!(name.registry_name().starts_with("SR_"));
        }
    }
}
