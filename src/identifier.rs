//! Data identifiers and broker descriptors.

use serde::Serialize;
use std::sync::Arc;

/// Static description of a broker connection, as declared in the `[Brokers]`
/// section of the configuration file.
#[derive(Debug, Clone)]
pub struct BrokerDescriptor {
    pub name: Arc<str>,
    pub host: String,
    pub port: u16,
    pub credentials: Option<(String, String)>,
    pub subscriptions: Vec<String>,
}

impl BrokerDescriptor {
    pub fn new(name: impl Into<Arc<str>>, host: impl Into<String>, port: u16) -> Self {
        BrokerDescriptor {
            name: name.into(),
            host: host.into(),
            port,
            credentials: None,
            subscriptions: Vec::new(),
        }
    }
}

/// A (broker, topic) pair uniquely naming a telemetry stream.
///
/// Equality and hashing are by broker *name* (not host/port/credentials) and
/// topic string, matching the original tool's identity semantics: two
/// `DataIdentifier`s referring to the same named broker are the same
/// identifier even if the broker descriptor were (hypothetically) mutated.
#[derive(Debug, Clone, Serialize)]
pub struct DataIdentifier {
    pub broker: Arc<str>,
    pub topic: Arc<str>,
}

impl DataIdentifier {
    pub fn new(broker: impl Into<Arc<str>>, topic: impl Into<Arc<str>>) -> Self {
        DataIdentifier {
            broker: broker.into(),
            topic: topic.into(),
        }
    }
}

impl PartialEq for DataIdentifier {
    fn eq(&self, other: &Self) -> bool {
        self.broker == other.broker && self.topic == other.topic
    }
}

impl Eq for DataIdentifier {}

impl std::hash::Hash for DataIdentifier {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.broker.hash(state);
        self.topic.hash(state);
    }
}

impl std::fmt::Display for DataIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.broker, self.topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_by_broker_name_and_topic() {
        let a = DataIdentifier::new("brokerA", "room/temp");
        let b = DataIdentifier::new("brokerA", "room/temp");
        let c = DataIdentifier::new("brokerB", "room/temp");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
