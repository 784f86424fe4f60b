//! Persisted key layout.
//!
//! ```text
//! match:<matchId>            serialized Match
//! zone:<zoneId>              owning matchId
//! participant:<participantId> serialized PlacementRecord
//! suppress:<participantId>   TTL marker, value irrelevant
//! approval:<matchId>         pending end-approval token (TTL)
//! singleton                  active matchId (single-match deployments)
//! ```
//!
//! A non-empty namespace is prepended as `<namespace>:`.

use mm_schemas::{MatchId, ParticipantId, ZoneId};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Keyspace {
    namespace: String,
}

impl Keyspace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn key(&self, kind: &str, id: &str) -> String {
        if self.namespace.is_empty() {
            format!("{kind}:{id}")
        } else {
            format!("{}:{kind}:{id}", self.namespace)
        }
    }

    pub fn match_key(&self, id: &MatchId) -> String {
        self.key("match", id.as_str())
    }

    pub fn zone_key(&self, id: &ZoneId) -> String {
        self.key("zone", id.as_str())
    }

    pub fn participant_key(&self, id: &ParticipantId) -> String {
        self.key("participant", id.as_str())
    }

    pub fn suppress_key(&self, id: &ParticipantId) -> String {
        self.key("suppress", id.as_str())
    }

    pub fn approval_key(&self, id: &MatchId) -> String {
        self.key("approval", id.as_str())
    }

    pub fn singleton_key(&self) -> String {
        if self.namespace.is_empty() {
            "singleton".to_string()
        } else {
            format!("{}:singleton", self.namespace)
        }
    }
}
