use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Event;

/// Transport envelope for an event leaving the core.
///
/// Carries the stable `event_type` and schema version next to the payload so
/// consumers can route without deserializing it. `subject_id` is the id of the
/// record the event is about (stock bucket, reservation, transfer request).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    event_id: Uuid,
    event_type: String,
    event_version: u32,
    subject_id: Uuid,
    occurred_at: DateTime<Utc>,
    payload: P,
}

impl<P> EventEnvelope<P> {
    pub fn new(
        event_id: Uuid,
        event_type: impl Into<String>,
        event_version: u32,
        subject_id: Uuid,
        occurred_at: DateTime<Utc>,
        payload: P,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            event_version,
            subject_id,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Wrap a typed event, serializing it to a JSON payload.
    pub fn from_event<E>(subject_id: Uuid, event: &E) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        Ok(Self::new(
            Uuid::now_v7(),
            event.event_type(),
            event.version(),
            subject_id,
            event.occurred_at(),
            serde_json::to_value(event)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Ping {
        at: DateTime<Utc>,
    }

    impl Event for Ping {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn from_event_copies_metadata() {
        let at = Utc::now();
        let subject = Uuid::now_v7();
        let env = EventEnvelope::from_event(subject, &Ping { at }).unwrap();

        assert_eq!(env.event_type(), "test.ping");
        assert_eq!(env.event_version(), 2);
        assert_eq!(env.subject_id(), subject);
        assert_eq!(env.occurred_at(), at);
        assert!(env.payload().get("at").is_some());
    }
}
