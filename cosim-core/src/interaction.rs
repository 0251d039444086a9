//! ## cosim-core::interaction
//! **Typed, timestamped messages exchanged between federates**
//!
//! The `type_id` string is the open routing key used by the router; the
//! [`Payload`] enum carries the content without runtime type inspection.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;

use crate::error::RtiError;
use crate::federate::FederateId;
use crate::time::SimTime;

static NEXT_INTERACTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_interaction_id() -> u64 {
    NEXT_INTERACTION_ID.fetch_add(1, AtomicOrdering::Relaxed)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Text(String),
    Binary(Bytes),
    Fields(BTreeMap<String, String>),
}

impl Payload {
    /// Number of payload bytes, used for logging.
    pub fn len(&self) -> usize {
        match self {
            Payload::Empty => 0,
            Payload::Text(text) => text.len(),
            Payload::Binary(bytes) => bytes.len(),
            Payload::Fields(fields) => fields.iter().map(|(k, v)| k.len() + v.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    id: u64,
    type_id: String,
    time: SimTime,
    sender_id: Option<FederateId>,
    payload: Payload,
}

impl Interaction {
    pub fn new(type_id: impl Into<String>, time: SimTime, payload: Payload) -> Self {
        Self {
            id: next_interaction_id(),
            type_id: type_id.into(),
            time,
            sender_id: None,
            payload,
        }
    }

    /// Interaction without content, e.g. a trigger or a barrier marker.
    pub fn signal(type_id: impl Into<String>, time: SimTime) -> Self {
        Self::new(type_id, time, Payload::Empty)
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    #[inline]
    pub fn time(&self) -> SimTime {
        self.time
    }

    #[inline]
    pub fn sender_id(&self) -> Option<&FederateId> {
        self.sender_id.as_ref()
    }

    #[inline]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Assigns the originating federate. A sender can be assigned once;
    /// assigning the same sender again is accepted.
    pub fn set_sender_id(&mut self, sender: FederateId) -> Result<(), RtiError> {
        match &self.sender_id {
            Some(existing) if *existing != sender => Err(RtiError::SenderAlreadyAssigned {
                type_id: self.type_id.clone(),
                time: self.time,
                sender,
            }),
            _ => {
                self.sender_id = Some(sender);
                Ok(())
            }
        }
    }

    pub fn with_sender(mut self, sender: impl Into<FederateId>) -> Result<Self, RtiError> {
        self.set_sender_id(sender.into())?;
        Ok(self)
    }
}

impl PartialOrd for Interaction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders by time, then by creation id.
impl Ord for Interaction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl fmt::Display for Interaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.type_id, self.time)
    }
}
