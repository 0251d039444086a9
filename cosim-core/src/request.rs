//! ## cosim-core::request
//! **Time-advance requests and the pending-request queue**
//!
//! [`TimedRequest`] carries a total order (ascending = dispatched first):
//! requested time, then better priority, then smaller lookahead, then the
//! sequence id as a stable disambiguator. [`PendingRequests`] keeps them in a
//! `BinaryHeap<Reverse<_>>` and enforces one outstanding request per federate.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use crate::error::RtiError;
use crate::federate::FederateId;
use crate::priority::Priority;
use crate::time::SimTime;

static NEXT_SEQUENCE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedRequest {
    federate_id: FederateId,
    requested_time: SimTime,
    lookahead: SimTime,
    priority: Priority,
    sequence_id: u64,
}

impl TimedRequest {
    pub fn new(
        federate_id: FederateId,
        requested_time: SimTime,
        lookahead: SimTime,
        priority: Priority,
    ) -> Self {
        Self {
            federate_id,
            requested_time,
            lookahead,
            priority,
            sequence_id: NEXT_SEQUENCE_ID.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    #[inline]
    pub fn federate_id(&self) -> &FederateId {
        &self.federate_id
    }

    #[inline]
    pub fn requested_time(&self) -> SimTime {
        self.requested_time
    }

    #[inline]
    pub fn lookahead(&self) -> SimTime {
        self.lookahead
    }

    #[inline]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[inline]
    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    /// Earliest time at which the federate may publish once this request is
    /// granted.
    #[inline]
    pub fn publish_bound(&self) -> SimTime {
        self.requested_time.saturating_add(self.lookahead)
    }

    /// Same time, lookahead and priority as `other`, ignoring the sequence id.
    fn same_request(&self, other: &TimedRequest) -> bool {
        self.federate_id == other.federate_id
            && self.requested_time == other.requested_time
            && self.lookahead == other.lookahead
            && self.priority == other.priority
    }
}

impl PartialOrd for TimedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        self.requested_time
            .cmp(&other.requested_time)
            // better priority is Greater, and must come first
            .then_with(|| Priority::compare(other.priority, self.priority))
            .then_with(|| self.lookahead.cmp(&other.lookahead))
            .then_with(|| self.sequence_id.cmp(&other.sequence_id))
    }
}

impl fmt::Display for TimedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.federate_id, self.requested_time)
    }
}

/// Outcome of admitting a request into [`PendingRequests`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Queued,
    /// An identical request was already outstanding.
    AlreadyQueued,
}

#[derive(Debug, Default)]
pub struct PendingRequests {
    heap: BinaryHeap<Reverse<TimedRequest>>,
    outstanding: HashMap<FederateId, TimedRequest>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits a request at clock time `now`.
    ///
    /// A request in the past is rejected without touching the queue. A second,
    /// different request from a federate that still has one outstanding is a
    /// protocol violation.
    pub fn admit(&mut self, request: TimedRequest, now: SimTime) -> Result<Admission, RtiError> {
        if request.requested_time < now {
            return Err(RtiError::OutOfOrderRequest {
                federate: request.federate_id.clone(),
                requested: request.requested_time,
                current: now,
            });
        }
        if let Some(existing) = self.outstanding.get(&request.federate_id) {
            if existing.same_request(&request) {
                return Ok(Admission::AlreadyQueued);
            }
            return Err(RtiError::DuplicateRequest {
                federate: request.federate_id.clone(),
                requested: request.requested_time,
                outstanding: existing.requested_time,
            });
        }
        self.outstanding
            .insert(request.federate_id.clone(), request.clone());
        self.heap.push(Reverse(request));
        Ok(Admission::Queued)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Time of the earliest pending request.
    pub fn next_time(&self) -> Option<SimTime> {
        self.heap.peek().map(|Reverse(r)| r.requested_time)
    }

    pub fn outstanding(&self, federate: &FederateId) -> Option<&TimedRequest> {
        self.outstanding.get(federate)
    }

    /// Removes every request sharing the minimum requested time, provided that
    /// time does not exceed `limit`. The batch is sorted in dispatch order.
    pub fn pop_wavefront(&mut self, limit: SimTime) -> Option<Vec<TimedRequest>> {
        let time = self.next_time().filter(|time| *time <= limit)?;
        let mut wavefront = Vec::new();
        while let Some(Reverse(head)) = self.heap.peek() {
            if head.requested_time != time {
                break;
            }
            if let Some(Reverse(request)) = self.heap.pop() {
                self.outstanding.remove(&request.federate_id);
                wavefront.push(request);
            }
        }
        Some(wavefront)
    }

    /// Federates with an outstanding request, in dispatch order.
    pub fn federates(&self) -> Vec<FederateId> {
        let mut requests: Vec<&TimedRequest> = self.outstanding.values().collect();
        requests.sort();
        requests.into_iter().map(|r| r.federate_id.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.outstanding.clear();
    }
}
