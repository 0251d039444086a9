//! ## cosim-core::federation
//! **Federation directory: which federates have joined**
//!
//! The kernel consumes the [`FederationDirectory`] trait. [`LocalFederation`]
//! is an in-process arena keyed by [`FederateId`] that keeps join order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::RtiError;
use crate::federate::{FederateHandle, FederateId};

pub trait FederationDirectory: Send + Sync {
    fn federation_id(&self) -> &str;

    fn is_federate_joined(&self, id: &FederateId) -> bool;

    fn ambassador(&self, id: &FederateId) -> Option<Arc<dyn FederateHandle>>;

    /// All joined federates in join order.
    fn ambassadors(&self) -> Vec<Arc<dyn FederateHandle>>;
}

#[derive(Default)]
struct Members {
    order: Vec<FederateId>,
    handles: HashMap<FederateId, Arc<dyn FederateHandle>>,
}

pub struct LocalFederation {
    federation_id: String,
    members: RwLock<Members>,
}

impl std::fmt::Debug for LocalFederation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFederation")
            .field("federation_id", &self.federation_id)
            .field("members", &self.members.read().order)
            .finish()
    }
}

impl LocalFederation {
    pub fn new(federation_id: impl Into<String>) -> Self {
        let federation_id = federation_id.into();
        info!("Start federation with id '{federation_id}'");
        Self {
            federation_id,
            members: RwLock::new(Members::default()),
        }
    }

    /// Adds a federate. Ids are unique within a federation.
    pub fn join(&self, handle: Arc<dyn FederateHandle>) -> Result<(), RtiError> {
        let id = handle.id().clone();
        let mut members = self.members.write();
        if members.handles.contains_key(&id) {
            return Err(RtiError::AlreadyJoined(id));
        }
        info!(
            "Add ambassador/federate with id '{id}' (priority {})",
            handle.priority()
        );
        members.order.push(id.clone());
        members.handles.insert(id, handle);
        Ok(())
    }

    /// Removes a federate, returning its handle if it had joined.
    pub fn leave(&self, id: &FederateId) -> Option<Arc<dyn FederateHandle>> {
        let mut members = self.members.write();
        let handle = members.handles.remove(id)?;
        members.order.retain(|member| member != id);
        info!("Federate '{id}' left federation '{}'", self.federation_id);
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.members.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FederationDirectory for LocalFederation {
    fn federation_id(&self) -> &str {
        &self.federation_id
    }

    fn is_federate_joined(&self, id: &FederateId) -> bool {
        self.members.read().handles.contains_key(id)
    }

    fn ambassador(&self, id: &FederateId) -> Option<Arc<dyn FederateHandle>> {
        self.members.read().handles.get(id).cloned()
    }

    fn ambassadors(&self) -> Vec<Arc<dyn FederateHandle>> {
        let members = self.members.read();
        members
            .order
            .iter()
            .filter_map(|id| members.handles.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FederateError;
    use crate::federate::RtiAmbassador;
    use crate::interaction::Interaction;
    use crate::priority::Priority;
    use crate::time::SimTime;

    struct Idle {
        id: FederateId,
    }

    impl FederateHandle for Idle {
        fn id(&self) -> &FederateId {
            &self.id
        }
        fn priority(&self) -> Priority {
            Priority::DEFAULT
        }
        fn is_time_constrained(&self) -> bool {
            true
        }
        fn is_time_regulating(&self) -> bool {
            true
        }
        fn initialize(&self, _: SimTime, _: SimTime, _: &dyn RtiAmbassador) -> Result<(), FederateError> {
            Ok(())
        }
        fn advance_time(&self, _: SimTime, _: &dyn RtiAmbassador) -> Result<(), FederateError> {
            Ok(())
        }
        fn receive_interaction(&self, _: &Interaction, _: &dyn RtiAmbassador) -> Result<(), FederateError> {
            Ok(())
        }
        fn finish_simulation(&self) -> Result<(), FederateError> {
            Ok(())
        }
    }

    fn idle(id: &str) -> Arc<dyn FederateHandle> {
        Arc::new(Idle { id: FederateId::from(id) })
    }

    #[test]
    fn keeps_join_order() {
        let federation = LocalFederation::new("test");
        for id in ["sumo", "ns3", "application"] {
            federation.join(idle(id)).unwrap();
        }
        let ids: Vec<_> = federation
            .ambassadors()
            .iter()
            .map(|h| h.id().to_string())
            .collect();
        assert_eq!(ids, vec!["sumo", "ns3", "application"]);
        assert!(federation.is_federate_joined(&FederateId::from("ns3")));
        assert_eq!(federation.federation_id(), "test");
    }

    #[test]
    fn rejects_second_join_with_same_id() {
        let federation = LocalFederation::new("test");
        federation.join(idle("sumo")).unwrap();
        assert!(matches!(
            federation.join(idle("sumo")),
            Err(RtiError::AlreadyJoined(_))
        ));
        assert_eq!(federation.len(), 1);
    }

    #[test]
    fn leaving_removes_from_directory() {
        let federation = LocalFederation::new("test");
        federation.join(idle("a")).unwrap();
        federation.join(idle("b")).unwrap();
        assert!(federation.leave(&FederateId::from("a")).is_some());
        assert!(federation.leave(&FederateId::from("a")).is_none());
        assert!(!federation.is_federate_joined(&FederateId::from("a")));
        assert_eq!(federation.ambassadors().len(), 1);
    }
}
