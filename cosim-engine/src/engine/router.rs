//! ## cosim-engine::router
//! **Type-based interaction routing**
//!
//! Subscriptions map an interaction type id to the ids of the subscribed
//! federates, ordered by priority (stable for equal priorities, so earlier
//! subscribers come first). Handles are looked up in the federation directory
//! at delivery time; a federate that has left is skipped. Delivery is
//! synchronous: `publish` returns once every subscriber has received the
//! interaction.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use cosim_core::federate::{FederateHandle, FederateId};
use cosim_core::federation::FederationDirectory;
use cosim_core::interaction::Interaction;
use cosim_core::monitor::{notify, Monitor};
use cosim_core::priority::Priority;
use cosim_core::{FederateError, RtiError};

#[derive(Debug, Clone)]
struct Subscription {
    id: FederateId,
    priority: Priority,
}

pub struct InteractionRouter {
    directory: Arc<dyn FederationDirectory>,
    subscriptions: Mutex<HashMap<String, Vec<Subscription>>>,
}

impl InteractionRouter {
    pub fn new(directory: Arc<dyn FederationDirectory>) -> Self {
        Self {
            directory,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribes a joined federate to `type_id`. Subscribing twice is a no-op.
    pub fn subscribe(&self, federate: &FederateId, type_id: &str) -> Result<(), RtiError> {
        self.subscribe_all(federate, &[type_id])
    }

    pub fn subscribe_all(&self, federate: &FederateId, type_ids: &[&str]) -> Result<(), RtiError> {
        let priority = self
            .directory
            .ambassador(federate)
            .ok_or_else(|| RtiError::UnknownFederate(federate.clone()))?
            .priority();

        let mut subscriptions = self.subscriptions.lock();
        for type_id in type_ids {
            let subscribers = subscriptions.entry((*type_id).to_string()).or_default();
            if subscribers.iter().any(|s| &s.id == federate) {
                continue;
            }
            subscribers.push(Subscription {
                id: federate.clone(),
                priority,
            });
            subscribers.sort_by(|a, b| Priority::compare(b.priority, a.priority));
            debug!("Federate '{federate}' subscribed to '{type_id}'");
        }
        Ok(())
    }

    /// Removes the federate from the given types. Unknown pairs are ignored.
    pub fn unsubscribe(&self, federate: &FederateId, type_ids: &[&str]) {
        let mut subscriptions = self.subscriptions.lock();
        for type_id in type_ids {
            if let Some(subscribers) = subscriptions.get_mut(*type_id) {
                subscribers.retain(|s| &s.id != federate);
            }
        }
    }

    /// Types the federate is currently subscribed to.
    pub fn subscriptions(&self, federate: &FederateId) -> BTreeSet<String> {
        self.subscriptions
            .lock()
            .iter()
            .filter(|(_, subscribers)| subscribers.iter().any(|s| &s.id == federate))
            .map(|(type_id, _)| type_id.clone())
            .collect()
    }

    /// Joined subscribers of `type_id` in delivery order.
    pub fn subscribers(&self, type_id: &str) -> Vec<FederateId> {
        self.recipients(type_id)
            .iter()
            .map(|handle| handle.id().clone())
            .collect()
    }

    /// Resolves the subscribers of `type_id` that are still joined.
    fn recipients(&self, type_id: &str) -> Vec<Arc<dyn FederateHandle>> {
        let subscribers = self
            .subscriptions
            .lock()
            .get(type_id)
            .cloned()
            .unwrap_or_default();
        subscribers
            .iter()
            .filter_map(|subscriber| {
                let handle = self.directory.ambassador(&subscriber.id);
                if handle.is_none() {
                    trace!("Skipping '{}', which left the federation", subscriber.id);
                }
                handle
            })
            .collect()
    }

    /// Delivers `interaction` to a snapshot of its subscribers, in priority
    /// order, through `deliver`. The subscription table is not locked during
    /// delivery, so subscribers may publish or subscribe from their callback.
    ///
    /// Stops at the first delivery error and returns it. Returns the number
    /// of subscribers reached otherwise.
    pub fn publish<F>(
        &self,
        interaction: &Interaction,
        monitor: &dyn Monitor,
        mut deliver: F,
    ) -> Result<usize, FederateError>
    where
        F: FnMut(&dyn FederateHandle) -> Result<(), FederateError>,
    {
        notify("on_interaction", || monitor.on_interaction(interaction));

        let recipients = self.recipients(interaction.type_id());
        if recipients.is_empty() {
            trace!("No subscribers for {interaction}");
            return Ok(0);
        }

        for handle in &recipients {
            notify("on_receive_interaction", || {
                monitor.on_receive_interaction(handle.id(), interaction)
            });
            deliver(handle.as_ref()).map_err(|err| {
                error!("Error during interaction distribution of {interaction}: {err}");
                err
            })?;
        }
        Ok(recipients.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosim_core::federate::RtiAmbassador;
    use cosim_core::federation::LocalFederation;
    use cosim_core::monitor::NoopMonitor;
    use cosim_core::time::SimTime;

    struct Subscriber {
        id: FederateId,
        priority: Priority,
    }

    impl FederateHandle for Subscriber {
        fn id(&self) -> &FederateId {
            &self.id
        }
        fn priority(&self) -> Priority {
            self.priority
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

    fn router(members: &[(&str, u8)]) -> InteractionRouter {
        let federation = LocalFederation::new("router-test");
        for (id, priority) in members {
            federation
                .join(Arc::new(Subscriber {
                    id: FederateId::from(*id),
                    priority: Priority::new(*priority).unwrap(),
                }))
                .unwrap();
        }
        InteractionRouter::new(Arc::new(federation))
    }

    fn ids(ids: &[FederateId]) -> Vec<&str> {
        ids.iter().map(FederateId::as_str).collect()
    }

    #[test]
    fn subscribers_are_ordered_by_priority() {
        let router = router(&[("ns3", 50), ("sumo", 1), ("app", 50), ("env", 100)]);
        for id in ["ns3", "sumo", "app", "env"] {
            router.subscribe(&FederateId::from(id), "V2xMessage").unwrap();
        }
        assert_eq!(
            ids(&router.subscribers("V2xMessage")),
            vec!["sumo", "ns3", "app", "env"]
        );
    }

    #[test]
    fn publish_delivers_in_priority_order() {
        let router = router(&[("low", 10), ("high", 0)]);
        router
            .subscribe_all(&FederateId::from("low"), &["A", "B"])
            .unwrap();
        router.subscribe(&FederateId::from("high"), "A").unwrap();

        let mut delivered = Vec::new();
        let count = router
            .publish(&Interaction::signal("A", 5), &NoopMonitor, |handle| {
                delivered.push(handle.id().to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(delivered, vec!["high", "low"]);
    }

    #[test]
    fn publish_without_subscribers_is_a_noop() {
        let router = router(&[("a", 1)]);
        let count = router
            .publish(&Interaction::signal("Nobody", 0), &NoopMonitor, |_| {
                panic!("no delivery expected")
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn first_delivery_error_stops_distribution() {
        let router = router(&[("a", 0), ("b", 1), ("c", 2)]);
        for id in ["a", "b", "c"] {
            router.subscribe(&FederateId::from(id), "T").unwrap();
        }
        let mut reached = Vec::new();
        let err = router
            .publish(&Interaction::signal("T", 0), &NoopMonitor, |handle| {
                reached.push(handle.id().to_string());
                if handle.id().as_str() == "b" {
                    Err(FederateError::new(handle.id().clone(), "broken"))
                } else {
                    Ok(())
                }
            })
            .unwrap_err();
        assert_eq!(err.federate.as_str(), "b");
        assert_eq!(reached, vec!["a", "b"]);
    }

    #[test]
    fn unknown_federate_cannot_subscribe() {
        let router = router(&[]);
        assert!(matches!(
            router.subscribe(&FederateId::from("ghost"), "T"),
            Err(RtiError::UnknownFederate(_))
        ));
    }

    #[test]
    fn departed_federates_receive_nothing() {
        let federation = Arc::new(LocalFederation::new("router-test"));
        for (id, priority) in [("gone", 0), ("stays", 1)] {
            federation
                .join(Arc::new(Subscriber {
                    id: FederateId::from(id),
                    priority: Priority::new(priority).unwrap(),
                }))
                .unwrap();
        }
        let router = InteractionRouter::new(federation.clone());
        router.subscribe(&FederateId::from("gone"), "T").unwrap();
        router.subscribe(&FederateId::from("stays"), "T").unwrap();

        federation.leave(&FederateId::from("gone")).unwrap();
        assert_eq!(ids(&router.subscribers("T")), vec!["stays"]);

        let mut delivered = Vec::new();
        let count = router
            .publish(&Interaction::signal("T", 0), &NoopMonitor, |handle| {
                delivered.push(handle.id().to_string());
                Ok(())
            })
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(delivered, vec!["stays"]);
    }

    #[test]
    fn subscribe_and_unsubscribe() {
        let router = router(&[("a", 1)]);
        let a = FederateId::from("a");
        router.subscribe_all(&a, &["X", "Y", "X"]).unwrap();
        assert_eq!(router.subscribers("X").len(), 1);
        assert_eq!(
            router.subscriptions(&a).into_iter().collect::<Vec<_>>(),
            vec!["X", "Y"]
        );
        router.unsubscribe(&a, &["X", "Z"]);
        assert!(router.subscribers("X").is_empty());
        assert_eq!(router.subscriptions(&a).len(), 1);
    }
}
