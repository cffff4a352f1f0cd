//! Subscription filter composition, with runtime extension for factory-style
//! indexers that discover child contracts while streaming.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use starknet::core::types::Felt;

use super::event::RawEvent;
use super::schema::EventSchemaRegistry;

/// The set of contract addresses and event selectors of interest. Sent
/// verbatim to the chain stream subscription call. An empty set means "no
/// constraint" on that axis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub contracts: BTreeSet<Felt>,
    pub selectors: BTreeSet<Felt>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &RawEvent) -> bool {
        if !self.contracts.is_empty() && !self.contracts.contains(&event.from_address) {
            return false;
        }
        match event.selector() {
            Some(selector) => self.selectors.is_empty() || self.selectors.contains(&selector),
            None => false,
        }
    }
}

/// Pure builder for [`SubscriptionFilter`].
#[derive(Debug, Default)]
pub struct FilterBuilder {
    contracts: BTreeSet<Felt>,
    selectors: BTreeSet<Felt>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contract(mut self, address: Felt) -> Self {
        self.contracts.insert(address);
        self
    }

    pub fn contracts(mut self, addresses: impl IntoIterator<Item = Felt>) -> Self {
        self.contracts.extend(addresses);
        self
    }

    pub fn selector(mut self, selector: Felt) -> Self {
        self.selectors.insert(selector);
        self
    }

    pub fn selectors(mut self, selectors: impl IntoIterator<Item = Felt>) -> Self {
        self.selectors.extend(selectors);
        self
    }

    /// Add every selector the registry knows about.
    pub fn registry_selectors(mut self, registry: &EventSchemaRegistry) -> Self {
        self.selectors.extend(registry.selectors());
        self
    }

    pub fn build(self) -> SubscriptionFilter {
        SubscriptionFilter {
            contracts: self.contracts,
            selectors: self.selectors,
        }
    }
}

/// Live filter shared between the dispatcher and factory writers.
///
/// A writer that discovers a child contract calls [`SharedFilter::add_contract`];
/// the generation counter bumps and the dispatcher reopens its subscription
/// from the committed cursor at the next block boundary. Redelivered events
/// are absorbed by the dedup key.
#[derive(Clone)]
pub struct SharedFilter {
    inner: Arc<RwLock<SubscriptionFilter>>,
    generation: Arc<AtomicU64>,
}

impl SharedFilter {
    pub fn new(filter: SubscriptionFilter) -> Self {
        Self {
            inner: Arc::new(RwLock::new(filter)),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> SubscriptionFilter {
        self.inner.read().expect("filter lock poisoned").clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Add a contract to the live filter. Returns true if it was new.
    pub fn add_contract(&self, address: Felt) -> bool {
        let mut filter = self.inner.write().expect("filter lock poisoned");
        let added = filter.contracts.insert(address);
        drop(filter);
        if added {
            self.generation.fetch_add(1, Ordering::AcqRel);
            tracing::info!(
                target: "ember::filter",
                contract = %format!("{address:#x}"),
                "live filter extended"
            );
        }
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(from: u64, selector: u64) -> RawEvent {
        RawEvent {
            from_address: Felt::from(from),
            keys: vec![Felt::from(selector)],
            data: vec![],
            transaction_hash: Felt::ZERO,
            event_index: 0,
        }
    }

    #[test]
    fn filter_matches_on_both_axes() {
        let filter = FilterBuilder::new()
            .contract(Felt::from(0x10u64))
            .selector(Felt::from(0x1u64))
            .build();

        assert!(filter.matches(&event(0x10, 0x1)));
        assert!(!filter.matches(&event(0x11, 0x1)));
        assert!(!filter.matches(&event(0x10, 0x2)));
    }

    #[test]
    fn empty_axis_means_no_constraint() {
        let filter = FilterBuilder::new().selector(Felt::from(0x1u64)).build();
        assert!(filter.matches(&event(0xdead, 0x1)));

        let keyless = RawEvent {
            from_address: Felt::ZERO,
            keys: vec![],
            data: vec![],
            transaction_hash: Felt::ZERO,
            event_index: 0,
        };
        assert!(!filter.matches(&keyless));
    }

    #[test]
    fn shared_filter_bumps_generation_only_on_new_contracts() {
        let shared = SharedFilter::new(FilterBuilder::new().build());
        assert_eq!(shared.generation(), 0);

        assert!(shared.add_contract(Felt::from(0x42u64)));
        assert_eq!(shared.generation(), 1);

        // Re-adding the same address is a no-op.
        assert!(!shared.add_contract(Felt::from(0x42u64)));
        assert_eq!(shared.generation(), 1);

        assert!(shared.snapshot().contracts.contains(&Felt::from(0x42u64)));
    }
}
