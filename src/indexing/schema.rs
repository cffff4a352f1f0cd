//! Event schema registry: selector → decoding recipe + handler.
//!
//! The registry is an explicit, constructed value passed into the dispatcher
//! at startup. Selectors are computed once at registration time from the
//! canonical event name (Starknet selector convention), so the key space is
//! fixed for the known event set. Unknown selectors encountered at runtime
//! are the dispatcher's problem to log and skip, never this module's to fail
//! on.

use std::any::Any;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use starknet::core::types::Felt;
use starknet::core::utils::get_selector_from_name;
use thiserror::Error;

use super::codec::{self, CodecError, DecodedFields, FieldLayout};
use super::event::{EventContext, RawEvent, TransferId};
use super::writer::RecordWriter;

/// Identifier for a decoded record type, hashed from its canonical name.
/// Stable across restarts and independent of registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordTypeId(u64);

impl RecordTypeId {
    pub fn new(type_name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        type_name.hash(&mut hasher);
        RecordTypeId(hasher.finish())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Typed domain record produced by decoding. Writers downcast via
/// [`DecodedRecord::downcast_ref`].
pub trait Record: Send + Sync + std::fmt::Debug {
    fn record_type(&self) -> RecordTypeId;
    fn as_any(&self) -> &dyn Any;
}

/// A decoded record plus the on-chain context it was decoded from.
#[derive(Debug)]
pub struct DecodedRecord {
    pub context: EventContext,
    pub body: Box<dyn Record>,
}

impl DecodedRecord {
    pub fn record_type(&self) -> RecordTypeId {
        self.body.record_type()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.body.as_any().downcast_ref::<T>()
    }

    pub fn transfer_id(&self) -> TransferId {
        self.context.transfer_id()
    }
}

/// Builds a typed record from decoded fields.
pub type RecordBuilder = fn(&EventContext, &DecodedFields) -> Result<Box<dyn Record>, CodecError>;

/// One versioned payload layout for an event. Contract upgrades that append
/// fields become new variants here, selected by exact payload shape, instead
/// of length-sniffing inside decode logic.
#[derive(Clone)]
pub struct SchemaVariant {
    pub version: u16,
    pub layout: FieldLayout,
    pub build: RecordBuilder,
}

impl SchemaVariant {
    fn matches(&self, event: &RawEvent) -> bool {
        event.keys.len() == 1 + self.layout.key_slots()
            && event.data.len() == self.layout.data_slots()
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("event {event} has no schema variant for {keys_len} keys / {data_len} data felts")]
    NoMatchingVariant {
        event: &'static str,
        keys_len: usize,
        data_len: usize,
    },

    #[error("failed to decode {event}: {source}")]
    Field {
        event: &'static str,
        #[source]
        source: CodecError,
    },
}

/// Decoding recipe for one event: canonical name, selector, and its
/// versioned layouts.
#[derive(Clone)]
pub struct EventSchema {
    pub name: &'static str,
    pub selector: Felt,
    pub variants: Vec<SchemaVariant>,
}

impl EventSchema {
    /// Computes the selector from the canonical event name.
    pub fn new(name: &'static str, variants: Vec<SchemaVariant>) -> Result<Self> {
        let selector = selector_of(name)?;
        Ok(Self {
            name,
            selector,
            variants,
        })
    }

    /// Decode an event against the first variant matching its payload shape.
    pub fn decode(
        &self,
        event: &RawEvent,
        ctx: &EventContext,
        decimals: u32,
    ) -> Result<DecodedRecord, DecodeError> {
        let variant = self
            .variants
            .iter()
            .find(|v| v.matches(event))
            .ok_or(DecodeError::NoMatchingVariant {
                event: self.name,
                keys_len: event.keys.len(),
                data_len: event.data.len(),
            })?;

        let fields = codec::decode_fields(&variant.layout, event, decimals)
            .map_err(|source| DecodeError::Field {
                event: self.name,
                source,
            })?;

        let body = (variant.build)(ctx, &fields).map_err(|source| DecodeError::Field {
            event: self.name,
            source,
        })?;

        Ok(DecodedRecord {
            context: ctx.clone(),
            body,
        })
    }
}

/// Starknet selector of a canonical event name (sn_keccak, 252-bit).
pub fn selector_of(event_name: &str) -> Result<Felt> {
    get_selector_from_name(event_name)
        .with_context(|| format!("invalid event name: {event_name}"))
}

/// A schema paired with the writer that handles its records.
pub struct RegisteredSchema {
    pub schema: EventSchema,
    pub writer: Arc<dyn RecordWriter>,
}

/// Selector-keyed registry of event schemas and their handlers. Built once at
/// startup and immutable at runtime.
#[derive(Default)]
pub struct EventSchemaRegistry {
    schemas: HashMap<Felt, RegisteredSchema>,
}

impl EventSchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: EventSchema, writer: Arc<dyn RecordWriter>) -> Result<()> {
        if self.schemas.contains_key(&schema.selector) {
            bail!(
                "event {} is already registered (selector {:#x})",
                schema.name,
                schema.selector
            );
        }

        tracing::debug!(
            target: "ember::schema",
            event = schema.name,
            selector = %format!("{:#x}", schema.selector),
            variants = schema.variants.len(),
            writer = writer.name(),
            "registered event schema"
        );

        self.schemas
            .insert(schema.selector, RegisteredSchema { schema, writer });
        Ok(())
    }

    pub fn resolve(&self, selector: &Felt) -> Option<&RegisteredSchema> {
        self.schemas.get(selector)
    }

    pub fn selectors(&self) -> impl Iterator<Item = Felt> + '_ {
        self.schemas.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::codec::{field, FieldKind};
    use crate::indexing::writer::WriteOutcome;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Probe {
        value: String,
    }

    impl Record for Probe {
        fn record_type(&self) -> RecordTypeId {
            RecordTypeId::new("test.probe")
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct NullWriter;

    #[async_trait]
    impl RecordWriter for NullWriter {
        fn name(&self) -> &str {
            "null"
        }

        fn accepts(&self, _record_type: RecordTypeId) -> bool {
            true
        }

        async fn write(&self, _record: &DecodedRecord) -> WriteOutcome {
            WriteOutcome::Written
        }
    }

    fn build_probe(
        _ctx: &EventContext,
        fields: &DecodedFields,
    ) -> Result<Box<dyn Record>, CodecError> {
        Ok(Box::new(Probe {
            value: fields.require_address("who")?,
        }))
    }

    fn probe_schema() -> EventSchema {
        const KEYS: &[codec::FieldDef] = &[field("who", FieldKind::Address)];
        EventSchema::new(
            "ProbeFired",
            vec![SchemaVariant {
                version: 1,
                layout: FieldLayout {
                    keys: KEYS,
                    data: &[],
                },
                build: build_probe,
            }],
        )
        .unwrap()
    }

    #[test]
    fn selector_is_stable_for_known_names() {
        let a = selector_of("CreateLaunch").unwrap();
        let b = selector_of("CreateLaunch").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, selector_of("SellToken").unwrap());
    }

    #[test]
    fn resolve_finds_registered_and_misses_unknown() {
        let mut registry = EventSchemaRegistry::new();
        registry
            .register(probe_schema(), Arc::new(NullWriter))
            .unwrap();

        let selector = selector_of("ProbeFired").unwrap();
        assert!(registry.resolve(&selector).is_some());
        assert!(registry
            .resolve(&selector_of("SomethingElse").unwrap())
            .is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = EventSchemaRegistry::new();
        registry
            .register(probe_schema(), Arc::new(NullWriter))
            .unwrap();
        assert!(registry
            .register(probe_schema(), Arc::new(NullWriter))
            .is_err());
    }

    #[test]
    fn decode_picks_matching_variant_and_builds_record() {
        use crate::indexing::event::{BlockHeader, Network};

        let schema = probe_schema();
        let event = RawEvent {
            from_address: Felt::from(0x1u64),
            keys: vec![schema.selector, Felt::from(0x42u64)],
            data: vec![],
            transaction_hash: Felt::from(0x2u64),
            event_index: 0,
        };
        let header = BlockHeader {
            number: 1,
            hash: Felt::ZERO,
            timestamp: 0,
        };
        let ctx = EventContext::new(Network::StarknetSepolia, &header, &event);

        let decoded = schema.decode(&event, &ctx, 18).unwrap();
        let probe = decoded.downcast_ref::<Probe>().unwrap();
        assert!(probe.value.ends_with("42"));

        // Shape mismatch surfaces as NoMatchingVariant, never a panic.
        let wrong = RawEvent {
            keys: vec![schema.selector],
            ..event
        };
        assert!(matches!(
            schema.decode(&wrong, &ctx, 18),
            Err(DecodeError::NoMatchingVariant { .. })
        ));
    }
}
