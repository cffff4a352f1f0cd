//! Nameservice event family: username claims.

use std::any::Any;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ember::codec::{field, CodecError, DecodedFields, FieldKind, FieldLayout};
use ember::{
    DecodedRecord, EventContext, EventSchema, EventSchemaRegistry, Record, RecordTypeId,
    RecordWriter, SchemaVariant, StoreError, StoreInsert, WriteOutcome,
};
use serde::Serialize;

/// `UsernameClaimed`: a username bought for a period of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NameClaim {
    pub owner: String,
    pub username: String,
    pub expiry: DateTime<Utc>,
    pub paid: String,
    pub quote_token: String,
}

impl NameClaim {
    pub const TYPE: &'static str = "nameservice.name_claim";
}

impl Record for NameClaim {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

const USERNAME_CLAIMED: FieldLayout = FieldLayout {
    keys: &[field("address", FieldKind::Address)],
    data: &[
        field("username", FieldKind::ShortString),
        field("expiry", FieldKind::Timestamp),
        field("paid", FieldKind::Amount),
        field("quote_token", FieldKind::Address),
    ],
};

fn build_name_claim(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(NameClaim {
        owner: fields.require_address("address")?,
        username: fields.require_short_string("username")?,
        expiry: fields.require_timestamp("expiry")?,
        paid: fields.require_amount("paid")?,
        quote_token: fields.require_address("quote_token")?,
    }))
}

pub fn username_claimed_schema() -> Result<EventSchema> {
    EventSchema::new(
        "UsernameClaimed",
        vec![SchemaVariant {
            version: 1,
            layout: USERNAME_CLAIMED,
            build: build_name_claim,
        }],
    )
}

#[async_trait]
pub trait NameserviceStore: Send + Sync {
    async fn insert_claim(
        &self,
        ctx: &EventContext,
        record: &NameClaim,
    ) -> Result<StoreInsert, StoreError>;
}

pub struct NameClaimWriter {
    store: Arc<dyn NameserviceStore>,
    type_id: RecordTypeId,
}

impl NameClaimWriter {
    pub fn new(store: Arc<dyn NameserviceStore>) -> Self {
        Self {
            store,
            type_id: RecordTypeId::new(NameClaim::TYPE),
        }
    }
}

#[async_trait]
impl RecordWriter for NameClaimWriter {
    fn name(&self) -> &str {
        "nameservice.name_claim"
    }

    fn accepts(&self, record_type: RecordTypeId) -> bool {
        record_type == self.type_id
    }

    async fn write(&self, record: &DecodedRecord) -> WriteOutcome {
        let Some(claim) = record.downcast_ref::<NameClaim>() else {
            return WriteOutcome::Failed("record is not a NameClaim".into());
        };
        match self.store.insert_claim(&record.context, claim).await {
            Ok(StoreInsert::Created) => WriteOutcome::Written,
            Ok(StoreInsert::Duplicate) => {
                tracing::debug!(
                    target: "ember_nameservice::writer",
                    transfer_id = %record.transfer_id(),
                    "duplicate name claim, skipping"
                );
                WriteOutcome::Skipped
            }
            Err(e) => WriteOutcome::Failed(e.to_string()),
        }
    }
}

/// Register the nameservice schema with its writer.
pub fn register(registry: &mut EventSchemaRegistry, store: Arc<dyn NameserviceStore>) -> Result<()> {
    registry.register(
        username_claimed_schema()?,
        Arc::new(NameClaimWriter::new(store)),
    )
}
