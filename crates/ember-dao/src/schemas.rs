//! Event schemas for the DAO factory and DAO account contracts.
//!
//! The proposal events carry the proposal id as a u256 pair in keys; the
//! emitting DAO's address comes from the event context, since one indexer
//! follows many factory-deployed DAOs.

use anyhow::Result;
use ember::codec::{field, CodecError, DecodedFields, FieldKind, FieldLayout};
use ember::{EventContext, EventSchema, Record, SchemaVariant};

use crate::records::{
    DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote,
};

const DAO_AA_CREATED: FieldLayout = FieldLayout {
    keys: &[field("contract_address", FieldKind::Address)],
    data: &[
        field("creator", FieldKind::Address),
        field("token_contract", FieldKind::Address),
        field("starknet_address", FieldKind::Address),
    ],
};

const PROPOSAL_CREATED: FieldLayout = FieldLayout {
    keys: &[field("id", FieldKind::Uint256)],
    data: &[
        field("owner", FieldKind::Address),
        field("created_at", FieldKind::Timestamp),
        field("end_at", FieldKind::Timestamp),
    ],
};

const PROPOSAL_VOTED: FieldLayout = FieldLayout {
    keys: &[field("id", FieldKind::Uint256)],
    data: &[
        field("voter", FieldKind::Address),
        field("total_votes", FieldKind::Uint256),
        field("voted_at", FieldKind::Timestamp),
    ],
};

const PROPOSAL_CANCELED: FieldLayout = FieldLayout {
    keys: &[field("id", FieldKind::Uint256)],
    data: &[field("owner", FieldKind::Address)],
};

const PROPOSAL_RESOLVED: FieldLayout = FieldLayout {
    keys: &[field("id", FieldKind::Uint256)],
    data: &[
        field("owner", FieldKind::Address),
        field("result", FieldKind::ShortString),
    ],
};

fn build_dao_created(
    _ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(DaoCreated {
        dao: fields.require_address("contract_address")?,
        creator: fields.require_address("creator")?,
        token_contract: fields.require_address("token_contract")?,
        starknet_address: fields.require_address("starknet_address")?,
    }))
}

fn build_proposal_created(
    ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(ProposalCreated {
        dao: ctx.contract.clone(),
        proposal_id: fields.require_uint256("id")?.to_string(),
        owner: fields.require_address("owner")?,
        created_at: fields.require_timestamp("created_at")?,
        end_at: fields.require_timestamp("end_at")?,
    }))
}

fn build_proposal_vote(
    ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(ProposalVote {
        dao: ctx.contract.clone(),
        proposal_id: fields.require_uint256("id")?.to_string(),
        voter: fields.require_address("voter")?,
        total_votes: fields.require_uint256("total_votes")?.to_string(),
        voted_at: fields.require_timestamp("voted_at")?,
    }))
}

fn build_proposal_canceled(
    ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(ProposalCanceled {
        dao: ctx.contract.clone(),
        proposal_id: fields.require_uint256("id")?.to_string(),
        owner: fields.require_address("owner")?,
    }))
}

fn build_proposal_resolved(
    ctx: &EventContext,
    fields: &DecodedFields,
) -> Result<Box<dyn Record>, CodecError> {
    Ok(Box::new(ProposalResolved {
        dao: ctx.contract.clone(),
        proposal_id: fields.require_uint256("id")?.to_string(),
        owner: fields.require_address("owner")?,
        result: fields.require_short_string("result")?,
    }))
}

pub fn dao_created_schema() -> Result<EventSchema> {
    EventSchema::new(
        "DaoAACreated",
        vec![SchemaVariant {
            version: 1,
            layout: DAO_AA_CREATED,
            build: build_dao_created,
        }],
    )
}

pub fn proposal_created_schema() -> Result<EventSchema> {
    EventSchema::new(
        "ProposalCreated",
        vec![SchemaVariant {
            version: 1,
            layout: PROPOSAL_CREATED,
            build: build_proposal_created,
        }],
    )
}

pub fn proposal_voted_schema() -> Result<EventSchema> {
    EventSchema::new(
        "ProposalVoted",
        vec![SchemaVariant {
            version: 1,
            layout: PROPOSAL_VOTED,
            build: build_proposal_vote,
        }],
    )
}

pub fn proposal_canceled_schema() -> Result<EventSchema> {
    EventSchema::new(
        "ProposalCanceled",
        vec![SchemaVariant {
            version: 1,
            layout: PROPOSAL_CANCELED,
            build: build_proposal_canceled,
        }],
    )
}

pub fn proposal_resolved_schema() -> Result<EventSchema> {
    EventSchema::new(
        "ProposalResolved",
        vec![SchemaVariant {
            version: 1,
            layout: PROPOSAL_RESOLVED,
            build: build_proposal_resolved,
        }],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember::{BlockHeader, Network, RawEvent};
    use starknet::core::types::Felt;

    fn context(event: &RawEvent) -> EventContext {
        let header = BlockHeader {
            number: 7,
            hash: Felt::from(0x7u64),
            timestamp: 1_700_000_000,
        };
        EventContext::new(Network::StarknetSepolia, &header, event)
    }

    #[test]
    fn proposal_vote_carries_emitting_dao_address() {
        let schema = proposal_voted_schema().unwrap();
        let event = RawEvent {
            from_address: Felt::from(0xdau64),
            keys: vec![schema.selector, Felt::from(9u64), Felt::ZERO],
            data: vec![
                Felt::from(0x1u64),           // voter
                Felt::from(250u64),           // total votes low
                Felt::ZERO,                   // total votes high
                Felt::from(1_700_000_500u64), // voted at
            ],
            transaction_hash: Felt::from(0x42u64),
            event_index: 3,
        };
        let ctx = context(&event);

        let decoded = schema.decode(&event, &ctx, 18).unwrap();
        let vote = decoded.downcast_ref::<ProposalVote>().unwrap();
        assert_eq!(vote.proposal_id, "9");
        assert_eq!(vote.total_votes, "250");
        assert!(vote.dao.ends_with("da"));
        assert_eq!(vote.voted_at.timestamp(), 1_700_000_500);
    }

    #[test]
    fn dao_created_decodes_factory_payload() {
        let schema = dao_created_schema().unwrap();
        let event = RawEvent {
            from_address: Felt::from(0xfac7u64),
            keys: vec![schema.selector, Felt::from(0xd0au64)],
            data: vec![
                Felt::from(0x1u64),
                Felt::from(0x2u64),
                Felt::from(0x3u64),
            ],
            transaction_hash: Felt::from(0x43u64),
            event_index: 0,
        };
        let ctx = context(&event);

        let decoded = schema.decode(&event, &ctx, 18).unwrap();
        let dao = decoded.downcast_ref::<DaoCreated>().unwrap();
        assert!(dao.dao.ends_with("d0a"));
        assert!(dao.creator.ends_with("1"));
    }
}
