//! Typed records for DAO factory and voting events.

use std::any::Any;

use chrono::{DateTime, Utc};
use ember::{Record, RecordTypeId};
use serde::Serialize;

/// `DaoAACreated`: a new DAO account deployed by the factory. Its address
/// must join the live filter so proposal events from it are streamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaoCreated {
    pub dao: String,
    pub creator: String,
    pub token_contract: String,
    pub starknet_address: String,
}

impl DaoCreated {
    pub const TYPE: &'static str = "dao.dao_created";
}

impl Record for DaoCreated {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalCreated {
    /// The emitting DAO contract.
    pub dao: String,
    pub proposal_id: String,
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl ProposalCreated {
    pub const TYPE: &'static str = "dao.proposal_created";
}

impl Record for ProposalCreated {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalVote {
    pub dao: String,
    pub proposal_id: String,
    pub voter: String,
    pub total_votes: String,
    pub voted_at: DateTime<Utc>,
}

impl ProposalVote {
    pub const TYPE: &'static str = "dao.proposal_vote";
}

impl Record for ProposalVote {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalCanceled {
    pub dao: String,
    pub proposal_id: String,
    pub owner: String,
}

impl ProposalCanceled {
    pub const TYPE: &'static str = "dao.proposal_canceled";
}

impl Record for ProposalCanceled {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProposalResolved {
    pub dao: String,
    pub proposal_id: String,
    pub owner: String,
    pub result: String,
}

impl ProposalResolved {
    pub const TYPE: &'static str = "dao.proposal_resolved";
}

impl Record for ProposalResolved {
    fn record_type(&self) -> RecordTypeId {
        RecordTypeId::new(Self::TYPE)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
