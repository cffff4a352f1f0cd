//! DAO event family: factory deployments, proposals, and votes.

pub mod records;
pub mod schemas;
pub mod store;
pub mod writers;

use std::sync::Arc;

use anyhow::Result;
use ember::{EventSchemaRegistry, SharedFilter};

pub use records::{DaoCreated, ProposalCanceled, ProposalCreated, ProposalResolved, ProposalVote};
pub use store::DaoStore;
pub use writers::{
    DaoCreatedWriter, ProposalCanceledWriter, ProposalCreatedWriter, ProposalResolvedWriter,
    ProposalVoteWriter,
};

/// Register every DAO event schema with its writer. The shared filter is
/// handed to the factory writer so discovered DAOs join the live
/// subscription.
pub fn register(
    registry: &mut EventSchemaRegistry,
    store: Arc<dyn DaoStore>,
    filter: SharedFilter,
) -> Result<()> {
    registry.register(
        schemas::dao_created_schema()?,
        Arc::new(DaoCreatedWriter::new(store.clone()).with_filter(filter)),
    )?;
    registry.register(
        schemas::proposal_created_schema()?,
        Arc::new(ProposalCreatedWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::proposal_voted_schema()?,
        Arc::new(ProposalVoteWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::proposal_canceled_schema()?,
        Arc::new(ProposalCanceledWriter::new(store.clone())),
    )?;
    registry.register(
        schemas::proposal_resolved_schema()?,
        Arc::new(ProposalResolvedWriter::new(store)),
    )?;
    Ok(())
}
