//! Translating results-stream messages into outcomes

use super::bundle_errors::{BundleError, RejectionReason};
use crate::wire::{BundleResult, BundleResultKind, Rejected};

/// What the results stream said about a bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeEvent {
    Accepted,
    Rejected(RejectionReason),
}

impl OutcomeEvent {
    /// `None` for results with no outcome this client recognises
    pub fn from_wire(result: &BundleResult) -> Option<Self> {
        match result.result.as_ref()? {
            BundleResultKind::Accepted(_) => Some(Self::Accepted),
            BundleResultKind::Rejected(rejected) => Some(Self::Rejected(reason_from_wire(rejected))),
        }
    }
}

fn reason_from_wire(rejected: &Rejected) -> RejectionReason {
    match rejected {
        Rejected::SimulationFailure(r) => RejectionReason::SimulationFailure {
            signature: r.tx_signature.clone(),
            message: r.msg.clone().unwrap_or_default(),
        },
        Rejected::StateAuctionBidRejected(r) => RejectionReason::StateAuctionLost {
            auction_id: r.auction_id.clone(),
            bid_lamports: r.simulated_bid_lamports,
        },
        Rejected::WinningBatchBidRejected(r) => RejectionReason::GlobalAuctionLost {
            auction_id: r.auction_id.clone(),
            bid_lamports: r.simulated_bid_lamports,
        },
        Rejected::InternalError(r) => RejectionReason::InternalError {
            message: r.msg.clone(),
        },
        Rejected::DroppedBundle(r) => RejectionReason::Dropped {
            message: r.msg.clone(),
        },
    }
}

/// Map an outcome to the error it implies. Pure: the same event always
/// yields the same classification.
pub fn classify(event: &OutcomeEvent) -> Result<(), BundleError> {
    match event {
        OutcomeEvent::Accepted => Ok(()),
        OutcomeEvent::Rejected(reason) => Err(BundleError::Rejected(reason.clone())),
    }
}
