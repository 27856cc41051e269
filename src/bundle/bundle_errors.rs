use std::fmt;

use thiserror::Error;

use crate::auth::AuthError;

/// Authoritative negative outcome from the results stream.
///
/// Each variant carries exactly what its message needs, so callers can
/// branch on the reason rather than parse text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    SimulationFailure { signature: String, message: String },
    StateAuctionLost { auction_id: String, bid_lamports: u64 },
    GlobalAuctionLost { auction_id: String, bid_lamports: u64 },
    InternalError { message: String },
    Dropped { message: String },
}

impl RejectionReason {
    /// Short stable label, used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SimulationFailure { .. } => "simulation_failure",
            Self::StateAuctionLost { .. } => "state_auction_lost",
            Self::GlobalAuctionLost { .. } => "global_auction_lost",
            Self::InternalError { .. } => "internal_error",
            Self::Dropped { .. } => "dropped",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimulationFailure { signature, message } => {
                write!(f, "bundle simulation failure on tx {signature}, message: {message}")
            }
            Self::StateAuctionLost {
                auction_id,
                bid_lamports,
            } => write!(
                f,
                "bundle lost state auction, auction: {auction_id}, tip {bid_lamports} lamports"
            ),
            Self::GlobalAuctionLost {
                auction_id,
                bid_lamports,
            } => write!(
                f,
                "bundle won state auction but failed global auction, auction {auction_id}, tip {bid_lamports} lamports"
            ),
            Self::InternalError { message } => write!(f, "internal error {message}"),
            Self::Dropped { message } => write!(f, "bundle dropped {message}"),
        }
    }
}

/// Bundle building, submission and confirmation errors
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("Bundle contains no transactions")]
    EmptyBundle,

    #[error("Transaction {index} has no signature")]
    UnsignedTransaction { index: usize },

    #[error("Transaction {index} is {size} bytes, exceeds packet limit of {limit} bytes")]
    TransactionTooLarge {
        index: usize,
        size: usize,
        limit: usize,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Authorization error: {0}")]
    Auth(#[from] AuthError),

    #[error("Bundle submission failed: {0}")]
    Submission(tonic::Status),

    #[error("Bundle results subscription failed: {0}")]
    Subscription(tonic::Status),

    #[error("Bundle rejected: {0}")]
    Rejected(RejectionReason),

    #[error("Bundle confirmation error: max retries ({retries}) exceeded")]
    MaxRetriesExceeded {
        retries: u32,
        /// Last error seen on the results stream, if it never delivered
        last_stream_error: Option<String>,
    },

    #[error("Tip account query failed: {0}")]
    TipAccounts(tonic::Status),

    #[error("Block engine returned no tip accounts")]
    NoTipAccounts,

    #[error("{method} failed: {status}")]
    Query {
        method: &'static str,
        status: tonic::Status,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

impl BundleError {
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            Self::Rejected(reason) => Some(reason),
            _ => None,
        }
    }

    /// True for failures that were decided before anything was sent
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::EmptyBundle
                | Self::UnsignedTransaction { .. }
                | Self::TransactionTooLarge { .. }
                | Self::Serialization(_)
        )
    }
}
