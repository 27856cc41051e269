//! Bundle Module
//!
//! Building, sending and confirming bundles against the searcher service.

// Submodules
pub mod bundle_errors;
pub mod bundle_outcome;
pub mod bundle_packet;
pub mod bundle_status;
pub mod bundle_submitter;

// Re-exports for convenience
pub use bundle_errors::{BundleError, RejectionReason};
pub use bundle_outcome::{classify, OutcomeEvent};
pub use bundle_packet::{
    batch_extract_signatures, extract_signature, packet_to_transaction, transaction_to_packet,
    validate_transaction_size, BundleAttempt,
};
pub use bundle_status::{
    all_confirmed, all_present, ConfirmationLevel, SignatureStatus, SignatureStatusSource,
};
pub use bundle_submitter::{
    BundleConfirmation, BundleResultStream, BundleSubmitter, SearcherServiceClient,
    SubmitterOptions,
};
