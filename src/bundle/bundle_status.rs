//! Ledger-side confirmation
//!
//! The results stream only says whether the relay took the bundle; whether
//! it landed is answered by the cluster's signature-status query.

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::signature::Signature;
use solana_transaction_status::TransactionConfirmationStatus;

/// Durability level a node reports for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfirmationLevel {
    Processed,
    Confirmed,
    Finalized,
}

impl From<TransactionConfirmationStatus> for ConfirmationLevel {
    fn from(status: TransactionConfirmationStatus) -> Self {
        match status {
            TransactionConfirmationStatus::Processed => Self::Processed,
            TransactionConfirmationStatus::Confirmed => Self::Confirmed,
            TransactionConfirmationStatus::Finalized => Self::Finalized,
        }
    }
}

/// Status of one signature as far as this client cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatus {
    pub slot: u64,
    /// `None` when the node did not report a level
    pub confirmation_level: Option<ConfirmationLevel>,
    /// Execution error, rendered
    pub err: Option<String>,
}

impl SignatureStatus {
    pub fn is_landed(&self) -> bool {
        self.confirmation_level.is_some()
    }
}

/// `GetSignatureStatuses`: one entry per input signature, `None` where the
/// node has not seen the transaction.
#[async_trait]
pub trait SignatureStatusSource: Send + Sync {
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> anyhow::Result<Vec<Option<SignatureStatus>>>;
}

#[async_trait]
impl SignatureStatusSource for RpcClient {
    async fn get_signature_statuses(
        &self,
        signatures: &[Signature],
    ) -> anyhow::Result<Vec<Option<SignatureStatus>>> {
        let response = RpcClient::get_signature_statuses(self, signatures).await?;
        Ok(response
            .value
            .into_iter()
            .map(|status| {
                status.map(|s| SignatureStatus {
                    slot: s.slot,
                    confirmation_level: s.confirmation_status.map(ConfirmationLevel::from),
                    err: s.err.map(|e| format!("{e:?}")),
                })
            })
            .collect())
    }
}

/// Every entry present
pub fn all_present(statuses: &[Option<SignatureStatus>]) -> bool {
    statuses.iter().all(Option::is_some)
}

/// Every entry present and at processed level or better.
///
/// The block engine's own check only accepts processed and confirmed.
/// Finalized is accepted here as well, since a finalized transaction has
/// already passed both.
pub fn all_confirmed(statuses: &[Option<SignatureStatus>]) -> bool {
    !statuses.is_empty()
        && statuses.iter().all(|status| {
            matches!(
                status.as_ref().and_then(|s| s.confirmation_level),
                Some(ConfirmationLevel::Processed)
                    | Some(ConfirmationLevel::Confirmed)
                    | Some(ConfirmationLevel::Finalized)
            )
        })
}
