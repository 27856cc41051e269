//! Bundle submission with confirmation
//!
//! A bundle is sent exactly once. Its fate is then decided by two feeds:
//!
//! - the results stream, whose rejections are authoritative and end the
//!   call immediately
//! - the signature-status query, the only source of positive confirmation
//!
//! Each confirmation round listens on the stream for up to
//! `check_retry_delay`, then polls statuses until every signature is known
//! or `status_timeout` elapses. Rounds run strictly one after another.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use rand::seq::SliceRandom;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tokio::time::Instant;
use tracing::{debug, info};

use super::bundle_errors::BundleError;
use super::bundle_outcome::{classify, OutcomeEvent};
use super::bundle_packet::BundleAttempt;
use super::bundle_status::{all_confirmed, all_present, SignatureStatus, SignatureStatusSource};
use crate::auth::AuthSession;
use crate::context::CancelSignal;
use crate::metrics::{ClientMetrics, Timer};
use crate::structured_logging::BundleLogger;
use crate::wire::{
    BundleResult, ConnectedLeadersRegionedRequest, ConnectedLeadersRegionedResponse,
    ConnectedLeadersRequest, ConnectedLeadersResponse, GetRegionsRequest, GetRegionsResponse,
    GetTipAccountsRequest, GetTipAccountsResponse, NextScheduledLeaderRequest,
    NextScheduledLeaderResponse, SendBundleRequest, SendBundleResponse,
    SubscribeBundleResultsRequest,
};

/// Stream of results for every bundle this searcher submits
pub type BundleResultStream = BoxStream<'static, Result<BundleResult, tonic::Status>>;

/// The block engine's searcher service. Requests arrive already carrying
/// the session's authorization metadata.
#[async_trait]
pub trait SearcherServiceClient: Send + Sync {
    async fn send_bundle(
        &self,
        request: tonic::Request<SendBundleRequest>,
    ) -> Result<SendBundleResponse, tonic::Status>;

    async fn subscribe_bundle_results(
        &self,
        request: tonic::Request<SubscribeBundleResultsRequest>,
    ) -> Result<BundleResultStream, tonic::Status>;

    async fn get_tip_accounts(
        &self,
        request: tonic::Request<GetTipAccountsRequest>,
    ) -> Result<GetTipAccountsResponse, tonic::Status>;

    async fn get_regions(
        &self,
        request: tonic::Request<GetRegionsRequest>,
    ) -> Result<GetRegionsResponse, tonic::Status>;

    async fn get_connected_leaders(
        &self,
        request: tonic::Request<ConnectedLeadersRequest>,
    ) -> Result<ConnectedLeadersResponse, tonic::Status>;

    async fn get_connected_leaders_regioned(
        &self,
        request: tonic::Request<ConnectedLeadersRegionedRequest>,
    ) -> Result<ConnectedLeadersRegionedResponse, tonic::Status>;

    async fn get_next_scheduled_leader(
        &self,
        request: tonic::Request<NextScheduledLeaderRequest>,
    ) -> Result<NextScheduledLeaderResponse, tonic::Status>;
}

/// Confirmation timing
#[derive(Debug, Clone)]
pub struct SubmitterOptions {
    /// Confirmation rounds before giving up
    pub check_retries: u32,
    /// Length of each round's stream listening window
    pub check_retry_delay: Duration,
    /// Ceiling on one round's status polling
    pub status_timeout: Duration,
    /// Pause between status polls while any signature is unknown
    pub status_retry_delay: Duration,
}

impl Default for SubmitterOptions {
    fn default() -> Self {
        Self {
            check_retries: 5,
            check_retry_delay: Duration::from_secs(5),
            status_timeout: Duration::from_secs(15),
            status_retry_delay: Duration::from_secs(1),
        }
    }
}

/// A bundle that landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfirmation {
    pub bundle_id: String,
    /// First signature of each transaction, in submission order
    pub signatures: Vec<Signature>,
    /// Round in which confirmation was observed, starting at 1
    pub attempts: u32,
}

enum StreamRead {
    Outcome(OutcomeEvent),
    Idle,
    Failed(String),
    Closed,
    Cancelled,
}

enum StatusWait {
    TimedOut,
    Query(String),
    Cancelled,
}

pub struct BundleSubmitter {
    searcher: Arc<dyn SearcherServiceClient>,
    statuses: Arc<dyn SignatureStatusSource>,
    session: Arc<AuthSession>,
    results: tokio::sync::Mutex<Option<BundleResultStream>>,
    options: SubmitterOptions,
    metrics: Option<Arc<ClientMetrics>>,
}

impl BundleSubmitter {
    /// Subscribe to bundle results and return a ready submitter.
    ///
    /// `session` must already be authenticated.
    pub async fn connect(
        searcher: Arc<dyn SearcherServiceClient>,
        statuses: Arc<dyn SignatureStatusSource>,
        session: Arc<AuthSession>,
        options: SubmitterOptions,
    ) -> Result<Self, BundleError> {
        let stream = subscribe(searcher.as_ref(), &session).await?;
        info!(role = %session.role(), "Subscribed to bundle results");

        Ok(Self {
            searcher,
            statuses,
            session,
            results: tokio::sync::Mutex::new(Some(stream)),
            options,
            metrics: None,
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<ClientMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn options(&self) -> &SubmitterOptions {
        &self.options
    }

    /// Replace the results subscription, e.g. after the stream ended
    pub async fn resubscribe(&self) -> Result<(), BundleError> {
        let stream = subscribe(self.searcher.as_ref(), &self.session).await?;
        *self.results.lock().await = Some(stream);
        info!("Re-subscribed to bundle results");
        Ok(())
    }

    /// Send one bundle without waiting for any outcome
    pub async fn send_bundle(
        &self,
        transactions: &[VersionedTransaction],
    ) -> Result<(BundleAttempt, SendBundleResponse), BundleError> {
        let cancel = self.session.cancel_signal();
        if cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }

        let attempt = BundleAttempt::new(transactions)?;
        let request = self.session.authorize(attempt.to_request())?;
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(BundleError::Cancelled),
            response = self.searcher.send_bundle(request) => {
                response.map_err(BundleError::Submission)?
            }
        };
        if let Some(m) = &self.metrics {
            m.bundles_submitted.inc();
        }
        Ok((attempt, response))
    }

    /// Send `transactions` as one bundle and wait until it is confirmed on
    /// the ledger, rejected, or the retry budget runs out.
    pub async fn submit_with_confirmation(
        &self,
        transactions: &[VersionedTransaction],
    ) -> Result<BundleConfirmation, BundleError> {
        let cancel = self.session.cancel_signal();
        let logger = BundleLogger::new();

        let (attempt, response) = self.send_bundle(transactions).await?;
        let bundle_id = response.uuid;
        logger.log_submitted(&bundle_id, attempt.len());
        let timer = Timer::new();

        let mut last_stream_error: Option<String> = None;

        for round in 1..=self.options.check_retries {
            if cancel.is_cancelled() {
                return Err(BundleError::Cancelled);
            }

            let window_end = Instant::now() + self.options.check_retry_delay;
            match self.next_outcome(&bundle_id, window_end, &cancel).await {
                StreamRead::Outcome(event) => {
                    last_stream_error = None;
                    if let Err(err) = classify(&event) {
                        if let Some(reason) = err.rejection() {
                            logger.log_rejected(&bundle_id, round, reason);
                        }
                        if let Some(m) = &self.metrics {
                            m.bundles_rejected.inc();
                        }
                        return Err(err);
                    }
                    logger.log_accepted(&bundle_id, round);
                }
                StreamRead::Failed(error) => {
                    logger.log_stream_error(round, &error);
                    last_stream_error = Some(error);
                }
                StreamRead::Idle | StreamRead::Closed => {}
                StreamRead::Cancelled => return Err(BundleError::Cancelled),
            }

            let rest = window_end.saturating_duration_since(Instant::now());
            if !cancel.sleep(rest).await {
                return Err(BundleError::Cancelled);
            }

            let statuses = match self
                .wait_for_signature_statuses(attempt.signatures(), &cancel)
                .await
            {
                Ok(statuses) => statuses,
                Err(StatusWait::Cancelled) => return Err(BundleError::Cancelled),
                Err(StatusWait::TimedOut) => {
                    logger.log_pending(round, "signature statuses not available in time");
                    continue;
                }
                Err(StatusWait::Query(error)) => {
                    logger.log_pending(round, &error);
                    continue;
                }
            };

            if !all_confirmed(&statuses) {
                logger.log_pending(round, "signature statuses below processed");
                continue;
            }

            let latency = timer.elapsed_secs();
            if let Some(m) = &self.metrics {
                m.bundles_confirmed.inc();
                m.confirmation_latency.observe(latency);
            }
            logger.log_confirmed(&bundle_id, round, (latency * 1000.0) as u64);

            return Ok(BundleConfirmation {
                bundle_id,
                signatures: attempt.signatures().to_vec(),
                attempts: round,
            });
        }

        if let Some(m) = &self.metrics {
            m.bundles_exhausted.inc();
        }
        logger.log_exhausted(&bundle_id, self.options.check_retries);
        Err(BundleError::MaxRetriesExceeded {
            retries: self.options.check_retries,
            last_stream_error,
        })
    }

    /// Current tip accounts
    pub async fn get_tip_accounts(&self) -> Result<Vec<Pubkey>, BundleError> {
        let request = self.session.authorize(GetTipAccountsRequest)?;
        let response = self
            .searcher
            .get_tip_accounts(request)
            .await
            .map_err(BundleError::TipAccounts)?;

        response
            .accounts
            .iter()
            .map(|account| {
                account
                    .parse::<Pubkey>()
                    .map_err(|e| BundleError::Serialization(format!("tip account '{account}': {e}")))
            })
            .collect()
    }

    /// One tip account picked uniformly at random
    pub async fn random_tip_account(&self) -> Result<Pubkey, BundleError> {
        let accounts = self.get_tip_accounts().await?;
        accounts
            .choose(&mut rand::thread_rng())
            .copied()
            .ok_or(BundleError::NoTipAccounts)
    }

    /// Region of the answering block engine and every region it knows
    pub async fn get_regions(&self) -> Result<GetRegionsResponse, BundleError> {
        let request = self.session.authorize(GetRegionsRequest)?;
        self.searcher
            .get_regions(request)
            .await
            .map_err(|status| BundleError::Query {
                method: "GetRegions",
                status,
            })
    }

    /// Leaders connected to this block engine and their upcoming slots
    pub async fn get_connected_leaders(&self) -> Result<ConnectedLeadersResponse, BundleError> {
        let request = self.session.authorize(ConnectedLeadersRequest)?;
        self.searcher
            .get_connected_leaders(request)
            .await
            .map_err(|status| BundleError::Query {
                method: "GetConnectedLeaders",
                status,
            })
    }

    /// Connected leaders grouped by region; an empty `regions` asks for all
    pub async fn get_connected_leaders_regioned(
        &self,
        regions: &[String],
    ) -> Result<ConnectedLeadersRegionedResponse, BundleError> {
        let request = self.session.authorize(ConnectedLeadersRegionedRequest {
            regions: regions.to_vec(),
        })?;
        self.searcher
            .get_connected_leaders_regioned(request)
            .await
            .map_err(|status| BundleError::Query {
                method: "GetConnectedLeadersRegioned",
                status,
            })
    }

    /// Next leader slot scheduled in `regions`
    pub async fn get_next_scheduled_leader(
        &self,
        regions: &[String],
    ) -> Result<NextScheduledLeaderResponse, BundleError> {
        let request = self.session.authorize(NextScheduledLeaderRequest {
            regions: regions.to_vec(),
        })?;
        self.searcher
            .get_next_scheduled_leader(request)
            .await
            .map_err(|status| BundleError::Query {
                method: "GetNextScheduledLeader",
                status,
            })
    }

    /// Read the results stream until an outcome for `bundle_id` arrives or
    /// `window_end` passes. Results for other bundles are skipped.
    async fn next_outcome(
        &self,
        bundle_id: &str,
        window_end: Instant,
        cancel: &CancelSignal,
    ) -> StreamRead {
        let mut guard = self.results.lock().await;
        let mut ended = false;

        let read = match guard.as_mut() {
            None => StreamRead::Closed,
            Some(stream) => loop {
                let item = tokio::select! {
                    _ = cancel.cancelled() => break StreamRead::Cancelled,
                    item = tokio::time::timeout_at(window_end, stream.next()) => item,
                };

                match item {
                    Err(_) => break StreamRead::Idle,
                    Ok(None) => {
                        ended = true;
                        break StreamRead::Failed("bundle results stream ended".to_string());
                    }
                    Ok(Some(Err(status))) => break StreamRead::Failed(status.to_string()),
                    Ok(Some(Ok(result))) => {
                        if !bundle_id.is_empty()
                            && !result.bundle_id.is_empty()
                            && result.bundle_id != bundle_id
                        {
                            debug!(expected = %bundle_id, got = %result.bundle_id, "Skipping result for another bundle");
                            continue;
                        }
                        match OutcomeEvent::from_wire(&result) {
                            Some(event) => break StreamRead::Outcome(event),
                            None => continue,
                        }
                    }
                }
            },
        };

        if ended {
            *guard = None;
        }
        read
    }

    async fn wait_for_signature_statuses(
        &self,
        signatures: &[Signature],
        cancel: &CancelSignal,
    ) -> Result<Vec<Option<SignatureStatus>>, StatusWait> {
        let start = Instant::now();
        loop {
            let statuses = self
                .statuses
                .get_signature_statuses(signatures)
                .await
                .map_err(|e| StatusWait::Query(e.to_string()))?;

            if statuses.len() == signatures.len() && all_present(&statuses) {
                return Ok(statuses);
            }
            if start.elapsed() > self.options.status_timeout {
                return Err(StatusWait::TimedOut);
            }
            if !cancel.sleep(self.options.status_retry_delay).await {
                return Err(StatusWait::Cancelled);
            }
        }
    }
}

async fn subscribe(
    searcher: &dyn SearcherServiceClient,
    session: &AuthSession,
) -> Result<BundleResultStream, BundleError> {
    let request = session.authorize(SubscribeBundleResultsRequest)?;
    searcher
        .subscribe_bundle_results(request)
        .await
        .map_err(BundleError::Subscription)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SubmitterOptions::default();
        assert_eq!(options.check_retries, 5);
        assert_eq!(options.check_retry_delay, Duration::from_secs(5));
        assert_eq!(options.status_timeout, Duration::from_secs(15));
        assert_eq!(options.status_retry_delay, Duration::from_secs(1));
    }
}
