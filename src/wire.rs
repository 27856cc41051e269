//! Block engine protocol messages
//!
//! Plain mirrors of the searcher/bundle/packet protobuf messages. Service
//! adapters translate between these and the generated stubs; nothing in
//! this crate depends on the generated code directly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Packet flags as set by the sender
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketFlags {
    pub discard: bool,
    pub forwarded: bool,
    pub repair: bool,
    pub simple_vote_tx: bool,
    pub tracer_packet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub size: u64,
    pub addr: String,
    pub port: u32,
    pub flags: Option<PacketFlags>,
    pub sender_stake: u64,
}

/// One serialized transaction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Packet {
    pub data: Vec<u8>,
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Unix timestamp in seconds
    pub ts: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub header: Option<Header>,
    pub packets: Vec<Packet>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBundleRequest {
    pub bundle: Option<Bundle>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendBundleResponse {
    /// Server-assigned id, echoed on the results stream
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeBundleResultsRequest;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTipAccountsRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetTipAccountsResponse {
    /// Base58 account addresses
    pub accounts: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegionsRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegionsResponse {
    /// Region the answering block engine runs in
    pub current_region: String,
    pub available_regions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotList {
    pub slots: Vec<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedLeadersRequest;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedLeadersResponse {
    /// Validator identity to its upcoming leader slots
    pub connected_validators: HashMap<String, SlotList>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedLeadersRegionedRequest {
    /// Empty means every region
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedLeadersRegionedResponse {
    /// Region to the leaders connected there
    pub connected_validators: HashMap<String, ConnectedLeadersResponse>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextScheduledLeaderRequest {
    /// Empty means the current region only
    pub regions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextScheduledLeaderResponse {
    pub current_slot: u64,
    pub next_leader_slot: u64,
    pub next_leader_identity: String,
    pub next_leader_region: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accepted {
    pub slot: u64,
    pub validator_identity: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationFailure {
    pub tx_signature: String,
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateAuctionBidRejected {
    pub auction_id: String,
    pub simulated_bid_lamports: u64,
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinningBatchBidRejected {
    pub auction_id: String,
    pub simulated_bid_lamports: u64,
    pub msg: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InternalError {
    pub msg: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedBundle {
    pub msg: String,
}

/// Why the block engine refused a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rejected {
    StateAuctionBidRejected(StateAuctionBidRejected),
    WinningBatchBidRejected(WinningBatchBidRejected),
    SimulationFailure(SimulationFailure),
    InternalError(InternalError),
    DroppedBundle(DroppedBundle),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BundleResultKind {
    Accepted(Accepted),
    Rejected(Rejected),
}

/// One message on the bundle results stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleResult {
    pub bundle_id: String,
    /// `None` when the server sent an outcome this client does not know
    pub result: Option<BundleResultKind>,
}
