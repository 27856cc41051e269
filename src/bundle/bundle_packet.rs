//! Transaction <-> packet conversion and bundle assembly

use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use super::bundle_errors::BundleError;
use crate::wire::{Bundle, Meta, Packet, SendBundleRequest};

/// Serialize `tx` into a packet; `meta.size` is the data length
pub fn transaction_to_packet(tx: &VersionedTransaction) -> Result<Packet, BundleError> {
    let data = bincode::serialize(tx).map_err(|e| BundleError::Serialization(e.to_string()))?;
    Ok(packet_from_bytes(data))
}

pub fn packet_to_transaction(packet: &Packet) -> Result<VersionedTransaction, BundleError> {
    bincode::deserialize(&packet.data).map_err(|e| BundleError::Serialization(e.to_string()))
}

fn packet_from_bytes(data: Vec<u8>) -> Packet {
    Packet {
        meta: Some(Meta {
            size: data.len() as u64,
            ..Meta::default()
        }),
        data,
    }
}

/// First signature of `tx`; `None` if it has not been signed
pub fn extract_signature(tx: &VersionedTransaction) -> Option<Signature> {
    tx.signatures
        .first()
        .copied()
        .filter(|sig| *sig != Signature::default())
}

/// First signature of every transaction, in batch order
pub fn batch_extract_signatures(txs: &[VersionedTransaction]) -> Result<Vec<Signature>, BundleError> {
    txs.iter()
        .enumerate()
        .map(|(index, tx)| extract_signature(tx).ok_or(BundleError::UnsignedTransaction { index }))
        .collect()
}

/// Whether `tx` fits in a single packet (<= `PACKET_DATA_SIZE` bytes)
pub fn validate_transaction_size(tx: &VersionedTransaction) -> Result<bool, BundleError> {
    let size = bincode::serialized_size(tx).map_err(|e| BundleError::Serialization(e.to_string()))?;
    Ok(size as usize <= PACKET_DATA_SIZE)
}

/// An immutable, validated batch ready to send
#[derive(Debug, Clone)]
pub struct BundleAttempt {
    transactions: Vec<VersionedTransaction>,
    signatures: Vec<Signature>,
    packets: Vec<Packet>,
}

impl BundleAttempt {
    /// Check and convert `transactions`. Fails on an empty batch, an
    /// unsigned transaction or one that does not fit in a packet.
    pub fn new(transactions: &[VersionedTransaction]) -> Result<Self, BundleError> {
        if transactions.is_empty() {
            return Err(BundleError::EmptyBundle);
        }

        let signatures = batch_extract_signatures(transactions)?;
        let mut packets = Vec::with_capacity(transactions.len());
        for (index, tx) in transactions.iter().enumerate() {
            let data =
                bincode::serialize(tx).map_err(|e| BundleError::Serialization(e.to_string()))?;
            if data.len() > PACKET_DATA_SIZE {
                return Err(BundleError::TransactionTooLarge {
                    index,
                    size: data.len(),
                    limit: PACKET_DATA_SIZE,
                });
            }
            packets.push(packet_from_bytes(data));
        }

        Ok(Self {
            transactions: transactions.to_vec(),
            signatures,
            packets,
        })
    }

    pub fn transactions(&self) -> &[VersionedTransaction] {
        &self.transactions
    }

    /// Signatures in batch order
    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Submission payload; no header is attached
    pub fn to_request(&self) -> SendBundleRequest {
        SendBundleRequest {
            bundle: Some(Bundle {
                header: None,
                packets: self.packets.clone(),
            }),
        }
    }
}
