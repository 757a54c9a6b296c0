use alloy::primitives::{Address, Bytes, B256, U256};

/// A chain-supplied transaction, immutable once read.
/// Block number and timestamp are attached by whoever fetched the block.
#[derive(Debug, Clone)]
pub struct RawTransaction {
    pub hash: B256,
    pub from: Address,
    /// None for contract creation.
    pub to: Option<Address>,
    /// Value in wei.
    pub value: U256,
    /// Effective gas price in wei.
    pub gas_price: u128,
    pub gas: u64,
    pub input: Bytes,
    pub block_number: u64,
    /// Unix seconds.
    pub block_timestamp: u64,
}

/// A block body with full transactions, as needed by the ingestion poller.
#[derive(Debug, Clone)]
pub struct BlockData {
    pub number: u64,
    /// Unix seconds.
    pub timestamp: u64,
    pub transactions: Vec<RawTransaction>,
}
