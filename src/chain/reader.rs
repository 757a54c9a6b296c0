use std::future::IntoFuture;
use std::time::Duration;

use alloy::consensus::Transaction;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};

use super::types::{BlockData, RawTransaction};

/// Behavioral contract over the chain-data provider.
///
/// All calls are idempotent and safe to retry. Implementations must bound
/// every call: a hung RPC endpoint surfaces as `ChainUnavailable`, never as
/// an indefinite block.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Current chain height.
    async fn get_height(&self) -> EngineResult<u64>;

    /// Fetch a block with full transaction bodies. `None` if the block does
    /// not exist yet.
    async fn get_block_with_txs(&self, number: u64) -> EngineResult<Option<BlockData>>;

    /// Total transaction count (nonce) for an account.
    async fn get_transaction_count(&self, address: Address) -> EngineResult<u64>;

    /// Whether the address has code deployed.
    async fn is_contract(&self, address: Address) -> EngineResult<bool>;

    /// Look up a single transaction by hash, with its block context attached.
    async fn get_transaction(&self, hash: B256) -> EngineResult<Option<RawTransaction>>;
}

/// `ChainReader` backed by an alloy JSON-RPC provider over HTTP.
pub struct RpcChainReader {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainReader {
    pub fn connect_http(url: &str, timeout: Duration) -> eyre::Result<Self> {
        let url = url
            .parse()
            .map_err(|e| eyre::eyre!("Invalid RPC URL '{}': {}", url, e))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();
        Ok(Self { provider, timeout })
    }

    // Provider calls return request builders (IntoFuture, not Future), so
    // the bound is on the conversion.
    async fn bounded<T, E, F>(&self, fut: F) -> EngineResult<T>
    where
        E: std::fmt::Display,
        F: IntoFuture<Output = Result<T, E>> + Send,
        F::IntoFuture: Send,
    {
        match tokio::time::timeout(self.timeout, fut.into_future()).await {
            Ok(Ok(val)) => Ok(val),
            Ok(Err(e)) => Err(EngineError::ChainUnavailable(e.to_string())),
            Err(_) => Err(EngineError::ChainUnavailable(format!(
                "RPC call timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn get_height(&self) -> EngineResult<u64> {
        self.bounded(self.provider.get_block_number()).await
    }

    async fn get_block_with_txs(&self, number: u64) -> EngineResult<Option<BlockData>> {
        let block = self
            .bounded(
                self.provider
                    .get_block_by_number(BlockNumberOrTag::Number(number))
                    .full(),
            )
            .await?;

        Ok(block.map(|block| {
            let number = block.header.number;
            let timestamp = block.header.timestamp;
            let transactions = block
                .transactions
                .into_transactions()
                .map(|tx| to_raw_transaction(&tx, number, timestamp))
                .collect();
            BlockData {
                number,
                timestamp,
                transactions,
            }
        }))
    }

    async fn get_transaction_count(&self, address: Address) -> EngineResult<u64> {
        self.bounded(self.provider.get_transaction_count(address))
            .await
    }

    async fn is_contract(&self, address: Address) -> EngineResult<bool> {
        let code = self.bounded(self.provider.get_code_at(address)).await?;
        Ok(!code.is_empty())
    }

    async fn get_transaction(&self, hash: B256) -> EngineResult<Option<RawTransaction>> {
        let Some(tx) = self
            .bounded(self.provider.get_transaction_by_hash(hash))
            .await?
        else {
            return Ok(None);
        };

        // Pending transactions carry no block context; fall back to the
        // current time so time-of-day scoring still has something to work
        // with instead of resolving block 0.
        let (block_number, timestamp) = match tx.block_number() {
            Some(number) => {
                let timestamp = match self
                    .bounded(
                        self.provider
                            .get_block_by_number(BlockNumberOrTag::Number(number)),
                    )
                    .await?
                {
                    Some(block) => block.header.timestamp,
                    None => chrono::Utc::now().timestamp() as u64,
                };
                (number, timestamp)
            }
            None => (0, chrono::Utc::now().timestamp() as u64),
        };

        Ok(Some(to_raw_transaction(&tx, block_number, timestamp)))
    }
}

fn to_raw_transaction(
    tx: &alloy::rpc::types::Transaction,
    block_number: u64,
    block_timestamp: u64,
) -> RawTransaction {
    // gas_price/max_fee_per_gas exist on both response and consensus traits;
    // the consensus view covers legacy and EIP-1559 envelopes alike.
    let gas_price =
        Transaction::gas_price(tx).unwrap_or_else(|| Transaction::max_fee_per_gas(tx));

    RawTransaction {
        hash: tx.tx_hash(),
        from: TransactionResponse::from(tx),
        to: tx.to(),
        value: tx.value(),
        gas_price,
        gas: tx.gas_limit(),
        input: tx.input().clone(),
        block_number,
        block_timestamp,
    }
}
