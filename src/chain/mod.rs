pub mod reader;
pub mod types;

pub use reader::{ChainReader, RpcChainReader};
pub use types::{BlockData, RawTransaction};

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use alloy::primitives::{Address, Bytes, B256, U256};
    use async_trait::async_trait;

    use crate::error::{EngineError, EngineResult};

    use super::types::{BlockData, RawTransaction};
    use super::ChainReader;

    /// 2023-11-14 12:00:00 UTC.
    pub const NOON_TS: u64 = 1_699_963_200;
    /// 2023-11-14 03:00:00 UTC.
    pub const NIGHT_TS: u64 = 1_699_930_800;

    pub fn addr(n: u8) -> Address {
        Address::from([n; 20])
    }

    pub fn hash(n: u8) -> B256 {
        B256::from([n; 32])
    }

    /// A transaction that triggers no detector on its own: zero value,
    /// baseline gas price, midday timestamp, seasoned counterparties.
    pub fn benign_tx(n: u8, from: Address, to: Address) -> RawTransaction {
        RawTransaction {
            hash: hash(n),
            from,
            to: Some(to),
            value: U256::ZERO,
            gas_price: 20_000_000_000,
            gas: 21_000,
            input: Bytes::new(),
            block_number: 100,
            block_timestamp: NOON_TS,
        }
    }

    pub fn eth(amount: u64) -> U256 {
        U256::from(amount) * U256::from(10u64.pow(18))
    }

    /// Scriptable in-memory chain for engine and detector tests.
    #[derive(Default)]
    pub struct MockChainReader {
        pub height: AtomicU64,
        pub height_calls: AtomicU64,
        pub blocks: Mutex<HashMap<u64, BlockData>>,
        pub failing_blocks: Mutex<HashSet<u64>>,
        pub tx_counts: Mutex<HashMap<Address, u64>>,
        pub contracts: Mutex<HashSet<Address>>,
        pub transactions: Mutex<HashMap<B256, RawTransaction>>,
        pub unavailable: AtomicBool,
    }

    impl MockChainReader {
        pub fn with_height(height: u64) -> Self {
            let mock = Self::default();
            mock.height.store(height, Ordering::SeqCst);
            mock
        }

        pub fn add_block(&self, block: BlockData) {
            let number = block.number;
            self.blocks.lock().unwrap().insert(number, block);
            self.height.fetch_max(number, Ordering::SeqCst);
        }

        pub fn set_tx_count(&self, address: Address, count: u64) {
            self.tx_counts.lock().unwrap().insert(address, count);
        }

        pub fn mark_contract(&self, address: Address) {
            self.contracts.lock().unwrap().insert(address);
        }

        fn check_available(&self) -> EngineResult<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(EngineError::ChainUnavailable("mock offline".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChainReader for MockChainReader {
        async fn get_height(&self) -> EngineResult<u64> {
            self.height_calls.fetch_add(1, Ordering::SeqCst);
            self.check_available()?;
            Ok(self.height.load(Ordering::SeqCst))
        }

        async fn get_block_with_txs(&self, number: u64) -> EngineResult<Option<BlockData>> {
            self.check_available()?;
            if self.failing_blocks.lock().unwrap().contains(&number) {
                return Err(EngineError::ChainUnavailable(format!(
                    "block {number} fetch failed"
                )));
            }
            Ok(self.blocks.lock().unwrap().get(&number).cloned())
        }

        async fn get_transaction_count(&self, address: Address) -> EngineResult<u64> {
            self.check_available()?;
            // Unscripted addresses look well-established.
            Ok(self
                .tx_counts
                .lock()
                .unwrap()
                .get(&address)
                .copied()
                .unwrap_or(100))
        }

        async fn is_contract(&self, address: Address) -> EngineResult<bool> {
            self.check_available()?;
            Ok(self.contracts.lock().unwrap().contains(&address))
        }

        async fn get_transaction(&self, hash: B256) -> EngineResult<Option<RawTransaction>> {
            self.check_available()?;
            Ok(self.transactions.lock().unwrap().get(&hash).cloned())
        }
    }
}
