/// In-process chain used by tests
use super::{AccountData, AccountId, ApiProvider, AssetAccountEntry, AssetAccountValue, BlockInfo, ChainApi, H160};
use crate::errors::ChainError;
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

pub struct MockChainApi {
    chain_id: String,
    prefix: u16,
    mappings: Mutex<HashMap<H160, AccountId>>,
    assets: Mutex<HashMap<String, Vec<AssetAccountEntry>>>,
    native: Mutex<HashMap<String, AccountData>>,
    mapping_delay: Mutex<Option<Duration>>,
    query_delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
    blocks: broadcast::Sender<BlockInfo>,
    pub mapping_calls: AtomicUsize,
    pub asset_queries: AtomicUsize,
}

impl MockChainApi {
    pub fn new(chain_id: &str, prefix: u16) -> Self {
        let (blocks, _) = broadcast::channel(64);
        Self {
            chain_id: chain_id.to_string(),
            prefix,
            mappings: Mutex::new(HashMap::new()),
            assets: Mutex::new(HashMap::new()),
            native: Mutex::new(HashMap::new()),
            mapping_delay: Mutex::new(None),
            query_delay: Mutex::new(None),
            failing: AtomicBool::new(false),
            blocks,
            mapping_calls: AtomicUsize::new(0),
            asset_queries: AtomicUsize::new(0),
        }
    }

    pub fn map_account(&self, h160: H160, account: AccountId) {
        self.mappings.lock().insert(h160, account);
    }

    pub fn set_asset(&self, address: &str, asset_id: u32, free: u128, frozen: u128) {
        let mut assets = self.assets.lock();
        let entries = assets.entry(address.to_string()).or_default();
        entries.retain(|entry| entry.key_args.1 != asset_id);
        entries.push(AssetAccountEntry {
            key_args: (address.to_string(), asset_id),
            value: AssetAccountValue { free, frozen },
        });
    }

    pub fn set_native(&self, address: &str, data: AccountData) {
        self.native.lock().insert(address.to_string(), data);
    }

    pub fn delay_mapping(&self, delay: Duration) {
        *self.mapping_delay.lock() = Some(delay);
    }

    /// Hold every asset query for `delay`, or stop holding them with `None`
    pub fn delay_queries(&self, delay: Option<Duration>) {
        *self.query_delay.lock() = delay;
    }

    /// Make every query fail until reset
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn import_block(&self, number: u64) {
        let _ = self.blocks.send(BlockInfo {
            number,
            hash: format!("0x{:064x}", number),
        });
    }

    /// Live `best_blocks` streams
    pub fn block_subscribers(&self) -> usize {
        self.blocks.receiver_count()
    }

    fn check_failing(&self) -> Result<(), ChainError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ChainError::Query(format!("{} unavailable", self.chain_id)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChainApi for MockChainApi {
    fn chain_id(&self) -> &str {
        &self.chain_id
    }

    fn ss58_prefix(&self) -> u16 {
        self.prefix
    }

    async fn account_mapping(&self, h160: &H160) -> Result<Option<AccountId>, ChainError> {
        self.mapping_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.mapping_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        Ok(self.mappings.lock().get(h160).copied())
    }

    async fn asset_accounts(&self, address: &str) -> Result<Vec<AssetAccountEntry>, ChainError> {
        self.asset_queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.query_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_failing()?;
        Ok(self.assets.lock().get(address).cloned().unwrap_or_default())
    }

    async fn native_account(&self, address: &str) -> Result<AccountData, ChainError> {
        self.check_failing()?;
        Ok(self.native.lock().get(address).copied().unwrap_or_default())
    }

    fn best_blocks(&self) -> BoxStream<'static, BlockInfo> {
        futures::stream::unfold(self.blocks.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(block) => return Some((block, rx)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

pub struct MockProvider {
    chains: Mutex<HashMap<String, Arc<MockChainApi>>>,
    hanging: AtomicBool,
    pub connects: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            chains: Mutex::new(HashMap::new()),
            hanging: AtomicBool::new(false),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn add_chain(&self, api: MockChainApi) -> Arc<MockChainApi> {
        let api = Arc::new(api);
        self.chains.lock().insert(api.chain_id.clone(), api.clone());
        api
    }

    /// Never finish connecting from now on
    pub fn hang_connects(&self) {
        self.hanging.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ApiProvider for MockProvider {
    async fn get_api(&self, chain_id: &str) -> Result<Arc<dyn ChainApi>, ChainError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.hanging.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        let api = self.chains.lock().get(chain_id).cloned();
        match api {
            Some(api) => Ok(api as Arc<dyn ChainApi>),
            None => Err(ChainError::UnknownChain(chain_id.to_string())),
        }
    }
}
