/// Balance streams
///
/// Balances are re-queried every time the chain imports a new best block.
/// The first query runs as soon as the chain handle is available, so
/// subscribers get a value without waiting for the next block. A failed or
/// timed out query is logged and skipped; the previous emission stays
/// current. A connection that does not arrive within the lookup timeout ends
/// the stream.
use super::query_key;
use crate::chain::{AccountData, ApiProvider, AssetAccountEntry, ChainApi};
use crate::errors::{CacheError, ChainError};
use crate::logger::{self, LogTag};
use crate::observable::ObservableCache;
use futures::future::{self, BoxFuture};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

pub const ASSET_BALANCES_NAMESPACE: &str = "asset_balances";
pub const NATIVE_BALANCE_NAMESPACE: &str = "native_balance";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetBalance {
    pub address: String,
    pub asset_id: u32,
    /// Spendable amount: free minus frozen
    pub balance: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NativeBalance {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
    pub transferable: u128,
}

impl From<AccountData> for NativeBalance {
    fn from(data: AccountData) -> Self {
        Self {
            free: data.free,
            reserved: data.reserved,
            frozen: data.frozen,
            transferable: data.free.saturating_sub(data.frozen),
        }
    }
}

/// Convert raw asset account rows into balances
pub fn remap_asset_entries(entries: Vec<AssetAccountEntry>) -> Vec<AssetBalance> {
    entries
        .into_iter()
        .map(|entry| {
            let (address, asset_id) = entry.key_args;
            AssetBalance {
                address,
                asset_id,
                balance: entry.value.free.saturating_sub(entry.value.frozen),
            }
        })
        .collect()
}

pub struct BalanceService {
    provider: Arc<dyn ApiProvider>,
    cache: Arc<ObservableCache>,
    lookup_timeout: Duration,
}

impl BalanceService {
    pub fn new(provider: Arc<dyn ApiProvider>, cache: Arc<ObservableCache>, lookup_timeout: Duration) -> Self {
        Self {
            provider,
            cache,
            lookup_timeout,
        }
    }

    /// Uses `chain.lookup_timeout_ms` from the loaded configuration
    pub fn from_config(provider: Arc<dyn ApiProvider>, cache: Arc<ObservableCache>) -> Self {
        let lookup_timeout = crate::config::with_config(|cfg| cfg.chain.lookup_timeout());
        Self::new(provider, cache, lookup_timeout)
    }

    /// Asset balances of `address`, refreshed on every best block
    pub fn get_asset_balances_stream(
        &self,
        chain_id: &str,
        address: &str,
    ) -> Result<BoxStream<'static, Vec<AssetBalance>>, CacheError> {
        let provider = self.provider.clone();
        let chain = chain_id.to_string();
        let account = address.to_string();
        let timeout = self.lookup_timeout;

        let shared = self.cache.get_cached_observable(
            ASSET_BALANCES_NAMESPACE,
            &query_key(chain_id, address, None),
            move || {
                block_driven::<Vec<AssetBalance>>(provider.clone(), chain.clone(), account.clone(), timeout, |api, address| {
                    Box::pin(async move {
                        match api.asset_accounts(&address).await {
                            Ok(entries) => Some(remap_asset_entries(entries)),
                            Err(e) => {
                                logger::warning(
                                    LogTag::Balances,
                                    &format!("Asset balance query for {} failed: {}", address, e),
                                );
                                None
                            }
                        }
                    })
                })
            },
        )?;

        Ok(shared.subscribe().boxed())
    }

    /// Native token balance of `address`, refreshed on every best block
    pub fn get_native_balance_stream(
        &self,
        chain_id: &str,
        address: &str,
    ) -> Result<BoxStream<'static, NativeBalance>, CacheError> {
        let provider = self.provider.clone();
        let chain = chain_id.to_string();
        let account = address.to_string();
        let timeout = self.lookup_timeout;

        let shared = self.cache.get_cached_observable(
            NATIVE_BALANCE_NAMESPACE,
            &query_key(chain_id, address, None),
            move || {
                block_driven::<NativeBalance>(provider.clone(), chain.clone(), account.clone(), timeout, |api, address| {
                    Box::pin(async move {
                        match api.native_account(&address).await {
                            Ok(data) => Some(NativeBalance::from(data)),
                            Err(e) => {
                                logger::warning(
                                    LogTag::Balances,
                                    &format!("Native balance query for {} failed: {}", address, e),
                                );
                                None
                            }
                        }
                    })
                })
            },
        )?;

        Ok(shared.subscribe().boxed())
    }
}

type BlockQuery<T> = fn(Arc<dyn ChainApi>, String) -> BoxFuture<'static, Option<T>>;

/// Connect, then run `query` once immediately and again on every best block
///
/// Both the connection and each query are bounded by `timeout`.
fn block_driven<T>(
    provider: Arc<dyn ApiProvider>,
    chain_id: String,
    address: String,
    timeout: Duration,
    query: BlockQuery<T>,
) -> impl Stream<Item = T> + Send + 'static
where
    T: Send + 'static,
{
    stream::once(async move {
        let connected = match tokio::time::timeout(timeout, provider.get_api(&chain_id)).await {
            Ok(result) => result,
            Err(_) => Err(ChainError::Timeout {
                millis: timeout.as_millis() as u64,
            }),
        };

        match connected {
            Ok(api) => Some((api, address)),
            Err(e) => {
                logger::warning(
                    LogTag::Balances,
                    &format!("No balance updates for {} on {}: {}", address, chain_id, e),
                );
                None
            }
        }
    })
    .filter_map(future::ready)
    .flat_map(move |(api, address)| {
        let ticks = stream::once(future::ready(None)).chain(api.best_blocks().map(Some));
        ticks
            .then(move |block| {
                if let Some(block) = &block {
                    logger::verbose(
                        LogTag::Balances,
                        &format!("Block #{} on {}, refreshing {}", block.number, api.chain_id(), address),
                    );
                }

                let target = format!("{} on {}", address, api.chain_id());
                let pending = query(api.clone(), address.clone());
                async move {
                    match tokio::time::timeout(timeout, pending).await {
                        Ok(value) => value,
                        Err(_) => {
                            logger::warning(
                                LogTag::Balances,
                                &format!(
                                    "Balance query for {} timed out after {}ms",
                                    target,
                                    timeout.as_millis()
                                ),
                            );
                            None
                        }
                    }
                }
            })
            .filter_map(future::ready)
    })
}
