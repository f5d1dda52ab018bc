/// Shared API handles
///
/// Connecting to a chain is expensive, so handles are created once per chain
/// id and shared. Concurrent requests for a chain that is still connecting
/// wait on the same attempt. A failed attempt is not remembered; the next
/// request tries again.
use super::{ApiProvider, ChainApi};
use crate::errors::ChainError;
use crate::logger::{self, LogTag};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

type ApiSlot = Arc<OnceCell<Arc<dyn ChainApi>>>;

pub struct CachedApiProvider<P> {
    inner: P,
    apis: DashMap<String, ApiSlot>,
}

impl<P: ApiProvider> CachedApiProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            apis: DashMap::new(),
        }
    }

    /// Chain ids with a connected handle
    pub fn connected_chains(&self) -> Vec<String> {
        let mut chains: Vec<String> = self
            .apis
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        chains.sort();
        chains
    }

    /// Forget the handle for `chain_id`; the next request reconnects
    pub fn invalidate(&self, chain_id: &str) -> bool {
        self.apis.remove(chain_id).is_some()
    }
}

#[async_trait]
impl<P: ApiProvider> ApiProvider for CachedApiProvider<P> {
    async fn get_api(&self, chain_id: &str) -> Result<Arc<dyn ChainApi>, ChainError> {
        let slot = self
            .apis
            .entry(chain_id.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let api = slot
            .get_or_try_init(|| async {
                logger::debug(LogTag::Chain, &format!("Connecting to {}", chain_id));
                self.inner.get_api(chain_id).await
            })
            .await
            .map_err(|e| {
                logger::warning(LogTag::Chain, &format!("Failed to connect to {}: {}", chain_id, e));
                e
            })?;

        Ok(api.clone())
    }
}
