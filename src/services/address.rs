/// Address resolution
///
/// Turns any address the user enters into the chain's native SS58 form.
/// Native addresses pass straight through. EVM addresses are looked up in
/// the chain's account mapping table; unmapped ones get the deterministic
/// fallback account.
use super::{query_key, Loadable};
use crate::chain::{ss58, ApiProvider};
use crate::errors::{CacheError, ChainError};
use crate::logger::{self, LogTag};
use crate::observable::ObservableCache;
use futures::future;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;

pub const RESOLVED_ADDRESS_NAMESPACE: &str = "resolved_address";

pub struct AddressService {
    provider: Arc<dyn ApiProvider>,
    cache: Arc<ObservableCache>,
    lookup_timeout: Duration,
}

impl AddressService {
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

    /// Stream the native form of `address` on `chain_id`
    ///
    /// Emits `loading` then exactly one of `loaded(address)` or `stale`.
    /// Addresses already in SS58 form produce a single `loaded` without
    /// touching the chain.
    pub fn get_resolved_address_stream(
        &self,
        address: &str,
        chain_id: &str,
    ) -> Result<BoxStream<'static, Loadable<String>>, CacheError> {
        if ss58::is_ss58(address) {
            return Ok(stream::once(future::ready(Loadable::loaded(address.to_string()))).boxed());
        }

        let provider = self.provider.clone();
        let chain = chain_id.to_string();
        let input = address.to_string();
        let timeout = self.lookup_timeout;

        let shared = self.cache.get_cached_observable(
            RESOLVED_ADDRESS_NAMESPACE,
            &query_key(chain_id, address, None),
            move || resolution_stream(provider.clone(), chain.clone(), input.clone(), timeout),
        )?;

        Ok(shared.subscribe().boxed())
    }
}

fn resolution_stream(
    provider: Arc<dyn ApiProvider>,
    chain_id: String,
    address: String,
    timeout: Duration,
) -> impl Stream<Item = Loadable<String>> + Send + 'static {
    stream::once(future::ready(Loadable::loading()))
        .chain(stream::once(resolve(provider, chain_id, address, timeout)))
}

async fn resolve(provider: Arc<dyn ApiProvider>, chain_id: String, address: String, timeout: Duration) -> Loadable<String> {
    let lookup = async {
        let h160 = ss58::parse_evm_address(&address)?;
        let api = provider.get_api(&chain_id).await?;
        let account = api
            .account_mapping(&h160)
            .await?
            .unwrap_or_else(|| ss58::fallback_account(&h160));
        ss58::encode(&account, api.ss58_prefix())
    };

    let result = match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => Err(ChainError::Timeout {
            millis: timeout.as_millis() as u64,
        }),
    };

    match result {
        Ok(resolved) => {
            logger::debug(
                LogTag::Address,
                &format!("Resolved {} on {} to {}", address, chain_id, resolved),
            );
            Loadable::loaded(resolved)
        }
        Err(e) => {
            logger::warning(
                LogTag::Address,
                &format!("Failed to resolve {} on {}: {}", address, chain_id, e),
            );
            Loadable::stale()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{MockChainApi, MockProvider};
    use crate::chain::CachedApiProvider;
    use crate::services::LoadStatus;
    use std::sync::atomic::Ordering;

    const EVM: &str = "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd";

    fn evm_bytes() -> [u8; 20] {
        ss58::parse_evm_address(EVM).unwrap()
    }

    fn setup() -> (AddressService, Arc<MockChainApi>, Arc<std::sync::atomic::AtomicUsize>) {
        let mock = MockProvider::new();
        let api = mock.add_chain(MockChainApi::new("X", 0));
        let connects = mock.connects.clone();
        let service = AddressService::new(
            Arc::new(CachedApiProvider::new(mock)),
            Arc::new(ObservableCache::new()),
            Duration::from_secs(15),
        );
        (service, api, connects)
    }

    #[tokio::test]
    async fn test_unmapped_address_resolves_to_fallback() {
        let (service, _api, _) = setup();
        let states: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;

        let expected = ss58::encode(&ss58::fallback_account(&evm_bytes()), 0).unwrap();
        assert_eq!(states, vec![Loadable::loading(), Loadable::loaded(expected)]);
    }

    #[tokio::test]
    async fn test_mapped_address_resolves_to_mapping() {
        let (service, api, _) = setup();
        api.map_account(evm_bytes(), [7u8; 32]);

        let states: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;
        assert_eq!(states[1], Loadable::loaded(ss58::encode(&[7u8; 32], 0).unwrap()));
    }

    #[tokio::test]
    async fn test_native_address_skips_lookup() {
        let (service, _api, connects) = setup();
        let native = ss58::encode(&[1u8; 32], 0).unwrap();

        let states: Vec<_> = service.get_resolved_address_stream(&native, "X").unwrap().collect().await;
        assert_eq!(states, vec![Loadable::loaded(native)]);
        assert_eq!(connects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failures_become_stale() {
        let (service, api, _) = setup();
        api.set_failing(true);

        let states: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;
        assert_eq!(states, vec![Loadable::loading(), Loadable::stale()]);

        let unknown_chain: Vec<_> = service.get_resolved_address_stream(EVM, "Y").unwrap().collect().await;
        assert_eq!(unknown_chain.last().map(|s| s.status()), Some(LoadStatus::Stale));

        let garbage: Vec<_> = service.get_resolved_address_stream("not-an-address", "X").unwrap().collect().await;
        assert_eq!(garbage.last().map(|s| s.status()), Some(LoadStatus::Stale));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_lookup_times_out_to_stale() {
        let (service, api, _) = setup();
        api.delay_mapping(Duration::from_secs(60));

        let states: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;
        assert_eq!(states, vec![Loadable::loading(), Loadable::stale()]);
    }

    #[tokio::test]
    async fn test_concurrent_subscribers_share_one_lookup() {
        let (service, api, _) = setup();
        let first = service.get_resolved_address_stream(EVM, "X").unwrap();
        let second = service.get_resolved_address_stream(EVM, "X").unwrap();

        let (a, b): (Vec<_>, Vec<_>) = tokio::join!(first.collect(), second.collect());
        assert_eq!(a, b);
        assert_eq!(api.mapping_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_late_subscriber_replays_result() {
        let (service, api, _) = setup();
        let mut first = service.get_resolved_address_stream(EVM, "X").unwrap();
        assert!(first.next().await.unwrap().is_loading());
        let resolved = first.next().await.unwrap();
        assert_eq!(resolved.status(), LoadStatus::Loaded);

        // first is still subscribed, so the finished lookup is replayed
        let late: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;
        assert_eq!(late, vec![resolved]);
        assert_eq!(api.mapping_calls.load(Ordering::SeqCst), 1);

        drop(first);
        let again: Vec<_> = service.get_resolved_address_stream(EVM, "X").unwrap().collect().await;
        assert!(again[0].is_loading());
        assert_eq!(api.mapping_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_from_config_uses_configured_lookup_timeout() {
        let service = AddressService::from_config(Arc::new(MockProvider::new()), Arc::new(ObservableCache::new()));
        let configured = crate::config::with_config(|cfg| cfg.chain.lookup_timeout());
        assert_eq!(service.lookup_timeout, configured);
    }
}
