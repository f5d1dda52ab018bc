//! Chain collaborators
//!
//! The caching core talks to chains only through [`ChainApi`] handles
//! obtained from an [`ApiProvider`]. Connection management, RPC transport and
//! runtime decoding live behind these traits.

pub mod provider;
pub mod ss58;

#[cfg(test)]
pub mod mock;

pub use provider::CachedApiProvider;

use crate::errors::ChainError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// 32-byte substrate account id
pub type AccountId = [u8; 32];

/// 20-byte EVM address
pub type H160 = [u8; 20];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetAccountValue {
    pub free: u128,
    pub frozen: u128,
}

/// One row of the asset accounts storage map
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAccountEntry {
    /// `(address, asset id)`
    pub key_args: (String, u32),
    pub value: AssetAccountValue,
}

/// Native token balances of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountData {
    pub free: u128,
    pub reserved: u128,
    pub frozen: u128,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: String,
}

/// A connected chain
#[async_trait]
pub trait ChainApi: Send + Sync {
    fn chain_id(&self) -> &str;

    /// Network prefix used when formatting native addresses
    fn ss58_prefix(&self) -> u16;

    /// Look up the account mapped to an EVM address, if any
    async fn account_mapping(&self, h160: &H160) -> Result<Option<AccountId>, ChainError>;

    /// All asset accounts held by `address`
    async fn asset_accounts(&self, address: &str) -> Result<Vec<AssetAccountEntry>, ChainError>;

    async fn native_account(&self, address: &str) -> Result<AccountData, ChainError>;

    /// New best blocks as they are imported; ends when the connection closes
    fn best_blocks(&self) -> BoxStream<'static, BlockInfo>;
}

/// Hands out API handles per chain id
#[async_trait]
pub trait ApiProvider: Send + Sync {
    async fn get_api(&self, chain_id: &str) -> Result<Arc<dyn ChainApi>, ChainError>;
}
