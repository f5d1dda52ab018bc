//! Derived query services
//!
//! Each service wraps a chain lookup or subscription in a stream shared
//! through an [`ObservableCache`](crate::observable::ObservableCache), keyed
//! by chain and address, and reports progress with [`Loadable`].

pub mod address;
pub mod balances;

pub use address::AddressService;
pub use balances::{AssetBalance, BalanceService, NativeBalance};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    /// No result yet
    Loading,
    /// Fresh data
    Loaded,
    /// The lookup failed; data, if any, is the last known value
    Stale,
}

/// A value together with how it was obtained
///
/// Loaded values always carry data and loading values never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Loadable<T> {
    status: LoadStatus,
    data: Option<T>,
}

impl<T> Loadable<T> {
    pub fn loading() -> Self {
        Self {
            status: LoadStatus::Loading,
            data: None,
        }
    }

    pub fn loaded(data: T) -> Self {
        Self {
            status: LoadStatus::Loaded,
            data: Some(data),
        }
    }

    pub fn stale() -> Self {
        Self {
            status: LoadStatus::Stale,
            data: None,
        }
    }

    pub fn stale_with(last_known: T) -> Self {
        Self {
            status: LoadStatus::Stale,
            data: Some(last_known),
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.status
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn into_data(self) -> Option<T> {
        self.data
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Loadable<U> {
        Loadable {
            status: self.status,
            data: self.data.map(f),
        }
    }
}

/// Cache key for a per-account query: `chain::address[::sub_key]`
pub fn query_key(chain_id: &str, address: &str, sub_key: Option<&str>) -> String {
    match sub_key {
        Some(sub) => format!("{}::{}::{}", chain_id, address, sub),
        None => format!("{}::{}", chain_id, address),
    }
}
