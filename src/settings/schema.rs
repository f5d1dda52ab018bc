/// User settings record
///
/// Each field carries its default and a typed key in [`keys`]; the key type
/// is what callers pass to `get_setting`, `set_setting` and
/// `get_setting_stream`.
use crate::settings_struct;
use std::collections::BTreeMap;

settings_struct! {
    /// User preferences persisted in local storage
    pub struct Settings {
        /// Maximum accepted price movement for a swap, in percent
        slippage => Slippage: f64 = 0.5,

        /// Connect through embedded light clients instead of RPC nodes
        light_clients => LightClients: bool = true,

        default_chain_id => DefaultChainId: String = "polkadot-asset-hub".to_string(),

        /// "light", "dark" or "system"
        theme => Theme: String = "system".to_string(),

        hide_zero_balances => HideZeroBalances: bool = false,

        /// Per-chain RPC endpoint overrides, keyed by chain id
        rpc_endpoints => RpcEndpoints: BTreeMap<String, String> = BTreeMap::new(),
    }
}

impl Settings {
    pub fn is_recognized_key(name: &str) -> bool {
        Self::RECOGNIZED_KEYS.contains(&name)
    }

    /// Check values that deserialize fine but make no sense
    pub fn validate(&self) -> Result<(), String> {
        if !self.slippage.is_finite() || self.slippage < 0.0 || self.slippage > 100.0 {
            return Err(format!("slippage must be between 0 and 100, got {}", self.slippage));
        }

        if !matches!(self.theme.as_str(), "light" | "dark" | "system") {
            return Err(format!("unknown theme '{}'", self.theme));
        }

        if self.default_chain_id.is_empty() {
            return Err("default_chain_id cannot be empty".to_string());
        }

        Ok(())
    }
}
