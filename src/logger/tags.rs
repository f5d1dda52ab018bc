/// Log tags identifying the subsystem a message comes from
///
/// Each tag maps to a `log` target (`dexcache::<key>`) so records can be
/// filtered per subsystem by any `log` consumer, and to a `--debug-<key>`
/// command-line flag.

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogTag {
    System,
    Config,
    Cache,
    Metadata,
    Settings,
    Chain,
    Address,
    Balances,
    Other(String),
}

const TARGET_PREFIX: &str = "dexcache::";

impl LogTag {
    /// Key used in `--debug-<key>` flags and `log` targets
    pub fn to_debug_key(&self) -> String {
        match self {
            LogTag::System => "system".to_string(),
            LogTag::Config => "config".to_string(),
            LogTag::Cache => "cache".to_string(),
            LogTag::Metadata => "metadata".to_string(),
            LogTag::Settings => "settings".to_string(),
            LogTag::Chain => "chain".to_string(),
            LogTag::Address => "address".to_string(),
            LogTag::Balances => "balances".to_string(),
            LogTag::Other(name) => name.to_lowercase(),
        }
    }

    /// Uppercase label used in console output
    pub fn to_plain_string(&self) -> String {
        self.to_debug_key().to_uppercase()
    }

    pub fn as_target(&self) -> String {
        format!("{}{}", TARGET_PREFIX, self.to_debug_key())
    }

    /// Recover a tag from a `log` record target
    pub fn from_target(target: &str) -> Self {
        match target.strip_prefix(TARGET_PREFIX) {
            Some(key) => Self::from_debug_key(key),
            None => LogTag::Other(target.split("::").next().unwrap_or(target).to_string()),
        }
    }

    pub fn from_debug_key(key: &str) -> Self {
        match key {
            "system" => LogTag::System,
            "config" => LogTag::Config,
            "cache" => LogTag::Cache,
            "metadata" => LogTag::Metadata,
            "settings" => LogTag::Settings,
            "chain" => LogTag::Chain,
            "address" => LogTag::Address,
            "balances" => LogTag::Balances,
            other => LogTag::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for LogTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_plain_string())
    }
}
