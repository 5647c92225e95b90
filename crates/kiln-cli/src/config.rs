use std::collections::HashMap;
use std::path::Path;

use color_eyre::eyre::{eyre, Result, WrapErr};
use kiln_core::{CoercionPolicy, Endpoint, Timeouts};
use serde::Deserialize;

pub const KILN_CONFIG: &str = "kiln.toml";

pub const DEFAULT_BUILD_SERVICE_URL: &str = "http://127.0.0.1:3000";

/// Project configuration (kiln.toml). Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KilnConfig {
    #[serde(default)]
    pub build_service: BuildServiceConfig,
    #[serde(default)]
    pub rpc_endpoints: HashMap<String, RpcEndpoint>,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub coercion: CoercionConfig,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildServiceConfig {
    #[serde(default = "default_build_service_url")]
    pub url: String,
}

impl Default for BuildServiceConfig {
    fn default() -> Self {
        Self {
            url: default_build_service_url(),
        }
    }
}

fn default_build_service_url() -> String {
    DEFAULT_BUILD_SERVICE_URL.to_string()
}

/// RPC endpoint can be a string or an object with url field
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RpcEndpoint {
    Url(String),
    Object { url: String },
}

impl RpcEndpoint {
    pub fn url(&self) -> &str {
        match self {
            RpcEndpoint::Url(url) => url,
            RpcEndpoint::Object { url } => url,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletConfig {
    /// Restrict signing to this stored wallet
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoercionConfig {
    #[serde(default)]
    pub policy: CoercionPolicy,
}

impl KilnConfig {
    /// Load kiln.toml from the current directory, or defaults when absent
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(KILN_CONFIG))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Could not read {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("Invalid {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn exists() -> bool {
        Path::new(KILN_CONFIG).exists()
    }

    /// Resolve a network by name, expanding environment variables
    pub fn endpoint(&self, name: &str) -> Result<Endpoint> {
        let rpc = self.rpc_endpoints.get(name).ok_or_else(|| {
            let known = self.network_names();
            if known.is_empty() {
                eyre!("Network '{}' not found: kiln.toml has no [rpc_endpoints]", name)
            } else {
                eyre!(
                    "Network '{}' not found in kiln.toml [rpc_endpoints] (known: {})",
                    name,
                    known.join(", ")
                )
            }
        })?;

        Ok(Endpoint::new(name, resolve_env_vars(rpc.url())?))
    }

    pub fn build_service_url(&self) -> Result<String> {
        resolve_env_vars(&self.build_service.url)
    }

    /// Network names in alphabetical order
    pub fn network_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rpc_endpoints.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Starter kiln.toml written by `kiln init`
pub const TEMPLATE: &str = r#"[build_service]
url = "http://127.0.0.1:3000"

[rpc_endpoints]
local = "http://127.0.0.1:8545"

[coercion]
# "heuristic" or "typed"
policy = "heuristic"

[timeouts]
build = 600
connect = 30
signature = 120
inclusion = 120
finalization = 300
query = 30
"#;

/// Expand every `${VAR_NAME}` reference in a string
fn resolve_env_vars(value: &str) -> Result<String> {
    let mut resolved = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + 2 + len];
        let var = std::env::var(var_name)
            .map_err(|_| eyre!("Environment variable '{}' not set", var_name))?;
        resolved.push_str(&rest[..start]);
        resolved.push_str(&var);
        rest = &rest[start + 3 + len..];
    }
    resolved.push_str(rest);

    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = KilnConfig::parse(
            r#"
[build_service]
url = "http://builder:4000"

[rpc_endpoints]
local = "http://localhost:8545"
sepolia = { url = "https://sepolia.rpc" }

[wallet]
default = "deployer"

[coercion]
policy = "typed"

[timeouts]
finalization = 900
"#,
        )
        .unwrap();

        assert_eq!(config.build_service.url, "http://builder:4000");
        assert_eq!(config.network_names(), vec!["local", "sepolia"]);
        assert_eq!(config.wallet.default.as_deref(), Some("deployer"));
        assert_eq!(config.coercion.policy, CoercionPolicy::Typed);
        assert_eq!(config.timeouts.finalization, Duration::from_secs(900));
        assert_eq!(config.timeouts.build, Duration::from_secs(600));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KilnConfig::parse("").unwrap();

        assert_eq!(config.build_service.url, DEFAULT_BUILD_SERVICE_URL);
        assert!(config.rpc_endpoints.is_empty());
        assert!(config.wallet.default.is_none());
        assert_eq!(config.coercion.policy, CoercionPolicy::Heuristic);
        assert_eq!(config.timeouts.connect, Duration::from_secs(30));
    }

    #[test]
    fn test_template_parses() {
        let config = KilnConfig::parse(TEMPLATE).unwrap();
        let endpoint = config.endpoint("local").unwrap();
        assert_eq!(endpoint.rpc_url, "http://127.0.0.1:8545");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = KilnConfig::load_from(&dir.path().join(KILN_CONFIG)).unwrap();
        assert_eq!(config.build_service.url, DEFAULT_BUILD_SERVICE_URL);
    }

    #[test]
    fn test_invalid_policy_is_rejected() {
        let result = KilnConfig::parse("[coercion]\npolicy = \"guess\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_resolves_env_var() {
        std::env::set_var("KILN_TEST_RPC_URL", "https://rpc.test.xyz");

        let config = KilnConfig::parse(
            r#"
[rpc_endpoints]
testnet = "${KILN_TEST_RPC_URL}"
"#,
        )
        .unwrap();
        let endpoint = config.endpoint("testnet").unwrap();

        assert_eq!(endpoint.name, "testnet");
        assert_eq!(endpoint.rpc_url, "https://rpc.test.xyz");

        std::env::remove_var("KILN_TEST_RPC_URL");
    }

    #[test]
    fn test_endpoint_not_found_lists_known() {
        let config = KilnConfig::parse("[rpc_endpoints]\nmainnet = \"https://eth.rpc\"\n").unwrap();
        let err = config.endpoint("nonexistent").unwrap_err();
        assert!(err.to_string().contains("mainnet"));
    }

    #[test]
    fn test_resolve_env_var_embedded() {
        std::env::set_var("KILN_TEST_API_KEY", "secret");

        let result = resolve_env_vars("https://rpc.xyz/v2/${KILN_TEST_API_KEY}").unwrap();
        assert_eq!(result, "https://rpc.xyz/v2/secret");

        std::env::remove_var("KILN_TEST_API_KEY");
    }

    #[test]
    fn test_resolve_env_var_literal() {
        let result = resolve_env_vars("https://literal.url").unwrap();
        assert_eq!(result, "https://literal.url");
    }

    #[test]
    fn test_resolve_env_var_missing() {
        let result = resolve_env_vars("${KILN_NONEXISTENT_VAR_99999}");
        assert!(result.is_err());
    }
}
