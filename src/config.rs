// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults and the parsed [`ServiceConfig`].
//! Configuration is loaded from the environment once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding `chain.redb` and generated keys | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `NETWORK` | `sapphire`, `sapphire_testnet` or `sapphire_localnet` | `sapphire_testnet` |
//! | `DEPLOYER_PRIVATE_KEY` | Hex key of the contract administrator | generated into `DATA_DIR` |
//! | `RELAY_SIGNER_PRIVATE_KEY` | Hex key of the relay identity | - |
//! | `RELAY_SIGNER_KEY_PEM` | Path to a PEM key of the relay identity | generated into `DATA_DIR` |
//! | `GAS_PRICE` | Gas price in wei | `0` |
//! | `RELAY_INITIAL_BALANCE` | Balance (wei) the relay identity is topped up to at startup | unset |
//! | `INDEXER_POLL_MS` | Report indexer poll interval | `2000` |
//! | `TLS_CERT_PATH` | PEM certificate chain; enables HTTPS with `TLS_KEY_PATH` | unset |
//! | `TLS_KEY_PATH` | PEM private key for `TLS_CERT_PATH` | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::U256;
use alloy::signers::local::PrivateKeySigner;

use crate::blockchain::signing::{generate_key_pem, signer_from_hex, signer_from_pem};
use crate::blockchain::{network_by_name, GasSchedule, NetworkConfig, SigningError, DEFAULT_NETWORK};

/// Directory for the state database and generated key files.
pub const DATA_DIR_ENV: &str = "DATA_DIR";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const NETWORK_ENV: &str = "NETWORK";
pub const DEPLOYER_PRIVATE_KEY_ENV: &str = "DEPLOYER_PRIVATE_KEY";
pub const RELAY_SIGNER_PRIVATE_KEY_ENV: &str = "RELAY_SIGNER_PRIVATE_KEY";
pub const RELAY_SIGNER_KEY_PEM_ENV: &str = "RELAY_SIGNER_KEY_PEM";
pub const GAS_PRICE_ENV: &str = "GAS_PRICE";
pub const RELAY_INITIAL_BALANCE_ENV: &str = "RELAY_INITIAL_BALANCE";
pub const INDEXER_POLL_MS_ENV: &str = "INDEXER_POLL_MS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_INDEXER_POLL_MS: u64 = 2_000;
/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

/// State database file inside the data directory.
pub const CHAIN_DB_FILE: &str = "chain.redb";
/// Generated deployer key inside the data directory.
pub const DEPLOYER_KEY_FILE: &str = "deployer.pem";
/// Generated relay key inside the data directory.
pub const RELAY_KEY_FILE: &str = "relay_signer.pem";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),

    #[error("key material: {0}")]
    Key(#[from] SigningError),

    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Where the relay identity's key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Hex(String),
    PemFile(PathBuf),
    /// Load the PEM at this path, generating it on first start.
    Generated(PathBuf),
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub network: NetworkConfig,
    pub deployer_key: KeySource,
    pub relay_key: KeySource,
    pub gas: GasSchedule,
    pub relay_initial_balance: Option<U256>,
    pub indexer_poll_interval: Duration,
    pub tls: Option<TlsPaths>,
    pub log_format: LogFormat,
}

impl ServiceConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let data_dir = PathBuf::from(get(DATA_DIR_ENV).unwrap_or_else(|| DEFAULT_DATA_DIR.into()));

        let host = get(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.into());
        let port = match get(PORT_ENV) {
            Some(raw) => parse_var(PORT_ENV, &raw)?,
            None => DEFAULT_PORT,
        };
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e| invalid(HOST_ENV, format!("{host}:{port}: {e}")))?;

        let network = network_by_name(&get(NETWORK_ENV).unwrap_or_else(|| DEFAULT_NETWORK.into()))
            .map_err(|reason| invalid(NETWORK_ENV, reason))?;

        let deployer_key = match get(DEPLOYER_PRIVATE_KEY_ENV) {
            Some(hex) => KeySource::Hex(hex),
            None => KeySource::Generated(data_dir.join(DEPLOYER_KEY_FILE)),
        };
        let relay_key = match (get(RELAY_SIGNER_PRIVATE_KEY_ENV), get(RELAY_SIGNER_KEY_PEM_ENV)) {
            (Some(hex), _) => KeySource::Hex(hex),
            (None, Some(path)) => KeySource::PemFile(path.into()),
            (None, None) => KeySource::Generated(data_dir.join(RELAY_KEY_FILE)),
        };

        let gas = GasSchedule {
            gas_price: match get(GAS_PRICE_ENV) {
                Some(raw) => parse_wei(GAS_PRICE_ENV, &raw)?,
                None => U256::ZERO,
            },
            ..GasSchedule::default()
        };
        let relay_initial_balance = get(RELAY_INITIAL_BALANCE_ENV)
            .map(|raw| parse_wei(RELAY_INITIAL_BALANCE_ENV, &raw))
            .transpose()?;

        let poll_ms = match get(INDEXER_POLL_MS_ENV) {
            Some(raw) => parse_var(INDEXER_POLL_MS_ENV, &raw)?,
            None => DEFAULT_INDEXER_POLL_MS,
        };

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths {
                cert: cert.into(),
                key: key.into(),
            }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        let log_format = match get(LOG_FORMAT_ENV).as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(format) if format == "pretty" => LogFormat::Pretty,
            Some(format) if format == "json" => LogFormat::Json,
            Some(other) => return Err(invalid(LOG_FORMAT_ENV, format!("`{other}` is not json or pretty"))),
        };

        Ok(Self {
            data_dir,
            bind_addr,
            network,
            deployer_key,
            relay_key,
            gas,
            relay_initial_balance,
            indexer_poll_interval: Duration::from_millis(poll_ms),
            tls,
            log_format,
        })
    }

    pub fn chain_db_path(&self) -> PathBuf {
        self.data_dir.join(CHAIN_DB_FILE)
    }
}

impl KeySource {
    /// Materialize the signer, writing a fresh PEM for [`KeySource::Generated`]
    /// when none exists yet.
    pub fn load(&self) -> Result<PrivateKeySigner, ConfigError> {
        match self {
            KeySource::Hex(hex) => Ok(signer_from_hex(hex)?),
            KeySource::PemFile(path) => Ok(signer_from_pem(&read(path)?)?),
            KeySource::Generated(path) if path.exists() => Ok(signer_from_pem(&read(path)?)?),
            KeySource::Generated(path) => {
                let (pem, signer) = generate_key_pem()?;
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
                }
                fs::write(path, pem).map_err(|source| io_error(path, source))?;
                tracing::info!(path = %path.display(), address = %signer.address(), "generated signing key");
                Ok(signer)
            }
        }
    }
}

fn read(path: &Path) -> Result<Vec<u8>, ConfigError> {
    fs::read(path).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

fn parse_var<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(var, e.to_string()))
}

/// Decimal wei amount.
fn parse_wei(var: &'static str, raw: &str) -> Result<U256, ConfigError> {
    U256::from_str_radix(raw.trim(), 10).map_err(|e| invalid(var, e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::blockchain::{SAPPHIRE_LOCALNET, SAPPHIRE_TESTNET};

    fn config(vars: &[(&str, &str)]) -> Result<ServiceConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|var| vars.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(cfg.bind_addr.port(), DEFAULT_PORT);
        assert_eq!(cfg.network, SAPPHIRE_TESTNET);
        assert_eq!(cfg.gas.gas_price, U256::ZERO);
        assert_eq!(cfg.indexer_poll_interval, Duration::from_secs(2));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert!(cfg.tls.is_none());
        assert!(cfg.relay_initial_balance.is_none());
        assert_eq!(
            cfg.relay_key,
            KeySource::Generated(PathBuf::from("/data/relay_signer.pem"))
        );
        assert_eq!(cfg.chain_db_path(), PathBuf::from("/data/chain.redb"));
    }

    #[test]
    fn explicit_values_are_parsed() {
        let cfg = config(&[
            (DATA_DIR_ENV, "/tmp/reporter"),
            (HOST_ENV, "127.0.0.1"),
            (PORT_ENV, "9443"),
            (NETWORK_ENV, "Sapphire_Localnet"),
            (RELAY_SIGNER_KEY_PEM_ENV, "/keys/relay.pem"),
            (GAS_PRICE_ENV, "100000000000"),
            (RELAY_INITIAL_BALANCE_ENV, "1000000000000000000"),
            (INDEXER_POLL_MS_ENV, "250"),
            (TLS_CERT_PATH_ENV, "/tls/cert.pem"),
            (TLS_KEY_PATH_ENV, "/tls/key.pem"),
            (LOG_FORMAT_ENV, "JSON"),
        ])
        .unwrap();

        assert_eq!(cfg.bind_addr, "127.0.0.1:9443".parse().unwrap());
        assert_eq!(cfg.network, SAPPHIRE_LOCALNET);
        assert_eq!(cfg.relay_key, KeySource::PemFile("/keys/relay.pem".into()));
        assert_eq!(cfg.gas.gas_price, U256::from(100_000_000_000u64));
        assert_eq!(
            cfg.relay_initial_balance,
            Some(U256::from(1_000_000_000_000_000_000u64))
        );
        assert_eq!(cfg.indexer_poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert!(cfg.tls.is_some());
        assert_eq!(
            cfg.deployer_key,
            KeySource::Generated(PathBuf::from("/tmp/reporter/deployer.pem"))
        );
    }

    #[test]
    fn hex_relay_key_wins_over_pem() {
        let cfg = config(&[
            (RELAY_SIGNER_PRIVATE_KEY_ENV, "0x01"),
            (RELAY_SIGNER_KEY_PEM_ENV, "/keys/relay.pem"),
        ])
        .unwrap();
        assert_eq!(cfg.relay_key, KeySource::Hex("0x01".into()));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            config(&[(PORT_ENV, "eighty")]),
            Err(ConfigError::Invalid { var: PORT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(NETWORK_ENV, "mainnet")]),
            Err(ConfigError::Invalid { var: NETWORK_ENV, .. })
        ));
        assert!(matches!(
            config(&[(GAS_PRICE_ENV, "-1")]),
            Err(ConfigError::Invalid { var: GAS_PRICE_ENV, .. })
        ));
        assert!(matches!(
            config(&[(LOG_FORMAT_ENV, "xml")]),
            Err(ConfigError::Invalid { var: LOG_FORMAT_ENV, .. })
        ));
        assert!(matches!(
            config(&[(TLS_CERT_PATH_ENV, "/tls/cert.pem")]),
            Err(ConfigError::Incomplete(..))
        ));
    }

    #[test]
    fn generated_key_is_persisted_and_reused() {
        let dir = tempfile::tempdir().unwrap();
        let source = KeySource::Generated(dir.path().join("keys").join(RELAY_KEY_FILE));

        let first = source.load().unwrap();
        let second = source.load().unwrap();
        assert_eq!(first.address(), second.address());

        let from_file = KeySource::PemFile(dir.path().join("keys").join(RELAY_KEY_FILE))
            .load()
            .unwrap();
        assert_eq!(from_file.address(), first.address());
    }

    #[test]
    fn missing_pem_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KeySource::PemFile(dir.path().join("absent.pem"))
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
