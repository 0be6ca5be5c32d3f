// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Network descriptors.

use alloy::primitives::B256;
use serde::Serialize;
use utoipa::ToSchema;

/// Confidential EVM network the ledger is deployed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NetworkConfig {
    /// Network identifier used in configuration and deployment records
    pub name: &'static str,
    /// Human readable name
    pub display_name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

/// Sapphire mainnet.
pub const SAPPHIRE_MAINNET: NetworkConfig = NetworkConfig {
    name: "sapphire",
    display_name: "Oasis Sapphire",
    chain_id: 23294,
    explorer_url: "https://explorer.oasis.io/mainnet/sapphire",
};

/// Sapphire testnet.
pub const SAPPHIRE_TESTNET: NetworkConfig = NetworkConfig {
    name: "sapphire_testnet",
    display_name: "Oasis Sapphire Testnet",
    chain_id: 23295,
    explorer_url: "https://explorer.oasis.io/testnet/sapphire",
};

/// Local development network.
pub const SAPPHIRE_LOCALNET: NetworkConfig = NetworkConfig {
    name: "sapphire_localnet",
    display_name: "Sapphire Localnet",
    chain_id: 23293,
    explorer_url: "http://localhost:8548",
};

/// Default network when none is configured.
pub const DEFAULT_NETWORK: &str = "sapphire_testnet";

/// Look up a network by identifier (case-insensitive).
pub fn network_by_name(raw: &str) -> Result<NetworkConfig, String> {
    let value = raw.trim().to_ascii_lowercase();
    [SAPPHIRE_MAINNET, SAPPHIRE_TESTNET, SAPPHIRE_LOCALNET]
        .into_iter()
        .find(|n| n.name == value)
        .ok_or_else(|| {
            format!(
                "Unknown network `{value}`; expected one of `sapphire`, `sapphire_testnet`, `sapphire_localnet`."
            )
        })
}

impl NetworkConfig {
    /// Explorer link for a transaction.
    pub fn explorer_tx_url(&self, tx_hash: B256) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networks_resolve_by_name() {
        assert_eq!(network_by_name("sapphire_testnet").unwrap().chain_id, 23295);
        assert_eq!(network_by_name(" SAPPHIRE ").unwrap().chain_id, 23294);
        assert!(network_by_name("fuji").is_err());
    }

    #[test]
    fn explorer_links_point_at_the_tx() {
        let url = SAPPHIRE_TESTNET.explorer_tx_url(B256::ZERO);
        assert!(url.starts_with("https://explorer.oasis.io/testnet/sapphire/tx/0x"));
    }
}
