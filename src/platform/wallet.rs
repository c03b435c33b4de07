//! Wallet boundary
//!
//! Balances come straight from a Solana JSON-RPC node. Signing never happens
//! in this process: transfers are handed to an external signer service that
//! holds the key.

use crate::error::{KairosError, Result};
use crate::utils::preview;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    pub enabled: bool,

    /// The agent's public address
    pub address: String,
    pub rpc_url: String,
    pub signer_url: String,

    /// Largest share of the balance a single cycle may transfer
    pub max_transfer_fraction: f64,

    /// Post the wallet address once at startup
    pub announce: bool,

    pub request_timeout_secs: u64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            address: String::new(),
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            signer_url: "http://127.0.0.1:7070".to_string(),
            max_transfer_fraction: 0.1,
            announce: false,
            request_timeout_secs: 30,
        }
    }
}

/// Wallet collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Balance of `address` in SOL
    async fn balance(&self, address: &str) -> Result<f64>;

    /// Send `amount_sol` from `from` to `to`, returning the transaction signature
    async fn transfer(&self, from: &str, to: &str, amount_sol: f64) -> Result<String>;
}

pub struct SolanaWallet {
    client: Client,
    rpc_url: String,
    signer_url: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResult {
    value: u64,
}

#[derive(Debug, Deserialize)]
struct SignerResponse {
    signature: String,
}

pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

pub fn sol_to_lamports(sol: f64) -> u64 {
    (sol * LAMPORTS_PER_SOL).round().max(0.0) as u64
}

impl SolanaWallet {
    pub fn new(config: &WalletConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            rpc_url: config.rpc_url.clone(),
            signer_url: config.signer_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Wallet for SolanaWallet {
    async fn balance(&self, address: &str) -> Result<f64> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getBalance",
            "params": [address],
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(KairosError::Transport(format!("getBalance returned status {}", status)));
        }

        let body: RpcResponse<BalanceResult> = response
            .json()
            .await
            .map_err(|e| KairosError::MalformedResponse(format!("getBalance: {}", e)))?;

        if let Some(error) = body.error {
            return Err(KairosError::Transport(format!("getBalance: {}", error.message)));
        }

        let lamports = body
            .result
            .ok_or_else(|| KairosError::MalformedResponse("getBalance: missing result".to_string()))?
            .value;

        debug!("Balance of {}: {} lamports", address, lamports);
        Ok(lamports_to_sol(lamports))
    }

    async fn transfer(&self, from: &str, to: &str, amount_sol: f64) -> Result<String> {
        let request = json!({
            "from": from,
            "to": to,
            "lamports": sol_to_lamports(amount_sol),
        });

        let response = self
            .client
            .post(format!("{}/transfer", self.signer_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KairosError::Transport(format!(
                "signer returned status {}: {}",
                status,
                preview(&body, 200)
            )));
        }

        let signed: SignerResponse = response
            .json()
            .await
            .map_err(|e| KairosError::MalformedResponse(format!("signer: {}", e)))?;

        info!("Transferred {} SOL to {} ({})", amount_sol, to, signed.signature);
        Ok(signed.signature)
    }
}
