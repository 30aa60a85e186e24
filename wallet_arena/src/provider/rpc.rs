//! Solana JSON-RPC balance provider.

use super::errors::{ProviderError, ProviderResult};
use super::{BalanceProvider, BalanceReading, TokenHolding};
use async_trait::async_trait;
use log::debug;
use serde_json::{Value, json};

/// Lamports per SOL
pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// SPL token program, owner filter for holdings queries
const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Balance provider speaking the Solana JSON-RPC protocol.
///
/// Works against any standard RPC endpoint (public mainnet, Helius, Ankr);
/// endpoint selection and failover live in
/// [`FailoverProvider`](super::FailoverProvider), not here.
pub struct RpcProvider {
    name: String,
    url: String,
    client: reqwest::Client,
}

impl RpcProvider {
    /// Create a provider for one RPC endpoint
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn rpc_call(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(ProviderError::Unreachable {
                provider: self.name.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let payload: Value =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    provider: self.name.clone(),
                    message: e.to_string(),
                })?;

        if let Some(error) = payload.get("error") {
            return Err(ProviderError::MalformedResponse {
                provider: self.name.clone(),
                message: format!("RPC error: {error}"),
            });
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.name.clone(),
                message: "missing result field".to_string(),
            })
    }
}

/// Extract holdings from a `getTokenAccountsByOwner` jsonParsed result
fn parse_token_accounts(result: &Value) -> Vec<TokenHolding> {
    let accounts = match result.get("value").and_then(Value::as_array) {
        Some(accounts) => accounts,
        None => return Vec::new(),
    };

    accounts
        .iter()
        .filter_map(|account| {
            let info = account
                .get("account")?
                .get("data")?
                .get("parsed")?
                .get("info")?;
            let token_amount = info.get("tokenAmount")?;
            Some(TokenHolding {
                mint: info.get("mint")?.as_str()?.to_string(),
                amount: token_amount.get("uiAmount")?.as_f64().unwrap_or(0.0),
                decimals: token_amount.get("decimals")?.as_u64()? as u8,
            })
        })
        .collect()
}

#[async_trait]
impl BalanceProvider for RpcProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_balance(&self, address: &str) -> ProviderResult<BalanceReading> {
        let result = self.rpc_call("getBalance", json!([address])).await?;

        let lamports = result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: self.name.clone(),
                message: "getBalance result missing numeric value".to_string(),
            })?;

        Ok(BalanceReading {
            provider: self.name.clone(),
            sol_balance: lamports as f64 / LAMPORTS_PER_SOL,
            lamports,
            raw: result,
        })
    }

    async fn get_holdings(&self, address: &str) -> Vec<TokenHolding> {
        let params = json!([
            address,
            { "programId": TOKEN_PROGRAM_ID },
            { "encoding": "jsonParsed" },
        ]);

        match self.rpc_call("getTokenAccountsByOwner", params).await {
            Ok(result) => parse_token_accounts(&result),
            Err(e) => {
                // SOL-only snapshot is still usable without holdings
                debug!("holdings fetch failed via {}: {}", self.name, e);
                Vec::new()
            }
        }
    }
}
