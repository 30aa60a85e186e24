//! Wallet balance snapshot providers.
//!
//! A [`BalanceProvider`] answers point-in-time balance and holdings queries
//! for a wallet address. [`FailoverProvider`] chains several providers in
//! priority order (primary → backup → fallback) so a single flaky RPC
//! endpoint never blocks a snapshot batch; [`rpc::RpcProvider`] is the
//! concrete JSON-RPC implementation.

pub mod errors;
pub mod rpc;

pub use errors::{ProviderAttempt, ProviderError, ProviderResult};
pub use rpc::RpcProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// One SPL token position in a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenHolding {
    /// Token mint address
    pub mint: String,
    /// Human-scaled amount
    pub amount: f64,
    /// Token decimals
    pub decimals: u8,
}

/// A raw balance read from one provider
#[derive(Debug, Clone)]
pub struct BalanceReading {
    /// Provider that answered
    pub provider: String,
    /// Balance in SOL
    pub sol_balance: f64,
    /// Balance in lamports
    pub lamports: u64,
    /// Raw response payload for audit
    pub raw: serde_json::Value,
}

/// A complete wallet state capture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    /// Wallet address
    pub address: String,
    /// SOL balance
    pub sol_balance: f64,
    /// Token holdings
    pub holdings: Vec<TokenHolding>,
    /// Total wallet value in SOL terms
    pub total_value: f64,
    /// Capture timestamp
    pub captured_at: DateTime<Utc>,
    /// Provider that supplied the balance
    pub provider: String,
    /// Raw balance payload
    pub raw: serde_json::Value,
}

/// Total wallet value in SOL terms.
///
/// Holdings are captured but not yet priced, so only the SOL balance counts.
pub fn total_value(sol_balance: f64, _holdings: &[TokenHolding]) -> f64 {
    sol_balance
}

/// Basic address validation: base58 alphabet, 32-44 characters.
pub fn is_valid_address(address: &str) -> bool {
    const BASE58: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";
    (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58.contains(c))
}

/// A source of wallet balance snapshots.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    /// Provider name for logging and snapshot attribution
    fn name(&self) -> &str;

    /// Fetch the SOL balance for an address
    async fn get_balance(&self, address: &str) -> ProviderResult<BalanceReading>;

    /// Fetch token holdings for an address.
    ///
    /// Never fails: a provider error yields an empty list so a partial
    /// snapshot (SOL only) is still usable.
    async fn get_holdings(&self, address: &str) -> Vec<TokenHolding>;

    /// Capture a full wallet snapshot.
    ///
    /// Fails only if the balance read fails; missing holdings degrade to an
    /// empty list.
    async fn get_full_snapshot(&self, address: &str) -> ProviderResult<BalanceSnapshot> {
        let reading = self.get_balance(address).await?;
        let holdings = self.get_holdings(address).await;
        let total = total_value(reading.sol_balance, &holdings);

        debug!(
            "snapshot complete for {}: {} SOL via {}",
            &address[..address.len().min(8)],
            total,
            reading.provider
        );

        Ok(BalanceSnapshot {
            address: address.to_string(),
            sol_balance: reading.sol_balance,
            holdings,
            total_value: total,
            captured_at: Utc::now(),
            provider: reading.provider,
            raw: reading.raw,
        })
    }
}

/// Chains providers in priority order; the first success wins.
///
/// Each provider is retried `retry_attempts` times with `retry_delay` between
/// attempts before the chain falls through to the next one. When every
/// provider is exhausted the error carries each provider's last failure.
pub struct FailoverProvider {
    providers: Vec<Arc<dyn BalanceProvider>>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl FailoverProvider {
    /// Build a failover chain from providers in priority order
    pub fn new(providers: Vec<Arc<dyn BalanceProvider>>) -> Self {
        Self {
            providers,
            retry_attempts: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Override the per-provider retry policy
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    async fn try_provider(
        &self,
        provider: &Arc<dyn BalanceProvider>,
        address: &str,
    ) -> ProviderResult<BalanceReading> {
        let mut last_error = None;
        for attempt in 1..=self.retry_attempts {
            match provider.get_balance(address).await {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    debug!(
                        "provider {} attempt {}/{} failed: {}",
                        provider.name(),
                        attempt,
                        self.retry_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.retry_attempts {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error.expect("at least one attempt was made"))
    }
}

#[async_trait]
impl BalanceProvider for FailoverProvider {
    fn name(&self) -> &str {
        "failover"
    }

    async fn get_balance(&self, address: &str) -> ProviderResult<BalanceReading> {
        if !is_valid_address(address) {
            return Err(ProviderError::InvalidAddress(address.to_string()));
        }

        let mut attempts = Vec::new();
        for provider in &self.providers {
            match self.try_provider(provider, address).await {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    warn!("provider {} exhausted: {}", provider.name(), e);
                    attempts.push(ProviderAttempt {
                        provider: provider.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
        Err(ProviderError::AllProvidersFailed { attempts })
    }

    async fn get_holdings(&self, address: &str) -> Vec<TokenHolding> {
        for provider in &self.providers {
            let holdings = provider.get_holdings(address).await;
            if !holdings.is_empty() {
                return holdings;
            }
        }
        Vec::new()
    }
}

#[cfg(test)]
pub mod mock {
    //! In-memory providers for snapshot and engine tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Provider serving scripted balances; addresses listed in `failing`
    /// always error.
    pub struct MockProvider {
        name: String,
        balances: Mutex<HashMap<String, f64>>,
        failing: Mutex<HashMap<String, String>>,
        delay: Mutex<Duration>,
        calls: AtomicUsize,
    }

    impl MockProvider {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                balances: Mutex::new(HashMap::new()),
                failing: Mutex::new(HashMap::new()),
                delay: Mutex::new(Duration::ZERO),
                calls: AtomicUsize::new(0),
            }
        }

        /// Make every balance call take this long (for overlap tests)
        pub fn set_delay(&self, delay: Duration) {
            *self.delay.lock().unwrap() = delay;
        }

        pub fn with_balance(self, address: &str, sol: f64) -> Self {
            self.set_balance(address, sol);
            self
        }

        pub fn set_balance(&self, address: &str, sol: f64) {
            self.balances
                .lock()
                .unwrap()
                .insert(address.to_string(), sol);
            self.failing.lock().unwrap().remove(address);
        }

        pub fn fail_address(&self, address: &str, reason: &str) {
            self.failing
                .lock()
                .unwrap()
                .insert(address.to_string(), reason.to_string());
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BalanceProvider for MockProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn get_balance(&self, address: &str) -> ProviderResult<BalanceReading> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.delay.lock().unwrap();
            if delay > Duration::ZERO {
                tokio::time::sleep(delay).await;
            }
            if let Some(reason) = self.failing.lock().unwrap().get(address) {
                return Err(ProviderError::Unreachable {
                    provider: self.name.clone(),
                    message: reason.clone(),
                });
            }
            let sol = self
                .balances
                .lock()
                .unwrap()
                .get(address)
                .copied()
                .unwrap_or(0.0);
            Ok(BalanceReading {
                provider: self.name.clone(),
                sol_balance: sol,
                lamports: (sol * 1_000_000_000.0) as u64,
                raw: serde_json::json!({ "lamports": (sol * 1_000_000_000.0) as u64 }),
            })
        }

        async fn get_holdings(&self, _address: &str) -> Vec<TokenHolding> {
            Vec::new()
        }
    }
}
