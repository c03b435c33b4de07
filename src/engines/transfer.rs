//! Transfer candidate selection
//!
//! Disabled unless the wallet is configured. Whatever the model asks for,
//! the total proposed in one cycle never exceeds a fixed share of the
//! current balance.

use super::{extract_json_array, CycleContext, DecisionEngine};
use crate::error::KairosError;
use crate::platform::Wallet;
use crate::prompts::{wallet_decision_prompt, WALLET_USER_MESSAGE};
use crate::retry::RetryPolicy;
use crate::services::{ChatMessage, GenerationParams, LlmProvider};
use crate::types::ProposedAction;
use crate::utils::preview;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

static SOLANA_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[1-9A-HJ-NP-Za-km-z]{32,44}\b").expect("valid address regex")
});

static SOL_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Za-z0-9][A-Za-z0-9_-]*\.sol\b").expect("valid name regex"));

#[derive(Debug, Deserialize)]
struct TransferDecision {
    address: String,
    amount: f64,
}

/// Base58 addresses and `.sol` names in `texts`, first occurrence kept
pub fn extract_addresses<'a>(texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for text in texts {
        let matches = SOLANA_ADDRESS
            .find_iter(text)
            .chain(SOL_NAME.find_iter(text))
            .map(|m| m.as_str());
        for candidate in matches {
            if !found.iter().any(|f| f == candidate) {
                found.push(candidate.to_string());
            }
        }
    }
    found
}

pub struct TransferEngine {
    llm: Arc<dyn LlmProvider>,
    params: GenerationParams,
    wallet: Arc<dyn Wallet>,
    agent_address: String,
    persona: String,
    max_fraction: f64,
    retry: RetryPolicy,
}

impl TransferEngine {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        params: GenerationParams,
        wallet: Arc<dyn Wallet>,
        agent_address: impl Into<String>,
        persona: impl Into<String>,
        max_fraction: f64,
    ) -> Self {
        Self {
            llm,
            params,
            wallet,
            agent_address: agent_address.into(),
            persona: persona.into(),
            max_fraction,
            retry: RetryPolicy::decision(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn balance(&self) -> Option<f64> {
        let address = self.agent_address.as_str();
        let result = self
            .retry
            .run("wallet balance", |_| async move {
                self.wallet.balance(address).await
            })
            .await;

        match result {
            Ok(balance) => Some(balance),
            Err(e) => {
                warn!("Could not read wallet balance: {}", e);
                None
            }
        }
    }
}

/// Keep decisions for known addresses with positive amounts, in order,
/// stopping before the running total would pass `cap`.
fn cap_transfers(decisions: Vec<TransferDecision>, candidates: &[String], cap: f64) -> Vec<ProposedAction> {
    let mut total = 0.0;
    let mut actions = Vec::new();

    for decision in decisions {
        let address = decision.address.trim();
        if !candidates.iter().any(|c| c == address) {
            debug!("Ignoring transfer to unmentioned address {}", address);
            continue;
        }
        if !(decision.amount.is_finite() && decision.amount > 0.0) {
            continue;
        }
        if total + decision.amount > cap {
            warn!(
                "Transfer of {} SOL to {} would exceed the cycle cap of {} SOL",
                decision.amount, address, cap
            );
            break;
        }

        total += decision.amount;
        actions.push(ProposedAction::Transfer {
            to: address.to_string(),
            amount_sol: decision.amount,
        });
    }
    actions
}

#[async_trait]
impl DecisionEngine for TransferEngine {
    fn name(&self) -> &'static str {
        "transfer"
    }

    async fn decide(&self, context: &CycleContext) -> Vec<ProposedAction> {
        let candidates = extract_addresses(context.scanned_texts());
        if candidates.is_empty() {
            return Vec::new();
        }

        let Some(balance) = self.balance().await else {
            return Vec::new();
        };
        if balance <= 0.0 {
            debug!("Wallet is empty, skipping transfer decision");
            return Vec::new();
        }

        let messages = [
            ChatMessage::system(wallet_decision_prompt(
                &self.persona,
                &context.timeline_text(),
                &candidates,
                balance,
            )),
            ChatMessage::user(WALLET_USER_MESSAGE),
        ];

        let messages = &messages;
        let result = self
            .retry
            .run("transfer decision", |_| async move {
                let response = self.llm.chat(messages, &self.params).await?;
                extract_json_array::<TransferDecision>(&response).ok_or_else(|| {
                    KairosError::MalformedResponse(format!(
                        "no transfer array in: {}",
                        preview(&response, 80)
                    ))
                })
            })
            .await;

        let decisions = match result {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!("Transfer decision gave up: {}", e);
                return Vec::new();
            }
        };

        let actions = cap_transfers(decisions, &candidates, balance * self.max_fraction);
        info!("Proposing {} transfer(s)", actions.len());
        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::wallet::MockWallet;
    use crate::services::llm::MockLlmProvider;
    use crate::services::LlmConfig;
    use crate::types::Post;
    use std::time::Duration;

    const ADDR_A: &str = "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU";
    const ADDR_B: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    fn decision(address: &str, amount: f64) -> TransferDecision {
        TransferDecision {
            address: address.to_string(),
            amount,
        }
    }

    fn engine(llm: MockLlmProvider, wallet: MockWallet) -> TransferEngine {
        TransferEngine::new(
            Arc::new(llm),
            LlmConfig::default().chat_params(),
            Arc::new(wallet),
            "AgentWa11et",
            "I am kairos.",
            0.1,
        )
        .with_retry(RetryPolicy::fixed(3, Duration::from_millis(1)))
    }

    fn context_mentioning(text: &str) -> CycleContext {
        CycleContext {
            recent_posts: vec![Post::new("1", text)],
            ..Default::default()
        }
    }

    #[test]
    fn test_extract_addresses() {
        let text = format!("send to {} or toly.sol, not 0xdeadbeef", ADDR_A);
        assert_eq!(extract_addresses([text.as_str()]), vec![ADDR_A, "toly.sol"]);
    }

    #[test]
    fn test_extract_addresses_dedupes() {
        let text = format!("{} {}", ADDR_B, ADDR_B);
        assert_eq!(extract_addresses([text.as_str(), ADDR_B]), vec![ADDR_B]);
    }

    #[test]
    fn test_cap_stops_at_limit() {
        let candidates = vec![ADDR_A.to_string(), ADDR_B.to_string()];
        let actions = cap_transfers(
            vec![
                decision(ADDR_A, 0.05),
                decision("Unmentioned111111111111111111111111", 0.01),
                decision(ADDR_B, -1.0),
                decision(ADDR_B, 0.06),
                decision(ADDR_B, 0.01),
            ],
            &candidates,
            0.1,
        );

        assert_eq!(
            actions,
            vec![ProposedAction::Transfer {
                to: ADDR_A.to_string(),
                amount_sol: 0.05
            }]
        );
    }

    #[tokio::test]
    async fn test_no_addresses_skips_wallet_and_llm() {
        let mut llm = MockLlmProvider::new();
        llm.expect_chat().never();
        let mut wallet = MockWallet::new();
        wallet.expect_balance().never();

        let actions = engine(llm, wallet).decide(&context_mentioning("just vibes")).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_balance_failure_is_noop() {
        let mut llm = MockLlmProvider::new();
        llm.expect_chat().never();
        let mut wallet = MockWallet::new();
        wallet
            .expect_balance()
            .times(3)
            .returning(|_| Err(KairosError::Transport("rpc down".to_string())));

        let actions = engine(llm, wallet).decide(&context_mentioning(ADDR_A)).await;
        assert!(actions.is_empty());
    }

    #[tokio::test]
    async fn test_proposes_capped_transfer() {
        let mut wallet = MockWallet::new();
        wallet
            .expect_balance()
            .withf(|address| address == "AgentWa11et")
            .times(1)
            .returning(|_| Ok(2.0));

        let mut llm = MockLlmProvider::new();
        let response = format!(
            r#"[{{"address": "{}", "amount": 0.15}}, {{"address": "{}", "amount": 0.1}}]"#,
            ADDR_A, ADDR_B
        );
        llm.expect_chat()
            .withf(|messages, _| messages[0].content.contains("2 SOL"))
            .times(1)
            .returning(move |_, _| Ok(response.clone()));

        let text = format!("tip jar {} and {}", ADDR_A, ADDR_B);
        let actions = engine(llm, wallet).decide(&context_mentioning(&text)).await;

        // cap is 0.2 SOL; the second request would take the total to 0.25
        assert_eq!(
            actions,
            vec![ProposedAction::Transfer {
                to: ADDR_A.to_string(),
                amount_sol: 0.15
            }]
        );
    }
}
