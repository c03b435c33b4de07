//! Executes proposed actions against the collaborators

use crate::error::{KairosError, Result};
use crate::platform::{SocialPlatform, Wallet};
use crate::types::{ActionOutcome, ProposedAction};
use std::sync::Arc;
use tracing::{info, warn};

pub const DRY_RUN: &str = "dry-run";

pub struct ActionDispatcher {
    social: Arc<dyn SocialPlatform>,
    wallet: Option<(Arc<dyn Wallet>, String)>,
    dry_run: bool,
}

impl ActionDispatcher {
    pub fn new(social: Arc<dyn SocialPlatform>) -> Self {
        Self {
            social,
            wallet: None,
            dry_run: false,
        }
    }

    /// Enable transfers from `agent_address`
    pub fn with_wallet(mut self, wallet: Arc<dyn Wallet>, agent_address: impl Into<String>) -> Self {
        self.wallet = Some((wallet, agent_address.into()));
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute `actions` in order. Failures are recorded, never raised.
    pub async fn dispatch(&self, actions: &[ProposedAction]) -> Vec<ActionOutcome> {
        let mut outcomes = Vec::with_capacity(actions.len());

        for action in actions {
            let result = if self.dry_run {
                info!("[dry-run] would {}: {}", action.kind(), action);
                Ok(DRY_RUN.to_string())
            } else {
                match self.execute(action).await {
                    Ok(id) => {
                        info!("{} ({})", action, id);
                        Ok(id)
                    }
                    Err(e) => {
                        warn!("Failed to {}: {}", action.kind(), e);
                        Err(e.to_string())
                    }
                }
            };

            outcomes.push(ActionOutcome {
                action: action.clone(),
                result,
            });
        }

        outcomes
    }

    async fn execute(&self, action: &ProposedAction) -> Result<String> {
        match action {
            ProposedAction::Post { content } => self.social.post(content).await,
            ProposedAction::Reply { content, target_id } => {
                self.social.reply(content, target_id).await
            }
            ProposedAction::Follow { handle, .. } => {
                let user_id = self
                    .social
                    .lookup_user(handle)
                    .await?
                    .ok_or_else(|| KairosError::Other(format!("unknown handle @{}", handle)))?;

                if self.social.follow(&user_id).await? {
                    Ok(user_id)
                } else {
                    Err(KairosError::Other(format!("follow of @{} did not take effect", handle)))
                }
            }
            ProposedAction::Transfer { to, amount_sol } => {
                let (wallet, from) = self
                    .wallet
                    .as_ref()
                    .ok_or_else(|| KairosError::Config("wallet not configured".to_string()))?;
                wallet.transfer(from, to, *amount_sol).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::social::MockSocialPlatform;
    use crate::platform::wallet::MockWallet;

    fn follow(handle: &str) -> ProposedAction {
        ProposedAction::Follow {
            handle: handle.to_string(),
            score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_post_and_reply_route_to_social() {
        let mut social = MockSocialPlatform::new();
        social
            .expect_post()
            .withf(|content| content == "gm")
            .times(1)
            .returning(|_| Ok("111".to_string()));
        social
            .expect_reply()
            .withf(|content, target| content == "indeed" && target == "42")
            .times(1)
            .returning(|_, _| Ok("112".to_string()));

        let outcomes = ActionDispatcher::new(Arc::new(social))
            .dispatch(&[
                ProposedAction::Post {
                    content: "gm".to_string(),
                },
                ProposedAction::Reply {
                    content: "indeed".to_string(),
                    target_id: "42".to_string(),
                },
            ])
            .await;

        assert_eq!(outcomes[0].result, Ok("111".to_string()));
        assert_eq!(outcomes[1].result, Ok("112".to_string()));
    }

    #[tokio::test]
    async fn test_follow_resolves_handle_first() {
        let mut social = MockSocialPlatform::new();
        social
            .expect_lookup_user()
            .returning(|handle| Ok((handle == "alice").then(|| "9001".to_string())));
        social
            .expect_follow()
            .withf(|id| id == "9001")
            .times(1)
            .returning(|_| Ok(true));

        let outcomes = ActionDispatcher::new(Arc::new(social))
            .dispatch(&[follow("alice"), follow("ghost")])
            .await;

        assert!(outcomes[0].succeeded());
        assert!(!outcomes[1].succeeded());
        assert!(outcomes[1].result.as_ref().unwrap_err().contains("unknown handle"));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_actions() {
        let mut social = MockSocialPlatform::new();
        let mut calls = 0;
        social.expect_post().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(KairosError::Transport("status 429".to_string()))
            } else {
                Ok("2".to_string())
            }
        });

        let post = ProposedAction::Post {
            content: "x".to_string(),
        };
        let outcomes = ActionDispatcher::new(Arc::new(social))
            .dispatch(&[post.clone(), post])
            .await;

        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
    }

    #[tokio::test]
    async fn test_transfer_uses_agent_address() {
        let mut wallet = MockWallet::new();
        wallet
            .expect_transfer()
            .withf(|from, to, amount| from == "agent" && to == "friend.sol" && *amount == 0.05)
            .times(1)
            .returning(|_, _, _| Ok("sig".to_string()));

        let outcomes = ActionDispatcher::new(Arc::new(MockSocialPlatform::new()))
            .with_wallet(Arc::new(wallet), "agent")
            .dispatch(&[ProposedAction::Transfer {
                to: "friend.sol".to_string(),
                amount_sol: 0.05,
            }])
            .await;

        assert_eq!(outcomes[0].result, Ok("sig".to_string()));
    }

    #[tokio::test]
    async fn test_transfer_without_wallet_fails() {
        let outcomes = ActionDispatcher::new(Arc::new(MockSocialPlatform::new()))
            .dispatch(&[ProposedAction::Transfer {
                to: "friend.sol".to_string(),
                amount_sol: 0.05,
            }])
            .await;

        assert!(!outcomes[0].succeeded());
    }

    #[tokio::test]
    async fn test_dry_run_sends_nothing() {
        let mut social = MockSocialPlatform::new();
        social.expect_post().never();
        social.expect_lookup_user().never();

        let outcomes = ActionDispatcher::new(Arc::new(social))
            .dry_run(true)
            .dispatch(&[
                ProposedAction::Post {
                    content: "gm".to_string(),
                },
                follow("alice"),
            ])
            .await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.result == Ok(DRY_RUN.to_string())));
    }
}
