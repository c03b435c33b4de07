//! External collaborators: social platform, news and wallet

pub mod news;
pub mod social;
pub mod wallet;

pub use news::{NewsApiClient, NewsConfig, NewsSource};
pub use social::{reduce_feed, EngagementFilter, SocialConfig, SocialPlatform, XClient};
pub use wallet::{lamports_to_sol, sol_to_lamports, SolanaWallet, Wallet, WalletConfig};
