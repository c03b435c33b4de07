//! Social platform boundary
//!
//! The pipeline only needs feed items reduced to text plus an author handle,
//! the agent's own recent posts, and a way to post, reply and follow.
//! [`XClient`] adapts the X API v2 with a user-context bearer token.

use crate::error::{KairosError, Result};
use crate::types::{FeedItem, Post};
use crate::utils::preview;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Configuration for the social platform adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialConfig {
    pub base_url: String,

    /// Environment variable holding the OAuth2 user-context token
    pub access_token_env: String,

    /// Numeric id of the agent's own account
    pub user_id: String,

    /// Number of timeline entries fetched per cycle
    pub timeline_limit: usize,

    /// Timeline entries must exceed all three thresholds to be kept
    pub min_likes: u64,
    pub min_followers: u64,
    pub min_replies: u64,

    pub request_timeout_secs: u64,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitter.com/2".to_string(),
            access_token_env: "X_ACCESS_TOKEN".to_string(),
            user_id: String::new(),
            timeline_limit: 20,
            min_likes: 20,
            min_followers: 300,
            min_replies: 3,
            request_timeout_secs: 30,
        }
    }
}

impl SocialConfig {
    fn engagement_filter(&self) -> EngagementFilter {
        EngagementFilter {
            min_likes: self.min_likes,
            min_followers: self.min_followers,
            min_replies: self.min_replies,
        }
    }
}

/// Social platform collaborator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// The agent's own most recent posts, newest first
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>>;

    /// Publish a post, returning its id
    async fn post(&self, content: &str) -> Result<String>;

    /// Reply to `target_id`, returning the reply's id
    async fn reply(&self, content: &str, target_id: &str) -> Result<String>;

    /// Resolve a handle (without `@`) to a user id
    async fn lookup_user(&self, handle: &str) -> Result<Option<String>>;

    /// Follow `user_id`; true when the follow took effect
    async fn follow(&self, user_id: &str) -> Result<bool>;

    /// Home timeline, already filtered for engagement
    async fn timeline(&self) -> Result<Vec<FeedItem>>;

    /// Mentions of the agent
    async fn notifications(&self) -> Result<Vec<FeedItem>>;
}

/// Thresholds a timeline entry must strictly exceed
#[derive(Debug, Clone, Copy)]
pub struct EngagementFilter {
    pub min_likes: u64,
    pub min_followers: u64,
    pub min_replies: u64,
}

impl EngagementFilter {
    fn admits(&self, item: &FeedItem) -> bool {
        item.likes > self.min_likes
            && item.author_followers > self.min_followers
            && item.replies > self.min_replies
    }
}

/// X API v2 adapter
pub struct XClient {
    client: Client,
    base_url: String,
    token: String,
    config: SocialConfig,
}

#[derive(Debug, Deserialize)]
pub struct TweetList {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    author_id: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    public_metrics: TweetMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct TweetMetrics {
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    reply_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    public_metrics: UserMetrics,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetrics {
    #[serde(default)]
    followers_count: u64,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UserId {
    id: String,
}

#[derive(Debug, Deserialize)]
struct FollowResult {
    #[serde(default)]
    following: bool,
    #[serde(default)]
    pending_follow: bool,
}

#[derive(Debug, Serialize)]
struct NewTweet<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply: Option<ReplyTarget<'a>>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

/// Reduce a tweet list to feed items, optionally dropping low-engagement
/// entries. Entries whose author is not in `includes` are skipped.
pub fn reduce_feed(list: TweetList, filter: Option<&EngagementFilter>) -> Vec<FeedItem> {
    let users: HashMap<&str, &User> = list
        .includes
        .users
        .iter()
        .map(|u| (u.id.as_str(), u))
        .collect();

    list.data
        .iter()
        .filter_map(|tweet| {
            let author = users.get(tweet.author_id.as_deref()?)?;
            Some(FeedItem {
                id: tweet.id.clone(),
                author: author.username.clone(),
                text: tweet.text.clone(),
                likes: tweet.public_metrics.like_count,
                replies: tweet.public_metrics.reply_count,
                author_followers: author.public_metrics.followers_count,
            })
        })
        .filter(|item| filter.map_or(true, |f| f.admits(item)))
        .collect()
}

/// X only accepts `max_results` between 5 and 100
fn page_size(limit: usize) -> usize {
    limit.clamp(5, 100)
}

impl XClient {
    pub fn new(config: SocialConfig, token: String) -> Result<Self> {
        if token.is_empty() {
            return Err(KairosError::Config(format!(
                "{} not set",
                config.access_token_env
            )));
        }
        if config.user_id.is_empty() {
            return Err(KairosError::Config("social.user_id not set".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| KairosError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token,
            config,
        })
    }

    async fn decode<R: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<R> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(KairosError::Transport(format!(
                "{} returned status {}: {}",
                what,
                status,
                preview(&body, 200)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| KairosError::MalformedResponse(format!("{}: {}", what, e)))
    }

    async fn get<R: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<R> {
        debug!("GET {}{}", self.base_url, path);
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;
        Self::decode(response, path).await
    }

    async fn post_json<B: Serialize + Sync, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        debug!("POST {}{}", self.base_url, path);
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| KairosError::Transport(e.to_string()))?;
        Self::decode(response, path).await
    }

    fn feed_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("max_results", page_size(self.config.timeline_limit).to_string()),
            ("tweet.fields", "public_metrics,created_at,author_id".to_string()),
            ("expansions", "author_id".to_string()),
            ("user.fields", "public_metrics".to_string()),
        ]
    }

    async fn create_tweet(&self, tweet: NewTweet<'_>) -> Result<String> {
        let created: DataEnvelope<CreatedTweet> = self.post_json("/tweets", &tweet).await?;
        created
            .data
            .map(|t| t.id)
            .ok_or_else(|| KairosError::MalformedResponse("tweet creation returned no id".to_string()))
    }
}

#[async_trait]
impl SocialPlatform for XClient {
    async fn recent_posts(&self, limit: usize) -> Result<Vec<Post>> {
        let path = format!("/users/{}/tweets", self.config.user_id);
        let query = vec![
            ("max_results", page_size(limit).to_string()),
            ("tweet.fields", "created_at".to_string()),
        ];
        let list: TweetList = self.get(&path, &query).await?;

        Ok(list
            .data
            .into_iter()
            .take(limit)
            .map(|t| Post {
                id: t.id,
                content: t.text,
                created_at: t.created_at,
            })
            .collect())
    }

    async fn post(&self, content: &str) -> Result<String> {
        self.create_tweet(NewTweet {
            text: content,
            reply: None,
        })
        .await
    }

    async fn reply(&self, content: &str, target_id: &str) -> Result<String> {
        self.create_tweet(NewTweet {
            text: content,
            reply: Some(ReplyTarget {
                in_reply_to_tweet_id: target_id,
            }),
        })
        .await
    }

    async fn lookup_user(&self, handle: &str) -> Result<Option<String>> {
        let path = format!("/users/by/username/{}", handle.trim_start_matches('@'));
        let found: DataEnvelope<UserId> = self.get(&path, &[]).await?;
        Ok(found.data.map(|u| u.id))
    }

    async fn follow(&self, user_id: &str) -> Result<bool> {
        let path = format!("/users/{}/following", self.config.user_id);
        let body = serde_json::json!({ "target_user_id": user_id });
        let result: DataEnvelope<FollowResult> = self.post_json(&path, &body).await?;
        Ok(result
            .data
            .map(|r| r.following || r.pending_follow)
            .unwrap_or(false))
    }

    async fn timeline(&self) -> Result<Vec<FeedItem>> {
        let path = format!("/users/{}/timelines/reverse_chronological", self.config.user_id);
        let list: TweetList = self.get(&path, &self.feed_query()).await?;
        let filter = self.config.engagement_filter();
        Ok(reduce_feed(list, Some(&filter)))
    }

    async fn notifications(&self) -> Result<Vec<FeedItem>> {
        let path = format!("/users/{}/mentions", self.config.user_id);
        let list: TweetList = self.get(&path, &self.feed_query()).await?;
        Ok(reduce_feed(list, None))
    }
}
