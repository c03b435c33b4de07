//! Prompt templates
//!
//! Every prompt the pipeline sends lives here so the wording can be reviewed
//! in one place. Builders take already-rendered context; none of them call
//! out to anything.

use crate::types::{FeedItem, Post};
use crate::utils::bulleted;

/// Fixed system instruction for the second stage of post generation
pub const POST_FORMATTER_INSTRUCTION: &str = "You are a tweet formatter. Your task is to take the input text and format it as a clear, \
engaging tweet. If it resembles a tweet already, return it as is, removing any prefixes like 'Tweet:' \
or 'Post:'. If no valid text is provided, generate a tweet directly from the prompt. \
Pick the most relevant content when multiple tweets appear. \
Keep it concise, with no hashtags, explanations, or extra text. Only return the main tweet content.";

pub const SIGNIFICANCE_USER_MESSAGE: &str =
    "Respond only with the score you would give for the given memory.";

pub const SHORT_TERM_USER_MESSAGE: &str =
    "Respond only with your internal monologue based on the given context.";

pub const WALLET_USER_MESSAGE: &str =
    "Respond only with the wallet address(es) and amount(s) you would like to send to.";

/// Recent posts as a bulleted list
pub fn format_posts(posts: &[Post]) -> String {
    bulleted(posts.iter().map(|p| p.content.as_str()), "No recent posts")
}

/// Feed items as context lines
pub fn format_feed(feed: &[FeedItem]) -> String {
    bulleted(feed.iter().map(FeedItem::as_context_line), "Nothing new on the timeline")
}

/// System prompt asking for a bare 1-10 importance score
pub fn significance_prompt(persona: &str, memory: &str) -> String {
    format!(
        r#"{persona}

You are rating how significant a memory is to you, on a scale from 1 to 10.
1 means mundane and forgettable (routine chatter, nothing changed).
10 means life-changing (a major event, a new relationship, a large gain or loss).

Memory:
{memory}

Respond with a single integer between 1 and 10 and nothing else."#
    )
}

/// System prompt for synthesizing the per-cycle working summary
pub fn short_term_memory_prompt(persona: &str, posts: &[Post], external_context: &[String]) -> String {
    format!(
        r#"{persona}

These are your most recent posts:
{posts}

This is what is happening around you right now:
{context}

Reflect on all of this as your private internal monologue. What are you thinking about,
what stands out, what do you feel like doing next? Write it in the first person, a few
sentences at most."#,
        posts = format_posts(posts),
        context = bulleted(external_context, "No external context"),
    )
}

/// Base-model prompt for raw post candidates
pub fn post_prompt(
    persona: &str,
    external_context: &[String],
    short_term_memory: &str,
    long_term_memories: &str,
    recent_posts: &[Post],
) -> String {
    let thoughts = if short_term_memory.trim().is_empty() {
        "My mind is quiet right now."
    } else {
        short_term_memory.trim()
    };

    format!(
        r#"<|im_start|>system
{persona}

What is going on around me:
{context}

{long_term_memories}

My recent posts:
{posts}

My current thoughts:
{thoughts}
<|im_end|>
<|im_start|>assistant
Tweet: "#,
        context = bulleted(external_context, "No external context"),
        posts = format_posts(recent_posts),
    )
}

/// Prompt asking which newly seen handles are worth following
pub fn follow_decision_prompt(context: &str, handles: &[String]) -> String {
    format!(
        r#"Analyze the following recent posts:

Recent posts:
{context}

Twitter usernames:
{handles}

Decide whether to follow any of the Twitter usernames and assign a score from 0 to 1 (1 being the highest).

If you choose to follow anyone, return a JSON array of objects, each containing "username" and "score".
If you choose not to follow anyone, return an empty JSON array.

Example Response:
[
    {{"username": "username1", "score": 0.8}},
    {{"username": "username2", "score": 0.5}}
]

Example Response if not following anyone:
[]"#,
        handles = handles.join(", "),
    )
}

/// System prompt for deciding wallet transfers
pub fn wallet_decision_prompt(persona: &str, context: &str, addresses: &[String], balance_sol: f64) -> String {
    format!(
        r#"{persona}

You hold a wallet with {balance_sol} SOL. These posts mention wallet addresses:
{context}

Addresses found:
{addresses}

Decide whether to send SOL to any of these addresses, and how much. Be generous only
when it is clearly deserved; you may send nothing.

Return a JSON array of objects with "address" and "amount" (in SOL), for example:
[{{"address": "<address>", "amount": 0.05}}]
Return [] to send nothing."#,
        addresses = bulleted(addresses, "none"),
    )
}
