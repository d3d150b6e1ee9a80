//! `@mention` parsing for A2A routing.
//!
//! The grammar is deliberately tiny: an `@` followed by one or more ASCII letters, digits,
//! `_` or `-`. Only the first mention in a message is a routing target; anything after it,
//! including further mentions, is payload.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MENTION_RE: Regex = Regex::new(r"@([A-Za-z0-9_-]+)\s*").expect("Invalid Regex");
}

/// Outcome of parsing one inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Target agent id, `None` when the message names nobody.
    pub target: Option<String>,
    /// Message with the routing mention (and the whitespace after it) removed.
    pub clean: String,
    /// Message exactly as received.
    pub raw: String,
}

/// Split `raw` into its routing target and the text to deliver.
///
/// ```rust
/// use agent_twin::mention::parse;
///
/// let decision = parse("@a @b hi");
/// assert_eq!(decision.target.as_deref(), Some("a"));
/// assert_eq!(decision.clean, "@b hi");
/// ```
pub fn parse(raw: &str) -> RoutingDecision {
    match MENTION_RE.captures(raw) {
        Some(caps) => {
            // Group 0 is the mention plus trailing whitespace, group 1 the id.
            let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
            let target = caps.get(1).map(|m| m.as_str().to_string());
            let mut clean = String::with_capacity(raw.len());
            clean.push_str(&raw[..whole.start]);
            clean.push_str(&raw[whole.end..]);
            RoutingDecision {
                target,
                clean,
                raw: raw.to_string(),
            }
        }
        None => RoutingDecision {
            target: None,
            clean: raw.to_string(),
            raw: raw.to_string(),
        },
    }
}
