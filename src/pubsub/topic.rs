//! Canonical pub/sub topic keys shared by the publisher and the subscription bridge.

use std::{fmt, str::FromStr};

use thiserror::Error;

const SEPARATOR: char = ':';

/// Topic families carried by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicNamespace {
    /// Score document updates, one topic per match.
    Match,
    /// Lifecycle events, one topic per tournament.
    Tournament,
}

impl TopicNamespace {
    /// Prefix placed before the separator.
    pub fn prefix(self) -> &'static str {
        match self {
            TopicNamespace::Match => "match-scope",
            TopicNamespace::Tournament => "tournament-scope",
        }
    }

    /// Wildcard pattern covering every topic of this namespace.
    pub fn pattern(self) -> String {
        format!("{}{SEPARATOR}*", self.prefix())
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        [TopicNamespace::Match, TopicNamespace::Tournament]
            .into_iter()
            .find(|namespace| namespace.prefix() == prefix)
    }
}

/// A namespace plus numeric id, rendered as `<namespace>:<id>` with no whitespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicKey {
    namespace: TopicNamespace,
    id: i64,
}

/// Reasons a topic string cannot be turned back into a [`TopicKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicParseError {
    /// No namespace separator.
    #[error("topic `{0}` has no `:` separator")]
    MissingSeparator(String),
    /// Namespace is not one this consumer handles.
    #[error("topic `{0}` uses an unknown namespace")]
    UnknownNamespace(String),
    /// Id part is missing, not numeric or not positive.
    #[error("topic `{0}` does not end with a positive numeric id")]
    InvalidId(String),
}

impl TopicKey {
    /// Topic carrying score updates for a match.
    pub fn for_match(match_id: i64) -> Self {
        Self {
            namespace: TopicNamespace::Match,
            id: match_id,
        }
    }

    /// Topic carrying lifecycle events for a tournament.
    pub fn for_tournament(tournament_id: i64) -> Self {
        Self {
            namespace: TopicNamespace::Tournament,
            id: tournament_id,
        }
    }

    /// Namespace of the topic.
    pub fn namespace(&self) -> TopicNamespace {
        self.namespace
    }

    /// Numeric id within the namespace.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Parse a topic string, requiring the exact canonical format.
    pub fn parse(topic: &str) -> Result<Self, TopicParseError> {
        let (prefix, id) = topic
            .split_once(SEPARATOR)
            .ok_or_else(|| TopicParseError::MissingSeparator(topic.to_string()))?;
        let namespace = TopicNamespace::from_prefix(prefix)
            .ok_or_else(|| TopicParseError::UnknownNamespace(topic.to_string()))?;

        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TopicParseError::InvalidId(topic.to_string()));
        }
        let id = id
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .ok_or_else(|| TopicParseError::InvalidId(topic.to_string()))?;

        Ok(Self { namespace, id })
    }
}

impl fmt::Display for TopicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}", self.namespace.prefix(), self.id)
    }
}

impl FromStr for TopicKey {
    type Err = TopicParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether a channel name falls under a pattern of the form `prefix*` or an exact name.
pub fn pattern_matches(pattern: &str, channel: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => channel.starts_with(prefix),
        None => pattern == channel,
    }
}
