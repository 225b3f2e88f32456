//! # Line Classifier
//!
//! Turns the free-text body of event packets into [`TypedEvent`]s.
//!
//! A [`Classifier`] holds an ordered list of [`Rule`]s. Each line is offered to
//! the rules in order and the first one that produces an event wins; a line no
//! rule accepts becomes [`TypedEvent::RawData`]. Classification never fails.
//!
//! New line shapes are added by implementing [`Rule`] (or building a
//! [`RegexRule`]) and registering it with [`Classifier::push_rule`] or
//! [`Classifier::prepend_rule`]; the built-in rules are untouched.
//!
//! ## Usage
//! ```rust
//! use squad_rcon::protocol::classifier::classify;
//! use squad_rcon::protocol::event::TypedEvent;
//!
//! let event = classify("Remote admin has warned player Bob. Message was \"no teamkilling\"");
//! assert!(matches!(event, TypedEvent::PlayerWarned { .. }));
//! ```

use regex::{Captures, Regex};
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::error::{RconError, Result};
use crate::protocol::event::{ChatChannel, TypedEvent};

static CHAT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[(ChatAll|ChatTeam|ChatSquad|ChatAdmin)\] \[Online IDs:\s*EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\] (.+?) : (.*)$",
    )
    .expect("valid regex")
});
static COMMAND_BODY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^!(\S+)\s*(.*)$").expect("valid regex"));
static WARN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^Remote admin has warned player (.+?)\. Message was "(.*)"$"#)
        .expect("valid regex")
});
static KICK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Kicked player (\d+)\. \[Online IDs= EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\] (.+)$",
    )
    .expect("valid regex")
});
static BAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^Banned player (\d+)\. \[Online IDs= EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\] (.+) for interval (.+)$",
    )
    .expect("valid regex")
});
static POSSESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[Online I[Dd]s:\s*EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\] (.+) has possessed admin camera\.?$",
    )
    .expect("valid regex")
});
static UNPOSSESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\[Online I[Dd]s:\s*EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\] (.+) has unpossessed admin camera\.?$",
    )
    .expect("valid regex")
});
static SQUAD_CREATED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(.+) \(Online IDs: EOS: ([0-9a-fA-F]{32})(?: steam: (\d{17}))?\) has created Squad (\d+) \(Squad Name: (.+)\) on (.+)$",
    )
    .expect("valid regex")
});

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::new);

/// Classify one line with the built-in rule set
pub fn classify(line: &str) -> TypedEvent {
    DEFAULT_CLASSIFIER.classify(line)
}

/// A single line shape
pub trait Rule: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Build an event if `line` has this rule's shape
    fn apply(&self, line: &str) -> Option<TypedEvent>;
}

/// Builds an event from a match; may still decline by returning `None`
pub type BuildFn = fn(&Captures<'_>, &str) -> Option<TypedEvent>;

/// [`Rule`] backed by a regular expression
#[derive(Clone)]
pub struct RegexRule {
    name: String,
    pattern: Regex,
    build: BuildFn,
}

impl RegexRule {
    /// Compile `pattern` into a rule
    pub fn new(name: impl Into<String>, pattern: &str, build: BuildFn) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| RconError::ConfigError(format!("Invalid rule pattern: {e}")))?;
        Ok(Self::from_regex(name, pattern, build))
    }

    pub fn from_regex(name: impl Into<String>, pattern: Regex, build: BuildFn) -> Self {
        Self {
            name: name.into(),
            pattern,
            build,
        }
    }
}

impl fmt::Debug for RegexRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexRule")
            .field("name", &self.name)
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

impl Rule for RegexRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, line: &str) -> Option<TypedEvent> {
        let caps = self.pattern.captures(line)?;
        (self.build)(&caps, line)
    }
}

/// Captured text, empty when the group did not participate
pub fn capture(caps: &Captures<'_>, group: usize) -> String {
    caps.get(group)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Captured text for an optional group
pub fn capture_opt(caps: &Captures<'_>, group: usize) -> Option<String> {
    caps.get(group)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn build_command(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    let channel = ChatChannel::parse(&capture(caps, 1))?;
    let message = capture(caps, 5);
    let body = COMMAND_BODY_RE.captures(&message)?;
    Some(TypedEvent::CommandMessage {
        channel,
        eos_id: capture(caps, 2),
        steam_id: capture_opt(caps, 3),
        player_name: capture(caps, 4),
        command: capture(&body, 1),
        args: capture(&body, 2),
        raw: line.to_string(),
    })
}

fn build_chat(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::ChatMessage {
        channel: ChatChannel::parse(&capture(caps, 1))?,
        eos_id: capture(caps, 2),
        steam_id: capture_opt(caps, 3),
        player_name: capture(caps, 4),
        message: capture(caps, 5),
        raw: line.to_string(),
    })
}

fn build_warned(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::PlayerWarned {
        player_name: capture(caps, 1),
        reason: capture(caps, 2),
        raw: line.to_string(),
    })
}

fn build_kicked(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::PlayerKicked {
        player_id: capture(caps, 1),
        eos_id: capture(caps, 2),
        steam_id: capture_opt(caps, 3),
        player_name: capture(caps, 4),
        raw: line.to_string(),
    })
}

fn build_banned(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::PlayerBanned {
        player_id: capture(caps, 1),
        eos_id: capture(caps, 2),
        steam_id: capture_opt(caps, 3),
        player_name: capture(caps, 4),
        interval: capture(caps, 5),
        raw: line.to_string(),
    })
}

fn build_possessed(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::AdminCameraPossessed {
        eos_id: capture(caps, 1),
        steam_id: capture_opt(caps, 2),
        admin_name: capture(caps, 3),
        raw: line.to_string(),
    })
}

fn build_unpossessed(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::AdminCameraUnpossessed {
        eos_id: capture(caps, 1),
        steam_id: capture_opt(caps, 2),
        admin_name: capture(caps, 3),
        raw: line.to_string(),
    })
}

fn build_squad_created(caps: &Captures<'_>, line: &str) -> Option<TypedEvent> {
    Some(TypedEvent::SquadCreated {
        player_name: capture(caps, 1),
        eos_id: capture(caps, 2),
        steam_id: capture_opt(caps, 3),
        squad_id: capture(caps, 4),
        squad_name: capture(caps, 5),
        team_name: capture(caps, 6),
        raw: line.to_string(),
    })
}

/// Ordered rule set; first match wins
#[derive(Clone)]
pub struct Classifier {
    rules: Vec<Arc<dyn Rule>>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("rules", &self.rule_names())
            .finish()
    }
}

impl Classifier {
    /// Classifier with the built-in Squad line shapes
    pub fn new() -> Self {
        // Command messages are chat lines too, so their rule must come first.
        let builtin: [(&str, &LazyLock<Regex>, BuildFn); 8] = [
            ("command_message", &CHAT_RE, build_command),
            ("chat_message", &CHAT_RE, build_chat),
            ("player_warned", &WARN_RE, build_warned),
            ("player_kicked", &KICK_RE, build_kicked),
            ("player_banned", &BAN_RE, build_banned),
            ("admin_camera_possessed", &POSSESS_RE, build_possessed),
            ("admin_camera_unpossessed", &UNPOSSESS_RE, build_unpossessed),
            ("squad_created", &SQUAD_CREATED_RE, build_squad_created),
        ];

        let rules = builtin
            .into_iter()
            .map(|(name, re, build)| {
                Arc::new(RegexRule::from_regex(name, Regex::clone(re), build)) as Arc<dyn Rule>
            })
            .collect();

        Self { rules }
    }

    /// Classifier with no rules; every line becomes `RawData`
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule; it is tried after every existing rule
    pub fn push_rule(&mut self, rule: impl Rule + 'static) {
        self.rules.push(Arc::new(rule));
    }

    /// Insert a rule ahead of every existing rule
    pub fn prepend_rule(&mut self, rule: impl Rule + 'static) {
        self.rules.insert(0, Arc::new(rule));
    }

    /// Builder form of [`Classifier::push_rule`]
    pub fn with_rule(mut self, rule: impl Rule + 'static) -> Self {
        self.push_rule(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Classify a single line
    pub fn classify(&self, line: &str) -> TypedEvent {
        let line = line.trim_end_matches(['\r', '\n', '\0']).trim();
        self.rules
            .iter()
            .find_map(|rule| rule.apply(line))
            .unwrap_or_else(|| TypedEvent::RawData {
                body: line.to_string(),
            })
    }

    /// Classify every non-blank line of an event packet body
    pub fn classify_body(&self, body: &str) -> Vec<TypedEvent> {
        body.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.classify(line))
            .collect()
    }
}
