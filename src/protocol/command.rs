//! Structured command model.
//!
//! Commands follow a verb-noun-modifier pattern designed to stay readable
//! by humans on the wire:
//!
//! ```text
//! run task beast-mode task_id=auth-123
//! stop instance kiro-3 graceful
//! scale instances up count=5
//! ```
//!
//! Verbs and nouns are closed enumerations; construction fails for anything
//! outside them. A command is immutable once built and is discarded after
//! execution (retained only in the handler's bounded history).

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::ProtocolError;

/// Allowed action verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    Run,
    Stop,
    Sync,
    Status,
    Scale,
    Merge,
    Restart,
    Pause,
    Resume,
    Deploy,
    Rollback,
    Monitor,
    Alert,
    Configure,
    Validate,
}

impl Verb {
    pub const ALL: &'static [Verb] = &[
        Self::Run,
        Self::Stop,
        Self::Sync,
        Self::Status,
        Self::Scale,
        Self::Merge,
        Self::Restart,
        Self::Pause,
        Self::Resume,
        Self::Deploy,
        Self::Rollback,
        Self::Monitor,
        Self::Alert,
        Self::Configure,
        Self::Validate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Run => "run",
            Self::Stop => "stop",
            Self::Sync => "sync",
            Self::Status => "status",
            Self::Scale => "scale",
            Self::Merge => "merge",
            Self::Restart => "restart",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Deploy => "deploy",
            Self::Rollback => "rollback",
            Self::Monitor => "monitor",
            Self::Alert => "alert",
            Self::Configure => "configure",
            Self::Validate => "validate",
        }
    }

    /// Parse a verb token, case-insensitively.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        let lowered = token.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_str() == lowered)
            .ok_or_else(|| ProtocolError::UnknownVerb(token.to_string()))
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Allowed target nouns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Noun {
    Task,
    Instance,
    Branch,
    Swarm,
    Instances,
    Branches,
    Service,
    Deployment,
    Configuration,
    Health,
    Metrics,
    Logs,
    Alerts,
    Resources,
    Workflow,
}

impl Noun {
    pub const ALL: &'static [Noun] = &[
        Self::Task,
        Self::Instance,
        Self::Branch,
        Self::Swarm,
        Self::Instances,
        Self::Branches,
        Self::Service,
        Self::Deployment,
        Self::Configuration,
        Self::Health,
        Self::Metrics,
        Self::Logs,
        Self::Alerts,
        Self::Resources,
        Self::Workflow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Instance => "instance",
            Self::Branch => "branch",
            Self::Swarm => "swarm",
            Self::Instances => "instances",
            Self::Branches => "branches",
            Self::Service => "service",
            Self::Deployment => "deployment",
            Self::Configuration => "configuration",
            Self::Health => "health",
            Self::Metrics => "metrics",
            Self::Logs => "logs",
            Self::Alerts => "alerts",
            Self::Resources => "resources",
            Self::Workflow => "workflow",
        }
    }

    /// Parse a noun token, case-insensitively.
    pub fn parse(token: &str) -> Result<Self, ProtocolError> {
        let lowered = token.to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|n| n.as_str() == lowered)
            .ok_or_else(|| ProtocolError::UnknownNoun(token.to_string()))
    }

    /// The parameter a bare identifier token fills for this noun.
    pub fn id_parameter(&self) -> Option<&'static str> {
        match self {
            Self::Task => Some("task_id"),
            Self::Instance | Self::Instances => Some("instance_id"),
            Self::Branch | Self::Branches => Some("branch_name"),
            _ => None,
        }
    }
}

impl fmt::Display for Noun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modifier tokens recognized across all registered patterns and the
/// natural-language detection set. Bare tokens outside this vocabulary are
/// treated as identifiers during parsing.
pub const MODIFIER_VOCABULARY: &[&str] = &[
    "beast-mode",
    "parallel",
    "sequential",
    "debug",
    "graceful",
    "immediate",
    "force",
    "upstream",
    "downstream",
    "bidirectional",
    "detailed",
    "summary",
    "health",
    "performance",
    "up",
    "down",
    "auto",
    "all",
    "active",
];

/// Whether a token is a known modifier.
pub fn is_known_modifier(token: &str) -> bool {
    MODIFIER_VOCABULARY.contains(&token)
}

/// A typed scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    /// Coerce a raw token into a typed value: `true`/`false` become
    /// booleans, purely digit tokens integers, numeric tokens containing a
    /// dot floats, everything else a string.
    pub fn coerce(raw: &str) -> Self {
        let lowered = raw.to_lowercase();
        if lowered == "true" || lowered == "false" {
            return Self::Bool(lowered == "true");
        }
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = raw.parse::<i64>() {
                return Self::Int(n);
            }
        }
        if raw.contains('.') {
            if let Ok(f) = raw.parse::<f64>() {
                return Self::Float(f);
            }
        }
        Self::Str(raw.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An immutable structured command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub verb: Verb,
    pub noun: Noun,
    pub modifiers: Vec<String>,
    pub parameters: BTreeMap<String, ParamValue>,
    pub timestamp: DateTime<Utc>,
    pub source_instance: String,
    pub correlation_id: Uuid,
}

impl Command {
    pub fn new(verb: Verb, noun: Noun, source_instance: impl Into<String>) -> Self {
        Self {
            verb,
            noun,
            modifiers: Vec::new(),
            parameters: BTreeMap::new(),
            timestamp: Utc::now(),
            source_instance: source_instance.into(),
            correlation_id: Uuid::new_v4(),
        }
    }

    pub fn with_modifier(mut self, modifier: impl Into<String>) -> Self {
        self.modifiers.push(modifier.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn has_modifier(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    pub fn parameter(&self, key: &str) -> Option<&ParamValue> {
        self.parameters.get(key)
    }

    /// Render the canonical wire form: `verb noun [modifier…] [key=value…]`.
    /// Parameters are emitted in deterministic key order.
    pub fn to_command_string(&self) -> String {
        let mut parts = vec![self.verb.as_str().to_string(), self.noun.as_str().to_string()];
        parts.extend(self.modifiers.iter().cloned());
        for (key, value) in &self.parameters {
            parts.push(format!("{key}={value}"));
        }
        parts.join(" ")
    }

    /// Strict parse of the canonical wire form.
    ///
    /// Tokens after the verb and noun containing `=` become typed
    /// parameters. Bare tokens in the modifier vocabulary become modifiers;
    /// the first other bare token fills the noun's id parameter (an
    /// explicit `key=value` always wins), later ones fall back to
    /// modifiers.
    pub fn from_command_string(
        text: &str,
        source_instance: impl Into<String>,
    ) -> Result<Self, ProtocolError> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 2 {
            return Err(ProtocolError::parse(
                text,
                "command must have at least verb and noun",
            ));
        }

        let verb = Verb::parse(tokens[0])?;
        let noun = Noun::parse(tokens[1])?;

        let mut modifiers = Vec::new();
        let mut parameters = BTreeMap::new();
        let mut positional_identifier: Option<String> = None;

        for token in &tokens[2..] {
            if let Some((key, value)) = token.split_once('=') {
                parameters.insert(key.to_string(), ParamValue::coerce(value));
            } else if is_known_modifier(token) {
                modifiers.push((*token).to_string());
            } else if noun.id_parameter().is_some() && positional_identifier.is_none() {
                positional_identifier = Some((*token).to_string());
            } else {
                modifiers.push((*token).to_string());
            }
        }

        if let (Some(id_param), Some(value)) = (noun.id_parameter(), positional_identifier) {
            parameters
                .entry(id_param.to_string())
                .or_insert(ParamValue::Str(value));
        }

        Ok(Self {
            verb,
            noun,
            modifiers,
            parameters,
            timestamp: Utc::now(),
            source_instance: source_instance.into(),
            correlation_id: Uuid::new_v4(),
        })
    }
}
