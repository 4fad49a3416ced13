//! Natural-language command parsing.
//!
//! Best-effort fallback applied when the strict verb-noun form does not
//! parse. The synonym tables and the modifier detection set are explicit
//! and test-driven; anything they miss fails with a parse error rather
//! than guessing.

use crate::domain::error::ProtocolError;

use super::command::{Command, Noun, ParamValue, Verb};

/// Multi-word phrase substitutions applied before token scanning.
const PHRASE_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("in beast mode", "beast-mode"),
    ("in parallel", "parallel"),
    ("all running threads", "instances all"),
    ("active processes", "instances active"),
];

/// Single-word verb synonyms.
const VERB_SYNONYMS: &[(&str, Verb)] = &[
    ("execute", Verb::Run),
    ("start", Verb::Run),
    ("launch", Verb::Run),
    ("halt", Verb::Stop),
    ("kill", Verb::Stop),
    ("terminate", Verb::Stop),
    ("synchronize", Verb::Sync),
    ("update", Verb::Sync),
    ("check", Verb::Status),
    ("show", Verb::Status),
    ("get", Verb::Status),
    ("increase", Verb::Scale),
    ("decrease", Verb::Scale),
    ("resize", Verb::Scale),
];

/// Single-word noun synonyms.
const NOUN_SYNONYMS: &[(&str, Noun)] = &[
    ("job", Noun::Task),
    ("jobs", Noun::Task),
    ("agent", Noun::Instance),
    ("agents", Noun::Instance),
    ("worker", Noun::Instance),
    ("workers", Noun::Instance),
    ("process", Noun::Instance),
    ("processes", Noun::Instance),
    ("thread", Noun::Instance),
    ("threads", Noun::Instance),
    ("repo", Noun::Branch),
    ("repository", Noun::Branch),
    ("cluster", Noun::Swarm),
    ("group", Noun::Swarm),
];

/// Keywords that mark a modifier when present anywhere in the text.
const MODIFIER_KEYWORDS: &[(&str, &str)] = &[
    ("beast", "beast-mode"),
    ("parallel", "parallel"),
    ("graceful", "graceful"),
    ("all", "all"),
    ("upstream", "upstream"),
];

/// Identifier prefixes recognized in free-form text.
const IDENTIFIER_PREFIXES: &[&str] = &["task-", "kiro-", "instance-"];

/// Filler words never mistaken for short bare identifiers.
const STOPWORDS: &[&str] = &[
    "the", "a", "an", "in", "to", "for", "of", "on", "with", "and", "mode", "my", "our", "all",
    "up", "down", "now", "it", "this", "that", "is", "are", "be", "do", "at", "as", "by", "me",
    "we", "you",
];

/// Default noun applied when the text names none.
fn default_noun(verb: Verb) -> Noun {
    match verb {
        Verb::Run => Noun::Task,
        Verb::Stop => Noun::Instance,
        Verb::Sync => Noun::Branch,
        Verb::Status => Noun::Swarm,
        Verb::Scale => Noun::Instances,
        _ => Noun::Task,
    }
}

/// Lowercase the text and apply phrase substitutions and single-word
/// replacements (`gracefully` → `graceful`).
fn normalize(text: &str) -> String {
    let mut normalized = text.to_lowercase().trim().to_string();
    for (phrase, replacement) in PHRASE_SUBSTITUTIONS {
        normalized = normalized.replace(phrase, replacement);
    }
    normalized
        .split_whitespace()
        .map(|word| match word {
            "gracefully" => "graceful",
            "synchronize" => "sync",
            "execute" => "run",
            "halt" => "stop",
            other => other,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn find_verb(words: &[&str]) -> Option<Verb> {
    for word in words {
        if let Ok(verb) = Verb::parse(word) {
            return Some(verb);
        }
        if let Some((_, verb)) = VERB_SYNONYMS.iter().find(|(syn, _)| syn == word) {
            return Some(*verb);
        }
    }
    None
}

fn find_noun(words: &[&str]) -> Option<Noun> {
    for word in words {
        if let Ok(noun) = Noun::parse(word) {
            return Some(noun);
        }
        if let Some((_, noun)) = NOUN_SYNONYMS.iter().find(|(syn, _)| syn == word) {
            return Some(*noun);
        }
    }
    None
}

fn is_candidate_identifier(word: &str, noun: Noun) -> bool {
    if word.len() > 4 || STOPWORDS.contains(&word) {
        return false;
    }
    if Verb::parse(word).is_ok() || Noun::parse(word).is_ok() {
        return false;
    }
    if VERB_SYNONYMS.iter().any(|(syn, _)| *syn == word)
        || NOUN_SYNONYMS.iter().any(|(syn, _)| *syn == word)
    {
        return false;
    }
    // Short bare identifiers only make sense for task and branch targets.
    matches!(noun, Noun::Task | Noun::Branch | Noun::Branches)
        && word.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Parse free-form text into a structured command.
///
/// Fails with [`ProtocolError::Parse`] when no verb can be identified.
pub fn parse_natural_language(
    text: &str,
    source_instance: &str,
) -> Result<Command, ProtocolError> {
    let normalized = normalize(text);
    let words: Vec<&str> = normalized.split_whitespace().collect();

    let Some(verb) = find_verb(&words) else {
        return Err(ProtocolError::parse(text, "could not identify verb"));
    };
    let noun = find_noun(&words).unwrap_or_else(|| default_noun(verb));

    let mut command = Command::new(verb, noun, source_instance);

    let lowered = text.to_lowercase();
    for (keyword, modifier) in MODIFIER_KEYWORDS {
        if *modifier == "beast-mode" {
            if lowered.contains("beast") && lowered.contains("mode") {
                command.modifiers.push((*modifier).to_string());
            }
        } else if lowered.contains(keyword) && !command.modifiers.iter().any(|m| m == modifier) {
            command.modifiers.push((*modifier).to_string());
        }
    }

    for word in &words {
        if IDENTIFIER_PREFIXES.iter().any(|p| word.starts_with(p)) {
            let param = match noun {
                Noun::Task => "task_id",
                Noun::Branch | Noun::Branches => "branch_name",
                _ => "instance_id",
            };
            command
                .parameters
                .entry(param.to_string())
                .or_insert_with(|| ParamValue::Str((*word).to_string()));
        } else if is_candidate_identifier(word, noun) {
            let param = match noun {
                Noun::Branch | Noun::Branches => "branch_name",
                _ => "task_id",
            };
            command
                .parameters
                .entry(param.to_string())
                .or_insert_with(|| ParamValue::Str((*word).to_string()));
        }
    }

    Ok(command)
}
