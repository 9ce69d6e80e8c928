//! Prompt injection detection.
//!
//! Three independent passes, any hit flags the text:
//! - rule pass over the phrase table in [`super::patterns`]
//! - scrambled-spelling ("typoglycemia") pass over trigger keywords
//! - encoding pass that decodes base64/hex runs and looks for trigger words

use super::patterns::{RuleSet, ThreatCategory, ThreatIndicator, DEFAULT_INJECTION_RULES};
use crate::constants::{MIN_ENCODED_RUN_LENGTH, MIN_FUZZY_WORD_LENGTH};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;

/// Trigger words whose scrambled spellings are flagged.
pub const FUZZY_KEYWORDS: &[&str] = &[
    "ignore",
    "bypass",
    "override",
    "reveal",
    "system",
    "prompt",
    "instructions",
    "developer",
    "admin",
    "jailbreak",
    "disable",
    "security",
    "safety",
    "forget",
    "disregard",
    "delete",
    "previous",
    "execute",
    "command",
];

/// Words that make a decoded payload suspicious.
pub const ENCODED_KEYWORDS: &[&str] = &["ignore", "bypass", "reveal", "system", "prompt"];

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\w+").unwrap_or_else(|e| panic!("Internal error: invalid word pattern: {}", e))
});

static BASE64_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"[A-Za-z0-9+/]{{{},}}={{0,2}}", MIN_ENCODED_RUN_LENGTH))
        .unwrap_or_else(|e| panic!("Internal error: invalid base64 pattern: {}", e))
});

static HEX_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?:0x)?([0-9a-fA-F]{{{},}})", MIN_ENCODED_RUN_LENGTH))
        .unwrap_or_else(|e| panic!("Internal error: invalid hex pattern: {}", e))
});

/// Outcome of a detection call.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    /// Whether any pass matched
    pub flagged: bool,
    /// Indicators from all passes, rule pass first
    pub indicators: Vec<ThreatIndicator>,
}

impl Detection {
    fn from_indicators(indicators: Vec<ThreatIndicator>) -> Self {
        Self {
            flagged: !indicators.is_empty(),
            indicators,
        }
    }
}

/// Prompt injection detector.
#[derive(Debug, Clone)]
pub struct InjectionDetector {
    rules: RuleSet,
}

impl Default for InjectionDetector {
    fn default() -> Self {
        Self {
            rules: DEFAULT_INJECTION_RULES.clone(),
        }
    }
}

impl InjectionDetector {
    /// Create a detector with the built-in rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with a replacement rule table.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Check text for prompt injection.
    pub fn detect(&self, text: &str) -> Detection {
        let mut indicators = self.rules.matches(text);
        indicators.extend(fuzzy_pass(text));
        indicators.extend(encoding_pass(text));
        Detection::from_indicators(indicators)
    }
}

/// Check if `word` is a scrambled-interior spelling of `keyword`.
///
/// Requires equal length of at least four characters, identical first and
/// last characters, and a permuted interior. Exact matches are excluded; the
/// rule pass covers those.
pub fn is_typoglycemia_variant(word: &str, keyword: &str) -> bool {
    let word: Vec<char> = word.chars().collect();
    let keyword: Vec<char> = keyword.chars().collect();

    if word.len() < MIN_FUZZY_WORD_LENGTH || word.len() != keyword.len() || word == keyword {
        return false;
    }

    let last = word.len() - 1;
    if word[0] != keyword[0] || word[last] != keyword[last] {
        return false;
    }

    let mut word_interior = word[1..last].to_vec();
    let mut keyword_interior = keyword[1..last].to_vec();
    word_interior.sort_unstable();
    keyword_interior.sort_unstable();
    word_interior == keyword_interior
}

fn fuzzy_pass(text: &str) -> Vec<ThreatIndicator> {
    let lowered = text.to_lowercase();
    let mut indicators = Vec::new();

    for word in WORD_PATTERN.find_iter(&lowered).map(|m| m.as_str()) {
        for keyword in FUZZY_KEYWORDS {
            if is_typoglycemia_variant(word, keyword) {
                indicators.push(ThreatIndicator::new(
                    ThreatCategory::FuzzyMatch,
                    format!("'{}' resembles '{}'", word, keyword),
                ));
            }
        }
    }

    indicators
}

fn encoding_pass(text: &str) -> Vec<ThreatIndicator> {
    let mut indicators = Vec::new();

    let base64_hit = BASE64_RUN
        .find_iter(text)
        .filter_map(|m| STANDARD.decode(m.as_str()).ok())
        .any(|bytes| contains_trigger(&bytes));
    if base64_hit {
        indicators.push(ThreatIndicator::new(
            ThreatCategory::EncodedPayload,
            "base64 encoded payload",
        ));
    }

    let hex_hit = HEX_RUN
        .captures_iter(text)
        .filter_map(|c| c.get(1).and_then(|m| decode_hex(m.as_str())))
        .any(|bytes| contains_trigger(&bytes));
    if hex_hit {
        indicators.push(ThreatIndicator::new(
            ThreatCategory::EncodedPayload,
            "hex encoded payload",
        ));
    }

    indicators
}

fn contains_trigger(bytes: &[u8]) -> bool {
    let decoded = String::from_utf8_lossy(bytes).to_lowercase();
    ENCODED_KEYWORDS.iter().any(|k| decoded.contains(k))
}

/// Decode an even-length run of ASCII hex digits.
fn decode_hex(digits: &str) -> Option<Vec<u8>> {
    if digits.len() % 2 != 0 {
        return None;
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
        .collect()
}

/// Quick check if input is free of injection indicators.
pub fn is_safe_input(text: &str) -> bool {
    !InjectionDetector::new().detect(text).flagged
}
