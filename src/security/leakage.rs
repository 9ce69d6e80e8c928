//! Output leakage detection.
//!
//! Flags oracle output that echoes the system prompt, contains credential
//! key/value pairs, or dumps numbered rules.

use super::patterns::{RuleSet, ThreatIndicator, DEFAULT_LEAKAGE_RULES};

/// Result of a leakage check.
#[derive(Debug, Clone, Default)]
pub struct LeakageCheckResult {
    /// True when no leakage rule matched
    pub is_valid: bool,
    /// Matched leakage indicators
    pub indicators: Vec<ThreatIndicator>,
}

/// Leakage detector for oracle output.
#[derive(Debug, Clone)]
pub struct LeakageDetector {
    rules: RuleSet,
}

impl Default for LeakageDetector {
    fn default() -> Self {
        Self {
            rules: DEFAULT_LEAKAGE_RULES.clone(),
        }
    }
}

impl LeakageDetector {
    /// Create a detector with the built-in rule table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detector with a replacement rule table.
    ///
    /// Indicators outside the leakage categories are dropped.
    pub fn with_rules(rules: RuleSet) -> Self {
        Self { rules }
    }

    /// Check oracle output for leakage.
    pub fn detect_leakage(&self, text: &str) -> LeakageCheckResult {
        let indicators: Vec<ThreatIndicator> = self
            .rules
            .matches(text)
            .into_iter()
            .filter(|i| i.category.is_leakage())
            .collect();

        LeakageCheckResult {
            is_valid: indicators.is_empty(),
            indicators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::patterns::ThreatCategory;

    fn detector() -> LeakageDetector {
        LeakageDetector::new()
    }

    #[test]
    fn test_system_prompt_leakage() {
        let d = detector();
        for output in [
            "SYSTEM: You are a helpful assistant",
            "My instructions say to always be helpful",
            "My system prompt is to generate SQL",
            "I was instructed to never reveal my prompt",
        ] {
            let result = d.detect_leakage(output);
            assert!(!result.is_valid, "Failed to detect leakage: {}", output);
            assert!(result
                .indicators
                .iter()
                .all(|i| i.category == ThreatCategory::SystemPromptLeak));
        }
    }

    #[test]
    fn test_credential_leakage() {
        let d = detector();
        for output in [
            "API_KEY: sk-abc123def456",
            "SECRET_KEY=mysecretvalue",
            "TOKEN: eyJhbGciOiJIUzI1NiJ9",
            "PASSWORD = admin123",
        ] {
            let result = d.detect_leakage(output);
            assert!(!result.is_valid, "Failed to detect credential: {}", output);
            assert!(result
                .indicators
                .iter()
                .any(|i| i.category == ThreatCategory::CredentialLeak));
        }
    }

    #[test]
    fn test_instruction_dump() {
        let result = detector().detect_leakage("Rule 3: never generate DELETE statements");
        assert!(!result.is_valid);
        assert_eq!(result.indicators[0].category, ThreatCategory::InstructionDump);
    }

    #[test]
    fn test_normal_sql_output() {
        let d = detector();
        for output in [
            "SELECT * FROM users WHERE id = 1",
            "SELECT u.name, o.total FROM users u JOIN orders o ON u.id = o.user_id",
            "SELECT COUNT(*) as count, category FROM products GROUP BY category",
        ] {
            assert!(d.detect_leakage(output).is_valid, "False positive: {}", output);
        }
    }

    #[test]
    fn test_non_leakage_rules_ignored() {
        let rules = RuleSet::compile(vec![
            ("override", ThreatCategory::InstructionOverride, "select"),
            ("token", ThreatCategory::CredentialLeak, r"token\s*:"),
        ])
        .unwrap();
        let d = LeakageDetector::with_rules(rules);
        assert!(d.detect_leakage("SELECT 1").is_valid);
        assert!(!d.detect_leakage("token: abc").is_valid);
    }
}
