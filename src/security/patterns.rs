//! Threat categories, indicators, and data-driven rule tables.
//!
//! Rules are plain `(name, category, pattern)` rows compiled into a
//! [`RuleSet`]. The built-in tables below can be replaced wholesale by
//! compiling a different table with [`RuleSet::compile`].

use crate::error::GuardError;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use serde::Serialize;

/// Threat categories reported by the input and output detectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatCategory {
    /// "ignore previous instructions" and friends
    InstructionOverride,
    /// Developer/admin/DAN mode requests
    ModeEscalation,
    /// Attempts to read back the system prompt
    PromptExtraction,
    /// Persona swaps ("pretend you are", "roleplay as")
    RoleManipulation,
    /// Requests to switch off safety measures
    SecurityBypass,
    /// Requests for malware or harmful output
    HarmfulContentRequest,
    /// Directives dictating the exact response text
    OutputManipulation,
    /// Scrambled-interior spelling of a trigger word
    FuzzyMatch,
    /// Base64 or hex payload hiding a trigger word
    EncodedPayload,
    /// Output echoing the system prompt
    SystemPromptLeak,
    /// Output containing a credential key/value pair
    CredentialLeak,
    /// Output dumping numbered rules or instructions
    InstructionDump,
}

impl ThreatCategory {
    /// Check if this category belongs to the output leakage family.
    pub fn is_leakage(&self) -> bool {
        matches!(
            self,
            ThreatCategory::SystemPromptLeak
                | ThreatCategory::CredentialLeak
                | ThreatCategory::InstructionDump
        )
    }
}

impl std::fmt::Display for ThreatCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreatCategory::InstructionOverride => write!(f, "instruction_override"),
            ThreatCategory::ModeEscalation => write!(f, "mode_escalation"),
            ThreatCategory::PromptExtraction => write!(f, "prompt_extraction"),
            ThreatCategory::RoleManipulation => write!(f, "role_manipulation"),
            ThreatCategory::SecurityBypass => write!(f, "security_bypass"),
            ThreatCategory::HarmfulContentRequest => write!(f, "harmful_content_request"),
            ThreatCategory::OutputManipulation => write!(f, "output_manipulation"),
            ThreatCategory::FuzzyMatch => write!(f, "fuzzy_match"),
            ThreatCategory::EncodedPayload => write!(f, "encoded_payload"),
            ThreatCategory::SystemPromptLeak => write!(f, "system_prompt_leak"),
            ThreatCategory::CredentialLeak => write!(f, "credential_leak"),
            ThreatCategory::InstructionDump => write!(f, "instruction_dump"),
        }
    }
}

/// A single detector hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatIndicator {
    /// Threat category
    pub category: ThreatCategory,
    /// Short description of what matched (rule name, word, encoding)
    pub evidence: String,
}

impl ThreatIndicator {
    /// Create a new indicator.
    pub fn new(category: ThreatCategory, evidence: impl Into<String>) -> Self {
        Self {
            category,
            evidence: evidence.into(),
        }
    }
}

impl std::fmt::Display for ThreatIndicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.evidence)
    }
}

/// A compiled rule.
#[derive(Debug, Clone)]
struct Rule {
    name: String,
    category: ThreatCategory,
    regex: Regex,
}

/// An ordered, compiled table of case-insensitive rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Compile a rule table.
    ///
    /// Every pattern is matched case-insensitively and unanchored.
    pub fn compile<I, N, P>(table: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = (N, ThreatCategory, P)>,
        N: Into<String>,
        P: AsRef<str>,
    {
        let mut rules = Vec::new();
        for (name, category, pattern) in table {
            let name = name.into();
            let regex = RegexBuilder::new(pattern.as_ref())
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    GuardError::invalid_input(format!("Invalid pattern for rule '{}': {}", name, e))
                })?;
            rules.push(Rule {
                name,
                category,
                regex,
            });
        }
        Ok(Self { rules })
    }

    /// Number of rules in the table.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Check if the table has no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Return one indicator per rule that matches `text`, in table order.
    pub fn matches(&self, text: &str) -> Vec<ThreatIndicator> {
        self.rules
            .iter()
            .filter(|rule| rule.regex.is_match(text))
            .map(|rule| ThreatIndicator::new(rule.category, rule.name.clone()))
            .collect()
    }
}

use ThreatCategory::*;

/// Built-in input rules.
pub static INJECTION_RULES: &[(&str, ThreatCategory, &str)] = &[
    // Instruction override
    ("ignore_previous_instructions", InstructionOverride, r"ignore\s+(all\s+)?previous\s+instructions?"),
    ("ignore_prior_instructions", InstructionOverride, r"ignore\s+(all\s+)?prior\s+instructions?"),
    ("ignore_above_instructions", InstructionOverride, r"ignore\s+(all\s+)?above\s+instructions?"),
    ("ignore_instructions_above", InstructionOverride, r"ignore\s+(all\s+)?instructions?\s+above"),
    ("ignore_instructions", InstructionOverride, r"ignore\s+(the\s+)?instructions?"),
    ("disregard_previous_instructions", InstructionOverride, r"disregard\s+(all\s+)?previous\s+instructions?"),
    ("forget_previous_instructions", InstructionOverride, r"forget\s+(all\s+)?previous\s+instructions?"),
    ("override_previous_instructions", InstructionOverride, r"override\s+(all\s+)?previous\s+instructions?"),
    // Developer/admin mode
    ("developer_mode_claim", ModeEscalation, r"you\s+are\s+now\s+(in\s+)?developer\s+mode"),
    ("admin_mode_claim", ModeEscalation, r"you\s+are\s+now\s+(in\s+)?admin\s+mode"),
    ("jailbreak_mode_claim", ModeEscalation, r"you\s+are\s+now\s+(in\s+)?jailbreak\s+mode"),
    ("enter_privileged_mode", ModeEscalation, r"enter\s+(developer|admin)\s+mode"),
    ("enable_privileged_mode", ModeEscalation, r"enable\s+(developer|admin)\s+mode"),
    ("activate_privileged_mode", ModeEscalation, r"activate\s+(developer|admin)\s+mode"),
    ("switch_privileged_mode", ModeEscalation, r"switch\s+to\s+(developer|admin|dan)\s+mode"),
    ("jailbreak_mode", ModeEscalation, r"jailbreak\s+mode"),
    ("dan_mode", ModeEscalation, r"\bdan\s+mode"),
    ("do_anything_now", ModeEscalation, r"do\s+anything\s+now"),
    // System prompt extraction
    ("reveal_system_prompt", PromptExtraction, r"reveal\s+(your\s+)?system\s+prompt"),
    ("show_system_prompt", PromptExtraction, r"show\s+(me\s+)?(your\s+)?system\s+prompt"),
    ("ask_instructions", PromptExtraction, r"what\s+(are|is|were)\s+(your\s+)?(exact\s+|initial\s+)?instructions?"),
    ("ask_system_prompt", PromptExtraction, r"what\s+(are|is)\s+(your\s+)?system\s+prompt"),
    ("repeat_text_above", PromptExtraction, r"repeat\s+(the\s+)?text\s+above"),
    ("print_initial_prompt", PromptExtraction, r"print\s+(your\s+)?initial\s+prompt"),
    ("display_system_message", PromptExtraction, r"display\s+(your\s+)?system\s+message"),
    ("output_configuration", PromptExtraction, r"output\s+(your\s+)?configuration"),
    ("tell_instructions", PromptExtraction, r"tell\s+me\s+(your\s+)?instructions?"),
    ("exact_instructions", PromptExtraction, r"(your\s+)?(exact|initial)\s+instructions"),
    ("starting_with_you_are", PromptExtraction, r"starting\s+with\s+.?you\s+are"),
    // Role/persona manipulation
    ("no_longer", RoleManipulation, r"you\s+are\s+no\s+longer"),
    ("stop_being", RoleManipulation, r"stop\s+being\s+an?\s+"),
    ("pretend", RoleManipulation, r"pretend\s+(to\s+be|you\s+are)"),
    ("act_as_if", RoleManipulation, r"act\s+as\s+if\s+you"),
    ("roleplay_as", RoleManipulation, r"roleplay\s+as"),
    ("simulate_being", RoleManipulation, r"simulate\s+being"),
    // Security bypass
    ("bypass_security", SecurityBypass, r"bypass\s+(all\s+)?(security|safety|restrictions?|filters?)"),
    ("disable_security", SecurityBypass, r"disable\s+(all\s+)?(security|safety|restrictions?|filters?)"),
    ("turn_off_security", SecurityBypass, r"turn\s+off\s+(security|safety|restrictions?|filters?)"),
    ("remove_security", SecurityBypass, r"remove\s+(all\s+)?(security|safety|restrictions?|filters?)"),
    ("without_security", SecurityBypass, r"without\s+(any\s+)?(security|safety|restrictions?)"),
    // Harmful content
    ("generate_harmful", HarmfulContentRequest, r"generate\s+(malicious|harmful|dangerous)"),
    ("create_malware", HarmfulContentRequest, r"create\s+(malware|virus|exploit)"),
    // Output manipulation
    ("respond_with_only", OutputManipulation, r"respond\s+with\s+only"),
    ("output_exactly", OutputManipulation, r"output\s+exactly"),
    ("print_only_following", OutputManipulation, r"print\s+only\s+the\s+following"),
];

/// Built-in output leakage rules.
pub static LEAKAGE_RULES: &[(&str, ThreatCategory, &str)] = &[
    // System prompt leakage
    ("system_role_header", SystemPromptLeak, r"SYSTEM\s*:\s*You\s+are"),
    ("my_instructions", SystemPromptLeak, r"my\s+instructions?\s+(are|were|say)"),
    ("my_system_prompt", SystemPromptLeak, r"my\s+system\s+prompt\s+(is|says|reads)"),
    ("instructed_to", SystemPromptLeak, r"i\s+was\s+instructed\s+to"),
    ("my_initial_prompt", SystemPromptLeak, r"my\s+initial\s+prompt"),
    // Credentials
    ("api_key", CredentialLeak, r"API[_\s]?KEY\s*[:=]\s*\w+"),
    ("secret_key", CredentialLeak, r"SECRET[_\s]?KEY\s*[:=]\s*\w+"),
    ("token", CredentialLeak, r"TOKEN\s*[:=]\s*\w+"),
    ("password", CredentialLeak, r"PASSWORD\s*[:=]\s*\w+"),
    // Prompt dump
    ("numbered_instruction", InstructionDump, r"(?:instruction|rule)\s*\d+\s*:"),
];

/// Compiled built-in input rules.
///
/// The tables are hardcoded constants covered by tests, so compilation
/// failure is a programming error.
pub static DEFAULT_INJECTION_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::compile(INJECTION_RULES.iter().copied())
        .unwrap_or_else(|e| panic!("Internal error: invalid injection rule table: {}", e))
});

/// Compiled built-in leakage rules.
pub static DEFAULT_LEAKAGE_RULES: Lazy<RuleSet> = Lazy::new(|| {
    RuleSet::compile(LEAKAGE_RULES.iter().copied())
        .unwrap_or_else(|e| panic!("Internal error: invalid leakage rule table: {}", e))
});
