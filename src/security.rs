//! Adversarial input detection, output leakage detection and the guards built on them.

mod events;
mod guard;
mod injection;
mod leakage;
mod orchestrator;
mod patterns;

pub use events::{SecurityEvent, SecurityEventKind, SecurityEventLog};
pub use guard::{sanitize, FilteredOutput, InputGuard, OutputGuard, ValidationResult};
pub use injection::{
    is_safe_input, is_typoglycemia_variant, Detection, InjectionDetector, ENCODED_KEYWORDS,
    FUZZY_KEYWORDS,
};
pub use leakage::{LeakageCheckResult, LeakageDetector};
pub use orchestrator::{GuardedGeneration, RequestState, SecurityOrchestrator};
pub use patterns::{
    RuleSet, ThreatCategory, ThreatIndicator, DEFAULT_INJECTION_RULES, DEFAULT_LEAKAGE_RULES,
    INJECTION_RULES, LEAKAGE_RULES,
};
