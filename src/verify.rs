//! Static SQL verification and the repair loop built on it.

mod correction;
mod extract;
mod syntax;

pub use correction::{CorrectionLoop, VerificationResult};
pub use extract::extract_sql;
pub use syntax::{SqlCheckOutcome, SqlVerifier, UNPARSED_SCHEMA_WARNING};
