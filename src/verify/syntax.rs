//! Static SQL checks: structural well-formedness and table references.
//!
//! Nothing here parses SQL properly. The checks are deliberately shallow:
//! token balance, a recognized leading keyword, and table names that exist
//! in the supplied [`SchemaIndex`].

use crate::constants::STATEMENT_KEYWORDS;
use crate::schema::SchemaIndex;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

static STATEMENT_START: Lazy<Regex> =
    Lazy::new(|| compile(&format!(r"(?i)^({})\b", STATEMENT_KEYWORDS.join("|"))));

/// Identifier following FROM/JOIN/UPDATE/INTO, optionally quoted and qualified.
static TABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    compile(r#"(?i)\b(?:FROM|JOIN|UPDATE|INTO)\s+((?:[`"\[]?\w+[`"\]]?\.)*[`"\[]?\w+[`"\]]?)"#)
});

/// Names declared by a WITH clause.
static CTE_NAME: Lazy<Regex> = Lazy::new(|| {
    compile(r#"(?i)(?:\bWITH\s+(?:RECURSIVE\s+)?|,\s*)[`"\[]?(\w+)[`"\]]?\s*(?:\([^)]*\)\s*)?AS\s*\("#)
});

static SELECT_WORD: Lazy<Regex> = Lazy::new(|| compile(r"(?i)\bSELECT\b"));

/// Warning attached when the schema yielded no tables.
pub const UNPARSED_SCHEMA_WARNING: &str = "Warning: Could not parse schema for verification";

/// Outcome of a single check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SqlCheckOutcome {
    /// Structure passed (always true for schema checks)
    pub is_structurally_valid: bool,
    /// Missing tables, one message each
    pub schema_mismatches: Vec<String>,
    /// What went wrong, fed back to the repair oracle
    pub diagnostic: Option<String>,
    /// Non-fatal notes, e.g. the schema soft pass
    pub warnings: Vec<String>,
}

impl SqlCheckOutcome {
    /// A passing outcome.
    pub fn valid() -> Self {
        Self {
            is_structurally_valid: true,
            ..Default::default()
        }
    }

    /// A structural failure.
    pub fn structural(diagnostic: impl Into<String>) -> Self {
        Self {
            is_structurally_valid: false,
            diagnostic: Some(diagnostic.into()),
            ..Default::default()
        }
    }

    /// A schema cross-reference failure. An empty list is a pass.
    pub fn mismatched(mismatches: Vec<String>) -> Self {
        let diagnostic = (!mismatches.is_empty()).then(|| mismatches.join("; "));
        Self {
            is_structurally_valid: true,
            schema_mismatches: mismatches,
            diagnostic,
            warnings: Vec::new(),
        }
    }

    /// Check if the statement passed.
    pub fn is_valid(&self) -> bool {
        self.is_structurally_valid && self.schema_mismatches.is_empty()
    }
}

/// Stateless structural and schema checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlVerifier;

impl SqlVerifier {
    /// Create a verifier.
    pub fn new() -> Self {
        Self
    }

    /// Check structural well-formedness.
    ///
    /// Leading comments are skipped before the statement keyword is checked.
    pub fn check_syntax(&self, sql: &str) -> SqlCheckOutcome {
        let body = skip_leading_comments(sql).trim();
        if body.is_empty() {
            return SqlCheckOutcome::structural("Empty or invalid SQL statement");
        }

        if !STATEMENT_START.is_match(body) {
            let first = body.split_whitespace().next().unwrap_or_default();
            return SqlCheckOutcome::structural(format!(
                "Unknown statement type starting with: {}",
                first.to_uppercase()
            ));
        }

        let (open, close) = count_parens(body);
        if open != close {
            return SqlCheckOutcome::structural(format!(
                "Unmatched parentheses: {} opening, {} closing",
                open, close
            ));
        }

        let quotes = body.matches('\'').count() - body.matches("\\'").count();
        if quotes % 2 != 0 {
            return SqlCheckOutcome::structural("Unmatched single quotes");
        }

        SqlCheckOutcome::valid()
    }

    /// Cross-reference table names against the schema.
    ///
    /// An empty index is a soft pass carrying a warning. Schema-qualified
    /// names resolve to their last part and CTE names are never reported.
    pub fn check_against_schema(&self, sql: &str, index: &SchemaIndex) -> SqlCheckOutcome {
        if index.is_empty() {
            let mut outcome = SqlCheckOutcome::valid();
            outcome.warnings.push(UNPARSED_SCHEMA_WARNING.to_string());
            return outcome;
        }

        let code = mask_literals_and_comments(sql);
        let ctes: HashSet<String> = if STATEMENT_START
            .captures(skip_leading_comments(sql).trim())
            .and_then(|c| c.get(1))
            .is_some_and(|kw| kw.as_str().eq_ignore_ascii_case("WITH"))
        {
            CTE_NAME
                .captures_iter(&code)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().to_lowercase())
                .collect()
        } else {
            HashSet::new()
        };

        let mut seen = HashSet::new();
        let mut mismatches = Vec::new();

        for caps in TABLE_REFERENCE.captures_iter(&code) {
            let (Some(whole), Some(reference)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if is_function_argument(&code, whole.start()) {
                continue;
            }

            let table = last_name_part(reference.as_str());
            let key = table.to_lowercase();
            if ctes.contains(&key) || index.has_table(&key) || !seen.insert(key) {
                continue;
            }
            mismatches.push(format!("Table '{}' not found in schema", table));
        }

        SqlCheckOutcome::mismatched(mismatches)
    }

    /// Run the syntax check, then the schema check if structure passed.
    pub fn check(&self, sql: &str, index: &SchemaIndex) -> SqlCheckOutcome {
        let syntax = self.check_syntax(sql);
        if !syntax.is_valid() {
            return syntax;
        }
        self.check_against_schema(sql, index)
    }
}

/// Skip leading `--` and `/* */` comments.
fn skip_leading_comments(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(comment) = trimmed.strip_prefix("--") {
            match comment.find('\n') {
                Some(pos) => rest = &comment[pos + 1..],
                None => return "",
            }
        } else if let Some(comment) = trimmed.strip_prefix("/*") {
            match comment.find("*/") {
                Some(pos) => rest = &comment[pos + 2..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

/// Count parentheses outside single-quoted literals.
fn count_parens(sql: &str) -> (usize, usize) {
    let mut open = 0;
    let mut close = 0;
    let mut in_string = false;
    let mut prev = '\0';

    for c in sql.chars() {
        match c {
            '\'' if prev != '\\' => in_string = !in_string,
            '(' if !in_string => open += 1,
            ')' if !in_string => close += 1,
            _ => {}
        }
        prev = c;
    }

    (open, close)
}

/// Copy of `sql` with single-quoted literal contents and comments replaced
/// by spaces. Byte offsets are preserved.
fn mask_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();
    let mut in_string = false;
    let mut prev = '\0';

    while let Some(c) = chars.next() {
        if in_string {
            if c == '\'' && prev != '\\' {
                in_string = false;
                out.push(c);
            } else {
                blank(&mut out, c);
            }
            prev = c;
            continue;
        }

        match (c, chars.peek()) {
            ('\'', _) => {
                in_string = true;
                out.push(c);
            }
            ('-', Some('-')) => {
                blank(&mut out, c);
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    blank(&mut out, next);
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                blank(&mut out, c);
                let mut last = '\0';
                for next in chars.by_ref() {
                    blank(&mut out, next);
                    if last == '*' && next == '/' {
                        break;
                    }
                    last = next;
                }
            }
            _ => out.push(c),
        }
        prev = c;
    }

    out
}

fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat(' ').take(c.len_utf8()));
    }
}

/// True when the keyword at `pos` sits inside a non-subquery paren group,
/// as in `EXTRACT(YEAR FROM created_at)`.
fn is_function_argument(sql: &str, pos: usize) -> bool {
    let mut stack = Vec::new();
    for (i, c) in sql[..pos].char_indices() {
        match c {
            '(' => stack.push(i),
            ')' => {
                stack.pop();
            }
            _ => {}
        }
    }
    match stack.last() {
        Some(&start) => !SELECT_WORD.is_match(&sql[start + 1..pos]),
        None => false,
    }
}

fn last_name_part(reference: &str) -> &str {
    let last = reference.rsplit('.').next().unwrap_or(reference);
    last.trim_matches(|c| matches!(c, '`' | '"' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SchemaIndex {
        SchemaIndex::parse(
            "CREATE TABLE users (id INT, name TEXT);
             CREATE TABLE orders (id INT, user_id INT, total DECIMAL(10, 2), created_at DATE);",
        )
    }

    #[test]
    fn test_valid_select() {
        let outcome = SqlVerifier::new().check_syntax("SELECT * FROM t");
        assert!(outcome.is_valid());
        assert!(outcome.diagnostic.is_none());
    }

    #[test]
    fn test_unbalanced_parens() {
        let outcome = SqlVerifier::new().check_syntax("SELECT * FROM t WHERE (a=1");
        assert!(!outcome.is_structurally_valid);
        let diagnostic = outcome.diagnostic.unwrap();
        assert!(diagnostic.contains("Unmatched parentheses"));
        assert!(diagnostic.contains("1 opening, 0 closing"));
    }

    #[test]
    fn test_parens_inside_literals_ignored() {
        let outcome = SqlVerifier::new().check_syntax("SELECT * FROM t WHERE note = ':)'");
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_unmatched_quotes() {
        let outcome = SqlVerifier::new().check_syntax("SELECT * FROM t WHERE name = 'bob");
        assert_eq!(outcome.diagnostic.as_deref(), Some("Unmatched single quotes"));

        let escaped = SqlVerifier::new().check_syntax(r"SELECT * FROM t WHERE name = 'o\'neil'");
        assert!(escaped.is_valid());
    }

    #[test]
    fn test_empty_and_unknown_statements() {
        let verifier = SqlVerifier::new();
        assert!(!verifier.check_syntax("   ").is_structurally_valid);
        assert!(!verifier.check_syntax("-- only a comment").is_structurally_valid);

        let outcome = verifier.check_syntax("EXPLAIN SELECT 1");
        assert_eq!(
            outcome.diagnostic.as_deref(),
            Some("Unknown statement type starting with: EXPLAIN")
        );
        assert!(!verifier.check_syntax("SELECTED 1").is_structurally_valid);
    }

    #[test]
    fn test_leading_comments_skipped() {
        let sql = "-- top customers\n/* report */ SELECT name FROM users";
        assert!(SqlVerifier::new().check_syntax(sql).is_valid());
    }

    #[test]
    fn test_every_statement_keyword_accepted() {
        for kw in STATEMENT_KEYWORDS {
            let sql = format!("{} x", kw.to_lowercase());
            assert!(SqlVerifier::new().check_syntax(&sql).is_valid(), "{}", kw);
        }
    }

    #[test]
    fn test_schema_mismatch_reported() {
        let outcome = SqlVerifier::new()
            .check_against_schema("SELECT * FROM users u JOIN payments p ON p.uid = u.id", &index());
        assert!(!outcome.is_valid());
        assert_eq!(outcome.schema_mismatches, vec!["Table 'payments' not found in schema"]);
        assert_eq!(
            outcome.diagnostic.as_deref(),
            Some("Table 'payments' not found in schema")
        );
    }

    #[test]
    fn test_schema_mismatches_deduplicated() {
        let outcome = SqlVerifier::new().check_against_schema(
            "SELECT * FROM ghosts WHERE id IN (SELECT id FROM Ghosts)",
            &index(),
        );
        assert_eq!(outcome.schema_mismatches.len(), 1);
    }

    #[test]
    fn test_quoted_and_qualified_tables() {
        let verifier = SqlVerifier::new();
        assert!(verifier
            .check_against_schema("SELECT * FROM \"Users\"", &index())
            .is_valid());
        assert!(verifier
            .check_against_schema("SELECT * FROM public.orders", &index())
            .is_valid());
        assert!(verifier
            .check_against_schema("SELECT * FROM [dbo].[orders]", &index())
            .is_valid());
    }

    #[test]
    fn test_cte_names_not_reported() {
        let sql = "WITH big AS (SELECT * FROM orders WHERE total > 100) SELECT * FROM big";
        assert!(SqlVerifier::new().check_against_schema(sql, &index()).is_valid());
    }

    #[test]
    fn test_extract_from_not_a_table() {
        let sql = "SELECT EXTRACT(YEAR FROM created_at) FROM orders";
        assert!(SqlVerifier::new().check_against_schema(sql, &index()).is_valid());
    }

    #[test]
    fn test_paren_in_literal_does_not_hide_table() {
        let outcome =
            SqlVerifier::new().check_against_schema("SELECT '(' AS p FROM ghosts", &index());
        assert!(!outcome.is_valid());
        assert_eq!(outcome.schema_mismatches, vec!["Table 'ghosts' not found in schema"]);
    }

    #[test]
    fn test_keywords_in_literals_and_comments_ignored() {
        let verifier = SqlVerifier::new();
        let sql = "SELECT name FROM users WHERE name LIKE '%from london%'";
        assert!(verifier.check(sql, &index()).is_valid());

        let sql = "SELECT name FROM users -- join archive later\nWHERE id > 1";
        assert!(verifier.check(sql, &index()).is_valid());

        let sql = "SELECT /* from legacy */ name FROM users WHERE note = 'it''s into x'";
        assert!(verifier.check(sql, &index()).is_valid());

        let sql = "SELECT name FROM users WHERE note = 'join ' || 'now' UNION SELECT id FROM audit";
        assert_eq!(
            verifier.check_against_schema(sql, &index()).schema_mismatches,
            vec!["Table 'audit' not found in schema"]
        );
    }

    #[test]
    fn test_mask_preserves_offsets() {
        let sql = "SELECT 'déjà (from)' FROM users /* é */";
        let masked = mask_literals_and_comments(sql);
        assert_eq!(masked.len(), sql.len());
        assert!(masked.starts_with("SELECT '"));
        assert!(!masked.contains("from)"));
        assert!(masked.contains("FROM users"));
    }

    #[test]
    fn test_subquery_tables_checked() {
        let sql = "SELECT * FROM users WHERE id IN (SELECT user_id FROM refunds)";
        let outcome = SqlVerifier::new().check_against_schema(sql, &index());
        assert_eq!(outcome.schema_mismatches, vec!["Table 'refunds' not found in schema"]);
    }

    #[test]
    fn test_empty_schema_soft_pass() {
        let outcome =
            SqlVerifier::new().check_against_schema("SELECT * FROM anything", &SchemaIndex::default());
        assert!(outcome.is_valid());
        assert_eq!(outcome.warnings, vec![UNPARSED_SCHEMA_WARNING]);
    }

    #[test]
    fn test_check_runs_syntax_first() {
        let outcome = SqlVerifier::new().check("SELECT * FROM ghosts WHERE (", &index());
        assert!(!outcome.is_structurally_valid);
        assert!(outcome.schema_mismatches.is_empty());
    }
}
