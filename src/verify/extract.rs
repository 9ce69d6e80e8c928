//! Pull a SQL statement out of a free-form oracle response.

use crate::constants::STATEMENT_KEYWORDS;
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:sql)?\s*(.*?)```")
        .unwrap_or_else(|e| panic!("Internal error: invalid code block pattern: {}", e))
});

/// Extract the SQL statement from an oracle response.
///
/// Tries, in order: the first fenced code block (optionally tagged `sql`);
/// the lines from the first one starting with a statement keyword up to a
/// `#` or `//` line, normalized to end in exactly one `;`; the trimmed
/// response as-is.
pub fn extract_sql(response: &str) -> String {
    if let Some(block) = CODE_BLOCK.captures(response).and_then(|c| c.get(1)) {
        return block.as_str().trim().to_string();
    }

    let mut sql_lines = Vec::new();
    let mut in_sql = false;

    for line in response.trim().lines() {
        let trimmed = line.trim();
        if !in_sql && starts_with_keyword(trimmed) {
            in_sql = true;
        }
        if in_sql {
            if trimmed.starts_with('#') || trimmed.starts_with("//") {
                break;
            }
            sql_lines.push(line);
        }
    }

    if !sql_lines.is_empty() {
        let joined = sql_lines.join("\n");
        return format!("{};", joined.trim().trim_end_matches(';'));
    }

    response.trim().to_string()
}

fn starts_with_keyword(line: &str) -> bool {
    let upper = line.to_uppercase();
    STATEMENT_KEYWORDS.iter().any(|kw| upper.starts_with(kw))
}
