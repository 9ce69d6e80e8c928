//! Schema index built from CREATE TABLE statements.
//!
//! Only table and column names are kept. Names are lower-cased; lookups are
//! case-insensitive. An empty index means the schema could not be parsed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern)
        .unwrap_or_else(|e| panic!("Internal error: invalid regex pattern '{}': {}", pattern, e))
}

/// Start of a CREATE TABLE statement up to the opening parenthesis.
/// Schema-qualified names keep only the table part.
static CREATE_TABLE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r#"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:[`"\[]?\w+[`"\]]?\.)?[`"\[]?(\w+)[`"\]]?\s*\("#,
    )
});

/// Table-level constraint clauses that are not columns.
static CONSTRAINT_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)^(?:PRIMARY\s+KEY|FOREIGN\s+KEY|CONSTRAINT\b|UNIQUE\s*(?:KEY|INDEX)?\s*\(|CHECK\s*\(|(?:INDEX|KEY)\b[^(]*\()",
    )
});

/// Column definition: a name followed by a type.
static COLUMN_DEFINITION: Lazy<Regex> =
    Lazy::new(|| compile(r#"^[`"\[]?(\w+)[`"\]]?\s+\w+"#));

/// Lookup of table name to column names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaIndex {
    tables: HashMap<String, HashSet<String>>,
}

impl SchemaIndex {
    /// Parse raw DDL text.
    ///
    /// Never fails; text without recognizable CREATE TABLE statements yields
    /// an empty index.
    pub fn parse(schema_text: &str) -> Self {
        let mut tables: HashMap<String, HashSet<String>> = HashMap::new();

        for caps in CREATE_TABLE.captures_iter(schema_text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let body = table_body(&schema_text[whole.end()..]);
            let columns = tables.entry(name.as_str().to_lowercase()).or_default();

            for part in split_column_definitions(body) {
                let part = part.trim();
                if part.is_empty() || CONSTRAINT_CLAUSE.is_match(part) {
                    continue;
                }
                if let Some(col) = COLUMN_DEFINITION.captures(part).and_then(|c| c.get(1)) {
                    columns.insert(col.as_str().to_lowercase());
                }
            }
        }

        Self { tables }
    }

    /// Build an index from explicit names.
    pub fn from_tables<I, T, C, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tables = tables
            .into_iter()
            .map(|(table, columns)| {
                (
                    table.as_ref().to_lowercase(),
                    columns
                        .into_iter()
                        .map(|c| c.as_ref().to_lowercase())
                        .collect(),
                )
            })
            .collect();
        Self { tables }
    }

    /// Check if a table is declared.
    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(&table.to_lowercase())
    }

    /// Check if a column is declared on a table.
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.tables
            .get(&table.to_lowercase())
            .is_some_and(|cols| cols.contains(&column.to_lowercase()))
    }

    /// Columns of a table.
    pub fn columns(&self, table: &str) -> Option<&HashSet<String>> {
        self.tables.get(&table.to_lowercase())
    }

    /// Table names, unordered.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if no tables were parsed.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Text between the already-consumed opening parenthesis and its match.
/// An unterminated body runs to the end of the input.
fn table_body(rest: &str) -> &str {
    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return &rest[..i];
                }
            }
            _ => {}
        }
    }
    rest
}

/// Split on top-level commas, leaving `DECIMAL(10, 2)` and friends intact.
fn split_column_definitions(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}
