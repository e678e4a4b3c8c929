//! Statement classification
//!
//! Decides, from text alone, which side effects an executed statement should
//! trigger: a completion refresh after DDL, or a search-path update after a
//! `SET search_path`.

/// Text predicates used by the executor after a batch has run
pub trait StatementClassifier: Send + Sync {
    /// Statement creates, alters or drops schema objects
    fn is_schema_mutating(&self, sql: &str) -> bool;

    /// Statement changes which schemas resolve unqualified names
    fn is_search_path_changing(&self, sql: &str) -> bool;
}

/// PostgreSQL dialect rules
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresClassifier;

impl StatementClassifier for PostgresClassifier {
    fn is_schema_mutating(&self, sql: &str) -> bool {
        let words = leading_keywords(sql, 3);
        match words.first().map(String::as_str) {
            Some("CREATE" | "ALTER" | "DROP") => true,
            Some("IMPORT") => words.get(1).is_some_and(|w| w == "FOREIGN"),
            _ => false,
        }
    }

    fn is_search_path_changing(&self, sql: &str) -> bool {
        let words = leading_keywords(sql, 3);
        let mentions_path = || sql.to_ascii_lowercase().contains("search_path");
        match words.first().map(String::as_str) {
            Some("SET" | "RESET") if words.get(1).is_some_and(|w| w == "ALL") => true,
            Some("SET" | "RESET") => mentions_path(),
            Some("DISCARD") => words.get(1).is_some_and(|w| w == "ALL"),
            Some("SELECT") => {
                mentions_path() && sql.to_ascii_lowercase().contains("set_config")
            }
            _ => false,
        }
    }
}

/// The first `n` keywords of a statement, uppercased.
///
/// Leading whitespace and comments are skipped; scanning stops at the first
/// token that is not a bare word.
pub fn leading_keywords(sql: &str, n: usize) -> Vec<String> {
    let bytes = sql.as_bytes();
    let mut words = Vec::with_capacity(n);
    let mut i = 0;

    while i < bytes.len() && words.len() < n {
        let b = bytes[i];
        if b.is_ascii_whitespace() {
            i += 1;
        } else if b == b'-' && bytes.get(i + 1) == Some(&b'-') {
            i = bytes[i..]
                .iter()
                .position(|&c| c == b'\n')
                .map_or(bytes.len(), |p| i + p + 1);
        } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = bytes[i + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map_or(bytes.len(), |p| i + 2 + p + 2);
        } else if b.is_ascii_alphabetic() || b == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            words.push(sql[start..i].to_ascii_uppercase());
        } else {
            break;
        }
    }

    words
}
