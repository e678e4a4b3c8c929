//! Statement splitting
//!
//! Splits a script on top-level semicolons. Semicolons inside string
//! literals, quoted identifiers, comments and dollar-quoted bodies do not
//! terminate a statement.

/// Split a multi-statement script into trimmed, non-empty statements.
///
/// Comments are kept with the statement they precede so the engine sees the
/// text exactly as written. Segments that contain nothing but comments are
/// dropped.
pub fn split_statements(sql: &str) -> Vec<String> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' if is_escape_string(bytes, i) => i = skip_escape_string(bytes, i),
            b'\'' | b'"' => i = skip_quoted(bytes, i, bytes[i]),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = bytes[i..]
                    .iter()
                    .position(|&b| b == b'\n')
                    .map_or(len, |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => i = skip_block_comment(bytes, i),
            b'$' => match dollar_tag(bytes, i) {
                Some(tag_len) => i = skip_dollar_quoted(bytes, i, tag_len),
                None => i += 1,
            },
            b';' => {
                push_statement(&mut statements, &sql[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_statement(&mut statements, &sql[start..]);

    statements
}

fn push_statement(statements: &mut Vec<String>, segment: &str) {
    let trimmed = segment.trim();
    if !trimmed.is_empty() && !is_only_comments(trimmed) {
        statements.push(trimmed.to_string());
    }
}

/// Skip a `'...'` or `"..."` run; doubled quotes are escapes
fn skip_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// `'` opens an `E'...'` escape string: preceded by `E`/`e` that is not
/// the tail of a longer identifier
fn is_escape_string(bytes: &[u8], quote: usize) -> bool {
    let Some(prefix) = quote.checked_sub(1) else {
        return false;
    };
    if !matches!(bytes[prefix], b'E' | b'e') {
        return false;
    }
    match prefix.checked_sub(1) {
        None => true,
        Some(before) => {
            let b = bytes[before];
            !(b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || !b.is_ascii())
        }
    }
}

/// Skip an escape string; a backslash escapes the byte after it
fn skip_escape_string(bytes: &[u8], open: usize) -> usize {
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\'' if bytes.get(i + 1) == Some(&b'\'') => i += 2,
            b'\'' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Skip a block comment; PostgreSQL block comments nest
fn skip_block_comment(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut i = open;
    while i + 1 < bytes.len() {
        if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            depth += 1;
            i += 2;
        } else if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return i;
            }
        } else {
            i += 1;
        }
    }
    bytes.len()
}

/// Length of a `$tag$` opener starting at `i`, if there is one
fn dollar_tag(bytes: &[u8], i: usize) -> Option<usize> {
    // `$1` is a parameter, not a quote
    if i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') {
        return None;
    }
    let mut j = i + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'$' => return Some(j - i + 1),
            b if b.is_ascii_alphabetic() || b == b'_' => j += 1,
            b if b.is_ascii_digit() && j > i + 1 => j += 1,
            _ => return None,
        }
    }
    None
}

fn skip_dollar_quoted(bytes: &[u8], open: usize, tag_len: usize) -> usize {
    let tag = &bytes[open..open + tag_len];
    let body = open + tag_len;
    bytes[body..]
        .windows(tag_len)
        .position(|w| w == tag)
        .map_or(bytes.len(), |p| body + p + tag_len)
}

fn is_only_comments(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
        } else if bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'-') {
            i = bytes[i..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(bytes.len(), |p| i + p + 1);
        } else if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i = skip_block_comment(bytes, i);
        } else {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_on_semicolons() {
        assert_eq!(
            split_statements("CREATE TABLE t(x int); SELECT 1; SELECT 2;"),
            vec!["CREATE TABLE t(x int)", "SELECT 1", "SELECT 2"]
        );
    }

    #[test]
    fn test_last_statement_without_semicolon() {
        assert_eq!(split_statements("SELECT 1;\nSELECT 2"), vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_statements("").is_empty());
        assert!(split_statements(" ;; \n ;").is_empty());
    }

    #[test]
    fn test_semicolon_in_string_literal() {
        assert_eq!(
            split_statements("SELECT 'a;b'; SELECT 'it''s;'"),
            vec!["SELECT 'a;b'", "SELECT 'it''s;'"]
        );
    }

    #[test]
    fn test_backslash_quote_in_escape_string() {
        assert_eq!(
            split_statements(r"SELECT E'it\'s; fine'; SELECT 2"),
            vec![r"SELECT E'it\'s; fine'", "SELECT 2"]
        );
        assert_eq!(
            split_statements(r"SELECT e'\\'; SELECT 'a;''b'"),
            vec![r"SELECT e'\\'", "SELECT 'a;''b'"]
        );
    }

    #[test]
    fn test_backslash_is_literal_in_standard_string() {
        assert_eq!(
            split_statements(r"SELECT 'C:\'; SELECT 2"),
            vec![r"SELECT 'C:\'", "SELECT 2"]
        );
        // the `e` ending `date` does not start an escape string
        assert_eq!(
            split_statements(r"SELECT date'x\'; SELECT 2"),
            vec![r"SELECT date'x\'", "SELECT 2"]
        );
    }

    #[test]
    fn test_semicolon_in_quoted_identifier() {
        assert_eq!(split_statements(r#"SELECT 1 AS "x;y""#), vec![r#"SELECT 1 AS "x;y""#]);
    }

    #[test]
    fn test_semicolon_in_comments() {
        let sql = "-- first; comment\nSELECT 1; /* block; /* nested; */ still */ SELECT 2";
        assert_eq!(
            split_statements(sql),
            vec![
                "-- first; comment\nSELECT 1",
                "/* block; /* nested; */ still */ SELECT 2"
            ]
        );
    }

    #[test]
    fn test_comment_only_segment_dropped() {
        assert_eq!(split_statements("SELECT 1; -- trailing"), vec!["SELECT 1"]);
    }

    #[test]
    fn test_dollar_quoted_function_body() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $body$ BEGIN RETURN 1; END; $body$ LANGUAGE plpgsql; SELECT f()";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].ends_with("LANGUAGE plpgsql"));
        assert_eq!(stmts[1], "SELECT f()");
    }

    #[test]
    fn test_anonymous_dollar_quote() {
        let stmts = split_statements("DO $$ BEGIN PERFORM 1; END $$; SELECT 2");
        assert_eq!(stmts, vec!["DO $$ BEGIN PERFORM 1; END $$", "SELECT 2"]);
    }

    #[test]
    fn test_positional_parameter_not_a_dollar_quote() {
        assert_eq!(
            split_statements("SELECT $1; SELECT 2"),
            vec!["SELECT $1", "SELECT 2"]
        );
    }

    #[test]
    fn test_unterminated_string_keeps_rest() {
        assert_eq!(split_statements("SELECT 'oops; SELECT 2"), vec!["SELECT 'oops; SELECT 2"]);
    }
}
