//! Cursor context analysis
//!
//! Works out what is being typed at the cursor: the partial word, an
//! optional `qualifier.` in front of it, what kind of object the preceding
//! keyword calls for, and which relations the current statement references.

/// What the text before the word asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expect {
    /// Nothing typed yet in this statement
    StatementStart,
    /// After FROM / JOIN / INTO / UPDATE / TABLE
    Relation,
    /// After SELECT / WHERE / ON / BY / SET / `,` / `(` / operators
    Column,
    /// Anything else
    Any,
}

/// Reference to a relation in the statement (with optional alias)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: Option<String>,
    pub table: String,
    pub alias: Option<String>,
}

/// Everything the index needs to rank candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    /// Partial identifier under the cursor (unquoted)
    pub word: String,
    /// Identifier before a `.` immediately preceding the word
    pub qualifier: Option<String>,
    pub expect: Expect,
    /// Relations referenced anywhere in the current statement
    pub tables: Vec<TableRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// Bare words are uppercased in `upper`; quoted ones keep their case
    Word { text: String, upper: String, quoted: bool },
    Punct(char),
}

const RELATION_KEYWORDS: &[&str] = &["FROM", "JOIN", "INTO", "UPDATE", "TABLE", "TRUNCATE"];
const COLUMN_KEYWORDS: &[&str] = &[
    "SELECT", "WHERE", "AND", "OR", "ON", "BY", "SET", "HAVING", "RETURNING", "DISTINCT", "WHEN",
    "THEN", "ELSE", "NOT",
];

impl CursorContext {
    /// Analyze `text` with the cursor at byte offset `cursor`.
    ///
    /// The cursor is clamped to the text and moved back to a char boundary.
    pub fn analyze(text: &str, cursor: usize) -> Self {
        let mut cursor = cursor.min(text.len());
        while !text.is_char_boundary(cursor) {
            cursor -= 1;
        }

        let (stmt_start, stmt_end) = statement_bounds(text, cursor);
        let before = &text[stmt_start..cursor];
        let statement = &text[stmt_start..stmt_end];

        let word_start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_ident_char(*c))
            .last()
            .map_or(before.len(), |(i, _)| i);
        let word = before[word_start..].to_string();
        let head = &before[..word_start];

        let tokens = tokenize(head);
        let (qualifier, rest) = match tokens.as_slice() {
            [rest @ .., Token::Word { text, .. }, Token::Punct('.')] => (Some(text.clone()), rest),
            all => (None, all),
        };

        Self {
            word,
            qualifier,
            expect: expect_from(rest),
            tables: referenced_tables(&tokenize(statement)),
        }
    }

    /// Resolve an alias or bare relation name used as a qualifier
    pub fn resolve_qualifier(&self, qualifier: &str) -> Option<&TableRef> {
        self.tables
            .iter()
            .find(|t| t.alias.as_deref() == Some(qualifier))
            .or_else(|| self.tables.iter().find(|t| t.table == qualifier))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Byte range of the statement containing the cursor
fn statement_bounds(text: &str, cursor: usize) -> (usize, usize) {
    let start = text[..cursor].rfind(';').map_or(0, |i| i + 1);
    let end = text[cursor..].find(';').map_or(text.len(), |i| cursor + i);
    (start, end)
}

fn expect_from(tokens: &[Token]) -> Expect {
    match tokens.last() {
        None => Expect::StatementStart,
        Some(Token::Punct(',' | '(' | '=' | '<' | '>' | '+' | '-' | '*' | '/')) => {
            // A comma inside a FROM list still wants relations
            if matches!(tokens.last(), Some(Token::Punct(','))) && in_from_list(tokens) {
                Expect::Relation
            } else {
                Expect::Column
            }
        }
        Some(Token::Word { upper, quoted: false, .. }) => {
            if RELATION_KEYWORDS.contains(&upper.as_str()) {
                Expect::Relation
            } else if COLUMN_KEYWORDS.contains(&upper.as_str()) {
                Expect::Column
            } else {
                Expect::Any
            }
        }
        Some(_) => Expect::Any,
    }
}

/// Whether the most recent clause keyword is FROM
fn in_from_list(tokens: &[Token]) -> bool {
    tokens
        .iter()
        .rev()
        .find_map(|t| match t {
            Token::Word { upper, quoted: false, .. }
                if RELATION_KEYWORDS.contains(&upper.as_str())
                    || COLUMN_KEYWORDS.contains(&upper.as_str())
                    || upper == "GROUP"
                    || upper == "ORDER" =>
            {
                Some(upper == "FROM")
            }
            _ => None,
        })
        .unwrap_or(false)
}

/// Collect `FROM/JOIN/UPDATE/INTO [schema.]table [AS] [alias]` references
fn referenced_tables(tokens: &[Token]) -> Vec<TableRef> {
    let mut tables = Vec::new();
    let mut i = 0;
    let mut in_from = false;

    while i < tokens.len() {
        let starts_ref = match &tokens[i] {
            Token::Word { upper, quoted: false, .. } => {
                let upper = upper.as_str();
                if matches!(upper, "FROM" | "JOIN" | "UPDATE" | "INTO") {
                    in_from = upper == "FROM";
                    true
                } else {
                    if is_clause_keyword(upper) {
                        in_from = false;
                    }
                    false
                }
            }
            Token::Punct(',') => in_from,
            Token::Punct(_) => false,
            Token::Word { .. } => false,
        };
        i += 1;
        if !starts_ref {
            continue;
        }

        let Some(Token::Word { text: first, upper, quoted }) = tokens.get(i) else {
            continue;
        };
        if !quoted && is_reserved(upper) {
            continue;
        }
        let mut r = TableRef {
            schema: None,
            table: first.clone(),
            alias: None,
        };
        i += 1;

        if let (Some(Token::Punct('.')), Some(Token::Word { text, .. })) =
            (tokens.get(i), tokens.get(i + 1))
        {
            r.schema = Some(std::mem::replace(&mut r.table, text.clone()));
            i += 2;
        }

        if let Some(Token::Word { upper, quoted: false, .. }) = tokens.get(i)
            && upper == "AS"
        {
            i += 1;
        }
        if let Some(Token::Word { text, upper, quoted }) = tokens.get(i)
            && (*quoted || !is_reserved(upper))
        {
            r.alias = Some(text.clone());
            i += 1;
        }

        tables.push(r);
    }

    tables
}

fn is_clause_keyword(upper: &str) -> bool {
    matches!(
        upper,
        "WHERE" | "GROUP" | "ORDER" | "HAVING" | "LIMIT" | "ON" | "SET" | "VALUES" | "RETURNING"
            | "UNION" | "SELECT"
    )
}

/// Words that end a table reference instead of aliasing it
fn is_reserved(upper: &str) -> bool {
    is_clause_keyword(upper)
        || matches!(
            upper,
            "JOIN" | "INNER" | "LEFT" | "RIGHT" | "FULL" | "CROSS" | "NATURAL" | "USING" | "AS"
                | "FROM" | "LATERAL" | "OFFSET" | "FETCH" | "WINDOW" | "FOR" | "DEFAULT"
        )
}

/// Lex identifiers and punctuation, skipping literals, comments and whitespace
fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '-' if matches!(chars.peek(), Some((_, '-'))) => {
                for (_, n) in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
            }
            '/' if matches!(chars.peek(), Some((_, '*'))) => {
                chars.next();
                let mut prev = '\0';
                for (_, n) in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
            }
            '\'' => {
                while let Some((_, n)) = chars.next() {
                    if n == '\'' {
                        if matches!(chars.peek(), Some((_, '\''))) {
                            chars.next();
                        } else {
                            break;
                        }
                    }
                }
                tokens.push(Token::Punct('\''));
            }
            '"' => {
                let mut ident = String::new();
                while let Some((_, n)) = chars.next() {
                    if n == '"' {
                        if matches!(chars.peek(), Some((_, '"'))) {
                            chars.next();
                            ident.push('"');
                        } else {
                            break;
                        }
                    } else {
                        ident.push(n);
                    }
                }
                tokens.push(Token::Word {
                    upper: ident.clone(),
                    text: ident,
                    quoted: true,
                });
            }
            c if is_ident_char(c) => {
                let mut end = i + c.len_utf8();
                while let Some(&(j, n)) = chars.peek() {
                    if !is_ident_char(n) {
                        break;
                    }
                    end = j + n.len_utf8();
                    chars.next();
                }
                let word = &text[i..end];
                tokens.push(Token::Word {
                    text: word.to_lowercase(),
                    upper: word.to_uppercase(),
                    quoted: false,
                });
            }
            other => tokens.push(Token::Punct(other)),
        }
    }

    tokens
}
