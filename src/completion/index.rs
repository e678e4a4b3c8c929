//! Completion index
//!
//! Immutable snapshot of schema metadata plus the session's search path.
//! Answers "what can follow this text at this cursor" with a ranked list.
//! Ranking is: context fit first (relations after FROM, columns after
//! SELECT/WHERE, ...), then search-path position, then name.

use super::context::{CursorContext, Expect, TableRef};
use super::{CompletionKind, Suggestion};
use crate::db::schema::{Schema, SchemaTree, Table};
use std::collections::HashSet;
use std::sync::LazyLock;

const MAX_SUGGESTIONS: usize = 100;

static SQL_KEYWORDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    let mut words: Vec<&'static str> = include_str!("../../data/sql_keywords.txt")
        .lines()
        .filter(|l| !l.is_empty())
        .collect();
    words.sort_unstable();
    words.dedup();
    words
});

/// Schema-aware completion data for one connection target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionIndex {
    tree: SchemaTree,
    search_path: Vec<String>,
    placeholder: bool,
}

/// Candidate before ranking is applied
struct Candidate {
    text: String,
    /// Bare lowercased name the typed prefix is matched against
    name: String,
    display: String,
    kind: CompletionKind,
    /// Lower ranks sort first
    context_rank: u8,
    path_rank: usize,
}

impl CompletionIndex {
    /// Empty index answering with keywords only, installed before the first refresh
    pub fn placeholder() -> Self {
        Self {
            placeholder: true,
            ..Self::default()
        }
    }

    /// Build an index from introspected metadata
    pub fn build(tree: SchemaTree, search_path: Vec<String>) -> Self {
        Self {
            tree,
            search_path,
            placeholder: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    pub fn schema_tree(&self) -> &SchemaTree {
        &self.tree
    }

    pub fn search_path(&self) -> &[String] {
        &self.search_path
    }

    /// Replace the search path only; schema metadata is untouched
    pub fn set_search_path(&mut self, path: Vec<String>) {
        self.search_path = path;
    }

    /// Ranked suggestions for `text` with the cursor at byte offset `cursor`
    pub fn complete(&self, text: &str, cursor: usize) -> Vec<Suggestion> {
        let ctx = CursorContext::analyze(text, cursor);
        let mut candidates = Vec::new();

        match ctx.qualifier.as_deref() {
            Some(q) => self.qualified_candidates(&ctx, q, &mut candidates),
            None => self.unqualified_candidates(&ctx, &mut candidates),
        }

        let prefix = ctx.word.to_lowercase();
        let mut matches: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| {
                prefix.is_empty()
                    || c.name.starts_with(&prefix)
                    || c.text.to_lowercase().starts_with(&prefix)
            })
            .filter(|c| c.text != ctx.word)
            .collect();
        matches.sort_by(|a, b| {
            (a.context_rank, a.path_rank, &a.text).cmp(&(b.context_rank, b.path_rank, &b.text))
        });

        let mut seen = HashSet::new();
        matches
            .into_iter()
            .filter(|c| seen.insert(c.text.clone()))
            .take(MAX_SUGGESTIONS)
            .map(|c| Suggestion {
                text: c.text,
                display: c.display,
                kind: c.kind,
            })
            .collect()
    }

    /// Position of a schema in the search path; schemas off the path rank last
    fn path_rank(&self, schema: &str) -> usize {
        self.search_path
            .iter()
            .position(|s| s == schema)
            .unwrap_or(self.search_path.len())
    }

    /// Whether unqualified names in `schema` resolve without a prefix
    fn on_path(&self, schema: &str) -> bool {
        self.search_path.is_empty() || self.search_path.iter().any(|s| s == schema)
    }

    fn qualified_candidates(&self, ctx: &CursorContext, qualifier: &str, out: &mut Vec<Candidate>) {
        // schema.<relation or function>
        if let Some(schema) = self.tree.schema(qualifier) {
            self.push_relations(schema, false, 0, out);
            self.push_functions(schema, false, 1, out);
            return;
        }

        // alias.<column> or table.<column>
        let resolved = ctx.resolve_qualifier(qualifier).cloned().unwrap_or(TableRef {
            schema: None,
            table: qualifier.to_string(),
            alias: None,
        });
        if let Some(table) = self.find_relation(&resolved) {
            push_columns(table, 0, 0, out);
        }
    }

    fn unqualified_candidates(&self, ctx: &CursorContext, out: &mut Vec<Candidate>) {
        let keyword_rank = match ctx.expect {
            Expect::StatementStart => 0,
            Expect::Any => 3,
            Expect::Relation | Expect::Column => 5,
        };
        self.push_keywords(&ctx.word, keyword_rank, out);

        let (relation_rank, column_rank, function_rank, schema_rank) = match ctx.expect {
            Expect::Relation => (0, 6, 6, 1),
            Expect::Column => (4, 0, 2, 4),
            Expect::StatementStart | Expect::Any => (1, 4, 2, 3),
        };

        for schema in &self.tree.schemas {
            self.push_relations(schema, true, relation_rank, out);
            self.push_functions(schema, true, function_rank, out);
            out.push(Candidate {
                text: quote_ident(&schema.name),
                name: schema.name.to_lowercase(),
                display: schema.name.clone(),
                kind: CompletionKind::Schema,
                context_rank: schema_rank,
                path_rank: 0,
            });
        }

        // Columns of relations the statement already references rank first
        let mut referenced = 0;
        for r in &ctx.tables {
            if let Some(table) = self.find_relation(r) {
                push_columns(table, column_rank, 0, out);
                referenced += 1;
            }
        }
        if referenced == 0 || ctx.expect != Expect::Column {
            for schema in &self.tree.schemas {
                for table in schema.relations() {
                    push_columns(table, column_rank + 1, self.path_rank(&schema.name), out);
                }
            }
        }
    }

    fn push_relations(&self, schema: &Schema, unqualified: bool, rank: u8, out: &mut Vec<Candidate>) {
        let path_rank = self.path_rank(&schema.name);
        let qualify = unqualified && !self.on_path(&schema.name);
        let entries = schema
            .tables
            .iter()
            .map(|t| (t, CompletionKind::Table))
            .chain(schema.views.iter().map(|v| (v, CompletionKind::View)));
        for (table, kind) in entries {
            let name = quote_ident(&table.name);
            let text = if qualify {
                format!("{}.{}", quote_ident(&schema.name), name)
            } else {
                name
            };
            out.push(Candidate {
                display: format!("{}.{}", schema.name, table.name),
                name: table.name.to_lowercase(),
                text,
                kind,
                context_rank: rank,
                path_rank,
            });
        }
    }

    fn push_functions(&self, schema: &Schema, unqualified: bool, rank: u8, out: &mut Vec<Candidate>) {
        let path_rank = self.path_rank(&schema.name);
        let qualify = unqualified && !self.on_path(&schema.name);
        for func in &schema.functions {
            let name = quote_ident(&func.name);
            let text = if qualify {
                format!("{}.{}", quote_ident(&schema.name), name)
            } else {
                name
            };
            let display = if func.return_type.is_empty() {
                format!("{}({})", func.name, func.args)
            } else {
                format!("{}({}) -> {}", func.name, func.args, func.return_type)
            };
            out.push(Candidate {
                text,
                name: func.name.to_lowercase(),
                display,
                kind: CompletionKind::Function,
                context_rank: rank,
                path_rank,
            });
        }
    }

    fn push_keywords(&self, typed: &str, rank: u8, out: &mut Vec<Candidate>) {
        // Match the casing the user is typing in
        let lower = !typed.is_empty() && typed.chars().all(|c| !c.is_uppercase());
        for kw in SQL_KEYWORDS.iter() {
            let text = if lower {
                kw.to_lowercase()
            } else {
                kw.to_string()
            };
            out.push(Candidate {
                text,
                name: kw.to_lowercase(),
                display: kw.to_string(),
                kind: CompletionKind::Keyword,
                context_rank: rank,
                path_rank: 0,
            });
        }
    }

    /// Find a referenced relation, honoring an explicit schema or the search path
    fn find_relation(&self, r: &TableRef) -> Option<&Table> {
        match &r.schema {
            Some(schema) => self
                .tree
                .schema(schema)?
                .relations()
                .find(|t| t.name == r.table),
            None => {
                let mut schemas: Vec<&Schema> = self.tree.schemas.iter().collect();
                schemas.sort_by_key(|s| self.path_rank(&s.name));
                schemas
                    .into_iter()
                    .find_map(|s| s.relations().find(|t| t.name == r.table))
            }
        }
    }
}

fn push_columns(table: &Table, rank: u8, path_rank: usize, out: &mut Vec<Candidate>) {
    for col in &table.columns {
        out.push(Candidate {
            text: quote_ident(&col.name),
            name: col.name.to_lowercase(),
            display: format!("{} {}", col.name, col.type_name),
            kind: CompletionKind::Column,
            context_rank: rank,
            path_rank,
        });
    }
}

/// Double-quote identifiers that would not survive case folding unquoted
fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$');
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::{Column, Function};

    fn table(name: &str, cols: &[&str]) -> Table {
        Table {
            name: name.to_string(),
            columns: cols
                .iter()
                .map(|c| Column {
                    name: c.to_string(),
                    type_name: "text".to_string(),
                })
                .collect(),
        }
    }

    fn sample_tree() -> SchemaTree {
        SchemaTree {
            schemas: vec![
                Schema {
                    name: "app".to_string(),
                    tables: vec![table("users_archive", &["archived_at"])],
                    views: vec![],
                    functions: vec![],
                },
                Schema {
                    name: "public".to_string(),
                    tables: vec![
                        table("users", &["id", "username", "email"]),
                        table("orders", &["id", "user_id", "total"]),
                    ],
                    views: vec![table("user_totals", &["user_id", "sum"])],
                    functions: vec![Function {
                        name: "update_stats".to_string(),
                        args: "".to_string(),
                        return_type: "void".to_string(),
                    }],
                },
            ],
        }
    }

    fn texts(s: &[Suggestion]) -> Vec<&str> {
        s.iter().map(|s| s.text.as_str()).collect()
    }

    fn at_end(index: &CompletionIndex, text: &str) -> Vec<Suggestion> {
        index.complete(text, text.len())
    }

    #[test]
    fn test_placeholder_offers_keywords() {
        let index = CompletionIndex::placeholder();
        assert!(index.is_placeholder());
        let s = at_end(&index, "SEL");
        assert_eq!(s[0].text, "SELECT");
        assert_eq!(s[0].kind, CompletionKind::Keyword);
    }

    #[test]
    fn test_keyword_follows_typed_case() {
        let index = CompletionIndex::placeholder();
        assert_eq!(at_end(&index, "sel")[0].text, "select");
    }

    #[test]
    fn test_exact_match_excluded() {
        let index = CompletionIndex::placeholder();
        assert!(!texts(&at_end(&index, "SELECT")).contains(&"SELECT"));
    }

    #[test]
    fn test_relations_after_from() {
        let index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let s = at_end(&index, "SELECT * FROM us");
        assert_eq!(s[0].text, "user_totals");
        assert_eq!(s[1].text, "users");
        assert_eq!(s[0].kind, CompletionKind::View);
        // off-path relation is still offered, qualified, after on-path ones
        assert!(texts(&s).contains(&"app.users_archive"));
        let pos = texts(&s).iter().position(|t| *t == "app.users_archive").unwrap();
        assert!(pos > 1);
    }

    #[test]
    fn test_columns_of_referenced_table_first() {
        let index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let text = "SELECT  FROM orders";
        let s = index.complete(text, "SELECT ".len());
        let first_three: Vec<&str> = texts(&s).into_iter().take(3).collect();
        assert_eq!(first_three, vec!["id", "total", "user_id"]);
        assert_eq!(s[0].kind, CompletionKind::Column);
    }

    #[test]
    fn test_alias_qualified_columns() {
        let index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let text = "SELECT u. FROM users u";
        let s = index.complete(text, "SELECT u.".len());
        assert_eq!(texts(&s), vec!["email", "id", "username"]);
    }

    #[test]
    fn test_schema_qualified_relations() {
        let index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let s = at_end(&index, "SELECT * FROM app.");
        assert_eq!(texts(&s), vec!["users_archive"]);
    }

    #[test]
    fn test_function_display() {
        let index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let s = at_end(&index, "SELECT update_");
        let f = s.iter().find(|s| s.kind == CompletionKind::Function).unwrap();
        assert_eq!(f.text, "update_stats");
        assert_eq!(f.display, "update_stats() -> void");
    }

    #[test]
    fn test_search_path_changes_ranking_not_set() {
        let mut index = CompletionIndex::build(sample_tree(), vec!["public".into()]);
        let before = at_end(&index, "SELECT * FROM ");
        index.set_search_path(vec!["app".into(), "public".into()]);
        let after = at_end(&index, "SELECT * FROM ");

        let names = |s: &[Suggestion]| {
            let mut d: Vec<String> = s
                .iter()
                .filter(|s| matches!(s.kind, CompletionKind::Table | CompletionKind::View))
                .map(|s| s.display.clone())
                .collect();
            d.sort();
            d
        };
        assert_eq!(names(&before), names(&after));
        assert_eq!(before[0].text, "orders");
        assert_eq!(after[0].text, "users_archive");
        assert_eq!(index.schema_tree(), &sample_tree());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("users"), "users");
        assert_eq!(quote_ident("Users"), "\"Users\"");
        assert_eq!(quote_ident("order items"), "\"order items\"");
        assert_eq!(quote_ident("1st"), "\"1st\"");
    }

    #[test]
    fn test_suggestions_capped() {
        let index = CompletionIndex::placeholder();
        assert!(at_end(&index, "SELECT ").len() <= MAX_SUGGESTIONS);
    }
}
