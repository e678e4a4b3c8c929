//! Database schema introspection
//!
//! Structures for the metadata a completion index is built from.

/// Complete database schema tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaTree {
    /// All schemas in the database
    pub schemas: Vec<Schema>,
}

/// A database schema (namespace)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub name: String,
    pub tables: Vec<Table>,
    /// Views and materialized views
    pub views: Vec<Table>,
    pub functions: Vec<Function>,
}

/// A table or view
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

/// A table column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    /// `format_type()` rendering, e.g. `character varying(255)`
    pub type_name: String,
}

/// A function or procedure
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub args: String,
    pub return_type: String,
}

impl SchemaTree {
    /// Create a new empty schema tree
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    /// Number of tables and views across all schemas
    pub fn relation_count(&self) -> usize {
        self.schemas
            .iter()
            .map(|s| s.tables.len() + s.views.len())
            .sum()
    }
}

impl Schema {
    /// Tables followed by views
    pub fn relations(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter().chain(self.views.iter())
    }
}
