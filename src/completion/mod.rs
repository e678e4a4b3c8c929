//! Schema-aware completion
//!
//! One [`CompletionIndex`] per connection target, shared by every buffer that
//! points at it. Indexes are built off the interactive path by the
//! [`CompletionRefresher`] and published through the [`CompleterRegistry`].

pub mod context;
pub mod index;
pub mod refresher;
pub mod registry;

pub use index::CompletionIndex;
pub use refresher::CompletionRefresher;
pub use registry::CompleterRegistry;

/// Kind of object a suggestion refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionKind {
    Table,
    View,
    Column,
    Function,
    Schema,
    Keyword,
}

impl CompletionKind {
    /// Short tag shown next to a suggestion
    pub fn tag(&self) -> &'static str {
        match self {
            CompletionKind::Table => "table",
            CompletionKind::View => "view",
            CompletionKind::Column => "column",
            CompletionKind::Function => "function",
            CompletionKind::Schema => "schema",
            CompletionKind::Keyword => "keyword",
        }
    }
}

/// A single completion candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    /// Text inserted in place of the partial word
    pub text: String,
    /// Label shown in the completion popup
    pub display: String,
    pub kind: CompletionKind,
}
