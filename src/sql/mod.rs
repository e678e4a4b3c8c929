//! SQL text services
//!
//! Statement splitting, statement classification and result formatting.
//! All three are pure functions over text.

pub mod classifier;
pub mod formatter;
pub mod splitter;

pub use classifier::{PostgresClassifier, StatementClassifier};
pub use formatter::format_result;
pub use splitter::split_statements;
