pub mod lexer;
mod outline;

pub use lexer::{
    Assignment, Header, LineKind, LineToken, OBJECT_KEYWORDS, PROPERTY_KEYWORDS, Quote,
    Tokenizer, parse_header, tokenize,
};
pub use outline::{Outline, OutlineNode, parse_outline};

use crate::document::Document;

/// Tokenize a document and build its declaration tree.
pub fn outline(document: &Document) -> Outline {
    parse_outline(&tokenize(document))
}
