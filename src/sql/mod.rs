//! Lenient SQL lexing.
//!
//! This module groups the lexical building blocks used by the script splitter
//! and the clause locator. Nothing here validates SQL; the goal is to classify
//! enough of the input (literals, quoted identifiers, comments, brackets) that
//! higher layers never mistake a `;` inside a string for a statement end.
//!
//! Modules:
//! - `keyword`    : Keywords the splitter and clause locator reason about.
//! - `token_kind` : Classification of lexical atoms.
//! - `token`      : Token struct pairing a `TokenKind` with its text and span.
//! - `tokenizer`  : The `Lexer` cursor and the `tokenize` convenience.
//!
//! Design Principles:
//! 1. Accept incomplete / syntactically invalid SQL (robust for live editing).
//! 2. Preserve original text; tokens borrow from the input.
//! 3. Cover every input byte with exactly one token so offsets map back to
//!    the source.

pub mod keyword;
pub mod token;
pub mod token_kind;
pub mod tokenizer;

pub use keyword::Keyword;
pub use token::Token;
pub use token_kind::TokenKind;
pub use tokenizer::{Lexer, LexerOptions, tokenize};
