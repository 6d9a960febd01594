//!
//! The Garnet Lexical Analyser
//! ===========================
//!
//! This crate serves as the lexical analyser for Garnet.
//!

mod lexer;
mod token;

pub use crate::lexer::{unescape, Lexer};
pub use crate::token::{Token, TokenKind};
