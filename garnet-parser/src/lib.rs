//!
//! This crate serves as the syntactical analyser (parser) for Garnet.
//!
//! It works with the tokens outputted by the lexical analyser, by first matching brackets and keyword blocks
//! into a tree and then folding each statement through a fixed sequence of rewriting passes.
//!

/// The keyword-block builders (`if`, `def`, `class`, ...).
mod blocks;
/// String interpolation splicing.
mod interpolation;
/// The intermediate node representation the passes rewrite.
mod node;
/// The per-statement rewriting passes.
mod statement;
/// Bracket and keyword-block matching.
mod structure;

use garnet_core::ast::{Expression, ExpressionKind, Program};
use garnet_core::{Location, SyntaxError};
use garnet_lexer::{Lexer, Token};

/// Parses the input of an entire source file into a program.
pub fn parse(source: &str) -> Result<Program, SyntaxError> {
    let tokens = Lexer::new(source).tokenize()?;
    parse_tokens(tokens)
}

/// Parses an already lexed token stream into a program.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, SyntaxError> {
    let nodes = structure::structure(tokens)?;
    let body = statement::parse_body(nodes, Location::new(1, 1))?;
    Ok(Program { body })
}

/// Parses source code embedded at a given location (used for string interpolation).
pub(crate) fn parse_embedded(source: &str, origin: Location) -> Result<Expression, SyntaxError> {
    let tokens = Lexer::new(source).with_origin(origin).tokenize()?;
    let nodes = structure::structure(tokens)?;
    let mut statements = statement::parse_statements(nodes)?;
    match statements.len() {
        0 => Ok(Expression::nil(origin)),
        1 => Ok(statements.remove(0)),
        _ => Ok(Expression::new(origin, ExpressionKind::Sequence(statements))),
    }
}
