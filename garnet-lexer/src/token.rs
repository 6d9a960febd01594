use garnet_core::Location;

/// Represents the kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An identifier or keyword (`foo`, `@bar`, `$baz`, `Qux`, `empty?`, `if`).
    Identifier,
    /// An integer literal (`10`, `1_000`).
    Integer,
    /// A floating-point literal (`3.14`, `1e5`).
    Float,
    /// A string or symbol literal (`'foo'`, `"a #{b}"`, `:name`).
    String,
    /// An operator or punctuation (`+`, `<=>`, `(`, `,`, `.`).
    Operator,
    /// A statement boundary (a significant newline or a `;`).
    EndOfStatement,
}

/// Represents a token from the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token.
    pub kind: TokenKind,
    /// The literal text (for strings: the contents, escapes resolved unless formatted).
    pub text: String,
    /// Where the token starts.
    pub location: Location,
    /// Whether the token is preceded by whitespace (or starts a line).
    pub whitespace_before: bool,
    /// Whether the token is followed by whitespace (or ends a line).
    pub whitespace_after: bool,
    /// Whether a string token contains interpolated code (`#{...}`), kept unescaped.
    pub formatted: bool,
    /// Whether a string token is a symbol (`:name`, `:"name"`).
    pub symbol: bool,
}

impl Token {
    /// Construct a token with no whitespace or string flags set.
    pub fn new(kind: TokenKind, text: impl Into<String>, location: Location) -> Self {
        Self {
            kind,
            text: text.into(),
            location,
            whitespace_before: false,
            whitespace_after: false,
            formatted: false,
            symbol: false,
        }
    }

    /// Whether this token is the given operator.
    pub fn is_operator(&self, text: &str) -> bool {
        self.kind == TokenKind::Operator && self.text == text
    }

    /// Whether this token is the given identifier or keyword.
    pub fn is_identifier(&self, text: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == text
    }

    /// Whether this token is a statement boundary.
    pub fn is_end_of_statement(&self) -> bool {
        self.kind == TokenKind::EndOfStatement
    }

    /// Whether a newline after this token continues the current statement.
    ///
    /// Binary operators, commas, opening brackets, dots and scope resolutions all expect something after them.
    pub fn is_greedy(&self) -> bool {
        match self.kind {
            TokenKind::Operator => !matches!(self.text.as_str(), ")" | "]" | "}"),
            TokenKind::Identifier => matches!(self.text.as_str(), "and" | "or" | "not"),
            _ => false,
        }
    }
}
