use garnet_core::ast::{BlockArgument, Expression};
use garnet_core::Location;
use garnet_lexer::{Token, TokenKind};

/// The words that never name a variable or a method on their own.
pub const KEYWORDS: &[&str] = &[
    "alias", "and", "begin", "break", "case", "class", "def", "defined?", "do", "else", "elsif",
    "end", "ensure", "for", "if", "in", "module", "next", "not", "or", "redo", "rescue", "retry",
    "return", "super", "then", "undef", "unless", "until", "when", "while", "yield",
];

/// Whether a word is a reserved keyword.
pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// The kind of a bracket group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// `( ... )`
    Paren,
    /// `[ ... ]`
    Square,
    /// `{ ... }`
    Brace,
}

impl GroupKind {
    pub fn from_opening(text: &str) -> Option<GroupKind> {
        match text {
            "(" => Some(GroupKind::Paren),
            "[" => Some(GroupKind::Square),
            "{" => Some(GroupKind::Brace),
            _ => None,
        }
    }

    pub fn from_closing(text: &str) -> Option<GroupKind> {
        match text {
            ")" => Some(GroupKind::Paren),
            "]" => Some(GroupKind::Square),
            "}" => Some(GroupKind::Brace),
            _ => None,
        }
    }

    pub fn closing(self) -> &'static str {
        match self {
            GroupKind::Paren => ")",
            GroupKind::Square => "]",
            GroupKind::Brace => "}",
        }
    }
}

/// A matched bracket group, whose contents are not parsed yet.
#[derive(Debug, Clone)]
pub struct Group {
    pub kind: GroupKind,
    pub location: Location,
    pub whitespace_before: bool,
    pub children: Vec<Node>,
}

/// A matched keyword block (`if ... end`), whose contents are not parsed yet.
#[derive(Debug, Clone)]
pub struct KeywordBlock {
    pub keyword: String,
    pub location: Location,
    pub children: Vec<Node>,
}

/// The intermediate representation the parsing passes rewrite in place.
///
/// A statement starts as a list of tokens and temporaries, and is folded until one expression remains.
#[derive(Debug, Clone)]
pub enum Node {
    /// A token not consumed yet.
    Token(Token),
    /// A fully built expression.
    ///
    /// `bare` marks an expression that may still take arguments without parentheses (`puts`, `list.push`).
    Expr { expr: Expression, bare: bool },
    /// A bracket group temporary.
    Group(Group),
    /// A keyword block temporary.
    Block(KeywordBlock),
    /// A literal block (`{ |x| ... }` or `do |x| ... end`) waiting to be attached to a call.
    BlockArg {
        block: BlockArgument,
        brace: bool,
        location: Location,
    },
}

impl Node {
    pub fn expr(expr: Expression) -> Node {
        Node::Expr { expr, bare: false }
    }

    pub fn bare(expr: Expression) -> Node {
        Node::Expr { expr, bare: true }
    }

    pub fn location(&self) -> Location {
        match self {
            Node::Token(token) => token.location,
            Node::Expr { expr, .. } => expr.location,
            Node::Group(group) => group.location,
            Node::Block(block) => block.location,
            Node::BlockArg { location, .. } => *location,
        }
    }

    /// A short description, used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Node::Token(token) if token.is_end_of_statement() => String::from("end of statement"),
            Node::Token(token) => format!("`{}`", token.text),
            Node::Expr { .. } => String::from("expression"),
            Node::Group(group) => match group.kind {
                GroupKind::Paren => String::from("`(`"),
                GroupKind::Square => String::from("`[`"),
                GroupKind::Brace => String::from("`{`"),
            },
            Node::Block(block) => format!("`{}`", block.keyword),
            Node::BlockArg { .. } => String::from("block"),
        }
    }

    pub fn is_expr(&self) -> bool {
        matches!(self, Node::Expr { .. })
    }

    pub fn is_bare(&self) -> bool {
        matches!(self, Node::Expr { bare: true, .. })
    }

    pub fn as_expr(&self) -> Option<&Expression> {
        match self {
            Node::Expr { expr, .. } => Some(expr),
            _ => None,
        }
    }

    pub fn into_expr(self) -> Option<Expression> {
        match self {
            Node::Expr { expr, .. } => Some(expr),
            _ => None,
        }
    }

    pub fn as_token(&self) -> Option<&Token> {
        match self {
            Node::Token(token) => Some(token),
            _ => None,
        }
    }

    pub fn is_op(&self, text: &str) -> bool {
        matches!(self, Node::Token(token) if token.is_operator(text))
    }

    pub fn is_any_op(&self, ops: &[&str]) -> bool {
        matches!(self, Node::Token(token) if token.kind == TokenKind::Operator && ops.contains(&token.text.as_str()))
    }

    pub fn is_keyword(&self, text: &str) -> bool {
        matches!(self, Node::Token(token) if token.is_identifier(text))
    }

    pub fn is_end_of_statement(&self) -> bool {
        matches!(self, Node::Token(token) if token.is_end_of_statement())
    }

    pub fn is_group(&self, kind: GroupKind) -> bool {
        matches!(self, Node::Group(group) if group.kind == kind)
    }

    /// Whether this node was written with whitespace before it.
    pub fn whitespace_before(&self) -> bool {
        match self {
            Node::Token(token) => token.whitespace_before,
            Node::Group(group) => group.whitespace_before,
            _ => true,
        }
    }

    /// Whether this node completes an operand, so that an operator after it is binary.
    pub fn ends_operand(&self) -> bool {
        match self {
            Node::Token(token) => match token.kind {
                TokenKind::Operator | TokenKind::EndOfStatement => false,
                TokenKind::Identifier => !is_keyword(&token.text),
                _ => true,
            },
            Node::Expr { .. } | Node::Group(_) | Node::Block(_) | Node::BlockArg { .. } => true,
        }
    }
}
