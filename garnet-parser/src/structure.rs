use garnet_core::{Location, SyntaxError};
use garnet_lexer::{Token, TokenKind};

use crate::node::{Group, GroupKind, KeywordBlock, Node};

/// The keywords that open a block closed by `end`.
const BLOCK_OPENERS: &[&str] = &[
    "begin", "if", "unless", "while", "until", "for", "case", "def", "class", "module", "do",
];

/// The openers that turn into a trailing modifier after an expression.
const MODIFIERS: &[&str] = &["if", "unless", "while", "until"];

/// The keywords after which a modifier keyword still opens a block.
const STATEMENT_STARTERS: &[&str] = &["and", "or", "not", "else", "when", "in", "then", "do"];

enum FrameKind {
    Root,
    Group {
        kind: GroupKind,
        whitespace_before: bool,
    },
    Keyword {
        keyword: String,
        /// Whether a loop header is still being read (a `do` there is a separator, not a block).
        header_open: bool,
    },
}

struct Frame {
    kind: FrameKind,
    location: Location,
    children: Vec<Node>,
}

impl Frame {
    fn push(&mut self, node: Node) {
        if node.is_end_of_statement() {
            match self.children.last() {
                None => return,
                Some(last) if last.is_end_of_statement() => return,
                _ => {}
            }
            if let FrameKind::Keyword { header_open, .. } = &mut self.kind {
                *header_open = false;
            }
        }
        self.children.push(node);
    }

    /// Whether a modifier-capable keyword at this point follows an expression of the same statement.
    fn follows_expression(&self) -> bool {
        match self.children.last() {
            None => false,
            Some(Node::Token(token)) => match token.kind {
                TokenKind::EndOfStatement | TokenKind::Operator => false,
                TokenKind::Identifier => !STATEMENT_STARTERS.contains(&token.text.as_str()),
                _ => true,
            },
            Some(_) => true,
        }
    }
}

/// Match brackets and keyword blocks, producing the top-level node list.
pub fn structure(tokens: Vec<Token>) -> Result<Vec<Node>, SyntaxError> {
    let mut stack = vec![Frame {
        kind: FrameKind::Root,
        location: Location::new(1, 1),
        children: Vec::new(),
    }];

    let mut previous: Option<Token> = None;
    let mut tokens = tokens.into_iter().peekable();
    while let Some(mut token) = tokens.next() {
        let after_dot = previous.as_ref().map_or(false, |prev| {
            prev.is_operator(".") || prev.is_operator("&.") || prev.is_operator("::") || prev.is_identifier("def")
        });
        let before_key_colon = tokens
            .peek()
            .map_or(false, |next| next.is_operator(":") && !next.whitespace_before);
        previous = Some(token.clone());

        match token.kind {
            TokenKind::Operator => {
                if let Some(kind) = GroupKind::from_opening(&token.text) {
                    stack.push(Frame {
                        kind: FrameKind::Group {
                            kind,
                            whitespace_before: token.whitespace_before,
                        },
                        location: token.location,
                        children: Vec::new(),
                    });
                    continue;
                }
                if let Some(kind) = GroupKind::from_closing(&token.text) {
                    let frame = pop_frame(&mut stack, &token)?;
                    match frame.kind {
                        FrameKind::Group {
                            kind: opened,
                            whitespace_before,
                        } if opened == kind => {
                            let group = Group {
                                kind,
                                location: frame.location,
                                whitespace_before,
                                children: frame.children,
                            };
                            current(&mut stack).push(Node::Group(group));
                        }
                        _ => {
                            return Err(SyntaxError::new(
                                token.location,
                                format!("unexpected `{}`", token.text),
                            ))
                        }
                    }
                    continue;
                }
                current(&mut stack).push(Node::Token(token));
            }
            TokenKind::Identifier if !after_dot && !before_key_colon => {
                let word = token.text.clone();
                if word == "end" {
                    let frame = pop_frame(&mut stack, &token)?;
                    match frame.kind {
                        FrameKind::Keyword { keyword, .. } => {
                            let block = KeywordBlock {
                                keyword,
                                location: frame.location,
                                children: frame.children,
                            };
                            current(&mut stack).push(Node::Block(block));
                        }
                        _ => return Err(SyntaxError::new(token.location, "unexpected `end`")),
                    }
                    continue;
                }

                if word == "then" {
                    token.kind = TokenKind::EndOfStatement;
                    current(&mut stack).push(Node::Token(token));
                    continue;
                }

                let frame = current(&mut stack);
                if word == "do" {
                    if let FrameKind::Keyword {
                        header_open: true, ..
                    } = frame.kind
                    {
                        token.kind = TokenKind::EndOfStatement;
                        frame.push(Node::Token(token));
                        continue;
                    }
                }

                let is_modifier = MODIFIERS.contains(&word.as_str()) && frame.follows_expression();
                if BLOCK_OPENERS.contains(&word.as_str()) && !is_modifier {
                    let header_open = matches!(word.as_str(), "while" | "until" | "for");
                    stack.push(Frame {
                        kind: FrameKind::Keyword {
                            keyword: word,
                            header_open,
                        },
                        location: token.location,
                        children: Vec::new(),
                    });
                    continue;
                }
                frame.push(Node::Token(token));
            }
            _ => current(&mut stack).push(Node::Token(token)),
        }
    }

    if stack.len() > 1 {
        let frame = &stack[stack.len() - 1];
        let message = match &frame.kind {
            FrameKind::Keyword { keyword, .. } => format!("unterminated `{}` (missing `end`)", keyword),
            FrameKind::Group { kind, .. } => format!("unclosed bracket (missing `{}`)", kind.closing()),
            FrameKind::Root => String::from("unexpected end of input"),
        };
        return Err(SyntaxError::new(frame.location, message));
    }

    Ok(stack.pop().map(|frame| frame.children).unwrap_or_default())
}

fn current(stack: &mut Vec<Frame>) -> &mut Frame {
    let last = stack.len() - 1;
    &mut stack[last]
}

fn pop_frame(stack: &mut Vec<Frame>, token: &Token) -> Result<Frame, SyntaxError> {
    if stack.len() <= 1 {
        return Err(SyntaxError::new(
            token.location,
            format!("unexpected `{}`", token.text),
        ));
    }
    stack
        .pop()
        .ok_or_else(|| SyntaxError::new(token.location, "unexpected end of input"))
}
