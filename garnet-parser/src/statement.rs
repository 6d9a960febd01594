use std::mem;
use std::sync::Arc;

use garnet_core::ast::{
    AssignTarget, Begin, BlockArgument, BlockDef, ControlKind, Expression, ExpressionKind,
    LogicOperator, MethodCall, RescueClause,
};
use garnet_core::{Location, SyntaxError};
use garnet_lexer::{Token, TokenKind};

use crate::blocks;
use crate::interpolation;
use crate::node::{is_keyword, GroupKind, Node};

const MODIFIER_KEYWORDS: &[&str] = &["if", "unless", "while", "until", "rescue"];

const COMPOUND_ASSIGNMENTS: &[&str] = &[
    "+=", "-=", "*=", "/=", "%=", "**=", "||=", "&&=", "|=", "&=", "^=", "<<=", ">>=",
];

/// The left-associative binary operator tiers, tightest first (`**` is handled separately).
const BINARY_TIERS: &[&[&str]] = &[
    &["*", "/", "%"],
    &["+", "-"],
    &["<<", ">>"],
    &["&"],
    &["|", "^"],
    &["<", "<=", ">", ">="],
    &["<=>", "==", "===", "!=", "=~"],
];

const CONTROL_KEYWORDS: &[&str] = &["return", "break", "next", "redo", "retry", "yield", "super"];

/// Parse a body (a list of statements) into a sequence expression.
pub fn parse_body(nodes: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let statements = parse_statements(nodes)?;
    let location = statements.first().map_or(location, |first| first.location);
    Ok(Expression::new(location, ExpressionKind::Sequence(statements)))
}

/// Split a node list on statement boundaries.
pub fn split_statements(nodes: Vec<Node>) -> Vec<Vec<Node>> {
    let mut statements = Vec::new();
    let mut current = Vec::new();
    for node in nodes {
        if node.is_end_of_statement() {
            if !current.is_empty() {
                statements.push(mem::take(&mut current));
            }
        } else {
            current.push(node);
        }
    }
    if !current.is_empty() {
        statements.push(current);
    }
    statements
}

/// Parse every statement of a node list.
pub fn parse_statements(nodes: Vec<Node>) -> Result<Vec<Expression>, SyntaxError> {
    split_statements(nodes)
        .into_iter()
        .map(parse_statement)
        .collect()
}

/// Parse a comma-separated list (arguments, array items, hash entries, patterns).
pub fn parse_list(nodes: Vec<Node>) -> Result<Vec<Expression>, SyntaxError> {
    let nodes: Vec<Node> = nodes
        .into_iter()
        .filter(|node| !node.is_end_of_statement())
        .collect();
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let mut current = Vec::new();
    for node in nodes {
        if node.is_op(",") {
            if current.is_empty() {
                return Err(SyntaxError::new(node.location(), "unexpected `,`"));
            }
            items.push(parse_statement(mem::take(&mut current))?);
        } else {
            current.push(node);
        }
    }
    // A trailing comma within brackets is allowed.
    if !current.is_empty() {
        items.push(parse_statement(current)?);
    }
    Ok(items)
}

/// Fold a single statement into one expression.
pub fn parse_statement(nodes: Vec<Node>) -> Result<Expression, SyntaxError> {
    let mut nodes = nodes;
    if let Some(alias) = alias(&nodes)? {
        return Ok(alias);
    }

    classify(&mut nodes)?;
    nested_temporaries(&mut nodes)?;
    interpolate(&mut nodes)?;

    if let Some(expr) = split_modifier(&mut nodes)? {
        return Ok(expr);
    }
    if let Some(expr) = split_and_or(&mut nodes)? {
        return Ok(expr);
    }
    if nodes.first().map_or(false, |node| node.is_keyword("not")) {
        let not = nodes.remove(0);
        let operand = parse_operand(nodes, &not)?;
        return Ok(Expression::new(not.location(), ExpressionKind::Not(Box::new(operand))));
    }

    disambiguate_braces(&mut nodes)?;
    calls_with_parens(&mut nodes)?;
    attach_blocks(&mut nodes, true)?;
    operand_keywords(&mut nodes);
    postfix(&mut nodes)?;

    if let Some(expr) = split_assignment(&mut nodes)? {
        return Ok(expr);
    }

    unary(&mut nodes)?;

    if let Some(expr) = split_range(&mut nodes)? {
        return Ok(expr);
    }

    prefix_keyword(&mut nodes, "defined?", |operand| ExpressionKind::Defined(Box::new(operand)));
    prefix_operator(&mut nodes, "!", |operand| ExpressionKind::Not(Box::new(operand)));

    exponents(&mut nodes);
    for tier in BINARY_TIERS {
        binary(&mut nodes, tier);
    }
    logic(&mut nodes, "&&", LogicOperator::And);
    logic(&mut nodes, "||", LogicOperator::Or);

    ternary(&mut nodes)?;
    key_values(&mut nodes);
    calls_without_parens(&mut nodes)?;
    attach_blocks(&mut nodes, false)?;
    control(&mut nodes)?;
    prefix_keyword(&mut nodes, "not", |operand| ExpressionKind::Not(Box::new(operand)));

    finish(nodes)
}

/// Parse one side of a split statement, failing when it is empty.
fn parse_operand(nodes: Vec<Node>, at: &Node) -> Result<Expression, SyntaxError> {
    if nodes.is_empty() {
        return Err(SyntaxError::new(
            at.location(),
            format!("expected an expression after {}", at.describe()),
        ));
    }
    parse_statement(nodes)
}

fn finish(mut nodes: Vec<Node>) -> Result<Expression, SyntaxError> {
    if nodes.len() == 1 && nodes[0].is_expr() {
        if let Some(expr) = nodes.pop().and_then(Node::into_expr) {
            return Ok(expr);
        }
    }
    let offending = nodes
        .iter()
        .find(|node| !node.is_expr())
        .or_else(|| nodes.get(1));
    match offending {
        Some(node) => Err(SyntaxError::new(
            node.location(),
            format!("unexpected {}", node.describe()),
        )),
        None => Err(SyntaxError::new(Location::default(), "empty statement")),
    }
}

fn method_call(
    location: Location,
    receiver: Option<Expression>,
    name: impl Into<String>,
    arguments: Vec<Expression>,
) -> Expression {
    Expression::new(
        location,
        ExpressionKind::MethodCall(MethodCall {
            receiver: receiver.map(Box::new),
            name: name.into(),
            arguments,
            block: None,
            safe_navigation: false,
        }),
    )
}

fn token_of(node: &Node) -> Option<&Token> {
    node.as_token()
}

fn placeholder() -> Node {
    Node::Token(Token::new(TokenKind::EndOfStatement, "", Location::default()))
}

/// `alias new_name old_name`
fn alias(nodes: &[Node]) -> Result<Option<Expression>, SyntaxError> {
    let first = match nodes.first() {
        Some(node) if node.is_keyword("alias") => node,
        _ => return Ok(None),
    };
    let name_of = |node: Option<&Node>| -> Option<String> {
        match node.and_then(token_of) {
            Some(token) if matches!(token.kind, TokenKind::Identifier | TokenKind::Operator) => {
                Some(token.text.clone())
            }
            Some(token) if token.kind == TokenKind::String && token.symbol => Some(token.text.clone()),
            _ => None,
        }
    };
    match (name_of(nodes.get(1)), name_of(nodes.get(2)), nodes.len()) {
        (Some(new_name), Some(old_name), 3) => Ok(Some(Expression::new(
            first.location(),
            ExpressionKind::Alias { new_name, old_name },
        ))),
        _ => Err(SyntaxError::new(
            first.location(),
            "`alias` expects two method names",
        )),
    }
}

/// Whether an operator at `idx` is a prefix operator, judging from its surroundings.
fn is_unary_position(nodes: &[Node], idx: usize) -> bool {
    let token = match nodes.get(idx).and_then(token_of) {
        Some(token) => token,
        None => return false,
    };
    match idx.checked_sub(1).and_then(|prev| nodes.get(prev)) {
        None => true,
        Some(prev) if !prev.ends_operand() => true,
        Some(prev) => prev.is_bare() && token.whitespace_before && !token.whitespace_after,
    }
}

/// Turn literal and name tokens into expressions.
fn classify(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut idx = 0;
    while idx < nodes.len() {
        let after_dot = idx > 0 && nodes[idx - 1].is_any_op(&[".", "&."]);
        let after_scope = idx > 0 && nodes[idx - 1].is_op("::");
        let before_key_colon = nodes
            .get(idx + 1)
            .and_then(token_of)
            .map_or(false, |next| next.is_operator(":") && !next.whitespace_before);

        let replacement = match &nodes[idx] {
            Node::Token(token) => match token.kind {
                TokenKind::Integer => Some(Node::expr(integer(token, false))),
                TokenKind::Float => Some(Node::expr(float(token, false)?)),
                TokenKind::String if token.formatted => None,
                TokenKind::String if token.symbol => Some(Node::expr(Expression::new(
                    token.location,
                    ExpressionKind::Symbol(token.text.clone()),
                ))),
                TokenKind::String => Some(Node::expr(Expression::new(
                    token.location,
                    ExpressionKind::String(token.text.clone()),
                ))),
                TokenKind::Identifier => classify_identifier(token, after_dot, after_scope, before_key_colon),
                TokenKind::Operator if token.text == "-" || token.text == "+" => {
                    negative_literal(nodes, idx)?
                }
                _ => None,
            },
            _ => None,
        };

        if let Some(replacement) = replacement {
            let folds_sign = matches!(&nodes[idx], Node::Token(token) if token.kind == TokenKind::Operator);
            nodes[idx] = replacement;
            if folds_sign {
                nodes.remove(idx + 1);
            }
        }
        idx += 1;
    }
    Ok(())
}

fn classify_identifier(token: &Token, after_dot: bool, after_scope: bool, before_key_colon: bool) -> Option<Node> {
    let text = token.text.as_str();
    let location = token.location;
    let starts_upper = text.chars().next().map_or(false, char::is_uppercase);

    if after_dot || (after_scope && !starts_upper) {
        return Some(Node::bare(Expression::new(
            location,
            ExpressionKind::Identifier(token.text.clone()),
        )));
    }
    if before_key_colon && !text.starts_with('@') && !text.starts_with('$') {
        return Some(Node::bare(Expression::new(
            location,
            ExpressionKind::Identifier(token.text.clone()),
        )));
    }

    let kind = match text {
        "nil" => ExpressionKind::Nil,
        "true" => ExpressionKind::True,
        "false" => ExpressionKind::False,
        "self" => ExpressionKind::SelfRef,
        _ if is_keyword(text) => return None,
        _ if text.starts_with("@@") => ExpressionKind::ClassVariable(token.text.clone()),
        _ if text.starts_with('@') => ExpressionKind::InstanceVariable(token.text.clone()),
        _ if text.starts_with('$') => ExpressionKind::Global(token.text.clone()),
        _ if starts_upper => ExpressionKind::Constant(token.text.clone()),
        _ => {
            return Some(Node::bare(Expression::new(
                location,
                ExpressionKind::Identifier(token.text.clone()),
            )))
        }
    };
    Some(Node::expr(Expression::new(location, kind)))
}

fn integer(token: &Token, negative: bool) -> Expression {
    let text = if negative {
        format!("-{}", token.text)
    } else {
        token.text.clone()
    };
    let kind = match text.parse::<i64>() {
        Ok(value) => ExpressionKind::Integer(value),
        Err(_) => ExpressionKind::BigInteger(text),
    };
    Expression::new(token.location, kind)
}

fn float(token: &Token, negative: bool) -> Result<Expression, SyntaxError> {
    let value = token
        .text
        .parse::<f64>()
        .map_err(|_| SyntaxError::new(token.location, format!("invalid float literal `{}`", token.text)))?;
    let value = if negative { -value } else { value };
    Ok(Expression::new(token.location, ExpressionKind::Float(value)))
}

/// Fold a sign directly followed by a number literal (`-1`, `[+2.5]`) when the sign is in prefix position.
fn negative_literal(nodes: &[Node], idx: usize) -> Result<Option<Node>, SyntaxError> {
    let sign = match token_of(&nodes[idx]) {
        Some(sign) => sign,
        None => return Ok(None),
    };
    let number = match nodes.get(idx + 1).and_then(token_of) {
        Some(number) if !number.whitespace_before => number,
        _ => return Ok(None),
    };
    if !is_unary_position(nodes, idx) {
        return Ok(None);
    }
    let negative = sign.text == "-";
    let mut expr = match number.kind {
        TokenKind::Integer => integer(number, negative),
        TokenKind::Float => float(number, negative)?,
        _ => return Ok(None),
    };
    expr.location = sign.location;
    Ok(Some(Node::expr(expr)))
}

/// Whether a node can be called with a directly adjacent argument list.
fn is_callee(node: &Node) -> bool {
    match node {
        Node::Expr { expr, .. } => matches!(
            expr.kind,
            ExpressionKind::Identifier(_) | ExpressionKind::Constant(_)
        ),
        Node::Token(token) => {
            token.is_identifier("super") || token.is_identifier("yield") || token.is_identifier("defined?")
        }
        _ => false,
    }
}

/// Build keyword blocks, and parse bracket groups whose meaning no longer depends on context.
fn nested_temporaries(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    for idx in 0..nodes.len() {
        let prev = idx.checked_sub(1).map(|prev| &nodes[prev]);
        let build = match &nodes[idx] {
            Node::Block(_) => true,
            // Argument lists and lambda parameters are parsed by the passes that consume them.
            Node::Group(group) if group.kind == GroupKind::Paren => {
                let after_arrow = prev.map_or(false, |prev| prev.is_op("->"));
                let call = !group.whitespace_before && prev.map_or(false, is_callee);
                // `a, (b, c) = ...` leaves the target group to the assignment pass.
                let target_group = group.children.iter().any(|child| child.is_op(","))
                    && nodes[idx + 1..].iter().any(|node| node.is_op("="));
                !after_arrow && !call && !target_group
            }
            Node::Group(group) if group.kind == GroupKind::Square => {
                group.whitespace_before || !prev.map_or(false, Node::ends_operand)
            }
            _ => false,
        };
        if !build {
            continue;
        }

        let node = mem::replace(&mut nodes[idx], placeholder());
        nodes[idx] = match node {
            Node::Block(block) => blocks::build(block)?,
            Node::Group(group) if group.kind == GroupKind::Paren => {
                let location = group.location;
                let mut statements = parse_statements(group.children)?;
                let expr = match statements.len() {
                    0 => Expression::nil(location),
                    1 => statements.remove(0),
                    _ => Expression::new(location, ExpressionKind::Sequence(statements)),
                };
                Node::expr(expr)
            }
            Node::Group(group) => {
                let items = parse_list(group.children)?;
                Node::expr(Expression::new(group.location, ExpressionKind::Array(items)))
            }
            other => other,
        };
    }
    Ok(())
}

/// Splice formatted strings into text and code parts.
fn interpolate(nodes: &mut [Node]) -> Result<(), SyntaxError> {
    for node in nodes.iter_mut() {
        let spliced = match node {
            Node::Token(token) if token.kind == TokenKind::String && token.formatted => {
                interpolation::splice(token)?
            }
            _ => continue,
        };
        *node = Node::expr(spliced);
    }
    Ok(())
}

fn keyword_at(nodes: &[Node], keywords: &[&str]) -> Option<usize> {
    nodes.iter().rposition(|node| {
        token_of(node).map_or(false, |token| {
            token.kind == TokenKind::Identifier && keywords.contains(&token.text.as_str())
        })
    })
}

/// Split on the last trailing modifier (`body if condition`).
fn split_modifier(nodes: &mut Vec<Node>) -> Result<Option<Expression>, SyntaxError> {
    let idx = match keyword_at(nodes, MODIFIER_KEYWORDS) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let right = nodes.split_off(idx + 1);
    let modifier = nodes.pop().ok_or_else(|| SyntaxError::new(Location::default(), "missing modifier"))?;
    let left = mem::take(nodes);
    if left.is_empty() {
        return Err(SyntaxError::new(
            modifier.location(),
            format!("unexpected {}", modifier.describe()),
        ));
    }

    let body = parse_statement(left)?;
    let condition = parse_operand(right, &modifier)?;
    let location = body.location;
    let keyword = token_of(&modifier).map(|token| token.text.clone()).unwrap_or_default();

    let kind = match keyword.as_str() {
        "if" => ExpressionKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(body),
            else_branch: None,
        },
        "unless" => ExpressionKind::If {
            condition: Box::new(Expression::new(
                condition.location,
                ExpressionKind::Not(Box::new(condition)),
            )),
            then_branch: Box::new(body),
            else_branch: None,
        },
        "while" | "until" => {
            let do_while = matches!(body.kind, ExpressionKind::Begin(_));
            ExpressionKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
                until: keyword == "until",
                do_while,
            }
        }
        _ => {
            // `x = risky rescue fallback` protects the assigned value only.
            if let ExpressionKind::Assignment { target, value } = body.kind {
                let value_location = value.location;
                let protected = rescue_modifier(*value, condition);
                return Ok(Some(Expression::new(
                    location,
                    ExpressionKind::Assignment {
                        target,
                        value: Box::new(Expression::new(value_location, protected)),
                    },
                )));
            }
            rescue_modifier(body, condition)
        }
    };
    Ok(Some(Expression::new(location, kind)))
}

fn rescue_modifier(body: Expression, fallback: Expression) -> ExpressionKind {
    ExpressionKind::Begin(Box::new(Begin {
        body,
        rescues: vec![RescueClause {
            classes: Vec::new(),
            variable: None,
            body: fallback,
        }],
        else_branch: None,
        ensure_branch: None,
    }))
}

/// Split on the last low-precedence `and`/`or`.
fn split_and_or(nodes: &mut Vec<Node>) -> Result<Option<Expression>, SyntaxError> {
    let idx = match keyword_at(nodes, &["and", "or"]) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let right = nodes.split_off(idx + 1);
    let keyword = nodes.pop().ok_or_else(|| SyntaxError::new(Location::default(), "missing operator"))?;
    let left = mem::take(nodes);
    let lhs = parse_operand(left, &keyword)?;
    let rhs = parse_operand(right, &keyword)?;
    let operator = if keyword.is_keyword("and") {
        LogicOperator::And
    } else {
        LogicOperator::Or
    };
    Ok(Some(Expression::new(
        lhs.location,
        ExpressionKind::Logic {
            operator,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
    )))
}

/// A `{` directly after something callable is a block, anywhere else it is a hash literal.
fn disambiguate_braces(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    for idx in 0..nodes.len() {
        if !nodes[idx].is_group(GroupKind::Brace) {
            continue;
        }
        let is_block = match idx.checked_sub(1).map(|prev| &nodes[prev]) {
            Some(Node::Expr { expr, .. }) => matches!(expr.kind, ExpressionKind::Identifier(_)),
            Some(Node::Token(token)) => {
                token.is_operator("->") || token.is_identifier("super")
            }
            Some(Node::Group(group)) if group.kind == GroupKind::Paren => {
                let before = idx.checked_sub(2).map(|before| &nodes[before]);
                before.map_or(false, |before| {
                    before.is_op("->") || (!group.whitespace_before && is_callee(before))
                })
            }
            _ => false,
        };

        let node = mem::replace(&mut nodes[idx], placeholder());
        if let Node::Group(group) = node {
            nodes[idx] = if is_block {
                Node::BlockArg {
                    block: blocks::build_brace_block(group.children, group.location)?,
                    brace: true,
                    location: group.location,
                }
            } else {
                Node::expr(hash_literal(group.children, group.location)?)
            };
        }
    }
    Ok(())
}

fn hash_literal(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let entries = parse_list(children)?;
    for entry in &entries {
        if !matches!(
            entry.kind,
            ExpressionKind::KeyValue { .. } | ExpressionKind::DoubleSplat(_)
        ) {
            return Err(SyntaxError::new(
                entry.location,
                "expected a `key => value` pair in hash literal",
            ));
        }
    }
    Ok(Expression::new(location, ExpressionKind::Hash(entries)))
}

/// `name(args)`, `super(args)`, `yield(args)` and `defined?(expr)`.
fn calls_with_parens(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut idx = 1;
    while idx < nodes.len() {
        let is_call = match &nodes[idx] {
            Node::Group(group) => {
                group.kind == GroupKind::Paren && !group.whitespace_before && is_callee(&nodes[idx - 1])
            }
            _ => false,
        };
        if !is_call {
            idx += 1;
            continue;
        }

        let group = match nodes.remove(idx) {
            Node::Group(group) => group,
            _ => continue,
        };
        let callee = mem::replace(&mut nodes[idx - 1], placeholder());
        let location = callee.location();
        let arguments = parse_list(group.children)?;

        let expr = match callee {
            Node::Expr { expr, .. } => match expr.kind {
                ExpressionKind::Identifier(name) | ExpressionKind::Constant(name) => {
                    method_call(location, None, name, arguments)
                }
                _ => return Err(SyntaxError::new(location, "unexpected `(`")),
            },
            Node::Token(token) if token.is_identifier("super") => Expression::new(
                location,
                ExpressionKind::Super {
                    arguments: Some(arguments),
                    block: None,
                },
            ),
            Node::Token(token) if token.is_identifier("yield") => {
                Expression::new(location, ExpressionKind::Yield(arguments))
            }
            Node::Token(_) => {
                let mut arguments = arguments;
                if arguments.len() != 1 {
                    return Err(SyntaxError::new(location, "`defined?` expects one expression"));
                }
                Expression::new(location, ExpressionKind::Defined(Box::new(arguments.remove(0))))
            }
            _ => return Err(SyntaxError::new(location, "unexpected `(`")),
        };
        nodes[idx - 1] = Node::expr(expr);
    }
    Ok(())
}

/// Attach literal blocks to the call before them: brace blocks first (`high`), `do` blocks last.
fn attach_blocks(nodes: &mut Vec<Node>, high: bool) -> Result<(), SyntaxError> {
    let mut idx = 0;
    while idx < nodes.len() {
        let is_candidate = match &nodes[idx] {
            Node::BlockArg { brace, .. } => *brace == high || !high,
            _ => false,
        };
        if !is_candidate {
            idx += 1;
            continue;
        }
        let (block, location) = match nodes.remove(idx) {
            Node::BlockArg { block, location, .. } => (block, location),
            _ => continue,
        };
        if idx == 0 {
            return Err(SyntaxError::new(location, "unexpected block"));
        }

        // `->(params) { body }` and `-> { body }`
        if nodes[idx - 1].is_op("->") {
            let arrow = nodes[idx - 1].location();
            nodes[idx - 1] = Node::expr(Expression::new(arrow, ExpressionKind::Lambda(block)));
            continue;
        }
        let is_lambda_with_params = idx >= 2
            && nodes[idx - 2].is_op("->")
            && nodes[idx - 1].is_group(GroupKind::Paren);
        if is_lambda_with_params {
            let params = match nodes.remove(idx - 1) {
                Node::Group(group) => blocks::parse_parameters(group.children)?,
                _ => Vec::new(),
            };
            let arrow = nodes[idx - 2].location();
            let block = Arc::new(BlockDef {
                parameters: params,
                body: block.body.clone(),
            });
            nodes[idx - 2] = Node::expr(Expression::new(arrow, ExpressionKind::Lambda(block)));
            idx -= 1;
            continue;
        }

        let target = mem::replace(&mut nodes[idx - 1], placeholder());
        nodes[idx - 1] = Node::expr(with_block(target, block, location)?);
    }
    Ok(())
}

fn with_block(target: Node, block: BlockArgument, location: Location) -> Result<Expression, SyntaxError> {
    match target {
        Node::Expr { mut expr, .. } => {
            match &mut expr.kind {
                ExpressionKind::MethodCall(call) if call.block.is_none() => {
                    call.block = Some(block);
                    return Ok(expr);
                }
                ExpressionKind::Super { block: slot, .. } if slot.is_none() => {
                    *slot = Some(block);
                    return Ok(expr);
                }
                ExpressionKind::Identifier(name) => {
                    let mut call = method_call(expr.location, None, name.clone(), Vec::new());
                    if let ExpressionKind::MethodCall(inner) = &mut call.kind {
                        inner.block = Some(block);
                    }
                    return Ok(call);
                }
                _ => {}
            }
            Err(SyntaxError::new(location, "unexpected block"))
        }
        Node::Token(token) if token.is_identifier("super") => Ok(Expression::new(
            token.location,
            ExpressionKind::Super {
                arguments: None,
                block: Some(block),
            },
        )),
        _ => Err(SyntaxError::new(location, "unexpected block")),
    }
}

/// Argument-less `yield` and `super` followed by a binary operator or a dot (`yield + 1`,
/// `super.to_s`) become operands. A spaced prefix sign (`yield -x`) still starts an argument.
fn operand_keywords(nodes: &mut Vec<Node>) {
    for idx in 0..nodes.len() {
        let keyword = match token_of(&nodes[idx]) {
            Some(token) if token.is_identifier("yield") || token.is_identifier("super") => token.text.clone(),
            _ => continue,
        };
        let next = match nodes.get(idx + 1).and_then(token_of) {
            Some(next) if next.kind == TokenKind::Operator => next,
            _ => continue,
        };
        let prefix = next.is_operator("!")
            || next.is_operator("~")
            || (["-", "+", "*", "**", "&", "::"].contains(&next.text.as_str())
                && next.whitespace_before
                && !next.whitespace_after);
        if prefix {
            continue;
        }
        let location = nodes[idx].location();
        let kind = if keyword == "yield" {
            ExpressionKind::Yield(Vec::new())
        } else {
            ExpressionKind::Super {
                arguments: None,
                block: None,
            }
        };
        nodes[idx] = Node::expr(Expression::new(location, kind));
    }
}

/// Dotted calls (`a.b`, `a&.b`), scope resolutions (`A::B`) and indexers (`a[0]`).
fn postfix(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut output: Vec<Node> = Vec::with_capacity(nodes.len());
    let mut input = mem::take(nodes).into_iter().peekable();

    while let Some(node) = input.next() {
        let has_receiver = output.last().map_or(false, Node::is_expr);
        match node {
            Node::Token(token) if (token.is_operator(".") || token.is_operator("&.")) && has_receiver => {
                let receiver = output.pop().and_then(Node::into_expr);
                let safe_navigation = token.text == "&.";
                let name = input.next();
                output.push(dotted_call(receiver, name, safe_navigation, &token)?);
            }
            Node::Token(token) if token.is_operator("::") => {
                let scoped = has_receiver && !(token.whitespace_before && !token.whitespace_after);
                let scope = if scoped {
                    output.pop().and_then(Node::into_expr)
                } else {
                    None
                };
                match input.next() {
                    Some(Node::Expr { expr, .. }) => match expr.kind {
                        ExpressionKind::Constant(name) => output.push(Node::expr(Expression::new(
                            scope.as_ref().map_or(token.location, |scope| scope.location),
                            ExpressionKind::ConstantPath {
                                scope: scope.map(Box::new),
                                name,
                            },
                        ))),
                        _ if scope.is_some() => {
                            let name = Some(Node::bare(expr));
                            output.push(dotted_call(scope, name, false, &token)?);
                        }
                        _ => return Err(SyntaxError::new(token.location, "expected a constant after `::`")),
                    },
                    _ => return Err(SyntaxError::new(token.location, "expected a constant after `::`")),
                }
            }
            Node::Group(group) if group.kind == GroupKind::Square && !group.whitespace_before && has_receiver => {
                let receiver = output.pop().and_then(Node::into_expr);
                let location = receiver.as_ref().map_or(group.location, |receiver| receiver.location);
                let arguments = parse_list(group.children)?;
                output.push(Node::expr(method_call(location, receiver, "[]", arguments)));
            }
            other => output.push(other),
        }
    }

    *nodes = output;
    Ok(())
}

fn dotted_call(
    receiver: Option<Expression>,
    name: Option<Node>,
    safe_navigation: bool,
    dot: &Token,
) -> Result<Node, SyntaxError> {
    let receiver = receiver.map(Box::new);
    let location = receiver.as_ref().map_or(dot.location, |receiver| receiver.location);
    match name {
        Some(Node::Expr { expr, bare }) => match expr.kind {
            ExpressionKind::Identifier(name) | ExpressionKind::Constant(name) => {
                let call = MethodCall {
                    receiver,
                    name,
                    arguments: Vec::new(),
                    block: None,
                    safe_navigation,
                };
                Ok(Node::Expr {
                    expr: Expression::new(location, ExpressionKind::MethodCall(call)),
                    bare,
                })
            }
            ExpressionKind::MethodCall(mut call) if call.receiver.is_none() => {
                call.receiver = receiver;
                call.safe_navigation = safe_navigation;
                Ok(Node::expr(Expression::new(location, ExpressionKind::MethodCall(call))))
            }
            _ => Err(SyntaxError::new(
                dot.location,
                format!("expected a method name after `{}`", dot.text),
            )),
        },
        // `callable.(args)`
        Some(Node::Group(group)) if group.kind == GroupKind::Paren => {
            let arguments = parse_list(group.children)?;
            let call = MethodCall {
                receiver,
                name: String::from("call"),
                arguments,
                block: None,
                safe_navigation,
            };
            Ok(Node::expr(Expression::new(location, ExpressionKind::MethodCall(call))))
        }
        _ => Err(SyntaxError::new(
            dot.location,
            format!("expected a method name after `{}`", dot.text),
        )),
    }
}

fn split_top_level_commas(nodes: Vec<Node>) -> Vec<Vec<Node>> {
    let mut parts = vec![Vec::new()];
    for node in nodes {
        if node.is_op(",") {
            parts.push(Vec::new());
        } else if let Some(part) = parts.last_mut() {
            part.push(node);
        }
    }
    parts
}

/// Split on the first assignment operator.
fn split_assignment(nodes: &mut Vec<Node>) -> Result<Option<Expression>, SyntaxError> {
    let idx = nodes.iter().position(|node| {
        node.is_op("=") || node.is_any_op(COMPOUND_ASSIGNMENTS)
    });
    let idx = match idx {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let right = nodes.split_off(idx + 1);
    let operator = nodes.pop().ok_or_else(|| SyntaxError::new(Location::default(), "missing operator"))?;
    let left = mem::take(nodes);
    let operator_text = token_of(&operator).map(|token| token.text.clone()).unwrap_or_default();
    if left.is_empty() {
        return Err(SyntaxError::new(
            operator.location(),
            format!("unexpected {}", operator.describe()),
        ));
    }
    if right.is_empty() {
        return Err(SyntaxError::new(
            operator.location(),
            format!("expected a value after {}", operator.describe()),
        ));
    }

    let location = left[0].location();
    let mut targets = Vec::new();
    let mut multiple = false;
    for part in split_top_level_commas(left) {
        if !targets.is_empty() {
            multiple = true;
        }
        targets.push(assign_target(part, &operator)?);
    }
    let has_splat_target = targets.iter().any(|target| matches!(target, AssignTarget::Splat(_)));

    // `x = call a, b` passes both arguments to `call`, `x = a, b` assigns an array.
    let starts_command = right.len() > 1
        && right[0].is_bare()
        && !right[1].is_op(",")
        && !matches!(&right[1], Node::Token(token) if token.kind == TokenKind::Operator && !is_unary_position(&right, 1));
    let mut values = if starts_command {
        vec![parse_statement(right)?]
    } else {
        split_top_level_commas(right)
            .into_iter()
            .map(|part| assigned_value(part, &operator))
            .collect::<Result<Vec<_>, _>>()?
    };

    if operator_text != "=" {
        if multiple || has_splat_target || values.len() != 1 {
            return Err(SyntaxError::new(
                operator.location(),
                format!("`{}` expects a single target and value", operator_text),
            ));
        }
        let target = targets.remove(0);
        return Ok(Some(Expression::new(
            location,
            ExpressionKind::CompoundAssignment {
                target,
                operator: operator_text.trim_end_matches('=').to_string(),
                value: Box::new(values.remove(0)),
            },
        )));
    }

    if multiple || has_splat_target {
        return Ok(Some(Expression::new(
            location,
            ExpressionKind::MultiAssignment { targets, values },
        )));
    }

    let splats_value = values.len() == 1 && matches!(values[0].kind, ExpressionKind::Splat(_));
    let value = if values.len() > 1 || splats_value {
        let array_location = values[0].location;
        Expression::new(array_location, ExpressionKind::Array(values))
    } else {
        values.remove(0)
    };
    Ok(Some(Expression::new(
        location,
        ExpressionKind::Assignment {
            target: targets.remove(0),
            value: Box::new(value),
        },
    )))
}

/// One assigned value. A leading `*` splats the whole rest, so `*1..3` splats the range.
fn assigned_value(mut part: Vec<Node>, operator: &Node) -> Result<Expression, SyntaxError> {
    if part.len() > 1 && part[0].is_op("*") {
        let star = part.remove(0);
        let operand = parse_operand(part, &star)?;
        return Ok(Expression::new(star.location(), ExpressionKind::Splat(Box::new(operand))));
    }
    parse_operand(part, operator)
}

fn assign_target(mut part: Vec<Node>, operator: &Node) -> Result<AssignTarget, SyntaxError> {
    let invalid = |location: Location| SyntaxError::new(location, "invalid assignment target");
    if part.is_empty() {
        return Err(invalid(operator.location()));
    }
    if part.len() == 2 && part[0].is_op("*") {
        let inner = assign_target(part.split_off(1), operator)?;
        return Ok(AssignTarget::Splat(Box::new(inner)));
    }
    if part.len() != 1 {
        return Err(invalid(part[0].location()));
    }

    let node = part.remove(0);
    let location = node.location();
    let node = match node {
        Node::Group(group) if group.kind == GroupKind::Paren => {
            let mut targets = Vec::new();
            for inner in split_top_level_commas(group.children) {
                let mut inner = inner;
                if !matches!(inner.first(), Some(Node::Group(_))) {
                    classify(&mut inner)?;
                    nested_temporaries(&mut inner)?;
                    calls_with_parens(&mut inner)?;
                    postfix(&mut inner)?;
                }
                targets.push(assign_target(inner, operator)?);
            }
            return Ok(AssignTarget::Nested(targets));
        }
        node => node,
    };
    let expr = node.into_expr().ok_or_else(|| invalid(location))?;
    let target = match expr.kind {
        ExpressionKind::Identifier(name) => AssignTarget::Identifier(name),
        ExpressionKind::InstanceVariable(name) => AssignTarget::InstanceVariable(name),
        ExpressionKind::ClassVariable(name) => AssignTarget::ClassVariable(name),
        ExpressionKind::Global(name) => AssignTarget::Global(name),
        ExpressionKind::Constant(name) => AssignTarget::Constant { scope: None, name },
        ExpressionKind::ConstantPath { scope, name } => AssignTarget::Constant { scope, name },
        ExpressionKind::MethodCall(call) => match call.receiver {
            Some(receiver) if call.name == "[]" && call.block.is_none() => AssignTarget::Index {
                receiver,
                arguments: call.arguments,
            },
            Some(receiver) if call.arguments.is_empty() && call.block.is_none() => AssignTarget::Attribute {
                receiver,
                name: call.name,
                safe_navigation: call.safe_navigation,
            },
            _ => return Err(invalid(location)),
        },
        _ => return Err(invalid(location)),
    };
    Ok(target)
}

/// Prefix `-`, `+`, `~`, `*`, `**` and `&`, folded right to left.
fn unary(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut idx = nodes.len();
    while idx > 0 {
        idx -= 1;
        if !nodes[idx].is_any_op(&["-", "+", "~", "*", "**", "&"]) {
            continue;
        }
        let has_operand = nodes.get(idx + 1).map_or(false, Node::is_expr);
        if !has_operand || !is_unary_position(nodes, idx) {
            continue;
        }
        let operand = match nodes.remove(idx + 1).into_expr() {
            Some(operand) => operand,
            None => continue,
        };
        let location = nodes[idx].location();
        let operator = token_of(&nodes[idx]).map(|token| token.text.clone()).unwrap_or_default();
        let kind = match operator.as_str() {
            "-" => match operand.kind {
                ExpressionKind::Integer(value) => match value.checked_neg() {
                    Some(value) => ExpressionKind::Integer(value),
                    None => ExpressionKind::BigInteger(format!("-{}", value)),
                },
                ExpressionKind::Float(value) => ExpressionKind::Float(-value),
                ExpressionKind::BigInteger(text) => ExpressionKind::BigInteger(match text.strip_prefix('-') {
                    Some(positive) => positive.to_string(),
                    None => format!("-{}", text),
                }),
                kind => ExpressionKind::MethodCall(MethodCall {
                    receiver: Some(Box::new(Expression::new(operand.location, kind))),
                    name: String::from("-@"),
                    arguments: Vec::new(),
                    block: None,
                    safe_navigation: false,
                }),
            },
            "+" => operand.kind,
            "~" => ExpressionKind::MethodCall(MethodCall {
                receiver: Some(Box::new(operand)),
                name: String::from("~"),
                arguments: Vec::new(),
                block: None,
                safe_navigation: false,
            }),
            "*" => ExpressionKind::Splat(Box::new(operand)),
            "**" => ExpressionKind::DoubleSplat(Box::new(operand)),
            _ => ExpressionKind::BlockPass(Box::new(operand)),
        };
        nodes[idx] = Node::expr(Expression::new(location, kind));
    }
    Ok(())
}

/// Split on the first range operator.
fn split_range(nodes: &mut Vec<Node>) -> Result<Option<Expression>, SyntaxError> {
    let idx = match nodes.iter().position(|node| node.is_any_op(&["..", "..."])) {
        Some(idx) => idx,
        None => return Ok(None),
    };
    let right = nodes.split_off(idx + 1);
    let operator = nodes.pop().ok_or_else(|| SyntaxError::new(Location::default(), "missing operator"))?;
    let left = mem::take(nodes);
    let location = left.first().map_or(operator.location(), Node::location);

    let from = if left.is_empty() {
        Expression::nil(operator.location())
    } else {
        parse_statement(left)?
    };
    let to = if right.is_empty() {
        Expression::nil(operator.location())
    } else {
        parse_statement(right)?
    };
    Ok(Some(Expression::new(
        location,
        ExpressionKind::Range {
            from: Box::new(from),
            to: Box::new(to),
            exclusive: operator.is_op("..."),
        },
    )))
}

fn prefix_keyword(nodes: &mut Vec<Node>, keyword: &str, build: impl Fn(Expression) -> ExpressionKind) {
    prefix(nodes, |node| node.is_keyword(keyword), build)
}

fn prefix_operator(nodes: &mut Vec<Node>, operator: &str, build: impl Fn(Expression) -> ExpressionKind) {
    prefix(nodes, |node| node.is_op(operator), build)
}

fn prefix(nodes: &mut Vec<Node>, matches: impl Fn(&Node) -> bool, build: impl Fn(Expression) -> ExpressionKind) {
    let mut idx = nodes.len();
    while idx > 0 {
        idx -= 1;
        if !matches(&nodes[idx]) || !nodes.get(idx + 1).map_or(false, Node::is_expr) {
            continue;
        }
        if let Some(operand) = nodes.remove(idx + 1).into_expr() {
            let location = nodes[idx].location();
            nodes[idx] = Node::expr(Expression::new(location, build(operand)));
        }
    }
}

fn fold_binary(nodes: &mut Vec<Node>, idx: usize) {
    let rhs = nodes.remove(idx + 1).into_expr();
    let operator = nodes.remove(idx);
    let lhs = nodes.remove(idx - 1).into_expr();
    if let (Some(lhs), Some(rhs), Some(token)) = (lhs, rhs, token_of(&operator)) {
        let location = lhs.location;
        nodes.insert(
            idx - 1,
            Node::expr(method_call(location, Some(lhs), token.text.clone(), vec![rhs])),
        );
    }
}

fn is_binary_at(nodes: &[Node], idx: usize, operators: &[&str]) -> bool {
    idx > 0
        && idx + 1 < nodes.len()
        && nodes[idx].is_any_op(operators)
        && nodes[idx - 1].is_expr()
        && nodes[idx + 1].is_expr()
}

/// `**` is right-associative.
fn exponents(nodes: &mut Vec<Node>) {
    let mut idx = nodes.len();
    while idx > 1 {
        idx -= 1;
        if is_binary_at(nodes, idx, &["**"]) {
            fold_binary(nodes, idx);
        }
    }
}

fn binary(nodes: &mut Vec<Node>, operators: &[&str]) {
    let mut idx = 1;
    while idx + 1 < nodes.len() {
        if is_binary_at(nodes, idx, operators) {
            fold_binary(nodes, idx);
        } else {
            idx += 1;
        }
    }
}

fn logic(nodes: &mut Vec<Node>, operator: &str, kind: LogicOperator) {
    let mut idx = 1;
    while idx + 1 < nodes.len() {
        if !is_binary_at(nodes, idx, &[operator]) {
            idx += 1;
            continue;
        }
        let rhs = nodes.remove(idx + 1).into_expr();
        nodes.remove(idx);
        let lhs = nodes.remove(idx - 1).into_expr();
        if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
            let location = lhs.location;
            nodes.insert(
                idx - 1,
                Node::expr(Expression::new(
                    location,
                    ExpressionKind::Logic {
                        operator: kind,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )),
            );
        }
    }
}

/// Whether a `:` at `idx` separates the branches of a ternary (as opposed to `key: value`).
fn is_ternary_colon(nodes: &[Node], idx: usize) -> bool {
    match token_of(&nodes[idx]) {
        Some(token) if token.is_operator(":") => {
            token.whitespace_before
                || !matches!(
                    idx.checked_sub(1).and_then(|prev| nodes[prev].as_expr()).map(|expr| &expr.kind),
                    Some(ExpressionKind::Identifier(_)) | Some(ExpressionKind::String(_))
                )
        }
        _ => false,
    }
}

/// `condition ? a : b`, right-associative.
fn ternary(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    while let Some(question) = nodes.iter().rposition(|node| node.is_op("?")) {
        if question == 0 || !nodes[question - 1].is_expr() {
            return Err(SyntaxError::new(nodes[question].location(), "unexpected `?`"));
        }
        let colon = (question + 1..nodes.len()).find(|&idx| is_ternary_colon(nodes, idx));
        let colon = match colon {
            Some(colon) if colon + 1 < nodes.len() && nodes[colon + 1].is_expr() => colon,
            _ => {
                return Err(SyntaxError::new(
                    nodes[question].location(),
                    "incomplete conditional expression (missing `:`)",
                ))
            }
        };

        let mut removed: Vec<Node> = nodes.drain(question - 1..=colon + 1).collect();
        let else_branch = removed.pop().and_then(Node::into_expr);
        removed.pop();
        let then_nodes = removed.split_off(2);
        let question_node = removed.pop();
        let condition = removed.pop().and_then(Node::into_expr);

        let at = question_node.unwrap_or_else(placeholder);
        let then_branch = parse_operand(then_nodes, &at)?;
        if let (Some(condition), Some(else_branch)) = (condition, else_branch) {
            let location = condition.location;
            nodes.insert(
                question - 1,
                Node::expr(Expression::new(
                    location,
                    ExpressionKind::Ternary {
                        condition: Box::new(condition),
                        then_branch: Box::new(then_branch),
                        else_branch: Box::new(else_branch),
                    },
                )),
            );
        }
    }
    Ok(())
}

/// `key => value` and `key: value`.
fn key_values(nodes: &mut Vec<Node>) {
    let mut idx = 1;
    while idx + 1 < nodes.len() {
        let arrow = is_binary_at(nodes, idx, &["=>"]);
        let colon = nodes[idx].is_op(":")
            && !nodes[idx].whitespace_before()
            && nodes[idx + 1].is_expr()
            && matches!(
                nodes[idx - 1].as_expr().map(|expr| &expr.kind),
                Some(ExpressionKind::Identifier(_)) | Some(ExpressionKind::String(_))
            );
        if !arrow && !colon {
            idx += 1;
            continue;
        }

        let value = nodes.remove(idx + 1).into_expr();
        nodes.remove(idx);
        let key = nodes.remove(idx - 1).into_expr();
        if let (Some(key), Some(value)) = (key, value) {
            let key = match key.kind {
                ExpressionKind::Identifier(name) | ExpressionKind::String(name) if colon => {
                    Expression::new(key.location, ExpressionKind::Symbol(name))
                }
                _ => key,
            };
            let location = key.location;
            nodes.insert(
                idx - 1,
                Node::expr(Expression::new(
                    location,
                    ExpressionKind::KeyValue {
                        key: Box::new(key),
                        value: Box::new(value),
                    },
                )),
            );
        }
    }
}

/// Collect a comma-separated argument list starting at `start`, returning the arguments and the index after them.
fn collect_arguments(nodes: &mut Vec<Node>, start: usize) -> Result<Vec<Expression>, SyntaxError> {
    let mut end = start;
    if !nodes.get(start).map_or(false, Node::is_expr) {
        return Ok(Vec::new());
    }
    loop {
        end += 1;
        match nodes.get(end) {
            Some(node) if node.is_op(",") => match nodes.get(end + 1) {
                Some(next) if next.is_expr() => end += 1,
                _ => {
                    return Err(SyntaxError::new(
                        node.location(),
                        "missing argument after `,`",
                    ))
                }
            },
            _ => break,
        }
    }
    Ok(nodes
        .drain(start..end)
        .filter_map(Node::into_expr)
        .collect())
}

/// `puts a, b` and `list.push 1`, folded right to left so that `puts format x` nests.
fn calls_without_parens(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut idx = nodes.len();
    while idx > 0 {
        idx -= 1;
        let takes_arguments = nodes[idx].is_bare() && nodes.get(idx + 1).map_or(false, Node::is_expr);
        if !takes_arguments {
            continue;
        }
        let arguments = collect_arguments(nodes, idx + 1)?;
        let callee = mem::replace(&mut nodes[idx], placeholder());
        let expr = match callee.into_expr() {
            Some(expr) => match expr.kind {
                ExpressionKind::Identifier(name) => method_call(expr.location, None, name, arguments),
                ExpressionKind::MethodCall(mut call) => {
                    call.arguments.extend(arguments);
                    Expression::new(expr.location, ExpressionKind::MethodCall(call))
                }
                kind => Expression::new(expr.location, kind),
            },
            None => continue,
        };
        nodes[idx] = Node::expr(expr);
    }
    Ok(())
}

/// `return`, `break`, `next`, `redo`, `retry`, `yield` and `super`, with their optional arguments.
fn control(nodes: &mut Vec<Node>) -> Result<(), SyntaxError> {
    let mut idx = nodes.len();
    while idx > 0 {
        idx -= 1;
        let keyword = match token_of(&nodes[idx]) {
            Some(token) if token.kind == TokenKind::Identifier && CONTROL_KEYWORDS.contains(&token.text.as_str()) => {
                token.text.clone()
            }
            _ => continue,
        };
        let location = nodes[idx].location();
        let mut arguments = collect_arguments(nodes, idx + 1)?;

        let kind = match keyword.as_str() {
            "yield" => ExpressionKind::Yield(arguments),
            "super" => ExpressionKind::Super {
                arguments: if arguments.is_empty() { None } else { Some(arguments) },
                block: None,
            },
            "redo" | "retry" if !arguments.is_empty() => {
                return Err(SyntaxError::new(location, format!("`{}` takes no value", keyword)))
            }
            _ => {
                let kind = match keyword.as_str() {
                    "return" => ControlKind::Return,
                    "break" => ControlKind::Break,
                    "next" => ControlKind::Next,
                    "redo" => ControlKind::Redo,
                    _ => ControlKind::Retry,
                };
                let value = match arguments.len() {
                    0 => None,
                    1 => Some(Box::new(arguments.remove(0))),
                    _ => {
                        let array_location = arguments[0].location;
                        Some(Box::new(Expression::new(array_location, ExpressionKind::Array(arguments))))
                    }
                };
                ExpressionKind::Control { kind, value }
            }
        };
        nodes[idx] = Node::expr(Expression::new(location, kind));
    }
    Ok(())
}
