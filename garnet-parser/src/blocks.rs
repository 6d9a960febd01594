use std::sync::Arc;

use garnet_core::ast::{
    Begin, BlockArgument, BlockDef, Expression, ExpressionKind, MethodDef, Parameter,
    ParameterKind, RescueClause, WhenClause,
};
use garnet_core::{Location, SyntaxError};
use garnet_lexer::{Token, TokenKind};

use crate::node::{GroupKind, KeywordBlock, Node};
use crate::statement::{parse_body, parse_list, parse_statement, split_statements};

/// The operators a method can be named after.
const OPERATOR_METHODS: &[&str] = &[
    "+", "-", "*", "/", "%", "**", "==", "!=", "<", ">", "<=", ">=", "<=>", "===", "<<", ">>",
    "&", "|", "^", "~", "!", "=~",
];

/// A section of a keyword block, introduced by a clause keyword (`else`, `rescue`, ...).
struct Clause {
    keyword: Option<Token>,
    nodes: Vec<Node>,
}

impl Clause {
    fn keyword(&self) -> &str {
        self.keyword.as_ref().map_or("", |token| token.text.as_str())
    }

    fn location(&self, fallback: Location) -> Location {
        self.keyword.as_ref().map_or(fallback, |token| token.location)
    }
}

/// Build a keyword block into an expression (or into a literal block, for `do ... end`).
pub fn build(block: KeywordBlock) -> Result<Node, SyntaxError> {
    let KeywordBlock {
        keyword,
        location,
        children,
    } = block;

    let expr = match keyword.as_str() {
        "begin" => build_begin(children, location)?,
        "if" => build_if(children, location, false)?,
        "unless" => build_if(children, location, true)?,
        "while" => build_while(children, location, false)?,
        "until" => build_while(children, location, true)?,
        "for" => build_for(children, location)?,
        "case" => build_case(children, location)?,
        "def" => build_def(children, location)?,
        "class" => build_class(children, location)?,
        "module" => build_module(children, location)?,
        "do" => {
            return Ok(Node::BlockArg {
                block: build_do_block(children, location)?,
                brace: false,
                location,
            })
        }
        _ => {
            return Err(SyntaxError::new(
                location,
                format!("unexpected `{}`", keyword),
            ))
        }
    };
    Ok(Node::expr(expr))
}

/// Split a block body on its clause keywords. `rescue` only counts at the start of a statement.
fn split_clauses(children: Vec<Node>, keywords: &[&str]) -> Vec<Clause> {
    let mut clauses = vec![Clause {
        keyword: None,
        nodes: Vec::new(),
    }];
    let mut at_statement_start = true;
    for node in children {
        let is_clause = match &node {
            Node::Token(token) => {
                token.kind == TokenKind::Identifier
                    && keywords.contains(&token.text.as_str())
                    && (token.text != "rescue" || at_statement_start)
            }
            _ => false,
        };
        at_statement_start = node.is_end_of_statement();
        if is_clause {
            if let Node::Token(token) = node {
                clauses.push(Clause {
                    keyword: Some(token),
                    nodes: Vec::new(),
                });
            }
            at_statement_start = true;
            continue;
        }
        if let Some(clause) = clauses.last_mut() {
            clause.nodes.push(node);
        }
    }
    clauses
}

/// Split the nodes of a clause into its header (up to the first statement boundary) and its body.
fn split_header(mut nodes: Vec<Node>) -> (Vec<Node>, Vec<Node>) {
    match nodes.iter().position(Node::is_end_of_statement) {
        Some(idx) => {
            let body = nodes.split_off(idx + 1);
            nodes.pop();
            (nodes, body)
        }
        None => (nodes, Vec::new()),
    }
}

fn unexpected(clause: &Clause, location: Location) -> SyntaxError {
    SyntaxError::new(
        clause.location(location),
        format!("unexpected `{}`", clause.keyword()),
    )
}

fn expect_condition(header: Vec<Node>, keyword: &str, location: Location) -> Result<Expression, SyntaxError> {
    if header.is_empty() {
        return Err(SyntaxError::new(
            location,
            format!("expected a condition after `{}`", keyword),
        ));
    }
    parse_statement(header)
}

/// A body that may carry `rescue`/`else`/`ensure` clauses (`begin`, `def` and `do` bodies).
fn build_protected(children: Vec<Node>, location: Location, always_wrap: bool) -> Result<Expression, SyntaxError> {
    let mut clauses = split_clauses(children, &["rescue", "else", "ensure"]).into_iter();
    let body_nodes = clauses.next().map(|clause| clause.nodes).unwrap_or_default();
    let body = parse_body(body_nodes, location)?;

    let mut rescues = Vec::new();
    let mut else_branch = None;
    let mut ensure_branch = None;
    for clause in clauses {
        match clause.keyword() {
            "rescue" if else_branch.is_none() && ensure_branch.is_none() => {
                let clause_location = clause.location(location);
                let (header, body) = split_header(clause.nodes);
                let (classes, variable) = rescue_header(header, clause_location)?;
                rescues.push(RescueClause {
                    classes,
                    variable,
                    body: parse_body(body, clause_location)?,
                });
            }
            "else" if else_branch.is_none() && ensure_branch.is_none() => {
                let clause_location = clause.location(location);
                else_branch = Some(parse_body(clause.nodes, clause_location)?);
            }
            "ensure" if ensure_branch.is_none() => {
                let clause_location = clause.location(location);
                ensure_branch = Some(parse_body(clause.nodes, clause_location)?);
            }
            _ => return Err(unexpected(&clause, location)),
        }
    }

    let plain = rescues.is_empty() && else_branch.is_none() && ensure_branch.is_none();
    if plain && !always_wrap {
        return Ok(body);
    }
    Ok(Expression::new(
        location,
        ExpressionKind::Begin(Box::new(Begin {
            body,
            rescues,
            else_branch,
            ensure_branch,
        })),
    ))
}

/// `rescue ArgumentError, TypeError => error`
fn rescue_header(mut header: Vec<Node>, location: Location) -> Result<(Vec<Expression>, Option<String>), SyntaxError> {
    let variable = match header.iter().position(|node| node.is_op("=>")) {
        Some(idx) => {
            let rest = header.split_off(idx + 1);
            header.pop();
            match rest.as_slice() {
                [Node::Token(token)] if token.kind == TokenKind::Identifier => Some(token.text.clone()),
                _ => {
                    return Err(SyntaxError::new(
                        location,
                        "expected a variable name after `=>` in rescue clause",
                    ))
                }
            }
        }
        None => None,
    };
    Ok((parse_list(header)?, variable))
}

fn build_begin(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    build_protected(children, location, true)
}

fn build_if(children: Vec<Node>, location: Location, negated: bool) -> Result<Expression, SyntaxError> {
    let keyword = if negated { "unless" } else { "if" };
    let mut clauses = split_clauses(children, &["elsif", "else"]);

    let mut else_branch: Option<Expression> = None;
    let mut branches = Vec::new();
    let first = clauses.remove(0);
    let (header, body) = split_header(first.nodes);
    branches.push((expect_condition(header, keyword, location)?, parse_body(body, location)?));

    let count = clauses.len();
    for (idx, clause) in clauses.into_iter().enumerate() {
        let clause_location = clause.location(location);
        match clause.keyword() {
            "elsif" if !negated && else_branch.is_none() => {
                let (header, body) = split_header(clause.nodes);
                let condition = expect_condition(header, "elsif", clause_location)?;
                branches.push((condition, parse_body(body, clause_location)?));
            }
            "else" if else_branch.is_none() && idx + 1 == count => {
                else_branch = Some(parse_body(clause.nodes, clause_location)?);
            }
            _ => return Err(unexpected(&clause, location)),
        }
    }

    let mut result = else_branch;
    for (idx, (condition, body)) in branches.into_iter().enumerate().rev() {
        let condition = if idx == 0 && negated {
            Expression::new(condition.location, ExpressionKind::Not(Box::new(condition)))
        } else {
            condition
        };
        let branch_location = if idx == 0 { location } else { condition.location };
        result = Some(Expression::new(
            branch_location,
            ExpressionKind::If {
                condition: Box::new(condition),
                then_branch: Box::new(body),
                else_branch: result.map(Box::new),
            },
        ));
    }
    result.ok_or_else(|| SyntaxError::new(location, format!("empty `{}`", keyword)))
}

fn build_while(children: Vec<Node>, location: Location, until: bool) -> Result<Expression, SyntaxError> {
    let keyword = if until { "until" } else { "while" };
    let (header, body) = split_header(children);
    let condition = expect_condition(header, keyword, location)?;
    Ok(Expression::new(
        location,
        ExpressionKind::While {
            condition: Box::new(condition),
            body: Box::new(parse_body(body, location)?),
            until,
            do_while: false,
        },
    ))
}

/// `for a, b in pairs ... end`
fn build_for(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let (mut header, body) = split_header(children);
    let idx = header
        .iter()
        .position(|node| node.is_keyword("in"))
        .ok_or_else(|| SyntaxError::new(location, "expected `in` in `for` loop"))?;
    let iterable = header.split_off(idx + 1);
    header.pop();

    let mut variables = Vec::new();
    for node in header {
        match node {
            Node::Token(token) if token.is_operator(",") => {}
            Node::Token(token) if token.kind == TokenKind::Identifier => variables.push(token.text),
            other => {
                return Err(SyntaxError::new(
                    other.location(),
                    format!("unexpected {} in `for` loop", other.describe()),
                ))
            }
        }
    }
    if variables.is_empty() {
        return Err(SyntaxError::new(location, "expected a variable in `for` loop"));
    }
    if iterable.is_empty() {
        return Err(SyntaxError::new(location, "expected an iterable after `in`"));
    }

    Ok(Expression::new(
        location,
        ExpressionKind::For {
            variables,
            iterable: Box::new(parse_statement(iterable)?),
            body: Box::new(parse_body(body, location)?),
        },
    ))
}

fn build_case(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let mut clauses = split_clauses(children, &["when", "else"]).into_iter();
    let (subject, rest) = split_header(clauses.next().map(|clause| clause.nodes).unwrap_or_default());
    if let Some(node) = rest.iter().find(|node| !node.is_end_of_statement()) {
        return Err(SyntaxError::new(
            node.location(),
            format!("unexpected {} before `when`", node.describe()),
        ));
    }
    let subject = if subject.is_empty() {
        None
    } else {
        Some(Box::new(parse_statement(subject)?))
    };

    let mut when_clauses = Vec::new();
    let mut else_branch = None;
    for clause in clauses {
        let clause_location = clause.location(location);
        match clause.keyword() {
            "when" if else_branch.is_none() => {
                let (header, body) = split_header(clause.nodes);
                let patterns = parse_list(header)?;
                if patterns.is_empty() {
                    return Err(SyntaxError::new(clause_location, "expected a pattern after `when`"));
                }
                when_clauses.push(WhenClause {
                    patterns,
                    body: parse_body(body, clause_location)?,
                });
            }
            "else" if else_branch.is_none() => {
                else_branch = Some(Box::new(parse_body(clause.nodes, clause_location)?));
            }
            _ => return Err(unexpected(&clause, location)),
        }
    }

    Ok(Expression::new(
        location,
        ExpressionKind::Case {
            subject,
            clauses: when_clauses,
            else_branch,
        },
    ))
}

/// `def name(params)`, `def self.name`, `def ==(other)`, `def [](idx)`, `def name=(value)`.
fn build_def(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let mut nodes = children.into_iter().peekable();

    let mut singleton = false;
    let mut first = nodes.next();
    if first.as_ref().map_or(false, |node| node.is_keyword("self"))
        && nodes.peek().map_or(false, |node| node.is_op("."))
    {
        singleton = true;
        nodes.next();
        first = nodes.next();
    }

    let mut name = match first {
        Some(Node::Token(token)) if token.kind == TokenKind::Identifier => token.text,
        Some(Node::Token(token)) if token.kind == TokenKind::Operator && OPERATOR_METHODS.contains(&token.text.as_str()) => {
            token.text
        }
        Some(Node::Group(group)) if group.kind == GroupKind::Square && group.children.is_empty() => String::from("[]"),
        _ => return Err(SyntaxError::new(location, "expected a method name after `def`")),
    };
    let is_setter = nodes.peek().map_or(false, |node| node.is_op("=") && !node.whitespace_before());
    if is_setter {
        nodes.next();
        name.push('=');
    }

    let rest: Vec<Node> = nodes.collect();
    let (parameters, body) = match rest.first() {
        Some(Node::Group(group)) if group.kind == GroupKind::Paren => {
            let mut rest = rest;
            let params = match rest.remove(0) {
                Node::Group(group) => parse_parameters(group.children)?,
                _ => Vec::new(),
            };
            (params, rest)
        }
        _ => {
            let (header, body) = split_header(rest);
            (parse_parameters(header)?, body)
        }
    };

    let body = build_protected(body, location, false)?;
    Ok(Expression::new(
        location,
        ExpressionKind::MethodDefinition(Arc::new(MethodDef {
            singleton,
            name,
            parameters,
            body,
        })),
    ))
}

/// A `Name` or `Outer::Name` path, split into its scope and its last segment.
fn constant_path(nodes: Vec<Node>, keyword: &str, location: Location) -> Result<(Option<Box<Expression>>, String), SyntaxError> {
    let mut segments = Vec::new();
    let mut expect_name = true;
    for node in nodes {
        match node {
            Node::Token(token) if expect_name && token.kind == TokenKind::Identifier => {
                if !token.text.chars().next().map_or(false, char::is_uppercase) {
                    return Err(SyntaxError::new(
                        token.location,
                        format!("{} name must be a constant", keyword),
                    ));
                }
                segments.push((token.text, token.location));
                expect_name = false;
            }
            Node::Token(token) if !expect_name && token.is_operator("::") => expect_name = true,
            Node::Token(token) if token.is_operator("<<") => {
                return Err(SyntaxError::new(
                    token.location,
                    "singleton class bodies are not supported",
                ))
            }
            other => {
                return Err(SyntaxError::new(
                    other.location(),
                    format!("unexpected {} in {} name", other.describe(), keyword),
                ))
            }
        }
    }
    let (name, _) = match segments.pop() {
        Some(last) if !expect_name => last,
        _ => return Err(SyntaxError::new(location, format!("expected a {} name", keyword))),
    };

    let mut scope: Option<Box<Expression>> = None;
    for (segment, segment_location) in segments {
        let kind = match scope {
            None => ExpressionKind::Constant(segment),
            Some(outer) => ExpressionKind::ConstantPath {
                scope: Some(outer),
                name: segment,
            },
        };
        scope = Some(Box::new(Expression::new(segment_location, kind)));
    }
    Ok((scope, name))
}

fn build_class(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let (mut header, body) = split_header(children);
    let superclass = match header.iter().position(|node| node.is_op("<")) {
        Some(idx) => {
            let superclass = header.split_off(idx + 1);
            header.pop();
            Some(Box::new(expect_condition(superclass, "<", location)?))
        }
        None => None,
    };
    let (scope, name) = constant_path(header, "class", location)?;
    Ok(Expression::new(
        location,
        ExpressionKind::ClassDefinition {
            scope,
            name,
            superclass,
            body: Box::new(parse_body(body, location)?),
        },
    ))
}

fn build_module(children: Vec<Node>, location: Location) -> Result<Expression, SyntaxError> {
    let (header, body) = split_header(children);
    let (scope, name) = constant_path(header, "module", location)?;
    Ok(Expression::new(
        location,
        ExpressionKind::ModuleDefinition {
            scope,
            name,
            body: Box::new(parse_body(body, location)?),
        },
    ))
}

/// Remove a leading `|params|` from a block body.
fn take_block_parameters(children: &mut Vec<Node>) -> Result<Vec<Parameter>, SyntaxError> {
    while children.first().map_or(false, Node::is_end_of_statement) {
        children.remove(0);
    }
    match children.first() {
        Some(node) if node.is_op("||") => {
            children.remove(0);
            Ok(Vec::new())
        }
        Some(node) if node.is_op("|") => {
            let location = node.location();
            let closing = children
                .iter()
                .skip(1)
                .position(|node| node.is_op("|"))
                .map(|idx| idx + 1)
                .ok_or_else(|| SyntaxError::new(location, "unterminated block parameters (missing `|`)"))?;
            let mut params: Vec<Node> = children.drain(..=closing).collect();
            params.pop();
            params.remove(0);
            parse_parameters(params)
        }
        _ => Ok(Vec::new()),
    }
}

fn build_do_block(mut children: Vec<Node>, location: Location) -> Result<BlockArgument, SyntaxError> {
    let parameters = take_block_parameters(&mut children)?;
    let body = build_protected(children, location, false)?;
    Ok(Arc::new(BlockDef { parameters, body }))
}

/// Build the contents of `{ |params| body }`.
pub fn build_brace_block(mut children: Vec<Node>, location: Location) -> Result<BlockArgument, SyntaxError> {
    let parameters = take_block_parameters(&mut children)?;
    let body = parse_body(children, location)?;
    Ok(Arc::new(BlockDef { parameters, body }))
}

/// Parse a formal parameter list (`a, b = 1, *rest, **options, &block`).
pub fn parse_parameters(nodes: Vec<Node>) -> Result<Vec<Parameter>, SyntaxError> {
    let mut parameters = Vec::new();
    let statements: Vec<Node> = split_statements(nodes).into_iter().flatten().collect();

    let mut parts: Vec<Vec<Node>> = vec![Vec::new()];
    for node in statements {
        if node.is_op(",") {
            parts.push(Vec::new());
        } else if let Some(part) = parts.last_mut() {
            part.push(node);
        }
    }
    if parts.len() == 1 && parts[0].is_empty() {
        return Ok(parameters);
    }

    for mut part in parts {
        let location = match part.first() {
            Some(node) => node.location(),
            None => return Err(SyntaxError::new(Location::default(), "expected a parameter")),
        };
        let name_at = |part: &[Node], idx: usize| -> Option<String> {
            match part.get(idx) {
                Some(Node::Token(token)) if token.kind == TokenKind::Identifier => Some(token.text.clone()),
                _ => None,
            }
        };

        let parameter = if part[0].is_op("*") && part.len() <= 2 {
            Parameter {
                name: name_at(&part, 1).unwrap_or_default(),
                kind: ParameterKind::Splat,
            }
        } else if part[0].is_op("**") && part.len() <= 2 {
            Parameter {
                name: name_at(&part, 1).unwrap_or_default(),
                kind: ParameterKind::DoubleSplat,
            }
        } else if part[0].is_op("&") && part.len() == 2 {
            Parameter {
                name: name_at(&part, 1).unwrap_or_default(),
                kind: ParameterKind::Block,
            }
        } else if let Some(name) = name_at(&part, 0) {
            if part.len() == 1 {
                Parameter {
                    name,
                    kind: ParameterKind::Required,
                }
            } else if part[1].is_op("=") && part.len() > 2 {
                let default = parse_statement(part.split_off(2))?;
                Parameter {
                    name,
                    kind: ParameterKind::Optional(default),
                }
            } else {
                return Err(SyntaxError::new(
                    part[1].location(),
                    format!("unexpected {} in parameter list", part[1].describe()),
                ));
            }
        } else {
            return Err(SyntaxError::new(
                location,
                format!("unexpected {} in parameter list", part[0].describe()),
            ));
        };

        let valid_name = parameter.name.is_empty()
            || parameter
                .name
                .chars()
                .next()
                .map_or(false, |ch| ch.is_lowercase() || ch == '_');
        if !valid_name || parameter.name.starts_with('@') || parameter.name.starts_with('$') {
            return Err(SyntaxError::new(
                location,
                format!("invalid parameter name `{}`", parameter.name),
            ));
        }
        parameters.push(parameter);
    }
    Ok(parameters)
}
