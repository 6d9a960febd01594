use std::sync::Arc;

use crate::location::Location;

/// Represents a whole parsed program.
///
/// Example:
/// ```text
/// a = 1
/// b = 2
/// puts a + b
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    /// The top-level statements, as a single sequence expression.
    pub body: Expression,
}

/// Represents an expression, along with where it starts in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Where the expression starts.
    pub location: Location,
    /// The kind of expression.
    pub kind: ExpressionKind,
}

impl Expression {
    /// Construct an expression from its location and kind.
    pub fn new(location: Location, kind: ExpressionKind) -> Self {
        Self { location, kind }
    }

    /// Construct a `nil` literal.
    pub fn nil(location: Location) -> Self {
        Self::new(location, ExpressionKind::Nil)
    }

    /// Whether this expression is a plain reference that could be a local variable.
    pub fn as_identifier(&self) -> Option<&str> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// Represents the kinds of expressions.
///
/// Exemple:
/// ```text
/// "identifier"            counter
/// "constant"              Counter
/// "instance variable"     @total
/// "method call"           counter.increment(5) { |x| x }
/// "assignment"            counter = 10
/// "multiple assignment"   a, b = b, a
/// "range"                 1..10
/// "definition"            def increment(by = 1) ... end
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    /// A statement sequence (a body). Evaluates to its last value.
    Sequence(Vec<Expression>),

    /// A bare name: either a local variable or a call on `self` without arguments.
    Identifier(String),
    /// A constant (eg. `Counter`).
    Constant(String),
    /// A global variable (eg. `$stdout`).
    Global(String),
    /// A class variable (eg. `@@count`).
    ClassVariable(String),
    /// An instance variable (eg. `@total`).
    InstanceVariable(String),
    /// A scope-resolved constant (eg. `Outer::Inner`, or `::Top` when `scope` is `None`).
    ConstantPath {
        scope: Option<Box<Expression>>,
        name: String,
    },
    /// A method call (eg. `counter.add(5)`, `puts 5`, `a + b`).
    MethodCall(MethodCall),

    /// The `nil` literal.
    Nil,
    /// The `true` literal.
    True,
    /// The `false` literal.
    False,
    /// The `self` keyword.
    SelfRef,
    /// An integer literal that fits in 64 bits.
    Integer(i64),
    /// An integer literal too big to fit in 64 bits, kept as its decimal representation.
    BigInteger(String),
    /// A floating-point literal.
    Float(f64),
    /// A string literal without interpolation.
    String(String),
    /// A symbol literal (eg. `:name`).
    Symbol(String),
    /// A string with interpolated code (eg. `"total: #{total}"`).
    FormattedString(Vec<StringPart>),

    /// A single assignment (eg. `a = 1`, `obj.name = 'x'`, `list[0] = 1`).
    Assignment {
        target: AssignTarget,
        value: Box<Expression>,
    },
    /// A compound assignment (eg. `a += 1`, `cache ||= {}`). `operator` is the binary operator (`+`, `||`, ...).
    CompoundAssignment {
        target: AssignTarget,
        operator: String,
        value: Box<Expression>,
    },
    /// A multiple or destructuring assignment (eg. `a, b = 1, 2`, `first, *rest = list`).
    MultiAssignment {
        targets: Vec<AssignTarget>,
        values: Vec<Expression>,
    },

    /// A negation (`!value`, `not value`).
    Not(Box<Expression>),
    /// A conditional expression (`condition ? a : b`).
    Ternary {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    /// A short-circuiting logical operation (`a && b`, `a or b`).
    Logic {
        operator: LogicOperator,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },

    /// An array literal (eg. `[1, *rest]`).
    Array(Vec<Expression>),
    /// A hash literal (eg. `{ a: 1, 'b' => 2 }`). Entries are key/value pairs or double splats.
    Hash(Vec<Expression>),
    /// A range literal (`1..10`, `1...10`).
    Range {
        from: Box<Expression>,
        to: Box<Expression>,
        exclusive: bool,
    },
    /// A key/value pair, only valid within hash literals and argument lists.
    KeyValue {
        key: Box<Expression>,
        value: Box<Expression>,
    },
    /// A splatted value (`*list`), only valid within argument lists, array literals and `when` clauses.
    Splat(Box<Expression>),
    /// A double-splatted value (`**options`), only valid within argument lists and hash literals.
    DoubleSplat(Box<Expression>),
    /// A block passed as an argument (`&block`, `&:name`), only valid within argument lists.
    BlockPass(Box<Expression>),
    /// A literal closure (`->(x) { x }`).
    Lambda(Arc<BlockDef>),

    /// A `yield` to the current block.
    Yield(Vec<Expression>),
    /// A `super` call. `arguments` is `None` for a bare `super`, which forwards the current arguments.
    Super {
        arguments: Option<Vec<Expression>>,
        block: Option<BlockArgument>,
    },
    /// A `defined?` query.
    Defined(Box<Expression>),
    /// A method alias (`alias new_name old_name`).
    Alias { new_name: String, old_name: String },

    /// A control-flow statement (`break`, `next`, `redo`, `retry`, `return`).
    Control {
        kind: ControlKind,
        value: Option<Box<Expression>>,
    },

    /// A `begin`/`rescue`/`else`/`ensure` expression.
    Begin(Box<Begin>),
    /// An `if` (or `unless`, with a negated condition) expression.
    If {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Option<Box<Expression>>,
    },
    /// A `while` or `until` loop.
    While {
        condition: Box<Expression>,
        body: Box<Expression>,
        /// Whether this is an `until` loop (the condition is negated).
        until: bool,
        /// Whether the body runs once before the condition is first checked (`begin ... end while cond`).
        do_while: bool,
    },
    /// A method definition.
    MethodDefinition(Arc<MethodDef>),
    /// A `for` loop (`for a, b in pairs ... end`).
    For {
        variables: Vec<String>,
        iterable: Box<Expression>,
        body: Box<Expression>,
    },
    /// A module definition (or reopening).
    ModuleDefinition {
        scope: Option<Box<Expression>>,
        name: String,
        body: Box<Expression>,
    },
    /// A class definition (or reopening).
    ClassDefinition {
        scope: Option<Box<Expression>>,
        name: String,
        superclass: Option<Box<Expression>>,
        body: Box<Expression>,
    },
    /// A `case`/`when` expression.
    Case {
        subject: Option<Box<Expression>>,
        clauses: Vec<WhenClause>,
        else_branch: Option<Box<Expression>>,
    },
}

/// Represents a part of a formatted string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    /// Some literal text.
    Text(String),
    /// Some interpolated code (`#{...}`).
    Code(Expression),
}

/// Represents a method call.
///
/// Exemple:
/// ```text
/// "implicit receiver"  puts 'hello'
/// "explicit receiver"  list.push(1, 2)
/// "safe navigation"    user&.name
/// "binary operator"    a + b
/// "with a block"       list.each { |x| puts x }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    /// The receiver, or `None` when the call is made on `self` implicitly.
    pub receiver: Option<Box<Expression>>,
    /// The method name.
    pub name: String,
    /// The arguments (may contain splats, key/value pairs and a block pass).
    pub arguments: Vec<Expression>,
    /// The literal block attached to the call, if any.
    pub block: Option<BlockArgument>,
    /// Whether the call uses safe navigation (`&.`).
    pub safe_navigation: bool,
}

/// A literal block attached to a call.
pub type BlockArgument = Arc<BlockDef>;

/// Represents a block or lambda literal.
///
/// Exemple:
/// ```text
/// { |a, b = 2| a + b }
/// do |item| puts item end
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDef {
    /// The block's parameters.
    pub parameters: Vec<Parameter>,
    /// The block's body.
    pub body: Expression,
}

/// Represents a method definition.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDef {
    /// Whether the method is defined on `self` (`def self.name`).
    pub singleton: bool,
    /// The method's name (eg. `initialize`, `+`, `[]=`, `name=`).
    pub name: String,
    /// The method's parameters.
    pub parameters: Vec<Parameter>,
    /// The method's body.
    pub body: Expression,
}

/// Represents a formal parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// The parameter's name (may be empty for an anonymous splat).
    pub name: String,
    /// The parameter's kind.
    pub kind: ParameterKind,
}

/// Represents the kinds of formal parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterKind {
    /// A required positional parameter (`a`).
    Required,
    /// An optional positional parameter (`a = 1`).
    Optional(Expression),
    /// A splat parameter (`*rest`).
    Splat,
    /// A double-splat parameter (`**options`).
    DoubleSplat,
    /// A block parameter (`&block`).
    Block,
}

/// Represents the target of an assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum AssignTarget {
    /// A local variable.
    Identifier(String),
    /// An instance variable.
    InstanceVariable(String),
    /// A class variable.
    ClassVariable(String),
    /// A global variable.
    Global(String),
    /// A constant, optionally scope-resolved.
    Constant {
        scope: Option<Box<Expression>>,
        name: String,
    },
    /// An index (`list[0] = ...`).
    Index {
        receiver: Box<Expression>,
        arguments: Vec<Expression>,
    },
    /// An attribute (`user.name = ...`).
    Attribute {
        receiver: Box<Expression>,
        name: String,
        safe_navigation: bool,
    },
    /// A splatted target in a multiple assignment (`*rest`).
    Splat(Box<AssignTarget>),
    /// A parenthesized group of targets, destructuring one value (`a, (b, c) = ...`).
    Nested(Vec<AssignTarget>),
}

/// Represents a logical operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOperator {
    And,
    Or,
}

/// Represents the kinds of control-flow statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Break,
    Next,
    Redo,
    Retry,
    Return,
}

/// Represents a `begin`/`rescue`/`else`/`ensure` expression.
///
/// Exemple:
/// ```text
/// begin
///   risky
/// rescue ArgumentError, TypeError => error
///   recover(error)
/// else
///   celebrate
/// ensure
///   cleanup
/// end
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Begin {
    /// The protected body.
    pub body: Expression,
    /// The rescue clauses, in declaration order.
    pub rescues: Vec<RescueClause>,
    /// The body that runs when no exception was raised.
    pub else_branch: Option<Expression>,
    /// The body that always runs.
    pub ensure_branch: Option<Expression>,
}

/// Represents a rescue clause.
#[derive(Debug, Clone, PartialEq)]
pub struct RescueClause {
    /// The exception classes this clause matches (empty means `StandardError`).
    pub classes: Vec<Expression>,
    /// The variable the exception is bound to, if any.
    pub variable: Option<String>,
    /// The clause's body.
    pub body: Expression,
}

/// Represents a `when` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    /// The patterns, matched with `===`.
    pub patterns: Vec<Expression>,
    /// The clause's body.
    pub body: Expression,
}
