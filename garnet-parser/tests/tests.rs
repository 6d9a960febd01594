use garnet_core::ast::*;
use garnet_core::Location;
use garnet_parser::parse;

fn statements(code: &str) -> Vec<Expression> {
    let program = parse(code).expect("input did not parse successfully");
    match program.body.kind {
        ExpressionKind::Sequence(statements) => statements,
        other => panic!("expected a statement sequence, got {:?}", other),
    }
}

fn single(code: &str) -> Expression {
    let mut statements = statements(code);
    assert_eq!(statements.len(), 1, "expected exactly one statement");
    statements.remove(0)
}

fn call(expr: &Expression) -> &MethodCall {
    match &expr.kind {
        ExpressionKind::MethodCall(call) => call,
        other => panic!("expected a method call, got {:?}", other),
    }
}

fn identifier(line: usize, column: usize, name: &str) -> Expression {
    Expression::new(
        Location::new(line, column),
        ExpressionKind::Identifier(String::from(name)),
    )
}

#[test]
fn binary_expression_test() {
    const CODE: &str = "a + b";

    assert_eq!(
        single(CODE),
        Expression::new(
            Location::new(1, 1),
            ExpressionKind::MethodCall(MethodCall {
                receiver: Some(Box::new(identifier(1, 1, "a"))),
                name: String::from("+"),
                arguments: vec![identifier(1, 5, "b")],
                block: None,
                safe_navigation: false,
            }),
        )
    );
}

#[test]
fn statement_sequence_test() {
    const CODE: &str = "a = 1; b = 2\na + b";

    let statements = statements(CODE);
    assert_eq!(statements.len(), 3);
    assert!(matches!(
        &statements[0].kind,
        ExpressionKind::Assignment { target: AssignTarget::Identifier(name), value }
            if name == "a" && value.kind == ExpressionKind::Integer(1)
    ));
    assert_eq!(call(&statements[2]).name, "+");
    assert_eq!(statements[2].location, Location::new(2, 1));
}

#[test]
fn precedence_test() {
    let expr = single("1 + 2 * 3");
    let outer = call(&expr);
    assert_eq!(outer.name, "+");
    assert_eq!(call(&outer.arguments[0]).name, "*");

    let expr = single("2 ** 3 ** 2");
    let outer = call(&expr);
    assert_eq!(outer.receiver.as_ref().map(|r| &r.kind), Some(&ExpressionKind::Integer(2)));
    assert_eq!(call(&outer.arguments[0]).name, "**");

    let expr = single("a < b == c");
    assert_eq!(call(&expr).name, "==");
}

#[test]
fn unary_versus_binary_test() {
    for code in &["a - b", "a-b", "a -  b"] {
        let expr = single(code);
        let minus = call(&expr);
        assert_eq!(minus.name, "-", "`{}` should be a subtraction", code);
        assert!(minus.receiver.is_some());
    }

    let expr = single("foo -1");
    let foo = call(&expr);
    assert_eq!(foo.name, "foo");
    assert!(foo.receiver.is_none());
    assert_eq!(foo.arguments[0].kind, ExpressionKind::Integer(-1));

    let expr = single("[-1]");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::Array(items) if items[0].kind == ExpressionKind::Integer(-1)
    ));

    let expr = single("-x");
    assert_eq!(call(&expr).name, "-@");
}

#[test]
fn block_versus_hash_test() {
    let expr = single("foo { 1 }");
    let foo = call(&expr);
    assert_eq!(foo.name, "foo");
    assert!(foo.block.is_some());

    let expr = single("x = { a: 1, 'b' => 2 }");
    match expr.kind {
        ExpressionKind::Assignment { value, .. } => match value.kind {
            ExpressionKind::Hash(entries) => {
                assert_eq!(entries.len(), 2);
                assert!(matches!(
                    &entries[0].kind,
                    ExpressionKind::KeyValue { key, .. } if key.kind == ExpressionKind::Symbol(String::from("a"))
                ));
                assert!(matches!(
                    &entries[1].kind,
                    ExpressionKind::KeyValue { key, .. } if key.kind == ExpressionKind::String(String::from("b"))
                ));
            }
            other => panic!("expected a hash literal, got {:?}", other),
        },
        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn block_parameters_test() {
    let expr = single("list.each_with_index { |item, idx| item }");
    let each = call(&expr);
    let block = each.block.as_ref().expect("block is missing");
    let names: Vec<_> = block.parameters.iter().map(|param| param.name.as_str()).collect();
    assert_eq!(names, vec!["item", "idx"]);
}

#[test]
fn call_without_parens_test() {
    let expr = single("puts 1, 2");
    let puts = call(&expr);
    assert_eq!(puts.arguments.len(), 2);

    let expr = single("puts foo 1, 2");
    let puts = call(&expr);
    assert_eq!(puts.arguments.len(), 1);
    assert_eq!(call(&puts.arguments[0]).arguments.len(), 2);

    let expr = single("list.push 3");
    let push = call(&expr);
    assert!(push.receiver.is_some());
    assert_eq!(push.arguments.len(), 1);
}

#[test]
fn trailing_comma_is_an_error_test() {
    let error = parse("puts 1,").expect_err("input should not parse");
    assert_eq!(error.location, Location::new(1, 7));
}

#[test]
fn low_precedence_do_block_test() {
    let expr = single("foo.bar 1 do |x| x end");
    let bar = call(&expr);
    assert_eq!(bar.name, "bar");
    assert_eq!(bar.arguments.len(), 1);
    assert!(bar.block.is_some());
}

#[test]
fn while_do_test() {
    let expr = single("while x do y end");
    assert!(matches!(
        expr.kind,
        ExpressionKind::While { until: false, do_while: false, .. }
    ));

    let expr = single("begin\n  x += 1\nend while x < 5");
    assert!(matches!(expr.kind, ExpressionKind::While { do_while: true, .. }));
}

#[test]
fn modifier_test() {
    let expr = single("x = 1 if y");
    match expr.kind {
        ExpressionKind::If {
            condition,
            then_branch,
            else_branch: None,
        } => {
            assert_eq!(*condition, identifier(1, 10, "y"));
            assert!(matches!(then_branch.kind, ExpressionKind::Assignment { .. }));
        }
        other => panic!("expected a conditional, got {:?}", other),
    }

    let expr = single("x = risky rescue 0");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::Assignment { value, .. } if matches!(value.kind, ExpressionKind::Begin(_))
    ));
}

#[test]
fn logic_test() {
    let expr = single("a and b or c");
    match expr.kind {
        ExpressionKind::Logic {
            operator: LogicOperator::Or,
            lhs,
            ..
        } => assert!(matches!(
            lhs.kind,
            ExpressionKind::Logic { operator: LogicOperator::And, .. }
        )),
        other => panic!("expected a logical operation, got {:?}", other),
    }

    let expr = single("!a || b && c");
    assert!(matches!(
        expr.kind,
        ExpressionKind::Logic { operator: LogicOperator::Or, .. }
    ));
}

#[test]
fn ternary_test() {
    let expr = single("x ? :a : b ? 1 : 2");
    match expr.kind {
        ExpressionKind::Ternary {
            then_branch,
            else_branch,
            ..
        } => {
            assert_eq!(then_branch.kind, ExpressionKind::Symbol(String::from("a")));
            assert!(matches!(else_branch.kind, ExpressionKind::Ternary { .. }));
        }
        other => panic!("expected a ternary, got {:?}", other),
    }
}

#[test]
fn multiple_assignment_test() {
    let expr = single("a, *b = 1, 2, 3");
    match expr.kind {
        ExpressionKind::MultiAssignment { targets, values } => {
            assert_eq!(targets[0], AssignTarget::Identifier(String::from("a")));
            assert_eq!(
                targets[1],
                AssignTarget::Splat(Box::new(AssignTarget::Identifier(String::from("b"))))
            );
            assert_eq!(values.len(), 3);
        }
        other => panic!("expected a multiple assignment, got {:?}", other),
    }

    let expr = single("a, (b, *c) = 1, [2, 3]");
    match expr.kind {
        ExpressionKind::MultiAssignment { targets, .. } => {
            assert_eq!(
                targets[1],
                AssignTarget::Nested(vec![
                    AssignTarget::Identifier(String::from("b")),
                    AssignTarget::Splat(Box::new(AssignTarget::Identifier(String::from("c")))),
                ])
            );
        }
        other => panic!("expected a multiple assignment, got {:?}", other),
    }

    let expr = single("a = *1..3");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::Assignment { value, .. } if matches!(
            &value.kind,
            ExpressionKind::Array(items) if matches!(items[0].kind, ExpressionKind::Splat(_))
        )
    ));
}

#[test]
fn assignment_targets_test() {
    let expr = single("list[0] = 1");
    assert!(matches!(
        expr.kind,
        ExpressionKind::Assignment { target: AssignTarget::Index { .. }, .. }
    ));

    let expr = single("user&.name = 'x'");
    assert!(matches!(
        expr.kind,
        ExpressionKind::Assignment {
            target: AssignTarget::Attribute { safe_navigation: true, .. },
            ..
        }
    ));

    let expr = single("@count ||= 0");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::CompoundAssignment { target: AssignTarget::InstanceVariable(_), operator, .. }
            if operator == "||"
    ));

    let expr = single("x = 1, 2");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::Assignment { value, .. } if matches!(&value.kind, ExpressionKind::Array(items) if items.len() == 2)
    ));
}

#[test]
fn method_definition_test() {
    let expr = single("def f(a, b = 1, *c, d, &e)\n  a\nend");
    match expr.kind {
        ExpressionKind::MethodDefinition(def) => {
            assert_eq!(def.name, "f");
            assert!(!def.singleton);
            let kinds: Vec<_> = def
                .parameters
                .iter()
                .map(|param| match param.kind {
                    ParameterKind::Required => "required",
                    ParameterKind::Optional(_) => "optional",
                    ParameterKind::Splat => "splat",
                    ParameterKind::DoubleSplat => "double splat",
                    ParameterKind::Block => "block",
                })
                .collect();
            assert_eq!(kinds, vec!["required", "optional", "splat", "required", "block"]);
        }
        other => panic!("expected a method definition, got {:?}", other),
    }
}

#[test]
fn method_names_test() {
    let names: Vec<_> = statements(
        "def self.build; end\ndef ==(other); end\ndef [](idx); end\ndef []=(idx, value); end\ndef name=(value); end\ndef empty?; end\ndef class; end",
    )
    .into_iter()
    .map(|expr| match expr.kind {
        ExpressionKind::MethodDefinition(def) => def.name.clone(),
        other => panic!("expected a method definition, got {:?}", other),
    })
    .collect();

    assert_eq!(names, vec!["build", "==", "[]", "[]=", "name=", "empty?", "class"]);
}

#[test]
fn method_with_rescue_test() {
    let expr = single("def f\n  risky\nrescue => e\n  e\nend");
    match expr.kind {
        ExpressionKind::MethodDefinition(def) => match &def.body.kind {
            ExpressionKind::Begin(begin) => {
                assert_eq!(begin.rescues.len(), 1);
                assert_eq!(begin.rescues[0].variable.as_deref(), Some("e"));
                assert!(begin.rescues[0].classes.is_empty());
            }
            other => panic!("expected a protected body, got {:?}", other),
        },
        other => panic!("expected a method definition, got {:?}", other),
    }
}

#[test]
fn class_definition_test() {
    let expr = single("class A::B < C\n  def x; end\nend");
    match expr.kind {
        ExpressionKind::ClassDefinition {
            scope,
            name,
            superclass,
            body,
        } => {
            assert_eq!(name, "B");
            assert_eq!(
                scope.map(|scope| scope.kind),
                Some(ExpressionKind::Constant(String::from("A")))
            );
            assert_eq!(
                superclass.map(|superclass| superclass.kind),
                Some(ExpressionKind::Constant(String::from("C")))
            );
            assert!(matches!(body.kind, ExpressionKind::Sequence(ref statements) if statements.len() == 1));
        }
        other => panic!("expected a class definition, got {:?}", other),
    }
}

#[test]
fn begin_rescue_test() {
    const CODE: &str = "begin
  risky
rescue ArgumentError, TypeError => e
  recover
else
  fine
ensure
  cleanup
end";

    match single(CODE).kind {
        ExpressionKind::Begin(begin) => {
            assert_eq!(begin.rescues.len(), 1);
            assert_eq!(begin.rescues[0].classes.len(), 2);
            assert_eq!(begin.rescues[0].variable.as_deref(), Some("e"));
            assert!(begin.else_branch.is_some());
            assert!(begin.ensure_branch.is_some());
        }
        other => panic!("expected a begin block, got {:?}", other),
    }
}

#[test]
fn clauses_out_of_order_test() {
    assert!(parse("begin; 1; ensure; 2; rescue; 3; end").is_err());
    assert!(parse("if x; 1; else; 2; elsif y; 3; end").is_err());
    assert!(parse("unless x; 1; elsif y; 2; end").is_err());
    assert!(parse("case x\n  foo\nwhen 1 then 2\nend").is_err());
}

#[test]
fn if_elsif_else_test() {
    let expr = single("if a then 1 elsif b then 2 else 3 end");
    match expr.kind {
        ExpressionKind::If { else_branch: Some(else_branch), .. } => {
            assert!(matches!(
                else_branch.kind,
                ExpressionKind::If { else_branch: Some(_), .. }
            ));
        }
        other => panic!("expected a conditional, got {:?}", other),
    }

    let expr = single("unless a\n  1\nend");
    assert!(matches!(
        expr.kind,
        ExpressionKind::If { condition, .. } if matches!(condition.kind, ExpressionKind::Not(_))
    ));
}

#[test]
fn case_when_test() {
    const CODE: &str = "case x
when 1, 2 then 'low'
when 3 then 'mid'
else 'high'
end";

    match single(CODE).kind {
        ExpressionKind::Case {
            subject,
            clauses,
            else_branch,
        } => {
            assert!(subject.is_some());
            assert_eq!(clauses.len(), 2);
            assert_eq!(clauses[0].patterns.len(), 2);
            assert!(else_branch.is_some());
        }
        other => panic!("expected a case expression, got {:?}", other),
    }
}

#[test]
fn for_loop_test() {
    match single("for a, b in pairs do\n  a\nend").kind {
        ExpressionKind::For { variables, .. } => assert_eq!(variables, vec!["a", "b"]),
        other => panic!("expected a for loop, got {:?}", other),
    }
}

#[test]
fn string_interpolation_test() {
    match single("\"a #{b + 1} c\\n\"").kind {
        ExpressionKind::FormattedString(parts) => {
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[0], StringPart::Text(String::from("a ")));
            assert!(matches!(&parts[1], StringPart::Code(code) if call(code).name == "+"));
            assert_eq!(parts[2], StringPart::Text(String::from(" c\n")));
        }
        other => panic!("expected a formatted string, got {:?}", other),
    }
}

#[test]
fn lambda_test() {
    match single("->(x) { x * 2 }").kind {
        ExpressionKind::Lambda(block) => {
            assert_eq!(block.parameters.len(), 1);
            assert_eq!(block.parameters[0].name, "x");
        }
        other => panic!("expected a lambda, got {:?}", other),
    }
}

#[test]
fn paths_test() {
    let expr = single("Outer::Inner.build(1)[0]");
    let index = call(&expr);
    assert_eq!(index.name, "[]");
    let build = call(index.receiver.as_ref().expect("receiver is missing"));
    assert_eq!(build.name, "build");
    assert!(matches!(
        build.receiver.as_ref().map(|receiver| &receiver.kind),
        Some(ExpressionKind::ConstantPath { name, .. }) if name == "Inner"
    ));

    let expr = single("list\n  .map { |x| x }\n  &.first");
    let first = call(&expr);
    assert!(first.safe_navigation);
    assert_eq!(call(first.receiver.as_ref().expect("receiver is missing")).name, "map");
}

#[test]
fn control_keywords_test() {
    let expr = single("return 1, 2");
    assert!(matches!(
        &expr.kind,
        ExpressionKind::Control { kind: ControlKind::Return, value: Some(value) }
            if matches!(value.kind, ExpressionKind::Array(_))
    ));

    let expr = single("yield x, y");
    assert!(matches!(&expr.kind, ExpressionKind::Yield(args) if args.len() == 2));

    let expr = single("super");
    assert!(matches!(expr.kind, ExpressionKind::Super { arguments: None, .. }));

    let expr = single("super()");
    assert!(matches!(expr.kind, ExpressionKind::Super { arguments: Some(ref args), .. } if args.is_empty()));

    let expr = single("break if done");
    assert!(matches!(expr.kind, ExpressionKind::If { .. }));
}

#[test]
fn yield_and_super_operands_test() {
    let expr = single("yield + 1");
    let sum = call(&expr);
    assert_eq!(sum.name, "+");
    assert!(matches!(
        sum.receiver.as_ref().map(|receiver| &receiver.kind),
        Some(ExpressionKind::Yield(args)) if args.is_empty()
    ));

    let expr = single("yield == 1");
    assert_eq!(call(&expr).name, "==");

    let expr = single("super.x");
    let x = call(&expr);
    assert_eq!(x.name, "x");
    assert!(matches!(
        x.receiver.as_ref().map(|receiver| &receiver.kind),
        Some(ExpressionKind::Super { arguments: None, .. })
    ));

    let expr = single("super * 5");
    assert_eq!(call(&expr).name, "*");

    let expr = single("yield -x");
    assert!(matches!(&expr.kind, ExpressionKind::Yield(args) if args.len() == 1));
}

#[test]
fn defined_and_alias_test() {
    assert!(matches!(single("defined?(foo)").kind, ExpressionKind::Defined(_)));
    assert!(matches!(single("defined? @x").kind, ExpressionKind::Defined(_)));
    assert_eq!(
        single("alias size length").kind,
        ExpressionKind::Alias {
            new_name: String::from("size"),
            old_name: String::from("length"),
        }
    );
}

#[test]
fn range_test() {
    match single("x = 1...n + 1").kind {
        ExpressionKind::Assignment { value, .. } => match value.kind {
            ExpressionKind::Range { exclusive, to, .. } => {
                assert!(exclusive);
                assert_eq!(call(&to).name, "+");
            }
            other => panic!("expected a range, got {:?}", other),
        },
        other => panic!("expected an assignment, got {:?}", other),
    }
}

#[test]
fn keyword_arguments_test() {
    let expr = single("configure name: 'x', if: true");
    let configure = call(&expr);
    assert_eq!(configure.arguments.len(), 2);
    assert!(matches!(
        &configure.arguments[1].kind,
        ExpressionKind::KeyValue { key, .. } if key.kind == ExpressionKind::Symbol(String::from("if"))
    ));
}

#[test]
fn unexpected_token_test() {
    let error = parse("1 2").expect_err("input should not parse");
    assert_eq!(error.location, Location::new(1, 3));

    let error = parse("if x\n  1\n").expect_err("input should not parse");
    assert_eq!(error.location, Location::new(1, 1));

    assert!(parse("end").is_err());
    assert!(parse("foo(1, 2").is_err());
    assert!(parse("(1]").is_err());
}
