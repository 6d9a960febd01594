use std::sync::Arc;

use garnet_interpreter::{CapturedConsole, Config, Error, Interpreter, Scope};

fn setup_interpreter() -> (Interpreter, Arc<CapturedConsole>) {
    let console = CapturedConsole::new();
    let config = Config::new().console(console.clone());
    (Interpreter::new(config), console)
}

/// Run some code, and render its result the way `p` would.
fn run(interpreter: &Interpreter, code: &str) -> Result<String, Error> {
    let value = interpreter.evaluate(code)?;
    interpreter.inspect(&value)
}

fn expect_error(code: &str) -> Error {
    let (interpreter, _) = setup_interpreter();
    match interpreter.evaluate(code) {
        Ok(value) => panic!(
            "'{}' unexpectedly evaluated to {:?}",
            code,
            interpreter.inspect(&value)
        ),
        Err(err) => err,
    }
}

#[test]
fn basic_interpreter_tests() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("a = 1; b = 2; a + b", "3"),
        ("def f; yield 2; end; f {|x| x * 10}", "20"),
        ("x = 0; loop { x += 1; break if x == 5 }; x", "5"),
        ("begin; raise 'boom'; rescue => e; e.message; end", "\"boom\""),
        (
            "class A; def a; 1; end; end; class A; def b; 2; end; end; A.new.a + A.new.b",
            "3",
        ),
        ("x = 1; [1].each { x = 2 }; x", "2"),
        ("2 ** 100", "1267650600228229401496703205376"),
        ("(2 ** 64) - (2 ** 64) + 1", "1"),
        ("7 / -2", "-4"),
        ("7 % -3", "-2"),
        ("1.0 / 0", "Infinity"),
        ("[3, 1, 2].sort.map { |x| x * 2 }", "[2, 4, 6]"),
        ("{a: 1}.merge({b: 2})", "{:a=>1, :b=>2}"),
        ("(1..10).select(&:even?).sum", "30"),
        ("out = []; [1, 2, 3, 4].each { |x| out << x * x if x.even? }; out", "[4, 16]"),
        ("'hello world'.split.map(&:capitalize).join(' ')", "\"Hello World\""),
        ("'a-b-c'.split('-', 2)", "[\"a\", \"b-c\"]"),
        ("'hello'[1..3]", "\"ell\""),
        ("'12abc'.to_i + '3.5kg'.to_f", "15.5"),
        ("'  padded  '.strip.capitalize", "\"Padded\""),
        ("\"line\\n\".chomp.chars", "[\"l\", \"i\", \"n\", \"e\"]"),
        ("x = 'ab'; x << 'c'; x", "\"abc\""),
        ("h = Hash.new { |hash, key| hash[key] = key * 2 }; h[3]; h", "{3=>6}"),
        ("[1, [2, [3]]].flatten", "[1, 2, 3]"),
        (
            "r = []; ['a', 'b', 'c'].each_with_index { |s, i| r << s * (i + 1) }; r",
            "[\"a\", \"bb\", \"ccc\"]",
        ),
        ("[[5, 3, 9].min, [5, 3, 9].max]", "[3, 9]"),
        ("[1, 2, 3].inject(:+)", "6"),
        ("(1..3).reduce(10) { |acc, x| acc + x }", "16"),
        ("h = {}; ['a', 'b', 'a'].each { |s| h[s] = h.fetch(s, 0) + 1 }; h", "{\"a\"=>2, \"b\"=>1}"),
        (
            "catch(:done) { 10.times { |i| throw :done, i if i == 3 }; :never }",
            "3",
        ),
        ("l = ->(a, b) { a + b }; [l.call(1, 2), l.arity, l.lambda?]", "[3, 2, true]"),
        ("s = 'x'; r = WeakRef.new(s); [r.get, r.weakref_alive?]", "[\"x\", true]"),
        ("Math.sqrt(16)", "4.0"),
        ("Math.sqrt(-1).nan?", "true"),
        ("nil.to_a + [nil.to_s]", "[\"\"]"),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }

    let err = run(&interpreter, ":abc.to_proc.call('x')")
        .expect_err("calling an undefined method should fail");
    assert_eq!(err.class_name(), Some("NoMethodError"));
}

#[test]
fn console_output_test() {
    let (interpreter, console) = setup_interpreter();

    interpreter
        .evaluate("puts 'hi'; p([1, 'a']); print 1, 2; puts([3, [4]]); puts nil")
        .expect("printing should not fail");

    assert_eq!(console.output(), "hi\n[1, \"a\"]\n123\n4\n\n");
}

#[test]
fn break_skips_the_rest_of_the_body_test() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("out = []; [1, 2].each { |x| out << :a; break; out << :b }; out", "[:a]"),
        ("out = []; while true; out << :a; break; out << :b; end; out", "[:a]"),
        ("out = []; for i in 1..3; next if i == 2; out << i; end; out", "[1, 3]"),
        ("[1, 2, 3].each { |x| break x * 10 if x == 2 }", "20"),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }
}

#[test]
fn parameter_binding_test() {
    let (interpreter, _) = setup_interpreter();

    const DEFINITION: &str = "def f(a, b = 1, *c, d, &e); [a, b, c, d]; end;";

    let bound = run(&interpreter, &format!("{} f(0, 5, 2)", DEFINITION))
        .expect("three arguments should be accepted");
    assert_eq!(bound, "[0, 5, [], 2]");

    let bound = run(&interpreter, &format!("{} f(0, 1, 2, 3, 4)", DEFINITION))
        .expect("extra arguments should be collected");
    assert_eq!(bound, "[0, 1, [2, 3], 4]");

    let err = interpreter
        .evaluate(&format!("{} f(0, 1)", DEFINITION))
        .expect_err("two arguments should be rejected");
    assert_eq!(err.class_name(), Some("ArgumentError"));

    let rescued = run(
        &interpreter,
        &format!(
            "{} begin; f(1); rescue ArgumentError => e; e.class; end",
            DEFINITION
        ),
    )
    .expect("the arity error should be rescuable");
    assert_eq!(rescued, "ArgumentError");
}

#[test]
fn rescue_ordering_test() {
    let (interpreter, _) = setup_interpreter();

    const CODE: &str = "
        log = []
        class MyError < StandardError; end
        class SubError < MyError; end
        begin
          raise SubError, 'x'
        rescue SubError
          log << :sub
        rescue MyError
          log << :my
        ensure
          log << :ensure
        end
        begin
          begin
            raise MyError
          rescue SubError
            log << :wrong
          ensure
            log << :inner
          end
        rescue => e
          log << e.class.name
        end
        log
    ";

    assert_eq!(
        run(&interpreter, CODE).expect("the program should run"),
        "[:sub, :ensure, :inner, \"MyError\"]"
    );
}

#[test]
fn ensure_overrides_and_retries_test() {
    let (interpreter, _) = setup_interpreter();

    const CODE: &str = "
        attempts = 0
        result = begin
          attempts += 1
          raise 'again' if attempts < 3
          attempts
        rescue
          retry
        end
        def g
          return 1
        ensure
          @ran = true
        end
        [result, g, @ran]
    ";

    assert_eq!(
        run(&interpreter, CODE).expect("the program should run"),
        "[3, 1, true]"
    );
}

#[test]
fn fresh_scopes_give_identical_results_test() {
    let (interpreter, console) = setup_interpreter();

    let program = interpreter
        .parse("x = 1; x += 1; puts x; [x, 'y' * x]")
        .expect("the program should parse");

    let first = interpreter
        .interpret_in(&program, &Scope::new())
        .expect("the first run should succeed");
    let first_output = console.take();
    let second = interpreter
        .interpret_in(&program, &Scope::new())
        .expect("the second run should succeed");
    let second_output = console.take();

    assert_eq!(
        interpreter.inspect(&first).expect("inspect should succeed"),
        interpreter.inspect(&second).expect("inspect should succeed"),
    );
    assert_eq!(first_output, second_output);
}

#[test]
fn persistent_scope_test() {
    let (interpreter, _) = setup_interpreter();
    let scope = Scope::new();

    for code in &["counter = 1", "counter += 41"] {
        let program = interpreter.parse(code).expect("the entry should parse");
        interpreter
            .interpret_in(&program, &scope)
            .expect("the entry should run");
    }

    let program = interpreter.parse("counter").expect("the entry should parse");
    let value = interpreter
        .interpret_in(&program, &scope)
        .expect("the entry should run");
    assert_eq!(interpreter.inspect(&value).expect("inspect should succeed"), "42");
}

#[test]
fn mortal_symbol_capacity_test() {
    let config = Config::new()
        .console(CapturedConsole::new())
        .mortal_symbol_capacity(2);
    let interpreter = Interpreter::new(config);
    let (immortal_before, _) = interpreter.universe().symbols.len();

    interpreter
        .evaluate("'zq_one'.to_sym; 'zq_two'.to_sym; 'zq_three'.to_sym")
        .expect("the program should run");

    let (immortal_after, mortal) = interpreter.universe().symbols.len();
    assert!(mortal <= 2, "the mortal table grew to {} entries", mortal);
    assert!(immortal_after >= immortal_before);
}

#[test]
fn superclass_mismatch_test() {
    let err = expect_error("class A; end; class B; end; class A < B; end");
    assert_eq!(err.class_name(), Some("TypeError"));
    assert!(err.to_string().contains("superclass mismatch for class A"));

    let (interpreter, _) = setup_interpreter();
    let rescued = run(
        &interpreter,
        "class P; end; class C < P; end; begin; class C < String; end; rescue TypeError; :mismatch; end",
    )
    .expect("the mismatch should be rescuable");
    assert_eq!(rescued, ":mismatch");
}

#[test]
fn uncaught_signals_test() {
    let err = expect_error("throw :nowhere");
    assert_eq!(err.class_name(), Some("UncaughtThrowError"));

    let err = expect_error("break");
    assert_eq!(err.class_name(), Some("LocalJumpError"));

    let err = expect_error("undefined_thing");
    assert_eq!(err.class_name(), Some("NameError"));
    assert!(err.is_guest_error());
}

#[test]
fn warning_test() {
    let (interpreter, console) = setup_interpreter();

    let value = run(&interpreter, "X = 1\nX = 2\nX").expect("the program should run");
    assert_eq!(value, "2");
    assert!(console
        .output()
        .contains("warning: already initialized constant X"));
}

#[test]
fn thread_test() {
    for &thread_safety in &[true, false] {
        let config = Config::new()
            .console(CapturedConsole::new())
            .thread_safety(thread_safety);
        let interpreter = Interpreter::new(config);

        let tests: &[(&str, &str)] = &[
            ("t = Thread.new { 1 + 1 }; t.value", "2"),
            ("t = Thread.new(5) { |x| x * 2 }; t.join; [t.value, t.alive?]", "[10, false]"),
            (
                "t = Thread.new { raise 'oops' }; begin; t.join; rescue => e; e.message; end",
                "\"oops\"",
            ),
            ("Thread.current == Thread.current", "true"),
        ];

        for (code, expected) in tests {
            let rendered = run(&interpreter, code)
                .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
            assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
        }
    }
}

#[test]
fn stopping_a_thread_test() {
    let (interpreter, _) = setup_interpreter();

    const CODE: &str = "
        t = Thread.new { loop { sleep 0.01 } }
        t.stop
        t.join
        t.alive?
    ";

    assert_eq!(run(&interpreter, CODE).expect("the program should run"), "false");
}

#[test]
fn sandbox_test() {
    let config = Config::new().console(CapturedConsole::new()).sandbox(true);
    let interpreter = Interpreter::new(config);

    let err = interpreter
        .evaluate("File.exist?('Cargo.toml')")
        .expect_err("File should not be reachable in a sandbox");
    assert_eq!(err.class_name(), Some("NameError"));
}

#[test]
fn arguments_test() {
    let (interpreter, _) = setup_interpreter();
    interpreter.set_arguments("script.gt", &[String::from("one"), String::from("two")]);

    assert_eq!(
        run(&interpreter, "[$0, ARGV]").expect("the program should run"),
        "[\"script.gt\", [\"one\", \"two\"]]"
    );
}

#[test]
fn double_splat_binding_test() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("def f(a, **o); [a, o]; end; f(1, x: 2, y: 3)", "[1, {:x=>2, :y=>3}]"),
        ("def f(**o); o; end; f(a: 1)", "{:a=>1}"),
        ("def f(**o); o; end; f", "{}"),
        ("def f(a, **o); [a, o]; end; f(1, {x: 2}, {y: 3})", "[1, {:x=>2, :y=>3}]"),
        ("def f(a, **o); [a, o]; end; f({k: 1})", "[{:k=>1}, {}]"),
        ("def f(a, *r, **o); [a, r, o]; end; f(1, 2, z: 3)", "[1, [2], {:z=>3}]"),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }

    let err = expect_error("def f(a, **o); a; end; f(1, 2)");
    assert_eq!(err.class_name(), Some("ArgumentError"));
}

#[test]
fn access_control_test() {
    let (interpreter, _) = setup_interpreter();

    const CODE: &str = "
        class Account
          def initialize(balance); @balance = balance; end
          def richer?(other); balance > other.balance; end
          def peek(other); other.secret; end
          def own; self.secret; end
          protected
          def balance; @balance; end
          private
          def secret; :hidden; end
        end
        class Savings < Account
          def combined(other); balance + other.balance; end
        end
        a = Account.new(5)
        b = Account.new(3)
        [a.richer?(b), a.own, a.peek(b), Savings.new(1).combined(a)]
    ";

    assert_eq!(
        run(&interpreter, CODE).expect("the program should run"),
        "[true, :hidden, :hidden, 6]"
    );

    let err = run(&interpreter, "Account.new(1).secret").expect_err("private methods are hidden");
    assert_eq!(err.class_name(), Some("NoMethodError"));
    assert!(err.to_string().contains("private method 'secret'"));

    let err = run(&interpreter, "Account.new(1).balance").expect_err("protected methods are hidden");
    assert_eq!(err.class_name(), Some("NoMethodError"));
    assert!(err.to_string().contains("protected method 'balance'"));
}

#[test]
fn method_missing_test() {
    let (interpreter, _) = setup_interpreter();

    const CODE: &str = "
        class Ghost
          def method_missing(name, *args); [name, args]; end
        end
        Ghost.new.anything(1, 2)
    ";

    assert_eq!(
        run(&interpreter, CODE).expect("the program should run"),
        "[:anything, [1, 2]]"
    );

    let err = run(&interpreter, "Object.new.nothing").expect_err("the method does not exist");
    assert_eq!(err.class_name(), Some("NoMethodError"));
    assert!(err.to_string().contains("undefined method 'nothing'"));
}

#[test]
fn yield_and_super_operands_test() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("def f; yield + 1; end; f { 1 }", "2"),
        ("def f; yield == 1; end; f { 1 }", "true"),
        ("def f; yield.to_s; end; f { 5 }", "\"5\""),
        ("def f(x); yield -x; end; f(3) { |v| v * 2 }", "-6"),
        (
            "class P; def v; 2; end; end; class C < P; def v; super * 5; end; end; C.new.v",
            "10",
        ),
        (
            "class Q < P; def v; super.to_s + '!'; end; end; Q.new.v",
            "\"2!\"",
        ),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }
}

#[test]
fn lambda_and_block_arity_test() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("pr = proc { |a, b| [a, b] }; pr.call(1)", "[1, nil]"),
        ("pr = proc { |a, b| [a, b] }; pr.call(1, 2, 3)", "[1, 2]"),
        ("def f; yield 1, 2, 3; end; f { |a| a }", "1"),
        ("def f; yield; end; f { |a, b| [a, b] }", "[nil, nil]"),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }

    let err = expect_error("l = ->(a, b) { [a, b] }; l.call(1)");
    assert_eq!(err.class_name(), Some("ArgumentError"));
    assert!(err.to_string().contains("given 1, expected 2"));

    let err = expect_error("lambda { |a| a }.call(1, 2)");
    assert_eq!(err.class_name(), Some("ArgumentError"));
}

#[test]
fn destructuring_assignment_test() {
    let (interpreter, _) = setup_interpreter();

    let tests: &[(&str, &str)] = &[
        ("a, (b, c) = 1, [2, 3]; [a, b, c]", "[1, 2, 3]"),
        ("(m, n), r = [1, 2], 3; [m, n, r]", "[1, 2, 3]"),
        ("a, (b, *c) = 0, [1, 2, 3]; [a, b, c]", "[0, 1, [2, 3]]"),
        ("x = *1..3; x", "[1, 2, 3]"),
    ];

    for (code, expected) in tests {
        let rendered = run(&interpreter, code)
            .unwrap_or_else(|err| panic!("'{}' failed: {}", code, err));
        assert_eq!(&rendered, expected, "unexpected result for '{}'", code);
    }
}

#[test]
fn oversized_shift_test() {
    let (interpreter, _) = setup_interpreter();

    assert_eq!(
        run(&interpreter, "[1 << 70, 0 << 100000000000, 5 >> 100000000000]")
            .expect("the program should run"),
        "[1180591620717411303424, 0, 0]"
    );

    let err = expect_error("1 << 100000000000");
    assert_eq!(err.class_name(), Some("RangeError"));
}

#[test]
fn console_input_test() {
    let console = CapturedConsole::with_input(vec!["ab", "line"]);
    let interpreter = Interpreter::new(Config::new().console(console.clone()));

    assert_eq!(
        run(&interpreter, "[getc, getc, getc, gets, getc]").expect("the program should run"),
        "[\"a\", \"b\", \"\\n\", \"line\\n\", nil]"
    );
}
