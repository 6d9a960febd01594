use garnet_core::Location;
use garnet_lexer::{Lexer, Token, TokenKind};

fn lex(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize().expect("lexing failed")
}

fn kinds_and_texts(input: &str) -> Vec<(TokenKind, String)> {
    lex(input)
        .into_iter()
        .map(|token| (token.kind, token.text))
        .collect()
}

#[test]
fn assignment_test() {
    let tokens = kinds_and_texts("total = 3.14");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("total")),
            (TokenKind::Operator, String::from("=")),
            (TokenKind::Float, String::from("3.14")),
        ]
    );
}

#[test]
fn method_call_on_integer_test() {
    let tokens = kinds_and_texts("3.times");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Integer, String::from("3")),
            (TokenKind::Operator, String::from(".")),
            (TokenKind::Identifier, String::from("times")),
        ]
    );
}

#[test]
fn exponent_test() {
    let tokens = kinds_and_texts("1e3 2.5e-2 7");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Float, String::from("1e3")),
            (TokenKind::Float, String::from("2.5e-2")),
            (TokenKind::Integer, String::from("7")),
        ]
    );
}

#[test]
fn underscored_integer_test() {
    let tokens = kinds_and_texts("1_000_000");

    assert_eq!(tokens, vec![(TokenKind::Integer, String::from("1000000"))]);
}

#[test]
fn newline_boundaries_test() {
    let tokens = lex("a = 1\n\n\nb = 2\n");
    let boundaries = tokens
        .iter()
        .filter(|token| token.is_end_of_statement())
        .count();

    assert_eq!(boundaries, 2);
    assert!(tokens[3].is_end_of_statement());
}

#[test]
fn greedy_operator_continuation_test() {
    let tokens = lex("total = 1 +\n  2");

    assert!(tokens.iter().all(|token| !token.is_end_of_statement()));
}

#[test]
fn leading_dot_continuation_test() {
    let tokens = lex("list\n  .map\n  &.first");
    assert!(tokens.iter().all(|token| !token.is_end_of_statement()));

    let tokens = lex("(1..\n2)");
    assert!(tokens.iter().all(|token| !token.is_end_of_statement()));
}

#[test]
fn range_on_next_line_is_not_continuation_test() {
    let tokens = lex("a\n..b");

    assert!(tokens[1].is_end_of_statement());
}

#[test]
fn semicolon_test() {
    let tokens = kinds_and_texts("a; b;; c");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("a")),
            (TokenKind::EndOfStatement, String::new()),
            (TokenKind::Identifier, String::from("b")),
            (TokenKind::EndOfStatement, String::new()),
            (TokenKind::Identifier, String::from("c")),
        ]
    );
}

#[test]
fn plain_string_literal_test() {
    let tokens = lex(r"'it\'s a \n test'");

    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].kind, TokenKind::String);
    assert_eq!(tokens[0].text, "it's a \\n test");
    assert!(!tokens[0].formatted);
}

#[test]
fn escaped_string_literal_test() {
    let tokens = lex(r#""tab\there\n""#);

    assert_eq!(tokens[0].text, "tab\there\n");
    assert!(!tokens[0].formatted);
}

#[test]
fn formatted_string_literal_test() {
    let tokens = lex(r#""sum: #{a + {b: 1}[:b]}\n""#);

    assert_eq!(tokens.len(), 1);
    assert!(tokens[0].formatted);
    assert_eq!(tokens[0].text, r"sum: #{a + {b: 1}[:b]}\n");
}

#[test]
fn multiline_string_location_test() {
    let tokens = lex("'some string with new\nline' + x");

    assert_eq!(tokens[0].text, "some string with new\nline");
    assert_eq!(tokens[2].location, Location::new(2, 9));
}

#[test]
fn symbol_literal_test() {
    let tokens = lex(":name :empty? :value= :+ :[]= :\"with space\"");
    let texts: Vec<_> = tokens.iter().map(|token| token.text.as_str()).collect();

    assert!(tokens.iter().all(|token| token.symbol));
    assert_eq!(
        texts,
        vec!["name", "empty?", "value=", "+", "[]=", "with space"]
    );
}

#[test]
fn key_colon_is_not_a_symbol_test() {
    let tokens = lex("{a: 1, b:2}");

    assert!(tokens[1].is_identifier("a"));
    assert!(tokens[2].is_operator(":"));
    assert!(tokens[5].is_identifier("b"));
    assert!(tokens[6].is_operator(":"));
    assert_eq!(tokens[7].kind, TokenKind::Integer);
}

#[test]
fn scope_resolution_test() {
    let tokens = kinds_and_texts("Outer::Inner");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("Outer")),
            (TokenKind::Operator, String::from("::")),
            (TokenKind::Identifier, String::from("Inner")),
        ]
    );
}

#[test]
fn variable_prefixes_test() {
    let tokens = kinds_and_texts("@a @@b $c $! empty? save!");
    let texts: Vec<_> = tokens.into_iter().map(|(_, text)| text).collect();

    assert_eq!(texts, vec!["@a", "@@b", "$c", "$!", "empty?", "save!"]);
}

#[test]
fn numbered_globals_test() {
    let tokens = kinds_and_texts("$0 + $12");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("$0")),
            (TokenKind::Operator, String::from("+")),
            (TokenKind::Identifier, String::from("$12")),
        ]
    );
}

#[test]
fn bang_before_equal_test() {
    let tokens = kinds_and_texts("a!=b");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("a")),
            (TokenKind::Operator, String::from("!=")),
            (TokenKind::Identifier, String::from("b")),
        ]
    );
}

#[test]
fn longest_operator_match_test() {
    let tokens = kinds_and_texts("a <=> b ** c ||= d ... e &. f");
    let operators: Vec<_> = tokens
        .into_iter()
        .filter(|(kind, _)| *kind == TokenKind::Operator)
        .map(|(_, text)| text)
        .collect();

    assert_eq!(operators, vec!["<=>", "**", "||=", "...", "&."]);
}

#[test]
fn whitespace_flags_test() {
    let tokens = lex("foo -1\nfoo - 1\nfoo(1)");

    assert!(tokens[1].whitespace_before);
    assert!(!tokens[1].whitespace_after);
    assert!(tokens[5].whitespace_before);
    assert!(tokens[5].whitespace_after);
    assert!(tokens[8].whitespace_before);
    assert!(!tokens[9].whitespace_before);
}

#[test]
fn comments_test() {
    let tokens = kinds_and_texts("a # comment\n=begin\nignored\n=end\nb\n__END__\nnot code");

    assert_eq!(
        tokens,
        vec![
            (TokenKind::Identifier, String::from("a")),
            (TokenKind::EndOfStatement, String::new()),
            (TokenKind::Identifier, String::from("b")),
            (TokenKind::EndOfStatement, String::new()),
        ]
    );
}

#[test]
fn unterminated_block_comment_test() {
    let error = Lexer::new("a\n=begin\nnever closed")
        .tokenize()
        .expect_err("lexing should fail");

    assert_eq!(error.location, Location::new(2, 1));
}

#[test]
fn unterminated_string_test() {
    let error = Lexer::new("x = 'open")
        .tokenize()
        .expect_err("lexing should fail");

    assert_eq!(error.location, Location::new(1, 5));
}

#[test]
fn locations_test() {
    let tokens = lex("a = 1\n  b");

    assert_eq!(tokens[0].location, Location::new(1, 1));
    assert_eq!(tokens[2].location, Location::new(1, 5));
    assert_eq!(tokens[4].location, Location::new(2, 3));
}
