use garnet_core::{Location, SyntaxError};

use crate::token::{Token, TokenKind};

/// The lexer for Garnet.
pub struct Lexer {
    pub(crate) chars: Vec<char>,
    pub(crate) position: usize,
    pub(crate) line: usize,
    pub(crate) column: usize,
    pub(crate) tokens: Vec<Token>,
    pub(crate) pending_whitespace: bool,
    pub(crate) origin: Option<Location>,
}

impl Lexer {
    const OPERATORS: &'static [&'static str] = &[
        "**=", "<=>", "===", "...", "&&=", "||=", "<<=", ">>=", "**", "==", "!=", ">=", "<=", "&&",
        "||", "<<", ">>", "=~", "+=", "-=", "*=", "/=", "%=", "|=", "&=", "^=", "::", "..", "=>",
        "->", "&.", "+", "-", "*", "/", "%", "=", "<", ">", "!", "&", "|", "^", "~", "?", ":", ",",
        ".", "(", ")", "[", "]", "{", "}",
    ];
    const SYMBOL_OPERATORS: &'static [&'static str] = &[
        "[]=", "<=>", "===", "[]", "**", "==", "!=", ">=", "<=", "<<", ">>", "+@", "-@", "=~", "+",
        "-", "*", "/", "%", "<", ">", "!", "&", "|", "^", "~",
    ];
    const END_MARKER: &'static str = "__END__";

    pub fn new<T: AsRef<str>>(input: T) -> Lexer {
        Lexer {
            chars: input.as_ref().chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            tokens: Vec::new(),
            pending_whitespace: true,
            origin: None,
        }
    }

    /// Report locations relative to `origin` (for code embedded within a string literal).
    pub fn with_origin(mut self, origin: Location) -> Lexer {
        self.origin = Some(origin);
        self
    }

    /// Scan the whole input into a token stream.
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        if self.rest_starts_with("=begin") {
            self.skip_block_comment()?;
        }
        while let Some(ch) = self.peek(0) {
            match ch {
                '\n' => self.lex_newline()?,
                '\\' if self.peek(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                    self.pending_whitespace = true;
                }
                _ if ch.is_whitespace() => {
                    self.bump();
                    self.pending_whitespace = true;
                }
                '#' => {
                    while let Some(ch) = self.peek(0) {
                        if ch == '\n' {
                            break;
                        }
                        self.bump();
                    }
                    self.pending_whitespace = true;
                }
                ';' => {
                    self.bump();
                    self.push_end_of_statement();
                    self.pending_whitespace = true;
                }
                '\'' => self.lex_plain_string()?,
                '"' => self.lex_formatted_string(false)?,
                ':' if self.starts_symbol() => self.lex_symbol()?,
                _ if ch.is_ascii_digit() => self.lex_number(),
                _ if Lexer::is_identifier_start(ch) || ch == '@' || ch == '$' => {
                    self.lex_identifier()?
                }
                _ => self.lex_operator()?,
            }
        }
        if let Some(last) = self.tokens.last_mut() {
            last.whitespace_after = true;
        }
        Ok(self.tokens)
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek(0)?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn location(&self) -> Location {
        let location = Location::new(self.line, self.column);
        match self.origin {
            Some(origin) => location.relative_to(origin),
            None => location,
        }
    }

    fn error(&self, location: Location, message: impl Into<String>) -> SyntaxError {
        SyntaxError::new(location, message)
    }

    fn rest_starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(idx, ch)| self.peek(idx) == Some(ch))
    }

    fn push(&mut self, mut token: Token) {
        token.whitespace_before = self.pending_whitespace;
        if let Some(last) = self.tokens.last_mut() {
            last.whitespace_after = self.pending_whitespace;
        }
        self.pending_whitespace = false;
        self.tokens.push(token);
    }

    fn push_end_of_statement(&mut self) {
        match self.tokens.last() {
            None => {}
            Some(last) if last.is_end_of_statement() => {}
            Some(_) => {
                let location = self.location();
                self.push(Token::new(TokenKind::EndOfStatement, "", location));
            }
        }
    }

    fn lex_newline(&mut self) -> Result<(), SyntaxError> {
        self.bump();
        self.pending_whitespace = true;

        let continues = match self.tokens.last() {
            Some(last) => last.is_greedy() || self.next_line_starts_with_dot(),
            None => true,
        };
        if !continues {
            self.push_end_of_statement();
            self.pending_whitespace = true;
        }

        if self.rest_starts_with("=begin") {
            self.skip_block_comment()?;
        }
        if self.rest_starts_with(Lexer::END_MARKER) {
            let after = self.peek(Lexer::END_MARKER.len());
            if after.is_none() || after == Some('\n') || after == Some('\r') {
                self.position = self.chars.len();
            }
        }
        Ok(())
    }

    fn next_line_starts_with_dot(&self) -> bool {
        let mut offset = 0;
        while let Some(ch) = self.peek(offset) {
            if ch == '\n' || !ch.is_whitespace() {
                break;
            }
            offset += 1;
        }
        match (self.peek(offset), self.peek(offset + 1)) {
            (Some('.'), Some('.')) => false,
            (Some('.'), _) => true,
            (Some('&'), Some('.')) => true,
            _ => false,
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), SyntaxError> {
        let start = self.location();
        loop {
            // Skip the rest of the current line.
            loop {
                match self.bump() {
                    Some('\n') => break,
                    Some(_) => continue,
                    None => {
                        return Err(self.error(start, "unterminated block comment (missing `=end`)"))
                    }
                }
            }
            if self.rest_starts_with("=end") {
                while let Some(ch) = self.peek(0) {
                    if ch == '\n' {
                        break;
                    }
                    self.bump();
                }
                self.pending_whitespace = true;
                return Ok(());
            }
        }
    }

    fn is_identifier_start(ch: char) -> bool {
        ch.is_alphabetic() || ch == '_'
    }

    fn is_identifier_char(ch: char) -> bool {
        ch.is_alphanumeric() || ch == '_'
    }

    fn lex_identifier(&mut self) -> Result<(), SyntaxError> {
        let location = self.location();
        let mut ident = String::new();

        match self.peek(0) {
            Some('@') => {
                ident.push('@');
                self.bump();
                if self.peek(0) == Some('@') {
                    ident.push('@');
                    self.bump();
                }
            }
            Some('$') => {
                ident.push('$');
                self.bump();
                match self.peek(0) {
                    Some(ch) if ch.is_ascii_digit() => {
                        while let Some(digit) = self.peek(0).filter(char::is_ascii_digit) {
                            ident.push(digit);
                            self.bump();
                        }
                        self.push(Token::new(TokenKind::Identifier, ident, location));
                        return Ok(());
                    }
                    Some(ch) if "!@~&".contains(ch) => {
                        ident.push(ch);
                        self.bump();
                        self.push(Token::new(TokenKind::Identifier, ident, location));
                        return Ok(());
                    }
                    Some(ch) if Lexer::is_identifier_char(ch) => {}
                    _ => return Err(self.error(location, "invalid global variable name")),
                }
            }
            _ => {}
        }

        match self.peek(0) {
            Some(ch) if Lexer::is_identifier_start(ch) => {}
            _ => return Err(self.error(location, format!("invalid name `{}`", ident))),
        }
        while let Some(ch) = self.peek(0) {
            if !Lexer::is_identifier_char(ch) {
                break;
            }
            ident.push(ch);
            self.bump();
        }
        if let Some(ch @ ('?' | '!')) = self.peek(0) {
            let is_sigil_free = !ident.starts_with('@') && !ident.starts_with('$');
            let before_assignment = self.peek(1) == Some('=') && self.peek(2) != Some('=');
            if is_sigil_free && !before_assignment {
                ident.push(ch);
                self.bump();
            }
        }

        self.push(Token::new(TokenKind::Identifier, ident, location));
        Ok(())
    }

    fn lex_number(&mut self) {
        let location = self.location();
        let mut digits = String::new();
        while let Some(ch) = self.peek(0) {
            match ch {
                '0'..='9' => digits.push(ch),
                '_' if matches!(self.peek(1), Some('0'..='9')) => {}
                _ => break,
            }
            self.bump();
        }
        self.push(Token::new(TokenKind::Integer, digits, location));

        // `1 . 5` was lexed as three tokens, fold them back into a float.
        let len = self.tokens.len();
        if len >= 3 {
            let (int, dot, frac) = (&self.tokens[len - 3], &self.tokens[len - 2], &self.tokens[len - 1]);
            let adjacent = !dot.whitespace_before && !frac.whitespace_before;
            if int.kind == TokenKind::Integer && dot.is_operator(".") && adjacent {
                let text = format!("{}.{}", int.text, frac.text);
                let mut float = self.tokens.remove(len - 3);
                self.tokens.truncate(len - 3);
                float.kind = TokenKind::Float;
                float.text = text;
                self.tokens.push(float);
            }
        }

        // A trailing exponent turns the literal into a scaled float.
        let has_exponent = match (self.peek(0), self.peek(1), self.peek(2)) {
            (Some('e' | 'E'), Some('0'..='9'), _) => true,
            (Some('e' | 'E'), Some('+' | '-'), Some('0'..='9')) => true,
            _ => false,
        };
        if has_exponent {
            let mut suffix = String::from("e");
            self.bump();
            if let Some(sign @ ('+' | '-')) = self.peek(0) {
                suffix.push(sign);
                self.bump();
            }
            while let Some(ch @ '0'..='9') = self.peek(0) {
                suffix.push(ch);
                self.bump();
            }
            if let Some(last) = self.tokens.last_mut() {
                last.kind = TokenKind::Float;
                last.text.push_str(&suffix);
            }
        }
    }

    fn lex_plain_string(&mut self) -> Result<(), SyntaxError> {
        let location = self.location();
        self.bump();
        let mut output = String::new();
        loop {
            match self.bump() {
                Some('\'') => break,
                Some('\\') => match self.peek(0) {
                    Some(ch @ ('\\' | '\'')) => {
                        output.push(ch);
                        self.bump();
                    }
                    _ => output.push('\\'),
                },
                Some(ch) => output.push(ch),
                None => return Err(self.error(location, "unterminated string literal")),
            }
        }
        self.push(Token::new(TokenKind::String, output, location));
        Ok(())
    }

    /// Lex a double-quoted string. Strings containing interpolation are kept raw so the parser can split them.
    fn lex_formatted_string(&mut self, symbol: bool) -> Result<(), SyntaxError> {
        let location = self.location();
        self.bump();
        let mut raw = String::new();
        let mut formatted = false;
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => {
                    raw.push('\\');
                    match self.bump() {
                        Some(ch) => raw.push(ch),
                        None => return Err(self.error(location, "unterminated string literal")),
                    }
                }
                Some('#') if self.peek(0) == Some('{') => {
                    formatted = true;
                    raw.push('#');
                    raw.push('{');
                    self.bump();
                    let mut depth = 1;
                    while depth > 0 {
                        match self.bump() {
                            Some('{') => {
                                depth += 1;
                                raw.push('{');
                            }
                            Some('}') => {
                                depth -= 1;
                                raw.push('}');
                            }
                            Some(ch) => raw.push(ch),
                            None => {
                                return Err(self.error(location, "unterminated string interpolation"))
                            }
                        }
                    }
                }
                Some(ch) => raw.push(ch),
                None => return Err(self.error(location, "unterminated string literal")),
            }
        }

        let text = if formatted { raw } else { unescape(&raw) };
        let mut token = Token::new(TokenKind::String, text, location);
        token.formatted = formatted;
        token.symbol = symbol;
        self.push(token);
        Ok(())
    }

    fn starts_symbol(&self) -> bool {
        if self.peek(1) == Some(':') {
            return false;
        }
        // `key: value` (no whitespace after the key) is a key/value separator.
        let after_key = match self.tokens.last() {
            Some(last) => !self.pending_whitespace && !last.is_greedy() && !last.is_end_of_statement(),
            None => false,
        };
        if after_key {
            return false;
        }
        match self.peek(1) {
            Some('"') => true,
            Some(ch) if Lexer::is_identifier_start(ch) || ch == '@' || ch == '$' => true,
            Some(_) => self.symbol_operator().is_some(),
            None => false,
        }
    }

    fn symbol_operator(&self) -> Option<&'static str> {
        Lexer::SYMBOL_OPERATORS.iter().copied().find(|op| {
            op.chars()
                .enumerate()
                .all(|(idx, ch)| self.peek(idx + 1) == Some(ch))
        })
    }

    fn lex_symbol(&mut self) -> Result<(), SyntaxError> {
        let location = self.location();
        if self.peek(1) == Some('"') {
            self.bump();
            return self.lex_formatted_string(true).map(|()| {
                if let Some(last) = self.tokens.last_mut() {
                    last.location = location;
                }
            });
        }

        if let Some(op) = self.symbol_operator() {
            if !self.peek(1).map_or(false, |ch| Lexer::is_identifier_start(ch) || ch == '@' || ch == '$') {
                self.bump();
                for _ in op.chars() {
                    self.bump();
                }
                let mut token = Token::new(TokenKind::String, op, location);
                token.symbol = true;
                self.push(token);
                return Ok(());
            }
        }

        self.bump();
        self.lex_identifier()?;
        if let Some(mut token) = self.tokens.pop() {
            if self.peek(0) == Some('=') && !matches!(self.peek(1), Some('=' | '>' | '~')) {
                let last = token.text.chars().last();
                if !matches!(last, Some('?' | '!')) {
                    token.text.push('=');
                    self.bump();
                }
            }
            token.kind = TokenKind::String;
            token.symbol = true;
            token.location = location;
            self.tokens.push(token);
        }
        Ok(())
    }

    fn lex_operator(&mut self) -> Result<(), SyntaxError> {
        let location = self.location();
        let op = Lexer::OPERATORS
            .iter()
            .copied()
            .find(|op| self.rest_starts_with(op));
        match op {
            Some(op) => {
                for _ in op.chars() {
                    self.bump();
                }
                self.push(Token::new(TokenKind::Operator, op, location));
                Ok(())
            }
            None => {
                let ch = self.peek(0).unwrap_or_default();
                Err(self.error(location, format!("invalid character `{}`", ch)))
            }
        }
    }
}

/// Resolve the escape sequences of a double-quoted string.
pub fn unescape(raw: &str) -> String {
    let mut output = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            output.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => output.push('\n'),
            Some('t') => output.push('\t'),
            Some('r') => output.push('\r'),
            Some('0') => output.push('\0'),
            Some('e') => output.push('\x1b'),
            Some('s') => output.push(' '),
            Some('a') => output.push('\x07'),
            Some('b') => output.push('\x08'),
            Some(ch) => output.push(ch),
            None => output.push('\\'),
        }
    }
    output
}
