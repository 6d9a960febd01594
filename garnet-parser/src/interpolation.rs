use garnet_core::ast::{Expression, ExpressionKind, MethodCall, StringPart};
use garnet_core::SyntaxError;
use garnet_lexer::{unescape, Token};

/// Split the raw text of a formatted string token into literal text and embedded code.
pub fn splice(token: &Token) -> Result<Expression, SyntaxError> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let chars: Vec<char> = token.text.chars().collect();
    let mut idx = 0;

    while idx < chars.len() {
        match chars[idx] {
            '\\' => {
                text.push('\\');
                if let Some(&next) = chars.get(idx + 1) {
                    text.push(next);
                }
                idx += 2;
            }
            '#' if chars.get(idx + 1) == Some(&'{') => {
                if !text.is_empty() {
                    parts.push(StringPart::Text(unescape(&text)));
                    text.clear();
                }
                let start = idx + 2;
                let mut depth = 1;
                let mut end = start;
                while end < chars.len() {
                    match chars[end] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    end += 1;
                }
                if depth != 0 {
                    return Err(SyntaxError::new(token.location, "unterminated string interpolation"));
                }
                let code: String = chars[start..end].iter().collect();
                let mut origin = token.location;
                origin.column += start;
                parts.push(StringPart::Code(crate::parse_embedded(&code, origin)?));
                idx = end + 1;
            }
            ch => {
                text.push(ch);
                idx += 1;
            }
        }
    }
    if !text.is_empty() {
        parts.push(StringPart::Text(unescape(&text)));
    }

    let string = Expression::new(token.location, ExpressionKind::FormattedString(parts));
    if !token.symbol {
        return Ok(string);
    }
    Ok(Expression::new(
        token.location,
        ExpressionKind::MethodCall(MethodCall {
            receiver: Some(Box::new(string)),
            name: String::from("to_sym"),
            arguments: Vec::new(),
            block: None,
            safe_navigation: false,
        }),
    ))
}
