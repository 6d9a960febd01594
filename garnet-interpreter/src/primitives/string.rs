use std::cmp::Ordering;
use std::convert::TryFrom;
use std::sync::Arc;

use num_bigint::BigInt;

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::instance::Payload;
use crate::invokable::Return;
use crate::primitives::array::{resolve_range, resolve_slice};
use crate::primitives::{expect_integer, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::{quote, Value};

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("initialize", self::initialize, false),
    ("+", self::plus, true),
    ("*", self::times, true),
    ("<<", self::append, true),
    ("concat", self::append, true),
    ("==", self::eq, true),
    ("===", self::eq, true),
    ("eql?", self::eq, true),
    ("<=>", self::cmp, true),
    ("<", self::lt, true),
    ("<=", self::le, true),
    (">", self::gt, true),
    (">=", self::ge, true),
    ("length", self::length, true),
    ("size", self::length, true),
    ("empty?", self::is_empty, true),
    ("upcase", self::upcase, true),
    ("downcase", self::downcase, true),
    ("capitalize", self::capitalize, true),
    ("reverse", self::reverse, true),
    ("include?", self::include, true),
    ("start_with?", self::start_with, true),
    ("end_with?", self::end_with, true),
    ("strip", self::strip, true),
    ("chomp", self::chomp, true),
    ("split", self::split, true),
    ("chars", self::chars, true),
    ("to_i", self::to_i, true),
    ("to_f", self::to_f, true),
    ("to_s", self::to_s, true),
    ("to_str", self::to_s, true),
    ("to_sym", self::to_sym, true),
    ("[]", self::slice, true),
    ("slice", self::slice, true),
    ("replace", self::replace, true),
    ("clear", self::clear, true),
    ("ord", self::ord, true),
    ("freeze", self::freeze, true),
    ("frozen?", self::is_frozen, true),
    ("inspect", self::inspect_string, true),
];

/// Get the text of a string receiver (or argument).
fn text_of(universe: &Universe, signature: &str, value: &Value) -> Result<String, Return> {
    value
        .as_string()
        .ok_or_else(|| universe.wrong_type(signature, value))
}

/// Get the text of a string argument, raising the conversion error the language reports.
fn implicit_text(universe: &Universe, value: &Value) -> Result<String, Return> {
    value.as_string().ok_or_else(|| {
        universe.raise(
            &universe.core.type_error,
            format!(
                "no implicit conversion of {} into String",
                match value {
                    Value::Nil => String::from("nil"),
                    other => other.class(universe).name().to_string(),
                }
            ),
        )
    })
}

/// Mutate a string receiver in place.
fn with_text<R>(
    universe: &Universe,
    signature: &str,
    value: &Value,
    f: impl FnOnce(&mut String) -> R,
) -> Result<R, Return> {
    if let Some(object) = value.as_object() {
        if let Payload::String(text) = &mut *object.payload() {
            return Ok(f(text));
        }
    }
    Err(universe.wrong_type(signature, value))
}

/// Apply a text transformation to a receiver, giving a new string.
fn transformed(universe: &Universe, args: Vec<Value>, signature: &str, f: impl FnOnce(&str) -> String) -> Return {
    let text = propagate!(text_of(universe, signature, args.first().unwrap_or(&Value::Nil)));
    Return::Local(universe.string(f(&text)))
}

fn initialize(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#initialize";

    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let initial = match args.next() {
        Some(value) => propagate!(implicit_text(universe, &value)),
        None => String::new(),
    };
    propagate!(with_text(universe, SIGNATURE, &receiver, |text| *text = initial));
    Return::Local(Value::Nil)
}

fn plus(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#+";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let mut text = propagate!(text_of(universe, SIGNATURE, &receiver));
    text.push_str(&propagate!(implicit_text(universe, &other)));
    Return::Local(universe.string(text))
}

fn times(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#*";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        count => count,
    ]);

    let text = propagate!(text_of(universe, SIGNATURE, &receiver));
    let count = propagate!(expect_integer(universe, SIGNATURE, &count));
    if count < 0 {
        return universe.raise(&universe.core.argument_error, "negative argument");
    }
    Return::Local(universe.string(text.repeat(count as usize)))
}

fn append(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#<<";

    let mut args = args.into_iter();
    let receiver = args.next().unwrap_or(Value::Nil);
    let mut suffix = String::new();
    for value in args {
        match value {
            Value::Integer(code) => match u32::try_from(code).ok().and_then(char::from_u32) {
                Some(ch) => suffix.push(ch),
                None => {
                    return universe.raise(
                        &universe.core.range_error,
                        format!("{} out of char range", code),
                    )
                }
            },
            value => suffix.push_str(&propagate!(implicit_text(universe, &value))),
        }
    }
    propagate!(with_text(universe, SIGNATURE, &receiver, |text| text.push_str(&suffix)));
    Return::Local(receiver)
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#==";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let text = propagate!(text_of(universe, SIGNATURE, &receiver));
    Return::Local(Value::Boolean(other.as_string().map_or(false, |other| other == text)))
}

fn ordering(universe: &Universe, args: Vec<Value>, signature: &str) -> Result<Option<Ordering>, Return> {
    let mut args = args.into_iter();
    let text = text_of(universe, signature, &args.next().unwrap_or(Value::Nil))?;
    match args.next() {
        Some(other) => Ok(other.as_string().map(|other| text.cmp(&other))),
        None => Err(universe.missing_argument(signature)),
    }
}

fn cmp(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    match propagate!(ordering(universe, args, "String#<=>")) {
        Some(ordering) => Return::Local(Value::Integer(ordering as i64)),
        None => Return::Local(Value::Nil),
    }
}

fn relation(universe: &Universe, args: Vec<Value>, signature: &str, accept: fn(Ordering) -> bool) -> Return {
    let other = args.get(1).cloned().unwrap_or(Value::Nil);
    match propagate!(ordering(universe, args, signature)) {
        Some(ordering) => Return::Local(Value::Boolean(accept(ordering))),
        None => universe.raise(
            &universe.core.argument_error,
            format!(
                "comparison of String with {} failed",
                crate::primitives::kernel::default_inspect(universe, &other)
            ),
        ),
    }
}

fn lt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "String#<", |ordering| ordering == Ordering::Less)
}

fn le(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "String#<=", |ordering| ordering != Ordering::Greater)
}

fn gt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "String#>", |ordering| ordering == Ordering::Greater)
}

fn ge(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    relation(universe, args, "String#>=", |ordering| ordering != Ordering::Less)
}

fn length(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#length";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(Value::Integer(text.chars().count() as i64))
}

fn is_empty(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#empty?";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(Value::Boolean(text.is_empty()))
}

fn capitalized(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => String::new(),
    }
}

fn upcase(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    transformed(universe, args, "String#upcase", str::to_uppercase)
}

fn downcase(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    transformed(universe, args, "String#downcase", str::to_lowercase)
}

fn capitalize(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    transformed(universe, args, "String#capitalize", capitalized)
}

fn reverse(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    transformed(universe, args, "String#reverse", |text| text.chars().rev().collect())
}

fn include(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#include?";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let text = propagate!(text_of(universe, SIGNATURE, &receiver));
    let other = propagate!(implicit_text(universe, &other));
    Return::Local(Value::Boolean(text.contains(&other)))
}

fn affix(universe: &Universe, args: Vec<Value>, signature: &str, test: fn(&str, &str) -> bool) -> Return {
    let mut args = args.into_iter();
    let text = propagate!(text_of(universe, signature, &args.next().unwrap_or(Value::Nil)));
    for candidate in args {
        let candidate = propagate!(implicit_text(universe, &candidate));
        if test(&text, &candidate) {
            return Return::Local(Value::Boolean(true));
        }
    }
    Return::Local(Value::Boolean(false))
}

fn start_with(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    affix(universe, args, "String#start_with?", |text, prefix| text.starts_with(prefix))
}

fn end_with(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    affix(universe, args, "String#end_with?", |text, suffix| text.ends_with(suffix))
}

fn is_blank(ch: char) -> bool {
    ch.is_whitespace() || ch == '\0'
}

fn strip(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    transformed(universe, args, "String#strip", |text| text.trim_matches(is_blank).to_string())
}

fn chomped(text: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => text.strip_suffix(suffix).unwrap_or(text).to_string(),
        None => text
            .strip_suffix("\r\n")
            .or_else(|| text.strip_suffix('\n'))
            .or_else(|| text.strip_suffix('\r'))
            .unwrap_or(text)
            .to_string(),
    }
}

fn chomp(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    let suffix = args.get(1).and_then(Value::as_string);
    transformed(universe, args, "String#chomp", |text| chomped(text, suffix.as_deref()))
}

/// Split a text the way `String#split` does: on whitespace runs by default, dropping trailing empty fields.
fn split_text(text: &str, separator: Option<&str>, limit: i64) -> Vec<String> {
    let mut fields: Vec<String> = match separator {
        None | Some(" ") => {
            let trimmed = text.trim_start_matches(is_blank);
            if limit > 0 {
                let mut fields = Vec::new();
                let mut rest = trimmed;
                while fields.len() + 1 < limit as usize {
                    match rest.find(is_blank) {
                        Some(position) => {
                            fields.push(rest[..position].to_string());
                            rest = rest[position..].trim_start_matches(is_blank);
                        }
                        None => break,
                    }
                }
                if !rest.is_empty() || fields.len() + 1 == limit as usize {
                    fields.push(rest.to_string());
                }
                return fields;
            }
            trimmed
                .split(is_blank)
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect()
        }
        Some("") => text.chars().map(|ch| ch.to_string()).collect(),
        Some(separator) if limit > 0 => text
            .splitn(limit as usize, separator)
            .map(str::to_string)
            .collect(),
        Some(separator) => text.split(separator).map(str::to_string).collect(),
    };
    if limit == 0 {
        while fields.last().map_or(false, String::is_empty) {
            fields.pop();
        }
    }
    fields
}

fn split(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#split";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let separator = match args.get(1) {
        None | Some(Value::Nil) => None,
        Some(separator) => Some(propagate!(implicit_text(universe, separator))),
    };
    let limit = match args.get(2) {
        None => 0,
        Some(limit) => propagate!(expect_integer(universe, SIGNATURE, limit)),
    };
    let fields = split_text(&text, separator.as_deref(), limit)
        .into_iter()
        .map(|field| universe.string(field))
        .collect();
    Return::Local(universe.array(fields))
}

fn chars(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#chars";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let chars = text.chars().map(|ch| universe.string(ch.to_string())).collect();
    Return::Local(universe.array(chars))
}

/// Parse the leading integer of a text, ignoring whatever follows (`"12abc"` is 12, `"abc"` is 0).
pub(crate) fn leading_integer(text: &str, radix: u32) -> BigInt {
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let rest = match radix {
        16 => rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest),
        2 => rest.strip_prefix("0b").or_else(|| rest.strip_prefix("0B")).unwrap_or(rest),
        _ => rest,
    };
    let mut digits = String::new();
    let mut previous_underscore = false;
    for ch in rest.chars() {
        if ch == '_' && !digits.is_empty() && !previous_underscore {
            previous_underscore = true;
            continue;
        }
        if !ch.is_digit(radix) {
            break;
        }
        previous_underscore = false;
        digits.push(ch);
    }
    let value = BigInt::parse_bytes(digits.as_bytes(), radix).unwrap_or_default();
    if negative {
        -value
    } else {
        value
    }
}

/// Parse the leading decimal number of a text (`"3.5kg"` is 3.5, `"kg"` is 0.0).
pub(crate) fn leading_float(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    let mut seen_exponent = false;
    let bytes = trimmed.as_bytes();
    while end < bytes.len() {
        let byte = bytes[end];
        let accepted = match byte {
            b'0'..=b'9' => {
                seen_digit = true;
                true
            }
            b'+' | b'-' => end == 0 || matches!(bytes[end - 1], b'e' | b'E'),
            b'.' if !seen_dot && !seen_exponent => {
                seen_dot = true;
                bytes.get(end + 1).map_or(false, u8::is_ascii_digit)
            }
            b'e' | b'E' if seen_digit && !seen_exponent => {
                seen_exponent = true;
                true
            }
            b'_' if seen_digit => true,
            _ => false,
        };
        if !accepted {
            break;
        }
        end += 1;
    }
    let candidate: String = trimmed[..end].chars().filter(|ch| *ch != '_').collect();
    let candidate = candidate.trim_end_matches(|ch| matches!(ch, 'e' | 'E' | '+' | '-'));
    candidate.parse::<f64>().unwrap_or(0.0)
}

fn to_i(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#to_i";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let radix = match args.get(1) {
        None => 10,
        Some(radix) => propagate!(expect_integer(universe, SIGNATURE, radix)),
    };
    if !(2..=36).contains(&radix) {
        return universe.raise(&universe.core.argument_error, format!("invalid radix {}", radix));
    }
    Return::Local(universe.integer(leading_integer(&text, radix as u32)))
}

fn to_f(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#to_f";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(Value::Float(leading_float(&text)))
}

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#to_s";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    if Arc::ptr_eq(&receiver.class(universe), &universe.core.string_class) {
        return Return::Local(receiver);
    }
    let text = propagate!(text_of(universe, SIGNATURE, &receiver));
    Return::Local(universe.string(text))
}

fn to_sym(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#to_sym";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(universe.mortal_symbol(&text))
}

fn slice(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#[]";

    let mut args = args.into_iter();
    let text = propagate!(text_of(universe, SIGNATURE, &args.next().unwrap_or(Value::Nil)));
    let chars: Vec<char> = text.chars().collect();
    let bounds = match (args.next(), args.next()) {
        (Some(Value::Integer(index)), None) => {
            let index = if index < 0 { index + chars.len() as i64 } else { index };
            return match usize::try_from(index).ok().and_then(|index| chars.get(index)) {
                Some(ch) => Return::Local(universe.string(ch.to_string())),
                None => Return::Local(Value::Nil),
            };
        }
        (Some(start), Some(length)) => {
            let start = propagate!(expect_integer(universe, SIGNATURE, &start));
            let length = propagate!(expect_integer(universe, SIGNATURE, &length));
            resolve_slice(chars.len(), start, length)
        }
        (Some(pattern), None) => match pattern.as_string() {
            Some(pattern) if text.contains(&pattern) => return Return::Local(universe.string(pattern)),
            Some(_) => return Return::Local(Value::Nil),
            None => propagate!(resolve_range(universe, SIGNATURE, &pattern, chars.len())),
        },
        (None, _) => return universe.missing_argument(SIGNATURE),
    };
    match bounds {
        Some((start, end)) => Return::Local(universe.string(chars[start..end].iter().collect::<String>())),
        None => Return::Local(Value::Nil),
    }
}

fn replace(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#replace";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
        other => other,
    ]);

    let replacement = propagate!(implicit_text(universe, &other));
    propagate!(with_text(universe, SIGNATURE, &receiver, |text| *text = replacement));
    Return::Local(receiver)
}

fn clear(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#clear";

    expect_args!(universe, SIGNATURE, args, [
        receiver => receiver,
    ]);

    propagate!(with_text(universe, SIGNATURE, &receiver, String::clear));
    Return::Local(receiver)
}

fn ord(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#ord";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    match text.chars().next() {
        Some(ch) => Return::Local(Value::Integer(i64::from(u32::from(ch)))),
        None => universe.raise(&universe.core.argument_error, "empty string"),
    }
}

fn freeze(_: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(args.into_iter().next().unwrap_or(Value::Nil))
}

fn is_frozen(_: &Universe, _: &Context, _: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    Return::Local(Value::Boolean(false))
}

fn inspect_string(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "String#inspect";

    let text = propagate!(text_of(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    Return::Local(universe.string(quote(&text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_drops_trailing_empty_fields() {
        assert_eq!(split_text("a,b,,", Some(","), 0), vec!["a", "b"]);
        assert_eq!(split_text("  one two  ", None, 0), vec!["one", "two"]);
        assert_eq!(split_text("a,b,c", Some(","), 2), vec!["a", "b,c"]);
    }

    #[test]
    fn leading_numbers() {
        assert_eq!(leading_integer("42abc", 10), BigInt::from(42));
        assert_eq!(leading_integer("-1_000", 10), BigInt::from(-1000));
        assert_eq!(leading_integer("abc", 10), BigInt::from(0));
        assert_eq!(leading_float("3.5kg"), 3.5);
        assert_eq!(leading_float("1e3"), 1000.0);
        assert_eq!(leading_float("."), 0.0);
    }
}
