use std::convert::TryFrom;
use std::sync::Arc;

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::{self, Return};
use crate::primitives::{expect_integer, Primitive};
use crate::propagate;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("times", self::times, true),
    ("upto", self::upto, true),
    ("downto", self::downto, true),
    ("to_s", self::to_s, true),
    ("inspect", self::to_s, true),
    ("to_i", self::to_i, true),
    ("to_f", self::to_f, true),
    ("round", self::round, true),
    ("floor", self::floor, true),
    ("ceil", self::ceil, true),
    ("truncate", self::to_i, true),
    ("even?", self::is_even, true),
    ("odd?", self::is_odd, true),
    ("succ", self::succ, true),
    ("pred", self::pred, true),
    ("&", self::bit_and, true),
    ("|", self::bit_or, true),
    ("^", self::bit_xor, true),
    ("~", self::bit_not, true),
    ("<<", self::shift_left, true),
    (">>", self::shift_right, true),
];

/// Get the (arbitrary precision) integer behind a receiver or an argument.
fn big(universe: &Universe, signature: &str, value: &Value) -> Result<BigInt, Return> {
    value
        .as_big_integer()
        .ok_or_else(|| universe.wrong_type(signature, value))
}

fn times(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#times";

    expect_args!(universe, SIGNATURE, args, [
        Value::Integer(count) => count,
    ]);

    let block = match block {
        Some(block) => block,
        None => return Return::Local(universe.array((0..count.max(0)).map(Value::Integer).collect())),
    };
    for index in 0..count.max(0) {
        propagate!(invokable::call_block(universe, context, &block, vec![Value::Integer(index)]));
    }
    Return::Local(Value::Integer(count))
}

fn upto(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#upto";

    expect_args!(universe, SIGNATURE, args, [
        Value::Integer(from) => from,
        Value::Integer(to) => to,
    ]);

    let block = match block {
        Some(block) => block,
        None => return Return::Local(universe.array((from..=to).map(Value::Integer).collect())),
    };
    for index in from..=to {
        propagate!(invokable::call_block(universe, context, &block, vec![Value::Integer(index)]));
    }
    Return::Local(Value::Integer(from))
}

fn downto(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#downto";

    expect_args!(universe, SIGNATURE, args, [
        Value::Integer(from) => from,
        Value::Integer(to) => to,
    ]);

    let block = match block {
        Some(block) => block,
        None => return Return::Local(universe.array((to..=from).rev().map(Value::Integer).collect())),
    };
    for index in (to..=from).rev() {
        propagate!(invokable::call_block(universe, context, &block, vec![Value::Integer(index)]));
    }
    Return::Local(Value::Integer(from))
}

fn to_s(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#to_s";

    let value = propagate!(big(universe, SIGNATURE, args.first().unwrap_or(&Value::Nil)));
    let radix = match args.get(1) {
        None => 10,
        Some(radix) => propagate!(expect_integer(universe, SIGNATURE, radix)),
    };
    if !(2..=36).contains(&radix) {
        return universe.raise(
            &universe.core.argument_error,
            format!("invalid radix {}", radix),
        );
    }
    Return::Local(universe.string(value.to_str_radix(radix as u32)))
}

fn to_i(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#to_i";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    Return::Local(value)
}

fn to_f(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#to_f";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    Return::Local(Value::Float(value.to_f64().unwrap_or(f64::INFINITY)))
}

#[derive(Clone, Copy)]
enum Rounding {
    Nearest,
    Down,
    Up,
}

/// Round an integer to a (negative) number of decimal digits.
fn round_digits(universe: &Universe, args: Vec<Value>, signature: &str, mode: Rounding) -> Return {
    let mut args = args.into_iter();
    let value = match args.next() {
        Some(value) => value,
        None => return universe.missing_argument(signature),
    };
    let digits = match args.next() {
        None => 0,
        Some(digits) => propagate!(expect_integer(universe, signature, &digits)),
    };
    let number = match value {
        Value::Integer(number) if digits < 0 => number,
        value => return Return::Local(value),
    };
    let factor = match u32::try_from(-digits).ok().and_then(|digits| 10i64.checked_pow(digits)) {
        Some(factor) => factor,
        None => return Return::Local(Value::Integer(0)),
    };
    let remainder = number.rem_euclid(factor);
    let floored = number - remainder;
    let rounded = match mode {
        Rounding::Down => floored,
        Rounding::Up if remainder == 0 => floored,
        Rounding::Up => floored + factor,
        Rounding::Nearest => {
            let half = factor / 2;
            let away = if number < 0 { remainder > half } else { remainder >= half };
            if away {
                floored + factor
            } else {
                floored
            }
        }
    };
    Return::Local(Value::Integer(rounded))
}

fn round(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_digits(universe, args, "Integer#round", Rounding::Nearest)
}

fn floor(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_digits(universe, args, "Integer#floor", Rounding::Down)
}

fn ceil(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    round_digits(universe, args, "Integer#ceil", Rounding::Up)
}

fn is_even(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#even?";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    Return::Local(Value::Boolean((value % 2u32).is_zero()))
}

fn is_odd(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#odd?";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    Return::Local(Value::Boolean(!(value % 2u32).is_zero()))
}

fn succ(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#succ";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    match value {
        Value::Integer(value) if value < i64::MAX => Return::Local(Value::Integer(value + 1)),
        value => {
            let value = propagate!(big(universe, SIGNATURE, &value));
            Return::Local(universe.integer(value + 1))
        }
    }
}

fn pred(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#pred";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    match value {
        Value::Integer(value) if value > i64::MIN => Return::Local(Value::Integer(value - 1)),
        value => {
            let value = propagate!(big(universe, SIGNATURE, &value));
            Return::Local(universe.integer(value - 1))
        }
    }
}

fn digits(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#digits";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    if value.is_negative() {
        return universe.raise(&universe.core.argument_error, "out of domain");
    }
    let digits = value
        .to_str_radix(10)
        .bytes()
        .rev()
        .map(|digit| Value::Integer(i64::from(digit - b'0')))
        .collect();
    Return::Local(universe.array(digits))
}

fn bitwise(universe: &Universe, args: Vec<Value>, signature: &str, operation: fn(BigInt, BigInt) -> BigInt) -> Return {
    expect_args!(universe, signature, args, [
        a => a,
        b => b,
    ]);

    let a = propagate!(big(universe, signature, &a));
    let b = propagate!(big(universe, signature, &b));
    Return::Local(universe.integer(operation(a, b)))
}

fn bit_and(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    bitwise(universe, args, "Integer#&", |a, b| a & b)
}

fn bit_or(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    bitwise(universe, args, "Integer#|", |a, b| a | b)
}

fn bit_xor(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    bitwise(universe, args, "Integer#^", |a, b| a ^ b)
}

fn bit_not(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#~";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    match value {
        Value::Integer(value) => Return::Local(Value::Integer(!value)),
        value => {
            let value = propagate!(big(universe, SIGNATURE, &value));
            Return::Local(universe.integer(-value - 1))
        }
    }
}

/// The largest integer, in bits, a left shift may produce.
const MAX_SHIFTED_BITS: u64 = 1 << 26;

fn shift(universe: &Universe, value: BigInt, amount: i64) -> Return {
    let magnitude = amount.unsigned_abs();
    if value.is_zero() {
        return Return::Local(Value::Integer(0));
    }
    if amount >= 0 {
        if value.bits().saturating_add(magnitude) > MAX_SHIFTED_BITS {
            return universe.raise(
                &universe.core.range_error,
                format!("shift width too big ({})", amount),
            );
        }
        Return::Local(universe.integer(value << magnitude as usize))
    } else {
        let magnitude = usize::try_from(magnitude).unwrap_or(usize::MAX);
        Return::Local(universe.integer(value >> magnitude))
    }
}

fn shift_left(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#<<";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        Value::Integer(amount) => amount,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    shift(universe, value, amount)
}

fn shift_right(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Integer#>>";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
        Value::Integer(amount) => amount,
    ]);

    let value = propagate!(big(universe, SIGNATURE, &value));
    shift(universe, value, amount.saturating_neg())
}
