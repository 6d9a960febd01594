use std::cmp::Ordering;
use std::convert::TryFrom;
use std::sync::Arc;

use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

use crate::block::Proc;
use crate::expect_args;
use crate::frame::Context;
use crate::invokable::Return;
use crate::primitives::Primitive;
use crate::universe::Universe;
use crate::value::Value;

pub static INSTANCE_PRIMITIVES: &[Primitive] = &[
    ("+", self::plus, true),
    ("-", self::minus, true),
    ("*", self::times, true),
    ("/", self::divide, true),
    ("div", self::div, true),
    ("%", self::modulo, true),
    ("**", self::pow, true),
    ("fdiv", self::fdiv, true),
    ("==", self::eq, true),
    ("===", self::eq, true),
    ("!=", self::ne, true),
    ("<", self::lt, true),
    ("<=", self::le, true),
    (">", self::gt, true),
    (">=", self::ge, true),
    ("<=>", self::cmp, true),
    ("-@", self::negate, true),
    ("abs", self::abs, true),
    ("zero?", self::is_zero, true),
];

/// A numeric operand, widened from a value.
#[derive(Debug, Clone)]
pub(crate) enum Number {
    Integer(i64),
    Big(BigInt),
    Float(f64),
}

impl Number {
    /// Get the number behind a value, if it is one.
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(value) => Some(Self::Integer(*value)),
            Value::Float(value) => Some(Self::Float(*value)),
            Value::Object(_) => value.as_big_integer().map(Self::Big),
            _ => None,
        }
    }

    pub(crate) fn to_f64(&self) -> f64 {
        match self {
            Self::Integer(value) => *value as f64,
            Self::Big(value) => value.to_f64().unwrap_or(f64::NAN),
            Self::Float(value) => *value,
        }
    }

    fn to_big(&self) -> BigInt {
        match self {
            Self::Integer(value) => BigInt::from(*value),
            Self::Big(value) => value.clone(),
            Self::Float(value) => BigInt::from(*value as i64),
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            Self::Integer(value) => *value == 0,
            Self::Big(value) => value.is_zero(),
            Self::Float(value) => *value == 0.0,
        }
    }

    fn signum(&self) -> i64 {
        match self {
            Self::Integer(value) => value.signum(),
            Self::Big(value) => match value.sign() {
                Sign::Minus => -1,
                Sign::NoSign => 0,
                Sign::Plus => 1,
            },
            Self::Float(value) if *value > 0.0 => 1,
            Self::Float(value) if *value < 0.0 => -1,
            Self::Float(_) => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Power,
}

/// Order two numbers, `None` when either is not a number (or is NaN).
pub(crate) fn compare_numbers(a: &Value, b: &Value) -> Option<Ordering> {
    let (a, b) = (Number::from_value(a)?, Number::from_value(b)?);
    match (&a, &b) {
        (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(b)),
        (Number::Float(_), _) | (_, Number::Float(_)) => a.to_f64().partial_cmp(&b.to_f64()),
        _ => Some(a.to_big().cmp(&b.to_big())),
    }
}

fn zero_division(universe: &Universe) -> Return {
    universe.raise(&universe.core.zero_division_error, "divided by 0")
}

fn coercion_error(universe: &Universe, receiver: &Value, other: &Value) -> Return {
    let described = match other {
        Value::Nil => String::from("nil"),
        other => other.class(universe).name().to_string(),
    };
    universe.raise(
        &universe.core.type_error,
        format!(
            "{} can't be coerced into {}",
            described,
            receiver.class(universe).name()
        ),
    )
}

fn arithmetic(universe: &Universe, args: Vec<Value>, signature: &str, operation: Operation) -> Return {
    expect_args!(universe, signature, args, [
        a => a,
        b => b,
    ]);

    let (x, y) = match (Number::from_value(&a), Number::from_value(&b)) {
        (Some(x), Some(y)) => (x, y),
        (Some(_), None) => return coercion_error(universe, &a, &b),
        (None, _) => return universe.wrong_type(signature, &a),
    };
    match (x, y) {
        (Number::Float(x), y) => float_operation(x, y.to_f64(), operation),
        (x, Number::Float(y)) => float_operation(x.to_f64(), y, operation),
        (Number::Integer(x), Number::Integer(y)) => small_operation(universe, x, y, operation),
        (x, y) => big_operation(universe, x.to_big(), y.to_big(), operation),
    }
}

fn float_operation(x: f64, y: f64, operation: Operation) -> Return {
    let result = match operation {
        Operation::Add => x + y,
        Operation::Subtract => x - y,
        Operation::Multiply => x * y,
        Operation::Divide => x / y,
        Operation::Modulo => {
            if y == 0.0 {
                f64::NAN
            } else {
                x - y * (x / y).floor()
            }
        }
        Operation::Power => x.powf(y),
    };
    Return::Local(Value::Float(result))
}

fn small_operation(universe: &Universe, x: i64, y: i64, operation: Operation) -> Return {
    let result = match operation {
        Operation::Add => x.checked_add(y),
        Operation::Subtract => x.checked_sub(y),
        Operation::Multiply => x.checked_mul(y),
        Operation::Divide | Operation::Modulo if y == 0 => return zero_division(universe),
        Operation::Divide => x.checked_div(y).map(|quotient| {
            if x % y != 0 && ((x < 0) != (y < 0)) {
                quotient - 1
            } else {
                quotient
            }
        }),
        Operation::Modulo => x.checked_rem(y).map(|remainder| {
            if remainder != 0 && ((remainder < 0) != (y < 0)) {
                remainder + y
            } else {
                remainder
            }
        }),
        Operation::Power if y < 0 => {
            return Return::Local(Value::Float((x as f64).powf(y as f64)))
        }
        Operation::Power => u32::try_from(y).ok().and_then(|y| x.checked_pow(y)),
    };
    match result {
        Some(result) => Return::Local(Value::Integer(result)),
        None => big_operation(universe, BigInt::from(x), BigInt::from(y), operation),
    }
}

fn big_operation(universe: &Universe, x: BigInt, y: BigInt, operation: Operation) -> Return {
    let negative = |value: &BigInt| value.sign() == Sign::Minus;
    let result = match operation {
        Operation::Add => x + y,
        Operation::Subtract => x - y,
        Operation::Multiply => x * y,
        Operation::Divide | Operation::Modulo if y.is_zero() => return zero_division(universe),
        Operation::Divide => {
            let quotient = &x / &y;
            let remainder = &x % &y;
            if !remainder.is_zero() && (negative(&x) != negative(&y)) {
                quotient - 1
            } else {
                quotient
            }
        }
        Operation::Modulo => {
            let remainder = &x % &y;
            if !remainder.is_zero() && (negative(&remainder) != negative(&y)) {
                remainder + y
            } else {
                remainder
            }
        }
        Operation::Power => match y.to_u32() {
            Some(exponent) => x.pow(exponent),
            None => {
                let base = x.to_f64().unwrap_or(f64::NAN);
                let exponent = y.to_f64().unwrap_or(f64::NAN);
                return Return::Local(Value::Float(base.powf(exponent)));
            }
        },
    };
    Return::Local(universe.integer(result))
}

fn plus(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#+", Operation::Add)
}

fn minus(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#-", Operation::Subtract)
}

fn times(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#*", Operation::Multiply)
}

fn divide(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#/", Operation::Divide)
}

fn modulo(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#%", Operation::Modulo)
}

fn pow(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    arithmetic(universe, args, "Numeric#**", Operation::Power)
}

fn div(universe: &Universe, context: &Context, args: Vec<Value>, block: Option<Arc<Proc>>) -> Return {
    match divide(universe, context, args, block) {
        Return::Local(Value::Float(value)) => crate::primitives::float::float_to_integer(universe, value.floor()),
        ret => ret,
    }
}

fn fdiv(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#fdiv";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    match (Number::from_value(&a), Number::from_value(&b)) {
        (Some(x), Some(y)) => Return::Local(Value::Float(x.to_f64() / y.to_f64())),
        (Some(_), None) => coercion_error(universe, &a, &b),
        (None, _) => universe.wrong_type(SIGNATURE, &a),
    }
}

fn eq(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#==";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    Return::Local(Value::Boolean(compare_numbers(&a, &b) == Some(Ordering::Equal)))
}

fn ne(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#!=";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    Return::Local(Value::Boolean(compare_numbers(&a, &b) != Some(Ordering::Equal)))
}

fn ordered(universe: &Universe, args: Vec<Value>, signature: &str, accept: fn(Ordering) -> bool) -> Return {
    expect_args!(universe, signature, args, [
        a => a,
        b => b,
    ]);

    match compare_numbers(&a, &b) {
        Some(ordering) => Return::Local(Value::Boolean(accept(ordering))),
        None if Number::from_value(&b).is_some() => Return::Local(Value::Boolean(false)),
        None => universe.raise(
            &universe.core.argument_error,
            format!(
                "comparison of {} with {} failed",
                a.class(universe).name(),
                crate::primitives::kernel::default_inspect(universe, &b)
            ),
        ),
    }
}

fn lt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    ordered(universe, args, "Numeric#<", |ordering| ordering == Ordering::Less)
}

fn le(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    ordered(universe, args, "Numeric#<=", |ordering| ordering != Ordering::Greater)
}

fn gt(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    ordered(universe, args, "Numeric#>", |ordering| ordering == Ordering::Greater)
}

fn ge(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    ordered(universe, args, "Numeric#>=", |ordering| ordering != Ordering::Less)
}

fn cmp(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#<=>";

    expect_args!(universe, SIGNATURE, args, [
        a => a,
        b => b,
    ]);

    match compare_numbers(&a, &b) {
        Some(ordering) => Return::Local(Value::Integer(ordering as i64)),
        None => Return::Local(Value::Nil),
    }
}

fn negate(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#-@";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    match Number::from_value(&value) {
        Some(Number::Integer(value)) => match value.checked_neg() {
            Some(negated) => Return::Local(Value::Integer(negated)),
            None => Return::Local(universe.integer(-BigInt::from(value))),
        },
        Some(Number::Big(value)) => Return::Local(universe.integer(-value)),
        Some(Number::Float(value)) => Return::Local(Value::Float(-value)),
        None => universe.wrong_type(SIGNATURE, &value),
    }
}

fn abs(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    const SIGNATURE: &str = "Numeric#abs";

    expect_args!(universe, SIGNATURE, args, [
        value => value,
    ]);

    match Number::from_value(&value) {
        Some(Number::Integer(value)) => match value.checked_abs() {
            Some(absolute) => Return::Local(Value::Integer(absolute)),
            None => Return::Local(universe.integer(-BigInt::from(value))),
        },
        Some(Number::Big(value)) if value.sign() == Sign::Minus => Return::Local(universe.integer(-value)),
        Some(Number::Big(_)) => Return::Local(value),
        Some(Number::Float(value)) => Return::Local(Value::Float(value.abs())),
        None => universe.wrong_type(SIGNATURE, &value),
    }
}

fn predicate(universe: &Universe, args: Vec<Value>, signature: &str, test: fn(&Number) -> bool) -> Return {
    expect_args!(universe, signature, args, [
        value => value,
    ]);

    match Number::from_value(&value) {
        Some(number) => Return::Local(Value::Boolean(test(&number))),
        None => universe.wrong_type(signature, &value),
    }
}

fn is_zero(universe: &Universe, _: &Context, args: Vec<Value>, _: Option<Arc<Proc>>) -> Return {
    predicate(universe, args, "Numeric#zero?", Number::is_zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_comparisons_widen_to_floats() {
        assert_eq!(
            compare_numbers(&Value::Integer(2), &Value::Float(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            compare_numbers(&Value::Float(f64::NAN), &Value::Integer(1)),
            None
        );
        assert_eq!(compare_numbers(&Value::Nil, &Value::Integer(1)), None);
    }
}
