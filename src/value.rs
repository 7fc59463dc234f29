use std::cmp::Ordering;
use std::fmt;

use crate::ast::{BinOp, CmpOp, Constant, UnaryOp};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Tuple(Vec<Value>),
    List(Vec<Value>),
}

/// An operator failed; `kind` is the Python exception name.
#[derive(Debug, Clone, PartialEq)]
pub struct OpError {
    pub kind: &'static str,
    pub message: String,
}

impl OpError {
    pub fn new(kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    fn overflow() -> Self {
        Self::new("OverflowError", "integer result too large")
    }

    fn zero_division(message: &str) -> Self {
        Self::new("ZeroDivisionError", message)
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_float(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

impl From<&Constant> for Value {
    fn from(constant: &Constant) -> Self {
        match constant {
            Constant::None => Value::None,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Float(f) => Value::Float(*f),
            Constant::Str(s) => Value::Str(s.clone()),
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(items) | Value::List(items) => !items.is_empty(),
        }
    }

    fn number(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    /// `repr()` of the value.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => quote(s),
            other => other.to_string(),
        }
    }

    /// Python `==`: numbers compare across int, float and bool.
    pub fn python_eq(&self, other: &Value) -> bool {
        match (self.number(), other.number()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_float() == b.as_float(),
            _ => match (self, other) {
                (Value::None, Value::None) => true,
                (Value::Str(a), Value::Str(b)) => a == b,
                (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.python_eq(y))
                }
                _ => false,
            },
        }
    }

    fn python_cmp(&self, other: &Value, op: CmpOp) -> Result<Ordering, OpError> {
        let unordered = || {
            OpError::type_error(format!(
                "'{}' not supported between instances of '{}' and '{}'",
                cmp_symbol(op),
                self.type_name(),
                other.type_name()
            ))
        };
        match (self.number(), other.number()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
            (Some(a), Some(b)) => a.as_float().partial_cmp(&b.as_float()).ok_or_else(unordered),
            _ => match (self, other) {
                (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
                (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                    for (x, y) in a.iter().zip(b) {
                        if !x.python_eq(y) {
                            return x.python_cmp(y, op);
                        }
                    }
                    Ok(a.len().cmp(&b.len()))
                }
                _ => Err(unordered()),
            },
        }
    }

    fn contains(&self, item: &Value) -> Result<bool, OpError> {
        match (self, item) {
            (Value::Str(haystack), Value::Str(needle)) => Ok(haystack.contains(needle.as_str())),
            (Value::Str(_), other) => Err(OpError::type_error(format!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ))),
            (Value::Tuple(items) | Value::List(items), _) => {
                Ok(items.iter().any(|x| x.python_eq(item)))
            }
            (other, _) => Err(OpError::type_error(format!(
                "argument of type '{}' is not iterable",
                other.type_name()
            ))),
        }
    }
}

impl fmt::Display for Value {
    /// `str()` of the value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{s}"),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0].repr()),
            Value::Tuple(items) => write!(f, "({})", join_repr(items)),
            Value::List(items) => write!(f, "[{}]", join_repr(items)),
        }
    }
}

fn join_repr(items: &[Value]) -> String {
    items.iter().map(Value::repr).collect::<Vec<_>>().join(", ")
}

fn quote(s: &str) -> String {
    let delimiter = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delimiter);
    for c in s.chars() {
        match c {
            '\\' => out.push_str(r"\\"),
            '\n' => out.push_str(r"\n"),
            '\t' => out.push_str(r"\t"),
            '\r' => out.push_str(r"\r"),
            c if c == delimiter => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delimiter);
    out
}

/// Python's `repr` of a float: shortest round-trip digits, always with a
/// fractional part or exponent.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{x:e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if (-4..16).contains(&exponent) {
        let plain = x.to_string();
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    }
}

fn bin_symbol(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::FloorDiv => "//",
        BinOp::Mod => "%",
        BinOp::Pow => "** or pow()",
        BinOp::MatMul => "@",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::BitAnd => "&",
        BinOp::LShift => "<<",
        BinOp::RShift => ">>",
    }
}

fn cmp_symbol(op: CmpOp) -> &'static str {
    match op {
        CmpOp::Eq => "==",
        CmpOp::NotEq => "!=",
        CmpOp::Lt => "<",
        CmpOp::LtE => "<=",
        CmpOp::Gt => ">",
        CmpOp::GtE => ">=",
        CmpOp::In => "in",
        CmpOp::NotIn => "not in",
        CmpOp::Is => "is",
        CmpOp::IsNot => "is not",
    }
}

/// One comparison of a (possibly chained) comparison expression.
pub fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, OpError> {
    Ok(match op {
        CmpOp::Eq => left.python_eq(right),
        CmpOp::NotEq => !left.python_eq(right),
        CmpOp::Lt => left.python_cmp(right, op)? == Ordering::Less,
        CmpOp::LtE => left.python_cmp(right, op)? != Ordering::Greater,
        CmpOp::Gt => left.python_cmp(right, op)? == Ordering::Greater,
        CmpOp::GtE => left.python_cmp(right, op)? != Ordering::Less,
        CmpOp::In => right.contains(left)?,
        CmpOp::NotIn => !right.contains(left)?,
        CmpOp::Is => identical(left, right),
        CmpOp::IsNot => !identical(left, right),
    })
}

/// `is` for immutable values: same type and equal.
fn identical(left: &Value, right: &Value) -> bool {
    std::mem::discriminant(left) == std::mem::discriminant(right) && left.python_eq(right)
}

pub fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    if let (Some(a), Some(b)) = (left.number(), right.number()) {
        return match (a, b) {
            (Num::Int(a), Num::Int(b)) => int_binary(op, a, b),
            (a, b) => float_binary(op, a.as_float(), b.as_float()),
        };
    }

    let unsupported = || {
        OpError::type_error(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            bin_symbol(op),
            left.type_name(),
            right.type_name()
        ))
    };
    match (op, left, right) {
        (BinOp::Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
        (BinOp::Add, Value::Tuple(a), Value::Tuple(b)) => {
            Ok(Value::Tuple(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Add, Value::List(a), Value::List(b)) => {
            Ok(Value::List(a.iter().chain(b).cloned().collect()))
        }
        (BinOp::Mul, sequence, count) | (BinOp::Mul, count, sequence)
            if matches!(sequence, Value::Str(_) | Value::Tuple(_) | Value::List(_)) =>
        {
            let Some(Num::Int(n)) = count.number() else {
                return Err(unsupported());
            };
            repeat(sequence, n)
        }
        _ => Err(unsupported()),
    }
}

fn repeat(sequence: &Value, n: i64) -> Result<Value, OpError> {
    let n = usize::try_from(n.max(0)).map_err(|_| OpError::overflow())?;
    Ok(match sequence {
        Value::Str(s) => Value::Str(s.repeat(n)),
        Value::Tuple(items) => Value::Tuple(repeat_items(items, n)),
        Value::List(items) => Value::List(repeat_items(items, n)),
        other => other.clone(),
    })
}

fn repeat_items(items: &[Value], n: usize) -> Vec<Value> {
    std::iter::repeat_n(items, n).flatten().cloned().collect()
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<Value, OpError> {
    let checked = |result: Option<i64>| result.map(Value::Int).ok_or_else(OpError::overflow);
    match op {
        BinOp::Add => checked(a.checked_add(b)),
        BinOp::Sub => checked(a.checked_sub(b)),
        BinOp::Mul => checked(a.checked_mul(b)),
        BinOp::Div => {
            if b == 0 {
                return Err(OpError::zero_division("division by zero"));
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(OpError::zero_division("integer division or modulo by zero"));
            }
            let q = a.checked_div(b).ok_or_else(OpError::overflow)?;
            let adjust = a % b != 0 && ((a < 0) != (b < 0));
            Ok(Value::Int(if adjust { q - 1 } else { q }))
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(OpError::zero_division("integer division or modulo by zero"));
            }
            let r = a.checked_rem(b).unwrap_or(0);
            let adjust = r != 0 && ((r < 0) != (b < 0));
            Ok(Value::Int(if adjust { r + b } else { r }))
        }
        BinOp::Pow => {
            if b < 0 {
                if a == 0 {
                    return Err(OpError::zero_division(
                        "0.0 cannot be raised to a negative power",
                    ));
                }
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exponent = u32::try_from(b).map_err(|_| OpError::overflow())?;
            checked(a.checked_pow(exponent))
        }
        BinOp::BitOr => Ok(Value::Int(a | b)),
        BinOp::BitXor => Ok(Value::Int(a ^ b)),
        BinOp::BitAnd => Ok(Value::Int(a & b)),
        BinOp::LShift => {
            if b < 0 {
                return Err(OpError::new("ValueError", "negative shift count"));
            }
            if a == 0 {
                return Ok(Value::Int(0));
            }
            let shift = u32::try_from(b).ok().filter(|s| *s < 64).ok_or_else(OpError::overflow)?;
            let shifted = a << shift;
            if shifted >> shift != a {
                return Err(OpError::overflow());
            }
            Ok(Value::Int(shifted))
        }
        BinOp::RShift => {
            if b < 0 {
                return Err(OpError::new("ValueError", "negative shift count"));
            }
            Ok(Value::Int(if b >= 64 { if a < 0 { -1 } else { 0 } } else { a >> b }))
        }
        BinOp::MatMul => Err(OpError::type_error(
            "unsupported operand type(s) for @: 'int' and 'int'",
        )),
    }
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Result<Value, OpError> {
    let value = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(OpError::zero_division("float division by zero"));
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(OpError::zero_division("float floor division by zero"));
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(OpError::zero_division("float modulo"));
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }
        }
        BinOp::Pow => {
            if a == 0.0 && b < 0.0 {
                return Err(OpError::zero_division(
                    "0.0 cannot be raised to a negative power",
                ));
            }
            a.powf(b)
        }
        other => {
            return Err(OpError::type_error(format!(
                "unsupported operand type(s) for {}: 'float' and 'float'",
                bin_symbol(other)
            )));
        }
    };
    Ok(Value::Float(value))
}

/// Unary `-`, `+` and `~`. `not` works on any value and is left to the caller.
pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, OpError> {
    let bad_operand = |symbol: &str| {
        OpError::type_error(format!(
            "bad operand type for unary {symbol}: '{}'",
            operand.type_name()
        ))
    };
    match (op, operand.number()) {
        (UnaryOp::Not, _) => Ok(Value::Bool(!operand.is_truthy())),
        (UnaryOp::Neg, Some(Num::Int(i))) => {
            i.checked_neg().map(Value::Int).ok_or_else(OpError::overflow)
        }
        (UnaryOp::Neg, Some(Num::Float(x))) => Ok(Value::Float(-x)),
        (UnaryOp::Neg, None) => Err(bad_operand("-")),
        (UnaryOp::Pos, Some(Num::Int(i))) => Ok(Value::Int(i)),
        (UnaryOp::Pos, Some(Num::Float(x))) => Ok(Value::Float(x)),
        (UnaryOp::Pos, None) => Err(bad_operand("+")),
        (UnaryOp::Invert, Some(Num::Int(i))) => Ok(Value::Int(!i)),
        (UnaryOp::Invert, _) => Err(bad_operand("~")),
    }
}

/// Format `value` with a format spec as in `f"{value:spec}"`.
///
/// Handles fill, alignment, sign, zero padding, width, precision and the
/// `s`, `d`, `f`, `e` and `%` presentation types.
pub fn format_with_spec(value: &Value, spec: &str) -> Result<String, OpError> {
    let invalid = || {
        OpError::new(
            "ValueError",
            format!(
                "Invalid format specifier '{spec}' for object of type '{}'",
                value.type_name()
            ),
        )
    };
    let chars: Vec<char> = spec.chars().collect();
    let is_align = |c: &char| matches!(c, '<' | '>' | '^' | '=');
    let mut i = 0;

    let (mut fill, mut align) = (' ', None);
    if chars.get(1).is_some_and(is_align) {
        fill = chars[0];
        align = Some(chars[1]);
        i = 2;
    } else if chars.first().is_some_and(is_align) {
        align = Some(chars[0]);
        i = 1;
    }

    let mut sign = '-';
    if let Some(&(c @ ('+' | '-' | ' '))) = chars.get(i) {
        sign = c;
        i += 1;
    }
    if chars.get(i) == Some(&'0') {
        if align.is_none() {
            fill = '0';
            align = Some('=');
        }
        i += 1;
    }

    let digits = |i: &mut usize| {
        let start = *i;
        while chars.get(*i).is_some_and(char::is_ascii_digit) {
            *i += 1;
        }
        chars[start..*i].iter().collect::<String>()
    };
    let width = digits(&mut i).parse::<usize>().unwrap_or(0);
    let mut precision = None;
    if chars.get(i) == Some(&'.') {
        i += 1;
        precision = Some(digits(&mut i).parse::<usize>().map_err(|_| invalid())?);
    }
    let kind = chars.get(i).copied();
    if kind.is_some() {
        i += 1;
    }
    if i != chars.len() {
        return Err(invalid());
    }

    let number = value.number();
    let body = match (kind, number) {
        (Some('s') | None, None) if matches!(value, Value::Str(_)) => {
            let text = value.to_string();
            match precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            }
        }
        (Some('d'), Some(Num::Int(n))) => n.to_string(),
        (Some('f' | 'F'), Some(n)) => format!("{:.*}", precision.unwrap_or(6), n.as_float()),
        (Some('%'), Some(n)) => format!("{:.*}%", precision.unwrap_or(6), n.as_float() * 100.0),
        (Some('e'), Some(n)) => {
            let raw = format!("{:.*e}", precision.unwrap_or(6), n.as_float());
            let (mantissa, exponent) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let exp_sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{exp_sign}{:02}", exponent.abs())
        }
        (None, _) if precision.is_none() => value.to_string(),
        _ => return Err(invalid()),
    };

    let (negative, magnitude) = match body.strip_prefix('-') {
        Some(rest) if number.is_some() => (true, rest.to_string()),
        _ => (false, body),
    };
    let sign_text = match (negative, sign) {
        (true, _) => "-",
        (false, '+') if number.is_some() => "+",
        (false, ' ') if number.is_some() => " ",
        _ => "",
    };

    let len = sign_text.chars().count() + magnitude.chars().count();
    let pad = width.saturating_sub(len);
    let fill_str = |n: usize| fill.to_string().repeat(n);
    let default_align = if number.is_some() { '>' } else { '<' };
    Ok(match align.unwrap_or(default_align) {
        '<' => format!("{sign_text}{magnitude}{}", fill_str(pad)),
        '^' => format!(
            "{}{sign_text}{magnitude}{}",
            fill_str(pad / 2),
            fill_str(pad - pad / 2)
        ),
        '=' => format!("{sign_text}{}{magnitude}", fill_str(pad)),
        _ => format!("{}{sign_text}{magnitude}", fill_str(pad)),
    })
}
