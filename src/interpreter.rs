use std::collections::HashMap;
use std::io::{BufRead, Write};

use log::{debug, trace};

use crate::ast::{
    BoolOp, CmpOp, Else, Expr, ExprKind, Function, Keyword, Match, Pattern, PatternKind, Statement,
    StatementKind, UnaryOp, While,
};
use crate::error::ExecutionError;
use crate::parser::{parse_expression, string_pieces};
use crate::trace::TracedCallable;
use crate::value::{self, OpError, Value};

/// Statements executed before a run is cut off.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

enum Flow {
    Normal,
    Break,
    Continue,
}

pub struct Interpreter<'a> {
    function: &'a Function,
    input: Box<dyn BufRead + 'a>,
    max_steps: u64,
    env: HashMap<String, Value>,
    steps: u64,
    line: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(function: &'a Function, input: Box<dyn BufRead + 'a>) -> Self {
        Self {
            function,
            input,
            max_steps: DEFAULT_MAX_STEPS,
            env: HashMap::new(),
            steps: 0,
            line: function.line,
        }
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Local variables as left by the last run.
    pub fn variables(&self) -> &HashMap<String, Value> {
        &self.env
    }

    fn step(&mut self) -> Result<(), ExecutionError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(ExecutionError::StepLimit {
                limit: self.max_steps,
            });
        }
        Ok(())
    }

    fn error(&self, kind: &'static str, message: impl Into<String>) -> ExecutionError {
        ExecutionError::Runtime {
            line: self.line,
            kind,
            message: message.into(),
        }
    }

    fn raise(&self, err: OpError) -> ExecutionError {
        self.error(err.kind, err.message)
    }

    fn unsupported(&self, what: impl std::fmt::Display) -> ExecutionError {
        self.error(
            "NotImplementedError",
            format!("{what} is not supported in the dry run"),
        )
    }

    // --- statements ---

    fn exec_block(
        &mut self,
        body: &[Statement],
        out: &mut dyn Write,
    ) -> Result<Flow, ExecutionError> {
        for stmt in body {
            match self.exec(stmt, out)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Statement, out: &mut dyn Write) -> Result<Flow, ExecutionError> {
        self.step()?;
        self.line = stmt.line;
        match &stmt.kind {
            StatementKind::Assign(assign) => {
                let value = self.eval(&assign.value, out)?;
                for target in &assign.targets {
                    self.assign(target, value.clone())?;
                }
            }
            StatementKind::Expr(expr) => {
                self.eval(expr, out)?;
            }
            StatementKind::Pass => {}
            StatementKind::Break => return Ok(Flow::Break),
            StatementKind::Continue => return Ok(Flow::Continue),
            StatementKind::If(node) => {
                if self.eval(&node.test, out)?.is_truthy() {
                    return self.exec_block(&node.body, out);
                }
                return match &node.orelse {
                    Some(Else::Block(body)) => self.exec_block(body, out),
                    Some(Else::Elif(elif)) => self.exec(elif, out),
                    None => Ok(Flow::Normal),
                };
            }
            StatementKind::While(node) => return self.exec_while(stmt.line, node, out),
            StatementKind::Match(node) => return self.exec_match(node, out),
            StatementKind::Other(kind) => return Err(self.unsupported(kind.describe())),
        }
        Ok(Flow::Normal)
    }

    fn exec_while(
        &mut self,
        line: usize,
        node: &While,
        out: &mut dyn Write,
    ) -> Result<Flow, ExecutionError> {
        loop {
            self.line = line;
            if !self.eval(&node.test, out)?.is_truthy() {
                // Only a loop that ran out without `break` reaches its else.
                return self.exec_block(&node.orelse, out);
            }
            if let Flow::Break = self.exec_block(&node.body, out)? {
                return Ok(Flow::Normal);
            }
            self.step()?;
        }
    }

    fn exec_match(&mut self, node: &Match, out: &mut dyn Write) -> Result<Flow, ExecutionError> {
        let subject = self.eval(&node.subject, out)?;
        for case in &node.cases {
            self.line = case.line;
            let mut bindings = Vec::new();
            if !self.match_pattern(&case.pattern, &subject, &mut bindings, out)? {
                continue;
            }
            self.env.extend(bindings);
            if let Some(guard) = &case.guard {
                if !self.eval(guard, out)?.is_truthy() {
                    continue;
                }
            }
            trace!(line = case.line, pattern = case.pattern.text.as_str(); "case selected");
            return self.exec_block(&case.body, out);
        }
        Ok(Flow::Normal)
    }

    fn match_pattern(
        &mut self,
        pattern: &Pattern,
        subject: &Value,
        bindings: &mut Vec<(String, Value)>,
        out: &mut dyn Write,
    ) -> Result<bool, ExecutionError> {
        match &pattern.kind {
            PatternKind::Wildcard => Ok(true),
            PatternKind::Literal(expr) => {
                let literal = self.eval(expr, out)?;
                Ok(match literal {
                    // None, True and False match by identity.
                    Value::None | Value::Bool(_) => *subject == literal,
                    _ => subject.python_eq(&literal),
                })
            }
            PatternKind::Capture(name) => {
                bindings.push((name.clone(), subject.clone()));
                Ok(true)
            }
            PatternKind::Or(alternatives) => {
                for alternative in alternatives {
                    let mut own = Vec::new();
                    if self.match_pattern(alternative, subject, &mut own, out)? {
                        bindings.extend(own);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            PatternKind::As(inner, name) => {
                if !self.match_pattern(inner, subject, bindings, out)? {
                    return Ok(false);
                }
                bindings.push((name.clone(), subject.clone()));
                Ok(true)
            }
            PatternKind::Value(_)
            | PatternKind::Class
            | PatternKind::Sequence
            | PatternKind::Mapping => {
                Err(self.unsupported(format!("case pattern `{}`", pattern.text)))
            }
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> Result<(), ExecutionError> {
        match &target.kind {
            ExprKind::Name(id) => {
                self.env.insert(id.clone(), value);
                Ok(())
            }
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                let items = unpack(value, targets.len()).map_err(|err| self.raise(err))?;
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item)?;
                }
                Ok(())
            }
            ExprKind::Subscript { .. } => Err(self.unsupported("item assignment")),
            ExprKind::Attribute { .. } => Err(self.unsupported("attribute assignment")),
            _ => Err(self.error(
                "SyntaxError",
                format!("cannot assign to `{}`", target.text),
            )),
        }
    }

    // --- expressions ---

    fn eval(&mut self, expr: &Expr, out: &mut dyn Write) -> Result<Value, ExecutionError> {
        match &expr.kind {
            ExprKind::Name(id) => self
                .env
                .get(id)
                .cloned()
                .ok_or_else(|| self.error("NameError", format!("name '{id}' is not defined"))),
            ExprKind::Constant(constant) => Ok(Value::from(constant)),
            ExprKind::FormattedString => self.eval_formatted(&expr.text, out),
            ExprKind::Unary { op, operand } => {
                let operand = self.eval(operand, out)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!operand.is_truthy())),
                    _ => value::unary(*op, &operand).map_err(|err| self.raise(err)),
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.eval(left, out)?;
                let right = self.eval(right, out)?;
                value::binary(*op, &left, &right).map_err(|err| self.raise(err))
            }
            ExprKind::Bool { op, values } => {
                let mut result = Value::None;
                for operand in values {
                    result = self.eval(operand, out)?;
                    let decided = match op {
                        BoolOp::And => !result.is_truthy(),
                        BoolOp::Or => result.is_truthy(),
                    };
                    if decided {
                        break;
                    }
                }
                Ok(result)
            }
            ExprKind::Compare { left, comparisons } => {
                let mut left = self.eval(left, out)?;
                for (op, operand) in comparisons {
                    let right = self.eval(operand, out)?;
                    if !value::compare(*op, &left, &right).map_err(|err| self.raise(err))? {
                        return Ok(Value::Bool(false));
                    }
                    left = right;
                }
                Ok(Value::Bool(true))
            }
            ExprKind::IfElse { test, body, orelse } => {
                if self.eval(test, out)?.is_truthy() {
                    self.eval(body, out)
                } else {
                    self.eval(orelse, out)
                }
            }
            ExprKind::Call {
                func,
                args,
                keywords,
            } => self.eval_call(func, args, keywords, out),
            ExprKind::Subscript { value, index } => {
                let container = self.eval(value, out)?;
                let index = self.eval(index, out)?;
                subscript(&container, &index).map_err(|err| self.raise(err))
            }
            ExprKind::Tuple(items) => Ok(Value::Tuple(self.eval_all(items, out)?)),
            ExprKind::List(items) => Ok(Value::List(self.eval_all(items, out)?)),
            ExprKind::Attribute { .. } => Err(self.unsupported("attribute access")),
            ExprKind::Opaque => Err(self.unsupported(format!("`{}`", expr.text))),
        }
    }

    fn eval_all(&mut self, exprs: &[Expr], out: &mut dyn Write) -> Result<Vec<Value>, ExecutionError> {
        let mut values = Vec::with_capacity(exprs.len());
        for expr in exprs {
            values.push(self.eval(expr, out)?);
        }
        Ok(values)
    }

    fn eval_call(
        &mut self,
        func: &Expr,
        args: &[Expr],
        keywords: &[Keyword],
        out: &mut dyn Write,
    ) -> Result<Value, ExecutionError> {
        let ExprKind::Name(name) = &func.kind else {
            return Err(self.unsupported(format!("calling `{}`", func.text)));
        };
        if let Some(local) = self.env.get(name) {
            return Err(self.error(
                "TypeError",
                format!("'{}' object is not callable", local.type_name()),
            ));
        }

        let args = self.eval_all(args, out)?;
        let mut kwargs = Vec::with_capacity(keywords.len());
        for keyword in keywords {
            kwargs.push((keyword.name.as_str(), self.eval(&keyword.value, out)?));
        }
        if name != "print" {
            if let Some((keyword, _)) = kwargs.first() {
                return Err(self.error(
                    "TypeError",
                    format!("{name}() takes no keyword arguments, got '{keyword}'"),
                ));
            }
        }

        match name.as_str() {
            "print" => self.call_print(&args, &kwargs, out),
            "input" => self.call_input(&args, out),
            "eval" => self.call_eval(&args, out),
            "int" => builtin_int(&args).map_err(|err| self.raise(err)),
            "float" => builtin_float(&args).map_err(|err| self.raise(err)),
            "str" => match args.as_slice() {
                [] => Ok(Value::Str(String::new())),
                [value] => Ok(Value::Str(value.to_string())),
                _ => Err(self.raise(arity("str", 1, args.len()))),
            },
            "bool" => match args.as_slice() {
                [] => Ok(Value::Bool(false)),
                [value] => Ok(Value::Bool(value.is_truthy())),
                _ => Err(self.raise(arity("bool", 1, args.len()))),
            },
            "abs" => match args.as_slice() {
                [value] => builtin_abs(value).map_err(|err| self.raise(err)),
                _ => Err(self.raise(arity("abs", 1, args.len()))),
            },
            "round" => builtin_round(&args).map_err(|err| self.raise(err)),
            "len" => match args.as_slice() {
                [value] => builtin_len(value).map_err(|err| self.raise(err)),
                _ => Err(self.raise(arity("len", 1, args.len()))),
            },
            "min" => extremum("min", args, CmpOp::Lt).map_err(|err| self.raise(err)),
            "max" => extremum("max", args, CmpOp::Gt).map_err(|err| self.raise(err)),
            _ => Err(self.error("NameError", format!("name '{name}' is not defined"))),
        }
    }

    fn call_print(
        &mut self,
        args: &[Value],
        kwargs: &[(&str, Value)],
        out: &mut dyn Write,
    ) -> Result<Value, ExecutionError> {
        let mut sep = " ".to_string();
        let mut end = "\n".to_string();
        for (name, value) in kwargs {
            let slot = match *name {
                "sep" => &mut sep,
                "end" => &mut end,
                "flush" => continue,
                "file" => return Err(self.unsupported("print(file=...)")),
                other => {
                    return Err(self.error(
                        "TypeError",
                        format!("'{other}' is an invalid keyword argument for print()"),
                    ));
                }
            };
            match value {
                Value::None => {}
                Value::Str(s) => *slot = s.clone(),
                other => {
                    return Err(self.error(
                        "TypeError",
                        format!("{name} must be None or a string, not {}", other.type_name()),
                    ));
                }
            }
        }

        let text = args
            .iter()
            .map(Value::to_string)
            .collect::<Vec<_>>()
            .join(&sep);
        write!(out, "{text}{end}")?;
        Ok(Value::None)
    }

    fn call_input(&mut self, args: &[Value], out: &mut dyn Write) -> Result<Value, ExecutionError> {
        match args {
            [] => {}
            [prompt] => write!(out, "{prompt}")?,
            _ => return Err(self.raise(arity("input", 1, args.len()))),
        }

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(self.error("EOFError", "EOF when reading a line"));
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        debug!(line = self.line; "input() read {line:?}");
        Ok(Value::Str(line))
    }

    fn call_eval(&mut self, args: &[Value], out: &mut dyn Write) -> Result<Value, ExecutionError> {
        let source = match args {
            [Value::Str(source)] => source,
            [_] => {
                return Err(self.error(
                    "TypeError",
                    "eval() arg 1 must be a string, bytes or code object",
                ));
            }
            _ => return Err(self.raise(arity("eval", 1, args.len()))),
        };
        let expr = parse_expression(source.trim_start_matches([' ', '\t']))
            .map_err(|err| self.error("SyntaxError", err.message))?;
        self.eval(&expr, out)
    }

    // --- f-strings ---

    fn eval_formatted(&mut self, text: &str, out: &mut dyn Write) -> Result<Value, ExecutionError> {
        let pieces = string_pieces(text)
            .ok_or_else(|| self.error("SyntaxError", format!("malformed string `{text}`")))?;
        let mut result = String::new();
        for (piece, formatted) in pieces {
            if formatted {
                result.push_str(&self.format_template(&piece, out)?);
            } else {
                result.push_str(&piece);
            }
        }
        Ok(Value::Str(result))
    }

    fn format_template(&mut self, template: &str, out: &mut dyn Write) -> Result<String, ExecutionError> {
        let mut result = String::new();
        let mut rest = template;
        while let Some(pos) = rest.find(['{', '}']) {
            result.push_str(&rest[..pos]);
            let brace = &rest[pos..=pos];
            let after = &rest[pos + 1..];
            if let Some(tail) = after.strip_prefix(brace) {
                result.push_str(brace);
                rest = tail;
                continue;
            }
            if brace == "}" {
                return Err(self.error("SyntaxError", "f-string: single '}' is not allowed"));
            }
            let end = field_end(after)
                .ok_or_else(|| self.error("SyntaxError", "f-string: expecting '}'"))?;
            let field = self.format_field(&after[..end], out)?;
            result.push_str(&field);
            rest = &after[end + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }

    fn format_field(&mut self, field: &str, out: &mut dyn Write) -> Result<String, ExecutionError> {
        let (source, conversion, spec) = split_field(field);

        // `{expr=}` echoes the expression text before its value.
        let trimmed = source.trim_end();
        let echo = trimmed.ends_with('=')
            && !["==", "!=", "<=", ">="].iter().any(|op| trimmed.ends_with(op));
        let (prefix, source) = if echo {
            (source, &trimmed[..trimmed.len() - 1])
        } else {
            ("", source)
        };

        let expr = parse_expression(source.trim())
            .map_err(|err| self.error("SyntaxError", format!("f-string: {}", err.message)))?;
        let mut value = self.eval(&expr, out)?;
        let conversion = match conversion {
            None if echo && spec.is_none() => Some('r'),
            other => other,
        };
        match conversion {
            None => {}
            Some('r' | 'a') => value = Value::Str(value.repr()),
            Some('s') => value = Value::Str(value.to_string()),
            Some(other) => {
                return Err(self.error(
                    "SyntaxError",
                    format!("f-string: invalid conversion character '{other}'"),
                ));
            }
        }

        let formatted = match spec {
            None => value.to_string(),
            Some(spec) => {
                let spec = self.format_template(spec, out)?;
                value::format_with_spec(&value, &spec).map_err(|err| self.raise(err))?
            }
        };
        Ok(format!("{prefix}{formatted}"))
    }
}

impl TracedCallable for Interpreter<'_> {
    fn name(&self) -> &str {
        &self.function.name
    }

    fn call(&mut self, out: &mut dyn Write) -> Result<(), ExecutionError> {
        self.env.clear();
        self.steps = 0;
        self.line = self.function.line;
        debug!(function = self.function.name.as_str(), max_steps = self.max_steps; "running function");

        let function = self.function;
        match self.exec_block(&function.body, out)? {
            Flow::Normal => {}
            Flow::Break => return Err(self.error("SyntaxError", "'break' outside loop")),
            Flow::Continue => {
                return Err(self.error("SyntaxError", "'continue' not properly in loop"));
            }
        }
        out.flush()?;
        debug!(function = self.function.name.as_str(), steps = self.steps; "function returned");
        Ok(())
    }
}

/// Byte offset of the `}` closing a replacement field that starts at `text`.
fn field_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote = None;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split `expr!conv:spec` at the top level.
fn split_field(field: &str) -> (&str, Option<char>, Option<&str>) {
    let mut depth = 0usize;
    let mut quote = None;
    let mut chars = field.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' if depth == 0 && chars.peek().is_some_and(|&(_, next)| next != '=') => {
                let rest = &field[i + 1..];
                let (conversion, spec) = match rest.split_once(':') {
                    Some((conversion, spec)) => (conversion, Some(spec)),
                    None => (rest, None),
                };
                return (&field[..i], conversion.chars().next(), spec);
            }
            ':' if depth == 0 => return (&field[..i], None, Some(&field[i + 1..])),
            _ => {}
        }
    }
    (field, None, None)
}

fn arity(name: &str, expected: usize, got: usize) -> OpError {
    OpError::new(
        "TypeError",
        format!("{name}() takes at most {expected} argument ({got} given)"),
    )
}

fn unpack(value: Value, expected: usize) -> Result<Vec<Value>, OpError> {
    let items = match value {
        Value::Tuple(items) | Value::List(items) => items,
        Value::Str(s) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        other => {
            return Err(OpError::new(
                "TypeError",
                format!("cannot unpack non-iterable {} object", other.type_name()),
            ));
        }
    };
    if items.len() > expected {
        return Err(OpError::new(
            "ValueError",
            format!("too many values to unpack (expected {expected})"),
        ));
    }
    if items.len() < expected {
        return Err(OpError::new(
            "ValueError",
            format!(
                "not enough values to unpack (expected {expected}, got {})",
                items.len()
            ),
        ));
    }
    Ok(items)
}

fn subscript(container: &Value, index: &Value) -> Result<Value, OpError> {
    let position = |len: usize, what: &str| -> Result<usize, OpError> {
        let i = match index {
            Value::Int(i) => *i,
            Value::Bool(b) => i64::from(*b),
            other => {
                return Err(OpError::new(
                    "TypeError",
                    format!("{what} indices must be integers, not '{}'", other.type_name()),
                ));
            }
        };
        let len = i64::try_from(len).unwrap_or(i64::MAX);
        let i = if i < 0 { i + len } else { i };
        if (0..len).contains(&i) {
            Ok(usize::try_from(i).unwrap_or(usize::MAX))
        } else {
            Err(OpError::new("IndexError", format!("{what} index out of range")))
        }
    };
    match container {
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let i = position(chars.len(), "string")?;
            Ok(Value::Str(chars[i].to_string()))
        }
        Value::Tuple(items) => Ok(items[position(items.len(), "tuple")?].clone()),
        Value::List(items) => Ok(items[position(items.len(), "list")?].clone()),
        other => Err(OpError::new(
            "TypeError",
            format!("'{}' object is not subscriptable", other.type_name()),
        )),
    }
}

fn builtin_int(args: &[Value]) -> Result<Value, OpError> {
    match args {
        [] => Ok(Value::Int(0)),
        [Value::Bool(b)] => Ok(Value::Int(i64::from(*b))),
        [Value::Int(i)] => Ok(Value::Int(*i)),
        [Value::Float(x)] => float_to_int(x.trunc()),
        [Value::Str(s)] => parse_int(s, 10),
        [Value::Str(s), Value::Int(base)] if (2..=36).contains(base) => {
            parse_int(s, u32::try_from(*base).unwrap_or(10))
        }
        [Value::Str(_), _] => Err(OpError::new(
            "ValueError",
            "int() base must be >= 2 and <= 36, or 0",
        )),
        [other] => Err(OpError::new(
            "TypeError",
            format!(
                "int() argument must be a string, a bytes-like object or a real number, not '{}'",
                other.type_name()
            ),
        )),
        [_, _] => Err(OpError::new(
            "TypeError",
            "int() can't convert non-string with explicit base",
        )),
        _ => Err(arity("int", 2, args.len())),
    }
}

fn parse_int(text: &str, base: u32) -> Result<Value, OpError> {
    let invalid = || {
        OpError::new(
            "ValueError",
            format!(
                "invalid literal for int() with base {base}: {}",
                Value::Str(text.to_string()).repr()
            ),
        )
    };
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return Err(invalid());
    }
    let digits = digits.replace('_', "");
    let magnitude = i64::from_str_radix(&digits, base).map_err(|_| {
        if digits.chars().all(|c| c.is_digit(base)) {
            OpError::new("OverflowError", "integer result too large")
        } else {
            invalid()
        }
    })?;
    Ok(Value::Int(if negative { -magnitude } else { magnitude }))
}

fn float_to_int(x: f64) -> Result<Value, OpError> {
    if x.is_nan() {
        return Err(OpError::new("ValueError", "cannot convert float NaN to integer"));
    }
    if x.is_infinite() {
        return Err(OpError::new(
            "OverflowError",
            "cannot convert float infinity to integer",
        ));
    }
    if x < -9.223_372_036_854_775_808e18 || x >= 9.223_372_036_854_775_808e18 {
        return Err(OpError::new("OverflowError", "integer result too large"));
    }
    Ok(Value::Int(x as i64))
}

fn builtin_float(args: &[Value]) -> Result<Value, OpError> {
    match args {
        [] => Ok(Value::Float(0.0)),
        [Value::Bool(b)] => Ok(Value::Float(f64::from(u8::from(*b)))),
        [Value::Int(i)] => Ok(Value::Float(*i as f64)),
        [Value::Float(x)] => Ok(Value::Float(*x)),
        [Value::Str(s)] => {
            let trimmed = s.trim();
            let plain = !trimmed.contains("__")
                && !trimmed.starts_with('_')
                && !trimmed.ends_with('_');
            trimmed
                .replace('_', "")
                .parse::<f64>()
                .ok()
                .filter(|_| plain && !trimmed.is_empty())
                .map(Value::Float)
                .ok_or_else(|| {
                    OpError::new(
                        "ValueError",
                        format!(
                            "could not convert string to float: {}",
                            Value::Str(s.clone()).repr()
                        ),
                    )
                })
        }
        [other] => Err(OpError::new(
            "TypeError",
            format!(
                "float() argument must be a string or a real number, not '{}'",
                other.type_name()
            ),
        )),
        _ => Err(arity("float", 1, args.len())),
    }
}

fn builtin_abs(value: &Value) -> Result<Value, OpError> {
    match value {
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::Int(i) => i
            .checked_abs()
            .map(Value::Int)
            .ok_or_else(|| OpError::new("OverflowError", "integer result too large")),
        Value::Float(x) => Ok(Value::Float(x.abs())),
        other => Err(OpError::new(
            "TypeError",
            format!("bad operand type for abs(): '{}'", other.type_name()),
        )),
    }
}

fn builtin_round(args: &[Value]) -> Result<Value, OpError> {
    let not_roundable = |value: &Value| {
        OpError::new(
            "TypeError",
            format!("type {} doesn't define __round__ method", value.type_name()),
        )
    };
    match args {
        [Value::Bool(b)] | [Value::Bool(b), Value::None] => Ok(Value::Int(i64::from(*b))),
        [Value::Int(i)] | [Value::Int(i), Value::None] => Ok(Value::Int(*i)),
        [Value::Float(x)] | [Value::Float(x), Value::None] => float_to_int(x.round_ties_even()),
        [Value::Int(i), Value::Int(digits)] => {
            if *digits >= 0 {
                return Ok(Value::Int(*i));
            }
            let Some(unit) = u32::try_from(digits.unsigned_abs())
                .ok()
                .and_then(|exp| 10i64.checked_pow(exp))
            else {
                return Ok(Value::Int(0));
            };
            let remainder = i.rem_euclid(unit);
            let mut quotient = i.div_euclid(unit);
            if remainder * 2 > unit || (remainder * 2 == unit && quotient % 2 != 0) {
                quotient += 1;
            }
            quotient
                .checked_mul(unit)
                .map(Value::Int)
                .ok_or_else(|| OpError::new("OverflowError", "integer result too large"))
        }
        [Value::Float(x), Value::Int(digits)] => Ok(Value::Float(round_float(*x, *digits))),
        [_, Value::Int(_)] | [_] | [_, Value::None] => Err(not_roundable(&args[0])),
        [_, other] => Err(OpError::new(
            "TypeError",
            format!(
                "'{}' object cannot be interpreted as an integer",
                other.type_name()
            ),
        )),
        _ => Err(arity("round", 2, args.len())),
    }
}

/// `round(x, digits)` from the exact binary value of `x`, ties to even.
fn round_float(x: f64, digits: i64) -> f64 {
    // 323 decimals hold every finite double exactly.
    if !x.is_finite() || digits > 323 {
        return x;
    }
    if let Ok(places) = usize::try_from(digits) {
        return format!("{x:.places$}").parse().unwrap_or(x);
    }

    let Some(unit) = u32::try_from(digits.unsigned_abs())
        .ok()
        .and_then(|exp| 10i128.checked_pow(exp))
    else {
        return 0.0 * x;
    };
    let magnitude = x.abs();
    if magnitude.trunc() >= 1e38 {
        let factor = unit as f64;
        return (x / factor).round_ties_even() * factor;
    }

    let whole = magnitude.trunc() as i128;
    let remainder = whole % unit;
    let mut quotient = whole / unit;
    let past_half = remainder * 2 > unit
        || (remainder * 2 == unit && (magnitude.fract() != 0.0 || quotient % 2 != 0));
    if past_half {
        quotient += 1;
    }
    let rounded = quotient
        .checked_mul(unit)
        .map_or_else(|| quotient as f64 * unit as f64, |n| n as f64);
    rounded.copysign(x)
}

fn builtin_len(value: &Value) -> Result<Value, OpError> {
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::Tuple(items) | Value::List(items) => items.len(),
        other => {
            return Err(OpError::new(
                "TypeError",
                format!("object of type '{}' has no len()", other.type_name()),
            ));
        }
    };
    Ok(Value::Int(i64::try_from(len).unwrap_or(i64::MAX)))
}

/// `min`/`max` over the arguments, or over the items of a single argument.
fn extremum(name: &str, args: Vec<Value>, better: CmpOp) -> Result<Value, OpError> {
    let items = match <[Value; 1]>::try_from(args) {
        Ok([Value::Tuple(items) | Value::List(items)]) => items,
        Ok([Value::Str(s)]) => s.chars().map(|c| Value::Str(c.to_string())).collect(),
        Ok([other]) => {
            return Err(OpError::new(
                "TypeError",
                format!("'{}' object is not iterable", other.type_name()),
            ));
        }
        Err(args) if args.is_empty() => {
            return Err(OpError::new(
                "TypeError",
                format!("{name} expected at least 1 argument, got 0"),
            ));
        }
        Err(args) => args,
    };

    let mut items = items.into_iter();
    let Some(mut best) = items.next() else {
        return Err(OpError::new(
            "ValueError",
            format!("{name}() iterable argument is empty"),
        ));
    };
    for item in items {
        if value::compare(better, &item, &best)? {
            best = item;
        }
    }
    Ok(best)
}
