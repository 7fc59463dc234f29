use winnow::prelude::*;
use winnow::combinator::{alt, not, opt, preceded, repeat, terminated};
use winnow::error::{ContextError, ParserError};
use winnow::token::{one_of, take_while};

use crate::ast::*;
use crate::display_width::excerpt;
use crate::error::SyntaxError;

const EXCERPT_WIDTH: usize = 40;

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

/// Find `def <name>():` in `source` and parse its body.
///
/// Only top-level definitions count. With no `name`, the first one in the
/// file is taken.
/// Returns `Ok(None)` when no matching definition exists.
pub fn parse_function(source: &str, name: Option<&str>) -> Result<Option<Function>, SyntaxError> {
    let lines = logical_lines(source)?;

    for (index, line) in lines.iter().enumerate() {
        if line.indent != 0 || !line.text.starts_with("def") {
            continue;
        }
        let Ok(Line::Header(Header::Def { name: found, has_params }, inline)) =
            parse_line_text(line.text)
        else {
            continue;
        };
        if name.is_some_and(|wanted| wanted != found) {
            continue;
        }
        if has_params {
            return Err(SyntaxError::new(
                line.number,
                format!("function `{found}` must not take parameters"),
            ));
        }

        let mut parser = BlockParser {
            lines: &lines,
            pos: index + 1,
        };
        let mut body = parser.suite(line, inline)?;
        strip_docstring(&mut body);

        let last = &lines[parser.pos - 1];
        let start = offset_in(source, line.text);
        let start = source[..start].rfind('\n').map_or(0, |i| i + 1);
        let end = offset_in(source, last.text) + last.text.len();

        return Ok(Some(Function {
            name: found,
            line: line.number,
            source: source[start..end].to_string(),
            body,
        }));
    }

    Ok(None)
}

/// Parse a standalone expression, as handed to `eval`.
pub fn parse_expression(text: &str) -> Result<Expr, SyntaxError> {
    let mut input = text;
    let parsed = (ws, expression, ws).parse_next(&mut input);
    match parsed {
        Ok((_, expr, _)) if input.is_empty() => Ok(expr),
        _ => Err(SyntaxError::new(
            1,
            format!("invalid expression `{}`", excerpt(text, EXCERPT_WIDTH)),
        )),
    }
}

/// The literal parts of a (possibly implicitly concatenated) string
/// expression, each flagged when it is an f-string.
pub fn string_pieces(text: &str) -> Option<Vec<(String, bool)>> {
    let mut input = text;
    let mut pieces = Vec::new();
    loop {
        ws(&mut input).ok()?;
        if input.is_empty() {
            return Some(pieces);
        }
        pieces.push(string_literal.parse_next(&mut input).ok()?);
    }
}

fn strip_docstring(body: &mut Vec<Statement>) {
    let is_docstring = matches!(
        body.first(),
        Some(Statement {
            kind: StatementKind::Expr(Expr {
                kind: ExprKind::Constant(Constant::Str(_)),
                ..
            }),
            ..
        })
    );
    if is_docstring {
        body.remove(0);
    }
}

fn offset_in(source: &str, part: &str) -> usize {
    part.as_ptr() as usize - source.as_ptr() as usize
}

// --- logical lines ---

/// One statement line after joining bracket and backslash continuations.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LogicalLine<'s> {
    number: usize,
    indent: usize,
    text: &'s str,
}

fn logical_lines(source: &str) -> Result<Vec<LogicalLine<'_>>, SyntaxError> {
    let bytes = source.as_bytes();
    let mut lines = Vec::new();
    let mut number = 1;
    let mut pos = 0;

    while pos < bytes.len() {
        let mut indent = 0;
        while pos < bytes.len() {
            match bytes[pos] {
                b' ' => indent += 1,
                b'\t' => indent = (indent / 8 + 1) * 8,
                b'\x0c' => {}
                _ => break,
            }
            pos += 1;
        }

        if pos >= bytes.len() {
            break;
        }
        if matches!(bytes[pos], b'\n' | b'\r' | b'#') {
            pos = source[pos..].find('\n').map_or(bytes.len(), |i| pos + i + 1);
            number += 1;
            continue;
        }

        let start = pos;
        let start_number = number;
        let mut depth = 0usize;
        let end;
        loop {
            if pos >= bytes.len() {
                if depth > 0 {
                    return Err(SyntaxError::new(start_number, "unclosed bracket"));
                }
                end = bytes.len();
                break;
            }
            match bytes[pos] {
                b'#' => {
                    pos = source[pos..].find('\n').map_or(bytes.len(), |i| pos + i);
                }
                b'\'' | b'"' => {
                    let (after, newlines) = skip_string(source, pos)
                        .ok_or_else(|| SyntaxError::new(number, "unterminated string literal"))?;
                    pos = after;
                    number += newlines;
                }
                b'(' | b'[' | b'{' => {
                    depth += 1;
                    pos += 1;
                }
                b')' | b']' | b'}' => {
                    depth = depth.saturating_sub(1);
                    pos += 1;
                }
                b'\\' if source[pos + 1..].starts_with('\n') => {
                    pos += 2;
                    number += 1;
                }
                b'\\' if source[pos + 1..].starts_with("\r\n") => {
                    pos += 3;
                    number += 1;
                }
                b'\n' => {
                    number += 1;
                    pos += 1;
                    if depth == 0 {
                        end = pos - 1;
                        break;
                    }
                }
                _ => pos += 1,
            }
        }

        lines.push(LogicalLine {
            number: start_number,
            indent,
            text: source[start..end].trim_end(),
        });
    }

    Ok(lines)
}

/// Skip the string literal opening at `pos`; returns the end offset and
/// the number of newlines inside it.
fn skip_string(source: &str, pos: usize) -> Option<(usize, usize)> {
    let quote = &source[pos..pos + 1];
    let triple = quote.repeat(3);
    let delimiter = if source[pos..].starts_with(&triple) {
        triple.as_str()
    } else {
        quote
    };

    let mut newlines = 0;
    let mut chars = source[pos + delimiter.len()..].char_indices();
    while let Some((i, c)) = chars.next() {
        let at = pos + delimiter.len() + i;
        match c {
            '\\' => {
                if let Some((_, '\n')) = chars.next() {
                    newlines += 1;
                }
            }
            '\n' if delimiter.len() == 1 => return None,
            '\n' => newlines += 1,
            _ if source[at..].starts_with(delimiter) => {
                return Some((at + delimiter.len(), newlines));
            }
            _ => {}
        }
    }
    None
}

// --- block structure ---

#[derive(Debug)]
enum Line {
    Simple(Vec<StatementKind>),
    Header(Header, Option<Vec<StatementKind>>),
}

#[derive(Debug, Clone)]
enum Header {
    Def { name: String, has_params: bool },
    If(Expr),
    Elif(Expr),
    Else,
    While(Expr),
    Match(Expr),
    Case(Pattern, Option<Expr>),
    Other(OtherKind),
}

fn parse_line_text(text: &str) -> winnow::Result<Line> {
    let mut input = text;
    line.parse_next(&mut input)
}

struct BlockParser<'a, 's> {
    lines: &'a [LogicalLine<'s>],
    pos: usize,
}

impl<'s> BlockParser<'_, 's> {
    fn peek(&self) -> Option<LogicalLine<'s>> {
        self.lines.get(self.pos).copied()
    }

    fn parse_line(&self, line: &LogicalLine<'s>) -> Result<Line, SyntaxError> {
        parse_line_text(line.text).map_err(|_| {
            SyntaxError::new(
                line.number,
                format!("invalid syntax: `{}`", excerpt(line.text, EXCERPT_WIDTH)),
            )
        })
    }

    fn block(&mut self, indent: usize) -> Result<Vec<Statement>, SyntaxError> {
        let mut body = Vec::new();
        while let Some(line) = self.peek() {
            if line.indent < indent {
                break;
            }
            if line.indent > indent {
                return Err(SyntaxError::new(line.number, "unexpected indent"));
            }
            self.pos += 1;
            match self.parse_line(&line)? {
                Line::Simple(kinds) => {
                    body.extend(kinds.into_iter().map(|k| Statement::new(line.number, k)));
                }
                Line::Header(header, inline) => {
                    let kind = self.compound(&line, header, inline)?;
                    body.push(Statement::new(line.number, kind));
                }
            }
        }
        Ok(body)
    }

    /// The body belonging to the header on `line`.
    fn suite(
        &mut self,
        line: &LogicalLine<'s>,
        inline: Option<Vec<StatementKind>>,
    ) -> Result<Vec<Statement>, SyntaxError> {
        if let Some(kinds) = inline {
            return Ok(kinds
                .into_iter()
                .map(|k| Statement::new(line.number, k))
                .collect());
        }
        match self.peek() {
            Some(next) if next.indent > line.indent => self.block(next.indent),
            _ => Err(SyntaxError::new(line.number, "expected an indented block")),
        }
    }

    fn skip_suite(&mut self, line: &LogicalLine<'s>) {
        while self.peek().is_some_and(|next| next.indent > line.indent) {
            self.pos += 1;
        }
    }

    /// Consume the next line if it is a clause of the statement at `indent`.
    fn clause(
        &mut self,
        indent: usize,
        accept: fn(&Header) -> bool,
    ) -> Result<Option<(LogicalLine<'s>, Header, Option<Vec<StatementKind>>)>, SyntaxError> {
        let Some(next) = self.peek() else {
            return Ok(None);
        };
        if next.indent != indent {
            return Ok(None);
        }
        match self.parse_line(&next)? {
            Line::Header(header, inline) if accept(&header) => {
                self.pos += 1;
                Ok(Some((next, header, inline)))
            }
            _ => Ok(None),
        }
    }

    fn compound(
        &mut self,
        line: &LogicalLine<'s>,
        header: Header,
        inline: Option<Vec<StatementKind>>,
    ) -> Result<StatementKind, SyntaxError> {
        match header {
            Header::If(test) => Ok(StatementKind::If(self.conditional(line, test, inline)?)),
            Header::While(test) => {
                let body = self.suite(line, inline)?;
                let orelse = match self.clause(line.indent, |h| matches!(h, Header::Else))? {
                    Some((else_line, _, inline)) => self.suite(&else_line, inline)?,
                    None => Vec::new(),
                };
                Ok(StatementKind::While(While { test, body, orelse }))
            }
            Header::Match(subject) => {
                if inline.is_some() {
                    return Err(SyntaxError::new(line.number, "expected `case` blocks"));
                }
                let cases = self.cases(line)?;
                Ok(StatementKind::Match(Match { subject, cases }))
            }
            Header::Def { .. } => {
                if inline.is_none() {
                    self.skip_suite(line);
                }
                Ok(StatementKind::Other(OtherKind::FunctionDef))
            }
            Header::Other(kind) => {
                self.skip_suite(line);
                while self
                    .clause(line.indent, |h| {
                        matches!(
                            h,
                            Header::Else | Header::Other(OtherKind::Except | OtherKind::Finally)
                        )
                    })?
                    .is_some()
                {
                    self.skip_suite(line);
                }
                Ok(StatementKind::Other(kind))
            }
            Header::Elif(_) | Header::Else => Err(SyntaxError::new(
                line.number,
                "`elif`/`else` without a matching `if`",
            )),
            Header::Case(..) => Err(SyntaxError::new(line.number, "`case` outside of `match`")),
        }
    }

    fn conditional(
        &mut self,
        line: &LogicalLine<'s>,
        test: Expr,
        inline: Option<Vec<StatementKind>>,
    ) -> Result<If, SyntaxError> {
        let body = self.suite(line, inline)?;
        let clause = self.clause(line.indent, |h| matches!(h, Header::Elif(_) | Header::Else))?;
        let orelse = match clause {
            Some((elif_line, Header::Elif(elif_test), inline)) => {
                let nested = self.conditional(&elif_line, elif_test, inline)?;
                Some(Else::Elif(Box::new(Statement::new(
                    elif_line.number,
                    StatementKind::If(nested),
                ))))
            }
            Some((else_line, _, inline)) => Some(Else::Block(self.suite(&else_line, inline)?)),
            None => None,
        };
        Ok(If { test, body, orelse })
    }

    fn cases(&mut self, line: &LogicalLine<'s>) -> Result<Vec<MatchCase>, SyntaxError> {
        let indent = match self.peek() {
            Some(next) if next.indent > line.indent => next.indent,
            _ => return Err(SyntaxError::new(line.number, "expected an indented block")),
        };

        let mut cases = Vec::new();
        while let Some(next) = self.peek() {
            if next.indent < indent {
                break;
            }
            if next.indent > indent {
                return Err(SyntaxError::new(next.number, "unexpected indent"));
            }
            self.pos += 1;
            match self.parse_line(&next)? {
                Line::Header(Header::Case(pattern, guard), inline) => {
                    let body = self.suite(&next, inline)?;
                    cases.push(MatchCase {
                        line: next.number,
                        pattern,
                        guard,
                        body,
                    });
                }
                _ => return Err(SyntaxError::new(next.number, "expected `case` inside `match`")),
            }
        }
        Ok(cases)
    }
}

// --- statements ---

fn line(input: &mut &str) -> winnow::Result<Line> {
    alt((header_line, simple_statements.map(Line::Simple))).parse_next(input)
}

fn header_line(input: &mut &str) -> winnow::Result<Line> {
    if let Some(kind) = opt(compound_other).parse_next(input)? {
        take_while(0.., |_: char| true).void().parse_next(input)?;
        return Ok(Line::Header(Header::Other(kind), None));
    }

    let header = alt((
        def_header,
        preceded((keyword("if"), ws), expression).map(Header::If),
        preceded((keyword("elif"), ws), expression).map(Header::Elif),
        keyword("else").value(Header::Else),
        preceded((keyword("while"), ws), expression).map(Header::While),
        preceded((keyword("match"), ws), star_expressions).map(Header::Match),
        case_header,
    ))
    .parse_next(input)?;

    (ws, ':', ws).parse_next(input)?;
    if input.is_empty() {
        return Ok(Line::Header(header, None));
    }
    let body = simple_statements.parse_next(input)?;
    Ok(Line::Header(header, Some(body)))
}

fn compound_other(input: &mut &str) -> winnow::Result<OtherKind> {
    alt((
        keyword("for").value(OtherKind::For),
        keyword("with").value(OtherKind::With),
        keyword("try").value(OtherKind::Try),
        keyword("except").value(OtherKind::Except),
        keyword("finally").value(OtherKind::Finally),
        keyword("class").value(OtherKind::ClassDef),
        (keyword("async"), ws, keyword("def")).value(OtherKind::FunctionDef),
        keyword("async").value(OtherKind::Async),
    ))
    .parse_next(input)
}

fn def_header(input: &mut &str) -> winnow::Result<Header> {
    (keyword("def"), ws).parse_next(input)?;
    let name = identifier.parse_next(input)?;
    ws.parse_next(input)?;
    let params = balanced.parse_next(input)?;
    if !params.starts_with('(') {
        return Err(ParserError::from_input(input));
    }
    opt((ws, "->", ws, expression)).parse_next(input)?;
    let inner = &params[1..params.len() - 1];
    Ok(Header::Def {
        name: name.to_string(),
        has_params: !inner.trim().is_empty(),
    })
}

fn case_header(input: &mut &str) -> winnow::Result<Header> {
    (keyword("case"), ws).parse_next(input)?;
    let pattern = pattern.parse_next(input)?;
    let guard = opt(preceded((ws, keyword("if"), ws), expression)).parse_next(input)?;
    Ok(Header::Case(pattern, guard))
}

fn simple_statements(input: &mut &str) -> winnow::Result<Vec<StatementKind>> {
    let mut statements = vec![simple_statement.parse_next(input)?];
    while opt((ws, ';')).parse_next(input)?.is_some() {
        ws.parse_next(input)?;
        if input.is_empty() {
            break;
        }
        statements.push(simple_statement.parse_next(input)?);
    }
    ws.parse_next(input)?;
    if !input.is_empty() {
        return Err(ParserError::from_input(input));
    }
    Ok(statements)
}

fn simple_statement(input: &mut &str) -> winnow::Result<StatementKind> {
    alt((
        keyword("pass").value(StatementKind::Pass),
        keyword("break").value(StatementKind::Break),
        keyword("continue").value(StatementKind::Continue),
        terminated(simple_other, take_while(0.., |c: char| c != ';')).map(StatementKind::Other),
        assignment_or_expression,
    ))
    .parse_next(input)
}

fn simple_other(input: &mut &str) -> winnow::Result<OtherKind> {
    alt((
        keyword("return").value(OtherKind::Return),
        keyword("import").value(OtherKind::Import),
        keyword("from").value(OtherKind::Import),
        keyword("raise").value(OtherKind::Raise),
        keyword("assert").value(OtherKind::Assert),
        keyword("del").value(OtherKind::Delete),
        keyword("global").value(OtherKind::Global),
        keyword("nonlocal").value(OtherKind::Nonlocal),
        keyword("yield").value(OtherKind::Yield),
    ))
    .parse_next(input)
}

fn assignment_or_expression(input: &mut &str) -> winnow::Result<StatementKind> {
    let start = *input;
    let first = star_expressions.parse_next(input)?;

    if opt((ws, ':')).parse_next(input)?.is_some() {
        take_while(0.., |c: char| c != ';').void().parse_next(input)?;
        return Ok(StatementKind::Other(OtherKind::AnnotatedAssign));
    }
    if opt((ws, augmented_operator)).parse_next(input)?.is_some() {
        preceded(ws, star_expressions).void().parse_next(input)?;
        return Ok(StatementKind::Other(OtherKind::AugmentedAssign));
    }

    let mut exprs = vec![first];
    while opt((ws, terminated('=', not('=')))).parse_next(input)?.is_some() {
        ws.parse_next(input)?;
        exprs.push(star_expressions.parse_next(input)?);
    }

    let Some(value) = exprs.pop() else {
        return Err(ParserError::from_input(input));
    };
    if exprs.is_empty() {
        return Ok(StatementKind::Expr(value));
    }
    Ok(StatementKind::Assign(Assign {
        targets: exprs,
        value,
        text: source_text(consumed(start, input)),
    }))
}

fn augmented_operator<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    alt((
        "+=", "-=", "**=", "*=", "//=", "/=", "%=", "@=", ">>=", "<<=", "&=", "^=", "|=",
    ))
    .parse_next(input)
}

// --- patterns ---

fn pattern(input: &mut &str) -> winnow::Result<Pattern> {
    let start = *input;
    let mut items = vec![as_pattern.parse_next(input)?];
    let mut sequence = false;
    while opt((ws, ',')).parse_next(input)?.is_some() {
        sequence = true;
        match opt(preceded(ws, as_pattern)).parse_next(input)? {
            Some(item) => items.push(item),
            None => break,
        }
    }
    match items.pop() {
        Some(only) if !sequence => Ok(only),
        _ => Ok(Pattern {
            kind: PatternKind::Sequence,
            text: source_text(consumed(start, input)),
        }),
    }
}

fn as_pattern(input: &mut &str) -> winnow::Result<Pattern> {
    let start = *input;
    let inner = or_pattern.parse_next(input)?;
    match opt(preceded((ws, keyword("as"), ws), identifier)).parse_next(input)? {
        Some(name) => Ok(Pattern {
            kind: PatternKind::As(Box::new(inner), name.to_string()),
            text: source_text(consumed(start, input)),
        }),
        None => Ok(inner),
    }
}

fn or_pattern(input: &mut &str) -> winnow::Result<Pattern> {
    let start = *input;
    let first = closed_pattern.parse_next(input)?;
    let rest: Vec<Pattern> = repeat(0.., preceded((ws, '|', ws), closed_pattern)).parse_next(input)?;
    if rest.is_empty() {
        return Ok(first);
    }
    let mut alternatives = vec![first];
    alternatives.extend(rest);
    Ok(Pattern {
        kind: PatternKind::Or(alternatives),
        text: source_text(consumed(start, input)),
    })
}

fn closed_pattern(input: &mut &str) -> winnow::Result<Pattern> {
    let start = *input;
    if let Some(literal) = opt(literal_pattern).parse_next(input)? {
        return Ok(Pattern {
            text: literal.text.clone(),
            kind: PatternKind::Literal(literal),
        });
    }

    if input.starts_with('(') {
        let group = opt(terminated(preceded(('(', ws), pattern), (ws, ')'))).parse_next(input)?;
        if let Some(inner) = group {
            return Ok(inner);
        }
    }
    if input.starts_with(['(', '[']) {
        balanced.parse_next(input)?;
        return Ok(Pattern {
            kind: PatternKind::Sequence,
            text: source_text(consumed(start, input)),
        });
    }
    if input.starts_with('{') {
        balanced.parse_next(input)?;
        return Ok(Pattern {
            kind: PatternKind::Mapping,
            text: source_text(consumed(start, input)),
        });
    }

    let dotted = (identifier, repeat::<_, _, (), _, _>(0.., (ws, '.', ws, identifier)))
        .take()
        .parse_next(input)?;
    if opt((ws, balanced)).parse_next(input)?.is_some() {
        return Ok(Pattern {
            kind: PatternKind::Class,
            text: source_text(consumed(start, input)),
        });
    }
    let kind = if dotted == "_" {
        PatternKind::Wildcard
    } else if dotted.contains('.') {
        PatternKind::Value(dotted.to_string())
    } else if KEYWORDS.contains(&dotted) {
        return Err(ParserError::from_input(input));
    } else {
        PatternKind::Capture(dotted.to_string())
    };
    Ok(Pattern {
        kind,
        text: dotted.to_string(),
    })
}

fn literal_pattern(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let mut literal = alt((
        preceded(('-', ws), number).map(|operand| {
            Expr::new(
                ExprKind::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                },
                String::new(),
            )
        }),
        number,
        string_atom,
        keyword("None").value(Expr::constant(Constant::None, "None")),
        keyword("True").value(Expr::constant(Constant::Bool(true), "True")),
        keyword("False").value(Expr::constant(Constant::Bool(false), "False")),
    ))
    .parse_next(input)?;
    literal.text = source_text(consumed(start, input));
    Ok(literal)
}

// --- expressions ---

fn star_expressions(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let (mut items, trailing_comma) = expression_list.parse_next(input)?;
    if items.len() == 1 && !trailing_comma {
        if let Some(only) = items.pop() {
            return Ok(only);
        }
    }
    Ok(Expr::new(
        ExprKind::Tuple(items),
        source_text(consumed(start, input)),
    ))
}

fn expression_list(input: &mut &str) -> winnow::Result<(Vec<Expr>, bool)> {
    let mut items = vec![expression.parse_next(input)?];
    let mut trailing_comma = false;
    while opt((ws, ',')).parse_next(input)?.is_some() {
        trailing_comma = true;
        match opt(preceded(ws, expression)).parse_next(input)? {
            Some(item) => {
                items.push(item);
                trailing_comma = false;
            }
            None => break,
        }
    }
    Ok((items, trailing_comma))
}

fn expression(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let body = disjunction.parse_next(input)?;
    let rest = opt((
        preceded((ws, keyword("if"), ws), disjunction),
        preceded((ws, keyword("else"), ws), expression),
    ))
    .parse_next(input)?;
    match rest {
        None => Ok(body),
        Some((test, orelse)) => Ok(Expr::new(
            ExprKind::IfElse {
                test: Box::new(test),
                body: Box::new(body),
                orelse: Box::new(orelse),
            },
            source_text(consumed(start, input)),
        )),
    }
}

fn disjunction(input: &mut &str) -> winnow::Result<Expr> {
    bool_chain(input, "or", BoolOp::Or, conjunction)
}

fn conjunction(input: &mut &str) -> winnow::Result<Expr> {
    bool_chain(input, "and", BoolOp::And, inversion)
}

fn bool_chain<'s>(
    input: &mut &'s str,
    word: &'static str,
    op: BoolOp,
    operand: fn(&mut &'s str) -> winnow::Result<Expr>,
) -> winnow::Result<Expr> {
    let start = *input;
    let first = operand(input)?;
    let rest: Vec<Expr> = repeat(0.., preceded((ws, keyword(word), ws), operand)).parse_next(input)?;
    if rest.is_empty() {
        return Ok(first);
    }
    let mut values = vec![first];
    values.extend(rest);
    Ok(Expr::new(
        ExprKind::Bool { op, values },
        source_text(consumed(start, input)),
    ))
}

fn inversion(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    if let Some(operand) = opt(preceded((keyword("not"), ws), inversion)).parse_next(input)? {
        return Ok(Expr::new(
            ExprKind::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            },
            source_text(consumed(start, input)),
        ));
    }
    comparison.parse_next(input)
}

fn comparison(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let left = bit_or.parse_next(input)?;
    let comparisons: Vec<(CmpOp, Expr)> =
        repeat(0.., (preceded(ws, comparison_operator), preceded(ws, bit_or))).parse_next(input)?;
    if comparisons.is_empty() {
        return Ok(left);
    }
    Ok(Expr::new(
        ExprKind::Compare {
            left: Box::new(left),
            comparisons,
        },
        source_text(consumed(start, input)),
    ))
}

fn comparison_operator(input: &mut &str) -> winnow::Result<CmpOp> {
    alt((
        "==".value(CmpOp::Eq),
        "!=".value(CmpOp::NotEq),
        "<=".value(CmpOp::LtE),
        ">=".value(CmpOp::GtE),
        terminated("<", not('<')).value(CmpOp::Lt),
        terminated(">", not('>')).value(CmpOp::Gt),
        (keyword("not"), ws, keyword("in")).value(CmpOp::NotIn),
        keyword("in").value(CmpOp::In),
        (keyword("is"), ws, keyword("not")).value(CmpOp::IsNot),
        keyword("is").value(CmpOp::Is),
    ))
    .parse_next(input)
}

fn binary_level<'s>(
    input: &mut &'s str,
    operand: fn(&mut &'s str) -> winnow::Result<Expr>,
    operator: fn(&mut &'s str) -> winnow::Result<BinOp>,
) -> winnow::Result<Expr> {
    let start = *input;
    let mut left = operand(input)?;
    while let Some((op, right)) =
        opt((preceded(ws, operator), preceded(ws, operand))).parse_next(input)?
    {
        left = Expr::new(
            ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            source_text(consumed(start, input)),
        );
    }
    Ok(left)
}

fn bit_or(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, bit_xor, |i| {
        terminated('|', not('=')).value(BinOp::BitOr).parse_next(i)
    })
}

fn bit_xor(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, bit_and, |i| {
        terminated('^', not('=')).value(BinOp::BitXor).parse_next(i)
    })
}

fn bit_and(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, shift, |i| {
        terminated('&', not('=')).value(BinOp::BitAnd).parse_next(i)
    })
}

fn shift(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, sum, |i| {
        terminated(
            alt(("<<".value(BinOp::LShift), ">>".value(BinOp::RShift))),
            not('='),
        )
        .parse_next(i)
    })
}

fn sum(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, term, |i| {
        terminated(
            alt(('+'.value(BinOp::Add), '-'.value(BinOp::Sub))),
            not('='),
        )
        .parse_next(i)
    })
}

fn term(input: &mut &str) -> winnow::Result<Expr> {
    binary_level(input, factor, |i| {
        terminated(
            alt((
                "//".value(BinOp::FloorDiv),
                terminated('*', not('*')).value(BinOp::Mul),
                '/'.value(BinOp::Div),
                '%'.value(BinOp::Mod),
                '@'.value(BinOp::MatMul),
            )),
            not('='),
        )
        .parse_next(i)
    })
}

fn factor(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let op = opt(alt((
        '-'.value(UnaryOp::Neg),
        '+'.value(UnaryOp::Pos),
        '~'.value(UnaryOp::Invert),
    )))
    .parse_next(input)?;
    match op {
        Some(op) => {
            let operand = preceded(ws, factor).parse_next(input)?;
            Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                source_text(consumed(start, input)),
            ))
        }
        None => power.parse_next(input),
    }
}

fn power(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let base = primary.parse_next(input)?;
    match opt(preceded((ws, terminated("**", not('=')), ws), factor)).parse_next(input)? {
        Some(exponent) => Ok(Expr::new(
            ExprKind::Binary {
                op: BinOp::Pow,
                left: Box::new(base),
                right: Box::new(exponent),
            },
            source_text(consumed(start, input)),
        )),
        None => Ok(base),
    }
}

fn primary(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let mut expr = atom.parse_next(input)?;
    loop {
        let checkpoint = *input;
        ws.parse_next(input)?;
        if input.starts_with('.') {
            let Some(attr) = opt(preceded(('.', ws), identifier)).parse_next(input)? else {
                *input = checkpoint;
                break;
            };
            expr = Expr::new(
                ExprKind::Attribute {
                    value: Box::new(expr),
                    attr: attr.to_string(),
                },
                source_text(consumed(start, input)),
            );
        } else if input.starts_with('(') {
            let kind = match opt(call_arguments).parse_next(input)? {
                Some((args, keywords)) => ExprKind::Call {
                    func: Box::new(expr),
                    args,
                    keywords,
                },
                None => {
                    let raw = balanced.parse_next(input)?;
                    let inner = &raw[1..raw.len() - 1];
                    ExprKind::Call {
                        func: Box::new(expr),
                        args: vec![Expr::new(ExprKind::Opaque, source_text(inner.trim()))],
                        keywords: Vec::new(),
                    }
                }
            };
            expr = Expr::new(kind, source_text(consumed(start, input)));
        } else if input.starts_with('[') {
            let index = match opt(terminated(preceded(('[', ws), expression), (ws, ']')))
                .parse_next(input)?
            {
                Some(index) => index,
                None => {
                    let raw = balanced.parse_next(input)?;
                    let inner = &raw[1..raw.len() - 1];
                    Expr::new(ExprKind::Opaque, source_text(inner.trim()))
                }
            };
            expr = Expr::new(
                ExprKind::Subscript {
                    value: Box::new(expr),
                    index: Box::new(index),
                },
                source_text(consumed(start, input)),
            );
        } else {
            *input = checkpoint;
            break;
        }
    }
    Ok(expr)
}

fn call_arguments(input: &mut &str) -> winnow::Result<(Vec<Expr>, Vec<Keyword>)> {
    ('(', ws).parse_next(input)?;
    let mut args = Vec::new();
    let mut keywords = Vec::new();
    if opt(')').parse_next(input)?.is_some() {
        return Ok((args, keywords));
    }
    loop {
        let keyword_arg = opt((identifier, ws, terminated('=', not('=')), ws, expression))
            .parse_next(input)?;
        match keyword_arg {
            Some((name, _, _, _, value)) => keywords.push(Keyword {
                name: name.to_string(),
                value,
            }),
            None => {
                let arg = expression.parse_next(input)?;
                if !keywords.is_empty() {
                    return Err(ParserError::from_input(input));
                }
                args.push(arg);
            }
        }
        ws.parse_next(input)?;
        if opt(',').parse_next(input)?.is_some() {
            ws.parse_next(input)?;
            if opt(')').parse_next(input)?.is_some() {
                break;
            }
            continue;
        }
        ')'.parse_next(input)?;
        break;
    }
    Ok((args, keywords))
}

fn atom(input: &mut &str) -> winnow::Result<Expr> {
    alt((
        string_atom,
        number,
        parenthesized,
        list_display,
        brace_display,
        name_or_constant,
        "...".map(|_| Expr::new(ExprKind::Opaque, "...")),
    ))
    .parse_next(input)
}

fn name_or_constant(input: &mut &str) -> winnow::Result<Expr> {
    let id = identifier.parse_next(input)?;
    let kind = match id {
        "True" => ExprKind::Constant(Constant::Bool(true)),
        "False" => ExprKind::Constant(Constant::Bool(false)),
        "None" => ExprKind::Constant(Constant::None),
        _ if KEYWORDS.contains(&id) => return Err(ParserError::from_input(input)),
        _ => ExprKind::Name(id.to_string()),
    };
    Ok(Expr::new(kind, id))
}

fn parenthesized(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    ('(', ws).parse_next(input)?;
    if opt(')').parse_next(input)?.is_some() {
        return Ok(Expr::new(ExprKind::Tuple(Vec::new()), "()"));
    }
    match opt(terminated(expression_list, (ws, ')'))).parse_next(input)? {
        Some((mut items, false)) if items.len() == 1 => match items.pop() {
            Some(inner) => Ok(inner),
            None => Err(ParserError::from_input(input)),
        },
        Some((items, _)) => Ok(Expr::new(
            ExprKind::Tuple(items),
            source_text(consumed(start, input)),
        )),
        None => {
            *input = start;
            balanced.parse_next(input)?;
            Ok(Expr::new(ExprKind::Opaque, source_text(consumed(start, input))))
        }
    }
}

fn list_display(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    ('[', ws).parse_next(input)?;
    if opt(']').parse_next(input)?.is_some() {
        return Ok(Expr::new(ExprKind::List(Vec::new()), "[]"));
    }
    match opt(terminated(expression_list, (ws, ']'))).parse_next(input)? {
        Some((items, _)) => Ok(Expr::new(
            ExprKind::List(items),
            source_text(consumed(start, input)),
        )),
        None => {
            *input = start;
            balanced.parse_next(input)?;
            Ok(Expr::new(ExprKind::Opaque, source_text(consumed(start, input))))
        }
    }
}

fn brace_display(input: &mut &str) -> winnow::Result<Expr> {
    if !input.starts_with('{') {
        return Err(ParserError::from_input(input));
    }
    let raw = balanced.parse_next(input)?;
    Ok(Expr::new(ExprKind::Opaque, source_text(raw)))
}

fn number(input: &mut &str) -> winnow::Result<Expr> {
    let digits = || {
        (
            one_of(|c: char| c.is_ascii_digit()),
            take_while(0.., |c: char| c.is_ascii_digit() || c == '_'),
        )
    };
    let exponent = || (one_of(['e', 'E']), opt(one_of(['+', '-'])), digits());

    let text = alt((
        (
            '0',
            one_of(['x', 'X', 'o', 'O', 'b', 'B']),
            take_while(1.., |c: char| c.is_ascii_hexdigit() || c == '_'),
        )
            .take(),
        (digits(), opt(('.', opt(digits()))), opt(exponent())).take(),
        ('.', digits(), opt(exponent())).take(),
    ))
    .parse_next(input)?;

    if opt(one_of(['j', 'J'])).parse_next(input)?.is_some() {
        return Ok(Expr::new(ExprKind::Opaque, format!("{text}j")));
    }
    if input.starts_with(|c: char| c.is_alphanumeric() || c == '_') {
        return Err(ParserError::from_input(input));
    }

    let Some(value) = number_value(text) else {
        return Err(ParserError::from_input(input));
    };
    Ok(Expr::constant(value, text))
}

fn number_value(text: &str) -> Option<Constant> {
    let cleaned = text.replace('_', "");
    let lower = cleaned.to_ascii_lowercase();
    let radix = match lower.get(..2) {
        Some("0x") => Some(16),
        Some("0o") => Some(8),
        Some("0b") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return i64::from_str_radix(&lower[2..], radix).ok().map(Constant::Int);
    }
    if lower.contains(['.', 'e']) {
        return lower.parse::<f64>().ok().map(Constant::Float);
    }
    lower.parse::<i64>().ok().map(Constant::Int)
}

fn string_atom(input: &mut &str) -> winnow::Result<Expr> {
    let start = *input;
    let (mut value, mut formatted) = string_literal.parse_next(input)?;
    loop {
        let checkpoint = *input;
        ws.parse_next(input)?;
        match opt(string_literal).parse_next(input)? {
            Some((more, more_formatted)) => {
                value.push_str(&more);
                formatted |= more_formatted;
            }
            None => {
                *input = checkpoint;
                break;
            }
        }
    }
    let kind = if formatted {
        ExprKind::FormattedString
    } else {
        ExprKind::Constant(Constant::Str(value))
    };
    Ok(Expr::new(kind, source_text(consumed(start, input))))
}

fn string_literal(input: &mut &str) -> winnow::Result<(String, bool)> {
    let prefix = take_while(0..=2, ['r', 'R', 'b', 'B', 'u', 'U', 'f', 'F']).parse_next(input)?;
    let raw = prefix.contains(['r', 'R']);
    let formatted = prefix.contains(['f', 'F']);
    let quote = alt(("'''", "\"\"\"", "'", "\"")).parse_next(input)?;

    let body = *input;
    let mut value = String::new();
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        if body[i..].starts_with(quote) {
            *input = &body[i + quote.len()..];
            return Ok((value, formatted));
        }
        match c {
            '\\' => {
                let Some((_, escaped)) = chars.next() else {
                    break;
                };
                if raw {
                    value.push('\\');
                    value.push(escaped);
                    continue;
                }
                match escaped {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '0' => value.push('\0'),
                    '\n' => {}
                    '\\' | '\'' | '"' => value.push(escaped),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
            }
            '\n' if quote.len() == 1 => break,
            _ => value.push(c),
        }
    }
    Err(ParserError::from_input(input))
}

// --- lexical helpers ---

/// Skip blanks, line continuations and comments. Logical lines only hold
/// newlines inside brackets, so newlines count as blanks here.
fn ws(input: &mut &str) -> winnow::Result<()> {
    loop {
        *input = input.trim_start_matches([' ', '\t', '\r', '\n', '\x0c']);
        if let Some(rest) = input.strip_prefix('\\') {
            if rest.starts_with(['\n', '\r']) {
                *input = rest;
                continue;
            }
        }
        if input.starts_with('#') {
            let end = input.find('\n').unwrap_or(input.len());
            *input = &input[end..];
            continue;
        }
        return Ok(());
    }
}

fn keyword<'s>(word: &'static str) -> impl Parser<&'s str, &'s str, ContextError> {
    terminated(word, not(one_of(|c: char| c.is_alphanumeric() || c == '_')))
}

fn identifier<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    (
        one_of(|c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)
}

/// Consume one bracketed group, nested brackets and strings included.
fn balanced<'s>(input: &mut &'s str) -> winnow::Result<&'s str> {
    let start = *input;
    if !start.starts_with(['(', '[', '{']) {
        return Err(ParserError::from_input(input));
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut chars = start.char_indices();
    while let Some((i, c)) = chars.next() {
        if let Some(q) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth == 0 {
                    let end = i + c.len_utf8();
                    *input = &start[end..];
                    return Ok(&start[..end]);
                }
            }
            _ => {}
        }
    }
    Err(ParserError::from_input(input))
}

fn consumed<'s>(start: &'s str, rest: &'s str) -> &'s str {
    &start[..start.len() - rest.len()]
}

/// Source text with line breaks inside brackets folded to single spaces.
fn source_text(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.to_string();
    }
    let mut out = String::new();
    for piece in raw.lines() {
        let piece = piece.trim();
        let piece = piece.strip_suffix('\\').map_or(piece, str::trim_end);
        if piece.is_empty() {
            continue;
        }
        let glue = !out.is_empty()
            && !out.ends_with(['(', '[', '{'])
            && !piece.starts_with([')', ']', '}']);
        if glue {
            out.push(' ');
        }
        out.push_str(piece);
    }
    out
}
