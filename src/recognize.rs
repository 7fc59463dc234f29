use log::debug;

use crate::ast::*;
use crate::diagram::CaseLabel;
use crate::error::BuildError;

#[derive(Debug, PartialEq)]
pub enum LoopShape<'a> {
    /// Ordinary pre-test loop.
    While,
    /// `while True:` whose last statement is `if not <condition>: break`.
    /// `body` excludes that trailing check.
    DoWhile {
        condition: &'a Expr,
        body: &'a [Statement],
    },
}

/// Classify a `while` loop starting on `line`.
///
/// A `while True:` loop is only drawable when it ends in a single negated
/// exit test and has no other `break`. Any other infinite loop is rejected.
pub fn recognize_loop(line: usize, w: &While) -> Result<LoopShape<'_>, BuildError> {
    if !w.test.is_true_literal() {
        return Ok(LoopShape::While);
    }

    let shape_error = |line: usize, reason: String| BuildError::UnsupportedLoopShape { line, reason };

    let Some((last, rest)) = w.body.split_last() else {
        return Err(shape_error(line, "empty loop body".to_string()));
    };
    let Some(exit_test) = exit_test(last) else {
        return Err(shape_error(
            line,
            "`while True` loop must end with `if not <condition>: break`".to_string(),
        ));
    };
    let ExprKind::Unary {
        op: UnaryOp::Not,
        operand,
    } = &exit_test.kind
    else {
        return Err(shape_error(
            last.line,
            format!("exit test `{}` is not a negation", exit_test.text),
        ));
    };
    if let Some(early) = find_break(rest) {
        return Err(shape_error(
            early,
            "`break` before the trailing exit test".to_string(),
        ));
    }

    debug!(line = line, condition = operand.text.as_str(); "recognized do-while loop");
    Ok(LoopShape::DoWhile {
        condition: operand,
        body: rest,
    })
}

/// The test of `if <test>: break` with no else branch.
fn exit_test(stmt: &Statement) -> Option<&Expr> {
    match &stmt.kind {
        StatementKind::If(If {
            test,
            body,
            orelse: None,
        }) if matches!(body.as_slice(), [Statement { kind: StatementKind::Break, .. }]) => {
            Some(test)
        }
        _ => None,
    }
}

/// Line of the first `break` that would leave the loop owning `body`.
/// Breaks inside nested loops belong to those loops.
fn find_break(body: &[Statement]) -> Option<usize> {
    body.iter().find_map(|stmt| match &stmt.kind {
        StatementKind::Break => Some(stmt.line),
        StatementKind::If(conditional) => {
            find_break(&conditional.body).or_else(|| match &conditional.orelse {
                Some(Else::Block(orelse)) => find_break(orelse),
                Some(Else::Elif(elif)) => find_break(std::slice::from_ref(&**elif)),
                None => None,
            })
        }
        StatementKind::Match(m) => m.cases.iter().find_map(|case| find_break(&case.body)),
        _ => None,
    })
}

/// Case labels of a `match` drawable as a switch, in source order.
///
/// Every case must be a literal or the wildcard `_`, without a guard, and
/// the wildcard may only come last.
pub fn recognize_switch(m: &Match) -> Result<Vec<(CaseLabel, &[Statement])>, BuildError> {
    let last = m.cases.len().saturating_sub(1);
    let mut cases = Vec::with_capacity(m.cases.len());

    for (index, case) in m.cases.iter().enumerate() {
        let pattern_error = |reason: String| BuildError::UnsupportedMatchPattern {
            line: case.line,
            reason,
        };

        if let Some(guard) = &case.guard {
            return Err(pattern_error(format!("guard `if {}`", guard.text)));
        }
        let label = match &case.pattern.kind {
            PatternKind::Literal(_) => CaseLabel::Literal(case.pattern.text.clone()),
            PatternKind::Wildcard if index == last => CaseLabel::Wildcard,
            PatternKind::Wildcard => {
                return Err(pattern_error("wildcard `_` must be the last case".to_string()));
            }
            _ => {
                return Err(pattern_error(format!(
                    "`{}` is not a literal or `_`",
                    case.pattern.text
                )));
            }
        };
        cases.push((label, case.body.as_slice()));
    }

    debug!(cases = cases.len(); "recognized switch");
    Ok(cases)
}
