use log::debug;

use crate::ast::*;
use crate::error::BuildError;

/// What one statement turns into. Compound statements borrow their parts so
/// the builder can recurse into them.
#[derive(Debug, PartialEq)]
pub enum Construct<'a> {
    Action(String),
    Branch {
        test: &'a Expr,
        body: &'a [Statement],
        orelse: Option<&'a [Statement]>,
    },
    Loop(&'a While),
    Switch(&'a Match),
}

pub fn classify(stmt: &Statement) -> Result<Construct<'_>, BuildError> {
    let unsupported = |construct: &str| BuildError::UnsupportedConstruct {
        line: stmt.line,
        construct: construct.to_string(),
    };

    let construct = match &stmt.kind {
        StatementKind::Assign(assign) => Construct::Action(assignment_text(assign)),
        StatementKind::Expr(expr) => match expr.called_name() {
            Some("print") => Construct::Action(output_text(expr)),
            _ if is_input_call(expr) => Construct::Action(expr.text.clone()),
            _ => return Err(unsupported("expression statement")),
        },
        StatementKind::Pass => Construct::Action(String::new()),
        StatementKind::Break => return Err(unsupported("break statement")),
        StatementKind::Continue => return Err(unsupported("continue statement")),
        StatementKind::If(conditional) => match &conditional.orelse {
            None => Construct::Branch {
                test: &conditional.test,
                body: &conditional.body,
                orelse: None,
            },
            Some(Else::Block(orelse)) => Construct::Branch {
                test: &conditional.test,
                body: &conditional.body,
                orelse: Some(orelse.as_slice()),
            },
            Some(Else::Elif(elif)) => {
                return Err(BuildError::UnsupportedConstruct {
                    line: elif.line,
                    construct: "elif chain".to_string(),
                });
            }
        },
        StatementKind::While(w) if !w.orelse.is_empty() => {
            return Err(unsupported("while loop with else clause"));
        }
        StatementKind::While(w) => Construct::Loop(w),
        StatementKind::Match(m) => Construct::Switch(m),
        StatementKind::Other(kind) => return Err(unsupported(kind.describe())),
    };

    debug!(line = stmt.line; "classified statement as {}", construct.describe());
    Ok(construct)
}

impl Construct<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Self::Action(_) => "action",
            Self::Branch { .. } => "branch",
            Self::Loop(_) => "loop",
            Self::Switch(_) => "switch",
        }
    }
}

/// `x = input(...)` and `x = eval(input(...))` read a value rather than
/// compute one, so they are shown as `Input(x)`.
fn assignment_text(assign: &Assign) -> String {
    if let [target] = assign.targets.as_slice() {
        if let ExprKind::Name(name) = &target.kind {
            if is_input_call(&assign.value) {
                return format!("Input({name})");
            }
        }
    }
    assign.text.clone()
}

/// `print(...)` is shown as `Output(...)`.
fn output_text(call: &Expr) -> String {
    let args = match &call.kind {
        ExprKind::Call { func, .. } => call.text.strip_prefix(func.text.as_str()),
        _ => None,
    };
    format!("Output{}", args.unwrap_or(""))
}

fn is_input_call(expr: &Expr) -> bool {
    match expr.called_name() {
        Some("input") => true,
        Some("eval") => match &expr.kind {
            ExprKind::Call { args, .. } => args
                .first()
                .is_some_and(|arg| arg.called_name() == Some("input")),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_function;
    use pretty_assertions::assert_eq;

    fn statements(body: &str) -> Vec<Statement> {
        let indented: String = body.lines().map(|l| format!("    {l}\n")).collect();
        let source = format!("def f():\n{indented}");
        parse_function(&source, None).unwrap().unwrap().body
    }

    fn action_of(body: &str) -> String {
        let stmts = statements(body);
        match classify(&stmts[0]).unwrap() {
            Construct::Action(text) => text,
            other => panic!("expected action, got {other:?}"),
        }
    }

    fn rejection_of(body: &str) -> BuildError {
        let stmts = statements(body);
        classify(stmts.last().unwrap()).unwrap_err()
    }

    #[test]
    fn assignment_keeps_source_text() {
        assert_eq!(action_of("b = a + b"), "b = a + b");
        assert_eq!(action_of("a, b = b, a"), "a, b = b, a");
    }

    #[test]
    fn input_assignments_become_input() {
        assert_eq!(action_of("x = input()"), "Input(x)");
        assert_eq!(action_of("limit = eval(input('What?'))"), "Input(limit)");
        assert_eq!(action_of("limit = eval(\n    input('What?'))"), "Input(limit)");
    }

    #[test]
    fn other_calls_on_the_right_stay_assignments() {
        assert_eq!(action_of("x = int(input())"), "x = int(input())");
        assert_eq!(action_of("x = eval('1 + 2')"), "x = eval('1 + 2')");
        assert_eq!(action_of("a = b = input()"), "a = b = input()");
    }

    #[test]
    fn print_becomes_output() {
        assert_eq!(action_of("print(' a =', a)"), "Output(' a =', a)");
        assert_eq!(action_of("print()"), "Output()");
    }

    #[test]
    fn bare_input_call_is_kept() {
        assert_eq!(action_of("input('Press enter')"), "input('Press enter')");
    }

    #[test]
    fn pass_is_an_empty_action() {
        assert_eq!(action_of("pass"), "");
    }

    #[test]
    fn compound_statements_borrow_their_parts() {
        let stmts = statements("if a < 0:\n    pass\nelse:\n    x = 1");
        match classify(&stmts[0]).unwrap() {
            Construct::Branch { test, body, orelse } => {
                assert_eq!(test.text, "a < 0");
                assert_eq!(body.len(), 1);
                assert_eq!(orelse.map(|b| b.len()), Some(1));
            }
            other => panic!("expected branch, got {other:?}"),
        }

        let stmts = statements("while x:\n    pass");
        assert!(matches!(classify(&stmts[0]).unwrap(), Construct::Loop(_)));
        let stmts = statements("match x:\n    case 1:\n        pass");
        assert!(matches!(classify(&stmts[0]).unwrap(), Construct::Switch(_)));
    }

    #[test]
    fn unsupported_statements_are_rejected_with_their_line() {
        assert_eq!(
            rejection_of("x = 1\nfor i in range(3):\n    print(i)"),
            BuildError::UnsupportedConstruct {
                line: 3,
                construct: "for loop".to_string()
            }
        );
        assert_eq!(
            rejection_of("return 1").to_string(),
            "line 2: unsupported construct: return statement"
        );
        assert_eq!(
            rejection_of("len(x)").to_string(),
            "line 2: unsupported construct: expression statement"
        );
        assert_eq!(
            rejection_of("x += 1").to_string(),
            "line 2: unsupported construct: augmented assignment"
        );
        assert_eq!(
            rejection_of("break").to_string(),
            "line 2: unsupported construct: break statement"
        );
    }

    #[test]
    fn elif_is_rejected_at_the_elif_line() {
        let err = rejection_of("if a:\n    pass\nelif b:\n    pass");
        assert_eq!(
            err,
            BuildError::UnsupportedConstruct {
                line: 4,
                construct: "elif chain".to_string()
            }
        );
    }

    #[test]
    fn while_else_is_rejected() {
        let err = rejection_of("while a:\n    pass\nelse:\n    pass");
        assert_eq!(err.line(), 2);
        assert!(err.to_string().contains("else clause"), "got: {err}");
    }
}
