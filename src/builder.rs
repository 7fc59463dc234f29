use crate::ast::Statement;
use crate::classify::{Construct, classify};
use crate::diagram::{DiagramNode, SwitchCase};
use crate::error::BuildError;
use crate::recognize::{LoopShape, recognize_loop, recognize_switch};

/// Build the box sequence for `statements`, depth first and in source order.
/// The first unsupported statement aborts the build.
pub fn build(statements: &[Statement]) -> Result<DiagramNode, BuildError> {
    let children = statements
        .iter()
        .map(build_statement)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(DiagramNode::sequence(children))
}

fn build_statement(stmt: &Statement) -> Result<DiagramNode, BuildError> {
    match classify(stmt)? {
        Construct::Action(text) => Ok(DiagramNode::Action { text }),
        Construct::Branch { test, body, orelse } => Ok(DiagramNode::Branch {
            condition: test.text.clone(),
            then_body: Box::new(build(body)?),
            else_body: orelse.map(build).transpose()?.map(Box::new),
        }),
        Construct::Loop(w) => match recognize_loop(stmt.line, w)? {
            LoopShape::While => Ok(DiagramNode::WhileLoop {
                condition: w.test.text.clone(),
                body: Box::new(build(&w.body)?),
            }),
            LoopShape::DoWhile { condition, body } => Ok(DiagramNode::DoWhileLoop {
                condition: condition.text.clone(),
                body: Box::new(build(body)?),
            }),
        },
        Construct::Switch(m) => {
            let cases = recognize_switch(m)?
                .into_iter()
                .map(|(label, body)| Ok(SwitchCase { label, body: build(body)? }))
                .collect::<Result<Vec<_>, BuildError>>()?;
            Ok(DiagramNode::Switch {
                subject: m.subject.text.clone(),
                cases,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::diagram::CaseLabel;
    use crate::parser::parse_function;
    use pretty_assertions::assert_eq;

    fn build_source(source: &str) -> Result<DiagramNode, BuildError> {
        build(&parse_function(source, None).unwrap().unwrap().body)
    }

    fn act(text: &str) -> DiagramNode {
        DiagramNode::action(text)
    }

    #[test]
    fn hand_built_statements() {
        let stmts = vec![
            Statement::new(
                2,
                StatementKind::Assign(Assign {
                    targets: vec![Expr::name("x")],
                    value: Expr::call("input", vec![]),
                    text: "x = input()".to_string(),
                }),
            ),
            Statement::new(3, StatementKind::Expr(Expr::call("print", vec![Expr::name("x")]))),
            Statement::new(4, StatementKind::Pass),
        ];
        assert_eq!(
            build(&stmts).unwrap(),
            DiagramNode::Sequence(vec![act("Input(x)"), act("Output(x)"), act("")])
        );
    }

    #[test]
    fn while_loop_scenario() {
        let tree = build_source("def f():\n    while x < 10:\n        x = x + 1\n").unwrap();
        assert_eq!(
            tree,
            DiagramNode::Sequence(vec![DiagramNode::WhileLoop {
                condition: "x < 10".to_string(),
                body: Box::new(DiagramNode::Sequence(vec![act("x = x + 1")])),
            }])
        );
    }

    #[test]
    fn do_while_scenario() {
        let source = "\
def f():
    a = 1
    b = 2
    while True:
        t = a + b
        a = b
        b = t
        if not (b < 20):
            break
";
        assert_eq!(
            build_source(source).unwrap(),
            DiagramNode::Sequence(vec![
                act("a = 1"),
                act("b = 2"),
                DiagramNode::DoWhileLoop {
                    condition: "b < 20".to_string(),
                    body: Box::new(DiagramNode::Sequence(vec![
                        act("t = a + b"),
                        act("a = b"),
                        act("b = t"),
                    ])),
                },
            ])
        );
    }

    #[test]
    fn branch_without_else() {
        let tree = build_source("def f():\n    if a:\n        pass\n").unwrap();
        assert_eq!(
            tree,
            DiagramNode::Sequence(vec![DiagramNode::Branch {
                condition: "a".to_string(),
                then_body: Box::new(DiagramNode::Sequence(vec![act("")])),
                else_body: None,
            }])
        );
    }

    #[test]
    fn switch_inside_loop() {
        let source = "\
def f():
    while n < 10:
        match n % 3:
            case 0:
                n = n - m
            case _:
                n = k + 10
";
        let tree = build_source(source).unwrap();
        let DiagramNode::Sequence(top) = &tree else {
            panic!("root must be a sequence");
        };
        let DiagramNode::WhileLoop { body, .. } = &top[0] else {
            panic!("expected a while loop");
        };
        assert_eq!(
            **body,
            DiagramNode::Sequence(vec![DiagramNode::Switch {
                subject: "n % 3".to_string(),
                cases: vec![
                    SwitchCase {
                        label: CaseLabel::Literal("0".to_string()),
                        body: DiagramNode::Sequence(vec![act("n = n - m")]),
                    },
                    SwitchCase {
                        label: CaseLabel::Wildcard,
                        body: DiagramNode::Sequence(vec![act("n = k + 10")]),
                    },
                ],
            }])
        );
    }

    #[test]
    fn action_count_matches_non_control_statements() {
        let source = "\
def f():
    a = 1
    while a < 5:
        if a % 2 == 0:
            print(a)
        else:
            pass
        a = a + 1
    x = input()
";
        assert_eq!(build_source(source).unwrap().action_count(), 5);
    }

    #[test]
    fn first_error_in_source_order_wins() {
        let source = "\
def f():
    if a:
        for i in b:
            pass
    return a
";
        assert_eq!(
            build_source(source).unwrap_err(),
            BuildError::UnsupportedConstruct {
                line: 3,
                construct: "for loop".to_string()
            }
        );
    }

    #[test]
    fn break_inside_ordinary_while_is_unsupported() {
        let err = build_source("def f():\n    while x:\n        break\n").unwrap_err();
        assert_eq!(err.to_string(), "line 3: unsupported construct: break statement");
    }

    #[test]
    fn build_is_deterministic() {
        let source = "def f():\n    a = 1\n    while a < 3:\n        a = a + 1\n";
        assert_eq!(build_source(source).unwrap(), build_source(source).unwrap());
    }
}
