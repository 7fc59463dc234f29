use std::io::{Cursor, empty};

use pretty_assertions::assert_eq;

use nassi::diagram::{CaseLabel, DiagramNode};
use nassi::error::{BuildError, Error};
use nassi::{Options, Structogram, generate};

const FN_WHILE_DO: &str = "\
def fn_while_do():
    a = 1
    b = 15
    c = 3
    while c >= -1:
        b = a + b
        a = a - b
        c = c - 2
        if (a < 0) and b <= 1:
            print(' a =', a, ' b =', b)
        else:
            b = b - 2
            a = a - 3
            print(' a =', a, ' c =', c)
    print(' c =', c)
";

const FN_DO_WHILE: &str = "\
def fn_do_while():
    limit = 12
    x = 1
    y = 1
    print(x, y)
    while True:
        z = x + y
        print(z)
        x = y
        y = z
        if not y < limit:
            break
";

const FN_SWITCH_CASE: &str = "\
def fn_switch_case():
    n = 6
    m = 2
    k = 2
    while n < 10:
        match n % 3:
            case 0:
                n = n - m
                k = k + m
                print('n =', n)
                print('k =', k)
            case 1:
                n = n + k
                m = m + 1
                print('n =', n)
                print('m =', m)
            case _:  # default case
                n = k + 10
                m = m + k
                print('n =', n)
                print('m =', m)
    n = n + m
    n = 2 * n
    print('n =', n)
";

const FN_INPUT: &str = "\
def fn_input():
    limit = eval(
        input(\"What is the upper limit?\"))
    x = 1
    y = 1
    print(x, y)
    while True:
        z = x + y
        print(z)
        x = y
        y = z
        if not y < limit:
            break
";

fn generate_ok(source: &str) -> Structogram {
    generate(source, None, &Options::default(), Box::new(empty())).unwrap()
}

fn action(text: &str) -> DiagramNode {
    DiagramNode::action(text)
}

#[test]
fn snapshot_do_while_document() {
    let structogram = generate_ok(FN_DO_WHILE);
    let expected = "\
% def fn_do_while():
%     limit = 12
%     x = 1
%     y = 1
%     print(x, y)
%     while True:
%         z = x + y
%         print(z)
%         x = y
%         y = z
%         if not y < limit:
%             break

% Structogram fn_do_while
\\begin{centernss}
  \\begin{struktogramm}(120,100)
    \\assign[6]{limit = 12}
    \\assign[6]{x = 1}
    \\assign[6]{y = 1}
    \\assign[6]{Output(x, y)}
    % do-while: repeat while y < limit
    \\until[8]{y \\textless\\  limit}
      \\assign[6]{z = x + y}
      \\assign[6]{Output(z)}
      \\assign[6]{x = y}
      \\assign[6]{y = z}
    \\untilend
  \\end{struktogramm}
\\end{centernss}

% Output of structogram fn_do_while (6 lines)
% [01] 1 1
% [02] 2
% [03] 3
% [04] 5
% [05] 8
% [06] 13
";
    assert_eq!(structogram.document, expected);
}

#[test]
fn snapshot_while_do_markup_and_trace() {
    let structogram = generate_ok(FN_WHILE_DO);
    let expected = "\
% Structogram fn_while_do
\\begin{centernss}
  \\begin{struktogramm}(120,100)
    \\assign[6]{a = 1}
    \\assign[6]{b = 15}
    \\assign[6]{c = 3}
    \\while[8]{c $\\geq$ -1}
      \\assign[6]{b = a + b}
      \\assign[6]{a = a - b}
      \\assign[6]{c = c - 2}
      \\ifthenelse{5}{5}
        {(a \\textless\\  0) \\pKey{and} b $\\leq$ 1} {\\pTrue}{\\pFalse}
        \\assign[6]{Output(\\textquotedbl  a =\\textquotedbl , a, \\textquotedbl  b =\\textquotedbl , b)}
      \\change
        \\assign[6]{b = b - 2}
        \\assign[6]{a = a - 3}
        \\assign[6]{Output(\\textquotedbl  a =\\textquotedbl , a, \\textquotedbl  c =\\textquotedbl , c)}
      \\ifend
    \\whileend
    \\assign[6]{Output(\\textquotedbl  c =\\textquotedbl , c)}
  \\end{struktogramm}
\\end{centernss}";
    assert_eq!(structogram.markup, expected);
    assert_eq!(
        structogram.annotation(),
        "\
% Output of structogram fn_while_do (4 lines)
% [01]  a = -18  c = 1
% [02]  a = -14  b = -4
% [03]  a = 1  c = -3
% [04]  c = -3"
    );
}

#[test]
fn snapshot_switch_case_markup_and_trace() {
    let structogram = generate_ok(FN_SWITCH_CASE);
    let expected = "\
% Structogram fn_switch_case
\\begin{centernss}
  \\begin{struktogramm}(120,100)
    \\assign[6]{n = 6}
    \\assign[6]{m = 2}
    \\assign[6]{k = 2}
    \\while[8]{n \\textless\\  10}
      \\case[12]{1}{3}{n \\% 3}{0}
        \\assign[6]{n = n - m}
        \\assign[6]{k = k + m}
        \\assign[6]{Output(\\textquotedbl n =\\textquotedbl , n)}
        \\assign[6]{Output(\\textquotedbl k =\\textquotedbl , k)}
      \\switch{1}
        \\assign[6]{n = n + k}
        \\assign[6]{m = m + 1}
        \\assign[6]{Output(\\textquotedbl n =\\textquotedbl , n)}
        \\assign[6]{Output(\\textquotedbl m =\\textquotedbl , m)}
      \\switch[r]{otherwise}
        \\assign[6]{n = k + 10}
        \\assign[6]{m = m + k}
        \\assign[6]{Output(\\textquotedbl n =\\textquotedbl , n)}
        \\assign[6]{Output(\\textquotedbl m =\\textquotedbl , m)}
      \\caseend
    \\whileend
    \\assign[6]{n = n + m}
    \\assign[6]{n = 2 * n}
    \\assign[6]{Output(\\textquotedbl n =\\textquotedbl , n)}
  \\end{struktogramm}
\\end{centernss}";
    assert_eq!(structogram.markup, expected);

    let trace = structogram.trace.unwrap();
    assert!(trace.is_complete());
    assert_eq!(
        trace.lines,
        vec!["n = 4", "k = 4", "n = 8", "m = 3", "n = 14", "m = 7", "n = 42"]
    );
}

#[test]
fn input_function_reads_its_answers() {
    let structogram = generate(
        FN_INPUT,
        None,
        &Options::default(),
        Box::new(Cursor::new("4\n")),
    )
    .unwrap();
    assert!(structogram.markup.contains(r"\assign[6]{Input(limit)}"));
    assert_eq!(
        structogram.trace.unwrap().lines,
        vec!["What is the upper limit?1 1", "2", "3", "5"]
    );
}

#[test]
fn input_function_without_answers_degrades_the_trace() {
    let structogram = generate_ok(FN_INPUT);
    let annotation = structogram.annotation();
    assert_eq!(
        annotation,
        "\
% Output of structogram fn_input (1 lines)
% [01] What is the upper limit?
% Execution did not complete: line 2: EOFError: EOF when reading a line"
    );
}

#[test]
fn scenario_while_loop() {
    let structogram = generate_ok("def f():\n    x = 0\n    while x < 10:\n        x = x + 1\n");
    assert_eq!(
        structogram.diagram,
        DiagramNode::sequence([
            action("x = 0"),
            DiagramNode::WhileLoop {
                condition: "x < 10".to_string(),
                body: Box::new(DiagramNode::sequence([action("x = x + 1")])),
            },
        ])
    );
}

#[test]
fn scenario_do_while_with_parenthesised_exit_test() {
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
    let structogram = generate_ok(source);
    assert_eq!(
        structogram.diagram,
        DiagramNode::sequence([
            action("a = 1"),
            action("b = 2"),
            DiagramNode::DoWhileLoop {
                condition: "b < 20".to_string(),
                body: Box::new(DiagramNode::sequence([
                    action("t = a + b"),
                    action("a = b"),
                    action("b = t"),
                ])),
            },
        ])
    );
    assert_eq!(structogram.diagram.action_count(), 5);
}

#[test]
fn endless_loop_without_exit_test_is_rejected() {
    let err = generate(
        "def f():\n    x = 1\n    while True:\n        x = x + 1\n",
        None,
        &Options::default(),
        Box::new(empty()),
    )
    .unwrap_err();
    assert!(
        matches!(err, Error::Build(BuildError::UnsupportedLoopShape { line: 3, .. })),
        "got: {err}"
    );
}

#[test]
fn switch_keeps_the_wildcard_last() {
    let source = "\
def f():
    n = 2
    match n:
        case 1:
            print('one')
        case 2:
            print('two')
        case _:
            pass
";
    let structogram = generate_ok(source);
    let DiagramNode::Sequence(children) = &structogram.diagram else {
        panic!("root is not a sequence");
    };
    let DiagramNode::Switch { subject, cases } = &children[1] else {
        panic!("expected a switch, got {:?}", children[1]);
    };
    assert_eq!(subject, "n");
    let labels: Vec<_> = cases.iter().map(|case| case.label.clone()).collect();
    assert_eq!(
        labels,
        vec![
            CaseLabel::Literal("1".to_string()),
            CaseLabel::Literal("2".to_string()),
            CaseLabel::Wildcard,
        ]
    );
    assert_eq!(structogram.trace.unwrap().lines, vec!["two"]);
}

#[test]
fn binding_pattern_is_rejected() {
    let source = "\
def f():
    n = 2
    match n:
        case 1:
            pass
        case other:
            pass
";
    let err = generate(source, None, &Options::default(), Box::new(empty())).unwrap_err();
    assert!(
        matches!(err, Error::Build(BuildError::UnsupportedMatchPattern { line: 6, .. })),
        "got: {err}"
    );
}

#[test]
fn for_loop_is_rejected_at_its_line() {
    let source = "def f():\n    total = 0\n    for i in range(3):\n        total = total + i\n";
    let err = generate(source, None, &Options::default(), Box::new(empty())).unwrap_err();
    assert_eq!(err.to_string(), "line 3: unsupported construct: for loop");
}

#[test]
fn generation_is_deterministic() {
    let first = generate_ok(FN_SWITCH_CASE);
    let second = generate_ok(FN_SWITCH_CASE);
    assert_eq!(first.document, second.document);
}
