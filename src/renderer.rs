use crate::diagram::{CaseLabel, DiagramNode};
use crate::latex::escape;

const INDENT: &str = "  ";
const EMPTY_SET: &str = r"$\emptyset$";
const ASSIGN_HEIGHT: u32 = 6;
const IF_HEIGHT: u32 = 5;
const LOOP_HEIGHT: u32 = 8;
const CASE_HEIGHT: u32 = 12;
const PICTURE_SIZE: (u32, u32) = (120, 100);
const DEFAULT_LABEL: &str = "otherwise";

/// Rendered markup lines, relative to the enclosing box.
struct Markup {
    lines: Vec<String>,
}

impl Markup {
    fn new() -> Self {
        Self { lines: Vec::new() }
    }

    fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Append a child's markup one level deeper.
    fn embed(&mut self, child: Markup) {
        self.lines
            .extend(child.lines.into_iter().map(|line| format!("{INDENT}{line}")));
    }

    fn render(&self) -> String {
        self.lines.join("\n")
    }
}

/// The struktex picture for the function `name` with body `root`.
pub fn render(name: &str, root: &DiagramNode) -> String {
    let (width, height) = PICTURE_SIZE;
    let mut picture = Markup::new();
    picture.push(format!(r"\begin{{struktogramm}}({width},{height})"));
    picture.embed(render_node(root));
    picture.push(r"\end{struktogramm}");

    let mut document = Markup::new();
    document.push(format!("% Structogram {name}"));
    document.push(r"\begin{centernss}");
    document.embed(picture);
    document.push(r"\end{centernss}");
    document.render()
}

fn render_node(node: &DiagramNode) -> Markup {
    let mut out = Markup::new();
    match node {
        DiagramNode::Sequence(children) if children.is_empty() => out.push(assign(EMPTY_SET)),
        DiagramNode::Sequence(children) => {
            for child in children {
                out.lines.extend(render_node(child).lines);
            }
        }
        DiagramNode::Action { text } if text.is_empty() => out.push(assign(EMPTY_SET)),
        DiagramNode::Action { text } => out.push(assign(&escape(text))),
        DiagramNode::Branch {
            condition,
            then_body,
            else_body,
        } => {
            out.push(format!(r"\ifthenelse{{{IF_HEIGHT}}}{{{IF_HEIGHT}}}"));
            out.push(format!(
                r"{INDENT}{{{}}} {{\pTrue}}{{\pFalse}}",
                escape(condition)
            ));
            out.embed(render_node(then_body));
            out.push(r"\change");
            match else_body {
                Some(else_body) => out.embed(render_node(else_body)),
                None => {
                    let mut empty = Markup::new();
                    empty.push(assign(EMPTY_SET));
                    out.embed(empty);
                }
            }
            out.push(r"\ifend");
        }
        DiagramNode::WhileLoop { condition, body } => {
            out.push(format!(r"\while[{LOOP_HEIGHT}]{{{}}}", escape(condition)));
            out.embed(render_node(body));
            out.push(r"\whileend");
        }
        // struktex only offers a post-test "until" box; its condition line
        // sits below the body, which is where a do-while check belongs.
        DiagramNode::DoWhileLoop { condition, body } => {
            out.push(format!("% do-while: repeat while {}", one_line(condition)));
            out.push(format!(r"\until[{LOOP_HEIGHT}]{{{}}}", escape(condition)));
            out.embed(render_node(body));
            out.push(r"\untilend");
        }
        DiagramNode::Switch { subject, cases } => {
            let has_default =
                u8::from(matches!(cases.last(), Some(case) if case.label == CaseLabel::Wildcard));
            for (index, case) in cases.iter().enumerate() {
                let label = match &case.label {
                    CaseLabel::Literal(text) => escape(text),
                    CaseLabel::Wildcard => DEFAULT_LABEL.to_string(),
                };
                if index == 0 {
                    out.push(format!(
                        r"\case[{CASE_HEIGHT}]{{{has_default}}}{{{}}}{{{}}}{{{label}}}",
                        cases.len(),
                        escape(subject)
                    ));
                } else if case.label == CaseLabel::Wildcard {
                    out.push(format!(r"\switch[r]{{{label}}}"));
                } else {
                    out.push(format!(r"\switch{{{label}}}"));
                }
                out.embed(render_node(&case.body));
            }
            out.push(r"\caseend");
        }
    }
    out
}

fn assign(text: &str) -> String {
    format!(r"\assign[{ASSIGN_HEIGHT}]{{{text}}}")
}

/// Comment lines end at the newline, so keep annotations on one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
