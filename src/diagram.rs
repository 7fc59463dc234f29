#[derive(Debug, Clone, PartialEq)]
pub enum DiagramNode {
    /// Boxes stacked top to bottom. Never directly contains another sequence.
    Sequence(Vec<DiagramNode>),
    /// One line of text. The empty string stands for `pass`.
    Action { text: String },
    Branch {
        condition: String,
        then_body: Box<DiagramNode>,
        else_body: Option<Box<DiagramNode>>,
    },
    WhileLoop {
        condition: String,
        body: Box<DiagramNode>,
    },
    /// Post-test loop; `condition` is the "keep going" test checked after the body.
    DoWhileLoop {
        condition: String,
        body: Box<DiagramNode>,
    },
    /// Multi-way branch. A wildcard case, if any, is the last one.
    Switch {
        subject: String,
        cases: Vec<SwitchCase>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub label: CaseLabel,
    pub body: DiagramNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaseLabel {
    /// Source text of the literal pattern.
    Literal(String),
    Wildcard,
}

impl DiagramNode {
    /// Build a sequence, splicing in the children of nested sequences.
    pub fn sequence(children: impl IntoIterator<Item = DiagramNode>) -> Self {
        let mut flat = Vec::new();
        for child in children {
            match child {
                Self::Sequence(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Self::Sequence(flat)
    }

    pub fn action(text: impl Into<String>) -> Self {
        Self::Action { text: text.into() }
    }

    /// Number of `Action` leaves anywhere in the tree.
    pub fn action_count(&self) -> usize {
        match self {
            Self::Sequence(children) => children.iter().map(Self::action_count).sum(),
            Self::Action { .. } => 1,
            Self::Branch {
                then_body,
                else_body,
                ..
            } => then_body.action_count() + else_body.as_ref().map_or(0, |b| b.action_count()),
            Self::WhileLoop { body, .. } | Self::DoWhileLoop { body, .. } => body.action_count(),
            Self::Switch { cases, .. } => cases.iter().map(|c| c.body.action_count()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sequence_flattens_nested_sequences() {
        let node = DiagramNode::sequence([
            DiagramNode::action("a = 1"),
            DiagramNode::sequence([DiagramNode::action("b = 2"), DiagramNode::action("c = 3")]),
        ]);
        assert_eq!(
            node,
            DiagramNode::Sequence(vec![
                DiagramNode::action("a = 1"),
                DiagramNode::action("b = 2"),
                DiagramNode::action("c = 3"),
            ])
        );
    }

    #[test]
    fn action_count_walks_every_box() {
        let node = DiagramNode::sequence([
            DiagramNode::action("a = 1"),
            DiagramNode::WhileLoop {
                condition: "a < 3".to_string(),
                body: Box::new(DiagramNode::sequence([DiagramNode::Branch {
                    condition: "a".to_string(),
                    then_body: Box::new(DiagramNode::sequence([DiagramNode::action("")])),
                    else_body: Some(Box::new(DiagramNode::sequence([
                        DiagramNode::action("x"),
                        DiagramNode::action("y"),
                    ]))),
                }])),
            },
            DiagramNode::Switch {
                subject: "n".to_string(),
                cases: vec![SwitchCase {
                    label: CaseLabel::Wildcard,
                    body: DiagramNode::sequence([DiagramNode::action("z")]),
                }],
            },
        ]);
        assert_eq!(node.action_count(), 5);
    }
}
