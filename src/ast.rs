#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    /// 1-based line of the `def` header.
    pub line: usize,
    /// Source text of the whole definition, header included.
    pub source: String,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub line: usize,
    pub kind: StatementKind,
}

impl Statement {
    pub fn new(line: usize, kind: StatementKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    Assign(Assign),
    Expr(Expr),
    Pass,
    Break,
    Continue,
    If(If),
    While(While),
    Match(Match),
    /// A statement the tool recognises by its keyword but never draws.
    Other(OtherKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub targets: Vec<Expr>,
    pub value: Expr,
    /// Source text of the whole assignment.
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct If {
    pub test: Expr,
    pub body: Vec<Statement>,
    pub orelse: Option<Else>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Else {
    Block(Vec<Statement>),
    /// `elif`, kept as a nested conditional.
    Elif(Box<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct While {
    pub test: Expr,
    pub body: Vec<Statement>,
    pub orelse: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub subject: Expr,
    pub cases: Vec<MatchCase>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchCase {
    pub line: usize,
    pub pattern: Pattern,
    pub guard: Option<Expr>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub kind: PatternKind,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternKind {
    /// `_`
    Wildcard,
    /// Number, string, `None`, `True` or `False`.
    Literal(Expr),
    /// A bare name that binds the subject.
    Capture(String),
    /// A dotted name such as `Color.RED`.
    Value(String),
    Class,
    Sequence,
    Mapping,
    Or(Vec<Pattern>),
    As(Box<Pattern>, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtherKind {
    For,
    FunctionDef,
    ClassDef,
    With,
    Try,
    Except,
    Finally,
    Async,
    Return,
    Import,
    Raise,
    Assert,
    Delete,
    Global,
    Nonlocal,
    Yield,
    AugmentedAssign,
    AnnotatedAssign,
}

impl OtherKind {
    pub fn describe(self) -> &'static str {
        match self {
            Self::For => "for loop",
            Self::FunctionDef => "function definition",
            Self::ClassDef => "class definition",
            Self::With => "with statement",
            Self::Try => "try statement",
            Self::Except => "except clause",
            Self::Finally => "finally clause",
            Self::Async => "async statement",
            Self::Return => "return statement",
            Self::Import => "import statement",
            Self::Raise => "raise statement",
            Self::Assert => "assert statement",
            Self::Delete => "del statement",
            Self::Global => "global declaration",
            Self::Nonlocal => "nonlocal declaration",
            Self::Yield => "yield statement",
            Self::AugmentedAssign => "augmented assignment",
            Self::AnnotatedAssign => "annotated assignment",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Exact source text of the expression.
    pub text: String,
}

impl Expr {
    pub fn new(kind: ExprKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn name(id: &str) -> Self {
        Self::new(ExprKind::Name(id.to_string()), id)
    }

    pub fn constant(value: Constant, text: impl Into<String>) -> Self {
        Self::new(ExprKind::Constant(value), text)
    }

    /// `func(args...)` where `func` is a plain name, text rebuilt from the parts.
    pub fn call(func: &str, args: Vec<Expr>) -> Self {
        let joined = args
            .iter()
            .map(|a| a.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let text = format!("{func}({joined})");
        Self::new(
            ExprKind::Call {
                func: Box::new(Self::name(func)),
                args,
                keywords: Vec::new(),
            },
            text,
        )
    }

    pub fn is_true_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Constant(Constant::Bool(true)))
    }

    /// Name of the called function when this is a call through a plain name.
    pub fn called_name(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Call { func, .. } => match &func.kind {
                ExprKind::Name(id) => Some(id),
                _ => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Name(String),
    Constant(Constant),
    /// f-string, kept as raw source.
    FormattedString,
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Bool {
        op: BoolOp,
        values: Vec<Expr>,
    },
    Compare {
        left: Box<Expr>,
        comparisons: Vec<(CmpOp, Expr)>,
    },
    IfElse {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    /// Any bracketed form that is only ever shown, never evaluated.
    Opaque,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Pos,
    Invert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    BitOr,
    BitXor,
    BitAnd,
    LShift,
    RShift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}
