//! Expression nodes of the class model
//!
//! The expression hierarchy is a closed sum type: the renderer (Display),
//! the type-inference pass and the solver lowering all match exhaustively,
//! so a new leaf kind cannot go silently unhandled.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClassModel, Method};

/// Simplified type of an expression in the class model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExpressionType {
    Void,
    Boolean,
    Integer,
    FloatingPoint,
    Null,
    /// Any type the verifier does not model (reported as a diagnostic)
    Other(String),
}

impl ExpressionType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::FloatingPoint)
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl fmt::Display for ExpressionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Boolean => write!(f, "bool"),
            Self::Integer => write!(f, "int"),
            Self::FloatingPoint => write!(f, "double"),
            Self::Null => write!(f, "null"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Dotted variable reference, e.g. `X` or `Items.Count`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VariablePath(pub Vec<String>);

impl VariablePath {
    pub fn simple(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Leading component of the path
    pub fn root(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    /// Single-component paths are the only ones the solver models
    pub fn is_simple(&self) -> bool {
        self.0.len() == 1
    }
}

impl fmt::Display for VariablePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for ArithmeticOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        };
        write!(f, "{s}")
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        };
        write!(f, "{s}")
    }
}

/// Equality operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EqualityOp {
    Eq,
    Ne,
}

impl fmt::Display for EqualityOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if *self == Self::Eq { "==" } else { "!=" })
    }
}

/// Binary logical operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", if *self == Self::And { "&&" } else { "||" })
    }
}

/// How a called method is reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallKind {
    Private,
    Public,
    Static,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expression {
    /// Boolean literal
    BoolLiteral(bool),
    /// Integer literal
    IntLiteral(i64),
    /// Floating-point literal
    FloatLiteral(f64),
    /// The `null` literal
    NullLiteral,
    /// Variable or dotted path reference
    Variable(VariablePath),
    /// Unary minus
    UnaryArithmetic { operand: Box<Expression> },
    /// Binary arithmetic
    BinaryArithmetic {
        left: Box<Expression>,
        op: ArithmeticOp,
        right: Box<Expression>,
    },
    /// Ordering comparison
    Comparison {
        left: Box<Expression>,
        op: ComparisonOp,
        right: Box<Expression>,
    },
    /// Equality comparison
    Equality {
        left: Box<Expression>,
        op: EqualityOp,
        right: Box<Expression>,
    },
    /// Binary logical connective
    BinaryLogical {
        left: Box<Expression>,
        op: LogicalOp,
        right: Box<Expression>,
    },
    /// Logical negation
    UnaryLogical { operand: Box<Expression> },
    /// Call to another method of the class
    FunctionCall {
        kind: CallKind,
        name: String,
        arguments: Vec<Expression>,
    },
    /// Array element access
    ElementAccess {
        variable: VariablePath,
        index: Box<Expression>,
    },
    /// Array construction
    NewArray {
        element_type: ExpressionType,
        size: Box<Expression>,
    },
    /// Object construction
    NewObject { class_name: String },
    /// Parenthesized sub-expression
    Parenthesized(Box<Expression>),
    /// The synthetic `Result` of a value-returning method (Ensure clauses)
    ResultKeyword,
}

/// Name-resolution context for expression typing
#[derive(Clone, Copy)]
pub struct TypingContext<'a> {
    pub class: &'a ClassModel,
    pub method: Option<&'a Method>,
}

impl<'a> TypingContext<'a> {
    pub fn new(class: &'a ClassModel, method: Option<&'a Method>) -> Self {
        Self { class, method }
    }

    /// Resolve a simple variable name: locals and parameters shadow
    /// properties and fields.
    pub fn variable_type(&self, name: &str) -> Option<ExpressionType> {
        if let Some(method) = self.method {
            if let Some(local) = method.locals.iter().find(|l| l.name == name) {
                return Some(local.ty.clone());
            }
            if let Some(param) = method.parameters.iter().find(|p| p.name == name) {
                return Some(param.ty.clone());
            }
        }
        if let Some(property) = self.class.property(name) {
            return Some(property.ty.clone());
        }
        self.class.field(name).map(|f| f.ty.clone())
    }
}

impl Expression {
    /// Recompute the type of this expression against a resolution context.
    ///
    /// Anything that cannot be resolved or that mixes unsupported operands
    /// types as `Other`, which downstream consumers report as a diagnostic
    /// instead of lowering.
    pub fn expression_type(&self, ctx: &TypingContext<'_>) -> ExpressionType {
        match self {
            Self::BoolLiteral(_) => ExpressionType::Boolean,
            Self::IntLiteral(_) => ExpressionType::Integer,
            Self::FloatLiteral(_) => ExpressionType::FloatingPoint,
            Self::NullLiteral => ExpressionType::Null,
            Self::Variable(path) => {
                if path.is_simple() {
                    ctx.variable_type(path.root())
                        .unwrap_or_else(|| ExpressionType::Other(path.to_string()))
                } else {
                    ExpressionType::Other(path.to_string())
                }
            }
            Self::UnaryArithmetic { operand } => {
                let inner = operand.expression_type(ctx);
                if inner.is_numeric() {
                    inner
                } else {
                    ExpressionType::Other(self.to_string())
                }
            }
            Self::BinaryArithmetic { left, right, .. } => {
                let lt = left.expression_type(ctx);
                let rt = right.expression_type(ctx);
                match (lt, rt) {
                    (ExpressionType::Integer, ExpressionType::Integer) => ExpressionType::Integer,
                    (l, r) if l.is_numeric() && r.is_numeric() => ExpressionType::FloatingPoint,
                    _ => ExpressionType::Other(self.to_string()),
                }
            }
            Self::Comparison { .. }
            | Self::Equality { .. }
            | Self::BinaryLogical { .. }
            | Self::UnaryLogical { .. } => ExpressionType::Boolean,
            Self::FunctionCall { name, .. } => ctx
                .class
                .method(name)
                .map(|m| m.return_type.clone())
                .unwrap_or_else(|| ExpressionType::Other(name.clone())),
            Self::ElementAccess { variable, .. } => {
                ExpressionType::Other(format!("{variable}[..]"))
            }
            Self::NewArray { element_type, .. } => {
                ExpressionType::Other(format!("{element_type}[]"))
            }
            Self::NewObject { class_name } => ExpressionType::Other(class_name.clone()),
            Self::Parenthesized(inner) => inner.expression_type(ctx),
            Self::ResultKeyword => ctx
                .method
                .map(|m| m.return_type.clone())
                .unwrap_or(ExpressionType::Void),
        }
    }

    /// Literals are the only legal field/local initializers
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::BoolLiteral(_) | Self::IntLiteral(_) | Self::FloatLiteral(_) | Self::NullLiteral
        )
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BoolLiteral(b) => write!(f, "{b}"),
            Self::IntLiteral(n) => write!(f, "{n}"),
            Self::FloatLiteral(x) => write!(f, "{x}"),
            Self::NullLiteral => write!(f, "null"),
            Self::Variable(path) => write!(f, "{path}"),
            Self::UnaryArithmetic { operand } => write!(f, "-{operand}"),
            Self::BinaryArithmetic { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::Equality { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::BinaryLogical { left, op, right } => write!(f, "{left} {op} {right}"),
            Self::UnaryLogical { operand } => write!(f, "!{operand}"),
            Self::FunctionCall { name, arguments, .. } => {
                write!(f, "{name}(")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::ElementAccess { variable, index } => write!(f, "{variable}[{index}]"),
            Self::NewArray { element_type, size } => write!(f, "new {element_type}[{size}]"),
            Self::NewObject { class_name } => write!(f, "new {class_name}()"),
            Self::Parenthesized(inner) => write!(f, "({inner})"),
            Self::ResultKeyword => write!(f, "Result"),
        }
    }
}
