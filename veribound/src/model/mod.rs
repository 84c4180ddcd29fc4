//! Class model definitions
//!
//! The simplified object model extracted from a class by the external
//! analyzer: fields, properties, methods with contract clauses, class
//! invariants, and diagnostics for everything the verifier cannot model.
//! The model is an immutable snapshot; it is produced through a consuming
//! builder and never mutated afterwards.

mod contract;
mod expr;

pub use contract::*;
pub use expr::*;

use serde::{Deserialize, Serialize};

use crate::error::VeriboundError;

/// Access modifier of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessModifier {
    Public,
    Private,
}

/// Class field
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: ExpressionType,
    /// Optional literal initializer, asserted at generation 0
    pub initializer: Option<Expression>,
}

/// Class property (modeled like a field with public visibility)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub ty: ExpressionType,
    pub initializer: Option<Expression>,
}

/// Method parameter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: ExpressionType,
}

/// Method local variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Local {
    pub name: String,
    pub ty: ExpressionType,
    pub initializer: Option<Expression>,
}

/// Statement in a method body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    /// Assignment to a field, property, parameter or local
    Assignment { destination: String, value: Expression },
    /// Conditional with two branch lists
    Conditional {
        condition: Expression,
        then_branch: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    /// Return, with an expression for value-returning methods
    Return { value: Option<Expression> },
    /// Call to a void method of the class
    ProcedureCall {
        kind: CallKind,
        name: String,
        arguments: Vec<Expression>,
    },
    /// Condition-guarded loop, unrolled up to the verification depth
    Loop {
        condition: Expression,
        body: Vec<Statement>,
    },
}

/// Method of the class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub access: AccessModifier,
    pub is_static: bool,
    pub parameters: Vec<Parameter>,
    pub locals: Vec<Local>,
    pub requires: Vec<Require>,
    pub ensures: Vec<Ensure>,
    pub return_type: ExpressionType,
    pub body: Vec<Statement>,
}

impl Method {
    pub fn is_public(&self) -> bool {
        self.access == AccessModifier::Public
    }

    pub fn returns_value(&self) -> bool {
        self.return_type != ExpressionType::Void
    }
}

/// Immutable snapshot of a class, as extracted by the external analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassModel {
    name: String,
    fields: Vec<Field>,
    properties: Vec<Property>,
    methods: Vec<Method>,
    invariants: Vec<Invariant>,
    unsupported: Vec<UnsupportedConstruct>,
}

impl ClassModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn invariants(&self) -> &[Invariant] {
        &self.invariants
    }

    pub fn unsupported(&self) -> &[UnsupportedConstruct] {
        &self.unsupported
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.iter().find(|m| m.name == name)
    }
}

/// Builder for [`ClassModel`].
///
/// Consumed by `build()`; once the model is produced there is no mutation
/// path, which replaces any runtime sealing check with a compile-time one.
#[derive(Debug)]
pub struct ClassModelBuilder {
    model: ClassModel,
}

impl ClassModelBuilder {
    /// Start a model for the named class. The name must contain at least
    /// one non-whitespace character.
    pub fn new(name: impl Into<String>) -> Result<Self, VeriboundError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(VeriboundError::InvalidClassName(name));
        }
        Ok(Self {
            model: ClassModel {
                name,
                fields: Vec::new(),
                properties: Vec::new(),
                methods: Vec::new(),
                invariants: Vec::new(),
                unsupported: Vec::new(),
            },
        })
    }

    pub fn field(mut self, field: Field) -> Self {
        if let Some(init) = &field.initializer
            && !init.is_literal()
        {
            self.model.unsupported.push(UnsupportedConstruct::new(
                format!("non-literal initializer for field {}", field.name),
                Location::default(),
            ));
        }
        self.model.fields.push(field);
        self
    }

    pub fn property(mut self, property: Property) -> Self {
        if let Some(init) = &property.initializer
            && !init.is_literal()
        {
            self.model.unsupported.push(UnsupportedConstruct::new(
                format!("non-literal initializer for property {}", property.name),
                Location::default(),
            ));
        }
        self.model.properties.push(property);
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.model.methods.push(method);
        self
    }

    pub fn invariant(mut self, invariant: Invariant) -> Self {
        self.model.invariants.push(invariant);
        self
    }

    pub fn unsupported(mut self, diagnostic: UnsupportedConstruct) -> Self {
        self.model.unsupported.push(diagnostic);
        self
    }

    pub fn build(self) -> ClassModel {
        self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_field(name: &str, init: i64) -> Field {
        Field {
            name: name.to_string(),
            ty: ExpressionType::Integer,
            initializer: Some(Expression::IntLiteral(init)),
        }
    }

    #[test]
    fn test_builder_rejects_empty_name() {
        assert!(matches!(
            ClassModelBuilder::new(""),
            Err(VeriboundError::InvalidClassName(_))
        ));
        assert!(matches!(
            ClassModelBuilder::new("   "),
            Err(VeriboundError::InvalidClassName(_))
        ));
    }

    #[test]
    fn test_builder_produces_model() {
        let model = ClassModelBuilder::new("Counter")
            .unwrap()
            .field(int_field("X", 0))
            .invariant(Invariant::new(
                Expression::Comparison {
                    left: Box::new(Expression::Variable(VariablePath::simple("X"))),
                    op: ComparisonOp::Ge,
                    right: Box::new(Expression::IntLiteral(0)),
                },
                Location::new(0, 6),
            ))
            .build();

        assert_eq!(model.name(), "Counter");
        assert_eq!(model.fields().len(), 1);
        assert_eq!(model.invariants().len(), 1);
        assert_eq!(model.invariants()[0].text, "X >= 0");
        assert!(model.field("X").is_some());
        assert!(model.field("Y").is_none());
    }

    #[test]
    fn test_non_literal_initializer_is_diagnosed() {
        let model = ClassModelBuilder::new("C")
            .unwrap()
            .field(Field {
                name: "X".to_string(),
                ty: ExpressionType::Integer,
                initializer: Some(Expression::BinaryArithmetic {
                    left: Box::new(Expression::IntLiteral(1)),
                    op: ArithmeticOp::Add,
                    right: Box::new(Expression::IntLiteral(2)),
                }),
            })
            .build();
        assert_eq!(model.unsupported().len(), 1);
        assert!(model.unsupported()[0].text.contains("initializer"));
    }

    #[test]
    fn test_expression_rendering() {
        let expr = Expression::BinaryLogical {
            left: Box::new(Expression::Parenthesized(Box::new(Expression::Comparison {
                left: Box::new(Expression::Variable(VariablePath::simple("x"))),
                op: ComparisonOp::Gt,
                right: Box::new(Expression::IntLiteral(0)),
            }))),
            op: LogicalOp::And,
            right: Box::new(Expression::UnaryLogical {
                operand: Box::new(Expression::Variable(VariablePath::simple("done"))),
            }),
        };
        assert_eq!(expr.to_string(), "(x > 0) && !done");
    }

    #[test]
    fn test_function_call_rendering() {
        let expr = Expression::FunctionCall {
            kind: CallKind::Private,
            name: "Sum".to_string(),
            arguments: vec![
                Expression::Variable(VariablePath::simple("a")),
                Expression::IntLiteral(2),
            ],
        };
        assert_eq!(expr.to_string(), "Sum(a, 2)");
    }

    #[test]
    fn test_expression_typing() {
        let model = ClassModelBuilder::new("C")
            .unwrap()
            .field(int_field("X", 0))
            .build();
        let ctx = TypingContext::new(&model, None);

        let var = Expression::Variable(VariablePath::simple("X"));
        assert_eq!(var.expression_type(&ctx), ExpressionType::Integer);

        let sum = Expression::BinaryArithmetic {
            left: Box::new(var.clone()),
            op: ArithmeticOp::Add,
            right: Box::new(Expression::FloatLiteral(1.5)),
        };
        assert_eq!(sum.expression_type(&ctx), ExpressionType::FloatingPoint);

        let cmp = Expression::Comparison {
            left: Box::new(var.clone()),
            op: ComparisonOp::Lt,
            right: Box::new(Expression::IntLiteral(3)),
        };
        assert_eq!(cmp.expression_type(&ctx), ExpressionType::Boolean);

        let unknown = Expression::Variable(VariablePath::simple("Missing"));
        assert!(!unknown.expression_type(&ctx).is_supported());
    }

    #[test]
    fn test_model_serde_roundtrip() {
        let model = ClassModelBuilder::new("Counter")
            .unwrap()
            .field(int_field("X", 1))
            .build();
        let json = serde_json::to_string(&model).unwrap();
        let back: ClassModel = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name(), "Counter");
        assert_eq!(back.fields().len(), 1);
    }
}
