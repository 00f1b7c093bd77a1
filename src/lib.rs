// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

/*! Mining schema pruning for parsed predictive-model documents.

The crate takes an in-memory, tree-shaped model document (a [`Document`]
holding one or more [`Model`]s, possibly nested through ensemble
[`Segmentation`]s) and removes every *active* mining-field declaration
that is not actually needed to compute the model's outputs.

The central entry point is [`MiningSchemaCleaner::clean`], which runs the
whole pass in one post-order sweep:

- [`FieldReferenceFinder`] harvests the field names a subtree mentions.
- [`FieldDependencyResolver`] closes that set over derived-field
  definitions.
- [`MiningSchemaCleaner`] resolves the closed set against the scope
  visible to each model and prunes its mining schema in place.

The pass never evaluates predicates or expressions; it only cares about
*which* fields a piece of tree reads.

[`Document`]: crate::document::Document
[`Model`]: crate::document::Model
[`Segmentation`]: crate::document::Segmentation
[`FieldReferenceFinder`]: crate::visitors::FieldReferenceFinder
[`FieldDependencyResolver`]: crate::visitors::FieldDependencyResolver
[`MiningSchemaCleaner`]: crate::visitors::MiningSchemaCleaner
*/

// Clippy lints
#![allow(clippy::must_use_candidate, clippy::default_trait_access)]

use serde::{Deserialize, Serialize};

type FastHashMap<K, V> = rustc_hash::FxHashMap<K, V>;
type FastHashSet<K> = rustc_hash::FxHashSet<K>;

pub mod document;
pub mod visitors;

pub use document::{Document, DocumentError, MiningField, MiningSchema, Model, UsageType};
pub use visitors::{clean, FieldDependencyResolver, FieldReferenceFinder, MiningSchemaCleaner};

/// Get the version of the crate, as a string.
#[allow(dead_code)]
pub(crate) fn crate_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// The name of a field, as it appears in field declarations and
/// references throughout a document.
///
/// Names are opaque to the pruning pass: two fields are the same field
/// exactly when their names compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(String);

impl FieldName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for FieldName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A literal value appearing in a predicate or expression.
///
/// Literals are carried verbatim; the pass never interprets them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Bool(bool),
    Number(f64),
    String(String),
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Bool(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Literal::Number(f64::from(value))
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

impl std::fmt::Display for Literal {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Number(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "{v:?}"),
        }
    }
}

/// A comparison operator used by simple predicates.
#[derive(
    strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum ComparisonOp {
    #[strum(to_string = "==")]
    Equal,
    #[strum(to_string = "!=")]
    NotEqual,
    #[strum(to_string = "<")]
    LessThan,
    #[strum(to_string = "<=")]
    LessOrEqual,
    #[strum(to_string = ">")]
    GreaterThan,
    #[strum(to_string = ">=")]
    GreaterOrEqual,
    #[strum(to_string = "is missing")]
    IsMissing,
    #[strum(to_string = "is not missing")]
    IsNotMissing,
}

impl ComparisonOp {
    /// Construct the comparison operator that represents the opposite
    /// of this operator.
    #[must_use]
    pub fn negation(self) -> Self {
        match self {
            ComparisonOp::Equal => ComparisonOp::NotEqual,
            ComparisonOp::NotEqual => ComparisonOp::Equal,
            ComparisonOp::LessThan => ComparisonOp::GreaterOrEqual,
            ComparisonOp::LessOrEqual => ComparisonOp::GreaterThan,
            ComparisonOp::GreaterThan => ComparisonOp::LessOrEqual,
            ComparisonOp::GreaterOrEqual => ComparisonOp::LessThan,
            ComparisonOp::IsMissing => ComparisonOp::IsNotMissing,
            ComparisonOp::IsNotMissing => ComparisonOp::IsMissing,
        }
    }
}

/// A set-membership operator used by set predicates.
#[derive(
    strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum SetOp {
    #[strum(to_string = "in")]
    IsIn,
    #[strum(to_string = "not in")]
    IsNotIn,
}

/// The boolean connective of a compound predicate.
///
/// `Surrogate` falls back to the next child when the previous one cannot
/// be evaluated; for the purposes of this crate it reads the same fields
/// as `Or`.
#[derive(
    strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum CompoundOp {
    #[strum(to_string = "and")]
    And,
    #[strum(to_string = "or")]
    Or,
    #[strum(to_string = "xor")]
    Xor,
    #[strum(to_string = "surrogate")]
    Surrogate,
}

/// A boolean expression tree over field values.
///
/// The pruning pass reads predicates only for the field names they
/// mention, never for their truth value.
#[derive(Debug, Clone, PartialEq, strum_macros::EnumIs, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Predicate {
    /// The literal true predicate.
    True,
    /// The literal false predicate.
    False,
    /// A single field compared against a literal, e.g. `age < 30`.
    Simple {
        field: FieldName,
        op: ComparisonOp,
        /// Missing-value checks carry no literal.
        value: Option<Literal>,
    },
    /// A field tested for membership in a literal set.
    SimpleSet {
        field: FieldName,
        op: SetOp,
        values: Vec<Literal>,
    },
    /// A boolean connective over child predicates.
    Compound {
        op: CompoundOp,
        predicates: Vec<Predicate>,
    },
}

impl Predicate {
    /// Constructs a new comparison predicate, e.g. `age < 30`.
    pub fn simple<N, V>(field: N, op: ComparisonOp, value: V) -> Self
    where
        N: Into<FieldName>,
        V: Into<Literal>,
    {
        Predicate::Simple {
            field: field.into(),
            op,
            value: Some(value.into()),
        }
    }

    /// Constructs a missing-value check, e.g. `income is missing`.
    pub fn missing<N: Into<FieldName>>(field: N) -> Self {
        Predicate::Simple {
            field: field.into(),
            op: ComparisonOp::IsMissing,
            value: None,
        }
    }

    /// Constructs a set-membership predicate, e.g. `state in {"CA", "OR"}`.
    pub fn simple_set<N, V, I>(field: N, op: SetOp, values: I) -> Self
    where
        N: Into<FieldName>,
        V: Into<Literal>,
        I: IntoIterator<Item = V>,
    {
        Predicate::SimpleSet {
            field: field.into(),
            op,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Constructs a compound predicate over the given children.
    pub fn compound<I: IntoIterator<Item = Predicate>>(op: CompoundOp, predicates: I) -> Self {
        Predicate::Compound {
            op,
            predicates: predicates.into_iter().collect(),
        }
    }
}

impl From<bool> for Predicate {
    fn from(value: bool) -> Self {
        if value {
            Predicate::True
        } else {
            Predicate::False
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Predicate::True => write!(f, "true"),
            Predicate::False => write!(f, "false"),
            Predicate::Simple {
                field,
                op,
                value: Some(value),
            } => write!(f, "{field} {op} {value}"),
            Predicate::Simple { field, op, .. } => write!(f, "{field} {op}"),
            Predicate::SimpleSet { field, op, values } => {
                write!(f, "{field} {op} {{")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{value}")?;
                }
                write!(f, "}}")
            }
            Predicate::Compound { op, predicates } => {
                for (i, predicate) in predicates.iter().enumerate() {
                    if i > 0 {
                        write!(f, " {op} ")?;
                    }
                    write!(f, "({predicate})")?;
                }
                Ok(())
            }
        }
    }
}

/// A single interpolation point of a continuous normalization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearNorm {
    pub orig: f64,
    pub norm: f64,
}

/// An expression defining a derived or output field.
///
/// The variants mirror the handful of expression shapes the original
/// document format uses most; the pass only ever walks them for field
/// references, so exotic shapes reduce to `Apply` without loss.
#[derive(Debug, Clone, PartialEq, strum_macros::EnumIs, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Expression {
    /// A reference to another field, raw or derived.
    FieldRef { field: FieldName },
    /// A constant value.
    Constant { value: Literal },
    /// A function applied to argument expressions, e.g. `max(a, b)`.
    Apply {
        function: String,
        args: Vec<Expression>,
    },
    /// Piecewise-linear normalization of a continuous field.
    NormContinuous {
        field: FieldName,
        norms: Vec<LinearNorm>,
    },
    /// An aggregate of a field over a record group, e.g. `sum(amount)`.
    Aggregate { field: FieldName, function: String },
}

impl Expression {
    /// Constructs a reference to the named field.
    pub fn field_ref<N: Into<FieldName>>(field: N) -> Self {
        Expression::FieldRef {
            field: field.into(),
        }
    }

    /// Constructs a constant expression.
    pub fn constant<V: Into<Literal>>(value: V) -> Self {
        Expression::Constant {
            value: value.into(),
        }
    }

    /// Constructs a function application over the given arguments.
    pub fn apply<S, I>(function: S, args: I) -> Self
    where
        S: Into<String>,
        I: IntoIterator<Item = Expression>,
    {
        Expression::Apply {
            function: function.into(),
            args: args.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Expression::FieldRef { field } => write!(f, "{field}"),
            Expression::Constant { value } => write!(f, "{value}"),
            Expression::Apply { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Expression::NormContinuous { field, .. } => write!(f, "norm({field})"),
            Expression::Aggregate { field, function } => write!(f, "{function}({field})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Predicate::simple("age", ComparisonOp::LessThan, 30), "age < 30")]
    #[case(Predicate::missing("income"), "income is missing")]
    #[case(
        Predicate::simple_set("state", SetOp::IsIn, ["CA", "OR"]),
        "state in {\"CA\", \"OR\"}"
    )]
    #[case(
        Predicate::compound(
            CompoundOp::And,
            [Predicate::True, Predicate::simple("x", ComparisonOp::Equal, 1)],
        ),
        "(true) and (x == 1)"
    )]
    fn predicate_display(#[case] predicate: Predicate, #[case] expected: &str) {
        assert_eq!(predicate.to_string(), expected);
    }

    #[rstest]
    fn expression_display() {
        let expr = Expression::apply("max", [Expression::field_ref("a"), Expression::constant(0)]);
        assert_eq!(expr.to_string(), "max(a, 0)");
    }

    #[rstest]
    fn comparison_negation_round_trips() {
        for op in [
            ComparisonOp::Equal,
            ComparisonOp::NotEqual,
            ComparisonOp::LessThan,
            ComparisonOp::LessOrEqual,
            ComparisonOp::GreaterThan,
            ComparisonOp::GreaterOrEqual,
            ComparisonOp::IsMissing,
            ComparisonOp::IsNotMissing,
        ] {
            assert_eq!(op.negation().negation(), op);
        }
    }
}
