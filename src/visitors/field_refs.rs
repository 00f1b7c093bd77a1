// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

//! Harvesting the field names a subtree mentions.

use crate::document::{Model, ModelBody, TreeNode};
use crate::{Expression, FastHashSet, FieldName, Predicate};

/// A pure scanner that collects every field name referenced by the
/// subtrees fed to it.
///
/// Scanning never mutates the tree and deduplicates names; no ordering
/// is defined over the result.
#[derive(Debug, Default)]
pub struct FieldReferenceFinder {
    names: FastHashSet<FieldName>,
}

impl FieldReferenceFinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the finder, yielding the collected names.
    #[must_use]
    pub fn into_names(self) -> FastHashSet<FieldName> {
        self.names
    }

    pub fn scan_predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::True | Predicate::False => {}
            Predicate::Simple { field, .. } | Predicate::SimpleSet { field, .. } => {
                self.names.insert(field.clone());
            }
            Predicate::Compound { predicates, .. } => {
                for child in predicates {
                    self.scan_predicate(child);
                }
            }
        }
    }

    pub fn scan_expression(&mut self, expression: &Expression) {
        match expression {
            Expression::Constant { .. } => {}
            Expression::FieldRef { field }
            | Expression::NormContinuous { field, .. }
            | Expression::Aggregate { field, .. } => {
                self.names.insert(field.clone());
            }
            Expression::Apply { args, .. } => {
                for arg in args {
                    self.scan_expression(arg);
                }
            }
        }
    }

    /// Scan a model's own field-bearing elements: its body, its output
    /// expressions, and its local derived-field definitions.
    ///
    /// The model's mining schema holds declarations, not references, and
    /// nested segmentations are scanned by their own models; both are
    /// skipped here.
    pub fn scan_model(&mut self, model: &Model) {
        match &model.body {
            Some(ModelBody::Tree { root }) => self.scan_tree_node(root),
            Some(ModelBody::Regression { tables }) => {
                for table in tables {
                    for predictor in &table.predictors {
                        self.names.insert(predictor.field.clone());
                    }
                }
            }
            None => {}
        }
        if let Some(output) = &model.output {
            for output_field in &output.output_fields {
                if let Some(expression) = &output_field.expression {
                    self.scan_expression(expression);
                }
            }
        }
        if let Some(transformations) = &model.local_transformations {
            for derived in &transformations.derived_fields {
                self.scan_expression(&derived.expression);
            }
        }
    }

    fn scan_tree_node(&mut self, node: &TreeNode) {
        self.scan_predicate(&node.predicate);
        for child in &node.nodes {
            self.scan_tree_node(child);
        }
    }
}

/// One-shot scan of a predicate.
pub(crate) fn predicate_references(predicate: &Predicate) -> FastHashSet<FieldName> {
    let mut finder = FieldReferenceFinder::new();
    finder.scan_predicate(predicate);
    finder.into_names()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{
        MiningField, MiningSchema, NumericPredictor, Output, OutputField, RegressionTable,
    };
    use crate::{ComparisonOp, CompoundOp, SetOp};
    use rstest::rstest;

    fn names_of(finder: FieldReferenceFinder) -> Vec<String> {
        let mut names: Vec<String> = finder
            .into_names()
            .into_iter()
            .map(|name| name.as_str().to_string())
            .collect();
        names.sort();
        names
    }

    #[rstest]
    fn compound_predicate_is_scanned_recursively() {
        let predicate = Predicate::compound(
            CompoundOp::And,
            [
                Predicate::simple("a", ComparisonOp::LessThan, 1),
                Predicate::compound(
                    CompoundOp::Or,
                    [
                        Predicate::simple_set("b", SetOp::IsIn, ["x"]),
                        Predicate::simple("a", ComparisonOp::GreaterThan, 0),
                    ],
                ),
            ],
        );
        let mut finder = FieldReferenceFinder::new();
        finder.scan_predicate(&predicate);
        assert_eq!(names_of(finder), ["a", "b"]);
    }

    #[rstest]
    fn nested_apply_arguments_are_scanned() {
        let expression = Expression::apply(
            "if",
            [
                Expression::field_ref("cond"),
                Expression::apply("ln", [Expression::field_ref("amount")]),
                Expression::constant(0),
            ],
        );
        let mut finder = FieldReferenceFinder::new();
        finder.scan_expression(&expression);
        assert_eq!(names_of(finder), ["amount", "cond"]);
    }

    #[rstest]
    fn mining_schema_is_not_a_reference() {
        let model = Model {
            mining_schema: MiningSchema::new([MiningField::active("declared_only")]),
            body: Some(ModelBody::Regression {
                tables: vec![RegressionTable {
                    intercept: 0.5,
                    predictors: vec![NumericPredictor::new("x1", 2.0)],
                }],
            }),
            output: Some(Output {
                output_fields: vec![OutputField::with_expression(
                    "score",
                    Expression::field_ref("x2"),
                )],
            }),
            ..Model::default()
        };
        let mut finder = FieldReferenceFinder::new();
        finder.scan_model(&model);
        assert_eq!(names_of(finder), ["x1", "x2"]);
    }
}
