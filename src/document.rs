// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

/*!
The document module holds the parsed representation of a predictive-model
document: a data dictionary of raw input fields, an optional dictionary of
document-global derived fields, and the models themselves.

The structure is a strict tree. It is built once, by hand or through
[`Document::from_json`], and then mutated in place exactly once by the
cleaning pass, which only ever removes [`MiningField`] entries.
*/

// Module uses the "document" name.
#![allow(clippy::module_name_repetitions)]

use serde::{Deserialize, Serialize};

use crate::{Expression, FieldName, Predicate};

/// Errors surfaced by the document's fallible surfaces.
///
/// The cleaning pass itself never fails; malformed or partially populated
/// nodes are treated as empty.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate field declaration: {0}")]
    DuplicateField(FieldName),
}

/// The root of a parsed model document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub data_dictionary: DataDictionary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformation_dictionary: Option<TransformationDictionary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<Model>,
}

impl Document {
    /// Parse a document from its JSON form.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or if the data
    /// dictionary declares the same field twice.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: Document = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }

    /// Serialize the document back to JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that no field is declared twice in the data dictionary.
    fn validate(&self) -> Result<(), DocumentError> {
        let mut seen = crate::FastHashSet::default();
        for field in &self.data_dictionary.fields {
            if !seen.insert(&field.name) {
                return Err(DocumentError::DuplicateField(field.name.clone()));
            }
        }
        Ok(())
    }
}

/// The declarations of the raw fields a document consumes.
///
/// Every model in the document sees these fields as its outermost scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataDictionary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<DataField>,
}

/// How the values of a field are measured.
#[derive(
    strum_macros::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OpType {
    #[default]
    #[strum(to_string = "continuous")]
    Continuous,
    #[strum(to_string = "categorical")]
    Categorical,
    #[strum(to_string = "ordinal")]
    Ordinal,
}

/// A raw input field declared by the data dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataField {
    pub name: FieldName,
    #[serde(default)]
    pub op_type: OpType,
}

impl DataField {
    pub fn new<N: Into<FieldName>>(name: N) -> Self {
        Self {
            name: name.into(),
            op_type: OpType::default(),
        }
    }
}

/// Document-global derived fields, visible to every model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformationDictionary {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_fields: Vec<DerivedField>,
}

/// A field computed from other fields by an expression rather than
/// supplied externally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedField {
    pub name: FieldName,
    pub expression: Expression,
}

impl DerivedField {
    pub fn new<N: Into<FieldName>>(name: N, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression,
        }
    }
}

/// The role a field plays in a model's mining schema.
///
/// Only `Active` entries are candidates for pruning; every other role is
/// preserved unconditionally.
#[derive(
    strum_macros::Display,
    strum_macros::EnumIs,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum UsageType {
    #[default]
    #[strum(to_string = "active")]
    Active,
    #[strum(to_string = "predicted")]
    Predicted,
    #[strum(to_string = "target")]
    Target,
    #[strum(to_string = "supplementary")]
    Supplementary,
    #[strum(to_string = "group")]
    Group,
    #[strum(to_string = "order")]
    Order,
}

/// One entry of a model's mining schema: a field name paired with the
/// role the model uses it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningField {
    pub name: FieldName,
    #[serde(default)]
    pub usage: UsageType,
}

impl MiningField {
    pub fn new<N: Into<FieldName>>(name: N, usage: UsageType) -> Self {
        Self {
            name: name.into(),
            usage,
        }
    }

    /// Shorthand for an `active` entry, the default role.
    pub fn active<N: Into<FieldName>>(name: N) -> Self {
        Self::new(name, UsageType::Active)
    }
}

impl std::fmt::Display for MiningField {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.usage)
    }
}

/// The ordered field declarations of one model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MiningSchema {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mining_fields: Vec<MiningField>,
}

impl MiningSchema {
    pub fn new<I: IntoIterator<Item = MiningField>>(mining_fields: I) -> Self {
        Self {
            mining_fields: mining_fields.into_iter().collect(),
        }
    }

    /// Iterate over the names declared with the `active` role.
    pub fn active_names(&self) -> impl Iterator<Item = &FieldName> {
        self.mining_fields
            .iter()
            .filter(|field| field.usage.is_active())
            .map(|field| &field.name)
    }
}

/// A model's per-model derived fields, visible to the model itself and to
/// any models nested beneath it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalTransformations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derived_fields: Vec<DerivedField>,
}

/// A field a model produces as a result.
///
/// Output names are never raw inputs and are never pruning candidates;
/// the optional expression may reference other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputField {
    pub name: FieldName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expression: Option<Expression>,
}

impl OutputField {
    pub fn new<N: Into<FieldName>>(name: N) -> Self {
        Self {
            name: name.into(),
            expression: None,
        }
    }

    pub fn with_expression<N: Into<FieldName>>(name: N, expression: Expression) -> Self {
        Self {
            name: name.into(),
            expression: Some(expression),
        }
    }
}

/// The fields a model declares as its results.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Output {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_fields: Vec<OutputField>,
}

/// How an ensemble combines its segments.
///
/// `ModelChain` feeds each segment's outputs into the next segment's
/// inputs; every other method runs segments independently and combines
/// their results.
#[derive(
    strum_macros::Display,
    strum_macros::EnumIs,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MultipleModelMethod {
    #[strum(to_string = "majorityVote")]
    MajorityVote,
    #[strum(to_string = "weightedMajorityVote")]
    WeightedMajorityVote,
    #[strum(to_string = "average")]
    Average,
    #[strum(to_string = "weightedAverage")]
    WeightedAverage,
    #[strum(to_string = "median")]
    Median,
    #[strum(to_string = "max")]
    Max,
    #[strum(to_string = "sum")]
    Sum,
    #[strum(to_string = "selectFirst")]
    SelectFirst,
    #[strum(to_string = "selectAll")]
    SelectAll,
    #[strum(to_string = "modelChain")]
    ModelChain,
}

/// One member of an ensemble: an optional gating predicate paired with a
/// child model.
///
/// A segment with no model contributes nothing to the ensemble and is
/// treated as empty rather than rejected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Segment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<Model>,
}

impl Segment {
    pub fn new(predicate: Option<Predicate>, model: Model) -> Self {
        Self {
            id: None,
            predicate,
            model: Some(model),
        }
    }
}

/// The ensemble structure of a composite model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub method: MultipleModelMethod,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,
}

impl Segmentation {
    pub fn new<I: IntoIterator<Item = Segment>>(method: MultipleModelMethod, segments: I) -> Self {
        Self {
            method,
            segments: segments.into_iter().collect(),
        }
    }
}

/// What a model is fit to predict.
#[derive(
    strum_macros::Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum MiningFunction {
    #[default]
    #[strum(to_string = "regression")]
    Regression,
    #[strum(to_string = "classification")]
    Classification,
    #[strum(to_string = "clustering")]
    Clustering,
}

/// A node of a decision tree: a split predicate, an optional score, and
/// the child nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeNode {
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<crate::Literal>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            score: None,
            nodes: Vec::new(),
        }
    }

    pub fn with_children<I: IntoIterator<Item = TreeNode>>(
        predicate: Predicate,
        nodes: I,
    ) -> Self {
        Self {
            predicate,
            score: None,
            nodes: nodes.into_iter().collect(),
        }
    }
}

/// One term of a regression table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericPredictor {
    pub field: FieldName,
    pub coefficient: f64,
    #[serde(default = "default_exponent")]
    pub exponent: i32,
}

fn default_exponent() -> i32 {
    1
}

impl NumericPredictor {
    pub fn new<N: Into<FieldName>>(field: N, coefficient: f64) -> Self {
        Self {
            field: field.into(),
            coefficient,
            exponent: 1,
        }
    }
}

/// One regression table, scoring a single target category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTable {
    pub intercept: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predictors: Vec<NumericPredictor>,
}

/// The field-bearing body of a non-composite model.
#[derive(Debug, Clone, PartialEq, strum_macros::EnumIs, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ModelBody {
    Tree { root: TreeNode },
    Regression { tables: Vec<RegressionTable> },
}

/// One predictive model, possibly composite.
///
/// A model owns exactly one mining schema, at most one table of local
/// derived fields, at most one output declaration list, and, when the
/// model is an ensemble, a segmentation. A model with a segmentation is
/// composite; its body, if any, is ignored by the pruning pass.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Model {
    #[serde(default)]
    pub mining_function: MiningFunction,
    #[serde(default)]
    pub mining_schema: MiningSchema,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_transformations: Option<LocalTransformations>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Output>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ModelBody>,
}

impl Model {
    /// Iterate over the names of the model's own derived fields.
    pub fn derived_field_names(&self) -> impl Iterator<Item = &FieldName> {
        self.local_transformations
            .iter()
            .flat_map(|transformations| transformations.derived_fields.iter())
            .map(|derived| &derived.name)
    }

    /// Iterate over the names of the model's own output fields.
    pub fn output_field_names(&self) -> impl Iterator<Item = &FieldName> {
        self.output
            .iter()
            .flat_map(|output| output.output_fields.iter())
            .map(|output_field| &output_field.name)
    }
}
