#![allow(unused)]

use pmml_prune::document::{
    DataDictionary, DataField, DerivedField, Document, LocalTransformations, MiningField,
    MiningSchema, Model, ModelBody, MultipleModelMethod, Output, OutputField, Segment,
    Segmentation, TreeNode, UsageType,
};
use pmml_prune::{clean, ComparisonOp, Expression, MiningSchemaCleaner, Predicate};
use rstest::{fixture, rstest};

fn dictionary(names: &[&str]) -> DataDictionary {
    DataDictionary {
        fields: names.iter().copied().map(DataField::new).collect(),
    }
}

fn schema(fields: &[(&str, UsageType)]) -> MiningSchema {
    MiningSchema::new(
        fields
            .iter()
            .map(|(name, usage)| MiningField::new(*name, *usage)),
    )
}

fn active_schema(names: &[&str]) -> MiningSchema {
    MiningSchema::new(names.iter().copied().map(MiningField::active))
}

fn outputs(names: &[&str]) -> Output {
    Output {
        output_fields: names.iter().copied().map(OutputField::new).collect(),
    }
}

/// A leaf model whose tree stump references each of the given fields.
fn leaf_model(schema: MiningSchema, referenced: &[&str]) -> Model {
    let nodes = referenced
        .iter()
        .map(|field| TreeNode::new(Predicate::simple(*field, ComparisonOp::GreaterThan, 0)))
        .collect::<Vec<_>>();
    Model {
        mining_schema: schema,
        body: Some(ModelBody::Tree {
            root: TreeNode::with_children(Predicate::True, nodes),
        }),
        ..Model::default()
    }
}

fn declared_names(model: &Model) -> Vec<String> {
    model
        .mining_schema
        .mining_fields
        .iter()
        .map(|field| field.name.as_str().to_string())
        .collect()
}

/// Model M: declarations {A: active, B: active, C: target}; derived
/// D = f(A); M's only subtree reference is to D.
#[fixture]
fn derived_reference_document() -> Document {
    let model = Model {
        mining_schema: schema(&[
            ("A", UsageType::Active),
            ("B", UsageType::Active),
            ("C", UsageType::Target),
        ]),
        local_transformations: Some(LocalTransformations {
            derived_fields: vec![DerivedField::new(
                "D",
                Expression::apply("ln", [Expression::field_ref("A")]),
            )],
        }),
        body: Some(ModelBody::Tree {
            root: TreeNode::new(Predicate::simple("D", ComparisonOp::LessThan, 1.0)),
        }),
        ..Model::default()
    };
    Document {
        data_dictionary: dictionary(&["A", "B", "C"]),
        transformation_dictionary: None,
        models: vec![model],
    }
}

#[rstest]
fn unused_input_is_removed_through_derived_field(derived_reference_document: Document) {
    let mut document = derived_reference_document;
    clean(&mut document);
    assert_eq!(declared_names(&document.models[0]), ["A", "C"]);
}

#[rstest]
fn derived_names_never_enter_the_schema(derived_reference_document: Document) {
    let mut document = derived_reference_document;
    clean(&mut document);
    assert!(!declared_names(&document.models[0]).contains(&"D".to_string()));
}

/// Aggregative composite: Seg1 child needs {X}, Seg2 child needs {Y},
/// segment predicates mention {Z}. Outer declarations {X, Y, Z, W}.
#[fixture]
fn voting_ensemble_document() -> Document {
    let segmentation = Segmentation::new(
        MultipleModelMethod::MajorityVote,
        [
            Segment::new(
                Some(Predicate::simple("Z", ComparisonOp::Equal, 1)),
                leaf_model(active_schema(&["X"]), &["X"]),
            ),
            Segment::new(
                Some(Predicate::simple("Z", ComparisonOp::Equal, 2)),
                leaf_model(active_schema(&["Y"]), &["Y"]),
            ),
        ],
    );
    let ensemble = Model {
        mining_schema: active_schema(&["X", "Y", "Z", "W"]),
        segmentation: Some(segmentation),
        ..Model::default()
    };
    Document {
        data_dictionary: dictionary(&["X", "Y", "Z", "W"]),
        transformation_dictionary: None,
        models: vec![ensemble],
    }
}

#[rstest]
fn voting_ensemble_unions_segment_requirements(voting_ensemble_document: Document) {
    let mut document = voting_ensemble_document;
    clean(&mut document);
    assert_eq!(declared_names(&document.models[0]), ["X", "Y", "Z"]);
}

/// Chain S1 -> S2 -> S3: S1 consumes R and publishes P; S2 consumes
/// {P, Q} and publishes S; S3 consumes {S, P}.
#[fixture]
fn model_chain_document() -> Document {
    let mut first = leaf_model(active_schema(&["R"]), &["R"]);
    first.output = Some(outputs(&["P"]));
    let mut second = leaf_model(active_schema(&["P", "Q"]), &["P", "Q"]);
    second.output = Some(outputs(&["S"]));
    let third = leaf_model(active_schema(&["S", "P"]), &["S", "P"]);

    let segmentation = Segmentation::new(
        MultipleModelMethod::ModelChain,
        [
            Segment::new(None, first),
            Segment::new(None, second),
            Segment::new(None, third),
        ],
    );
    let ensemble = Model {
        mining_schema: active_schema(&["P", "Q", "R", "S"]),
        segmentation: Some(segmentation),
        ..Model::default()
    };
    Document {
        data_dictionary: dictionary(&["Q", "R"]),
        transformation_dictionary: None,
        models: vec![ensemble],
    }
}

#[rstest]
fn chained_inputs_satisfied_internally_do_not_propagate(model_chain_document: Document) {
    let mut document = model_chain_document;
    clean(&mut document);
    // P and S are produced inside the chain; only Q and R are genuine
    // external inputs.
    assert_eq!(declared_names(&document.models[0]), ["Q", "R"]);
}

#[rstest]
fn chained_children_keep_upstream_outputs_as_inputs(model_chain_document: Document) {
    let mut document = model_chain_document;
    clean(&mut document);
    let segments = &document.models[0].segmentation.as_ref().unwrap().segments;
    let second = segments[1].model.as_ref().unwrap();
    let third = segments[2].model.as_ref().unwrap();
    assert_eq!(declared_names(second), ["P", "Q"]);
    assert_eq!(declared_names(third), ["S", "P"]);
}

/// An ensemble nested inside another ensemble: the outer schema must be
/// computed from the inner ensemble's already-cleaned declarations, not
/// from what the inner one declared before its own pass ran.
#[rstest]
fn nested_ensembles_prune_against_cleaned_inner_state() {
    // The leaf declares {A, B} but only ever reads A.
    let inner = Model {
        mining_schema: active_schema(&["A", "B"]),
        segmentation: Some(Segmentation::new(
            MultipleModelMethod::MajorityVote,
            [Segment::new(None, leaf_model(active_schema(&["A", "B"]), &["A"]))],
        )),
        ..Model::default()
    };
    let outer = Model {
        mining_schema: active_schema(&["A", "B", "C"]),
        segmentation: Some(Segmentation::new(
            MultipleModelMethod::MajorityVote,
            [Segment::new(
                Some(Predicate::simple("C", ComparisonOp::Equal, 1)),
                inner,
            )],
        )),
        ..Model::default()
    };
    let mut document = Document {
        data_dictionary: dictionary(&["A", "B", "C"]),
        transformation_dictionary: None,
        models: vec![outer],
    };
    clean(&mut document);

    let outer = &document.models[0];
    let inner = outer.segmentation.as_ref().unwrap().segments[0]
        .model
        .as_ref()
        .unwrap();
    let leaf = inner.segmentation.as_ref().unwrap().segments[0]
        .model
        .as_ref()
        .unwrap();
    assert_eq!(declared_names(leaf), ["A"]);
    assert_eq!(declared_names(inner), ["A"]);
    // B vanishes at every level; C survives through the outer predicate.
    assert_eq!(declared_names(outer), ["A", "C"]);
}

#[rstest]
fn cleaning_is_idempotent(voting_ensemble_document: Document) {
    let mut document = voting_ensemble_document;
    clean(&mut document);
    let once = document.clone();
    clean(&mut document);
    assert_eq!(document, once);
}

#[rstest]
fn non_active_roles_are_never_removed() {
    // Nothing in the body references any declared field.
    let model = Model {
        mining_schema: schema(&[
            ("unused", UsageType::Active),
            ("label", UsageType::Target),
            ("weight", UsageType::Supplementary),
            ("cohort", UsageType::Group),
        ]),
        body: Some(ModelBody::Tree {
            root: TreeNode::new(Predicate::True),
        }),
        ..Model::default()
    };
    let mut document = Document {
        data_dictionary: dictionary(&["unused", "label", "weight", "cohort"]),
        transformation_dictionary: None,
        models: vec![model],
    };
    MiningSchemaCleaner::clean(&mut document);
    assert_eq!(
        declared_names(&document.models[0]),
        ["label", "weight", "cohort"]
    );
}

#[rstest]
fn names_outside_every_scope_are_dropped_silently() {
    // The body references a field no dictionary declares; the pass
    // neither keeps it nor fails.
    let model = leaf_model(active_schema(&["known", "stray"]), &["known", "stray"]);
    let mut document = Document {
        data_dictionary: dictionary(&["known"]),
        transformation_dictionary: None,
        models: vec![model],
    };
    clean(&mut document);
    assert_eq!(declared_names(&document.models[0]), ["known"]);
}

#[rstest]
fn transformation_dictionary_fields_resolve_everywhere() {
    // "ratio" lives in the transformation dictionary and reads two raw
    // fields; referencing it must keep both raws alive.
    let model = leaf_model(active_schema(&["num", "den", "other"]), &["ratio"]);
    let mut document = Document {
        data_dictionary: dictionary(&["num", "den", "other"]),
        transformation_dictionary: Some(pmml_prune::document::TransformationDictionary {
            derived_fields: vec![DerivedField::new(
                "ratio",
                Expression::apply(
                    "/",
                    [Expression::field_ref("num"), Expression::field_ref("den")],
                ),
            )],
        }),
        models: vec![model],
    };
    clean(&mut document);
    assert_eq!(declared_names(&document.models[0]), ["num", "den"]);
}

#[rstest]
fn cleaned_document_round_trips_through_json(model_chain_document: Document) {
    let mut document = model_chain_document;
    clean(&mut document);
    let json = document.to_json().unwrap();
    let parsed = Document::from_json(&json).unwrap();
    assert_eq!(parsed, document);
}

#[rstest]
fn empty_segments_are_tolerated() {
    let segmentation = Segmentation::new(
        MultipleModelMethod::Average,
        [Segment::default(), Segment::default()],
    );
    let ensemble = Model {
        mining_schema: active_schema(&["X"]),
        segmentation: Some(segmentation),
        ..Model::default()
    };
    let mut document = Document {
        data_dictionary: dictionary(&["X"]),
        transformation_dictionary: None,
        models: vec![ensemble],
    };
    clean(&mut document);
    assert!(declared_names(&document.models[0]).is_empty());
}
