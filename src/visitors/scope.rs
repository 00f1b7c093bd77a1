// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

//! Scope-aware field lookup.
//!
//! The original visitor kept a mutable ancestor stack; here each model
//! gets an immutable scope layer chained to its parent's, threaded down
//! the recursion as a plain parameter.

use crate::document::{Document, Model};
use crate::{FastHashMap, FieldName};

/// Where a visible name was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    /// A raw field from the data dictionary.
    Data,
    /// A derived field, document-global or model-local.
    Derived,
    /// An output field published by a model.
    Output,
}

/// One layer of field visibility.
///
/// Lookup order is fixed: a layer's own entries first, then its parent
/// chain, outermost last. Within a layer, later definitions shadow
/// earlier ones.
#[derive(Debug, Default)]
pub(crate) struct FieldScope<'a> {
    parent: Option<&'a FieldScope<'a>>,
    entries: FastHashMap<FieldName, FieldKind>,
}

impl<'a> FieldScope<'a> {
    /// The document-level scope: the data dictionary plus the
    /// transformation dictionary's derived fields.
    pub(crate) fn document(document: &Document) -> FieldScope<'static> {
        let mut scope = FieldScope {
            parent: None,
            entries: FastHashMap::default(),
        };
        for field in &document.data_dictionary.fields {
            scope.define(field.name.clone(), FieldKind::Data);
        }
        if let Some(dictionary) = &document.transformation_dictionary {
            for derived in &dictionary.derived_fields {
                scope.define(derived.name.clone(), FieldKind::Derived);
            }
        }
        scope
    }

    /// An empty layer chained to this one.
    pub(crate) fn child(&'a self) -> FieldScope<'a> {
        FieldScope {
            parent: Some(self),
            entries: FastHashMap::default(),
        }
    }

    /// The scope in which `model`'s own references resolve: this layer's
    /// visibility plus the model's derived and output fields.
    pub(crate) fn for_model(&'a self, model: &Model) -> FieldScope<'a> {
        let mut scope = self.child();
        scope.define_locals(model);
        scope
    }

    pub(crate) fn define(&mut self, name: FieldName, kind: FieldKind) {
        self.entries.insert(name, kind);
    }

    /// Add a model's derived and output field names to this layer.
    pub(crate) fn define_locals(&mut self, model: &Model) {
        for name in model.derived_field_names() {
            self.define(name.clone(), FieldKind::Derived);
        }
        for name in model.output_field_names() {
            self.define(name.clone(), FieldKind::Output);
        }
    }

    /// Resolve a name, innermost layer first.
    pub(crate) fn lookup(&self, name: &FieldName) -> Option<FieldKind> {
        let mut scope = Some(self);
        while let Some(current) = scope {
            if let Some(kind) = current.entries.get(name) {
                return Some(*kind);
            }
            scope = current.parent;
        }
        None
    }

    pub(crate) fn contains(&self, name: &FieldName) -> bool {
        self.lookup(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DataDictionary, DataField, DerivedField, TransformationDictionary};
    use crate::Expression;
    use rstest::rstest;

    #[rstest]
    fn document_scope_sees_both_dictionaries() {
        let document = Document {
            data_dictionary: DataDictionary {
                fields: vec![DataField::new("raw")],
            },
            transformation_dictionary: Some(TransformationDictionary {
                derived_fields: vec![DerivedField::new("twice", Expression::field_ref("raw"))],
            }),
            models: vec![],
        };
        let scope = FieldScope::document(&document);
        assert_eq!(scope.lookup(&"raw".into()), Some(FieldKind::Data));
        assert_eq!(scope.lookup(&"twice".into()), Some(FieldKind::Derived));
        assert!(!scope.contains(&"elsewhere".into()));
    }

    #[rstest]
    fn inner_layer_shadows_outer() {
        let mut outer = FieldScope::default();
        outer.define("x".into(), FieldKind::Data);
        let mut inner = outer.child();
        inner.define("x".into(), FieldKind::Derived);
        assert_eq!(inner.lookup(&"x".into()), Some(FieldKind::Derived));
        assert_eq!(outer.lookup(&"x".into()), Some(FieldKind::Data));
    }
}
