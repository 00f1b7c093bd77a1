// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

/*!
The cleaning pass itself.

One post-order sweep over the model tree: every model's segment children
are cleaned strictly before the model's own schema is recomputed, so a
composite parent can read its children's pruned declarations as their
true input requirements.
*/

use log::{debug, trace};

use crate::document::{Document, Model, Segmentation};
use crate::visitors::field_refs::predicate_references;
use crate::visitors::scope::{FieldKind, FieldScope};
use crate::visitors::{FieldDependencyResolver, FieldReferenceFinder};
use crate::{FastHashSet, FieldName};

/// Prune every model's mining schema down to the fields its subtree
/// actually needs. See [`MiningSchemaCleaner::clean`].
pub fn clean(document: &mut Document) {
    MiningSchemaCleaner::clean(document);
}

/// Removes redundant `active` mining fields from every mining schema in
/// a document.
///
/// The pass is permissive by design: segments without models, dangling
/// references, and names defined outside the document's purview are
/// treated as absent, never as errors. Running the pass twice is a
/// no-op the second time.
pub struct MiningSchemaCleaner {
    resolver: FieldDependencyResolver,
}

impl MiningSchemaCleaner {
    /// Run the pass over the whole document, mutating mining schemas in
    /// place.
    ///
    /// The dependency resolver is built here, once, and shared across
    /// every model of this run.
    pub fn clean(document: &mut Document) {
        let cleaner = Self {
            resolver: FieldDependencyResolver::index(document),
        };
        let root = FieldScope::document(document);
        for model in &mut document.models {
            cleaner.clean_model(model, &root);
        }
    }

    fn clean_model(&self, model: &mut Model, ancestors: &FieldScope<'_>) {
        // Children first; a composite parent reads its children's
        // already-pruned schemas below.
        self.clean_segments(model, ancestors);

        let mentioned = match &model.segmentation {
            Some(segmentation) => self.segment_requirements(segmentation),
            None => {
                let mut finder = FieldReferenceFinder::new();
                finder.scan_model(model);
                finder.into_names()
            }
        };

        // Names that resolve nowhere in scope belong to some outer
        // context; they are dropped, not reported.
        let scope = ancestors.for_model(model);
        let mut active: FastHashSet<FieldName> = mentioned
            .into_iter()
            .filter(|name| scope.contains(name))
            .collect();

        self.resolver.expand(&mut active);

        // Mining schemas only ever declare externally supplied fields;
        // anything the model computes itself cannot be an input.
        for name in model.derived_field_names() {
            active.remove(name);
        }
        for name in model.output_field_names() {
            active.remove(name);
        }

        let before = model.mining_schema.mining_fields.len();
        model
            .mining_schema
            .mining_fields
            .retain(|field| !field.usage.is_active() || active.contains(&field.name));
        let removed = before - model.mining_schema.mining_fields.len();
        if removed > 0 {
            debug!(
                "pruned {removed} mining field(s), {} remain",
                model.mining_schema.mining_fields.len()
            );
        } else {
            trace!("nothing to prune, {before} mining field(s) remain");
        }
    }

    /// Clean every segment child, threading each child the scope it can
    /// see: the ancestors plus the composite's own derived fields, and,
    /// in a model chain, the outputs published by earlier segments.
    fn clean_segments(&self, model: &mut Model, ancestors: &FieldScope<'_>) {
        let Model {
            segmentation: Some(ref mut segmentation),
            ref local_transformations,
            ..
        } = *model
        else {
            return;
        };

        let chained = segmentation.method.is_model_chain();
        let mut scope = ancestors.child();
        if let Some(transformations) = local_transformations {
            for derived in &transformations.derived_fields {
                scope.define(derived.name.clone(), FieldKind::Derived);
            }
        }
        for segment in &mut segmentation.segments {
            let Some(child) = segment.model.as_mut() else {
                continue;
            };
            self.clean_model(child, &scope);
            if chained {
                for name in child.output_field_names() {
                    scope.define(name.clone(), FieldKind::Output);
                }
            }
        }
    }

    /// The raw requirement set of a composite model.
    ///
    /// Aggregative methods take the union of every segment's predicate
    /// mentions and its child's remaining active inputs. A model chain
    /// additionally drops any child input already satisfied by an
    /// earlier segment's outputs; predicate mentions are never satisfied
    /// by chaining and always propagate.
    fn segment_requirements(&self, segmentation: &Segmentation) -> FastHashSet<FieldName> {
        let chained = segmentation.method.is_model_chain();
        let mut required = FastHashSet::default();
        let mut published: FastHashSet<&FieldName> = FastHashSet::default();
        for segment in &segmentation.segments {
            if let Some(predicate) = &segment.predicate {
                required.extend(predicate_references(predicate));
            }
            let Some(child) = &segment.model else {
                continue;
            };
            for name in child.mining_schema.active_names() {
                if !(chained && published.contains(name)) {
                    required.insert(name.clone());
                }
            }
            if chained {
                published.extend(child.output_field_names());
            }
        }
        required
    }
}
