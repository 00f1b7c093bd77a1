// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

//! Transitive closure over derived-field dependencies.

use log::trace;

use crate::document::{DerivedField, Document, Model};
use crate::visitors::FieldReferenceFinder;
use crate::{FastHashMap, FastHashSet, FieldName};

/// An index of which fields each derived field reads, built once per
/// cleaning run over the whole document.
///
/// Construction records only the one-hop dependencies of every derived
/// definition; [`expand`] chases them to a fixed point on demand.
///
/// [`expand`]: FieldDependencyResolver::expand
#[derive(Debug, Default)]
pub struct FieldDependencyResolver {
    one_hop: FastHashMap<FieldName, FastHashSet<FieldName>>,
}

impl FieldDependencyResolver {
    /// Index every derived-field table in the document: the
    /// transformation dictionary plus each model's local
    /// transformations, segment children included.
    pub fn index(document: &Document) -> Self {
        let mut resolver = Self::default();
        if let Some(dictionary) = &document.transformation_dictionary {
            resolver.index_table(&dictionary.derived_fields);
        }
        for model in &document.models {
            resolver.index_model(model);
        }
        trace!(
            "indexed {} derived field definition(s)",
            resolver.one_hop.len()
        );
        resolver
    }

    fn index_model(&mut self, model: &Model) {
        if let Some(transformations) = &model.local_transformations {
            self.index_table(&transformations.derived_fields);
        }
        if let Some(segmentation) = &model.segmentation {
            for segment in &segmentation.segments {
                if let Some(child) = &segment.model {
                    self.index_model(child);
                }
            }
        }
    }

    fn index_table(&mut self, derived_fields: &[DerivedField]) {
        for derived in derived_fields {
            let mut finder = FieldReferenceFinder::new();
            finder.scan_expression(&derived.expression);
            // Same-named definitions in different scopes merge; the
            // union is the permissive reading.
            self.one_hop
                .entry(derived.name.clone())
                .or_default()
                .extend(finder.into_names());
        }
    }

    /// Grow `names` in place until it also holds everything any derived
    /// field in it transitively reads.
    ///
    /// Each name is processed at most once, so the walk terminates even
    /// when the dependency graph contains a cycle.
    pub fn expand(&self, names: &mut FastHashSet<FieldName>) {
        let mut pending: Vec<FieldName> = names.iter().cloned().collect();
        let mut visited: FastHashSet<FieldName> = FastHashSet::default();
        while let Some(name) = pending.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            // Raw fields have no entry and expand to nothing.
            let Some(dependencies) = self.one_hop.get(&name) else {
                continue;
            };
            for dependency in dependencies {
                if names.insert(dependency.clone()) {
                    pending.push(dependency.clone());
                }
            }
        }
    }
}
