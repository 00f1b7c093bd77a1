// SPDX-FileCopyrightText: 2024 University of Rochester
//
// SPDX-License-Identifier: MIT

/*!
Tree-walking passes over a parsed document.

Everything here is read-only except the cleaner, which rewrites mining
schemas in place. The passes share two building blocks: the reference
finder, which harvests the field names a subtree mentions, and the
dependency resolver, which closes a name set over derived-field
definitions.
*/

#![allow(clippy::module_name_repetitions)]

mod cleaner;
mod dependencies;
mod field_refs;
mod scope;

pub use cleaner::{clean, MiningSchemaCleaner};
pub use dependencies::FieldDependencyResolver;
pub use field_refs::FieldReferenceFinder;
