//! SGML content model engine.
//!
//! A declared content model is built as a [`ContentToken`] tree, compiled
//! once per element declaration into a [`CompiledModel`], and then matched
//! by one [`MatchState`] per open element.
//!
//! # Model syntax
//!
//! | Token       | Meaning                                      |
//! |-------------|----------------------------------------------|
//! | `name`      | Start tag of element type `name`             |
//! | `#PCDATA`   | Character data (always repeatable)           |
//! | `(A,B)`     | SEQ: `A` then `B`                            |
//! | `(A\|B)`    | OR: exactly one of `A` or `B`                |
//! | `(A&B)`     | AND: both `A` and `B`, in either order       |
//! | `X?`        | Optional                                     |
//! | `X+`        | One or more                                  |
//! | `X*`        | Zero or more                                 |
//!
//! Textual parsing of declarations is left to the caller; element names
//! arrive already resolved to [`ElementTypeId`](crate::ElementTypeId)s.

pub mod and_state;
pub mod compiled;
pub mod compiler;
pub mod matcher;
pub mod token;

#[cfg(test)]
mod tests;

pub use and_state::AndState;
pub use compiled::{AndGroup, AndGroupId, CompiledModel, Leaf, LeafId, PcdataTransition, Transition};
pub use compiler::{CompileResult, ContentModelAmbiguity, compile};
pub use matcher::MatchState;
pub use token::{Connector, ContentToken, LeafKind, LeafToken, ModelGroup, Occurrence};
