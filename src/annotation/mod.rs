//! Reference gene annotation: per-organism identifier indexes and their
//! construction from an annotation source.

mod index;
mod provider;

pub use index::{AlternateNamespace, AnnotationCatalog, ReferenceAnnotationIndex, ReferenceSet};
pub use provider::{AnnotationProvider, IndexBuilder, TsvAnnotationProvider};
