//! Structural extraction from generated text.
//!
//! [`incremental`] emits summary and section objects while the text is
//! still growing; [`reconcile`] turns the finished text into the canonical
//! document. Both share the string-aware scanner in [`scan`].

pub mod incremental;
pub mod reconcile;
pub mod scan;

pub use incremental::{Extracted, IncrementalExtractor};
pub use reconcile::{Reconciled, parse_document_text, reconcile, strip_code_fences};
