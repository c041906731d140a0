//! Identifier normalisation.
//!
//! `IdNormalizer` maps a user-supplied PMID or PMC ID to the canonical
//! PMC ID used as the paper's storage key, plus the PMID when one is known.

pub mod ids;

pub use ids::{classify, IdKind, IdNormalizer, NormalizedId};
