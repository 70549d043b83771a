// src/canonical/mod.rs
//! Canonicalization entry points.
//!
//! Locations use a closed vocabulary and resolve through
//! [`LocationCanonicalizer`], which retrains on a miss. Organisations use the
//! clusters precomputed by the batch job and fall back to the raw name.
pub mod corpus;
pub mod location;
pub mod organisation;
pub mod reference;
pub mod store;

pub use corpus::TrainingCorpus;
pub use location::LocationCanonicalizer;
pub use organisation::canonical_organisation_name;
pub use reference::{ReferenceData, ReferenceEntity};
pub use store::CanonicalStore;
