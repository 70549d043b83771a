// src/writers/mod.rs
//! Entity writers. Each cleans its input, canonicalizes the name where a
//! canonical store applies, and upserts on the collection's natural key.
//! Every writer returns the stable row id, or `None` when the input was
//! skipped.
pub mod location;
pub mod organisation;
pub mod person;
pub mod trial;
pub mod upsert;

pub use location::{write_location, LocationInput};
pub use organisation::{write_organisation, OrganisationInput};
pub use person::{write_person, PersonInput};
pub use trial::{write_trial, TrialInput};
pub use upsert::upsert;
