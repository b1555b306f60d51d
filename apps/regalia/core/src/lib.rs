//! Shared primitives for the Regalia telemetry relay and its dashboards.
//!
//! Producers push flat JSON objects (`{"kmph": 42, "v": 12.3}`); this crate
//! decides whether a payload is such an object, how its scalars are shown,
//! and how known keys are labelled.

pub mod catalog;
pub mod message;

pub use catalog::{FieldCatalog, FieldSpec, OTHER_GROUP};
pub use message::{format_scalar, DecodeError, TelemetryObject, PLACEHOLDER};
