//! Domain layer: entities, envelope codec, and errors.

pub mod entities;
pub mod envelope;
pub mod errors;

pub use entities::*;
pub use envelope::{Envelope, ENVELOPE_FIELD};
pub use errors::*;
