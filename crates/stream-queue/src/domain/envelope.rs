//! # Envelope
//!
//! Wire wrapper around an opaque application payload.
//!
//! Every appended entry carries exactly one reserved field, [`ENVELOPE_FIELD`],
//! whose value is the JSON-encoded envelope:
//!
//! ```text
//! { "version": 1, "data": "<base64 payload>" }
//! ```
//!
//! Readers ignore fields they do not know, so later versions can add fields
//! without breaking older consumers. The payload itself is never inspected.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use super::entities::Fields;
use super::errors::EnvelopeError;

/// Reserved entry field holding the encoded envelope.
pub const ENVELOPE_FIELD: &str = "data";

/// Opaque payload wrapper.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope format version. Absent in the oldest encoding.
    #[serde(default = "Envelope::current_version")]
    pub version: u16,

    /// The application payload, untouched.
    #[serde_as(as = "Base64")]
    pub data: Vec<u8>,
}

impl Envelope {
    /// Version written by this implementation.
    pub const CURRENT_VERSION: u16 = 1;

    fn current_version() -> u16 {
        Self::CURRENT_VERSION
    }

    /// Wrap a payload.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            data: payload.into(),
        }
    }

    /// Borrow the payload.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Take the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.data
    }

    /// Encode into the wire form.
    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Decode from the wire form.
    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Build the field map for an append.
    pub fn to_fields(&self) -> Result<Fields, EnvelopeError> {
        let mut fields = Fields::new();
        fields.insert(ENVELOPE_FIELD.to_string(), self.encode()?);
        Ok(fields)
    }

    /// Extract the envelope from an entry's field map.
    pub fn from_fields(fields: &Fields) -> Result<Self, EnvelopeError> {
        let raw = fields
            .get(ENVELOPE_FIELD)
            .ok_or(EnvelopeError::MissingField(ENVELOPE_FIELD))?;
        Self::decode(raw)
    }
}
