use serde::Deserialize;

use crate::core::presentation::SubmissionLocation;

/// Cryptosuite of AnonCreds Data Integrity proofs.
pub const ANONCREDS_DATA_INTEGRITY_CRYPTOSUITE: &str = "anoncreds-2023";

/// Engine wide settings.
///
/// Every field has a default, so an empty document deserializes to [Config::default].
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Number of descriptors a `pick` requirement needs when it declares neither `count` nor `min`.
    ///
    /// Presentation Exchange does not define this value.
    pub default_pick_count: usize,
    /// Submission location used when a presentation request does not name one.
    pub submission_location: SubmissionLocation,
    /// Data Integrity cryptosuite that routes LDP presentations to AnonCreds signing.
    pub anoncreds_cryptosuite: String,
    /// Lifetime of JWT presentations, in seconds.
    pub presentation_expiration_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_pick_count: 1,
            submission_location: SubmissionLocation::Presentation,
            anoncreds_cryptosuite: ANONCREDS_DATA_INTEGRITY_CRYPTOSUITE.to_string(),
            presentation_expiration_secs: 3600,
        }
    }
}
