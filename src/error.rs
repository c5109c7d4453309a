use thiserror::Error;

pub type Result<T, E = PresentationExchangeError> = std::result::Result<T, E>;

/// The single error kind surfaced by the presentation exchange engine.
///
/// Partial satisfaction of a request is not an error: it is reported through
/// [CredentialsForRequest::are_requirements_satisfied](crate::holder::requirements::CredentialsForRequest).
#[derive(Debug, Error)]
pub enum PresentationExchangeError {
    /// The definition, submission or selection is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// Structural validation failed, see the additional messages for details.
    #[error("{message}")]
    Validation {
        message: String,
        additional_messages: Vec<String>,
    },
    /// The request cannot be satisfied by the holder's credentials or keys.
    #[error("unsatisfiable request: {0}")]
    Unsatisfiable(String),
    /// The assembled submission violates an internal invariant.
    #[error("failed to assemble presentation submission: {0}")]
    Assembly(String),
    /// A received submission could not be mapped onto its presentations.
    #[error("failed to extract presentations from submission: {0}")]
    Extraction(String),
    /// An injected collaborator (store, signer, resolver) failed.
    #[error(transparent)]
    Collaborator(#[from] anyhow::Error),
}

impl PresentationExchangeError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub(crate) fn unsatisfiable(message: impl Into<String>) -> Self {
        Self::Unsatisfiable(message.into())
    }

    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    /// Validation sub-messages. Empty for every other variant.
    pub fn additional_messages(&self) -> &[String] {
        match self {
            Self::Validation {
                additional_messages,
                ..
            } => additional_messages,
            _ => &[],
        }
    }
}
