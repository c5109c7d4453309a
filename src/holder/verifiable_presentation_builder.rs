use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{json, Map, Value as Json};

use crate::core::presentation_submission::PresentationSubmission;
use crate::error::Result;

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_PRESENTATION_TYPE: &str = "VerifiablePresentation";

/// Options for wrapping an unsigned presentation into JWT claims.
#[derive(Debug, Clone)]
pub struct JwtPresentationOptions<'a> {
    /// The verifier the presentation is addressed to.
    pub audience: Option<&'a str>,
    pub nonce: &'a str,
    /// Expiration is in seconds from `now`.
    /// e.g. 3600 for 1 hour.
    pub expiration_secs: u64,
}

/// Builds the unsigned W3C presentation document wrapping a group of credentials.
#[derive(Debug, Clone)]
pub struct VerifiablePresentationBuilder(Map<String, Json>);

impl Default for VerifiablePresentationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VerifiablePresentationBuilder {
    /// Returns a presentation with the credentials v1 context and type, and no credentials.
    pub fn new() -> Self {
        let mut presentation = Map::new();
        presentation.insert("@context".into(), json!([CREDENTIALS_V1_CONTEXT]));
        presentation.insert("type".into(), json!([VERIFIABLE_PRESENTATION_TYPE]));
        presentation.insert("verifiableCredential".into(), Json::Array(Vec::new()));
        Self(presentation)
    }

    /// Set the holder of the presentation, the controller of the key that signs it.
    pub fn set_holder(mut self, holder: impl Into<String>) -> Self {
        self.0.insert("holder".into(), Json::String(holder.into()));
        self
    }

    /// Append a credential, as embedded in `verifiableCredential`.
    pub fn add_credential(mut self, credential: Json) -> Self {
        if let Some(Json::Array(credentials)) = self.0.get_mut("verifiableCredential") {
            credentials.push(credential);
        }
        self
    }

    /// Embed the presentation submission in the presentation.
    pub fn set_presentation_submission(mut self, submission: &PresentationSubmission) -> Result<Self> {
        let submission = serde_json::to_value(submission).map_err(anyhow::Error::from)?;
        self.0.insert("presentation_submission".into(), submission);
        Ok(self)
    }

    /// Returns the presentation document.
    pub fn build(self) -> Json {
        Json::Object(self.0)
    }

    /// Returns the JWT claims set of a JWT secured presentation.
    ///
    /// This will set the issuance date to the current time and the expiration
    /// date to the expiration secs from the issuance date. The issuer is the holder.
    pub fn build_jwt_claims(self, options: JwtPresentationOptions) -> Json {
        let mut claims = Map::new();

        if let Some(Json::String(holder)) = self.0.get("holder") {
            claims.insert("iss".into(), Json::String(holder.clone()));
        }

        if let Some(audience) = options.audience {
            claims.insert("aud".into(), Json::String(audience.to_string()));
        }

        if let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) {
            claims.insert("iat".into(), dur.as_secs().into());
            claims.insert(
                "exp".into(),
                dur.as_secs().saturating_add(options.expiration_secs).into(),
            );
        }

        claims.insert("nonce".into(), Json::String(options.nonce.to_string()));
        claims.insert("vp".into(), Json::Object(self.0));

        Json::Object(claims)
    }
}
