use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::credential::MdocNamespaces;
use super::credential_format::ClaimFormatDesignation;

/// Where the presentation submission travels relative to the presentations it describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionLocation {
    /// The submission is embedded in the presentation as `presentation_submission`.
    #[default]
    Presentation,
    /// The submission is transmitted alongside the presentations, e.g. the
    /// `presentation_submission` parameter of an OpenID4VP response.
    External,
}

/// A presented SD-JWT VC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdJwtPresentation {
    /// Issuer-signed JWT, the selected disclosures and the key binding JWT.
    pub compact: String,
    /// The claims visible to the verifier.
    pub claims: Map<String, Json>,
}

/// A document inside an mdoc device response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdocDocument {
    pub doc_type: String,
    pub namespaces: MdocNamespaces,
}

/// An ISO 18013-5 `DeviceResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdocDeviceResponse {
    /// Base64url encoded CBOR `DeviceResponse`.
    pub encoded: String,
    pub documents: Vec<MdocDocument>,
}

impl MdocDeviceResponse {
    /// Return the document of the given type, if present.
    pub fn document(&self, doc_type: &str) -> Option<&MdocDocument> {
        self.documents.iter().find(|doc| doc.doc_type == doc_type)
    }
}

/// A verifiable presentation, as produced by the holder or received by the verifier.
#[derive(Debug, Clone, PartialEq)]
pub enum VerifiablePresentation {
    /// A JWT secured presentation: the compact serialization plus its decoded claims set, which
    /// carries the presentation document as the `vp` claim.
    JwtVp { compact: String, claims: Json },
    /// A presentation secured with an embedded Linked Data or Data Integrity proof.
    LdpVp(Json),
    /// SD-JWT VCs are their own presentation.
    SdJwtVc(SdJwtPresentation),
    MsoMdoc(MdocDeviceResponse),
}

impl VerifiablePresentation {
    /// The claim format designation of the presentation envelope.
    pub fn claim_format(&self) -> ClaimFormatDesignation {
        match self {
            Self::JwtVp { .. } => ClaimFormatDesignation::JwtVp,
            Self::LdpVp(_) => ClaimFormatDesignation::LdpVp,
            Self::SdJwtVc(_) => ClaimFormatDesignation::VcSdJwt,
            Self::MsoMdoc(_) => ClaimFormatDesignation::MsoMDoc,
        }
    }

    /// The wire representation of the presentation, as placed in a `vp_token`.
    pub fn encoded(&self) -> Json {
        match self {
            Self::JwtVp { compact, .. } => Json::String(compact.clone()),
            Self::LdpVp(presentation) => presentation.clone(),
            Self::SdJwtVc(presentation) => Json::String(presentation.compact.clone()),
            Self::MsoMdoc(response) => Json::String(response.encoded.clone()),
        }
    }
}

/// Render presentations as an OpenID4VP `vp_token`.
///
/// A single presentation is rendered as itself, several as an array in presentation order,
/// matching the `$` and `$[i]` descriptor map paths.
pub fn vp_token(presentations: &[VerifiablePresentation]) -> Json {
    match presentations {
        [single] => single.encoded(),
        many => Json::Array(many.iter().map(VerifiablePresentation::encoded).collect()),
    }
}
