//! Stored credential records, as handed over by the credential store.
//!
//! Records are opaque to the engine apart from the few properties it needs:
//! subject ids for grouping, cryptosuites for the AnonCreds path, and the
//! decoded claims required to compute selective disclosure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use super::credential_format::CredentialFormat;

/// Issuer-signed mdoc data elements, keyed by namespace and then by element identifier.
pub type MdocNamespaces = BTreeMap<String, BTreeMap<String, Json>>;

/// The secured form of a stored W3C credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum W3cCredential {
    /// A JWT secured credential: the compact serialization plus the decoded credential document.
    Jwt { compact: String, document: Json },
    /// A credential secured with an embedded Linked Data or Data Integrity proof.
    Ldp { document: Json },
}

/// A stored W3C Verifiable Credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct W3cCredentialRecord {
    pub id: String,
    pub credential: W3cCredential,
    /// Expanded JSON-LD types, as computed by the store when the credential was saved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub expanded_types: Vec<String>,
}

impl W3cCredentialRecord {
    pub fn jwt(id: impl Into<String>, compact: impl Into<String>, document: Json) -> Self {
        Self {
            id: id.into(),
            credential: W3cCredential::Jwt {
                compact: compact.into(),
                document,
            },
            expanded_types: Vec::new(),
        }
    }

    pub fn ldp(id: impl Into<String>, document: Json) -> Self {
        Self {
            id: id.into(),
            credential: W3cCredential::Ldp { document },
            expanded_types: Vec::new(),
        }
    }

    pub fn format(&self) -> CredentialFormat {
        match self.credential {
            W3cCredential::Jwt { .. } => CredentialFormat::JwtVc,
            W3cCredential::Ldp { .. } => CredentialFormat::LdpVc,
        }
    }

    /// The decoded credential document.
    pub fn document(&self) -> &Json {
        match &self.credential {
            W3cCredential::Jwt { document, .. } | W3cCredential::Ldp { document } => document,
        }
    }

    /// The credential as it is embedded in a presentation's `verifiableCredential` array:
    /// a string for JWT credentials, the signed document for Linked Data credentials.
    pub fn encoded(&self) -> Json {
        match &self.credential {
            W3cCredential::Jwt { compact, .. } => Json::String(compact.clone()),
            W3cCredential::Ldp { document } => document.clone(),
        }
    }

    /// The ids of the credential subjects, in document order.
    pub fn subject_ids(&self) -> Vec<String> {
        one_or_many(self.document().get("credentialSubject"))
            .filter_map(|subject| subject.get("id").and_then(Json::as_str))
            .map(ToOwned::to_owned)
            .collect()
    }

    /// The credential `type` values.
    pub fn types(&self) -> Vec<String> {
        strings(self.document().get("type"))
    }

    /// The credential `@context` uris. Embedded context objects are skipped.
    pub fn contexts(&self) -> Vec<String> {
        strings(self.document().get("@context"))
    }

    /// The `cryptosuite` of every Data Integrity proof attached to the credential.
    ///
    /// JWT credentials carry no embedded proof and always return an empty list.
    pub fn data_integrity_cryptosuites(&self) -> Vec<String> {
        match &self.credential {
            W3cCredential::Jwt { .. } => Vec::new(),
            W3cCredential::Ldp { document } => one_or_many(document.get("proof"))
                .filter_map(|proof| proof.get("cryptosuite").and_then(Json::as_str))
                .map(ToOwned::to_owned)
                .collect(),
        }
    }
}

/// A stored SD-JWT VC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdJwtVcRecord {
    pub id: String,
    /// Issuer-signed JWT and every disclosure, `~` separated, without key binding.
    pub compact: String,
    /// The fully disclosed claims of the credential.
    pub claims: Json,
}

impl SdJwtVcRecord {
    pub fn new(id: impl Into<String>, compact: impl Into<String>, claims: Json) -> Self {
        Self {
            id: id.into(),
            compact: compact.into(),
            claims,
        }
    }

    /// The verifiable credential type of the SD-JWT VC.
    pub fn vct(&self) -> Option<&str> {
        self.claims.get("vct").and_then(Json::as_str)
    }
}

/// A stored ISO 18013-5 mobile document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MdocRecord {
    pub id: String,
    pub doc_type: String,
    /// Base64url encoded `IssuerSigned` structure.
    pub issuer_signed: String,
    /// The decoded issuer-signed data elements.
    pub namespaces: MdocNamespaces,
}

impl MdocRecord {
    pub fn new(
        id: impl Into<String>,
        doc_type: impl Into<String>,
        issuer_signed: impl Into<String>,
        namespaces: MdocNamespaces,
    ) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            issuer_signed: issuer_signed.into(),
            namespaces,
        }
    }
}

/// A held credential that may be matched against a presentation definition.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateCredential {
    /// A JWT or Linked Data secured credential; the record carries its own format.
    W3c(W3cCredentialRecord),
    SdJwtVc(SdJwtVcRecord),
    Mdoc(MdocRecord),
}

impl CandidateCredential {
    pub fn format(&self) -> CredentialFormat {
        match self {
            Self::W3c(record) => record.format(),
            Self::SdJwtVc(_) => CredentialFormat::SdJwtVc,
            Self::Mdoc(_) => CredentialFormat::MsoMdoc,
        }
    }

    /// The id of the stored record backing this candidate.
    pub fn record_id(&self) -> &str {
        match self {
            Self::W3c(record) => &record.id,
            Self::SdJwtVc(record) => &record.id,
            Self::Mdoc(record) => &record.id,
        }
    }
}

impl From<W3cCredentialRecord> for CandidateCredential {
    fn from(record: W3cCredentialRecord) -> Self {
        Self::W3c(record)
    }
}

impl From<SdJwtVcRecord> for CandidateCredential {
    fn from(record: SdJwtVcRecord) -> Self {
        Self::SdJwtVc(record)
    }
}

impl From<MdocRecord> for CandidateCredential {
    fn from(record: MdocRecord) -> Self {
        Self::Mdoc(record)
    }
}

fn one_or_many(value: Option<&Json>) -> impl Iterator<Item = &Json> {
    let items: Vec<&Json> = match value {
        Some(Json::Array(items)) => items.iter().collect(),
        Some(Json::Null) | None => Vec::new(),
        Some(item) => vec![item],
    };
    items.into_iter()
}

fn strings(value: Option<&Json>) -> Vec<String> {
    one_or_many(value)
        .filter_map(Json::as_str)
        .map(ToOwned::to_owned)
        .collect()
}
