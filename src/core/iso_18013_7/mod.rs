//! mdoc session transcript construction for OpenID4VP.
//!
//! - [OID4VP 1.0 §B.2.6](https://openid.net/specs/openid-4-verifiable-presentations-1_0.html#appendix-B.2.6)
//! - ISO/IEC 18013-7 Annex B.4.1

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ciborium::Value as Cbor;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ssi::jwk::JWK;

/// The fixed identifier string for OpenID4VPHandover (redirect flow).
pub const HANDOVER_TYPE_IDENTIFIER: &str = "OpenID4VPHandover";

/// The fixed identifier string for OpenID4VPDCAPIHandover (Digital Credentials API).
pub const DC_API_HANDOVER_TYPE_IDENTIFIER: &str = "OpenID4VPDCAPIHandover";

/// The handover bound into an mdoc session transcript.
///
/// Both variants carry the SHA-256 hash of their CBOR encoded handover info and serialize as
/// `[identifier, bstr(32)]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handover {
    /// `OpenID4VPHandoverInfo = [clientId, nonce, jwkThumbprint / null, responseUri]`
    OpenId4Vp { info_hash: Vec<u8> },
    /// `OpenID4VPDCAPIHandoverInfo = [origin, nonce, jwkThumbprint / null]`
    DcApi { info_hash: Vec<u8> },
}

impl Handover {
    /// Handover for requests invoked via redirects.
    ///
    /// `client_id` includes its prefix if applicable (e.g., "x509_san_dns:example.com").
    /// `jwk_thumbprint` is the SHA-256 thumbprint of the verifier's encryption key, or `None`
    /// when the response is not encrypted.
    pub fn openid4vp(
        client_id: &str,
        nonce: &str,
        jwk_thumbprint: Option<&[u8]>,
        response_uri: &str,
    ) -> Result<Self> {
        let info = Cbor::Array(vec![
            Cbor::Text(client_id.to_string()),
            Cbor::Text(nonce.to_string()),
            thumbprint_cbor(jwk_thumbprint),
            Cbor::Text(response_uri.to_string()),
        ]);

        Ok(Self::OpenId4Vp {
            info_hash: hash_cbor(&info).context("failed to encode OpenID4VPHandoverInfo")?,
        })
    }

    /// Handover for requests made through the Digital Credentials API.
    ///
    /// `origin` MUST NOT be prefixed with "origin:".
    pub fn dc_api(origin: &str, nonce: &str, jwk_thumbprint: Option<&[u8]>) -> Result<Self> {
        let info = Cbor::Array(vec![
            Cbor::Text(origin.to_string()),
            Cbor::Text(nonce.to_string()),
            thumbprint_cbor(jwk_thumbprint),
        ]);

        Ok(Self::DcApi {
            info_hash: hash_cbor(&info).context("failed to encode OpenID4VPDCAPIHandoverInfo")?,
        })
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            Self::OpenId4Vp { .. } => HANDOVER_TYPE_IDENTIFIER,
            Self::DcApi { .. } => DC_API_HANDOVER_TYPE_IDENTIFIER,
        }
    }

    /// The SHA-256 hash of the CBOR encoded handover info.
    pub fn info_hash(&self) -> &[u8] {
        match self {
            Self::OpenId4Vp { info_hash } | Self::DcApi { info_hash } => info_hash,
        }
    }

    fn to_cbor(&self) -> Cbor {
        Cbor::Array(vec![
            Cbor::Text(self.identifier().to_string()),
            Cbor::Bytes(self.info_hash().to_vec()),
        ])
    }

    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>> {
        cbor_to_bytes(&self.to_cbor()).context("failed to serialize Handover to CBOR")
    }
}

/// `SessionTranscript = [null, null, Handover]`
///
/// The first two elements are always `null` for OID4VP as per ISO 18013-7 Annex B.
/// The encoded transcript is the external payload of the device authentication signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTranscript {
    handover: Handover,
}

impl SessionTranscript {
    pub fn new(handover: Handover) -> Self {
        Self { handover }
    }

    pub fn handover(&self) -> &Handover {
        &self.handover
    }

    pub fn to_cbor_bytes(&self) -> Result<Vec<u8>> {
        let transcript = Cbor::Array(vec![Cbor::Null, Cbor::Null, self.handover.to_cbor()]);
        cbor_to_bytes(&transcript).context("failed to serialize SessionTranscript to CBOR")
    }
}

/// The request context an mdoc device response is bound to.
///
/// The verifier's client id (the presentation `domain`) and the nonce (the presentation
/// `challenge`) are supplied when the transcript is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionTranscriptOptions {
    /// OpenID4VP invoked via redirects.
    OpenId4Vp {
        response_uri: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verifier_jwk_thumbprint: Option<[u8; 32]>,
    },
    /// OpenID4VP over the Digital Credentials API.
    DcApi {
        origin: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verifier_jwk_thumbprint: Option<[u8; 32]>,
    },
}

impl SessionTranscriptOptions {
    /// Build the session transcript for a request from `client_id` carrying `nonce`.
    pub fn session_transcript(&self, client_id: &str, nonce: &str) -> Result<SessionTranscript> {
        let handover = match self {
            Self::OpenId4Vp {
                response_uri,
                verifier_jwk_thumbprint,
            } => Handover::openid4vp(
                client_id,
                nonce,
                verifier_jwk_thumbprint.as_ref().map(|t| &t[..]),
                response_uri,
            )?,
            Self::DcApi {
                origin,
                verifier_jwk_thumbprint,
            } => Handover::dc_api(
                origin,
                nonce,
                verifier_jwk_thumbprint.as_ref().map(|t| &t[..]),
            )?,
        };

        Ok(SessionTranscript::new(handover))
    }
}

/// Compute the SHA-256 JWK Thumbprint according to
/// [RFC 7638](https://datatracker.ietf.org/doc/html/rfc7638), as raw bytes.
pub fn jwk_thumbprint(jwk: &JWK) -> Result<[u8; 32]> {
    let encoded = jwk
        .thumbprint()
        .context("failed to compute JWK thumbprint")?;
    let bytes = URL_SAFE_NO_PAD
        .decode(encoded)
        .context("JWK thumbprint is not base64url")?;

    match <[u8; 32]>::try_from(bytes) {
        Ok(thumbprint) => Ok(thumbprint),
        Err(bytes) => bail!("expected a 32 byte thumbprint, found {} bytes", bytes.len()),
    }
}

fn thumbprint_cbor(jwk_thumbprint: Option<&[u8]>) -> Cbor {
    match jwk_thumbprint {
        Some(bytes) => Cbor::Bytes(bytes.to_vec()),
        None => Cbor::Null,
    }
}

fn hash_cbor(value: &Cbor) -> Result<Vec<u8>> {
    Ok(Sha256::digest(cbor_to_bytes(value)?).to_vec())
}

fn cbor_to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes)?;
    Ok(bytes)
}
