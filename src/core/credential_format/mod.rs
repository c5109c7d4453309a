use core::fmt;
use std::{borrow::Cow, collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Map;

const FORMAT_JWT: &str = "jwt";
const FORMAT_JWT_VC: &str = "jwt_vc";
const FORMAT_JWT_VP: &str = "jwt_vp";
const FORMAT_JWT_VC_JSON: &str = "jwt_vc_json";
const FORMAT_JWT_VP_JSON: &str = "jwt_vp_json";
const FORMAT_LDP: &str = "ldp";
const FORMAT_LDP_VC: &str = "ldp_vc";
const FORMAT_LDP_VP: &str = "ldp_vp";
const FORMAT_DI: &str = "di";
const FORMAT_DI_VC: &str = "di_vc";
const FORMAT_DI_VP: &str = "di_vp";
const FORMAT_VC_SD_JWT: &str = "vc+sd-jwt";
const FORMAT_MSO_MDOC: &str = "mso_mdoc";

/// A Json object of claim formats, as found in the `format` property of a
/// presentation definition or an input descriptor.
pub type ClaimFormatMap = HashMap<ClaimFormatDesignation, ClaimFormatPayload>;

/// The value of a single claim format property.
///
/// The object MUST include a format-specific property (i.e., `alg`, `proof_type`) that expresses which
/// algorithms the Verifier supports for the format. Its value MUST be an array of one or more
/// format-specific algorithmic identifier references.
///
/// See [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
/// for an example schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClaimFormatPayload {
    /// JWS algorithms, used by the `jwt*` and `vc+sd-jwt` formats.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<Vec<String>>,
    /// Used in the OID4VP specification for `jwt_vc_json` and `jwt_vp_json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg_values_supported: Option<Vec<String>>,
    /// Linked data proof suites, e.g., "JsonWebSignature2020", "Ed25519Signature2018".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_type: Option<Vec<String>>,
    /// Format specific members not covered above, e.g. `kb_jwt_alg`.
    #[serde(flatten)]
    pub other: Map<String, serde_json::Value>,
}

impl ClaimFormatPayload {
    pub fn with_alg(algs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            alg: Some(algs.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    pub fn with_proof_type(proof_types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            proof_type: Some(proof_types.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Returns the JWS algorithm restriction list, if one is declared.
    ///
    /// `alg` takes precedence over `alg_values_supported`.
    pub fn algorithms(&self) -> Option<&[String]> {
        self.alg
            .as_deref()
            .or(self.alg_values_supported.as_deref())
    }

    /// Returns the linked data proof suite restriction list, if one is declared.
    pub fn proof_types(&self) -> Option<&[String]> {
        self.proof_type.as_deref()
    }
}

/// The four families of stored credentials a holder can present.
///
/// Every dispatch over credential kinds matches exhaustively on this tag, so adding a format
/// is a compile time checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialFormat {
    JwtVc,
    LdpVc,
    SdJwtVc,
    MsoMdoc,
}

impl CredentialFormat {
    /// The registered claim format designation of this credential family.
    pub fn designation(&self) -> ClaimFormatDesignation {
        match self {
            Self::JwtVc => ClaimFormatDesignation::JwtVc,
            Self::LdpVc => ClaimFormatDesignation::LdpVc,
            Self::SdJwtVc => ClaimFormatDesignation::VcSdJwt,
            Self::MsoMdoc => ClaimFormatDesignation::MsoMDoc,
        }
    }
}

/// The claim format designation type is used in the input description object to specify the format of the claim.
///
/// Registry of claim format type: https://identity.foundation/claim-format-registry/#registry
///
/// Documentation based on the [DIF Presentation Exchange Specification v2.0](https://identity.foundation/presentation-exchange/spec/v2.0.0/#claim-format-designations)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClaimFormatDesignation {
    /// The format is a JSON Web Token (JWT) as defined by [RFC7519](https://identity.foundation/claim-format-registry/#ref:RFC7519)
    /// that will be submitted in the form of a JWT encoded string.
    Jwt,

    /// These formats are JSON Web Tokens (JWTs) [RFC7519](https://identity.foundation/claim-format-registry/#ref:RFC7519)
    /// that will be submitted in the form of a JWT-encoded string, with a payload extractable from it defined according to the
    /// JSON Web Token (JWT) section of the W3C [VC-DATA-MODEL](https://identity.foundation/claim-format-registry/#term:vc-data-model).
    /// Supported algorithms are conveyed using an `alg` property.
    JwtVc,

    /// See [ClaimFormatDesignation::JwtVc] for more information.
    JwtVp,

    JwtVcJson,

    JwtVpJson,

    /// The format is a Linked-Data Proof that will be submitted as an object.
    /// Supported algorithms are conveyed using a `proof_type` property with values that are identifiers from
    /// the Linked Data Cryptographic Suite Registry [LDP-Registry](https://identity.foundation/claim-format-registry/#term:ldp-registry).
    Ldp,

    /// Verifiable Credentials signed with Linked Data Proof formats, submitted as a JSON object.
    LdpVc,

    /// See [ClaimFormatDesignation::LdpVc] for more information.
    LdpVp,

    /// Data Integrity secured documents.
    Di,

    /// Verifiable Credentials secured with a W3C Data Integrity proof.
    DiVc,

    /// Verifiable Presentations secured with a W3C Data Integrity proof. This is the designation
    /// used for AnonCreds Data Integrity presentations.
    DiVp,

    /// SD-JWT based Verifiable Credentials. The credential is its own presentation: the holder
    /// submits the issuer-signed JWT, the selected disclosures and a key binding JWT.
    VcSdJwt,

    /// The format is defined by ISO/IEC 18013-5:2021 [ISO.18013-5](https://identity.foundation/claim-format-registry/#term:iso.18013-5)
    /// which defines a mobile driving license (mDL) Credential in the mobile document (mdoc) format.
    MsoMDoc,

    /// Other claim format designations not covered by the above.
    ///
    /// The value of this variant is the name of the claim format designation.
    Other(String),
}

impl ClaimFormatDesignation {
    pub fn from_name(name: Cow<str>) -> Self {
        match name.as_ref() {
            FORMAT_JWT => Self::Jwt,
            FORMAT_JWT_VC => Self::JwtVc,
            FORMAT_JWT_VP => Self::JwtVp,
            FORMAT_JWT_VC_JSON => Self::JwtVcJson,
            FORMAT_JWT_VP_JSON => Self::JwtVpJson,
            FORMAT_LDP => Self::Ldp,
            FORMAT_LDP_VC => Self::LdpVc,
            FORMAT_LDP_VP => Self::LdpVp,
            FORMAT_DI => Self::Di,
            FORMAT_DI_VC => Self::DiVc,
            FORMAT_DI_VP => Self::DiVp,
            FORMAT_VC_SD_JWT => Self::VcSdJwt,
            FORMAT_MSO_MDOC => Self::MsoMDoc,
            _ => Self::Other(name.into_owned()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Jwt => FORMAT_JWT,
            Self::JwtVc => FORMAT_JWT_VC,
            Self::JwtVp => FORMAT_JWT_VP,
            Self::JwtVcJson => FORMAT_JWT_VC_JSON,
            Self::JwtVpJson => FORMAT_JWT_VP_JSON,
            Self::Ldp => FORMAT_LDP,
            Self::LdpVc => FORMAT_LDP_VC,
            Self::LdpVp => FORMAT_LDP_VP,
            Self::Di => FORMAT_DI,
            Self::DiVc => FORMAT_DI_VC,
            Self::DiVp => FORMAT_DI_VP,
            Self::VcSdJwt => FORMAT_VC_SD_JWT,
            Self::MsoMDoc => FORMAT_MSO_MDOC,
            Self::Other(other) => other,
        }
    }

    fn into_name(self) -> Cow<'static, str> {
        match self {
            Self::Other(other) => Cow::Owned(other),
            known => Cow::Owned(known.name().to_owned()),
        }
    }

    /// Whether the designation is one of the Linked Data or Data Integrity variants.
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::Ldp | Self::LdpVc | Self::LdpVp | Self::Di | Self::DiVc | Self::DiVp
        )
    }
}

impl From<&str> for ClaimFormatDesignation {
    fn from(s: &str) -> Self {
        Self::from_name(Cow::Borrowed(s))
    }
}

impl From<String> for ClaimFormatDesignation {
    fn from(value: String) -> Self {
        Self::from_name(Cow::Owned(value))
    }
}

impl FromStr for ClaimFormatDesignation {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.into())
    }
}

impl From<ClaimFormatDesignation> for String {
    fn from(format: ClaimFormatDesignation) -> Self {
        format.into_name().into_owned()
    }
}

impl fmt::Display for ClaimFormatDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name().fmt(f)
    }
}

impl Serialize for ClaimFormatDesignation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.name().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ClaimFormatDesignation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Into::into)
    }
}
