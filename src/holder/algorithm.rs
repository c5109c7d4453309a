//! Signature algorithm and proof suite negotiation for JWT and Linked Data presentations.
//!
//! The algorithm used to sign a presentation must be supported by the holder's key and accepted
//! by the verifier, who may restrict algorithms at the definition level and per input descriptor
//! through the `format` property.
//!
//! See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)

use std::{collections::BTreeMap, fmt::Debug, iter};

use ssi::jwk::{Algorithm, Params, JWK};

use crate::core::credential_format::{ClaimFormatDesignation, ClaimFormatMap, ClaimFormatPayload};
use crate::core::presentation_definition::PresentationDefinition;
use crate::error::{PresentationExchangeError, Result};

/// Key types the negotiator knows the algorithms of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyType {
    Ed25519,
    P256,
    P384,
    Secp256k1,
    Rsa,
}

impl KeyType {
    /// Determine the key type from the parameters of a public key.
    pub fn from_jwk(jwk: &JWK) -> Result<Self> {
        match &jwk.params {
            Params::OKP(okp) if okp.curve == "Ed25519" => Ok(Self::Ed25519),
            Params::OKP(okp) => Err(PresentationExchangeError::invalid(format!(
                "unsupported octet key pair curve '{}'",
                okp.curve
            ))),
            Params::EC(ec) => match ec.curve.as_deref() {
                Some("P-256") => Ok(Self::P256),
                Some("P-384") => Ok(Self::P384),
                Some("secp256k1") => Ok(Self::Secp256k1),
                curve => Err(PresentationExchangeError::invalid(format!(
                    "unsupported elliptic curve {curve:?}"
                ))),
            },
            Params::RSA(_) => Ok(Self::Rsa),
            Params::Symmetric(_) => Err(PresentationExchangeError::invalid(
                "symmetric keys cannot sign presentations",
            )),
        }
    }

    /// The JWS algorithms this key type signs with. The first is the key type's default.
    pub fn supported_algorithms(&self) -> &'static [Algorithm] {
        match self {
            Self::Ed25519 => &[Algorithm::EdDSA],
            Self::P256 => &[Algorithm::ES256],
            Self::P384 => &[Algorithm::ES384],
            Self::Secp256k1 => &[Algorithm::ES256K],
            Self::Rsa => &[Algorithm::PS256, Algorithm::RS256],
        }
    }
}

/// The JWS algorithms `key` signs with, in order of preference.
///
/// The key's own algorithm comes first: its `alg` member when set, the default of its key type
/// otherwise.
pub fn key_algorithms(key: &JWK) -> Result<Vec<Algorithm>> {
    let supported = KeyType::from_jwk(key)?.supported_algorithms();

    Ok(match key.get_algorithm() {
        Some(preferred) if supported.contains(&preferred) => iter::once(preferred)
            .chain(supported.iter().copied().filter(|alg| *alg != preferred))
            .collect(),
        _ => supported.to_vec(),
    })
}

/// Maps key types to the Linked Data proof suites able to sign with them.
pub trait SignatureSuiteRegistry: Debug {
    /// The proof suites usable with `key_type`, in order of preference.
    fn proof_types_for(&self, key_type: KeyType) -> Vec<String>;
}

/// A static [SignatureSuiteRegistry].
///
/// The default registry knows the Ed25519, ECDSA and JsonWebSignature2020 suites.
#[derive(Debug, Clone)]
pub struct KeyTypeSuiteRegistry {
    suites: BTreeMap<KeyType, Vec<String>>,
}

impl KeyTypeSuiteRegistry {
    /// A registry without any suite.
    pub fn empty() -> Self {
        Self {
            suites: BTreeMap::new(),
        }
    }

    /// Register `proof_type` for `key_type`, after any already registered suite.
    pub fn register(mut self, key_type: KeyType, proof_type: impl Into<String>) -> Self {
        self.suites
            .entry(key_type)
            .or_default()
            .push(proof_type.into());
        self
    }
}

impl Default for KeyTypeSuiteRegistry {
    fn default() -> Self {
        Self::empty()
            .register(KeyType::Ed25519, "Ed25519Signature2018")
            .register(KeyType::Ed25519, "Ed25519Signature2020")
            .register(KeyType::Ed25519, "JsonWebSignature2020")
            .register(KeyType::P256, "EcdsaSecp256r1Signature2019")
            .register(KeyType::P256, "JsonWebSignature2020")
            .register(KeyType::P384, "JsonWebSignature2020")
            .register(KeyType::Secp256k1, "EcdsaSecp256k1Signature2019")
            .register(KeyType::Secp256k1, "JsonWebSignature2020")
    }
}

impl SignatureSuiteRegistry for KeyTypeSuiteRegistry {
    fn proof_types_for(&self, key_type: KeyType) -> Vec<String> {
        self.suites.get(&key_type).cloned().unwrap_or_default()
    }
}

/// The enveloping presentation formats whose signature is negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeFormat {
    JwtVp,
    LdpVp,
}

impl EnvelopeFormat {
    /// Format keys consulted for restrictions, in order of precedence. The first key present
    /// with a non-empty list wins.
    fn restriction_keys(&self) -> [ClaimFormatDesignation; 4] {
        match self {
            Self::JwtVp => [
                ClaimFormatDesignation::JwtVp,
                ClaimFormatDesignation::JwtVpJson,
                ClaimFormatDesignation::JwtVc,
                ClaimFormatDesignation::JwtVcJson,
            ],
            Self::LdpVp => [
                ClaimFormatDesignation::LdpVp,
                ClaimFormatDesignation::LdpVc,
                ClaimFormatDesignation::Ldp,
                ClaimFormatDesignation::DiVp,
            ],
        }
    }

    fn restriction<'a>(&self, formats: &'a ClaimFormatMap) -> Option<&'a [String]> {
        self.restriction_keys().iter().find_map(|key| {
            let payload = formats.get(key)?;
            let list = match self {
                Self::JwtVp => ClaimFormatPayload::algorithms(payload),
                Self::LdpVp => ClaimFormatPayload::proof_types(payload),
            }?;
            (!list.is_empty()).then_some(list)
        })
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::JwtVp => "signature algorithm",
            Self::LdpVp => "proof type",
        }
    }
}

/// Compute the combined restriction a presentation answering `input_descriptor_ids` must honor.
///
/// Descriptors without a restriction impose none. Returns `None` when nothing is restricted.
pub fn allowed_values(
    definition: &PresentationDefinition,
    input_descriptor_ids: &[&str],
    format: EnvelopeFormat,
) -> Result<Option<Vec<String>>> {
    let mut descriptor_lists = definition
        .input_descriptors()
        .iter()
        .filter(|descriptor| input_descriptor_ids.contains(&descriptor.id()))
        .filter_map(|descriptor| format.restriction(descriptor.format()));

    let descriptor_restriction: Option<Vec<String>> = match descriptor_lists.next() {
        None => None,
        Some(first) => {
            let intersection = descriptor_lists.fold(first.to_vec(), |acc, list| {
                acc.into_iter().filter(|value| list.contains(value)).collect()
            });
            if intersection.is_empty() {
                return Err(PresentationExchangeError::unsatisfiable(format!(
                    "no {} satisfies the restrictions of every input descriptor",
                    format.kind()
                )));
            }
            Some(intersection)
        }
    };

    let definition_restriction = definition
        .format()
        .and_then(|formats| format.restriction(formats));

    match (definition_restriction, descriptor_restriction) {
        (Some(definition_list), Some(descriptor_list)) => {
            let combined: Vec<String> = descriptor_list
                .into_iter()
                .filter(|value| definition_list.contains(value))
                .collect();
            if combined.is_empty() {
                return Err(PresentationExchangeError::unsatisfiable(format!(
                    "no {} satisfies both the presentation definition and the input descriptor restrictions",
                    format.kind()
                )));
            }
            Ok(Some(combined))
        }
        (Some(definition_list), None) => Ok(Some(definition_list.to_vec())),
        (None, descriptor_list) => Ok(descriptor_list),
    }
}

/// Pick the JWS algorithm for a JWT presentation signed with `key`.
pub fn jwt_signature_algorithm(
    key: &JWK,
    definition: &PresentationDefinition,
    input_descriptor_ids: &[&str],
) -> Result<Algorithm> {
    let supported = key_algorithms(key)?;
    let allowed = allowed_values(definition, input_descriptor_ids, EnvelopeFormat::JwtVp)?;

    let chosen = match &allowed {
        None => supported.first(),
        Some(allowed) => supported
            .iter()
            .find(|algorithm| allowed.iter().any(|name| name == algorithm.as_str())),
    };

    let algorithm = chosen.copied().ok_or_else(|| {
        PresentationExchangeError::unsatisfiable(format!(
            "none of the key's signature algorithms {:?} is allowed by the presentation definition (allowed: {:?})",
            supported.iter().map(Algorithm::as_str).collect::<Vec<_>>(),
            allowed.unwrap_or_default()
        ))
    })?;

    tracing::debug!(
        "selected signature algorithm {} for input descriptors {input_descriptor_ids:?}",
        algorithm.as_str()
    );

    Ok(algorithm)
}

/// Pick the Linked Data proof type for a presentation signed with `key`.
pub fn ldp_proof_type(
    key: &JWK,
    registry: &dyn SignatureSuiteRegistry,
    definition: &PresentationDefinition,
    input_descriptor_ids: &[&str],
) -> Result<String> {
    let key_type = KeyType::from_jwk(key)?;
    let supported = registry.proof_types_for(key_type);
    let allowed = allowed_values(definition, input_descriptor_ids, EnvelopeFormat::LdpVp)?;

    let chosen = match &allowed {
        None => supported.first(),
        Some(allowed) => supported
            .iter()
            .find(|proof_type| allowed.contains(proof_type)),
    };

    let proof_type = chosen.cloned().ok_or_else(|| {
        PresentationExchangeError::unsatisfiable(format!(
            "none of the proof types {supported:?} registered for {key_type:?} keys is allowed by the presentation definition (allowed: {:?})",
            allowed.unwrap_or_default()
        ))
    })?;

    tracing::debug!("selected proof type {proof_type} for input descriptors {input_descriptor_ids:?}");

    Ok(proof_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value as Json};

    fn p256() -> JWK {
        serde_json::from_value(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRjWu9aQ5WJ1GNvF4Lpbd9S25QdNjT7uwEQ-sWU"
        }))
        .unwrap()
    }

    fn ed25519() -> JWK {
        serde_json::from_value(json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
        }))
        .unwrap()
    }

    fn definition(value: Json) -> PresentationDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn key_type_and_default_algorithm() {
        assert_eq!(KeyType::from_jwk(&p256()).unwrap(), KeyType::P256);
        assert_eq!(KeyType::from_jwk(&ed25519()).unwrap(), KeyType::Ed25519);

        let unrestricted = definition(json!({ "id": "def", "input_descriptors": [{ "id": "a" }] }));
        let alg = jwt_signature_algorithm(&ed25519(), &unrestricted, &["a"]).unwrap();
        assert_eq!(alg, Algorithm::EdDSA);
    }

    #[test]
    fn key_algorithm_member_is_preferred() {
        let rsa: JWK = serde_json::from_value(json!({
            "kty": "RSA",
            "alg": "RS256",
            "n": "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw",
            "e": "AQAB"
        }))
        .unwrap();
        assert_eq!(
            key_algorithms(&rsa).unwrap(),
            vec![Algorithm::RS256, Algorithm::PS256]
        );

        let mut rsa_without_alg = rsa;
        rsa_without_alg.algorithm = None;
        assert_eq!(
            key_algorithms(&rsa_without_alg).unwrap(),
            vec![Algorithm::PS256, Algorithm::RS256]
        );
    }

    #[test]
    fn descriptor_restrictions_are_intersected() {
        let definition = definition(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "a", "format": { "jwt_vc": { "alg": ["ES256", "EdDSA"] } } },
                { "id": "b", "format": { "jwt_vc_json": { "alg_values_supported": ["ES256", "ES384"] } } },
                { "id": "c" }
            ]
        }));

        let allowed = allowed_values(&definition, &["a", "b", "c"], EnvelopeFormat::JwtVp).unwrap();
        assert_eq!(allowed, Some(vec!["ES256".to_string()]));

        let alg = jwt_signature_algorithm(&p256(), &definition, &["a", "b"]).unwrap();
        assert_eq!(alg, Algorithm::ES256);

        let err = jwt_signature_algorithm(&ed25519(), &definition, &["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("none of the key's signature algorithms"));
    }

    #[test]
    fn disjoint_restrictions_fail_with_distinct_messages() {
        let disjoint_descriptors = definition(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "a", "format": { "jwt_vp": { "alg": ["ES256"] } } },
                { "id": "b", "format": { "jwt_vp": { "alg": ["EdDSA"] } } }
            ]
        }));
        let err = allowed_values(&disjoint_descriptors, &["a", "b"], EnvelopeFormat::JwtVp)
            .unwrap_err();
        assert!(err.to_string().contains("every input descriptor"));

        let disjoint_definition = definition(json!({
            "id": "def",
            "format": { "jwt_vp": { "alg": ["ES384"] } },
            "input_descriptors": [{ "id": "a", "format": { "jwt_vp": { "alg": ["ES256"] } } }]
        }));
        let err =
            allowed_values(&disjoint_definition, &["a"], EnvelopeFormat::JwtVp).unwrap_err();
        assert!(err.to_string().contains("both the presentation definition"));
    }

    #[test]
    fn definition_restriction_applies_alone() {
        let definition = definition(json!({
            "id": "def",
            "format": { "ldp_vp": { "proof_type": ["JsonWebSignature2020"] } },
            "input_descriptors": [{ "id": "a" }]
        }));

        let proof_type =
            ldp_proof_type(&ed25519(), &KeyTypeSuiteRegistry::default(), &definition, &["a"])
                .unwrap();
        assert_eq!(proof_type, "JsonWebSignature2020");

        let err = ldp_proof_type(&ed25519(), &KeyTypeSuiteRegistry::empty(), &definition, &["a"])
            .unwrap_err();
        assert!(matches!(err, PresentationExchangeError::Unsatisfiable(_)));
    }

    #[test]
    fn unrestricted_proof_type_is_the_registry_preference() {
        let definition = definition(json!({ "id": "def", "input_descriptors": [{ "id": "a" }] }));
        let proof_type =
            ldp_proof_type(&p256(), &KeyTypeSuiteRegistry::default(), &definition, &["a"]).unwrap();
        assert_eq!(proof_type, "EcdsaSecp256r1Signature2019");
    }
}
