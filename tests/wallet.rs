#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dif_presentation_exchange::{
    core::{
        credential::{CandidateCredential, MdocNamespaces, MdocRecord, SdJwtVcRecord},
        credential_format::ClaimFormatDesignation,
        iso_18013_7::SessionTranscript,
        presentation::{MdocDeviceResponse, MdocDocument},
        presentation_definition::PresentationDefinition,
        presentation_submission::{json_path, DescriptorMap, PresentationSubmission},
    },
    holder::{
        grouping::GroupedCredential,
        selection::{CredentialSelector, DescriptorMatches, MatchedCandidate, SelectResults},
        AnonCredsDataIntegrity, CredentialQuery, CredentialStore, LdpProofOptions,
        MdocDeviceResponder, MdocResponse, PresentationExchange, PresentationSigner,
        SdJwtPresenter, VerificationMethod, VerificationMethodResolver,
    },
};
use serde_json::{json, Map, Value as Json};
use ssi::jwk::{Algorithm, JWK};

/// `{"alg":"ES256","b64":false,"crit":["b64"]}`
pub const DETACHED_JWS_HEADER: &str = "eyJhbGciOiJFUzI1NiIsImI2NCI6ZmFsc2UsImNyaXQiOlsiYjY0Il19";

pub const ALICE: &str = "did:example:alice";
pub const BOB: &str = "did:example:bob";

/// RFC 7515 Appendix A.3 public key.
pub fn p256_jwk() -> JWK {
    serde_json::from_value(json!({
        "kty": "EC",
        "crv": "P-256",
        "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
        "y": "x_FEzRjGTr6Q0fmCudBMnIZpnkW-XNXVgUxd4MbnWEw"
    }))
    .unwrap()
}

/// RFC 8037 Appendix A.2 public key.
pub fn ed25519_jwk() -> JWK {
    serde_json::from_value(json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
    }))
    .unwrap()
}

/// Decode the payload of a compact JWS produced by [FakeSigner].
pub fn jwt_payload(compact: &str) -> Json {
    let payload = compact.split('.').nth(1).unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap()
}

/// Hands out the credentials it was created with.
#[derive(Debug, Default)]
pub struct MemoryStore(pub Vec<CandidateCredential>);

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn query(&self, query: &CredentialQuery) -> Result<Vec<CandidateCredential>> {
        Ok(self
            .0
            .iter()
            .filter(|candidate| query.matches(candidate))
            .cloned()
            .collect())
    }
}

/// Matches each input descriptor to a fixed list of record ids.
#[derive(Debug, Default)]
pub struct ScriptedSelector(pub BTreeMap<String, Vec<String>>);

impl ScriptedSelector {
    pub fn with(mut self, input_descriptor_id: &str, record_ids: &[&str]) -> Self {
        self.0.insert(
            input_descriptor_id.to_string(),
            record_ids.iter().map(ToString::to_string).collect(),
        );
        self
    }
}

impl CredentialSelector for ScriptedSelector {
    fn select_candidates(
        &self,
        definition: &PresentationDefinition,
        candidates: &[CandidateCredential],
    ) -> Result<SelectResults> {
        let matches = definition
            .input_descriptors()
            .iter()
            .map(|descriptor| {
                let record_ids = self.0.get(descriptor.id()).cloned().unwrap_or_default();
                let candidates = candidates
                    .iter()
                    .enumerate()
                    .filter(|(_, candidate)| record_ids.iter().any(|id| id == candidate.record_id()))
                    .map(|(index, candidate)| match candidate {
                        CandidateCredential::SdJwtVc(record) => {
                            MatchedCandidate::new(index).with_disclosed_claims(record.claims.clone())
                        }
                        _ => MatchedCandidate::new(index),
                    })
                    .collect();
                DescriptorMatches {
                    input_descriptor_id: descriptor.id().to_string(),
                    candidates,
                }
            })
            .collect();

        Ok(SelectResults {
            matches,
            warnings: Vec::new(),
        })
    }
}

/// Resolves every known DID to a single authentication method.
#[derive(Debug, Default)]
pub struct StaticResolver(pub BTreeMap<String, JWK>);

impl StaticResolver {
    pub fn with(mut self, did: &str, jwk: JWK) -> Self {
        self.0.insert(did.to_string(), jwk);
        self
    }
}

#[async_trait]
impl VerificationMethodResolver for StaticResolver {
    async fn authentication_methods(&self, did: &str) -> Result<Vec<VerificationMethod>> {
        let jwk = self.0.get(did).context("unknown DID")?;
        Ok(vec![VerificationMethod {
            id: format!("{did}#key-1"),
            controller: did.to_string(),
            public_key_jwk: jwk.clone(),
        }])
    }
}

/// Produces structurally valid, unverifiable signatures and records what it signed.
#[derive(Debug, Default)]
pub struct FakeSigner {
    pub jwt_algorithms: Mutex<Vec<String>>,
    pub ldp_options: Mutex<Vec<LdpProofOptions>>,
}

#[async_trait]
impl PresentationSigner for FakeSigner {
    async fn sign_jwt_vp(
        &self,
        claims: &Json,
        verification_method: &VerificationMethod,
        algorithm: Algorithm,
    ) -> Result<String> {
        let alg = algorithm.as_str().to_string();
        let header = json!({ "alg": alg, "kid": verification_method.id });
        self.jwt_algorithms.lock().unwrap().push(alg);

        Ok(format!(
            "{}.{}.c2ln",
            URL_SAFE_NO_PAD.encode(header.to_string()),
            URL_SAFE_NO_PAD.encode(claims.to_string())
        ))
    }

    async fn sign_ldp_vp(
        &self,
        presentation: &Json,
        verification_method: &VerificationMethod,
        options: &LdpProofOptions,
    ) -> Result<Json> {
        self.ldp_options.lock().unwrap().push(options.clone());

        let mut signed = presentation.clone();
        let Some(document) = signed.as_object_mut() else {
            bail!("presentation is not an object")
        };
        document.insert(
            "proof".into(),
            json!({
                "type": options.proof_type,
                "proofPurpose": options.proof_purpose,
                "challenge": options.challenge,
                "domain": options.domain,
                "verificationMethod": verification_method.id,
                "jws": format!("{DETACHED_JWS_HEADER}..c2ln"),
            }),
        );
        Ok(signed)
    }
}

/// Appends a key binding marker to the issuer-signed SD-JWT.
#[derive(Debug, Default)]
pub struct FakeSdJwtPresenter;

#[async_trait]
impl SdJwtPresenter for FakeSdJwtPresenter {
    async fn present(
        &self,
        record: &SdJwtVcRecord,
        disclosed_payload: &Map<String, Json>,
        audience: &str,
        nonce: &str,
    ) -> Result<String> {
        Ok(format!(
            "{}~kb.{}.{audience}.{nonce}",
            record.compact,
            disclosed_payload.len()
        ))
    }
}

/// Returns a device response holding exactly the disclosed namespaces.
#[derive(Debug, Default)]
pub struct FakeMdocResponder {
    pub transcripts: Mutex<Vec<SessionTranscript>>,
}

#[async_trait]
impl MdocDeviceResponder for FakeMdocResponder {
    async fn create_device_response(
        &self,
        record: &MdocRecord,
        disclosed_payload: &MdocNamespaces,
        definition: &PresentationDefinition,
        session_transcript: &SessionTranscript,
    ) -> Result<MdocResponse> {
        self.transcripts
            .lock()
            .unwrap()
            .push(session_transcript.clone());

        let descriptor_map = definition
            .input_descriptors()
            .iter()
            .map(|descriptor| -> Result<DescriptorMap> {
                Ok(DescriptorMap::new(
                    descriptor.id(),
                    ClaimFormatDesignation::MsoMDoc,
                    json_path("$")?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(MdocResponse {
            device_response: MdocDeviceResponse {
                encoded: URL_SAFE_NO_PAD.encode(&record.doc_type),
                documents: vec![MdocDocument {
                    doc_type: record.doc_type.clone(),
                    namespaces: disclosed_payload.clone(),
                }],
            },
            submission: PresentationSubmission::new(
                uuid::Uuid::new_v4(),
                definition.id().clone(),
                descriptor_map,
            ),
        })
    }
}

/// Wraps the credentials in an unsigned presentation with an AnonCreds proof stub.
#[derive(Debug, Default)]
pub struct FakeAnonCreds;

#[async_trait]
impl AnonCredsDataIntegrity for FakeAnonCreds {
    async fn create_presentation(
        &self,
        _definition: &PresentationDefinition,
        submission: &PresentationSubmission,
        credentials: &[GroupedCredential],
        challenge: &str,
    ) -> Result<Json> {
        Ok(json!({
            "@context": ["https://www.w3.org/2018/credentials/v1"],
            "type": ["VerifiablePresentation"],
            "verifiableCredential": credentials
                .iter()
                .map(|credential| credential.record.encoded())
                .collect::<Vec<_>>(),
            "proof": {
                "type": "DataIntegrityProof",
                "cryptosuite": "anoncreds-2023",
                "challenge": challenge,
                "proofValue": "ukgGEqXNjaGVtYV9pZA",
                "descriptors": submission
                    .descriptor_map()
                    .iter()
                    .map(|entry| entry.id.clone())
                    .collect::<Vec<_>>()
            }
        }))
    }
}

/// An engine wired with every fake collaborator.
pub fn exchange(
    candidates: Vec<CandidateCredential>,
    selector: ScriptedSelector,
) -> (PresentationExchange, Arc<FakeSigner>, Arc<FakeMdocResponder>) {
    let signer = Arc::new(FakeSigner::default());
    let responder = Arc::new(FakeMdocResponder::default());

    let exchange = PresentationExchange::builder()
        .with_credential_selector(Arc::new(selector))
        .with_credential_store(Arc::new(MemoryStore(candidates)))
        .with_verification_method_resolver(Arc::new(
            StaticResolver::default()
                .with(ALICE, p256_jwk())
                .with(BOB, ed25519_jwk()),
        ))
        .with_presentation_signer(signer.clone())
        .with_sd_jwt_presenter(Arc::new(FakeSdJwtPresenter))
        .with_mdoc_responder(responder.clone())
        .with_anoncreds(Arc::new(FakeAnonCreds))
        .build()
        .unwrap();

    (exchange, signer, responder)
}
