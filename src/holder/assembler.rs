use serde_json::{Map, Value as Json};
use serde_json_path::JsonPath;
use uuid::Uuid;

use super::algorithm;
use super::grouping::{self, GroupedCredential, PresentationToCreate};
use super::requirements::CredentialSelection;
use super::verifiable_presentation_builder::{JwtPresentationOptions, VerifiablePresentationBuilder};
use super::{LdpProofOptions, PresentationExchange, VerificationMethod};
use crate::core::credential::{MdocNamespaces, MdocRecord, SdJwtVcRecord};
use crate::core::credential_format::ClaimFormatDesignation;
use crate::core::iso_18013_7::SessionTranscriptOptions;
use crate::core::jws::validate_detached_jws_header;
use crate::core::presentation::{
    vp_token, SdJwtPresentation, SubmissionLocation, VerifiablePresentation,
};
use crate::core::presentation_definition::PresentationDefinition;
use crate::core::presentation_submission::{json_path, DescriptorMap, PresentationSubmission};
use crate::error::{PresentationExchangeError, Result};

const AUTHENTICATION_PROOF_PURPOSE: &str = "authentication";

/// Request bound options of [PresentationExchange::create_presentation].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePresentationOptions {
    /// The verifier's nonce.
    pub challenge: String,
    /// The verifier's client id. Required for SD-JWT VC and mdoc presentations.
    pub domain: Option<String>,
    /// Falls back to the configured submission location when unset.
    pub submission_location: Option<SubmissionLocation>,
    /// Required for mdoc presentations.
    pub session_transcript: Option<SessionTranscriptOptions>,
}

impl CreatePresentationOptions {
    pub fn new(challenge: impl Into<String>) -> Self {
        Self {
            challenge: challenge.into(),
            ..Default::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_submission_location(mut self, location: SubmissionLocation) -> Self {
        self.submission_location = Some(location);
        self
    }

    pub fn with_session_transcript(mut self, options: SessionTranscriptOptions) -> Self {
        self.session_transcript = Some(options);
        self
    }
}

/// The presentations answering a request and the submission describing them.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationResult {
    /// One presentation per group, in group order.
    pub presentations: Vec<VerifiablePresentation>,
    pub submission: PresentationSubmission,
    /// The wire form of each presentation, in the same order.
    pub encoded_presentations: Vec<Json>,
}

impl PresentationResult {
    /// The presentations rendered as an OpenID4VP `vp_token`.
    pub fn vp_token(&self) -> Json {
        vp_token(&self.presentations)
    }
}

struct CreatedPresentation {
    presentation: VerifiablePresentation,
    descriptor_map: Vec<DescriptorMap>,
}

impl PresentationExchange {
    /// Create the presentations for the selected credentials and the submission describing them.
    ///
    /// Every precondition that does not depend on a collaborator is checked before any
    /// presentation is signed.
    pub async fn create_presentation(
        &self,
        definition: &PresentationDefinition,
        selection: &CredentialSelection,
        options: &CreatePresentationOptions,
    ) -> Result<PresentationResult> {
        let location = options
            .submission_location
            .unwrap_or(self.config.submission_location);

        for (input_descriptor_id, _) in selection.iter() {
            if definition.input_descriptor(input_descriptor_id).is_none() {
                return Err(PresentationExchangeError::invalid(format!(
                    "selected credential references unknown input descriptor '{input_descriptor_id}'"
                )));
            }
        }

        let groups = grouping::group(selection);
        check_preconditions(&groups, options, location)?;

        let mut created = Vec::with_capacity(groups.len());
        for group in &groups {
            let presentation = match group {
                PresentationToCreate::JwtVp {
                    subject_id,
                    credentials,
                } => {
                    self.create_jwt_vp(
                        definition,
                        subject_id.as_deref(),
                        credentials,
                        options,
                        location,
                    )
                    .await?
                }
                PresentationToCreate::LdpVp {
                    subject_id,
                    credentials,
                } => {
                    self.create_ldp_vp(
                        definition,
                        subject_id.as_deref(),
                        credentials,
                        options,
                        location,
                    )
                    .await?
                }
                PresentationToCreate::SdJwtVc {
                    input_descriptor_id,
                    record,
                    disclosed_payload,
                } => {
                    self.create_sd_jwt_presentation(
                        input_descriptor_id,
                        record,
                        disclosed_payload,
                        options,
                    )
                    .await?
                }
                PresentationToCreate::MsoMdoc {
                    input_descriptor_id,
                    record,
                    disclosed_payload,
                } => {
                    self.create_device_response(
                        definition,
                        input_descriptor_id,
                        record,
                        disclosed_payload,
                        options,
                    )
                    .await?
                }
            };
            created.push(presentation);
        }

        if created.is_empty() {
            return Err(PresentationExchangeError::Assembly(
                "no presentations were created".into(),
            ));
        }

        if created.len() != groups.len() {
            return Err(PresentationExchangeError::Assembly(format!(
                "created {} presentation(s) for {} group(s)",
                created.len(),
                groups.len()
            )));
        }

        let index_paths = location == SubmissionLocation::External && created.len() > 1;
        let mut presentations = Vec::with_capacity(created.len());
        let mut descriptor_map = Vec::new();

        for (index, presentation) in created.into_iter().enumerate() {
            for entry in presentation.descriptor_map {
                let entry = if index_paths {
                    entry.set_path(json_path(&format!("$[{index}]"))?)
                } else {
                    entry
                };
                descriptor_map.push(entry);
            }
            presentations.push(presentation.presentation);
        }

        if index_paths {
            tracing::debug!(
                "submission for '{}' is external with {} presentations, using indexed paths",
                definition.id(),
                presentations.len()
            );
        }

        let submission = PresentationSubmission::new(Uuid::new_v4(), definition.id(), descriptor_map);
        let encoded_presentations = presentations
            .iter()
            .map(VerifiablePresentation::encoded)
            .collect();

        Ok(PresentationResult {
            presentations,
            submission,
            encoded_presentations,
        })
    }

    async fn create_jwt_vp(
        &self,
        definition: &PresentationDefinition,
        subject_id: Option<&str>,
        credentials: &[GroupedCredential],
        options: &CreatePresentationOptions,
        location: SubmissionLocation,
    ) -> Result<CreatedPresentation> {
        let verification_method = self.verification_method(subject_id).await?;
        let algorithm = algorithm::jwt_signature_algorithm(
            &verification_method.public_key_jwk,
            definition,
            &input_descriptor_ids(credentials),
        )?;

        let descriptor_map = enveloped_descriptor_map(credentials, ClaimFormatDesignation::JwtVp)?;
        let builder =
            unsigned_presentation(definition, &verification_method, credentials, &descriptor_map, location)?;

        let claims = builder.build_jwt_claims(JwtPresentationOptions {
            audience: options.domain.as_deref(),
            nonce: &options.challenge,
            expiration_secs: self.config.presentation_expiration_secs,
        });

        let compact = self
            .signer()?
            .sign_jwt_vp(&claims, &verification_method, algorithm)
            .await?;

        Ok(CreatedPresentation {
            presentation: VerifiablePresentation::JwtVp { compact, claims },
            descriptor_map,
        })
    }

    async fn create_ldp_vp(
        &self,
        definition: &PresentationDefinition,
        subject_id: Option<&str>,
        credentials: &[GroupedCredential],
        options: &CreatePresentationOptions,
        location: SubmissionLocation,
    ) -> Result<CreatedPresentation> {
        if signs_with_anoncreds(definition, credentials, &self.config.anoncreds_cryptosuite) {
            return self
                .create_anoncreds_presentation(definition, credentials, options, location)
                .await;
        }

        let verification_method = self.verification_method(subject_id).await?;
        let proof_type = algorithm::ldp_proof_type(
            &verification_method.public_key_jwk,
            self.suite_registry.as_ref(),
            definition,
            &input_descriptor_ids(credentials),
        )?;

        let descriptor_map = enveloped_descriptor_map(credentials, ClaimFormatDesignation::LdpVp)?;
        let unsigned =
            unsigned_presentation(definition, &verification_method, credentials, &descriptor_map, location)?
                .build();

        let proof_options = LdpProofOptions {
            proof_type,
            proof_purpose: AUTHENTICATION_PROOF_PURPOSE.into(),
            challenge: options.challenge.clone(),
            domain: options.domain.clone(),
        };

        let signed = self
            .signer()?
            .sign_ldp_vp(&unsigned, &verification_method, &proof_options)
            .await?;
        check_proof_jws(&signed)?;

        Ok(CreatedPresentation {
            presentation: VerifiablePresentation::LdpVp(signed),
            descriptor_map,
        })
    }

    async fn create_anoncreds_presentation(
        &self,
        definition: &PresentationDefinition,
        credentials: &[GroupedCredential],
        options: &CreatePresentationOptions,
        location: SubmissionLocation,
    ) -> Result<CreatedPresentation> {
        let Some(anoncreds) = &self.anoncreds else {
            return Err(missing_collaborator(
                "AnonCreds Data Integrity support is required to present anoncreds-2023 credentials, see `with_anoncreds`",
            ));
        };

        tracing::debug!(
            "presenting {} credential(s) with {}",
            credentials.len(),
            self.config.anoncreds_cryptosuite
        );

        let descriptor_map: Vec<DescriptorMap> =
            enveloped_descriptor_map(credentials, ClaimFormatDesignation::LdpVp)?
                .into_iter()
                .map(|entry| entry.set_format(ClaimFormatDesignation::DiVp))
                .collect();
        let submission =
            PresentationSubmission::new(Uuid::new_v4(), definition.id(), descriptor_map.clone());

        let mut presentation = anoncreds
            .create_presentation(definition, &submission, credentials, &options.challenge)
            .await?;

        if location == SubmissionLocation::Presentation {
            let Some(document) = presentation.as_object_mut() else {
                return Err(PresentationExchangeError::Assembly(
                    "AnonCreds presentation is not a JSON object".into(),
                ));
            };
            let submission = serde_json::to_value(&submission).map_err(anyhow::Error::from)?;
            document.insert("presentation_submission".into(), submission);
        }

        Ok(CreatedPresentation {
            presentation: VerifiablePresentation::LdpVp(presentation),
            descriptor_map,
        })
    }

    async fn create_sd_jwt_presentation(
        &self,
        input_descriptor_id: &str,
        record: &SdJwtVcRecord,
        disclosed_payload: &Map<String, Json>,
        options: &CreatePresentationOptions,
    ) -> Result<CreatedPresentation> {
        let Some(presenter) = &self.sd_jwt_presenter else {
            return Err(missing_collaborator(
                "SD-JWT presenter is required to present SD-JWT VCs, see `with_sd_jwt_presenter`",
            ));
        };

        let audience = options.domain.as_deref().ok_or_else(|| {
            PresentationExchangeError::invalid("a domain is required for SD-JWT VC presentations")
        })?;

        let compact = presenter
            .present(record, disclosed_payload, audience, &options.challenge)
            .await?;

        Ok(CreatedPresentation {
            presentation: VerifiablePresentation::SdJwtVc(SdJwtPresentation {
                compact,
                claims: disclosed_payload.clone(),
            }),
            descriptor_map: vec![DescriptorMap::new(
                input_descriptor_id,
                ClaimFormatDesignation::VcSdJwt,
                root_path()?,
            )],
        })
    }

    async fn create_device_response(
        &self,
        definition: &PresentationDefinition,
        input_descriptor_id: &str,
        record: &MdocRecord,
        disclosed_payload: &MdocNamespaces,
        options: &CreatePresentationOptions,
    ) -> Result<CreatedPresentation> {
        let Some(responder) = &self.mdoc_responder else {
            return Err(missing_collaborator(
                "mdoc responder is required to present mdocs, see `with_mdoc_responder`",
            ));
        };

        let (Some(domain), Some(transcript_options)) =
            (options.domain.as_deref(), &options.session_transcript)
        else {
            return Err(PresentationExchangeError::invalid(
                "a domain and session transcript options are required for mdoc presentations",
            ));
        };

        let session_transcript = transcript_options.session_transcript(domain, &options.challenge)?;
        let restricted = definition.restricted_to(input_descriptor_id)?;

        let response = responder
            .create_device_response(record, disclosed_payload, &restricted, &session_transcript)
            .await?;

        let descriptor_map = response.submission.into_descriptor_map();
        if descriptor_map.is_empty() {
            return Err(PresentationExchangeError::Assembly(format!(
                "device response for '{input_descriptor_id}' is not described by any descriptor map entry"
            )));
        }

        Ok(CreatedPresentation {
            presentation: VerifiablePresentation::MsoMdoc(response.device_response),
            descriptor_map,
        })
    }

    /// Resolve the key presentations about `subject_id` are signed with: the first
    /// `authentication` method of the subject's DID.
    async fn verification_method(&self, subject_id: Option<&str>) -> Result<VerificationMethod> {
        let subject_id = subject_id.ok_or_else(|| {
            PresentationExchangeError::invalid(
                "a credential subject id is required to sign a presentation",
            )
        })?;

        if !subject_id.starts_with("did:") {
            return Err(PresentationExchangeError::invalid(format!(
                "only DIDs are supported as credential subject id, found '{subject_id}'"
            )));
        }

        let Some(resolver) = &self.resolver else {
            return Err(missing_collaborator(
                "verification method resolver is required to sign presentations, see `with_verification_method_resolver`",
            ));
        };

        resolver
            .authentication_methods(subject_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                PresentationExchangeError::invalid(format!(
                    "no authentication verification method found for '{subject_id}'"
                ))
            })
    }

    fn signer(&self) -> Result<&(dyn super::PresentationSigner + Send + Sync)> {
        self.signer.as_deref().ok_or_else(|| {
            missing_collaborator(
                "presentation signer is required to sign presentations, see `with_presentation_signer`",
            )
        })
    }
}

/// Whether `credentials` are presented with an AnonCreds Data Integrity proof.
///
/// Every credential must carry a proof of `cryptosuite`, and no descriptor they answer may
/// designate a format other than Data Integrity or Linked Data. Descriptors without a `format`
/// accept any.
fn signs_with_anoncreds(
    definition: &PresentationDefinition,
    credentials: &[GroupedCredential],
    cryptosuite: &str,
) -> bool {
    let data_integrity_formats = credentials.iter().all(|credential| {
        definition
            .input_descriptor(&credential.input_descriptor_id)
            .is_some_and(|descriptor| {
                descriptor
                    .format()
                    .keys()
                    .all(ClaimFormatDesignation::is_data_integrity)
            })
    });

    data_integrity_formats
        && credentials.iter().all(|credential| {
            credential
                .record
                .data_integrity_cryptosuites()
                .iter()
                .any(|suite| suite == cryptosuite)
        })
}

/// Reject mdoc and SD-JWT presentations whose request bound inputs are missing.
fn check_preconditions(
    groups: &[PresentationToCreate],
    options: &CreatePresentationOptions,
    location: SubmissionLocation,
) -> Result<()> {
    for group in groups {
        match group {
            PresentationToCreate::MsoMdoc {
                input_descriptor_id,
                ..
            } => {
                if options.domain.is_none() {
                    return Err(PresentationExchangeError::invalid(format!(
                        "a domain is required to present mdoc '{input_descriptor_id}'"
                    )));
                }
                if options.session_transcript.is_none() {
                    return Err(PresentationExchangeError::invalid(format!(
                        "session transcript options are required to present mdoc '{input_descriptor_id}'"
                    )));
                }
                if location != SubmissionLocation::External {
                    return Err(PresentationExchangeError::invalid(
                        "mdoc presentations require an external submission location",
                    ));
                }
            }
            PresentationToCreate::SdJwtVc {
                input_descriptor_id,
                ..
            } => {
                if options.domain.is_none() {
                    return Err(PresentationExchangeError::invalid(format!(
                        "a domain is required to present SD-JWT VC '{input_descriptor_id}'"
                    )));
                }
            }
            PresentationToCreate::JwtVp { .. } | PresentationToCreate::LdpVp { .. } => {}
        }
    }

    Ok(())
}

fn input_descriptor_ids(credentials: &[GroupedCredential]) -> Vec<&str> {
    credentials
        .iter()
        .map(|credential| credential.input_descriptor_id.as_str())
        .collect()
}

fn root_path() -> Result<JsonPath> {
    json_path("$")
}

/// Descriptor map entries for credentials enveloped in a presentation, nesting into
/// `verifiableCredential` by position.
///
/// Nested paths are evaluated against the decoded envelope, so a JWT VP nests below its `vp`
/// claim.
fn enveloped_descriptor_map(
    credentials: &[GroupedCredential],
    envelope: ClaimFormatDesignation,
) -> Result<Vec<DescriptorMap>> {
    let credentials_path = match envelope {
        ClaimFormatDesignation::JwtVp | ClaimFormatDesignation::JwtVpJson => {
            "$.vp.verifiableCredential"
        }
        _ => "$.verifiableCredential",
    };

    credentials
        .iter()
        .enumerate()
        .map(|(index, credential)| -> Result<DescriptorMap> {
            let nested = DescriptorMap::new(
                credential.input_descriptor_id.as_str(),
                credential.record.format().designation(),
                json_path(&format!("{credentials_path}[{index}]"))?,
            );
            Ok(DescriptorMap::new(
                credential.input_descriptor_id.as_str(),
                envelope.clone(),
                root_path()?,
            )
            .set_path_nested(nested))
        })
        .collect()
}

fn unsigned_presentation(
    definition: &PresentationDefinition,
    verification_method: &VerificationMethod,
    credentials: &[GroupedCredential],
    descriptor_map: &[DescriptorMap],
    location: SubmissionLocation,
) -> Result<VerifiablePresentationBuilder> {
    let mut builder = credentials.iter().fold(
        VerifiablePresentationBuilder::new().set_holder(verification_method.controller.as_str()),
        |builder, credential| builder.add_credential(credential.record.encoded()),
    );

    if location == SubmissionLocation::Presentation {
        let submission =
            PresentationSubmission::new(Uuid::new_v4(), definition.id(), descriptor_map.to_vec());
        builder = builder.set_presentation_submission(&submission)?;
    }

    Ok(builder)
}

/// Check the header of every detached JWS proof of a signed Linked Data presentation.
fn check_proof_jws(presentation: &Json) -> Result<()> {
    let proofs: Vec<&Json> = match presentation.get("proof") {
        Some(Json::Array(proofs)) => proofs.iter().collect(),
        Some(proof) => vec![proof],
        None => Vec::new(),
    };

    for jws in proofs
        .into_iter()
        .filter_map(|proof| proof.get("jws").and_then(Json::as_str))
    {
        validate_detached_jws_header(jws).map_err(|e| {
            PresentationExchangeError::Assembly(format!("signed presentation carries an invalid proof: {e:#}"))
        })?;
    }

    Ok(())
}

fn missing_collaborator(message: &str) -> PresentationExchangeError {
    PresentationExchangeError::Collaborator(anyhow::anyhow!("{message}"))
}
