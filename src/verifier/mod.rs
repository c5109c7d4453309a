//! Verifier side processing of a presentation submission.
//!
//! A submission's descriptor map tells the verifier where, among the returned presentations,
//! the credential answering each input descriptor is located. Extraction follows those paths
//! and hands every credential back alongside its descriptor, ready for verification.
//!
//! See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#processing-of-submission-entries](https://identity.foundation/presentation-exchange/spec/v2.0.0/#processing-of-submission-entries)

use serde_json::Value as Json;
use serde_json_path::JsonPath;

use crate::core::credential_format::ClaimFormatDesignation;
use crate::core::input_descriptor::InputDescriptor;
use crate::core::presentation::{MdocDocument, SdJwtPresentation, VerifiablePresentation};
use crate::core::presentation_definition::PresentationDefinition;
use crate::core::presentation_submission::{DescriptorMap, PresentationSubmission};
use crate::error::{PresentationExchangeError, Result};

/// A credential extracted from a presentation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtractedCredential<'a> {
    /// A W3C credential as embedded in `verifiableCredential`: a compact JWT string or a
    /// Linked Data document.
    W3c(&'a Json),
    SdJwt(&'a SdJwtPresentation),
    Mdoc(&'a MdocDocument),
}

/// The credential answering one input descriptor, with the presentation it was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct PresentationWithDescriptor<'a> {
    /// The format of the credential itself, as declared by the descriptor map.
    pub claim_format: ClaimFormatDesignation,
    pub credential: ExtractedCredential<'a>,
    pub presentation: &'a VerifiablePresentation,
    pub input_descriptor: &'a InputDescriptor,
}

/// Map every descriptor map entry of `submission` onto the credential it points to.
///
/// Entries are processed in descriptor map order. Any entry that cannot be resolved fails the
/// whole submission.
pub fn extract_presentations_with_descriptors<'a>(
    presentations: &'a [VerifiablePresentation],
    submission: &PresentationSubmission,
    definition: &'a PresentationDefinition,
) -> Result<Vec<PresentationWithDescriptor<'a>>> {
    if submission.definition_id() != definition.id() {
        return Err(PresentationExchangeError::extraction(format!(
            "submission answers presentation definition '{}', expected '{}'",
            submission.definition_id(),
            definition.id()
        )));
    }

    submission
        .descriptor_map()
        .iter()
        .map(|entry| extract(presentations, entry, definition))
        .collect()
}

fn extract<'a>(
    presentations: &'a [VerifiablePresentation],
    entry: &DescriptorMap,
    definition: &'a PresentationDefinition,
) -> Result<PresentationWithDescriptor<'a>> {
    let presentation = locate_presentation(presentations, &entry.path)?;

    let input_descriptor = definition.input_descriptor(&entry.id).ok_or_else(|| {
        PresentationExchangeError::extraction(format!(
            "descriptor map entry references unknown input descriptor '{}'",
            entry.id
        ))
    })?;

    if !envelope_accepts(presentation, &entry.format) {
        return Err(PresentationExchangeError::extraction(format!(
            "descriptor map entry '{}' declares format '{}' but the presentation is '{}'",
            entry.id,
            entry.format,
            presentation.claim_format()
        )));
    }

    let (claim_format, credential) = match presentation {
        VerifiablePresentation::MsoMdoc(response) => {
            let document = response.document(&entry.id).ok_or_else(|| {
                PresentationExchangeError::extraction(format!(
                    "device response does not contain a document of type '{}'",
                    entry.id
                ))
            })?;
            (
                ClaimFormatDesignation::MsoMDoc,
                ExtractedCredential::Mdoc(document),
            )
        }
        VerifiablePresentation::SdJwtVc(sd_jwt) => {
            (entry.format.clone(), ExtractedCredential::SdJwt(sd_jwt))
        }
        // Nested paths of a JWT VP are evaluated against its claims set, not the `vp` claim.
        VerifiablePresentation::JwtVp {
            claims: document,
            ..
        }
        | VerifiablePresentation::LdpVp(document) => {
            let nested = entry.path_nested.as_deref().ok_or_else(|| {
                PresentationExchangeError::extraction(format!(
                    "descriptor map entry '{}' points to a '{}' presentation but has no nested path",
                    entry.id,
                    presentation.claim_format()
                ))
            })?;
            let credential = select_one(&nested.path, document).ok_or_else(|| {
                PresentationExchangeError::extraction(format!(
                    "no credential found at nested path '{}' for input descriptor '{}'",
                    nested.path, entry.id
                ))
            })?;
            (nested.format.clone(), ExtractedCredential::W3c(credential))
        }
    };

    tracing::debug!(
        "extracted '{claim_format}' credential for input descriptor '{}'",
        entry.id
    );

    Ok(PresentationWithDescriptor {
        claim_format,
        credential,
        presentation,
        input_descriptor,
    })
}

/// Select the presentation a top level descriptor map path points to.
///
/// A single presentation is addressed as `$`, several as `$[i]`.
fn locate_presentation<'a>(
    presentations: &'a [VerifiablePresentation],
    path: &JsonPath,
) -> Result<&'a VerifiablePresentation> {
    let positions = match presentations {
        [_] => Json::from(0),
        many => Json::Array((0..many.len()).map(Json::from).collect()),
    };

    select_one(path, &positions)
        .and_then(Json::as_u64)
        .and_then(|index| usize::try_from(index).ok())
        .and_then(|index| presentations.get(index))
        .ok_or_else(|| {
            PresentationExchangeError::extraction(format!(
                "no presentation found at path '{path}' among {} presentation(s)",
                presentations.len()
            ))
        })
}

fn select_one<'a>(path: &JsonPath, value: &'a Json) -> Option<&'a Json> {
    let nodes: Vec<&Json> = path.query(value).into_iter().collect();
    match nodes.as_slice() {
        [node] => Some(*node),
        _ => None,
    }
}

/// Whether the presentation envelope is of the format a descriptor map entry declares.
fn envelope_accepts(presentation: &VerifiablePresentation, format: &ClaimFormatDesignation) -> bool {
    use ClaimFormatDesignation as F;

    match presentation {
        VerifiablePresentation::JwtVp { .. } => {
            matches!(format, F::JwtVp | F::JwtVpJson | F::Jwt)
        }
        VerifiablePresentation::LdpVp(_) => matches!(format, F::LdpVp | F::Ldp | F::DiVp | F::Di),
        VerifiablePresentation::SdJwtVc(_) => matches!(format, F::VcSdJwt),
        VerifiablePresentation::MsoMdoc(_) => matches!(format, F::MsoMDoc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credential::MdocNamespaces;
    use crate::core::presentation::MdocDeviceResponse;
    use serde_json::{json, Map};

    fn definition() -> PresentationDefinition {
        serde_json::from_value(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "org.iso.18013.5.1.mDL" },
                { "id": "pid" },
                { "id": "degree" },
                { "id": "employment" }
            ]
        }))
        .unwrap()
    }

    fn submission(descriptor_map: Json) -> PresentationSubmission {
        serde_json::from_value(json!({
            "id": "7a9e4b4e-3f8a-4f8a-9d3e-0f6c1f0b9a11",
            "definition_id": "def",
            "descriptor_map": descriptor_map
        }))
        .unwrap()
    }

    fn presentations() -> Vec<VerifiablePresentation> {
        vec![
            VerifiablePresentation::MsoMdoc(MdocDeviceResponse {
                encoded: "o2d2ZXJzaW9u".into(),
                documents: vec![MdocDocument {
                    doc_type: "org.iso.18013.5.1.mDL".into(),
                    namespaces: MdocNamespaces::new(),
                }],
            }),
            VerifiablePresentation::SdJwtVc(SdJwtPresentation {
                compact: "jwt~disclosure~kb".into(),
                claims: Map::new(),
            }),
            VerifiablePresentation::JwtVp {
                compact: "eyJ.vp.sig".into(),
                claims: json!({
                    "iss": "did:example:holder",
                    "vp": {
                        "type": ["VerifiablePresentation"],
                        "verifiableCredential": ["eyJ.degree.sig", "eyJ.employment.sig"]
                    }
                }),
            },
        ]
    }

    #[test]
    fn extracts_each_descriptor_from_indexed_presentations() {
        let presentations = presentations();
        let definition = definition();
        let submission = submission(json!([
            { "id": "org.iso.18013.5.1.mDL", "format": "mso_mdoc", "path": "$[0]" },
            { "id": "pid", "format": "vc+sd-jwt", "path": "$[1]" },
            {
                "id": "degree", "format": "jwt_vp", "path": "$[2]",
                "path_nested": { "id": "degree", "format": "jwt_vc", "path": "$.vp.verifiableCredential[0]" }
            },
            {
                "id": "employment", "format": "jwt_vp", "path": "$[2]",
                "path_nested": { "id": "employment", "format": "jwt_vc", "path": "$.vp.verifiableCredential[1]" }
            }
        ]));

        let extracted =
            extract_presentations_with_descriptors(&presentations, &submission, &definition)
                .unwrap();

        assert_eq!(extracted.len(), 4);
        assert!(matches!(
            extracted[0].credential,
            ExtractedCredential::Mdoc(doc) if doc.doc_type == "org.iso.18013.5.1.mDL"
        ));
        assert_eq!(extracted[1].claim_format, ClaimFormatDesignation::VcSdJwt);
        assert_eq!(extracted[2].claim_format, ClaimFormatDesignation::JwtVc);
        assert_eq!(
            extracted[3].credential,
            ExtractedCredential::W3c(&json!("eyJ.employment.sig"))
        );
        assert_eq!(extracted[3].input_descriptor.id(), "employment");
        assert!(std::ptr::eq(extracted[2].presentation, extracted[3].presentation));
    }

    #[test]
    fn single_presentation_is_addressed_as_root() {
        let presentations = vec![presentations().remove(1)];
        let definition = definition();

        let root = submission(json!([{ "id": "pid", "format": "vc+sd-jwt", "path": "$" }]));
        assert!(extract_presentations_with_descriptors(&presentations, &root, &definition).is_ok());

        let indexed = submission(json!([{ "id": "pid", "format": "vc+sd-jwt", "path": "$[1]" }]));
        let err = extract_presentations_with_descriptors(&presentations, &indexed, &definition)
            .unwrap_err();
        assert!(matches!(err, PresentationExchangeError::Extraction(_)));
    }

    #[test]
    fn rejects_unresolvable_entries() {
        let presentations = presentations();
        let definition = definition();

        let missing_nested = submission(json!([{ "id": "degree", "format": "jwt_vp", "path": "$[2]" }]));
        let err = extract_presentations_with_descriptors(&presentations, &missing_nested, &definition)
            .unwrap_err();
        assert!(err.to_string().contains("no nested path"));

        let dangling = submission(json!([{ "id": "unknown", "format": "vc+sd-jwt", "path": "$[1]" }]));
        let err =
            extract_presentations_with_descriptors(&presentations, &dangling, &definition).unwrap_err();
        assert!(err.to_string().contains("unknown input descriptor"));

        let missing_doc = submission(json!([{ "id": "pid", "format": "mso_mdoc", "path": "$[0]" }]));
        let err = extract_presentations_with_descriptors(&presentations, &missing_doc, &definition)
            .unwrap_err();
        assert!(err.to_string().contains("does not contain a document"));

        let unwrapped = submission(json!([{
            "id": "degree", "format": "jwt_vp", "path": "$[2]",
            "path_nested": { "id": "degree", "format": "jwt_vc", "path": "$.verifiableCredential[0]" }
        }]));
        let err = extract_presentations_with_descriptors(&presentations, &unwrapped, &definition)
            .unwrap_err();
        assert!(err.to_string().contains("no credential found at nested path"));

        let wrong_format = submission(json!([{ "id": "pid", "format": "jwt_vp", "path": "$[1]" }]));
        assert!(
            extract_presentations_with_descriptors(&presentations, &wrong_format, &definition)
                .is_err()
        );
    }
}
