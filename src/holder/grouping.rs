use serde_json::{Map, Value as Json};

use super::requirements::{CredentialSelection, SubmissionEntryCredential};
use crate::core::credential::{MdocNamespaces, MdocRecord, SdJwtVcRecord, W3cCredentialRecord};
use crate::core::credential_format::{ClaimFormatDesignation, CredentialFormat};

/// A W3C credential placed into an enveloping presentation, with the input descriptor it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupedCredential {
    pub input_descriptor_id: String,
    pub record: W3cCredentialRecord,
}

/// A presentation the holder must create to answer a request.
///
/// JWT and Linked Data presentations batch every selected credential about the same subject.
/// SD-JWT VCs and mdocs are presented one credential per presentation.
#[derive(Debug, Clone, PartialEq)]
pub enum PresentationToCreate {
    JwtVp {
        subject_id: Option<String>,
        credentials: Vec<GroupedCredential>,
    },
    LdpVp {
        subject_id: Option<String>,
        credentials: Vec<GroupedCredential>,
    },
    SdJwtVc {
        input_descriptor_id: String,
        record: SdJwtVcRecord,
        disclosed_payload: Map<String, Json>,
    },
    MsoMdoc {
        input_descriptor_id: String,
        record: MdocRecord,
        disclosed_payload: MdocNamespaces,
    },
}

impl PresentationToCreate {
    /// The claim format of the presentation envelope.
    pub fn claim_format(&self) -> ClaimFormatDesignation {
        match self {
            Self::JwtVp { .. } => ClaimFormatDesignation::JwtVp,
            Self::LdpVp { .. } => ClaimFormatDesignation::LdpVp,
            Self::SdJwtVc { .. } => ClaimFormatDesignation::VcSdJwt,
            Self::MsoMdoc { .. } => ClaimFormatDesignation::MsoMDoc,
        }
    }

    /// The input descriptors answered by this presentation, in credential order.
    pub fn input_descriptor_ids(&self) -> Vec<&str> {
        match self {
            Self::JwtVp { credentials, .. } | Self::LdpVp { credentials, .. } => credentials
                .iter()
                .map(|credential| credential.input_descriptor_id.as_str())
                .collect(),
            Self::SdJwtVc {
                input_descriptor_id,
                ..
            }
            | Self::MsoMdoc {
                input_descriptor_id,
                ..
            } => vec![input_descriptor_id.as_str()],
        }
    }
}

/// Group selected credentials into the presentations to create.
///
/// Credentials are visited in selection order. A W3C credential joins the first presentation of
/// the same envelope format whose subject is the credential's first subject id, or starts a new
/// one. Linked Data presentations carry a single proof and therefore a single subject.
pub fn group(selection: &CredentialSelection) -> Vec<PresentationToCreate> {
    let mut presentations: Vec<PresentationToCreate> = Vec::new();

    for (input_descriptor_id, credential) in selection.iter() {
        let (record, is_ldp) = match credential {
            SubmissionEntryCredential::SdJwtVc {
                record,
                disclosed_payload,
            } => {
                presentations.push(PresentationToCreate::SdJwtVc {
                    input_descriptor_id: input_descriptor_id.to_string(),
                    record: record.clone(),
                    disclosed_payload: disclosed_payload.clone(),
                });
                continue;
            }
            SubmissionEntryCredential::Mdoc {
                record,
                disclosed_payload,
            } => {
                presentations.push(PresentationToCreate::MsoMdoc {
                    input_descriptor_id: input_descriptor_id.to_string(),
                    record: record.clone(),
                    disclosed_payload: disclosed_payload.clone(),
                });
                continue;
            }
            SubmissionEntryCredential::W3c(record) => {
                (record, record.format() == CredentialFormat::LdpVc)
            }
        };

        let subject_id = record.subject_ids().into_iter().next();
        let grouped = GroupedCredential {
            input_descriptor_id: input_descriptor_id.to_string(),
            record: record.clone(),
        };

        let existing = presentations
            .iter_mut()
            .find_map(|presentation| match presentation {
                PresentationToCreate::JwtVp {
                    subject_id: group_subject,
                    credentials,
                } if !is_ldp && *group_subject == subject_id => Some(credentials),
                PresentationToCreate::LdpVp {
                    subject_id: group_subject,
                    credentials,
                } if is_ldp && *group_subject == subject_id => Some(credentials),
                _ => None,
            });

        match existing {
            Some(credentials) => credentials.push(grouped),
            None if is_ldp => presentations.push(PresentationToCreate::LdpVp {
                subject_id,
                credentials: vec![grouped],
            }),
            None => presentations.push(PresentationToCreate::JwtVp {
                subject_id,
                credentials: vec![grouped],
            }),
        }
    }

    tracing::debug!(
        "grouped {} selected credential(s) into {} presentation(s)",
        selection.iter().count(),
        presentations.len()
    );

    presentations
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt_vc(id: &str, subject: &str) -> SubmissionEntryCredential {
        SubmissionEntryCredential::W3c(W3cCredentialRecord::jwt(
            id,
            format!("jwt.{id}.sig"),
            json!({ "credentialSubject": { "id": subject } }),
        ))
    }

    fn ldp_vc(id: &str, subject: &str) -> SubmissionEntryCredential {
        SubmissionEntryCredential::W3c(W3cCredentialRecord::ldp(
            id,
            json!({ "credentialSubject": { "id": subject }, "proof": {} }),
        ))
    }

    #[test]
    fn jwt_credentials_with_one_subject_share_a_presentation() {
        let selection = CredentialSelection::new()
            .add("a", jwt_vc("1", "did:example:alice"))
            .add("b", jwt_vc("2", "did:example:alice"))
            .add("c", jwt_vc("3", "did:example:bob"));

        let presentations = group(&selection);

        assert_eq!(presentations.len(), 2);
        assert_eq!(presentations[0].input_descriptor_ids(), vec!["a", "b"]);
        assert_eq!(presentations[1].input_descriptor_ids(), vec!["c"]);
        assert!(matches!(
            &presentations[1],
            PresentationToCreate::JwtVp { subject_id: Some(s), .. } if s == "did:example:bob"
        ));
    }

    #[test]
    fn jwt_and_ldp_credentials_never_share_a_presentation() {
        let selection = CredentialSelection::new()
            .add("a", jwt_vc("1", "did:example:alice"))
            .add("b", ldp_vc("2", "did:example:alice"))
            .add("c", ldp_vc("3", "did:example:alice"));

        let presentations = group(&selection);

        assert_eq!(presentations.len(), 2);
        assert_eq!(presentations[0].claim_format(), ClaimFormatDesignation::JwtVp);
        assert_eq!(presentations[1].claim_format(), ClaimFormatDesignation::LdpVp);
        assert_eq!(presentations[1].input_descriptor_ids(), vec!["b", "c"]);
    }

    #[test]
    fn sd_jwt_and_mdoc_are_presented_alone() {
        let sd_jwt = SubmissionEntryCredential::SdJwtVc {
            record: SdJwtVcRecord::new("1", "jwt~", json!({ "vct": "pid" })),
            disclosed_payload: Map::new(),
        };
        let mdoc = SubmissionEntryCredential::Mdoc {
            record: MdocRecord::new("2", "org.iso.18013.5.1.mDL", "b64", MdocNamespaces::new()),
            disclosed_payload: MdocNamespaces::new(),
        };
        let selection = CredentialSelection::new()
            .add("pid", sd_jwt.clone())
            .add("pid-2", sd_jwt)
            .add("org.iso.18013.5.1.mDL", mdoc);

        let presentations = group(&selection);

        assert_eq!(presentations.len(), 3);
        assert_eq!(presentations[2].claim_format(), ClaimFormatDesignation::MsoMDoc);
        assert_eq!(
            presentations[2].input_descriptor_ids(),
            vec!["org.iso.18013.5.1.mDL"]
        );
    }
}
