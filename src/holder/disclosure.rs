//! Selective disclosure for SD-JWT VCs and mdocs.
//!
//! SD-JWT disclosure frames are computed by the matcher; this module only shapes the visible
//! claims. mdoc disclosure is computed here, once per document, as the union of every input
//! descriptor that document answers.

use std::{collections::BTreeMap, fmt::Debug};

use anyhow::{bail, Context};
use serde_json::{Map, Value as Json};

use super::requirements::{CredentialsForRequest, SubmissionEntryCredential};
use crate::core::credential::{MdocNamespaces, MdocRecord, SdJwtVcRecord};
use crate::core::input_descriptor::{
    Constraints, ConstraintsField, ConstraintsLimitDisclosure, InputDescriptor,
};
use crate::core::presentation_definition::PresentationDefinition;
use crate::error::{PresentationExchangeError, Result};

/// Claims that describe the SD-JWT encoding itself rather than the credential.
const SD_JWT_INTERNAL_CLAIMS: [&str; 2] = ["_sd", "_sd_alg"];

/// Shape the claims an SD-JWT VC discloses for a matched input descriptor.
///
/// `disclosed_claims` is the payload with the selected disclosures applied, as reported by the
/// matcher. When absent, the credential is disclosed in full.
pub fn sd_jwt_disclosed_payload(
    record: &SdJwtVcRecord,
    disclosed_claims: Option<&Json>,
) -> Result<Map<String, Json>> {
    match disclosed_claims.unwrap_or(&record.claims) {
        Json::Object(claims) => Ok(strip_internal_claims(claims)),
        _ => Err(PresentationExchangeError::invalid(format!(
            "disclosed payload of SD-JWT VC '{}' is not a JSON object",
            record.id
        ))),
    }
}

fn strip_internal_claims(claims: &Map<String, Json>) -> Map<String, Json> {
    claims
        .iter()
        .filter(|(name, _)| !SD_JWT_INTERNAL_CLAIMS.contains(&name.as_str()))
        .map(|(name, value)| {
            let value = match value {
                Json::Object(nested) => Json::Object(strip_internal_claims(nested)),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

/// Computes the data elements an mdoc reveals for an input descriptor.
pub trait MdocDisclosureLimiter: Debug {
    fn limit_disclosure(
        &self,
        mdoc: &MdocRecord,
        input_descriptor: &InputDescriptor,
    ) -> anyhow::Result<MdocNamespaces>;
}

/// Limits disclosure over the decoded issuer-signed namespaces of a stored mdoc.
///
/// Every constraint field must address a data element as `$['<namespace>']['<element>']`.
/// A required element absent from the document is an error, an optional one is left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamespaceDisclosureLimiter;

impl MdocDisclosureLimiter for NamespaceDisclosureLimiter {
    fn limit_disclosure(
        &self,
        mdoc: &MdocRecord,
        input_descriptor: &InputDescriptor,
    ) -> anyhow::Result<MdocNamespaces> {
        let mut disclosed = MdocNamespaces::new();

        for field in input_descriptor.constraints().fields() {
            let Some((namespace, element)) = field.mdoc_element() else {
                if field.is_optional() {
                    continue;
                }
                bail!(
                    "input descriptor '{}' requests a field that is not an mdoc data element: {:?}",
                    input_descriptor.id(),
                    field.path().iter().collect::<Vec<_>>()
                );
            };

            let value = mdoc
                .namespaces
                .get(&namespace)
                .and_then(|elements| elements.get(&element));

            match value {
                Some(value) => {
                    disclosed
                        .entry(namespace)
                        .or_default()
                        .insert(element, value.clone());
                }
                None if field.is_optional() => {}
                None => bail!(
                    "mdoc '{}' does not contain required data element '{element}' in namespace '{namespace}'",
                    mdoc.doc_type
                ),
            }
        }

        Ok(disclosed)
    }
}

/// Compute mdoc disclosures for every mdoc referenced by a resolved request.
///
/// One document may answer several input descriptors. Its disclosure is computed once, over the
/// union of the constraint fields of all of them, and every entry referencing the document
/// receives its own copy of that single result.
pub fn apply_mdoc_disclosures(
    credentials_for_request: &mut CredentialsForRequest,
    definition: &PresentationDefinition,
    limiter: &dyn MdocDisclosureLimiter,
) -> Result<()> {
    let mut references: BTreeMap<String, (MdocRecord, Vec<String>)> = BTreeMap::new();

    for entry in credentials_for_request
        .requirements
        .iter()
        .flat_map(|requirement| &requirement.submission_entry)
    {
        for credential in &entry.verifiable_credentials {
            if let SubmissionEntryCredential::Mdoc { record, .. } = credential {
                let (_, descriptor_ids) = references
                    .entry(record.id.clone())
                    .or_insert_with(|| (record.clone(), Vec::new()));
                if !descriptor_ids.contains(&entry.input_descriptor_id) {
                    descriptor_ids.push(entry.input_descriptor_id.clone());
                }
            }
        }
    }

    let mut disclosures: BTreeMap<String, MdocNamespaces> = BTreeMap::new();

    for (record_id, (record, descriptor_ids)) in &references {
        let union = union_descriptor(definition, record, descriptor_ids)?;
        let disclosed = limiter
            .limit_disclosure(record, &union)
            .with_context(|| format!("failed to limit disclosure of mdoc '{record_id}'"))?;

        tracing::debug!(
            "mdoc '{record_id}' discloses {} namespace(s) for input descriptors {descriptor_ids:?}",
            disclosed.len()
        );

        disclosures.insert(record_id.clone(), disclosed);
    }

    for credential in credentials_for_request
        .requirements
        .iter_mut()
        .flat_map(|requirement| requirement.submission_entry.iter_mut())
        .flat_map(|entry| entry.verifiable_credentials.iter_mut())
    {
        if let SubmissionEntryCredential::Mdoc {
            record,
            disclosed_payload,
        } = credential
        {
            if let Some(disclosed) = disclosures.get(&record.id) {
                *disclosed_payload = disclosed.clone();
            }
        }
    }

    Ok(())
}

/// Build a single input descriptor carrying the constraint fields of every descriptor in
/// `descriptor_ids`, in order and without duplicates.
fn union_descriptor(
    definition: &PresentationDefinition,
    record: &MdocRecord,
    descriptor_ids: &[String],
) -> Result<InputDescriptor> {
    let mut fields: Vec<ConstraintsField> = Vec::new();

    for id in descriptor_ids {
        let descriptor = definition.input_descriptor(id).ok_or_else(|| {
            PresentationExchangeError::invalid(format!(
                "input descriptor '{id}' not found in presentation definition '{}'",
                definition.id()
            ))
        })?;

        for field in descriptor.constraints().fields() {
            if !fields.contains(field) {
                fields.push(field.clone());
            }
        }
    }

    let constraints = fields
        .into_iter()
        .fold(Constraints::new(), Constraints::add_constraint)
        .set_limit_disclosure(ConstraintsLimitDisclosure::Required);

    Ok(InputDescriptor::new(record.doc_type.clone(), constraints))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::core::credential::CandidateCredential;
    use crate::holder::requirements::resolve;
    use crate::holder::selection::{DescriptorMatches, MatchedCandidate, SelectResults};
    use serde_json::json;

    const MDL: &str = "org.iso.18013.5.1.mDL";
    const NS: &str = "org.iso.18013.5.1";

    fn mdl() -> MdocRecord {
        let namespaces: MdocNamespaces = serde_json::from_value(json!({
            NS: {
                "family_name": "Mustermann",
                "given_name": "Erika",
                "age_over_18": true
            }
        }))
        .unwrap();
        MdocRecord::new("mdl-1", MDL, "b64", namespaces)
    }

    fn mdl_descriptor(id: &str, elements: &[(&str, bool)]) -> Json {
        json!({
            "id": id,
            "format": { "mso_mdoc": { "alg": ["ES256"] } },
            "constraints": {
                "limit_disclosure": "required",
                "fields": elements
                    .iter()
                    .map(|(element, optional)| json!({
                        "path": [format!("$['{NS}']['{element}']")],
                        "intent_to_retain": false,
                        "optional": optional
                    }))
                    .collect::<Vec<_>>()
            }
        })
    }

    #[test]
    fn sd_jwt_payload_is_shaped_without_internal_claims() {
        let record = SdJwtVcRecord::new(
            "1",
            "jwt~d1~",
            json!({
                "vct": "https://example.com/pid",
                "_sd_alg": "sha-256",
                "_sd": ["abc"],
                "address": { "_sd": ["def"], "country": "DE" }
            }),
        );

        let payload = sd_jwt_disclosed_payload(&record, None).unwrap();
        assert_eq!(
            Json::Object(payload),
            json!({ "vct": "https://example.com/pid", "address": { "country": "DE" } })
        );

        let disclosed = json!({ "vct": "https://example.com/pid" });
        let payload = sd_jwt_disclosed_payload(&record, Some(&disclosed)).unwrap();
        assert_eq!(payload.len(), 1);

        assert!(sd_jwt_disclosed_payload(&record, Some(&json!("not an object"))).is_err());
    }

    #[test]
    fn namespace_limiter_omits_optional_and_rejects_missing_required() {
        let limiter = NamespaceDisclosureLimiter;
        let record = mdl();

        let descriptor: InputDescriptor = serde_json::from_value(mdl_descriptor(
            MDL,
            &[("given_name", false), ("portrait", true)],
        ))
        .unwrap();
        let disclosed = limiter.limit_disclosure(&record, &descriptor).unwrap();
        assert_eq!(disclosed[NS].len(), 1);
        assert_eq!(disclosed[NS]["given_name"], json!("Erika"));

        let descriptor: InputDescriptor =
            serde_json::from_value(mdl_descriptor(MDL, &[("portrait", false)])).unwrap();
        let err = limiter.limit_disclosure(&record, &descriptor).unwrap_err();
        assert!(err.to_string().contains("portrait"));
    }

    #[test]
    fn mdoc_shared_by_two_descriptors_discloses_the_union_in_both() {
        let definition: PresentationDefinition = serde_json::from_value(json!({
            "id": "def",
            "input_descriptors": [
                mdl_descriptor("name", &[("given_name", false)]),
                mdl_descriptor("age", &[("age_over_18", false)])
            ]
        }))
        .unwrap();
        let candidates = vec![CandidateCredential::Mdoc(mdl())];
        let select_results = SelectResults {
            matches: ["name", "age"]
                .into_iter()
                .map(|id| DescriptorMatches {
                    input_descriptor_id: id.into(),
                    candidates: vec![MatchedCandidate::new(0)],
                })
                .collect(),
            warnings: Vec::new(),
        };

        let mut result =
            resolve(&definition, &select_results, &candidates, &Config::default()).unwrap();
        apply_mdoc_disclosures(&mut result, &definition, &NamespaceDisclosureLimiter).unwrap();

        let payloads: Vec<&MdocNamespaces> = result
            .requirements
            .iter()
            .flat_map(|r| &r.submission_entry)
            .flat_map(|e| &e.verifiable_credentials)
            .map(|c| match c {
                SubmissionEntryCredential::Mdoc {
                    disclosed_payload, ..
                } => disclosed_payload,
                other => panic!("unexpected credential {other:?}"),
            })
            .collect();

        assert_eq!(payloads.len(), 2);
        assert_eq!(payloads[0], payloads[1]);
        let elements: Vec<&String> = payloads[0][NS].keys().collect();
        assert_eq!(elements, vec!["age_over_18", "given_name"]);
    }
}
