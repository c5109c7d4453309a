//! Requirement resolution: turns raw matches and the submission requirement tree of a
//! presentation definition into requirements bound to concrete credentials.

use serde_json::{Map, Value as Json};

use super::disclosure;
use super::selection::{MatchedCandidate, SelectResults};
use crate::config::Config;
use crate::core::credential::{
    CandidateCredential, MdocNamespaces, MdocRecord, SdJwtVcRecord, W3cCredentialRecord,
};
use crate::core::credential_format::CredentialFormat;
use crate::core::input_descriptor::InputDescriptor;
use crate::core::presentation_definition::{
    PresentationDefinition, SubmissionRequirement, SubmissionRequirementRule,
};
use crate::error::{PresentationExchangeError, Result};

/// A credential bound to a submission entry, with the claims it will disclose.
///
/// W3C credentials, JWT or Linked Data secured, are disclosed as a whole.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionEntryCredential {
    W3c(W3cCredentialRecord),
    SdJwtVc {
        record: SdJwtVcRecord,
        disclosed_payload: Map<String, Json>,
    },
    Mdoc {
        record: MdocRecord,
        disclosed_payload: MdocNamespaces,
    },
}

impl SubmissionEntryCredential {
    pub fn format(&self) -> CredentialFormat {
        match self {
            Self::W3c(record) => record.format(),
            Self::SdJwtVc { .. } => CredentialFormat::SdJwtVc,
            Self::Mdoc { .. } => CredentialFormat::MsoMdoc,
        }
    }

    /// The id of the stored record backing this credential.
    pub fn record_id(&self) -> &str {
        match self {
            Self::W3c(record) => &record.id,
            Self::SdJwtVc { record, .. } => &record.id,
            Self::Mdoc { record, .. } => &record.id,
        }
    }
}

/// One input descriptor of a requirement and the credentials that can satisfy it.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionEntry {
    pub input_descriptor_id: String,
    pub name: Option<String>,
    pub purpose: Option<String>,
    /// Matching credentials, in match order.
    pub verifiable_credentials: Vec<SubmissionEntryCredential>,
}

impl SubmissionEntry {
    pub fn is_satisfied(&self) -> bool {
        !self.verifiable_credentials.is_empty()
    }
}

/// A submission requirement bound to credentials.
///
/// When satisfied, `submission_entry` only holds the entries that can be submitted. Otherwise
/// every entry of the group is kept so callers can show what is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct Requirement {
    pub rule: SubmissionRequirementRule,
    pub needs_count: usize,
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub submission_entry: Vec<SubmissionEntry>,
    pub is_requirement_satisfied: bool,
}

/// The holder side view of a presentation request.
///
/// Partial satisfaction is a normal result: `are_requirements_satisfied` is `false` and the
/// unsatisfied requirements list every entry that could have satisfied them.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialsForRequest {
    pub name: Option<String>,
    pub purpose: Option<String>,
    pub requirements: Vec<Requirement>,
    pub are_requirements_satisfied: bool,
}

/// Credentials chosen for submission, keyed by input descriptor id in selection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialSelection(Vec<(String, Vec<SubmissionEntryCredential>)>);

impl CredentialSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `credential` for the given input descriptor.
    pub fn add(
        mut self,
        input_descriptor_id: impl Into<String>,
        credential: SubmissionEntryCredential,
    ) -> Self {
        self.push(input_descriptor_id.into(), credential);
        self
    }

    fn push(&mut self, input_descriptor_id: String, credential: SubmissionEntryCredential) {
        match self.0.iter_mut().find(|(id, _)| *id == input_descriptor_id) {
            Some((_, credentials)) => credentials.push(credential),
            None => self.0.push((input_descriptor_id, vec![credential])),
        }
    }

    fn contains(&self, input_descriptor_id: &str) -> bool {
        self.0.iter().any(|(id, _)| id == input_descriptor_id)
    }

    /// Return the credentials selected for the given input descriptor.
    pub fn credentials(&self, input_descriptor_id: &str) -> &[SubmissionEntryCredential] {
        self.0
            .iter()
            .find(|(id, _)| id == input_descriptor_id)
            .map(|(_, credentials)| credentials.as_slice())
            .unwrap_or_default()
    }

    /// Iterate over `(input descriptor id, credential)` pairs in selection order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SubmissionEntryCredential)> {
        self.0.iter().flat_map(|(id, credentials)| {
            credentials
                .iter()
                .map(move |credential| (id.as_str(), credential))
        })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Resolve raw matches into requirements.
///
/// Without submission requirements every input descriptor becomes a `pick` requirement needing
/// one credential. Otherwise requirements are resolved in declared order against the input
/// descriptors of their `from` group, in definition order.
///
/// mdoc payloads are left empty here; see [disclosure::apply_mdoc_disclosures].
pub fn resolve(
    definition: &PresentationDefinition,
    select_results: &SelectResults,
    candidates: &[CandidateCredential],
    config: &Config,
) -> Result<CredentialsForRequest> {
    let requirements = match definition.submission_requirements() {
        Some(submission_requirements) => submission_requirements
            .iter()
            .map(|requirement| {
                resolve_submission_requirement(
                    definition,
                    requirement,
                    select_results,
                    candidates,
                    config,
                )
            })
            .collect::<Result<Vec<_>>>()?,
        None => definition
            .input_descriptors()
            .iter()
            .map(|descriptor| {
                let entry = submission_entry(descriptor, select_results, candidates)?;
                Ok(Requirement {
                    rule: SubmissionRequirementRule::Pick,
                    needs_count: 1,
                    name: descriptor.name().cloned(),
                    purpose: descriptor.purpose().cloned(),
                    is_requirement_satisfied: entry.is_satisfied(),
                    submission_entry: vec![entry],
                })
            })
            .collect::<Result<Vec<_>>>()?,
    };

    let requirements: Vec<Requirement> = requirements
        .into_iter()
        .filter(|requirement| requirement.needs_count > 0)
        .collect();

    if requirements.is_empty() {
        return Err(PresentationExchangeError::unsatisfiable(
            "presentation definition does not require any credentials; optional credentials are not included in the presentation submission",
        ));
    }

    let are_requirements_satisfied = requirements
        .iter()
        .all(|requirement| requirement.is_requirement_satisfied);

    tracing::debug!(
        "resolved {} requirement(s) for presentation definition '{}', satisfied: {are_requirements_satisfied}",
        requirements.len(),
        definition.id()
    );

    Ok(CredentialsForRequest {
        name: definition.name().cloned(),
        purpose: definition.purpose().cloned(),
        requirements,
        are_requirements_satisfied,
    })
}

fn resolve_submission_requirement(
    definition: &PresentationDefinition,
    requirement: &SubmissionRequirement,
    select_results: &SelectResults,
    candidates: &[CandidateCredential],
    config: &Config,
) -> Result<Requirement> {
    if requirement.from_nested().is_some() {
        return Err(PresentationExchangeError::invalid(
            "presentation definition contains a submission requirement using 'from_nested', which is not supported",
        ));
    }

    let from = requirement.from().ok_or_else(|| {
        PresentationExchangeError::invalid("missing 'from' property on submission requirement")
    })?;

    let entries = definition
        .input_descriptors_in_group(from)
        .into_iter()
        .map(|descriptor| submission_entry(descriptor, select_results, candidates))
        .collect::<Result<Vec<_>>>()?;

    let base = Requirement {
        rule: requirement.rule(),
        needs_count: 0,
        name: requirement.name().cloned(),
        purpose: requirement.purpose().cloned(),
        submission_entry: Vec::new(),
        is_requirement_satisfied: false,
    };

    let resolved = match requirement.rule() {
        SubmissionRequirementRule::All => Requirement {
            needs_count: entries.len(),
            is_requirement_satisfied: entries.iter().all(SubmissionEntry::is_satisfied),
            submission_entry: entries,
            ..base
        },
        SubmissionRequirementRule::Pick => {
            let needs_count = requirement
                .count()
                .or(requirement.min())
                .unwrap_or(config.default_pick_count);

            let (satisfied, unsatisfied): (Vec<_>, Vec<_>) =
                entries.into_iter().partition(SubmissionEntry::is_satisfied);
            let is_requirement_satisfied = satisfied.len() >= needs_count;

            let submission_entry = if is_requirement_satisfied {
                satisfied
            } else {
                satisfied.into_iter().chain(unsatisfied).collect()
            };

            Requirement {
                needs_count,
                is_requirement_satisfied,
                submission_entry,
                ..base
            }
        }
    };

    Ok(resolved)
}

fn submission_entry(
    descriptor: &InputDescriptor,
    select_results: &SelectResults,
    candidates: &[CandidateCredential],
) -> Result<SubmissionEntry> {
    let verifiable_credentials = select_results
        .candidates_for(descriptor.id())
        .iter()
        .map(|matched| entry_credential(matched, candidates))
        .collect::<Result<Vec<_>>>()?;

    Ok(SubmissionEntry {
        input_descriptor_id: descriptor.id().to_string(),
        name: descriptor.name().cloned(),
        purpose: descriptor.purpose().cloned(),
        verifiable_credentials,
    })
}

fn entry_credential(
    matched: &MatchedCandidate,
    candidates: &[CandidateCredential],
) -> Result<SubmissionEntryCredential> {
    let candidate = candidates.get(matched.index).ok_or_else(|| {
        PresentationExchangeError::invalid(format!(
            "credential selector matched unknown candidate {}",
            matched.index
        ))
    })?;

    Ok(match candidate {
        CandidateCredential::W3c(record) => SubmissionEntryCredential::W3c(record.clone()),
        CandidateCredential::SdJwtVc(record) => SubmissionEntryCredential::SdJwtVc {
            disclosed_payload: disclosure::sd_jwt_disclosed_payload(
                record,
                matched.disclosed_claims.as_ref(),
            )?,
            record: record.clone(),
        },
        CandidateCredential::Mdoc(record) => SubmissionEntryCredential::Mdoc {
            record: record.clone(),
            disclosed_payload: MdocNamespaces::new(),
        },
    })
}

/// Automatically select credentials for a satisfied request.
///
/// For each requirement the first `needs_count` satisfied entries are taken, each with its
/// first matching credential. An input descriptor shared by several requirements is selected
/// once.
pub fn select_credentials_for_request(
    credentials_for_request: &CredentialsForRequest,
) -> Result<CredentialSelection> {
    if !credentials_for_request.are_requirements_satisfied {
        return Err(PresentationExchangeError::unsatisfiable(
            "could not find the required credentials for the presentation submission",
        ));
    }

    let mut selection = CredentialSelection::new();

    for requirement in &credentials_for_request.requirements {
        let entries = requirement
            .submission_entry
            .iter()
            .filter(|entry| entry.is_satisfied())
            .take(requirement.needs_count);

        for entry in entries {
            if selection.contains(&entry.input_descriptor_id) {
                continue;
            }
            if let Some(credential) = entry.verifiable_credentials.first() {
                selection.push(entry.input_descriptor_id.clone(), credential.clone());
            }
        }
    }

    Ok(selection)
}
