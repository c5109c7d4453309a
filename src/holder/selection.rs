//! Contract of the raw matcher: the component that evaluates input descriptor constraints
//! (JSONPath and JSON Schema filters) against held credentials.
//!
//! The matcher is injected into the engine and must hold no per-call state.

use std::fmt::Debug;

use serde_json::Value as Json;

use crate::core::credential::CandidateCredential;
use crate::core::presentation_definition::PresentationDefinition;

/// A candidate credential matched against an input descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedCandidate {
    /// Index into the candidate list handed to [CredentialSelector::select_candidates].
    pub index: usize,
    /// For SD-JWT VCs, the claims visible after applying the minimal disclosure frame:
    /// the issuer payload with the selected disclosures resolved.
    pub disclosed_claims: Option<Json>,
}

impl MatchedCandidate {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            disclosed_claims: None,
        }
    }

    pub fn with_disclosed_claims(mut self, claims: Json) -> Self {
        self.disclosed_claims = Some(claims);
        self
    }
}

/// The candidates matching one input descriptor, in match order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorMatches {
    pub input_descriptor_id: String,
    pub candidates: Vec<MatchedCandidate>,
}

/// Raw matcher output for one presentation definition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectResults {
    pub matches: Vec<DescriptorMatches>,
    /// Non fatal problems reported by the matcher.
    pub warnings: Vec<String>,
}

impl SelectResults {
    /// Return the candidates matched to the given input descriptor, in match order.
    pub fn candidates_for(&self, input_descriptor_id: &str) -> &[MatchedCandidate] {
        self.matches
            .iter()
            .find(|m| m.input_descriptor_id == input_descriptor_id)
            .map(|m| m.candidates.as_slice())
            .unwrap_or_default()
    }
}

/// Evaluates a presentation definition against held credentials.
pub trait CredentialSelector: Debug {
    fn select_candidates(
        &self,
        definition: &PresentationDefinition,
        candidates: &[CandidateCredential],
    ) -> anyhow::Result<SelectResults>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_for_unknown_descriptor_is_empty() {
        let results = SelectResults {
            matches: vec![DescriptorMatches {
                input_descriptor_id: "a".into(),
                candidates: vec![MatchedCandidate::new(0), MatchedCandidate::new(2)],
            }],
            warnings: Vec::new(),
        };

        assert_eq!(results.candidates_for("a").len(), 2);
        assert!(results.candidates_for("b").is_empty());
    }
}
