//! Deriving credential store queries from a presentation definition.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::core::credential::CandidateCredential;
use crate::core::credential_format::ClaimFormatDesignation;
use crate::core::presentation_definition::{PresentationDefinition, PresentationExchangeVersion};
use crate::error::Result;

/// A query against the holder's credential store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialQuery {
    /// Every stored W3C credential and SD-JWT VC.
    AllCredentials,
    /// W3C credentials whose expanded types, contexts or types contain the schema uri.
    W3cBySchema(String),
    /// SD-JWT VCs with the given `vct`.
    SdJwtByVct(String),
    /// Every stored mdoc.
    AllMdocs,
    /// mdocs of the given document type.
    MdocByDocType(String),
}

impl CredentialQuery {
    /// Whether `candidate` is a result of this query.
    ///
    /// Stores that cannot evaluate queries natively may filter with this.
    pub fn matches(&self, candidate: &CandidateCredential) -> bool {
        match (self, candidate) {
            (Self::AllCredentials, CandidateCredential::W3c(_) | CandidateCredential::SdJwtVc(_)) => {
                true
            }
            (Self::W3cBySchema(uri), CandidateCredential::W3c(record)) => {
                record.expanded_types.contains(uri)
                    || record.contexts().contains(uri)
                    || record.types().contains(uri)
            }
            (Self::SdJwtByVct(vct), CandidateCredential::SdJwtVc(record)) => {
                record.vct() == Some(vct.as_str())
            }
            (Self::AllMdocs, CandidateCredential::Mdoc(_)) => true,
            (Self::MdocByDocType(doc_type), CandidateCredential::Mdoc(record)) => {
                record.doc_type == *doc_type
            }
            _ => false,
        }
    }
}

/// The holder's credential storage.
#[async_trait]
pub trait CredentialStore: Debug {
    async fn query(&self, query: &CredentialQuery) -> anyhow::Result<Vec<CandidateCredential>>;
}

/// Derive the store queries needed to find candidates for `definition`.
///
/// Presentation Exchange v1 descriptors name the credential schemas they accept, so W3C
/// credentials and SD-JWT VCs are looked up by schema. v2 descriptors carry no such hint and
/// every credential is a candidate. mdocs are looked up by the document type that
/// `mso_mdoc` descriptors carry as their id.
pub fn credential_queries(definition: &PresentationDefinition) -> Result<Vec<CredentialQuery>> {
    let mut queries = match definition.version()? {
        PresentationExchangeVersion::V1 => definition
            .input_descriptors()
            .iter()
            .flat_map(|descriptor| descriptor.schema())
            .flat_map(|schema| {
                [
                    CredentialQuery::W3cBySchema(schema.uri.clone()),
                    CredentialQuery::SdJwtByVct(schema.uri.clone()),
                ]
            })
            .fold(Vec::new(), |mut queries, query| {
                if !queries.contains(&query) {
                    queries.push(query);
                }
                queries
            }),
        PresentationExchangeVersion::V2 => vec![CredentialQuery::AllCredentials],
    };

    let mdoc_descriptors: Vec<CredentialQuery> = definition
        .input_descriptors()
        .iter()
        .filter(|descriptor| {
            descriptor
                .format()
                .contains_key(&ClaimFormatDesignation::MsoMDoc)
        })
        .map(|descriptor| CredentialQuery::MdocByDocType(descriptor.id().to_string()))
        .collect();

    if mdoc_descriptors.is_empty() {
        queries.push(CredentialQuery::AllMdocs);
    } else {
        queries.extend(mdoc_descriptors);
    }

    Ok(queries)
}

/// Run every query for `definition` against `store`, returning each record once, in the order
/// it was first found.
///
/// Records a store returns that do not match the query they answer are skipped.
pub async fn find_candidates(
    store: &(dyn CredentialStore + Send + Sync),
    definition: &PresentationDefinition,
) -> Result<Vec<CandidateCredential>> {
    let mut candidates: Vec<CandidateCredential> = Vec::new();

    for query in credential_queries(definition)? {
        for candidate in store.query(&query).await? {
            if !query.matches(&candidate) {
                tracing::debug!(
                    "skipping record '{}' returned for {query:?}",
                    candidate.record_id()
                );
                continue;
            }

            let known = candidates
                .iter()
                .any(|c| c.record_id() == candidate.record_id());
            if !known {
                candidates.push(candidate);
            }
        }
    }

    tracing::debug!(
        "found {} candidate credential(s) for presentation definition '{}'",
        candidates.len(),
        definition.id()
    );

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::credential::{MdocNamespaces, MdocRecord, SdJwtVcRecord, W3cCredentialRecord};
    use crate::error::PresentationExchangeError;
    use serde_json::json;

    fn definition(value: serde_json::Value) -> PresentationDefinition {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn v1_definitions_query_by_schema() {
        let definition = definition(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "a", "schema": [{ "uri": "https://example.com/DriverLicense" }] },
                { "id": "b", "schema": [{ "uri": "https://example.com/DriverLicense" }] }
            ]
        }));

        assert_eq!(
            credential_queries(&definition).unwrap(),
            vec![
                CredentialQuery::W3cBySchema("https://example.com/DriverLicense".into()),
                CredentialQuery::SdJwtByVct("https://example.com/DriverLicense".into()),
                CredentialQuery::AllMdocs,
            ]
        );
    }

    #[test]
    fn v2_definitions_query_everything_and_mdocs_by_doc_type() {
        let definition = definition(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "org.iso.18013.5.1.mDL", "format": { "mso_mdoc": { "alg": ["ES256"] } } },
                { "id": "pid" }
            ]
        }));

        assert_eq!(
            credential_queries(&definition).unwrap(),
            vec![
                CredentialQuery::AllCredentials,
                CredentialQuery::MdocByDocType("org.iso.18013.5.1.mDL".into()),
            ]
        );
    }

    #[test]
    fn mixed_versions_are_rejected() {
        let definition = definition(json!({
            "id": "def",
            "input_descriptors": [
                { "id": "a", "schema": [{ "uri": "https://example.com/A" }] },
                { "id": "b" }
            ]
        }));

        assert!(matches!(
            credential_queries(&definition),
            Err(PresentationExchangeError::InvalidRequest(_))
        ));
    }

    #[derive(Debug)]
    struct UnfilteredStore(Vec<CandidateCredential>);

    #[async_trait]
    impl CredentialStore for UnfilteredStore {
        async fn query(&self, _query: &CredentialQuery) -> anyhow::Result<Vec<CandidateCredential>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn candidates_outside_the_queries_are_skipped() {
        let definition = definition(json!({
            "id": "def",
            "input_descriptors": [{ "id": "a", "schema": [{ "uri": "https://example.com/A" }] }]
        }));
        let store = UnfilteredStore(vec![
            W3cCredentialRecord::ldp("1", json!({ "type": ["https://example.com/A"] })).into(),
            W3cCredentialRecord::ldp("2", json!({ "type": ["https://example.com/B"] })).into(),
            SdJwtVcRecord::new("3", "jwt~", json!({ "vct": "https://example.com/A" })).into(),
        ]);

        let candidates = find_candidates(&store, &definition).await.unwrap();
        let ids: Vec<&str> = candidates.iter().map(CandidateCredential::record_id).collect();

        assert_eq!(ids, vec!["1", "3"]);
    }

    #[test]
    fn query_matching() {
        let w3c = CandidateCredential::from(W3cCredentialRecord::ldp(
            "1",
            json!({ "type": ["VerifiableCredential", "https://example.com/A"] }),
        ));
        let sd_jwt = CandidateCredential::from(SdJwtVcRecord::new(
            "2",
            "jwt~",
            json!({ "vct": "https://example.com/A" }),
        ));
        let mdoc = CandidateCredential::from(MdocRecord::new(
            "3",
            "org.iso.18013.5.1.mDL",
            "b64",
            MdocNamespaces::new(),
        ));

        let by_schema = CredentialQuery::W3cBySchema("https://example.com/A".into());
        assert!(by_schema.matches(&w3c));
        assert!(!by_schema.matches(&sd_jwt));
        assert!(CredentialQuery::SdJwtByVct("https://example.com/A".into()).matches(&sd_jwt));
        assert!(CredentialQuery::AllCredentials.matches(&sd_jwt));
        assert!(!CredentialQuery::AllCredentials.matches(&mdoc));
        assert!(CredentialQuery::MdocByDocType("org.iso.18013.5.1.mDL".into()).matches(&mdoc));
    }
}
