use std::{fmt::Debug, sync::Arc};

use anyhow::bail;
use async_trait::async_trait;
use serde_json::{Map, Value as Json};
use ssi::jwk::{Algorithm, JWK};

use crate::config::Config;
use crate::core::credential::{MdocNamespaces, MdocRecord, SdJwtVcRecord};
use crate::core::iso_18013_7::SessionTranscript;
use crate::core::presentation::MdocDeviceResponse;
use crate::core::presentation_definition::PresentationDefinition;
use crate::core::presentation_submission::PresentationSubmission;
use crate::error::Result;

use algorithm::{KeyTypeSuiteRegistry, SignatureSuiteRegistry};
use disclosure::{MdocDisclosureLimiter, NamespaceDisclosureLimiter};
use grouping::GroupedCredential;
use requirements::{CredentialSelection, CredentialsForRequest};
use selection::CredentialSelector;

pub use assembler::{CreatePresentationOptions, PresentationResult};
pub use query::{CredentialQuery, CredentialStore};

pub mod algorithm;
mod assembler;
pub mod disclosure;
pub mod grouping;
pub mod query;
pub mod requirements;
pub mod selection;
pub mod verifiable_presentation_builder;

/// A verification method of the holder, as found in the `authentication` relationship of its
/// DID document.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationMethod {
    pub id: String,
    pub controller: String,
    pub public_key_jwk: JWK,
}

/// Resolves the verification methods presentations are signed with.
#[async_trait]
pub trait VerificationMethodResolver: Debug {
    /// Return the `authentication` verification methods of `did`, in document order.
    async fn authentication_methods(&self, did: &str) -> anyhow::Result<Vec<VerificationMethod>>;
}

/// Proof options of a Linked Data presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdpProofOptions {
    pub proof_type: String,
    pub proof_purpose: String,
    pub challenge: String,
    pub domain: Option<String>,
}

/// Signs W3C presentations with the holder's keys.
#[async_trait]
pub trait PresentationSigner: Debug {
    /// Sign the claims of a JWT presentation, returning the compact JWS.
    async fn sign_jwt_vp(
        &self,
        claims: &Json,
        verification_method: &VerificationMethod,
        algorithm: Algorithm,
    ) -> anyhow::Result<String>;

    /// Attach a Linked Data proof to `presentation`, returning the signed document.
    async fn sign_ldp_vp(
        &self,
        presentation: &Json,
        verification_method: &VerificationMethod,
        options: &LdpProofOptions,
    ) -> anyhow::Result<Json>;
}

/// Creates SD-JWT VC presentations.
#[async_trait]
pub trait SdJwtPresenter: Debug {
    /// Present `record` revealing `disclosed_payload`, with a key binding JWT for `audience` and
    /// `nonce`. Returns the compact presentation.
    async fn present(
        &self,
        record: &SdJwtVcRecord,
        disclosed_payload: &Map<String, Json>,
        audience: &str,
        nonce: &str,
    ) -> anyhow::Result<String>;
}

/// An mdoc device response together with the submission describing it.
#[derive(Debug, Clone, PartialEq)]
pub struct MdocResponse {
    pub device_response: MdocDeviceResponse,
    /// Descriptor map entries for the response, with `$` as the path.
    pub submission: PresentationSubmission,
}

/// Creates ISO 18013-5 device responses.
#[async_trait]
pub trait MdocDeviceResponder: Debug {
    /// Create a device response revealing `disclosed_payload` of `record`.
    ///
    /// `definition` only contains the input descriptor the mdoc answers.
    async fn create_device_response(
        &self,
        record: &MdocRecord,
        disclosed_payload: &MdocNamespaces,
        definition: &PresentationDefinition,
        session_transcript: &SessionTranscript,
    ) -> anyhow::Result<MdocResponse>;
}

/// Creates AnonCreds Data Integrity presentations.
#[async_trait]
pub trait AnonCredsDataIntegrity: Debug {
    /// Create a signed presentation of `credentials`, returning the presentation document.
    ///
    /// `submission` describes the presentation with `di_vp` descriptor map entries. It is
    /// embedded by the engine when the submission travels inside the presentation.
    async fn create_presentation(
        &self,
        definition: &PresentationDefinition,
        submission: &PresentationSubmission,
        credentials: &[GroupedCredential],
        challenge: &str,
    ) -> anyhow::Result<Json>;
}

/// The holder side Presentation Exchange engine.
///
/// Resolves presentation definitions against the holder's credentials and assembles the
/// presentations and submission answering them.
#[derive(Debug, Clone)]
pub struct PresentationExchange {
    config: Config,
    selector: Arc<dyn CredentialSelector + Send + Sync>,
    store: Arc<dyn CredentialStore + Send + Sync>,
    disclosure_limiter: Arc<dyn MdocDisclosureLimiter + Send + Sync>,
    suite_registry: Arc<dyn SignatureSuiteRegistry + Send + Sync>,
    resolver: Option<Arc<dyn VerificationMethodResolver + Send + Sync>>,
    signer: Option<Arc<dyn PresentationSigner + Send + Sync>>,
    sd_jwt_presenter: Option<Arc<dyn SdJwtPresenter + Send + Sync>>,
    mdoc_responder: Option<Arc<dyn MdocDeviceResponder + Send + Sync>>,
    anoncreds: Option<Arc<dyn AnonCredsDataIntegrity + Send + Sync>>,
}

impl PresentationExchange {
    /// Build a new engine.
    pub fn builder() -> PresentationExchangeBuilder {
        PresentationExchangeBuilder::default()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find the holder's credentials for every requirement of `definition`.
    ///
    /// A request the holder cannot satisfy is not an error: inspect
    /// [CredentialsForRequest::are_requirements_satisfied].
    pub async fn get_credentials_for_request(
        &self,
        definition: &PresentationDefinition,
    ) -> Result<CredentialsForRequest> {
        definition.validate()?;

        let candidates = query::find_candidates(self.store.as_ref(), definition).await?;
        let select_results = self
            .selector
            .select_candidates(definition, &candidates)?;

        for warning in &select_results.warnings {
            tracing::warn!("credential selection for '{}': {warning}", definition.id());
        }

        let mut credentials_for_request =
            requirements::resolve(definition, &select_results, &candidates, &self.config)?;
        disclosure::apply_mdoc_disclosures(
            &mut credentials_for_request,
            definition,
            self.disclosure_limiter.as_ref(),
        )?;

        Ok(credentials_for_request)
    }

    /// Select the first matching credentials of a satisfied request.
    pub fn select_credentials_for_request(
        &self,
        credentials_for_request: &CredentialsForRequest,
    ) -> Result<CredentialSelection> {
        requirements::select_credentials_for_request(credentials_for_request)
    }
}

/// Builder struct for [PresentationExchange].
#[derive(Debug, Clone, Default)]
pub struct PresentationExchangeBuilder {
    config: Config,
    selector: Option<Arc<dyn CredentialSelector + Send + Sync>>,
    store: Option<Arc<dyn CredentialStore + Send + Sync>>,
    disclosure_limiter: Option<Arc<dyn MdocDisclosureLimiter + Send + Sync>>,
    suite_registry: Option<Arc<dyn SignatureSuiteRegistry + Send + Sync>>,
    resolver: Option<Arc<dyn VerificationMethodResolver + Send + Sync>>,
    signer: Option<Arc<dyn PresentationSigner + Send + Sync>>,
    sd_jwt_presenter: Option<Arc<dyn SdJwtPresenter + Send + Sync>>,
    mdoc_responder: Option<Arc<dyn MdocDeviceResponder + Send + Sync>>,
    anoncreds: Option<Arc<dyn AnonCredsDataIntegrity + Send + Sync>>,
}

impl PresentationExchangeBuilder {
    /// Build the engine.
    ///
    /// The credential selector and store are required. The mdoc disclosure limiter defaults to
    /// [NamespaceDisclosureLimiter] and the suite registry to [KeyTypeSuiteRegistry::default].
    pub fn build(self) -> anyhow::Result<PresentationExchange> {
        let Self {
            config,
            selector,
            store,
            disclosure_limiter,
            suite_registry,
            resolver,
            signer,
            sd_jwt_presenter,
            mdoc_responder,
            anoncreds,
        } = self;

        let Some(selector) = selector else {
            bail!("credential selector is required, see `with_credential_selector`")
        };

        let Some(store) = store else {
            bail!("credential store is required, see `with_credential_store`")
        };

        Ok(PresentationExchange {
            config,
            selector,
            store,
            disclosure_limiter: disclosure_limiter
                .unwrap_or_else(|| Arc::new(NamespaceDisclosureLimiter)),
            suite_registry: suite_registry
                .unwrap_or_else(|| Arc::new(KeyTypeSuiteRegistry::default())),
            resolver,
            signer,
            sd_jwt_presenter,
            mdoc_responder,
            anoncreds,
        })
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set the matcher evaluating input descriptor constraints against the holder's credentials.
    pub fn with_credential_selector(
        mut self,
        selector: Arc<dyn CredentialSelector + Send + Sync>,
    ) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore + Send + Sync>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_disclosure_limiter(
        mut self,
        limiter: Arc<dyn MdocDisclosureLimiter + Send + Sync>,
    ) -> Self {
        self.disclosure_limiter = Some(limiter);
        self
    }

    pub fn with_suite_registry(
        mut self,
        registry: Arc<dyn SignatureSuiteRegistry + Send + Sync>,
    ) -> Self {
        self.suite_registry = Some(registry);
        self
    }

    /// Set the resolver of the holder's verification methods. Required to create JWT and
    /// Linked Data presentations.
    pub fn with_verification_method_resolver(
        mut self,
        resolver: Arc<dyn VerificationMethodResolver + Send + Sync>,
    ) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Set the signer of JWT and Linked Data presentations.
    pub fn with_presentation_signer(
        mut self,
        signer: Arc<dyn PresentationSigner + Send + Sync>,
    ) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_sd_jwt_presenter(
        mut self,
        presenter: Arc<dyn SdJwtPresenter + Send + Sync>,
    ) -> Self {
        self.sd_jwt_presenter = Some(presenter);
        self
    }

    pub fn with_mdoc_responder(
        mut self,
        responder: Arc<dyn MdocDeviceResponder + Send + Sync>,
    ) -> Self {
        self.mdoc_responder = Some(responder);
        self
    }

    /// Enable AnonCreds Data Integrity presentations.
    pub fn with_anoncreds(mut self, anoncreds: Arc<dyn AnonCredsDataIntegrity + Send + Sync>) -> Self {
        self.anoncreds = Some(anoncreds);
        self
    }
}
