//! This library provides a Rust implementation of [DIF Presentation Exchange] v1 and v2.
//!
//! [DIF Presentation Exchange]: <https://identity.foundation/presentation-exchange/spec/v2.0.0/>
//!
//! # Holder Usage
//!
//! The holder side is driven by the [`PresentationExchange`] engine. It is built from the
//! collaborators it needs: a [`CredentialSelector`] evaluating input descriptor constraints, a
//! [`CredentialStore`] holding the holder's credentials and, depending on the formats
//! requested, the signers and presenters of each presentation format.
//!
//! ```ignore
//! use dif_presentation_exchange::holder::{CreatePresentationOptions, PresentationExchange};
//!
//! let exchange = PresentationExchange::builder()
//!     .with_credential_selector(selector)
//!     .with_credential_store(store)
//!     .with_verification_method_resolver(resolver)
//!     .with_presentation_signer(signer)
//!     .build()?;
//!
//! // Find the credentials answering each requirement of the definition.
//! let credentials_for_request = exchange.get_credentials_for_request(&definition).await?;
//! if !credentials_for_request.are_requirements_satisfied {
//!     // Tell the user what is missing.
//! }
//!
//! // Let the user choose, or take the first match of every requirement.
//! let selection = exchange.select_credentials_for_request(&credentials_for_request)?;
//!
//! // Sign the presentations and build the submission describing them.
//! let result = exchange
//!     .create_presentation(
//!         &definition,
//!         &selection,
//!         &CreatePresentationOptions::new(nonce).with_domain(client_id),
//!     )
//!     .await?;
//!
//! let vp_token = result.vp_token();
//! ```
//!
//! [`PresentationExchange`]: crate::holder::PresentationExchange
//! [`CredentialSelector`]: crate::holder::selection::CredentialSelector
//! [`CredentialStore`]: crate::holder::CredentialStore
//!
//! # Verifier Usage
//!
//! Verifiers map a received submission back onto the presentations it describes with
//! [`extract_presentations_with_descriptors`], which pairs every credential with the input
//! descriptor it answers.
//!
//! [`extract_presentations_with_descriptors`]: crate::verifier::extract_presentations_with_descriptors
//!
//! # Credential Formats
//!
//! Presentations are created in the following envelopes:
//! - **JWT VP** (`jwt_vp`): W3C presentations of JWT credentials
//! - **LDP VP** (`ldp_vp`): W3C presentations of Linked Data credentials, or `di_vp` when
//!   signed with AnonCreds Data Integrity proofs
//! - **SD-JWT VC** (`vc+sd-jwt`): one presentation per credential
//! - **mso_mdoc** (`mso_mdoc`): one ISO/IEC 18013-5 device response per credential
//!
//! Format identifiers are defined in the [`core::credential_format`] module.
//!
//! [`core::credential_format`]: crate::core::credential_format

pub mod config;
pub mod core;
pub mod error;
pub mod holder;
pub mod utils;
pub mod verifier;
pub use serde_json_path::JsonPath;
