pub mod credential;
pub mod credential_format;
pub mod input_descriptor;
pub mod iso_18013_7;
pub mod jws;
pub mod presentation;
pub mod presentation_definition;
pub mod presentation_submission;
