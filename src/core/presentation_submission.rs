use std::collections::HashMap;

use super::{credential_format::*, presentation_definition::PresentationDefinition};
use crate::error::{PresentationExchangeError, Result};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use serde_json_path::JsonPath;

/// A DescriptorMapId is a unique identifier for a DescriptorMap.
pub type DescriptorMapId = String;

/// Parse a JSONPath expression used as a descriptor map `path`.
pub fn json_path(expression: &str) -> Result<JsonPath> {
    JsonPath::parse(expression).map_err(|e| {
        PresentationExchangeError::invalid(format!("invalid JSONPath '{expression}': {e}"))
    })
}

/// Presentation Submissions are objects embedded within target
/// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim) negotiation
/// formats that express how the inputs presented as proofs to a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) are
/// provided in accordance with the requirements specified in a [PresentationDefinition].
///
/// Embedded Presentation Submission objects MUST be located within target data format as
/// the value of a `presentation_submission` property.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresentationSubmission {
    id: uuid::Uuid,
    definition_id: String,
    descriptor_map: Vec<DescriptorMap>,
}

impl PresentationSubmission {
    /// The presentation submission MUST contain an id property. The value of this property MUST be a unique identifier, i.e. a UUID.
    ///
    /// The presentation submission object MUST contain a `definition_id` property.
    /// The value of this property MUST be the id value of a valid [PresentationDefinition::id()].
    ///
    /// The object MUST include a `descriptor_map` property. The value of this property MUST be an array of
    /// Input [DescriptorMap] Objects.
    pub fn new(
        id: uuid::Uuid,
        definition_id: impl Into<String>,
        descriptor_map: Vec<DescriptorMap>,
    ) -> Self {
        Self {
            id,
            definition_id: definition_id.into(),
            descriptor_map,
        }
    }

    /// Return the id of the presentation submission.
    pub fn id(&self) -> &uuid::Uuid {
        &self.id
    }

    /// Return the definition id of the presentation submission.
    pub fn definition_id(&self) -> &String {
        &self.definition_id
    }

    /// Return the descriptor map of the presentation submission.
    pub fn descriptor_map(&self) -> &Vec<DescriptorMap> {
        &self.descriptor_map
    }

    /// Consume the submission, returning its descriptor map.
    pub fn into_descriptor_map(self) -> Vec<DescriptorMap> {
        self.descriptor_map
    }

    /// Returns the descriptor map as a mapping of descriptor map id to descriptor map.
    ///
    /// The descriptor map id is expected to match the id of the input descriptor.
    pub fn descriptor_map_by_id(&self) -> HashMap<DescriptorMapId, &DescriptorMap> {
        self.descriptor_map
            .iter()
            .map(|descriptor_map| (descriptor_map.id.clone(), descriptor_map))
            .collect()
    }

    /// Validate the structure of the submission against the definition it answers.
    ///
    /// Every problem found is reported in the additional messages of the returned
    /// [PresentationExchangeError::Validation] error.
    pub fn validate(&self, definition: &PresentationDefinition) -> Result<()> {
        let mut errors = Vec::new();

        if &self.definition_id != definition.id() {
            errors.push(format!(
                "submission answers definition '{}', expected '{}'",
                self.definition_id,
                definition.id()
            ));
        }

        if self.descriptor_map.is_empty() {
            errors.push("descriptor map must not be empty".to_string());
        }

        for descriptor in &self.descriptor_map {
            if definition.input_descriptor(&descriptor.id).is_none() {
                errors.push(format!(
                    "descriptor map entry references unknown input descriptor '{}'",
                    descriptor.id
                ));
            }

            let mut nested = descriptor.path_nested.as_deref();
            while let Some(level) = nested {
                if level.id != descriptor.id {
                    errors.push(format!(
                        "nested descriptor map id '{}' does not match '{}'",
                        level.id, descriptor.id
                    ));
                }
                nested = level.path_nested.as_deref();
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        Err(PresentationExchangeError::Validation {
            message: format!("invalid presentation submission '{}'", self.id),
            additional_messages: errors,
        })
    }
}

impl TryFrom<Json> for PresentationSubmission {
    type Error = anyhow::Error;

    fn try_from(raw: Json) -> Result<Self, Self::Error> {
        serde_json::from_value(raw).map_err(Into::into)
    }
}

/// Descriptor Maps are objects used to describe the information a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) provides to a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier).
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-submission)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DescriptorMap {
    pub id: DescriptorMapId,
    pub format: ClaimFormatDesignation,
    pub path: JsonPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_nested: Option<Box<DescriptorMap>>,
}

impl DescriptorMap {
    /// The descriptor map MUST include an `id` property. The value of this property MUST be a string that matches the `id` property of the input descriptor in the [PresentationDefinition] that this [PresentationSubmission] is related to.
    ///
    /// The descriptor map object MUST include a `format` property. This denotes the data format of the [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim).
    ///
    /// The descriptor map object MUST include a `path` property. The path property indicates the Claim submitted in relation to the identified input descriptor, when executed against the top-level of the object the [PresentationSubmission] is embedded within.
    pub fn new(
        id: impl Into<DescriptorMapId>,
        format: impl Into<ClaimFormatDesignation>,
        path: JsonPath,
    ) -> Self {
        Self {
            id: id.into(),
            format: format.into(),
            path,
            path_nested: None,
        }
    }

    /// Set the nested path of the descriptor map.
    ///
    /// The `id` property MUST be the same for each level of nesting.
    ///
    /// > The path property inside each `path_nested` property provides a relative path within a given nested value.
    ///
    /// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#processing-of-submission-entries](https://identity.foundation/presentation-exchange/spec/v2.0.0/#processing-of-submission-entries)
    pub fn set_path_nested(mut self, mut path_nested: DescriptorMap) -> Self {
        path_nested.id.clone_from(&self.id);

        self.path_nested = Some(Box::new(path_nested));

        self
    }

    /// Replace the top level path, keeping any nested path.
    pub fn set_path(mut self, path: JsonPath) -> Self {
        self.path = path;
        self
    }

    /// Replace the top level format, keeping any nested path.
    pub fn set_format(mut self, format: ClaimFormatDesignation) -> Self {
        self.format = format;
        self
    }
}
