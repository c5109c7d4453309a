use super::credential_format::*;
use super::input_descriptor::*;
use crate::error::{PresentationExchangeError, Result};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// A presentation definition is a JSON object that describes the information a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// > Presentation Definitions are objects that articulate what proofs a [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires.
/// > These help the [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) to decide how or whether to interact with a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// Presentation Definitions are composed of inputs, which describe the forms and details of the
/// proofs they require, and optional sets of selection rules, to allow [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder)s flexibility
/// in cases where different types of proofs may satisfy an input requirement.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
#[derive(Clone, Default, Debug, Serialize, Deserialize, PartialEq)]
pub struct PresentationDefinition {
    id: String,
    input_descriptors: Vec<InputDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    submission_requirements: Option<Vec<SubmissionRequirement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<ClaimFormatMap>,
}

/// The revision of the Presentation Exchange specification a definition is written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentationExchangeVersion {
    /// Every input descriptor carries a `schema` property.
    V1,
    /// No input descriptor carries a `schema` property.
    V2,
}

impl PresentationDefinition {
    /// The Presentation Definition MUST contain an id property. The value of this property MUST be a string.
    /// The string SHOULD provide a unique ID for the desired context.
    ///
    /// The Presentation Definition MUST contain an input_descriptors property. Its value MUST be an array of Input Descriptor Objects,
    /// the composition of which are found [InputDescriptor] type.
    pub fn new(id: impl Into<String>, input_descriptor: InputDescriptor) -> Self {
        Self {
            id: id.into(),
            input_descriptors: vec![input_descriptor],
            ..Default::default()
        }
    }

    /// Return the id of the presentation definition.
    pub fn id(&self) -> &String {
        &self.id
    }

    /// Add a new input descriptor to the presentation definition.
    pub fn add_input_descriptors(mut self, input_descriptor: InputDescriptor) -> Self {
        self.input_descriptors.push(input_descriptor);
        self
    }

    /// Return the input descriptors of the presentation definition.
    pub fn input_descriptors(&self) -> &Vec<InputDescriptor> {
        &self.input_descriptors
    }

    /// Return the input descriptor with the given id.
    pub fn input_descriptor(&self, id: &str) -> Option<&InputDescriptor> {
        self.input_descriptors.iter().find(|descriptor| descriptor.id() == id)
    }

    /// Return the input descriptors that are members of `group`, in definition order.
    pub fn input_descriptors_in_group(&self, group: &str) -> Vec<&InputDescriptor> {
        self.input_descriptors
            .iter()
            .filter(|descriptor| descriptor.is_member_of(group))
            .collect()
    }

    /// Set the submission requirements of the presentation definition.
    ///
    /// Submission requirements compose input descriptors into `all` or `pick`
    /// rules over groups. Without them every input descriptor is required.
    ///
    /// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements](https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirements)
    pub fn set_submission_requirements(mut self, requirements: Vec<SubmissionRequirement>) -> Self {
        self.submission_requirements = Some(requirements);
        self
    }

    /// Add a submission requirement to the presentation definition.
    pub fn add_submission_requirement(mut self, requirement: SubmissionRequirement) -> Self {
        self.submission_requirements
            .get_or_insert_with(Vec::new)
            .push(requirement);
        self
    }

    /// Return the submission requirements, if any were declared.
    pub fn submission_requirements(&self) -> Option<&[SubmissionRequirement]> {
        self.submission_requirements
            .as_deref()
            .filter(|requirements| !requirements.is_empty())
    }

    /// Set the name of the presentation definition.
    ///
    /// If present, its value SHOULD be a human-friendly string intended to constitute a
    /// distinctive designation of the Presentation Definition.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the name of the presentation definition.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the presentation definition.
    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Return the purpose of the presentation definition.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Attach a format to the presentation definition.
    ///
    /// The properties inform the [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) of the Claim format configurations the [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) can process.
    /// Each value MUST include a format-specific property (i.e., alg, proof_type)
    /// that expresses which algorithms the Verifier supports for the format.
    ///
    /// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#presentation-definition)
    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = Some(format);
        self
    }

    /// Add a new format to the presentation definition.
    pub fn add_format(mut self, format: ClaimFormatDesignation, value: ClaimFormatPayload) -> Self {
        self.format
            .get_or_insert_with(HashMap::new)
            .insert(format, value);
        self
    }

    /// Return the format of the presentation definition.
    pub fn format(&self) -> Option<&ClaimFormatMap> {
        self.format.as_ref()
    }

    /// Return a copy of this definition reduced to the single input descriptor `id`.
    ///
    /// Submission requirements are dropped since they may reference groups
    /// the remaining descriptor is not a member of.
    pub fn restricted_to(&self, id: &str) -> Result<Self> {
        let descriptor = self.input_descriptor(id).ok_or_else(|| {
            PresentationExchangeError::invalid(format!(
                "input descriptor '{id}' not found in presentation definition '{}'",
                self.id
            ))
        })?;

        Ok(Self {
            id: self.id.clone(),
            input_descriptors: vec![descriptor.clone()],
            submission_requirements: None,
            name: self.name.clone(),
            purpose: self.purpose.clone(),
            format: self.format.clone(),
        })
    }

    /// Discover the Presentation Exchange version this definition is written against.
    ///
    /// A definition whose descriptors disagree on the presence of `schema` cannot be
    /// attributed to either version and is rejected.
    pub fn version(&self) -> Result<PresentationExchangeVersion> {
        let with_schema = self
            .input_descriptors
            .iter()
            .filter(|descriptor| !descriptor.schema().is_empty())
            .count();

        match with_schema {
            0 => Ok(PresentationExchangeVersion::V2),
            n if n == self.input_descriptors.len() => Ok(PresentationExchangeVersion::V1),
            _ => Err(PresentationExchangeError::invalid(format!(
                "unsupported presentation exchange version: presentation definition '{}' mixes v1 and v2 input descriptors",
                self.id
            ))),
        }
    }

    /// Validate the structure of the presentation definition.
    ///
    /// All problems are collected and returned together as the additional messages of a
    /// [PresentationExchangeError::Validation] error.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.id.is_empty() {
            errors.push("presentation definition id must not be empty".to_string());
        }

        if self.input_descriptors.is_empty() {
            errors.push("presentation definition must contain at least one input descriptor".into());
        }

        let mut ids = HashSet::new();
        for descriptor in &self.input_descriptors {
            if !ids.insert(descriptor.id()) {
                errors.push(format!("duplicate input descriptor id '{}'", descriptor.id()));
            }
            errors.extend(descriptor.validation_errors());
        }

        let groups: HashSet<&str> = self
            .input_descriptors
            .iter()
            .flat_map(|descriptor| descriptor.groups().iter().map(String::as_str))
            .collect();

        for requirement in self.submission_requirements().unwrap_or_default() {
            if requirement.from_nested().is_some() {
                errors.push("submission requirements with 'from_nested' are not supported".into());
            }
            match requirement.from() {
                None => errors.push("submission requirement is missing 'from'".into()),
                Some(from) if !groups.contains(from.as_str()) => errors.push(format!(
                    "submission requirement references unknown group '{from}'"
                )),
                Some(_) => {}
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        tracing::debug!(
            "presentation definition '{}' failed validation: {errors:?}",
            self.id
        );

        Err(PresentationExchangeError::Validation {
            message: format!("invalid presentation definition '{}'", self.id),
            additional_messages: errors,
        })
    }
}

/// The rule of a submission requirement.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionRequirementRule {
    /// Every input descriptor of the group must be submitted.
    All,
    /// A number of the group's input descriptors, bounded by `count`, `min` and `max`, must be submitted.
    Pick,
}

/// A submission requirement composes the input descriptors of a group into a
/// higher level `all` or `pick` rule.
///
/// Nested requirements (`from_nested`) deserialize but are rejected during resolution.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirement-feature](https://identity.foundation/presentation-exchange/spec/v2.0.0/#submission-requirement-feature)
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SubmissionRequirement {
    rule: SubmissionRequirementRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from: Option<GroupId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    from_nested: Option<Vec<SubmissionRequirement>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    min: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
}

impl SubmissionRequirement {
    /// Create an `all` requirement over the given group.
    pub fn all(from: impl Into<GroupId>) -> Self {
        Self::new(SubmissionRequirementRule::All, from)
    }

    /// Create a `pick` requirement over the given group.
    pub fn pick(from: impl Into<GroupId>) -> Self {
        Self::new(SubmissionRequirementRule::Pick, from)
    }

    fn new(rule: SubmissionRequirementRule, from: impl Into<GroupId>) -> Self {
        Self {
            rule,
            from: Some(from.into()),
            from_nested: None,
            count: None,
            min: None,
            max: None,
            name: None,
            purpose: None,
        }
    }

    pub fn rule(&self) -> SubmissionRequirementRule {
        self.rule
    }

    pub fn from(&self) -> Option<&GroupId> {
        self.from.as_ref()
    }

    pub fn from_nested(&self) -> Option<&[SubmissionRequirement]> {
        self.from_nested.as_deref()
    }

    pub fn set_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn set_min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    pub fn min(&self) -> Option<usize> {
        self.min
    }

    pub fn set_max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn max(&self) -> Option<usize> {
        self.max
    }

    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> PresentationDefinition {
        let text = value.to_string();
        let deserializer = &mut serde_json::Deserializer::from_str(&text);
        serde_path_to_error::deserialize(deserializer).expect("failed to parse definition")
    }

    #[test]
    fn test_submission_requirements_deserialization() {
        let definition = parse(json!({
            "id": "32f54163-7166-48f1-93d8-ff217bdb0653",
            "submission_requirements": [
                { "name": "Citizenship", "rule": "pick", "count": 1, "from": "A" },
                { "rule": "all", "from": "B" }
            ],
            "input_descriptors": [
                { "id": "passport", "group": ["A"], "constraints": {} },
                { "id": "id_card", "group": ["A"], "constraints": {} },
                { "id": "utility_bill", "group": ["B"], "constraints": {} }
            ]
        }));

        let requirements = definition.submission_requirements().unwrap();
        assert_eq!(requirements[0].rule(), SubmissionRequirementRule::Pick);
        assert_eq!(requirements[0].count(), Some(1));
        assert_eq!(requirements[0].name().map(String::as_str), Some("Citizenship"));
        assert_eq!(requirements[1].rule(), SubmissionRequirementRule::All);
        assert_eq!(definition.input_descriptors_in_group("A").len(), 2);
        assert!(definition.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let definition = parse(json!({
            "id": "broken",
            "submission_requirements": [
                { "rule": "pick", "from_nested": [{ "rule": "all", "from": "A" }] },
                { "rule": "all", "from": "Z" }
            ],
            "input_descriptors": [
                { "id": "dup", "group": ["A"] },
                { "id": "dup" }
            ]
        }));

        let err = definition.validate().unwrap_err();
        let messages = err.additional_messages();
        assert_eq!(messages.len(), 4, "{messages:?}");
        assert!(messages.iter().any(|m| m.contains("from_nested")));
        assert!(messages.iter().any(|m| m.contains("missing 'from'")));
        assert!(messages.iter().any(|m| m.contains("unknown group 'Z'")));
        assert!(messages.iter().any(|m| m.contains("duplicate")));
    }

    #[test]
    fn test_version_discovery() {
        let v1 = parse(json!({
            "id": "v1",
            "input_descriptors": [
                { "id": "a", "schema": [{ "uri": "https://www.w3.org/2018/credentials#VerifiableCredential" }] }
            ]
        }));
        assert_eq!(v1.version().unwrap(), PresentationExchangeVersion::V1);

        let v2 = parse(json!({ "id": "v2", "input_descriptors": [{ "id": "a" }] }));
        assert_eq!(v2.version().unwrap(), PresentationExchangeVersion::V2);

        let mixed = parse(json!({
            "id": "mixed",
            "input_descriptors": [
                { "id": "a", "schema": [{ "uri": "https://example.com/a" }] },
                { "id": "b" }
            ]
        }));
        assert!(matches!(
            mixed.version(),
            Err(PresentationExchangeError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_restricted_to_single_descriptor() {
        let definition = PresentationDefinition::new(
            "def",
            InputDescriptor::new("a", Default::default()).add_to_group("A"),
        )
        .add_input_descriptors(InputDescriptor::new("b", Default::default()).add_to_group("A"))
        .add_submission_requirement(SubmissionRequirement::all("A"));

        let restricted = definition.restricted_to("b").unwrap();
        assert_eq!(restricted.input_descriptors().len(), 1);
        assert_eq!(restricted.input_descriptors()[0].id(), "b");
        assert!(restricted.submission_requirements().is_none());
        assert!(definition.restricted_to("c").is_err());
    }
}
