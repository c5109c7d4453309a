use std::collections::HashSet;

use super::credential_format::*;
use crate::utils::NonEmptyVec;

use serde::{Deserialize, Serialize};

/// A GroupId represents a unique identifier for a group of Input Descriptors.
///
/// This type is also used by the submission requirements to group input descriptors.
pub type GroupId = String;

/// A JSONPath is a string that represents a path to a specific value within a JSON object.
///
/// For syntax details, see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition](https://identity.foundation/presentation-exchange/spec/v2.0.0/#jsonpath-syntax-definition)
pub type JsonPath = String;

/// The predicate Feature introduces properties enabling Verifier to request that Holder apply a predicate and return the result.
///
/// The value of predicate **MUST** be one of the following strings: `required` or `preferred`.
///
/// See: [https://identity.foundation/presentation-exchange/#predicate-feature](https://identity.foundation/presentation-exchange/#predicate-feature)
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum Predicate {
    /// The returned value **MUST** be the boolean result of applying the filter
    /// to the result of evaluating the path property.
    #[serde(rename = "required")]
    Required,
    /// The returned value **SHOULD** be the boolean result of applying the filter
    /// to the result of evaluating the path property.
    #[serde(rename = "preferred")]
    Preferred,
}

/// A Presentation Exchange v1 `schema` entry.
///
/// Version 1 of the specification identifies credentials through schema uris
/// (a credential type, an expanded type or a JSON-LD context). Version 2 dropped
/// the property in favor of `constraints` alone.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Schema {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Input Descriptors are objects used to describe the information a
/// [Verifier](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:verifier) requires of a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder).
///
/// All Input Descriptors MUST be satisfied, unless otherwise specified by a
/// [Feature](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:feature)
/// or a submission requirement.
///
/// See: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct InputDescriptor {
    id: String,
    #[serde(default)]
    constraints: Constraints,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(default, skip_serializing_if = "ClaimFormatMap::is_empty")]
    format: ClaimFormatMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    group: Vec<GroupId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    schema: Vec<Schema>,
}

impl InputDescriptor {
    /// Create a new instance of the input descriptor with the given id and constraints.
    ///
    /// The value of the id property MUST be a string that does not conflict with the id of another
    /// Input Descriptor Object in the same Presentation Definition. For mdoc requests the id is
    /// the requested document type, e.g. `org.iso.18013.5.1.mDL`.
    pub fn new(id: impl Into<String>, constraints: Constraints) -> Self {
        Self {
            id: id.into(),
            constraints,
            ..Default::default()
        }
    }

    /// Return the id of the input descriptor.
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Return the constraints of the input descriptor.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Set the name of the input descriptor.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the name of the input descriptor.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the purpose of the input descriptor.
    ///
    /// If present, the purpose MUST be a string that describes the purpose for which the
    /// [Claim](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:claim)'s
    /// data is being requested.
    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Return the purpose of the input descriptor.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the format of the input descriptor.
    ///
    /// This format property is identical in value signature to the top-level format object,
    /// but can be used to specifically constrain submission of a single input to a subset of formats or algorithms.
    pub fn set_format(mut self, format: ClaimFormatMap) -> Self {
        self.format = format;
        self
    }

    /// Return the format of the input descriptor.
    pub fn format(&self) -> &ClaimFormatMap {
        &self.format
    }

    /// Return the format designations of the input descriptor as a hash set.
    pub fn format_designations(&self) -> HashSet<&ClaimFormatDesignation> {
        self.format.keys().collect()
    }

    /// Set the group of the input descriptor.
    pub fn set_group(mut self, group: Vec<GroupId>) -> Self {
        self.group = group;
        self
    }

    /// Return the groups the input descriptor is a member of.
    pub fn groups(&self) -> &Vec<GroupId> {
        self.group.as_ref()
    }

    /// Add the input descriptor to a group.
    pub fn add_to_group(mut self, member: impl Into<GroupId>) -> Self {
        self.group.push(member.into());
        self
    }

    /// Whether the input descriptor is a member of the given group.
    pub fn is_member_of(&self, group: &str) -> bool {
        self.group.iter().any(|g| g == group)
    }

    /// Set the v1 schema entries of the input descriptor.
    pub fn set_schema(mut self, schema: Vec<Schema>) -> Self {
        self.schema = schema;
        self
    }

    /// Return the v1 schema entries of the input descriptor.
    pub fn schema(&self) -> &[Schema] {
        &self.schema
    }

    /// Return the structural problems of this input descriptor, if any.
    pub(crate) fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.id.is_empty() {
            errors.push("input descriptor id must not be empty".to_string());
        }

        for field in self.constraints.fields() {
            if field.predicate().is_some() && field.filter().is_none() {
                errors.push(format!(
                    "input descriptor '{}': a field with a predicate must have a filter",
                    self.id
                ));
            }
        }

        errors
    }
}

/// Constraints are objects used to describe the constraints that a [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder) must satisfy to fulfill an Input Descriptor.
///
/// A constraint object MAY be empty, or it may include a `fields` and/or `limit_disclosure` property.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    fields: Vec<ConstraintsField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit_disclosure: Option<ConstraintsLimitDisclosure>,
}

impl Constraints {
    /// Returns an empty Constraints object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new field constraint to the constraints list.
    pub fn add_constraint(mut self, field: ConstraintsField) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the fields of the constraints object.
    pub fn fields(&self) -> &Vec<ConstraintsField> {
        self.fields.as_ref()
    }

    /// Set the limit disclosure value.
    ///
    /// For all Claims submitted in relation to [InputDescriptor] Objects that include a `constraints`
    /// object with a `limit_disclosure` property set to the string value `required`,
    /// ensure that the data submitted is limited to the entries specified in the `fields` property of the `constraints` object.
    ///
    /// For more information: see [https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions](https://identity.foundation/presentation-exchange/spec/v2.0.0/#limited-disclosure-submissions)
    pub fn set_limit_disclosure(mut self, limit_disclosure: ConstraintsLimitDisclosure) -> Self {
        self.limit_disclosure = Some(limit_disclosure);
        self
    }

    /// Returns the limit disclosure value.
    pub fn limit_disclosure(&self) -> Option<&ConstraintsLimitDisclosure> {
        self.limit_disclosure.as_ref()
    }

    /// Returns if the constraints fields contain non-optional
    /// fields that must be satisfied.
    pub fn is_required(&self) -> bool {
        self.fields.iter().any(|field| field.is_required())
    }
}

/// ConstraintsField objects are used to describe the constraints that a
/// [Holder](https://identity.foundation/presentation-exchange/spec/v2.0.0/#term:holder)
/// must satisfy to fulfill an Input Descriptor.
///
/// For more information, see: [https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object](https://identity.foundation/presentation-exchange/spec/v2.0.0/#input-descriptor-object)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConstraintsField {
    path: NonEmptyVec<JsonPath>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    purpose: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    predicate: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intent_to_retain: Option<bool>,
}

impl From<NonEmptyVec<JsonPath>> for ConstraintsField {
    fn from(path: NonEmptyVec<JsonPath>) -> Self {
        Self {
            path,
            id: None,
            purpose: None,
            name: None,
            predicate: None,
            filter: None,
            optional: None,
            intent_to_retain: None,
        }
    }
}

impl ConstraintsField {
    /// Create a new instance of the constraints field with the given path.
    ///
    /// Constraint fields must have at least one JSONPath to the field for which the constraint is applied.
    pub fn new(path: impl Into<JsonPath>) -> ConstraintsField {
        NonEmptyVec::new(path.into()).into()
    }

    /// Add a new path to the constraints field.
    pub fn add_path(mut self, path: impl Into<JsonPath>) -> Self {
        self.path.push(path.into());
        self
    }

    /// Return the paths of the constraints field.
    ///
    /// `path` is a non empty list of [JsonPath](https://goessner.net/articles/JsonPath/) expressions.
    pub fn path(&self) -> &NonEmptyVec<JsonPath> {
        &self.path
    }

    /// Set the id of the constraints field.
    pub fn set_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Return the id of the constraints field.
    pub fn id(&self) -> Option<&String> {
        self.id.as_ref()
    }

    /// Set the purpose of the constraints field.
    pub fn set_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = Some(purpose.into());
        self
    }

    /// Return the purpose of the constraints field.
    pub fn purpose(&self) -> Option<&String> {
        self.purpose.as_ref()
    }

    /// Set the name of the constraints field.
    pub fn set_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Return the name of the constraints field.
    pub fn name(&self) -> Option<&String> {
        self.name.as_ref()
    }

    /// Set the filter of the constraints field.
    ///
    /// If present its value MUST be a JSON Schema descriptor used to filter against
    /// the values returned from evaluation of the JSONPath string expressions in the path array.
    /// Filters are evaluated by the injected credential selector, never by this crate.
    pub fn set_filter(mut self, filter: serde_json::Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Return the raw filter of the constraints field.
    pub fn filter(&self) -> Option<&serde_json::Value> {
        self.filter.as_ref()
    }

    /// Set the predicate of the constraints field.
    ///
    /// If the predicate property is present, the filter property **MUST** also be present.
    pub fn set_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Return the predicate of the constraints field.
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Set the optional value of the constraints field.
    ///
    /// The value of this property MUST be a boolean, wherein true indicates the
    /// field is optional, and false or non-presence of the property indicates the
    /// field is required.
    pub fn set_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Return the optional value of the constraints field.
    pub fn is_optional(&self) -> bool {
        self.optional.unwrap_or(false)
    }

    /// Inverse alias for `!is_optional()`.
    pub fn is_required(&self) -> bool {
        !self.is_optional()
    }

    /// Set the intent to retain the constraints field.
    ///
    /// This value indicates the verifier's intent to retain the
    /// field in the presentation, storing the value in the verifier's system.
    pub fn set_retained(mut self, intent_to_retain: bool) -> Self {
        self.intent_to_retain = Some(intent_to_retain);
        self
    }

    /// Return the intent to retain the constraints field.
    pub fn intent_to_retain(&self) -> bool {
        self.intent_to_retain.unwrap_or(false)
    }

    /// Return the mdoc `(namespace, element identifier)` pair addressed by this field.
    ///
    /// mdoc requests address data elements as `$['<namespace>']['<element>']`, e.g.
    /// `$['org.iso.18013.5.1']['family_name']`. The first path of that shape is used.
    pub fn mdoc_element(&self) -> Option<(String, String)> {
        self.path.iter().find_map(|path| parse_mdoc_path(path))
    }
}

fn parse_mdoc_path(path: &str) -> Option<(String, String)> {
    let rest = path.strip_prefix('$')?;
    let mut segments = Vec::with_capacity(2);
    let mut rest = rest;

    while !rest.is_empty() {
        let inner = rest.strip_prefix("['")?;
        let end = inner.find("']")?;
        segments.push(inner[..end].to_string());
        rest = &inner[end + 2..];
    }

    match <[String; 2]>::try_from(segments) {
        Ok([namespace, element]) => Some((namespace, element)),
        Err(_) => None,
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintsLimitDisclosure {
    Required,
    Preferred,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mdoc_element_path() {
        let field = ConstraintsField::new("$['org.iso.18013.5.1']['family_name']");
        assert_eq!(
            field.mdoc_element(),
            Some(("org.iso.18013.5.1".into(), "family_name".into()))
        );

        let field = ConstraintsField::new("$.credentialSubject.family_name")
            .add_path("$['org.iso.18013.5.1']['age_over_18']");
        assert_eq!(
            field.mdoc_element(),
            Some(("org.iso.18013.5.1".into(), "age_over_18".into()))
        );

        assert_eq!(ConstraintsField::new("$['only_one']").mdoc_element(), None);
        assert_eq!(
            ConstraintsField::new("$['a']['b']['c']").mdoc_element(),
            None
        );
    }

    #[test]
    fn test_input_descriptor_deserialization() {
        let descriptor: InputDescriptor = serde_json::from_value(json!({
            "id": "org.iso.18013.5.1.mDL",
            "group": ["A"],
            "format": { "mso_mdoc": { "alg": ["ES256"] } },
            "constraints": {
                "limit_disclosure": "required",
                "fields": [
                    {
                        "path": ["$['org.iso.18013.5.1']['given_name']"],
                        "intent_to_retain": false
                    },
                    {
                        "path": ["$['org.iso.18013.5.1']['portrait']"],
                        "optional": true
                    }
                ]
            }
        }))
        .unwrap();

        assert!(descriptor.is_member_of("A"));
        assert!(!descriptor.is_member_of("B"));
        assert_eq!(
            descriptor.constraints().limit_disclosure(),
            Some(&ConstraintsLimitDisclosure::Required)
        );
        assert!(descriptor.constraints().fields()[0].is_required());
        assert!(descriptor.constraints().fields()[1].is_optional());
        assert!(descriptor
            .format_designations()
            .contains(&ClaimFormatDesignation::MsoMDoc));
        assert!(descriptor.schema().is_empty());
    }

    #[test]
    fn test_predicate_without_filter_is_reported() {
        let descriptor = InputDescriptor::new(
            "over_18",
            Constraints::new().add_constraint(
                ConstraintsField::new("$.credentialSubject.age").set_predicate(Predicate::Required),
            ),
        );
        assert_eq!(descriptor.validation_errors().len(), 1);
    }
}
