use crate::ParseError;
use crate::record::LastOperation;
use crate::tags::TagDelta;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};

/// Prefix of identities synthesised for resources which don't have one yet.
pub const PHYSICAL_ID_PREFIX: &str = "loader-";

/// The lifecycle transition requested by the provisioning platform.
///
/// Unknown values are kept rather than rejected while deserializing,
/// so that they can be answered with an explicit failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RequestType {
    Create,
    Update,
    Delete,
    Other(String),
}

impl RequestType {
    pub fn as_str(&self) -> &str {
        match self {
            RequestType::Create => "Create",
            RequestType::Update => "Update",
            RequestType::Delete => "Delete",
            RequestType::Other(other) => other.as_str(),
        }
    }

    /// The record label written by this transition, if it is supported.
    pub fn last_operation(&self) -> Option<LastOperation> {
        match self {
            RequestType::Create => Some(LastOperation::Create),
            RequestType::Update => Some(LastOperation::Update),
            RequestType::Delete => Some(LastOperation::Delete),
            RequestType::Other(_) => None,
        }
    }
}

impl From<String> for RequestType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Create" => RequestType::Create,
            "Update" => RequestType::Update,
            "Delete" => RequestType::Delete,
            _ => RequestType::Other(value),
        }
    }
}

impl From<RequestType> for String {
    fn from(value: RequestType) -> Self {
        match value {
            RequestType::Other(other) => other,
            supported => supported.as_str().to_string(),
        }
    }
}

impl Display for RequestType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties of the managed resource as declared by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceProperties {
    /// Table the mutation records are written to.
    #[serde(rename = "DDBTable", default, skip_serializing_if = "Option::is_none")]
    pub ddb_table: Option<String>,
    /// JSON encoded `{pk, sk, ts}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Single-use endpoint receiving the terminal response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    /// JSON encoded array of `{key, value}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Value>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// Domain payload carried in `ResourceProperties.Data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationData {
    pub pk: String,
    pub sk: String,
    pub ts: String,
}

impl MutationData {
    pub fn parse(value: &Value) -> Result<Self, ParseError> {
        decode_nested("Data", value)
    }
}

/// A lifecycle event as received from the provisioning platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LifecycleEvent {
    pub request_type: RequestType,
    #[serde(default)]
    pub resource_properties: ResourceProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_resource_properties: Option<ResourceProperties>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,
    /// Acknowledgment endpoint of the custom resource protocol.
    #[serde(rename = "ResponseURL", default, skip_serializing_if = "Option::is_none")]
    pub response_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_resource_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_token: Option<String>,
}

/// The fields needed to acknowledge an event, read one by one so that they
/// survive a payload which doesn't parse as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventIdentity {
    pub response_url: Option<String>,
    pub physical_resource_id: Option<String>,
    pub stack_id: Option<String>,
    pub request_id: Option<String>,
    pub logical_resource_id: Option<String>,
}

impl EventIdentity {
    pub fn from_value(value: &Value) -> Self {
        let text = |field: &str| value.get(field).and_then(Value::as_str).map(str::to_string);

        EventIdentity {
            response_url: text("ResponseURL"),
            physical_resource_id: text("PhysicalResourceId"),
            stack_id: text("StackId"),
            request_id: text("RequestId"),
            logical_resource_id: text("LogicalResourceId"),
        }
    }
}

impl From<&LifecycleEvent> for EventIdentity {
    fn from(event: &LifecycleEvent) -> Self {
        EventIdentity {
            response_url: event.response_url.clone(),
            physical_resource_id: event.physical_resource_id.clone(),
            stack_id: event.stack_id.clone(),
            request_id: event.request_id.clone(),
            logical_resource_id: event.logical_resource_id.clone(),
        }
    }
}

impl LifecycleEvent {
    /// Parse a raw payload as received by the entry point.
    pub fn parse(value: Value) -> Result<Self, ParseError> {
        serde_json::from_value(value).map_err(ParseError::InvalidEvent)
    }

    /// Stable identity of the resource.
    ///
    /// Passes through the platform supplied id, otherwise derives one from the
    /// target table so that repeated creates resolve to the same identity.
    pub fn physical_resource_id(&self) -> Option<String> {
        if let Some(id) = &self.physical_resource_id {
            return Some(id.clone());
        }

        self.resource_properties
            .ddb_table
            .as_deref()
            .map(|table| format!("{PHYSICAL_ID_PREFIX}{table}"))
    }

    pub fn target_table(&self) -> Result<&str, ParseError> {
        non_empty(self.resource_properties.ddb_table.as_deref())
            .ok_or(ParseError::MissingProperty("DDBTable"))
    }

    pub fn callback_url(&self) -> Result<&str, ParseError> {
        non_empty(self.resource_properties.callback_url.as_deref())
            .ok_or(ParseError::MissingProperty("CallbackUrl"))
    }

    pub fn mutation_data(&self) -> Result<MutationData, ParseError> {
        let data: &Value = self
            .resource_properties
            .data
            .as_ref()
            .ok_or(ParseError::MissingProperty("Data"))?;

        MutationData::parse(data)
    }

    /// Tags to add and remove, when the resource is tag-bearing.
    pub fn tag_delta(&self) -> Result<Option<TagDelta>, ParseError> {
        TagDelta::from_event(self)
    }

    /// Checks everything needed to run the workflow, failing on the first problem.
    pub fn validate(&self) -> Result<LastOperation, ParseError> {
        let operation: LastOperation = self
            .request_type
            .last_operation()
            .ok_or_else(|| ParseError::UnsupportedRequestType(self.request_type.to_string()))?;

        self.callback_url()?;
        self.target_table()?;
        self.mutation_data()?;
        self.tag_delta()?;

        Ok(operation)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}

/// Decode a property which is either a JSON document encoded as a string,
/// or was already supplied as structured JSON.
pub(crate) fn decode_nested<T: DeserializeOwned>(
    property: &'static str,
    value: &Value,
) -> Result<T, ParseError> {
    let decoded = match value {
        Value::String(encoded) => serde_json::from_str(encoded),
        structured => serde_json::from_value(structured.clone()),
    };

    decoded.map_err(|source| ParseError::InvalidJson { property, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_event() -> LifecycleEvent {
        serde_json::from_value(json!({
            "RequestType": "Create",
            "ResponseURL": "https://provider.example/ack",
            "StackId": "stack-1",
            "RequestId": "request-1",
            "LogicalResourceId": "Loader",
            "ResourceProperties": {
                "ServiceToken": "arn:aws:lambda:eu-west-1:123:function:dispatch",
                "DDBTable": "T",
                "CallbackUrl": "https://callback.example/wait",
                "Data": "{\"pk\":\"p1\",\"sk\":\"s1\",\"ts\":\"100\"}"
            }
        }))
        .expect("Event should deserialize")
    }

    #[test]
    fn event_deserializes_platform_shape() {
        let event: LifecycleEvent = create_event();

        assert_eq!(RequestType::Create, event.request_type);
        assert_eq!(Some("T"), event.target_table().ok());
        assert_eq!(
            Some("https://callback.example/wait"),
            event.callback_url().ok()
        );
        assert_eq!(Some("https://provider.example/ack"), event.response_url.as_deref());
        // Unknown properties are kept
        assert!(event.resource_properties.other.contains_key("ServiceToken"));
    }

    #[test]
    fn physical_resource_id_is_derived_from_table() {
        let event: LifecycleEvent = create_event();

        assert_eq!(Some("loader-T".to_string()), event.physical_resource_id());
    }

    #[test]
    fn physical_resource_id_passes_through() {
        let mut event: LifecycleEvent = create_event();
        event.physical_resource_id = Some("existing".to_string());

        assert_eq!(Some("existing".to_string()), event.physical_resource_id());
    }

    #[test]
    fn mutation_data_is_decoded_from_nested_json() {
        let data: MutationData = create_event().mutation_data().expect("Data should parse");

        assert_eq!(
            MutationData {
                pk: "p1".to_string(),
                sk: "s1".to_string(),
                ts: "100".to_string(),
            },
            data
        );
    }

    #[test]
    fn mutation_data_accepts_structured_json() {
        let data = MutationData::parse(&json!({"pk": "a", "sk": "b", "ts": "1"}))
            .expect("Structured data should parse");

        assert_eq!("a", data.pk);
    }

    #[test]
    fn malformed_data_is_rejected() {
        let mut event: LifecycleEvent = create_event();
        event.resource_properties.data = Some(json!("{not json"));

        let result = event.validate();

        assert!(matches!(
            result,
            Err(ParseError::InvalidJson {
                property: "Data",
                ..
            })
        ));
    }

    #[test]
    fn unknown_request_type_is_kept_and_rejected_on_validation() {
        let mut value = serde_json::to_value(create_event()).expect("Event should serialize");
        value["RequestType"] = json!("Bogus");

        let event: LifecycleEvent = serde_json::from_value(value).expect("Event should parse");

        assert_eq!(RequestType::Other("Bogus".to_string()), event.request_type);
        assert!(matches!(
            event.validate(),
            Err(ParseError::UnsupportedRequestType(request_type)) if request_type == "Bogus"
        ));
    }

    #[test]
    fn wrongly_typed_property_fails_parse_but_keeps_identity() {
        let value: Value = json!({
            "RequestType": "Create",
            "ResponseURL": "https://provider.example/ack",
            "StackId": "stack-1",
            "RequestId": "request-1",
            "LogicalResourceId": "Loader",
            "ResourceProperties": {"DDBTable": ["T"]}
        });

        let identity: EventIdentity = EventIdentity::from_value(&value);

        assert!(matches!(
            LifecycleEvent::parse(value),
            Err(ParseError::InvalidEvent(_))
        ));
        assert_eq!(
            Some("https://provider.example/ack"),
            identity.response_url.as_deref()
        );
        assert_eq!(Some("request-1"), identity.request_id.as_deref());
        assert_eq!(None, identity.physical_resource_id);
    }

    #[test]
    fn missing_callback_url_is_rejected() {
        let mut event: LifecycleEvent = create_event();
        event.resource_properties.callback_url = Some("  ".to_string());

        assert!(matches!(
            event.validate(),
            Err(ParseError::MissingProperty("CallbackUrl"))
        ));
    }
}
