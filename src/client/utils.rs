use std::collections::BTreeMap;

use rtvi_client_types::{RtviMessageOutbound, ServiceConfig, Value};

use crate::client::consts::{CLIENT_VERSION_KEY, LIBRARY_VERSION};
use crate::error::Result;

/// Adds the library version marker to the custom request body.
///
/// Without custom data the marker becomes the whole body. A body that is not
/// an object is returned unchanged.
pub fn with_client_version(request_data: Option<&Value>) -> Value {
    let version = Value::from(LIBRARY_VERSION);
    match request_data {
        None => [(CLIENT_VERSION_KEY, version)].into_iter().collect(),
        Some(data) => {
            let mut data = data.clone();
            if let Err(e) = data.add_property(CLIENT_VERSION_KEY, version) {
                tracing::error!("failed to add {}: {}", CLIENT_VERSION_KEY, e);
            }
            data
        }
    }
}

/// Body of the POST sent to the connect endpoint.
pub fn connect_body(
    request_data: &Value,
    services: &BTreeMap<String, String>,
    config: &[ServiceConfig],
) -> Result<Value> {
    let mut body = request_data.clone();
    body.add_property("services", Value::from_serializable(services)?)?;
    body.add_property("config", Value::from_serializable(config)?)?;
    Ok(body)
}

/// Body of the POST sent to the action endpoint for a single message.
pub fn action_body(request_data: &Value, message: &RtviMessageOutbound) -> Result<Value> {
    let mut body = request_data.clone();
    let actions = Value::Array(vec![Value::from_serializable(message)?]);
    body.add_property("actions", actions)?;
    Ok(body)
}

pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!("{}{}", base_url, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtvi_client_types::ConfigOption;

    #[test]
    fn test_version_marker_is_added() {
        let body = with_client_version(None);
        assert_eq!(
            body.get(CLIENT_VERSION_KEY).and_then(Value::as_str),
            Some(LIBRARY_VERSION)
        );

        let custom: Value = [("room", Value::from("lobby"))].into_iter().collect();
        let body = with_client_version(Some(&custom));
        assert_eq!(body.get("room").and_then(Value::as_str), Some("lobby"));
        assert!(body.get(CLIENT_VERSION_KEY).is_some());

        let body = with_client_version(Some(&Value::from("not an object")));
        assert_eq!(body, Value::from("not an object"));
    }

    #[test]
    fn test_connect_body() {
        let mut services = BTreeMap::new();
        services.insert("llm".to_string(), "together".to_string());
        let config = vec![ServiceConfig::new(
            "llm",
            vec![ConfigOption::new("model", Value::from("llama"))],
        )];

        let body = connect_body(&with_client_version(None), &services, &config).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["rtvi_client_version"], LIBRARY_VERSION);
        assert_eq!(json["services"]["llm"], "together");
        assert_eq!(json["config"][0]["options"][0]["name"], "model");

        assert!(connect_body(&Value::Boolean(true), &services, &config).is_err());
    }

    #[test]
    fn test_action_body_wraps_message() {
        let message = RtviMessageOutbound::with_id("abc", "get-config", None);
        let body = action_body(&with_client_version(None), &message).unwrap();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["actions"][0]["id"], "abc");
        assert_eq!(json["actions"][0]["type"], "get-config");
    }
}
