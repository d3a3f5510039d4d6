use std::collections::BTreeMap;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{AppError, Result};

/// A geolocation fix as supplied by the host geolocation API.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome of a one-shot position request: a fix, or the host's numeric
/// failure code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionOutcome {
    Fix(Coordinates),
    Unavailable { code: u16 },
}

/// Key/value payload submitted to the host's outbound message API. This
/// protocol generation only carries string-valued fields, so coordinates are
/// rendered to their decimal string form before transmission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutboundMessage(BTreeMap<String, String>);

impl OutboundMessage {
    pub fn location(coordinates: &Coordinates) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert("latitude".to_string(), coordinates.latitude.to_string());
        fields.insert("longitude".to_string(), coordinates.longitude.to_string());
        Self(fields)
    }

    pub fn options(fields: BTreeMap<String, String>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Reported by the host once a submitted message has been handed to the
/// device, correlating the submission with its delivery outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeliveryResult {
    pub transaction_id: i64,
    pub delivered: bool,
}

/// Decodes the payload a closed configuration webview hands back: a
/// percent-encoded JSON object. Values are forwarded with no key filtering;
/// non-string scalars keep their JSON rendering.
pub fn parse_configuration_response(raw: &str) -> Result<BTreeMap<String, String>> {
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| AppError::ConfigResponseDecode)?;
    let parsed: Value = serde_json::from_str(&decoded).map_err(AppError::ConfigResponseParse)?;
    let Value::Object(object) = parsed else {
        return Err(AppError::ConfigResponseShape);
    };

    Ok(object
        .into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            (key, rendered)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_payload_has_exactly_latitude_and_longitude() {
        let message = OutboundMessage::location(&Coordinates {
            latitude: 40.67,
            longitude: -73.94,
        });

        let fields = message.fields();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields.get("latitude").map(String::as_str), Some("40.67"));
        assert_eq!(fields.get("longitude").map(String::as_str), Some("-73.94"));
    }

    #[test]
    fn location_payload_serializes_as_a_flat_string_map() {
        let message = OutboundMessage::location(&Coordinates {
            latitude: 40.67,
            longitude: -73.94,
        });

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"latitude": "40.67", "longitude": "-73.94"})
        );
    }

    #[test]
    fn parses_percent_encoded_options() {
        // encodeURIComponent('{"units":"km"}')
        let options = parse_configuration_response("%7B%22units%22%3A%22km%22%7D").unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options.get("units").map(String::as_str), Some("km"));
    }

    #[test]
    fn non_string_option_values_keep_their_json_rendering() {
        let options =
            parse_configuration_response("%7B%22interval%22%3A15%2C%22vibrate%22%3Atrue%7D")
                .unwrap();
        assert_eq!(options.get("interval").map(String::as_str), Some("15"));
        assert_eq!(options.get("vibrate").map(String::as_str), Some("true"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = parse_configuration_response("%7B%22units%22").unwrap_err();
        assert!(matches!(err, AppError::ConfigResponseParse(_)));
    }

    #[test]
    fn non_object_response_is_rejected() {
        let err = parse_configuration_response("%5B1%2C2%5D").unwrap_err();
        assert!(matches!(err, AppError::ConfigResponseShape));
    }
}
