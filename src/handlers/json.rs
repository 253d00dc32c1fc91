use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use crate::errors::response::ErrorResponse;

/// JSON response for documents that carry BSON types.
///
/// BSON values serialize to extended JSON (`{"$oid": ..}`,
/// `{"$date": {"$numberLong": ..}}`); clients get plain hex ids and
/// RFC 3339 timestamps instead.
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_value(&self.0) {
            Ok(mut value) => {
                flatten_extended_json(&mut value);
                Json(value).into_response()
            }
            Err(e) => {
                tracing::error!("Failed to serialize response: {}", e);
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (
                    status,
                    Json(ErrorResponse {
                        error: status.to_string(),
                        message: "Internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

pub fn flatten_extended_json(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(plain) = extended_scalar(map) {
                *value = plain;
                return;
            }
            map.values_mut().for_each(flatten_extended_json);
        }
        Value::Array(items) => items.iter_mut().for_each(flatten_extended_json),
        _ => {}
    }
}

fn extended_scalar(map: &Map<String, Value>) -> Option<Value> {
    if map.len() != 1 {
        return None;
    }
    if let Some(Value::String(hex)) = map.get("$oid") {
        return Some(Value::String(hex.clone()));
    }

    let millis = match map.get("$date")? {
        Value::String(iso) => return Some(Value::String(iso.clone())),
        Value::Number(n) => n.as_i64()?,
        Value::Object(inner) => inner.get("$numberLong")?.as_str()?.parse().ok()?,
        _ => return None,
    };
    let date = chrono::DateTime::from_timestamp_millis(millis)?;
    Some(Value::String(date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{oid::ObjectId, DateTime};
    use serde_json::json;

    #[derive(Serialize)]
    struct Sample {
        id: ObjectId,
        owner: Option<ObjectId>,
        at: DateTime,
        tags: Vec<ObjectId>,
        name: String,
    }

    #[test]
    fn bson_types_become_plain_strings() {
        let id = ObjectId::parse_str("65f3c1a2b4d5e6f708192a3b").unwrap();
        let sample = Sample {
            id,
            owner: None,
            // 2024-03-15T00:00:00Z
            at: DateTime::from_millis(1_710_460_800_000),
            tags: vec![id],
            name: "syllabus".into(),
        };

        let mut value = serde_json::to_value(&sample).unwrap();
        flatten_extended_json(&mut value);

        assert_eq!(
            value,
            json!({
                "id": "65f3c1a2b4d5e6f708192a3b",
                "owner": null,
                "at": "2024-03-15T00:00:00.000Z",
                "tags": ["65f3c1a2b4d5e6f708192a3b"],
                "name": "syllabus",
            })
        );
    }

    #[test]
    fn ordinary_objects_are_left_alone() {
        let mut value = json!({ "$oid": "abc", "other": 1 });
        flatten_extended_json(&mut value);
        assert_eq!(value, json!({ "$oid": "abc", "other": 1 }));
    }
}
