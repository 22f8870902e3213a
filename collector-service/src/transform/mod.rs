use energy_client::domain::{EnergyRecord, RequestMonth};
use serde_json::Value;

use crate::sources::energy_api::ApiResponse;

/// Result code of a normal response.
pub const RESULT_CODE_OK: &str = "00";
/// Older deployments of the service report success as `1`. Both are accepted
/// as they are; nothing else is read into the difference.
pub const RESULT_CODE_LEGACY_OK: &str = "1";

/// Markers of the gateway's daily-quota rejection, which arrives as XML.
pub const QUOTA_EXCEEDED_MARKER: &str = "LIMITED_NUMBER_OF_SERVICE_REQUESTS_EXCEEDS_ERROR";
pub const QUOTA_REASON_MARKER: &str = "returnReasonCode>22<";

/// How one monthly API response is handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Readings for the month.
    Success(EnergyRecord),
    /// Well-formed API-level error (e.g. no data for the month).
    SoftFailure {
        result_code: String,
        result_msg: Option<String>,
        body: Option<Value>,
    },
    /// The daily request quota of the service key is used up.
    QuotaExhausted,
    /// Anything else that does not have the expected shape.
    Structural(String),
}

impl Classification {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Classification::Success(_) => "success",
            Classification::SoftFailure { .. } => "soft_failure",
            Classification::QuotaExhausted => "quota_exhausted",
            Classification::Structural(_) => "structural",
        }
    }
}

/// Classify the response for `kapt_code` / `month`.
///
/// Rules:
/// - JSON with `response.header.resultCode` of `00` or `1` is a success; the
///   `response.body.item` object, tagged with the month, is the record.
/// - JSON with any other result code is a soft failure.
/// - Non-JSON text carrying both quota markers is quota exhaustion.
/// - Everything else, including a success code without an item object, is
///   structural.
pub fn classify_response(kapt_code: &str, month: RequestMonth, response: ApiResponse) -> Classification {
    match response {
        ApiResponse::Json(value) => classify_json(kapt_code, month, value),
        ApiResponse::Text(text) => {
            if text.contains(QUOTA_EXCEEDED_MARKER) && text.contains(QUOTA_REASON_MARKER) {
                Classification::QuotaExhausted
            } else {
                Classification::Structural(format!("non-JSON response: {}", excerpt(&text)))
            }
        }
    }
}

fn classify_json(kapt_code: &str, month: RequestMonth, mut value: Value) -> Classification {
    let Some(response) = value.get_mut("response") else {
        return Classification::Structural("missing 'response' object".to_string());
    };

    let header = match response.get("header") {
        Some(Value::Object(header)) => header,
        _ => return Classification::Structural("missing 'response.header' object".to_string()),
    };

    let result_code = match header.get("resultCode") {
        Some(Value::String(code)) => code.trim().to_string(),
        Some(Value::Number(code)) => code.to_string(),
        _ => return Classification::Structural("missing 'response.header.resultCode'".to_string()),
    };
    let result_msg = header.get("resultMsg").and_then(Value::as_str).map(str::to_string);

    if result_code != RESULT_CODE_OK && result_code != RESULT_CODE_LEGACY_OK {
        return Classification::SoftFailure {
            result_code,
            result_msg,
            body: response.get("body").cloned(),
        };
    }

    match response.pointer_mut("/body/item").map(Value::take) {
        Some(Value::Object(fields)) => Classification::Success(EnergyRecord::new(kapt_code, month, fields)),
        Some(other) => Classification::Structural(format!(
            "result code {result_code} with non-object 'response.body.item': {}",
            excerpt(&other.to_string())
        )),
        None => Classification::Structural(format!("result code {result_code} without 'response.body.item'")),
    }
}

fn excerpt(text: &str) -> String {
    const MAX_CHARS: usize = 200;
    let mut out: String = text.chars().take(MAX_CHARS).collect();
    if text.chars().count() > MAX_CHARS {
        out.push_str("...");
    }
    out
}
