use crate::ipc::error::err;
use crate::ipc::types::Request;

/// Trimmed, non-empty string param (ids and keys).
pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// String param taken verbatim; may be empty but must be present.
pub fn raw_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn entry_id(req: &Request) -> Result<String, serde_json::Value> {
    required_str(req, "entryId")
}
