use serde_json::json;

use crate::modal::ModalEngine;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Ok-response carrying the engine's side effects: the drained patch log,
/// queued toasts, and suppressed-error warnings.
pub fn ok_with_effects(id: &str, eng: &mut ModalEngine, mut result: serde_json::Value) -> serde_json::Value {
    if !result.is_object() {
        result = json!({});
    }
    let patches = eng.page.drain_patches();
    let toasts = eng.toasts.drain();
    let warnings = std::mem::take(&mut eng.warnings);
    result["patches"] = serde_json::to_value(patches).unwrap_or_else(|_| json!([]));
    result["toasts"] = serde_json::to_value(toasts).unwrap_or_else(|_| json!([]));
    result["warnings"] = serde_json::to_value(warnings).unwrap_or_else(|_| json!([]));
    ok(id, result)
}
