use serde_json::json;

use crate::grid;
use crate::ipc::error::{err, ok_with_effects};
use crate::ipc::types::{AppState, Request};

/// Replay the last attendance load triple, as wired to the Retry control.
fn handle_attendance_retry(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(api) = state.api.as_deref() else {
        return err(&req.id, "no_backend", "install a backend first", None);
    };
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    grid::retry(eng, api);
    ok_with_effects(&req.id, eng, json!({}))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.retry" => Some(handle_attendance_retry(state, req)),
        _ => None,
    }
}
