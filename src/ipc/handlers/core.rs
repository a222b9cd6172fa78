use serde_json::json;

use crate::api::StubApiClient;
use crate::dom::PageContract;
use crate::ipc::error::{err, ok, ok_with_effects};
use crate::ipc::types::{AppState, Request};
use crate::modal::ModalEngine;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "pageInitialised": state.engine.is_some(),
            "backend": state.backend_label,
        }),
    )
}

fn handle_backend_http(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(base_url) = req.params.get("baseUrl").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.baseUrl", None);
    };
    match state.install_http_backend(base_url) {
        Ok(()) => ok(&req.id, json!({ "backend": "http" })),
        Err(e) => err(&req.id, "backend_failed", e.to_string(), None),
    }
}

fn handle_backend_stub(state: &mut AppState, req: &Request) -> serde_json::Value {
    let routes = req.params.get("routes").cloned().unwrap_or_else(|| json!({}));
    match StubApiClient::from_routes(&routes) {
        Ok(stub) => {
            state.api = Some(Box::new(stub));
            state.backend_label = Some("stub");
            ok(&req.id, json!({ "backend": "stub" }))
        }
        Err(message) => err(&req.id, "bad_params", message, None),
    }
}

/// Build the page from the DOM contract. A second initialisation is the
/// construction-time assertion the old page-level flag used to be.
fn handle_page_init(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.engine.is_some() {
        return err(&req.id, "already_initialized", "page is already initialised", None);
    }
    let contract = match PageContract::from_params(&req.params) {
        Ok(contract) => contract,
        Err(message) => return err(&req.id, "bad_params", message, None),
    };
    let date_picker_available = req
        .params
        .get("datePickerAvailable")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let viewport_width = req
        .params
        .get("viewportWidth")
        .and_then(|v| v.as_u64())
        .unwrap_or(1200) as u32;
    state.engine = Some(ModalEngine::new(contract, date_picker_available, viewport_width));
    ok(
        &req.id,
        json!({
            "datePickerAvailable": date_picker_available,
            "viewportWidth": viewport_width,
        }),
    )
}

fn handle_page_snapshot(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(eng) = state.engine.as_ref() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    let session = &eng.session;
    ok(
        &req.id,
        json!({
            "page": eng.page.snapshot(),
            "session": {
                "studentId": session.student_id,
                "initialising": session.initialising,
                "stats": {
                    "present": session.stats.present,
                    "late": session.stats.late,
                    "absent": session.stats.absent,
                    "total": session.stats.total,
                },
            },
            "pendingTasks": eng.sched.pending(),
            "clockMs": eng.clock.now_ms(),
        }),
    )
}

/// Pump the cooperative loop: advance virtual time and run due tasks.
fn handle_clock_advance(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(api) = state.api.as_deref() else {
        return err(&req.id, "no_backend", "install a backend first", None);
    };
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    let ms = req.params.get("ms").and_then(|v| v.as_u64()).unwrap_or(0);
    eng.advance(api, ms);
    let clock_ms = eng.clock.now_ms();
    let pending = eng.sched.pending();
    ok_with_effects(
        &req.id,
        eng,
        json!({ "clockMs": clock_ms, "pendingTasks": pending }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "backend.http" => Some(handle_backend_http(state, req)),
        "backend.stub" => Some(handle_backend_stub(state, req)),
        "page.init" => Some(handle_page_init(state, req)),
        "page.snapshot" => Some(handle_page_snapshot(state, req)),
        "clock.advance" => Some(handle_clock_advance(state, req)),
        _ => None,
    }
}
