use serde_json::json;

use crate::ipc::error::{err, ok_with_effects};
use crate::ipc::types::{AppState, Request};

fn handle_modal_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(api) = state.api.as_deref() else {
        return err(&req.id, "no_backend", "install a backend first", None);
    };
    let Some(eng) = state.engine.as_mut() else {
        return err(
            &req.id,
            "modal_not_found",
            "student detail modal is unavailable: page not initialised",
            None,
        );
    };
    let Some(student) = req.params.get("student") else {
        return err(&req.id, "missing_student", "missing params.student", None);
    };
    eng.open(api, student);
    let shown = eng.page.modal_shown;
    let student_id = eng.session.student_id.clone();
    ok_with_effects(
        &req.id,
        eng,
        json!({ "shown": shown, "studentId": student_id }),
    )
}

fn handle_modal_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    eng.close();
    ok_with_effects(&req.id, eng, json!({ "shown": false }))
}

/// UI events the host shell forwards: `backdropClick`, `hidden`, `resize`.
fn handle_modal_event(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    let Some(event) = req.params.get("event").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.event", None);
    };
    match event {
        "backdropClick" => {
            let target = req
                .params
                .get("target")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            eng.on_backdrop_click(&target);
        }
        "hidden" => eng.on_hidden(),
        "resize" => {
            let Some(width) = req.params.get("width").and_then(|v| v.as_u64()) else {
                return err(&req.id, "bad_params", "resize requires params.width", None);
            };
            eng.on_resize(width as u32);
        }
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown event: {}", other),
                None,
            )
        }
    }
    let shown = eng.page.modal_shown;
    ok_with_effects(&req.id, eng, json!({ "shown": shown }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "modal.open" => Some(handle_modal_open(state, req)),
        "modal.close" => Some(handle_modal_close(state, req)),
        "modal.event" => Some(handle_modal_event(state, req)),
        _ => None,
    }
}
