use serde_json::json;

use crate::filter::FilterField;
use crate::ipc::error::{err, ok_with_effects};
use crate::ipc::types::{AppState, Request};

fn handle_filter_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    let Some(field) = req
        .params
        .get("field")
        .and_then(|v| v.as_str())
        .and_then(FilterField::parse)
    else {
        return err(&req.id, "bad_params", "field must be start or end", None);
    };
    let value = req
        .params
        .get("value")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    eng.set_filter(field, &value);
    let start = eng.session.filter.start.clone();
    let end = eng.session.filter.end.clone();
    ok_with_effects(&req.id, eng, json!({ "start": start, "end": end }))
}

fn handle_filter_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(api) = state.api.as_deref() else {
        return err(&req.id, "no_backend", "install a backend first", None);
    };
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    eng.apply_filter(api);
    ok_with_effects(&req.id, eng, json!({}))
}

fn handle_filter_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(api) = state.api.as_deref() else {
        return err(&req.id, "no_backend", "install a backend first", None);
    };
    let Some(eng) = state.engine.as_mut() else {
        return err(&req.id, "no_page", "initialise the page first", None);
    };
    eng.reset_filter(api);
    ok_with_effects(&req.id, eng, json!({}))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "filter.set" => Some(handle_filter_set(state, req)),
        "filter.apply" => Some(handle_filter_apply(state, req)),
        "filter.reset" => Some(handle_filter_reset(state, req)),
        _ => None,
    }
}
