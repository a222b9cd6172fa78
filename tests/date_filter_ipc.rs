use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_registrard");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn registrard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        value
    );
    value.get("result").cloned().expect("result")
}

fn open_for(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    routes: serde_json::Value,
    date_picker_available: bool,
) {
    let _ = request_ok(stdin, reader, "boot-1", "backend.stub", json!({ "routes": routes }));
    let _ = request_ok(
        stdin,
        reader,
        "boot-2",
        "page.init",
        json!({ "datePickerAvailable": date_picker_available }),
    );
    let _ = request_ok(stdin, reader, "boot-3", "modal.open", json!({ "student": "s1" }));
    let _ = request_ok(stdin, reader, "boot-4", "clock.advance", json!({ "ms": 0 }));
}

fn slot_content<'a>(snapshot: &'a serde_json::Value, slot: &str) -> &'a str {
    snapshot["page"]["slots"][slot]["content"]
        .as_str()
        .unwrap_or_default()
}

const BASE_ROUTES: &str = r#"{
    "/api/users/s1": { "id": "s1", "name": "Ada Lovelace" },
    "/api/students/s1/attendance?start_date=&end_date=": [
        { "date": "2024-02-01", "class_name": "Math", "status": "Present" }
    ]
}"#;

fn base_routes() -> serde_json::Value {
    serde_json::from_str(BASE_ROUTES).expect("routes fixture")
}

#[test]
fn picker_inputs_are_coupled_in_both_directions() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_for(&mut stdin, &mut reader, base_routes(), true);

    let set = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "filter.set",
        json!({ "field": "start", "value": "2024-02-10" }),
    );
    assert_eq!(set["start"], json!("2024-02-10"));
    assert_eq!(set["end"], json!(""));

    // An end before the start drags the start down to match.
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "filter.set",
        json!({ "field": "end", "value": "2024-02-05" }),
    );
    assert_eq!(set["start"], json!("2024-02-05"));
    assert_eq!(set["end"], json!("2024-02-05"));

    // A start past the end drags the end up.
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "filter.set",
        json!({ "field": "start", "value": "2024-02-20" }),
    );
    assert_eq!(set["start"], json!("2024-02-20"));
    assert_eq!(set["end"], json!("2024-02-20"));

    let snapshot = request_ok(&mut stdin, &mut reader, "4", "page.snapshot", json!({}));
    assert_eq!(slot_content(&snapshot, "modalStartDate"), "2024-02-20");
    assert_eq!(slot_content(&snapshot, "modalEndDate"), "2024-02-20");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn native_inputs_are_left_uncoupled() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_for(&mut stdin, &mut reader, base_routes(), false);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "filter.set",
        json!({ "field": "start", "value": "2024-02-10" }),
    );
    let set = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "filter.set",
        json!({ "field": "end", "value": "2024-02-05" }),
    );
    assert_eq!(set["start"], json!("2024-02-10"));
    assert_eq!(set["end"], json!("2024-02-05"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn apply_without_dates_raises_a_warning_toast() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    open_for(&mut stdin, &mut reader, base_routes(), true);

    let applied = request_ok(&mut stdin, &mut reader, "1", "filter.apply", json!({}));
    let toasts = applied["toasts"].as_array().expect("toasts");
    assert_eq!(toasts.len(), 1);
    assert_eq!(toasts[0]["kind"], json!("warning"));
    assert!(toasts[0]["message"]
        .as_str()
        .unwrap()
        .contains("at least one date"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn apply_loads_the_bounded_range_and_empty_results_offer_reset() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let mut routes = base_routes();
    routes["/api/students/s1/attendance?start_date=2024-01-01&end_date=2024-01-31"] = json!([
        { "date": "2024-01-10", "class_name": "Math", "status": "Late" }
    ]);
    routes["/api/students/s1/attendance?start_date=2030-01-01&end_date=2030-01-31"] = json!([]);
    open_for(&mut stdin, &mut reader, routes, true);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "filter.set",
        json!({ "field": "start", "value": "2024-01-01" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "filter.set",
        json!({ "field": "end", "value": "2024-01-31" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "3", "filter.apply", json!({}));

    let snapshot = request_ok(&mut stdin, &mut reader, "4", "page.snapshot", json!({}));
    assert_eq!(slot_content(&snapshot, "totalLate"), "1");
    assert_eq!(slot_content(&snapshot, "totalPresent"), "0");

    // A range with nothing in it names the bounds and offers the reset link.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "filter.set",
        json!({ "field": "start", "value": "2030-01-01" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "filter.set",
        json!({ "field": "end", "value": "2030-01-31" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "7", "filter.apply", json!({}));
    let snapshot = request_ok(&mut stdin, &mut reader, "8", "page.snapshot", json!({}));
    let body = slot_content(&snapshot, "attendance-data");
    assert!(body.contains("between 2030-01-01 and 2030-01-31"));
    assert!(body.contains("attendance-reset-filter-btn"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn reset_clears_inputs_and_reloads_unfiltered() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let mut routes = base_routes();
    routes["/api/students/s1/attendance?start_date=2024-01-01&end_date=2024-01-31"] = json!([
        { "date": "2024-01-10", "class_name": "Math", "status": "Late" }
    ]);
    open_for(&mut stdin, &mut reader, routes, true);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "filter.set",
        json!({ "field": "start", "value": "2024-01-01" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "filter.set",
        json!({ "field": "end", "value": "2024-01-31" }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "3", "filter.apply", json!({}));

    let _ = request_ok(&mut stdin, &mut reader, "4", "filter.reset", json!({}));
    let snapshot = request_ok(&mut stdin, &mut reader, "5", "page.snapshot", json!({}));
    assert_eq!(slot_content(&snapshot, "modalStartDate"), "");
    assert_eq!(slot_content(&snapshot, "modalEndDate"), "");
    assert_eq!(slot_content(&snapshot, "totalPresent"), "1");
    assert_eq!(slot_content(&snapshot, "totalLate"), "0");

    drop(stdin);
    let _ = child.wait();
}
