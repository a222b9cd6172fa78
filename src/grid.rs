use serde_json::Value;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::dom::{escape_attr, escape_html, Page};
use crate::matrix::{
    build_matrix, classify_status, normalize_payload, percentage_color, percentage_display,
    AttendanceMatrix, AttendanceRecord, AttendanceStats,
};
use crate::modal::{AttendanceRequest, ModalEngine};

pub const STYLE_ELEMENT_ID: &str = "attendance-grid-styles";
pub const HEADERS_SLOT: &str = "attendance-headers";
pub const DATA_SLOT: &str = "attendance-data";
pub const FOOTNOTE_SLOT: &str = "attendance-stats-footnote";

/// Identical stats tuples written within this window are suppressed.
const STATS_THROTTLE_MS: u64 = 500;
/// Delay before the single late-count reconciliation pass, when server
/// stats were adopted.
const RECONCILE_SETTLE_MS: u64 = 300;

pub const GRID_CSS: &str = "\
.attendance-scrollable-container{overflow-x:auto;max-width:100%;}\
.attendance-table{border-collapse:separate;border-spacing:0;table-layout:fixed;width:max-content;}\
.lecture-header{position:sticky;left:0;top:0;z-index:2;background:#fff;border-right:1px solid #dee2e6;}\
.attendance-header{position:sticky;top:0;z-index:1;background:#fff;text-align:center;}\
.lecture-cell{position:sticky;left:0;z-index:1;background:#fff;border-right:1px solid #dee2e6;}\
.attendance-cell{text-align:center;}\
.class-divider-cell{padding:0;height:2px;}\
.class-divider-line{height:2px;background:#e9ecef;}";

/// Build the scrollable shell inside the attendance container. The table
/// head and body are engine-created slots addressed by id.
pub fn ensure_structure(page: &mut Page) {
    let container = page.contract().attendance_container.clone();
    page.ensure_slot(HEADERS_SLOT);
    page.ensure_slot(DATA_SLOT);
    page.ensure_slot(FOOTNOTE_SLOT);
    page.set_html(
        container.as_str(),
        format!(
            "<div class=\"attendance-scrollable-container\">\
             <table class=\"attendance-table\">\
             <thead id=\"{}\"></thead><tbody id=\"{}\"></tbody>\
             </table></div>",
            HEADERS_SLOT, DATA_SLOT
        ),
    );
}

pub fn show_spinner(page: &mut Page) {
    page.set_html(HEADERS_SLOT, "");
    page.set_html(
        DATA_SLOT,
        "<tr><td class=\"attendance-loading\">\
         <div class=\"spinner-border spinner-border-sm\" role=\"status\"></div> \
         Loading attendance...</td></tr>",
    );
}

/// Fetch, normalise, render, and update the stats panel. Retry replays the
/// last request triple.
pub fn load(
    eng: &mut ModalEngine,
    api: &dyn ApiClient,
    student_id: Option<&str>,
    start_date: Option<&str>,
    end_date: Option<&str>,
) {
    let Some(student_id) = student_id.filter(|s| !s.trim().is_empty()) else {
        eng.page.set_html(HEADERS_SLOT, "");
        eng.page.set_html(
            DATA_SLOT,
            "<tr><td class=\"attendance-error text-danger\">No student selected.</td></tr>",
        );
        return;
    };

    eng.session.last_request = Some(AttendanceRequest {
        student_id: student_id.to_string(),
        start: start_date.map(str::to_string),
        end: end_date.map(str::to_string),
    });

    show_spinner(&mut eng.page);
    match api.fetch_attendance(student_id, start_date, end_date) {
        Ok(payload) => render_payload(eng, &payload),
        Err(e) => {
            eng.warnings.push(format!("attendance load failed: {}", e));
            render_error_state(eng);
        }
    }
}

pub fn retry(eng: &mut ModalEngine, api: &dyn ApiClient) {
    let Some(request) = eng.session.last_request.clone() else {
        eng.warnings.push("retry requested with no previous attendance load".to_string());
        return;
    };
    load(
        eng,
        api,
        Some(&request.student_id),
        request.start.as_deref(),
        request.end.as_deref(),
    );
}

fn render_error_state(eng: &mut ModalEngine) {
    eng.page.set_html(HEADERS_SLOT, "");
    eng.page.set_html(
        DATA_SLOT,
        "<tr><td class=\"attendance-error text-danger\">\
         Failed to load attendance records. \
         <button type=\"button\" class=\"btn btn-sm btn-outline-secondary attendance-retry-btn\">\
         Retry</button></td></tr>",
    );
}

/// Render a normalised payload. This is the only writer of the grid slots
/// and the stats panel.
pub fn render_payload(eng: &mut ModalEngine, payload: &Value) {
    let normalized = normalize_payload(payload);
    let token = Uuid::new_v4();
    eng.session.render_token = Some(token);

    if normalized.records.is_empty() {
        render_empty_state(eng);
        write_stats(eng, AttendanceStats::default());
        inject_footnote(eng);
        validation_pass(eng);
        return;
    }

    let matrix = build_matrix(&normalized.records);
    let headers = headers_html(&matrix);
    let body = body_html(&matrix);
    eng.page.set_html(HEADERS_SLOT, headers);
    eng.page.set_html(DATA_SLOT, body);

    let server_adopted = normalized.server_stats.is_some();
    let stats = normalized
        .server_stats
        .unwrap_or_else(|| AttendanceStats::from_records(&normalized.records));
    write_stats(eng, stats);
    inject_footnote(eng);
    validation_pass(eng);

    if server_adopted {
        let settle_at = eng.clock.now_ms() + RECONCILE_SETTLE_MS;
        eng.sched.schedule(settle_at, crate::sched::Task::ReconcileLate { token });
    }
}

fn render_empty_state(eng: &mut ModalEngine) {
    let range = eng
        .session
        .last_request
        .as_ref()
        .and_then(|r| match (&r.start, &r.end) {
            (None, None) => None,
            (start, end) => Some((start.clone(), end.clone())),
        });
    let message = match range {
        Some((start, end)) => format!(
            "No attendance records found between {} and {}. \
             <button type=\"button\" class=\"btn btn-sm btn-link attendance-reset-filter-btn\">\
             Reset filter</button>",
            escape_html(start.as_deref().unwrap_or("the beginning")),
            escape_html(end.as_deref().unwrap_or("today")),
        ),
        None => "No attendance records found.".to_string(),
    };
    eng.page.set_html(HEADERS_SLOT, "");
    eng.page.set_html(
        DATA_SLOT,
        format!("<tr><td class=\"attendance-empty text-muted\">{}</td></tr>", message),
    );
}

fn headers_html(matrix: &AttendanceMatrix) -> String {
    let mut html = String::from("<tr><th class=\"lecture-header\">Class Details</th>");
    for date in &matrix.dates {
        let (day_month, weekday) = header_labels(date);
        html.push_str(&format!(
            "<th class=\"attendance-header\">\
             <div class=\"attendance-header-date\">{}</div>\
             <div class=\"attendance-header-day\">{}</div></th>",
            escape_html(&day_month),
            escape_html(&weekday)
        ));
    }
    html.push_str("</tr>");
    html
}

fn header_labels(date: &str) -> (String, String) {
    match chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d") {
        Ok(parsed) => (
            parsed.format("%d %b").to_string(),
            parsed.format("%a").to_string(),
        ),
        Err(_) => (date.to_string(), String::new()),
    }
}

fn body_html(matrix: &AttendanceMatrix) -> String {
    let columns = matrix.dates.len() + 1;
    let mut html = String::new();
    for (index, (class_name, by_date)) in matrix.classes.iter().enumerate() {
        if index > 0 {
            html.push_str(&format!(
                "<tr class=\"class-divider-row\"><td class=\"class-divider-cell\" colspan=\"{}\">\
                 <div class=\"class-divider-line\"></div></td></tr>",
                columns
            ));
        }
        html.push_str(&format!(
            "<tr><td class=\"lecture-cell\">{}</td>",
            escape_html(class_name)
        ));
        for date in &matrix.dates {
            html.push_str("<td class=\"attendance-cell\">");
            match by_date.get(date) {
                Some(record) => html.push_str(&badge_html(record)),
                None => html.push_str("<span class=\"attendance-cell-empty text-muted\">\u{2014}</span>"),
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html
}

fn badge_html(record: &AttendanceRecord) -> String {
    let badge = classify_status(&record.status);
    let mut attrs = String::new();
    if let Some(id) = &record.record_id {
        attrs.push_str(&format!(" data-record-id=\"{}\"", escape_attr(id)));
    }
    if let Some(comment) = &record.comment {
        attrs.push_str(&format!(" title=\"{}\"", escape_attr(comment)));
    }
    format!(
        "<span class=\"attendance-badge badge bg-{c}-subtle text-{c}\"{attrs}>{label}</span>",
        c = badge.color,
        attrs = attrs,
        label = escape_html(&badge.label)
    )
}

/// Write the four stats slots. A write carrying the same tuple as the
/// previous one within the throttle window is suppressed; the session keeps
/// the authoritative value either way.
pub fn write_stats(eng: &mut ModalEngine, stats: AttendanceStats) -> bool {
    let now = eng.clock.now_ms();
    eng.session.stats = stats;
    if let Some((fingerprint, at)) = eng.session.last_stats_write {
        if fingerprint == stats.fingerprint() && now.saturating_sub(at) < STATS_THROTTLE_MS {
            return false;
        }
    }
    let contract = eng.page.contract().clone();
    eng.page.set_text(&contract.total_present, &stats.present.to_string());
    eng.page.set_text(&contract.total_late, &stats.late.to_string());
    eng.page.set_text(&contract.total_absence, &stats.absent.to_string());
    eng.page
        .set_text(&contract.attendance_percentage, &percentage_display(&stats));
    eng.page
        .set_class(&contract.attendance_percentage, percentage_color(&stats));
    eng.session.last_stats_write = Some((stats.fingerprint(), now));
    true
}

fn inject_footnote(eng: &mut ModalEngine) {
    if eng.session.footnote_done {
        return;
    }
    eng.session.footnote_done = true;
    eng.page.set_html(
        FOOTNOTE_SLOT,
        "<small class=\"text-muted\">Late attendance is counted as present for percentage calculation</small>",
    );
}

/// The single settle pass for adopted server stats: count late badges in
/// the rendered markup and raise the late slot if the DOM shows more. The
/// reverse direction is never applied.
pub fn reconcile_late(eng: &mut ModalEngine, token: Uuid) {
    if eng.session.render_token != Some(token) || !eng.page.modal_shown {
        return;
    }
    let dom_late = count_late_badges(eng.page.content(DATA_SLOT)) as u64;
    if dom_late <= eng.session.stats.late {
        return;
    }
    let mut stats = eng.session.stats;
    stats.late = dom_late;
    write_stats(eng, stats.repaired());
}

/// Count badges whose text reads "Late" (case-insensitive) or whose class
/// list carries the late style.
pub fn count_late_badges(html: &str) -> usize {
    let mut count = 0;
    let mut from = 0;
    while let Some(at) = html[from..].find("attendance-badge") {
        let at = from + at;
        from = at + "attendance-badge".len();
        let Some(tag_end) = html[at..].find('>').map(|i| at + i + 1) else {
            break;
        };
        let attrs = &html[at..tag_end];
        let text_end = html[tag_end..].find('<').map(|i| tag_end + i).unwrap_or(html.len());
        let text = html[tag_end..text_end].trim();
        if attrs.contains("bg-warning-subtle") || text.eq_ignore_ascii_case("late") {
            count += 1;
        }
    }
    count
}

/// Repair stats slots whose text is not a finite number (or carries an
/// accidental object stringification) and force the panel visible.
pub fn validation_pass(eng: &mut ModalEngine) {
    let contract = eng.page.contract().clone();
    for slot in [&contract.total_present, &contract.total_late, &contract.total_absence] {
        let text = eng.page.content(slot).to_string();
        if text.contains("[object") || text.trim().parse::<u64>().is_err() {
            eng.page.set_text(slot, "0");
        }
        eng.page.force_visible(slot);
    }
    let pct_slot = contract.attendance_percentage.clone();
    let text = eng.page.content(&pct_slot).to_string();
    let numeric = text.trim().trim_end_matches('%').parse::<f64>();
    let valid = !text.contains("[object") && matches!(numeric, Ok(n) if n.is_finite() && n >= 0.0);
    if !valid {
        eng.page.set_text(&pct_slot, "0%");
        eng.page.set_class(&pct_slot, "text-muted");
    }
    eng.page.force_visible(&pct_slot);
}

/// Zero the stats panel, as at modal open.
pub fn reset_stats(eng: &mut ModalEngine) {
    eng.session.stats = AttendanceStats::default();
    eng.session.last_stats_write = None;
    let contract = eng.page.contract().clone();
    eng.page.set_text(&contract.total_present, "0");
    eng.page.set_text(&contract.total_late, "0");
    eng.page.set_text(&contract.total_absence, "0");
    eng.page.set_text(&contract.attendance_percentage, "0%");
    eng.page.set_class(&contract.attendance_percentage, "text-muted");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::StubApiClient;
    use crate::dom::PageContract;
    use crate::modal::ModalEngine;
    use serde_json::json;

    fn engine() -> ModalEngine {
        let mut eng = ModalEngine::new(PageContract::default(), true, 1200);
        eng.page.show_modal(true, true);
        ensure_structure(&mut eng.page);
        eng
    }

    fn stats_of(eng: &ModalEngine) -> (String, String, String, String) {
        (
            eng.page.content("totalPresent").to_string(),
            eng.page.content("totalLate").to_string(),
            eng.page.content("totalAbsence").to_string(),
            eng.page.content("attendancePercentage").to_string(),
        )
    }

    #[test]
    fn plain_payload_renders_matrix_and_stats() {
        let mut eng = engine();
        render_payload(
            &mut eng,
            &json!([
                { "date": "2024-03-04", "class_name": "Math", "status": "Present" },
                { "date": "2024-03-05", "class_name": "Math", "status": "Late" },
                { "date": "2024-03-04", "class_name": "Chem", "status": "Absent" }
            ]),
        );

        let headers = eng.page.content(HEADERS_SLOT).to_string();
        assert!(headers.contains("Class Details"));
        assert!(headers.find("04 Mar").unwrap() < headers.find("05 Mar").unwrap());
        assert!(headers.contains("Mon"));

        let body = eng.page.content(DATA_SLOT).to_string();
        assert!(body.find("Chem").unwrap() < body.find("Math").unwrap());
        assert_eq!(body.matches("class-divider-row").count(), 1);
        // Chem has no 2024-03-05 record, so one cell shows the em-dash.
        assert_eq!(body.matches("\u{2014}").count(), 1);

        assert_eq!(
            stats_of(&eng),
            ("1".into(), "1".into(), "1".into(), "66.7%".into())
        );
        assert_eq!(eng.page.content("attendancePercentage"), "66.7%");
        // No server stats, so no settle pass is scheduled.
        assert_eq!(eng.sched.pending(), 0);
    }

    #[test]
    fn rendering_same_payload_twice_is_idempotent() {
        let payload = json!([
            { "date": "2024-03-04", "class_name": "Math", "status": "Present", "id": "r1" },
            { "date": "2024-03-05", "class_name": "Chem", "status": "Late", "id": "r2" }
        ]);
        let mut eng = engine();
        render_payload(&mut eng, &payload);
        let first_headers = eng.page.content(HEADERS_SLOT).to_string();
        let first_body = eng.page.content(DATA_SLOT).to_string();
        render_payload(&mut eng, &payload);
        assert_eq!(eng.page.content(HEADERS_SLOT), first_headers);
        assert_eq!(eng.page.content(DATA_SLOT), first_body);
    }

    #[test]
    fn server_stats_win_then_settle_pass_raises_late() {
        let mut eng = engine();
        render_payload(
            &mut eng,
            &json!({
                "stats": { "present": 10, "late": 0, "absent": 0, "total": 10 },
                "attendance": [{ "date": "2024-01-01", "class_name": "X", "status": "late", "id": "r1" }]
            }),
        );
        assert_eq!(eng.page.content("totalLate"), "0");
        assert_eq!(eng.page.content("attendancePercentage"), "100%");
        assert_eq!(eng.sched.pending(), 1);

        eng.clock.advance(300);
        let token = eng.session.render_token.expect("token");
        reconcile_late(&mut eng, token);
        assert_eq!(eng.page.content("totalLate"), "1");
        assert_eq!(eng.page.content("attendancePercentage"), "100%");
        assert_eq!(eng.session.stats.fingerprint(), (10, 1, 0, 11));
    }

    #[test]
    fn stale_render_token_is_a_no_op() {
        let mut eng = engine();
        render_payload(
            &mut eng,
            &json!({
                "stats": { "present": 5, "late": 0, "absent": 0, "total": 5 },
                "attendance": [{ "date": "2024-01-01", "class_name": "X", "status": "late" }]
            }),
        );
        let stale = eng.session.render_token.expect("token");
        // A newer render supersedes the scheduled pass.
        render_payload(&mut eng, &json!([{ "date": "2024-01-02", "class_name": "X", "status": "present" }]));
        let before = stats_of(&eng);
        reconcile_late(&mut eng, stale);
        assert_eq!(stats_of(&eng), before);
    }

    #[test]
    fn reconciliation_never_lowers_the_slot() {
        let mut eng = engine();
        render_payload(
            &mut eng,
            &json!({
                "stats": { "present": 1, "late": 5, "absent": 0, "total": 6 },
                "attendance": [{ "date": "2024-01-01", "class_name": "X", "status": "late" }]
            }),
        );
        let token = eng.session.render_token.expect("token");
        eng.clock.advance(300);
        reconcile_late(&mut eng, token);
        assert_eq!(eng.page.content("totalLate"), "5");
    }

    #[test]
    fn throttle_suppresses_identical_tuple_within_window() {
        let mut eng = engine();
        let stats = AttendanceStats { present: 2, late: 0, absent: 0, total: 2 };
        assert!(write_stats(&mut eng, stats));
        eng.page.drain_patches();
        assert!(!write_stats(&mut eng, stats));
        assert!(eng.page.drain_patches().is_empty());

        eng.clock.advance(500);
        assert!(write_stats(&mut eng, stats));

        // A different tuple always writes.
        let other = AttendanceStats { present: 3, late: 0, absent: 0, total: 3 };
        assert!(write_stats(&mut eng, other));
    }

    #[test]
    fn empty_range_renders_reset_control_and_zero_stats() {
        let mut eng = engine();
        let api = StubApiClient::from_routes(&json!({
            "/api/students/s1/attendance?start_date=2030-01-01&end_date=2030-01-31": []
        }))
        .expect("stub");
        load(&mut eng, &api, Some("s1"), Some("2030-01-01"), Some("2030-01-31"));
        let body = eng.page.content(DATA_SLOT).to_string();
        assert!(body.contains("between 2030-01-01 and 2030-01-31"));
        assert!(body.contains("attendance-reset-filter-btn"));
        assert_eq!(stats_of(&eng), ("0".into(), "0".into(), "0".into(), "0%".into()));
        assert_eq!(eng.page.content("attendancePercentage"), "0%");
    }

    #[test]
    fn attendance_error_renders_retry_and_retry_replays_triple() {
        let mut eng = engine();
        let failing = StubApiClient::from_routes(&json!({
            "/api/students/s1/attendance?start_date=&end_date=": { "status": 500, "body": {} }
        }))
        .expect("stub");
        load(&mut eng, &failing, Some("s1"), None, None);
        assert!(eng.page.content(DATA_SLOT).contains("attendance-retry-btn"));
        assert_eq!(eng.warnings.len(), 1);

        let healthy = StubApiClient::from_routes(&json!({
            "/api/students/s1/attendance?start_date=&end_date=": [
                { "date": "2024-03-04", "class_name": "Math", "status": "Present" }
            ]
        }))
        .expect("stub");
        retry(&mut eng, &healthy);
        assert!(eng.page.content(DATA_SLOT).contains("Math"));
        assert_eq!(eng.page.content("totalPresent"), "1");
    }

    #[test]
    fn missing_student_renders_error_state() {
        let mut eng = engine();
        let api = StubApiClient::from_routes(&json!({})).expect("stub");
        load(&mut eng, &api, None, None, None);
        assert!(eng.page.content(DATA_SLOT).contains("No student selected."));
    }

    #[test]
    fn late_badge_counting_checks_text_and_class() {
        let html = "<span class=\"attendance-badge badge bg-warning-subtle text-warning\">Late</span>\
                    <span class=\"attendance-badge badge bg-success-subtle text-success\">Present</span>\
                    <span class=\"attendance-badge badge bg-secondary-subtle text-secondary\">LATE</span>";
        assert_eq!(count_late_badges(html), 2);
    }

    #[test]
    fn validation_pass_repairs_tainted_slots() {
        let mut eng = engine();
        eng.page.set_text("totalLate", "[object Object]");
        eng.page.set_text("attendancePercentage", "NaN%");
        validation_pass(&mut eng);
        assert_eq!(eng.page.content("totalLate"), "0");
        assert_eq!(eng.page.content("attendancePercentage"), "0%");
    }

    #[test]
    fn footnote_injected_once_per_open() {
        let mut eng = engine();
        let payload = json!([{ "date": "2024-03-04", "class_name": "Math", "status": "Present" }]);
        render_payload(&mut eng, &payload);
        eng.page.drain_patches();
        render_payload(&mut eng, &payload);
        let footnotes = eng
            .page
            .drain_patches()
            .into_iter()
            .filter(|p| p.slot == FOOTNOTE_SLOT)
            .count();
        assert_eq!(footnotes, 0);
        assert!(eng.page.content(FOOTNOTE_SLOT).contains("counted as present"));
    }
}
