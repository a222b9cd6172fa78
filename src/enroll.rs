use crate::api::ApiClient;
use crate::dom::{escape_attr, escape_html, Page};
use crate::model::{compose_schedule, format_date_mdy, str_field, EffectiveStatus, EnrollmentRecord, StudentRecord};
use crate::sched::{Scheduler, Task};

/// Render the Active and Pending enrollment sections as responsive cards.
/// Re-invoked on window resize with the cached record; the layout track
/// width follows the viewport breakpoints.
pub fn render(page: &mut Page, sched: &mut Scheduler, now_ms: u64, student: &StudentRecord) {
    let slot = page.contract().enrolled_classes.clone();

    let mut active: Vec<&EnrollmentRecord> = Vec::new();
    let mut pending: Vec<&EnrollmentRecord> = Vec::new();
    for enrollment in &student.enrollments {
        match enrollment.effective_status() {
            EffectiveStatus::Active => active.push(enrollment),
            EffectiveStatus::Pending => pending.push(enrollment),
            EffectiveStatus::Past => {}
        }
    }
    let by_name = |a: &&EnrollmentRecord, b: &&EnrollmentRecord| {
        a.class_name.to_lowercase().cmp(&b.class_name.to_lowercase())
    };
    active.sort_by(by_name);
    pending.sort_by(by_name);

    if active.is_empty() && pending.is_empty() {
        page.set_html(slot.as_str(), "<p class=\"text-muted\">No enrollments found.</p>");
        return;
    }

    let grid_style = grid_style_for_width(page.viewport_width);
    let mut html = String::new();
    for (title, group) in [("Active Enrollments", &active), ("Pending Enrollments", &pending)] {
        if group.is_empty() {
            continue;
        }
        html.push_str(&format!(
            "<div class=\"enrollment-section\"><h6>{}</h6><div class=\"enrollment-grid\" style=\"{}\">",
            title, grid_style
        ));
        for enrollment in group.iter() {
            html.push_str(&card_html(page, sched, now_ms, enrollment));
        }
        html.push_str("</div></div>");
    }
    page.set_html(slot.as_str(), html);
}

fn grid_style_for_width(width: u32) -> &'static str {
    if width < 768 {
        "display:grid;grid-template-columns:1fr;gap:12px"
    } else if width < 992 {
        "display:grid;grid-template-columns:repeat(auto-fill,minmax(250px,1fr));gap:12px"
    } else {
        "display:grid;grid-template-columns:repeat(auto-fill,minmax(300px,1fr));gap:12px"
    }
}

fn card_html(page: &mut Page, sched: &mut Scheduler, now_ms: u64, enrollment: &EnrollmentRecord) -> String {
    let status = enrollment.status.trim();
    let status_color = if status.eq_ignore_ascii_case("active") {
        "success"
    } else if status.eq_ignore_ascii_case("pending") {
        "warning"
    } else {
        "secondary"
    };

    let schedule_html = schedule_html(page, sched, now_ms, enrollment);
    let instructor = enrollment.instructor.as_deref().unwrap_or("Not specified");
    let mut dates = match &enrollment.enrolled_at {
        Some(raw) => format!("Enrolled: {}", escape_html(&format_date_mdy(raw))),
        None => String::new(),
    };
    if let Some(raw) = &enrollment.unenrolled_at {
        if !dates.is_empty() {
            dates.push_str(" · ");
        }
        dates.push_str(&format!("Unenrolled: {}", escape_html(&format_date_mdy(raw))));
    }

    format!(
        "<div class=\"enrollment-card\">\
         <div class=\"enrollment-card-title text-truncate\" title=\"{title}\">{name}</div>\
         <div class=\"enrollment-card-schedule\">{schedule}</div>\
         <span class=\"badge bg-{c}-subtle text-{c}\">{status}</span>\
         <div class=\"enrollment-card-instructor\">{instructor}</div>\
         <div class=\"enrollment-card-dates\">{dates}</div>\
         </div>",
        title = escape_attr(&enrollment.class_name),
        name = escape_html(&enrollment.class_name),
        schedule = schedule_html,
        c = status_color,
        status = escape_html(status),
        instructor = escape_html(instructor),
        dates = dates,
    )
}

/// Derived schedules render directly. A card with only a class id gets a
/// marker span and a deferred fetch; resolved values are remembered on the
/// slot dataset so a re-flow neither refetches nor loses the text.
fn schedule_html(page: &mut Page, sched: &mut Scheduler, now_ms: u64, enrollment: &EnrollmentRecord) -> String {
    if let Some(schedule) = &enrollment.schedule {
        return escape_html(schedule);
    }
    let Some(class_id) = &enrollment.class_id else {
        return "Schedule not available".to_string();
    };
    let slot = page.contract().enrolled_classes.clone();
    let cache_key = format!("schedule-{}", class_id);
    let cached = page.data(&slot, &cache_key).map(str::to_string);
    match cached.as_deref() {
        Some("pending") => {}
        Some(resolved) => return escape_html(resolved),
        None => {
            page.set_data(&slot, &cache_key, "pending");
            sched.schedule(
                now_ms,
                Task::FetchSchedule {
                    class_id: class_id.clone(),
                    marker: cache_key.clone(),
                },
            );
        }
    }
    format!("<span id=\"{}\">Loading schedule...</span>", escape_attr(&cache_key))
}

/// Runs when the deferred schedule fetch comes due. Failures leave the card
/// with "Schedule not available" and never abort anything else.
pub fn run_schedule_fetch(
    page: &mut Page,
    api: &dyn ApiClient,
    warnings: &mut Vec<String>,
    class_id: &str,
    marker: &str,
) {
    let slot = page.contract().enrolled_classes.clone();
    let resolved = match api.fetch_class(class_id) {
        Ok(body) => str_field(&body, &["schedule"])
            .or_else(|| body.get("schedule").and_then(compose_schedule))
            .or_else(|| compose_schedule(&body))
            .unwrap_or_else(|| "Schedule not available".to_string()),
        Err(e) => {
            warnings.push(format!("schedule lookup failed for class {}: {}", class_id, e));
            "Schedule not available".to_string()
        }
    };
    page.set_data(&slot, marker, &resolved);
    page.patch_marker_text(&slot, marker, &resolved);
}
