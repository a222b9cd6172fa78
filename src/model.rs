use serde_json::Value;

/// First string (or number, stringified) found under any of `keys`.
pub fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match v.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }
    None
}

fn bool_field(v: &Value, keys: &[&str]) -> Option<bool> {
    for key in keys {
        if let Some(b) = v.get(key).and_then(|v| v.as_bool()) {
            return Some(b);
        }
    }
    None
}

/// Identifier extraction order used by `modal.open`.
pub fn extract_student_id(v: &Value) -> Option<String> {
    if let Some(s) = v.as_str() {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
        return None;
    }
    str_field(v, &["id", "student_id", "user_id"])
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub name: Option<String>,
    pub status: Option<String>,
    pub is_active: Option<bool>,
    pub image: Option<String>,
    /// Raw `company` field, object or string; the profile renderer decides
    /// whether it is an embedded record or an identifier.
    pub company: Option<Value>,
    pub company_id: Option<String>,
    pub enrollments: Vec<EnrollmentRecord>,
}

impl StudentRecord {
    pub fn from_value(v: &Value) -> Option<Self> {
        if !v.is_object() {
            return None;
        }
        let id = str_field(v, &["id", "student_id", "user_id"])?;
        let enrollments = v
            .get("enrollments")
            .or_else(|| v.get("classes"))
            .and_then(|e| e.as_array())
            .map(|items| items.iter().map(EnrollmentRecord::from_value).collect())
            .unwrap_or_default();
        Some(Self {
            id,
            first_name: str_field(v, &["firstName", "first_name"]),
            last_name: str_field(v, &["lastName", "last_name"]),
            name: str_field(v, &["name", "fullName", "full_name"]),
            status: match v.get("status") {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            },
            is_active: bool_field(v, &["isActive", "is_active", "active"]),
            image: str_field(v, &["image", "profileImage", "profile_image", "photo"]),
            company: v.get("company").cloned(),
            company_id: str_field(v, &["company_id", "companyId"]),
            enrollments,
        })
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.name.clone().unwrap_or_else(|| self.id.clone()),
        }
    }

    /// Explicit status string wins; otherwise derive from the active flag.
    pub fn status_label(&self) -> String {
        if let Some(status) = &self.status {
            return status.clone();
        }
        match self.is_active {
            Some(true) | None => "Active".to_string(),
            Some(false) => "Inactive".to_string(),
        }
    }
}

pub const DEFAULT_AVATAR: &str = "/images/default-avatar.png";

/// Absolute URLs and root-anchored paths pass through; bare filenames get
/// the configured base path; no image resolves to the placeholder.
pub fn resolve_image_src(image: Option<&str>, image_base_path: &str) -> String {
    match image {
        Some(src) if src.starts_with("http://") || src.starts_with("https://") => src.to_string(),
        Some(src) if src.starts_with('/') => src.to_string(),
        Some(src) if !src.trim().is_empty() => format!("{}{}", image_base_path, src),
        _ => DEFAULT_AVATAR.to_string(),
    }
}

/// Short alphanumeric strings are treated as company identifiers and looked
/// up; anything with whitespace or at 20 characters and over is a name.
pub fn looks_like_company_id(s: &str) -> bool {
    !s.is_empty()
        && s.len() < 20
        && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[derive(Debug, Clone)]
pub struct CompanyRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub industry: Option<String>,
}

impl CompanyRecord {
    pub fn from_value(v: &Value) -> Self {
        Self {
            id: str_field(v, &["id", "company_id"]),
            name: str_field(v, &["name", "company_name", "companyName"]),
            industry: str_field(v, &["industry"]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveStatus {
    Active,
    Pending,
    Past,
}

#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub class_id: Option<String>,
    pub class_name: String,
    /// Derived schedule line; `None` with a class id means the card needs
    /// the per-class schedule fetch.
    pub schedule: Option<String>,
    pub instructor: Option<String>,
    pub enrolled_at: Option<String>,
    pub unenrolled_at: Option<String>,
    pub status: String,
}

impl EnrollmentRecord {
    pub fn from_value(v: &Value) -> Self {
        let class = v.get("class").filter(|c| c.is_object());
        let class_id = str_field(v, &["class_id", "classId"])
            .or_else(|| class.and_then(|c| str_field(c, &["id", "class_id"])));
        let class_name = str_field(v, &["class_name", "className"])
            .or_else(|| class.and_then(|c| str_field(c, &["name", "class_name", "title"])))
            .or_else(|| match v.get("class") {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .or_else(|| str_field(v, &["name"]))
            .unwrap_or_else(|| "Unknown Class".to_string());
        let schedule = derive_schedule(v, class);
        let instructor = str_field(v, &["instructor", "instructor_name", "instructorName"])
            .or_else(|| v.get("instructor").map(|i| str_field(i, &["name"])).flatten())
            .or_else(|| {
                class.and_then(|c| {
                    str_field(c, &["instructor", "instructor_name"])
                        .or_else(|| c.get("instructor").map(|i| str_field(i, &["name"])).flatten())
                })
            });
        Self {
            class_id,
            class_name,
            schedule,
            instructor,
            enrolled_at: str_field(v, &["enrollment_date", "enrollmentDate", "enrolled_at", "enrolledAt"]),
            unenrolled_at: str_field(
                v,
                &["unenrollment_date", "unenrollmentDate", "unenrolled_at", "unenrolledAt"],
            ),
            status: str_field(v, &["status"]).unwrap_or_else(|| "Active".to_string()),
        }
    }

    pub fn effective_status(&self) -> EffectiveStatus {
        if self.status.eq_ignore_ascii_case("pending") {
            return EffectiveStatus::Pending;
        }
        if self.status.eq_ignore_ascii_case("active") && self.unenrolled_at.is_none() {
            return EffectiveStatus::Active;
        }
        EffectiveStatus::Past
    }

    pub fn needs_schedule_fetch(&self) -> bool {
        self.schedule.is_none() && self.class_id.is_some()
    }
}

/// Schedule derivation chain: explicit string, nested class string, then the
/// `{dayOfWeek, startTime, endTime}` triple wherever it appears, composed
/// with graceful fallbacks to whatever subset is present.
fn derive_schedule(v: &Value, class: Option<&Value>) -> Option<String> {
    if let Some(Value::String(s)) = v.get("schedule") {
        if !s.trim().is_empty() {
            return Some(s.trim().to_string());
        }
    }
    if let Some(class) = class {
        if let Some(Value::String(s)) = class.get("schedule") {
            if !s.trim().is_empty() {
                return Some(s.trim().to_string());
            }
        }
    }
    for source in [v.get("schedule"), Some(v), class, class.and_then(|c| c.get("schedule"))]
        .into_iter()
        .flatten()
    {
        if let Some(composed) = compose_schedule(source) {
            return Some(composed);
        }
    }
    None
}

pub fn compose_schedule(v: &Value) -> Option<String> {
    if !v.is_object() {
        return None;
    }
    let day = str_field(v, &["dayOfWeek", "day_of_week", "day"]);
    let start = str_field(v, &["startTime", "start_time"]);
    let end = str_field(v, &["endTime", "end_time"]);
    match (day, start, end) {
        (Some(day), Some(start), Some(end)) => Some(format!("{}, {} - {}", day, start, end)),
        (Some(day), Some(start), None) => Some(format!("{}, {}", day, start)),
        (Some(day), None, None) => Some(day),
        (None, Some(start), Some(end)) => Some(format!("{} - {}", start, end)),
        (None, Some(start), None) => Some(start),
        (Some(day), None, Some(end)) => Some(format!("{}, {}", day, end)),
        _ => None,
    }
}

/// Permissive date display: `YYYY-MM-DD` (or slash-separated) becomes
/// `MM/DD/YYYY`; anything else falls back to native parsing, then verbatim.
pub fn format_date_mdy(raw: &str) -> String {
    let trimmed = raw.trim();
    let day_part = trimmed.split('T').next().unwrap_or(trimmed);
    let parts: Vec<&str> = day_part.split(['-', '/']).collect();
    if parts.len() == 3
        && parts[0].len() == 4
        && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        return format!("{:0>2}/{:0>2}/{}", parts[1], parts[2], parts[0]);
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(day_part, "%Y-%m-%d") {
        return date.format("%m/%d/%Y").to_string();
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.format("%m/%d/%Y").to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn student_id_extraction_order() {
        assert_eq!(extract_student_id(&json!("42")).as_deref(), Some("42"));
        assert_eq!(
            extract_student_id(&json!({ "student_id": "s7", "user_id": "u1" })).as_deref(),
            Some("s7")
        );
        assert_eq!(
            extract_student_id(&json!({ "id": 12, "student_id": "s7" })).as_deref(),
            Some("12")
        );
        assert_eq!(extract_student_id(&json!({ "email": "x@y.z" })), None);
    }

    #[test]
    fn display_name_prefers_split_names() {
        let s = StudentRecord::from_value(&json!({
            "id": "1", "firstName": "Ada", "lastName": "Lovelace", "name": "A. L."
        }))
        .expect("student");
        assert_eq!(s.display_name(), "Ada Lovelace");

        let s = StudentRecord::from_value(&json!({ "id": "1", "name": "A. L." })).expect("student");
        assert_eq!(s.display_name(), "A. L.");
    }

    #[test]
    fn status_label_prefers_explicit_string() {
        let s = StudentRecord::from_value(&json!({ "id": "1", "status": "Suspended", "isActive": true }))
            .expect("student");
        assert_eq!(s.status_label(), "Suspended");
        let s = StudentRecord::from_value(&json!({ "id": "1", "isActive": false })).expect("student");
        assert_eq!(s.status_label(), "Inactive");
    }

    #[test]
    fn image_resolution_rules() {
        assert_eq!(
            resolve_image_src(Some("https://cdn/x.png"), "/images/students/"),
            "https://cdn/x.png"
        );
        assert_eq!(resolve_image_src(Some("/uploads/x.png"), "/images/students/"), "/uploads/x.png");
        assert_eq!(
            resolve_image_src(Some("x.png"), "/images/students/"),
            "/images/students/x.png"
        );
        assert_eq!(resolve_image_src(None, "/images/students/"), DEFAULT_AVATAR);
    }

    #[test]
    fn company_id_heuristic_bounds() {
        assert!(looks_like_company_id("acme-42"));
        assert!(!looks_like_company_id("Acme Holdings Ltd"));
        assert!(!looks_like_company_id("a-very-long-company-identifier"));
        assert!(!looks_like_company_id(""));
    }

    #[test]
    fn enrollment_effective_status_buckets() {
        let active = EnrollmentRecord::from_value(&json!({ "class_name": "Math", "status": "Active" }));
        assert_eq!(active.effective_status(), EffectiveStatus::Active);

        let unenrolled = EnrollmentRecord::from_value(&json!({
            "class_name": "Math", "status": "Active", "unenrollment_date": "2024-05-01"
        }));
        assert_eq!(unenrolled.effective_status(), EffectiveStatus::Past);

        let pending = EnrollmentRecord::from_value(&json!({ "class_name": "Math", "status": "Pending" }));
        assert_eq!(pending.effective_status(), EffectiveStatus::Pending);

        let done = EnrollmentRecord::from_value(&json!({ "class_name": "Math", "status": "Completed" }));
        assert_eq!(done.effective_status(), EffectiveStatus::Past);
    }

    #[test]
    fn schedule_derivation_chain() {
        let explicit = EnrollmentRecord::from_value(&json!({ "schedule": "Mon 9-11" }));
        assert_eq!(explicit.schedule.as_deref(), Some("Mon 9-11"));

        let nested = EnrollmentRecord::from_value(&json!({ "class": { "name": "Math", "schedule": "Tue 8-9" } }));
        assert_eq!(nested.schedule.as_deref(), Some("Tue 8-9"));

        let triple = EnrollmentRecord::from_value(&json!({
            "schedule": { "dayOfWeek": "Monday", "startTime": "09:00", "endTime": "10:30" }
        }));
        assert_eq!(triple.schedule.as_deref(), Some("Monday, 09:00 - 10:30"));

        let partial = EnrollmentRecord::from_value(&json!({ "dayOfWeek": "Friday" }));
        assert_eq!(partial.schedule.as_deref(), Some("Friday"));

        let needs_fetch = EnrollmentRecord::from_value(&json!({ "class_id": "c9" }));
        assert!(needs_fetch.schedule.is_none());
        assert!(needs_fetch.needs_schedule_fetch());
    }

    #[test]
    fn class_name_fallback_chain() {
        let bare = EnrollmentRecord::from_value(&json!({ "class": "Chemistry" }));
        assert_eq!(bare.class_name, "Chemistry");
        let unknown = EnrollmentRecord::from_value(&json!({ "status": "Active" }));
        assert_eq!(unknown.class_name, "Unknown Class");
    }

    #[test]
    fn permissive_date_display() {
        assert_eq!(format_date_mdy("2024-03-04"), "03/04/2024");
        assert_eq!(format_date_mdy("2024/3/4"), "03/04/2024");
        assert_eq!(format_date_mdy("2024-03-04T10:00:00"), "03/04/2024");
        assert_eq!(format_date_mdy("yesterday"), "yesterday");
    }
}
