use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde_json::Value;

use crate::model::str_field;

/// One normalised attendance entry. Raw server shapes stop at
/// `normalize_payload`; everything downstream sees only this.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub record_id: Option<String>,
    pub date: String,
    pub class_name: String,
    pub status: String,
    pub comment: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizedPayload {
    pub records: Vec<AttendanceRecord>,
    /// Pre-computed stats adopted from the server, already repaired.
    pub server_stats: Option<AttendanceStats>,
}

const ENVELOPE_KEYS: [&str; 7] = [
    "attendance",
    "records",
    "data",
    "attendanceRecords",
    "results",
    "items",
    "entries",
];

/// Single normalisation boundary for the polymorphic attendance payload.
pub fn normalize_payload(v: &Value) -> NormalizedPayload {
    let mut server_stats = None;
    let items: Vec<Value> = if let Some(arr) = v.as_array() {
        arr.clone()
    } else if v.is_object() {
        if let Some(stats) = v.get("stats").filter(|s| s.is_object()) {
            server_stats = Some(AttendanceStats::from_server(stats));
        }
        ENVELOPE_KEYS
            .iter()
            .filter_map(|key| v.get(*key).and_then(|e| e.as_array()))
            .find(|arr| !arr.is_empty())
            .cloned()
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    let records = items.iter().filter_map(normalize_record).collect();
    NormalizedPayload {
        records,
        server_stats,
    }
}

fn normalize_record(v: &Value) -> Option<AttendanceRecord> {
    if !v.is_object() {
        return None;
    }
    // Records without a date are dropped.
    let raw_date = str_field(v, &["date", "attendance_date", "attendanceDate"])?;
    let date = raw_date.split('T').next().unwrap_or(&raw_date).trim().to_string();
    if date.is_empty() {
        return None;
    }
    Some(AttendanceRecord {
        record_id: str_field(v, &["id", "record_id", "attendance_id"]),
        date,
        class_name: record_class_name(v),
        status: record_status(v),
        comment: str_field(v, &["comment", "note"]),
    })
}

fn record_class_name(v: &Value) -> String {
    if let Some(name) = str_field(
        v,
        &["class_name", "className", "lecture_name", "lectureName", "course_name", "courseName"],
    ) {
        return name;
    }
    if let Some(class) = v.get("class") {
        if let Some(name) = class.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        if let Some(name) = str_field(class, &["name", "class_name", "title"]) {
            return name;
        }
    }
    if let Some(lecture) = v.get("lecture") {
        if let Some(name) = lecture.as_str().map(str::trim).filter(|s| !s.is_empty()) {
            return name.to_string();
        }
        if let Some(name) = str_field(lecture, &["name", "title"]) {
            return name;
        }
    }
    "Unknown Class".to_string()
}

fn record_status(v: &Value) -> String {
    if let Some(status) = str_field(v, &["status", "attendanceStatus", "attendance_status"]) {
        return status;
    }
    if let Some(s) = v.get("attendance").and_then(|a| a.as_str()) {
        let trimmed = s.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    "Unknown".to_string()
}

/// Classes × dates model behind the grid. Classes sort alphabetically,
/// dates ascending by ISO value; the last record wins per (class, date).
#[derive(Debug, Default)]
pub struct AttendanceMatrix {
    pub classes: BTreeMap<String, HashMap<String, AttendanceRecord>>,
    pub dates: Vec<String>,
}

pub fn build_matrix(records: &[AttendanceRecord]) -> AttendanceMatrix {
    let mut classes: BTreeMap<String, HashMap<String, AttendanceRecord>> = BTreeMap::new();
    let mut dates: BTreeSet<String> = BTreeSet::new();
    for record in records {
        dates.insert(record.date.clone());
        classes
            .entry(record.class_name.clone())
            .or_default()
            .insert(record.date.clone(), record.clone());
    }
    AttendanceMatrix {
        classes,
        dates: dates.into_iter().collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttendanceStats {
    pub present: u64,
    pub late: u64,
    pub absent: u64,
    pub total: u64,
}

impl AttendanceStats {
    /// Local count over normalised records, case-insensitive substring
    /// match. Statuses matching none of the three buckets only contribute
    /// to the record count, which the repair step then folds away.
    pub fn from_records(records: &[AttendanceRecord]) -> Self {
        let mut stats = Self {
            total: records.len() as u64,
            ..Self::default()
        };
        for record in records {
            let status = record.status.to_lowercase();
            if status.contains("late") {
                stats.late += 1;
            } else if status.contains("present") {
                stats.present += 1;
            } else if status.contains("absent") {
                stats.absent += 1;
            }
        }
        stats.repaired()
    }

    pub fn from_server(stats: &Value) -> Self {
        Self {
            present: server_count(stats, "present"),
            late: server_count(stats, "late"),
            absent: server_count(stats, "absent"),
            total: server_count(stats, "total"),
        }
        .repaired()
    }

    /// Keep `present + late + absent = total` no matter what arrived.
    pub fn repaired(mut self) -> Self {
        let sum = self.present + self.late + self.absent;
        if self.total != sum {
            self.total = sum;
        }
        self
    }

    /// Late counts as present for the percentage.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round_off_1_decimal((self.present + self.late) as f64 / self.total as f64 * 100.0)
    }

    pub fn fingerprint(&self) -> (u64, u64, u64, u64) {
        (self.present, self.late, self.absent, self.total)
    }
}

fn server_count(stats: &Value, key: &str) -> u64 {
    stats
        .get(key)
        .and_then(|v| v.as_f64())
        .map(|n| if n.is_finite() && n > 0.0 { n as u64 } else { 0 })
        .unwrap_or(0)
}

/// 1-decimal rounding: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn percentage_display(stats: &AttendanceStats) -> String {
    let pct = stats.percentage();
    if pct.fract() == 0.0 {
        format!("{:.0}%", pct)
    } else {
        format!("{:.1}%", pct)
    }
}

/// Green at 90 and above, yellow at 75, red below, muted when nothing was
/// recorded.
pub fn percentage_color(stats: &AttendanceStats) -> &'static str {
    if stats.total == 0 {
        return "text-muted";
    }
    let pct = stats.percentage();
    if pct >= 90.0 {
        "text-success"
    } else if pct >= 75.0 {
        "text-warning"
    } else {
        "text-danger"
    }
}

/// Badge mapping for one cell. `color` is the Bootstrap colour token used
/// in the `bg-{colour}-subtle text-{colour}` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Badge {
    pub label: String,
    pub color: &'static str,
}

pub fn classify_status(raw: &str) -> Badge {
    let status = raw.to_lowercase();
    if status.contains("excused") {
        return Badge { label: "Excused".into(), color: "info" };
    }
    if status.contains("late") {
        return Badge { label: "Late".into(), color: "warning" };
    }
    if status.contains("present") {
        return Badge { label: "Present".into(), color: "success" };
    }
    if status.contains("absent") {
        return Badge { label: "Absent".into(), color: "danger" };
    }
    Badge {
        label: capitalize(raw.trim()),
        color: "secondary",
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Unknown".to_string(),
    }
}
