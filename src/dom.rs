use std::collections::HashMap;

use serde::Serialize;
use serde_json::json;

/// The host page's element ids, gathered into one configuration record so a
/// missing slot is rejected when the page is built instead of surfacing as a
/// null check deep inside a renderer.
#[derive(Debug, Clone)]
pub struct PageContract {
    pub modal_root: String,
    pub student_name: String,
    pub student_id: String,
    pub student_company: String,
    pub student_status: String,
    pub student_image: String,
    pub enrolled_classes: String,
    pub attendance_container: String,
    pub total_present: String,
    pub total_late: String,
    pub total_absence: String,
    pub attendance_percentage: String,
    pub start_date_input: String,
    pub end_date_input: String,
    pub apply_button: String,
    pub reset_button: String,
    pub image_base_path: String,
    pub company_page_base: String,
}

impl Default for PageContract {
    fn default() -> Self {
        Self {
            modal_root: "viewStudentModal".into(),
            student_name: "studentName".into(),
            student_id: "studentId".into(),
            student_company: "studentCompany".into(),
            student_status: "studentStatus".into(),
            student_image: "studentImage".into(),
            enrolled_classes: "enrolledClasses".into(),
            attendance_container: "attendance-records-container".into(),
            total_present: "totalPresent".into(),
            total_late: "totalLate".into(),
            total_absence: "totalAbsence".into(),
            attendance_percentage: "attendancePercentage".into(),
            start_date_input: "modalStartDate".into(),
            end_date_input: "modalEndDate".into(),
            apply_button: "modalApplyDateFilter".into(),
            reset_button: "modalResetDateFilter".into(),
            image_base_path: "/images/students/".into(),
            company_page_base: "/companies/".into(),
        }
    }
}

impl PageContract {
    /// Build a contract from `page.init` params, starting from the defaults
    /// and applying any override the host supplies.
    pub fn from_params(params: &serde_json::Value) -> Result<Self, String> {
        let mut contract = Self::default();
        if let Some(overrides) = params.get("contract").and_then(|v| v.as_object()) {
            for (key, value) in overrides {
                let Some(value) = value.as_str() else {
                    return Err(format!("contract.{} must be a string", key));
                };
                let target = match key.as_str() {
                    "modalRoot" => &mut contract.modal_root,
                    "studentName" => &mut contract.student_name,
                    "studentId" => &mut contract.student_id,
                    "studentCompany" => &mut contract.student_company,
                    "studentStatus" => &mut contract.student_status,
                    "studentImage" => &mut contract.student_image,
                    "enrolledClasses" => &mut contract.enrolled_classes,
                    "attendanceContainer" => &mut contract.attendance_container,
                    "totalPresent" => &mut contract.total_present,
                    "totalLate" => &mut contract.total_late,
                    "totalAbsence" => &mut contract.total_absence,
                    "attendancePercentage" => &mut contract.attendance_percentage,
                    "startDateInput" => &mut contract.start_date_input,
                    "endDateInput" => &mut contract.end_date_input,
                    "applyButton" => &mut contract.apply_button,
                    "resetButton" => &mut contract.reset_button,
                    "imageBasePath" => &mut contract.image_base_path,
                    "companyPageBase" => &mut contract.company_page_base,
                    other => return Err(format!("unknown contract key: {}", other)),
                };
                *target = value.to_string();
            }
        }
        contract.validate()?;
        Ok(contract)
    }

    pub fn validate(&self) -> Result<(), String> {
        let ids = self.slot_ids();
        for id in &ids {
            if id.trim().is_empty() {
                return Err("contract slot id must be non-empty".to_string());
            }
        }
        let mut seen: Vec<&str> = Vec::new();
        for id in &ids {
            if seen.contains(id) {
                return Err(format!("duplicate contract slot id: {}", id));
            }
            seen.push(id);
        }
        Ok(())
    }

    pub fn slot_ids(&self) -> Vec<&str> {
        vec![
            &self.modal_root,
            &self.student_name,
            &self.student_id,
            &self.student_company,
            &self.student_status,
            &self.student_image,
            &self.enrolled_classes,
            &self.attendance_container,
            &self.total_present,
            &self.total_late,
            &self.total_absence,
            &self.attendance_percentage,
            &self.start_date_input,
            &self.end_date_input,
            &self.apply_button,
            &self.reset_button,
        ]
    }
}

/// One write against the host page, in application order.
#[derive(Debug, Clone, Serialize)]
pub struct Patch {
    pub slot: String,
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Default)]
struct Slot {
    content: String,
    dataset: HashMap<String, String>,
    attrs: HashMap<String, String>,
    class: String,
    visible: bool,
}

/// The engine-owned mirror of the host page: slot contents, listener and
/// stylesheet registries, and the modal driver state. Every mutation is
/// appended to a patch log the IPC layer drains into the response.
#[derive(Debug)]
pub struct Page {
    contract: PageContract,
    slots: HashMap<String, Slot>,
    listeners: Vec<String>,
    styles: Vec<String>,
    patch_log: Vec<Patch>,
    pub modal_shown: bool,
    pub viewport_width: u32,
    backdrop_count: u32,
    backdrop_click_to_close: bool,
    esc_key_to_close: bool,
}

impl Page {
    pub fn new(contract: PageContract, viewport_width: u32) -> Self {
        let mut slots = HashMap::new();
        for id in contract.slot_ids() {
            slots.insert(
                id.to_string(),
                Slot {
                    visible: true,
                    ..Slot::default()
                },
            );
        }
        Self {
            contract,
            slots,
            listeners: Vec::new(),
            styles: Vec::new(),
            patch_log: Vec::new(),
            modal_shown: false,
            viewport_width,
            backdrop_count: 0,
            backdrop_click_to_close: false,
            esc_key_to_close: false,
        }
    }

    pub fn contract(&self) -> &PageContract {
        &self.contract
    }

    /// Create a slot the engine owns but the contract does not name, such as
    /// the table head and body inside the attendance container.
    pub fn ensure_slot(&mut self, id: &str) {
        self.slots.entry(id.to_string()).or_insert_with(|| Slot {
            visible: true,
            ..Slot::default()
        });
    }

    fn slot_mut(&mut self, id: &str) -> &mut Slot {
        self.ensure_slot(id);
        self.slots.get_mut(id).unwrap()
    }

    fn log(&mut self, slot: &str, kind: &str, value: &str) {
        self.patch_log.push(Patch {
            slot: slot.to_string(),
            kind: kind.to_string(),
            value: value.to_string(),
        });
    }

    pub fn set_html(&mut self, slot: &str, html: impl Into<String>) {
        let html = html.into();
        self.slot_mut(slot).content = html.clone();
        self.log(slot, "html", &html);
    }

    pub fn set_text(&mut self, slot: &str, text: &str) {
        self.slot_mut(slot).content = escape_html(text);
        self.log(slot, "text", text);
    }

    pub fn set_value(&mut self, slot: &str, value: &str) {
        self.slot_mut(slot).content = value.to_string();
        self.log(slot, "value", value);
    }

    pub fn set_attr(&mut self, slot: &str, name: &str, value: &str) {
        self.slot_mut(slot).attrs.insert(name.to_string(), value.to_string());
        self.log(slot, &format!("attr:{}", name), value);
    }

    pub fn set_class(&mut self, slot: &str, class: &str) {
        self.slot_mut(slot).class = class.to_string();
        self.log(slot, "class", class);
    }

    pub fn force_visible(&mut self, slot: &str) {
        self.slot_mut(slot).visible = true;
        self.log(slot, "show", "");
    }

    pub fn content(&self, slot: &str) -> &str {
        self.slots.get(slot).map(|s| s.content.as_str()).unwrap_or("")
    }

    pub fn set_data(&mut self, slot: &str, key: &str, value: &str) {
        self.slot_mut(slot).dataset.insert(key.to_string(), value.to_string());
    }

    pub fn data(&self, slot: &str, key: &str) -> Option<&str> {
        self.slots.get(slot).and_then(|s| s.dataset.get(key)).map(|s| s.as_str())
    }

    /// Replace the inner text of a marker `<span id="...">` inside an
    /// already-rendered fragment, without rebuilding the fragment. Returns
    /// false when the marker is not present any more.
    pub fn patch_marker_text(&mut self, slot: &str, marker_id: &str, text: &str) -> bool {
        let needle = format!("id=\"{}\"", marker_id);
        let current = self.content(slot).to_string();
        let Some(at) = current.find(&needle) else {
            return false;
        };
        let Some(open_end) = current[at..].find('>').map(|i| at + i + 1) else {
            return false;
        };
        let Some(close) = current[open_end..].find("</span>").map(|i| open_end + i) else {
            return false;
        };
        let mut updated = String::with_capacity(current.len());
        updated.push_str(&current[..open_end]);
        updated.push_str(&escape_html(text));
        updated.push_str(&current[close..]);
        self.slot_mut(slot).content = updated.clone();
        self.log(slot, "html", &updated);
        true
    }

    /// Install a named listener. Returns false when it was already attached,
    /// so callers can keep the single-listener guarantee.
    pub fn add_listener(&mut self, name: &str) -> bool {
        if self.listeners.iter().any(|l| l == name) {
            return false;
        }
        self.listeners.push(name.to_string());
        true
    }

    pub fn remove_listener(&mut self, name: &str) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l != name);
        self.listeners.len() != before
    }

    pub fn has_listener(&self, name: &str) -> bool {
        self.listeners.iter().any(|l| l == name)
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.listeners.iter().filter(|l| l.as_str() == name).count()
    }

    /// Inject a stylesheet once per document, keyed on a fixed element id.
    pub fn inject_style(&mut self, element_id: &str, css: &str) -> bool {
        if self.styles.iter().any(|s| s == element_id) {
            return false;
        }
        self.styles.push(element_id.to_string());
        self.patch_log.push(Patch {
            slot: element_id.to_string(),
            kind: "style".to_string(),
            value: css.to_string(),
        });
        true
    }

    pub fn show_modal(&mut self, backdrop_click_to_close: bool, esc_key_to_close: bool) {
        self.modal_shown = true;
        self.backdrop_click_to_close = backdrop_click_to_close;
        self.esc_key_to_close = esc_key_to_close;
        self.backdrop_count += 1;
        let root = self.contract.modal_root.clone();
        self.log(&root, "modal", "show");
    }

    pub fn hide_modal(&mut self) {
        self.modal_shown = false;
        let root = self.contract.modal_root.clone();
        self.log(&root, "modal", "hide");
    }

    /// Remove any backdrop the modal driver left behind.
    pub fn cleanup_backdrops(&mut self) {
        self.backdrop_count = 0;
    }

    pub fn backdrop_count(&self) -> u32 {
        self.backdrop_count
    }

    pub fn drain_patches(&mut self) -> Vec<Patch> {
        std::mem::take(&mut self.patch_log)
    }

    pub fn snapshot(&self) -> serde_json::Value {
        let mut slots = serde_json::Map::new();
        let mut ids: Vec<&String> = self.slots.keys().collect();
        ids.sort();
        for id in ids {
            let slot = &self.slots[id];
            slots.insert(
                id.clone(),
                json!({
                    "content": slot.content,
                    "class": slot.class,
                    "visible": slot.visible,
                }),
            );
        }
        json!({
            "modalShown": self.modal_shown,
            "viewportWidth": self.viewport_width,
            "backdrops": self.backdrop_count,
            "backdropClickToClose": self.backdrop_click_to_close,
            "escKeyToClose": self.esc_key_to_close,
            "listeners": self.listeners,
            "styles": self.styles,
            "slots": slots,
        })
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

pub fn escape_attr(text: &str) -> String {
    escape_html(text)
}
