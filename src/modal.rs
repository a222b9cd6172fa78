use serde_json::Value;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::dom::{Page, PageContract};
use crate::enroll;
use crate::filter::{FilterField, FilterState};
use crate::grid;
use crate::matrix::AttendanceStats;
use crate::model::{extract_student_id, StudentRecord, DEFAULT_AVATAR};
use crate::profile;
use crate::sched::{Clock, Scheduler, Task};
use crate::toast::{ToastKind, Toasts};

const BACKDROP_LISTENER: &str = "backdrop-click";
const RESIZE_LISTENER: &str = "window-resize";

/// The triple behind the Retry control.
#[derive(Debug, Clone)]
pub struct AttendanceRequest {
    pub student_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Per-open context. The engine is its sole writer; renderers read it
/// through the engine.
#[derive(Debug, Default)]
pub struct ModalSession {
    pub student_id: Option<String>,
    pub initialising: bool,
    pub cached_student: Option<StudentRecord>,
    pub filter: FilterState,
    pub last_request: Option<AttendanceRequest>,
    pub stats: AttendanceStats,
    pub last_stats_write: Option<((u64, u64, u64, u64), u64)>,
    pub render_token: Option<Uuid>,
    pub footnote_done: bool,
}

/// The student detail modal: page mirror, session, scheduler, and the
/// collaborator sinks. One engine per initialised page.
pub struct ModalEngine {
    pub page: Page,
    pub session: ModalSession,
    pub sched: Scheduler,
    pub clock: Clock,
    pub toasts: Toasts,
    pub warnings: Vec<String>,
    date_picker_available: bool,
}

impl ModalEngine {
    pub fn new(contract: PageContract, date_picker_available: bool, viewport_width: u32) -> Self {
        let mut session = ModalSession::default();
        session.filter = FilterState::new(date_picker_available);
        Self {
            page: Page::new(contract, viewport_width),
            session,
            sched: Scheduler::new(),
            clock: Clock::new(),
            toasts: Toasts::new(),
            warnings: Vec::new(),
            date_picker_available,
        }
    }

    /// Open the modal for an identifier string or a partially-populated
    /// record. At most one session initialises at a time; a cached record
    /// renders immediately and the fresh fetch runs as a deferred task.
    pub fn open(&mut self, api: &dyn ApiClient, student_input: &Value) {
        if self.session.initialising {
            self.warnings
                .push("modal open ignored: a session is already initialising".to_string());
            return;
        }

        let Some(student_id) = extract_student_id(student_input) else {
            self.toasts
                .push("Unable to identify the selected student", ToastKind::Error);
            return;
        };

        self.session = ModalSession {
            initialising: true,
            student_id: Some(student_id.clone()),
            filter: FilterState::new(self.date_picker_available),
            ..ModalSession::default()
        };
        self.clear_slots();
        self.page.inject_style(grid::STYLE_ELEMENT_ID, grid::GRID_CSS);

        // Cached fast path: show what the caller already had.
        if student_input.is_object() {
            if let Some(record) = StudentRecord::from_value(student_input) {
                self.render_student_sections(api, &record);
                self.session.cached_student = Some(record);
            }
        }

        self.page.show_modal(true, true);
        self.page.add_listener(BACKDROP_LISTENER);
        self.page.add_listener(RESIZE_LISTENER);

        let now = self.clock.now_ms();
        self.sched.schedule(now, Task::RefreshStudent { student_id });
    }

    pub fn close(&mut self) {
        self.page.hide_modal();
        self.on_hidden();
    }

    /// One-shot cleanup chain, also reached when the host's modal driver
    /// dismissed the modal itself (Esc, backdrop).
    pub fn on_hidden(&mut self) {
        self.page.modal_shown = false;
        self.page.remove_listener(BACKDROP_LISTENER);
        self.page.remove_listener(RESIZE_LISTENER);
        self.page.cleanup_backdrops();
        self.session.initialising = false;
        self.session.render_token = None;
        self.session.footnote_done = false;
        self.session.last_stats_write = None;
    }

    /// Clicks directly on the modal root close it; clicks inside the dialog
    /// do not bubble here as the root target.
    pub fn on_backdrop_click(&mut self, target: &str) {
        if !self.page.modal_shown {
            return;
        }
        if target == self.page.contract().modal_root {
            self.close();
        }
    }

    pub fn on_resize(&mut self, width: u32) {
        self.page.viewport_width = width;
        if !self.page.modal_shown {
            return;
        }
        if let Some(student) = self.session.cached_student.clone() {
            enroll::render(&mut self.page, &mut self.sched, self.clock.now_ms(), &student);
        }
    }

    pub fn set_filter(&mut self, field: FilterField, value: &str) {
        self.session.filter.set(field, value);
        let contract = self.page.contract().clone();
        let start = self.session.filter.start.clone();
        let end = self.session.filter.end.clone();
        self.page.set_value(&contract.start_date_input, &start);
        self.page.set_value(&contract.end_date_input, &end);
    }

    pub fn apply_filter(&mut self, api: &dyn ApiClient) {
        if self.session.filter.is_empty() {
            self.toasts
                .push("Please select at least one date to filter by", ToastKind::Warning);
            return;
        }
        let student_id = self.session.student_id.clone();
        let (start, end) = self.session.filter.range();
        grid::load(self, api, student_id.as_deref(), start.as_deref(), end.as_deref());
    }

    pub fn reset_filter(&mut self, api: &dyn ApiClient) {
        self.session.filter.clear();
        let contract = self.page.contract().clone();
        self.page.set_value(&contract.start_date_input, "");
        self.page.set_value(&contract.end_date_input, "");
        let student_id = self.session.student_id.clone();
        grid::load(self, api, student_id.as_deref(), None, None);
    }

    /// Pump the cooperative loop: move virtual time forward and run every
    /// task that came due.
    pub fn advance(&mut self, api: &dyn ApiClient, ms: u64) {
        self.clock.advance(ms);
        for task in self.sched.take_due(self.clock.now_ms()) {
            self.run_task(api, task);
        }
    }

    fn run_task(&mut self, api: &dyn ApiClient, task: Task) {
        match task {
            Task::RefreshStudent { student_id } => {
                // The response is discarded when the modal closed meanwhile.
                if !self.page.modal_shown
                    || self.session.student_id.as_deref() != Some(student_id.as_str())
                {
                    return;
                }
                match api.fetch_student(&student_id) {
                    Ok(body) => {
                        let Some(record) = StudentRecord::from_value(&body) else {
                            self.warnings
                                .push("student refresh returned no usable record".to_string());
                            return;
                        };
                        self.render_student_sections(api, &record);
                        self.session.cached_student = Some(record);
                        let (start, end) = self.session.filter.range();
                        grid::load(
                            self,
                            api,
                            Some(&student_id),
                            start.as_deref(),
                            end.as_deref(),
                        );
                    }
                    Err(e) => {
                        // Keep whatever cached state is on screen.
                        self.warnings
                            .push(format!("background student refresh failed: {}", e));
                    }
                }
            }
            Task::FetchSchedule { class_id, marker } => {
                if !self.page.modal_shown {
                    return;
                }
                enroll::run_schedule_fetch(&mut self.page, api, &mut self.warnings, &class_id, &marker);
            }
            Task::ReconcileLate { token } => grid::reconcile_late(self, token),
        }
    }

    /// Fan the record out to the profile and enrollment renderers.
    fn render_student_sections(&mut self, api: &dyn ApiClient, record: &StudentRecord) {
        profile::render(&mut self.page, api, &mut self.warnings, record);
        enroll::render(&mut self.page, &mut self.sched, self.clock.now_ms(), record);
    }

    fn clear_slots(&mut self) {
        let contract = self.page.contract().clone();
        self.page.set_text(&contract.student_name, "Loading...");
        self.page.set_text(&contract.student_id, "");
        self.page.set_html(&contract.student_status, "");
        self.page.set_html(&contract.student_company, "");
        self.page.set_attr(&contract.student_image, "src", DEFAULT_AVATAR);
        self.page.set_html(
            &contract.enrolled_classes,
            "<div class=\"spinner-border spinner-border-sm\" role=\"status\"></div>",
        );
        grid::ensure_structure(&mut self.page);
        grid::show_spinner(&mut self.page);
        grid::reset_stats(self);
        self.page.set_html(grid::FOOTNOTE_SLOT, "");
        self.page.set_value(&contract.start_date_input, "");
        self.page.set_value(&contract.end_date_input, "");
    }
}
