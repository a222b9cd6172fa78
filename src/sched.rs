use uuid::Uuid;

/// Virtual milliseconds since the engine started. The host pumps time
/// forward through `clock.advance`; nothing in the engine reads wall time,
/// so throttle windows and delayed passes are fully deterministic.
#[derive(Debug, Default)]
pub struct Clock {
    now_ms: u64,
}

impl Clock {
    pub fn new() -> Self {
        Self { now_ms: 0 }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn advance(&mut self, ms: u64) {
        self.now_ms = self.now_ms.saturating_add(ms);
    }
}

/// Work deferred to a later point of the cooperative loop. Every task
/// re-checks the modal state before touching a slot, so running one after
/// the modal closed is a no-op.
#[derive(Debug, Clone)]
pub enum Task {
    /// Background fetch of the full student record after `modal.open`.
    RefreshStudent { student_id: String },
    /// Schedule fallback for an enrollment card that only had a class id.
    FetchSchedule { class_id: String, marker: String },
    /// Single settle pass over the rendered grid when server stats were
    /// adopted. Stale tokens no-op.
    ReconcileLate { token: Uuid },
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: Vec<(u64, u64, Task)>,
    seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline_ms: u64, task: Task) {
        self.seq += 1;
        self.queue.push((deadline_ms, self.seq, task));
    }

    /// Remove and return every task whose deadline has passed, ordered by
    /// deadline then by insertion.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<Task> {
        let mut due: Vec<(u64, u64, Task)> = Vec::new();
        let mut rest: Vec<(u64, u64, Task)> = Vec::new();
        for entry in self.queue.drain(..) {
            if entry.0 <= now_ms {
                due.push(entry);
            } else {
                rest.push(entry);
            }
        }
        self.queue = rest;
        due.sort_by_key(|(deadline, seq, _)| (*deadline, *seq));
        due.into_iter().map(|(_, _, t)| t).collect()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}
