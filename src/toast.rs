use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub message: String,
    pub kind: ToastKind,
}

/// Collecting toast sink. The IPC layer drains it into each response so the
/// host shell can display the notifications and tests can record them.
#[derive(Debug, Default)]
pub struct Toasts {
    queued: Vec<Toast>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: impl Into<String>, kind: ToastKind) {
        self.queued.push(Toast {
            message: message.into(),
            kind,
        });
    }

    pub fn drain(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.queued)
    }
}
