/// Date-range filter state for the modal. With the picker capability the
/// two inputs are coupled; without it they behave like native date inputs.
#[derive(Debug, Default)]
pub struct FilterState {
    pub start: String,
    pub end: String,
    pub picker: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Start,
    End,
}

impl FilterField {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "start" => Some(FilterField::Start),
            "end" => Some(FilterField::End),
            _ => None,
        }
    }
}

impl FilterState {
    pub fn new(picker: bool) -> Self {
        Self {
            picker,
            ..Self::default()
        }
    }

    /// Apply one edit. In picker mode a start past the end raises the end to
    /// match, and vice versa; ISO day strings compare lexically.
    pub fn set(&mut self, field: FilterField, value: &str) {
        let value = value.trim().to_string();
        match field {
            FilterField::Start => {
                self.start = value;
                if self.picker && !self.start.is_empty() && !self.end.is_empty() && self.start > self.end {
                    self.end = self.start.clone();
                }
            }
            FilterField::End => {
                self.end = value;
                if self.picker && !self.start.is_empty() && !self.end.is_empty() && self.end < self.start {
                    self.start = self.end.clone();
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.start.clear();
        self.end.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    pub fn range(&self) -> (Option<String>, Option<String>) {
        let pick = |s: &String| {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        };
        (pick(&self.start), pick(&self.end))
    }
}
