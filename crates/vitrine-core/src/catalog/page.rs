use serde::{Deserialize, Serialize};

/// Static configuration of a single page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Widgets rendered on this page.
    #[serde(default)]
    pub widgets: Vec<String>,

    /// Pages whose same-widget content this page depends on.
    #[serde(default)]
    pub related_pages: Vec<String>,

    /// Validation checks that apply to this page. `None` means all of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checks: Option<Vec<String>>,

    /// Warming order within a tier, lowest first. Defaults to declaration order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

impl PageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn widget(mut self, widget: impl Into<String>) -> Self {
        self.widgets.push(widget.into());
        self
    }

    pub fn related(mut self, page: impl Into<String>) -> Self {
        self.related_pages.push(page.into());
        self
    }

    pub fn checks(mut self, checks: Vec<impl Into<String>>) -> Self {
        self.checks = Some(checks.into_iter().map(Into::into).collect());
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }
}
