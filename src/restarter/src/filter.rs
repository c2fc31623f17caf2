use crate::model::PodRecord;

pub const DEFAULT_NAME_FILTER: &str = "database";

/// Case-sensitive substring match on pod names, in any namespace
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameFilter {
    needle: String,
}

impl NameFilter {
    pub fn new(needle: impl Into<String>) -> Self {
        Self { needle: needle.into() }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn matches(&self, pod: &PodRecord) -> bool {
        pod.name.contains(self.needle.as_str())
    }
}

impl Default for NameFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_FILTER)
    }
}
