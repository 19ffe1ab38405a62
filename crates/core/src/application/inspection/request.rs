// Run Request

use crate::application::loader::TaskSelection;
use crate::domain::{RunMode, Version};
use std::collections::BTreeMap;

/// Inputs of one inspection run
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Version used for variant selection and `#{version}`
    pub version: Version,
    pub mode: RunMode,
    pub selection: TaskSelection,
    /// User variables bound on every node; they override a node's own
    /// `vars` but never the built-ins
    pub vars: BTreeMap<String, String>,
}

impl RunRequest {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            mode: RunMode::default(),
            selection: TaskSelection::all(),
            vars: BTreeMap::new(),
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_selection(mut self, selection: TaskSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars = vars;
        self
    }
}
