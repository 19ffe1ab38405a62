//! Check packages - named task lists
//!
//! A package file maps package names to task name patterns:
//!
//! ```yaml
//! ob_basic:
//!   info: basic health of an observer cluster
//!   tasks:
//!     - observer.system.*
//!     - observer.cluster.major_freeze
//! filter:
//!   tasks:
//!     - observer.sysbench.*
//! ```
//!
//! The `filter` entry is reserved. Its patterns are left out of runs that
//! name neither a package nor explicit task patterns.

use crate::application::loader::TaskSelection;
use crate::domain::ConfigError;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Package name holding the default exclusion list
pub const EXCLUSION_PACKAGE: &str = "filter";

#[derive(Debug, Default, Deserialize)]
struct RawPackage {
    #[serde(default, alias = "info_en")]
    info: String,
    tasks: Option<Vec<String>>,
}

/// One named task list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckPackage {
    pub name: String,
    pub info: String,
    /// Task name globs
    pub tasks: Vec<String>,
}

/// Every package of a package file, plus its exclusion list
#[derive(Debug, Clone, Default)]
pub struct PackageCatalog {
    /// Sorted by name, `filter` not included
    packages: Vec<CheckPackage>,
    exclusions: Vec<String>,
}

impl PackageCatalog {
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, Option<RawPackage>> =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut catalog = Self::default();
        for (name, package) in raw {
            let package = package.unwrap_or_default();
            let tasks = package.tasks.unwrap_or_default();
            if name == EXCLUSION_PACKAGE {
                catalog.exclusions = tasks;
            } else {
                catalog.packages.push(CheckPackage {
                    name,
                    info: package.info,
                    tasks,
                });
            }
        }
        Ok(catalog)
    }

    /// Load `path`; a missing file means no packages
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No check package file");
            return Ok(Self::default());
        }
        let yaml = std::fs::read_to_string(path)?;
        let catalog = Self::parse(&yaml)?;
        debug!(
            path = %path.display(),
            packages = catalog.packages.len(),
            exclusions = catalog.exclusions.len(),
            "Check packages loaded"
        );
        Ok(catalog)
    }

    pub fn packages(&self) -> &[CheckPackage] {
        &self.packages
    }

    pub fn exclusions(&self) -> &[String] {
        &self.exclusions
    }

    pub fn get(&self, name: &str) -> Result<&CheckPackage> {
        self.packages.iter().find(|p| p.name == name).ok_or_else(|| {
            let known: Vec<&str> = self.packages.iter().map(|p| p.name.as_str()).collect();
            AppError::NotFound(format!(
                "check package '{}' (known: {})",
                name,
                if known.is_empty() {
                    "none".to_string()
                } else {
                    known.join(", ")
                }
            ))
        })
    }

    /// Tasks for one run
    ///
    /// Explicit `patterns` win, then a named `package`; with neither, every
    /// task except the exclusion list.
    pub fn selection(&self, package: Option<&str>, patterns: &[String]) -> Result<TaskSelection> {
        if !patterns.is_empty() {
            return Ok(TaskSelection::including(patterns.to_vec()));
        }
        match package {
            Some(name) => {
                let package = self.get(name)?;
                if package.tasks.is_empty() {
                    return Err(AppError::Validation(format!(
                        "check package '{}' lists no tasks",
                        name
                    )));
                }
                Ok(TaskSelection::including(package.tasks.clone()))
            }
            None => Ok(TaskSelection::all().excluding(self.exclusions.clone())),
        }
    }
}
