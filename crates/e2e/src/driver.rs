//! Browser backends that can run a test spec

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::E2eResult;
use crate::spec::TestSpec;

/// Result of executing a test step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub success: bool,
    pub step_name: String,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Whether this was one of the spec's `after` steps
    #[serde(default)]
    pub cleanup: bool,
}

impl StepResult {
    /// First failed non-cleanup step, if any
    pub fn first_failure(results: &[StepResult]) -> Option<&StepResult> {
        results.iter().find(|r| !r.success && !r.cleanup)
    }
}

/// Which backend executes the steps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Backend {
    /// In-process simulated page; needs no browser or server
    #[default]
    Simulated,
    /// Real browser driven by Playwright against a spawned server
    Playwright,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simulated" => Ok(Backend::Simulated),
            "playwright" => Ok(Backend::Playwright),
            other => Err(format!("unknown backend: {}", other)),
        }
    }
}

/// A browser that runs a whole spec.
///
/// Steps run in order and stop at the first failure; `after` steps always
/// run and are reported with `cleanup: true`. `Err` is reserved for
/// failures of the backend itself, not of the page under test.
#[async_trait]
pub trait Driver: Send {
    fn name(&self) -> &'static str;

    async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<Vec<StepResult>>;
}
