//! Main test runner that orchestrates the server and the browser backend

use std::path::PathBuf;
use std::time::Instant;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use imgreg_common::LocalStorage;

use crate::driver::{Backend, Driver, StepResult};
use crate::error::{E2eError, E2eResult};
use crate::page::SimulatedPage;
use crate::playwright::{PlaywrightConfig, PlaywrightHandle};
use crate::server::{ServerConfig, ServerHandle};
use crate::spec::TestSpec;

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
}

impl TestResult {
    fn skipped(spec: &TestSpec) -> Self {
        Self {
            name: spec.name.clone(),
            success: true,
            skipped: true,
            duration_ms: 0,
            steps: vec![],
            error: None,
        }
    }
}

/// Result of running all tests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    pub fn from_single(result: TestResult) -> Self {
        Self {
            total: 1,
            passed: usize::from(result.success && !result.skipped),
            failed: usize::from(!result.success),
            skipped: usize::from(result.skipped),
            duration_ms: result.duration_ms,
            results: vec![result],
        }
    }
}

/// Main E2E test runner
pub struct TestRunner {
    backend: Backend,

    /// Server configuration
    server_config: ServerConfig,

    /// Playwright configuration
    playwright_config: PlaywrightConfig,

    /// Base URL for the simulated backend
    base_url: String,

    /// Local storage shared by every simulated tab
    storage: LocalStorage,

    /// Running server handle (if any)
    server: Option<ServerHandle>,

    /// Test specs directory
    specs_dir: PathBuf,

    /// Output directory for results
    output_dir: PathBuf,
}

impl TestRunner {
    /// Create a new test runner with default configuration
    pub fn new() -> E2eResult<Self> {
        Self::with_config(RunnerConfig::default())
    }

    /// Create a test runner with custom configuration
    pub fn with_config(config: RunnerConfig) -> E2eResult<Self> {
        let storage = match &config.profile_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                LocalStorage::open(dir.join("storage.db"))?
            }
            None => LocalStorage::open_memory()?,
        };

        Ok(Self {
            backend: config.backend,
            server_config: config.server,
            playwright_config: config.playwright,
            base_url: config.base_url,
            storage,
            server: None,
            specs_dir: config.specs_dir,
            output_dir: config.output_dir,
        })
    }

    /// The simulated browser profile's local storage
    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Start the server. Only the Playwright backend needs one.
    pub async fn start_server(&mut self) -> E2eResult<()> {
        if self.server.is_some() || self.backend != Backend::Playwright {
            return Ok(());
        }

        let server = ServerHandle::spawn(self.server_config.clone()).await?;

        // Update playwright config with actual server URL
        self.playwright_config.base_url = server.base_url().to_string();

        self.server = Some(server);
        Ok(())
    }

    /// Stop the server
    pub fn stop_server(&mut self) -> E2eResult<()> {
        if let Some(mut server) = self.server.take() {
            server.stop()?;
        }
        Ok(())
    }

    /// Run all tests in the specs directory
    pub async fn run_all(&mut self) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        self.run_specs(&specs).await
    }

    /// Run tests matching a tag
    pub async fn run_tagged(&mut self, tag: &str) -> E2eResult<TestSuiteResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let filtered: Vec<TestSpec> = TestSpec::filter_by_tag(&specs, tag)
            .into_iter()
            .cloned()
            .collect();
        self.run_specs(&filtered).await
    }

    /// Run a specific test by name
    pub async fn run_test(&mut self, name: &str) -> E2eResult<TestResult> {
        let specs = TestSpec::load_all(&self.specs_dir)?;
        let spec = specs
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| E2eError::SpecParse(format!("Test not found: {}", name)))?;

        self.start_server().await?;
        self.run_spec(&spec).await
    }

    /// Run a list of test specs
    pub async fn run_specs(&mut self, specs: &[TestSpec]) -> E2eResult<TestSuiteResult> {
        let start = Instant::now();
        let mut results = Vec::new();
        let mut passed = 0;
        let mut failed = 0;
        let mut skipped = 0;

        // Ensure server is running
        self.start_server().await?;

        info!("Running {} test(s) with the {:?} backend...", specs.len(), self.backend);

        for spec in specs {
            if spec.skip {
                skipped += 1;
                info!("- {} (skipped)", spec.name);
                results.push(TestResult::skipped(spec));
                continue;
            }

            match self.run_spec(spec).await {
                Ok(result) => {
                    if result.success {
                        passed += 1;
                        info!("✓ {} ({} ms)", result.name, result.duration_ms);
                    } else {
                        failed += 1;
                        error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
                    }
                    results.push(result);
                }
                Err(e) => {
                    failed += 1;
                    error!("✗ {} - {}", spec.name, e);
                    results.push(TestResult {
                        name: spec.name.clone(),
                        success: false,
                        skipped: false,
                        duration_ms: 0,
                        steps: vec![],
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!("Test Results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms);

        Ok(TestSuiteResult {
            total: specs.len(),
            passed,
            failed,
            skipped,
            duration_ms,
            results,
        })
    }

    fn driver(&self) -> E2eResult<Box<dyn Driver>> {
        Ok(match self.backend {
            Backend::Simulated => {
                Box::new(SimulatedPage::new(self.storage.clone(), &self.base_url)?)
            }
            Backend::Playwright => Box::new(PlaywrightHandle::new(self.playwright_config.clone())?),
        })
    }

    /// Run a single test spec in a fresh tab
    pub async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<TestResult> {
        let start = Instant::now();

        let mut driver = self.driver()?;
        debug!("Running test {} on {}", spec.name, driver.name());

        let steps = driver.run_spec(spec).await?;

        // A failing cleanup step does not fail the test
        let test_error = StepResult::first_failure(&steps).map(|step| {
            format!(
                "{}: {}",
                step.step_name,
                step.error.as_deref().unwrap_or("unknown error")
            )
        });
        for step in steps.iter().filter(|s| s.cleanup && !s.success) {
            error!("cleanup step {} failed: {:?}", step.step_name, step.error);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(TestResult {
            name: spec.name.clone(),
            success: test_error.is_none(),
            skipped: false,
            duration_ms,
            steps,
            error: test_error,
        })
    }

    /// Write test results to JSON file
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

impl Drop for TestRunner {
    fn drop(&mut self) {
        let _ = self.stop_server();
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub backend: Backend,
    pub server: ServerConfig,
    pub playwright: PlaywrightConfig,
    /// Base URL the simulated backend resolves relative navigations against
    pub base_url: String,
    /// Persist the simulated profile here; in memory when unset
    pub profile_dir: Option<PathBuf>,
    pub specs_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Simulated,
            server: ServerConfig::default(),
            playwright: PlaywrightConfig::default(),
            base_url: "http://127.0.0.1:8080".to_string(),
            profile_dir: None,
            specs_dir: PathBuf::from("specs"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}
