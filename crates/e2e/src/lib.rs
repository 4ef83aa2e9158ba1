//! imgreg E2E test framework
//!
//! Runs declarative YAML scenarios against the image registration page:
//! - Parses test specs into typed steps
//! - Executes them on a simulated page backed by the shared local storage
//!   engine, or in a real browser via Playwright
//! - Spawns the web server as a subprocess for browser runs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    E2E Test Runner (Rust)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                 │
//! │    ├── start_server() -> ServerHandle   (playwright only)   │
//! │    ├── driver() -> Box<dyn Driver>                          │
//! │    │     ├── SimulatedPage                                  │
//! │    │     └── PlaywrightHandle                               │
//! │    └── run_spec(spec: TestSpec) -> TestResult               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSpec (YAML)                                            │
//! │    ├── name, description, tags                              │
//! │    ├── steps: [Step]                                        │
//! │    │     ├── navigate / reload                              │
//! │    │     ├── type / fill / click / press                    │
//! │    │     ├── assert / assert_style / assert_storage         │
//! │    │     └── clear_storage / clear_all_storage              │
//! │    └── after: [Step]                                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod page;
pub mod playwright;
pub mod runner;
pub mod server;
pub mod spec;

pub use driver::{Backend, Driver, StepResult};
pub use error::{E2eError, E2eResult};
pub use page::SimulatedPage;
pub use runner::{RunnerConfig, TestResult, TestRunner, TestSuiteResult};
pub use spec::{TestSpec, TestStep};
