//! Playwright browser automation
//!
//! A spec is compiled into one Node script so the page, its focus, and its
//! local storage persist from step to step. Each step reports a JSON line on
//! stdout; everything else the script prints goes to stderr.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tokio::process::Command as TokioCommand;
use tracing::{debug, info, warn};

use crate::driver::{Driver, StepResult};
use crate::error::{E2eError, E2eResult};
use crate::spec::{AttributeAssertion, Pick, TestSpec, TestStep};

/// Playwright browser handle
pub struct PlaywrightHandle {
    config: PlaywrightConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(format!("unknown browser: {}", other)),
        }
    }
}

/// One line of step output from the generated script
#[derive(Debug, Deserialize)]
struct StepReport {
    step: usize,
    name: String,
    success: bool,
    duration_ms: u64,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    cleanup: bool,
}

impl From<StepReport> for StepResult {
    fn from(r: StepReport) -> Self {
        StepResult {
            success: r.success,
            step_name: r.name,
            duration_ms: r.duration_ms,
            error: r.error,
            cleanup: r.cleanup,
        }
    }
}

/// Quote a string as a JavaScript string literal
fn js_str(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

impl PlaywrightHandle {
    /// Create a new Playwright handle
    pub fn new(config: PlaywrightConfig) -> E2eResult<Self> {
        // Verify playwright is installed
        Self::check_playwright_installed(&config)?;

        Ok(Self { config })
    }

    /// Create a handle without checking for an installation, for script
    /// generation only
    #[cfg(test)]
    fn unchecked(config: PlaywrightConfig) -> Self {
        Self { config }
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(config: &PlaywrightConfig) -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&config.node_project_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Build the Playwright script for a whole spec
    pub fn build_script(&self, spec: &TestSpec) -> String {
        let mut script = String::new();

        // Header
        script.push_str(&format!(
            r#"
const {{ chromium, firefox, webkit }} = require('playwright');
const {{ expect }} = require('@playwright/test');

const report = (entry) => process.stdout.write(JSON.stringify(entry) + '\n');

async function step(index, name, cleanup, body) {{
  const started = Date.now();
  try {{
    await body();
    report({{ step: index, name, cleanup, success: true, duration_ms: Date.now() - started }});
  }} catch (error) {{
    report({{ step: index, name, cleanup, success: false, duration_ms: Date.now() - started, error: error.message }});
    throw error;
  }}
}}

(async () => {{
  const browser = await {browser}.launch({{ headless: {headless} }});
  const context = await browser.newContext({{
    viewport: {{ width: {width}, height: {height} }}
  }});
  const page = await context.newPage();
  const baseUrl = {base_url};
  let failed = false;

  try {{
"#,
            browser = self.config.browser.as_str(),
            headless = self.config.headless,
            width = spec.viewport.width,
            height = spec.viewport.height,
            base_url = js_str(&self.config.base_url),
        ));

        for (i, step) in spec.steps.iter().enumerate() {
            script.push_str(&self.wrap_step(i, step, false));
        }

        script.push_str(
            r#"
  } catch (error) {
    failed = true;
  } finally {
"#,
        );

        // Cleanup steps run regardless and never abort each other
        let offset = spec.steps.len();
        for (i, step) in spec.after.iter().enumerate() {
            script.push_str("    try {\n");
            script.push_str(&self.wrap_step(offset + i, step, true));
            script.push_str("    } catch (error) {\n      failed = true;\n    }\n");
        }

        // Footer
        script.push_str(
            r#"
    await browser.close();
  }
  process.exit(failed ? 1 : 0);
})();
"#,
        );

        script
    }

    fn wrap_step(&self, index: usize, step: &TestStep, cleanup: bool) -> String {
        format!(
            "\n    // Step {}: {}\n    await step({}, {}, {}, async () => {{\n{}\n    }});\n",
            index + 1,
            step.name(),
            index,
            js_str(&step.name()),
            cleanup,
            self.step_to_js(step),
        )
    }

    /// Convert a step to JavaScript code
    fn step_to_js(&self, step: &TestStep) -> String {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                let wait = wait_for_selector
                    .as_ref()
                    .map(|s| format!("\n      await page.waitForSelector({});", js_str(s)))
                    .unwrap_or_default();
                format!(
                    "      await page.goto(new URL({}, baseUrl).href);{}",
                    js_str(url),
                    wait
                )
            }
            TestStep::Reload => "      await page.reload();".to_string(),
            TestStep::Click { selector, timeout_ms } => {
                let timeout = timeout_ms.unwrap_or(5000);
                format!(
                    "      await page.click({}, {{ timeout: {} }});",
                    js_str(selector),
                    timeout
                )
            }
            TestStep::Fill { selector, value, clear_first } => {
                if *clear_first {
                    format!(
                        "      await page.fill({sel}, '');\n      await page.fill({sel}, {val});",
                        sel = js_str(selector),
                        val = js_str(value)
                    )
                } else {
                    format!(
                        "      await page.fill({}, {});",
                        js_str(selector),
                        js_str(value)
                    )
                }
            }
            TestStep::Type { selector, text, delay_ms } => {
                if text.is_empty() {
                    return "      // nothing to type".to_string();
                }
                let delay = delay_ms.unwrap_or(10);
                format!(
                    "      await page.locator({}).pressSequentially({}, {{ delay: {} }});",
                    js_str(selector),
                    js_str(text),
                    delay
                )
            }
            TestStep::Press { selector, key } => match selector {
                Some(sel) => format!(
                    "      await page.locator({}).press({});",
                    js_str(sel),
                    js_str(key)
                ),
                None => format!("      await page.keyboard.press({});", js_str(key)),
            },
            TestStep::Focus { selector } => {
                format!("      await page.focus({});", js_str(selector))
            }
            TestStep::Wait { selector, timeout_ms, state } => format!(
                "      await page.waitForSelector({}, {{ state: '{}', timeout: {} }});",
                js_str(selector),
                state.as_str(),
                timeout_ms
            ),
            TestStep::Sleep { ms } => format!("      await page.waitForTimeout({});", ms),
            TestStep::Assert {
                selector,
                visible,
                text,
                text_contains,
                value,
                attribute,
                count,
            } => {
                let loc = format!("page.locator({})", js_str(selector));
                let mut assertions = Vec::new();

                if let Some(c) = count {
                    assertions.push(format!("      await expect({}).toHaveCount({});", loc, c));
                }
                if let Some(vis) = visible {
                    let matcher = if *vis { "toBeVisible" } else { "toBeHidden" };
                    assertions.push(format!("      await expect({}.first()).{}();", loc, matcher));
                }
                if let Some(t) = text {
                    assertions.push(format!(
                        "      await expect({}.first()).toHaveText({});",
                        loc,
                        js_str(t)
                    ));
                }
                if let Some(tc) = text_contains {
                    assertions.push(format!(
                        "      await expect({}.first()).toContainText({});",
                        loc,
                        js_str(tc)
                    ));
                }
                if let Some(v) = value {
                    assertions.push(format!(
                        "      await expect({}.first()).toHaveValue({});",
                        loc,
                        js_str(v)
                    ));
                }
                if let Some(attr) = attribute {
                    assertions.push(attribute_to_js(&loc, attr));
                }

                assertions.join("\n")
            }
            TestStep::AssertStyle { selector, property, value } => format!(
                "      await expect.poll(() => page.locator({}).first().evaluate(\n        (el, prop) => getComputedStyle(el).getPropertyValue(prop), {})).toBe({});",
                js_str(selector),
                js_str(property),
                js_str(value)
            ),
            TestStep::AssertStorage { key, last, length } => {
                let read = format!(
                    "JSON.parse((await page.evaluate((k) => localStorage.getItem(k), {})) ?? '[]')",
                    js_str(key)
                );
                let mut assertions = Vec::new();
                if let Some(n) = length {
                    assertions.push(format!(
                        "      await expect.poll(async () => {}.length).toBe({});",
                        read, n
                    ));
                }
                if let Some(expected) = last {
                    assertions.push(format!(
                        "      await expect.poll(async () => {}.at(-1)).toEqual({});",
                        read, expected
                    ));
                }
                assertions.join("\n")
            }
            // Each spec gets a fresh browser context that only ever visits the
            // served origin, so clearing it clears everything the spec wrote.
            TestStep::ClearStorage | TestStep::ClearAllStorage => {
                "      if (page.url().startsWith('http')) await page.evaluate(() => localStorage.clear());"
                    .to_string()
            }
            TestStep::Log { message } => {
                format!("      console.error('[TEST]', {});", js_str(message))
            }
        }
    }

    /// Execute a script via Node and return its step reports
    pub async fn run_script(&self, script: &str) -> E2eResult<Vec<StepResult>> {
        // Write script to temp file
        let temp_dir = tempfile::tempdir()?;
        let script_path = temp_dir.path().join("spec.js");
        std::fs::write(&script_path, script)?;

        debug!("Running Playwright script: {}", script_path.display());

        // Modules resolve from the project that has Playwright installed
        let node_path = self.config.node_project_dir.join("node_modules");
        let output = TokioCommand::new("node")
            .arg(&script_path)
            .current_dir(&self.config.node_project_dir)
            .env("NODE_PATH", &node_path)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!("[node] {}", line);
        }

        let mut results = Vec::new();
        for line in stdout.lines().filter(|l| l.starts_with('{')) {
            match serde_json::from_str::<StepReport>(line) {
                Ok(report) => {
                    debug!("Step {} reported", report.step);
                    results.push(report.into());
                }
                Err(e) => warn!("Ignoring unparseable script output {:?}: {}", line, e),
            }
        }

        if results.is_empty() && !output.status.success() {
            return Err(E2eError::Playwright(format!(
                "Script failed before running any step:\nstdout: {}\nstderr: {}",
                stdout, stderr
            )));
        }

        Ok(results)
    }
}

fn attribute_to_js(loc: &str, attr: &AttributeAssertion) -> String {
    let target = match attr.pick {
        Pick::First => format!("{}.first()", loc),
        Pick::Last => format!("{}.last()", loc),
    };
    let mut lines = Vec::new();
    if let Some(val) = &attr.value {
        lines.push(format!(
            "      await expect({}).toHaveAttribute({}, {});",
            target,
            js_str(&attr.name),
            js_str(val)
        ));
    }
    if let Some(part) = &attr.contains {
        lines.push(format!(
            "      await expect.poll(() => {}.getAttribute({})).toContain({});",
            target,
            js_str(&attr.name),
            js_str(part)
        ));
    }
    if lines.is_empty() {
        lines.push(format!(
            "      await expect({}).toHaveAttribute({});",
            target,
            js_str(&attr.name)
        ));
    }
    lines.join("\n")
}

#[async_trait]
impl Driver for PlaywrightHandle {
    fn name(&self) -> &'static str {
        "playwright"
    }

    async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<Vec<StepResult>> {
        info!(
            "Running {} in {} against {}",
            spec.name,
            self.config.browser.as_str(),
            self.config.base_url
        );
        let script = self.build_script(spec);
        self.run_script(&script).await
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub base_url: String,
    pub browser: Browser,
    pub headless: bool,
    /// Directory whose `node_modules` provides `playwright` and
    /// `@playwright/test`
    pub node_project_dir: PathBuf,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            browser: Browser::Chromium,
            headless: true,
            node_project_dir: PathBuf::from("."),
        }
    }
}
