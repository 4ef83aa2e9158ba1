//! In-process simulation of the registration page
//!
//! Renders the same element structure, classes, and computed colors as the
//! served page, and keeps records in a [`LocalStorage`] profile exactly as
//! the page keeps them in the browser. Specs run against it without a
//! browser or a server.

pub mod dom;

use async_trait::async_trait;
use imgreg_common::{
    dom as ids, Field, Indicator, LocalStorage, Origin, Registrar, RegistrationStore,
    SubmitOutcome, SubmitTrigger,
};
use std::time::Instant;
use tracing::{debug, info};
use url::Url;

use crate::driver::{Driver, StepResult};
use crate::error::{E2eError, E2eResult};
use crate::spec::{AttributeAssertion, Pick, TestSpec, TestStep, WaitState};
use dom::{Document, NodeId, Selector};

/// Paths that serve the registration page
const PAGE_PATHS: [&str; 2] = ["/", "/index.html"];

/// A loaded instance of the registration page
struct LoadedPage {
    url: Url,
    registrar: Registrar,
    doc: Document,
    focused: Option<NodeId>,
    form: NodeId,
    card_list: NodeId,
    /// Rendered cards as (card, image, caption), reused across renders
    cards: Vec<(NodeId, NodeId, NodeId)>,
    inputs: [(Field, NodeId); 2],
    feedback: [(Field, NodeId); 2],
    submit_button: NodeId,
}

impl LoadedPage {
    fn load(url: Url, storage: &LocalStorage) -> E2eResult<Self> {
        let origin = Origin::from_url(url.as_str())?;
        let registrar = Registrar::open(RegistrationStore::new(storage.area(origin)))?;

        let mut doc = Document::new();
        let body = doc.append(Document::ROOT, "body", None, &[]);
        let main = doc.append(body, "main", None, &["container"]);
        let heading = doc.append(main, "h1", None, &[]);
        doc.node_mut(heading).text = "Image Registration".to_string();

        let form = doc.append(main, "form", Some(ids::FORM), &[]);
        let mut inputs = [(Field::Title, 0); 2];
        let mut feedback = [(Field::Title, 0); 2];
        for (i, field) in Field::ALL.into_iter().enumerate() {
            let wrapper = doc.append(form, "div", None, &["field"]);
            let label = doc.append(wrapper, "label", None, &[]);
            doc.node_mut(label).text = match field {
                Field::Title => "Title".to_string(),
                Field::ImageUrl => "Image URL".to_string(),
            };

            let fb = doc.append(wrapper, "div", Some(field.feedback_id()), &["invalid-feedback"]);
            doc.node_mut(fb).text = field.feedback_text().to_string();

            let input = doc.append(wrapper, "input", Some(field.input_id()), &["form-control"]);
            let kind = match field {
                Field::Title => "text",
                Field::ImageUrl => "url",
            };
            let node = doc.node_mut(input);
            node.attributes.insert("type".to_string(), kind.to_string());
            node.attributes.insert("name".to_string(), field.input_id().to_string());
            node.value = Some(String::new());

            inputs[i] = (field, input);
            feedback[i] = (field, fb);
        }

        let submit_button = doc.append(form, "button", Some(ids::SUBMIT_BUTTON), &["btn"]);
        doc.node_mut(submit_button)
            .attributes
            .insert("type".to_string(), "submit".to_string());
        doc.node_mut(submit_button).text = "Submit".to_string();

        let card_list = doc.append(main, "section", Some(ids::CARD_LIST), &["card-list"]);

        let mut page = Self {
            url,
            registrar,
            doc,
            focused: None,
            form,
            card_list,
            cards: Vec::new(),
            inputs,
            feedback,
            submit_button,
        };
        page.render();
        Ok(page)
    }

    /// Bring the document in line with the registrar state
    fn render(&mut self) {
        let form = self.registrar.form();

        for (field, input) in self.inputs {
            let indicator = form.indicator(field);
            let value = form.value(field).to_string();
            self.doc.node_mut(input).value = Some(value);
            self.doc.set_class(input, "is-valid", indicator == Indicator::Success);
            self.doc.set_class(input, "is-invalid", indicator == Indicator::Error);
        }
        for (field, fb) in self.feedback {
            self.doc.set_class(fb, "d-block", form.feedback(field).is_some());
        }

        let shown = self.registrar.records().len();
        for (i, record) in self.registrar.records().iter().enumerate() {
            let (img, caption) = match self.cards.get(i).copied() {
                Some((_, img, caption)) => (img, caption),
                None => {
                    let card = self
                        .doc
                        .append(self.card_list, "article", None, &[ids::CARD_CLASS]);
                    let img = self.doc.append(card, "img", None, &[ids::CARD_IMAGE_CLASS]);
                    let caption = self.doc.append(card, "h2", None, &[ids::CARD_TITLE_CLASS]);
                    self.cards.push((card, img, caption));
                    (img, caption)
                }
            };
            let attrs = &mut self.doc.node_mut(img).attributes;
            attrs.insert("src".to_string(), record.image_url.clone());
            attrs.insert("alt".to_string(), record.title.clone());
            self.doc.node_mut(caption).text = record.title.clone();
        }
        if self.cards.len() > shown {
            for (card, _, _) in self.cards.split_off(shown) {
                self.doc.detach(card);
            }
        }
    }

    fn field_of(&self, node: NodeId) -> Option<Field> {
        self.inputs
            .iter()
            .find(|(_, input)| *input == node)
            .map(|(field, _)| *field)
    }

    fn in_form(&self, node: NodeId) -> bool {
        node == self.form || self.doc.ancestors(node).any(|a| a == self.form)
    }

    fn submit(&mut self, trigger: SubmitTrigger) -> E2eResult<()> {
        match self.registrar.submit(trigger)? {
            SubmitOutcome::Accepted { record, position } => {
                debug!("Accepted \"{}\" at position {}", record.title, position);
            }
            SubmitOutcome::Rejected(rejection) => {
                debug!("Rejected: {:?}", rejection.errors);
            }
        }
        self.render();
        Ok(())
    }

    /// Computed `display` as the stylesheet would produce it
    fn display(&self, node: NodeId) -> &'static str {
        let n = self.doc.node(node);
        if n.has_class("invalid-feedback") && !n.has_class("d-block") {
            return "none";
        }
        match n.tag.as_str() {
            "input" | "button" | "img" | "label" => "inline-block",
            _ => "block",
        }
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.doc.is_attached(node)
            && self.display(node) != "none"
            && self.doc.ancestors(node).all(|a| self.display(a) != "none")
    }

    /// Computed style property, for the properties the stylesheet sets
    fn computed_style(&self, node: NodeId, property: &str) -> Option<String> {
        let n = self.doc.node(node);
        match property {
            "display" => Some(self.display(node).to_string()),
            p if p.starts_with("border") && p.ends_with("color") => {
                if !n.has_class("form-control") && !n.has_class(ids::CARD_CLASS) {
                    return None;
                }
                let indicator = if n.has_class("is-invalid") {
                    Indicator::Error
                } else if n.has_class("is-valid") {
                    Indicator::Success
                } else {
                    Indicator::Neutral
                };
                Some(indicator.border_color().to_string())
            }
            "color" if n.has_class("invalid-feedback") => {
                Some(Indicator::Error.border_color().to_string())
            }
            _ => None,
        }
    }
}

/// Simulated browser tab sharing a local storage profile
pub struct SimulatedPage {
    storage: LocalStorage,
    base_url: Url,
    page: Option<LoadedPage>,
}

impl SimulatedPage {
    /// Create a tab whose relative navigations resolve against `base_url`
    pub fn new(storage: LocalStorage, base_url: &str) -> E2eResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| E2eError::Navigation(format!("invalid base URL {}: {}", base_url, e)))?;
        Ok(Self {
            storage,
            base_url,
            page: None,
        })
    }

    pub fn storage(&self) -> &LocalStorage {
        &self.storage
    }

    /// Origin of the loaded page, or of the base URL before any navigation
    pub fn origin(&self) -> E2eResult<Origin> {
        let url = self.page.as_ref().map_or(&self.base_url, |p| &p.url);
        Ok(Origin::from_url(url.as_str())?)
    }

    fn loaded(&self) -> E2eResult<&LoadedPage> {
        self.page
            .as_ref()
            .ok_or_else(|| E2eError::Navigation("no page loaded".to_string()))
    }

    fn loaded_mut(&mut self) -> E2eResult<&mut LoadedPage> {
        self.page
            .as_mut()
            .ok_or_else(|| E2eError::Navigation("no page loaded".to_string()))
    }

    /// Load the page at `url`, relative to the base URL
    pub fn navigate(&mut self, url: &str) -> E2eResult<()> {
        let target = self
            .base_url
            .join(url)
            .map_err(|e| E2eError::Navigation(format!("{}: {}", url, e)))?;

        if !PAGE_PATHS.contains(&target.path()) {
            return Err(E2eError::Navigation(format!("404 Not Found: {}", target)));
        }

        info!("Navigating to {}", target);
        self.page = Some(LoadedPage::load(target, &self.storage)?);
        Ok(())
    }

    /// Reload the current page from storage
    pub fn reload(&mut self) -> E2eResult<()> {
        let url = self.loaded()?.url.clone();
        debug!("Reloading {}", url);
        self.page = Some(LoadedPage::load(url, &self.storage)?);
        Ok(())
    }

    fn query(&self, selector: &str) -> E2eResult<Vec<NodeId>> {
        let selector = Selector::parse(selector)?;
        Ok(self.loaded()?.doc.query_all(&selector))
    }

    fn query_one(&self, selector: &str) -> E2eResult<NodeId> {
        self.query(selector)?
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotFound(selector.to_string()))
    }

    /// Focus an element and type text into it. Typing into a field
    /// validates it immediately.
    pub fn type_text(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        if text.is_empty() {
            debug!("Nothing to type into {}", selector);
            return Ok(());
        }

        let node = self.query_one(selector)?;
        let page = self.loaded_mut()?;
        let field = page.field_of(node).ok_or_else(|| E2eError::StepFailed {
            step: format!("type:{}", selector),
            reason: "element is not a text input".to_string(),
        })?;

        page.focused = Some(node);
        page.registrar.input(field, text);
        page.render();
        Ok(())
    }

    /// Replace an input's value
    pub fn fill(&mut self, selector: &str, value: &str) -> E2eResult<()> {
        let node = self.query_one(selector)?;
        let page = self.loaded_mut()?;
        let field = page.field_of(node).ok_or_else(|| E2eError::StepFailed {
            step: format!("fill:{}", selector),
            reason: "element is not a text input".to_string(),
        })?;

        page.focused = Some(node);
        page.registrar.fill(field, value);
        page.render();
        Ok(())
    }

    /// Click an element. Clicking the submit button submits the form.
    pub fn click(&mut self, selector: &str) -> E2eResult<()> {
        let node = self.query_one(selector)?;
        if !self.loaded()?.is_visible(node) {
            return Err(E2eError::StepFailed {
                step: format!("click:{}", selector),
                reason: "element is not visible".to_string(),
            });
        }

        let page = self.loaded_mut()?;
        let focusable = node == page.submit_button || page.field_of(node).is_some();
        page.focused = focusable.then_some(node);

        if node == page.submit_button {
            page.submit(SubmitTrigger::Button)?;
        }
        Ok(())
    }

    pub fn focus(&mut self, selector: &str) -> E2eResult<()> {
        let node = self.query_one(selector)?;
        self.loaded_mut()?.focused = Some(node);
        Ok(())
    }

    /// Press a key on an element, or on whatever has focus
    pub fn press(&mut self, selector: Option<&str>, key: &str) -> E2eResult<()> {
        if let Some(selector) = selector {
            self.focus(selector)?;
        }

        let page = self.loaded_mut()?;
        let Some(focused) = page.focused else {
            debug!("Key {} pressed with nothing focused", key);
            return Ok(());
        };

        match key {
            "Enter" if page.in_form(focused) => page.submit(SubmitTrigger::EnterKey)?,
            "Tab" => {
                let order = [page.inputs[0].1, page.inputs[1].1, page.submit_button];
                let next = order
                    .iter()
                    .position(|&n| n == focused)
                    .and_then(|i| order.get(i + 1).copied());
                page.focused = next;
            }
            "Backspace" => {
                if let Some(field) = page.field_of(focused) {
                    let mut value = page.registrar.form().value(field).to_string();
                    value.pop();
                    page.registrar.fill(field, &value);
                    page.render();
                }
            }
            k if k.chars().count() == 1 => {
                if let Some(field) = page.field_of(focused) {
                    page.registrar.input(field, k);
                    page.render();
                }
            }
            other => debug!("Ignoring key {}", other),
        }
        Ok(())
    }

    fn wait(&self, selector: &str, state: &WaitState) -> E2eResult<()> {
        let nodes = self.query(selector)?;
        let page = self.loaded()?;
        let satisfied = match state {
            WaitState::Attached => !nodes.is_empty(),
            WaitState::Detached => nodes.is_empty(),
            WaitState::Visible => nodes.iter().any(|&n| page.is_visible(n)),
            WaitState::Hidden => nodes.iter().all(|&n| !page.is_visible(n)),
        };

        // The simulated page settles synchronously, so waiting longer
        // cannot change the outcome.
        if satisfied {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("{} to be {}", selector, state.as_str())))
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assert(
        &self,
        selector: &str,
        visible: Option<bool>,
        text: Option<&str>,
        text_contains: Option<&str>,
        value: Option<&str>,
        attribute: Option<&AttributeAssertion>,
        count: Option<usize>,
    ) -> E2eResult<()> {
        let nodes = self.query(selector)?;
        let page = self.loaded()?;

        if let Some(expected) = count {
            if nodes.len() != expected {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} element(s) for {}, found {}",
                    expected,
                    selector,
                    nodes.len()
                )));
            }
        }

        let needs_element = visible == Some(true)
            || text.is_some()
            || text_contains.is_some()
            || value.is_some()
            || attribute.is_some();
        if nodes.is_empty() {
            if needs_element {
                return Err(E2eError::ElementNotFound(selector.to_string()));
            }
            return Ok(());
        }
        let first = nodes[0];

        if let Some(expected) = visible {
            let actual = page.is_visible(first);
            if actual != expected {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} to be {}",
                    selector,
                    if expected { "visible" } else { "hidden" }
                )));
            }
        }

        // Text assertions look at the combined text of all matches, like a
        // jQuery collection does.
        let combined: String = nodes.iter().map(|&n| page.doc.text_content(n)).collect();
        if let Some(expected) = text {
            if combined.trim() != expected {
                return Err(E2eError::AssertionFailed(format!(
                    "expected text of {} to be {:?}, got {:?}",
                    selector, expected, combined
                )));
            }
        }
        if let Some(expected) = text_contains {
            if !combined.contains(expected) {
                return Err(E2eError::AssertionFailed(format!(
                    "expected text of {} to contain {:?}, got {:?}",
                    selector, expected, combined
                )));
            }
        }

        if let Some(expected) = value {
            let actual = page.doc.node(first).value.as_deref().unwrap_or("");
            if actual != expected {
                return Err(E2eError::AssertionFailed(format!(
                    "expected value of {} to be {:?}, got {:?}",
                    selector, expected, actual
                )));
            }
        }

        if let Some(attr) = attribute {
            let node = match attr.pick {
                Pick::First => first,
                Pick::Last => nodes[nodes.len() - 1],
            };
            let actual = page.doc.node(node).attributes.get(&attr.name);
            let Some(actual) = actual else {
                return Err(E2eError::AssertionFailed(format!(
                    "{} has no attribute {}",
                    selector, attr.name
                )));
            };
            if let Some(expected) = &attr.value {
                if actual != expected {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected {}[{}] to be {:?}, got {:?}",
                        selector, attr.name, expected, actual
                    )));
                }
            }
            if let Some(expected) = &attr.contains {
                if !actual.contains(expected.as_str()) {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected {}[{}] to contain {:?}, got {:?}",
                        selector, attr.name, expected, actual
                    )));
                }
            }
        }

        Ok(())
    }

    fn assert_style(&self, selector: &str, property: &str, expected: &str) -> E2eResult<()> {
        let node = self.query_one(selector)?;
        let actual = self
            .loaded()?
            .computed_style(node, property)
            .ok_or_else(|| E2eError::AssertionFailed(format!(
                "{} has no computed {} in the simulated page",
                selector, property
            )))?;

        if actual != expected {
            return Err(E2eError::AssertionFailed(format!(
                "expected {} of {} to be {}, got {}",
                property, selector, expected, actual
            )));
        }
        Ok(())
    }

    fn assert_storage(
        &self,
        key: &str,
        last: Option<&serde_json::Value>,
        length: Option<usize>,
    ) -> E2eResult<()> {
        let origin = self.origin()?;
        // A missing key reads as an empty list, as in the browser driver
        let list: Vec<serde_json::Value> = match self.storage.get_item(&origin, key)? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Vec::new(),
        };

        if let Some(expected) = length {
            if list.len() != expected {
                return Err(E2eError::AssertionFailed(format!(
                    "expected {} item(s) under {}, found {}",
                    expected,
                    key,
                    list.len()
                )));
            }
        }

        if let Some(expected) = last {
            match list.last() {
                Some(actual) if actual == expected => {}
                actual => {
                    return Err(E2eError::AssertionFailed(format!(
                        "expected last item under {} to be {}, got {}",
                        key,
                        expected,
                        actual.map_or("nothing".to_string(), |v| v.to_string())
                    )))
                }
            }
        }
        Ok(())
    }

    fn clear_storage(&mut self) -> E2eResult<()> {
        let origin = self.origin()?;
        self.storage.clear(&origin)?;
        Ok(())
    }

    /// Execute a single step
    pub fn execute(&mut self, step: &TestStep) -> E2eResult<()> {
        match step {
            TestStep::Navigate { url, wait_for_selector } => {
                self.navigate(url)?;
                if let Some(selector) = wait_for_selector {
                    self.wait(selector, &WaitState::Visible)?;
                }
                Ok(())
            }
            TestStep::Reload => self.reload(),
            TestStep::Click { selector, .. } => self.click(selector),
            TestStep::Fill { selector, value, .. } => self.fill(selector, value),
            TestStep::Type { selector, text, .. } => self.type_text(selector, text),
            TestStep::Press { selector, key } => self.press(selector.as_deref(), key),
            TestStep::Focus { selector } => self.focus(selector),
            TestStep::Wait { selector, state, .. } => self.wait(selector, state),
            TestStep::Sleep { ms } => {
                debug!("Skipping {} ms sleep", ms);
                Ok(())
            }
            TestStep::Assert {
                selector,
                visible,
                text,
                text_contains,
                value,
                attribute,
                count,
            } => self.assert(
                selector,
                *visible,
                text.as_deref(),
                text_contains.as_deref(),
                value.as_deref(),
                attribute.as_ref(),
                *count,
            ),
            TestStep::AssertStyle { selector, property, value } => {
                self.assert_style(selector, property, value)
            }
            TestStep::AssertStorage { key, last, length } => {
                self.assert_storage(key, last.as_ref(), *length)
            }
            TestStep::ClearStorage => self.clear_storage(),
            TestStep::ClearAllStorage => {
                self.storage.clear_all()?;
                Ok(())
            }
            TestStep::Log { message } => {
                info!("[TEST LOG] {}", message);
                Ok(())
            }
        }
    }

    fn timed(&mut self, step: &TestStep, cleanup: bool) -> StepResult {
        let start = Instant::now();
        let result = self.execute(step);
        StepResult {
            success: result.is_ok(),
            step_name: step.name(),
            duration_ms: start.elapsed().as_millis() as u64,
            error: result.err().map(|e| e.to_string()),
            cleanup,
        }
    }
}

#[async_trait]
impl Driver for SimulatedPage {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn run_spec(&mut self, spec: &TestSpec) -> E2eResult<Vec<StepResult>> {
        let mut results = Vec::new();

        for step in &spec.steps {
            let result = self.timed(step, false);
            let failed = !result.success;
            results.push(result);
            if failed {
                break; // Stop on first failure
            }
        }

        for step in &spec.after {
            results.push(self.timed(step, true));
        }

        Ok(results)
    }
}
