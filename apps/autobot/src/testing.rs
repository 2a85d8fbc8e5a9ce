//! In-memory stand-ins for the browser, model and image-to-text capabilities.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::browser::selectors::DROPDOWN_OPTIONS;
use crate::browser::{BrowserDriver, DriverError, Locator};
use crate::config::UserPreferences;
use crate::llm_client::{LanguageModel, LlmError};
use crate::resume::ResumeCorpus;
use crate::vision::{ImageToText, VisionError};

/// Side effect of clicking a node.
#[derive(Debug, Clone)]
pub enum Effect {
    Navigate(String),
    Show(usize),
    Hide(usize),
    Check(usize),
}

#[derive(Debug, Clone, Default)]
pub struct FakeNode {
    pub text: String,
    pub value: String,
    pub attributes: HashMap<String, String>,
    pub hidden: bool,
    pub disabled: bool,
    pub checked: bool,
    /// Clicks fail with `NotInteractable`.
    pub blocked: bool,
    /// `set_value` is recorded but leaves the value unchanged.
    pub read_only: bool,
    /// Payload of an element screenshot; `EchoVision` reads it back as text.
    pub ocr: Option<String>,
    pub on_click: Vec<Effect>,
    /// Effects fired when the value becomes exactly the given string.
    pub on_value: Vec<(String, Effect)>,
}

impl FakeNode {
    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn blocked(mut self) -> Self {
        self.blocked = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn ocr(mut self, text: &str) -> Self {
        self.ocr = Some(text.to_string());
        self
    }

    pub fn on_click(mut self, effect: Effect) -> Self {
        self.on_click.push(effect);
        self
    }

    pub fn on_value(mut self, value: &str, effect: Effect) -> Self {
        self.on_value.push((value.to_string(), effect));
        self
    }
}

#[derive(Debug, Default)]
struct Page {
    url: String,
    nodes: Vec<FakeNode>,
    links: HashMap<(usize, Locator), Vec<usize>>,
    opened: Vec<String>,
    writes: HashMap<usize, Vec<String>>,
    clicks: Vec<usize>,
    escapes: usize,
    bottom_scrolls: usize,
    frozen: bool,
}

impl Page {
    fn node(&self, id: usize) -> Result<&FakeNode, DriverError> {
        self.nodes.get(id).ok_or(DriverError::Stale)
    }

    fn node_mut(&mut self, id: usize) -> Result<&mut FakeNode, DriverError> {
        self.nodes.get_mut(id).ok_or(DriverError::Stale)
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Navigate(url) => {
                if !self.frozen {
                    self.url = url;
                }
            }
            Effect::Show(id) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.hidden = false;
                }
            }
            Effect::Hide(id) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.hidden = true;
                }
            }
            Effect::Check(id) => {
                if let Some(node) = self.nodes.get_mut(id) {
                    node.checked = true;
                }
            }
        }
    }

    fn write(&mut self, id: usize, value: &str) -> Result<(), DriverError> {
        self.writes.entry(id).or_default().push(value.to_string());
        let node = self.node_mut(id)?;
        if node.read_only {
            return Ok(());
        }
        node.value = value.to_string();
        let effects: Vec<Effect> = node
            .on_value
            .iter()
            .filter(|(trigger, _)| trigger == value)
            .map(|(_, effect)| effect.clone())
            .collect();
        for effect in effects {
            self.apply(effect);
        }
        Ok(())
    }
}

/// A static DOM tree. Node 0 is the document; relationships are explicit
/// `(scope, locator) -> children` links rather than real selector matching.
pub struct FakeDriver {
    page: Mutex<Page>,
}

impl FakeDriver {
    pub fn new(url: &str) -> Self {
        Self {
            page: Mutex::new(Page {
                url: url.to_string(),
                nodes: vec![FakeNode::default()],
                ..Default::default()
            }),
        }
    }

    fn page(&self) -> std::sync::MutexGuard<'_, Page> {
        self.page.lock().unwrap()
    }

    /// Adds a node without linking it anywhere.
    pub fn add(&self, node: FakeNode) -> usize {
        let mut page = self.page();
        page.nodes.push(node);
        page.nodes.len() - 1
    }

    /// Makes `child` discoverable from `scope` via `locator`.
    pub fn attach(&self, scope: Option<usize>, locator: Locator, child: usize) {
        self.page()
            .links
            .entry((scope.unwrap_or(0), locator))
            .or_default()
            .push(child);
    }

    pub fn add_under(&self, scope: Option<usize>, locator: Locator, node: FakeNode) -> usize {
        let id = self.add(node);
        self.attach(scope, locator, id);
        id
    }

    /// Clicks and `open` calls stop changing the address.
    pub fn freeze_navigation(&self) {
        self.page().frozen = true;
    }

    pub fn node(&self, id: usize) -> FakeNode {
        self.page().nodes[id].clone()
    }

    pub fn writes(&self, id: usize) -> Vec<String> {
        self.page().writes.get(&id).cloned().unwrap_or_default()
    }

    pub fn clicks(&self) -> Vec<usize> {
        self.page().clicks.clone()
    }

    pub fn url(&self) -> String {
        self.page().url.clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.page().opened.clone()
    }

    pub fn escapes(&self) -> usize {
        self.page().escapes
    }

    pub fn bottom_scrolls(&self) -> usize {
        self.page().bottom_scrolls
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    type Element = usize;

    async fn open(&self, url: &str) -> Result<(), DriverError> {
        let mut page = self.page();
        page.opened.push(url.to_string());
        if !page.frozen {
            page.url = url.to_string();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.url())
    }

    async fn find_all(
        &self,
        scope: Option<&usize>,
        locator: &Locator,
    ) -> Result<Vec<usize>, DriverError> {
        let key = (scope.copied().unwrap_or(0), locator.clone());
        Ok(self.page().links.get(&key).cloned().unwrap_or_default())
    }

    async fn text(&self, element: &usize) -> Result<String, DriverError> {
        Ok(self.page().node(*element)?.text.clone())
    }

    async fn value(&self, element: &usize) -> Result<String, DriverError> {
        Ok(self.page().node(*element)?.value.clone())
    }

    async fn attribute(&self, element: &usize, name: &str) -> Result<Option<String>, DriverError> {
        Ok(self.page().node(*element)?.attributes.get(name).cloned())
    }

    async fn is_visible(&self, element: &usize) -> Result<bool, DriverError> {
        Ok(!self.page().node(*element)?.hidden)
    }

    async fn is_enabled(&self, element: &usize) -> Result<bool, DriverError> {
        Ok(!self.page().node(*element)?.disabled)
    }

    async fn is_checked(&self, element: &usize) -> Result<bool, DriverError> {
        Ok(self.page().node(*element)?.checked)
    }

    async fn click(&self, element: &usize) -> Result<(), DriverError> {
        let mut page = self.page();
        let node = page.node_mut(*element)?;
        if node.blocked {
            return Err(DriverError::NotInteractable(format!("node {element}")));
        }
        match node.attributes.get("type").map(String::as_str) {
            Some("checkbox") => node.checked = !node.checked,
            Some("radio") => node.checked = true,
            _ => {}
        }
        let effects = node.on_click.clone();
        page.clicks.push(*element);
        for effect in effects {
            page.apply(effect);
        }
        Ok(())
    }

    async fn set_value(&self, element: &usize, value: &str) -> Result<(), DriverError> {
        self.page().write(*element, value)
    }

    async fn select_by_label(&self, element: &usize, label: &str) -> Result<(), DriverError> {
        let mut page = self.page();
        let options = page
            .links
            .get(&(*element, Locator::css(DROPDOWN_OPTIONS)))
            .cloned()
            .unwrap_or_default();
        let found = options
            .iter()
            .copied()
            .find(|id| page.nodes.get(*id).is_some_and(|n| n.text.trim() == label));
        let Some(chosen) = found else {
            return Err(DriverError::Command(format!("no option labelled '{label}'")));
        };
        page.write(*element, label)?;
        if page.node(*element)?.read_only {
            return Ok(());
        }
        for id in options {
            if let Some(option) = page.nodes.get_mut(id) {
                option.checked = id == chosen;
            }
        }
        Ok(())
    }

    async fn scroll_into_view(&self, element: &usize) -> Result<(), DriverError> {
        self.page().node(*element)?;
        Ok(())
    }

    async fn screenshot(&self, element: Option<&usize>) -> Result<Bytes, DriverError> {
        let page = self.page();
        let ocr = match element {
            Some(id) => page.node(*id)?.ocr.clone(),
            None => None,
        };
        Ok(ocr.map(Bytes::from).unwrap_or_default())
    }

    async fn scroll_to_bottom(&self) -> Result<(), DriverError> {
        self.page().bottom_scrolls += 1;
        Ok(())
    }

    async fn press_escape(&self) -> Result<(), DriverError> {
        self.page().escapes += 1;
        Ok(())
    }
}

/// Model double. Scripted replies are consumed in order, then the fallback repeats.
/// `None` in either place means the call fails.
pub struct ScriptedModel {
    script: Mutex<VecDeque<Option<String>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn sequence(replies: &[&str], fallback: &str) -> Self {
        Self {
            script: Mutex::new(replies.iter().map(|r| Some(r.to_string())).collect()),
            fallback: Some(fallback.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str, _system: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        next.ok_or(LlmError::Api {
            status: 503,
            message: "model unavailable".to_string(),
        })
    }
}

/// Reads screenshot bytes back as UTF-8 text.
#[derive(Default)]
pub struct EchoVision {
    calls: AtomicUsize,
}

impl EchoVision {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageToText for EchoVision {
    async fn read_text(&self, image: &[u8]) -> Result<String, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(String::from_utf8_lossy(image).to_string())
    }
}

pub fn preferences() -> UserPreferences {
    UserPreferences {
        salary_expectation: 120_000,
        location: "San Francisco, CA".to_string(),
        commuting: "Yes".to_string(),
        veteran_status: "No".to_string(),
        disability: "No".to_string(),
        ethnicity: "Prefer not to say".to_string(),
        gender: "Prefer not to say".to_string(),
        address: "1 Market St, San Francisco".to_string(),
        zip_code: "94105".to_string(),
        middle_name: String::new(),
        phone: "555-0100".to_string(),
    }
}

pub fn resume(text: &str) -> ResumeCorpus {
    ResumeCorpus::new(text).unwrap()
}
