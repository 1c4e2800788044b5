//! In-memory site used by the engine tests.

use crate::error::{Result, ScanError};
use crate::probe::NAVIGATION_TIMING_SCRIPT;
use crate::session::{ANCHOR_HREFS_SCRIPT, RenderSession};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
struct FakePage {
    links: Vec<Option<String>>,
    timing_ms: f64,
    redirect_to: Option<String>,
    fails: bool,
    links_error: bool,
    timing_error: bool,
}

#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    pages: HashMap<String, FakePage>,
    current: Option<String>,
    pub navigations: Vec<String>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, timing_ms: f64, links: &[&str]) -> Self {
        let page = self.pages.entry(url.to_string()).or_default();
        page.timing_ms = timing_ms;
        page.links = links.iter().map(|l| Some(l.to_string())).collect();
        self
    }

    pub fn anchor_without_target(mut self, url: &str) -> Self {
        self.pages.entry(url.to_string()).or_default().links.push(None);
        self
    }

    pub fn redirect(mut self, from: &str, to: &str) -> Self {
        self.pages.entry(from.to_string()).or_default().redirect_to = Some(to.to_string());
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.pages.entry(url.to_string()).or_default().fails = true;
        self
    }

    pub fn links_error(mut self, url: &str) -> Self {
        self.pages.entry(url.to_string()).or_default().links_error = true;
        self
    }

    pub fn timing_error(mut self, url: &str) -> Self {
        self.pages.entry(url.to_string()).or_default().timing_error = true;
        self
    }

    pub fn navigation_count(&self, url: &str) -> usize {
        self.navigations.iter().filter(|u| *u == url).count()
    }

    fn current_page(&self) -> Result<&FakePage> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .ok_or_else(|| ScanError::Script("no document loaded".to_string()))
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.navigations.push(url.to_string());
        let page = self.pages.get(url).filter(|p| !p.fails).ok_or_else(|| {
            ScanError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }
        })?;
        self.current = Some(page.redirect_to.clone().unwrap_or_else(|| url.to_string()));
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        self.current
            .clone()
            .ok_or_else(|| ScanError::Browser("no document loaded".to_string()))
    }

    async fn evaluate(&mut self, script: &str) -> Result<serde_json::Value> {
        let page = self.current_page()?;
        if script == NAVIGATION_TIMING_SCRIPT {
            if page.timing_error {
                return Err(ScanError::Script("performance is not defined".to_string()));
            }
            Ok(json!(page.timing_ms))
        } else if script == ANCHOR_HREFS_SCRIPT {
            if page.links_error {
                return Err(ScanError::Script("stale document".to_string()));
            }
            Ok(json!(page.links))
        } else {
            Err(ScanError::Script(format!("unexpected script: {}", script)))
        }
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
