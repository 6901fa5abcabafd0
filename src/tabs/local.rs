//! In-process tab registry.
//!
//! [`LocalTabs`] hosts content agents directly, standing in for the browser
//! tab API when the bridge and the agents share a process.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::content::ContentAgent;
use crate::error::{Error, Result};
use crate::identifiers::TabId;
use crate::protocol::TabMessage;

use super::host::{ActiveTabRef, TabHost};

// ============================================================================
// Types
// ============================================================================

/// One registered tab.
struct TabEntry {
    /// Content agent, absent for pages agents cannot run in.
    agent: Option<Arc<ContentAgent>>,
    /// URL for tabs without an agent.
    url: String,
    /// Title for tabs without an agent.
    title: String,
}

impl TabEntry {
    fn describe(&self, tab_id: TabId) -> ActiveTabRef {
        match &self.agent {
            Some(agent) => ActiveTabRef {
                tab_id,
                url: agent.page().url(),
                title: agent.page().title(),
            },
            None => ActiveTabRef {
                tab_id,
                url: self.url.clone(),
                title: self.title.clone(),
            },
        }
    }
}

#[derive(Default)]
struct TabsInner {
    tabs: FxHashMap<TabId, TabEntry>,
    active: Option<TabId>,
    next_id: u32,
}

impl TabsInner {
    fn insert(&mut self, entry: TabEntry) -> TabId {
        self.next_id += 1;
        let tab_id = TabId::new(self.next_id);
        self.tabs.insert(tab_id, entry);
        self.active = Some(tab_id);
        tab_id
    }
}

// ============================================================================
// LocalTabs
// ============================================================================

/// Tabs of one window, hosted in-process.
///
/// Opening a tab makes it active, as a browser does for foreground tabs.
#[derive(Default)]
pub struct LocalTabs {
    inner: Mutex<TabsInner>,
}

impl fmt::Debug for LocalTabs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LocalTabs")
            .field("tabs", &inner.tabs.len())
            .field("active", &inner.active)
            .finish()
    }
}

impl LocalTabs {
    /// Creates an empty window.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a tab running `agent` and activates it.
    pub fn open(&self, agent: ContentAgent) -> TabId {
        let tab_id = self.inner.lock().insert(TabEntry {
            agent: Some(Arc::new(agent)),
            url: String::new(),
            title: String::new(),
        });
        debug!(tab_id = %tab_id, "Tab opened");
        tab_id
    }

    /// Opens a tab without a content agent (e.g. a browser-internal page)
    /// and activates it.
    pub fn open_blank(&self, url: impl Into<String>, title: impl Into<String>) -> TabId {
        let tab_id = self.inner.lock().insert(TabEntry {
            agent: None,
            url: url.into(),
            title: title.into(),
        });
        debug!(tab_id = %tab_id, "Blank tab opened");
        tab_id
    }

    /// Makes `tab_id` the active tab.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TabUnreachable`] if the tab does not exist.
    pub fn activate(&self, tab_id: TabId) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.tabs.contains_key(&tab_id) {
            return Err(Error::tab_unreachable(tab_id, "no such tab"));
        }
        inner.active = Some(tab_id);
        debug!(tab_id = %tab_id, "Tab activated");
        Ok(())
    }

    /// Closes a tab. Closing the active tab leaves no tab active.
    ///
    /// Returns `false` if the tab did not exist.
    pub fn close(&self, tab_id: TabId) -> bool {
        let mut inner = self.inner.lock();
        let existed = inner.tabs.remove(&tab_id).is_some();
        if inner.active == Some(tab_id) {
            inner.active = None;
        }
        existed
    }

    /// Returns the active tab ID.
    #[must_use]
    pub fn active(&self) -> Option<TabId> {
        self.inner.lock().active
    }

    /// Returns the content agent of a tab.
    #[must_use]
    pub fn agent(&self, tab_id: TabId) -> Option<Arc<ContentAgent>> {
        self.inner
            .lock()
            .tabs
            .get(&tab_id)
            .and_then(|entry| entry.agent.clone())
    }
}

#[async_trait]
impl TabHost for LocalTabs {
    async fn query_active_tab(&self) -> Result<Option<ActiveTabRef>> {
        let inner = self.inner.lock();
        Ok(inner
            .active
            .and_then(|id| inner.tabs.get(&id).map(|entry| entry.describe(id))))
    }

    async fn send_message(&self, tab_id: TabId, message: TabMessage) -> Result<Option<Value>> {
        let agent = {
            let inner = self.inner.lock();
            let entry = inner
                .tabs
                .get(&tab_id)
                .ok_or_else(|| Error::tab_unreachable(tab_id, "no such tab"))?;
            entry
                .agent
                .clone()
                .ok_or_else(|| Error::tab_unreachable(tab_id, "receiving end does not exist"))?
        };

        Ok(agent.handle_message(message).await)
    }
}

// ============================================================================
// Tests
// ============================================================================
