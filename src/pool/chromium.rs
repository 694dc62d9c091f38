//! Chromium-based renderer using chromiumoxide.

use super::renderer::{RenderPage, Renderer, RendererLauncher};
use super::PoolError;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Launches headless Chromium instances
pub struct ChromiumLauncher {
    executable: Option<PathBuf>,
    next_id: AtomicU64,
}

impl ChromiumLauncher {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self {
            executable,
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl RendererLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn Renderer>, PoolError> {
        let mut builder = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions");

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder
            .build()
            .map_err(|e| PoolError::Launch(format!("failed to build browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PoolError::Launch(e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);

        // The CDP connection lives as long as this stream yields.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(renderer = id, "CDP handler error: {}", e);
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        tracing::debug!(renderer = id, "Chromium launched");

        Ok(Box::new(ChromiumRenderer {
            id,
            browser: RwLock::new(browser),
            connected,
            handler_task,
        }))
    }
}

/// A running Chromium process
pub struct ChromiumRenderer {
    id: u64,
    browser: RwLock<Browser>,
    connected: Arc<AtomicBool>,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    fn id(&self) -> u64 {
        self.id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.handler_task.is_finished()
    }

    async fn new_page(&self) -> Result<Box<dyn RenderPage>, PoolError> {
        let page = self
            .browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| PoolError::Page(e.to_string()))?;

        // Enabled before any navigation so the blank page's replayed events
        // never reach a navigation's listener.
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| PoolError::Page(format!("failed to enable lifecycle events: {e}")))?;

        Ok(Box::new(ChromiumPage { page }))
    }

    async fn close(&self) -> Result<(), PoolError> {
        self.connected.store(false, Ordering::SeqCst);
        let mut browser = self.browser.write().await;
        let closed = browser.close().await;
        if let Err(e) = browser.wait().await {
            tracing::debug!(renderer = self.id, "failed to reap Chromium process: {}", e);
        }
        self.handler_task.abort();
        closed
            .map(|_| ())
            .map_err(|e| PoolError::Close(e.to_string()))
    }
}

/// A single Chromium tab
pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl RenderPage for ChromiumPage {
    /// Loads `url` and waits until the network has been idle
    ///
    /// Idle is Chromium's `networkIdle` lifecycle event for the navigation
    /// started here, matched by its loader id.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), PoolError> {
        let navigation = async {
            let mut events = self
                .page
                .event_listener::<EventLifecycleEvent>()
                .await
                .map_err(|e| PoolError::Navigation(e.to_string()))?;

            self.page
                .goto(url)
                .await
                .map_err(|e| PoolError::Navigation(e.to_string()))?;

            let mut loader = None;
            while let Some(event) = events.next().await {
                match event.name.as_str() {
                    "init" => loader = Some(event.loader_id.clone()),
                    "networkIdle" if loader.as_ref() == Some(&event.loader_id) => return Ok(()),
                    _ => {}
                }
            }
            Err(PoolError::Navigation(
                "page closed before the network went idle".to_string(),
            ))
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(PoolError::Timeout(timeout)),
        }
    }

    async fn content(&self) -> Result<String, PoolError> {
        self.page
            .content()
            .await
            .map_err(|e| PoolError::Navigation(format!("failed to read document: {e}")))
    }

    async fn close(self: Box<Self>) -> Result<(), PoolError> {
        self.page
            .close()
            .await
            .map_err(|e| PoolError::Page(e.to_string()))
    }
}
