//! Pooled rendering pages backed by a single headless renderer
//!
//! The pool owns one renderer process and hands out at most `size` live page
//! handles. The renderer is started lazily, restarted when it disconnects or
//! after `restart_threshold` leases, and torn down on shutdown. Renderer
//! creation and teardown are serialized behind one async mutex; page
//! creation itself runs outside that lock.

mod chromium;
mod renderer;

pub use chromium::{ChromiumLauncher, ChromiumRenderer};
pub use renderer::{RenderPage, Renderer, RendererLauncher};

use crate::config::PoolConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};

/// Errors raised by the page pool and its renderer
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Renderer launch failed: {0}")]
    Launch(String),

    #[error("Page creation failed: {0}")]
    Page(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Page handle invalidated by renderer restart")]
    Invalidated,

    #[error("Page pool is shut down")]
    Shutdown,

    #[error("Renderer close failed: {0}")]
    Close(String),
}

struct LiveRenderer {
    renderer: Arc<dyn Renderer>,
    generation: u64,
}

/// A leased rendering page
///
/// Must be handed back with [`PageResourcePool::release`]; the slot is freed
/// when the handle is dropped either way.
pub struct PageHandle {
    page: Box<dyn RenderPage>,
    renderer_id: u64,
    generation: u64,
    current_generation: Arc<AtomicU64>,
    _slot: OwnedSemaphorePermit,
}

impl PageHandle {
    /// Identity of the renderer this page belongs to
    pub fn renderer_id(&self) -> u64 {
        self.renderer_id
    }

    /// False once the renderer that issued this handle has been torn down
    pub fn is_valid(&self) -> bool {
        self.current_generation.load(Ordering::SeqCst) == self.generation
    }

    pub async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), PoolError> {
        if !self.is_valid() {
            return Err(PoolError::Invalidated);
        }
        self.page.navigate(url, timeout).await
    }

    pub async fn content(&self) -> Result<String, PoolError> {
        if !self.is_valid() {
            return Err(PoolError::Invalidated);
        }
        self.page.content().await
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("renderer_id", &self.renderer_id)
            .field("generation", &self.generation)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Owner of the renderer process and its page handles
pub struct PageResourcePool {
    launcher: Box<dyn RendererLauncher>,
    live: Mutex<Option<LiveRenderer>>,
    slots: Arc<Semaphore>,
    leases: AtomicU64,
    generation: Arc<AtomicU64>,
    restart_threshold: u64,
    navigation_timeout: Duration,
}

impl PageResourcePool {
    /// Creates a pool around any renderer launcher
    pub fn new(
        launcher: Box<dyn RendererLauncher>,
        size: usize,
        restart_threshold: u64,
        navigation_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            live: Mutex::new(None),
            slots: Arc::new(Semaphore::new(size.max(1))),
            leases: AtomicU64::new(0),
            generation: Arc::new(AtomicU64::new(0)),
            restart_threshold: restart_threshold.max(1),
            navigation_timeout,
        }
    }

    /// Creates a Chromium-backed pool from configuration
    pub fn chromium(config: &PoolConfig) -> Self {
        let launcher = ChromiumLauncher::new(config.chrome_executable.as_ref().map(PathBuf::from));
        Self::new(
            Box::new(launcher),
            config.size,
            config.restart_threshold,
            Duration::from_secs(config.navigation_timeout_secs),
        )
    }

    /// Upper bound on a single navigation through this pool
    pub fn navigation_timeout(&self) -> Duration {
        self.navigation_timeout
    }

    /// Leases granted since the current renderer started
    pub fn lease_count(&self) -> u64 {
        self.leases.load(Ordering::SeqCst)
    }

    /// Leases a page, starting or restarting the renderer first if needed
    ///
    /// Waits while `size` handles are outstanding. A launch failure is
    /// returned to the caller and the next call tries again.
    pub async fn acquire(&self) -> Result<PageHandle, PoolError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Shutdown)?;

        let (renderer, generation, leases) = self.ensure_renderer().await?;
        let page = renderer.new_page().await?;

        tracing::debug!(renderer = renderer.id(), leases, "page leased");

        Ok(PageHandle {
            page,
            renderer_id: renderer.id(),
            generation,
            current_generation: Arc::clone(&self.generation),
            _slot: slot,
        })
    }

    /// Closes a leased page; the renderer and other pages are unaffected
    pub async fn release(&self, handle: PageHandle) {
        let PageHandle {
            page,
            renderer_id,
            generation,
            current_generation,
            _slot,
        } = handle;

        // Pages of a torn-down renderer were closed with it.
        if current_generation.load(Ordering::SeqCst) != generation {
            return;
        }

        if let Err(e) = page.close().await {
            tracing::debug!(renderer = renderer_id, "failed to close page: {}", e);
        }
    }

    /// Returns the live renderer, launching a fresh one when it is absent,
    /// disconnected or has reached the lease threshold
    ///
    /// The lease is counted here, under the lock, so concurrent callers
    /// cannot push one renderer past the threshold.
    async fn ensure_renderer(&self) -> Result<(Arc<dyn Renderer>, u64, u64), PoolError> {
        let mut live = self.live.lock().await;

        let needs_restart = match live.as_ref() {
            None => true,
            Some(current) => {
                !current.renderer.is_connected()
                    || self.leases.load(Ordering::SeqCst) >= self.restart_threshold
            }
        };

        if needs_restart {
            if let Some(old) = live.take() {
                self.generation.fetch_add(1, Ordering::SeqCst);
                tracing::info!(
                    renderer = old.renderer.id(),
                    leases = self.leases.load(Ordering::SeqCst),
                    "tearing down renderer"
                );
                if let Err(e) = old.renderer.close().await {
                    tracing::warn!("failed to close renderer cleanly: {}", e);
                }
            }

            let renderer: Arc<dyn Renderer> = Arc::from(self.launcher.launch().await?);
            let generation = self.generation.load(Ordering::SeqCst);
            self.leases.store(0, Ordering::SeqCst);
            tracing::info!(renderer = renderer.id(), "renderer started");

            *live = Some(LiveRenderer {
                renderer,
                generation,
            });
        }

        match live.as_ref() {
            Some(current) => {
                let leases = self.leases.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((Arc::clone(&current.renderer), current.generation, leases))
            }
            None => Err(PoolError::Shutdown),
        }
    }

    /// Tears down the renderer and refuses further leases
    pub async fn shutdown(&self) {
        self.slots.close();

        let mut live = self.live.lock().await;
        if let Some(old) = live.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = old.renderer.close().await {
                tracing::warn!("failed to close renderer on shutdown: {}", e);
            }
            tracing::info!(renderer = old.renderer.id(), "renderer shut down");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process fake renderer for pool and fetcher tests

    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    pub struct FakeState {
        pub launches: AtomicU64,
        pub fail_launches: AtomicU64,
        pub fail_close: AtomicBool,
        pub open_pages: AtomicU64,
        pub closed_pages: AtomicU64,
        pub documents: StdMutex<HashMap<String, String>>,
        pub renderers: StdMutex<Vec<Arc<AtomicBool>>>,
    }

    impl FakeState {
        /// Simulates a crash of the most recently launched renderer
        pub fn crash_latest(&self) {
            if let Some(flag) = self.renderers.lock().unwrap().last() {
                flag.store(false, Ordering::SeqCst);
            }
        }
    }

    pub struct FakeLauncher {
        pub state: Arc<FakeState>,
    }

    #[async_trait]
    impl RendererLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn Renderer>, PoolError> {
            if self.state.fail_launches.load(Ordering::SeqCst) > 0 {
                self.state.fail_launches.fetch_sub(1, Ordering::SeqCst);
                return Err(PoolError::Launch("no browser binary".to_string()));
            }
            tokio::task::yield_now().await;
            let id = self.state.launches.fetch_add(1, Ordering::SeqCst) + 1;
            let connected = Arc::new(AtomicBool::new(true));
            self.state
                .renderers
                .lock()
                .unwrap()
                .push(Arc::clone(&connected));
            Ok(Box::new(FakeRenderer {
                id,
                connected,
                state: Arc::clone(&self.state),
            }))
        }
    }

    pub struct FakeRenderer {
        id: u64,
        connected: Arc<AtomicBool>,
        state: Arc<FakeState>,
    }

    #[async_trait]
    impl Renderer for FakeRenderer {
        fn id(&self) -> u64 {
            self.id
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn new_page(&self) -> Result<Box<dyn RenderPage>, PoolError> {
            tokio::task::yield_now().await;
            self.state.open_pages.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePage {
                state: Arc::clone(&self.state),
                connected: Arc::clone(&self.connected),
                loaded: None,
            }))
        }

        async fn close(&self) -> Result<(), PoolError> {
            self.connected.store(false, Ordering::SeqCst);
            if self.state.fail_close.load(Ordering::SeqCst) {
                return Err(PoolError::Close("browser already gone".to_string()));
            }
            Ok(())
        }
    }

    pub struct FakePage {
        state: Arc<FakeState>,
        connected: Arc<AtomicBool>,
        loaded: Option<String>,
    }

    #[async_trait]
    impl RenderPage for FakePage {
        async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<(), PoolError> {
            if !self.connected.load(Ordering::SeqCst) {
                return Err(PoolError::Navigation("target closed".to_string()));
            }
            let documents = self.state.documents.lock().unwrap();
            match documents.get(url) {
                Some(html) => {
                    self.loaded = Some(html.clone());
                    Ok(())
                }
                None => Err(PoolError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED {url}"))),
            }
        }

        async fn content(&self) -> Result<String, PoolError> {
            self.loaded
                .clone()
                .ok_or_else(|| PoolError::Navigation("nothing loaded".to_string()))
        }

        async fn close(self: Box<Self>) -> Result<(), PoolError> {
            self.state.closed_pages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    pub fn fake_pool(size: usize, restart_threshold: u64) -> (PageResourcePool, Arc<FakeState>) {
        let state = Arc::new(FakeState::default());
        let pool = PageResourcePool::new(
            Box::new(FakeLauncher {
                state: Arc::clone(&state),
            }),
            size,
            restart_threshold,
            Duration::from_secs(5),
        );
        (pool, state)
    }
}
