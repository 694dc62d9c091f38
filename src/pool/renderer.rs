//! Renderer seam for the page pool
//!
//! A launcher starts renderer processes; a renderer hands out pages. The
//! production implementation is Chromium (see `chromium`), tests use fakes.

use super::PoolError;
use async_trait::async_trait;
use std::time::Duration;

/// Starts renderer processes
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Renderer>, PoolError>;
}

/// A running headless renderer process
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Identity of this renderer instance; never reused by a launcher
    fn id(&self) -> u64;

    /// False once the process has crashed or the connection dropped
    fn is_connected(&self) -> bool;

    /// Opens a new page (tab)
    async fn new_page(&self) -> Result<Box<dyn RenderPage>, PoolError>;

    /// Closes the process and every page it owns
    async fn close(&self) -> Result<(), PoolError>;
}

/// A single page (tab) of a renderer
#[async_trait]
pub trait RenderPage: Send + Sync {
    /// Navigates and waits until network activity settles, bounded by `timeout`
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), PoolError>;

    /// The fully rendered document
    async fn content(&self) -> Result<String, PoolError>;

    async fn close(self: Box<Self>) -> Result<(), PoolError>;
}
