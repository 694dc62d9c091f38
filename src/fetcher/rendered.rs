//! Rendered fetch through the page pool

use super::FetchFailure;
use crate::pool::PageResourcePool;

/// Loads `url` in a leased page and returns the rendered document
///
/// The page is released on every exit path, including navigation errors.
pub async fn fetch_rendered(pool: &PageResourcePool, url: &str) -> Result<String, FetchFailure> {
    let mut handle = pool.acquire().await.map_err(|source| FetchFailure::Render {
        url: url.to_string(),
        source,
    })?;

    let rendered = match handle.navigate(url, pool.navigation_timeout()).await {
        Ok(()) => handle.content().await,
        Err(e) => Err(e),
    };

    pool.release(handle).await;

    rendered.map_err(|source| FetchFailure::Render {
        url: url.to_string(),
        source,
    })
}
