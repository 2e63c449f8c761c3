//! Pagination cursor driver
//!
//! Collaborator listings hand back results one page at a time with an
//! opaque continuation token. [`fetch_all`] drives such an operation to
//! exhaustion and concatenates the pages in order.

use anyhow::Result;
use std::future::Future;

/// One page of a paginated collaborator response.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Continuation token; `None` means this was the last page.
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    /// A single page with no continuation.
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// Repeatedly invokes `fetch` with the previous page's continuation
/// token until a page arrives without one, accumulating all items.
///
/// The operation is called at least once. Errors propagate untouched;
/// callers needing an early stop (see the harvester) drive pages
/// themselves instead.
pub async fn fetch_all<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token).await?;
        items.extend(page.items);
        match page.next_token {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    Ok(items)
}
