//! Shared types and pagination for Google list endpoints.

use std::collections::VecDeque;
use std::future::Future;
use tokio_stream::Stream;

/// One page of a list response, reduced to what pagination needs.
#[derive(Debug)]
pub struct Page<T> {
    pub items: VecDeque<T>,
    /// Token that can be used as the value of the `pageToken` parameter to retrieve the next
    /// page in the result set.
    pub next_page_token: Option<String>,
}

/// Yields every item of a list endpoint, page after page.
///
/// `fetch_page` is called with `None` for the first page and with the previous page's
/// `nextPageToken` after that. Pages are only fetched once the items of the previous page
/// have been consumed. The stream ends after the first page without a (non-empty) token,
/// or right after the first error.
pub fn paged<'a, T, F, Fut>(fetch_page: F) -> impl Stream<Item = eyre::Result<T>> + 'a
where
    T: 'a,
    F: Fn(Option<String>) -> Fut + 'a,
    Fut: Future<Output = eyre::Result<Page<T>>> + 'a,
{
    async_stream::try_stream! {
        let mut page_token = None;
        loop {
            let page = fetch_page(page_token.take()).await?;
            for item in page.items {
                yield item;
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
    }
}
