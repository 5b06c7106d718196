//! Continuation-token pagination for provider listings.

use std::collections::HashSet;
use std::future::Future;

use tracing::debug;

use alertscale_core::{ProviderError, ProviderResult, RetryPolicy};

use crate::client::Page;
use crate::retry::throttled_call;

/// Fetch every page of a listing, following continuation tokens until
/// the provider stops returning one. Each page is fetched through
/// [`throttled_call`].
///
/// A token that was already followed is an error, so a provider that
/// cycles through tokens cannot loop the listing forever.
pub async fn collect_pages<T, F, Fut>(
    retry: &RetryPolicy,
    operation: &str,
    mut fetch: F,
) -> ProviderResult<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = ProviderResult<Page<T>>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    let mut seen: HashSet<String> = HashSet::new();
    let mut pages: u32 = 0;

    loop {
        let page = throttled_call(retry, operation, || fetch(token.clone())).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_token.filter(|t| !t.is_empty()) {
            Some(next) if !seen.insert(next.clone()) => {
                return Err(ProviderError::InvalidResponse(format!(
                    "{operation} returned continuation token {next:?} twice"
                )));
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(operation, pages, items = items.len(), "listing complete");
    Ok(items)
}
