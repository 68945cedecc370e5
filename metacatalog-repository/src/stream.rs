//! Lazy, windowed search across one or more indices.

use std::collections::VecDeque;

use futures::stream::{self, Stream};

use crate::call::CallContext;
use crate::errors::CatalogError;
use crate::interfaces::SearchIndexProvider;
use crate::types::{SearchHit, SearchRequest};

struct Cursor {
    indices: Vec<String>,
    request: SearchRequest,
    seen: u64,
    buffer: VecDeque<SearchHit>,
    exhausted: bool,
}

/// Stream every hit of `request` across `indices`.
///
/// Windows of `request.size` hits are fetched on demand. The first window
/// starts at `request.from`; each later one continues after the sort values
/// of the last hit seen, with `_id` as tie-breaker, so the listing depth is
/// not capped by the engine's result window and concurrent writes cannot
/// shift a hit into a window already read. The stream ends once a window
/// comes back short or the engine's total is reached. Calling this again
/// starts a fresh pass.
pub fn search_hits<'a>(
    provider: &'a dyn SearchIndexProvider,
    cx: &'a CallContext,
    indices: Vec<String>,
    request: SearchRequest,
) -> impl Stream<Item = Result<SearchHit, CatalogError>> + Send + 'a {
    let exhausted = request.size == 0 || indices.is_empty();
    let cursor = Cursor {
        indices,
        request: request.tie_broken(),
        seen: 0,
        buffer: VecDeque::new(),
        exhausted,
    };

    stream::try_unfold(cursor, move |mut cursor| async move {
        loop {
            if let Some(hit) = cursor.buffer.pop_front() {
                return Ok(Some((hit, cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let window = provider
                .search(cx, &cursor.indices, &cursor.request)
                .await?;
            let fetched = window.hits.len();
            let skipped = if cursor.request.search_after.is_none() {
                cursor.request.from as u64
            } else {
                0
            };
            cursor.seen += skipped + fetched as u64;
            cursor.exhausted = fetched < cursor.request.size || cursor.seen >= window.total;

            match window.hits.last() {
                Some(last) if !cursor.exhausted => {
                    if last.sort.is_empty() {
                        return Err(CatalogError::parse(
                            "search hit without sort values, cannot continue the listing",
                        ));
                    }
                    cursor.request = cursor.request.clone().after(last.sort.clone());
                }
                _ => cursor.exhausted = true,
            }
            cursor.buffer.extend(window.hits);
        }
    })
}
