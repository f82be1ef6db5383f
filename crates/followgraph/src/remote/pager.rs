//! Lazy walking of cursored remote listings.

use serde_json::Value;

use super::api::GraphApi;
use super::error::RemoteError;
use super::operation::Operation;
use super::pool::CredentialPool;
use super::types::{IdPage, MemberPage, RemoteUser};

/// Position of the next page to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageToken {
    /// Opaque cursor returned by the previous page.
    Cursor(i64),
    /// Upper bound on item ids, for listings paged by id.
    MaxId(i64),
}

/// One decoded page and where the next one starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` on the last page.
    pub next: Option<PageToken>,
}

/// Build the request for the page at a token (`None` for the first page).
pub type RequestFn<'a> = Box<dyn Fn(Option<PageToken>) -> Operation + Send + Sync + 'a>;

/// Decode a raw page for the named operation.
pub type DecodeFn<T> = fn(&str, Value) -> Result<Page<T>, RemoteError>;

/// A finite, non-restartable walk over a paginated operation.
///
/// Nothing is requested until [`next_page`](Self::next_page) is called. The
/// walk ends when the service returns no further cursor or when the item cap
/// is reached; the final page is truncated to the cap.
pub struct Pager<'a, A, T> {
    pool: &'a CredentialPool<A>,
    request: RequestFn<'a>,
    decode: DecodeFn<T>,
    next: Option<PageToken>,
    finished: bool,
    max_items: Option<usize>,
    yielded: usize,
    pages: usize,
}

impl<'a, A: GraphApi, T> Pager<'a, A, T> {
    pub fn new(pool: &'a CredentialPool<A>, request: RequestFn<'a>, decode: DecodeFn<T>) -> Self {
        Self {
            pool,
            request,
            decode,
            next: None,
            finished: false,
            max_items: None,
            yielded: 0,
            pages: 0,
        }
    }

    /// Stop after `max_items` items in total.
    #[must_use]
    pub fn with_max_items(mut self, max_items: Option<usize>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages
    }

    /// Items handed out so far.
    pub fn items_yielded(&self) -> usize {
        self.yielded
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page, or `None` once the walk has ended.
    pub async fn next_page(&mut self) -> Result<Option<Vec<T>>, RemoteError> {
        if self.finished {
            return Ok(None);
        }
        if self.max_items.is_some_and(|cap| self.yielded >= cap) {
            self.finished = true;
            return Ok(None);
        }

        let op = (self.request)(self.next);
        let raw = match self.pool.invoke(&op).await {
            Ok(raw) => raw,
            Err(err) => {
                self.finished = true;
                return Err(err);
            }
        };
        let page = match (self.decode)(op.name(), raw) {
            Ok(page) => page,
            Err(err) => {
                self.finished = true;
                return Err(err);
            }
        };
        self.pages += 1;

        let mut items = page.items;
        if let Some(cap) = self.max_items {
            let room = cap.saturating_sub(self.yielded);
            if items.len() >= room {
                items.truncate(room);
                self.finished = true;
            }
        }
        self.yielded += items.len();

        match page.next {
            Some(token) if !self.finished => self.next = Some(token),
            _ => self.finished = true,
        }

        tracing::debug!(
            operation = op.name(),
            page = self.pages,
            items = items.len(),
            last = self.finished,
            "Fetched page"
        );
        Ok(Some(items))
    }

    /// Drain the remaining pages into one vector.
    pub async fn collect_all(mut self) -> Result<Vec<T>, RemoteError> {
        let mut all = Vec::new();
        while let Some(items) = self.next_page().await? {
            all.extend(items);
        }
        Ok(all)
    }
}

fn cursor_token(next_cursor: i64) -> Option<PageToken> {
    (next_cursor != 0).then_some(PageToken::Cursor(next_cursor))
}

/// Decode a page of `{"ids": [...], "next_cursor": N}`.
pub fn decode_id_page(operation: &str, raw: Value) -> Result<Page<i64>, RemoteError> {
    let page: IdPage = serde_json::from_value(raw).map_err(|e| RemoteError::decode(operation, e))?;
    Ok(Page {
        items: page.ids,
        next: cursor_token(page.next_cursor),
    })
}

/// Decode a page of `{"users": [...], "next_cursor": N}`.
pub fn decode_member_page(operation: &str, raw: Value) -> Result<Page<RemoteUser>, RemoteError> {
    let page: MemberPage = serde_json::from_value(raw).map_err(|e| RemoteError::decode(operation, e))?;
    let items = page
        .users
        .into_iter()
        .map(RemoteUser::from_json)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RemoteError::decode(operation, e))?;
    Ok(Page {
        items,
        next: cursor_token(page.next_cursor),
    })
}

/// Decode a page of timeline statuses.
///
/// Timelines have no cursor: the next page holds everything older than the
/// oldest status seen, and an empty page ends the walk.
pub fn decode_timeline_page(operation: &str, raw: Value) -> Result<Page<Value>, RemoteError> {
    let statuses: Vec<Value> =
        serde_json::from_value(raw).map_err(|e| RemoteError::decode(operation, e))?;
    let oldest = statuses.iter().filter_map(|s| s["id"].as_i64()).min();
    Ok(Page {
        next: oldest.map(|id| PageToken::MaxId(id - 1)),
        items: statuses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::remote::credential::Credential;
    use crate::remote::operation::FIRST_CURSOR;
    use crate::remote::scripted::ScriptedApi;

    fn pool(api: &ScriptedApi) -> CredentialPool<ScriptedApi> {
        CredentialPool::new(api.clone(), vec![Credential::new("a", "k", "s")]).expect("pool")
    }

    fn follower_request<'a>(user_id: i64) -> RequestFn<'a> {
        Box::new(move |token| Operation::FollowerIds {
            user_id,
            cursor: match token {
                Some(PageToken::Cursor(c)) => c,
                _ => FIRST_CURSOR,
            },
        })
    }

    #[tokio::test]
    async fn walks_cursor_chain_until_zero() {
        let api = ScriptedApi::new();
        api.set_follower_pages(1, vec![vec![10, 11], vec![12], vec![13]]);
        let pool = pool(&api);

        let mut pager = Pager::new(&pool, follower_request(1), decode_id_page);
        assert_eq!(pager.next_page().await.expect("page"), Some(vec![10, 11]));
        assert_eq!(pager.next_page().await.expect("page"), Some(vec![12]));
        assert_eq!(pager.next_page().await.expect("page"), Some(vec![13]));
        assert_eq!(pager.next_page().await.expect("end"), None);
        assert_eq!(pager.pages_fetched(), 3);
        assert_eq!(api.calls().len(), 3);
    }

    #[tokio::test]
    async fn nothing_is_requested_until_polled() {
        let api = ScriptedApi::new();
        api.set_follower_pages(1, vec![vec![10]]);
        let pool = pool(&api);

        let pager = Pager::new(&pool, follower_request(1), decode_id_page);
        assert!(api.calls().is_empty());
        drop(pager);
    }

    #[tokio::test]
    async fn item_cap_truncates_and_stops() {
        let api = ScriptedApi::new();
        api.set_follower_pages(1, vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]);
        let pool = pool(&api);

        let all = Pager::new(&pool, follower_request(1), decode_id_page)
            .with_max_items(Some(4))
            .collect_all()
            .await
            .expect("collect");
        assert_eq!(all, vec![1, 2, 3, 4]);
        assert_eq!(api.calls().len(), 2);
    }

    #[tokio::test]
    async fn cap_on_page_boundary_skips_extra_request() {
        let api = ScriptedApi::new();
        api.set_follower_pages(1, vec![vec![1, 2], vec![3]]);
        let pool = pool(&api);

        let all = Pager::new(&pool, follower_request(1), decode_id_page)
            .with_max_items(Some(2))
            .collect_all()
            .await
            .expect("collect");
        assert_eq!(all, vec![1, 2]);
        assert_eq!(api.calls().len(), 1);
    }

    #[tokio::test]
    async fn error_ends_the_walk() {
        let api = ScriptedApi::new();
        let pool = pool(&api);

        let mut pager = Pager::new(&pool, follower_request(9), decode_id_page);
        pager.next_page().await.expect_err("unscripted");
        assert!(pager.is_finished());
        assert_eq!(pager.next_page().await.expect("finished"), None);
    }

    #[test]
    fn timeline_pages_continue_below_oldest_id() {
        let page = decode_timeline_page("statuses/user_timeline", json!([{ "id": 30 }, { "id": 21 }]))
            .expect("decode");
        assert_eq!(page.next, Some(PageToken::MaxId(20)));

        let empty = decode_timeline_page("statuses/user_timeline", json!([])).expect("decode");
        assert_eq!(empty.next, None);
    }

    #[test]
    fn malformed_page_is_a_decode_error() {
        let err = decode_id_page("followers/ids", json!({ "users": [] })).expect_err("no ids");
        assert!(matches!(err, RemoteError::Decode { ref operation, .. } if operation == "followers/ids"));
    }
}
