//! Filter and pagination state for the movie list.
//!
//! The controller holds two copies of the filters: `local`, which follows every edit at
//! once, and `committed`, which is what the list query uses. Filter edits reach `committed`
//! after a quiet period; sort, limit, page and clear take effect immediately. Every
//! committed change is handed to the `on_change` callback with the resulting
//! [`ListParams`].
//!
//! Any change to the filters, sort or limit resets the page to 1 and forgets the page
//! count, which only the next list response can supply again.

use std::sync::{Arc, Weak};
use std::time::Duration;

use marquee_shared::models::Pagination;
use marquee_shared::ClientError;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::params::{FilterEdit, FilterState, ListParams, PaginationState, SortField, SortOrder, PAGE_LIMITS};

type OnChange = Arc<dyn Fn(&ListParams) + Send + Sync>;

#[derive(Default)]
struct ControllerState {
    local: FilterState,
    committed: FilterState,
    pagination: PaginationState,
    total_pages: Option<u32>,
    /// Bumped on every filter edit; a debounce timer only commits if it still matches.
    debounce_seq: u64,
    debounce: Option<JoinHandle<()>>,
    closed: bool,
}

impl ControllerState {
    fn params(&self) -> ListParams {
        ListParams::from_state(&self.committed, &self.pagination)
    }

    /// Page 1 of a new result set whose size is not known yet.
    fn restart_paging(&mut self) {
        self.pagination.page = 1;
        self.total_pages = None;
    }

    fn cancel_debounce(&mut self) {
        self.debounce_seq += 1;
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }
}

pub struct ListController {
    state: Arc<Mutex<ControllerState>>,
    debounce: Duration,
    on_change: OnChange,
}

impl ListController {
    pub fn new<F>(debounce: Duration, on_change: F) -> Self
    where
        F: Fn(&ListParams) + Send + Sync + 'static,
    {
        Self {
            state: Arc::new(Mutex::new(ControllerState::default())),
            debounce,
            on_change: Arc::new(on_change),
        }
    }

    /// Parameters of the currently committed list query.
    pub fn params(&self) -> ListParams {
        self.state.lock().params()
    }

    pub fn filters(&self) -> FilterState {
        self.state.lock().committed.clone()
    }

    /// Filters as edited, including edits still waiting out the debounce.
    pub fn local_filters(&self) -> FilterState {
        self.state.lock().local.clone()
    }

    pub fn pagination(&self) -> PaginationState {
        self.state.lock().pagination
    }

    pub fn total_pages(&self) -> Option<u32> {
        self.state.lock().total_pages
    }

    pub fn has_active_filters(&self) -> bool {
        self.state.lock().local.is_active()
    }

    /// Records a filter edit. The list query follows once no edit has arrived for the
    /// debounce period. Must be called within a tokio runtime.
    pub fn apply_filter_edit(&self, edit: FilterEdit) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.local.apply(edit);
        state.cancel_debounce();

        let seq = state.debounce_seq;
        let weak = Arc::downgrade(&self.state);
        let on_change = self.on_change.clone();
        let delay = self.debounce;
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            commit_filters(weak, seq, on_change);
        }));
    }

    pub fn apply_sort_change(&self, sort_by: SortField, sort_order: SortOrder) {
        self.update(|state| {
            state.pagination.sort_by = sort_by;
            state.pagination.sort_order = sort_order;
            state.restart_paging();
            true
        });
    }

    /// Empties the filters and commits at once, dropping any pending edit.
    pub fn clear_filters(&self) {
        self.update(|state| {
            state.cancel_debounce();
            state.local = FilterState::default();
            state.committed = FilterState::default();
            state.restart_paging();
            true
        });
    }

    /// Moves to `page`. Out-of-range pages and the current page are ignored, and so is
    /// every page until a response for the current query has reported the page count.
    /// Returns whether the page changed.
    pub fn change_page(&self, page: u32) -> bool {
        self.update(|state| {
            let Some(total) = state.total_pages else {
                return false;
            };
            if !(1..=total).contains(&page) || page == state.pagination.page {
                return false;
            }
            state.pagination.page = page;
            true
        })
    }

    pub fn change_limit(&self, limit: u32) -> Result<(), ClientError> {
        if !PAGE_LIMITS.contains(&limit) {
            return Err(ClientError::Validation(format!(
                "page size must be one of {PAGE_LIMITS:?}, got {limit}"
            )));
        }
        self.update(|state| {
            state.pagination.limit = limit;
            state.restart_paging();
            true
        });
        Ok(())
    }

    /// Learns the page count from a list response.
    pub fn observe_pagination(&self, meta: &Pagination) {
        self.state.lock().total_pages = Some(meta.total_pages);
    }

    /// Stops the controller. A pending debounce never commits afterwards.
    pub fn teardown(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.cancel_debounce();
    }

    /// Applies `change` under the lock and notifies outside it when `change` reports a
    /// committed change.
    fn update(&self, change: impl FnOnce(&mut ControllerState) -> bool) -> bool {
        let params = {
            let mut state = self.state.lock();
            if state.closed || !change(&mut state) {
                return false;
            }
            state.params()
        };
        tracing::debug!(params = ?params, "list parameters changed");
        (self.on_change)(&params);
        true
    }
}

impl Drop for ListController {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn commit_filters(weak: Weak<Mutex<ControllerState>>, seq: u64, on_change: OnChange) {
    let Some(state) = weak.upgrade() else {
        return;
    };
    let params = {
        let mut guard = state.lock();
        let state = &mut *guard;
        if state.closed || state.debounce_seq != seq {
            return;
        }
        state.debounce = None;
        state.committed = state.local.clone();
        state.restart_paging();
        state.params()
    };
    tracing::debug!(params = ?params, "filters committed");
    on_change(&params);
}
