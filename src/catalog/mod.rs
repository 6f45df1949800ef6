//! Searchable, filterable movie listing with "load more" paging.

pub mod group;
pub mod query;
pub mod sort;

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::MoviesApi;
use crate::error::{ApiError, FailureKind};
use crate::models::{MoviePage, MovieSummary, Pagination};
use query::{FilterOptions, FilterState, SearchParams, SHOW_ALL_LIMIT};
use sort::{sort_movies, Sort, SORT_OPTIONS};

/// Consecutive failed resets allowed before giving up.
pub const MAX_RESETS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    Replace,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    Applied { received: usize },
    /// A newer request was issued while this one was in flight; its reply was dropped.
    Superseded,
    /// Nothing to do, no request was sent.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("too many reset attempts")]
    TooManyResets,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFailure {
    pub kind: FailureKind,
    pub message: String,
    /// Set when retrying cannot help and the user must reload.
    pub terminal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Idle,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone)]
struct CatalogState {
    search_text: String,
    filters: FilterState,
    pagination: Pagination,
    movies: Vec<MovieSummary>,
    options: FilterOptions,
    show_all: bool,
    loaded_once: bool,
    status: LoadStatus,
    error: Option<CatalogFailure>,
    generation: u64,
    /// Mode of the newest request still waiting for its reply.
    pending: Option<FetchMode>,
    failed_resets: u32,
}

impl CatalogState {
    fn new(page_size: u32) -> Self {
        Self {
            search_text: String::new(),
            filters: FilterState::default(),
            pagination: Pagination::first(page_size),
            movies: Vec::new(),
            options: FilterOptions::default(),
            show_all: false,
            loaded_once: false,
            status: LoadStatus::Idle,
            error: None,
            generation: 0,
            pending: None,
            failed_resets: 0,
        }
    }

    fn has_more(&self) -> bool {
        self.pagination.has_more() && !self.show_all
    }

    /// A page appended now would belong to the query being replaced.
    fn replace_pending(&self) -> bool {
        self.pending == Some(FetchMode::Replace)
    }

    fn limit(&self) -> u32 {
        if self.show_all {
            SHOW_ALL_LIMIT
        } else {
            self.pagination.page_size
        }
    }
}

/// Everything the listing page renders.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogView {
    pub search_text: String,
    pub filters: FilterState,
    pub active_filters: usize,
    pub sort_option: String,
    pub sort_options: Vec<SortChoice>,
    pub movies: Vec<MovieSummary>,
    pub pagination: Pagination,
    pub has_more_movies: bool,
    pub show_all: bool,
    pub filter_options: FilterOptions,
    pub status: LoadStatus,
    pub error: Option<CatalogFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortChoice {
    pub value: &'static str,
    pub label: &'static str,
}

struct Ticket {
    generation: u64,
    params: SearchParams,
    mode: FetchMode,
    reset: bool,
}

pub struct CatalogController {
    movies: Arc<dyn MoviesApi>,
    page_size: u32,
    state: Mutex<CatalogState>,
}

impl CatalogController {
    pub fn new(movies: Arc<dyn MoviesApi>, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            movies,
            page_size,
            state: Mutex::new(CatalogState::new(page_size)),
        }
    }

    pub async fn view(&self) -> CatalogView {
        let state = self.state.lock().await;
        CatalogView {
            search_text: state.search_text.clone(),
            filters: state.filters.clone(),
            active_filters: state.filters.active_count(),
            sort_option: state.filters.sort().option_value(),
            sort_options: SORT_OPTIONS
                .iter()
                .map(|&(value, label)| SortChoice { value, label })
                .collect(),
            movies: state.movies.clone(),
            pagination: state.pagination,
            has_more_movies: state.has_more(),
            show_all: state.show_all,
            filter_options: state.options.clone(),
            status: state.status,
            error: state.error.clone(),
        }
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more()
    }

    /// First visit to the listing: loads the default page once.
    pub async fn load_initial(&self) -> Result<QueryOutcome, CatalogError> {
        let (text, filters) = {
            let state = self.state.lock().await;
            if state.loaded_once || state.status == LoadStatus::Loading {
                return Ok(QueryOutcome::Skipped);
            }
            (state.search_text.clone(), state.filters.clone())
        };
        let sort = filters.sort();
        self.apply_query(&text, filters, sort, FetchMode::Replace)
            .await
    }

    /// Records typed search text without issuing a request.
    pub async fn set_search_text(&self, text: &str) {
        self.state.lock().await.search_text = text.to_string();
    }

    /// Runs one backend search for the given text, filters and sort.
    ///
    /// `Replace` starts over at page 1; `Append` fetches the page after the
    /// current one and adds it to the list. An `Append` is skipped while a
    /// `Replace` is still in flight.
    pub async fn apply_query(
        &self,
        search_text: &str,
        mut filters: FilterState,
        sort: Sort,
        mode: FetchMode,
    ) -> Result<QueryOutcome, CatalogError> {
        filters.set_sort(sort);
        let ticket = {
            let mut state = self.state.lock().await;
            if mode == FetchMode::Append && state.replace_pending() {
                debug!("Append skipped: a new result set is loading");
                return Ok(QueryOutcome::Skipped);
            }
            state.search_text = search_text.to_string();
            state.filters = filters;
            let page = match mode {
                FetchMode::Append => state.pagination.current_page + 1,
                FetchMode::Replace => 1,
            };
            let params =
                SearchParams::build(&state.search_text, &state.filters, page, state.limit());
            self.issue(&mut state, params, mode, false)
        };
        self.run(ticket).await
    }

    /// Fetches the next page, or does nothing if the last page is showing.
    pub async fn load_more(&self) -> Result<QueryOutcome, CatalogError> {
        let (text, filters) = {
            let state = self.state.lock().await;
            if !state.has_more() || state.replace_pending() {
                debug!("Load more ignored: no further pages yet");
                return Ok(QueryOutcome::Skipped);
            }
            (state.search_text.clone(), state.filters.clone())
        };
        let sort = filters.sort();
        self.apply_query(&text, filters, sort, FetchMode::Append)
            .await
    }

    /// Submits the search box. Blank text does nothing.
    pub async fn search(&self, text: &str) -> Result<QueryOutcome, CatalogError> {
        if text.trim().is_empty() {
            return Ok(QueryOutcome::Skipped);
        }
        let filters = self.state.lock().await.filters.clone();
        let sort = filters.sort();
        self.apply_query(text, filters, sort, FetchMode::Replace)
            .await
    }

    pub async fn apply_filters(&self, filters: FilterState) -> Result<QueryOutcome, CatalogError> {
        let text = self.state.lock().await.search_text.clone();
        let sort = filters.sort();
        self.apply_query(&text, filters, sort, FetchMode::Replace)
            .await
    }

    pub async fn change_sort(&self, sort: Sort) -> Result<QueryOutcome, CatalogError> {
        let (text, filters) = {
            let state = self.state.lock().await;
            (state.search_text.clone(), state.filters.clone())
        };
        self.apply_query(&text, filters, sort, FetchMode::Replace)
            .await
    }

    /// Switches between paged results and one large page with every match.
    pub async fn set_show_all(&self, show_all: bool) -> Result<QueryOutcome, CatalogError> {
        let (text, filters) = {
            let mut state = self.state.lock().await;
            state.show_all = show_all;
            (state.search_text.clone(), state.filters.clone())
        };
        let sort = filters.sort();
        self.apply_query(&text, filters, sort, FetchMode::Replace)
            .await
    }

    /// Clears search, filters and results, then loads the default listing.
    pub async fn reset_to_defaults(&self) -> Result<QueryOutcome, CatalogError> {
        let ticket = {
            let mut state = self.state.lock().await;
            if state.failed_resets >= MAX_RESETS {
                warn!(
                    "Reset refused after {} consecutive failures",
                    state.failed_resets
                );
                state.status = LoadStatus::Failed;
                state.error = Some(CatalogFailure {
                    kind: FailureKind::Unknown,
                    message: "Failed to load movies: Too many reset attempts".to_string(),
                    terminal: true,
                });
                return Err(CatalogError::TooManyResets);
            }

            let failed_resets = state.failed_resets;
            let generation = state.generation;
            *state = CatalogState::new(self.page_size);
            state.failed_resets = failed_resets;
            state.generation = generation;

            let params = SearchParams::defaults(self.page_size);
            info!("Resetting catalog to defaults");
            self.issue(&mut state, params, FetchMode::Replace, true)
        };
        self.run(ticket).await
    }

    /// Manual "try again": forgets earlier failed resets, then resets.
    pub async fn retry(&self) -> Result<QueryOutcome, CatalogError> {
        {
            let mut state = self.state.lock().await;
            if state.failed_resets > 0 {
                info!(failed = state.failed_resets, "Retry requested, clearing reset count");
            }
            state.failed_resets = 0;
        }
        self.reset_to_defaults().await
    }

    fn issue(
        &self,
        state: &mut CatalogState,
        params: SearchParams,
        mode: FetchMode,
        reset: bool,
    ) -> Ticket {
        state.generation += 1;
        state.pending = Some(mode);
        state.status = LoadStatus::Loading;
        Ticket {
            generation: state.generation,
            params,
            mode,
            reset,
        }
    }

    async fn run(&self, ticket: Ticket) -> Result<QueryOutcome, CatalogError> {
        let result = self.movies.search_movies(&ticket.params).await;

        let mut state = self.state.lock().await;
        if state.generation != ticket.generation {
            debug!(
                stale = ticket.generation,
                latest = state.generation,
                "Dropping superseded catalog reply"
            );
            return Ok(QueryOutcome::Superseded);
        }
        state.pending = None;

        match result {
            Ok(page) => {
                let received = page.movies.len();
                commit_page(&mut state, page, &ticket);
                state.failed_resets = 0;
                info!(
                    page = state.pagination.current_page,
                    total_pages = state.pagination.total_pages,
                    received,
                    "Catalog updated"
                );
                Ok(QueryOutcome::Applied { received })
            }
            Err(err) => {
                warn!("Catalog fetch failed: {}", err);
                let message = if ticket.reset {
                    state.failed_resets += 1;
                    format!("Failed to load movies: {}", err.user_message())
                } else {
                    err.user_message()
                };
                if !state.loaded_once {
                    state.movies.clear();
                }
                state.status = LoadStatus::Failed;
                state.error = Some(CatalogFailure {
                    kind: err.kind(),
                    message,
                    terminal: false,
                });
                Err(CatalogError::Api(err))
            }
        }
    }
}

fn commit_page(state: &mut CatalogState, page: MoviePage, ticket: &Ticket) {
    let MoviePage {
        mut movies,
        total_pages,
        total_movies,
    } = page;
    sort_movies(&mut movies, ticket.params.sort);
    state.options = FilterOptions::from_movies(&movies);

    match ticket.mode {
        FetchMode::Append => {
            state.movies.extend(movies);
            state.pagination.current_page = ticket.params.page;
        }
        FetchMode::Replace => {
            state.movies = movies;
            state.pagination.current_page = 1;
        }
    }
    if let Some(pages) = total_pages {
        state.pagination.total_pages = pages;
    }
    if let Some(total) = total_movies {
        state.pagination.total_movies = total;
    }
    state.loaded_once = true;
    state.status = LoadStatus::Ready;
    state.error = None;
}
