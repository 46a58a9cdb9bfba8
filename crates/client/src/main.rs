//! `marquee`: terminal client for the movie catalog backend.
//!
//! Environment variables:
//! - `API_BASE_URL`: backend root URL (default: http://localhost:5000)
//! - `RUST_LOG`: tracing env filter (default: warn)
//! - `REQUEST_TIMEOUT_SECS`, `MAX_CONCURRENT_REQUESTS`, `STALE_TIME_MS`, `GC_TIME_MS`,
//!   `FILTER_DEBOUNCE_MS`, `TOAST_DURATION_MS`: see `marquee_shared::config`

use std::io::IsTerminal;
use std::panic::AssertUnwindSafe;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Args, Parser, Subcommand};
use futures::FutureExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use marquee_client::browse::{BrowseCommand, Outcome, HELP};
use marquee_client::loading::loading_line;
use marquee_client::params::{FilterState, ListParams, PaginationState, SortField, SortOrder, PAGE_LIMITS};
use marquee_client::toast::{ToastConfig, ToastOptions, ToastVariant};
use marquee_client::{view, Catalog, ListController, ReviewScores, ToastController};
use marquee_query::{CacheEntry, CacheKey, QueryStatus, Subscription};
use marquee_shared::config::ClientConfig;
use marquee_shared::models::MoviePage;
use marquee_shared::ClientError;

#[derive(Parser, Debug)]
#[command(name = "marquee", version, about = "Browse the movie catalog from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List movies with filters, sorting and pagination
    Movies(MoviesArgs),
    /// List movies currently in theaters
    Showing,
    /// Show one movie with its reviews and theaters
    Movie { id: i64 },
    /// List theaters
    Theaters,
    /// Move a review's score up or down
    Score(ScoreArgs),
    /// Browse the movie list interactively
    Browse,
}

#[derive(Args, Debug)]
struct MoviesArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    rating: Option<String>,
    #[arg(long)]
    min_runtime: Option<u32>,
    #[arg(long)]
    max_runtime: Option<u32>,
    #[arg(long)]
    year: Option<u32>,
    #[arg(long)]
    showing: Option<bool>,
    #[arg(long, default_value = "title")]
    sort_by: SortField,
    #[arg(long, default_value = "asc")]
    sort_order: SortOrder,
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
}

impl MoviesArgs {
    fn list_params(self) -> Result<ListParams, ClientError> {
        if self.page == 0 {
            return Err(ClientError::Validation("page starts at 1".into()));
        }
        if !PAGE_LIMITS.contains(&self.limit) {
            return Err(ClientError::Validation(format!(
                "limit must be one of {PAGE_LIMITS:?}"
            )));
        }
        let filters = FilterState {
            title: self.title,
            rating: self.rating,
            min_runtime: self.min_runtime,
            max_runtime: self.max_runtime,
            year: self.year,
            is_showing: self.showing,
        };
        let pagination = PaginationState {
            page: self.page,
            limit: self.limit,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        };
        Ok(ListParams::from_state(&filters, &pagination))
    }
}

#[derive(Args, Debug)]
struct ScoreArgs {
    #[arg(long)]
    movie: i64,
    #[arg(long)]
    review: i64,
    /// Signed step, e.g. 1 or -1
    #[arg(long, allow_hyphen_values = true)]
    delta: i32,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match AssertUnwindSafe(run(cli)).catch_unwind().await {
        Ok(Ok(code)) => code,
        Ok(Err(e)) => {
            tracing::error!(error = %e, code = e.code(), "command failed");
            eprintln!("{}", view::fallback(&e));
            ExitCode::FAILURE
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unexpected panic".to_string());
            eprintln!("{}", view::fallback(&message));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, ClientError> {
    let config = ClientConfig::from_env()?;
    let catalog = Catalog::from_config(&config)?;
    tracing::debug!(base_url = %catalog.http().base_url(), "catalog ready");
    let toasts = ToastController::new(config.toast_duration_ms);

    let code = match cli.command {
        Command::Movies(args) => {
            let mut sub = catalog.subscribe_movies(&args.list_params()?);
            print_entry(&wait(&mut sub).await, view::render_movie_page)
        }
        Command::Showing => {
            let mut sub = catalog.subscribe_showing();
            print_entry(&wait(&mut sub).await, |movies| view::render_movie_list(movies))
        }
        Command::Movie { id } => {
            let mut sub = catalog.subscribe_movie(id);
            print_entry(&wait(&mut sub).await, view::render_movie_detail)
        }
        Command::Theaters => {
            let mut sub = catalog.subscribe_theaters();
            print_entry(&wait(&mut sub).await, |theaters| view::render_theaters(theaters))
        }
        Command::Score(args) => score(&catalog, &toasts, args).await,
        Command::Browse => browse(&catalog, &config, &toasts).await,
    };

    Ok(code)
}

/// Waits for the subscription to settle, animating a loading line on a terminal. Ctrl-C
/// cancels the request and returns the entry as it was before the fetch.
async fn wait<T: Send + Sync + 'static>(sub: &mut Subscription<T>) -> CacheEntry<T> {
    let animate = std::io::stderr().is_terminal();
    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            entry = sub.settled() => {
                if animate {
                    eprint!("\r\x1b[2K");
                }
                return entry;
            }
            _ = ticker.tick(), if animate => {
                eprint!("\r{}", loading_line(started.elapsed()));
            }
            _ = &mut interrupt => {
                if animate {
                    eprint!("\r\x1b[2K");
                }
                if sub.cancel() {
                    tracing::info!(key = %sub.key(), "request cancelled");
                }
                return sub.snapshot();
            }
        }
    }
}

fn print_entry<T>(entry: &CacheEntry<T>, render: impl FnOnce(&T) -> String) -> ExitCode {
    match &entry.data {
        Some(data) if entry.status == QueryStatus::Success => {
            print!("{}", render(data.as_ref()));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("{}", view::entry_status(entry).unwrap_or_default());
            ExitCode::FAILURE
        }
    }
}

fn announce(toasts: &ToastController) {
    if let Some(line) = view::render_toast(&toasts.current()) {
        eprintln!("{line}");
    }
}

/// Prints `body` with the current toast above or below it, following its placement.
fn announce_around(toasts: &ToastController, body: impl FnOnce() -> ExitCode) -> ExitCode {
    let top = toasts.current().placement.is_top();
    if top {
        announce(toasts);
    }
    let code = body();
    if !top {
        announce(toasts);
    }
    code
}

async fn score(catalog: &Catalog, toasts: &ToastController, args: ScoreArgs) -> ExitCode {
    let mut detail = catalog.subscribe_movie(args.movie);
    let entry = wait(&mut detail).await;
    let movie = match &entry.data {
        Some(movie) if entry.status == QueryStatus::Success => movie.clone(),
        _ => return print_entry(&entry, view::render_movie_detail),
    };

    let Some(review) = movie.reviews.iter().find(|r| r.review_id == args.review) else {
        toasts.show(
            format!("Movie {} has no review {}", args.movie, args.review),
            ToastOptions::default().variant(ToastVariant::Warning),
        );
        announce(toasts);
        return ExitCode::FAILURE;
    };

    let scores = ReviewScores::new(catalog.clone());
    match scores.submit_score_change(review, args.delta).await {
        Ok(change) => {
            toasts.show(
                format!("Score updated to {}", change.score),
                ToastOptions::default().variant(ToastVariant::Success),
            );
            let entry = wait(&mut detail).await;
            announce_around(toasts, || print_entry(&entry, view::render_movie_detail))
        }
        Err(e) => {
            toasts.show(
                ToastConfig {
                    message: e.to_string(),
                    options: ToastOptions::default().title("Review").variant(ToastVariant::Error),
                },
                ToastOptions::default(),
            );
            announce(toasts);
            ExitCode::FAILURE
        }
    }
}

/// Identifies what the list view last printed, so unrelated entry updates (such as a
/// subscriber count change) do not reprint the page.
type Rendered = (CacheKey, QueryStatus, Option<i64>);

fn render_list(
    key: &CacheKey,
    entry: &CacheEntry<MoviePage>,
    controller: &ListController,
    last: &mut Option<Rendered>,
) {
    if entry.is_fetching {
        if entry.data.is_none() {
            println!("Loading...");
        }
        return;
    }

    let stamp = (
        key.clone(),
        entry.status,
        entry.last_fetched_at.map(|t| t.timestamp_millis()),
    );
    if last.as_ref() == Some(&stamp) {
        return;
    }
    *last = Some(stamp);

    if let Some(status) = view::entry_status(entry) {
        eprintln!("{status}");
        return;
    }
    if let Some(page) = &entry.data {
        if let Some(meta) = &page.pagination {
            controller.observe_pagination(meta);
        }
        print!("{}", view::render_movie_page(page));
    }
}

async fn browse(catalog: &Catalog, config: &ClientConfig, toasts: &ToastController) -> ExitCode {
    let (tx, mut changes) = mpsc::unbounded_channel::<ListParams>();
    let controller = ListController::new(config.filter_debounce, move |params: &ListParams| {
        let _ = tx.send(params.clone());
    });

    let mut sub = catalog.subscribe_movies(&controller.params());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = None;

    println!("{HELP}");
    render_list(sub.key(), &sub.snapshot(), &controller, &mut last);

    loop {
        tokio::select! {
            Some(params) = changes.recv() => {
                sub = catalog.subscribe_movies(&params);
                render_list(sub.key(), &sub.snapshot(), &controller, &mut last);
            }
            Some(entry) = sub.changed() => {
                render_list(sub.key(), &entry, &controller, &mut last);
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read input");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<BrowseCommand>().and_then(|c| c.apply(&controller)) {
                    Ok(Outcome::Continue) => {}
                    Ok(Outcome::Editing) => {
                        println!("filters: {}", view::filter_line(&controller.local_filters()));
                    }
                    Ok(Outcome::Refresh) => {
                        last = None;
                        sub.refetch();
                    }
                    Ok(Outcome::Help) => println!("{HELP}"),
                    Ok(Outcome::Quit) => break,
                    Err(e) => {
                        toasts.show(e.to_string(), ToastOptions::default().variant(ToastVariant::Warning));
                        announce(toasts);
                    }
                }
            }
        }
    }

    controller.teardown();
    ExitCode::SUCCESS
}
