//! Plain-text rendering of catalog data for the terminal.

use std::fmt::Write;

use marquee_query::{CacheEntry, QueryStatus};
use marquee_shared::models::{Movie, MoviePage, Review, Theater};
use marquee_shared::ClientError;

use crate::pagination::{page_numbers, result_summary, PageItem};
use crate::params::FilterState;
use crate::toast::Toast;

/// Column that right-anchored toasts end at.
const TOAST_WIDTH: usize = 80;

pub fn movie_line(movie: &Movie) -> String {
    let runtime = movie
        .runtime_in_minutes
        .map(|m| format!("{m} min"))
        .unwrap_or_else(|| "runtime n/a".to_string());
    let showing = if movie.is_showing { "  [now showing]" } else { "" };
    format!(
        "#{:<5} {} ({}, {}){}",
        movie.movie_id, movie.title, movie.rating, runtime, showing
    )
}

pub fn render_movie_page(page: &MoviePage) -> String {
    let mut out = String::new();
    if page.movies.is_empty() {
        out.push_str("No movies match the current filters.\n");
    }
    for movie in &page.movies {
        let _ = writeln!(out, "{}", movie_line(movie));
    }

    if let Some(meta) = &page.pagination {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", result_summary(meta.page, meta.limit, meta.total_count));
        let links: Vec<String> = page_numbers(meta.page, meta.total_pages)
            .into_iter()
            .map(|item| match item {
                PageItem::Page(n) if n == meta.page => format!("[{n}]"),
                other => other.to_string(),
            })
            .collect();
        let prev = if meta.has_previous_page { "«" } else { " " };
        let next = if meta.has_next_page { "»" } else { " " };
        let _ = writeln!(out, "{prev} {} {next}  (page size {})", links.join(" "), meta.limit);
    }
    out
}

pub fn render_movie_list(movies: &[Movie]) -> String {
    if movies.is_empty() {
        return "No movies are showing right now.\n".to_string();
    }
    movies.iter().map(|m| movie_line(m) + "\n").collect()
}

fn review_block(review: &Review) -> String {
    let mut out = String::new();
    match &review.critic {
        Some(critic) => {
            let _ = writeln!(
                out,
                "  {} {} of {} (review #{})",
                critic.preferred_name, critic.surname, critic.organization_name, review.review_id
            );
        }
        None => {
            let _ = writeln!(out, "  Anonymous (review #{})", review.review_id);
        }
    }
    for line in review.content.lines().filter(|l| !l.trim().is_empty()) {
        let _ = writeln!(out, "    {line}");
    }
    let _ = writeln!(out, "    Rating: {}", review.score);
    out
}

pub fn render_movie_detail(movie: &Movie) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", movie.title, movie.movie_id);
    if !movie.description.is_empty() {
        let _ = writeln!(out, "{}", movie.description);
    }
    if let Some(runtime) = movie.runtime_in_minutes {
        let _ = writeln!(out, "Runtime: {runtime} minutes");
    }
    let _ = writeln!(out, "Rating: {}", movie.rating);
    let average = movie
        .average_score()
        .map(|s| s.to_string())
        .unwrap_or_else(|| "N/A".to_string());
    let _ = writeln!(out, "Average Review Rating: {average}");

    if !movie.theaters.is_empty() {
        let _ = writeln!(out, "\nNow showing at:");
        for theater in &movie.theaters {
            let _ = writeln!(out, "  {}", theater_line(theater));
        }
    }

    let _ = writeln!(out, "\nReviews:");
    if movie.reviews.is_empty() {
        let _ = writeln!(out, "  No reviews yet.");
    }
    for review in movie.sorted_reviews() {
        out.push_str(&review_block(review));
    }
    out
}

pub fn theater_line(theater: &Theater) -> String {
    let name = theater.name().unwrap_or("Unnamed theater");
    let place: Vec<&str> = ["address_line_1", "city", "state"]
        .iter()
        .filter_map(|field| theater.details.get(*field).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .collect();
    if place.is_empty() {
        format!("#{} {name}", theater.theater_id)
    } else {
        format!("#{} {name}, {}", theater.theater_id, place.join(", "))
    }
}

pub fn render_theaters(theaters: &[Theater]) -> String {
    if theaters.is_empty() {
        return "No theaters found.\n".to_string();
    }
    theaters.iter().map(|t| theater_line(t) + "\n").collect()
}

pub fn error_banner(error: &ClientError) -> String {
    format!("[{}] {error}", error.code())
}

/// Text for an entry that has not produced data to show: loading, error or idle.
pub fn entry_status<T>(entry: &CacheEntry<T>) -> Option<String> {
    match entry.status {
        QueryStatus::Error => entry.error.as_ref().map(error_banner),
        QueryStatus::Loading if entry.data.is_none() => Some("Loading...".to_string()),
        QueryStatus::Idle => Some("Nothing loaded yet.".to_string()),
        _ => None,
    }
}

/// Filters as `field=value` pairs, or `no filters`.
pub fn filter_line(filters: &FilterState) -> String {
    let mut parts = Vec::new();
    if let Some(title) = filters.title.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("title={title}"));
    }
    if let Some(rating) = filters.rating.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("rating={rating}"));
    }
    if let Some(min) = filters.min_runtime {
        parts.push(format!("min={min}"));
    }
    if let Some(max) = filters.max_runtime {
        parts.push(format!("max={max}"));
    }
    if let Some(year) = filters.year {
        parts.push(format!("year={year}"));
    }
    if let Some(showing) = filters.is_showing {
        parts.push(format!("showing={}", if showing { "yes" } else { "no" }));
    }
    if parts.is_empty() {
        "no filters".to_string()
    } else {
        parts.join(" ")
    }
}

/// One line for a visible toast. Alerts are flagged with `!`, and toasts anchored on the
/// right are right-aligned.
pub fn render_toast(toast: &Toast) -> Option<String> {
    if !toast.visible {
        return None;
    }
    let flag = if toast.variant.theme().role == "alert" { "! " } else { "" };
    let line = format!("{flag}[{}] {}: {}", toast.variant, toast.title, toast.message);
    if toast.placement.is_left() {
        Some(line)
    } else {
        Some(format!("{line:>width$}", width = TOAST_WIDTH))
    }
}

/// Last-resort message for failures nothing else handled.
pub fn fallback(error: &dyn std::fmt::Display) -> String {
    format!("Something went wrong.\n\nError details:\n  {error}\n\nRun the command again to retry.")
}
