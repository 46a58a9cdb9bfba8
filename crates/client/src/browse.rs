//! Line commands for the interactive movie browser.

use std::str::FromStr;

use marquee_shared::ClientError;

use crate::list_controller::ListController;
use crate::params::{FilterEdit, SortField, SortOrder};

pub const HELP: &str = "\
commands:
  title [text]        filter by title (no text clears)
  rating [code]       filter by rating, e.g. PG-13
  min [minutes]       minimum runtime
  max [minutes]       maximum runtime
  year [year]         release year
  showing [yes|no]    only movies in theaters, or not
  sort <field> [asc|desc]
  page <n> | next | prev
  limit <5|10|20|50>
  clear               remove all filters
  refresh             refetch the current page
  help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowseCommand {
    Filter(FilterEdit),
    Sort(SortField, SortOrder),
    Page(u32),
    Next,
    Prev,
    Limit(u32),
    Clear,
    Refresh,
    Help,
    Quit,
}

fn optional<T: FromStr>(arg: &str, what: &str) -> Result<Option<T>, ClientError> {
    if arg.is_empty() {
        return Ok(None);
    }
    arg.parse()
        .map(Some)
        .map_err(|_| ClientError::Validation(format!("invalid {what}: {arg}")))
}

fn required<T: FromStr>(arg: &str, what: &str) -> Result<T, ClientError> {
    optional(arg, what)?.ok_or_else(|| ClientError::Validation(format!("missing {what}")))
}

impl FromStr for BrowseCommand {
    type Err = ClientError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let text = || (!rest.is_empty()).then(|| rest.to_string());

        let command = match word.to_ascii_lowercase().as_str() {
            "title" => Self::Filter(FilterEdit::Title(text())),
            "rating" => Self::Filter(FilterEdit::Rating(text())),
            "min" => Self::Filter(FilterEdit::MinRuntime(optional(rest, "runtime")?)),
            "max" => Self::Filter(FilterEdit::MaxRuntime(optional(rest, "runtime")?)),
            "year" => Self::Filter(FilterEdit::Year(optional(rest, "year")?)),
            "showing" => {
                let value = match rest.to_ascii_lowercase().as_str() {
                    "" | "any" => None,
                    "yes" | "true" => Some(true),
                    "no" | "false" => Some(false),
                    other => return Err(ClientError::Validation(format!("invalid showing value: {other}"))),
                };
                Self::Filter(FilterEdit::IsShowing(value))
            }
            "sort" => {
                let mut parts = rest.split_whitespace();
                let field: SortField = parts
                    .next()
                    .ok_or_else(|| ClientError::Validation("missing sort field".into()))?
                    .parse()?;
                let order = parts.next().map(str::parse::<SortOrder>).transpose()?.unwrap_or_default();
                Self::Sort(field, order)
            }
            "page" => Self::Page(required(rest, "page")?),
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "limit" => Self::Limit(required(rest, "limit")?),
            "clear" => Self::Clear,
            "refresh" | "r" => Self::Refresh,
            "help" | "?" => Self::Help,
            "quit" | "q" | "exit" => Self::Quit,
            other => return Err(ClientError::Validation(format!("unknown command: {other}"))),
        };
        Ok(command)
    }
}

/// What the browser loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    /// A filter edit is waiting out the debounce.
    Editing,
    Refresh,
    Help,
    Quit,
}

impl BrowseCommand {
    /// Applies the command to the list controller.
    pub fn apply(self, controller: &ListController) -> Result<Outcome, ClientError> {
        let page = controller.pagination().page;
        match self {
            Self::Filter(edit) => {
                controller.apply_filter_edit(edit);
                return Ok(Outcome::Editing);
            }
            Self::Sort(field, order) => controller.apply_sort_change(field, order),
            Self::Page(n) => {
                if !controller.change_page(n) {
                    let message = match controller.total_pages() {
                        Some(total) => format!("page {n} is not available (1-{total})"),
                        None => "the page count is not known yet".to_string(),
                    };
                    return Err(ClientError::Validation(message));
                }
            }
            Self::Next => {
                if !controller.change_page(page.saturating_add(1)) {
                    return Err(ClientError::Validation("already on the last page".into()));
                }
            }
            Self::Prev => {
                if !controller.change_page(page.saturating_sub(1)) {
                    return Err(ClientError::Validation("already on the first page".into()));
                }
            }
            Self::Limit(n) => controller.change_limit(n)?,
            Self::Clear => {
                if !controller.has_active_filters() {
                    return Err(ClientError::Validation("no filters to clear".into()));
                }
                controller.clear_filters();
            }
            Self::Refresh => return Ok(Outcome::Refresh),
            Self::Help => return Ok(Outcome::Help),
            Self::Quit => return Ok(Outcome::Quit),
        }
        Ok(Outcome::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use marquee_shared::models::Pagination;

    use super::*;
    use crate::params::ListParams;

    #[test]
    fn parses_filters() {
        assert_eq!(
            "title  the thing ".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Filter(FilterEdit::Title(Some("the thing".into())))
        );
        assert_eq!(
            "title".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Filter(FilterEdit::Title(None))
        );
        assert_eq!(
            "min 90".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Filter(FilterEdit::MinRuntime(Some(90)))
        );
        assert_eq!(
            "showing no".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Filter(FilterEdit::IsShowing(Some(false)))
        );
    }

    #[test]
    fn parses_navigation() {
        assert_eq!(
            "sort rating desc".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Sort(SortField::Rating, SortOrder::Desc)
        );
        assert_eq!(
            "sort title".parse::<BrowseCommand>().unwrap(),
            BrowseCommand::Sort(SortField::Title, SortOrder::Asc)
        );
        assert_eq!("page 3".parse::<BrowseCommand>().unwrap(), BrowseCommand::Page(3));
        assert_eq!("Q".parse::<BrowseCommand>().unwrap(), BrowseCommand::Quit);
    }

    #[test]
    fn rejects_bad_input() {
        for line in ["page", "page two", "min ninety", "sort", "showing maybe", "dance"] {
            let err = line.parse::<BrowseCommand>().unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR", "{line}");
        }
    }

    fn controller() -> (ListController, Arc<Mutex<Vec<ListParams>>>) {
        let seen = Arc::new(Mutex::new(Vec::<ListParams>::new()));
        let sink = seen.clone();
        let controller = ListController::new(Duration::from_millis(500), move |p: &ListParams| {
            sink.lock().push(p.clone())
        });
        (controller, seen)
    }

    fn pages(total_pages: u32) -> Pagination {
        Pagination {
            page: 1,
            limit: 10,
            total_pages,
            total_count: u64::from(total_pages) * 10,
            has_next_page: total_pages > 1,
            has_previous_page: false,
        }
    }

    #[test]
    fn navigation_reports_unavailable_pages() {
        let (controller, seen) = controller();

        assert!(BrowseCommand::Next.apply(&controller).is_err());
        let err = BrowseCommand::Page(2).apply(&controller).unwrap_err();
        assert!(err.to_string().contains("not known yet"));
        controller.observe_pagination(&pages(2));

        assert!(BrowseCommand::Prev.apply(&controller).is_err());
        assert_eq!(BrowseCommand::Next.apply(&controller).unwrap(), Outcome::Continue);
        assert_eq!(seen.lock().last().unwrap().page, Some(2));
        assert!(BrowseCommand::Next.apply(&controller).is_err());
        let err = BrowseCommand::Page(3).apply(&controller).unwrap_err();
        assert!(err.to_string().contains("(1-2)"));
        assert!(BrowseCommand::Limit(3).apply(&controller).is_err());
        assert_eq!(BrowseCommand::Refresh.apply(&controller).unwrap(), Outcome::Refresh);
    }

    #[tokio::test]
    async fn filter_edits_report_pending_state() {
        let (controller, seen) = controller();
        let outcome = BrowseCommand::Filter(FilterEdit::Year(Some(1982))).apply(&controller);
        assert_eq!(outcome.unwrap(), Outcome::Editing);
        assert_eq!(controller.local_filters().year, Some(1982));
        assert!(controller.filters().year.is_none());
        assert!(seen.lock().is_empty());

        assert_eq!(BrowseCommand::Clear.apply(&controller).unwrap(), Outcome::Continue);
        assert_eq!(seen.lock().len(), 1);
        assert!(BrowseCommand::Clear.apply(&controller).is_err());
    }

    #[test]
    fn next_on_the_highest_page_number_is_rejected() {
        let (controller, _) = controller();
        controller.observe_pagination(&pages(u32::MAX));
        assert!(BrowseCommand::Page(u32::MAX).apply(&controller).is_ok());

        let err = BrowseCommand::Next.apply(&controller).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(controller.pagination().page, u32::MAX);
    }
}
