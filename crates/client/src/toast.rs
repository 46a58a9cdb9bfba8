//! Single-slot toast notifications.
//!
//! At most one toast is visible. Showing a toast replaces the current one and restarts its
//! auto-hide timer; hiding resets the slot to [`Toast::default`]. Observers follow the slot
//! through a `watch` channel.
//!
//! Each toast gets a fresh id, and the auto-hide task only hides the toast it was started
//! for, so a timer that wakes after its toast was replaced does nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const DEFAULT_TITLE: &str = "Notification";
pub const DEFAULT_AUTO_HIDE_MS: i64 = 3000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToastVariant {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

/// Presentation attributes of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantTheme {
    pub header_color: &'static str,
    pub body_class: &'static str,
    /// `alert` for errors, `status` otherwise.
    pub role: &'static str,
    /// `assertive` for errors, `polite` otherwise.
    pub live: &'static str,
}

impl ToastVariant {
    /// Unknown names fall back to `info`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn theme(&self) -> VariantTheme {
        let (header_color, body_class) = match self {
            Self::Info => ("#0d6efd", "text-primary"),
            Self::Success => ("#198754", "text-success"),
            Self::Warning => ("#ffc107", "text-warning"),
            Self::Error => ("#dc3545", "text-danger"),
        };
        let urgent = matches!(self, Self::Error);
        VariantTheme {
            header_color,
            body_class,
            role: if urgent { "alert" } else { "status" },
            live: if urgent { "assertive" } else { "polite" },
        }
    }
}

impl fmt::Display for ToastVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToastPlacement {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
}

impl ToastPlacement {
    /// Unknown names fall back to `bottom-right`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "top-left" => Self::TopLeft,
            "top-right" => Self::TopRight,
            "bottom-left" => Self::BottomLeft,
            _ => Self::BottomRight,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TopLeft => "top-left",
            Self::TopRight => "top-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomRight => "bottom-right",
        }
    }

    pub fn is_top(&self) -> bool {
        matches!(self, Self::TopLeft | Self::TopRight)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, Self::TopLeft | Self::BottomLeft)
    }
}

impl fmt::Display for ToastPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional overrides for a toast. Names are kept as raw strings so unknown values can be
/// defaulted rather than rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastOptions {
    pub title: Option<String>,
    pub variant: Option<String>,
    pub placement: Option<String>,
    pub auto_hide_duration: Option<i64>,
}

impl ToastOptions {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn variant(mut self, variant: ToastVariant) -> Self {
        self.variant = Some(variant.as_str().to_string());
        self
    }

    pub fn placement(mut self, placement: ToastPlacement) -> Self {
        self.placement = Some(placement.as_str().to_string());
        self
    }

    /// Zero or negative keeps the toast until it is hidden.
    pub fn auto_hide_ms(mut self, ms: i64) -> Self {
        self.auto_hide_duration = Some(ms);
        self
    }
}

/// A message bundled with its own overrides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToastConfig {
    pub message: String,
    #[serde(flatten)]
    pub options: ToastOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastRequest {
    Message(String),
    Config(ToastConfig),
}

impl From<&str> for ToastRequest {
    fn from(message: &str) -> Self {
        Self::Message(message.to_string())
    }
}

impl From<String> for ToastRequest {
    fn from(message: String) -> Self {
        Self::Message(message)
    }
}

impl From<ToastConfig> for ToastRequest {
    fn from(config: ToastConfig) -> Self {
        Self::Config(config)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub visible: bool,
    pub message: String,
    pub title: String,
    pub variant: ToastVariant,
    pub placement: ToastPlacement,
    pub auto_hide_duration_ms: i64,
}

impl Default for Toast {
    fn default() -> Self {
        Self {
            id: 0,
            visible: false,
            message: String::new(),
            title: DEFAULT_TITLE.to_string(),
            variant: ToastVariant::Info,
            placement: ToastPlacement::BottomRight,
            auto_hide_duration_ms: DEFAULT_AUTO_HIDE_MS,
        }
    }
}

struct Inner {
    tx: watch::Sender<Toast>,
    next_id: AtomicU64,
    default_duration_ms: i64,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn hide_if_current(&self, id: u64) {
        let mut timer = self.timer.lock();
        if self.tx.borrow().id != id {
            return;
        }
        timer.take();
        self.tx.send_replace(Toast::default());
        tracing::debug!(toast_id = id, "toast auto-hidden");
    }
}

/// Owns the toast slot. Clones share it.
#[derive(Clone)]
pub struct ToastController {
    inner: Arc<Inner>,
}

impl Default for ToastController {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_HIDE_MS)
    }
}

impl ToastController {
    /// `default_duration_ms` applies when a toast names no duration.
    pub fn new(default_duration_ms: i64) -> Self {
        let (tx, _) = watch::channel(Toast::default());
        Self {
            inner: Arc::new(Inner {
                tx,
                next_id: AtomicU64::new(0),
                default_duration_ms,
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn current(&self) -> Toast {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Toast> {
        self.inner.tx.subscribe()
    }

    /// Shows a toast and returns its id. A [`ToastConfig`] carries its own overrides and
    /// `options` is ignored; a bare message uses `options`. Must be called within a tokio
    /// runtime when the toast auto-hides.
    pub fn show(&self, request: impl Into<ToastRequest>, options: ToastOptions) -> u64 {
        let (message, options) = match request.into() {
            ToastRequest::Message(message) => (message, options),
            ToastRequest::Config(config) => (config.message, config.options),
        };

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let toast = Toast {
            id,
            visible: true,
            message,
            title: options.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            variant: options
                .variant
                .as_deref()
                .map(ToastVariant::parse_or_default)
                .unwrap_or_default(),
            placement: options
                .placement
                .as_deref()
                .map(ToastPlacement::parse_or_default)
                .unwrap_or_default(),
            auto_hide_duration_ms: options
                .auto_hide_duration
                .unwrap_or(self.inner.default_duration_ms),
        };
        let duration_ms = toast.auto_hide_duration_ms;

        let mut timer = self.inner.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        tracing::debug!(
            toast_id = id,
            variant = %toast.variant,
            auto_hide_ms = duration_ms,
            "toast shown"
        );
        self.inner.tx.send_replace(toast);

        if duration_ms > 0 {
            let weak: Weak<Inner> = Arc::downgrade(&self.inner);
            let delay = Duration::from_millis(duration_ms.unsigned_abs());
            *timer = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = weak.upgrade() {
                    inner.hide_if_current(id);
                }
            }));
        }

        id
    }

    /// Resets the slot to the default toast and cancels any pending auto-hide.
    pub fn hide(&self) {
        let mut timer = self.inner.timer.lock();
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        self.inner.tx.send_replace(Toast::default());
    }
}
