//! Movie catalog client: resource registry, list state, review scores and toasts, plus the
//! text views used by the `marquee` binary.

pub mod browse;
pub mod catalog;
pub mod list_controller;
pub mod loading;
pub mod pagination;
pub mod params;
pub mod reviews;
pub mod toast;
pub mod view;

pub use catalog::Catalog;
pub use list_controller::ListController;
pub use reviews::ReviewScores;
pub use toast::ToastController;
