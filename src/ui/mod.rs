//! User-facing models. Widgets are left to the windowing layer.

pub mod launcher_browser;

pub use launcher_browser::{BrowserError, BrowserRow, BrowserTarget, LauncherBrowser, RowItem};
