//! rg-dock: a desktop dock hosting applet modules and animated data renderers
//!
//! The binary wires the core scene, the module manager and the renderer
//! registry together and drives them from a tokio interval.

pub mod app;
pub mod applets;
pub mod config;
pub mod ui;

pub use app::{App, ModuleSummary};
pub use config::AppConfig;
