//! Value-history visualizations drawn into icons (gauges, graphs, ...).

mod engine;
mod history;
mod renderer;

pub use engine::{
    attach, detach, push_values, reconfigure, refresh, resize_history, DataRendererState, Emblem,
    EmblemImage,
};
pub use history::DataHistory;
pub use renderer::{
    BoxedRenderer, DataRenderer, RenderInput, RendererError, RendererFactory, RendererLayout,
    RendererRecord, RendererRegistry, Zone,
};
