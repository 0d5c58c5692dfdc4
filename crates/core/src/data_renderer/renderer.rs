//! Data renderer trait and the factory registry.

use cairo::{Context, ImageSurface};
use rg_dock_types::{DataRendererAttributes, KeyFile};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::history::DataHistory;
use crate::icon::IconId;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Unknown data renderer: {0}")]
    UnknownRenderer(String),

    #[error("{0} has no data renderer")]
    NoRenderer(IconId),

    #[error("No icon to draw on")]
    NoIcon,

    #[error("Drawing failed: {0}")]
    Surface(#[from] cairo::Error),

    #[error("Cannot load theme {path}: {reason}")]
    Theme { path: PathBuf, reason: String },
}

/// Rectangle in icon pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Zone {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Zone {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }
}

/// Where a renderer wants emblems and text drawn, one zone per value.
#[derive(Debug, Clone, Default)]
pub struct RendererLayout {
    pub emblems: Vec<Zone>,
    pub text_zones: Vec<Zone>,
}

/// Everything a renderer reads for one frame.
pub struct RenderInput<'a> {
    pub history: &'a DataHistory,
    pub attributes: &'a DataRendererAttributes,
    pub width: f64,
    pub height: f64,
    /// Share of the smoothing still to run; 0 draws the latest sample.
    pub fraction: f64,
    pub emblems: &'a [Option<ImageSurface>],
    pub emblem_zones: &'a [Zone],
    pub text_zones: &'a [Zone],
}

impl RenderInput<'_> {
    /// Normalized value `index` at the current smoothing fraction.
    pub fn value(&self, index: usize) -> f64 {
        if self.fraction > 0.0 {
            self.history.normalized_with_latency(index, self.fraction)
        } else {
            self.history.normalized_current(index)
        }
    }

    pub fn nb_values(&self) -> usize {
        self.history.nb_values()
    }
}

/// A visualization of a value history, drawn into an icon.
pub trait DataRenderer {
    fn name(&self) -> &str;

    /// Prepare for drawing at the given size.
    fn load(
        &mut self,
        width: f64,
        height: f64,
        attributes: &DataRendererAttributes,
    ) -> Result<RendererLayout, RendererError>;

    /// Draw on a cleared surface.
    fn render(&self, cr: &Context, input: &RenderInput) -> Result<(), RendererError>;

    /// Whether the renderer can draw through the accelerated backend.
    fn supports_accelerated(&self) -> bool {
        false
    }

    /// Draw into a texture of the accelerated backend.
    fn render_accelerated(&self, target: &ImageSurface, input: &RenderInput) -> Result<(), RendererError> {
        let cr = Context::new(target)?;
        cr.set_operator(cairo::Operator::Source);
        cr.set_source_rgba(0.0, 0.0, 0.0, 0.0);
        cr.paint()?;
        cr.set_operator(cairo::Operator::Over);
        self.render(&cr, input)
    }

    /// The icon was resized.
    fn reload(&mut self, _width: f64, _height: f64) {}

    /// Whether the renderer writes the values itself when asked to.
    fn can_render_text(&self) -> bool {
        false
    }
}

pub type BoxedRenderer = Box<dyn DataRenderer>;

/// Function that creates a renderer
pub type RendererFactory = fn() -> BoxedRenderer;

#[derive(Clone)]
pub struct RendererRecord {
    pub factory: RendererFactory,
    /// Directory name holding this renderer's themes, if it uses any.
    pub theme_dir: Option<String>,
    pub default_theme: Option<String>,
}

impl RendererRecord {
    pub fn new(factory: RendererFactory) -> Self {
        Self {
            factory,
            theme_dir: None,
            default_theme: None,
        }
    }

    pub fn with_themes(mut self, theme_dir: &str, default_theme: &str) -> Self {
        self.theme_dir = Some(theme_dir.to_string());
        self.default_theme = Some(default_theme.to_string());
        self
    }
}

/// Registry of renderer factories by name
///
/// Renderers are looked up by the model name applets put in their
/// attributes. Themes live in `<share_dir>/<theme_dir>` and
/// `<user_dir>/<theme_dir>`; a user theme hides a shared one of the same name.
#[derive(Default)]
pub struct RendererRegistry {
    records: HashMap<String, RendererRecord>,
    share_dir: Option<PathBuf>,
    user_dir: Option<PathBuf>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dirs(share_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            records: HashMap::new(),
            share_dir,
            user_dir,
        }
    }

    pub fn register(&mut self, name: &str, record: RendererRecord) {
        self.records.insert(name.to_string(), record);
    }

    pub fn record(&self, name: &str) -> Option<&RendererRecord> {
        self.records.get(name)
    }

    pub fn create(&self, name: &str) -> Result<BoxedRenderer, RendererError> {
        let record = self
            .records
            .get(name)
            .ok_or_else(|| RendererError::UnknownRenderer(name.to_string()))?;
        Ok((record.factory)())
    }

    /// Registered renderer names, sorted.
    pub fn list_renderers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.keys().cloned().collect();
        names.sort();
        names
    }

    /// Available themes of a renderer, by name.
    pub fn list_themes(&self, renderer: &str) -> BTreeMap<String, PathBuf> {
        let mut themes = BTreeMap::new();
        let Some(theme_dir) = self.records.get(renderer).and_then(|r| r.theme_dir.as_ref()) else {
            return themes;
        };
        for base in [&self.share_dir, &self.user_dir].into_iter().flatten() {
            let dir = base.join(theme_dir);
            let entries = match std::fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) => {
                    log::debug!("No themes in {}: {}", dir.display(), e);
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        themes.insert(name.to_string(), path.clone());
                    }
                }
            }
        }
        themes
    }

    /// Path of a theme. The name may carry a `[type]` suffix or be a path.
    pub fn theme_path(&self, renderer: &str, theme: &str) -> Option<PathBuf> {
        let name = strip_theme_type(theme);
        let direct = Path::new(name);
        if direct.is_absolute() && direct.is_dir() {
            return Some(direct.to_path_buf());
        }
        self.list_themes(renderer).remove(name)
    }

    /// Resolve the theme chosen in a config file.
    ///
    /// Falls back to the renderer's default theme, and writes the default
    /// back when the key was missing. Returns `None` for renderers without
    /// themes.
    pub fn theme_path_from_config(
        &self,
        renderer: &str,
        key_file: &mut KeyFile,
        group: &str,
        key: &str,
    ) -> Option<PathBuf> {
        let record = self.records.get(renderer)?;
        let theme_dir = record.theme_dir.as_ref()?;
        let default_theme = record.default_theme.clone().unwrap_or_default();
        let chosen = match key_file.get_string(group, key) {
            Some(name) => name,
            None => {
                key_file.set_string(group, key, &default_theme);
                default_theme.clone()
            }
        };
        let path = self.theme_path(renderer, &chosen).or_else(|| {
            log::warn!("Theme '{}' of {} not found, using '{}'", chosen, renderer, default_theme);
            self.share_dir
                .as_ref()
                .map(|share| share.join(theme_dir).join(&default_theme))
        });
        log::debug!("Theme of {}: {:?}", renderer, path);
        path
    }
}

fn strip_theme_type(theme: &str) -> &str {
    match theme.rfind('[') {
        Some(pos) if theme.ends_with(']') => &theme[..pos],
        _ => theme,
    }
}
