//! Launcher configuration browser
//!
//! A tree of every root dock and its icons (sub-docks nested under the
//! icon that opens them), followed by one row per desklet. Selecting an
//! icon row loads its config file; edits are staged, then written and
//! applied in one go.

use log::{debug, info};
use rg_dock_core::data_renderer::RendererRegistry;
use rg_dock_core::module::{InstanceId, ModuleError, ModuleManager};
use rg_dock_core::{ContainerRef, IconId, IconKind, Scene};
use rg_dock_types::{KeyFile, KeyFileError};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("The launcher browser is not open")]
    NotOpen,

    #[error("No row {0}")]
    NoSuchRow(usize),

    #[error("{0} has no config file")]
    NoConfig(IconId),

    #[error("Nothing is selected")]
    NothingSelected,

    #[error(transparent)]
    KeyFile(#[from] KeyFileError),

    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// What a row stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowItem {
    Dock(String),
    Icon(IconId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowserRow {
    /// Nesting level; root docks and desklets are at 0.
    pub depth: usize,
    pub label: String,
    pub item: RowItem,
}

/// What to show the browser on.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserTarget {
    Icon(IconId),
    Container(ContainerRef),
}

/// The config file of the selected row.
struct Selection {
    icon: IconId,
    conf_file: PathBuf,
    instance: Option<InstanceId>,
    key_file: KeyFile,
}

#[derive(Default)]
pub struct LauncherBrowser {
    open: bool,
    rows: Vec<BrowserRow>,
    selected: Option<usize>,
    selection: Option<Selection>,
    staged: Vec<(String, String, Value)>,
}

impl LauncherBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn rows(&self) -> &[BrowserRow] {
        &self.rows
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected
    }

    /// Config file being edited.
    pub fn conf_file(&self) -> Option<&std::path::Path> {
        self.selection.as_ref().map(|s| s.conf_file.as_path())
    }

    /// Values of the file being edited, staged edits not included.
    pub fn key_file(&self) -> Option<&KeyFile> {
        self.selection.as_ref().map(|s| &s.key_file)
    }

    pub fn staged_count(&self) -> usize {
        self.staged.len()
    }

    /// Open the browser, or reuse it, and select the row of `target`.
    pub fn show(
        &mut self,
        scene: &Scene,
        modules: &mut ModuleManager,
        target: &BrowserTarget,
    ) -> Result<(), BrowserError> {
        if !self.open {
            info!("Opening the launcher browser");
        }
        self.open = true;
        self.rows = build_rows(scene);

        let wanted = match target {
            BrowserTarget::Icon(icon) => RowItem::Icon(*icon),
            BrowserTarget::Container(ContainerRef::Dock(name)) => RowItem::Dock(name.clone()),
            BrowserTarget::Container(ContainerRef::Desklet(id)) => {
                match scene.desklet(*id).and_then(|d| d.icon) {
                    Some(icon) => RowItem::Icon(icon),
                    None => {
                        self.clear_selection();
                        return Ok(());
                    }
                }
            }
        };
        match self.rows.iter().position(|row| row.item == wanted) {
            Some(row) => self.select(scene, modules, row),
            None => {
                debug!("Nothing to select for {:?}", target);
                self.clear_selection();
                Ok(())
            }
        }
    }

    /// Select a row. Icon rows load their config file; launchers read their
    /// desktop file and applets their instance file.
    pub fn select(&mut self, scene: &Scene, modules: &mut ModuleManager, row: usize) -> Result<(), BrowserError> {
        if !self.open {
            return Err(BrowserError::NotOpen);
        }
        let item = self
            .rows
            .get(row)
            .map(|r| r.item.clone())
            .ok_or(BrowserError::NoSuchRow(row))?;
        self.staged.clear();
        self.selected = Some(row);
        self.selection = None;

        let RowItem::Icon(icon_id) = item else {
            return Ok(());
        };
        let icon = scene.icon(icon_id).ok_or(BrowserError::NoConfig(icon_id))?;
        let (conf_file, instance) = match &icon.kind {
            IconKind::Launcher { desktop_file } => (desktop_file.clone(), None),
            IconKind::Applet => {
                let id = icon
                    .instance
                    .or_else(|| modules.instance_for_icon(icon_id))
                    .ok_or(BrowserError::NoConfig(icon_id))?;
                let path = modules
                    .instance(id)
                    .and_then(|i| i.conf_file.clone())
                    .ok_or(BrowserError::NoConfig(icon_id))?;
                (path, Some(id))
            }
            IconKind::Separator | IconKind::Other => return Err(BrowserError::NoConfig(icon_id)),
        };

        let key_file = KeyFile::load(&conf_file)?;
        if let Some(id) = instance {
            modules.load_custom_widget(id, &key_file);
        }
        debug!("Browsing {}", conf_file.display());
        self.selection = Some(Selection {
            icon: icon_id,
            conf_file,
            instance,
            key_file,
        });
        Ok(())
    }

    /// Record an edit of the selected file.
    pub fn stage(&mut self, group: &str, key: &str, value: impl Into<Value>) -> Result<(), BrowserError> {
        if self.selection.is_none() {
            return Err(BrowserError::NothingSelected);
        }
        self.staged.push((group.to_string(), key.to_string(), value.into()));
        Ok(())
    }

    /// Write the staged edits and apply them. Applet instances are reloaded
    /// with their config re-read.
    pub fn apply(
        &mut self,
        scene: &mut Scene,
        renderers: &RendererRegistry,
        modules: &mut ModuleManager,
    ) -> Result<usize, BrowserError> {
        let selection = self.selection.as_mut().ok_or(BrowserError::NothingSelected)?;
        let edits = self.staged.len();
        for (group, key, value) in self.staged.drain(..) {
            selection.key_file.set_value(&group, &key, value);
        }
        if let Some(id) = selection.instance {
            modules.save_custom_widget(id, &mut selection.key_file);
        }
        selection.key_file.save(&selection.conf_file)?;

        match selection.instance {
            Some(id) => modules.reload_instance(scene, renderers, id, true)?,
            None => {
                scene.load_icon_buffers(selection.icon);
                scene.redraw_icon(selection.icon);
            }
        }
        info!("Applied {} edit(s) to {}", edits, selection.conf_file.display());
        Ok(edits)
    }

    /// Rebuild the tree and select the current icon again.
    pub fn refresh(&mut self, scene: &Scene, modules: &mut ModuleManager) -> Result<(), BrowserError> {
        if !self.open {
            return Ok(());
        }
        let current = self
            .selected
            .and_then(|row| self.rows.get(row))
            .map(|row| row.item.clone());
        self.rows = build_rows(scene);
        match current.and_then(|item| self.rows.iter().position(|row| row.item == item)) {
            Some(row) => self.select(scene, modules, row),
            None => {
                self.clear_selection();
                Ok(())
            }
        }
    }

    pub fn close(&mut self) {
        if self.open {
            info!("Closing the launcher browser");
        }
        self.open = false;
        self.rows.clear();
        self.clear_selection();
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.selection = None;
        self.staged.clear();
    }
}

/// Rows of every root dock, then of every desklet icon.
pub fn build_rows(scene: &Scene) -> Vec<BrowserRow> {
    let mut rows = Vec::new();
    let mut visited = HashSet::new();
    for dock in scene.root_docks() {
        rows.push(BrowserRow {
            depth: 0,
            label: dock.name.clone(),
            item: RowItem::Dock(dock.name.clone()),
        });
        add_dock_icons(scene, &dock.name, 1, &mut rows, &mut visited);
    }
    for desklet in scene.desklets() {
        let Some(icon) = desklet.icon.and_then(|id| scene.icon(id)) else {
            continue;
        };
        rows.push(BrowserRow {
            depth: 0,
            label: icon_label(icon),
            item: RowItem::Icon(icon.id),
        });
    }
    rows
}

fn add_dock_icons(
    scene: &Scene,
    dock: &str,
    depth: usize,
    rows: &mut Vec<BrowserRow>,
    visited: &mut HashSet<String>,
) {
    if !visited.insert(dock.to_string()) {
        return;
    }
    let Some(dock) = scene.dock(dock) else {
        return;
    };
    for icon in dock.icons.iter().filter_map(|id| scene.icon(*id)) {
        if icon.kind == IconKind::Other {
            continue;
        }
        rows.push(BrowserRow {
            depth,
            label: icon_label(icon),
            item: RowItem::Icon(icon.id),
        });
        if let Some(sub_dock) = &icon.sub_dock {
            add_dock_icons(scene, sub_dock, depth + 1, rows, visited);
        }
    }
}

fn icon_label(icon: &rg_dock_core::Icon) -> String {
    match (&icon.name, &icon.kind) {
        (Some(name), _) => name.clone(),
        (None, IconKind::Separator) => "separator".to_string(),
        (None, _) => icon.id.to_string(),
    }
}
