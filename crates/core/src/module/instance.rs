//! Module instances.

use rg_dock_types::MinimalAppletConfig;
use std::path::PathBuf;

use super::applet::{Applet, BoxedApplet};
use crate::container::{ContainerRef, DeskletId};
use crate::icon::IconId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an instance lives. Plug-ins live nowhere.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    None,
    Dock(String),
    Desklet(DeskletId),
}

impl Placement {
    pub fn container(&self) -> Option<ContainerRef> {
        match self {
            Self::None => None,
            Self::Dock(name) => Some(ContainerRef::Dock(name.clone())),
            Self::Desklet(id) => Some(ContainerRef::Desklet(*id)),
        }
    }

    pub fn dock_name(&self) -> Option<&str> {
        match self {
            Self::Dock(name) => Some(name),
            _ => None,
        }
    }

    pub fn desklet(&self) -> Option<DeskletId> {
        match self {
            Self::Desklet(id) => Some(*id),
            _ => None,
        }
    }
}

pub struct ModuleInstance {
    pub id: InstanceId,
    pub module_name: String,
    /// `None` for configless modules.
    pub conf_file: Option<PathBuf>,
    pub icon: Option<IconId>,
    pub placement: Placement,
    /// Drawing context on the icon buffer; `None` leaves the instance unable
    /// to draw.
    pub draw_context: Option<cairo::Context>,
    pub(crate) minimal_config: Option<MinimalAppletConfig>,
    /// Taken out while one of its hooks runs.
    pub(crate) applet: Option<BoxedApplet>,
}

impl ModuleInstance {
    pub(crate) fn new(id: InstanceId, module_name: &str, conf_file: Option<PathBuf>, applet: BoxedApplet) -> Self {
        Self {
            id,
            module_name: module_name.to_string(),
            conf_file,
            icon: None,
            placement: Placement::None,
            draw_context: None,
            minimal_config: None,
            applet: Some(applet),
        }
    }

    pub fn container(&self) -> Option<ContainerRef> {
        self.placement.container()
    }

    pub fn applet(&self) -> Option<&dyn Applet> {
        self.applet.as_deref()
    }

    pub fn minimal_config(&self) -> Option<&MinimalAppletConfig> {
        self.minimal_config.as_ref()
    }

    /// Number of the instance's config file: 0 for the base file, N for
    /// `<base>-N`.
    pub fn file_number(&self, base: &std::path::Path) -> Option<usize> {
        conf_file_number(base, self.conf_file.as_deref()?)
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("id", &self.id)
            .field("module_name", &self.module_name)
            .field("conf_file", &self.conf_file)
            .field("icon", &self.icon)
            .field("placement", &self.placement)
            .finish()
    }
}

/// Path of the `number`-th config file of a module.
pub fn numbered_conf_file(base: &std::path::Path, number: usize) -> PathBuf {
    if number == 0 {
        return base.to_path_buf();
    }
    let mut name = base.as_os_str().to_os_string();
    name.push(format!("-{number}"));
    PathBuf::from(name)
}

/// Inverse of [`numbered_conf_file`].
pub fn conf_file_number(base: &std::path::Path, path: &std::path::Path) -> Option<usize> {
    if path == base {
        return Some(0);
    }
    let base = base.to_str()?;
    let suffix = path.to_str()?.strip_prefix(base)?.strip_prefix('-')?;
    suffix.parse().ok().filter(|n| *n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_conf_file_numbering() {
        let base = Path::new("/theme/plug-ins/clock/clock.conf");
        assert_eq!(numbered_conf_file(base, 0), base);
        assert_eq!(
            numbered_conf_file(base, 3),
            Path::new("/theme/plug-ins/clock/clock.conf-3")
        );
        assert_eq!(conf_file_number(base, base), Some(0));
        assert_eq!(conf_file_number(base, &numbered_conf_file(base, 12)), Some(12));
        assert_eq!(conf_file_number(base, Path::new("/other.conf-1")), None);
        assert_eq!(conf_file_number(base, Path::new("/theme/plug-ins/clock/clock.conf-x")), None);
    }
}
