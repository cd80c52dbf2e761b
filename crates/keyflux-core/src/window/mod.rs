// Window context: what the focused window looks like at the moment a key
// is pressed, and the providers that can answer that question.

mod wayland;
mod x11;

pub use wayland::{HyprlandProvider, SwayProvider};
pub use x11::X11Provider;

use std::fmt;

/// Snapshot consumed by rule predicates. Window fields come from the
/// provider; device name and lock states are merged in by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub wm_class: String,
    pub wm_name: String,
    pub device_name: String,
    pub capslock_on: bool,
    pub numlock_on: bool,
}

/// Focused-window fields as reported by a provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub wm_class: String,
    pub wm_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("window system connection failed: {0}")]
    Connection(String),

    #[error("window query failed: {0}")]
    Query(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability to describe the currently focused window. Implementations
/// must be non-blocking or bounded; on failure the engine proceeds with an
/// empty context.
pub trait ContextProvider: Send {
    fn name(&self) -> &'static str;
    fn snapshot(&mut self) -> Result<WindowSnapshot, ContextError>;
}

/// Provider for environments whose focus channel this crate does not
/// speak. Always reports an empty window.
pub struct NullProvider {
    warned: bool,
}

impl NullProvider {
    pub fn new() -> Self {
        Self { warned: false }
    }
}

impl Default for NullProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for NullProvider {
    fn name(&self) -> &'static str {
        "null"
    }

    fn snapshot(&mut self) -> Result<WindowSnapshot, ContextError> {
        if !self.warned {
            self.warned = true;
            log::warn!("no window context provider for this environment; window-scoped rules will not match");
        }
        Ok(WindowSnapshot::default())
    }
}

/// Display server family the session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    X11,
    Wayland,
}

impl SessionType {
    /// Parse `$XDG_SESSION_TYPE`-style values.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "x11" => Some(SessionType::X11),
            "wayland" => Some(SessionType::Wayland),
            _ => None,
        }
    }

    pub fn detect() -> Option<Self> {
        std::env::var("XDG_SESSION_TYPE")
            .ok()
            .and_then(|v| Self::parse(&v))
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionType::X11 => write!(f, "x11"),
            SessionType::Wayland => write!(f, "wayland"),
        }
    }
}

/// Desktop environment, used to pick the Wayland focus channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopEnv {
    Hyprland,
    Sway,
    Wlroots,
    Kde,
    Cosmic,
    Gnome,
    Cinnamon,
    Other,
}

impl DesktopEnv {
    /// Parse a single desktop name as written in config.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "hyprland" => Some(DesktopEnv::Hyprland),
            "sway" => Some(DesktopEnv::Sway),
            "wlroots" => Some(DesktopEnv::Wlroots),
            "kde" | "plasma" => Some(DesktopEnv::Kde),
            "cosmic" => Some(DesktopEnv::Cosmic),
            "gnome" => Some(DesktopEnv::Gnome),
            "cinnamon" => Some(DesktopEnv::Cinnamon),
            _ => None,
        }
    }

    /// Detect from `$XDG_CURRENT_DESKTOP`, a colon-separated list.
    pub fn detect() -> Self {
        let Ok(value) = std::env::var("XDG_CURRENT_DESKTOP") else {
            return DesktopEnv::Other;
        };
        for part in value.split(':') {
            let part = part.trim().trim_start_matches("X-");
            if let Some(env) = Self::parse(part) {
                return env;
            }
        }
        DesktopEnv::Other
    }
}

/// Pick a provider for the session. Unknown combinations degrade to the
/// null provider; the engine is indifferent to which one runs.
pub fn select_provider(session: SessionType, desktop: DesktopEnv) -> Box<dyn ContextProvider> {
    match session {
        SessionType::X11 => Box::new(X11Provider::new()),
        SessionType::Wayland => match desktop {
            DesktopEnv::Hyprland => Box::new(HyprlandProvider::new()),
            DesktopEnv::Sway | DesktopEnv::Wlroots => Box::new(SwayProvider::new()),
            _ => Box::new(NullProvider::new()),
        },
    }
}
