// Wayland focus providers that speak the compositors' own IPC sockets.
// Hyprland answers `activewindow` as JSON; sway answers GET_TREE over the
// i3-ipc framing. Both are one-shot request/reply exchanges per snapshot.

use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::Duration;

use super::{ContextError, ContextProvider, WindowSnapshot};

const IPC_TIMEOUT: Duration = Duration::from_millis(250);

/// Hyprland IPC provider.
pub struct HyprlandProvider {
    socket: Option<PathBuf>,
}

impl HyprlandProvider {
    pub fn new() -> Self {
        Self {
            socket: Self::socket_path(),
        }
    }

    fn socket_path() -> Option<PathBuf> {
        let runtime = std::env::var("XDG_RUNTIME_DIR").ok()?;
        let signature = std::env::var("HYPRLAND_INSTANCE_SIGNATURE").ok()?;
        Some(
            PathBuf::from(runtime)
                .join("hypr")
                .join(signature)
                .join(".socket.sock"),
        )
    }
}

impl Default for HyprlandProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for HyprlandProvider {
    fn name(&self) -> &'static str {
        "hyprland"
    }

    fn snapshot(&mut self) -> Result<WindowSnapshot, ContextError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContextError::Connection("hyprland socket not found".to_string()))?;

        let mut stream = UnixStream::connect(socket)?;
        stream.set_read_timeout(Some(IPC_TIMEOUT))?;
        stream.set_write_timeout(Some(IPC_TIMEOUT))?;
        stream.write_all(b"j/activewindow")?;

        let mut reply = String::new();
        stream.read_to_string(&mut reply)?;

        let value: serde_json::Value = serde_json::from_str(&reply)
            .map_err(|e| ContextError::Query(format!("bad activewindow reply: {e}")))?;

        Ok(WindowSnapshot {
            wm_class: json_str(&value, "class"),
            wm_name: json_str(&value, "title"),
        })
    }
}

/// sway (and other i3-ipc wlroots compositors) provider.
pub struct SwayProvider {
    socket: Option<PathBuf>,
}

const I3_MAGIC: &[u8; 6] = b"i3-ipc";
const I3_GET_TREE: u32 = 4;

impl SwayProvider {
    pub fn new() -> Self {
        Self {
            socket: std::env::var("SWAYSOCK")
                .or_else(|_| std::env::var("I3SOCK"))
                .ok()
                .map(PathBuf::from),
        }
    }

    fn request_tree(socket: &PathBuf) -> Result<serde_json::Value, ContextError> {
        let mut stream = UnixStream::connect(socket)?;
        stream.set_read_timeout(Some(IPC_TIMEOUT))?;
        stream.set_write_timeout(Some(IPC_TIMEOUT))?;

        let mut request = Vec::with_capacity(14);
        request.extend_from_slice(I3_MAGIC);
        request.extend_from_slice(&0u32.to_ne_bytes());
        request.extend_from_slice(&I3_GET_TREE.to_ne_bytes());
        stream.write_all(&request)?;

        let mut header = [0u8; 14];
        stream.read_exact(&mut header)?;
        if &header[0..6] != I3_MAGIC {
            return Err(ContextError::Query("bad i3-ipc magic in reply".to_string()));
        }
        let len = u32::from_ne_bytes([header[6], header[7], header[8], header[9]]) as usize;

        let mut payload = vec![0u8; len];
        stream.read_exact(&mut payload)?;
        serde_json::from_slice(&payload)
            .map_err(|e| ContextError::Query(format!("bad GET_TREE reply: {e}")))
    }

    /// Depth-first search for the focused container.
    fn find_focused(node: &serde_json::Value) -> Option<&serde_json::Value> {
        if node.get("focused").and_then(|v| v.as_bool()) == Some(true) {
            return Some(node);
        }
        for list in ["nodes", "floating_nodes"] {
            if let Some(children) = node.get(list).and_then(|v| v.as_array()) {
                for child in children {
                    if let Some(found) = Self::find_focused(child) {
                        return Some(found);
                    }
                }
            }
        }
        None
    }
}

impl Default for SwayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for SwayProvider {
    fn name(&self) -> &'static str {
        "sway"
    }

    fn snapshot(&mut self) -> Result<WindowSnapshot, ContextError> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContextError::Connection("SWAYSOCK not set".to_string()))?;

        let tree = Self::request_tree(socket)?;
        let Some(focused) = Self::find_focused(&tree) else {
            return Ok(WindowSnapshot::default());
        };

        // Native Wayland windows carry app_id; XWayland ones carry
        // window_properties.class.
        let wm_class = match json_str(focused, "app_id") {
            s if !s.is_empty() => s,
            _ => focused
                .get("window_properties")
                .map(|p| json_str(p, "class"))
                .unwrap_or_default(),
        };

        Ok(WindowSnapshot {
            wm_class,
            wm_name: json_str(focused, "name"),
        })
    }
}

fn json_str(value: &serde_json::Value, field: &str) -> String {
    value
        .get(field)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
