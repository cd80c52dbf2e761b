// X11 focus provider: _NET_ACTIVE_WINDOW on the root window, then
// WM_CLASS / _NET_WM_NAME on the active window.

use x11rb::connection::Connection;
use x11rb::properties::WmClass;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt, Window};
use x11rb::rust_connection::RustConnection;

use super::{ContextError, ContextProvider, WindowSnapshot};

struct X11Link {
    conn: RustConnection,
    root: Window,
    net_active_window: Atom,
    net_wm_name: Atom,
    utf8_string: Atom,
}

/// Connects lazily on first snapshot and reconnects after failures.
pub struct X11Provider {
    link: Option<X11Link>,
}

impl X11Provider {
    pub fn new() -> Self {
        Self { link: None }
    }

    fn connect() -> Result<X11Link, ContextError> {
        let (conn, screen_num) =
            x11rb::connect(None).map_err(|e| ContextError::Connection(e.to_string()))?;
        let root = conn.setup().roots[screen_num].root;
        let net_active_window = intern(&conn, "_NET_ACTIVE_WINDOW")?;
        let net_wm_name = intern(&conn, "_NET_WM_NAME")?;
        let utf8_string = intern(&conn, "UTF8_STRING")?;
        Ok(X11Link {
            conn,
            root,
            net_active_window,
            net_wm_name,
            utf8_string,
        })
    }

    fn query(link: &X11Link) -> Result<WindowSnapshot, ContextError> {
        let reply = link
            .conn
            .get_property(
                false,
                link.root,
                link.net_active_window,
                AtomEnum::WINDOW,
                0,
                1,
            )
            .map_err(|e| ContextError::Query(e.to_string()))?
            .reply()
            .map_err(|e| ContextError::Query(e.to_string()))?;

        let Some(window) = reply.value32().and_then(|mut v| v.next()) else {
            return Ok(WindowSnapshot::default());
        };
        if window == 0 {
            return Ok(WindowSnapshot::default());
        }

        let wm_class = WmClass::get(&link.conn, window)
            .map_err(|e| ContextError::Query(e.to_string()))?
            .reply()
            .ok()
            .flatten()
            .map(|c| String::from_utf8_lossy(c.class()).into_owned())
            .unwrap_or_default();

        let name_reply = link
            .conn
            .get_property(false, window, link.net_wm_name, link.utf8_string, 0, 1024)
            .map_err(|e| ContextError::Query(e.to_string()))?
            .reply()
            .map_err(|e| ContextError::Query(e.to_string()))?;
        let wm_name = String::from_utf8_lossy(&name_reply.value).into_owned();

        Ok(WindowSnapshot { wm_class, wm_name })
    }
}

impl Default for X11Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for X11Provider {
    fn name(&self) -> &'static str {
        "x11"
    }

    fn snapshot(&mut self) -> Result<WindowSnapshot, ContextError> {
        if self.link.is_none() {
            self.link = Some(Self::connect()?);
        }
        let link = self.link.as_ref().expect("connected above");
        match Self::query(link) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                // Drop the connection so the next snapshot reconnects.
                self.link = None;
                Err(e)
            }
        }
    }
}

fn intern(conn: &RustConnection, name: &str) -> Result<Atom, ContextError> {
    Ok(conn
        .intern_atom(false, name.as_bytes())
        .map_err(|e| ContextError::Connection(e.to_string()))?
        .reply()
        .map_err(|e| ContextError::Connection(e.to_string()))?
        .atom)
}
