//! Presentation surface for authorization flows.
//!
//! The actual window/frame machinery belongs to the embedder; this module
//! only defines the boundary. A surface opens a visible popup or a hidden
//! frame on a URL and hands back a handle the completion detector can sample
//! for closure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use url::Url;

/// Popup geometry and chrome. The flow always uses the fixed default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupOptions {
    pub width: u32,
    pub height: u32,
    pub scrollbars: bool,
    pub resizable: bool,
}

impl Default for PopupOptions {
    fn default() -> Self {
        Self {
            width: 500,
            height: 600,
            scrollbars: true,
            resizable: true,
        }
    }
}

/// Handle to an open popup or frame.
pub trait SurfaceHandle: Send + Sync {
    /// Whether the surface has been closed (by the user or by `close`).
    fn is_closed(&self) -> bool;

    /// Closes the surface. Idempotent.
    fn close(&self);
}

/// Embedder-provided window/frame machinery.
pub trait AuthSurface: Send + Sync {
    /// Opens a centered popup window. `None` means the embedder blocked it.
    fn open_popup(&self, url: &Url, options: &PopupOptions) -> Option<Arc<dyn SurfaceHandle>>;

    /// Attaches a hidden frame loading `url`. Frames cannot be blocked.
    fn open_hidden_frame(&self, url: &Url) -> Arc<dyn SurfaceHandle>;
}

/// What the launcher opened for an attempt.
#[derive(Clone)]
pub enum AuthHandle {
    Popup(Arc<dyn SurfaceHandle>),
    Frame(Arc<dyn SurfaceHandle>),
}

impl AuthHandle {
    pub fn is_popup(&self) -> bool {
        matches!(self, AuthHandle::Popup(_))
    }

    /// The underlying surface handle, whichever kind was opened.
    pub fn surface(&self) -> &Arc<dyn SurfaceHandle> {
        match self {
            AuthHandle::Popup(h) | AuthHandle::Frame(h) => h,
        }
    }
}

impl std::fmt::Debug for AuthHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.is_popup() { "popup" } else { "frame" };
        f.debug_struct("AuthHandle")
            .field("kind", &kind)
            .field("closed", &self.surface().is_closed())
            .finish()
    }
}

/// Surface for the terminal console: prints the authorization URL for the
/// user to open in a browser. The returned handle never closes on its own,
/// so the console pairs this with the poll-based detector.
pub struct TerminalSurface;

struct TerminalHandle {
    closed: AtomicBool,
}

impl SurfaceHandle for TerminalHandle {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

impl AuthSurface for TerminalSurface {
    fn open_popup(&self, url: &Url, _options: &PopupOptions) -> Option<Arc<dyn SurfaceHandle>> {
        println!("Open this URL in a browser to authorize:\n  {}", url);
        Some(Arc::new(TerminalHandle {
            closed: AtomicBool::new(false),
        }))
    }

    fn open_hidden_frame(&self, url: &Url) -> Arc<dyn SurfaceHandle> {
        println!("Submitting credentials to:\n  {}", url);
        Arc::new(TerminalHandle {
            closed: AtomicBool::new(false),
        })
    }
}
