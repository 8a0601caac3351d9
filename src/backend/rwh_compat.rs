// raw-window-handle version bridge.
//
// `ash-window` 0.12 consumes `raw-window-handle` 0.5 handles, but `winit` 0.30
// (and the rest of this crate) produce 0.6 handles. The two are the same OS
// handles with different Rust wrappers (0.6 uses `NonZero`/`NonNull` and
// `Option` where 0.5 used raw integers and pointers), so this module re-encodes
// a 0.6 handle into the equivalent 0.5 handle at the ash-window call boundary.
//
// Only the platforms `ash-window` 0.12 itself understands are translated
// (Windows, Wayland, Xlib, Xcb, Android, AppKit, UiKit); any other handle maps
// to `GfxError::Unsupported`, which is exactly what ash-window would return for
// it anyway.

use std::os::raw::c_void;
use std::ptr;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use super::error::{GfxError, Result};

fn unsupported(what: &str) -> GfxError {
    GfxError::Unsupported(format!("windowing handle not supported by ash-window: {what}"))
}

/// Translate a 0.6 display handle into the 0.5 handle ash-window expects.
pub fn display_to_05(display: RawDisplayHandle) -> Result<rwh05::RawDisplayHandle> {
    Ok(match display {
        RawDisplayHandle::Windows(_) => {
            rwh05::RawDisplayHandle::Windows(rwh05::WindowsDisplayHandle::empty())
        }
        RawDisplayHandle::Wayland(h) => {
            let mut out = rwh05::WaylandDisplayHandle::empty();
            out.display = h.display.as_ptr();
            rwh05::RawDisplayHandle::Wayland(out)
        }
        RawDisplayHandle::Xlib(h) => {
            let mut out = rwh05::XlibDisplayHandle::empty();
            out.display = h.display.map_or(ptr::null_mut(), |p| p.as_ptr());
            out.screen = h.screen;
            rwh05::RawDisplayHandle::Xlib(out)
        }
        RawDisplayHandle::Xcb(h) => {
            let mut out = rwh05::XcbDisplayHandle::empty();
            out.connection = h.connection.map_or(ptr::null_mut(), |p| p.as_ptr());
            out.screen = h.screen;
            rwh05::RawDisplayHandle::Xcb(out)
        }
        RawDisplayHandle::Android(_) => {
            rwh05::RawDisplayHandle::Android(rwh05::AndroidDisplayHandle::empty())
        }
        RawDisplayHandle::AppKit(_) => {
            rwh05::RawDisplayHandle::AppKit(rwh05::AppKitDisplayHandle::empty())
        }
        RawDisplayHandle::UiKit(_) => {
            rwh05::RawDisplayHandle::UiKit(rwh05::UiKitDisplayHandle::empty())
        }
        other => return Err(unsupported(&format!("{other:?}"))),
    })
}

/// Translate a 0.6 window handle into the 0.5 handle ash-window expects.
pub fn window_to_05(window: RawWindowHandle) -> Result<rwh05::RawWindowHandle> {
    Ok(match window {
        RawWindowHandle::Win32(h) => {
            let mut out = rwh05::Win32WindowHandle::empty();
            out.hwnd = h.hwnd.get() as *mut c_void;
            out.hinstance = h.hinstance.map_or(ptr::null_mut(), |v| v.get() as *mut c_void);
            rwh05::RawWindowHandle::Win32(out)
        }
        RawWindowHandle::Wayland(h) => {
            let mut out = rwh05::WaylandWindowHandle::empty();
            out.surface = h.surface.as_ptr();
            rwh05::RawWindowHandle::Wayland(out)
        }
        RawWindowHandle::Xlib(h) => {
            let mut out = rwh05::XlibWindowHandle::empty();
            out.window = h.window;
            out.visual_id = h.visual_id;
            rwh05::RawWindowHandle::Xlib(out)
        }
        RawWindowHandle::Xcb(h) => {
            let mut out = rwh05::XcbWindowHandle::empty();
            out.window = h.window.get();
            out.visual_id = h.visual_id.map_or(0, |v| v.get());
            rwh05::RawWindowHandle::Xcb(out)
        }
        RawWindowHandle::AndroidNdk(h) => {
            let mut out = rwh05::AndroidNdkWindowHandle::empty();
            out.a_native_window = h.a_native_window.as_ptr();
            rwh05::RawWindowHandle::AndroidNdk(out)
        }
        RawWindowHandle::AppKit(h) => {
            let mut out = rwh05::AppKitWindowHandle::empty();
            out.ns_view = h.ns_view.as_ptr();
            rwh05::RawWindowHandle::AppKit(out)
        }
        RawWindowHandle::UiKit(h) => {
            let mut out = rwh05::UiKitWindowHandle::empty();
            out.ui_view = h.ui_view.as_ptr();
            out.ui_view_controller =
                h.ui_view_controller.map_or(ptr::null_mut(), |p| p.as_ptr());
            rwh05::RawWindowHandle::UiKit(out)
        }
        other => return Err(unsupported(&format!("{other:?}"))),
    })
}
