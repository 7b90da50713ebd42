//! Contains logic for reading the focused window from different environments.
//! [GenericForegroundProbe] is the main artifact of this module that abstracts
//! the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

/// Intended to serve as a contract windows and linux systems must implement.
#[cfg_attr(test, mockall::automock)]
pub trait ForegroundProbe: Send {
    /// Title of the currently focused window. For example 'Untitled-1 - Adobe Photoshop'. Empty
    /// when nothing has focus.
    fn foreground_title(&mut self) -> Result<String>;
}

/// Serves as a cross-compatible ForegroundProbe implementation.
pub struct GenericForegroundProbe {
    inner: Box<dyn ForegroundProbe>,
}

impl GenericForegroundProbe {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsForegroundProbe;
                Ok(Self {
                    inner: Box::new(WindowsForegroundProbe::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11ForegroundProbe;
                Ok(Self {
                    inner: Box::new(X11ForegroundProbe::new()?),
                })
            }
            else {
                // Lets the crate build and test on hosts without a window backend.
                Err(anyhow::anyhow!(
                    "No window backend was compiled in, enable the `win` or `x11` feature"
                ))
            }
        }
    }
}

impl ForegroundProbe for GenericForegroundProbe {
    fn foreground_title(&mut self) -> Result<String> {
        self.inner.foreground_title()
    }
}
