use anyhow::Result;
use tracing::error;
use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW};

use super::ForegroundProbe;

#[tracing::instrument]
pub fn get_foreground_title() -> Result<String> {
    let window = unsafe { GetForegroundWindow() };

    // Happens while focus is switching or on the secure desktop.
    if window.is_invalid() {
        return Ok(String::new());
    }

    let mut text: [u16; 4096] = [0; 4096];
    let len = unsafe { GetWindowTextW(window, &mut text) };
    Ok(String::from_utf16_lossy(&text[..len.max(0) as usize]))
}

pub struct WindowsForegroundProbe {}

impl WindowsForegroundProbe {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsForegroundProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ForegroundProbe for WindowsForegroundProbe {
    fn foreground_title(&mut self) -> Result<String> {
        get_foreground_title().inspect_err(|e| error!("Failed to get foreground window {e:?}"))
    }
}
