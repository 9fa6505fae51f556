use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for Keypilot.
///
/// Deserialized from an optional JSON file; every field has a default, so `{}`
/// (or no file at all) yields a working local setup on `127.0.0.1:5000`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server binds to.
    pub bind: String,

    /// How long `/automation/stop` waits for the running sequence to exit, in milliseconds.
    pub stop_grace_ms: u64,

    /// Log actions instead of simulating real input.
    pub dry_run: bool,

    /// Behaviour of the real (Enigo) input injector.
    pub injector: InjectorSettings,

    /// Screen size reported while in dry-run mode.
    pub dry_run_screen: ScreenSize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            stop_grace_ms: 2000,
            dry_run: false,
            injector: InjectorSettings::default(),
            dry_run_screen: ScreenSize::default(),
        }
    }
}

impl Config {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }
}

/// Settings for the Enigo-backed injector.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(default)]
pub struct InjectorSettings {
    /// Refuse to inject while the pointer sits in the top-left screen corner.
    /// Moving the mouse there is the operator's emergency brake.
    pub failsafe: bool,

    /// Pause after every injected key press or click, in milliseconds.
    pub pause_ms: u64,
}

impl Default for InjectorSettings {
    fn default() -> Self {
        Self {
            failsafe: true,
            pause_ms: 500,
        }
    }
}

/// Screen dimensions in pixels.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}
