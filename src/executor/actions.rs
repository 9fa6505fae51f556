use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Button, Coordinate, Direction, Enigo, Key as EKey, Settings};
use std::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tokio::task;
use tracing::{debug, info, trace, warn};

use crate::config::models::{InjectorSettings, ScreenSize};

/// Keys the backend knows how to press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Control,
    Enter,
    Char(char),
}

pub const PASTE: &[Key] = &[Key::Control, Key::Char('v')];
pub const SEND_MESSAGE: &[Key] = &[Key::Enter];
pub const CLOSE_TAB: &[Key] = &[Key::Control, Key::Char('w')];

/// A single primitive effect on the OS input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Press the keys in order, then release them in reverse order.
    Press(&'static [Key]),
    /// Move the pointer to absolute screen coordinates and left-click.
    Click { x: i32, y: i32 },
}

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("failed to connect to the input backend: {0}")]
    Connect(String),

    #[error("input backend error: {0}")]
    Input(String),

    #[error("fail-safe triggered: pointer is in the top-left screen corner")]
    FailSafe,

    #[error("injector task failed: {0}")]
    Worker(String),
}

impl From<enigo::InputError> for InjectionError {
    fn from(err: enigo::InputError) -> Self {
        InjectionError::Input(err.to_string())
    }
}

/// Capability that performs OS-level input and reports pointer/screen geometry.
///
/// All calls are synchronous and may block on OS input delivery. Async callers
/// should go through [`blocking`].
pub trait InputInjector: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    fn press(&self, keys: &[Key]) -> Result<(), InjectionError>;

    fn click(&self, x: i32, y: i32) -> Result<(), InjectionError>;

    fn pointer_position(&self) -> Result<(i32, i32), InjectionError>;

    fn screen_size(&self) -> Result<(i32, i32), InjectionError>;

    fn perform(&self, command: Command) -> Result<(), InjectionError> {
        match command {
            Command::Press(keys) => self.press(keys),
            Command::Click { x, y } => self.click(x, y),
        }
    }
}

pub type SharedInjector = Arc<dyn InputInjector>;

/// Run a synchronous injector call on Tokio's blocking pool.
pub async fn blocking<T, F>(injector: &SharedInjector, f: F) -> Result<T, InjectionError>
where
    T: Send + 'static,
    F: FnOnce(&dyn InputInjector) -> Result<T, InjectionError> + Send + 'static,
{
    let injector = Arc::clone(injector);
    task::spawn_blocking(move || f(injector.as_ref()))
        .await
        .map_err(|err| InjectionError::Worker(err.to_string()))?
}

/// Build the injector selected by configuration.
pub fn build_injector(
    dry_run: bool,
    settings: &InjectorSettings,
    dry_run_screen: ScreenSize,
) -> SharedInjector {
    if dry_run {
        Arc::new(DryRunInjector::new(dry_run_screen))
    } else {
        Arc::new(EnigoInjector::new(settings))
    }
}

thread_local! {
    // Enigo connections are not shared across threads; each blocking-pool
    // thread opens its own on first use.
    static ENIGO: RefCell<Option<Enigo>> = const { RefCell::new(None) };
}

/// Injects real input through Enigo.
#[derive(Debug, Clone)]
pub struct EnigoInjector {
    failsafe: bool,
    pause: Duration,
}

impl EnigoInjector {
    pub fn new(settings: &InjectorSettings) -> Self {
        Self {
            failsafe: settings.failsafe,
            pause: Duration::from_millis(settings.pause_ms),
        }
    }

    fn with_enigo<T>(
        f: impl FnOnce(&mut Enigo) -> Result<T, InjectionError>,
    ) -> Result<T, InjectionError> {
        ENIGO.with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                trace!(target: "keypilot::inject", "Initializing Enigo");
                let enigo = Enigo::new(&Settings::default())
                    .map_err(|err| InjectionError::Connect(err.to_string()))?;
                *slot = Some(enigo);
            }
            match slot.as_mut() {
                Some(enigo) => f(enigo),
                None => Err(InjectionError::Connect("Enigo connection unavailable".into())),
            }
        })
    }

    fn check_failsafe(&self, enigo: &Enigo) -> Result<(), InjectionError> {
        if !self.failsafe {
            return Ok(());
        }
        if enigo.location()? == (0, 0) {
            warn!(target: "keypilot::inject", "Pointer in top-left corner; refusing to inject");
            return Err(InjectionError::FailSafe);
        }
        Ok(())
    }

    fn pause(&self) {
        if !self.pause.is_zero() {
            thread::sleep(self.pause);
        }
    }
}

impl InputInjector for EnigoInjector {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn press(&self, keys: &[Key]) -> Result<(), InjectionError> {
        Self::with_enigo(|enigo| {
            self.check_failsafe(enigo)?;
            trace!(target: "keypilot::inject", ?keys, "press");

            let mut held = Vec::with_capacity(keys.len());
            let mut outcome: Result<(), InjectionError> = Ok(());
            for key in keys {
                match enigo.key(map_key(*key), Direction::Press) {
                    Ok(()) => held.push(*key),
                    Err(err) => {
                        outcome = Err(err.into());
                        break;
                    }
                }
            }
            // Release whatever went down, even after a failed press.
            for key in held.iter().rev() {
                if let Err(err) = enigo.key(map_key(*key), Direction::Release) {
                    if outcome.is_ok() {
                        outcome = Err(err.into());
                    }
                }
            }
            outcome
        })?;
        self.pause();
        Ok(())
    }

    fn click(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        Self::with_enigo(|enigo| {
            self.check_failsafe(enigo)?;
            trace!(target: "keypilot::inject", x, y, "click");
            enigo.move_mouse(x, y, Coordinate::Abs)?;
            enigo.button(Button::Left, Direction::Click)?;
            Ok(())
        })?;
        self.pause();
        Ok(())
    }

    fn pointer_position(&self) -> Result<(i32, i32), InjectionError> {
        Self::with_enigo(|enigo| Ok(enigo.location()?))
    }

    fn screen_size(&self) -> Result<(i32, i32), InjectionError> {
        Self::with_enigo(|enigo| Ok(enigo.main_display()?))
    }
}

fn map_key(key: Key) -> EKey {
    match key {
        Key::Control => EKey::Control,
        Key::Enter => EKey::Return,
        Key::Char(c) => EKey::Unicode(c),
    }
}

/// Logs every call instead of simulating input.
///
/// Clicks move a virtual pointer so `pointer_position` stays meaningful, and the
/// screen size comes from configuration.
#[derive(Debug)]
pub struct DryRunInjector {
    pointer: Mutex<(i32, i32)>,
    screen: ScreenSize,
}

impl DryRunInjector {
    pub fn new(screen: ScreenSize) -> Self {
        Self {
            pointer: Mutex::new((screen.width / 2, screen.height / 2)),
            screen,
        }
    }
}

impl InputInjector for DryRunInjector {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn press(&self, keys: &[Key]) -> Result<(), InjectionError> {
        info!(target: "keypilot::inject", ?keys, "DRY-RUN press");
        Ok(())
    }

    fn click(&self, x: i32, y: i32) -> Result<(), InjectionError> {
        info!(target: "keypilot::inject", x, y, "DRY-RUN click");
        *self.pointer.lock().unwrap_or_else(PoisonError::into_inner) = (x, y);
        Ok(())
    }

    fn pointer_position(&self) -> Result<(i32, i32), InjectionError> {
        let position = *self.pointer.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(target: "keypilot::inject", ?position, "DRY-RUN pointer_position");
        Ok(position)
    }

    fn screen_size(&self) -> Result<(i32, i32), InjectionError> {
        Ok((self.screen.width, self.screen.height))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// What a [`RecordingInjector`] saw, in call order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Call {
        Press(&'static [Key]),
        Click(i32, i32),
    }

    /// Test double that records calls and can be told to fail specific ones.
    #[derive(Debug, Default)]
    pub struct RecordingInjector {
        calls: Mutex<Vec<Call>>,
        fail_on: Mutex<Vec<usize>>,
    }

    impl RecordingInjector {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Make the n-th (zero-based) press/click call fail after being recorded.
        pub fn fail_call(&self, index: usize) {
            self.fail_on.lock().unwrap().push(index);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) -> Result<(), InjectionError> {
            let mut calls = self.calls.lock().unwrap();
            let index = calls.len();
            calls.push(call);
            if self.fail_on.lock().unwrap().contains(&index) {
                return Err(InjectionError::Input(format!("injected failure #{index}")));
            }
            Ok(())
        }
    }

    impl InputInjector for RecordingInjector {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn press(&self, keys: &[Key]) -> Result<(), InjectionError> {
            let keys = [PASTE, SEND_MESSAGE, CLOSE_TAB]
                .into_iter()
                .find(|known| *known == keys)
                .ok_or_else(|| InjectionError::Input(format!("unexpected chord {keys:?}")))?;
            self.record(Call::Press(keys))
        }

        fn click(&self, x: i32, y: i32) -> Result<(), InjectionError> {
            self.record(Call::Click(x, y))
        }

        fn pointer_position(&self) -> Result<(i32, i32), InjectionError> {
            Ok((640, 360))
        }

        fn screen_size(&self) -> Result<(i32, i32), InjectionError> {
            Ok((1280, 720))
        }
    }
}
