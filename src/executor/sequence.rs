use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::executor::actions::{CLOSE_TAB, Command, PASTE, SEND_MESSAGE};

/// An automation sequence as submitted by the frontend: `{ "steps": [...] }`.
///
/// A sequence has no identity of its own. It lives as the runner's current task
/// while it executes and is discarded as soon as the run ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    /// Steps executed strictly in order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Sequence {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// One step of a sequence: wait `delay`, then perform `action`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(default)]
    pub action: ActionKind,

    /// Pause before the action fires.
    #[serde(default)]
    pub delay: Delay,

    /// Only `click_coordinates` reads these.
    #[serde(default, deserialize_with = "default_on_null")]
    pub params: StepParams,
}

impl Step {
    pub fn new(action: impl Into<ActionKind>, delay: Delay) -> Self {
        Self {
            action: action.into(),
            delay,
            params: StepParams::default(),
        }
    }

    pub fn click(x: i32, y: i32, delay: Delay) -> Self {
        Self {
            action: ActionKind::ClickAt,
            delay,
            params: StepParams { x, y },
        }
    }
}

/// Kind-specific payload. Missing coordinates default to 0 and unknown fields are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParams {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

/// The closed set of actions the backend knows how to perform.
///
/// Anything else is kept verbatim as `Unknown` so a sequence containing it is still
/// accepted; the runner skips such steps with a warning when it reaches them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum ActionKind {
    /// Ctrl+V
    Paste,
    /// Enter
    SendMessage,
    /// Ctrl+W
    CloseTab,
    /// Left click at `params.x`, `params.y`
    ClickAt,
    Unknown(String),
}

impl ActionKind {
    /// Wire name of the action.
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Paste => "paste",
            ActionKind::SendMessage => "send_message",
            ActionKind::CloseTab => "close_tab",
            ActionKind::ClickAt => "click_coordinates",
            ActionKind::Unknown(name) => name,
        }
    }

    /// Map the action to an injector command, or `None` for unknown kinds.
    pub fn command(&self, params: &StepParams) -> Option<Command> {
        match self {
            ActionKind::Paste => Some(Command::Press(PASTE)),
            ActionKind::SendMessage => Some(Command::Press(SEND_MESSAGE)),
            ActionKind::CloseTab => Some(Command::Press(CLOSE_TAB)),
            ActionKind::ClickAt => Some(Command::Click {
                x: params.x,
                y: params.y,
            }),
            ActionKind::Unknown(_) => None,
        }
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        ActionKind::Unknown(String::new())
    }
}

impl From<String> for ActionKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "paste" => ActionKind::Paste,
            "send_message" => ActionKind::SendMessage,
            "close_tab" => ActionKind::CloseTab,
            "click_coordinates" => ActionKind::ClickAt,
            _ => ActionKind::Unknown(name),
        }
    }
}

impl From<&str> for ActionKind {
    fn from(name: &str) -> Self {
        ActionKind::from(name.to_owned())
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Unknown(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

/// Accepts any JSON value: `null` is the empty unknown kind, and other
/// non-string values are kept as their JSON text.
impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(name) => name.into(),
            Value::Null => ActionKind::default(),
            other => ActionKind::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pre-action delay, expressed on the wire as (fractional) seconds.
///
/// Missing, `null`, negative and non-finite values all collapse to zero, so a
/// `Delay` is never negative once deserialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Delay(Duration);

impl Delay {
    pub const ZERO: Delay = Delay(Duration::ZERO);

    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        Duration::try_from_secs_f64(secs)
            .map(Self)
            .unwrap_or(Self(Duration::MAX))
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(Duration::from_millis(ms))
    }

    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }
}

impl From<Duration> for Delay {
    fn from(duration: Duration) -> Self {
        Self(duration)
    }
}

impl Serialize for Delay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for Delay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.map(Delay::from_secs_f64).unwrap_or_default())
    }
}

/// Treat an explicit JSON `null` like a missing field.
pub(crate) fn default_on_null<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
