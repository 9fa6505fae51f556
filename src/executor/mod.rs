#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Executor module for Keypilot.

This module wires together:
- `sequence`: the wire model of an automation run (steps, action kinds, delays)
- `actions`: the `InputInjector` capability and its Enigo / dry-run backends
- `runner`: `SequenceRunner`, which executes one sequence at a time in the background

Typical usage:
- Build an injector with `actions::build_injector`.
- Construct a `SequenceRunner` around it and share clones with request handlers.

Example:
```no_run
use std::time::Duration;
use keypilot::config::Config;
use keypilot::executor::{Delay, Sequence, SequenceRunner, Step, build_injector};

# async fn demo() -> anyhow::Result<()> {
let cfg = Config::default();
let injector = build_injector(true, &cfg.injector, cfg.dry_run_screen);
let runner = SequenceRunner::new(injector, Duration::from_secs(2));
runner.submit(Sequence::new(vec![Step::new("paste", Delay::from_millis(500))]))?;
# Ok(())
# }
```
*/

pub mod actions;
pub mod runner;
pub mod sequence;

// Re-exports for convenient access from `keypilot::executor::*`
pub use actions::{
    Command, DryRunInjector, EnigoInjector, InjectionError, InputInjector, Key, SharedInjector,
    build_injector,
};
pub use runner::{RunStatus, RunnerError, SequenceRunner};
pub use sequence::{ActionKind, Delay, Sequence, Step, StepParams};
