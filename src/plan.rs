//! Plan & stage orchestration (spec §4.4): an ordered list of stages with
//! an output-stage marking and per-stage "done" callbacks, which may append
//! new stages to the plan at runtime.

use std::any::Any;
use std::collections::HashMap;

use crate::error::Result;

/// Exposed to stages while running; warnings go through `tracing`, mirroring
/// the `warn()` method the reference implementation exposes on its stage
/// execution environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct Environment;

impl Environment {
    pub fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// A single compilation step. All stages in this crate operate on
/// in-memory objects (no file-backed staleness checks survive the
/// transformation — see `SPEC_FULL.md` §4.4), so the default `should_run`
/// is unconditionally `true`; `force` and output-marking are what actually
/// select which stages run.
pub trait Stage: Any {
    fn label(&self) -> &'static str;

    fn should_run(&self) -> bool {
        true
    }

    fn run(&mut self, env: &Environment) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

type DoneCallback = Box<dyn FnMut(&mut Plan)>;

#[derive(Default)]
pub struct Plan {
    stages: Vec<Box<dyn Stage>>,
    is_output: Vec<bool>,
    callbacks: HashMap<usize, Vec<DoneCallback>>,
}

impl Plan {
    pub fn new() -> Self {
        Plan::default()
    }

    pub fn add_stage(&mut self, stage: Box<dyn Stage>) -> usize {
        self.stages.push(stage);
        self.is_output.push(false);
        self.stages.len() - 1
    }

    pub fn mark_as_output(&mut self, index: usize) {
        self.is_output[index] = true;
    }

    pub fn output_indices(&self) -> Vec<usize> {
        self.is_output
            .iter()
            .enumerate()
            .filter_map(|(i, &is_output)| is_output.then_some(i))
            .collect()
    }

    /// Registers a callback invoked once `stage` has run, in registration
    /// order. The callback receives the plan itself so it may append new
    /// stages (spec §4.4's "callback-driven plan extension").
    pub fn when_step_is_done(&mut self, stage: usize, callback: DoneCallback) {
        self.callbacks.entry(stage).or_default().push(callback);
    }

    pub fn stage(&self, index: usize) -> &dyn Stage {
        self.stages[index].as_ref()
    }

    pub fn stage_mut(&mut self, index: usize) -> &mut dyn Stage {
        self.stages[index].as_mut()
    }

    /// Walks the stage list in order, running each stage whose
    /// `should_run()` is true, or that is marked as output, or when
    /// `force` is set. The plan length is re-read after every step so a
    /// "done" callback may extend the plan dynamically.
    pub fn execute(&mut self, env: &Environment, force: bool) -> Result<()> {
        let mut step_index = 0;
        while step_index < self.stages.len() {
            let must_run =
                force || self.is_output[step_index] || self.stages[step_index].should_run();
            if must_run {
                self.stages[step_index].run(env)?;
                if let Some(mut callbacks) = self.callbacks.remove(&step_index) {
                    for mut callback in callbacks.drain(..) {
                        callback(self);
                    }
                }
            }
            step_index += 1;
        }
        Ok(())
    }
}
