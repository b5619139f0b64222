//! Reference interpreter (spec §4.3): evaluates an AST on a virtual LED
//! strip, yielding a lazy sequence of `(timestamp, color, is_fade)` states;
//! `unroll` rasterises fades into per-frame events; `Player` answers
//! random-access color queries.

use std::collections::VecDeque;

use crate::ast::Statement;
use crate::color::RGBColor;
use crate::error::{Error, Result};
use crate::literal::FPS;

/// One observable change emitted by the executor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutorState {
    pub timestamp: f64,
    pub color: RGBColor,
    pub is_fade: bool,
}

enum Frame {
    Sequence {
        body: Vec<Statement>,
        index: usize,
    },
    Loop {
        body: Vec<Statement>,
        index: usize,
        passes_done: u32,
        /// `None` means repeat indefinitely (only reachable from a
        /// constructed AST with `iterations == 0`; decoded bytecode never
        /// produces this, since a zero-iteration loop encodes to nothing).
        target: Option<u32>,
    },
}

/// Walks a program one statement at a time, maintaining
/// `{timestamp, color, is_fade}`. Implements `Iterator` so that an
/// indefinitely-repeating loop block does not need to be materialised.
pub struct Executor {
    frames: Vec<Frame>,
    timestamp: f64,
    color: RGBColor,
    is_fade: bool,
    terminated: bool,
    pending: VecDeque<ExecutorState>,
}

impl Executor {
    pub fn new(program: Vec<Statement>) -> Self {
        Executor {
            frames: vec![Frame::Sequence {
                body: program,
                index: 0,
            }],
            timestamp: 0.0,
            color: RGBColor::BLACK,
            is_fade: false,
            terminated: false,
            pending: VecDeque::new(),
        }
    }

    fn advance_clock(&mut self, frames: u32) {
        self.timestamp += frames as f64 / FPS as f64;
    }

    fn emit(&mut self) {
        self.pending.push_back(ExecutorState {
            timestamp: self.timestamp,
            color: self.color,
            is_fade: self.is_fade,
        });
    }

    fn do_set(&mut self, color: RGBColor, frames: u32) {
        self.color = color;
        self.is_fade = false;
        self.emit();
        self.advance_clock(frames);
    }

    fn do_fade(&mut self, color: RGBColor, frames: u32) {
        if !self.is_fade {
            // Fade-start marker: the current (pre-fade) state.
            self.emit();
        }
        self.is_fade = true;
        self.advance_clock(frames);
        self.color = color;
        self.emit();
    }

    fn execute(&mut self, statement: &Statement) -> Result<()> {
        match statement {
            Statement::End => self.terminated = true,
            Statement::Nop => {}
            Statement::Sleep { duration } => {
                self.is_fade = false;
                self.emit();
                self.advance_clock(duration.frames());
            }
            Statement::WaitUntil { timestamp } => {
                let target = timestamp.frames() as f64 / FPS as f64;
                if target > self.timestamp {
                    self.timestamp = target;
                }
                self.is_fade = false;
                self.emit();
            }
            Statement::SetColor { color, duration } => self.do_set(*color, duration.frames()),
            Statement::SetGray { value, duration } => {
                self.do_set(RGBColor::gray(value.0), duration.frames())
            }
            Statement::SetBlack { duration } => self.do_set(RGBColor::BLACK, duration.frames()),
            Statement::SetWhite { duration } => self.do_set(RGBColor::WHITE, duration.frames()),
            Statement::FadeToColor { color, duration } => self.do_fade(*color, duration.frames()),
            Statement::FadeToGray { value, duration } => {
                self.do_fade(RGBColor::gray(value.0), duration.frames())
            }
            Statement::FadeToBlack { duration } => self.do_fade(RGBColor::BLACK, duration.frames()),
            Statement::FadeToWhite { duration } => self.do_fade(RGBColor::WHITE, duration.frames()),
            Statement::ResetTimer => self.timestamp = 0.0,
            Statement::SetPyro { .. } | Statement::SetPyroAll { .. } => {}
            Statement::Loop(block) => {
                if !block.body.is_empty() {
                    self.frames.push(Frame::Loop {
                        body: block.body.clone(),
                        index: 0,
                        passes_done: 0,
                        target: if block.iterations == 0 {
                            None
                        } else {
                            Some(block.iterations as u32)
                        },
                    });
                }
            }
            Statement::Comment(_) => {}
            // Channel-resolved colors need an analog channel backend (the
            // pyro-master-channel synthesis this crate does not implement,
            // per its scope); jumps address flattened bytecode offsets,
            // which have no meaning over a tree-shaped AST.
            Statement::SetColorFromChannels { .. }
            | Statement::FadeToColorFromChannels { .. } => {
                return Err(Error::FeatureNotImplemented(
                    "interpreting channel-resolved color commands requires a channel synthesis backend",
                ))
            }
            Statement::Jump { .. } | Statement::TriggeredJump => {
                return Err(Error::FeatureNotImplemented(
                    "jump targets address flattened bytecode offsets, not AST nodes",
                ))
            }
            Statement::UnresolvedJump { .. } => return Err(Error::MarkerNotResolvable),
        }
        Ok(())
    }

    /// Executes exactly one AST statement, returning `false` once the
    /// frame stack is empty (falls off the end with no explicit `end`).
    fn step(&mut self) -> Result<bool> {
        let statement = loop {
            let top = match self.frames.last_mut() {
                Some(top) => top,
                None => return Ok(false),
            };
            match top {
                Frame::Sequence { body, index } => {
                    if *index >= body.len() {
                        self.frames.pop();
                        continue;
                    }
                    let statement = body[*index].clone();
                    *index += 1;
                    break statement;
                }
                Frame::Loop {
                    body,
                    index,
                    passes_done,
                    target,
                } => {
                    if *index >= body.len() {
                        *passes_done += 1;
                        if let Some(n) = *target {
                            if *passes_done >= n {
                                self.frames.pop();
                                continue;
                            }
                        }
                        *index = 0;
                        continue;
                    }
                    let statement = body[*index].clone();
                    *index += 1;
                    break statement;
                }
            }
        };
        self.execute(&statement)?;
        Ok(true)
    }
}

impl Iterator for Executor {
    type Item = Result<ExecutorState>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(state) = self.pending.pop_front() {
            return Some(Ok(state));
        }
        if self.terminated {
            return None;
        }
        loop {
            match self.step() {
                Ok(true) => {
                    if let Some(state) = self.pending.pop_front() {
                        return Some(Ok(state));
                    }
                    if self.terminated {
                        return None;
                    }
                }
                Ok(false) => return None,
                Err(e) => {
                    self.terminated = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Collapses a run of states sharing the same timestamp to the last one.
pub fn remove_duplicates(events: &[ExecutorState]) -> Vec<ExecutorState> {
    let mut out: Vec<ExecutorState> = Vec::with_capacity(events.len());
    for &event in events {
        match out.last_mut() {
            Some(last) if last.timestamp == event.timestamp => *last = event,
            _ => out.push(event),
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnrolledFrame {
    pub timestamp: f64,
    pub color: RGBColor,
}

/// Rasterises fade segments into one synthetic state per whole-frame tick
/// at the given sampling `fps`; constant-color segments are left as a
/// single event. Consecutive same-timestamp states are deduplicated first,
/// keeping the latest.
pub fn unroll(events: &[ExecutorState], fps: u32) -> Vec<UnrolledFrame> {
    let deduped = remove_duplicates(events);
    let mut out = Vec::new();

    let Some(first) = deduped.first() else {
        return out;
    };
    out.push(UnrolledFrame {
        timestamp: first.timestamp,
        color: first.color,
    });

    for pair in deduped.windows(2) {
        let (prev, cur) = (pair[0], pair[1]);
        if cur.is_fade {
            let start_frame = (prev.timestamp * fps as f64).round() as i64;
            let end_frame = (cur.timestamp * fps as f64).round() as i64;
            let span = (cur.timestamp - prev.timestamp).max(f64::EPSILON);
            for frame in (start_frame + 1)..=end_frame {
                let t = frame as f64 / fps as f64;
                let ratio = ((t - prev.timestamp) / span).clamp(0.0, 1.0);
                out.push(UnrolledFrame {
                    timestamp: t,
                    color: prev.color.mix_with(&cur.color, ratio),
                });
            }
        } else {
            out.push(UnrolledFrame {
                timestamp: cur.timestamp,
                color: cur.color,
            });
        }
    }

    remove_duplicate_frames(out)
}

fn remove_duplicate_frames(frames: Vec<UnrolledFrame>) -> Vec<UnrolledFrame> {
    let mut out: Vec<UnrolledFrame> = Vec::with_capacity(frames.len());
    for frame in frames {
        match out.last_mut() {
            Some(last) if last.timestamp == frame.timestamp => *last = frame,
            _ => out.push(frame),
        }
    }
    out
}

/// Random-access query surface over an executor run. Caches emitted states
/// in a deque; rewinds (restarting the executor from scratch) on a
/// backward seek, and fast-forwards on a forward seek. Requires the
/// underlying executor's timestamps to be monotone non-decreasing.
pub struct Player {
    program: Vec<Statement>,
    executor: Executor,
    events: VecDeque<ExecutorState>,
    last_event_time: f64,
    ended: bool,
}

impl Player {
    pub fn new(program: Vec<Statement>) -> Self {
        Player {
            executor: Executor::new(program.clone()),
            program,
            events: VecDeque::new(),
            last_event_time: f64::NEG_INFINITY,
            ended: false,
        }
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    fn rewind(&mut self) {
        self.executor = Executor::new(self.program.clone());
        self.events.clear();
        self.last_event_time = f64::NEG_INFINITY;
        self.ended = false;
    }

    /// Returns the color of the virtual strip at `timestamp` seconds.
    pub fn get_color_at(&mut self, timestamp: f64) -> Result<RGBColor> {
        if let Some(front) = self.events.front() {
            if timestamp < front.timestamp {
                self.rewind();
            }
        }

        while self.last_event_time < timestamp && !self.ended {
            match self.executor.next() {
                Some(Ok(state)) => {
                    self.last_event_time = state.timestamp;
                    self.events.push_back(state);
                }
                Some(Err(e)) => return Err(e),
                None => self.ended = true,
            }
        }

        let mut bracket_start = None;
        let mut bracket_end = None;
        for state in &self.events {
            if state.timestamp <= timestamp {
                bracket_start = Some(*state);
            } else {
                bracket_end = Some(*state);
                break;
            }
        }

        match (bracket_start, bracket_end) {
            (Some(start), Some(end)) if end.is_fade => {
                let span = (end.timestamp - start.timestamp).max(f64::EPSILON);
                let ratio = ((timestamp - start.timestamp) / span).clamp(0.0, 1.0);
                Ok(start.color.mix_with(&end.color, ratio))
            }
            (Some(start), _) => Ok(start.color),
            (None, _) => Ok(RGBColor::BLACK),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Duration;

    fn collect(program: Vec<Statement>) -> Vec<ExecutorState> {
        Executor::new(program)
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn sleep_emits_one_state_then_advances_clock() {
        let program = vec![
            Statement::Nop,
            Statement::Sleep {
                duration: Duration::from_frames(25).unwrap(),
            },
        ];
        let states = collect(program);
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].timestamp, 0.0);
        assert!(!states[0].is_fade);
    }

    #[test]
    fn fade_emits_start_marker_and_end_state() {
        let program = vec![Statement::FadeToWhite {
            duration: Duration::from_frames(50).unwrap(),
        }];
        let states = collect(program);
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].color, RGBColor::BLACK);
        assert!(!states[0].is_fade);
        assert_eq!(states[1].color, RGBColor::WHITE);
        assert!(states[1].is_fade);
        assert_eq!(states[1].timestamp, 1.0);
    }

    #[test]
    fn loop_with_zero_iterations_repeats_forever() {
        let program = vec![Statement::Loop(crate::ast::LoopBlock {
            iterations: 0,
            body: vec![Statement::Sleep {
                duration: Duration::from_frames(1).unwrap(),
            }],
        })];
        let mut executor = Executor::new(program);
        for _ in 0..10 {
            assert!(executor.next().unwrap().is_ok());
        }
    }

    #[test]
    fn loop_with_n_iterations_runs_exactly_n_times() {
        let program = vec![Statement::Loop(crate::ast::LoopBlock {
            iterations: 3,
            body: vec![Statement::Sleep {
                duration: Duration::from_frames(1).unwrap(),
            }],
        })];
        let states = collect(program);
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn end_terminates_the_sequence() {
        let program = vec![
            Statement::End,
            Statement::Sleep {
                duration: Duration::from_frames(1).unwrap(),
            },
        ];
        let states = collect(program);
        assert!(states.is_empty());
    }

    #[test]
    fn unroll_rasterises_a_fade_to_whole_frames() {
        let program = vec![Statement::FadeToWhite {
            duration: Duration::from_frames(2).unwrap(),
        }];
        let states = collect(program);
        let frames = unroll(&states, 50);
        // t=0 (start), t=1/50, t=2/50 (end)
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].color, RGBColor::BLACK);
        assert_eq!(frames.last().unwrap().color, RGBColor::WHITE);
    }

    #[test]
    fn player_reports_scenario_two_black_at_quarter_second() {
        let program = vec![
            Statement::Nop,
            Statement::Sleep {
                duration: Duration::from_frames(25).unwrap(),
            },
        ];
        let mut player = Player::new(program);
        let color = player.get_color_at(0.25).unwrap();
        assert_eq!(color, RGBColor::BLACK);
    }

    #[test]
    fn player_interpolates_mid_fade() {
        let program = vec![Statement::FadeToWhite {
            duration: Duration::from_frames(50).unwrap(),
        }];
        let mut player = Player::new(program);
        let color = player.get_color_at(0.5).unwrap();
        assert_eq!(color, RGBColor::cached(128, 128, 128));
    }

    #[test]
    fn player_rewinds_on_backward_seek() {
        let program = vec![
            Statement::SetWhite {
                duration: Duration::from_frames(10).unwrap(),
            },
            Statement::SetBlack {
                duration: Duration::from_frames(10).unwrap(),
            },
        ];
        let mut player = Player::new(program);
        assert_eq!(player.get_color_at(0.3).unwrap(), RGBColor::BLACK);
        assert_eq!(player.get_color_at(0.0).unwrap(), RGBColor::WHITE);
    }
}
