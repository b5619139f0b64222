//! Composable AST-to-AST optimiser passes (spec §4.2): ColorCommandShortener,
//! CommandMerger, LoopDetector, driven to a fixed point by a composite
//! optimiser. Optimisation level 0 disables everything, 1 enables the first
//! two passes, 2 adds loop detection.

use crate::ast::{LoopBlock, Statement};
use crate::error::Result;
use crate::literal::{Duration, UnsignedByte};

pub trait Optimiser {
    /// Attempts to optimise the sequence in place. Returns whether anything
    /// changed.
    fn optimise(&self, sequence: &mut Vec<Statement>) -> Result<bool>;
}

pub struct NullOptimiser;

impl Optimiser for NullOptimiser {
    fn optimise(&self, _sequence: &mut Vec<Statement>) -> Result<bool> {
        Ok(false)
    }
}

pub struct CompositeOptimiser {
    passes: Vec<Box<dyn Optimiser>>,
}

impl CompositeOptimiser {
    pub fn new() -> Self {
        CompositeOptimiser { passes: Vec::new() }
    }

    pub fn add_pass(&mut self, pass: Box<dyn Optimiser>) {
        self.passes.push(pass);
    }
}

impl Default for CompositeOptimiser {
    fn default() -> Self {
        Self::new()
    }
}

impl Optimiser for CompositeOptimiser {
    fn optimise(&self, sequence: &mut Vec<Statement>) -> Result<bool> {
        let mut modified_at_least_once = false;
        let mut any_modified = true;
        while any_modified {
            any_modified = false;
            for pass in &self.passes {
                any_modified = pass.optimise(sequence)? || any_modified;
            }
            modified_at_least_once = modified_at_least_once || any_modified;
        }
        Ok(modified_at_least_once)
    }
}

/// Builds the optimiser for the given level: 0 = no-op, 1 = shortening +
/// merging, 2 = level 1 plus loop detection.
pub fn create_optimiser_for_level(level: u8) -> Box<dyn Optimiser> {
    if level == 0 {
        return Box::new(NullOptimiser);
    }
    let mut composite = CompositeOptimiser::new();
    if level >= 1 {
        composite.add_pass(Box::new(CommandMerger));
        composite.add_pass(Box::new(ColorCommandShortener));
    }
    if level >= 2 {
        composite.add_pass(Box::new(LoopDetector));
    }
    Box::new(composite)
}

/// Rewrites `set_color`/`set_gray`/`fade_to_color`/`fade_to_gray` commands
/// whose color is black, white or gray to the shorter dedicated opcode.
pub struct ColorCommandShortener;

impl Optimiser for ColorCommandShortener {
    fn optimise(&self, sequence: &mut Vec<Statement>) -> Result<bool> {
        Ok(shorten_sequence(sequence))
    }
}

fn shorten_sequence(sequence: &mut Vec<Statement>) -> bool {
    let mut changed = false;
    for statement in sequence.iter_mut() {
        if let Statement::Loop(block) = statement {
            changed |= shorten_sequence(&mut block.body);
        }
        if let Some(replacement) = shorten_statement(statement) {
            *statement = replacement;
            changed = true;
        }
    }
    changed
}

fn shorten_statement(statement: &Statement) -> Option<Statement> {
    match statement {
        Statement::SetColor { color, duration } => {
            if color.is_white() {
                Some(Statement::SetWhite { duration: *duration })
            } else if color.is_black() {
                Some(Statement::SetBlack { duration: *duration })
            } else if color.is_gray() {
                Some(Statement::SetGray {
                    value: UnsignedByte(color.red),
                    duration: *duration,
                })
            } else {
                None
            }
        }
        Statement::SetGray { value, duration } => match value.0 {
            255 => Some(Statement::SetWhite { duration: *duration }),
            0 => Some(Statement::SetBlack { duration: *duration }),
            _ => None,
        },
        Statement::FadeToColor { color, duration } => {
            if color.is_white() {
                Some(Statement::FadeToWhite { duration: *duration })
            } else if color.is_black() {
                Some(Statement::FadeToBlack { duration: *duration })
            } else if color.is_gray() {
                Some(Statement::FadeToGray {
                    value: UnsignedByte(color.red),
                    duration: *duration,
                })
            } else {
                None
            }
        }
        Statement::FadeToGray { value, duration } => match value.0 {
            255 => Some(Statement::FadeToWhite { duration: *duration }),
            0 => Some(Statement::FadeToBlack { duration: *duration }),
            _ => None,
        },
        _ => None,
    }
}

/// Collapses runs of same-color `set_color`/`fade_to_color`/`sleep`
/// commands within a `StatementSequence` into a single command, preserving
/// total duration exactly.
pub struct CommandMerger;

impl Optimiser for CommandMerger {
    fn optimise(&self, sequence: &mut Vec<Statement>) -> Result<bool> {
        merge_sequence(sequence)
    }
}

fn merge_sequence(sequence: &mut Vec<Statement>) -> Result<bool> {
    let mut changed = false;
    for statement in sequence.iter_mut() {
        if let Statement::Loop(block) = statement {
            changed |= merge_sequence(&mut block.body)?;
        }
    }

    let mut index = 0;
    while index < sequence.len() {
        let replacement = match &sequence[index] {
            Statement::SetColor { color, .. } => merge_set_color_run(sequence, index, *color)?,
            Statement::FadeToColor { color, .. } => {
                merge_fade_to_color_run(sequence, index, *color)?
            }
            Statement::Sleep { .. } => merge_sleep_run(sequence, index)?,
            _ => None,
        };
        match replacement {
            Some((run_length, replacement_statements)) => {
                let inserted = replacement_statements.len();
                sequence.splice(index..index + run_length, replacement_statements);
                index += inserted;
                changed = true;
            }
            None => index += 1,
        }
    }

    Ok(changed)
}

fn merge_set_color_run(
    sequence: &[Statement],
    index: usize,
    color: crate::color::RGBColor,
) -> Result<Option<(usize, Vec<Statement>)>> {
    let mut total_frames: u32 = 0;
    let mut run_length = 0;
    for statement in &sequence[index..] {
        match statement {
            Statement::SetColor { color: c, duration } if *c == color => {
                total_frames += duration.frames();
            }
            Statement::FadeToColor { color: c, duration } if *c == color => {
                total_frames += duration.frames();
            }
            Statement::Sleep { duration } => {
                total_frames += duration.frames();
            }
            _ => break,
        }
        run_length += 1;
    }

    if run_length > 1 {
        let merged = Statement::SetColor {
            color,
            duration: Duration::from_frames(total_frames)?,
        };
        Ok(Some((run_length, vec![merged])))
    } else {
        Ok(None)
    }
}

fn merge_fade_to_color_run(
    sequence: &[Statement],
    index: usize,
    color: crate::color::RGBColor,
) -> Result<Option<(usize, Vec<Statement>)>> {
    let mut total_frames: u32 = 0;
    let mut run_length = 1;
    for statement in &sequence[index + 1..] {
        match statement {
            Statement::SetColor { color: c, duration } if *c == color => {
                total_frames += duration.frames();
            }
            Statement::FadeToColor { color: c, duration } if *c == color => {
                total_frames += duration.frames();
            }
            Statement::Sleep { duration } => {
                total_frames += duration.frames();
            }
            _ => break,
        }
        run_length += 1;
    }

    if run_length > 1 {
        let original = sequence[index].clone();
        let replacement = vec![
            original,
            Statement::Sleep {
                duration: Duration::from_frames(total_frames)?,
            },
        ];
        if replacement == sequence[index..index + run_length] {
            return Ok(None);
        }
        Ok(Some((run_length, replacement)))
    } else {
        Ok(None)
    }
}

fn merge_sleep_run(
    sequence: &[Statement],
    index: usize,
) -> Result<Option<(usize, Vec<Statement>)>> {
    let mut total_frames: u32 = 0;
    let mut run_length = 0;
    for statement in &sequence[index..] {
        match statement {
            Statement::Sleep { duration } => total_frames += duration.frames(),
            _ => break,
        }
        run_length += 1;
    }

    if run_length > 1 {
        let merged = Statement::Sleep {
            duration: Duration::from_frames(total_frames)?,
        };
        Ok(Some((run_length, vec![merged])))
    } else {
        Ok(None)
    }
}

/// Detects repeating blocks of statements (body length 1..=8) within a
/// `StatementSequence` and replaces the longest run with a `LoopBlock`,
/// preferring the candidate with the smallest encoded byte length.
pub struct LoopDetector;

const MAX_LOOP_BODY_LEN: usize = 8;

impl Optimiser for LoopDetector {
    fn optimise(&self, sequence: &mut Vec<Statement>) -> Result<bool> {
        Ok(detect_loops(sequence))
    }
}

fn detect_loops(sequence: &mut Vec<Statement>) -> bool {
    let mut changed = false;
    for statement in sequence.iter_mut() {
        if let Statement::Loop(block) = statement {
            changed |= detect_loops(&mut block.body);
        }
    }

    let mut index = 0;
    while index < sequence.len() {
        let max_end = (index + MAX_LOOP_BODY_LEN).min(sequence.len());
        let mut candidates: Vec<(usize, u8, usize)> = Vec::new();

        for end in (index + 1)..max_end {
            if sequence[index] == sequence[end] {
                let body_length = end - index;
                let iterations = identify_loop_iteration_count(sequence, index, body_length);
                if iterations > 1 {
                    let block_end = index + iterations as usize * body_length;
                    let block = LoopBlock {
                        iterations,
                        body: sequence[index..end].to_vec(),
                    };
                    let flat_len: usize = sequence[index..block_end]
                        .iter()
                        .map(Statement::length_in_bytes)
                        .sum();
                    if block.length_in_bytes() <= flat_len {
                        candidates.push((end, iterations, block.length_in_bytes()));
                    }
                }
            }
        }

        if let Some(&(end, iterations, _)) = candidates
            .iter()
            .min_by_key(|&&(_, _, encoded_len)| encoded_len)
        {
            let body_length = end - index;
            let block_end = index + iterations as usize * body_length;
            let body = sequence[index..end].to_vec();
            sequence.splice(index..block_end, [Statement::Loop(LoopBlock { iterations, body })]);
            changed = true;
            index += 1;
        } else {
            index += 1;
        }
    }

    changed
}

fn identify_loop_iteration_count(
    statements: &[Statement],
    start_index: usize,
    body_length: usize,
) -> u8 {
    let num_statements = statements.len();
    let mut first = start_index;
    let mut second = start_index + body_length;
    while second < num_statements && statements[first] == statements[second] {
        first += 1;
        second += 1;
    }
    (((second - start_index) / body_length).min(255)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::RGBColor;

    fn white_set_color(frames: u32) -> Statement {
        Statement::SetColor {
            color: RGBColor::WHITE,
            duration: Duration::from_frames(frames).unwrap(),
        }
    }

    #[test]
    fn color_command_shortener_rewrites_white() {
        let mut seq = vec![Statement::SetColor {
            color: RGBColor::cached(255, 255, 255),
            duration: Duration::from_frames(0).unwrap(),
        }];
        let changed = ColorCommandShortener.optimise(&mut seq).unwrap();
        assert!(changed);
        assert_eq!(
            seq,
            vec![Statement::SetWhite {
                duration: Duration::from_frames(0).unwrap()
            }]
        );
    }

    #[test]
    fn command_merger_collapses_identical_set_color_runs() {
        let mut seq = vec![white_set_color(5), white_set_color(5), white_set_color(5)];
        let changed = CommandMerger.optimise(&mut seq).unwrap();
        assert!(changed);
        assert_eq!(seq, vec![white_set_color(15)]);
    }

    #[test]
    fn command_merger_collapses_sleep_runs() {
        let mut seq = vec![
            Statement::Sleep {
                duration: Duration::from_frames(3).unwrap(),
            },
            Statement::Sleep {
                duration: Duration::from_frames(4).unwrap(),
            },
        ];
        CommandMerger.optimise(&mut seq).unwrap();
        assert_eq!(
            seq,
            vec![Statement::Sleep {
                duration: Duration::from_frames(7).unwrap()
            }]
        );
    }

    #[test]
    fn loop_detector_finds_alternating_pattern() {
        let a = Statement::SetColor {
            color: RGBColor::cached(1, 2, 3),
            duration: Duration::from_frames(1).unwrap(),
        };
        let b = Statement::SetColor {
            color: RGBColor::cached(4, 5, 6),
            duration: Duration::from_frames(1).unwrap(),
        };
        let mut seq = vec![
            a.clone(),
            b.clone(),
            a.clone(),
            b.clone(),
            a.clone(),
            b.clone(),
        ];
        let changed = LoopDetector.optimise(&mut seq).unwrap();
        assert!(changed);
        assert_eq!(seq.len(), 1);
        match &seq[0] {
            Statement::Loop(block) => {
                assert_eq!(block.iterations, 3);
                assert_eq!(block.body, vec![a, b]);
            }
            _ => panic!("expected a loop block"),
        }
    }

    #[test]
    fn composite_optimiser_runs_to_fixed_point() {
        let optimiser = create_optimiser_for_level(2);
        let mut seq = vec![
            Statement::SetColor {
                color: RGBColor::cached(0, 0, 0),
                duration: Duration::from_frames(1).unwrap(),
            },
            Statement::SetColor {
                color: RGBColor::cached(0, 0, 0),
                duration: Duration::from_frames(1).unwrap(),
            },
        ];
        optimiser.optimise(&mut seq).unwrap();
        assert_eq!(
            seq,
            vec![Statement::SetBlack {
                duration: Duration::from_frames(2).unwrap()
            }]
        );
    }

    #[test]
    fn level_zero_is_a_no_op() {
        let optimiser = create_optimiser_for_level(0);
        let mut seq = vec![Statement::SetColor {
            color: RGBColor::cached(255, 255, 255),
            duration: Duration::from_frames(0).unwrap(),
        }];
        let original = seq.clone();
        let changed = optimiser.optimise(&mut seq).unwrap();
        assert!(!changed);
        assert_eq!(seq, original);
    }
}
