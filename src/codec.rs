//! Binary encoder/decoder for the wire-format bytecode (spec §4.1, §6.1).

use std::io::{Cursor, Read};

use crate::ast::{opcode, LoopBlock, Statement, StatementSequence};
use crate::color::RGBColor;
use crate::error::{Error, Result};
use crate::literal::{ChannelMask, ChannelValues, Duration, UnsignedByte};
use crate::varuint::{decode_varuint, encode_varuint};

pub fn encode_sequence(statements: &[Statement]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for statement in statements {
        encode_statement(statement, &mut out)?;
    }
    Ok(out)
}

fn encode_statement(statement: &Statement, out: &mut Vec<u8>) -> Result<()> {
    match statement {
        Statement::End => out.push(opcode::END),
        Statement::Nop => out.push(opcode::NOP),
        Statement::Sleep { duration } => {
            out.push(opcode::SLEEP);
            encode_duration(duration, out)?;
        }
        Statement::WaitUntil { timestamp } => {
            out.push(opcode::WAIT_UNTIL);
            encode_duration(timestamp, out)?;
        }
        Statement::SetColor { color, duration } => {
            out.push(opcode::SET_COLOR);
            encode_color(color, out);
            encode_duration(duration, out)?;
        }
        Statement::SetGray { value, duration } => {
            out.push(opcode::SET_GRAY);
            out.push(value.0);
            encode_duration(duration, out)?;
        }
        Statement::SetBlack { duration } => {
            out.push(opcode::SET_BLACK);
            encode_duration(duration, out)?;
        }
        Statement::SetWhite { duration } => {
            out.push(opcode::SET_WHITE);
            encode_duration(duration, out)?;
        }
        Statement::FadeToColor { color, duration } => {
            out.push(opcode::FADE_TO_COLOR);
            encode_color(color, out);
            encode_duration(duration, out)?;
        }
        Statement::FadeToGray { value, duration } => {
            out.push(opcode::FADE_TO_GRAY);
            out.push(value.0);
            encode_duration(duration, out)?;
        }
        Statement::FadeToBlack { duration } => {
            out.push(opcode::FADE_TO_BLACK);
            encode_duration(duration, out)?;
        }
        Statement::FadeToWhite { duration } => {
            out.push(opcode::FADE_TO_WHITE);
            encode_duration(duration, out)?;
        }
        Statement::ResetTimer => out.push(opcode::RESET_TIMER),
        Statement::SetColorFromChannels {
            rch,
            gch,
            bch,
            duration,
        } => {
            out.push(opcode::SET_COLOR_FROM_CHANNELS);
            out.push(rch.0);
            out.push(gch.0);
            out.push(bch.0);
            encode_duration(duration, out)?;
        }
        Statement::FadeToColorFromChannels {
            rch,
            gch,
            bch,
            duration,
        } => {
            out.push(opcode::FADE_TO_COLOR_FROM_CHANNELS);
            out.push(rch.0);
            out.push(gch.0);
            out.push(bch.0);
            encode_duration(duration, out)?;
        }
        Statement::Jump { address } => {
            out.push(opcode::JUMP);
            out.extend(encode_varuint(*address)?);
        }
        Statement::TriggeredJump => {
            return Err(Error::FeatureNotImplemented(
                "triggered jump (opcode 0x13) has no defined field layout",
            ))
        }
        Statement::SetPyro { mask } => {
            out.push(opcode::SET_PYRO);
            out.push(mask.to_byte());
        }
        Statement::SetPyroAll { values } => {
            out.push(opcode::SET_PYRO_ALL);
            out.push(values.to_byte());
        }
        Statement::UnresolvedJump { .. } => return Err(Error::MarkerNotResolvable),
        Statement::Comment(_) => {}
        Statement::Loop(block) => encode_loop(block, out)?,
    }
    Ok(())
}

fn encode_duration(duration: &Duration, out: &mut Vec<u8>) -> Result<()> {
    out.extend(encode_varuint(duration.frames())?);
    Ok(())
}

fn encode_color(color: &RGBColor, out: &mut Vec<u8>) {
    out.push(color.red);
    out.push(color.green);
    out.push(color.blue);
}

fn encode_loop(block: &LoopBlock, out: &mut Vec<u8>) -> Result<()> {
    if block.iterations == 0 || block.body.is_empty() {
        return Ok(());
    }
    if block.iterations == 1 {
        for statement in &block.body {
            encode_statement(statement, out)?;
        }
        return Ok(());
    }
    out.push(opcode::LOOP_BEGIN);
    out.push(block.iterations);
    for statement in &block.body {
        encode_statement(statement, out)?;
    }
    out.push(opcode::LOOP_END);
    Ok(())
}

pub fn decode_sequence(bytes: &[u8]) -> Result<StatementSequence> {
    let mut cursor = Cursor::new(bytes);
    decode_statements(&mut cursor, false)
}

fn decode_statements(cursor: &mut Cursor<&[u8]>, in_loop: bool) -> Result<StatementSequence> {
    let mut out = Vec::new();
    loop {
        let mut op_byte = [0u8; 1];
        let n = cursor
            .read(&mut op_byte)
            .map_err(|_| Error::BytecodeParserEof {
                node: "StatementSequence",
            })?;
        if n == 0 {
            if in_loop {
                return Err(Error::BytecodeParserEof { node: "LoopBlock" });
            }
            return Ok(out);
        }

        let op = op_byte[0];
        if op == opcode::LOOP_END {
            if in_loop {
                return Ok(out);
            }
            return Err(Error::BytecodeParser {
                node: "StatementSequence",
                message: "unexpected LOOP_END outside a loop body".into(),
            });
        }

        out.push(decode_statement(op, cursor)?);
    }
}

fn decode_byte(cursor: &mut Cursor<&[u8]>, node: &'static str) -> Result<u8> {
    let mut byte = [0u8; 1];
    let n = cursor
        .read(&mut byte)
        .map_err(|_| Error::BytecodeParserEof { node })?;
    if n == 0 {
        return Err(Error::BytecodeParserEof { node });
    }
    Ok(byte[0])
}

fn decode_duration(cursor: &mut Cursor<&[u8]>, node: &'static str) -> Result<Duration> {
    let frames = decode_varuint(cursor, node)?;
    Duration::from_frames(frames)
}

fn decode_color(cursor: &mut Cursor<&[u8]>, node: &'static str) -> Result<RGBColor> {
    let r = decode_byte(cursor, node)?;
    let g = decode_byte(cursor, node)?;
    let b = decode_byte(cursor, node)?;
    Ok(RGBColor::cached(r, g, b))
}

fn decode_statement(op: u8, cursor: &mut Cursor<&[u8]>) -> Result<Statement> {
    Ok(match op {
        opcode::END => Statement::End,
        opcode::NOP => Statement::Nop,
        opcode::SLEEP => Statement::Sleep {
            duration: decode_duration(cursor, "SleepCommand")?,
        },
        opcode::WAIT_UNTIL => Statement::WaitUntil {
            timestamp: decode_duration(cursor, "WaitUntilCommand")?,
        },
        opcode::SET_COLOR => {
            let color = decode_color(cursor, "SetColorCommand")?;
            let duration = decode_duration(cursor, "SetColorCommand")?;
            Statement::SetColor { color, duration }
        }
        opcode::SET_GRAY => {
            let value = UnsignedByte(decode_byte(cursor, "SetGrayCommand")?);
            let duration = decode_duration(cursor, "SetGrayCommand")?;
            Statement::SetGray { value, duration }
        }
        opcode::SET_BLACK => Statement::SetBlack {
            duration: decode_duration(cursor, "SetBlackCommand")?,
        },
        opcode::SET_WHITE => Statement::SetWhite {
            duration: decode_duration(cursor, "SetWhiteCommand")?,
        },
        opcode::FADE_TO_COLOR => {
            let color = decode_color(cursor, "FadeToColorCommand")?;
            let duration = decode_duration(cursor, "FadeToColorCommand")?;
            Statement::FadeToColor { color, duration }
        }
        opcode::FADE_TO_GRAY => {
            let value = UnsignedByte(decode_byte(cursor, "FadeToGrayCommand")?);
            let duration = decode_duration(cursor, "FadeToGrayCommand")?;
            Statement::FadeToGray { value, duration }
        }
        opcode::FADE_TO_BLACK => Statement::FadeToBlack {
            duration: decode_duration(cursor, "FadeToBlackCommand")?,
        },
        opcode::FADE_TO_WHITE => Statement::FadeToWhite {
            duration: decode_duration(cursor, "FadeToWhiteCommand")?,
        },
        opcode::LOOP_BEGIN => {
            let iterations = decode_byte(cursor, "LoopBlock")?;
            let body = decode_statements(cursor, true)?;
            Statement::Loop(LoopBlock { iterations, body })
        }
        opcode::RESET_TIMER => Statement::ResetTimer,
        opcode::SET_COLOR_FROM_CHANNELS => {
            let rch = UnsignedByte(decode_byte(cursor, "SetColorFromChannelsCommand")?);
            let gch = UnsignedByte(decode_byte(cursor, "SetColorFromChannelsCommand")?);
            let bch = UnsignedByte(decode_byte(cursor, "SetColorFromChannelsCommand")?);
            let duration = decode_duration(cursor, "SetColorFromChannelsCommand")?;
            Statement::SetColorFromChannels {
                rch,
                gch,
                bch,
                duration,
            }
        }
        opcode::FADE_TO_COLOR_FROM_CHANNELS => {
            let rch = UnsignedByte(decode_byte(cursor, "FadeToColorFromChannelsCommand")?);
            let gch = UnsignedByte(decode_byte(cursor, "FadeToColorFromChannelsCommand")?);
            let bch = UnsignedByte(decode_byte(cursor, "FadeToColorFromChannelsCommand")?);
            let duration = decode_duration(cursor, "FadeToColorFromChannelsCommand")?;
            Statement::FadeToColorFromChannels {
                rch,
                gch,
                bch,
                duration,
            }
        }
        opcode::JUMP => Statement::Jump {
            address: decode_varuint(cursor, "JumpCommand")?,
        },
        opcode::TRIGGERED_JUMP => {
            return Err(Error::FeatureNotImplemented(
                "triggered jump (opcode 0x13) has no defined field layout",
            ))
        }
        opcode::SET_PYRO => Statement::SetPyro {
            mask: ChannelMask::from_byte(decode_byte(cursor, "SetPyroCommand")?),
        },
        opcode::SET_PYRO_ALL => Statement::SetPyroAll {
            values: ChannelValues::from_byte(decode_byte(cursor, "SetPyroAllCommand")?),
        },
        other => {
            return Err(Error::BytecodeParser {
                node: "Statement",
                message: format!("unknown opcode 0x{other:02X}"),
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_encodes_to_single_zero_byte() {
        let bytes = encode_sequence(&[Statement::End]).unwrap();
        assert_eq!(bytes, vec![0x00]);
    }

    #[test]
    fn nop_then_sleep_matches_literal_scenario() {
        let statements = vec![
            Statement::Nop,
            Statement::Sleep {
                duration: Duration::from_frames(25).unwrap(),
            },
        ];
        let bytes = encode_sequence(&statements).unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0x19]);
    }

    #[test]
    fn round_trips_through_decode() {
        let statements = vec![
            Statement::SetColor {
                color: RGBColor::cached(10, 20, 30),
                duration: Duration::from_frames(100).unwrap(),
            },
            Statement::Loop(LoopBlock {
                iterations: 3,
                body: vec![Statement::Nop, Statement::ResetTimer],
            }),
            Statement::End,
        ];
        let bytes = encode_sequence(&statements).unwrap();
        let decoded = decode_sequence(&bytes).unwrap();
        assert_eq!(decoded, statements);
    }

    #[test]
    fn loop_with_one_iteration_emits_bare_body() {
        let block = LoopBlock {
            iterations: 1,
            body: vec![Statement::Nop],
        };
        let bytes = encode_sequence(&[Statement::Loop(block)]).unwrap();
        assert_eq!(bytes, vec![0x01]);
    }

    #[test]
    fn loop_with_zero_iterations_emits_nothing() {
        let block = LoopBlock {
            iterations: 0,
            body: vec![Statement::Nop],
        };
        let bytes = encode_sequence(&[Statement::Loop(block)]).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn unresolved_jump_is_rejected_at_encode() {
        let err = encode_sequence(&[Statement::UnresolvedJump {
            label: "foo".into(),
        }])
        .unwrap_err();
        assert!(matches!(err, Error::MarkerNotResolvable));
    }

    #[test]
    fn unknown_opcode_names_the_offending_byte() {
        let err = decode_sequence(&[0xFF]).unwrap_err();
        match err {
            Error::BytecodeParser { message, .. } => assert!(message.contains("0xFF")),
            _ => panic!("expected a BytecodeParser error"),
        }
    }

    #[test]
    fn truncated_varuint_field_is_an_eof_error() {
        let err = decode_sequence(&[opcode::SLEEP]).unwrap_err();
        assert!(matches!(err, Error::BytecodeParserEof { .. }));
    }

    #[test]
    fn comment_emits_no_bytes() {
        let bytes = encode_sequence(&[Statement::Comment("hi".into())]).unwrap();
        assert!(bytes.is_empty());
    }
}
