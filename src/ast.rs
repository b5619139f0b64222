//! The AST node model: literal commands, loop blocks and statement
//! sequences, plus the opcode table that is the single source of truth for
//! the binary codec.

use crate::color::RGBColor;
use crate::literal::{ChannelMask, ChannelValues, Duration, UnsignedByte};

/// Single-byte opcodes. The wire format and the decoder both key off this
/// table; nothing else should hardcode an opcode value.
pub mod opcode {
    pub const END: u8 = 0x00;
    pub const NOP: u8 = 0x01;
    pub const SLEEP: u8 = 0x02;
    pub const WAIT_UNTIL: u8 = 0x03;
    pub const SET_COLOR: u8 = 0x04;
    pub const SET_GRAY: u8 = 0x05;
    pub const SET_BLACK: u8 = 0x06;
    pub const SET_WHITE: u8 = 0x07;
    pub const FADE_TO_COLOR: u8 = 0x08;
    pub const FADE_TO_GRAY: u8 = 0x09;
    pub const FADE_TO_BLACK: u8 = 0x0A;
    pub const FADE_TO_WHITE: u8 = 0x0B;
    pub const LOOP_BEGIN: u8 = 0x0C;
    pub const LOOP_END: u8 = 0x0D;
    pub const RESET_TIMER: u8 = 0x0E;
    pub const SET_COLOR_FROM_CHANNELS: u8 = 0x10;
    pub const FADE_TO_COLOR_FROM_CHANNELS: u8 = 0x11;
    pub const JUMP: u8 = 0x12;
    pub const TRIGGERED_JUMP: u8 = 0x13;
    pub const SET_PYRO: u8 = 0x14;
    pub const SET_PYRO_ALL: u8 = 0x15;
}

/// A single statement in the program. Semantic equivalence (spec §3.2(d))
/// is plain `PartialEq`: every field is a value type, so structural
/// equality is exactly the equivalence relation the optimiser needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    End,
    Nop,
    Sleep { duration: Duration },
    WaitUntil { timestamp: Duration },
    SetColor { color: RGBColor, duration: Duration },
    SetGray { value: UnsignedByte, duration: Duration },
    SetBlack { duration: Duration },
    SetWhite { duration: Duration },
    FadeToColor { color: RGBColor, duration: Duration },
    FadeToGray { value: UnsignedByte, duration: Duration },
    FadeToBlack { duration: Duration },
    FadeToWhite { duration: Duration },
    ResetTimer,
    SetColorFromChannels {
        rch: UnsignedByte,
        gch: UnsignedByte,
        bch: UnsignedByte,
        duration: Duration,
    },
    FadeToColorFromChannels {
        rch: UnsignedByte,
        gch: UnsignedByte,
        bch: UnsignedByte,
        duration: Duration,
    },
    Jump { address: u32 },
    /// Reserved opcode (0x13); the original never defines its field layout.
    /// Preserved as a marker so the decoder can at least name it in errors
    /// rather than silently misinterpreting the byte stream.
    TriggeredJump,
    SetPyro { mask: ChannelMask },
    SetPyroAll { values: ChannelValues },
    /// A forward-reference marker (label or jump target) that has not been
    /// resolved to a byte address. No opcode exists for this on the wire;
    /// encoders must reject it with `MarkerNotResolvable`.
    UnresolvedJump { label: String },
    Loop(LoopBlock),
    /// Zero-length in binary; emits a delimited banner in the textual form.
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopBlock {
    pub iterations: u8,
    pub body: Vec<Statement>,
}

pub type StatementSequence = Vec<Statement>;

impl Statement {
    /// The exact number of bytes `Codec::encode` would emit for this node,
    /// without performing the encoding. Must stay in lock-step with
    /// `Codec::encode_statement`.
    pub fn length_in_bytes(&self) -> usize {
        match self {
            Statement::End | Statement::Nop | Statement::ResetTimer | Statement::TriggeredJump => {
                1
            }
            Statement::Sleep { duration } => 1 + varuint_len(duration.frames()),
            Statement::WaitUntil { timestamp } => 1 + varuint_len(timestamp.frames()),
            Statement::SetColor { duration, .. } | Statement::FadeToColor { duration, .. } => {
                1 + 3 + varuint_len(duration.frames())
            }
            Statement::SetGray { duration, .. } | Statement::FadeToGray { duration, .. } => {
                1 + 1 + varuint_len(duration.frames())
            }
            Statement::SetBlack { duration }
            | Statement::SetWhite { duration }
            | Statement::FadeToBlack { duration }
            | Statement::FadeToWhite { duration } => 1 + varuint_len(duration.frames()),
            Statement::SetColorFromChannels { duration, .. }
            | Statement::FadeToColorFromChannels { duration, .. } => {
                1 + 3 + varuint_len(duration.frames())
            }
            Statement::Jump { address } => 1 + varuint_len(*address),
            Statement::SetPyro { .. } => 1 + 1,
            Statement::SetPyroAll { .. } => 1 + 1,
            Statement::UnresolvedJump { .. } => 0,
            Statement::Comment(_) => 0,
            Statement::Loop(block) => block.length_in_bytes(),
        }
    }
}

impl LoopBlock {
    /// Mirrors the wire-format collapse rule: `iterations >= 2` wraps the
    /// body in `LOOP_BEGIN .. LOOP_END`; `iterations == 1` emits the bare
    /// body; `iterations == 0` (or an empty body) emits nothing.
    pub fn length_in_bytes(&self) -> usize {
        if self.iterations == 0 || self.body.is_empty() {
            return 0;
        }
        let body_len: usize = self.body.iter().map(Statement::length_in_bytes).sum();
        if self.iterations == 1 {
            body_len
        } else {
            // LOOP_BEGIN + iterations byte + body + LOOP_END
            1 + 1 + body_len + 1
        }
    }
}

pub fn sequence_length_in_bytes(statements: &[Statement]) -> usize {
    statements.iter().map(Statement::length_in_bytes).sum()
}

fn varuint_len(mut value: u32) -> usize {
    let mut len = 1;
    value >>= 7;
    while value != 0 {
        len += 1;
        value >>= 7;
    }
    len
}
