//! Compiler, optimiser and reference interpreter for the `ledctrl` bytecode:
//! a small DSL that drives a three-channel RGB LED strip plus seven binary
//! "pyro" channels.
//!
//! The pipeline, leaves first: [`literal`] and [`ast`] define the typed IR;
//! [`codec`] is the binary wire format; [`text`] is the canonical textual
//! source form; [`optimiser`] shrinks the AST; [`interpreter`] evaluates it
//! against a virtual strip; [`plan`] orchestrates multi-stage compilations;
//! [`compiler`] is the format-autodetecting facade over all of the above.

pub mod ast;
pub mod codec;
pub mod color;
pub mod compiler;
pub mod error;
pub mod formats;
pub mod interpreter;
pub mod literal;
pub mod optimiser;
pub mod plan;
pub mod text;
pub mod varuint;

pub use ast::{LoopBlock, Statement, StatementSequence};
pub use color::RGBColor;
pub use compiler::{Compiler, CompilerInput, CompilerOutput};
pub use error::{Error, Result};
pub use formats::{InputFormat, OutputFormat};
pub use interpreter::{unroll, Executor, ExecutorState, Player, UnrolledFrame};
pub use literal::{ChannelMask, ChannelValues, Duration, UnsignedByte, Varuint, FPS};
pub use optimiser::{create_optimiser_for_level, Optimiser};
pub use plan::{Environment, Plan, Stage};
