//! Facade compiler (spec §4.5): auto-detects input/output format by
//! filename or explicit selector, wires parse/optimise/emit stages into a
//! `Plan`, and returns a tuple of outputs (`compiler.py: BytecodeCompiler`).

use std::any::Any;
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::ast::Statement;
use crate::codec;
use crate::error::{Error, Result};
use crate::formats::{InputFormat, OutputFormat};
use crate::optimiser::create_optimiser_for_level;
use crate::plan::{Environment, Plan, Stage};
use crate::text;

const JSON_CONTAINER_VERSION: u32 = 1;

/// A single compiled output. The facade may in principle return more than
/// one entry (spec §4.5: "a single input may yield multiple outputs in some
/// configurations", grounded in the original's multi-AST fan-out for scene
/// files); this crate's stages are 1-in/1-out (no scene-file front-end is in
/// scope, per spec §1), so the returned vector always has exactly one
/// element today, but callers must not assume that statically.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilerOutput {
    Binary(Vec<u8>),
    Source(String),
    Json(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct JsonContainer {
    version: u32,
    data: String,
}

/// What to compile (`compiler.py: BytecodeCompiler.compile`'s `input`
/// parameter).
pub enum CompilerInput {
    Path(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
}

/// A single-writer, multi-reader value cell shared between two stages: the
/// producing stage fills it during `run()`, the consuming stage reads it
/// during its own later `run()`. Mirrors the original's stages holding a
/// reference to the stage that feeds them and reading its `.output`
/// attribute once the plan has executed that earlier step.
struct Slot<T>(Rc<RefCell<Option<T>>>);

impl<T> Slot<T> {
    fn new() -> Self {
        Slot(Rc::new(RefCell::new(None)))
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Slot(Rc::clone(&self.0))
    }
}

impl<T: Clone> Slot<T> {
    fn set(&self, value: T) {
        *self.0.borrow_mut() = Some(value);
    }

    fn get(&self, what: &'static str) -> Result<T> {
        self.0
            .borrow()
            .clone()
            .ok_or_else(|| Error::Compiler(format!("{what} read before its stage ran")))
    }
}

struct ParseStage {
    bytes: Vec<u8>,
    format: InputFormat,
    output: Slot<Vec<Statement>>,
}

impl Stage for ParseStage {
    fn label(&self) -> &'static str {
        "parse"
    }

    fn run(&mut self, _env: &Environment) -> Result<()> {
        let ast = match self.format {
            InputFormat::Binary => codec::decode_sequence(&self.bytes)?,
            InputFormat::LedSource => {
                let source = to_utf8(&self.bytes)?;
                text::from_led_source(&source)?
            }
            InputFormat::Json | InputFormat::Ast => {
                let container = decode_json_container(&to_utf8(&self.bytes)?)?;
                codec::decode_sequence(&container)?
            }
        };
        self.output.set(ast);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct OptimisationStage {
    source: Slot<Vec<Statement>>,
    level: u8,
    output: Slot<Vec<Statement>>,
}

impl Stage for OptimisationStage {
    fn label(&self) -> &'static str {
        "optimise"
    }

    fn run(&mut self, _env: &Environment) -> Result<()> {
        let mut ast = self.source.get("AST")?;
        create_optimiser_for_level(self.level).optimise(&mut ast)?;
        self.output.set(ast);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct EmitStage {
    source: Slot<Vec<Statement>>,
    format: OutputFormat,
    output: Slot<CompilerOutput>,
}

impl Stage for EmitStage {
    fn label(&self) -> &'static str {
        "emit"
    }

    fn run(&mut self, _env: &Environment) -> Result<()> {
        let ast = self.source.get("AST")?;
        let out = match self.format {
            OutputFormat::Binary => CompilerOutput::Binary(codec::encode_sequence(&ast)?),
            OutputFormat::LedSource => CompilerOutput::Source(text::to_led_source(&ast)),
            OutputFormat::Json | OutputFormat::Ast => {
                CompilerOutput::Json(encode_json_container(&codec::encode_sequence(&ast)?)?)
            }
        };
        self.output.set(out);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn to_utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Compiler(format!("input is not valid UTF-8: {e}")))
}

fn decode_json_container(text: &str) -> Result<Vec<u8>> {
    let container: JsonContainer = serde_json::from_str(text)
        .map_err(|e| Error::Compiler(format!("malformed JSON container: {e}")))?;
    if container.version != JSON_CONTAINER_VERSION {
        return Err(Error::Compiler(format!(
            "unsupported JSON container version {}",
            container.version
        )));
    }
    base64::engine::general_purpose::STANDARD
        .decode(container.data)
        .map_err(|e| Error::Compiler(format!("malformed base64 payload: {e}")))
}

fn encode_json_container(raw: &[u8]) -> Result<String> {
    let container = JsonContainer {
        version: JSON_CONTAINER_VERSION,
        data: base64::engine::general_purpose::STANDARD.encode(raw),
    };
    serde_json::to_string(&container)
        .map_err(|e| Error::Compiler(format!("failed to serialize JSON container: {e}")))
}

/// Selects stages by format, wires the optimiser between them at the
/// configured level, and runs the resulting plan (`compiler.py:
/// BytecodeCompiler`).
pub struct Compiler {
    pub optimisation_level: u8,
}

impl Compiler {
    pub fn new(optimisation_level: u8) -> Self {
        Compiler { optimisation_level }
    }

    pub fn compile(
        &self,
        input: CompilerInput,
        input_format: Option<InputFormat>,
        output_format: Option<OutputFormat>,
    ) -> Result<Vec<CompilerOutput>> {
        let (bytes, inferred_input_format, filename) = self.resolve_input(input)?;
        let input_format = input_format.or(inferred_input_format).ok_or_else(|| {
            Error::UnsupportedInputFormat {
                filename: filename.clone(),
                format: None,
            }
        })?;
        let output_format = output_format.unwrap_or(OutputFormat::Binary);

        let mut plan = Plan::new();

        let parse_output = Slot::new();
        plan.add_stage(Box::new(ParseStage {
            bytes,
            format: input_format,
            output: parse_output.clone(),
        }));

        let optimise_output = Slot::new();
        plan.add_stage(Box::new(OptimisationStage {
            source: parse_output,
            level: self.optimisation_level,
            output: optimise_output.clone(),
        }));

        let emit_output = Slot::new();
        let emit_index = plan.add_stage(Box::new(EmitStage {
            source: optimise_output,
            format: output_format,
            output: emit_output.clone(),
        }));
        plan.mark_as_output(emit_index);

        plan.execute(&Environment, true)?;

        Ok(vec![emit_output.get("compiled output")?])
    }

    fn resolve_input(
        &self,
        input: CompilerInput,
    ) -> Result<(Vec<u8>, Option<InputFormat>, Option<String>)> {
        match input {
            CompilerInput::Path(path) => {
                let format = InputFormat::detect_from_filename(&path);
                let bytes = fs::read(&path)
                    .map_err(|e| Error::Compiler(format!("failed to read {path:?}: {e}")))?;
                Ok((bytes, format, Some(path)))
            }
            CompilerInput::Bytes(bytes) => Ok((bytes, None, None)),
            CompilerInput::Json(value) => {
                let text = serde_json::to_vec(&value)
                    .map_err(|e| Error::Compiler(format!("failed to serialize JSON input: {e}")))?;
                Ok((text, Some(InputFormat::Json), None))
            }
        }
    }
}

/// One-shot convenience wrapper (`compiler.py: compile()`), for throwaway
/// conversions that don't need a reusable `Compiler` instance.
pub fn compile(
    input: CompilerInput,
    input_format: Option<InputFormat>,
    output_format: Option<OutputFormat>,
    optimisation_level: u8,
) -> Result<Vec<CompilerOutput>> {
    Compiler::new(optimisation_level).compile(input, input_format, output_format)
}
