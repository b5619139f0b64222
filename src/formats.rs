//! Format autodetection (spec §6.4): maps a filename's suffix to an input
//! or output format selector.

use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    LedSource,
    Binary,
    Json,
    /// Pickled-AST (`.ast`). Per DESIGN.md, no pickle-equivalent crate
    /// exists anywhere in the retrieval pack, so this format round-trips
    /// through the same version-tagged JSON container as `Json`.
    Ast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    LedSource,
    Binary,
    Json,
    Ast,
}

impl InputFormat {
    pub fn detect_from_filename(filename: &str) -> Option<InputFormat> {
        match suffix_of(filename)?.as_str() {
            "led" | "oled" => Some(InputFormat::LedSource),
            "bin" | "sbl" => Some(InputFormat::Binary),
            "json" => Some(InputFormat::Json),
            "ast" => Some(InputFormat::Ast),
            _ => None,
        }
    }
}

impl OutputFormat {
    pub fn detect_from_filename(filename: &str) -> Option<OutputFormat> {
        match suffix_of(filename)?.as_str() {
            "led" | "oled" => Some(OutputFormat::LedSource),
            "bin" | "sbl" => Some(OutputFormat::Binary),
            "json" => Some(OutputFormat::Json),
            "ast" => Some(OutputFormat::Ast),
            _ => None,
        }
    }

    /// Binary is the default output format when the filename's suffix is
    /// unrecognized (spec §6.4).
    pub fn detect_from_filename_or_default(filename: &str) -> OutputFormat {
        OutputFormat::detect_from_filename(filename).unwrap_or(OutputFormat::Binary)
    }
}

fn suffix_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}
