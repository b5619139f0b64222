//! Canonical textual source form (spec §6.3): one statement per line, loop
//! bodies indented four spaces under `with loop(iterations=N):`, comments
//! emitted as a delimited banner.

use crate::ast::{LoopBlock, Statement};
use crate::color::RGBColor;
use crate::error::{Error, Result};
use crate::literal::{ChannelMask, ChannelValues, Duration, UnsignedByte};

pub fn to_led_source(statements: &[Statement]) -> String {
    let mut lines = Vec::new();
    render_sequence(statements, 0, &mut lines);
    if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}

fn render_sequence(statements: &[Statement], indent: usize, lines: &mut Vec<String>) {
    for statement in statements {
        render_statement(statement, indent, lines);
    }
}

fn render_statement(statement: &Statement, indent: usize, lines: &mut Vec<String>) {
    let pad = " ".repeat(indent);
    match statement {
        Statement::Loop(block) => render_loop(block, indent, lines),
        Statement::Comment(text) => lines.push(format!("{pad}# ---- {text} ----")),
        other => lines.push(format!("{pad}{}", render_call(other))),
    }
}

fn render_loop(block: &LoopBlock, indent: usize, lines: &mut Vec<String>) {
    if block.iterations == 0 || block.body.is_empty() {
        return;
    }
    if block.iterations == 1 {
        render_sequence(&block.body, indent, lines);
        return;
    }
    let pad = " ".repeat(indent);
    lines.push(format!("{pad}with loop(iterations={}):", block.iterations));
    render_sequence(&block.body, indent + 4, lines);
}

fn render_call(statement: &Statement) -> String {
    match statement {
        Statement::End => "end()".to_string(),
        Statement::Nop => "nop()".to_string(),
        Statement::Sleep { duration } => format!("sleep({})", duration.frames()),
        Statement::WaitUntil { timestamp } => format!("wait_until({})", timestamp.frames()),
        Statement::SetColor { color, duration } => format!(
            "set_color({}, {}, {}, {})",
            color.red,
            color.green,
            color.blue,
            duration.frames()
        ),
        Statement::SetGray { value, duration } => {
            format!("set_gray({}, {})", value.0, duration.frames())
        }
        Statement::SetBlack { duration } => format!("set_black({})", duration.frames()),
        Statement::SetWhite { duration } => format!("set_white({})", duration.frames()),
        Statement::FadeToColor { color, duration } => format!(
            "fade_to_color({}, {}, {}, {})",
            color.red,
            color.green,
            color.blue,
            duration.frames()
        ),
        Statement::FadeToGray { value, duration } => {
            format!("fade_to_gray({}, {})", value.0, duration.frames())
        }
        Statement::FadeToBlack { duration } => format!("fade_to_black({})", duration.frames()),
        Statement::FadeToWhite { duration } => format!("fade_to_white({})", duration.frames()),
        Statement::ResetTimer => "reset_timer()".to_string(),
        Statement::SetColorFromChannels {
            rch,
            gch,
            bch,
            duration,
        } => format!(
            "set_color_from_channels({}, {}, {}, {})",
            rch.0,
            gch.0,
            bch.0,
            duration.frames()
        ),
        Statement::FadeToColorFromChannels {
            rch,
            gch,
            bch,
            duration,
        } => format!(
            "fade_to_color_from_channels({}, {}, {}, {})",
            rch.0,
            gch.0,
            bch.0,
            duration.frames()
        ),
        Statement::Jump { address } => format!("jump({address})"),
        Statement::TriggeredJump => "triggered_jump()".to_string(),
        Statement::SetPyro { mask } => format!(
            "set_pyro(enable={}, channels={})",
            mask.enable,
            render_channels(&mask.channels)
        ),
        Statement::SetPyroAll { values } => {
            format!("set_pyro_all(channels={})", render_channels(&values.channels))
        }
        Statement::UnresolvedJump { label } => format!("jump_to_label({label:?})"),
        Statement::Loop(_) | Statement::Comment(_) => {
            unreachable!("handled by render_statement before dispatching here")
        }
    }
}

fn render_channels(channels: &[bool; 7]) -> String {
    let rendered: Vec<&str> = channels
        .iter()
        .map(|&set| if set { "1" } else { "0" })
        .collect();
    format!("[{}]", rendered.join(", "))
}

/// Parses the canonical textual form back into an AST. This is not a
/// general DSL front-end (that is out of scope); it understands exactly
/// the restricted grammar `to_led_source` emits, which is what the §3.2
/// `to_bytecode(to_led_source(x))` round-trip invariant requires.
pub fn from_led_source(text: &str) -> Result<Vec<Statement>> {
    let lines: Vec<&str> = text.lines().collect();
    let (statements, consumed) = parse_block(&lines, 0, 0)?;
    if consumed != lines.len() {
        return Err(Error::Compiler(format!(
            "unexpected indentation at line {}",
            consumed + 1
        )));
    }
    Ok(statements)
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|&c| c == ' ').count()
}

fn parse_block(lines: &[&str], start: usize, indent: usize) -> Result<(Vec<Statement>, usize)> {
    let mut out = Vec::new();
    let mut i = start;
    while i < lines.len() {
        let line = lines[i];
        if line.trim().is_empty() {
            i += 1;
            continue;
        }
        let line_indent = leading_spaces(line);
        if line_indent < indent {
            break;
        }
        if line_indent > indent {
            return Err(Error::Compiler(format!(
                "unexpected indentation at line {}",
                i + 1
            )));
        }
        let content = &line[indent..];

        if let Some(comment) = content.strip_prefix('#') {
            out.push(Statement::Comment(parse_comment(comment)?));
            i += 1;
        } else if let Some(rest) = content.strip_prefix("with loop(iterations=") {
            let close = rest
                .find("):")
                .ok_or_else(|| Error::Compiler(format!("malformed loop header at line {}", i + 1)))?;
            let iterations: u8 = rest[..close].trim().parse().map_err(|_| {
                Error::Compiler(format!("invalid loop iteration count at line {}", i + 1))
            })?;
            let (body, next) = parse_block(lines, i + 1, indent + 4)?;
            out.push(Statement::Loop(LoopBlock { iterations, body }));
            i = next;
        } else {
            out.push(parse_call(content)?);
            i += 1;
        }
    }
    Ok((out, i))
}

fn parse_comment(content: &str) -> Result<String> {
    content
        .strip_prefix(" ---- ")
        .and_then(|rest| rest.strip_suffix(" ----"))
        .map(|s| s.to_string())
        .ok_or_else(|| Error::Compiler(format!("malformed comment banner: {content:?}")))
}

fn split_top_level_args(args: &str) -> Vec<&str> {
    if args.trim().is_empty() {
        return Vec::new();
    }
    let mut depth = 0i32;
    let mut start = 0;
    let mut out = Vec::new();
    for (i, c) in args.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth -= 1,
            ',' if depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(args[start..].trim());
    out
}

fn parse_u32(s: &str, what: &str) -> Result<u32> {
    s.parse()
        .map_err(|_| Error::Compiler(format!("invalid {what}: {s:?}")))
}

fn parse_u8(s: &str, what: &str) -> Result<u8> {
    s.parse()
        .map_err(|_| Error::Compiler(format!("invalid {what}: {s:?}")))
}

fn parse_duration(s: &str) -> Result<Duration> {
    Duration::from_frames(parse_u32(s, "duration")?)
}

fn parse_channels(s: &str) -> Result<[bool; 7]> {
    let inner = s
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| Error::Compiler(format!("malformed channel list: {s:?}")))?;
    let mut channels = [false; 7];
    for (i, part) in inner.split(',').map(str::trim).enumerate() {
        if i >= 7 {
            return Err(Error::Compiler("too many channels".into()));
        }
        channels[i] = parse_u8(part, "channel value")? != 0;
    }
    Ok(channels)
}

fn parse_call(content: &str) -> Result<Statement> {
    let open = content
        .find('(')
        .ok_or_else(|| Error::Compiler(format!("expected a call: {content:?}")))?;
    let name = &content[..open];
    let close = content
        .rfind(')')
        .ok_or_else(|| Error::Compiler(format!("unterminated call: {content:?}")))?;
    let args = split_top_level_args(&content[open + 1..close]);

    Ok(match name {
        "end" => Statement::End,
        "nop" => Statement::Nop,
        "reset_timer" => Statement::ResetTimer,
        "triggered_jump" => Statement::TriggeredJump,
        "sleep" => Statement::Sleep {
            duration: parse_duration(args[0])?,
        },
        "wait_until" => Statement::WaitUntil {
            timestamp: parse_duration(args[0])?,
        },
        "set_color" => Statement::SetColor {
            color: RGBColor::cached(
                parse_u8(args[0], "red")?,
                parse_u8(args[1], "green")?,
                parse_u8(args[2], "blue")?,
            ),
            duration: parse_duration(args[3])?,
        },
        "fade_to_color" => Statement::FadeToColor {
            color: RGBColor::cached(
                parse_u8(args[0], "red")?,
                parse_u8(args[1], "green")?,
                parse_u8(args[2], "blue")?,
            ),
            duration: parse_duration(args[3])?,
        },
        "set_gray" => Statement::SetGray {
            value: UnsignedByte(parse_u8(args[0], "gray value")?),
            duration: parse_duration(args[1])?,
        },
        "fade_to_gray" => Statement::FadeToGray {
            value: UnsignedByte(parse_u8(args[0], "gray value")?),
            duration: parse_duration(args[1])?,
        },
        "set_black" => Statement::SetBlack {
            duration: parse_duration(args[0])?,
        },
        "set_white" => Statement::SetWhite {
            duration: parse_duration(args[0])?,
        },
        "fade_to_black" => Statement::FadeToBlack {
            duration: parse_duration(args[0])?,
        },
        "fade_to_white" => Statement::FadeToWhite {
            duration: parse_duration(args[0])?,
        },
        "set_color_from_channels" => Statement::SetColorFromChannels {
            rch: UnsignedByte(parse_u8(args[0], "red channel")?),
            gch: UnsignedByte(parse_u8(args[1], "green channel")?),
            bch: UnsignedByte(parse_u8(args[2], "blue channel")?),
            duration: parse_duration(args[3])?,
        },
        "fade_to_color_from_channels" => Statement::FadeToColorFromChannels {
            rch: UnsignedByte(parse_u8(args[0], "red channel")?),
            gch: UnsignedByte(parse_u8(args[1], "green channel")?),
            bch: UnsignedByte(parse_u8(args[2], "blue channel")?),
            duration: parse_duration(args[3])?,
        },
        "jump" => Statement::Jump {
            address: parse_u32(args[0], "jump address")?,
        },
        "jump_to_label" => Statement::UnresolvedJump {
            label: args[0].trim_matches('"').to_string(),
        },
        "set_pyro" => {
            let enable = args[0]
                .strip_prefix("enable=")
                .ok_or_else(|| Error::Compiler("expected enable=".into()))?
                == "true";
            let channels = args[1]
                .strip_prefix("channels=")
                .ok_or_else(|| Error::Compiler("expected channels=".into()))?;
            Statement::SetPyro {
                mask: ChannelMask {
                    enable,
                    channels: parse_channels(channels)?,
                },
            }
        }
        "set_pyro_all" => {
            let channels = args[0]
                .strip_prefix("channels=")
                .ok_or_else(|| Error::Compiler("expected channels=".into()))?;
            Statement::SetPyroAll {
                values: ChannelValues {
                    channels: parse_channels(channels)?,
                },
            }
        }
        other => {
            return Err(Error::Compiler(format!("unknown statement: {other}")))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::Duration;

    #[test]
    fn end_renders_as_call() {
        assert_eq!(to_led_source(&[Statement::End]), "end()\n");
    }

    #[test]
    fn loop_indents_body_by_four_spaces() {
        let block = crate::ast::LoopBlock {
            iterations: 3,
            body: vec![Statement::Nop, Statement::ResetTimer],
        };
        let text = to_led_source(&[Statement::Loop(block)]);
        assert_eq!(
            text,
            "with loop(iterations=3):\n    nop()\n    reset_timer()\n"
        );
    }

    #[test]
    fn single_iteration_loop_emits_bare_body() {
        let block = crate::ast::LoopBlock {
            iterations: 1,
            body: vec![Statement::Nop],
        };
        assert_eq!(to_led_source(&[Statement::Loop(block)]), "nop()\n");
    }

    #[test]
    fn comment_emits_banner() {
        let text = to_led_source(&[Statement::Comment("setup".into())]);
        assert_eq!(text, "# ---- setup ----\n");
    }

    #[test]
    fn sleep_carries_frame_count() {
        let s = Statement::Sleep {
            duration: Duration::from_frames(25).unwrap(),
        };
        assert_eq!(to_led_source(&[s]), "sleep(25)\n");
    }
}
