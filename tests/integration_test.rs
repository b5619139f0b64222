//! Literal end-to-end scenarios from spec §8, plus the round-trip corpus
//! driving the facade compiler across all four container formats.

use ledctrl_bc::{
    ast::opcode, codec, optimiser, text, ChannelMask, ChannelValues, Compiler, CompilerInput,
    CompilerOutput, Duration, ExecutorState, Executor, InputFormat, LoopBlock, OutputFormat,
    Player, RGBColor, Statement, UnsignedByte,
};

#[test]
fn scenario_1_end_only() {
    let ast = vec![Statement::End];
    assert_eq!(codec::encode_sequence(&ast).unwrap(), vec![0x00]);
    assert_eq!(text::to_led_source(&ast), "end()\n");
}

#[test]
fn scenario_2_nop_then_sleep() {
    let ast = vec![
        Statement::Nop,
        Statement::Sleep {
            duration: Duration::from_frames(25).unwrap(),
        },
    ];
    assert_eq!(codec::encode_sequence(&ast).unwrap(), vec![0x01, 0x02, 0x19]);

    let states: Vec<ExecutorState> = Executor::new(ast).collect::<Result<_, _>>().unwrap();
    assert_eq!(states.len(), 1);
    assert!(!states[0].is_fade);
    assert_eq!(states[0].timestamp, 0.0);
}

#[test]
fn scenario_3_color_shortener_rewrites_white() {
    let mut ast = vec![Statement::SetColor {
        color: RGBColor::cached(255, 255, 255),
        duration: Duration::from_frames(0).unwrap(),
    }];
    optimiser::create_optimiser_for_level(1)
        .optimise(&mut ast)
        .unwrap();
    assert_eq!(
        ast,
        vec![Statement::SetWhite {
            duration: Duration::from_frames(0).unwrap()
        }]
    );
    assert_eq!(codec::encode_sequence(&ast).unwrap(), vec![opcode::SET_WHITE, 0x00]);
}

#[test]
fn scenario_4_command_merger_collapses_identical_colors() {
    let color = RGBColor::cached(7, 8, 9);
    let mut ast = vec![
        Statement::SetColor {
            color,
            duration: Duration::from_frames(1).unwrap(),
        },
        Statement::SetColor {
            color,
            duration: Duration::from_frames(2).unwrap(),
        },
        Statement::SetColor {
            color,
            duration: Duration::from_frames(3).unwrap(),
        },
    ];
    optimiser::create_optimiser_for_level(1)
        .optimise(&mut ast)
        .unwrap();
    assert_eq!(
        ast,
        vec![Statement::SetColor {
            color,
            duration: Duration::from_frames(6).unwrap()
        }]
    );
}

#[test]
fn scenario_5_loop_detector_finds_alternating_pair() {
    let a = Statement::SetColor {
        color: RGBColor::cached(1, 2, 3),
        duration: Duration::from_frames(1).unwrap(),
    };
    let b = Statement::SetColor {
        color: RGBColor::cached(4, 5, 6),
        duration: Duration::from_frames(1).unwrap(),
    };
    let mut ast = vec![a.clone(), b.clone(), a.clone(), b.clone(), a.clone(), b.clone()];
    optimiser::create_optimiser_for_level(2)
        .optimise(&mut ast)
        .unwrap();
    assert_eq!(
        ast,
        vec![Statement::Loop(LoopBlock {
            iterations: 3,
            body: vec![a, b],
        })]
    );
}

#[test]
fn scenario_6_player_reports_black_at_quarter_second() {
    let ast = vec![
        Statement::Nop,
        Statement::Sleep {
            duration: Duration::from_frames(25).unwrap(),
        },
    ];
    let bytes = codec::encode_sequence(&ast).unwrap();
    let decoded = codec::decode_sequence(&bytes).unwrap();
    let mut player = Player::new(decoded);
    assert_eq!(player.get_color_at(0.25).unwrap(), RGBColor::BLACK);
}

#[test]
fn varuint_boundary_values_round_trip() {
    use ledctrl_bc::varuint::{decode_varuint, encode_varuint, VARUINT_MAX};
    for &v in &[0u32, 127, 128, 16383, 16384, VARUINT_MAX] {
        let encoded = encode_varuint(v).unwrap();
        let mut cursor = std::io::Cursor::new(encoded);
        assert_eq!(decode_varuint(&mut cursor, "Test").unwrap(), v);
    }
    assert!(encode_varuint(VARUINT_MAX + 1).is_err());
}

#[test]
fn loop_block_boundary_iteration_counts() {
    let body = vec![Statement::Nop];
    assert_eq!(
        codec::encode_sequence(&[Statement::Loop(LoopBlock {
            iterations: 0,
            body: body.clone(),
        })])
        .unwrap()
        .len(),
        0
    );
    assert_eq!(
        codec::encode_sequence(&[Statement::Loop(LoopBlock {
            iterations: 1,
            body: body.clone(),
        })])
        .unwrap(),
        vec![0x01]
    );
    let two = codec::encode_sequence(&[Statement::Loop(LoopBlock {
        iterations: 2,
        body: body.clone(),
    })])
    .unwrap();
    assert_eq!(two, vec![opcode::LOOP_BEGIN, 2, 0x01, opcode::LOOP_END]);
    let full = codec::encode_sequence(&[Statement::Loop(LoopBlock {
        iterations: 255,
        body,
    })])
    .unwrap();
    assert_eq!(full[1], 255);
}

#[test]
fn empty_sequence_encodes_to_empty_bytes() {
    assert_eq!(codec::encode_sequence(&[]).unwrap(), Vec::<u8>::new());
}

#[test]
fn pyro_channel_commands_round_trip_through_the_wire_format() {
    let ast = vec![
        Statement::SetPyro {
            mask: ChannelMask {
                enable: true,
                channels: [true, false, false, true, false, false, true],
            },
        },
        Statement::SetPyroAll {
            values: ChannelValues {
                channels: [false, true, true, false, false, true, false],
            },
        },
    ];
    let bytes = codec::encode_sequence(&ast).unwrap();
    assert_eq!(codec::decode_sequence(&bytes).unwrap(), ast);
}

#[test]
fn set_color_from_channels_round_trips() {
    let ast = vec![Statement::SetColorFromChannels {
        rch: UnsignedByte(1),
        gch: UnsignedByte(2),
        bch: UnsignedByte(3),
        duration: Duration::from_frames(10).unwrap(),
    }];
    let bytes = codec::encode_sequence(&ast).unwrap();
    assert_eq!(codec::decode_sequence(&bytes).unwrap(), ast);
}

#[test]
fn compiler_round_trips_a_small_program_through_binary_source_and_json() {
    let ast = vec![
        Statement::SetColor {
            color: RGBColor::cached(255, 0, 0),
            duration: Duration::from_frames(20).unwrap(),
        },
        Statement::FadeToBlack {
            duration: Duration::from_frames(40).unwrap(),
        },
        Statement::End,
    ];
    let binary = codec::encode_sequence(&ast).unwrap();

    let source_outputs = Compiler::new(0)
        .compile(
            CompilerInput::Bytes(binary.clone()),
            Some(InputFormat::Binary),
            Some(OutputFormat::LedSource),
        )
        .unwrap();
    let CompilerOutput::Source(source) = &source_outputs[0] else {
        panic!("expected a source output");
    };

    let roundtrip = Compiler::new(0)
        .compile(
            CompilerInput::Bytes(source.as_bytes().to_vec()),
            Some(InputFormat::LedSource),
            Some(OutputFormat::Binary),
        )
        .unwrap();
    assert_eq!(roundtrip, vec![CompilerOutput::Binary(binary.clone())]);

    let json_outputs = Compiler::new(0)
        .compile(
            CompilerInput::Bytes(binary.clone()),
            Some(InputFormat::Binary),
            Some(OutputFormat::Json),
        )
        .unwrap();
    let CompilerOutput::Json(_) = &json_outputs[0] else {
        panic!("expected a JSON output");
    };

    let from_json = Compiler::new(0)
        .compile(
            CompilerInput::Bytes(match &json_outputs[0] {
                CompilerOutput::Json(j) => j.as_bytes().to_vec(),
                _ => unreachable!(),
            }),
            Some(InputFormat::Json),
            Some(OutputFormat::Binary),
        )
        .unwrap();
    assert_eq!(from_json, vec![CompilerOutput::Binary(binary)]);
}

#[test]
fn compiler_rejects_unresolved_jump_markers_at_emit_time() {
    use ledctrl_bc::Error;
    let source = "jump_to_label(\"loop_start\")\n";
    let err = Compiler::new(0)
        .compile(
            CompilerInput::Bytes(source.as_bytes().to_vec()),
            Some(InputFormat::LedSource),
            Some(OutputFormat::Binary),
        )
        .unwrap_err();
    assert!(matches!(err, Error::MarkerNotResolvable));
}
