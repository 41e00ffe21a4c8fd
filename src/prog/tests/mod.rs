use super::*;

fn sample() -> (ImageBuilder, Func) {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    b.source_file("sample.qc");
    b.float("gravity", 800.0);
    b.field("origin", Etype::Vector);
    let main = b.function("main", &[], &[Etype::Float]);
    b.statement(Opcode::AddF, main.locals[0], main.locals[0], main.locals[0]);
    b.statement(Opcode::Return, main.locals[0], 0, 0);
    (b, main)
}

#[test]
fn test_parse_built_image() {
    let (b, main) = sample();
    let bytes = b.build();
    let image = Image::parse(&bytes).unwrap();
    assert_eq!(image.version(), PROG_ID_VERSION);
    assert_eq!(image.instruction_set(), Version::Id);
    assert_eq!(image.crc, crc16(&bytes));
    assert_eq!(image.statements.len(), 3);
    assert_eq!(image.functions.len(), 2);
    assert_eq!(image.function_name(1), "main");
    assert_eq!(image.functions[1].first_statement, main.first_statement as i32);
    assert_eq!(image.string(image.functions[1].file), "sample.qc");
    assert_eq!(image.entityfields(), 3);
    assert_eq!(image.fielddefs.len(), 1);
    assert_eq!(image.fielddefs[0].etype(), Etype::Vector);
    let gravity = image
        .globaldefs
        .iter()
        .find(|d| image.string(d.name) == "gravity")
        .unwrap();
    assert_eq!(image.globals[gravity.offset as usize], 800f32.to_bits());
}

#[test]
fn test_truncated() {
    let (b, _) = sample();
    let bytes = b.build();
    let e = Image::parse(&bytes[..40]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Truncated);
    let e = Image::parse(&bytes[..bytes.len() - 4]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Truncated);
}

#[test]
fn test_bad_version() {
    let (b, _) = sample();
    let mut bytes = b.build();
    bytes[0] = 7;
    let e = Image::parse(&bytes).unwrap_err();
    assert_eq!(e.code(), ErrorCode::BadVersion);
    assert_eq!(e.kind(), ErrorKind::Load);
}

#[test]
fn test_function_past_last_statement() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    b.function("empty", &[], &[]);
    let e = Image::parse(&b.build()).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Malformed);
}

#[test]
fn test_extended_abi_globals() {
    let b = ImageBuilder::new(PROG_V6P_VERSION);
    assert_eq!(b.return_ofs(), 1);
    assert_eq!(b.param_ofs(0), 5);
    assert_eq!(b.param_ofs(7), 33);
    let image = Image::parse(&b.build()).unwrap();
    assert_eq!(image.instruction_set(), Version::V6p);
    let names: Vec<String> = image
        .globaldefs
        .iter()
        .map(|d| image.string(d.name).into_owned())
        .collect();
    assert!(names.iter().any(|n| n == ".param_size"));
    assert!(names.iter().any(|n| n == ".param_7"));
}

#[test]
fn test_debug_lines() {
    let (mut b, main) = sample();
    let count = b.string("count");
    let image = Image::parse(&b.build()).unwrap();
    let mut d = DebugBuilder::new();
    d.function(
        main.index as u32,
        10,
        &[(main.first_statement, 1), (main.first_statement + 1, 2)],
        &[Def::new(Etype::Float, main.locals[0], count)],
    );
    let info = DebugInfo::parse(&d.build(image.crc), &image).unwrap();
    assert_eq!(
        info.location(&image, main.first_statement),
        Some(("sample.qc".to_string(), 11))
    );
    assert_eq!(
        info.location(&image, main.first_statement + 1),
        Some(("sample.qc".to_string(), 12))
    );
    assert_eq!(
        info.local_name(&image, main.index as usize, main.locals[0] as u32),
        Some("count".to_string())
    );
    assert_eq!(info.local_name(&image, main.index as usize, 0), None);
}

#[test]
fn test_debug_crc_mismatch() {
    let (b, _) = sample();
    let image = Image::parse(&b.build()).unwrap();
    let d = DebugBuilder::new();
    let e = DebugInfo::parse(&d.build(image.crc ^ 1), &image).unwrap_err();
    assert_eq!(e.code(), ErrorCode::CrcMismatch);
}

#[test]
fn test_opcode_numbers() {
    for n in 0..=290u16 {
        match Opcode::from_u16(n) {
            Some(op) => assert_eq!(op as u16, n),
            None => assert_eq!(n, 187),
        }
    }
    assert_eq!(Opcode::from_u16(291), None);
    assert_eq!(Opcode::Return.info().version, Version::Id);
    assert_eq!(Opcode::AddI.info().version, Version::V6p);
    assert!(Opcode::PushF.is_push_pop());
    assert!(!Opcode::StoreF.is_push_pop());
}

#[test]
fn test_version_string() {
    assert_eq!(version_string(PROG_ID_VERSION), "6");
    assert_eq!(version_string(PROG_V6P_VERSION), "00.fff.00a");
}

#[test]
fn test_crc16() {
    assert_eq!(crc16(b"123456789"), 0x29b1);
}
