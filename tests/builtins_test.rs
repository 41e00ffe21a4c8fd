mod common;
use common::*;
use qcvm::prog::{ErrorCode, ImageBuilder, Opcode as Op, PROG_ID_VERSION};

#[test]
fn test_ftos() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let x = b.float("x", 3.5);
    let ftos = builtin(&mut b, "ftos", 26, 1);
    b.function("main", &[], &[]);
    call(&mut b, ftos, &[(Op::StoreF, x)]);
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(returned_string(&progs), "3.5");
    progs.set_global("x", -2.0f32).unwrap();
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(returned_string(&progs), "-2");
}

#[test]
fn test_sprintf() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let fmt = b.string_global("fmt", "%s has %g health, %5.2f%%");
    let name = b.string_global("name", "ogre");
    let hp = b.float("hp", 40.0);
    let ratio = b.float("ratio", 0.5);
    let sprintf = builtin(&mut b, "sprintf", 109, -1);
    b.function("main", &[], &[]);
    call(
        &mut b,
        sprintf,
        &[
            (Op::StoreS, fmt),
            (Op::StoreS, name),
            (Op::StoreF, hp),
            (Op::StoreF, ratio),
        ],
    );
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(returned_string(&progs), "ogre has 40 health,  0.50%");
}

#[test]
fn test_sprintf_missing_argument() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let fmt = b.string_global("fmt", "%s and %s");
    let name = b.string_global("name", "ogre");
    let sprintf = builtin(&mut b, "sprintf", 109, -1);
    b.function("main", &[], &[]);
    call(&mut b, sprintf, &[(Op::StoreS, fmt), (Op::StoreS, name)]);
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Builtin);
    assert!(e.is_fatal());
    assert!(e.trace().contains("main"));
}

#[test]
fn test_dprint() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let hello = b.string_global("hello", "hello ");
    let world = b.string_global("world", "world\n");
    let dprint = builtin(&mut b, "dprint", 25, -1);
    b.function("main", &[], &[]);
    call(&mut b, dprint, &[(Op::StoreS, hello), (Op::StoreS, world)]);
    b.statement(Op::Return, 0, 0, 0);

    let (mut progs, capture) = stock(&b, None);
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(capture.text(), "hello world\n");
}

#[test]
fn test_vlen_and_normalize() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let v = b.vector("v", [3.0, 4.0, 0.0]);
    let vlen = builtin(&mut b, "vlen", 12, 1);
    let normalize = builtin(&mut b, "normalize", 9, 1);
    b.function("length", &[], &[]);
    call(&mut b, vlen, &[(Op::StoreV, v)]);
    return_result(&mut b);
    b.function("unit", &[], &[]);
    call(&mut b, normalize, &[(Op::StoreV, v)]);
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    progs.call_by_name("length", &[]).unwrap();
    assert_eq!(progs.return_value::<f32>().unwrap(), 5.0);
    progs.call_by_name("unit", &[]).unwrap();
    let n = progs.return_value::<[f32; 3]>().unwrap();
    assert!((n[0] - 0.6).abs() < 1e-6 && (n[1] - 0.8).abs() < 1e-6 && n[2] == 0.0);
}

#[test]
fn test_spawn_and_remove() {
    let (mut b, _) = with_classname();
    let e = b.entity("e");
    let spawn = builtin(&mut b, "spawn", 14, 0);
    let remove = builtin(&mut b, "remove", 15, 1);
    let ret = b.return_ofs();
    b.function("main", &[], &[]);
    call(&mut b, spawn, &[]);
    b.statement(Op::StoreEnt, ret, e, 0);
    call(&mut b, remove, &[(Op::StoreEnt, e)]);
    b.statement(Op::Return, e, 0, 0);

    let (mut progs, _) = stock(&b, None);
    progs.call_by_name("main", &[]).unwrap();
    let ent = progs.return_value::<u32>().unwrap();
    assert_eq!(progs.entity_to_edict(ent).unwrap(), 1);
    assert!(progs.is_free(1));
    assert_eq!(progs.edict_count().active, 1);
}

#[test]
fn test_remove_world() {
    let (mut b, _) = with_classname();
    let world = b.entity("world");
    let remove = builtin(&mut b, "remove", 15, 1);
    b.function("main", &[], &[]);
    call(&mut b, remove, &[(Op::StoreEnt, world)]);
    b.statement(Op::Return, 0, 0, 0);

    let (mut progs, _) = stock(&b, None);
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::BadEdict);
}

#[test]
fn test_find() {
    let (mut b, classname) = with_classname();
    let world = b.entity("world");
    let wanted = b.string_global("wanted", "monster");
    let find = builtin(&mut b, "find", 18, 3);
    b.function("main", &[], &[]);
    call(
        &mut b,
        find,
        &[
            (Op::StoreEnt, world),
            (Op::StoreFld, classname),
            (Op::StoreS, wanted),
        ],
    );
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    for name in &["player", "monster", "monster"] {
        let edict = progs.alloc_edict().unwrap();
        let handle = progs.make_dynamic_string(name);
        progs.set_field(edict, "classname", handle).unwrap();
    }
    progs.call_by_name("main", &[]).unwrap();
    let ent = progs.return_value::<u32>().unwrap();
    assert_eq!(progs.entity_to_edict(ent).unwrap(), 2);

    progs.set_global("world", ent).unwrap();
    progs.call_by_name("main", &[]).unwrap();
    let ent = progs.return_value::<u32>().unwrap();
    assert_eq!(progs.entity_to_edict(ent).unwrap(), 3);

    progs.set_global("world", ent).unwrap();
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(progs.return_value::<u32>().unwrap(), 0);
}

#[test]
fn test_random_is_seeded() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let random = builtin(&mut b, "random", 7, 0);
    b.function("main", &[], &[]);
    call(&mut b, random, &[]);
    return_result(&mut b);

    let mut runs = vec![];
    for _ in 0..2 {
        let (mut progs, _) = stock(&b, Some(1234));
        let mut values = vec![];
        for _ in 0..5 {
            progs.call_by_name("main", &[]).unwrap();
            let r = progs.return_value::<f32>().unwrap();
            assert!((0.0..=1.0).contains(&r));
            values.push(r);
        }
        runs.push(values);
    }
    assert_eq!(runs[0], runs[1]);
}

#[test]
fn test_string_conversions() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let text = b.string_global("text", "3.5abc");
    let stof = builtin(&mut b, "stof", 81, 1);
    let strlen = builtin(&mut b, "strlen", 100, 1);
    b.function("to_float", &[], &[]);
    call(&mut b, stof, &[(Op::StoreS, text)]);
    return_result(&mut b);
    b.function("length", &[], &[]);
    call(&mut b, strlen, &[(Op::StoreS, text)]);
    return_result(&mut b);

    let (mut progs, _) = stock(&b, None);
    progs.call_by_name("to_float", &[]).unwrap();
    assert_eq!(progs.return_value::<f32>().unwrap(), 3.5);
    progs.call_by_name("length", &[]).unwrap();
    assert_eq!(progs.return_value::<f32>().unwrap(), 6.0);
}
