mod common;
use common::*;
use qcvm::mach::{cmds, Config, Progs, Value};
use qcvm::prog::{ErrorCode, Etype, ImageBuilder, Opcode as Op, PROG_ID_VERSION, PROG_V6P_VERSION};

fn answer(version: u32) -> ImageBuilder {
    let mut b = ImageBuilder::new(version);
    let answer = b.float("answer", 42.0);
    b.function("main", &[], &[]);
    b.statement(Op::Return, answer, 0, 0);
    b
}

#[test]
fn test_main_returns_constant() {
    for &version in &[PROG_ID_VERSION, PROG_V6P_VERSION] {
        let (mut progs, _) = stock(&answer(version), None);
        progs.call_by_name("main", &[]).unwrap();
        assert_eq!(progs.return_value::<f32>().unwrap(), 42.0);
        assert_eq!(progs.depth(), 0);
    }
}

#[test]
fn test_load_from_file() {
    let dir = scratch_dir("progs");
    let path = dir.join("progs.dat");
    std::fs::write(&path, answer(PROG_ID_VERSION).build()).unwrap();

    let mut progs = Progs::new(Config::default());
    progs.load_file(&path).unwrap();
    assert!(progs.is_loaded());
    assert!(progs.is_legacy());
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(progs.return_value::<f32>().unwrap(), 42.0);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_stock_builtins_register_once() {
    let mut progs = Progs::new(Config::default());
    cmds::register(&mut progs, None).unwrap();
    let count = progs.builtins().len();
    assert!(progs.builtins().by_name("ftos").is_some());
    let e = cmds::register(&mut progs, None).unwrap_err();
    assert_eq!(e.code(), ErrorCode::BuiltinCollision);
    assert_eq!(progs.builtins().len(), count);
}

#[test]
fn test_null_function() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let nothing = b.func_global("nothing", 0);
    b.function("main", &[], &[]);
    b.statement(Op::Call0, nothing, 0, 0);
    b.statement(Op::Return, 0, 0, 0);

    let (mut progs, _) = stock(&b, None);
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::NullFunction);
    assert!(e.is_fatal());
    assert_eq!(progs.depth(), 0);

    let e = progs.call(0, &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::NullFunction);
}

#[test]
fn test_host_calls_with_arguments() {
    let mut b = ImageBuilder::new(PROG_V6P_VERSION);
    let main = b.function("scale", &[Etype::Vector, Etype::Float], &[]);
    let ret = b.return_ofs();
    b.statement(Op::MulVf, main.params[0], main.params[1], ret);
    b.statement(Op::ReturnV, 0, 0, 0);

    let (mut progs, _) = stock(&b, None);
    progs
        .call_by_name("scale", &[Value::Vector([1.0, 2.0, 3.0]), Value::Float(2.0)])
        .unwrap();
    assert_eq!(progs.return_value::<[f32; 3]>().unwrap(), [2.0, 4.0, 6.0]);

    let e = progs.call_by_name("missing", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::MissingSymbol);
}

#[test]
fn test_instances_run_on_threads() {
    let b = answer(PROG_V6P_VERSION);
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let (mut progs, _) = stock(&b, Some(i));
            std::thread::spawn(move || {
                progs.set_global("answer", i as f32).unwrap();
                progs.call_by_name("main", &[]).unwrap();
                progs.return_value::<f32>().unwrap()
            })
        })
        .collect();
    let results: Vec<f32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results, vec![0.0, 1.0, 2.0, 3.0]);
}
