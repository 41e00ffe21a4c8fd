use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn edicts(config: Config) -> Progs {
    let (b, _) = with_fields(
        PROG_ID_VERSION,
        &[("health", Etype::Float), ("model", Etype::String)],
    );
    load_with(&b, config)
}

fn small(max_edicts: u32) -> Config {
    Config {
        max_edicts,
        ..Config::default()
    }
}

#[test]
fn test_alloc_grows() {
    let mut progs = edicts(small(8));
    assert_eq!(progs.num_edicts(), 1);
    assert_eq!(progs.alloc_edict().unwrap(), 1);
    assert_eq!(progs.alloc_edict().unwrap(), 2);
    assert_eq!(progs.alloc_edict().unwrap(), 3);
    assert_eq!(progs.num_edicts(), 4);
}

#[test]
fn test_reuse_at_startup() {
    let mut progs = edicts(small(8));
    for _ in 0..3 {
        progs.alloc_edict().unwrap();
    }
    progs.free_edict(2).unwrap();
    assert!(progs.is_free(2));
    assert_eq!(progs.alloc_edict().unwrap(), 2);
    assert!(!progs.is_free(2));
}

#[test]
fn test_reuse_debounce() {
    let mut progs = edicts(small(8));
    progs.set_time(10.0).unwrap();
    progs.alloc_edict().unwrap();
    progs.alloc_edict().unwrap();
    progs.free_edict(1).unwrap();
    assert_eq!(progs.alloc_edict().unwrap(), 3);
    progs.set_time(11.0).unwrap();
    assert_eq!(progs.alloc_edict().unwrap(), 1);
}

static UNLINKED: AtomicUsize = AtomicUsize::new(0);

fn unlink(_: &mut Progs, edict: usize) -> Result<(), crate::prog::Error> {
    UNLINKED.store(edict, Ordering::SeqCst);
    Ok(())
}

#[test]
fn test_evicts_last_when_full() {
    let mut progs = edicts(small(3));
    progs.hooks.unlink = Some(unlink);
    progs.set_time(10.0).unwrap();
    assert_eq!(progs.alloc_edict().unwrap(), 1);
    assert_eq!(progs.alloc_edict().unwrap(), 2);
    progs.set_field(2, "health", 5.0f32).unwrap();
    assert_eq!(progs.alloc_edict().unwrap(), 2);
    assert_eq!(UNLINKED.load(Ordering::SeqCst), 2);
    assert_eq!(progs.field::<f32>(2, "health").unwrap(), 0.0);
}

#[test]
fn test_world_and_reserved() {
    let mut progs = edicts(Config {
        max_edicts: 8,
        reserved_edicts: 2,
        ..Config::default()
    });
    let e = progs.free_edict(0).unwrap_err();
    assert_eq!(e.code(), ErrorCode::BadEdict);
    assert_eq!(progs.alloc_edict().unwrap(), 3);
    let e = progs.free_edict(6).unwrap_err();
    assert_eq!(e.code(), ErrorCode::BadEdict);
}

#[test]
fn test_reserved_must_fit() {
    let (b, _) = with_fields(PROG_ID_VERSION, &[]);
    let mut progs = Progs::new(Config {
        max_edicts: 4,
        reserved_edicts: 4,
        ..Config::default()
    });
    let e = progs.load(&b.build()).unwrap_err();
    assert_eq!(e.code(), ErrorCode::OutOfMemory);
}

#[test]
fn test_fields() {
    let mut progs = edicts(small(8));
    let edict = progs.alloc_edict().unwrap();
    progs.set_field(edict, "health", 100.0f32).unwrap();
    let model = progs.make_dynamic_string("progs/player.mdl");
    progs.set_field(edict, "model", model).unwrap();
    assert_eq!(progs.field::<f32>(edict, "health").unwrap(), 100.0);
    assert_eq!(
        progs.field_value(edict, "health").unwrap(),
        Value::Float(100.0)
    );
    let e = progs.field::<f32>(edict, "armor").unwrap_err();
    assert_eq!(e.code(), ErrorCode::MissingSymbol);

    let text = progs.print_edict(edict).unwrap();
    assert!(text.starts_with("EDICT 1:\n"));
    assert!(text.contains("health 100\n"));
    assert!(text.contains("\"progs/player.mdl\""));

    let count = progs.edict_count();
    assert_eq!(count.active, 2);
    assert_eq!(count.models, 1);

    progs.free_edict(edict).unwrap();
    assert_eq!(progs.print_edict(edict).unwrap(), "EDICT 1: FREE\n");
    assert_eq!(progs.field::<f32>(edict, "health").unwrap(), 0.0);
    assert_eq!(progs.edict_count().free, 1);
}

#[test]
fn test_deadbeef_on_free() {
    let mut progs = edicts(Config {
        max_edicts: 8,
        deadbeef_ents: true,
        ..Config::default()
    });
    let edict = progs.alloc_edict().unwrap();
    progs.free_edict(edict).unwrap();
    assert_eq!(progs.field::<u32>(edict, "health").unwrap(), 0xdead_beef);
    assert_eq!(progs.alloc_edict().unwrap(), edict);
    assert_eq!(progs.field::<u32>(edict, "health").unwrap(), 0);
}

#[test]
fn test_next_edict() {
    let mut progs = edicts(small(8));
    for _ in 0..4 {
        progs.alloc_edict().unwrap();
    }
    progs.free_edict(2).unwrap();
    let live: Vec<usize> =
        std::iter::successors(progs.next_edict(0), |&e| progs.next_edict(e)).collect();
    assert_eq!(live, vec![1, 3, 4]);
}

#[test]
fn test_entity_values() {
    let progs = edicts(small(8));
    let size = progs.layout().edict_size;
    assert_eq!(size, 2);
    assert_eq!(progs.edict_to_entity(3), 6);
    assert_eq!(progs.entity_to_edict(6).unwrap(), 3);
    assert_eq!(progs.entity_to_edict(7).unwrap_err().code(), ErrorCode::BadEdict);
    assert_eq!(progs.entity_to_edict(16).unwrap_err().code(), ErrorCode::BadEdict);
}
