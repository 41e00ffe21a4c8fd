use super::*;
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
enum ZoneOp {
    Malloc(u32),
    Free(usize),
    Realloc(usize, u32),
}

fn zone_op() -> impl Strategy<Value = ZoneOp> {
    prop_oneof![
        (1u32..96).prop_map(ZoneOp::Malloc),
        any::<usize>().prop_map(ZoneOp::Free),
        (any::<usize>(), 1u32..96).prop_map(|(i, n)| ZoneOp::Realloc(i, n)),
    ]
}

/// Each live allocation is filled with its own marker so overlaps show
/// up as clobbered cells.
fn check_marks(mem: &Memory, live: &[(Ptr, u32, u32)]) -> Result<(), TestCaseError> {
    for &(ptr, size, mark) in live {
        let cells = mem.slice(ptr.0, size).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(cells.iter().all(|&c| c == mark), "block at {} clobbered", ptr);
    }
    Ok(())
}

#[derive(Debug, Clone)]
enum EdictOp {
    Alloc,
    Free(usize),
    Tick,
}

fn edict_op() -> impl Strategy<Value = EdictOp> {
    prop_oneof![
        2 => Just(EdictOp::Alloc),
        2 => any::<usize>().prop_map(EdictOp::Free),
        1 => Just(EdictOp::Tick),
    ]
}

proptest! {
    #[test]
    fn zone_blocks_never_overlap(ops in prop::collection::vec(zone_op(), 1..80)) {
        let base = 64;
        let size = 2048;
        let zone = Zone::new(base, size);
        let mut mem = Memory::new(vec![0; (base + size) as usize]);
        zone.init(&mut mem).unwrap();
        let initial = zone.blocks(&mem).unwrap();
        prop_assert_eq!(initial.len(), 1);

        let mut live: Vec<(Ptr, u32, u32)> = vec![];
        let mut next_mark = 1u32;
        for op in ops {
            match op {
                ZoneOp::Malloc(n) => {
                    if let Ok(ptr) = zone.malloc(&mut mem, n) {
                        prop_assert!(zone.contains(ptr));
                        mem.fill(ptr.0, n, next_mark).unwrap();
                        live.push((ptr, n, next_mark));
                        next_mark += 1;
                    }
                }
                ZoneOp::Free(i) if !live.is_empty() => {
                    let (ptr, _, _) = live.swap_remove(i % live.len());
                    zone.free(&mut mem, ptr).unwrap();
                }
                ZoneOp::Realloc(i, n) if !live.is_empty() => {
                    let i = i % live.len();
                    let (ptr, old, mark) = live[i];
                    if let Ok(new) = zone.realloc(&mut mem, ptr, n) {
                        let kept = old.min(n);
                        let cells = mem.slice(new.0, n).unwrap();
                        prop_assert!(cells[..kept as usize].iter().all(|&c| c == mark));
                        prop_assert!(cells[kept as usize..].iter().all(|&c| c == 0));
                        mem.fill(new.0, n, mark).unwrap();
                        live[i] = (new, n, mark);
                    } else {
                        prop_assert_eq!(zone.size_of(&mem, ptr).unwrap(), old);
                    }
                }
                _ => {}
            }
            prop_assert!(zone.check_heap(&mem).is_ok());
            check_marks(&mem, &live)?;
            let used = zone.blocks(&mem).unwrap().iter().filter(|b| b.tag != 0).count();
            prop_assert_eq!(used, live.len());
        }

        for (ptr, _, _) in live.drain(..) {
            zone.free(&mut mem, ptr).unwrap();
        }
        prop_assert!(zone.check_heap(&mem).is_ok());
        let blocks = zone.blocks(&mem).unwrap();
        prop_assert_eq!(blocks.len(), 1);
        prop_assert_eq!(blocks[0].block_size, initial[0].block_size);
        prop_assert_eq!(blocks[0].tag, 0);
    }

    #[test]
    fn recursion_restores_locals(depth in 0u32..63) {
        let mut b = ImageBuilder::new(PROG_ID_VERSION);
        let one = b.float("one", 1.0);
        let total = b.float("total", 0.0);
        let origin = b.vector("origin", [1.0, 2.0, 3.0]);
        let p0 = b.param_ofs(0);
        let down = b.function("down", &[Etype::Float], &[Etype::Float, Etype::Vector]);
        let n = down.params[0];
        let target = b.func_global("down_fn", down.index);
        b.statement(Op::StoreF, n, down.locals[0], 0);
        b.statement(Op::StoreV, origin, down.locals[1], 0);
        b.statement(Op::Ifnot, n, 4, 0);
        b.statement(Op::SubF, n, one, p0);
        b.statement(Op::Call1, target, 0, 0);
        b.statement(Op::AddF, total, down.locals[0], total);
        b.statement(Op::Return, 0, 0, 0);

        let mut progs = load(&b);
        let def = progs.function(down.index as usize).unwrap().def;
        let window: Vec<u32> = (0..def.locals).map(|i| 0x5a5a_0000 + i).collect();
        progs
            .memory_mut()
            .slice_mut(def.params_start, def.locals)
            .unwrap()
            .copy_from_slice(&window);

        progs.call_by_name("down", &[Value::Float(depth as f32)]).unwrap();
        let expected = (depth * (depth + 1) / 2) as f32;
        prop_assert_eq!(progs.global::<f32>("total").unwrap(), expected);
        prop_assert_eq!(progs.memory().slice(def.params_start, def.locals).unwrap(), &window[..]);
        prop_assert_eq!(progs.depth(), 0);
    }

    #[test]
    fn alloc_prefers_lowest_reusable_slot(ops in prop::collection::vec(edict_op(), 1..120)) {
        let (b, _) = with_fields(PROG_ID_VERSION, &[("health", Etype::Float)]);
        let mut progs = load_with(&b, Config { max_edicts: 64, ..Config::default() });

        let mut time = 0f32;
        let mut live = BTreeSet::new();
        let mut freed: BTreeMap<usize, f32> = BTreeMap::new();
        let mut allocs = 0;
        for op in ops {
            match op {
                EdictOp::Alloc if allocs < 40 => {
                    allocs += 1;
                    let before = progs.num_edicts();
                    let reusable = freed
                        .iter()
                        .find(|&(_, &t)| t < 2.0 || time - t > 0.5)
                        .map(|(&e, _)| e);
                    let edict = progs.alloc_edict().unwrap();
                    prop_assert!(!live.contains(&edict));
                    match reusable {
                        Some(e) => prop_assert_eq!(edict, e),
                        None => prop_assert_eq!(edict, before),
                    }
                    freed.remove(&edict);
                    live.insert(edict);
                }
                EdictOp::Free(i) if !live.is_empty() => {
                    let edict = *live.iter().nth(i % live.len()).unwrap();
                    progs.free_edict(edict).unwrap();
                    live.remove(&edict);
                    freed.insert(edict, time);
                }
                EdictOp::Tick => {
                    time += 0.25;
                    progs.set_time(time).unwrap();
                }
                _ => {}
            }
            prop_assert_eq!(progs.edict_count().active, live.len() + 1);
        }
    }
}
