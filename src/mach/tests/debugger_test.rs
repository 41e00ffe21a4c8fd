use super::*;

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
    resume: Resume,
}

impl Recorder {
    fn install(progs: &mut Progs, resume: Resume) -> Arc<Mutex<Vec<String>>> {
        let events = Arc::new(Mutex::new(vec![]));
        let recorder = Recorder {
            events: Arc::clone(&events),
            resume,
        };
        progs.set_debug_handler(Some(Box::new(recorder)));
        events
    }
}

impl DebugHandler for Recorder {
    fn event(&mut self, _progs: &mut Progs, event: DebugEvent) -> Resume {
        let name = match event {
            DebugEvent::Subenter(_) => "subenter",
            DebugEvent::Subexit => "subexit",
            DebugEvent::Trace(_) => "trace",
            DebugEvent::Breakpoint(_) => "breakpoint",
            DebugEvent::Watchpoint { .. } => "watchpoint",
            DebugEvent::Error(_) => "error",
            DebugEvent::Terminate => "terminate",
        };
        self.events.lock().unwrap().push(name.to_string());
        match event {
            DebugEvent::Breakpoint(_) | DebugEvent::Watchpoint { .. } | DebugEvent::Error(_) => {
                self.resume
            }
            _ => Resume::Continue,
        }
    }
}

fn counter() -> (ImageBuilder, Func) {
    let mut b = ImageBuilder::new(PROG_V6P_VERSION);
    let one = b.int("one", 1);
    let zero = b.int("zero", 0);
    let n = b.int("n", 0);
    let q = b.int("q", 7);
    let main = b.function("main", &[], &[]);
    b.statement(Op::AddI, n, one, n);
    b.statement(Op::DivI, one, zero, q);
    b.statement(Op::AddI, n, one, n);
    b.statement(Op::Return, n, 0, 0);
    (b, main)
}

#[test]
fn test_breakpoint_without_handler() {
    let (b, main) = counter();
    let mut progs = load(&b);
    progs.set_breakpoint(main.first_statement).unwrap();
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Breakpoint);
    assert_eq!(e.statement(), Some(main.first_statement));
    assert!(progs.set_breakpoint(1000).is_err());
}

#[test]
fn test_handler_continues_past_errors() {
    let (b, main) = counter();
    let mut progs = load(&b);
    progs.set_breakpoint(main.first_statement).unwrap();
    let events = Recorder::install(&mut progs, Resume::Continue);
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(progs.return_value::<i32>().unwrap(), 2);
    assert_eq!(progs.global::<i32>("q").unwrap(), 7);
    assert_eq!(
        *events.lock().unwrap(),
        vec!["subenter", "breakpoint", "error", "subexit"]
    );
    assert!(progs.has_debug_handler());
}

#[test]
fn test_handler_aborts() {
    let (b, main) = counter();
    let mut progs = load(&b);
    progs.set_breakpoint(main.first_statement).unwrap();
    let events = Recorder::install(&mut progs, Resume::Abort);
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Aborted);
    assert!(e.is_fatal());
    assert_eq!(events.lock().unwrap().last().unwrap(), "terminate");
    assert_eq!(progs.depth(), 0);

    progs.clear_breakpoint(main.first_statement).unwrap();
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::DivisionByZero);
    assert!(e.is_fatal());
    assert_eq!(progs.global::<i32>("n").unwrap(), 1);
}

#[test]
fn test_watchpoint() {
    let mut b = ImageBuilder::new(PROG_ID_VERSION);
    let x = b.float("x", 3.0);
    let w = b.float("w", 0.0);
    b.function("main", &[], &[]);
    b.statement(Op::StoreF, x, w, 0);
    b.statement(Op::Return, 0, 0, 0);

    let mut progs = load(&b);
    let ptr = progs.global_ptr("w").unwrap();
    progs.set_watchpoint(Some(ptr)).unwrap();
    let e = progs.call_by_name("main", &[]).unwrap_err();
    assert_eq!(e.code(), ErrorCode::Watchpoint);

    let mut progs = load(&b);
    let ptr = progs.global_ptr("w").unwrap();
    progs.set_watchpoint(Some(ptr)).unwrap();
    let events = Recorder::install(&mut progs, Resume::Continue);
    progs.call_by_name("main", &[]).unwrap();
    assert!(events.lock().unwrap().contains(&"watchpoint".to_string()));
    assert_eq!(
        progs.watchpoint(),
        Some(Watch {
            ptr,
            old: 3f32.to_bits()
        })
    );
}

#[test]
fn test_trace_prints_statements() {
    let (b, _) = counter();
    let capture = Capture::default();
    let mut progs = Progs::new(Config {
        trace: true,
        fault_policy: FaultPolicy::IeeeFixup,
        ..Config::default()
    });
    progs.set_output(Box::new(capture.clone()));
    progs.load(&b.build()).unwrap();
    progs.call_by_name("main", &[]).unwrap();
    let text = capture.text();
    assert_eq!(text.lines().count(), 4);
    assert!(text.contains("add.i"));
    assert!(text.contains("div.i"));
    assert!(text.contains("n(1)"));
}

#[test]
fn test_profile_and_stack_trace() {
    let (b, _) = counter();
    let mut progs = load_with(
        &b,
        Config {
            fault_policy: FaultPolicy::IeeeFixup,
            ..Config::default()
        },
    );
    assert_eq!(progs.stack_trace(), "<NO STACK>\n");
    progs.call_by_name("main", &[]).unwrap();
    progs.call_by_name("main", &[]).unwrap();
    assert_eq!(progs.profile(), vec![("main".to_string(), 8)]);
    progs.clear_profile();
    assert!(progs.profile().is_empty());
    assert_eq!(progs.print_global("n").unwrap(), "n = 4");
}
