//! End-to-end tests: controller, worker thread and a small engine written
//! in WAT.
//!
//! The stand-in engine upper-cases its input (dropping a leading quote for
//! `readAndEval`), which is enough to mimic the reader for symbols. Input
//! starting with `?` makes it ask for another line before evaluating, and
//! input starting with `!` traps.

use ichigo_runtime::{
    Admission, Expectation, HostController, ReadCapability, RuntimeConfig, RuntimeError,
    SuiteReport, Suite, Terminal, TestCase, WorkerBridge, WorkerEvent,
};
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedReceiver;

const ENGINE: &str = r#"
(module
  (import "js" "memory" (memory 1))
  (import "js" "table" (table 1 funcref))
  (import "console" "log" (func $log (param i32)))
  (import "io" "outputString" (func $out (param i32)))
  (import "io" "read" (func $read))

  (global $debug (mut i32) (i32.const 0))

  (func $upcase (param $src i32) (param $dst i32)
    (local $c i32)
    (block $done
      (loop $next
        (local.set $c (i32.load8_u (local.get $src)))
        (br_if $done (i32.eqz (local.get $c)))
        (if (i32.and (i32.ge_u (local.get $c) (i32.const 97))
                     (i32.le_u (local.get $c) (i32.const 122)))
          (then (local.set $c (i32.sub (local.get $c) (i32.const 32)))))
        (i32.store8 (local.get $dst) (local.get $c))
        (local.set $src (i32.add (local.get $src) (i32.const 1)))
        (local.set $dst (i32.add (local.get $dst) (i32.const 1)))
        (br $next)))
    (i32.store8 (local.get $dst) (i32.const 0)))

  (func $eval (param $strip_quote i32)
    (local $src i32)
    (local.set $src (i32.const 51200))
    (if (i32.eq (i32.load8_u (local.get $src)) (i32.const 33))
      (then unreachable))
    (if (i32.eq (i32.load8_u (local.get $src)) (i32.const 63))
      (then
        (call $read)
        (local.set $src (i32.add (local.get $src) (i32.const 1)))))
    (if (i32.and (local.get $strip_quote)
                 (i32.eq (i32.load8_u (local.get $src)) (i32.const 39)))
      (then (local.set $src (i32.add (local.get $src) (i32.const 1)))))
    (call $upcase (local.get $src) (i32.const 60000))
    (call $out (i32.const 60000)))

  (func (export "init"))
  (func (export "readAndEval") (call $eval (i32.const 1)))
  (func (export "readAndEvalquote") (call $eval (i32.const 0)))
  (func (export "readAndEvalAll")
    (call $out (i32.const 51200))
    (call $eval (i32.const 1)))
  (func (export "setDebugLevel") (param i32)
    (global.set $debug (local.get 0))
    (call $log (local.get 0))))
"#;

/// An engine that loads a side module on `load` and, on any other input,
/// calls whatever that module put in table slot 0.
///
/// The side module imports `js.memory` and `js.table`, fills slot 0 with a
/// function that writes "OK" at 3000 and returns that address.
const LOADER: &str = r#"
(module
  (import "js" "memory" (memory 1))
  (import "js" "table" (table 1 funcref))
  (import "io" "outputString" (func $out (param i32)))
  (import "io" "loadWasm" (func $load (param i32 i32)))

  (type $thunk (func (result i32)))

  (data (i32.const 1024) "\00\61\73\6d\01\00\00\00\01\05\01\60\00\01\7f\02\1b\02\02\6a\73\06\6d\65\6d\6f\72\79\02\00\01\02\6a\73\05\74\61\62\6c\65\01\70\00\01\03\02\01\00\09\07\01\00\41\00\0b\01\00\0a\11\01\0f\00\41\b8\17\41\cf\96\01\36\02\00\41\b8\17\0b")
  (data (i32.const 1200) "NIL\00")

  (func (export "init"))
  (func (export "readAndEval")
    (if (i32.eq (i32.load8_u (i32.const 51200)) (i32.const 108))
      (then
        (call $load (i32.const 1024) (i32.const 76))
        (call $out (i32.const 1200)))
      (else
        (call $out (call_indirect (type $thunk) (i32.const 0))))))
  (func (export "readAndEvalquote"))
  (func (export "readAndEvalAll"))
  (func (export "setDebugLevel") (param i32)))
"#;

#[derive(Default)]
struct Screen {
    text: String,
    lines: Vec<String>,
    reports: Vec<SuiteReport>,
}

impl Terminal for Screen {
    fn write(&mut self, text: &str) {
        self.text.push_str(text);
    }

    fn end_request(&mut self) {
        self.text.push_str("\n> ");
    }

    fn report(&mut self, report: &SuiteReport) {
        self.reports.push(*report);
    }

    fn read_line(&mut self) -> Option<String> {
        self.lines.pop()
    }
}

fn spawn(config: RuntimeConfig) -> (WorkerBridge, UnboundedReceiver<WorkerEvent>) {
    spawn_engine(ENGINE, config)
}

fn spawn_engine(
    engine: &str,
    config: RuntimeConfig,
) -> (WorkerBridge, UnboundedReceiver<WorkerEvent>) {
    let (bridge, mut events) = WorkerBridge::spawn(config, engine.as_bytes().to_vec()).unwrap();
    assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Init)));
    (bridge, events)
}

fn drive(controller: &mut HostController<Screen>, events: &mut UnboundedReceiver<WorkerEvent>) {
    while controller.is_locked() {
        let event = events.blocking_recv().expect("worker hung up");
        controller.handle_event(event).unwrap();
    }
}

/// Next reply, skipping streamed output.
fn next_reply(events: &mut UnboundedReceiver<WorkerEvent>) -> WorkerEvent {
    loop {
        match events.blocking_recv().expect("worker hung up") {
            WorkerEvent::Print(_) => continue,
            event => return event,
        }
    }
}

#[test]
fn reply_echoes_sender() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let sender = json!(["eval", {"nested": [1, 2, 3]}]);
    bridge
        .post(json!([sender.clone(), "eval", "'very-long-name"]))
        .unwrap();

    match events.blocking_recv() {
        Some(WorkerEvent::Print(text)) => assert_eq!(text, "VERY-LONG-NAME"),
        other => panic!("expected print, got {:?}", other),
    }
    match next_reply(&mut events) {
        WorkerEvent::Eval { sender: echoed, text } => {
            assert_eq!(echoed, sender);
            assert_eq!(text, "VERY-LONG-NAME");
        }
        other => panic!("expected eval reply, got {:?}", other),
    }
    bridge.shutdown().unwrap();
}

#[test]
fn evalquote_and_evalall_reply_as_eval() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());

    bridge.post(json!(["q", "evalquote", "'a"])).unwrap();
    match next_reply(&mut events) {
        WorkerEvent::Eval { sender, text } => {
            assert_eq!(sender, "q");
            assert_eq!(text, "'A");
        }
        other => panic!("unexpected {:?}", other),
    }

    bridge.post(json!(["all", "evalall", "'b"])).unwrap();
    assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Print(t)) if t == "'b"));
    assert!(matches!(events.blocking_recv(), Some(WorkerEvent::Print(t)) if t == "B"));
    match events.blocking_recv() {
        Some(WorkerEvent::Eval { sender, text }) => {
            assert_eq!(sender, "all");
            assert_eq!(text, "B");
        }
        other => panic!("unexpected {:?}", other),
    }
    bridge.shutdown().unwrap();
}

#[test]
fn debug_level_is_acknowledged() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    bridge.post(json!([["debug_level", 3], "debug_level", 3])).unwrap();
    match events.blocking_recv() {
        Some(WorkerEvent::DebugLevel { sender }) => assert_eq!(sender, json!(["debug_level", 3])),
        other => panic!("unexpected {:?}", other),
    }
    bridge.shutdown().unwrap();
}

#[test]
fn malformed_frames_get_no_reply() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    for frame in [
        json!([]),
        json!(["lonely"]),
        json!("eval"),
        json!(["s", "launch", "x"]),
        json!(["s", "debug_level", "high"]),
    ] {
        bridge.post(frame).unwrap();
    }
    bridge.post(json!(["ok", "eval", "'a"])).unwrap();

    match next_reply(&mut events) {
        WorkerEvent::Eval { sender, .. } => assert_eq!(sender, Value::from("ok")),
        other => panic!("unexpected {:?}", other),
    }
    bridge.shutdown().unwrap();
}

#[test]
fn controller_renders_streamed_output() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    assert_eq!(controller.submit("'a").unwrap(), Admission::Dispatched);
    assert_eq!(controller.submit("'b").unwrap(), Admission::Rejected);
    drive(&mut controller, &mut events);

    assert_eq!(controller.terminal().text, "'a\nA\n> ");
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn inspection_is_independent_of_history() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    for input in ["'a", "'something-much-longer", "'a", "'b", "'a"] {
        controller.submit(input).unwrap();
        drive(&mut controller, &mut events);
    }

    let results: Vec<&str> = controller
        .terminal()
        .text
        .split("\n> ")
        .filter_map(|chunk| chunk.split_once('\n').map(|(_, out)| out))
        .collect();
    assert_eq!(results, ["A", "SOMETHING-MUCH-LONGER", "A", "B", "A"]);
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn suite_run_tallies_exact_and_pattern_matches() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    let suite: Suite = vec![
        TestCase::new("'a", "A"),
        TestCase::new("'very-long-name", "VERY-LONG-NAME"),
        TestCase {
            input: "'x".into(),
            expected: Expectation::pattern("^[A-Z]$").unwrap(),
        },
        TestCase::new("'b", "b"),
    ]
    .into_iter()
    .collect();

    assert_eq!(controller.run_suite(suite).unwrap(), Admission::Dispatched);
    drive(&mut controller, &mut events);

    assert_eq!(
        controller.terminal().reports,
        vec![SuiteReport {
            passed: 3,
            failed: 1
        }]
    );
    assert_eq!(controller.terminal().text.matches(";; OK").count(), 3);
    assert!(controller
        .terminal()
        .text
        .contains(";; Expected: b\n;; Actual: B"));
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn blocking_read_extends_pending_input() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let mut screen = Screen::default();
    screen.lines.push(" 2)".into());
    let mut controller = HostController::new(bridge.sender(), screen);

    controller.submit("?(cons 1").unwrap();
    drive(&mut controller, &mut events);

    assert!(controller.terminal().text.contains("(CONS 1 2)"));
    assert!(controller.terminal().lines.is_empty());
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn parked_read_resumes_when_answered() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    controller.submit("?(list").unwrap();
    loop {
        let event = events.blocking_recv().unwrap();
        let is_read = matches!(event, WorkerEvent::Read(_));
        controller.handle_event(event).unwrap();
        if is_read {
            break;
        }
    }
    assert_eq!(controller.parked_reads(), 1);
    assert!(controller.is_locked());

    assert!(controller.answer_parked(" 1)"));
    drive(&mut controller, &mut events);
    assert!(controller.terminal().text.contains("(LIST 1)"));
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn degraded_read_uses_buffered_input() {
    let config = RuntimeConfig::default().with_read_capability(ReadCapability::Unavailable);
    let (bridge, mut events) = spawn(config);
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    controller.submit("?(list 1)").unwrap();
    while controller.is_locked() {
        let event = events.blocking_recv().unwrap();
        assert!(!matches!(event, WorkerEvent::Read(_)));
        controller.handle_event(event).unwrap();
    }

    assert!(controller.terminal().text.contains("(LIST 1)"));
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn trapped_request_gets_no_reply_and_worker_survives() {
    let (bridge, mut events) = spawn(RuntimeConfig::default());
    bridge.post(json!(["bad", "eval", "!boom"])).unwrap();
    bridge.post(json!(["ok", "eval", "'a"])).unwrap();

    match next_reply(&mut events) {
        WorkerEvent::Eval { sender, text } => {
            assert_eq!(sender, "ok");
            assert_eq!(text, "A");
        }
        other => panic!("unexpected {:?}", other),
    }
    bridge.shutdown().unwrap();
}

#[test]
fn loaded_module_shares_table_and_memory() {
    let (bridge, mut events) = spawn_engine(LOADER, RuntimeConfig::default());
    let mut controller = HostController::new(bridge.sender(), Screen::default());

    let suite: Suite = vec![TestCase::new("load", "NIL"), TestCase::new("call", "OK")]
        .into_iter()
        .collect();
    controller.run_suite(suite).unwrap();
    drive(&mut controller, &mut events);

    assert_eq!(
        controller.terminal().reports,
        vec![SuiteReport {
            passed: 2,
            failed: 0
        }]
    );
    drop(controller);
    bridge.shutdown().unwrap();
}

#[test]
fn load_is_visible_to_a_request_posted_right_behind_it() {
    let (bridge, mut events) = spawn_engine(LOADER, RuntimeConfig::default());
    bridge.post(json!(["first", "eval", "load"])).unwrap();
    bridge.post(json!(["second", "eval", "call"])).unwrap();

    for (expected_sender, expected_text) in [("first", "NIL"), ("second", "OK")] {
        match next_reply(&mut events) {
            WorkerEvent::Eval { sender, text } => {
                assert_eq!(sender, expected_sender);
                assert_eq!(text, expected_text);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
    bridge.shutdown().unwrap();
}

#[test]
fn bad_primary_image_stops_worker() {
    let (bridge, mut events) =
        WorkerBridge::spawn(RuntimeConfig::default(), b"not a module".to_vec()).unwrap();
    assert!(events.blocking_recv().is_none());
    assert!(matches!(
        bridge.shutdown(),
        Err(RuntimeError::Wasm { stage: "compile", .. })
    ));
}
