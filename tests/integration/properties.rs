use std::sync::Arc;
use std::thread;

use proptest::prelude::*;

use distributed_dispatch::builtins::{builtin_accessors, ListDecoder};
use distributed_dispatch::runtime::actor::LocalActor;
use distributed_dispatch::runtime::dispatch::{
    decoder_ref, dispatch, DispatchRequest, DistributedAccessor, ResultBuffer,
};
use distributed_dispatch::runtime::memory::FrameEvent;
use distributed_dispatch::runtime::registry::{
    environment_for, global_registry, resolve, CallableRecord, Registry, RemoteCallTarget,
};
use distributed_dispatch::runtime::task::{Completion, CompletionSlot, Task, TaskId};
use distributed_dispatch::runtime::value::Value;
use distributed_dispatch::util::config::{ArenaConfig, BridgeConfig};
use distributed_dispatch::run_target_in;

#[test]
fn test_global_registry_serves_dispatch() {
    {
        let mut registry = global_registry().write();
        for (name, accessor) in builtin_accessors() {
            let name = format!("global.{}", name);
            let accessor: Arc<dyn DistributedAccessor> = Arc::new(accessor);
            registry.register(CallableRecord::new(name.as_str(), accessor));
        }
    }

    let value = run_target_in(
        global_registry(),
        "global.add",
        "[1, 2]",
        &BridgeConfig::default(),
    )
    .unwrap()
    .value;
    assert_eq!(value, Value::Int(3));
    assert!(environment_for(global_registry(), b"global.echo").is_none());
}

#[test]
fn test_run_report_counts_frames() {
    let report = run_target_in(
        &distributed_dispatch::builtins::builtin_registry(),
        "suspendTwice",
        "[9]",
        &BridgeConfig::default(),
    )
    .unwrap();
    assert_eq!(report.value, Value::Int(9));
    assert_eq!(report.steps, 2);
    // Caller, intermediate and callee frames were live together
    assert_eq!(report.stats.peak_live, 3);
    assert_eq!(report.stats.allocations, 3);
    assert_eq!(report.stats.releases, 3);
}

#[test]
fn test_suspended_chain_resumes_on_another_thread() {
    let mut registry = Registry::new();
    for (name, accessor) in builtin_accessors() {
        let accessor: Arc<dyn DistributedAccessor> = Arc::new(accessor);
        registry.register(CallableRecord::new(name, accessor));
    }

    let mut task = Task::with_config(
        TaskId(3),
        &ArenaConfig {
            trace_events: true,
            ..ArenaConfig::default()
        },
    );
    let caller = task.root_frame(0).unwrap();
    let slot = CompletionSlot::new();
    let result = ResultBuffer::new();
    let request = DispatchRequest::new(
        LocalActor::shared("worker"),
        RemoteCallTarget::new("suspendTwice"),
        decoder_ref(ListDecoder::new(vec![Value::Int(5)])),
        result.clone(),
    );
    dispatch(&mut task, &registry, request, caller, slot.continuation()).unwrap();
    assert_eq!(slot.count(), 0);

    let task = thread::spawn(move || {
        task.run_until_idle().unwrap();
        task
    })
    .join()
    .unwrap();

    let (frame, completion) = slot.single().unwrap();
    assert_eq!(frame, caller);
    assert!(matches!(completion, Completion::Returned));
    assert_eq!(result.get(), Some(Value::Int(5)));
    assert_eq!(task.arena().live(), 1);

    let events = task.arena().events().unwrap();
    let allocated = events
        .iter()
        .filter(|e| matches!(e, FrameEvent::Allocated { .. }))
        .count();
    let released = events
        .iter()
        .filter(|e| matches!(e, FrameEvent::Released { .. }))
        .count();
    assert_eq!((allocated, released), (3, 2));
}

proptest! {
    #[test]
    fn prop_resolution_is_deterministic(
        names in proptest::collection::vec("[a-d]{1,3}", 1..12),
        wanted in "[a-d]{1,3}",
    ) {
        let mut registry = Registry::new();
        let accessors = builtin_accessors();
        for (i, name) in names.iter().enumerate() {
            let (_, accessor) = accessors[i % accessors.len()];
            registry.register(CallableRecord::new(name.as_str(), Arc::new(accessor)));
        }

        let first = resolve(&registry, wanted.as_bytes()).ok();
        let second = resolve(&registry, wanted.as_bytes()).ok();
        match (first, second) {
            (Some(a), Some(b)) => {
                prop_assert!(Arc::ptr_eq(&a, &b));
                let position = names.iter().position(|n| *n == wanted).unwrap();
                prop_assert_eq!(a.frame_size(), accessors[position % accessors.len()].1.frame_size);
            }
            (None, None) => prop_assert!(!names.contains(&wanted)),
            _ => prop_assert!(false, "lookup changed between calls"),
        }
    }
}
