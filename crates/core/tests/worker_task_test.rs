//! Tests for cooperative cancellation of operator list production.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use common::ScriptEvaluator;
use quire_core::oplist::OperatorListAssembler;
use quire_core::{
    Arg, ContentEvaluator, OpCode, OperatorList, Page, RenderError, RenderOptions, Result,
    TaskRegistry, WorkerTask, get_operator_list, render_page,
};

const FILL: OpCode = OpCode(22);

/// Emits one op per step and terminates `task` after `stop_after` steps.
struct CancellingEvaluator {
    task: WorkerTask,
    stop_after: usize,
    steps: usize,
}

impl ContentEvaluator for CancellingEvaluator {
    fn step(&mut self, list: &mut OperatorList) -> Result<bool> {
        list.add_op(FILL, vec![Arg::Int(self.steps as i64)]);
        self.steps += 1;
        if self.steps == self.stop_after {
            self.task.terminate();
        }
        Ok(true)
    }
}

/// Terminates every task of a registry from inside the producer.
struct ShutdownEvaluator {
    registry: TaskRegistry,
    steps: Arc<AtomicUsize>,
}

impl ContentEvaluator for ShutdownEvaluator {
    fn step(&mut self, list: &mut OperatorList) -> Result<bool> {
        let n = self.steps.fetch_add(1, Ordering::SeqCst);
        list.add_op(FILL, Vec::new());
        if n == 1 {
            self.registry.cancel_all();
        }
        Ok(n < 100)
    }
}

struct FailingEvaluator;

impl ContentEvaluator for FailingEvaluator {
    fn step(&mut self, _list: &mut OperatorList) -> Result<bool> {
        Err(RenderError::Evaluator("bad content stream".to_string()))
    }
}

// ============================================================================
// WorkerTask
// ============================================================================

#[test]
fn test_terminated_task_stops_production() {
    let task = WorkerTask::new("GetOperatorList: page 1");
    let mut evaluator = CancellingEvaluator {
        task: task.clone(),
        stop_after: 3,
        steps: 0,
    };
    let mut list = OperatorList::new();

    let err = get_operator_list(&mut evaluator, &mut list, &task).unwrap_err();
    assert!(err.is_terminated());
    assert!(matches!(err, RenderError::Terminated { ref task } if task.contains("page 1")));
    assert_eq!(list.len(), 3);
    assert_eq!(evaluator.steps, 3);
}

#[test]
fn test_exhausted_evaluator_completes() {
    let task = WorkerTask::new("t");
    let mut evaluator = ScriptEvaluator::flat(vec![(FILL, Vec::new()), (FILL, Vec::new())]);
    let mut list = OperatorList::new();
    get_operator_list(&mut evaluator, &mut list, &task).unwrap();
    assert_eq!(list.len(), 2);
    assert!(!task.is_terminated());
}

#[test]
fn test_terminate_from_another_thread() {
    let task = WorkerTask::new("producer");
    let producer = {
        let task = task.clone();
        thread::spawn(move || {
            let mut produced = 0usize;
            while task.ensure_not_terminated().is_ok() {
                produced += 1;
                thread::sleep(Duration::from_millis(1));
            }
            task.finish();
            produced
        })
    };
    thread::sleep(Duration::from_millis(10));
    task.terminate();
    task.wait_finished();
    assert!(producer.join().unwrap() > 0);
    assert!(task.is_finished());
}

// ============================================================================
// TaskRegistry
// ============================================================================

#[test]
fn test_terminate_all_waits_for_every_task() {
    let registry = TaskRegistry::new();
    let finished = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for n in 0..3 {
        let task = registry.start_new(format!("task {n}")).unwrap();
        let registry = registry.clone();
        let finished = Arc::clone(&finished);
        handles.push(thread::spawn(move || {
            while !task.is_terminated() {
                thread::sleep(Duration::from_millis(1));
            }
            thread::sleep(Duration::from_millis(5));
            finished.fetch_add(1, Ordering::SeqCst);
            registry.finish(&task);
        }));
    }

    registry.terminate_all();
    assert_eq!(finished.load(Ordering::SeqCst), 3);
    assert_eq!(registry.active_count(), 0);
    assert!(registry.ensure_not_terminated().is_err());
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn test_terminate_all_with_no_tasks_returns() {
    let registry = TaskRegistry::new();
    registry.terminate_all();
    assert!(registry.is_terminated());
}

#[test]
fn test_tasks_started_during_shutdown_are_terminated_or_refused() {
    for _ in 0..50 {
        let registry = TaskRegistry::new();
        let barrier = Arc::new(std::sync::Barrier::new(9));
        let mut handles = Vec::new();
        for n in 0..8 {
            let registry = registry.clone();
            let barrier = Arc::clone(&barrier);
            handles.push(thread::spawn(move || {
                barrier.wait();
                let task = registry.start_new(format!("task {n}")).ok()?;
                for _ in 0..1000 {
                    if task.is_terminated() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                registry.finish(&task);
                Some(task)
            }));
        }

        barrier.wait();
        registry.terminate_all();
        assert!(registry.start_new("late").is_err());

        for handle in handles {
            if let Some(task) = handle.join().unwrap() {
                assert!(task.is_terminated(), "{} escaped shutdown", task.name());
            }
        }
        assert_eq!(registry.active_count(), 0);
    }
}

// ============================================================================
// render_page
// ============================================================================

#[test]
fn test_render_page_delivers_final_chunk_and_finishes_task() {
    let registry = TaskRegistry::new();
    let assembler = OperatorListAssembler::new();
    let mut page = Page::new(
        0,
        ScriptEvaluator::new(vec![vec![(FILL, Vec::new()); 3], vec![(FILL, Vec::new())]]),
    );

    let total = render_page(&registry, &mut page, assembler.clone(), &RenderOptions::default())
        .unwrap();
    // Content plus the empty annotation scope.
    assert_eq!(total, 6);
    assert!(assembler.is_complete());
    assert_eq!(
        &assembler.snapshot().ops[4..],
        &[OpCode::BEGIN_ANNOTATIONS, OpCode::END_ANNOTATIONS]
    );
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn test_render_page_stops_without_final_chunk_when_terminated() {
    let registry = TaskRegistry::new();
    let steps = Arc::new(AtomicUsize::new(0));
    let assembler = OperatorListAssembler::new();
    let mut page = Page::new(
        4,
        ShutdownEvaluator {
            registry: registry.clone(),
            steps: Arc::clone(&steps),
        },
    );

    let err = render_page(&registry, &mut page, assembler.clone(), &RenderOptions::default())
        .unwrap_err();
    assert!(err.is_terminated());
    assert_eq!(steps.load(Ordering::SeqCst), 2);
    assert!(!assembler.is_complete());
    assert_eq!(assembler.chunk_count(), 0);
    assert_eq!(registry.active_count(), 0);

    // The registry refuses further work.
    let mut next = Page::new(5, ScriptEvaluator::default());
    let err = render_page(&registry, &mut next, assembler, &RenderOptions::default()).unwrap_err();
    assert!(matches!(err, RenderError::DocumentTerminated));
}

#[test]
fn test_render_page_propagates_evaluator_errors() {
    let registry = TaskRegistry::new();
    let assembler = OperatorListAssembler::new();
    let mut page = Page::new(0, FailingEvaluator);
    let err = render_page(&registry, &mut page, assembler.clone(), &RenderOptions::default())
        .unwrap_err();
    assert!(!err.is_terminated());
    assert!(err.to_string().contains("bad content stream"));
    assert!(!assembler.is_complete());
    assert_eq!(registry.active_count(), 0);
}

#[test]
fn test_render_page_rejects_invalid_limits() {
    let registry = TaskRegistry::new();
    let mut options = RenderOptions::default();
    options.limits.min_images = 0;
    let mut page = Page::new(0, ScriptEvaluator::default());
    let err = render_page(&registry, &mut page, OperatorListAssembler::new(), &options)
        .unwrap_err();
    assert!(matches!(err, RenderError::InvalidLimits(_)));
}
