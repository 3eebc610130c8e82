//! Progress reporting contract.
//!
//! Reporters take `&self` so concurrent item completions can report
//! without coordination: the step counter only grows, the label is
//! last-writer-wins.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

pub trait ProgressReporter: Send + Sync {
    /// Begin a run with `goal` steps.
    fn start(&self, goal: usize, label: &str);
    /// Replace the step goal once the real amount of work is known.
    fn update_goals(&self, goal: usize);
    /// Complete one step. A silent step advances without relabelling.
    fn finish_step(&self, label: Option<&str>, silent: bool);
    fn close(&self);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn start(&self, _goal: usize, _label: &str) {}
    fn update_goals(&self, _goal: usize) {}
    fn finish_step(&self, _label: Option<&str>, _silent: bool) {}
    fn close(&self) {}
}

/// Point-in-time view of a [`ProgressCounter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub goal: usize,
    pub completed: usize,
    pub label: String,
    pub closed: bool,
}

/// In-memory reporter backed by atomics.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    goal: AtomicUsize,
    completed: AtomicUsize,
    label: Mutex<String>,
    closed: AtomicBool,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn goal(&self) -> usize {
        self.goal.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            goal: self.goal(),
            completed: self.completed(),
            label: self.label.lock().map(|l| l.clone()).unwrap_or_default(),
            closed: self.is_closed(),
        }
    }

    fn set_label(&self, label: &str) {
        if let Ok(mut current) = self.label.lock() {
            *current = label.to_string();
        }
    }
}

impl ProgressReporter for ProgressCounter {
    fn start(&self, goal: usize, label: &str) {
        self.goal.store(goal, Ordering::SeqCst);
        self.closed.store(false, Ordering::SeqCst);
        self.set_label(label);
    }

    fn update_goals(&self, goal: usize) {
        self.goal.store(goal, Ordering::SeqCst);
    }

    fn finish_step(&self, label: Option<&str>, silent: bool) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if !silent {
            if let Some(label) = label {
                self.set_label(label);
            }
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
