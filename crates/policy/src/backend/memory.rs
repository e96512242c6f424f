//! Scripted transport for tests.

use super::{Document, Transport};
use reconcile::{Error, Result};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

/// Answers each operation from a queue of scripted responses and records
/// every call.
///
/// A successful response left alone in its queue is repeated; failures
/// are answered once.
#[derive(Default)]
pub struct MemoryTransport {
    responses: RefCell<HashMap<String, VecDeque<Result<Value>>>>,
    calls: RefCell<Vec<(String, Value)>>,
}

impl MemoryTransport {
    pub fn respond(&self, operation: &str, value: Value) {
        self.push(operation, Ok(value));
    }

    pub fn fail(&self, operation: &str, err: Error) {
        self.push(operation, Err(err));
    }

    fn push(&self, operation: &str, response: Result<Value>) {
        self.responses
            .borrow_mut()
            .entry(operation.to_string())
            .or_default()
            .push_back(response);
    }

    /// Variables of every call to `operation`, in order.
    pub fn calls_to(&self, operation: &str) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == operation)
            .map(|(_, variables)| variables.clone())
            .collect()
    }

    pub fn count(&self, operation: &str) -> usize {
        self.calls.borrow().iter().filter(|(name, _)| name == operation).count()
    }

    /// Operation names of every call, in order.
    pub fn operations(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn total(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl Transport for MemoryTransport {
    fn execute(&self, document: &Document, variables: Value) -> Result<Value> {
        self.calls
            .borrow_mut()
            .push((document.operation.to_string(), variables));

        let mut responses = self.responses.borrow_mut();
        let queue = responses.get_mut(document.operation);
        match queue {
            Some(queue) if queue.len() == 1 && matches!(queue.front(), Some(Ok(_))) => {
                Ok(queue.front().and_then(|r| r.as_ref().ok()).cloned().unwrap_or_default())
            }
            Some(queue) if !queue.is_empty() => queue.pop_front().unwrap_or(Ok(Value::Null)),
            _ => Err(Error::Protocol(format!("no scripted response for {}", document.operation))),
        }
    }
}
