// SPDX-License-Identifier: MIT
//
// Scripted host for engine tests.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};

use n_rpc::{Host, Inbound, RpcError, Value};

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<Inbound, RpcError>>,
    stopped: bool,
}

/// Replays a fixed message queue. Once drained it either reports the
/// stream closed or, with `blocking`, waits for `stop_loop`.
#[derive(Default)]
pub struct FakeHost {
    script: Mutex<Script>,
    wake: Condvar,
    blocking: bool,
    pub calls: Mutex<Vec<(String, Vec<Value>)>>,
    pub responses: Mutex<Vec<(u32, Result<Value, Value>)>>,
    pub stop_loops: Mutex<usize>,
}

impl FakeHost {
    pub fn new(queue: Vec<Result<Inbound, RpcError>>) -> Self {
        Self {
            script: Mutex::new(Script {
                queue: queue.into(),
                stopped: false,
            }),
            ..Self::default()
        }
    }

    pub fn blocking(queue: Vec<Result<Inbound, RpcError>>) -> Self {
        Self {
            blocking: true,
            ..Self::new(queue)
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        lock(&self.calls).clone()
    }
}

/// A `redraw` notification carrying `records`.
pub fn redraw(records: Vec<Value>) -> Inbound {
    Inbound::Notification {
        method: "redraw".into(),
        params: records,
    }
}

/// One redraw record: the subtype name followed by its instances.
pub fn record(name: &str, instances: Vec<Value>) -> Value {
    let mut items = vec![Value::from(name)];
    items.extend(instances);
    Value::Array(items)
}

impl Host for FakeHost {
    fn recv(&self) -> Result<Option<Inbound>, RpcError> {
        let mut script = lock(&self.script);
        loop {
            if script.stopped {
                return Ok(None);
            }
            match script.queue.pop_front() {
                Some(Ok(msg)) => return Ok(Some(msg)),
                Some(Err(e)) => return Err(e),
                None if !self.blocking => return Ok(None),
                None => {
                    script = self
                        .wake
                        .wait(script)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn stop_loop(&self) {
        *lock(&self.stop_loops) += 1;
        lock(&self.script).stopped = true;
        self.wake.notify_all();
    }

    fn async_call(&self, method: &str, args: Vec<Value>) -> Result<(), RpcError> {
        lock(&self.calls).push((method.to_owned(), args));
        Ok(())
    }

    fn respond(&self, id: u32, result: Result<Value, Value>) -> Result<(), RpcError> {
        lock(&self.responses).push((id, result));
        Ok(())
    }

    fn close(&self) {
        self.stop_loop();
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
