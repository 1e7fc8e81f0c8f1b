// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::PathBuf;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Heavy operation handed from a server thread to the emulator main thread.
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Save(PathBuf),
    Load(PathBuf),
    Screenshot,
    Pause,
    Resume,
    Reset { dos_only: bool },
}

#[derive(Clone, Debug, PartialEq)]
pub enum WaitError {
    TimedOut,
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Status {
    Idle,
    Pending,
    Complete,
}

struct Slot {
    status: Status,
    request: Option<Request>,
    error: String,
    path: Option<PathBuf>,
}

/// Single-slot rendezvous between a server thread (producer) and the
/// emulator main thread (consumer). At most one request is in flight; the
/// consumer picks it up at a safe point via `take` and reports through
/// `complete`. A producer that gives up waiting leaves the slot behind; the
/// completed leftover is reclaimed by the next `submit`.
pub struct RequestGate {
    slot: Mutex<Slot>,
    done: Condvar,
}

impl RequestGate {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                status: Status::Idle,
                request: None,
                error: String::new(),
                path: None,
            }),
            done: Condvar::new(),
        }
    }

    /// Producer side. Fails when another request is still pending.
    pub fn submit(&self, request: Request) -> Result<(), String> {
        let mut slot = self.slot.lock().unwrap();
        match slot.status {
            Status::Pending => Err("another request is in progress".to_string()),
            Status::Idle | Status::Complete => {
                slot.status = Status::Pending;
                slot.request = Some(request);
                slot.error.clear();
                slot.path = None;
                Ok(())
            }
        }
    }

    /// Producer side. Blocks until the consumer completes the request or
    /// the timeout elapses. On completion the slot returns to idle; on
    /// timeout it is left for the consumer to finish and gets reclaimed by
    /// the next submit.
    pub fn wait(&self, timeout: Duration) -> Result<Option<PathBuf>, WaitError> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.slot.lock().unwrap();
        loop {
            match slot.status {
                Status::Complete => break,
                // Shutdown raced us; nothing will complete this request.
                Status::Idle => return Err(WaitError::TimedOut),
                Status::Pending => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(WaitError::TimedOut);
            }
            let (guard, _) = self.done.wait_timeout(slot, deadline - now).unwrap();
            slot = guard;
        }
        slot.status = Status::Idle;
        let path = slot.path.take();
        if slot.error.is_empty() {
            Ok(path)
        } else {
            Err(WaitError::Failed(slot.error.clone()))
        }
    }

    /// Consumer side. Claims the pending request, if any. The slot stays
    /// pending until `complete` is called.
    pub fn take(&self) -> Option<Request> {
        let mut slot = self.slot.lock().unwrap();
        if slot.status == Status::Pending {
            slot.request.take()
        } else {
            None
        }
    }

    /// Consumer side. Finishes the claimed request and wakes the producer.
    pub fn complete(&self, result: Result<Option<PathBuf>, String>) {
        let mut slot = self.slot.lock().unwrap();
        if slot.status != Status::Pending {
            return;
        }
        slot.status = Status::Complete;
        match result {
            Ok(path) => {
                slot.error.clear();
                slot.path = path;
            }
            Err(error) => {
                slot.error = error;
                slot.path = None;
            }
        }
        self.done.notify_all();
    }

    /// Force the slot back to idle, abandoning any in-flight request. Used
    /// on server shutdown.
    pub fn shutdown(&self) {
        let mut slot = self.slot.lock().unwrap();
        slot.status = Status::Idle;
        slot.request = None;
        slot.error.clear();
        slot.path = None;
        self.done.notify_all();
    }

    pub fn is_idle(&self) -> bool {
        self.slot.lock().unwrap().status == Status::Idle
    }
}
