// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use oxidos_remote::gate::{Request, RequestGate, WaitError};

#[test]
fn submit_take_complete_round_trip() {
    let gate = Arc::new(RequestGate::new());
    assert!(gate.is_idle());
    gate.submit(Request::Pause).unwrap();
    assert!(!gate.is_idle());

    let consumer = {
        let gate = gate.clone();
        thread::spawn(move || {
            loop {
                if let Some(request) = gate.take() {
                    assert_eq!(request, Request::Pause);
                    gate.complete(Ok(None));
                    break;
                }
                thread::sleep(Duration::from_millis(1));
            }
        })
    };
    let result = gate.wait(Duration::from_secs(1));
    consumer.join().unwrap();
    assert_eq!(result, Ok(None));
    assert!(gate.is_idle());
}

#[test]
fn completion_carries_path_and_error() {
    let gate = RequestGate::new();
    gate.submit(Request::Screenshot).unwrap();
    assert_eq!(gate.take(), Some(Request::Screenshot));
    gate.complete(Ok(Some(PathBuf::from("/tmp/shot.png"))));
    assert_eq!(
        gate.wait(Duration::from_millis(100)),
        Ok(Some(PathBuf::from("/tmp/shot.png")))
    );

    gate.submit(Request::Save(PathBuf::from("/tmp/state"))).unwrap();
    assert!(gate.take().is_some());
    gate.complete(Err("disk full".to_string()));
    assert_eq!(
        gate.wait(Duration::from_millis(100)),
        Err(WaitError::Failed("disk full".to_string()))
    );
}

#[test]
fn second_submit_while_pending_is_rejected() {
    let gate = RequestGate::new();
    gate.submit(Request::Pause).unwrap();
    assert!(gate.submit(Request::Resume).is_err());
    // The pending request is untouched by the rejected submit.
    assert_eq!(gate.take(), Some(Request::Pause));
}

#[test]
fn take_on_idle_gate_returns_nothing() {
    let gate = RequestGate::new();
    assert_eq!(gate.take(), None);
    // Claiming twice yields the request only once.
    gate.submit(Request::Resume).unwrap();
    assert_eq!(gate.take(), Some(Request::Resume));
    assert_eq!(gate.take(), None);
}

#[test]
fn wait_times_out_when_nothing_completes() {
    let gate = RequestGate::new();
    gate.submit(Request::Pause).unwrap();
    assert_eq!(
        gate.wait(Duration::from_millis(50)),
        Err(WaitError::TimedOut)
    );
}

#[test]
fn stale_completion_is_reclaimed_by_next_submit() {
    let gate = RequestGate::new();
    gate.submit(Request::Reset { dos_only: false }).unwrap();
    assert!(gate.take().is_some());
    // Producer timed out and went away; the consumer still completes.
    gate.complete(Ok(None));
    // A fresh submit reclaims the abandoned slot.
    gate.submit(Request::Pause).unwrap();
    assert_eq!(gate.take(), Some(Request::Pause));
}

#[test]
fn shutdown_forces_idle_and_wakes_waiters() {
    let gate = Arc::new(RequestGate::new());
    gate.submit(Request::Pause).unwrap();
    let waiter = {
        let gate = gate.clone();
        thread::spawn(move || gate.wait(Duration::from_secs(5)))
    };
    thread::sleep(Duration::from_millis(20));
    gate.shutdown();
    assert_eq!(waiter.join().unwrap(), Err(WaitError::TimedOut));
    assert!(gate.is_idle());
}
