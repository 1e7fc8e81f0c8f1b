// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use oxidos_remote::machine::{reg, Key, Machine, MouseButton, RemoteIo};

/// Flags visible to both the fake machine and the fake io surface.
pub struct SharedState {
    pub paused: AtomicBool,
}

impl SharedState {
    pub fn new() -> Arc<SharedState> {
        Arc::new(SharedState {
            paused: AtomicBool::new(false),
        })
    }
}

pub struct TestMachine {
    pub regs: [u32; reg::COUNT],
    pub mem: Vec<u8>,
    pub breakpoints: HashSet<u32>,
    pub interactive_debugger: bool,
    pub shared: Arc<SharedState>,
    // Screenshot plumbing
    pub screenshot_target: Option<PathBuf>,
    pub screenshot_path: Option<PathBuf>,
    pub screenshots: u32,
    // Save/load plumbing
    pub saved_to: Option<PathBuf>,
    pub loaded_from: Option<PathBuf>,
    pub state_error: Option<String>,
    pub resets: Vec<bool>,
}

impl TestMachine {
    pub fn new() -> TestMachine {
        TestMachine::with_shared(SharedState::new())
    }

    pub fn with_shared(shared: Arc<SharedState>) -> TestMachine {
        TestMachine {
            regs: [0; reg::COUNT],
            mem: vec![0; 1 << 20],
            breakpoints: HashSet::new(),
            interactive_debugger: false,
            shared,
            screenshot_target: None,
            screenshot_path: None,
            screenshots: 0,
            saved_to: None,
            loaded_from: None,
            state_error: None,
            resets: Vec::new(),
        }
    }
}

impl Machine for TestMachine {
    fn get_register(&self, index: usize) -> u32 {
        self.regs[index]
    }

    fn set_register(&mut self, index: usize, value: u32) {
        self.regs[index] = value;
    }

    fn read_byte(&self, addr: u32) -> u8 {
        self.mem.get(addr as usize).copied().unwrap_or(0)
    }

    fn write_byte(&mut self, addr: u32, value: u8) {
        if let Some(slot) = self.mem.get_mut(addr as usize) {
            *slot = value;
        }
    }

    fn set_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.insert(addr);
        true
    }

    fn remove_breakpoint(&mut self, addr: u32) -> bool {
        self.breakpoints.remove(&addr);
        true
    }

    fn is_interactive_debugger_active(&self) -> bool {
        self.interactive_debugger
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }

    fn request_pause(&mut self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    fn request_resume(&mut self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    fn request_reset(&mut self, dos_only: bool) {
        self.resets.push(dos_only);
    }

    fn take_screenshot(&mut self) {
        self.screenshots += 1;
        self.screenshot_path = self.screenshot_target.clone();
    }

    fn is_screenshot_pending(&self) -> bool {
        false
    }

    fn last_screenshot_path(&self) -> Option<PathBuf> {
        self.screenshot_path.clone()
    }

    fn clear_last_screenshot_path(&mut self) {
        self.screenshot_path = None;
    }

    fn request_save(&mut self, path: &Path) {
        self.saved_to = Some(path.to_path_buf());
        if self.state_error.is_none() {
            let _ = fs::write(path, b"OXIDOS-STATE");
        }
    }

    fn request_load(&mut self, path: &Path) {
        self.loaded_from = Some(path.to_path_buf());
    }

    fn is_state_pending(&self) -> bool {
        false
    }

    fn state_result(&mut self) -> Result<(), String> {
        match &self.state_error {
            None => Ok(()),
            Some(error) => Err(error.clone()),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IoEvent {
    Key(Key, bool),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    CursorMove { dx: f32, dy: f32, relative: bool },
}

pub struct TestIo {
    pub events: Mutex<Vec<(IoEvent, Instant)>>,
    pub memory: Mutex<Vec<u8>>,
    pub dump_calls: AtomicU32,
    pub shared: Arc<SharedState>,
}

impl TestIo {
    pub fn new(shared: Arc<SharedState>) -> TestIo {
        TestIo {
            events: Mutex::new(Vec::new()),
            memory: Mutex::new(vec![0; 1 << 20]),
            dump_calls: AtomicU32::new(0),
            shared,
        }
    }

    pub fn events(&self) -> Vec<IoEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(event, _)| event.clone())
            .collect()
    }

    pub fn timed_events(&self) -> Vec<(IoEvent, Instant)> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: IoEvent) {
        self.events.lock().unwrap().push((event, Instant::now()));
    }
}

impl RemoteIo for TestIo {
    fn add_key(&self, key: Key, down: bool) {
        self.record(IoEvent::Key(key, down));
    }

    fn button_pressed(&self, button: MouseButton) {
        self.record(IoEvent::ButtonDown(button));
    }

    fn button_released(&self, button: MouseButton) {
        self.record(IoEvent::ButtonUp(button));
    }

    fn cursor_moved(&self, dx: f32, dy: f32, relative: bool) {
        self.record(IoEvent::CursorMove { dx, dy, relative });
    }

    fn save_memory_bin(&self, path: &Path, addr: u32, size: u32) -> bool {
        self.dump_calls.fetch_add(1, Ordering::SeqCst);
        let memory = self.memory.lock().unwrap();
        let start = addr as usize;
        let end = start + size as usize;
        if end > memory.len() {
            return false;
        }
        fs::write(path, &memory[start..end]).is_ok()
    }

    fn is_paused(&self) -> bool {
        self.shared.paused.load(Ordering::SeqCst)
    }
}
