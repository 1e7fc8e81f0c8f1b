// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::path::{Path, PathBuf};

/// Register indices in GDB wire order for 32-bit x86.
pub mod reg {
    pub const EAX: usize = 0;
    pub const ECX: usize = 1;
    pub const EDX: usize = 2;
    pub const EBX: usize = 3;
    pub const ESP: usize = 4;
    pub const EBP: usize = 5;
    pub const ESI: usize = 6;
    pub const EDI: usize = 7;
    pub const EIP: usize = 8;
    pub const EFLAGS: usize = 9;
    pub const CS: usize = 10;
    pub const SS: usize = 11;
    pub const DS: usize = 12;
    pub const ES: usize = 13;
    pub const FS: usize = 14;
    pub const GS: usize = 15;
    pub const COUNT: usize = 16;
}

/// Emulator surface used on the emulator main thread only: by the GDB
/// session while the CPU is stopped, and by the poll loop when it services
/// gated requests at a safe point. Addresses are linear physical; real-mode
/// callers compute `(segment << 4) + offset`.
pub trait Machine {
    fn get_register(&self, index: usize) -> u32;
    fn set_register(&mut self, index: usize, value: u32);

    fn read_byte(&self, addr: u32) -> u8;
    fn write_byte(&mut self, addr: u32, value: u8);

    fn set_breakpoint(&mut self, addr: u32) -> bool;
    fn remove_breakpoint(&mut self, addr: u32) -> bool;

    fn is_interactive_debugger_active(&self) -> bool;

    fn is_paused(&self) -> bool;
    fn request_pause(&mut self);
    fn request_resume(&mut self);
    fn request_reset(&mut self, dos_only: bool);

    fn take_screenshot(&mut self);
    fn is_screenshot_pending(&self) -> bool;
    fn last_screenshot_path(&self) -> Option<PathBuf>;
    fn clear_last_screenshot_path(&mut self);

    fn request_save(&mut self, path: &Path);
    fn request_load(&mut self, path: &Path);
    fn is_state_pending(&self) -> bool;
    /// Outcome of the last save/load request. Valid once `is_state_pending`
    /// returns false.
    fn state_result(&mut self) -> Result<(), String>;
}

/// Emulator entry points that are safe to call from the QMP thread. The
/// keyboard queue and mouse accumulator synchronize internally;
/// `save_memory_bin` and `is_paused` are likewise safe from any thread.
pub trait RemoteIo: Send + Sync {
    fn add_key(&self, key: Key, down: bool);
    fn button_pressed(&self, button: MouseButton);
    fn button_released(&self, button: MouseButton);
    fn cursor_moved(&self, dx: f32, dy: f32, relative: bool);
    fn save_memory_bin(&self, path: &Path, addr: u32, size: u32) -> bool;
    fn is_paused(&self) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Keyboard keys understood by the emulator's keyboard queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    // Alpha
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,
    // Numerical
    Num0,
    Num1,
    Num2,
    Num3,
    Num4,
    Num5,
    Num6,
    Num7,
    Num8,
    Num9,
    // Function
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
    // Modifiers
    LeftShift,
    RightShift,
    LeftCtrl,
    RightCtrl,
    LeftAlt,
    RightAlt,
    LeftMeta,
    RightMeta,
    Menu,
    // Control
    Esc,
    Tab,
    Backspace,
    Enter,
    Space,
    CapsLock,
    NumLock,
    ScrollLock,
    // Punctuation
    Grave,
    Minus,
    Equals,
    Backslash,
    LeftBracket,
    RightBracket,
    Semicolon,
    Apostrophe,
    Comma,
    Period,
    Slash,
    ExtraLtGt,
    // Navigation
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Left,
    Right,
    Up,
    Down,
    // Keypad
    Kp0,
    Kp1,
    Kp2,
    Kp3,
    Kp4,
    Kp5,
    Kp6,
    Kp7,
    Kp8,
    Kp9,
    KpDivide,
    KpMultiply,
    KpMinus,
    KpPlus,
    KpEnter,
    KpPeriod,
    KpEquals,
    KpComma,
    // System
    PrintScreen,
    Pause,
    // Japanese
    Henkan,
    Muhenkan,
    Hiragana,
    Yen,
    Ro,
}
