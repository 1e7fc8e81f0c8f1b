// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

// SPEC: https://www.qemu.org/docs/master/interop/qemu-qmp-ref.html (QKeyCode)

use crate::machine::Key;

/// Map a QEMU QKeyCode name to the emulator's key enum. Unknown names map
/// to `None` and are skipped at the send site.
pub fn qcode_to_key(qcode: &str) -> Option<Key> {
    let key = match qcode {
        // Numbers
        "1" => Key::Num1,
        "2" => Key::Num2,
        "3" => Key::Num3,
        "4" => Key::Num4,
        "5" => Key::Num5,
        "6" => Key::Num6,
        "7" => Key::Num7,
        "8" => Key::Num8,
        "9" => Key::Num9,
        "0" => Key::Num0,
        // Letters (QEMU uses lowercase)
        "a" => Key::A,
        "b" => Key::B,
        "c" => Key::C,
        "d" => Key::D,
        "e" => Key::E,
        "f" => Key::F,
        "g" => Key::G,
        "h" => Key::H,
        "i" => Key::I,
        "j" => Key::J,
        "k" => Key::K,
        "l" => Key::L,
        "m" => Key::M,
        "n" => Key::N,
        "o" => Key::O,
        "p" => Key::P,
        "q" => Key::Q,
        "r" => Key::R,
        "s" => Key::S,
        "t" => Key::T,
        "u" => Key::U,
        "v" => Key::V,
        "w" => Key::W,
        "x" => Key::X,
        "y" => Key::Y,
        "z" => Key::Z,
        // Function keys
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        "f13" => Key::F13,
        "f14" => Key::F14,
        "f15" => Key::F15,
        "f16" => Key::F16,
        "f17" => Key::F17,
        "f18" => Key::F18,
        "f19" => Key::F19,
        "f20" => Key::F20,
        "f21" => Key::F21,
        "f22" => Key::F22,
        "f23" => Key::F23,
        "f24" => Key::F24,
        // Modifiers
        "shift" => Key::LeftShift,
        "shift_r" => Key::RightShift,
        "ctrl" => Key::LeftCtrl,
        "ctrl_r" => Key::RightCtrl,
        "alt" => Key::LeftAlt,
        "alt_r" => Key::RightAlt,
        "meta_l" => Key::LeftMeta,
        "meta_r" => Key::RightMeta,
        "menu" => Key::Menu,
        // Special keys
        "esc" => Key::Esc,
        "tab" => Key::Tab,
        "backspace" => Key::Backspace,
        "ret" => Key::Enter,
        "spc" => Key::Space,
        "caps_lock" => Key::CapsLock,
        "num_lock" => Key::NumLock,
        "scroll_lock" => Key::ScrollLock,
        // Punctuation and symbols
        "grave_accent" => Key::Grave,
        "minus" => Key::Minus,
        "equal" => Key::Equals,
        "backslash" => Key::Backslash,
        "bracket_left" => Key::LeftBracket,
        "bracket_right" => Key::RightBracket,
        "semicolon" => Key::Semicolon,
        "apostrophe" => Key::Apostrophe,
        "comma" => Key::Comma,
        "dot" => Key::Period,
        "slash" => Key::Slash,
        "less" => Key::ExtraLtGt,
        // Navigation
        "insert" => Key::Insert,
        "delete" => Key::Delete,
        "home" => Key::Home,
        "end" => Key::End,
        "pgup" => Key::PageUp,
        "pgdn" => Key::PageDown,
        "left" => Key::Left,
        "right" => Key::Right,
        "up" => Key::Up,
        "down" => Key::Down,
        // Keypad
        "kp_0" => Key::Kp0,
        "kp_1" => Key::Kp1,
        "kp_2" => Key::Kp2,
        "kp_3" => Key::Kp3,
        "kp_4" => Key::Kp4,
        "kp_5" => Key::Kp5,
        "kp_6" => Key::Kp6,
        "kp_7" => Key::Kp7,
        "kp_8" => Key::Kp8,
        "kp_9" => Key::Kp9,
        "kp_divide" => Key::KpDivide,
        "kp_multiply" => Key::KpMultiply,
        "kp_subtract" => Key::KpMinus,
        "kp_add" => Key::KpPlus,
        "kp_enter" => Key::KpEnter,
        "kp_decimal" => Key::KpPeriod,
        "kp_equals" => Key::KpEquals,
        "kp_comma" => Key::KpComma,
        // System keys
        "print" => Key::PrintScreen,
        "sysrq" => Key::PrintScreen,
        "pause" => Key::Pause,
        // Japanese keys
        "henkan" => Key::Henkan,
        "muhenkan" => Key::Muhenkan,
        "hiragana" => Key::Hiragana,
        "yen" => Key::Yen,
        "ro" => Key::Ro,
        _ => return None,
    };
    Some(key)
}
