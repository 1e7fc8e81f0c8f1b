// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

//! Remote debugging servers for the oxidos emulator.
//!
//! Two independent TCP endpoints: a GDB Remote Serial Protocol stub for
//! register/memory access, breakpoints and execution control, and a QEMU
//! Monitor Protocol endpoint for input injection and control operations
//! (screenshot, memory dump, save/load state, pause/resume, reset). The
//! emulator proper is reached through the narrow traits in [`machine`];
//! `RemoteDebug` is the lifecycle handle the emulator threads through its
//! main loop.

#[macro_use]
extern crate log;

pub mod config;
pub mod gate;
pub mod gdb;
pub mod machine;
pub mod qmp;

mod net;
mod remote;

pub use crate::config::RemoteConfig;
pub use crate::gate::{Request, RequestGate, WaitError};
pub use crate::gdb::{GdbAction, GdbServer};
pub use crate::machine::{Key, Machine, MouseButton, RemoteIo};
pub use crate::qmp::QmpServer;
pub use crate::remote::RemoteDebug;
