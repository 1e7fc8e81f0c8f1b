// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RemoteConfig;
use crate::gate::{Request, RequestGate};
use crate::gdb::{GdbAction, GdbServer};
use crate::machine::{Machine, RemoteIo};
use crate::qmp::QmpServer;

const STATE_DEADLINE: Duration = Duration::from_secs(30);
const SCREENSHOT_DEADLINE: Duration = Duration::from_secs(5);

/// Lifecycle handle for both remote debugging endpoints, owned by the
/// emulator and threaded through its main loop. `poll` is the debug hook
/// called between instruction ticks: it services gated requests at the
/// safe point and runs one GDB poll iteration. When `poll` returns a step
/// or continue action the emulator advances execution and reports back
/// through `execution_stopped`.
pub struct RemoteDebug {
    gdb: Option<GdbServer>,
    qmp: Option<QmpServer>,
    gate: Arc<RequestGate>,
    active: Option<ActiveRequest>,
    running: bool,
}

struct ActiveRequest {
    op: ActiveOp,
    deadline: Instant,
}

enum ActiveOp {
    State,
    Screenshot,
}

impl RemoteDebug {
    pub fn start(config: &RemoteConfig, io: Arc<dyn RemoteIo>) -> io::Result<RemoteDebug> {
        let gate = Arc::new(RequestGate::new());
        let gdb = if config.gdb_enabled {
            Some(GdbServer::start(config.gdb_port)?)
        } else {
            None
        };
        let qmp = if config.qmp_enabled {
            Some(QmpServer::start(config.qmp_port, io, gate.clone())?)
        } else {
            None
        };
        Ok(RemoteDebug {
            gdb,
            qmp,
            gate,
            active: None,
            running: true,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn gdb_addr(&self) -> Option<SocketAddr> {
        self.gdb.as_ref().map(|server| server.local_addr())
    }

    pub fn qmp_addr(&self) -> Option<SocketAddr> {
        self.qmp.as_ref().map(|server| server.local_addr())
    }

    /// One debug-hook iteration on the emulator main thread.
    pub fn poll(&mut self, machine: &mut dyn Machine) -> GdbAction {
        if !self.running {
            return GdbAction::None;
        }
        self.service_requests(machine);
        match self.gdb.as_mut() {
            Some(server) => server.poll(machine),
            None => GdbAction::None,
        }
    }

    /// Forwarded to the GDB session; emits the single stop reply for the
    /// step/continue/halt that just finished.
    pub fn execution_stopped(&mut self, signal: u8) {
        if let Some(server) = self.gdb.as_mut() {
            server.execution_stopped(signal);
        }
    }

    /// Idempotent. Tears down clients and listeners, joins the QMP thread
    /// and abandons any in-flight gated request.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        // Wake any connection thread parked on the gate before joining it.
        if let Some(qmp) = self.qmp.as_mut() {
            qmp.signal_stop();
        }
        self.gate.shutdown();
        if let Some(mut qmp) = self.qmp.take() {
            qmp.stop();
        }
        self.gdb.take();
        self.active = None;
        info!(target: "remote", "debug servers stopped");
    }

    /// Execute gated requests at the safe point. Pause/resume/reset finish
    /// on the spot; save/load and screenshot stay active across ticks until
    /// the facade reports completion or the deadline passes.
    fn service_requests(&mut self, machine: &mut dyn Machine) {
        if let Some(active) = self.active.take() {
            match active.op {
                ActiveOp::State => {
                    if machine.is_state_pending() {
                        if Instant::now() >= active.deadline {
                            warn!(target: "remote", "state operation deadline passed");
                            self.gate
                                .complete(Err("state operation timed out".to_string()));
                        } else {
                            self.active = Some(active);
                        }
                    } else {
                        match machine.state_result() {
                            Ok(()) => self.gate.complete(Ok(None)),
                            Err(error) => self.gate.complete(Err(error)),
                        }
                    }
                }
                ActiveOp::Screenshot => {
                    if machine.is_screenshot_pending() {
                        if Instant::now() >= active.deadline {
                            warn!(target: "remote", "screenshot deadline passed");
                            self.gate.complete(Err("screenshot timed out".to_string()));
                        } else {
                            self.active = Some(active);
                        }
                    } else {
                        match machine.last_screenshot_path() {
                            Some(path) => self.gate.complete(Ok(Some(path))),
                            None => self
                                .gate
                                .complete(Err("no screenshot produced".to_string())),
                        }
                    }
                }
            }
            return;
        }
        if let Some(request) = self.gate.take() {
            match request {
                Request::Save(path) => {
                    machine.request_save(&path);
                    self.active = Some(ActiveRequest {
                        op: ActiveOp::State,
                        deadline: Instant::now() + STATE_DEADLINE,
                    });
                }
                Request::Load(path) => {
                    machine.request_load(&path);
                    self.active = Some(ActiveRequest {
                        op: ActiveOp::State,
                        deadline: Instant::now() + STATE_DEADLINE,
                    });
                }
                Request::Screenshot => {
                    machine.clear_last_screenshot_path();
                    machine.take_screenshot();
                    self.active = Some(ActiveRequest {
                        op: ActiveOp::Screenshot,
                        deadline: Instant::now() + SCREENSHOT_DEADLINE,
                    });
                }
                Request::Pause => {
                    machine.request_pause();
                    self.gate.complete(Ok(None));
                }
                Request::Resume => {
                    machine.request_resume();
                    self.gate.complete(Ok(None));
                }
                Request::Reset { dos_only } => {
                    machine.request_reset(dos_only);
                    self.gate.complete(Ok(None));
                }
            }
        }
    }
}

impl Drop for RemoteDebug {
    fn drop(&mut self) {
        self.stop();
    }
}
