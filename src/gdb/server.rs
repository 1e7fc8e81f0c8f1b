// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::collections::HashSet;
use std::io;
use std::io::{Read, Write};
use std::mem;
use std::net::{SocketAddr, TcpListener, TcpStream};

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use crate::machine::{reg, Machine};
use crate::net;

use super::packet::{self, Framer, Token};
use super::{hex_encode, GdbAction};

const SIGTRAP: u8 = 5;

/// GDB Remote Serial Protocol stub. Poll-driven: the emulator main loop
/// calls `poll` between instruction ticks, so the CPU is stopped whenever a
/// frame is processed and register/memory handlers can touch the machine
/// directly. Step and continue are returned as actions; the emulator
/// reports the resulting stop through `execution_stopped`, which emits
/// exactly one stop reply per run.
pub struct GdbServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    client: Option<Client>,
}

impl GdbServer {
    pub fn start(port: u16) -> io::Result<GdbServer> {
        let listener = net::bind_listener(port)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!(target: "gdb", "listening on port {}", local_addr.port());
        Ok(Self {
            listener,
            local_addr,
            client: None,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// One poll-loop iteration: accept, drain the socket, dispatch complete
    /// frames, and hand any requested step/continue back to the emulator.
    pub fn poll(&mut self, machine: &mut dyn Machine) -> GdbAction {
        if self.client.is_none() {
            self.try_accept(&*machine);
            return GdbAction::None;
        }
        let alive = self.client.as_mut().map_or(false, Client::receive);
        if !alive {
            self.teardown();
            return GdbAction::Disconnect;
        }
        let mut dead = false;
        let mut detach = false;
        {
            let client = self.client.as_mut().unwrap();
            while let Some(token) = client.framer.next_token() {
                match token {
                    Token::BadChecksum => {
                        if !client.no_ack_mode {
                            let _ = client.stream.write_all(b"-");
                        }
                    }
                    Token::Interrupt => {
                        if client.run_state == RunState::Running {
                            return GdbAction::Halt;
                        }
                        // Already stopped, just acknowledge.
                        if client.send_stop_reply(SIGTRAP).is_err() {
                            dead = true;
                            break;
                        }
                    }
                    Token::Packet(payload) => {
                        if !client.no_ack_mode {
                            let _ = client.stream.write_all(b"+");
                        }
                        match client.dispatch(&payload, machine) {
                            Ok(true) => {
                                detach = true;
                                break;
                            }
                            Ok(false) => {
                                match mem::replace(&mut client.pending, Pending::None) {
                                    Pending::Step => {
                                        client.run_state = RunState::Running;
                                        return GdbAction::Step;
                                    }
                                    Pending::Continue => {
                                        client.run_state = RunState::Running;
                                        return GdbAction::Continue;
                                    }
                                    Pending::None => {}
                                }
                            }
                            Err(error) => {
                                error!(target: "gdb", "client i/o failed: {}", error);
                                dead = true;
                                break;
                            }
                        }
                    }
                }
            }
        }
        if dead || detach {
            self.teardown();
            return GdbAction::Disconnect;
        }
        GdbAction::None
    }

    /// Called by the emulator when execution stops after a `Step`,
    /// `Continue` or `Halt` action: single-step completion, breakpoint hit
    /// or interrupt. Emits one stop reply per transition out of running.
    pub fn execution_stopped(&mut self, signal: u8) {
        if let Some(client) = self.client.as_mut() {
            if client.run_state == RunState::Running {
                client.run_state = RunState::StoppedPendingReply;
                if client.send_stop_reply(signal).is_ok() {
                    client.run_state = RunState::StoppedIdle;
                }
            }
        }
    }

    fn try_accept(&mut self, machine: &dyn Machine) {
        match self.listener.accept() {
            Ok((mut stream, _addr)) => {
                if machine.is_interactive_debugger_active() {
                    warn!(target: "gdb", "rejecting client, interactive debugger is active");
                    let _ = stream.write_all(&packet::frame("E99"));
                    return;
                }
                if let Err(error) = stream.set_nonblocking(true) {
                    error!(target: "gdb", "failed to configure client socket: {}", error);
                    return;
                }
                info!(target: "gdb", "client connected");
                self.client = Some(Client::new(stream));
            }
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => {}
            Err(error) => error!(target: "gdb", "accept failed: {}", error),
        }
    }

    fn teardown(&mut self) {
        info!(target: "gdb", "client disconnected");
        self.client = None;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum RunState {
    StoppedIdle,
    StoppedPendingReply,
    Running,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Pending {
    None,
    Step,
    Continue,
}

struct Client {
    // I/O
    stream: TcpStream,
    framer: Framer,
    // Runtime State
    no_ack_mode: bool,
    run_state: RunState,
    pending: Pending,
    breakpoints: HashSet<u32>,
}

impl Client {
    fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            framer: Framer::new(),
            no_ack_mode: false,
            run_state: RunState::StoppedIdle,
            pending: Pending::None,
            breakpoints: HashSet::new(),
        }
    }

    /// Drain available bytes into the framer. Returns false on disconnect.
    fn receive(&mut self) -> bool {
        let mut buf = [0u8; 1024];
        loop {
            match self.stream.read(&mut buf) {
                Ok(0) => return false,
                Ok(n) => self.framer.push(&buf[..n]),
                Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => return true,
                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    error!(target: "gdb", "read error: {}", error);
                    return false;
                }
            }
        }
    }

    /// Returns true when the client asked to detach.
    fn dispatch(&mut self, payload: &str, machine: &mut dyn Machine) -> io::Result<bool> {
        debug!(target: "gdb", "<< {}", payload);
        if payload.is_empty() {
            self.send_packet("")?;
            return Ok(false);
        }
        match payload.as_bytes()[0] {
            b'?' => self.send_stop_reply(SIGTRAP)?,
            b'H' => self.send_packet("OK")?,
            b'Q' => {
                if payload == "QStartNoAckMode" {
                    self.no_ack_mode = true;
                    self.send_packet("OK")?;
                } else {
                    self.send_packet("")?;
                }
            }
            b'g' => self.read_registers(machine)?,
            b'G' => self.write_registers(&payload[1..], machine)?,
            b'p' => self.read_register(&payload[1..], machine)?,
            b'm' => self.read_memory(&payload[1..], machine)?,
            b'M' => self.write_memory(&payload[1..], machine)?,
            b'Z' | b'z' => self.handle_breakpoint(payload, machine)?,
            b's' => self.pending = Pending::Step,
            b'c' => self.pending = Pending::Continue,
            b'q' => self.handle_query(&payload[1..])?,
            b'v' => self.handle_v_packet(payload)?,
            b'D' => {
                info!(target: "gdb", "client detaching");
                self.send_packet("OK")?;
                return Ok(true);
            }
            _ => {
                debug!(target: "gdb", "unhandled command: {}", payload);
                self.send_packet("")?;
            }
        }
        Ok(false)
    }

    fn handle_query(&mut self, query: &str) -> io::Result<()> {
        if query.starts_with("Supported") {
            self.send_packet("PacketSize=3fff;swbreak+;hwbreak+;vContSupported+;QStartNoAckMode+")
        } else if query.starts_with("fThreadInfo") {
            self.send_packet("m1")
        } else if query.starts_with("sThreadInfo") {
            self.send_packet("l")
        } else if query.starts_with("Attached") {
            self.send_packet("1")
        } else {
            self.send_packet("")
        }
    }

    fn handle_v_packet(&mut self, payload: &str) -> io::Result<()> {
        if payload == "vCont?" {
            return self.send_packet("vCont;c;s;t");
        }
        if payload.len() >= 7 && payload.starts_with("vCont;") {
            match payload.as_bytes()[6] {
                b'c' => {
                    self.pending = Pending::Continue;
                    return Ok(());
                }
                b's' => {
                    self.pending = Pending::Step;
                    return Ok(());
                }
                _ => return self.send_packet(""),
            }
        }
        // vMustReplyEmpty and any other v packet
        self.send_packet("")
    }

    fn read_registers(&mut self, machine: &dyn Machine) -> io::Result<()> {
        let mut raw = Vec::with_capacity(reg::COUNT * 4);
        for index in 0..reg::COUNT {
            raw.write_u32::<LittleEndian>(machine.get_register(index))?;
        }
        self.send_packet(&hex_encode(&raw))
    }

    fn read_register(&mut self, args: &str, machine: &dyn Machine) -> io::Result<()> {
        match usize::from_str_radix(args, 16) {
            Ok(index) if index < reg::COUNT => {
                let mut raw = Vec::with_capacity(4);
                raw.write_u32::<LittleEndian>(machine.get_register(index))?;
                self.send_packet(&hex_encode(&raw))
            }
            _ => self.send_packet("E01"),
        }
    }

    fn write_registers(&mut self, args: &str, machine: &mut dyn Machine) -> io::Result<()> {
        let raw = super::hex_decode(args);
        for (index, chunk) in raw.chunks(4).enumerate() {
            if index >= reg::COUNT || chunk.len() < 4 {
                break;
            }
            machine.set_register(index, LittleEndian::read_u32(chunk));
        }
        self.send_packet("OK")
    }

    fn read_memory(&mut self, args: &str, machine: &dyn Machine) -> io::Result<()> {
        let (addr, len) = match parse_addr_len(args) {
            Some(parsed) => parsed,
            None => return self.send_packet("E01"),
        };
        let mut data = Vec::with_capacity(len as usize);
        for i in 0..len {
            data.push(machine.read_byte(addr.wrapping_add(i)));
        }
        self.send_packet(&hex_encode(&data))
    }

    fn write_memory(&mut self, args: &str, machine: &mut dyn Machine) -> io::Result<()> {
        let comma = args.find(',');
        let colon = args.find(':');
        let (comma, colon) = match (comma, colon) {
            (Some(comma), Some(colon)) if comma < colon => (comma, colon),
            _ => return self.send_packet("E01"),
        };
        let addr = match u32::from_str_radix(&args[..comma], 16) {
            Ok(addr) => addr,
            Err(_) => return self.send_packet("E01"),
        };
        let data = super::hex_decode(&args[colon + 1..]);
        for (i, byte) in data.iter().enumerate() {
            machine.write_byte(addr.wrapping_add(i as u32), *byte);
        }
        self.send_packet("OK")
    }

    fn handle_breakpoint(&mut self, payload: &str, machine: &mut dyn Machine) -> io::Result<()> {
        let insert = payload.starts_with('Z');
        let parts: Vec<&str> = payload[1..].split(',').collect();
        if parts.len() < 3 {
            return self.send_packet("E01");
        }
        if parts[0] != "0" {
            // Only software breakpoints are supported.
            return self.send_packet("");
        }
        let addr = match u32::from_str_radix(parts[1], 16) {
            Ok(addr) => addr,
            Err(_) => return self.send_packet("E01"),
        };
        let success = if insert {
            machine.set_breakpoint(addr)
        } else {
            machine.remove_breakpoint(addr)
        };
        if success {
            if insert {
                self.breakpoints.insert(addr);
            } else {
                self.breakpoints.remove(&addr);
            }
        }
        self.send_packet(if success { "OK" } else { "E01" })
    }

    fn send_stop_reply(&mut self, signal: u8) -> io::Result<()> {
        self.send_packet(&format!("S{:02x}", signal))
    }

    fn send_packet(&mut self, payload: &str) -> io::Result<()> {
        debug!(target: "gdb", ">> {}", payload);
        match self.stream.write_all(&packet::frame(payload)) {
            Ok(()) => Ok(()),
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => {
                warn!(target: "gdb", "reply dropped, client is not reading");
                Ok(())
            }
            Err(error) => Err(error),
        }
    }
}

fn parse_addr_len(args: &str) -> Option<(u32, u32)> {
    let comma = args.find(',')?;
    let addr = u32::from_str_radix(&args[..comma], 16).ok()?;
    let len = u32::from_str_radix(&args[comma + 1..], 16).ok()?;
    Some((addr, len))
}
