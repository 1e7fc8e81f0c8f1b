// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

// SPEC: https://wiki.qemu.org/Documentation/QMP

use std::env;
use std::fs;
use std::io;
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::gate::{Request, RequestGate, WaitError};
use crate::machine::{MouseButton, RemoteIo};
use crate::net;

use super::json;
use super::keymap;
use super::{base64, ErrorClass};

const GREETING: &str = "{\"QMP\": {\"version\": {\"qemu\": {\"micro\": 0, \"minor\": 0, \"major\": 0}, \
     \"package\": \"oxidos\"}, \"capabilities\": [\"oob\"]}}";

const ACCEPT_POLL: Duration = Duration::from_millis(50);
const READ_TIMEOUT: Duration = Duration::from_millis(250);
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(5);
const STATE_TIMEOUT: Duration = Duration::from_secs(30);
const PAUSE_TIMEOUT: Duration = Duration::from_millis(1000);
const PAUSE_POLL: Duration = Duration::from_millis(10);

const MEMDUMP_MAX: i64 = 16 * 1024 * 1024;

/// QEMU Monitor Protocol endpoint. One server thread, one client at a
/// time. Keyboard and mouse events go straight to the thread-safe emulator
/// entry points; control operations are handed to the emulator main thread
/// through the request gate.
///
/// Capability negotiation is relaxed: commands are honored before
/// `qmp_capabilities`, the handshake merely records that the client
/// entered command mode.
pub struct QmpServer {
    running: Arc<AtomicBool>,
    client: Arc<Mutex<Option<TcpStream>>>,
    worker: Option<thread::JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl QmpServer {
    pub fn start(
        port: u16,
        io: Arc<dyn RemoteIo>,
        gate: Arc<RequestGate>,
    ) -> io::Result<QmpServer> {
        let listener = net::bind_listener(port)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!(target: "qmp", "listening on port {}", local_addr.port());
        let running = Arc::new(AtomicBool::new(true));
        let client = Arc::new(Mutex::new(None));
        let worker = {
            let running = running.clone();
            let client = client.clone();
            thread::spawn(move || run(listener, running, client, io, gate))
        };
        Ok(Self {
            running,
            client,
            worker: Some(worker),
            local_addr,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Idempotent. Unblocks the client read via shutdown and joins the
    /// server thread.
    pub fn stop(&mut self) {
        self.signal_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!(target: "qmp", "server stopped");
        }
    }

    /// Flip the running flag and unblock the client socket without joining
    /// yet, so the caller can wake any rendezvous the connection thread may
    /// be parked on before the join.
    pub(crate) fn signal_stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(stream) = self.client.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for QmpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    listener: TcpListener,
    running: Arc<AtomicBool>,
    client: Arc<Mutex<Option<TcpStream>>>,
    io: Arc<dyn RemoteIo>,
    gate: Arc<RequestGate>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _addr)) => {
                info!(target: "qmp", "client connected");
                let mut conn = Connection {
                    stream,
                    io: io.clone(),
                    gate: gate.clone(),
                    running: running.clone(),
                    recv_buf: Vec::new(),
                    negotiated: false,
                };
                match conn.handle(&client) {
                    Ok(()) => info!(target: "qmp", "client disconnected"),
                    Err(error) => error!(target: "qmp", "connection failed: {}", error),
                }
            }
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL);
            }
            Err(error) => {
                if running.load(Ordering::SeqCst) {
                    error!(target: "qmp", "accept failed: {}", error);
                }
                thread::sleep(ACCEPT_POLL);
            }
        }
    }
}

struct Connection {
    // I/O
    stream: TcpStream,
    io: Arc<dyn RemoteIo>,
    gate: Arc<RequestGate>,
    running: Arc<AtomicBool>,
    // Runtime State
    recv_buf: Vec<u8>,
    negotiated: bool,
}

impl Connection {
    fn handle(&mut self, shared: &Mutex<Option<TcpStream>>) -> io::Result<()> {
        self.stream.set_read_timeout(Some(READ_TIMEOUT))?;
        *shared.lock().unwrap() = Some(self.stream.try_clone()?);
        let result = self.serve();
        shared.lock().unwrap().take();
        result
    }

    fn serve(&mut self) -> io::Result<()> {
        self.send_line(GREETING)?;
        let mut buf = [0u8; 4096];
        while self.running.load(Ordering::SeqCst) {
            match self.stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    self.recv_buf.extend_from_slice(&buf[..n]);
                    while let Some(command) = json::next_object(&mut self.recv_buf) {
                        self.process_command(&command)?;
                    }
                }
                Err(ref error)
                    if error.kind() == io::ErrorKind::WouldBlock
                        || error.kind() == io::ErrorKind::TimedOut =>
                {
                    continue;
                }
                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    if self.running.load(Ordering::SeqCst) {
                        return Err(error);
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn process_command(&mut self, cmd: &str) -> io::Result<()> {
        let execute = json::find_string(cmd, "execute");
        debug!(target: "qmp", "<< {}", cmd);
        if !self.negotiated && execute.as_deref() != Some("qmp_capabilities") {
            debug!(target: "qmp", "command before qmp_capabilities, honoring anyway");
        }
        match execute.as_deref() {
            Some("qmp_capabilities") => {
                self.negotiated = true;
                self.send_success()
            }
            Some("send-key") => self.cmd_send_key(cmd),
            Some("input-send-event") => self.cmd_input_send_event(cmd),
            Some("query-commands") => self.cmd_query_commands(),
            Some("query-status") => self.cmd_query_status(),
            Some("memdump") => self.cmd_memdump(cmd),
            Some("screendump") => self.cmd_screendump(cmd),
            Some("savestate") => self.cmd_savestate(cmd),
            Some("loadstate") => self.cmd_loadstate(cmd),
            Some("stop") => self.cmd_stop(),
            Some("cont") => self.cmd_cont(),
            Some("system_reset") => self.cmd_system_reset(cmd),
            // Acknowledged but never exits the emulator.
            Some("quit") | Some("system_powerdown") => self.send_success(),
            Some(other) => self.send_error(
                ErrorClass::CommandNotFound,
                &format!("Command not found: {}", other),
            ),
            None => self.send_error(ErrorClass::GenericError, "Invalid command format"),
        }
    }

    // -- Commands

    fn cmd_send_key(&mut self, cmd: &str) -> io::Result<()> {
        let hold_time = json::find_int(cmd, "hold-time").unwrap_or(100).max(0) as u64;
        let keys = json::find_array(cmd, "keys");
        if keys.is_empty() {
            return self.send_error(ErrorClass::GenericError, "No keys specified");
        }
        let mut pressed = Vec::new();
        for key_obj in &keys {
            let key_type = json::find_string(key_obj, "type");
            let data = json::find_string(key_obj, "data");
            if key_type.as_deref() == Some("qcode") {
                if let Some(name) = data {
                    match keymap::qcode_to_key(&name) {
                        Some(key) => pressed.push(key),
                        None => warn!(target: "qmp", "unknown qcode: {}", name),
                    }
                }
            }
        }
        for &key in &pressed {
            self.io.add_key(key, true);
        }
        thread::sleep(Duration::from_millis(hold_time));
        for &key in pressed.iter().rev() {
            self.io.add_key(key, false);
        }
        self.send_success()
    }

    fn cmd_input_send_event(&mut self, cmd: &str) -> io::Result<()> {
        let events = json::find_array(cmd, "events");
        if events.is_empty() {
            return self.send_error(ErrorClass::GenericError, "No events specified");
        }
        // Relative movements accumulate into one cursor update.
        let mut xrel = 0.0f32;
        let mut yrel = 0.0f32;
        let mut has_move = false;
        for event in &events {
            let event_type = json::find_string(event, "type");
            let data = match json::find_object(event, "data") {
                Some(data) => data,
                None => continue,
            };
            match event_type.as_deref() {
                Some("key") => {
                    let down = json::find_bool(&data, "down").unwrap_or(true);
                    let key_obj = match json::find_object(&data, "key") {
                        Some(key_obj) => key_obj,
                        None => continue,
                    };
                    let key_type = json::find_string(&key_obj, "type");
                    let name = json::find_string(&key_obj, "data");
                    if key_type.as_deref() == Some("qcode") {
                        if let Some(name) = name {
                            match keymap::qcode_to_key(&name) {
                                Some(key) => self.io.add_key(key, down),
                                None => warn!(target: "qmp", "unknown qcode: {}", name),
                            }
                        }
                    }
                }
                Some("rel") => {
                    let value = json::find_int(&data, "value").unwrap_or(0) as f32;
                    match json::find_string(&data, "axis").as_deref() {
                        Some("x") => {
                            xrel += value;
                            has_move = true;
                        }
                        Some("y") => {
                            yrel += value;
                            has_move = true;
                        }
                        _ => {}
                    }
                }
                Some("btn") => {
                    let down = json::find_bool(&data, "down").unwrap_or(true);
                    let button = match json::find_string(&data, "button").as_deref() {
                        Some("left") => MouseButton::Left,
                        Some("right") => MouseButton::Right,
                        Some("middle") => MouseButton::Middle,
                        Some(other) => {
                            warn!(target: "qmp", "unknown mouse button: {}", other);
                            continue;
                        }
                        None => continue,
                    };
                    if down {
                        self.io.button_pressed(button);
                    } else {
                        self.io.button_released(button);
                    }
                }
                _ => {}
            }
        }
        if has_move {
            self.io.cursor_moved(xrel, yrel, true);
        }
        self.send_success()
    }

    fn cmd_query_commands(&mut self) -> io::Result<()> {
        self.send_line(
            "{\"return\": [\
             {\"name\": \"qmp_capabilities\"},\
             {\"name\": \"send-key\"},\
             {\"name\": \"input-send-event\"},\
             {\"name\": \"query-commands\"},\
             {\"name\": \"query-status\"},\
             {\"name\": \"memdump\"},\
             {\"name\": \"screendump\"},\
             {\"name\": \"savestate\"},\
             {\"name\": \"loadstate\"},\
             {\"name\": \"stop\"},\
             {\"name\": \"cont\"},\
             {\"name\": \"system_reset\"}]}",
        )
    }

    fn cmd_query_status(&mut self) -> io::Result<()> {
        let paused = self.io.is_paused();
        self.send_line(&format!(
            "{{\"return\": {{\"status\": \"{}\", \"running\": {}}}}}",
            if paused { "paused" } else { "running" },
            !paused
        ))
    }

    fn cmd_memdump(&mut self, cmd: &str) -> io::Result<()> {
        let args = json::find_object(cmd, "arguments").unwrap_or_default();
        let address = json::find_int(&args, "address").unwrap_or(-1);
        let size = json::find_int(&args, "size").unwrap_or(-1);
        if address < 0 || size <= 0 {
            return self.send_error(
                ErrorClass::GenericError,
                "Missing or invalid 'address' and/or 'size' arguments",
            );
        }
        if size > MEMDUMP_MAX {
            return self.send_error(ErrorClass::GenericError, "Size too large (max 16MB)");
        }
        let file = json::find_string(&args, "file");
        let use_temp = file.is_none();
        let path = match &file {
            Some(file) => PathBuf::from(file),
            None => env::temp_dir().join(format!("oxidos_memdump_{}.bin", process::id())),
        };
        if !self.io.save_memory_bin(&path, address as u32, size as u32) {
            if use_temp {
                let _ = fs::remove_file(&path);
            }
            return self.send_error(ErrorClass::GenericError, "Failed to dump memory");
        }
        if use_temp {
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(_) => {
                    let _ = fs::remove_file(&path);
                    return self.send_error(ErrorClass::GenericError, "Failed to read dump file");
                }
            };
            let _ = fs::remove_file(&path);
            self.send_line(&format!(
                "{{\"return\": {{\"data\": \"{}\", \"size\": {}}}}}",
                base64::encode(&data),
                size
            ))
        } else {
            self.send_line(&format!(
                "{{\"return\": {{\"file\": \"{}\", \"size\": {}}}}}",
                file.unwrap(),
                size
            ))
        }
    }

    fn cmd_screendump(&mut self, cmd: &str) -> io::Result<()> {
        let file = json::find_object(cmd, "arguments")
            .and_then(|args| json::find_string(&args, "file"));
        if let Err(error) = self.gate.submit(Request::Screenshot) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        let capture = match self.gate.wait(SCREENSHOT_TIMEOUT) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return self.send_error(
                    ErrorClass::GenericError,
                    "Screenshot capture failed - no file created",
                );
            }
            Err(WaitError::TimedOut) => {
                return self
                    .send_error(ErrorClass::GenericError, "Screenshot capture timed out");
            }
            Err(WaitError::Failed(error)) => {
                return self.send_error(ErrorClass::GenericError, &error);
            }
        };
        match file {
            None => {
                let data = match fs::read(&capture) {
                    Ok(data) => data,
                    Err(_) => {
                        return self.send_error(
                            ErrorClass::GenericError,
                            "Failed to read screenshot file",
                        );
                    }
                };
                self.send_line(&format!(
                    "{{\"return\": {{\"data\": \"{}\", \"size\": {}, \
                     \"format\": \"png\", \"file\": \"{}\"}}}}",
                    base64::encode(&data),
                    data.len(),
                    capture.display()
                ))
            }
            Some(file) => {
                if fs::copy(&capture, &file).is_err() {
                    return self.send_error(
                        ErrorClass::GenericError,
                        &format!("Failed to copy screenshot to {}", file),
                    );
                }
                let size = fs::metadata(&file).map(|m| m.len()).unwrap_or(0);
                self.send_line(&format!(
                    "{{\"return\": {{\"file\": \"{}\", \"size\": {}, \"format\": \"png\"}}}}",
                    file, size
                ))
            }
        }
    }

    fn cmd_savestate(&mut self, cmd: &str) -> io::Result<()> {
        let file = json::find_object(cmd, "arguments")
            .and_then(|args| json::find_string(&args, "file"));
        let file = match file {
            Some(file) => file,
            None => {
                return self
                    .send_error(ErrorClass::GenericError, "Missing required 'file' argument");
            }
        };
        if let Err(error) = self.gate.submit(Request::Save(PathBuf::from(&file))) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        match self.gate.wait(STATE_TIMEOUT) {
            Ok(_) => self.send_line(&format!("{{\"return\": {{\"file\": \"{}\"}}}}", file)),
            Err(WaitError::TimedOut) => {
                self.send_error(ErrorClass::GenericError, "Save state operation timed out")
            }
            Err(WaitError::Failed(error)) => {
                self.send_error(ErrorClass::GenericError, &error)
            }
        }
    }

    fn cmd_loadstate(&mut self, cmd: &str) -> io::Result<()> {
        let file = json::find_object(cmd, "arguments")
            .and_then(|args| json::find_string(&args, "file"));
        let file = match file {
            Some(file) => file,
            None => {
                return self
                    .send_error(ErrorClass::GenericError, "Missing required 'file' argument");
            }
        };
        if !Path::new(&file).exists() {
            return self.send_error(
                ErrorClass::GenericError,
                &format!("State file not found: {}", file),
            );
        }
        if let Err(error) = self.gate.submit(Request::Load(PathBuf::from(&file))) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        match self.gate.wait(STATE_TIMEOUT) {
            Ok(_) => self.send_line(&format!("{{\"return\": {{\"file\": \"{}\"}}}}", file)),
            Err(WaitError::TimedOut) => {
                self.send_error(ErrorClass::GenericError, "Load state operation timed out")
            }
            Err(WaitError::Failed(error)) => {
                self.send_error(ErrorClass::GenericError, &error)
            }
        }
    }

    fn cmd_stop(&mut self) -> io::Result<()> {
        if self.io.is_paused() {
            return self.send_success();
        }
        if let Err(error) = self.gate.submit(Request::Pause) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        if self.wait_paused(true) {
            self.send_success()
        } else {
            self.send_error(ErrorClass::GenericError, "Failed to pause emulator")
        }
    }

    fn cmd_cont(&mut self) -> io::Result<()> {
        if !self.io.is_paused() {
            return self.send_success();
        }
        if let Err(error) = self.gate.submit(Request::Resume) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        if self.wait_paused(false) {
            self.send_success()
        } else {
            self.send_error(ErrorClass::GenericError, "Failed to resume emulator")
        }
    }

    fn cmd_system_reset(&mut self, cmd: &str) -> io::Result<()> {
        let dos_only = json::find_object(cmd, "arguments")
            .and_then(|args| json::find_bool(&args, "dos_only"))
            .unwrap_or(false);
        if let Err(error) = self.gate.submit(Request::Reset { dos_only }) {
            return self.send_error(ErrorClass::GenericError, &error);
        }
        // Reset runs asynchronously, acknowledge right away.
        self.send_success()
    }

    fn wait_paused(&self, paused: bool) -> bool {
        let deadline = Instant::now() + PAUSE_TIMEOUT;
        while self.io.is_paused() != paused && Instant::now() < deadline {
            thread::sleep(PAUSE_POLL);
        }
        self.io.is_paused() == paused
    }

    // -- Replies

    fn send_success(&mut self) -> io::Result<()> {
        self.send_line("{\"return\": {}}")
    }

    fn send_error(&mut self, class: ErrorClass, desc: &str) -> io::Result<()> {
        self.send_line(&format!(
            "{{\"error\": {{\"class\": \"{}\", \"desc\": \"{}\"}}}}",
            class.as_str(),
            desc
        ))
    }

    fn send_line(&mut self, response: &str) -> io::Result<()> {
        debug!(target: "qmp", ">> {}", response);
        self.stream.write_all(response.as_bytes())?;
        self.stream.write_all(b"\r\n")
    }
}
