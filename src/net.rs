// This file is part of oxidos.
// Copyright (c) 2023-2026 The oxidos developers. All rights reserved.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::io;
use std::mem;
use std::net::TcpListener;
use std::os::unix::io::FromRawFd;

/// Create a listening socket on `0.0.0.0:port` with `SO_REUSEADDR` and
/// `SO_REUSEPORT` set before bind, backlog 1. The reuse options must be
/// applied to the raw fd ahead of `bind`, which the std listener builder
/// does not allow.
pub fn bind_listener(port: u16) -> io::Result<TcpListener> {
    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0);
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }
        let opt: libc::c_int = 1;
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &opt as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc < 0 {
            return Err(close_on_error(fd));
        }
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEPORT,
            &opt as *const _ as *const libc::c_void,
            mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc < 0 {
            return Err(close_on_error(fd));
        }
        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: port.to_be(),
            sin_addr: libc::in_addr {
                s_addr: libc::INADDR_ANY,
            },
            sin_zero: [0; 8],
        };
        let rc = libc::bind(
            fd,
            &addr as *const _ as *const libc::sockaddr,
            mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if rc < 0 {
            return Err(close_on_error(fd));
        }
        if libc::listen(fd, 1) < 0 {
            return Err(close_on_error(fd));
        }
        Ok(TcpListener::from_raw_fd(fd))
    }
}

unsafe fn close_on_error(fd: libc::c_int) -> io::Error {
    let err = io::Error::last_os_error();
    libc::close(fd);
    err
}
