#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::unescaped_backticks)]

//! This crate provides a link to a simulation host over TCP.

use std::{
    io::{ErrorKind, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

use serde::{Deserialize, Serialize};
use simlink_core::{
    link::{encode, FrameDecoder, Link, TransportError},
    message::Message,
};

const READ_CHUNK_SIZE: usize = 64 * 1024;

struct TcpInner {
    stream: TcpStream,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl TcpInner {
    fn open(addr: &SocketAddr, timeout: Option<Duration>) -> Result<TcpInner, TransportError> {
        let stream = if let Some(timeout) = timeout {
            TcpStream::connect_timeout(addr, timeout)
        } else {
            TcpStream::connect(addr)
        }
        .map_err(|e| TransportError::Disconnected(format!("failed to connect to {addr}: {e}")))?;

        stream.set_write_timeout(timeout)?;
        stream.set_nodelay(true)?;

        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
            read_buf: vec![0; READ_CHUNK_SIZE],
        })
    }

    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        let frame = encode(msg)?;
        tracing::trace!("send {} ({} bytes)", msg.ty(), frame.len());
        self.stream.write_all(&frame).map_err(|e| match e.kind() {
            ErrorKind::WouldBlock | ErrorKind::TimedOut => {
                TransportError::Disconnected(format!("write timed out: {e}"))
            }
            _ => TransportError::from(e),
        })
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, TransportError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(msg) = self.decoder.next_frame()? {
                tracing::trace!("receive {}", msg.ty());
                return Ok(msg);
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(timeout));
            }
            self.stream.set_read_timeout(Some(remaining))?;

            match self.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    return Err(TransportError::Disconnected(
                        "connection closed by host".to_owned(),
                    ))
                }
                Ok(n) => self.decoder.extend(&self.read_buf[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    return Err(match TransportError::from(e) {
                        TransportError::Timeout(_) => TransportError::Timeout(timeout),
                        e => e,
                    })
                }
            }
        }
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() != ErrorKind::NotConnected => Err(e.into()),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
/// Options for [`Tcp`].
pub struct TcpOption {
    /// Timeout duration for connecting and writing. The default is `None`, which means no timeout.
    ///
    /// The timeout of a receive is given per call.
    pub timeout: Option<Duration>,
}

/// A [`Link`] to a simulation host over TCP.
///
/// Messages are framed with a 4-byte big-endian length prefix.
pub struct Tcp {
    addr: SocketAddr,
    inner: Option<TcpInner>,
}

impl Tcp {
    /// Connects to the host.
    ///
    /// Every address `endpoint` resolves to is tried in order.
    pub fn connect(endpoint: impl ToSocketAddrs, option: TcpOption) -> Result<Tcp, TransportError> {
        let addrs = endpoint
            .to_socket_addrs()
            .map_err(|e| TransportError::Disconnected(format!("failed to resolve endpoint: {e}")))?;

        let mut last_err = TransportError::Disconnected("endpoint resolved to no address".to_owned());
        for addr in addrs {
            tracing::info!("Connecting to {}", addr);
            match TcpInner::open(&addr, option.timeout) {
                Ok(inner) => {
                    return Ok(Tcp {
                        addr,
                        inner: Some(inner),
                    })
                }
                Err(e) => {
                    tracing::debug!("Failed to connect to {}: {}", addr, e);
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// The address of the connected host.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn with_inner<T>(
        &mut self,
        f: impl FnOnce(&mut TcpInner) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let inner = self.inner.as_mut().ok_or(TransportError::ConnectionClosed)?;
        let res = f(inner);
        if let Err(e) = &res {
            if e.is_fatal() {
                tracing::warn!("Connection to {} lost: {}", self.addr, e);
                if let Some(mut inner) = self.inner.take() {
                    let _ = inner.close();
                }
            }
        }
        res
    }
}

impl Link for Tcp {
    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.with_inner(|inner| inner.send(msg))
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, TransportError> {
        self.with_inner(|inner| inner.receive(timeout))
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut inner) = self.inner.take() {
            tracing::info!("Closing connection to {}", self.addr);
            inner.close()?;
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    fn endpoint(&self) -> String {
        self.addr.to_string()
    }
}
