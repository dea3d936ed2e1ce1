use std::{
    io::{ErrorKind, Read, Write},
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use simlink_core::link::{encode, FrameDecoder, TransportError};

use crate::HostEmulator;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const READ_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Default)]
struct Flags {
    shutdown: AtomicBool,
    drop_client: AtomicBool,
}

/// Serves a [`HostEmulator`] over TCP on a background thread.
///
/// Clients are served one at a time, in the order they connect.
pub struct EmulatorServer {
    addr: SocketAddr,
    emulator: Arc<Mutex<HostEmulator>>,
    flags: Arc<Flags>,
    handle: Option<JoinHandle<()>>,
}

impl EmulatorServer {
    /// Binds an ephemeral port on the loopback interface and starts serving.
    pub fn spawn(emulator: HostEmulator) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        tracing::info!("Host emulator listening on {}", addr);

        let emulator = Arc::new(Mutex::new(emulator));
        let flags = Arc::new(Flags::default());
        let handle = thread::spawn({
            let emulator = emulator.clone();
            let flags = flags.clone();
            move || serve(listener, &emulator, &flags)
        });

        Ok(Self {
            addr,
            emulator,
            flags,
            handle: Some(handle),
        })
    }

    /// The address to connect to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Locks the served emulator.
    pub fn emulator(&self) -> MutexGuard<'_, HostEmulator> {
        lock(&self.emulator)
    }

    /// Drops the current client connection without a reply.
    pub fn disconnect_client(&self) {
        self.flags.drop_client.store(true, Ordering::Release);
    }

    /// Stops serving and waits for the background thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.flags.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Host emulator thread panicked");
            }
        }
    }
}

impl Drop for EmulatorServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock(emulator: &Mutex<HostEmulator>) -> MutexGuard<'_, HostEmulator> {
    emulator.lock().unwrap_or_else(PoisonError::into_inner)
}

fn serve(listener: TcpListener, emulator: &Mutex<HostEmulator>, flags: &Flags) {
    while !flags.shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, peer)) => {
                tracing::info!("Host emulator accepted {}", peer);
                flags.drop_client.store(false, Ordering::Release);
                if let Err(e) = handle_client(stream, emulator, flags) {
                    tracing::debug!("Client {} failed: {}", peer, e);
                }
                tracing::info!("Client {} disconnected", peer);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::warn!("Host emulator stopped accepting: {}", e);
                break;
            }
        }
    }
}

fn handle_client(
    mut stream: TcpStream,
    emulator: &Mutex<HostEmulator>,
    flags: &Flags,
) -> Result<(), TransportError> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(POLL_INTERVAL))?;
    stream.set_nodelay(true)?;

    let mut decoder = FrameDecoder::new();
    let mut buf = vec![0; READ_CHUNK_SIZE];
    loop {
        if flags.shutdown.load(Ordering::Acquire) || flags.drop_client.swap(false, Ordering::AcqRel)
        {
            return Ok(());
        }

        let acks = {
            let mut emulator = lock(emulator);
            let mut acks = emulator.take_held_acks();
            while let Some(msg) = decoder.next_frame()? {
                acks.extend(emulator.handle(msg));
            }
            acks
        };
        for ack in acks {
            stream.write_all(&encode(&ack)?)?;
        }

        match stream.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => decoder.extend(&buf[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
}
