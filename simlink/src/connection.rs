use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::{Duration, Instant},
};

use derive_more::Display;
use itertools::Itertools;
use simlink_core::{
    link::{Link, TransportError},
    message::Message,
};

use crate::{
    adhoc::AdHocTable,
    error::{ProtocolError, SimError},
    option::ConnectionOption,
    protocol,
    sensor::SensorId,
    shm::SharedMemoryHandle,
};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

/// The number of an exchange on a connection. Every call takes a new one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct CorrelationId(u64);

impl CorrelationId {
    /// The raw value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }

    fn increment(&mut self) -> Self {
        self.0 = self.0.wrapping_add(1);
        *self
    }
}

pub(crate) struct SensorEntry {
    pub(crate) name: String,
    pub(crate) max_pending: u32,
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(crate) sensors: BTreeMap<SensorId, SensorEntry>,
    pub(crate) next_sensor_id: u64,
    pub(crate) adhoc: AdHocTable,
    pub(crate) regions: BTreeMap<String, SharedMemoryHandle>,
}

struct Channel<L: Link> {
    link: L,
    correlation: CorrelationId,
    // acks of timed out commands that have not arrived yet
    owed_acks: usize,
}

/// A live connection to a simulation host.
///
/// Every command waits for its ack before the next command is sent, so at most one command is
/// in flight. Calls from several threads are serialized.
///
/// The connection owns the shared memory regions and the ad-hoc requests created through it.
/// Closing it (explicitly or on drop) releases the regions and abandons pending requests.
pub struct Connection<L: Link> {
    serial: u64,
    endpoint: String,
    option: ConnectionOption,
    channel: Mutex<Channel<L>>,
    registry: Mutex<Registry>,
}

impl<L: Link> Connection<L> {
    /// Opens a connection over `link` and performs the version handshake.
    pub fn open(link: L, option: ConnectionOption) -> Result<Self, SimError> {
        let endpoint = link.endpoint();
        tracing::info!("Opening connection to {}", endpoint);

        let connection = Self {
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            endpoint,
            option,
            channel: Mutex::new(Channel {
                link,
                correlation: CorrelationId::default(),
                owed_acks: 0,
            }),
            registry: Mutex::new(Registry::default()),
        };

        let ack = connection.call(
            Message::new("Hello").with("protocolVersion", connection.option.protocol_version.as_str()),
            "Hello",
        )?;
        let version = protocol::field::<String>(&ack, "protocolVersion")?;
        if version != connection.option.protocol_version {
            return Err(ProtocolError::VersionMismatch {
                expected: connection.option.protocol_version.clone(),
                actual: version,
            }
            .into());
        }

        tracing::info!("Connected to {} (protocol {})", connection.endpoint, version);
        Ok(connection)
    }

    /// A description of the host end.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The options of this connection.
    #[must_use]
    pub const fn option(&self) -> &ConnectionOption {
        &self.option
    }

    /// A number unique to this connection within the process.
    pub(crate) const fn serial(&self) -> u64 {
        self.serial
    }

    /// Checks if the underlying link is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.channel().link.is_open()
    }

    /// The id of the latest exchange.
    #[must_use]
    pub fn last_correlation_id(&self) -> CorrelationId {
        self.channel().correlation
    }

    /// Sends `command` and waits for an ack of type `expected` with the default timeout.
    #[tracing::instrument(level = "debug", skip_all, fields(command = %command.ty()))]
    pub fn call(&self, command: Message, expected: &str) -> Result<Message, SimError> {
        self.exchange(command, expected, self.option.timeout)
    }

    /// Sends `command` and waits at most `timeout` for an ack of type `expected`.
    ///
    /// A host error reply fails with [`ProtocolError::Host`], an ack of another type with
    /// [`ProtocolError::UnexpectedAck`]. The command is never retried.
    ///
    /// On [`ProtocolError::CommandTimeout`] the connection stays open. The ack of the timed out
    /// command is dropped when it arrives, so later calls still get their own acks.
    #[tracing::instrument(level = "debug", skip_all, fields(command = %command.ty()))]
    pub fn call_with_timeout(
        &self,
        command: Message,
        expected: &str,
        timeout: Duration,
    ) -> Result<Message, SimError> {
        self.exchange(command, expected, timeout)
    }

    fn exchange(
        &self,
        command: Message,
        expected: &str,
        timeout: Duration,
    ) -> Result<Message, SimError> {
        let mut channel = self.channel();
        channel.link.ensure_is_open()?;

        let id = channel.correlation.increment();
        tracing::debug!(correlation = %id, "-> {}", command);

        let deadline = Instant::now() + timeout;
        let res = channel.link.send(&command).and_then(|()| loop {
            let ack = channel
                .link
                .receive(deadline.saturating_duration_since(Instant::now()))?;
            if channel.owed_acks == 0 {
                break Ok(ack);
            }
            channel.owed_acks -= 1;
            tracing::debug!(correlation = %id, "dropped late ack {}", ack);
        });
        let ack = match res {
            Ok(ack) => ack,
            Err(TransportError::Timeout(_)) => {
                channel.owed_acks += 1;
                tracing::debug!(correlation = %id, "no ack within {:?}", timeout);
                return Err(ProtocolError::CommandTimeout {
                    command: command.ty().to_owned(),
                    timeout,
                }
                .into());
            }
            Err(e) => {
                if e.is_fatal() && channel.link.is_open() {
                    let _ = channel.link.close();
                }
                return Err(e.into());
            }
        };
        drop(channel);

        tracing::debug!(correlation = %id, "<- {}", ack);
        Ok(protocol::check_ack(ack, expected)?)
    }

    /// Runs `f` with exclusive access to the link.
    pub fn with_link<R>(&self, f: impl FnOnce(&mut L) -> R) -> R {
        f(&mut self.channel().link)
    }

    /// Releases every shared memory region, abandons pending ad-hoc requests and closes the link.
    pub fn close(mut self) -> Result<(), SimError> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<(), SimError> {
        let (abandoned, regions) = {
            let mut registry = self.registry();
            registry.sensors.clear();
            (
                registry.adhoc.drain(),
                std::mem::take(&mut registry.regions),
            )
        };
        if !abandoned.is_empty() {
            tracing::debug!(
                "Abandoning {} pending ad-hoc requests: {}",
                abandoned.len(),
                abandoned.iter().join(", ")
            );
        }
        for handle in regions.into_values() {
            if let Err(e) = self.release_region(&handle) {
                tracing::warn!("Failed to release shared memory {}: {}", handle.name(), e);
            }
        }

        let mut channel = self.channel();
        if channel.link.is_open() {
            tracing::info!("Closing connection to {}", self.endpoint);
            channel.link.close()?;
        }
        Ok(())
    }

    fn channel(&self) -> MutexGuard<'_, Channel<L>> {
        self.channel.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<L: Link> Drop for Connection<L> {
    fn drop(&mut self) {
        if let Err(e) = self.close_impl() {
            tracing::warn!("Failed to close connection to {}: {}", self.endpoint, e);
        }
    }
}
