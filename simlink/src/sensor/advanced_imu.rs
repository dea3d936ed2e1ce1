use std::time::Duration;

use simlink_core::{
    link::Link,
    message::{Message, Value},
};

use crate::{error::SimError, protocol, Connection, SharedMemoryHandle};

use super::{AdHocPollable, Configurable, Pollable, Sensor, SensorConfig, SensorHandle};

const NUM_CHANNELS: usize = 7;

/// The size of one sample in the shared memory region.
pub const IMU_SAMPLE_SIZE: usize = NUM_CHANNELS * size_of::<f64>();

/// One sample of an [`AdvancedImu`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuSample {
    /// The simulation time in seconds.
    pub time: f64,
    /// The acceleration in m/s².
    pub acc: [f64; 3],
    /// The angular velocity in rad/s.
    pub gyro: [f64; 3],
}

impl ImuSample {
    /// Decodes a sample from [`IMU_SAMPLE_SIZE`] little-endian bytes.
    #[must_use]
    pub fn from_le_bytes(bytes: &[u8; IMU_SAMPLE_SIZE]) -> Self {
        let mut channels = [0.0; NUM_CHANNELS];
        channels
            .iter_mut()
            .zip(bytes.chunks_exact(size_of::<f64>()))
            .for_each(|(c, b)| {
                let mut raw = [0u8; size_of::<f64>()];
                raw.copy_from_slice(b);
                *c = f64::from_le_bytes(raw);
            });
        let [time, ax, ay, az, gx, gy, gz] = channels;
        Self {
            time,
            acc: [ax, ay, az],
            gyro: [gx, gy, gz],
        }
    }

    /// Encodes the sample the way the host lays it out.
    #[must_use]
    pub fn to_le_bytes(&self) -> [u8; IMU_SAMPLE_SIZE] {
        let mut bytes = [0u8; IMU_SAMPLE_SIZE];
        [
            self.time,
            self.acc[0],
            self.acc[1],
            self.acc[2],
            self.gyro[0],
            self.gyro[1],
            self.gyro[2],
        ]
        .iter()
        .zip(bytes.chunks_exact_mut(size_of::<f64>()))
        .for_each(|(c, b)| b.copy_from_slice(&c.to_le_bytes()));
        bytes
    }
}

/// A high-rate inertial sensor whose samples arrive through shared memory.
pub struct AdvancedImu<'a, L: Link> {
    connection: &'a Connection<L>,
    handle: SensorHandle,
    shm: SharedMemoryHandle,
    max_samples: usize,
}

impl<'a, L: Link> AdvancedImu<'a, L> {
    /// The sensor type name on the host.
    pub const KIND: &'static str = "AdvancedIMU";

    /// Attaches an IMU `name` to entity `vid` with room for `max_samples` samples per poll.
    pub fn open(
        connection: &'a Connection<L>,
        name: &str,
        vid: &str,
        config: SensorConfig,
        max_samples: usize,
    ) -> Result<Self, SimError> {
        let shm = connection.negotiate_shared_memory(
            &format!("{vid}.{name}.imu"),
            max_samples * IMU_SAMPLE_SIZE,
        )?;

        let handle = match connection.attach_sensor(
            name,
            vid,
            Self::KIND,
            config,
            vec![
                ("shmName", Value::from(shm.file_name())),
                ("sampleSize", Value::from(IMU_SAMPLE_SIZE)),
            ],
        ) {
            Ok(handle) => handle,
            Err(e) => {
                if let Err(e) = connection.release_shared_memory(&shm) {
                    tracing::warn!("Failed to release shared memory {}: {}", shm.name(), e);
                }
                return Err(e);
            }
        };

        Ok(Self {
            connection,
            handle,
            shm,
            max_samples,
        })
    }

    /// The region the samples arrive through.
    #[must_use]
    pub const fn shared_memory(&self) -> &SharedMemoryHandle {
        &self.shm
    }

    /// The maximum number of samples per poll.
    #[must_use]
    pub const fn max_samples(&self) -> usize {
        self.max_samples
    }

    /// Detaches the sensor and releases its region.
    pub fn remove(self) -> Result<(), SimError> {
        let res = self.connection.detach_sensor(&self.handle);
        self.connection.release_shared_memory(&self.shm)?;
        res
    }
}

impl<L: Link> Sensor for AdvancedImu<'_, L> {
    type Link = L;

    fn handle(&self) -> &SensorHandle {
        &self.handle
    }

    fn connection(&self) -> &Connection<L> {
        self.connection
    }
}

impl<L: Link> Pollable for AdvancedImu<'_, L> {
    type Reading = Vec<ImuSample>;

    fn decode(&self, ack: &Message) -> Result<Vec<ImuSample>, SimError> {
        let samples = protocol::field::<usize>(ack, "samples")?;
        if !protocol::optional_field::<bool>(ack, "shmReady")?.unwrap_or(false) {
            return Ok(Vec::new());
        }

        self.shm.mark_ready();
        let bytes = self.shm.read(Duration::ZERO)?;
        Ok(bytes
            .chunks_exact(IMU_SAMPLE_SIZE)
            .take(samples.min(self.max_samples))
            .filter_map(|chunk| <&[u8; IMU_SAMPLE_SIZE]>::try_from(chunk).ok())
            .map(ImuSample::from_le_bytes)
            .collect())
    }
}

impl<L: Link> AdHocPollable for AdvancedImu<'_, L> {}

impl<L: Link> Configurable for AdvancedImu<'_, L> {}
