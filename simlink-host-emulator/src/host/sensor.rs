use std::collections::BTreeMap;

use derive_new::new;
use getset::{CopyGetters, Getters};
use simlink_core::message::Value;

/// Where an emulated sensor puts its readings.
#[derive(Clone, Debug, PartialEq)]
pub enum SensorOutput {
    /// The reading is returned in the `data` field of the ack.
    Inline(BTreeMap<String, Value>),
    /// Samples are written into a shared memory region and the ack carries their count.
    SharedMemory {
        /// The backing file name of the region.
        region: String,
        /// The size of one sample in bytes.
        sample_size: usize,
        /// The bytes written on each poll.
        data: Vec<u8>,
    },
}

/// A sensor attached on the emulated host.
#[derive(Clone, Debug, Getters, CopyGetters, new)]
#[new(visibility = "pub(crate)")]
pub struct EmulatedSensor {
    #[getset(get = "pub")]
    /// The entity the sensor is attached to.
    vid: String,
    #[getset(get = "pub")]
    /// The sensor type name.
    kind: String,
    #[getset(get_copy = "pub")]
    /// The requested update time in seconds. Non-positive values disable the sensor.
    update_time: f64,
    #[getset(get_copy = "pub")]
    /// The update priority in `[0, 1]`.
    priority: f64,
    #[getset(get_copy = "pub")]
    /// Whether the sensor is visualised.
    is_visualised: bool,
    #[getset(get_copy = "pub")]
    /// The maximum number of pending ad-hoc requests.
    max_pending_requests: u32,
    #[getset(get = "pub")]
    /// The configured output.
    output: SensorOutput,
    #[getset(get_copy = "pub")]
    #[new(default)]
    /// The number of polls served, ad-hoc collections included.
    polls: usize,
}

impl EmulatedSensor {
    pub(crate) fn default_inline_reading(kind: &str) -> BTreeMap<String, Value> {
        match kind {
            "Ultrasonic" => BTreeMap::from([
                ("distance".to_owned(), Value::Float(1.5)),
                ("windowMin".to_owned(), Value::Float(0.15)),
                ("windowMax".to_owned(), Value::Float(5.5)),
            ]),
            _ => BTreeMap::new(),
        }
    }

    /// Returns `true` if the host computes nothing for this sensor.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.update_time <= 0.0
    }

    /// Replaces the inline reading.
    pub fn set_reading(&mut self, reading: BTreeMap<String, Value>) {
        self.output = SensorOutput::Inline(reading);
    }

    /// Replaces the bytes written into the shared memory region on each poll.
    pub fn set_bulk(&mut self, bytes: Vec<u8>) {
        if let SensorOutput::SharedMemory { data, .. } = &mut self.output {
            *data = bytes;
        }
    }

    pub(crate) fn count_poll(&mut self) {
        self.polls += 1;
    }

    pub(crate) fn property(&self, property: &str) -> Option<Value> {
        match property {
            "RequestedUpdateTime" => Some(Value::Float(self.update_time)),
            "UpdatePriority" => Some(Value::Float(self.priority)),
            "MaxPendingRequests" => Some(Value::Int(self.max_pending_requests as i64)),
            "IsVisualised" => Some(Value::Bool(self.is_visualised)),
            _ => None,
        }
    }

    /// Applies a property. The outer `None` means the property does not exist, the inner error
    /// is the reason of a rejection.
    pub(crate) fn set_property(
        &mut self,
        property: &str,
        value: &Value,
    ) -> Option<Result<(), String>> {
        let res = match property {
            "RequestedUpdateTime" => match value.as_f64() {
                Some(v) if v < 0.0 => Err(format!(
                    "requested update time must not be negative, but got {v}"
                )),
                Some(v) => {
                    self.update_time = v;
                    Ok(())
                }
                None => Err(format!("requested update time must be a number, but got {}", value.kind())),
            },
            "UpdatePriority" => match value.as_f64() {
                Some(v) if (0.0..=1.0).contains(&v) => {
                    self.priority = v;
                    Ok(())
                }
                Some(v) => Err(format!("update priority must be in [0, 1], but got {v}")),
                None => Err(format!("update priority must be a number, but got {}", value.kind())),
            },
            "MaxPendingRequests" => match value.as_integral() {
                Some(v) if v >= 1 && v <= u32::MAX as i64 => {
                    self.max_pending_requests = v as u32;
                    Ok(())
                }
                Some(v) => Err(format!("max pending requests must be positive, but got {v}")),
                None => Err(format!(
                    "max pending requests must be an integer, but got {}",
                    value.kind()
                )),
            },
            "IsVisualised" => match value.as_bool() {
                Some(v) => {
                    self.is_visualised = v;
                    Ok(())
                }
                None => Err(format!("visualisation flag must be a bool, but got {}", value.kind())),
            },
            _ => return None,
        };
        Some(res)
    }
}

/// Returns a value of the same shape with every leaf set to zero or empty.
pub(crate) fn zeroed(value: &Value) -> Value {
    match value {
        Value::Nil => Value::Nil,
        Value::Bool(_) => Value::Bool(false),
        Value::Int(_) => Value::Int(0),
        Value::Float(_) => Value::Float(0.0),
        Value::Str(_) => Value::Str(String::new()),
        Value::Bin(_) => Value::Bin(Vec::new()),
        Value::Array(_) => Value::Array(Vec::new()),
        Value::Map(m) => Value::Map(m.iter().map(|(k, v)| (k.clone(), zeroed(v))).collect()),
    }
}
