use std::collections::BTreeMap;

use derive_more::Display;
use simlink_core::{link::Link, message::Message};

use crate::{
    error::{PollError, SimError},
    protocol,
    sensor::{SensorHandle, SensorId},
    Connection,
};

/// The host-assigned id of an ad-hoc poll request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display)]
pub struct RequestId(u64);

impl RequestId {
    /// Creates a request id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw value.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// The state of an uncollected ad-hoc poll request.
///
/// A collected request is forgotten, so there is no state for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// The host has not reported the request as ready yet.
    Pending,
    /// The host reported the request as ready.
    Ready,
}

#[derive(Debug)]
struct AdHocRecord {
    sensor: SensorId,
    state: RequestState,
}

/// The uncollected requests of a connection, plus submissions in flight.
#[derive(Debug, Default)]
pub(crate) struct AdHocTable {
    records: BTreeMap<RequestId, AdHocRecord>,
    reserved: BTreeMap<SensorId, u32>,
}

impl AdHocTable {
    fn outstanding(&self, sensor: SensorId) -> u32 {
        let recorded = self.records.values().filter(|r| r.sensor == sensor).count() as u32;
        recorded + self.reserved.get(&sensor).copied().unwrap_or(0)
    }

    /// Takes a slot for a submission, or fails if `limit` slots are taken.
    pub(crate) fn reserve(
        &mut self,
        sensor: SensorId,
        name: &str,
        limit: u32,
    ) -> Result<(), PollError> {
        if self.outstanding(sensor) >= limit {
            return Err(PollError::TooManyPending {
                sensor: name.to_owned(),
                limit,
            });
        }
        *self.reserved.entry(sensor).or_default() += 1;
        Ok(())
    }

    fn unreserve(&mut self, sensor: SensorId) {
        if let Some(n) = self.reserved.get_mut(&sensor) {
            *n = n.saturating_sub(1);
            if *n == 0 {
                self.reserved.remove(&sensor);
            }
        }
    }

    pub(crate) fn state(&self, id: RequestId) -> Option<RequestState> {
        self.records.get(&id).map(|r| r.state)
    }

    pub(crate) fn owner(&self, id: RequestId) -> Option<SensorId> {
        self.records.get(&id).map(|r| r.sensor)
    }

    pub(crate) fn pending_for(&self, sensor: SensorId) -> Vec<RequestId> {
        self.records
            .iter()
            .filter(|(_, r)| r.sensor == sensor)
            .map(|(id, _)| *id)
            .collect()
    }

    pub(crate) fn remove_sensor(&mut self, sensor: SensorId) -> Vec<RequestId> {
        let ids = self.pending_for(sensor);
        ids.iter().for_each(|id| {
            self.records.remove(id);
        });
        self.reserved.remove(&sensor);
        ids
    }

    pub(crate) fn drain(&mut self) -> Vec<RequestId> {
        self.reserved.clear();
        std::mem::take(&mut self.records).into_keys().collect()
    }
}

impl<L: Link> Connection<L> {
    /// Submits an ad-hoc poll request for `sensor`.
    ///
    /// Fails with [`PollError::TooManyPending`] without contacting the host if the sensor already
    /// has as many uncollected requests as its `max_pending_requests`.
    pub fn submit_ad_hoc_poll(&self, sensor: &SensorHandle) -> Result<RequestId, SimError> {
        {
            let mut registry = self.registry();
            let (name, limit) = registry
                .sensors
                .get(&sensor.id())
                .map(|e| (e.name.clone(), e.max_pending))
                .ok_or_else(|| PollError::UnknownSensor(sensor.name().clone()))?;
            registry.adhoc.reserve(sensor.id(), &name, limit)?;
        }

        let res = self
            .call(
                Message::new("StartAdHocPoll")
                    .with("sensor", sensor.name().as_str())
                    .with("vid", sensor.vid().as_str()),
                "StartedAdHocPoll",
            )
            .and_then(|ack| Ok(RequestId(protocol::field::<u64>(&ack, "request_id")?)));

        let mut registry = self.registry();
        registry.adhoc.unreserve(sensor.id());
        let id = res?;
        if !registry.sensors.contains_key(&sensor.id()) {
            tracing::debug!("Sensor {} was removed while request {} was submitted", sensor.name(), id);
            return Ok(id);
        }
        registry.adhoc.records.insert(
            id,
            AdHocRecord {
                sensor: sensor.id(),
                state: RequestState::Pending,
            },
        );
        tracing::debug!("Submitted ad-hoc request {} for {}", id, sensor.name());
        Ok(id)
    }

    /// Asks the host whether request `id` is ready.
    pub fn is_ad_hoc_poll_request_ready(&self, id: RequestId) -> Result<bool, SimError> {
        self.ensure_request(id)?;

        let ack = self.call(
            Message::new("IsAdHocPollRequestReady").with("request_id", id.get()),
            "CompletedIsAdHocPollRequestReady",
        )?;
        let ready = protocol::field::<bool>(&ack, "data")?;

        if ready {
            if let Some(record) = self.registry().adhoc.records.get_mut(&id) {
                record.state = RequestState::Ready;
            }
        }
        Ok(ready)
    }

    /// Collects request `id` and returns the raw ack carrying the reading.
    ///
    /// Fails with [`PollError::NotReady`] if the host has not finished; the request stays
    /// pending. Once collected the id is forgotten.
    pub fn collect_ad_hoc_poll_request(&self, id: RequestId) -> Result<Message, SimError> {
        self.ensure_request(id)?;

        let ack = self.call(
            Message::new("CollectAdHocPollRequest").with("request_id", id.get()),
            "CompletedCollectAdHocPollRequest",
        )?;
        if !protocol::field::<bool>(&ack, "ready")? {
            return Err(PollError::NotReady(id).into());
        }

        self.registry().adhoc.records.remove(&id);
        tracing::debug!("Collected ad-hoc request {}", id);
        Ok(ack)
    }

    /// The state of request `id`, or `None` if it is unknown or collected.
    #[must_use]
    pub fn request_state(&self, id: RequestId) -> Option<RequestState> {
        self.registry().adhoc.state(id)
    }

    /// The uncollected requests of `sensor`.
    #[must_use]
    pub fn pending_requests(&self, sensor: &SensorHandle) -> Vec<RequestId> {
        self.registry().adhoc.pending_for(sensor.id())
    }

    pub(crate) fn request_owner(&self, id: RequestId) -> Option<SensorId> {
        self.registry().adhoc.owner(id)
    }

    fn ensure_request(&self, id: RequestId) -> Result<(), PollError> {
        self.registry()
            .adhoc
            .state(id)
            .map(|_| ())
            .ok_or(PollError::UnknownRequest(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_counts_records_and_reservations() {
        let mut table = AdHocTable::default();
        let sensor = SensorId::new(0);
        table.records.insert(
            RequestId(1),
            AdHocRecord {
                sensor,
                state: RequestState::Pending,
            },
        );
        assert_eq!(Ok(()), table.reserve(sensor, "us", 2));
        assert_eq!(
            Err(PollError::TooManyPending {
                sensor: "us".to_owned(),
                limit: 2
            }),
            table.reserve(sensor, "us", 2)
        );
        assert_eq!(Ok(()), table.reserve(SensorId::new(1), "imu", 2));

        table.unreserve(sensor);
        assert_eq!(Ok(()), table.reserve(sensor, "us", 2));
    }

    #[test]
    fn remove_sensor() {
        let mut table = AdHocTable::default();
        [(1, 0), (2, 1), (3, 0)].into_iter().for_each(|(id, sensor)| {
            table.records.insert(
                RequestId(id),
                AdHocRecord {
                    sensor: SensorId::new(sensor),
                    state: RequestState::Pending,
                },
            );
        });
        assert_eq!(
            vec![RequestId(1), RequestId(3)],
            table.remove_sensor(SensorId::new(0))
        );
        assert_eq!(None, table.state(RequestId(1)));
        assert_eq!(Some(RequestState::Pending), table.state(RequestId(2)));
        assert_eq!(vec![RequestId(2)], table.drain());
    }
}
