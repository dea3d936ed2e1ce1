use simlink_core::message::{Message, Value};

use crate::{error::HostError, HostEmulator};

use super::sensor_key;

impl HostEmulator {
    pub(crate) fn get_sensor_property(
        &mut self,
        property: &str,
        msg: &Message,
    ) -> Result<Message, HostError> {
        let key = sensor_key(msg)?;
        let sensor = self
            .sensors
            .get(&key)
            .ok_or_else(|| HostError::UnknownSensor(key.1.clone()))?;
        let value = sensor
            .property(property)
            .ok_or_else(|| HostError::UnknownCommand(msg.ty().to_owned()))?;
        Ok(Message::new(format!("CompletedGetSensor{property}")).with("data", value))
    }

    pub(crate) fn set_sensor_property(
        &mut self,
        property: &str,
        msg: &Message,
    ) -> Result<Message, HostError> {
        let key = sensor_key(msg)?;
        let value = msg.get("value").cloned().unwrap_or(Value::Nil);
        let sensor = self
            .sensors
            .get_mut(&key)
            .ok_or_else(|| HostError::UnknownSensor(key.1.clone()))?;
        let res = sensor
            .set_property(property, &value)
            .ok_or_else(|| HostError::UnknownCommand(msg.ty().to_owned()))?;

        let ack = Message::new(format!("CompletedSetSensor{property}"));
        Ok(match res {
            Ok(()) => ack.with("accepted", true),
            Err(reason) => {
                tracing::debug!("Host rejected {} = {} for {}: {}", property, value, key.1, reason);
                ack.with("accepted", false).with("reason", reason)
            }
        })
    }
}
