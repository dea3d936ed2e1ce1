mod adhoc;
mod hello;
mod logging;
mod property;
mod sensor;
mod settings;
mod shm;

use simlink_core::message::Message;

use crate::{error::HostError, host::emulator::SensorKey};

pub(crate) fn sensor_key(msg: &Message) -> Result<SensorKey, HostError> {
    Ok((msg.field::<String>("vid")?, msg.field::<String>("name")?))
}
