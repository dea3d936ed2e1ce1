use simlink_core::message::Message;

use crate::{error::HostError, host::emulator::AdHocJob, AdHocMode, HostEmulator};

impl HostEmulator {
    pub(crate) fn start_ad_hoc_poll(&mut self, msg: &Message) -> Result<Message, HostError> {
        let key = (msg.field::<String>("vid")?, msg.field::<String>("sensor")?);
        if !self.sensors.contains_key(&key) {
            return Err(HostError::UnknownSensor(key.1));
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;
        self.jobs.insert(
            request_id,
            AdHocJob {
                sensor: key,
                ready: self.option.adhoc_mode == AdHocMode::Immediate,
            },
        );
        tracing::debug!("Host started ad-hoc request {}", request_id);

        Ok(Message::new("StartedAdHocPoll").with("request_id", request_id))
    }

    pub(crate) fn is_ad_hoc_poll_request_ready(
        &mut self,
        msg: &Message,
    ) -> Result<Message, HostError> {
        let request_id = msg.field::<u64>("request_id")?;
        let job = self
            .jobs
            .get(&request_id)
            .ok_or(HostError::UnknownRequest(request_id))?;
        Ok(Message::new("CompletedIsAdHocPollRequestReady").with("data", job.ready))
    }

    pub(crate) fn collect_ad_hoc_poll_request(
        &mut self,
        msg: &Message,
    ) -> Result<Message, HostError> {
        let request_id = msg.field::<u64>("request_id")?;
        let job = self
            .jobs
            .get(&request_id)
            .ok_or(HostError::UnknownRequest(request_id))?;

        let ack = Message::new("CompletedCollectAdHocPollRequest");
        if !job.ready {
            return Ok(ack.with("ready", false));
        }

        let sensor = job.sensor.clone();
        let ack = self.reading(&sensor, ack.with("ready", true))?;
        self.jobs.remove(&request_id);
        Ok(ack)
    }
}
