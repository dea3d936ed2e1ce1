use std::{collections::VecDeque, time::Duration};

use simlink_core::{
    link::{decode, encode, Link, TransportError},
    message::Message,
};
use simlink_host_emulator::{EmulatorOption, HostEmulator};

/// An in-memory [`Link`] to a [`HostEmulator`].
///
/// Every message is encoded and decoded as on a real link. A receive never blocks: if the host
/// has not answered it fails with [`TransportError::Timeout`] at once.
pub struct Audit {
    emulator: HostEmulator,
    is_open: bool,
    broken: bool,
    acks: VecDeque<Vec<u8>>,
    sent_frames: usize,
}

impl std::ops::Deref for Audit {
    type Target = HostEmulator;

    fn deref(&self) -> &Self::Target {
        &self.emulator
    }
}

impl std::ops::DerefMut for Audit {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.emulator
    }
}

impl Audit {
    /// Creates an open link to a new emulator.
    #[must_use]
    pub fn new(option: EmulatorOption) -> Self {
        Self {
            emulator: HostEmulator::new(option),
            is_open: true,
            broken: false,
            acks: VecDeque::new(),
            sent_frames: 0,
        }
    }

    /// Makes the next send or receive fail as if the connection was lost.
    pub fn break_down(&mut self) {
        self.broken = true;
    }

    /// The number of frames sent to the host.
    #[must_use]
    pub const fn sent_frames(&self) -> usize {
        self.sent_frames
    }

    fn queue_held_acks(&mut self) -> Result<(), TransportError> {
        for ack in self.emulator.take_held_acks() {
            self.acks.push_back(encode(&ack)?);
        }
        Ok(())
    }

    fn check_broken(&mut self) -> Result<(), TransportError> {
        if self.broken {
            self.is_open = false;
            self.acks.clear();
            return Err(TransportError::Disconnected("broken".to_owned()));
        }
        Ok(())
    }
}

impl Link for Audit {
    fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
        self.ensure_is_open()?;
        self.check_broken()?;

        let frame = encode(msg)?;
        self.sent_frames += 1;
        let command = decode(&frame[simlink_core::defined::FRAME_HEADER_SIZE..])?;

        self.queue_held_acks()?;
        if let Some(ack) = self.emulator.handle(command) {
            self.acks.push_back(encode(&ack)?);
        }
        Ok(())
    }

    fn receive(&mut self, timeout: Duration) -> Result<Message, TransportError> {
        self.ensure_is_open()?;
        self.check_broken()?;

        self.queue_held_acks()?;
        let frame = self.acks.pop_front().ok_or(TransportError::Timeout(timeout))?;
        decode(&frame[simlink_core::defined::FRAME_HEADER_SIZE..])
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.is_open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }

    fn endpoint(&self) -> String {
        String::from("audit")
    }
}
