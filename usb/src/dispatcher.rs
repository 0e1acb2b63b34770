use crate::codec::{Codec, Response};
use crate::device::base::Transport;
use crate::error::CommandError;
use log::debug;
use std::thread::sleep;
use std::time::Duration;

// Stale replies can pile up if a previous host died mid exchange, but never endlessly.
const MAX_DRAIN_READS: usize = 64;

/// Runs one request / response exchange at a time against the transport.
pub struct Dispatcher<T: Transport, C: Codec> {
    transport: T,
    codec: C,
}

impl<T: Transport, C: Codec> Dispatcher<T, C> {
    pub fn new(transport: T, codec: C) -> Self {
        Self { transport, codec }
    }

    pub fn codec_mut(&mut self) -> &mut C {
        &mut self.codec
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn execute(&mut self, command: C::Command) -> Result<Response<C::Reply>, CommandError> {
        self.execute_paced(command, Duration::ZERO)
    }

    /// Sends the command and, if a reply is expected, waits `delay` before collecting it.
    pub fn execute_paced(
        &mut self,
        command: C::Command,
        delay: Duration,
    ) -> Result<Response<C::Reply>, CommandError> {
        let request = self.codec.encode(&command);
        debug!("Sending {:?} ({} bytes)", command, request.len());
        self.transport
            .write(self.codec.command_endpoint(), &request)?;

        let plan = match self.codec.read_plan(&command) {
            Some(plan) => plan,
            None => return self.codec.decode(&command, &[]),
        };

        if !delay.is_zero() {
            debug!("Waiting {:?} for {:?}", delay, command);
            sleep(delay);
        }

        let mut response = Vec::with_capacity(plan.total_len());
        for chunk in 0..plan.chunks {
            let data = self.transport.read(plan.endpoint, plan.chunk_size)?;
            if plan.chunks > 1 && data.len() != plan.chunk_size {
                debug!(
                    "Short chunk {} of {} for {:?}: {} bytes",
                    chunk + 1,
                    plan.chunks,
                    command,
                    data.len()
                );
            }
            response.extend_from_slice(&data);
        }

        if let Some(expected) = plan.sync {
            let sync = self.transport.read(plan.endpoint, 1)?;
            match sync.first() {
                Some(&byte) if byte == expected => {}
                Some(&byte) => return Err(CommandError::Synchronization(byte)),
                None => return Err(CommandError::Synchronization(0)),
            }
        }

        debug!("Received {} bytes for {:?}", response.len(), command);
        self.codec.decode(&command, &response)
    }

    /// Reads and discards whatever is waiting on `endpoint` until the transport runs dry.
    pub fn drain(&mut self, endpoint: u8, chunk_size: usize) -> usize {
        let mut discarded = 0;
        for _ in 0..MAX_DRAIN_READS {
            match self.transport.read(endpoint, chunk_size) {
                Ok(data) => discarded += data.len(),
                Err(_) => break,
            }
        }
        if discarded > 0 {
            debug!("Discarded {} stale bytes from {:#04x}", discarded, endpoint);
        }
        discarded
    }
}
