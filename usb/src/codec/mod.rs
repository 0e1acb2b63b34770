use crate::error::CommandError;
use std::fmt::Debug;

pub mod framed;
pub mod legacy;

pub use framed::{FrameHeader, FramedCodec, FramedReply, MessageFlag};
pub use legacy::{LegacyCodec, LegacyHeader, LegacyReply, StatusReport};

/// How a reply has to be collected from the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReadPlan {
    pub endpoint: u8,
    pub chunk_size: usize,
    pub chunks: usize,

    /// A single trailing byte which must follow the chunks.
    pub sync: Option<u8>,
}

impl ReadPlan {
    pub fn single(endpoint: u8, chunk_size: usize) -> Self {
        Self {
            endpoint,
            chunk_size,
            chunks: 1,
            sync: None,
        }
    }

    pub fn total_len(&self) -> usize {
        self.chunk_size * self.chunks
    }
}

/// A decoded reply along with the bytes it was decoded from.
#[derive(Clone, Debug, PartialEq)]
pub struct Response<R> {
    raw: Vec<u8>,
    reply: R,
}

impl<R> Response<R> {
    pub fn new(raw: Vec<u8>, reply: R) -> Self {
        Self { raw, reply }
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn reply(&self) -> &R {
        &self.reply
    }

    pub fn into_reply(self) -> R {
        self.reply
    }
}

// The layout knowledge of one wire protocol. Orchestration code only ever sees commands and
// replies, never offsets.
pub trait Codec {
    type Command: Copy + Debug;
    type Header: Debug;
    type Reply: Debug;

    /// Address every encoded command is written to.
    fn command_endpoint(&self) -> u8;

    fn encode(&self, command: &Self::Command) -> Vec<u8>;

    /// Parses the fixed leading part of a frame, in either direction.
    fn decode_header(&self, bytes: &[u8]) -> Result<Self::Header, CommandError>;

    /// Number of bytes the reply is made of, excluding any sync byte. Zero if there's no reply.
    fn response_length_bytes(&self, command: &Self::Command) -> usize;

    fn read_plan(&self, command: &Self::Command) -> Option<ReadPlan>;

    fn decode(
        &self,
        command: &Self::Command,
        bytes: &[u8],
    ) -> Result<Response<Self::Reply>, CommandError>;
}
