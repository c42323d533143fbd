//! Protocol chains - stacked stages with a persistent input buffer.
//!
//! Stages are listed innermost first: the first stage sees application
//! messages, the last one sees the byte stream. Reading walks outward-in:
//!
//! 1. Messages left over from an earlier walk are returned first.
//! 2. The outermost stage decodes from a borrowed view of the buffer. If it
//!    needs more input, bytes are read from the I/O source and the walk
//!    starts over.
//! 3. The buffer is advanced by exactly the count the outermost stage reports.
//! 4. Each inner stage decodes every candidate from the stage outside it.
//!    Candidates it cannot decode yet are dropped, as is an undecodable tail
//!    left after a partial decode (reassembling stages keep their fragments).
//!    A stage left with no candidates restarts the walk.
//! 5. The innermost stage's output is queued and the first message returned.
//!
//! # Example
//!
//! ```
//! use wirechain::protocol::{Message, SizedProtocol};
//! use wirechain::ProtocolChain;
//!
//! let mut chain = ProtocolChain::builder()
//!     .stage(SizedProtocol::new())
//!     .build()
//!     .unwrap();
//!
//! let wire = chain.encode(Message::from("abcd")).unwrap();
//! assert_eq!(wire.len(), 12);
//! assert_eq!(chain.decode(&wire).unwrap(), vec![Message::from("abcd")]);
//! ```

use std::collections::VecDeque;
use std::fmt;

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WirechainError};
use crate::protocol::{Extract, Message, Protocol};

/// Default number of bytes requested per read from the I/O source.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 4096;

/// Default cap on buffered, undecoded input (64 MB).
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Configuration for a [`ProtocolChain`].
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Bytes requested per read from the I/O source.
    pub read_chunk_size: usize,
    /// Undecoded input beyond this is treated as a corrupt stream.
    pub max_buffer_size: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

/// Builder for [`ProtocolChain`].
pub struct ProtocolChainBuilder {
    stages: Vec<Box<dyn Protocol>>,
    config: ChainConfig,
}

impl ProtocolChainBuilder {
    pub fn new() -> Self {
        Self {
            stages: Vec::new(),
            config: ChainConfig::default(),
        }
    }

    /// Add the next stage outward. The first stage added is the innermost.
    pub fn stage<P: Protocol + 'static>(mut self, protocol: P) -> Self {
        self.stages.push(Box::new(protocol));
        self
    }

    /// Add an already boxed stage.
    pub fn boxed_stage(mut self, protocol: Box<dyn Protocol>) -> Self {
        self.stages.push(protocol);
        self
    }

    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size.max(1);
        self
    }

    pub fn max_buffer_size(mut self, size: usize) -> Self {
        self.config.max_buffer_size = size;
        self
    }

    pub fn config(mut self, config: ChainConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the chain. At least one stage is required.
    pub fn build(self) -> Result<ProtocolChain> {
        if self.stages.is_empty() {
            return Err(WirechainError::setup("a protocol chain needs at least one stage"));
        }
        Ok(ProtocolChain {
            stages: self.stages,
            buffer: BytesMut::new(),
            pending: VecDeque::new(),
            config: self.config,
        })
    }
}

impl Default for ProtocolChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stacked protocol stages for one connection.
pub struct ProtocolChain {
    /// Innermost first.
    stages: Vec<Box<dyn Protocol>>,
    /// Bytes not yet consumed by the outermost stage.
    buffer: BytesMut,
    /// Decoded messages not yet returned.
    pending: VecDeque<Message>,
    config: ChainConfig,
}

/// Fold `Err(Incomplete)` into `None` alongside `Extract::Incomplete`.
fn verdict(result: Result<Extract>) -> Result<Option<(usize, Vec<Message>)>> {
    match result {
        Ok(Extract::Yield { consumed, messages }) => Ok(Some((consumed, messages))),
        Ok(Extract::Incomplete) => Ok(None),
        Err(e) if e.is_incomplete() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Decode one candidate at an inner stage, appending results to `out`.
///
/// A byte candidate that is only partly consumed is decoded again from the
/// remainder until it is used up or the stage reports incomplete. An
/// incomplete remainder is discarded.
fn decode_candidate(
    stage: &mut dyn Protocol,
    mut candidate: Message,
    out: &mut Vec<Message>,
) -> Result<()> {
    let mut decoded = 0;
    loop {
        let remainder = candidate.as_bytes().cloned();
        let Some((consumed, messages)) = verdict(stage.decode(candidate))? else {
            match remainder {
                Some(rest) if decoded > 0 => tracing::debug!(
                    "Stage {} discarded {} trailing bytes after {} messages",
                    stage.name(),
                    rest.len(),
                    decoded
                ),
                _ => {
                    tracing::trace!("Stage {} is waiting for more of a candidate", stage.name())
                }
            }
            return Ok(());
        };
        if messages.is_empty() {
            return Err(WirechainError::Protocol(format!(
                "{} yielded no messages",
                stage.name()
            )));
        }
        decoded += messages.len();
        out.extend(messages);

        match remainder {
            Some(bytes) if consumed > bytes.len() => {
                return Err(WirechainError::Protocol(format!(
                    "{} consumed {} of {} bytes",
                    stage.name(),
                    consumed,
                    bytes.len()
                )))
            }
            Some(bytes) if consumed > 0 && consumed < bytes.len() => {
                candidate = Message::Bytes(bytes.slice(consumed..));
            }
            _ => return Ok(()),
        }
    }
}

impl ProtocolChain {
    pub fn builder() -> ProtocolChainBuilder {
        ProtocolChainBuilder::new()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Stage names, innermost first.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of buffered bytes not yet decoded.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of decoded messages waiting to be returned.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Encode a message through every stage, innermost first.
    pub fn encode(&mut self, message: Message) -> Result<Bytes> {
        let mut frames = vec![message];
        for stage in self.stages.iter_mut() {
            let mut next = Vec::with_capacity(frames.len());
            for frame in frames {
                next.extend(stage.encode(frame)?);
            }
            frames = next;
        }

        let outermost = self.stages.last().map_or("", |s| s.name());
        let mut out = BytesMut::new();
        for frame in frames {
            out.extend_from_slice(&frame.into_bytes(outermost)?);
        }
        Ok(out.freeze())
    }

    /// Append raw input to the buffer.
    pub fn feed(&mut self, data: &[u8]) -> Result<()> {
        if self.buffer.len() + data.len() > self.config.max_buffer_size {
            return Err(WirechainError::corrupt(format!(
                "{} undecoded bytes exceed the {} byte buffer limit",
                self.buffer.len() + data.len(),
                self.config.max_buffer_size
            )));
        }
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Decode every complete message in `data` plus anything already buffered.
    ///
    /// Never waits for more input; a trailing partial message stays buffered.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<Message>> {
        self.feed(data)?;
        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }
        Ok(messages)
    }

    /// Next message from pending output or the buffer, without I/O.
    ///
    /// Returns `Ok(None)` when the outermost stage needs more input.
    pub fn next_message(&mut self) -> Result<Option<Message>> {
        if let Some(message) = self.pending.pop_front() {
            return Ok(Some(message));
        }

        let outer = self.stages.len() - 1;
        'walk: loop {
            let stage = &mut self.stages[outer];
            let Some((consumed, mut candidates)) = verdict(stage.decode_bytes(&self.buffer))? else {
                tracing::trace!(
                    "Stage {} needs more than {} buffered bytes",
                    stage.name(),
                    self.buffer.len()
                );
                return Ok(None);
            };

            if consumed == 0 || consumed > self.buffer.len() {
                return Err(WirechainError::Protocol(format!(
                    "{} reported {} consumed bytes with {} buffered",
                    stage.name(),
                    consumed,
                    self.buffer.len()
                )));
            }
            if candidates.is_empty() {
                return Err(WirechainError::Protocol(format!(
                    "{} yielded no messages",
                    stage.name()
                )));
            }
            self.buffer.advance(consumed);
            tracing::trace!(
                "Stage {} consumed {} bytes, {} left",
                stage.name(),
                consumed,
                self.buffer.len()
            );

            for stage in self.stages[..outer].iter_mut().rev() {
                let mut next = Vec::new();
                for candidate in candidates {
                    decode_candidate(stage.as_mut(), candidate, &mut next)?;
                }
                if next.is_empty() {
                    tracing::trace!("Stage {} has nothing yet, restarting walk", stage.name());
                    continue 'walk;
                }
                candidates = next;
            }

            self.pending.extend(candidates);
            return Ok(self.pending.pop_front());
        }
    }

    /// Read one message, pulling from `io` as the outermost stage needs.
    ///
    /// Bytes are appended to the buffer as soon as a read completes, so
    /// dropping this future (for example on timeout) loses no input.
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` at end of stream; any stage error is fatal for the
    /// connection.
    pub async fn read_message<R>(&mut self, io: &mut R) -> Result<Message>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut chunk = Vec::new();
        loop {
            if let Some(message) = self.next_message()? {
                return Ok(message);
            }

            if chunk.is_empty() {
                chunk = vec![0u8; self.config.read_chunk_size];
            }
            let n = io.read(&mut chunk).await?;
            if n == 0 {
                if !self.buffer.is_empty() {
                    tracing::debug!(
                        "Connection closed with {} undecoded bytes",
                        self.buffer.len()
                    );
                }
                return Err(WirechainError::ConnectionClosed);
            }
            tracing::trace!("Read {} bytes", n);
            self.feed(&chunk[..n])?;
        }
    }

    /// Encode `message` and write it to `io`.
    pub async fn write_message<W>(&mut self, io: &mut W, message: Message) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let bytes = self.encode(message)?;
        io.write_all(&bytes).await?;
        io.flush().await?;
        Ok(())
    }

    /// Forget buffered input and pending output and reset every stage.
    pub fn reset(&mut self) {
        tracing::debug!(
            "Resetting chain: dropping {} buffered bytes and {} pending messages",
            self.buffer.len(),
            self.pending.len()
        );
        self.buffer.clear();
        self.pending.clear();
        for stage in &mut self.stages {
            stage.reset();
        }
    }
}

impl fmt::Debug for ProtocolChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolChain")
            .field("stages", &self.stage_names())
            .field("buffered", &self.buffer.len())
            .field("pending", &self.pending.len())
            .field("config", &self.config)
            .finish()
    }
}
