//! One protocol chain bound to one async stream.
//!
//! # Example
//!
//! ```
//! use wirechain::protocol::{Message, MsgPackProtocol, SizedProtocol};
//! use wirechain::rpc::RpcCall;
//! use wirechain::{Endpoint, ProtocolChain};
//!
//! fn chain() -> ProtocolChain {
//!     ProtocolChain::builder()
//!         .stage(MsgPackProtocol::new())
//!         .stage(SizedProtocol::new())
//!         .build()
//!         .unwrap()
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let (client, server) = tokio::io::duplex(1024);
//! let mut server = Endpoint::new(chain(), server);
//! tokio::spawn(async move {
//!     server
//!         .serve(|call| async move { Ok(serde_json::json!(call.method.len())) })
//!         .await
//! });
//!
//! let mut client = Endpoint::new(chain(), client);
//! let answer = client.call(&RpcCall::new("", "hello")).await.unwrap();
//! assert_eq!(answer, 5);
//! # });
//! ```

use std::future::Future;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::chain::ProtocolChain;
use crate::error::{Result, WirechainError};
use crate::protocol::Message;
use crate::rpc::{RpcCall, RpcReply};

/// A connection: the chain that frames it and the stream it runs over.
#[derive(Debug)]
pub struct Endpoint<S> {
    chain: ProtocolChain,
    stream: S,
}

impl<S> Endpoint<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(chain: ProtocolChain, stream: S) -> Self {
        Self { chain, stream }
    }

    pub fn chain(&self) -> &ProtocolChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut ProtocolChain {
        &mut self.chain
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn into_parts(self) -> (ProtocolChain, S) {
        (self.chain, self.stream)
    }

    pub async fn read_message(&mut self) -> Result<Message> {
        self.chain.read_message(&mut self.stream).await
    }

    pub async fn write_message(&mut self, message: Message) -> Result<()> {
        self.chain.write_message(&mut self.stream, message).await
    }

    /// Write `message` and wait for the next incoming one.
    pub async fn request(&mut self, message: Message) -> Result<Message> {
        self.write_message(message).await?;
        self.read_message().await
    }

    /// Invoke a remote method and return its value.
    ///
    /// # Errors
    ///
    /// `WirechainError::Remote` when the peer replies with an error.
    pub async fn call(&mut self, call: &RpcCall) -> Result<Value> {
        let reply = self.request(call.to_message()?).await?;
        RpcReply::from_message(&reply)?.into_result()
    }

    /// Answer incoming calls with `handler` until the peer disconnects.
    ///
    /// Handler failures and malformed calls are answered with an error reply;
    /// only stream and chain errors end the loop. Returns the number of calls
    /// answered.
    pub async fn serve<F, Fut>(&mut self, mut handler: F) -> Result<u64>
    where
        F: FnMut(RpcCall) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut answered = 0u64;
        loop {
            let message = match self.read_message().await {
                Ok(message) => message,
                Err(WirechainError::ConnectionClosed) => {
                    tracing::debug!("Peer disconnected after {} calls", answered);
                    return Ok(answered);
                }
                Err(e) => {
                    tracing::error!("Read loop error: {}", e);
                    return Err(e);
                }
            };

            let reply = match RpcCall::from_message(&message) {
                Ok(call) => {
                    let name = call.qualified_name();
                    match handler(call).await {
                        Ok(value) => RpcReply::Ok(value),
                        Err(e) => {
                            tracing::warn!("Handler error for {}: {}", name, e);
                            RpcReply::Error(e.to_string())
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Ignoring malformed {} message: {}", message.kind(), e);
                    RpcReply::Error(format!("malformed call: {e}"))
                }
            };

            self.write_message(reply.to_message()?).await?;
            answered += 1;
        }
    }
}
