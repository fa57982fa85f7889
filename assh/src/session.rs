use either::Either;
use futures::{AsyncBufRead, AsyncWrite, AsyncWriteExt};
use futures_time::future::FutureExt;
use ssh_packet::{
    arch::StringUtf8,
    trans::{Debug, Disconnect, DisconnectReason, Ignore, KexInit, ServiceAccept, ServiceRequest, Unimplemented},
    Id, IntoPacket, Packet,
};

use crate::{
    error::{DisconnectedBy, DisconnectedError, Error, Result},
    service, stream::Stream, Client,
};

/// A trait alias for something _pipe-alike_, implementing [`AsyncBufRead`] and [`AsyncWrite`].
pub trait Pipe: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static {}
impl<T: AsyncBufRead + AsyncWrite + Unpin + Send + Sync + 'static> Pipe for T {}

/// A client session wrapping a [`Pipe`] to handle the **identification
/// exchange**, **key-exchange** and **`SSH-TRANS`** layer messages
/// ([RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253)).
///
/// Authentication (`ssh-userauth`) and the connection protocol
/// (`ssh-connection`) are negotiated on top via [`Session::request`], see the
/// `assh-auth` and `assh-connect` crates.
pub struct Session<IO: Pipe> {
    stream: Either<Stream<IO>, DisconnectedError>,
    config: Client,

    peer_id: Id,
}

impl<IO> Session<IO>
where
    IO: Pipe,
{
    /// Create a new [`Session`] from a [`Pipe`] stream and a [`Client`] configuration.
    ///
    /// This performs the identification exchange immediately; the first
    /// key-exchange is deferred until the first [`Session::send`]/[`Session::recv`].
    pub async fn new(mut stream: IO, config: Client) -> Result<Self> {
        config.id.to_async_writer(&mut stream).await?;
        stream.flush().await?;

        let peer_id = Id::from_async_reader(&mut stream).timeout(config.timeout()).await??;

        let stream = Stream::new(stream, config.timeout());

        tracing::debug!("Session started with peer `{peer_id}`");

        Ok(Self {
            stream: Either::Left(stream),
            config,
            peer_id,
        })
    }

    /// Access the [`Id`] of the connected peer.
    pub fn peer_id(&self) -> &Id {
        &self.peer_id
    }

    /// Access the session identifier derived from the first key-exchange hash.
    ///
    /// Returns `None` until the first key-exchange has completed.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.stream.as_ref().left().and_then(Stream::session_id)
    }

    /// Access the server's host key, verified during the last completed
    /// key-exchange.
    ///
    /// Returns `None` until the first key-exchange has completed.
    pub fn server_public_host_key(&self) -> Option<&ssh_key::PublicKey> {
        self.stream.as_ref().left().and_then(Stream::host_key)
    }

    /// Access the algorithms negotiated during the last completed
    /// key-exchange.
    ///
    /// Returns `None` until the first key-exchange has completed.
    pub fn negotiated_algorithms(&self) -> Option<crate::algorithm::NegotiatedAlgorithms> {
        self.stream.as_ref().left().and_then(Stream::negotiated)
    }

    /// Access the identification string we advertised to the peer — this is
    /// our own side; see [`Session::peer_id`] for theirs.
    pub fn id(&self) -> &Id {
        &self.config.id
    }

    /// Waits until the [`Session`] becomes readable, mainly to be used with
    /// [`Session::recv`] in [`futures::select`].
    ///
    /// # Cancel safety
    /// This method is cancel-safe.
    pub async fn readable(&mut self) -> Result<()> {
        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return Err(err.clone().into()),
        };

        stream.fill_buf().await
    }

    /// Receive a _packet_ from the connected peer, transparently handling
    /// rekeying and `SSH-TRANS` housekeeping messages (`ignore`, `debug`,
    /// `unimplemented`, `disconnect`).
    ///
    /// # Cancel safety
    /// This method is **not cancel-safe**: if used within [`futures::select`],
    /// some data may be partially received.
    pub async fn recv(&mut self) -> Result<Packet> {
        loop {
            let stream = match &mut self.stream {
                Either::Left(stream) => stream,
                Either::Right(err) => return Err(err.clone().into()),
            };

            if stream.is_rekeyable() || stream.peek().await?.to::<KexInit>().is_ok() {
                if let Err(err) = self.config.kex(stream, &self.peer_id).await {
                    return Err(self
                        .disconnect(DisconnectReason::KeyExchangeFailed, err.to_string())
                        .await
                        .into());
                }

                continue;
            }

            let packet = stream.recv().await?;

            if let Ok(Disconnect { reason, description, .. }) = packet.to() {
                tracing::warn!("Peer disconnected with `{reason:?}`: {}", &*description);

                self.stream = Either::Right(DisconnectedError {
                    by: DisconnectedBy::Them,
                    reason,
                    description: description.into_string(),
                });
            } else if let Ok(Ignore { data }) = packet.to() {
                tracing::debug!("Received an 'ignore' message with length {}", data.len());
            } else if let Ok(Unimplemented { seq }) = packet.to() {
                tracing::debug!("Received an 'unimplemented' message about packet #{seq}");
            } else if let Ok(Debug { message, .. }) = packet.to() {
                tracing::debug!("Received a 'debug' message: {}", &*message);
            } else {
                break Ok(packet);
            }
        }
    }

    /// Send a _packet_ to the connected peer, transparently rekeying first when due.
    pub async fn send(&mut self, message: impl IntoPacket) -> Result<()> {
        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return Err(err.clone().into()),
        };

        if stream.is_rekeyable() || (stream.is_readable().await? && stream.peek().await?.to::<KexInit>().is_ok()) {
            if let Err(err) = self.config.kex(stream, &self.peer_id).await {
                return Err(self
                    .disconnect(DisconnectReason::KeyExchangeFailed, err.to_string())
                    .await
                    .into());
            }
        }

        stream.send(message).await
    }

    /// Mark authentication as completed on this session, activating any
    /// `zlib@openssh.com` compressor negotiated at key-exchange time but
    /// deferred until after `ssh-userauth` succeeds. Called by the
    /// authentication layer once it receives `SSH_MSG_USERAUTH_SUCCESS`; a
    /// no-op under any other compression
    /// algorithm.
    pub fn mark_authenticated(&mut self) {
        if let Either::Left(stream) = &mut self.stream {
            stream.mark_authenticated();
        }
    }

    /// Send a _disconnect_ message to the peer and shut down the session.
    pub async fn disconnect(&mut self, reason: DisconnectReason, description: impl Into<StringUtf8>) -> DisconnectedError {
        let stream = match &mut self.stream {
            Either::Left(stream) => stream,
            Either::Right(err) => return err.clone(),
        };

        let message = Disconnect {
            reason,
            description: description.into(),
            language: Default::default(),
        };
        if let Err(Error::Disconnected(err)) = stream.send(&message).await {
            return err;
        }

        let err = DisconnectedError {
            by: DisconnectedBy::Us,
            reason: message.reason,
            description: message.description.into_string(),
        };
        self.stream = Either::Right(err.clone());

        err
    }

    /// Request a _service_ from the peer.
    pub async fn request<R>(mut self, mut service: R) -> Result<R::Ok<IO>, R::Err>
    where
        R: service::Request,
    {
        self.send(&ServiceRequest {
            service_name: R::SERVICE_NAME.into(),
        })
        .await?;

        let packet = self.recv().await?;
        if let Ok(ServiceAccept { service_name }) = packet.to() {
            if &*service_name == R::SERVICE_NAME.as_bytes() {
                service.on_accept(self).await
            } else {
                Err(Error::from(
                    self.disconnect(DisconnectReason::ServiceNotAvailable, "Accepted service is unknown")
                        .await,
                )
                .into())
            }
        } else {
            Err(Error::from(
                self.disconnect(DisconnectReason::ProtocolError, "Unexpected message outside of a service response")
                    .await,
            )
            .into())
        }
    }
}

impl<IO> Drop for Session<IO>
where
    IO: Pipe,
{
    fn drop(&mut self) {
        let err = futures::executor::block_on(self.disconnect(DisconnectReason::ByApplication, "user closed the session"));

        tracing::debug!("Session closed with peer `{}`: {err}", self.peer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_std::net::TcpStream;
    use futures::io::BufReader;

    #[test]
    fn assert_session_is_send() {
        fn is_send<T: Send>() {}

        is_send::<Session<BufReader<TcpStream>>>();
    }

    #[test]
    fn assert_session_is_sync() {
        fn is_sync<T: Sync>() {}

        is_sync::<Session<BufReader<TcpStream>>>();
    }
}
