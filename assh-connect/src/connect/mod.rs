//! Facilities to interract with the SSH _connect_ protocol.

use assh::{Pipe, Session};
use dashmap::{DashMap, DashSet};
use defer::defer;
use futures::{
    lock::{Mutex, MutexGuard},
    task::{self, AtomicWaker},
    FutureExt, SinkExt, Stream, TryStream,
};
use ssh_packet::{connect, IntoPacket, Packet};

use crate::channel;

mod poller;
use poller::Poller;

mod interest;
pub(crate) use interest::Interest;

pub mod channel_open;
pub mod global_request;

#[doc(no_inline)]
pub use connect::{ChannelOpenContext, ChannelOpenFailureReason, GlobalRequestContext};

/// A wrapper around a [`Session`] to interract with the connect layer.
pub struct Connect<IO>
where
    IO: Pipe,
{
    pub(crate) poller: Mutex<Poller<IO>>,
    pub(crate) channels: DashSet<u32>,

    interests: DashMap<Interest, AtomicWaker>,
    buffer: Mutex<Option<Packet>>,

    peer_id: assh::Id,
    host_key: Option<ssh_key::PublicKey>,
    negotiated: Option<assh::algorithm::NegotiatedAlgorithms>,
    session_id: Option<Vec<u8>>,
}

impl<IO> Connect<IO>
where
    IO: Pipe,
{
    pub(crate) fn new(session: Session<IO>) -> Self {
        // Snapshotted here: this is the last point the full `Session` (and
        // its key-exchange-derived metadata) is reachable before it's moved
        // into the `Poller`'s opaque send/recv state machine.
        let peer_id = session.peer_id().clone();
        let host_key = session.server_public_host_key().cloned();
        let negotiated = session.negotiated_algorithms();
        let session_id = session.session_id().map(<[u8]>::to_vec);

        Self {
            poller: Mutex::new(Poller::from(session)),
            channels: Default::default(),

            interests: Default::default(),
            buffer: Default::default(),

            peer_id,
            host_key,
            negotiated,
            session_id,
        }
    }

    /// The identification string advertised by the peer at connection time.
    pub fn peer_id(&self) -> &assh::Id {
        &self.peer_id
    }

    /// The server's host key, verified during the key-exchange that
    /// preceded authentication.
    pub fn server_public_host_key(&self) -> Option<&ssh_key::PublicKey> {
        self.host_key.as_ref()
    }

    /// The algorithms negotiated during the key-exchange that preceded
    /// authentication.
    pub fn negotiated_algorithms(&self) -> Option<&assh::algorithm::NegotiatedAlgorithms> {
        self.negotiated.as_ref()
    }

    /// The session identifier derived from the first key-exchange, used as
    /// the signature salt for `publickey` auth.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    fn poll_recv(
        &self,
        cx: &mut task::Context,
    ) -> task::Poll<assh::Result<MutexGuard<'_, Option<Packet>>>> {
        let mut buffer = futures::ready!(self.buffer.lock().poll_unpin(cx));

        if buffer.is_none() {
            let poller = futures::ready!(self.poller.lock().poll_unpin(cx));
            let mut poller = std::pin::Pin::new(poller);

            if let Some(res) = futures::ready!(poller.as_mut().poll_next(cx)) {
                *buffer = Some(res?);
            }
        }

        task::Poll::Ready(Ok(buffer))
    }

    pub(crate) fn poll_take(
        &self,
        cx: &mut task::Context,
        interest: Interest,
    ) -> task::Poll<Option<assh::Result<Packet>>> {
        tracing::trace!("POLLED ({interest:?})");
        // This is a genuine programming error from us if this happens,
        // which makes sense to panic!() to ensure test failure.
        #[allow(clippy::panic)]
        if let Some(waker) = self.interests.get(&interest) {
            waker.register(cx.waker());
        } else {
            panic!("Unable to register Waker to the `{interest:?}` interest, interest is not yet declared");
        }

        let mut buffer = futures::ready!(self.poll_recv(cx))?;

        tracing::trace!("RDY ({interest:?})");

        match buffer.take() {
            None => {
                self.interests.remove(&interest);
                for waker in self.interests.iter() {
                    waker.wake();
                }
                self.interests.clear();

                tracing::trace!("DEAD ({interest:?})");

                task::Poll::Ready(None)
            }
            Some(packet) => {
                let packet_interest = Interest::from(&packet);

                if interest == packet_interest {
                    tracing::trace!("HIT ({interest:?})");

                    task::Poll::Ready(Some(Ok(packet)))
                } else {
                    match (&packet_interest, self.interests.get(&packet_interest)) {
                        (packet_interest, Some(waker)) => {
                            tracing::trace!("MISS ({interest:?}), WOKE {packet_interest:?}");

                            *buffer = Some(packet);

                            waker.wake();
                            task::Poll::Pending
                        }
                        _ => {
                            tracing::warn!("Dropped {}bytes because interest was unregistered for `{packet_interest:?}`", packet.payload.len());

                            cx.waker().wake_by_ref();
                            task::Poll::Pending
                        }
                    }
                }
            }
        }
    }

    pub(crate) fn register(&self, interest: Interest) {
        // This is a genuine programming error from the user of the crate,
        // and could cause all sorts of runtime inconsistencies.
        #[allow(clippy::panic)]
        if self
            .interests
            .insert(interest, Default::default())
            .is_some()
        {
            panic!("Unable to register multiple concurrent interests for `{interest:?}`");
        }

        tracing::trace!("Registered interest for `{interest:?}`");
    }

    pub(crate) fn unregister(&self, interest: &Interest) {
        // This is a genuine programming error from the user of the crate,
        // and could cause all sorts of runtime inconsistencies.
        #[allow(clippy::panic)]
        if self.interests.remove(interest).is_none() {
            panic!("Interest `({interest:?})` wasn't already registered");
        }

        tracing::trace!("Unregistered interest for `{interest:?}`");
    }

    /// Unregister every currently-registered interest matching `predicate`.
    pub(crate) fn unregister_if(&self, predicate: impl Fn(&Interest) -> bool) {
        self.interests.retain(|interest, _| !predicate(interest));
    }

    pub(crate) fn local_id(&self) -> u32 {
        self.channels
            .iter()
            .map(|id| *id)
            .max()
            .map_or(0, |id| id + 1)
    }

    /// Make a _global request_ with the provided `context`, and wait for the peer's response.
    pub async fn global_request(
        &self,
        context: connect::GlobalRequestContext,
    ) -> Result<global_request::Response> {
        let with_port = matches!(
            context,
            connect::GlobalRequestContext::TcpipForward { bind_port: 0, .. }
        );

        const INTEREST: Interest = Interest::GlobalResponse;
        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        self.poller
            .lock()
            .await
            .send(
                connect::GlobalRequest {
                    want_reply: true.into(),
                    context,
                }
                .into_packet(),
            )
            .await?;

        let packet = futures::future::poll_fn(|cx| self.poll_take(cx, INTEREST))
            .await
            .ok_or(crate::Error::ChannelClosed)??;

        drop(unregister_on_drop);

        if packet.to::<connect::RequestFailure>().is_ok() {
            Ok(global_request::Response::Failure)
        } else if with_port {
            let connect::ForwardingSuccess { bound_port } = packet
                .to()
                .map_err(|_| assh::Error::UnexpectedMessage)?;

            Ok(global_request::Response::Success(Some(bound_port)))
        } else if packet.to::<connect::RequestSuccess>().is_ok() {
            Ok(global_request::Response::Success(None))
        } else {
            Err(assh::Error::UnexpectedMessage.into())
        }
    }

    /// Ping the peer with an OpenSSH-style `keepalive@openssh.com` global
    /// request. `ssh-packet`'s [`connect::GlobalRequestContext`] only
    /// encodes the forwarding-related request names (RFC 4254 §7.1), so this
    /// hand-encodes the `SSH_MSG_GLOBAL_REQUEST` payload per RFC 4254 §4
    /// instead of going through [`Connect::global_request`]. A compliant
    /// peer that doesn't recognize the name answers
    /// `SSH_MSG_REQUEST_FAILURE`, which is exactly the liveness signal this
    /// needs — any reply (success or failure) means the peer is alive.
    pub async fn keepalive(&self) -> Result<()> {
        const INTEREST: Interest = Interest::GlobalResponse;
        const NAME: &[u8] = b"keepalive@openssh.com";

        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        let mut payload = Vec::with_capacity(1 + 4 + NAME.len() + 1);
        payload.push(80u8); // SSH_MSG_GLOBAL_REQUEST
        payload.extend_from_slice(&(NAME.len() as u32).to_be_bytes());
        payload.extend_from_slice(NAME);
        payload.push(1u8); // want_reply = true

        self.poller.lock().await.send(Packet(payload)).await?;

        futures::future::poll_fn(|cx| self.poll_take(cx, INTEREST))
            .await
            .ok_or(crate::Error::ChannelClosed)??;

        drop(unregister_on_drop);

        Ok(())
    }

    /// Iterate over the incoming _global requests_ from the peer.
    pub fn global_requests(
        &self,
    ) -> impl TryStream<Ok = global_request::GlobalRequest<'_, IO>, Error = crate::Error> + '_
    {
        const INTEREST: Interest = Interest::GlobalRequest;

        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            self.poll_take(cx, INTEREST)
                .map_ok(|packet| global_request::GlobalRequest::new(self, packet.to().unwrap()))
                .map_err(Into::into)
        })
    }

    /// Request a new _channel_ with the provided `context`.
    pub async fn channel_open(
        &self,
        context: connect::ChannelOpenContext,
    ) -> Result<channel_open::Response<'_, IO>> {
        let local_id = self.local_id();
        let interest = Interest::ChannelOpenResponse(local_id);

        self.register(interest);
        let unregister_on_drop = defer::defer(move || self.unregister(&interest));

        self.poller
            .lock()
            .await
            .send(
                connect::ChannelOpen {
                    sender_channel: local_id,
                    initial_window_size: channel::LocalWindow::INITIAL_WINDOW_SIZE,
                    maximum_packet_size: channel::LocalWindow::MAXIMUM_PACKET_SIZE,
                    context,
                }
                .into_packet(),
            )
            .await?;

        let packet = futures::future::poll_fn(|cx| self.poll_take(cx, interest))
            .await
            .ok_or(crate::Error::ChannelClosed)??;

        drop(unregister_on_drop);

        if let Ok(open_failure) = packet.to::<connect::ChannelOpenFailure>() {
            Ok(channel_open::Response::Rejected {
                reason: open_failure.reason,
                message: open_failure.description.into_string(),
            })
        } else if let Ok(open_confirmation) = packet.to::<connect::ChannelOpenConfirmation>() {
            self.channels.insert(local_id);

            Ok(channel_open::Response::Success(channel::Channel::new(
                self,
                local_id,
                open_confirmation.sender_channel,
                open_confirmation.initial_window_size,
                open_confirmation.maximum_packet_size,
            )))
        } else {
            Err(assh::Error::UnexpectedMessage.into())
        }
    }

    /// Iterate over the incoming _channel open requests_ from the peer.
    pub fn channel_opens(
        &self,
    ) -> impl TryStream<Ok = channel_open::ChannelOpen<'_, IO>, Error = crate::Error> + '_ {
        const INTEREST: Interest = Interest::ChannelOpen;

        self.register(INTEREST);
        let unregister_on_drop = defer::defer(|| self.unregister(&INTEREST));

        futures::stream::poll_fn(move |cx| {
            let _moved = &unregister_on_drop;

            self.poll_take(cx, INTEREST)
                .map_ok(|packet| channel_open::ChannelOpen::new(self, packet.to().unwrap()))
                .map_err(Into::into)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_std::net::TcpStream;
    use futures::io::BufReader;

    #[test]
    fn assert_connect_is_send() {
        fn is_send<T: Send>() {}

        is_send::<Connect<BufReader<TcpStream>>>();
    }

    #[test]
    fn assert_connect_is_sync() {
        fn is_sync<T: Sync>() {}

        is_sync::<Connect<BufReader<TcpStream>>>();
    }
}
