//! The _channel open requests_ and responses.

use assh::Pipe;
use futures::SinkExt;
use ssh_packet::{arch, connect, IntoPacket};

use super::Connect;
use crate::{channel, Result};

#[doc(no_inline)]
pub use ssh_packet::connect::{ChannelOpenContext, ChannelOpenFailureReason};

/// The outcome of a _channel open request_ we made to the peer.
pub enum Response<'r, IO: Pipe> {
    /// The peer accepted the channel opening.
    Success(channel::Channel<'r, IO>),

    /// The peer refused the channel opening.
    Rejected {
        /// The reason for failure.
        reason: ChannelOpenFailureReason,

        /// A textual message to accompany the reason.
        message: String,
    },
}

/// A received _channel open request_.
pub struct ChannelOpen<'r, IO: Pipe> {
    connect: &'r Connect<IO>,
    inner: connect::ChannelOpen,
}

impl<'r, IO: Pipe> ChannelOpen<'r, IO> {
    pub(super) fn new(connect: &'r Connect<IO>, inner: connect::ChannelOpen) -> Self {
        Self { connect, inner }
    }

    /// Access the _context_ of the channel open request.
    pub fn cx(&self) -> &ChannelOpenContext {
        &self.inner.context
    }

    /// Accept the channel open request.
    pub async fn accept(self) -> Result<channel::Channel<'r, IO>> {
        let local_id = self.connect.local_id();

        self.connect
            .poller
            .lock()
            .await
            .send(
                connect::ChannelOpenConfirmation {
                    recipient_channel: self.inner.sender_channel,
                    sender_channel: local_id,
                    initial_window_size: channel::LocalWindow::INITIAL_WINDOW_SIZE,
                    maximum_packet_size: channel::LocalWindow::MAXIMUM_PACKET_SIZE,
                }
                .into_packet(),
            )
            .await?;

        self.connect.channels.insert(local_id);

        tracing::debug!(
            "Accepted channel open request {}:{}",
            local_id,
            self.inner.sender_channel
        );

        Ok(channel::Channel::new(
            self.connect,
            local_id,
            self.inner.sender_channel,
            self.inner.initial_window_size,
            self.inner.maximum_packet_size,
        ))
    }

    /// Reject the channel open request.
    pub async fn reject(self, reason: ChannelOpenFailureReason, description: &str) -> Result<()> {
        self.connect
            .poller
            .lock()
            .await
            .send(
                connect::ChannelOpenFailure {
                    recipient_channel: self.inner.sender_channel,
                    reason,
                    description: arch::Utf8::Owned(description.to_string()),
                    language: Default::default(),
                }
                .into_packet(),
            )
            .await?;

        Ok(())
    }
}
