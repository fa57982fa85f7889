use std::num::NonZeroU32;

use ssh_packet::{connect, Packet};

/// A classification of packets handled by the _connect_ layer's demultiplexer.
#[derive(Debug, Hash, PartialEq, Eq, Clone, Copy)]
pub enum Interest {
    /// A _global request_ from the peer.
    GlobalRequest,

    /// A response to one of our _global requests_.
    GlobalResponse,

    /// A _channel open request_ from the peer.
    ChannelOpen,

    /// A response to one of our _channel open requests_, keyed by our local id.
    ChannelOpenResponse(u32),

    /// A _window adjust_ for one of our channels, keyed by our local id.
    ChannelWindowAdjust(u32),

    /// _Data_ (or _extended data_) for one of our channels, keyed by our local id
    /// and the extended data stream identifier, if any.
    ChannelData(u32, Option<NonZeroU32>),

    /// An _EOF_ for one of our channels, keyed by our local id.
    ChannelEof(u32),

    /// A _close_ for one of our channels, keyed by our local id.
    ChannelClose(u32),

    /// A _channel request_ for one of our channels, keyed by our local id.
    ChannelRequest(u32),

    /// A response to one of our _channel requests_, keyed by our local id.
    ChannelResponse(u32),

    /// Unrecognized, or uninteresting to the demultiplexer.
    None,
}

impl From<&Packet> for Interest {
    fn from(packet: &Packet) -> Self {
        if packet.to::<connect::GlobalRequest>().is_ok() {
            Self::GlobalRequest
        } else if packet.to::<connect::RequestSuccess>().is_ok()
            || packet.to::<connect::ForwardingSuccess>().is_ok()
            || packet.to::<connect::RequestFailure>().is_ok()
        {
            Self::GlobalResponse
        } else if packet.to::<connect::ChannelOpen>().is_ok() {
            Self::ChannelOpen
        } else if let Ok(message) = packet.to::<connect::ChannelOpenConfirmation>() {
            Self::ChannelOpenResponse(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelOpenFailure>() {
            Self::ChannelOpenResponse(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelWindowAdjust>() {
            Self::ChannelWindowAdjust(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelData>() {
            Self::ChannelData(message.recipient_channel, None)
        } else if let Ok(message) = packet.to::<connect::ChannelExtendedData>() {
            Self::ChannelData(message.recipient_channel, Some(message.data_type))
        } else if let Ok(message) = packet.to::<connect::ChannelEof>() {
            Self::ChannelEof(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelClose>() {
            Self::ChannelClose(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelRequest>() {
            Self::ChannelRequest(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelSuccess>() {
            Self::ChannelResponse(message.recipient_channel)
        } else if let Ok(message) = packet.to::<connect::ChannelFailure>() {
            Self::ChannelResponse(message.recipient_channel)
        } else {
            Self::None
        }
    }
}

#[cfg(test)]
mod tests {
    use ssh_packet::IntoPacket;

    use super::*;

    #[test]
    fn classifies_global_request() {
        let packet = connect::GlobalRequest {
            want_reply: true.into(),
            context: connect::GlobalRequestContext::TcpipForward {
                bind_address: Default::default(),
                bind_port: 0,
            },
        }
        .into_packet();

        assert_eq!(Interest::from(&packet), Interest::GlobalRequest);
    }

    #[test]
    fn classifies_request_success_as_global_response() {
        let packet = connect::RequestSuccess.into_packet();

        assert_eq!(Interest::from(&packet), Interest::GlobalResponse);
    }

    #[test]
    fn classifies_channel_data_keyed_by_recipient() {
        let packet = connect::ChannelData {
            recipient_channel: 42,
            data: Default::default(),
        }
        .into_packet();

        assert_eq!(Interest::from(&packet), Interest::ChannelData(42, None));
    }

    #[test]
    fn classifies_channel_extended_data_keyed_by_recipient_and_stream() {
        let data_type = std::num::NonZeroU32::new(1).unwrap();
        let packet = connect::ChannelExtendedData {
            recipient_channel: 7,
            data_type,
            data: Default::default(),
        }
        .into_packet();

        assert_eq!(
            Interest::from(&packet),
            Interest::ChannelData(7, Some(data_type))
        );
    }

    #[test]
    fn classifies_channel_close() {
        let packet = connect::ChannelClose {
            recipient_channel: 3,
        }
        .into_packet();

        assert_eq!(Interest::from(&packet), Interest::ChannelClose(3));
    }

    #[test]
    fn classifies_unimplemented_as_none() {
        let packet = ssh_packet::trans::Ignore {
            data: Default::default(),
        }
        .into_packet();

        assert_eq!(Interest::from(&packet), Interest::None);
    }
}
