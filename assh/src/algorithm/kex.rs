use sha2::Sha256;
use signature::Verifier;
use ssh_key::Signature;
use ssh_packet::{
    arch::MpInt,
    binrw::BinWrite,
    cryptography::EcdhExchange,
    trans::{KexEcdhInit, KexEcdhReply, KexInit},
    Id,
};
use strum::{AsRefStr, EnumString};

use crate::{
    stream::{Keys, Stream, Transport, TransportPair},
    Error, HostKeyVerifier, Pipe, Result,
};

use super::{cipher, compress, hmac};

/// Negotiate the key-exchange algorithm from both `KEXINIT` proposals.
pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<Kex> {
    clientkex
        .kex_algorithms
        .preferred_in(&serverkex.kex_algorithms)
        .ok_or(Error::NoCommonKex)?
        .parse()
        .map_err(|_| Error::UnsupportedAlgorithm)
}

/// SSH key-exchange algorithms.
#[non_exhaustive]
#[derive(Debug, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Kex {
    /// Curve25519 ECDH with sha-2-256 digest.
    Curve25519Sha256,

    /// Curve25519 ECDH with sha-2-256 digest (pre-RFC 8731 name).
    #[strum(serialize = "curve25519-sha256@libssh.org")]
    Curve25519Sha256Libssh,
}

impl Kex {
    /// Run the client side of the key-exchange: generate an ephemeral keypair,
    /// exchange it for the server's, verify the host key's signature over the
    /// resulting hash against `verifier`, and derive the per-direction [`TransportPair`].
    pub(crate) async fn client(
        &self,
        stream: &mut Stream<impl Pipe>,
        v_c: &Id,
        v_s: &Id,
        i_c: KexInit<'_>,
        i_s: KexInit<'_>,
        verifier: &dyn HostKeyVerifier,
    ) -> Result<(TransportPair, ssh_key::PublicKey)> {
        let (client_cipher, server_cipher) = cipher::negociate(&i_c, &i_s)?;
        let (client_hmac, server_hmac) = hmac::negociate(&i_c, &i_s)?;
        let (client_compress, server_compress) = compress::negociate(&i_c, &i_s)?;

        match self {
            Self::Curve25519Sha256 | Self::Curve25519Sha256Libssh => {
                let e_c = x25519_dalek::EphemeralSecret::random_from_rng(rand::thread_rng());
                let q_c = x25519_dalek::PublicKey::from(&e_c);

                stream
                    .send(&KexEcdhInit {
                        q_c: q_c.as_bytes().to_vec().into(),
                    })
                    .await?;

                let ecdh: KexEcdhReply = stream.recv().await?.to()?;
                let q_s = x25519_dalek::PublicKey::from(
                    <[u8; 32]>::try_from(&*ecdh.q_s).map_err(|_| Error::KexError)?,
                );

                let secret: MpInt = e_c.diffie_hellman(&q_s).to_bytes().to_vec().into();

                let k_s = ssh_key::PublicKey::from_bytes(&ecdh.k_s)?;

                if !verifier.accept(&k_s).await {
                    return Err(Error::HostKeyRejected);
                }

                let exchange = EcdhExchange {
                    v_c: &v_c.to_string().into_bytes().into(),
                    v_s: &v_s.to_string().into_bytes().into(),
                    i_c: &{
                        let mut buffer = Vec::new();
                        i_c.write(&mut std::io::Cursor::new(&mut buffer))?;
                        buffer.into()
                    },
                    i_s: &{
                        let mut buffer = Vec::new();
                        i_s.write(&mut std::io::Cursor::new(&mut buffer))?;
                        buffer.into()
                    },
                    k_s: &ecdh.k_s,
                    q_c: &q_c.as_bytes().to_vec().into(),
                    q_s: &q_s.to_bytes().to_vec().into(),
                    k: &secret,
                };
                let hash = exchange.hash::<Sha256>();

                Verifier::verify(&k_s, &hash, &Signature::try_from(&*ecdh.signature)?)?;

                let session_id = stream.with_session(&hash).to_vec();

                Ok((
                    TransportPair {
                        tx: Transport {
                            chain: Keys::for_client_to_server::<Sha256>(
                                &secret,
                                &hash,
                                &session_id,
                                &client_cipher,
                                &client_hmac,
                            ),
                            state: None,
                            cipher: client_cipher,
                            hmac: client_hmac,
                            compress_active: client_compress != compress::Compress::ZlibOpenssh,
                            compress: client_compress,
                        },
                        rx: Transport {
                            chain: Keys::for_server_to_client::<Sha256>(
                                &secret,
                                &hash,
                                &session_id,
                                &server_cipher,
                                &server_hmac,
                            ),
                            state: None,
                            cipher: server_cipher,
                            hmac: server_hmac,
                            compress_active: server_compress != compress::Compress::ZlibOpenssh,
                            compress: server_compress,
                        },
                    },
                    k_s,
                ))
            }
        }
    }
}
