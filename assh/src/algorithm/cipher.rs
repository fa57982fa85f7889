use ssh_packet::trans::KexInit;
use strum::{AsRefStr, EnumString};

use crate::{Error, Result};

/// Opaque, per-direction block/stream cipher state, boxed to erase which
/// concrete RustCrypto type backs the negotiated [`Cipher`] variant.
pub(crate) type CipherState = Box<dyn std::any::Any + Send + Sync>;

/// Negotiate the client-to-server and server-to-client ciphers from the two
/// peers' `KEXINIT` proposals, preferring the client's ordering.
pub(crate) fn negociate(clientkex: &KexInit, serverkex: &KexInit) -> Result<(Cipher, Cipher)> {
    Ok((
        clientkex
            .encryption_algorithms_client_to_server
            .preferred_in(&serverkex.encryption_algorithms_client_to_server)
            .ok_or(Error::NoCommonCipher)?
            .parse()
            .map_err(|_| Error::NoCommonCipher)?,
        clientkex
            .encryption_algorithms_server_to_client
            .preferred_in(&serverkex.encryption_algorithms_server_to_client)
            .ok_or(Error::NoCommonCipher)?
            .parse()
            .map_err(|_| Error::NoCommonCipher)?,
    ))
}

/// SSH cipher algorithms.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, EnumString, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Cipher {
    /// AES-256 in counter (CTR) mode.
    Aes256Ctr,

    /// AES-192 in counter (CTR) mode.
    Aes192Ctr,

    /// AES-128 in counter (CTR) mode.
    Aes128Ctr,

    /// AES-256 in cipher block chaining (CBC) mode.
    Aes256Cbc,

    /// AES-192 in cipher block chaining (CBC) mode.
    Aes192Cbc,

    /// AES-128 in cipher block chaining (CBC) mode.
    Aes128Cbc,

    /// TripleDES in cipher block chaining (CBC) mode.
    #[strum(serialize = "3des-cbc")]
    TDesCbc,

    /// No cipher algorithm.
    #[default]
    None,
}

impl Cipher {
    /// Lazily initializes and downcasts the boxed cipher state for `T`.
    fn state<'s, T: cipher::KeyIvInit + Send + Sync + 'static>(
        state: &'s mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
    ) -> Result<&'s mut T> {
        if state.is_none() {
            *state = Some(Box::new(
                T::new_from_slices(key, iv).map_err(|_| Error::Cipher)?,
            ));
        }

        state
            .as_mut()
            .and_then(|state| state.downcast_mut())
            .ok_or(Error::Cipher)
    }

    fn ctr<C: ctr::cipher::StreamCipher>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
        cipher.try_apply_keystream(buffer).map_err(|_| Error::Cipher)
    }

    pub(crate) fn encrypt(
        &mut self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        fn cbc<C: cbc::cipher::BlockEncryptMut>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.encrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.encrypt_block_inout_mut(block);
            }

            Ok(())
        }

        match self {
            Self::Aes256Ctr => Self::ctr(Self::state::<ctr::Ctr128BE<aes::Aes256>>(state, key, iv)?, buffer),
            Self::Aes192Ctr => Self::ctr(Self::state::<ctr::Ctr128BE<aes::Aes192>>(state, key, iv)?, buffer),
            Self::Aes128Ctr => Self::ctr(Self::state::<ctr::Ctr128BE<aes::Aes128>>(state, key, iv)?, buffer),
            Self::Aes256Cbc => cbc(Self::state::<cbc::Encryptor<aes::Aes256>>(state, key, iv)?, buffer),
            Self::Aes192Cbc => cbc(Self::state::<cbc::Encryptor<aes::Aes192>>(state, key, iv)?, buffer),
            Self::Aes128Cbc => cbc(Self::state::<cbc::Encryptor<aes::Aes128>>(state, key, iv)?, buffer),
            Self::TDesCbc => cbc(Self::state::<cbc::Encryptor<des::TdesEde3>>(state, key, iv)?, buffer),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn decrypt(
        &mut self,
        state: &mut Option<CipherState>,
        key: &[u8],
        iv: &[u8],
        buffer: &mut [u8],
    ) -> Result<()> {
        fn cbc<C: cbc::cipher::BlockDecryptMut>(cipher: &mut C, buffer: &mut [u8]) -> Result<()> {
            use cbc::cipher::inout;

            let data = inout::InOutBufReserved::from_mut_slice(buffer, buffer.len())
                .map_err(|_| Error::Cipher)?;

            let mut buf = data
                .into_padded_blocks::<cbc::cipher::block_padding::NoPadding, C::BlockSize>()
                .map_err(|_| Error::Cipher)?;

            cipher.decrypt_blocks_inout_mut(buf.get_blocks());
            if let Some(block) = buf.get_tail_block() {
                cipher.decrypt_block_inout_mut(block);
            }

            Ok(())
        }

        match self {
            // In CTR mode, encryption and decryption are the same operation.
            Self::Aes256Ctr | Self::Aes192Ctr | Self::Aes128Ctr => self.encrypt(state, key, iv, buffer),
            Self::Aes256Cbc => cbc(Self::state::<cbc::Decryptor<aes::Aes256>>(state, key, iv)?, buffer),
            Self::Aes192Cbc => cbc(Self::state::<cbc::Decryptor<aes::Aes192>>(state, key, iv)?, buffer),
            Self::Aes128Cbc => cbc(Self::state::<cbc::Decryptor<aes::Aes128>>(state, key, iv)?, buffer),
            Self::TDesCbc => cbc(Self::state::<cbc::Decryptor<des::TdesEde3>>(state, key, iv)?, buffer),
            Self::None => Ok(()),
        }
    }

    pub(crate) fn block_size(&self) -> usize {
        match self {
            Self::None | Self::TDesCbc => 8,
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc | Self::Aes128Ctr | Self::Aes192Ctr | Self::Aes256Ctr => 16,
        }
    }

    pub(crate) fn key_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Aes128Cbc | Self::Aes128Ctr => 16,
            Self::TDesCbc | Self::Aes192Cbc | Self::Aes192Ctr => 24,
            Self::Aes256Cbc | Self::Aes256Ctr => 32,
        }
    }

    pub(crate) fn iv_size(&self) -> usize {
        match self {
            Self::None => 0,
            Self::TDesCbc => 8,
            Self::Aes128Cbc | Self::Aes192Cbc | Self::Aes256Cbc | Self::Aes128Ctr | Self::Aes192Ctr | Self::Aes256Ctr => 16,
        }
    }
}
