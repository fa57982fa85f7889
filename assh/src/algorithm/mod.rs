//! Supported algorithms for **compression**, **encryption**, **integrity** and **key-exchange**.

mod cipher;
pub use cipher::Cipher;
pub(crate) use cipher::CipherState;

mod compress;
pub use compress::Compress;

mod hmac;
pub use hmac::Hmac;

mod key;
pub use key::Key;

mod kex;
pub use kex::Kex;
pub(crate) use kex::negociate as negociate_kex;

/// The algorithms negotiated for the last completed key-exchange, one set
/// per direction.
#[derive(Debug, Clone)]
pub struct NegotiatedAlgorithms {
    /// Encryption algorithm used for traffic we send.
    pub cipher_tx: Cipher,
    /// Encryption algorithm used for traffic we receive.
    pub cipher_rx: Cipher,

    /// MAC algorithm used for traffic we send.
    pub hmac_tx: Hmac,
    /// MAC algorithm used for traffic we receive.
    pub hmac_rx: Hmac,

    /// Compression algorithm used for traffic we send.
    pub compress_tx: Compress,
    /// Compression algorithm used for traffic we receive.
    pub compress_rx: Compress,
}
