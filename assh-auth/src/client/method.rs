use ssh_key::PrivateKey;
use ssh_packet::{arch, userauth};

/// An authentication method the caller has supplied credentials for.
#[derive(Debug)]
pub enum Method {
    /// The SSH `none` authentication method, always attempted first to
    /// discover the methods the server supports.
    None,

    /// The SSH `publickey` authentication method.
    Publickey {
        /// The key to authenticate with.
        key: Box<PrivateKey>,
    },

    /// The SSH `password` authentication method.
    Password {
        /// The password to authenticate with.
        password: String,
    },

    /// The SSH `keyboard-interactive` authentication method.
    KeyboardInteractive,
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other)
    }
}

impl Eq for Method {}

impl Method {
    /// The wire name for this method, as used in `SSH_MSG_USERAUTH_REQUEST`
    /// and in the `continue_with` list of `SSH_MSG_USERAUTH_FAILURE`.
    pub fn as_ascii(&self) -> arch::Ascii<'static> {
        match self {
            Self::None => userauth::Method::NONE,
            Self::Publickey { .. } => userauth::Method::PUBLICKEY,
            Self::Password { .. } => userauth::Method::PASSWORD,
            Self::KeyboardInteractive => userauth::Method::KEYBOARD_INTERACTIVE,
        }
    }
}
