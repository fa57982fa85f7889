use bitflags::bitflags;
use ssh_packet::{arch, userauth};

bitflags! {
    /// Set of authentication methods, either attempted by the caller or
    /// advertised by the peer as still able to continue
    /// (see [`Auth::remaining`](crate::client::Auth::remaining)).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Methods: u8 {
        /// The SSH `none` authentication method.
        const NONE = 1 << 0;

        /// The SSH `publickey` authentication method.
        const PUBLICKEY = 1 << 1;

        /// The SSH `password` authentication method.
        const PASSWORD = 1 << 2;

        /// The SSH `keyboard-interactive` authentication method.
        const KEYBOARD_INTERACTIVE = 1 << 3;
    }
}

impl Default for Methods {
    fn default() -> Self {
        Self::NONE
    }
}

impl Methods {
    pub(crate) fn from_namelist(list: &arch::NameList<'_>) -> Self {
        list.into_iter().fold(Self::empty(), |acc, name| {
            acc | match name {
                n if n == userauth::Method::NONE => Self::NONE,
                n if n == userauth::Method::PUBLICKEY => Self::PUBLICKEY,
                n if n == userauth::Method::PASSWORD => Self::PASSWORD,
                n if n == userauth::Method::KEYBOARD_INTERACTIVE => Self::KEYBOARD_INTERACTIVE,
                _ => Self::empty(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_namelist_parses_known_methods() {
        let list = arch::NameList::from_iter([userauth::Method::PASSWORD, userauth::Method::PUBLICKEY]);

        assert_eq!(
            Methods::from_namelist(&list),
            Methods::PASSWORD | Methods::PUBLICKEY
        );
    }

    #[test]
    fn from_namelist_ignores_unknown_methods() {
        let list = arch::NameList::from_iter([userauth::Method::HOSTBASED, userauth::Method::PASSWORD]);

        assert_eq!(Methods::from_namelist(&list), Methods::PASSWORD);
    }
}
