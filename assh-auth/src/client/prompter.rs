//! The boundary through which the caller supplies credentials lazily,
//! mirroring the `UserInfo`-style callback of interactive SSH clients rather
//! than requiring every credential upfront.

/// A single challenge in a `keyboard-interactive` prompt bundle.
#[derive(Debug, Clone)]
pub struct Prompt {
    /// The text of the prompt, as sent by the server.
    pub text: String,

    /// Whether the caller's answer should be echoed back while typing.
    pub echo: bool,
}

/// Caller-supplied responder for interactive authentication steps.
///
/// The default [`Auth`](super::Auth) has none installed: [`Self::retry_password`]
/// and [`Self::respond`] are only invoked when a [`Prompter`] was attached
/// with [`Auth::prompter`](super::Auth::prompter).
pub trait Prompter: Send {
    /// The server asked for a new password (`SSH_MSG_USERAUTH_PASSWD_CHANGEREQ`),
    /// showing `prompt`. Returning `None` fails the authentication with
    /// [`Error::PasswordChangeRequired`](crate::Error::PasswordChangeRequired).
    fn retry_password(&mut self, prompt: &str) -> Option<String> {
        let _ = prompt;

        None
    }

    /// The server sent a `keyboard-interactive` prompt bundle; called exactly
    /// once per `SSH_MSG_USERAUTH_INFO_REQUEST`. An empty `prompts` slice is
    /// answered with an empty response vector automatically by the caller of
    /// this trait, matching RFC 4256 §3.3.
    fn respond(&mut self, name: &str, instructions: &str, prompts: &[Prompt]) -> Vec<String>;
}

impl Prompter for Box<dyn Prompter> {
    fn retry_password(&mut self, prompt: &str) -> Option<String> {
        (**self).retry_password(prompt)
    }

    fn respond(&mut self, name: &str, instructions: &str, prompts: &[Prompt]) -> Vec<String> {
        (**self).respond(name, instructions, prompts)
    }
}
