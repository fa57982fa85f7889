//! Client-side `ssh-userauth` mechanics: method sequencing, the "smart
//! multi-factor" state machine and credential presentation.

use assh::{service::Request, session::Pipe, Error as TransportError, Session};
use ssh_packet::{arch, userauth, Packet};

mod method;
use method::Method;

mod prompter;
pub use prompter::{Prompt, Prompter};

#[doc(no_inline)]
pub use ssh_key::PrivateKey;

use crate::{Error, Methods, Result, SERVICE_NAME};

/// The maximum number of `keyboard-interactive` request/response rounds
/// before aborting with [`Error::AuthLimitExceeded`].
const KEYBOARD_INTERACTIVE_ROUND_LIMIT: usize = 5;

/// The state of the "smart multi-factor" sequencing machine.
#[derive(Debug, Default, PartialEq, Eq)]
enum State {
    /// No method has been tried yet; `none` is attempted first.
    #[default]
    NeedMethod,

    /// A method was just attempted and we're waiting for the server's verdict.
    Awaiting,

    /// The server reported `partial_success`; another method is required.
    PartialSuccess,

    /// The server accepted the authentication.
    Done,

    /// No more methods to try: every supplied credential was rejected.
    Exhausted,
}

/// The authentication [`Request`] for a _service_ `R`, requested once the
/// session authenticates successfully.
///
/// ```no_run
/// # async fn go<IO: assh::session::Pipe>(session: assh::Session<IO>) -> Result<(), Box<dyn std::error::Error>> {
/// let connect = session
///     .request(assh_auth::client::Auth::new("alice", assh_connect::Service).password("hunter2"))
///     .await?;
/// # Ok(()) }
/// ```
pub struct Auth<R> {
    username: arch::Utf8<'static>,
    service: R,

    methods: Vec<Method>,
    prompter: Option<Box<dyn Prompter>>,

    state: State,
    remaining: Methods,
}

impl<R: Request> Auth<R> {
    /// Create an [`Auth`] layer for the provided _username_, to access the provided _service_
    /// once authenticated.
    ///
    /// # Note
    /// 1. The layer always starts with the `none` authentication method to
    ///    discover the methods available on the server.
    /// 2. While the `publickey` method allows for multiple keys, the
    ///    `password` method only keeps the last one provided to [`Self::password`].
    pub fn new(username: impl Into<String>, service: R) -> Self {
        Self {
            username: arch::Utf8::Owned(username.into()),
            service,

            methods: Default::default(),
            prompter: None,

            state: State::default(),
            remaining: Methods::default(),
        }
    }

    /// Attempt to authenticate with the `password` method.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.methods
            .retain(|method| !matches!(method, Method::Password { .. }));
        self.methods.push(Method::Password {
            password: password.into(),
        });

        self
    }

    /// Attempt to authenticate with the `publickey` method.
    pub fn publickey(mut self, key: impl Into<PrivateKey>) -> Self {
        self.methods.push(Method::Publickey {
            key: Box::new(key.into()),
        });

        self
    }

    /// Attempt to authenticate with the `keyboard-interactive` method,
    /// mediating prompts through `prompter`.
    pub fn keyboard_interactive(mut self) -> Self {
        if !self.methods.contains(&Method::KeyboardInteractive) {
            self.methods.push(Method::KeyboardInteractive);
        }

        self
    }

    /// Install the [`Prompter`] used to answer `password`-change requests and
    /// `keyboard-interactive` challenges.
    pub fn prompter(mut self, prompter: impl Prompter + 'static) -> Self {
        self.prompter = Some(Box::new(prompter));

        self
    }

    /// The methods the server reported as still able to continue, as of the
    /// last `SSH_MSG_USERAUTH_FAILURE`.
    pub fn remaining(&self) -> Methods {
        self.remaining
    }

    fn next_method(&mut self, continue_with: &arch::NameList) -> Option<Method> {
        self.remaining = Methods::from_namelist(continue_with);

        let pos = self
            .methods
            .iter()
            .position(|m| continue_with.into_iter().any(|name| m.as_ascii() == name))?;

        Some(self.methods.remove(pos))
    }

    async fn attempt<IO: Pipe>(&mut self, session: &mut Session<IO>, method: &Method) -> Result<Packet> {
        let request = |method| userauth::Request {
            username: self.username.clone(),
            service_name: R::SERVICE_NAME.into(),
            method,
        };

        match method {
            Method::None => {
                session.send(&request(userauth::Method::None)).await?;

                Ok(session.recv().await?)
            }
            Method::Publickey { key } => {
                let algorithm = key.algorithm();

                // Probe the server for support of this key's algorithm before
                // producing (and sending) a signature over the exchange hash.
                session
                    .send(&request(userauth::Method::Publickey {
                        algorithm: algorithm.as_str().as_bytes().into(),
                        blob: key.public_key().to_bytes().map_err(assh::Error::from)?.into(),
                        signature: None,
                    }))
                    .await?;

                let response = session.recv().await?;
                if let Ok(userauth::PkOk { algorithm, blob }) = response.to() {
                    let signature = ssh_packet::crypto::signature::Publickey {
                        session_id: session
                            .session_id()
                            .expect("publickey authentication attempted before key-exchange")
                            .into(),
                        username: self.username.as_borrow(),
                        service_name: R::SERVICE_NAME.into(),
                        algorithm: algorithm.as_borrow(),
                        blob: blob.as_borrow(),
                    }
                    .sign(key.as_ref());

                    session
                        .send(&request(userauth::Method::Publickey {
                            algorithm,
                            blob,
                            signature: Some(signature.as_bytes().into()),
                        }))
                        .await?;

                    Ok(session.recv().await?)
                } else {
                    Ok(response)
                }
            }
            Method::Password { password } => {
                session
                    .send(&request(userauth::Method::Password {
                        password: password.as_str().into(),
                        new: None,
                    }))
                    .await?;

                let response = session.recv().await?;
                if let Ok(userauth::PasswdChangereq { prompt, .. }) = response.to() {
                    let new = self
                        .prompter
                        .as_mut()
                        .and_then(|prompter| prompter.retry_password(&prompt));

                    match new {
                        Some(new) => {
                            session
                                .send(&request(userauth::Method::Password {
                                    password: password.as_str().into(),
                                    new: Some(new.as_str().into()),
                                }))
                                .await?;

                            Ok(session.recv().await?)
                        }
                        None => Err(Error::PasswordChangeRequired),
                    }
                } else {
                    Ok(response)
                }
            }
            Method::KeyboardInteractive => {
                session
                    .send(&request(userauth::Method::KeyboardInteractive {
                        language: Default::default(),
                        submethods: Default::default(),
                    }))
                    .await?;

                let mut response = session.recv().await?;

                for _ in 0..KEYBOARD_INTERACTIVE_ROUND_LIMIT {
                    let Ok(userauth::InfoRequest {
                        name,
                        instruction,
                        prompts,
                        ..
                    }) = response.to()
                    else {
                        return Ok(response);
                    };

                    let prompts: Vec<_> = prompts
                        .into_iter()
                        .map(|p| Prompt {
                            text: p.prompt.into_string(),
                            echo: *p.echo,
                        })
                        .collect();

                    let answers = match (&mut self.prompter, prompts.is_empty()) {
                        (_, true) => Vec::new(),
                        (Some(prompter), false) => {
                            prompter.respond(&name, &instruction, &prompts)
                        }
                        (None, false) => Vec::new(),
                    };

                    session
                        .send(&userauth::InfoResponse {
                            responses: answers.into_iter().map(Into::into).collect(),
                        })
                        .await?;

                    response = session.recv().await?;
                }

                // The round limit is exhausted and the server is still sending
                // `USERAUTH_INFO_REQUEST`: abort rather than loop forever against
                // a malicious or broken peer.
                if response.to::<userauth::InfoRequest>().is_ok() {
                    return Err(Error::AuthLimitExceeded);
                }

                Ok(response)
            }
        }
    }
}

impl<R: Request> Request for Auth<R>
where
    R::Err: From<Error>,
{
    type Err = R::Err;
    type Ok<IO: Pipe> = R::Ok<IO>;

    const SERVICE_NAME: &'static str = SERVICE_NAME;

    async fn on_accept<IO: Pipe>(&mut self, mut session: Session<IO>) -> Result<Self::Ok<IO>, Self::Err> {
        self.state = State::NeedMethod;

        let mut method = Method::None;

        loop {
            tracing::debug!("Attempting authentication with method `{}`", method.as_ascii());

            let response = self.attempt(&mut session, &method).await.map_err(Into::into)?;

            if response.to::<userauth::Success>().is_ok() {
                tracing::debug!("Authenticated as `{}`", &*self.username);

                self.state = State::Done;
                session.mark_authenticated();

                break self.service.on_accept(session).await;
            } else if let Ok(userauth::Failure {
                continue_with,
                partial_success,
            }) = response.to()
            {
                self.state = if *partial_success {
                    State::PartialSuccess
                } else {
                    State::Awaiting
                };

                if let Some(next) = self.next_method(&continue_with) {
                    method = next;
                } else {
                    tracing::warn!("Authentication methods exhausted for `{}`", &*self.username);

                    self.state = State::Exhausted;

                    break Err(Error::AuthExhausted {
                        remaining: self.remaining(),
                    }
                    .into());
                }
            } else {
                break Err(Error::from(TransportError::UnexpectedMessage).into());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Request for Noop {
        type Err = Error;
        type Ok<IO: Pipe> = ();

        const SERVICE_NAME: &'static str = "noop@assh.rs";

        async fn on_accept<IO: Pipe>(&mut self, _: Session<IO>) -> Result<Self::Ok<IO>, Self::Err> {
            Ok(())
        }
    }

    fn namelist(methods: &[arch::Ascii<'static>]) -> arch::NameList<'static> {
        arch::NameList::from_iter(methods.iter().cloned())
    }

    #[test]
    fn next_method_picks_the_first_method_the_peer_allows() {
        let mut auth = Auth::new("user", Noop).password("hunter2");

        let picked = auth.next_method(&namelist(&[userauth::Method::PUBLICKEY, userauth::Method::PASSWORD]));

        assert_eq!(picked, Some(Method::Password { password: "hunter2".into() }));
        assert_eq!(auth.remaining(), Methods::PUBLICKEY | Methods::PASSWORD);
    }

    #[test]
    fn next_method_returns_none_once_every_method_was_attempted() {
        let mut auth = Auth::new("user", Noop).password("hunter2");

        assert!(auth.next_method(&namelist(&[userauth::Method::PASSWORD])).is_some());
        assert!(auth.next_method(&namelist(&[userauth::Method::PASSWORD])).is_none());
    }

    #[test]
    fn password_replaces_any_previously_supplied_password() {
        let auth = Auth::new("user", Noop).password("first").password("second");

        assert_eq!(auth.methods, vec![Method::Password { password: "second".into() }]);
    }

    #[test]
    fn keyboard_interactive_is_not_duplicated() {
        let auth = Auth::new("user", Noop)
            .keyboard_interactive()
            .keyboard_interactive();

        assert_eq!(auth.methods, vec![Method::KeyboardInteractive]);
    }
}
