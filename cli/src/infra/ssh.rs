//! libssh2-backed implementation of the `RemoteConnector` and `RemoteSession`
//! ports.
//!
//! `ssh2` is blocking, so every call runs on tokio's blocking pool. The
//! session handle is reference counted and cloned into each blocking task.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use sha2::{Digest, Sha256};
use ssh2::{ErrorCode, ExtendedData, Session};
use tracing::{debug, info, warn};

use crate::application::ports::{CommandOutput, RemoteConnector, RemoteSession};
use crate::domain::connection::{ConnectionDescriptor, Credential};
use crate::domain::error::{ConnectionError, ExecError};

/// libssh2 `LIBSSH2_ERROR_TIMEOUT`.
const LIBSSH2_ERROR_TIMEOUT: i32 = -9;

/// Opens sessions with libssh2.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ssh2Connector;

/// One authenticated libssh2 session.
pub struct Ssh2Session {
    session: Session,
    target: String,
}

impl RemoteConnector for Ssh2Connector {
    type Session = Ssh2Session;

    async fn connect(
        &self,
        descriptor: &ConnectionDescriptor,
        timeout: Duration,
    ) -> Result<Ssh2Session, ConnectionError> {
        let descriptor = descriptor.clone();
        let addr = descriptor.address();
        tokio::task::spawn_blocking(move || connect_blocking(&descriptor, timeout))
            .await
            .map_err(|e| ConnectionError::Unreachable {
                addr,
                reason: format!("connect task failed: {e}"),
            })?
    }
}

impl RemoteSession for Ssh2Session {
    async fn exec(
        &mut self,
        command: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, ExecError> {
        let session = self.session.clone();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || exec_blocking(&session, &command, timeout))
            .await
            .map_err(|e| ExecError::Transport(format!("exec task failed: {e}")))?
    }

    async fn close(self) {
        let Self { session, target } = self;
        let result = tokio::task::spawn_blocking(move || {
            session.set_timeout(5_000);
            session.disconnect(None, "provisioning finished", None)
        })
        .await;
        match result {
            Ok(Ok(())) => debug!(host = %target, "ssh session disconnected"),
            Ok(Err(e)) => debug!(host = %target, error = %e, "ssh disconnect failed"),
            Err(e) => warn!(host = %target, error = %e, "ssh disconnect task failed"),
        }
    }
}

fn connect_blocking(
    descriptor: &ConnectionDescriptor,
    timeout: Duration,
) -> Result<Ssh2Session, ConnectionError> {
    let addr = descriptor.address();
    let stream = open_tcp(descriptor, timeout)?;

    let mut session = Session::new().map_err(|e| ConnectionError::Handshake {
        addr: addr.clone(),
        reason: e.message().to_string(),
    })?;
    session.set_tcp_stream(stream);
    session.set_timeout(timeout_millis(timeout));
    session.handshake().map_err(|e| {
        if is_timeout(&e) {
            ConnectionError::TimedOut {
                addr: addr.clone(),
                timeout,
            }
        } else {
            ConnectionError::Handshake {
                addr: addr.clone(),
                reason: e.message().to_string(),
            }
        }
    })?;

    if let Some(fingerprint) = host_key_fingerprint(&session) {
        info!(host = %addr, fingerprint = %fingerprint, "host key");
    }

    let user = descriptor.user();
    let auth = match descriptor.credential() {
        Credential::Password(password) => session.userauth_password(user, password),
        Credential::PrivateKey(key) => userauth_key(&session, user, key),
    };
    if let Err(e) = auth {
        if is_timeout(&e) {
            return Err(ConnectionError::TimedOut { addr, timeout });
        }
        return Err(ConnectionError::AuthRejected {
            user: user.to_string(),
            reason: e.message().to_string(),
        });
    }
    if !session.authenticated() {
        return Err(ConnectionError::AuthRejected {
            user: user.to_string(),
            reason: "server did not accept the credentials".to_string(),
        });
    }

    // Commands set their own ceiling.
    session.set_timeout(0);
    Ok(Ssh2Session {
        session,
        target: descriptor.target(),
    })
}

fn userauth_key(session: &Session, user: &str, key: &str) -> Result<(), ssh2::Error> {
    session.userauth_pubkey_memory(user, None, key, None)
}

fn open_tcp(descriptor: &ConnectionDescriptor, timeout: Duration) -> Result<TcpStream, ConnectionError> {
    let addr = descriptor.address();
    let candidates: Vec<SocketAddr> = (descriptor.host(), descriptor.port())
        .to_socket_addrs()
        .map_err(|e| ConnectionError::Resolve {
            host: descriptor.host().to_string(),
            reason: e.to_string(),
        })?
        .collect();
    if candidates.is_empty() {
        return Err(ConnectionError::Resolve {
            host: descriptor.host().to_string(),
            reason: "no addresses found".to_string(),
        });
    }

    let mut last_err = None;
    for candidate in candidates {
        debug!(address = %candidate, "opening tcp connection");
        match TcpStream::connect_timeout(&candidate, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    let err = last_err.unwrap_or_else(|| io::Error::other("no address could be reached"));
    Err(match err.kind() {
        io::ErrorKind::ConnectionRefused => ConnectionError::Refused { addr },
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            ConnectionError::TimedOut { addr, timeout }
        }
        _ => ConnectionError::Unreachable {
            addr,
            reason: err.to_string(),
        },
    })
}

fn exec_blocking(
    session: &Session,
    command: &str,
    timeout: Option<Duration>,
) -> Result<CommandOutput, ExecError> {
    session.set_timeout(timeout.map_or(0, timeout_millis));
    let limit = timeout.unwrap_or_default();
    let transport = |e: ssh2::Error| {
        if is_timeout(&e) {
            ExecError::TimedOut(limit)
        } else {
            ExecError::Transport(e.message().to_string())
        }
    };

    let mut channel = session.channel_session().map_err(transport)?;
    channel
        .handle_extended_data(ExtendedData::Merge)
        .map_err(transport)?;
    channel.exec(command).map_err(transport)?;

    let mut output = Vec::new();
    channel.read_to_end(&mut output).map_err(|e| {
        if e.kind() == io::ErrorKind::TimedOut {
            ExecError::TimedOut(limit)
        } else {
            ExecError::Transport(e.to_string())
        }
    })?;
    channel.wait_close().map_err(transport)?;
    let exit_status = channel.exit_status().map_err(transport)?;

    Ok(CommandOutput {
        exit_status,
        output,
    })
}

/// `SHA256:<base64>` fingerprint of the server host key, as OpenSSH prints it.
fn host_key_fingerprint(session: &Session) -> Option<String> {
    let (key, _kind) = session.host_key()?;
    Some(format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(key))))
}

fn is_timeout(err: &ssh2::Error) -> bool {
    err.code() == ErrorCode::Session(LIBSSH2_ERROR_TIMEOUT)
}

fn timeout_millis(timeout: Duration) -> u32 {
    u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX)
}
