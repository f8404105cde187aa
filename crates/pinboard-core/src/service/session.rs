//! Establishing authenticated POP3 sessions.

use std::future::Future;

use pinboard_pop3::{Client, Pop3Stream, Transaction};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};

use crate::Result;

/// Opens the byte stream a POP3 session runs over.
pub trait Connector: Send + Sync {
    /// Connected, ready-to-use stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a new stream to the server.
    fn connect(&self) -> impl Future<Output = pinboard_pop3::Result<Self::Stream>> + Send;

    /// Server description for logs.
    fn describe(&self) -> String;
}

/// Connects with implicit TLS.
#[derive(Debug, Clone)]
pub struct TlsConnector {
    host: String,
    port: u16,
}

impl TlsConnector {
    /// Create a connector for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Connector for TlsConnector {
    type Stream = Pop3Stream;

    async fn connect(&self) -> pinboard_pop3::Result<Pop3Stream> {
        pinboard_pop3::connect_tls(&self.host, self.port).await
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// An authenticated POP3 client.
pub type Session<S> = Client<S, Transaction>;

/// Connect to the server and log in with USER/PASS.
///
/// # Errors
///
/// Returns an error if connecting, reading the greeting or authenticating
/// fails.
pub async fn connect_and_login<C: Connector>(
    connector: &C,
    username: &str,
    password: &str,
) -> Result<Session<C::Stream>> {
    let server = connector.describe();

    let result = async {
        let stream = connector.connect().await?;
        let client = Client::from_stream(stream).await?;
        client.authenticate(username, password).await
    }
    .await;

    match result {
        Ok(session) => {
            info!(server = %server, username, "Login successful");
            Ok(session)
        }
        Err(e) => {
            warn!(server = %server, username, error = %e, "Login failed");
            Err(e.into())
        }
    }
}
