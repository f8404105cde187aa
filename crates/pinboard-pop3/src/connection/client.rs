//! Type-state POP3 client.

use crate::command::{Command, MessageId};
use crate::error::{Error, Result};
use crate::parser::{is_terminator, parse_scan_listing, parse_stat, parse_status, unstuff_line};
use crate::types::{MaildropStat, ScanListing};
use std::io;
use std::marker::PhantomData;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::debug;

/// Longest response line accepted, terminator excluded. Reads stop there.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Type-state marker for the AUTHORIZATION state.
#[derive(Debug)]
pub struct Authorization;

/// Type-state marker for the TRANSACTION state.
#[derive(Debug)]
pub struct Transaction;

/// POP3 client with type-state pattern.
///
/// The client owns the stream exclusively and performs no retries: every
/// failure is surfaced to the caller.
#[derive(Debug)]
pub struct Client<S, State> {
    reader: BufReader<S>,
    greeting: String,
    _state: PhantomData<State>,
}

impl<S> Client<S, Authorization>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and consumes the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or the greeting is not
    /// a positive status line.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut reader = BufReader::new(stream);
        let line = read_line(&mut reader).await?;
        debug!(response = %line, "RECEIVE greeting");

        let greeting = parse_status(&line)?;

        Ok(Self {
            reader,
            greeting,
            _state: PhantomData,
        })
    }

    /// Sends USER with the mailbox name.
    ///
    /// Prefer [`Client::authenticate`], which also sends PASS.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the name.
    pub async fn user(&mut self, username: &str) -> Result<()> {
        self.command(Command::User {
            name: username.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Sends PASS and enters the TRANSACTION state.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the password.
    pub async fn pass(mut self, password: &str) -> Result<Client<S, Transaction>> {
        self.command(Command::Pass {
            secret: password.to_string(),
        })
        .await?;

        Ok(Client {
            reader: self.reader,
            greeting: self.greeting,
            _state: PhantomData,
        })
    }

    /// Authenticates with USER/PASS.
    ///
    /// PASS is only sent once USER succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first command error.
    pub async fn authenticate(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Transaction>> {
        self.user(username).await?;
        self.pass(password).await
    }
}

impl<S> Client<S, Transaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Retrieves the maildrop summary.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the response is not two integers.
    pub async fn stat(&mut self) -> Result<MaildropStat> {
        let payload = self.command(Command::Stat).await?;
        parse_stat(&payload)
    }

    /// Lists every message in the maildrop, in server order.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or a listing line is malformed.
    pub async fn list_all(&mut self) -> Result<Vec<ScanListing>> {
        self.command(Command::List { msg: None }).await?;
        let lines = self.read_multiline().await?;
        lines
            .iter()
            .map(|line| parse_scan_listing(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Returns the size of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the message does not exist or the response is malformed.
    pub async fn list(&mut self, msg: MessageId) -> Result<u64> {
        let payload = self.command(Command::List { msg: Some(msg) }).await?;
        Ok(parse_scan_listing(&payload)?.size)
    }

    /// Downloads a message as raw octets. Lines are joined with LF, whatever
    /// the server sent.
    ///
    /// No character set is assumed: 8bit bodies reach the caller unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails or the stream ends early.
    pub async fn retr(&mut self, msg: MessageId) -> Result<Vec<u8>> {
        self.command(Command::Retr { msg }).await?;
        let lines = self.read_multiline().await?;
        Ok(lines.join(&b'\n'))
    }

    /// Marks a message as deleted. The deletion only happens on QUIT.
    ///
    /// # Errors
    ///
    /// Returns an error if the server refuses; the message must then be
    /// considered still present.
    pub async fn dele(&mut self, msg: MessageId) -> Result<()> {
        self.command(Command::Dele { msg }).await?;
        Ok(())
    }

    /// Does nothing, but keeps the session alive on servers with idle timers.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn noop(&mut self) -> Result<()> {
        self.command(Command::Noop).await?;
        Ok(())
    }

    /// Unmarks every message marked as deleted in this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn rset(&mut self) -> Result<()> {
        self.command(Command::Rset).await?;
        Ok(())
    }
}

// Common implementation for all states
impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the text of the server greeting.
    #[must_use]
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    /// Sends one command and returns the payload of its positive status line.
    async fn command(&mut self, cmd: Command) -> Result<String> {
        debug!(command = ?cmd, "SEND");

        let data = cmd.serialize();
        let stream = self.reader.get_mut();
        stream.write_all(&data).await?;
        stream.flush().await?;

        let line = read_line(&mut self.reader).await?;
        debug!(response = %line, "RECEIVE (only first line is shown)");

        parse_status(&line)
    }

    /// Reads the body of a multi-line response, up to the lone `.` line.
    ///
    /// Escape dots are removed and the terminator is not returned.
    async fn read_multiline(&mut self) -> Result<Vec<Vec<u8>>> {
        let mut lines = Vec::new();
        loop {
            let line = read_raw_line(&mut self.reader).await?;
            if is_terminator(&line) {
                break;
            }
            lines.push(unstuff_line(&line).to_vec());
        }
        Ok(lines)
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// The stream is shut down whether or not the server acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let result = self.command(Command::Quit).await;

        if let Err(e) = self.reader.get_mut().shutdown().await {
            debug!(error = %e, "Shutdown after QUIT failed");
        }

        result.map(|_| ())
    }
}

/// Reads one status line as text.
async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_raw_line(reader).await?;
    Ok(String::from_utf8_lossy(&line).into_owned())
}

/// Reads one line and strips its CRLF (or bare LF) terminator.
///
/// At most [`MAX_LINE_LENGTH`] bytes plus the terminator are buffered.
async fn read_raw_line<R>(reader: &mut R) -> Result<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let limit = (MAX_LINE_LENGTH + 2) as u64;
    let read = (&mut *reader).take(limit).read_until(b'\n', &mut buf).await?;
    if read == 0 {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed",
        )));
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
    if buf.len() > MAX_LINE_LENGTH {
        return Err(Error::Protocol("line too long".to_string()));
    }

    Ok(buf)
}
