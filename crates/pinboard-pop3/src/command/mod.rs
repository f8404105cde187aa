//! POP3 command builder.

use std::fmt;

/// Message number within the current maildrop (1-based).
pub type MessageId = u32;

/// POP3 command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// USER - Identify the mailbox
    User {
        /// Mailbox name
        name: String,
    },
    /// PASS - Mailbox password
    Pass {
        /// Password, sent in the clear over the already secured stream
        secret: String,
    },
    /// STAT - Maildrop summary
    Stat,
    /// LIST - Scan listing for all messages, or for one
    List {
        /// Message number, `None` for the whole maildrop
        msg: Option<MessageId>,
    },
    /// RETR - Retrieve a message
    Retr {
        /// Message number
        msg: MessageId,
    },
    /// DELE - Mark a message as deleted
    Dele {
        /// Message number
        msg: MessageId,
    },
    /// NOOP - No operation
    Noop,
    /// RSET - Unmark messages marked as deleted
    Rset,
    /// QUIT - Enter the update state and close
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::User { name } => {
                buf.extend_from_slice(b"USER ");
                buf.extend_from_slice(name.as_bytes());
            }
            Self::Pass { secret } => {
                buf.extend_from_slice(b"PASS ");
                buf.extend_from_slice(secret.as_bytes());
            }
            Self::Stat => {
                buf.extend_from_slice(b"STAT");
            }
            Self::List { msg } => {
                buf.extend_from_slice(b"LIST");
                if let Some(msg) = msg {
                    buf.extend_from_slice(format!(" {msg}").as_bytes());
                }
            }
            Self::Retr { msg } => {
                buf.extend_from_slice(format!("RETR {msg}").as_bytes());
            }
            Self::Dele { msg } => {
                buf.extend_from_slice(format!("DELE {msg}").as_bytes());
            }
            Self::Noop => {
                buf.extend_from_slice(b"NOOP");
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

// Keeps the password out of logs.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { name } => write!(f, "USER {name}"),
            Self::Pass { .. } => write!(f, "PASS ********"),
            Self::Stat => write!(f, "STAT"),
            Self::List { msg: None } => write!(f, "LIST"),
            Self::List { msg: Some(msg) } => write!(f, "LIST {msg}"),
            Self::Retr { msg } => write!(f, "RETR {msg}"),
            Self::Dele { msg } => write!(f, "DELE {msg}"),
            Self::Noop => write!(f, "NOOP"),
            Self::Rset => write!(f, "RSET"),
            Self::Quit => write!(f, "QUIT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_command() {
        let cmd = Command::User {
            name: "pinboard@example.com".to_string(),
        };
        assert_eq!(cmd.serialize(), b"USER pinboard@example.com\r\n");
    }

    #[test]
    fn test_pass_command() {
        let cmd = Command::Pass {
            secret: "hunter2".to_string(),
        };
        assert_eq!(cmd.serialize(), b"PASS hunter2\r\n");
    }

    #[test]
    fn test_pass_is_masked_in_debug() {
        let cmd = Command::Pass {
            secret: "hunter2".to_string(),
        };
        let shown = format!("{cmd:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.starts_with("PASS"));
    }

    #[test]
    fn test_list_all_command() {
        assert_eq!(Command::List { msg: None }.serialize(), b"LIST\r\n");
    }

    #[test]
    fn test_list_single_command() {
        assert_eq!(Command::List { msg: Some(7) }.serialize(), b"LIST 7\r\n");
    }

    #[test]
    fn test_retr_and_dele_commands() {
        assert_eq!(Command::Retr { msg: 1 }.serialize(), b"RETR 1\r\n");
        assert_eq!(Command::Dele { msg: 12 }.serialize(), b"DELE 12\r\n");
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::Stat.serialize(), b"STAT\r\n");
        assert_eq!(Command::Noop.serialize(), b"NOOP\r\n");
        assert_eq!(Command::Rset.serialize(), b"RSET\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
