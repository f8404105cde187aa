//! End-to-end tests of the mail crawler against an in-memory POP3 server.

#![allow(clippy::unwrap_used, clippy::expect_used, missing_docs)]

use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{ImageFormat, Rgba, RgbaImage};
use pinboard_core::{
    AttachmentStore, Connector, Crawler, MailCrawler, MessageParser, RawImage, Record,
    RecordKind, RecordStore, Timing,
};
use pinboard_mime::encoding::encode_base64;
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const PASSWORD: &str = "secret";

/// Maildrop shared by every session of the fake server.
#[derive(Default)]
struct Maildrop {
    messages: Vec<Vec<u8>>,
    commands: Vec<(Instant, String)>,
    fail_list: bool,
    hangups_on_retr: usize,
}

#[derive(Clone, Default)]
struct FakeServer {
    state: Arc<Mutex<Maildrop>>,
}

impl FakeServer {
    fn with_messages(messages: &[String]) -> Self {
        let server = Self::default();
        server.state.lock().unwrap().messages =
            messages.iter().map(|m| m.clone().into_bytes()).collect();
        server
    }

    fn with_raw_messages(messages: &[&[u8]]) -> Self {
        let server = Self::default();
        server.state.lock().unwrap().messages = messages.iter().map(|m| m.to_vec()).collect();
        server
    }

    fn failing_list() -> Self {
        let server = Self::default();
        server.state.lock().unwrap().fail_list = true;
        server
    }

    /// Drops the connection instead of answering the next `n` RETR commands.
    fn hang_up_on_retr(self, n: usize) -> Self {
        self.state.lock().unwrap().hangups_on_retr = n;
        self
    }

    fn timeline(&self) -> Vec<(Instant, String)> {
        self.state.lock().unwrap().commands.clone()
    }

    fn commands(&self) -> Vec<String> {
        self.timeline().into_iter().map(|(_, verb)| verb).collect()
    }

    fn count(&self, verb: &str) -> usize {
        self.commands().iter().filter(|c| *c == verb).count()
    }

    fn remaining(&self) -> usize {
        self.state.lock().unwrap().messages.len()
    }

    async fn serve(self, stream: DuplexStream) {
        let (read, mut write) = tokio::io::split(stream);
        let mut lines = BufReader::new(read).lines();
        let snapshot = self.state.lock().unwrap().messages.clone();
        let mut deleted = BTreeSet::new();

        if write.write_all(b"+OK fake POP3 ready\r\n").await.is_err() {
            return;
        }

        while let Ok(Some(line)) = lines.next_line().await {
            let (verb, arg) = line.split_once(' ').unwrap_or((line.as_str(), ""));
            let verb = verb.to_ascii_uppercase();
            let (fail_list, hang_up) = {
                let mut state = self.state.lock().unwrap();
                state.commands.push((Instant::now(), verb.clone()));
                let hang_up = verb == "RETR" && state.hangups_on_retr > 0;
                if hang_up {
                    state.hangups_on_retr -= 1;
                }
                (state.fail_list, hang_up)
            };
            if hang_up {
                return;
            }

            let live: Vec<usize> = (1..=snapshot.len())
                .filter(|id| !deleted.contains(id))
                .collect();
            let message = arg
                .parse::<usize>()
                .ok()
                .filter(|id| live.contains(id))
                .map(|id| (id, &snapshot[id - 1]));

            let reply: Vec<u8> = match (verb.as_str(), message) {
                ("USER", _) => b"+OK\r\n".to_vec(),
                ("PASS", _) if arg == PASSWORD => b"+OK logged in\r\n".to_vec(),
                ("PASS", _) => b"-ERR invalid password\r\n".to_vec(),
                ("STAT", _) => {
                    let size: usize = live.iter().map(|id| snapshot[id - 1].len()).sum();
                    format!("+OK {} {size}\r\n", live.len()).into_bytes()
                }
                ("LIST", _) if fail_list => b"-ERR listing disabled\r\n".to_vec(),
                ("LIST", _) => {
                    let mut reply = format!("+OK {} messages\r\n", live.len());
                    for id in &live {
                        reply.push_str(&format!("{id} {}\r\n", snapshot[id - 1].len()));
                    }
                    reply.push_str(".\r\n");
                    reply.into_bytes()
                }
                ("RETR", Some((_, body))) => {
                    let mut reply = b"+OK\r\n".to_vec();
                    for line in body.split(|&b| b == b'\n') {
                        let line = line.strip_suffix(b"\r").unwrap_or(line);
                        if line.starts_with(b".") {
                            reply.push(b'.');
                        }
                        reply.extend_from_slice(line);
                        reply.extend_from_slice(b"\r\n");
                    }
                    reply.extend_from_slice(b".\r\n");
                    reply
                }
                ("DELE", Some((id, _))) => {
                    deleted.insert(id);
                    b"+OK deleted\r\n".to_vec()
                }
                ("QUIT", _) => {
                    {
                        let mut state = self.state.lock().unwrap();
                        let mut id = 0;
                        state.messages.retain(|_| {
                            id += 1;
                            !deleted.contains(&id)
                        });
                    }
                    let _ = write.write_all(b"+OK bye\r\n").await;
                    return;
                }
                _ => b"-ERR no such message\r\n".to_vec(),
            };

            if write.write_all(&reply).await.is_err() {
                return;
            }
        }
    }
}

struct FakeConnector {
    server: FakeServer,
}

impl Connector for FakeConnector {
    type Stream = DuplexStream;

    async fn connect(&self) -> pinboard_pop3::Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(self.server.clone().serve(server));
        Ok(client)
    }

    fn describe(&self) -> String {
        "fake:110".to_string()
    }
}

fn timing() -> Timing {
    Timing {
        relogin_interval: Duration::from_secs(3600),
        auth_backoff: Duration::from_secs(5),
        cycle_backoff: Duration::from_secs(1),
        relogin_pause: Duration::from_secs(1),
        wait_tick: Duration::from_secs(1),
    }
}

struct Harness {
    dir: TempDir,
    cancel: CancellationToken,
    records: mpsc::Receiver<Record>,
    task: JoinHandle<()>,
}

fn start(server: &FakeServer, password: &str, attempts: Option<u32>, interval: Duration) -> Harness {
    start_with(server, password, timing(), attempts, interval)
}

fn start_with(
    server: &FakeServer,
    password: &str,
    timing: Timing,
    attempts: Option<u32>,
    interval: Duration,
) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let parser = MessageParser::new(AttachmentStore::new(dir.path().join("images")));
    let crawler = MailCrawler::new(
        FakeConnector {
            server: server.clone(),
        },
        "pin@example.com",
        password,
        parser,
        RecordStore::new(dir.path().join("records")),
    )
    .with_timing(timing)
    .with_max_delivery_attempts(attempts);

    let (tx, records) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(crawler.crawl(tx, cancel.clone(), interval));

    Harness {
        dir,
        cancel,
        records,
        task,
    }
}

impl Harness {
    async fn stop(mut self) -> (TempDir, Vec<Record>) {
        self.cancel.cancel();
        let mut rest = Vec::new();
        while let Some(record) = self.records.recv().await {
            rest.push(record);
        }
        tokio::time::timeout(Duration::from_secs(2), self.task)
            .await
            .expect("crawler did not stop promptly")
            .unwrap();
        (self.dir, rest)
    }
}

fn mail(subject: &str, date: Option<&str>) -> String {
    let mut raw = format!("From: Alice <alice@example.com>\r\nSubject: {subject}\r\n");
    if let Some(date) = date {
        raw.push_str(&format!("Date: {date}\r\n"));
    }
    raw.push_str("Content-Type: text/plain; charset=utf-8\r\n\r\nHello pinboard.\r\n");
    raw
}

fn mail_with_image(subject: &str) -> String {
    let img = RgbaImage::from_pixel(4, 2, Rgba([200, 100, 50, 255]));
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png).unwrap();

    format!(
        concat!(
            "From: Bob <bob@example.com>\r\n",
            "Subject: {subject}\r\n",
            "Date: Fri, 4 Jul 2025 09:30:00 +0000\r\n",
            "Content-Type: multipart/mixed; boundary=sep\r\n",
            "\r\n",
            "--sep\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See photo.\r\n",
            "--sep\r\n",
            "Content-Type: image/png\r\n",
            "Content-Disposition: attachment; filename=\"beach day.png\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "{png}\r\n",
            "--sep--\r\n",
        ),
        subject = subject,
        png = encode_base64(&png.into_inner()),
    )
}

#[tokio::test(start_paused = true)]
async fn test_ingests_messages_oldest_first() {
    let server = FakeServer::with_messages(&[
        mail("first", Some("Thu, 3 Jul 2025 08:00:00 +0000")),
        mail_with_image("second"),
    ]);
    let mut harness = start(&server, PASSWORD, None, Duration::from_secs(60));

    let first = harness.records.recv().await.unwrap();
    let second = harness.records.recv().await.unwrap();

    assert_eq!(first.kind, RecordKind::Email);
    assert_eq!(first.short_text, "first");
    assert_eq!(first.sender_name, "Alice <alice@example.com>");
    assert!(first.long_text.contains("Hello pinboard."));
    assert!(first.image_names.is_empty());

    assert_eq!(second.short_text, "second");
    assert_eq!(second.image_names.len(), 1);
    let image = RawImage::load(&second.image_names[0]).unwrap();
    assert_eq!((image.width, image.height), (4, 2));
    assert_eq!(
        second.image_names[0].file_name().unwrap(),
        "beachday.rgba"
    );

    let (dir, rest) = harness.stop().await;
    assert!(rest.is_empty());

    // Deletions are committed by the final QUIT.
    assert_eq!(server.remaining(), 0);
    assert_eq!(server.commands().last().unwrap(), "QUIT");
    assert_eq!(server.count("PASS"), 1);

    let store = RecordStore::new(dir.path().join("records"));
    assert_eq!(store.load(first.filename()).unwrap(), first);
    assert_eq!(store.load(second.filename()).unwrap(), second);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_waiting_quits_and_closes() {
    let server = FakeServer::with_messages(&[]);
    let harness = start(&server, PASSWORD, None, Duration::from_secs(3600));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(server.commands().contains(&"LIST".to_string()));

    let (_dir, rest) = harness.stop().await;
    assert!(rest.is_empty());
    assert_eq!(server.commands().last().unwrap(), "QUIT");
    assert_eq!(server.count("LIST"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_list_failure_ends_crawl() {
    let server = FakeServer::failing_list();
    let mut harness = start(&server, PASSWORD, None, Duration::from_secs(60));

    // The channel closes without any cancellation.
    assert!(harness.records.recv().await.is_none());
    harness.task.await.unwrap();

    assert_eq!(server.count("LIST"), 1);
    assert_eq!(server.count("RETR"), 0);
    assert!(!harness.cancel.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_parse_failure_keeps_message_and_relogs_in() {
    let server = FakeServer::with_messages(&[mail("undated", None)]);
    let harness = start(&server, PASSWORD, None, Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(20)).await;
    let (dir, rest) = harness.stop().await;

    assert!(rest.is_empty());
    assert_eq!(server.remaining(), 1);
    assert_eq!(server.count("DELE"), 0);
    assert!(server.count("RETR") >= 2);
    assert!(server.count("PASS") >= 2);
    assert!(!dir.path().join("records").exists());
}

#[tokio::test(start_paused = true)]
async fn test_message_deleted_after_max_attempts() {
    let server = FakeServer::with_messages(&[mail("undated", None)]);
    let harness = start(&server, PASSWORD, Some(2), Duration::from_secs(2));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let (_dir, rest) = harness.stop().await;

    assert!(rest.is_empty());
    assert_eq!(server.remaining(), 0);
    assert_eq!(server.count("RETR"), 2);
    assert_eq!(server.count("DELE"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_login_backs_off() {
    let server = FakeServer::with_messages(&[mail("never", Some("Thu, 3 Jul 2025 08:00:00 +0000"))]);
    let harness = start(&server, "wrong", None, Duration::from_secs(60));

    tokio::time::sleep(Duration::from_secs(12)).await;
    let (_dir, rest) = harness.stop().await;

    assert!(rest.is_empty());
    assert_eq!(server.count("PASS"), 3);
    assert_eq!(server.count("LIST"), 0);
    assert_eq!(server.remaining(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_is_renewed_after_relogin_interval() {
    let server = FakeServer::with_messages(&[]);
    let timing = Timing {
        relogin_interval: Duration::from_secs(10),
        relogin_pause: Duration::from_secs(2),
        ..timing()
    };
    let harness = start_with(&server, PASSWORD, timing, None, Duration::from_secs(4));

    tokio::time::sleep(Duration::from_secs(20)).await;
    let (_dir, rest) = harness.stop().await;
    assert!(rest.is_empty());

    let timeline = server.timeline();
    let verbs: Vec<&str> = timeline.iter().map(|(_, verb)| verb.as_str()).collect();
    let quit = verbs.iter().position(|verb| *verb == "QUIT").unwrap();

    // One healthy session: a single login followed by idle cycles only.
    assert_eq!(verbs[..2], ["USER", "PASS"]);
    assert!(verbs[2..quit].iter().all(|verb| *verb == "LIST" || *verb == "STAT"));
    assert!(verbs[2..quit].contains(&"LIST"));

    let session = timeline[quit].0 - timeline[1].0;
    assert!(session >= Duration::from_secs(10), "renewed after {session:?}");
    assert!(session < Duration::from_secs(15), "renewed after {session:?}");

    // Fresh login after the relogin pause.
    assert_eq!(verbs[quit + 1..quit + 3], ["USER", "PASS"]);
    let gap = timeline[quit + 1].0 - timeline[quit].0;
    assert!(gap >= Duration::from_secs(2), "logged in again after {gap:?}");
    assert!(gap < Duration::from_secs(3), "logged in again after {gap:?}");
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_is_not_a_delivery_failure() {
    let server = FakeServer::with_messages(&[mail("flaky", Some("Thu, 3 Jul 2025 08:00:00 +0000"))])
        .hang_up_on_retr(2);
    let mut harness = start(&server, PASSWORD, Some(1), Duration::from_secs(60));

    // Reconnects right after the cycle backoff instead of waiting out the interval.
    let record = tokio::time::timeout(Duration::from_secs(10), harness.records.recv())
        .await
        .expect("record not delivered after reconnecting")
        .unwrap();
    assert_eq!(record.short_text, "flaky");

    let (_dir, rest) = harness.stop().await;
    assert!(rest.is_empty());
    assert_eq!(server.count("RETR"), 3);
    assert_eq!(server.count("PASS"), 3);
    assert_eq!(server.count("DELE"), 1);
    assert_eq!(server.remaining(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_8bit_latin1_body_is_decoded() {
    let raw: &[u8] = b"From: Zo\xe9 <zoe@example.com>\r\n\
Subject: menu\r\n\
Date: Thu, 3 Jul 2025 08:00:00 +0000\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Transfer-Encoding: 8bit\r\n\
\r\n\
caf\xe9 cr\xe8me\r\n";
    let server = FakeServer::with_raw_messages(&[raw]);
    let mut harness = start(&server, PASSWORD, None, Duration::from_secs(60));

    let record = harness.records.recv().await.unwrap();
    assert_eq!(record.long_text.trim_end(), "café crème");
    assert_eq!(record.sender_name, "Zoé <zoe@example.com>");

    harness.stop().await;
}
