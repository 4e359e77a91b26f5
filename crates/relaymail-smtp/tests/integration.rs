//! Integration tests for the SMTP client.
//!
//! These tests run the client over real TCP against a scripted server task
//! bound to a loopback port.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use relaymail_smtp::{Config, Error, ReplyCode, SmtpClient, TcpConnector};

/// One expected client line and the raw reply to send back.
type Step = (&'static str, &'static str);

/// Serves one connection: sends `greeting`, then checks each client line
/// against the script and answers it. Returns every line received.
async fn scripted_server(
    greeting: &'static str,
    script: Vec<Step>,
) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);
        let mut received = Vec::new();

        write_half.write_all(greeting.as_bytes()).await.unwrap();
        for (expected, reply) in script {
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            assert_eq!(line, expected);
            received.push(line);
            write_half.write_all(reply.as_bytes()).await.unwrap();
        }
        received
    });

    (port, handle)
}

fn client() -> SmtpClient<TcpConnector> {
    let config = Config::builder().client_id("client.local").build();
    SmtpClient::with_connector(TcpConnector, config)
}

/// Counts WARN events.
struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[tokio::test]
async fn test_greeting_and_ehlo_capabilities_without_warning() {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
    let _guard = tracing::subscriber::set_default(subscriber);

    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![(
            "ehlo [client.local]\r\n",
            "250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n",
        )],
    )
    .await;

    let mut client = client();
    let greeting = client.connect("127.0.0.1", port).await.unwrap();
    assert_eq!(greeting.code, ReplyCode::SERVICE_READY);
    assert_eq!(greeting.lines, vec!["mail.example.com ready"]);

    client.ehlo().await.unwrap();
    assert!(client.capabilities().contains("SIZE 35882577"));
    assert!(client.capabilities().contains("AUTH LOGIN PLAIN"));
    assert_eq!(warnings.load(Ordering::SeqCst), 0);

    client.close();
    server.await.unwrap();
}

#[tokio::test]
async fn test_missing_auth_plain_is_only_a_warning() {
    let warnings = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
    let _guard = tracing::subscriber::set_default(subscriber);

    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![("ehlo [client.local]\r\n", "250-mail.example.com\r\n250 8BITMIME\r\n")],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    let reply = client.ehlo().await.unwrap();
    assert_eq!(reply.lines, vec!["mail.example.com", "8BITMIME"]);
    assert!(client.ehlo_done());
    assert_eq!(warnings.load(Ordering::SeqCst), 1);

    client.close();
    server.await.unwrap();
}

#[tokio::test]
async fn test_mail_wire_bytes() {
    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![("mail FROM:<a@example.com>\r\n", "250 OK\r\n")],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    let reply = client.mail("a@example.com", &[]).await.unwrap();
    assert_eq!(reply.code.to_string(), "250");
    assert_eq!(reply.lines, vec!["OK"]);

    client.close();
    let received = server.await.unwrap();
    assert_eq!(received, vec!["mail FROM:<a@example.com>\r\n"]);
}

#[tokio::test]
async fn test_rcpt_refusal_resets_session() {
    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![
            ("rcpt TO:<b@example.com>\r\n", "550 No such user\r\n"),
            ("rset\r\n", "250 OK\r\n"),
        ],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    let err = client.rcpt("b@example.com", &[]).await.unwrap_err();
    match &err {
        Error::RecipientRefused { code, address, .. } => {
            assert_eq!(code.as_u16(), 550);
            assert_eq!(address, "b@example.com");
        }
        other => panic!("Expected RecipientRefused, got {other:?}"),
    }
    assert!(err.is_permanent());
    assert!(client.is_connected());

    client.close();
    let received = server.await.unwrap();
    assert_eq!(received.last().map(String::as_str), Some("rset\r\n"));
}

#[tokio::test]
async fn test_sender_refusal_survives_failed_rset() {
    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![
            ("mail FROM:<a@example.com>\r\n", "451 Try again later\r\n"),
            ("rset\r\n", ""),
        ],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    let err = client.mail("a@example.com", &[]).await.unwrap_err();
    assert!(matches!(err, Error::SenderRefused { .. }));
    assert_eq!(err.code().map(ReplyCode::as_u16), Some(451));
    assert!(!client.is_connected());

    let received = server.await.unwrap();
    assert_eq!(received.iter().filter(|line| *line == "rset\r\n").count(), 1);
}

#[tokio::test]
async fn test_recipient_refusal_survives_failed_rset() {
    let (port, server) = scripted_server(
        "220 mail.example.com ready\r\n",
        vec![
            ("rcpt TO:<b@example.com>\r\n", "550 No such user\r\n"),
            ("rset\r\n", ""),
        ],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    let err = client.rcpt("b@example.com", &[]).await.unwrap_err();
    assert!(
        matches!(err, Error::RecipientRefused { ref address, .. } if address == "b@example.com")
    );
    assert!(err.is_permanent());
    assert!(!client.is_connected());

    let received = server.await.unwrap();
    assert_eq!(received.iter().filter(|line| *line == "rset\r\n").count(), 1);
}

#[tokio::test]
async fn test_full_transaction() {
    let (port, server) = scripted_server(
        "220 mail.example.com ESMTP\r\n",
        vec![
            (
                "ehlo [client.local]\r\n",
                "250-mail.example.com\r\n250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n",
            ),
            ("AUTH PLAIN AHVzZXIAc2VjcmV0\r\n", "235 2.7.0 Accepted\r\n"),
            ("mail FROM:<a@example.com> size=34\r\n", "250 OK\r\n"),
            ("rcpt TO:<b@example.com>\r\n", "250 OK\r\n"),
            ("rcpt TO:<c@example.com>\r\n", "250 OK\r\n"),
            ("data\r\n", "354 End data with <CR><LF>.<CR><LF>\r\n"),
            ("Subject: hi\r\n", ""),
            ("\r\n", ""),
            ("..leading dot\r\n", ""),
            ("end\r\n", ""),
            (".\r\n", "250 2.0.0 Queued\r\n"),
            ("quit\r\n", "221 Bye\r\n"),
        ],
    )
    .await;

    let mut client = client();
    client.connect("127.0.0.1", port).await.unwrap();
    client.login("user", "secret").await.unwrap();

    let reply = client
        .send_mail(
            "a@example.com",
            vec!["b@example.com", "c@example.com"],
            "Subject: hi\n\n.leading dot\nend",
            &[],
            &[],
        )
        .await
        .unwrap();
    assert_eq!(reply.lines, vec!["2.0.0 Queued"]);

    client.quit().await.unwrap();
    assert!(!client.is_connected());
    server.await.unwrap();
}

#[tokio::test]
async fn test_server_hangup_is_transport_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        socket.write_all(b"220-first line\r\n").await.unwrap();
    });

    let mut client = client();
    let err = client.connect("127.0.0.1", port).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(!client.is_connected());
    server.await.unwrap();
}

#[tokio::test]
async fn test_independent_clients_run_in_parallel() {
    let (port_a, server_a) =
        scripted_server("220 a ready\r\n", vec![("noop\r\n", "250 a\r\n")]).await;
    let (port_b, server_b) =
        scripted_server("220 b ready\r\n", vec![("noop\r\n", "250 b\r\n")]).await;

    let task_a = tokio::spawn(async move {
        let mut client = client();
        client.connect("127.0.0.1", port_a).await.unwrap();
        client.noop().await.unwrap()
    });
    let task_b = tokio::spawn(async move {
        let mut client = client();
        client.connect("127.0.0.1", port_b).await.unwrap();
        client.noop().await.unwrap()
    });

    assert_eq!(task_a.await.unwrap().lines, vec!["a"]);
    assert_eq!(task_b.await.unwrap().lines, vec!["b"]);
    server_a.await.unwrap();
    server_b.await.unwrap();
}
