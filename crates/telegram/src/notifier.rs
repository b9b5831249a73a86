use std::time::Duration;

use async_trait::async_trait;
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{ChatId, ParseMode},
};

use common::{Error, Notifier, Result};

/// Per-attempt ceiling on a `sendMessage` call.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends HTML-formatted messages to a single Telegram chat.
///
/// One call is one attempt; `engine::NotificationSink` owns retries.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
    timeout: Duration,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: i64) -> Self {
        Self::with_bot(Bot::new(token), chat_id)
    }

    pub fn with_bot(bot: Bot, chat_id: i64) -> Self {
        Self {
            bot,
            chat_id: ChatId(chat_id),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str) -> Result<()> {
        let request = self
            .bot
            .send_message(self.chat_id, message)
            .parse_mode(ParseMode::Html);

        match tokio::time::timeout(self.timeout, async move { request.await }).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Notification(e.to_string())),
            Err(_) => Err(Error::Notification(format!(
                "sendMessage timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn local_api(listener: &TcpListener) -> url::Url {
        let addr = listener.local_addr().unwrap();
        url::Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn unanswered_request_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = local_api(&listener).await;
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let bot = Bot::new("123:test").set_api_url(api);
        let notifier = TelegramNotifier::with_bot(bot, 42).with_timeout(Duration::from_millis(200));

        let err = notifier.send("hello").await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "{err}");
    }

    #[tokio::test]
    async fn api_error_is_a_failed_attempt() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api = local_api(&listener).await;
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let body = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
                let response = format!(
                    "HTTP/1.1 400 Bad Request\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        let bot = Bot::new("123:test").set_api_url(api);
        let notifier = TelegramNotifier::with_bot(bot, 42).with_timeout(Duration::from_secs(5));

        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
        assert!(!err.to_string().contains("timed out"));
    }
}
