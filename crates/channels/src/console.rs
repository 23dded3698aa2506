//! Console channel — prints replies for interactive `keepsake chat` sessions.

use async_trait::async_trait;
use keepsake_core::batch::SenderId;
use keepsake_core::channel::DeliveryChannel;
use keepsake_core::error::ChannelError;
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes each reply as a block prefixed with the bot name.
pub struct ConsoleChannel {
    label: String,
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleChannel {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            label: "keepsake".into(),
            out: Mutex::new(out),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn failure(&self, reason: impl ToString) -> ChannelError {
        ChannelError::DeliveryFailed {
            channel: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for ConsoleChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeliveryChannel for ConsoleChannel {
    fn name(&self) -> &str {
        "console"
    }

    async fn deliver(&self, recipient: &SenderId, text: &str) -> Result<(), ChannelError> {
        let mut out = self.out.lock().map_err(|e| self.failure(e))?;
        writeln!(out, "\n{} → {}:\n{}\n", self.label, recipient, text).map_err(|e| self.failure(e))?;
        out.flush().map_err(|e| self.failure(e))?;
        tracing::debug!(recipient = %recipient, chars = text.len(), "Printed reply");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn prints_reply_with_label() {
        let buf = SharedBuf::default();
        let channel = ConsoleChannel::with_writer(Box::new(buf.clone())).with_label("bot");

        channel.deliver(&SenderId::new("local"), "Saved 3 photos.").await.unwrap();

        let printed = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(printed.contains("bot → local:"));
        assert!(printed.contains("Saved 3 photos."));
    }

    #[tokio::test]
    async fn write_errors_become_delivery_failures() {
        let channel = ConsoleChannel::with_writer(Box::new(Broken));
        let err = channel.deliver(&SenderId::new("local"), "hi").await.unwrap_err();
        assert!(matches!(err, ChannelError::DeliveryFailed { ref channel, .. } if channel == "console"));
    }
}
