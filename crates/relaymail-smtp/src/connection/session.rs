//! One-call mail transaction on top of the protocol engine.

use super::client::SmtpClient;
use super::stream::Connector;
use crate::error::Result;
use crate::message::MailBody;
use crate::types::{Recipients, Reply};

impl<C: Connector> SmtpClient<C> {
    /// Sends one message: EHLO if needed, MAIL, RCPT per recipient, DATA.
    ///
    /// When the server advertises SIZE, `size=<bytes>` is added to the MAIL
    /// options, measured after line endings are normalized to CRLF. The first
    /// refused recipient aborts the call; recipients accepted before it are
    /// not reported separately. Dot-stuffing is done by
    /// [`data`](Self::data), so `body` must be passed unstuffed.
    ///
    /// Returns the server's reply to the end of data.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by EHLO, MAIL, RCPT or DATA.
    pub async fn send_mail(
        &mut self,
        from: &str,
        to: impl Into<Recipients>,
        body: impl Into<MailBody>,
        mail_options: &[String],
        rcpt_options: &[String],
    ) -> Result<Reply> {
        self.ensure_ehlo().await?;

        let recipients: Recipients = to.into();
        let body = body.into().into_bytes();

        let mut mail_options = mail_options.to_vec();
        if self.capabilities().supports_size() {
            mail_options.push(format!("size={}", body.len()));
        }
        tracing::info!(
            from,
            recipients = recipients.len(),
            bytes = body.len(),
            "Sending mail"
        );

        self.mail(from, &mail_options).await?;
        for rcpt in &recipients {
            self.rcpt(rcpt, rcpt_options).await?;
        }
        self.data(&body).await
    }
}
