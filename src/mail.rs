use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer
///
/// Outbound email. Delivery itself is outside this service; the server logs
/// each message through [`LogMailer`].
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), String>;
}

pub type MailerState = Arc<dyn Mailer>;

pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), String> {
        // Bodies carry verification and reset links; never log them.
        tracing::info!(to = %email.to, subject = %email.subject, "outbound email");
        Ok(())
    }
}

/// MockMailer
///
/// Records every message; `new_failing()` rejects them instead.
#[derive(Default)]
pub struct MockMailer {
    pub should_fail: bool,
    sent: Mutex<Vec<Email>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, email: Email) -> Result<(), String> {
        if self.should_fail {
            return Err("Mock Mailer Error: Simulation requested".to_string());
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(email);
        Ok(())
    }
}

// --- Messages ---

pub fn welcome(to: &str, username: &str, verify_url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Welcome to the club".to_string(),
        body: format!(
            "Hi {username},\n\nYour account has been created. Confirm your email address here:\n{verify_url}\n"
        ),
    }
}

pub fn password_reset(to: &str, reset_url: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: "Password reset".to_string(),
        body: format!(
            "A password reset was requested for this address. The link below is valid for 10 minutes:\n{reset_url}\n\nIf you did not request it, ignore this email.\n"
        ),
    }
}

pub fn trial_confirmation(to: &str, name: &str, club: &str) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("{club} trial request received"),
        body: format!(
            "Hi {name},\n\nThanks for your interest in a trial with {club}. We will contact you soon with the details.\n"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn log_mailer_never_logs_the_body() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let email = password_reset(
            "fan@example.com",
            "http://localhost:5000/reset-password.html?token=very-secret-token",
        );
        LogMailer.send(email).await.unwrap();

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("fan@example.com"));
        assert!(output.contains("Password reset"));
        assert!(!output.contains("very-secret-token"));
    }
}
