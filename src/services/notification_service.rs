use crate::error::Result;
use crate::models::notification::Notification;
use reqwest::Client;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

/// Persists in-app notifications and pushes best-effort email alerts to the
/// mail gateway. Delivery failures are logged, never surfaced: a missed alert
/// must not fail the write that triggered it.
#[derive(Clone)]
pub struct NotificationService {
    pool: PgPool,
    client: Client,
    mail_webhook_url: Option<String>,
}

impl NotificationService {
    pub fn new(pool: PgPool, mail_webhook_url: Option<String>) -> Self {
        Self {
            pool,
            client: Client::new(),
            mail_webhook_url,
        }
    }

    pub async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, title, message, link)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(link)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Same insert, but riding an open transaction so the notification
    /// commits or rolls back together with the write it announces.
    pub async fn notify_tx(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        title: &str,
        message: &str,
        link: Option<&str>,
    ) -> Result<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            "INSERT INTO notifications (user_id, title, message, link)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(link)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row)
    }

    pub async fn send_email_alert(&self, to: &str, subject: &str, body: serde_json::Value) {
        let Some(url) = &self.mail_webhook_url else {
            tracing::debug!("mail webhook not configured, skipping email alert");
            return;
        };

        let payload = json!({
            "to": to,
            "subject": subject,
            "body": body,
        });
        match self.client.post(url).json(&payload).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "mail gateway rejected email alert");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to send email alert");
            }
        }
    }
}
