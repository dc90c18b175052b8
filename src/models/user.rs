use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub plan: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscription terms granted to an employer account. Stored as JSON on the
/// user row; billing lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Maximum concurrent listings; -1 means unlimited.
    pub job_limit: i64,
    #[serde(default = "default_live_days")]
    pub live_job_for_days: i64,
    pub will_expire: Option<DateTime<Utc>>,
}

fn default_live_days() -> i64 {
    30
}

impl Plan {
    pub fn is_expired(&self) -> bool {
        match self.will_expire {
            Some(at) => at < Utc::now(),
            None => false,
        }
    }

    pub fn allows_another_listing(&self, current_count: i64) -> bool {
        self.job_limit == -1 || current_count < self.job_limit
    }
}

impl User {
    pub fn plan(&self) -> Option<Plan> {
        self.plan
            .as_ref()
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn unlimited_plan_always_allows_posting() {
        let plan = Plan {
            job_limit: -1,
            live_job_for_days: 30,
            will_expire: None,
        };
        assert!(plan.allows_another_listing(10_000));
        assert!(!plan.is_expired());
    }

    #[test]
    fn limited_plan_stops_at_the_limit() {
        let plan = Plan {
            job_limit: 3,
            live_job_for_days: 30,
            will_expire: Some(Utc::now() + Duration::days(7)),
        };
        assert!(plan.allows_another_listing(2));
        assert!(!plan.allows_another_listing(3));
    }

    #[test]
    fn past_expiry_marks_the_plan_expired() {
        let plan = Plan {
            job_limit: 3,
            live_job_for_days: 30,
            will_expire: Some(Utc::now() - Duration::days(1)),
        };
        assert!(plan.is_expired());
    }
}
