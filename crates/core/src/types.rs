/// Job identifiers are random UUIDs, generated at submission time.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh, never-reused job id.
pub fn new_job_id() -> JobId {
    uuid::Uuid::new_v4()
}
