//! Persistence seam. Handlers and the pipeline talk to `dyn Store`; the
//! service ships with the in-memory implementation.

pub mod dedup;
pub mod memory;
pub mod models;

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
use models::{
    CheckIn, CopingResource, Interaction, MentorSession, NewCheckIn, NewInteraction,
    NewRiskEvent, RiskEvent, SessionType, Streak, User, UserPreference,
};

pub trait Store: Send + Sync {
    // --- users ---
    fn insert_user(&self, user: User);
    fn user(&self, user_id: Uuid) -> Option<User>;
    /// Active or not; callers decide what an inactive user may do.
    fn user_by_phone(&self, phone: &str) -> Option<User>;
    /// Returns false when the user does not exist.
    fn set_user_active(&self, user_id: Uuid, active: bool) -> bool;
    fn set_preference(&self, pref: UserPreference);
    /// Active users that have a check-in preference.
    fn users_with_preferences(&self) -> Vec<(User, UserPreference)>;

    // --- interactions ---
    fn insert_interaction(&self, new: NewInteraction) -> Interaction;
    /// Newest first.
    fn recent_interactions(&self, user_id: Uuid, limit: usize) -> Vec<Interaction>;
    /// Oldest interaction recorded under a vendor session id.
    fn interaction_by_session(&self, session_id: &str) -> Option<Interaction>;

    // --- risk events ---
    fn insert_risk_event(&self, new: NewRiskEvent) -> RiskEvent;
    fn latest_risk_event(&self, user_id: Uuid) -> Option<RiskEvent>;

    // --- mentor sessions ---
    fn open_mentor_session(
        &self,
        user_id: Uuid,
        session_type: SessionType,
        task_sid: &str,
        started_at: DateTime<Utc>,
    ) -> MentorSession;
    fn session_by_task(&self, task_sid: &str) -> Option<MentorSession>;
    fn session_by_conversation(&self, conversation_sid: &str) -> Option<MentorSession>;
    /// Replace the stored row with the same id. Returns false when missing.
    fn update_mentor_session(&self, session: &MentorSession) -> bool;
    /// Sessions without `ended_at`, most recently started first.
    fn active_sessions(&self) -> Vec<MentorSession>;

    // --- check-ins ---
    fn insert_checkin(&self, new: NewCheckIn, at: DateTime<Utc>) -> CheckIn;
    /// Newest first.
    fn recent_checkins(&self, user_id: Uuid, limit: usize) -> Vec<CheckIn>;
    /// Newest first, `created_at >= since`.
    fn checkins_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Vec<CheckIn>;
    fn streak(&self, user_id: Uuid) -> Option<Streak>;
    fn save_streak(&self, streak: Streak);

    // --- coping resources ---
    fn upsert_coping_resource(&self, resource: CopingResource);
    fn coping_resources(&self) -> Vec<CopingResource>;
    fn record_resource_use(&self, id: &str);

    // --- webhook idempotency ---
    /// At-most-once gate: true for the first claim of `key`.
    fn claim_event(&self, key: &str, now: DateTime<Utc>) -> bool;
    /// Give a claim back after the guarded side effect failed.
    fn release_event(&self, key: &str);
}
