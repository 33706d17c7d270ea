//! In-memory store: one mutex over all tables, monotonically increasing row ids.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::dedup::EventDedup;
use super::models::{
    CheckIn, CopingResource, Interaction, MentorSession, NewCheckIn, NewInteraction,
    NewRiskEvent, RiskEvent, SessionType, Streak, User, UserPreference, PENDING_MENTOR,
};
use super::Store;

#[derive(Debug)]
struct Tables {
    next_id: u64,
    users: HashMap<Uuid, User>,
    preferences: HashMap<Uuid, UserPreference>,
    interactions: Vec<Interaction>,
    risk_events: Vec<RiskEvent>,
    sessions: Vec<MentorSession>,
    checkins: Vec<CheckIn>,
    streaks: HashMap<Uuid, Streak>,
    resources: Vec<CopingResource>,
    dedup: EventDedup,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new(dedup_retention_secs: u64) -> Self {
        Self {
            inner: Mutex::new(Tables {
                next_id: 0,
                users: HashMap::new(),
                preferences: HashMap::new(),
                interactions: Vec::new(),
                risk_events: Vec::new(),
                sessions: Vec::new(),
                checkins: Vec::new(),
                streaks: HashMap::new(),
                resources: Vec::new(),
                dedup: EventDedup::new(dedup_retention_secs),
            }),
        }
    }

    pub fn with_resources(self, resources: Vec<CopingResource>) -> Self {
        for r in resources {
            self.upsert_coping_resource(r);
        }
        self
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        // Every mutation is a single push/replace, so a poisoned guard is still consistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn interaction_count(&self) -> usize {
        self.tables().interactions.len()
    }

    pub fn risk_event_count(&self) -> usize {
        self.tables().risk_events.len()
    }

    pub fn all_sessions(&self) -> Vec<MentorSession> {
        self.tables().sessions.clone()
    }
}

impl Store for MemoryStore {
    fn insert_user(&self, user: User) {
        self.tables().users.insert(user.user_id, user);
    }

    fn user(&self, user_id: Uuid) -> Option<User> {
        self.tables().users.get(&user_id).cloned()
    }

    fn user_by_phone(&self, phone: &str) -> Option<User> {
        self.tables()
            .users
            .values()
            .find(|u| u.phone == phone)
            .cloned()
    }

    fn set_user_active(&self, user_id: Uuid, active: bool) -> bool {
        match self.tables().users.get_mut(&user_id) {
            Some(u) => {
                u.is_active = active;
                true
            }
            None => false,
        }
    }

    fn set_preference(&self, pref: UserPreference) {
        self.tables().preferences.insert(pref.user_id, pref);
    }

    fn users_with_preferences(&self) -> Vec<(User, UserPreference)> {
        let t = self.tables();
        t.preferences
            .values()
            .filter_map(|p| {
                t.users
                    .get(&p.user_id)
                    .filter(|u| u.is_active)
                    .map(|u| (u.clone(), p.clone()))
            })
            .collect()
    }

    fn insert_interaction(&self, new: NewInteraction) -> Interaction {
        let mut t = self.tables();
        let row = Interaction {
            id: t.next_id(),
            user_id: new.user_id,
            channel: new.channel,
            direction: new.direction,
            text: new.text,
            risk_score: new.risk_score,
            handled_by: new.handled_by,
            session_id: new.session_id,
            created_at: Utc::now(),
        };
        t.interactions.push(row.clone());
        row
    }

    fn recent_interactions(&self, user_id: Uuid, limit: usize) -> Vec<Interaction> {
        self.tables()
            .interactions
            .iter()
            .rev()
            .filter(|i| i.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    fn interaction_by_session(&self, session_id: &str) -> Option<Interaction> {
        self.tables()
            .interactions
            .iter()
            .find(|i| i.session_id.as_deref() == Some(session_id))
            .cloned()
    }

    fn insert_risk_event(&self, new: NewRiskEvent) -> RiskEvent {
        let mut t = self.tables();
        let row = RiskEvent {
            id: t.next_id(),
            user_id: new.user_id,
            event_type: new.event_type,
            risk_level: new.risk_level,
            source_interaction_id: new.source_interaction_id,
            trigger_keywords: new.trigger_keywords,
            created_at: Utc::now(),
        };
        t.risk_events.push(row.clone());
        row
    }

    fn latest_risk_event(&self, user_id: Uuid) -> Option<RiskEvent> {
        self.tables()
            .risk_events
            .iter()
            .rev()
            .find(|e| e.user_id == user_id)
            .cloned()
    }

    fn open_mentor_session(
        &self,
        user_id: Uuid,
        session_type: SessionType,
        task_sid: &str,
        started_at: DateTime<Utc>,
    ) -> MentorSession {
        let mut t = self.tables();
        let row = MentorSession {
            id: t.next_id(),
            user_id,
            mentor_id: PENDING_MENTOR.to_string(),
            session_type,
            task_sid: task_sid.to_string(),
            conversation_sid: None,
            started_at,
            ended_at: None,
            outcome: None,
            duration_seconds: None,
        };
        t.sessions.push(row.clone());
        row
    }

    fn session_by_task(&self, task_sid: &str) -> Option<MentorSession> {
        self.tables()
            .sessions
            .iter()
            .find(|s| s.task_sid == task_sid)
            .cloned()
    }

    fn session_by_conversation(&self, conversation_sid: &str) -> Option<MentorSession> {
        self.tables()
            .sessions
            .iter()
            .find(|s| s.conversation_sid.as_deref() == Some(conversation_sid))
            .cloned()
    }

    fn update_mentor_session(&self, session: &MentorSession) -> bool {
        let mut t = self.tables();
        match t.sessions.iter_mut().find(|s| s.id == session.id) {
            Some(row) => {
                *row = session.clone();
                true
            }
            None => false,
        }
    }

    fn active_sessions(&self) -> Vec<MentorSession> {
        let mut out: Vec<MentorSession> = self
            .tables()
            .sessions
            .iter()
            .filter(|s| s.is_active())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        out
    }

    fn insert_checkin(&self, new: NewCheckIn, at: DateTime<Utc>) -> CheckIn {
        let mut t = self.tables();
        let row = CheckIn {
            id: t.next_id(),
            user_id: new.user_id,
            craving_level: new.craving_level,
            mood_word: new.mood_word,
            completed_plan: new.completed_plan,
            wellness_score: new.wellness_score,
            additional_notes: new.additional_notes,
            created_at: at,
        };
        t.checkins.push(row.clone());
        row
    }

    fn recent_checkins(&self, user_id: Uuid, limit: usize) -> Vec<CheckIn> {
        let mut rows: Vec<CheckIn> = self
            .tables()
            .checkins
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.truncate(limit);
        rows
    }

    fn checkins_since(&self, user_id: Uuid, since: DateTime<Utc>) -> Vec<CheckIn> {
        let mut rows = self.recent_checkins(user_id, usize::MAX);
        rows.retain(|c| c.created_at >= since);
        rows
    }

    fn streak(&self, user_id: Uuid) -> Option<Streak> {
        self.tables().streaks.get(&user_id).cloned()
    }

    fn save_streak(&self, streak: Streak) {
        self.tables().streaks.insert(streak.user_id, streak);
    }

    fn upsert_coping_resource(&self, resource: CopingResource) {
        let mut t = self.tables();
        match t.resources.iter_mut().find(|r| r.id == resource.id) {
            Some(row) => *row = resource,
            None => t.resources.push(resource),
        }
    }

    fn coping_resources(&self) -> Vec<CopingResource> {
        self.tables().resources.clone()
    }

    fn record_resource_use(&self, id: &str) {
        if let Some(r) = self.tables().resources.iter_mut().find(|r| r.id == id) {
            r.usage_count = r.usage_count.saturating_add(1);
        }
    }

    fn claim_event(&self, key: &str, now: DateTime<Utc>) -> bool {
        self.tables().dedup.claim(key, now)
    }

    fn release_event(&self, key: &str) {
        self.tables().dedup.release(key);
    }
}
