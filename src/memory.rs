//! In-memory stand-ins for the Postgres stores and the Gemini client.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::{
        repo::{EmailTaken, UserStore},
        repo_types::{Gender, NewUser, ProfileChanges, User},
    },
    chat::{
        dto::Content,
        gemini::{GenerateError, GenerativeClient},
    },
    water::{
        repo::WaterStore,
        repo_types::{NewWaterEntry, WaterChanges, WaterEntry},
    },
};

#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<HashMap<Uuid, User>>,
    token_writes: AtomicUsize,
}

impl MemoryUserStore {
    pub fn token_writes(&self) -> usize {
        self.token_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn create(&self, new_user: NewUser) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == new_user.email) {
            return Ok(None);
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            password_hash: new_user.password_hash,
            name: new_user.name,
            gender: Gender::Woman,
            weight: 0.0,
            daily_activity_time: "00:00".into(),
            daily_water_norm: 1.5,
            avatar_url: None,
            token: None,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.insert(user.id, user.clone());
        Ok(Some(user))
    }

    async fn set_tokens(
        &self,
        id: Uuid,
        token: Option<&str>,
        refresh_token: Option<&str>,
    ) -> anyhow::Result<()> {
        self.token_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(user) = self.users.lock().unwrap().get_mut(&id) {
            user.token = token.map(String::from);
            user.refresh_token = refresh_token.map(String::from);
            user.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        id: Uuid,
        changes: &ProfileChanges,
    ) -> anyhow::Result<Option<User>> {
        let mut users = self.users.lock().unwrap();
        if let Some(email) = &changes.email {
            if users.values().any(|u| u.id != id && &u.email == email) {
                return Err(EmailTaken.into());
            }
        }
        let Some(user) = users.get_mut(&id) else {
            return Ok(None);
        };
        let changes = changes.clone();
        if let Some(v) = changes.name {
            user.name = Some(v);
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.gender {
            user.gender = v;
        }
        if let Some(v) = changes.weight {
            user.weight = v;
        }
        if let Some(v) = changes.daily_activity_time {
            user.daily_activity_time = v;
        }
        if let Some(v) = changes.daily_water_norm {
            user.daily_water_norm = v;
        }
        if let Some(v) = changes.avatar_url {
            user.avatar_url = Some(v);
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }
}

#[derive(Default)]
pub struct MemoryWaterStore {
    entries: Mutex<Vec<WaterEntry>>,
}

#[async_trait]
impl WaterStore for MemoryWaterStore {
    async fn insert(&self, entry: NewWaterEntry) -> anyhow::Result<WaterEntry> {
        let entry = WaterEntry {
            id: Uuid::new_v4(),
            value: entry.value,
            date: entry.date,
            time: entry.time,
            owner: entry.owner,
        };
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn update_owned(
        &self,
        id: Uuid,
        owner: Uuid,
        changes: &WaterChanges,
    ) -> anyhow::Result<Option<WaterEntry>> {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.iter_mut().find(|e| e.id == id && e.owner == owner) else {
            return Ok(None);
        };
        if let Some(v) = changes.value {
            entry.value = v;
        }
        if let Some(v) = &changes.date {
            entry.date = v.clone();
        }
        if let Some(v) = &changes.time {
            entry.time = v.clone();
        }
        Ok(Some(entry.clone()))
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> anyhow::Result<Option<WaterEntry>> {
        let mut entries = self.entries.lock().unwrap();
        let pos = entries.iter().position(|e| e.id == id && e.owner == owner);
        Ok(pos.map(|i| entries.remove(i)))
    }

    async fn find_by_date_pattern(
        &self,
        owner: Uuid,
        pattern: &str,
    ) -> anyhow::Result<Vec<WaterEntry>> {
        let mut found: Vec<WaterEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.owner == owner && e.date.contains(pattern))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(found)
    }

    async fn find_by_date(&self, owner: Uuid, date: &str) -> anyhow::Result<Vec<WaterEntry>> {
        let mut found: Vec<WaterEntry> = self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.owner == owner && e.date == date)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.time.cmp(&b.time));
        Ok(found)
    }
}

enum Script {
    Answer(String),
    Unavailable,
    Fail(String),
}

/// Generative client answering from a per-model script; unscripted models are unavailable.
#[derive(Default)]
pub struct ScriptedModels {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, model: &str, text: &str) -> Self {
        self.scripts
            .insert(model.into(), Script::Answer(text.into()));
        self
    }

    pub fn unavailable(mut self, model: &str) -> Self {
        self.scripts.insert(model.into(), Script::Unavailable);
        self
    }

    pub fn fail(mut self, model: &str, message: &str) -> Self {
        self.scripts
            .insert(model.into(), Script::Fail(message.into()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeClient for ScriptedModels {
    async fn generate(&self, model: &str, _contents: &[Content]) -> Result<String, GenerateError> {
        self.calls.lock().unwrap().push(model.to_string());
        match self.scripts.get(model) {
            Some(Script::Answer(text)) => Ok(text.clone()),
            Some(Script::Fail(message)) => Err(GenerateError::Failed(message.clone())),
            Some(Script::Unavailable) | None => Err(GenerateError::ModelUnavailable {
                model: model.to_string(),
                message: "404 model not found".into(),
            }),
        }
    }
}
