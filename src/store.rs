use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::admin::{AdminAccount, UserProfile};
use crate::error::AppError;
use crate::progress::UserProgress;
use crate::question::{DailyAssignment, Question};

/// Key-value store of questions by id.
pub trait QuestionStore: Send + Sync {
    fn get(&self, id: &str) -> Result<Option<Question>, AppError>;
    fn get_all(&self) -> Result<Vec<Question>, AppError>;
    fn upsert(&self, question: &Question) -> Result<(), AppError>;
    /// Commit every question or none of them; a batch is never partially
    /// applied.
    fn upsert_batch(&self, questions: &[Question]) -> Result<(), AppError>;
}

/// Key-value store of daily assignments by `YYYY-MM-DD` date string.
pub trait DailyAssignmentStore: Send + Sync {
    fn get(&self, date: &str) -> Result<Option<DailyAssignment>, AppError>;
    /// Conditional create: when an assignment already exists for the date,
    /// the existing record wins and is returned unchanged. This is the one
    /// write that must be atomic, so racing callers converge on one winner.
    fn create_if_absent(&self, assignment: DailyAssignment) -> Result<DailyAssignment, AppError>;
}

/// Key-value store of user progress records by user id.
pub trait ProgressStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>, AppError>;
    /// Atomic read-modify-write for one user's record. The closure receives
    /// the current record (or `None`) and returns the record to persist;
    /// no other update for the same store interleaves with it.
    fn update(
        &self,
        user_id: &str,
        apply: &mut dyn FnMut(Option<UserProgress>) -> UserProgress,
    ) -> Result<UserProgress, AppError>;
    fn delete(&self, user_id: &str) -> Result<(), AppError>;
}

/// Key-value store of user profiles by user id.
pub trait ProfileStore: Send + Sync {
    fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError>;
    fn get_all(&self) -> Result<Vec<UserProfile>, AppError>;
    fn upsert(&self, profile: &UserProfile) -> Result<(), AppError>;
    fn delete(&self, user_id: &str) -> Result<(), AppError>;
}

/// Key-value store of administrator accounts by email.
pub trait AdminStore: Send + Sync {
    fn get(&self, email: &str) -> Result<Option<AdminAccount>, AppError>;
    fn upsert(&self, account: &AdminAccount) -> Result<(), AppError>;
    fn is_empty(&self) -> Result<bool, AppError>;
}

fn read_guard<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> Result<std::sync::RwLockReadGuard<'a, T>, AppError> {
    lock.read()
        .map_err(|_| AppError::store(format!("{what} lock poisoned")))
}

fn write_guard<'a, T>(
    lock: &'a RwLock<T>,
    what: &str,
) -> Result<std::sync::RwLockWriteGuard<'a, T>, AppError> {
    lock.write()
        .map_err(|_| AppError::store(format!("{what} lock poisoned")))
}

/// In-memory store used by tests and local development. Every collection is
/// an `RwLock`-guarded map, so the conditional-create and read-modify-write
/// contracts hold under concurrent callers.
#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<HashMap<String, Question>>,
    assignments: RwLock<HashMap<String, DailyAssignment>>,
    progress: RwLock<HashMap<String, UserProgress>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
    admins: RwLock<HashMap<String, AdminAccount>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryStore::default())
    }
}

impl QuestionStore for MemoryStore {
    fn get(&self, id: &str) -> Result<Option<Question>, AppError> {
        Ok(read_guard(&self.questions, "questions")?.get(id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Question>, AppError> {
        let mut all: Vec<Question> = read_guard(&self.questions, "questions")?
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn upsert(&self, question: &Question) -> Result<(), AppError> {
        write_guard(&self.questions, "questions")?.insert(question.id.clone(), question.clone());
        Ok(())
    }

    fn upsert_batch(&self, questions: &[Question]) -> Result<(), AppError> {
        let mut map = write_guard(&self.questions, "questions")?;
        for question in questions {
            map.insert(question.id.clone(), question.clone());
        }
        Ok(())
    }
}

impl DailyAssignmentStore for MemoryStore {
    fn get(&self, date: &str) -> Result<Option<DailyAssignment>, AppError> {
        Ok(read_guard(&self.assignments, "assignments")?
            .get(date)
            .cloned())
    }

    fn create_if_absent(&self, assignment: DailyAssignment) -> Result<DailyAssignment, AppError> {
        let mut map = write_guard(&self.assignments, "assignments")?;
        let canonical = map
            .entry(assignment.date.clone())
            .or_insert(assignment)
            .clone();
        Ok(canonical)
    }
}

impl ProgressStore for MemoryStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        Ok(read_guard(&self.progress, "progress")?.get(user_id).cloned())
    }

    fn update(
        &self,
        user_id: &str,
        apply: &mut dyn FnMut(Option<UserProgress>) -> UserProgress,
    ) -> Result<UserProgress, AppError> {
        let mut map = write_guard(&self.progress, "progress")?;
        let updated = apply(map.get(user_id).cloned());
        map.insert(user_id.to_string(), updated.clone());
        Ok(updated)
    }

    fn delete(&self, user_id: &str) -> Result<(), AppError> {
        write_guard(&self.progress, "progress")?.remove(user_id);
        Ok(())
    }
}

impl ProfileStore for MemoryStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        Ok(read_guard(&self.profiles, "profiles")?.get(user_id).cloned())
    }

    fn get_all(&self) -> Result<Vec<UserProfile>, AppError> {
        let mut all: Vec<UserProfile> = read_guard(&self.profiles, "profiles")?
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(all)
    }

    fn upsert(&self, profile: &UserProfile) -> Result<(), AppError> {
        write_guard(&self.profiles, "profiles")?.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn delete(&self, user_id: &str) -> Result<(), AppError> {
        write_guard(&self.profiles, "profiles")?.remove(user_id);
        Ok(())
    }
}

impl AdminStore for MemoryStore {
    fn get(&self, email: &str) -> Result<Option<AdminAccount>, AppError> {
        Ok(read_guard(&self.admins, "admins")?.get(email).cloned())
    }

    fn upsert(&self, account: &AdminAccount) -> Result<(), AppError> {
        write_guard(&self.admins, "admins")?.insert(account.email.clone(), account.clone());
        Ok(())
    }

    fn is_empty(&self) -> Result<bool, AppError> {
        Ok(read_guard(&self.admins, "admins")?.is_empty())
    }
}

// Collection files under the database directory, one JSON map per collection.
const QUESTIONS_FILE: &str = "questions.json";
const ASSIGNMENTS_FILE: &str = "daily_questions.json";
const PROGRESS_FILE: &str = "user_progress.json";
const PROFILES_FILE: &str = "user_profiles.json";
const ADMINS_FILE: &str = "admins.json";

/// File-backed store for production use. Each collection lives in its own
/// JSON file; every operation is a read-modify-write under that collection's
/// mutex, which makes the conditional-create and per-user update contracts
/// hold across concurrent requests in one process.
pub struct JsonStore {
    dir: PathBuf,
    questions_lock: Mutex<()>,
    assignments_lock: Mutex<()>,
    progress_lock: Mutex<()>,
    profiles_lock: Mutex<()>,
    admins_lock: Mutex<()>,
}

fn collection_guard<'a>(lock: &'a Mutex<()>, what: &str) -> Result<MutexGuard<'a, ()>, AppError> {
    lock.lock()
        .map_err(|_| AppError::store(format!("{what} lock poisoned")))
}

impl JsonStore {
    /// Open (and initialize if needed) the database directory.
    ///
    /// Creates the directory and seeds each missing collection file with an
    /// empty map, so every later read finds a parseable file.
    ///
    /// # Errors
    /// * `StoreUnavailable` when the directory or a file cannot be created
    pub fn open(dir: impl Into<PathBuf>) -> Result<Arc<Self>, AppError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::store(format!("failed to create {}: {e}", dir.display())))?;

        for file in [
            QUESTIONS_FILE,
            ASSIGNMENTS_FILE,
            PROGRESS_FILE,
            PROFILES_FILE,
            ADMINS_FILE,
        ] {
            let path = dir.join(file);
            if !path.exists() {
                fs::write(&path, "{}")
                    .map_err(|e| AppError::store(format!("failed to create {file}: {e}")))?;
            }
        }

        Ok(Arc::new(JsonStore {
            dir,
            questions_lock: Mutex::new(()),
            assignments_lock: Mutex::new(()),
            progress_lock: Mutex::new(()),
            profiles_lock: Mutex::new(()),
            admins_lock: Mutex::new(()),
        }))
    }

    fn load_map<T: DeserializeOwned>(&self, file: &str) -> Result<HashMap<String, T>, AppError> {
        let path = self.dir.join(file);
        let contents = fs::read_to_string(&path)
            .map_err(|e| AppError::store(format!("failed to read {file}: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| AppError::store(format!("failed to parse {file}: {e}")))
    }

    fn save_map<T: Serialize>(&self, file: &str, map: &HashMap<String, T>) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(map)
            .map_err(|e| AppError::store(format!("failed to serialize {file}: {e}")))?;
        fs::write(self.dir.join(file), json)
            .map_err(|e| AppError::store(format!("failed to write {file}: {e}")))
    }
}

impl QuestionStore for JsonStore {
    fn get(&self, id: &str) -> Result<Option<Question>, AppError> {
        let _guard = collection_guard(&self.questions_lock, "questions")?;
        let map: HashMap<String, Question> = self.load_map(QUESTIONS_FILE)?;
        Ok(map.get(id).cloned())
    }

    fn get_all(&self) -> Result<Vec<Question>, AppError> {
        let _guard = collection_guard(&self.questions_lock, "questions")?;
        let map: HashMap<String, Question> = self.load_map(QUESTIONS_FILE)?;
        let mut all: Vec<Question> = map.into_values().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn upsert(&self, question: &Question) -> Result<(), AppError> {
        let _guard = collection_guard(&self.questions_lock, "questions")?;
        let mut map: HashMap<String, Question> = self.load_map(QUESTIONS_FILE)?;
        map.insert(question.id.clone(), question.clone());
        self.save_map(QUESTIONS_FILE, &map)
    }

    fn upsert_batch(&self, questions: &[Question]) -> Result<(), AppError> {
        let _guard = collection_guard(&self.questions_lock, "questions")?;
        let mut map: HashMap<String, Question> = self.load_map(QUESTIONS_FILE)?;
        for question in questions {
            map.insert(question.id.clone(), question.clone());
        }
        // One write commits the whole batch.
        self.save_map(QUESTIONS_FILE, &map)
    }
}

impl DailyAssignmentStore for JsonStore {
    fn get(&self, date: &str) -> Result<Option<DailyAssignment>, AppError> {
        let _guard = collection_guard(&self.assignments_lock, "assignments")?;
        let map: HashMap<String, DailyAssignment> = self.load_map(ASSIGNMENTS_FILE)?;
        Ok(map.get(date).cloned())
    }

    fn create_if_absent(&self, assignment: DailyAssignment) -> Result<DailyAssignment, AppError> {
        let _guard = collection_guard(&self.assignments_lock, "assignments")?;
        let mut map: HashMap<String, DailyAssignment> = self.load_map(ASSIGNMENTS_FILE)?;
        if let Some(existing) = map.get(&assignment.date) {
            return Ok(existing.clone());
        }
        map.insert(assignment.date.clone(), assignment.clone());
        self.save_map(ASSIGNMENTS_FILE, &map)?;
        Ok(assignment)
    }
}

impl ProgressStore for JsonStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        let _guard = collection_guard(&self.progress_lock, "progress")?;
        let map: HashMap<String, UserProgress> = self.load_map(PROGRESS_FILE)?;
        Ok(map.get(user_id).cloned())
    }

    fn update(
        &self,
        user_id: &str,
        apply: &mut dyn FnMut(Option<UserProgress>) -> UserProgress,
    ) -> Result<UserProgress, AppError> {
        let _guard = collection_guard(&self.progress_lock, "progress")?;
        let mut map: HashMap<String, UserProgress> = self.load_map(PROGRESS_FILE)?;
        let updated = apply(map.get(user_id).cloned());
        map.insert(user_id.to_string(), updated.clone());
        self.save_map(PROGRESS_FILE, &map)?;
        Ok(updated)
    }

    fn delete(&self, user_id: &str) -> Result<(), AppError> {
        let _guard = collection_guard(&self.progress_lock, "progress")?;
        let mut map: HashMap<String, UserProgress> = self.load_map(PROGRESS_FILE)?;
        map.remove(user_id);
        self.save_map(PROGRESS_FILE, &map)
    }
}

impl ProfileStore for JsonStore {
    fn get(&self, user_id: &str) -> Result<Option<UserProfile>, AppError> {
        let _guard = collection_guard(&self.profiles_lock, "profiles")?;
        let map: HashMap<String, UserProfile> = self.load_map(PROFILES_FILE)?;
        Ok(map.get(user_id).cloned())
    }

    fn get_all(&self) -> Result<Vec<UserProfile>, AppError> {
        let _guard = collection_guard(&self.profiles_lock, "profiles")?;
        let map: HashMap<String, UserProfile> = self.load_map(PROFILES_FILE)?;
        let mut all: Vec<UserProfile> = map.into_values().collect();
        all.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(all)
    }

    fn upsert(&self, profile: &UserProfile) -> Result<(), AppError> {
        let _guard = collection_guard(&self.profiles_lock, "profiles")?;
        let mut map: HashMap<String, UserProfile> = self.load_map(PROFILES_FILE)?;
        map.insert(profile.user_id.clone(), profile.clone());
        self.save_map(PROFILES_FILE, &map)
    }

    fn delete(&self, user_id: &str) -> Result<(), AppError> {
        let _guard = collection_guard(&self.profiles_lock, "profiles")?;
        let mut map: HashMap<String, UserProfile> = self.load_map(PROFILES_FILE)?;
        map.remove(user_id);
        self.save_map(PROFILES_FILE, &map)
    }
}

impl AdminStore for JsonStore {
    fn get(&self, email: &str) -> Result<Option<AdminAccount>, AppError> {
        let _guard = collection_guard(&self.admins_lock, "admins")?;
        let map: HashMap<String, AdminAccount> = self.load_map(ADMINS_FILE)?;
        Ok(map.get(email).cloned())
    }

    fn upsert(&self, account: &AdminAccount) -> Result<(), AppError> {
        let _guard = collection_guard(&self.admins_lock, "admins")?;
        let mut map: HashMap<String, AdminAccount> = self.load_map(ADMINS_FILE)?;
        map.insert(account.email.clone(), account.clone());
        self.save_map(ADMINS_FILE, &map)
    }

    fn is_empty(&self) -> Result<bool, AppError> {
        let _guard = collection_guard(&self.admins_lock, "admins")?;
        let map: HashMap<String, AdminAccount> = self.load_map(ADMINS_FILE)?;
        Ok(map.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn question(id: &str) -> Question {
        let mut q = Question::new(format!("Title {id}"), format!("Description {id}"));
        q.id = id.to_string();
        q
    }

    fn assignment(date: &str, question_id: &str) -> DailyAssignment {
        DailyAssignment {
            date: date.to_string(),
            question_id: question_id.to_string(),
            assigned_at: Utc::now(),
            question: question(question_id),
        }
    }

    #[test]
    fn memory_conditional_create_keeps_first_writer() {
        let store = MemoryStore::new();

        let first = store.create_if_absent(assignment("2026-08-05", "q1")).unwrap();
        let second = store.create_if_absent(assignment("2026-08-05", "q2")).unwrap();

        assert_eq!(first.question_id, "q1");
        assert_eq!(second.question_id, "q1");
    }

    #[test]
    fn json_store_round_trips_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        QuestionStore::upsert(store.as_ref(), &question("q1")).unwrap();
        QuestionStore::upsert(store.as_ref(), &question("q2")).unwrap();

        let all = QuestionStore::get_all(store.as_ref()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "q1");

        let fetched = QuestionStore::get(store.as_ref(), "q2").unwrap().unwrap();
        assert_eq!(fetched.title, "Title q2");

        // A re-opened store sees the same data.
        let reopened = JsonStore::open(dir.path()).unwrap();
        assert_eq!(QuestionStore::get_all(reopened.as_ref()).unwrap().len(), 2);
    }

    #[test]
    fn json_store_conditional_create_keeps_first_writer() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let first = store.create_if_absent(assignment("2026-08-05", "q1")).unwrap();
        let second = store.create_if_absent(assignment("2026-08-05", "q2")).unwrap();

        assert_eq!(first.question_id, "q1");
        assert_eq!(second.question_id, "q1");
        assert_eq!(
            DailyAssignmentStore::get(store.as_ref(), "2026-08-05")
                .unwrap()
                .unwrap()
                .question_id,
            "q1"
        );
    }

    #[test]
    fn json_store_batch_upsert_is_visible_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        store
            .upsert_batch(&[question("a"), question("b"), question("c")])
            .unwrap();
        assert_eq!(QuestionStore::get_all(store.as_ref()).unwrap().len(), 3);
    }

    #[test]
    fn progress_update_persists_the_returned_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();

        let updated = store
            .update("u1", &mut |existing| {
                let mut p = existing.unwrap_or_else(|| UserProgress::empty("u1"));
                p.current_streak += 1;
                p
            })
            .unwrap();
        assert_eq!(updated.current_streak, 1);

        let read_back = ProgressStore::get(store.as_ref(), "u1").unwrap().unwrap();
        assert_eq!(read_back.current_streak, 1);

        ProgressStore::delete(store.as_ref(), "u1").unwrap();
        assert!(ProgressStore::get(store.as_ref(), "u1").unwrap().is_none());
    }
}
