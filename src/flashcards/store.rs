//! Record store for card memory states, review logs, content units and exams
//!
//! `RecordStore` is the seam to whatever owns persistence. Two
//! implementations ship here: `MemoryStore` for tests and embedding, and
//! `FileStore`, a JSON file layout:
//!
//! ```text
//! {data-dir}/
//! ├── cards/
//! │   └── {card-id}.json       # CardState
//! ├── logs/
//! │   └── {card-id}.json       # Array of ReviewLog for the card
//! ├── units/
//! │   └── {document-id}.json   # Array of ContentUnit for the document
//! └── exams.json               # Array of all exams
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::{FlashcardError, Result};
use super::models::*;

/// Storage collaborator used by the scheduling engine
pub trait RecordStore: Send + Sync {
    fn get_card(&self, card_id: Uuid) -> Result<Option<CardState>>;

    fn list_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<CardState>>;

    fn list_cards_by_content_unit(&self, block_id: &str) -> Result<Vec<CardState>>;

    fn put_card(&self, card: &CardState) -> Result<()>;

    /// Removes the card and its review logs
    fn delete_card(&self, card_id: Uuid) -> Result<()>;

    fn append_review_log(&self, log: &ReviewLog) -> Result<()>;

    /// Logs for an owner reviewed at or after `since`, oldest first
    fn list_review_logs(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ReviewLog>>;

    /// Logs for one card, oldest first
    fn list_card_review_logs(&self, card_id: Uuid) -> Result<Vec<ReviewLog>>;

    fn delete_review_log(&self, log_id: Uuid) -> Result<()>;

    fn list_reviewable_content_units(&self, document_id: Uuid) -> Result<Vec<ContentUnit>>;

    /// Non-archived exams still in the future
    fn list_active_exams(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Exam>>;
}

fn sort_logs(logs: &mut [ReviewLog]) {
    logs.sort_by(|a, b| a.reviewed_at().cmp(&b.reviewed_at()));
}

/// One card's logs in the order they were written
fn sort_card_logs(logs: &mut [ReviewLog]) {
    logs.sort_by(|a, b| {
        a.record
            .reps
            .cmp(&b.record.reps)
            .then(a.reviewed_at().cmp(&b.reviewed_at()))
    });
}

// ==================== In-memory store ====================

#[derive(Default)]
struct MemoryTables {
    cards: HashMap<Uuid, CardState>,
    logs: Vec<ReviewLog>,
    units: HashMap<Uuid, Vec<ContentUnit>>,
    exams: Vec<Exam>,
}

/// Store kept entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, MemoryTables> {
        self.tables.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemoryTables> {
        self.tables.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the content units of a document
    pub fn put_content_units(&self, document_id: Uuid, units: Vec<ContentUnit>) {
        self.write().units.insert(document_id, units);
    }

    /// Remove a document and all its content units
    pub fn delete_document(&self, document_id: Uuid) {
        self.write().units.remove(&document_id);
    }

    pub fn put_exam(&self, exam: Exam) {
        let mut tables = self.write();
        tables.exams.retain(|e| e.id != exam.id);
        tables.exams.push(exam);
    }
}

impl RecordStore for MemoryStore {
    fn get_card(&self, card_id: Uuid) -> Result<Option<CardState>> {
        Ok(self.read().cards.get(&card_id).cloned())
    }

    fn list_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<CardState>> {
        let mut cards: Vec<CardState> = self
            .read()
            .cards
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    fn list_cards_by_content_unit(&self, block_id: &str) -> Result<Vec<CardState>> {
        Ok(self
            .read()
            .cards
            .values()
            .filter(|c| c.block_id == block_id)
            .cloned()
            .collect())
    }

    fn put_card(&self, card: &CardState) -> Result<()> {
        self.write().cards.insert(card.id, card.clone());
        Ok(())
    }

    fn delete_card(&self, card_id: Uuid) -> Result<()> {
        let mut tables = self.write();
        tables.cards.remove(&card_id);
        tables.logs.retain(|l| l.card_id != card_id);
        Ok(())
    }

    fn append_review_log(&self, log: &ReviewLog) -> Result<()> {
        self.write().logs.push(log.clone());
        Ok(())
    }

    fn list_review_logs(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ReviewLog>> {
        let mut logs: Vec<ReviewLog> = self
            .read()
            .logs
            .iter()
            .filter(|l| l.owner_id == owner_id && l.reviewed_at() >= since)
            .cloned()
            .collect();
        sort_logs(&mut logs);
        Ok(logs)
    }

    fn list_card_review_logs(&self, card_id: Uuid) -> Result<Vec<ReviewLog>> {
        let mut logs: Vec<ReviewLog> = self
            .read()
            .logs
            .iter()
            .filter(|l| l.card_id == card_id)
            .cloned()
            .collect();
        sort_card_logs(&mut logs);
        Ok(logs)
    }

    fn delete_review_log(&self, log_id: Uuid) -> Result<()> {
        let mut tables = self.write();
        let before = tables.logs.len();
        tables.logs.retain(|l| l.id != log_id);
        if tables.logs.len() == before {
            return Err(FlashcardError::ReviewLogNotFound(log_id));
        }
        Ok(())
    }

    fn list_reviewable_content_units(&self, document_id: Uuid) -> Result<Vec<ContentUnit>> {
        Ok(self.read().units.get(&document_id).cloned().unwrap_or_default())
    }

    fn list_active_exams(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Exam>> {
        Ok(self
            .read()
            .exams
            .iter()
            .filter(|e| e.owner_id == owner_id && e.is_active(now))
            .cloned()
            .collect())
    }
}

// ==================== File store ====================

/// JSON-file backed store
pub struct FileStore {
    /// Base path (e.g., ~/.local/share/nous-srs)
    base_path: PathBuf,
    /// Serializes every write and read-modify-write
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            write_lock: Mutex::new(()),
        }
    }

    /// Create the directory layout
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.cards_dir())?;
        fs::create_dir_all(self.logs_dir())?;
        fs::create_dir_all(self.units_dir())?;
        Ok(())
    }

    fn cards_dir(&self) -> PathBuf {
        self.base_path.join("cards")
    }

    fn logs_dir(&self) -> PathBuf {
        self.base_path.join("logs")
    }

    fn units_dir(&self) -> PathBuf {
        self.base_path.join("units")
    }

    fn exams_path(&self) -> PathBuf {
        self.base_path.join("exams.json")
    }

    fn card_path(&self, card_id: Uuid) -> PathBuf {
        self.cards_dir().join(format!("{}.json", card_id))
    }

    fn card_logs_path(&self, card_id: Uuid) -> PathBuf {
        self.logs_dir().join(format!("{}.json", card_id))
    }

    fn units_path(&self, document_id: Uuid) -> PathBuf {
        self.units_dir().join(format!("{}.json", document_id))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_json_files<T: serde::de::DeserializeOwned>(&self, dir: PathBuf) -> Result<Vec<T>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                let content = fs::read_to_string(&path)?;
                items.push(serde_json::from_str(&content)?);
            }
        }
        Ok(items)
    }

    fn read_array<T: serde::de::DeserializeOwned>(path: &PathBuf) -> Result<Vec<T>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn write_array<T: serde::Serialize>(path: &PathBuf, items: &[T]) -> Result<()> {
        Self::write_atomic(path, &serde_json::to_string_pretty(items)?)
    }

    /// Write through a sibling temp file so readers never see a partial record
    fn write_atomic(path: &Path, content: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        if let Err(e) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn all_cards(&self) -> Result<Vec<CardState>> {
        self.read_json_files(self.cards_dir())
    }

    fn all_logs(&self) -> Result<Vec<ReviewLog>> {
        let per_card: Vec<Vec<ReviewLog>> = self.read_json_files(self.logs_dir())?;
        Ok(per_card.into_iter().flatten().collect())
    }

    /// Replace the content units of a document
    pub fn put_content_units(&self, document_id: Uuid, units: &[ContentUnit]) -> Result<()> {
        self.init()?;
        let _guard = self.lock();
        Self::write_array(&self.units_path(document_id), units)
    }

    /// Remove a document's content units
    pub fn delete_document(&self, document_id: Uuid) -> Result<()> {
        let _guard = self.lock();
        let path = self.units_path(document_id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn put_exam(&self, exam: &Exam) -> Result<()> {
        self.init()?;
        let _guard = self.lock();
        let path = self.exams_path();
        let mut exams: Vec<Exam> = Self::read_array(&path)?;
        exams.retain(|e| e.id != exam.id);
        exams.push(exam.clone());
        Self::write_array(&path, &exams)
    }
}

impl RecordStore for FileStore {
    fn get_card(&self, card_id: Uuid) -> Result<Option<CardState>> {
        let path = self.card_path(card_id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn list_cards_by_owner(&self, owner_id: Uuid) -> Result<Vec<CardState>> {
        let mut cards: Vec<CardState> = self
            .all_cards()?
            .into_iter()
            .filter(|c| c.owner_id == owner_id)
            .collect();
        cards.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(cards)
    }

    fn list_cards_by_content_unit(&self, block_id: &str) -> Result<Vec<CardState>> {
        Ok(self
            .all_cards()?
            .into_iter()
            .filter(|c| c.block_id == block_id)
            .collect())
    }

    fn put_card(&self, card: &CardState) -> Result<()> {
        self.init()?;
        let content = serde_json::to_string_pretty(card)?;
        let _guard = self.lock();
        Self::write_atomic(&self.card_path(card.id), &content)
    }

    fn delete_card(&self, card_id: Uuid) -> Result<()> {
        let _guard = self.lock();
        for path in [self.card_path(card_id), self.card_logs_path(card_id)] {
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    fn append_review_log(&self, log: &ReviewLog) -> Result<()> {
        self.init()?;
        let _guard = self.lock();
        let path = self.card_logs_path(log.card_id);
        let mut logs: Vec<ReviewLog> = Self::read_array(&path)?;
        logs.push(log.clone());
        Self::write_array(&path, &logs)
    }

    fn list_review_logs(&self, owner_id: Uuid, since: DateTime<Utc>) -> Result<Vec<ReviewLog>> {
        let mut logs: Vec<ReviewLog> = self
            .all_logs()?
            .into_iter()
            .filter(|l| l.owner_id == owner_id && l.reviewed_at() >= since)
            .collect();
        sort_logs(&mut logs);
        Ok(logs)
    }

    fn list_card_review_logs(&self, card_id: Uuid) -> Result<Vec<ReviewLog>> {
        let mut logs: Vec<ReviewLog> = Self::read_array(&self.card_logs_path(card_id))?;
        sort_card_logs(&mut logs);
        Ok(logs)
    }

    fn delete_review_log(&self, log_id: Uuid) -> Result<()> {
        let _guard = self.lock();
        let logs_dir = self.logs_dir();
        if logs_dir.exists() {
            for entry in fs::read_dir(&logs_dir)? {
                let path = entry?.path();
                if !path.extension().map_or(false, |ext| ext == "json") {
                    continue;
                }
                let mut logs: Vec<ReviewLog> = Self::read_array(&path)?;
                let before = logs.len();
                logs.retain(|l| l.id != log_id);
                if logs.len() != before {
                    return Self::write_array(&path, &logs);
                }
            }
        }
        Err(FlashcardError::ReviewLogNotFound(log_id))
    }

    fn list_reviewable_content_units(&self, document_id: Uuid) -> Result<Vec<ContentUnit>> {
        Self::read_array(&self.units_path(document_id))
    }

    fn list_active_exams(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<Vec<Exam>> {
        let exams: Vec<Exam> = Self::read_array(&self.exams_path())?;
        Ok(exams
            .into_iter()
            .filter(|e| e.owner_id == owner_id && e.is_active(now))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn create_test_storage() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = FileStore::new(temp_dir.path().to_path_buf());
        storage.init().unwrap();
        (storage, temp_dir)
    }

    fn log_for(card: &CardState, at: DateTime<Utc>, rating: Rating) -> ReviewLog {
        ReviewLog::new(
            card,
            ReviewRecord {
                rating,
                reps: card.memory.reps,
                status: card.memory.status,
                scheduled_days: 0,
                elapsed_days: 0,
                stability: 0.0,
                difficulty: 0.0,
                due: card.memory.due,
                reviewed_at: at,
            },
        )
    }

    fn exercise_store(store: &dyn RecordStore) {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let doc = Uuid::new_v4();

        let card = CardState::new(owner, doc, "blk-1".to_string(), CardSide::Forward, now());
        let reverse = CardState::new(owner, doc, "blk-1".to_string(), CardSide::Reverse, now());
        let foreign = CardState::new(other, doc, "blk-2".to_string(), CardSide::Forward, now());
        for c in [&card, &reverse, &foreign] {
            store.put_card(c).unwrap();
        }

        assert_eq!(store.get_card(card.id).unwrap(), Some(card.clone()));
        assert_eq!(store.get_card(Uuid::new_v4()).unwrap(), None);
        assert_eq!(store.list_cards_by_owner(owner).unwrap().len(), 2);
        assert_eq!(store.list_cards_by_content_unit("blk-1").unwrap().len(), 2);

        let first = log_for(&card, now(), Rating::Good);
        let second = log_for(&card, now() + Duration::days(2), Rating::Again);
        store.append_review_log(&second).unwrap();
        store.append_review_log(&first).unwrap();

        let logs = store.list_card_review_logs(card.id).unwrap();
        assert_eq!(logs.iter().map(|l| l.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert_eq!(store.list_review_logs(owner, now() + Duration::days(1)).unwrap().len(), 1);
        assert!(store.list_review_logs(other, now()).unwrap().is_empty());

        store.delete_review_log(second.id).unwrap();
        assert_eq!(store.list_card_review_logs(card.id).unwrap().len(), 1);
        assert!(matches!(
            store.delete_review_log(second.id),
            Err(FlashcardError::ReviewLogNotFound(_))
        ));

        store.delete_card(card.id).unwrap();
        assert_eq!(store.get_card(card.id).unwrap(), None);
        assert!(store.list_card_review_logs(card.id).unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        exercise_store(&MemoryStore::new());
    }

    #[test]
    fn test_file_store() {
        let (storage, _temp) = create_test_storage();
        exercise_store(&storage);
    }

    #[test]
    fn test_file_store_units_and_exams() {
        let (storage, _temp) = create_test_storage();
        let owner = Uuid::new_v4();
        let doc = Uuid::new_v4();

        let units = vec![
            ContentUnit::new(doc, "a", "Q".to_string(), "A".to_string()),
            ContentUnit::new(doc, "b", "Q2".to_string(), "A2".to_string())
                .with_direction(CardDirection::Bidirectional),
        ];
        storage.put_content_units(doc, &units).unwrap();
        let loaded = storage.list_reviewable_content_units(doc).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].card_direction, CardDirection::Bidirectional);

        storage.delete_document(doc).unwrap();
        assert!(storage.list_reviewable_content_units(doc).unwrap().is_empty());

        let upcoming = Exam::new(owner, "Finals".to_string(), now() + Duration::days(5), vec![doc]);
        let past = Exam::new(owner, "Midterm".to_string(), now() - Duration::days(5), vec![doc]);
        storage.put_exam(&upcoming).unwrap();
        storage.put_exam(&past).unwrap();

        let active = storage.list_active_exams(owner, now()).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, upcoming.id);
    }

    #[test]
    fn test_card_logs_keep_write_order() {
        let (storage, _temp) = create_test_storage();
        let mut card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk".to_string(), CardSide::Forward, now());

        let first = log_for(&card, now() + Duration::hours(1), Rating::Good);
        card.memory.reps = 1;
        let second = log_for(&card, now(), Rating::Hard);
        storage.append_review_log(&first).unwrap();
        storage.append_review_log(&second).unwrap();

        let logs = storage.list_card_review_logs(card.id).unwrap();
        assert_eq!(logs.iter().map(|l| l.id).collect::<Vec<_>>(), vec![first.id, second.id]);
    }

    #[test]
    fn test_writes_leave_no_temp_files() {
        let (storage, temp) = create_test_storage();
        let card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk".to_string(), CardSide::Forward, now());
        storage.put_card(&card).unwrap();
        storage.append_review_log(&log_for(&card, now(), Rating::Good)).unwrap();
        storage
            .put_content_units(card.document_id, &[ContentUnit::new(card.document_id, "blk", "Q".to_string(), "A".to_string())])
            .unwrap();

        for dir in ["cards", "logs", "units"] {
            for entry in fs::read_dir(temp.path().join(dir)).unwrap() {
                let path = entry.unwrap().path();
                assert_eq!(path.extension().unwrap(), "json", "{}", path.display());
            }
        }
    }

    #[test]
    fn test_concurrent_put_and_read() {
        let (storage, _temp) = create_test_storage();
        let storage = std::sync::Arc::new(storage);
        let mut card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk".to_string(), CardSide::Forward, now());
        storage.put_card(&card).unwrap();

        let writer = {
            let storage = storage.clone();
            let mut card = card.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    card.memory.reps = i;
                    storage.put_card(&card).unwrap();
                }
            })
        };
        for _ in 0..200 {
            let read = storage.get_card(card.id).unwrap().unwrap();
            assert_eq!(read.id, card.id);
            assert_eq!(storage.list_cards_by_owner(card.owner_id).unwrap().len(), 1);
        }
        writer.join().unwrap();

        card.memory.reps = 199;
        assert_eq!(storage.get_card(card.id).unwrap(), Some(card));
    }

    #[test]
    fn test_card_json_layout() {
        let (storage, temp) = create_test_storage();
        let card = CardState::new(Uuid::new_v4(), Uuid::new_v4(), "blk".to_string(), CardSide::Forward, now());
        storage.put_card(&card).unwrap();

        let raw = fs::read_to_string(temp.path().join("cards").join(format!("{}.json", card.id))).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["status"], "new");
        assert_eq!(value["blockId"], "blk");
        assert_eq!(value["suspended"], false);
        assert!(value.get("lastReview").is_none());
    }
}
