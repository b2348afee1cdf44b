use std::path::Path;

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    TableDefinition,
    WriteTransaction,
};

use crate::{
    error::{Error, Result},
    note::{Note, NoteId, NoteInput, UserId, now_millis},
};

const NOTES: TableDefinition<u64, &[u8]> = TableDefinition::new("notes");
const USERS: TableDefinition<&str, u64> = TableDefinition::new("users");
const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

const NOTE_SEQUENCE: &str = "note";
const USER_SEQUENCE: &str = "user";

/// Supplies every note owned by one identity, in any order.
pub trait NoteSource {
    fn list_all_for_owner(&self, owner: UserId) -> Result<Vec<Note>>;
}

/// Persistent note, user and settings storage.
///
/// Notes are stored as JSON blobs keyed by id. Every note operation takes
/// the owner id and treats notes of other owners as nonexistent.
pub struct NoteDb {
    db: Database,
}

impl NoteDb {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(NOTES)?;
        txn.open_table(USERS)?;
        txn.open_table(SEQUENCES)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Notes --

    pub fn create_note(&self, owner: UserId, input: &NoteInput) -> Result<Note> {
        input.validate()?;

        let txn = self.db.begin_write()?;
        let note = {
            let id = next_id(&txn, NOTE_SEQUENCE)?;
            let now = now_millis();
            let note = Note {
                id,
                owner,
                title: input.title.clone(),
                content: input.content.clone(),
                created_at: now,
                updated_at: now,
            };
            let bytes = serde_json::to_vec(&note)?;
            let mut table = txn.open_table(NOTES)?;
            table.insert(id, bytes.as_slice())?;
            note
        };
        txn.commit()?;

        tracing::debug!(id = note.id, owner, "created note");
        Ok(note)
    }

    pub fn get_note(&self, id: NoteId, owner: UserId) -> Result<Option<Note>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        let Some(bytes) = table.get(id)?.map(|v| v.value().to_vec()) else {
            return Ok(None);
        };
        let note: Note = serde_json::from_slice(&bytes)?;
        Ok((note.owner == owner).then_some(note))
    }

    /// All notes of `owner`, most recently updated first.
    pub fn list_notes(&self, owner: UserId) -> Result<Vec<Note>> {
        let mut notes = self.list_all_for_owner(owner)?;
        notes.sort_by(|a, b| {
            b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id))
        });
        Ok(notes)
    }

    pub fn update_note(
        &self,
        id: NoteId,
        owner: UserId,
        input: &NoteInput,
    ) -> Result<Option<Note>> {
        input.validate()?;

        let txn = self.db.begin_write()?;
        let updated = {
            let mut table = txn.open_table(NOTES)?;
            let existing = table.get(id)?.map(|v| v.value().to_vec());
            match existing {
                None => None,
                Some(bytes) => {
                    let mut note: Note = serde_json::from_slice(&bytes)?;
                    if note.owner != owner {
                        None
                    } else {
                        note.title = input.title.clone();
                        note.content = input.content.clone();
                        note.updated_at = now_millis().max(note.updated_at);
                        let bytes = serde_json::to_vec(&note)?;
                        table.insert(id, bytes.as_slice())?;
                        Some(note)
                    }
                }
            }
        };
        txn.commit()?;
        Ok(updated)
    }

    pub fn delete_note(&self, id: NoteId, owner: UserId) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(NOTES)?;
            let existing = table.get(id)?.map(|v| v.value().to_vec());
            match existing {
                Some(bytes) => {
                    let note: Note = serde_json::from_slice(&bytes)?;
                    note.owner == owner && table.remove(id)?.is_some()
                }
                None => false,
            }
        };
        txn.commit()?;
        Ok(removed)
    }

    /// Number of notes across all owners.
    pub fn count_notes(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // -- Users --

    /// Look up the user registered under `password_hash`, registering a new
    /// one when none exists.
    pub fn find_or_create_user(&self, password_hash: &str) -> Result<UserId> {
        let txn = self.db.begin_write()?;
        let (user_id, created) = {
            let mut table = txn.open_table(USERS)?;
            let existing = table.get(password_hash)?.map(|v| v.value());
            match existing {
                Some(id) => (id, false),
                None => {
                    let id = next_id(&txn, USER_SEQUENCE)?;
                    table.insert(password_hash, id)?;
                    (id, true)
                }
            }
        };
        txn.commit()?;

        if created {
            tracing::info!(user_id, "registered new user");
        }
        Ok(user_id)
    }

    pub fn count_users(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(USERS)?;
        let mut count = 0;
        for entry in table.iter()? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    /// Get a setting, returning the default if not set.
    pub fn get_setting_or(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .get_setting(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }
}

impl NoteSource for NoteDb {
    /// Single read transaction over the notes table, id ascending.
    fn list_all_for_owner(&self, owner: UserId) -> Result<Vec<Note>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(NOTES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_k, v) = entry?;
            let note: Note = serde_json::from_slice(v.value())?;
            if note.owner == owner {
                result.push(note);
            }
        }
        Ok(result)
    }
}

impl NoteSource for [Note] {
    fn list_all_for_owner(&self, owner: UserId) -> Result<Vec<Note>> {
        Ok(self.iter().filter(|n| n.owner == owner).cloned().collect())
    }
}

impl std::fmt::Debug for NoteDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteDb").finish_non_exhaustive()
    }
}

fn next_id(txn: &WriteTransaction, sequence: &str) -> Result<u64> {
    let mut table = txn.open_table(SEQUENCES)?;
    let next = table.get(sequence)?.map(|v| v.value()).unwrap_or(0) + 1;
    table.insert(sequence, next)?;
    Ok(next)
}

/// Look up a note or fail with [`Error::NotFound`].
pub fn require_note(db: &NoteDb, id: NoteId, owner: UserId) -> Result<Note> {
    db.get_note(id, owner)?
        .ok_or_else(|| Error::note_not_found(id))
}
