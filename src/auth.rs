//! Password to identity mapping.
//!
//! A password is the only credential. Its SHA-256 digest identifies the
//! user, so every distinct password owns a distinct set of notes.

use sha2::{Digest, Sha256};

use crate::{
    error::Result,
    note::{NoteInput, UserId},
    note_db::NoteDb,
};

pub const PASSWORD_ENV_VAR: &str = "JOTTER_PASSWORD";
pub const DEFAULT_PASSWORD: &str = "changeme";

const WELCOME_TITLE: &str = "Welcome to Notes";
const WELCOME_CONTENT: &str = "This is your first note. Start typing!";

/// Lowercase hex SHA-256 of `password`.
pub fn hash_password(password: &str) -> String {
    Sha256::digest(password.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Resolve the user owning `password`, registering it on first use.
pub fn login(db: &NoteDb, password: &str) -> Result<UserId> {
    db.find_or_create_user(&hash_password(password))
}

/// Log in and seed a welcome note when the store holds no notes at all.
pub fn bootstrap(db: &NoteDb, password: &str) -> Result<UserId> {
    let user = login(db, password)?;
    if db.count_notes()? == 0 {
        db.create_note(user, &NoteInput::new(WELCOME_TITLE, WELCOME_CONTENT))?;
        tracing::info!(user, "seeded welcome note");
    }
    Ok(user)
}
