//! jotter - a password-gated personal notes store with layered fuzzy search.
//!
//! Notes live in a [redb](https://github.com/cberner/redb) database, scoped
//! to the user identified by a password. Search is a two-tier ranking over
//! one owner's notes: a strict subsequence scorer first, then a loose token
//! scorer when the first pass finds fewer than three notes.
//!
//! # Quick start
//!
//! ```
//! use jotter::{NoteDb, NoteInput, auth, search};
//!
//! let tmp = tempfile::tempdir().unwrap();
//! let db = NoteDb::open(&tmp.path().join("notes.redb")).unwrap();
//! let owner = auth::login(&db, "hunter2").unwrap();
//!
//! db.create_note(owner, &NoteInput::new("Quarterly Report", "Quarterly numbers"))
//!     .unwrap();
//! db.create_note(owner, &NoteInput::new("Grocery list", "milk, eggs"))
//!     .unwrap();
//!
//! let found = search::search_notes(&db, "qr", owner).unwrap();
//! assert_eq!(found.len(), 1);
//! assert_eq!(found[0].title, "Quarterly Report");
//! ```

pub mod auth;
pub mod data_dir;
pub mod error;
pub mod mcp;
pub mod note;
pub mod note_db;
pub mod openai;
pub mod remix;
pub mod scorer;
pub mod search;
pub mod text_util;

pub use data_dir::DataDir;
pub use error::{Error, Result};
pub use note::{Note, NoteId, NoteInput, UserId};
pub use note_db::{NoteDb, NoteSource};
pub use openai::OpenAiBackend;
pub use remix::{ChatBackend, Personas, Remixer};
