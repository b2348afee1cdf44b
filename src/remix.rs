//! Persona-driven rewriting of note content.
//!
//! The language model is an opaque text transform behind [`ChatBackend`].
//! [`Remixer`] owns the model selection policy: it remembers the last model
//! that answered and falls back through a fixed candidate list.

use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Mutex,
};

use serde::Serialize;

use crate::{
    error::{Error, Result},
    note::{Note, NoteId, NoteInput, UserId},
    note_db::{NoteDb, require_note},
};

pub const DEFAULT_MODEL_CANDIDATES: &[&str] =
    &["gpt-4o-mini", "gpt-4o", "gpt-4.1-mini", "gpt-4.1"];

pub const MODEL_ENV_VAR: &str = "JOTTER_MODEL";
pub const OPENAI_MODEL_ENV_VAR: &str = "OPENAI_MODEL";
pub const MODEL_SETTING: &str = "remix_model";

pub const REMIX_TEMPERATURE: f32 = 0.7;
pub const PROBE_TEMPERATURE: f32 = 0.0;
pub const PROBE_MAX_TOKENS: u32 = 5;

pub const BASE_PROMPT: &str = "You are an expert text stylist. Your job is to rewrite a user's note by changing the TONE only, according to a given persona, while preserving:
- Overall meaning and intent
- High-level structure and section order
- Formatting and markup (especially Markdown headings, lists, code blocks)
- Original language
- Code inside code blocks (comments may be translated)
Only output the rewritten content, without any extra commentary.";

pub const REMIX_USER_INSTRUCTION: &str = "Rewrite the following note content in the persona's tone while keeping the structure and formatting.";

pub const PROBE_SYSTEM_PROMPT: &str = "You are concise.";
pub const PROBE_USER_PROMPT: &str = "Reply with exactly: OK";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One chat completion call. Serializes as an OpenAI request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// A chat-completion provider. Returns the first choice's text, which may
/// be empty.
pub trait ChatBackend {
    fn complete(
        &self,
        request: &ChatRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Persona prompts stored as `<name>.md` files in one directory.
#[derive(Debug, Clone)]
pub struct Personas {
    dir: PathBuf,
}

impl Personas {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted persona names. A missing directory has no personas.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(vec![]);
            }
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "md")
                && let Some(stem) = path.file_stem()
            {
                names.push(stem.to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load(&self, name: &str) -> Result<String> {
        if name.is_empty()
            || name.starts_with('.')
            || name.contains(['/', '\\'])
        {
            return Err(Error::Invalid(format!("invalid persona name: {name}")));
        }

        let path = self.dir.join(format!("{name}.md"));
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound {
                kind: "persona",
                name: name.to_string(),
            },
            _ => e.into(),
        })
    }
}

/// Outcome of [`Remixer::probe`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProbeReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `preferred` (trimmed, if non-blank) followed by
/// [`DEFAULT_MODEL_CANDIDATES`], duplicates dropped.
pub fn model_candidates(preferred: Option<&str>) -> Vec<String> {
    let preferred = preferred.map(str::trim).filter(|m| !m.is_empty());
    let mut candidates: Vec<String> = Vec::new();
    for model in preferred
        .into_iter()
        .chain(DEFAULT_MODEL_CANDIDATES.iter().copied())
    {
        if !candidates.iter().any(|c| c == model) {
            candidates.push(model.to_string());
        }
    }
    candidates
}

/// Rewrites text through a [`ChatBackend`], trying models in order.
pub struct Remixer<B> {
    backend: B,
    candidates: Vec<String>,
    cached_model: Mutex<Option<String>>,
}

impl<B: ChatBackend> Remixer<B> {
    /// Models are tried in [`model_candidates`] order.
    pub fn new(backend: B, preferred: Option<&str>) -> Self {
        Self {
            backend,
            candidates: model_candidates(preferred),
            cached_model: Mutex::new(None),
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The model that last produced usable output, if any.
    pub fn cached_model(&self) -> Option<String> {
        self.cached_model
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_cached_model(&self, model: Option<String>) {
        *self.cached_model.lock().unwrap_or_else(|e| e.into_inner()) = model;
    }

    /// Rewrite `content` in the tone described by `persona_prompt`.
    ///
    /// The cached model is tried first and forgotten if it errors. Then
    /// every candidate is tried in order; empty output counts as a failure.
    pub async fn remix(&self, content: &str, persona_prompt: &str) -> Result<String> {
        let messages = vec![
            ChatMessage::system(BASE_PROMPT),
            ChatMessage::system(persona_prompt),
            ChatMessage::user(format!(
                "{REMIX_USER_INSTRUCTION}\n\n---\n{content}"
            )),
        ];
        let mut errors = Vec::new();

        if let Some(model) = self.cached_model() {
            match self.try_remix(&model, &messages).await {
                Ok(Some(text)) => return Ok(text),
                Ok(None) => errors.push(format!(
                    "cached model {model} returned empty content"
                )),
                Err(e) => {
                    tracing::warn!(model, error = %e, "cached model failed");
                    errors.push(format!("cached model {model} failed: {e}"));
                    self.set_cached_model(None);
                }
            }
        }

        for model in &self.candidates {
            match self.try_remix(model, &messages).await {
                Ok(Some(text)) => {
                    tracing::info!(model, "remix succeeded");
                    self.set_cached_model(Some(model.clone()));
                    return Ok(text);
                }
                Ok(None) => {
                    errors.push(format!("model {model} returned empty content"))
                }
                Err(e) => {
                    tracing::warn!(model, error = %e, "model failed");
                    errors.push(format!("model {model} failed: {e}"));
                }
            }
        }

        Err(Error::Remix(format!(
            "all models failed. tried: {}. details: {}",
            self.candidates.join(", "),
            errors.join(" | ")
        )))
    }

    async fn try_remix(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<Option<String>> {
        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            temperature: REMIX_TEMPERATURE,
            max_tokens: None,
        };
        let text = self.backend.complete(&request).await?;
        Ok((!text.is_empty()).then(|| clean_remix(&text)))
    }

    /// Ask each candidate for a fixed one-word reply. The first model whose
    /// reply contains the word "ok" becomes the cached model.
    pub async fn probe(&self) -> ProbeReport {
        let mut errors = Vec::new();

        for model in &self.candidates {
            let request = ChatRequest {
                model: model.clone(),
                messages: vec![
                    ChatMessage::system(BASE_PROMPT),
                    ChatMessage::system(PROBE_SYSTEM_PROMPT),
                    ChatMessage::user(PROBE_USER_PROMPT),
                ],
                temperature: PROBE_TEMPERATURE,
                max_tokens: Some(PROBE_MAX_TOKENS),
            };
            match self.backend.complete(&request).await {
                Ok(text) if contains_ok(&text) => {
                    self.set_cached_model(Some(model.clone()));
                    return ProbeReport {
                        ok: true,
                        model: Some(model.clone()),
                        sample: Some(text),
                        error: None,
                    };
                }
                Ok(text) => {
                    errors.push(format!("model {model} unexpected output: {text}"))
                }
                Err(e) => errors.push(format!("{model}: {e}")),
            }
        }

        ProbeReport {
            ok: false,
            error: Some(errors.join(" | ")),
            ..ProbeReport::default()
        }
    }
}

/// Strip a byte-order mark, a leading and a trailing `---` separator, and
/// surrounding whitespace from model output.
pub fn clean_remix(raw: &str) -> String {
    let mut text = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    if let Some(rest) = text.trim_start().strip_prefix("---") {
        text = rest;
    }
    if let Some(rest) = text.trim_end().strip_suffix("---") {
        text = rest;
    }
    text.trim().to_string()
}

fn contains_ok(text: &str) -> bool {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("ok"))
}

/// Pick the preferred model from, in order: an explicit override, the
/// JOTTER_MODEL or OPENAI_MODEL environment variables, the stored setting.
pub fn resolve_preferred_model(
    explicit: Option<&str>,
    db: &NoteDb,
) -> Result<Option<String>> {
    if let Some(model) = explicit {
        return Ok(Some(model.to_string()));
    }
    for var in [MODEL_ENV_VAR, OPENAI_MODEL_ENV_VAR] {
        if let Ok(model) = std::env::var(var)
            && !model.trim().is_empty()
        {
            return Ok(Some(model));
        }
    }
    db.get_setting(MODEL_SETTING)
}

/// Rewrite a stored note's content with `persona` and save it, keeping the
/// title.
pub async fn remix_note<B: ChatBackend>(
    db: &NoteDb,
    remixer: &Remixer<B>,
    personas: &Personas,
    id: NoteId,
    owner: UserId,
    persona: &str,
) -> Result<Note> {
    let current = require_note(db, id, owner)?;
    let persona_prompt = personas.load(persona)?;
    let remixed = remixer.remix(&current.content, &persona_prompt).await?;

    db.update_note(id, owner, &NoteInput::new(current.title, remixed))?
        .ok_or_else(|| Error::note_not_found(id))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    /// Replies per model; models without an entry fail.
    #[derive(Default)]
    struct FakeBackend {
        replies: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeBackend {
        fn with_reply(mut self, model: &str, reply: &str) -> Self {
            self.replies.insert(model.to_string(), reply.to_string());
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ChatBackend for FakeBackend {
        async fn complete(&self, request: &ChatRequest) -> Result<String> {
            self.calls.lock().unwrap().push(request.model.clone());
            self.replies.get(&request.model).cloned().ok_or_else(|| {
                Error::Config(format!("model {} unavailable", request.model))
            })
        }
    }

    #[test]
    fn candidates_put_preferred_first_without_duplicates() {
        let remixer = Remixer::new(FakeBackend::default(), Some("gpt-4o"));
        assert_eq!(
            remixer.candidates(),
            ["gpt-4o", "gpt-4o-mini", "gpt-4.1-mini", "gpt-4.1"]
        );

        let remixer = Remixer::new(FakeBackend::default(), Some("  "));
        assert_eq!(remixer.candidates().len(), DEFAULT_MODEL_CANDIDATES.len());
    }

    #[test]
    fn model_candidates_match_remixer_order() {
        let listed = model_candidates(Some(" my-model "));
        assert_eq!(listed[0], "my-model");
        assert_eq!(listed.len(), DEFAULT_MODEL_CANDIDATES.len() + 1);

        let remixer = Remixer::new(FakeBackend::default(), Some(" my-model "));
        assert_eq!(remixer.candidates(), listed.as_slice());
        assert_eq!(model_candidates(None), DEFAULT_MODEL_CANDIDATES);
    }

    #[test]
    fn clean_remix_strips_separators() {
        assert_eq!(clean_remix("---\nHello\n---"), "Hello");
        assert_eq!(clean_remix("\u{feff}  ---\nbody\n"), "body");
        assert_eq!(clean_remix("  plain text  "), "plain text");
        assert_eq!(clean_remix("# Title\n\n---\n\nmore"), "# Title\n\n---\n\nmore");
    }

    #[test]
    fn ok_must_be_a_whole_word() {
        assert!(contains_ok("OK"));
        assert!(contains_ok("ok."));
        assert!(!contains_ok("okay"));
        assert!(!contains_ok("token"));
    }

    #[tokio::test]
    async fn remix_falls_through_candidates_and_caches() {
        let backend = FakeBackend::default().with_reply("gpt-4o", "---\nYo!\n---");
        let remixer = Remixer::new(backend, None);

        let text = remixer.remix("Hello", "pirate").await.unwrap();

        assert_eq!(text, "Yo!");
        assert_eq!(remixer.cached_model().as_deref(), Some("gpt-4o"));
        assert_eq!(remixer.backend.calls(), ["gpt-4o-mini", "gpt-4o"]);

        remixer.remix("Hello again", "pirate").await.unwrap();
        assert_eq!(
            remixer.backend.calls(),
            ["gpt-4o-mini", "gpt-4o", "gpt-4o"]
        );
    }

    #[tokio::test]
    async fn empty_output_is_a_failure() {
        let backend = FakeBackend::default()
            .with_reply("gpt-4o-mini", "")
            .with_reply("gpt-4o", "rewritten");
        let remixer = Remixer::new(backend, None);

        assert_eq!(remixer.remix("x", "p").await.unwrap(), "rewritten");
    }

    #[tokio::test]
    async fn all_failures_are_reported() {
        let remixer = Remixer::new(FakeBackend::default(), None);

        let err = remixer.remix("x", "p").await.unwrap_err();

        let Error::Remix(message) = &err else {
            panic!("expected remix error, got {err:?}");
        };
        assert!(message.contains("tried: gpt-4o-mini, gpt-4o"));
        assert!(message.contains("model gpt-4.1 failed"));
        assert_eq!(remixer.cached_model(), None);
    }

    #[tokio::test]
    async fn probe_caches_first_ok_model() {
        let backend = FakeBackend::default()
            .with_reply("gpt-4o-mini", "Sure thing")
            .with_reply("gpt-4o", "OK");
        let remixer = Remixer::new(backend, None);

        let report = remixer.probe().await;

        assert!(report.ok);
        assert_eq!(report.model.as_deref(), Some("gpt-4o"));
        assert_eq!(report.sample.as_deref(), Some("OK"));
        assert_eq!(remixer.cached_model().as_deref(), Some("gpt-4o"));
    }

    #[tokio::test]
    async fn probe_failure_collects_errors() {
        let backend = FakeBackend::default().with_reply("gpt-4.1", "nope");
        let remixer = Remixer::new(backend, None);

        let report = remixer.probe().await;

        assert!(!report.ok);
        let error = report.error.unwrap();
        assert!(error.contains("gpt-4.1 unexpected output: nope"));
        assert!(error.contains("gpt-4o-mini:"));
    }

    #[test]
    fn personas_list_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("pirate.md"), "Talk like a pirate.")
            .unwrap();
        std::fs::write(tmp.path().join("butler.md"), "Be formal.").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let personas = Personas::new(tmp.path());

        assert_eq!(personas.list().unwrap(), ["butler", "pirate"]);
        assert_eq!(personas.load("pirate").unwrap(), "Talk like a pirate.");
        assert!(matches!(
            personas.load("ghost").unwrap_err(),
            Error::NotFound { kind: "persona", .. }
        ));
        assert!(matches!(
            personas.load("../pirate").unwrap_err(),
            Error::Invalid(_)
        ));
    }

    #[test]
    fn missing_personas_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let personas = Personas::new(tmp.path().join("absent"));
        assert!(personas.list().unwrap().is_empty());
    }

    #[tokio::test]
    async fn remix_note_keeps_title() {
        let tmp = tempfile::tempdir().unwrap();
        let db = NoteDb::open(&tmp.path().join("notes.redb")).unwrap();
        std::fs::write(tmp.path().join("pirate.md"), "Arr.").unwrap();
        let personas = Personas::new(tmp.path());
        let note = db
            .create_note(1, &NoteInput::new("Plan", "Buy milk"))
            .unwrap();
        let remixer = Remixer::new(
            FakeBackend::default().with_reply("gpt-4o-mini", "Buy grog"),
            None,
        );

        let updated =
            remix_note(&db, &remixer, &personas, note.id, 1, "pirate")
                .await
                .unwrap();
        assert_eq!(updated.title, "Plan");
        assert_eq!(updated.content, "Buy grog");

        let err = remix_note(&db, &remixer, &personas, note.id, 2, "pirate")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { kind: "note", .. }));
    }
}
