//! Simplified retelling and glossary generation on top of two chat models.

pub mod glossary;
pub mod json;
pub mod prompts;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    config::LanguageSettings,
    domain::{Glossary, WordEntry},
    errors::Error,
    ports::{ChatModel, VocabularyStore},
    utils::truncate_text,
    Result,
};

use self::{
    glossary::{glossary_tokens, parse_word_entries, select_glossary},
    json::extract_latest_json_object,
};

/// How much of an unparseable model answer goes into the error / log line.
const RAW_SNIPPET_LEN: usize = 500;

/// Translation plus glossary; `glossary` is `None` when that step failed.
#[derive(Clone, Debug, PartialEq)]
pub struct Simplified {
    pub translation: String,
    pub glossary: Option<Glossary>,
}

/// Drop `<think>...</think>` blocks and code-fence lines, then trim.
pub fn sanitize_output(raw: &str) -> String {
    const OPEN: &str = "<think>";
    const CLOSE: &str = "</think>";

    let mut text = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(OPEN) {
        text.push_str(&rest[..start]);
        match rest[start..].find(CLOSE) {
            Some(end) => rest = &rest[start + end + CLOSE.len()..],
            None => {
                // Unterminated block: keep the remainder.
                rest = &rest[start..];
                break;
            }
        }
    }
    text.push_str(rest);

    text.lines()
        .filter(|line| !line.trim_start().starts_with('`'))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

pub struct TranslationService {
    translate_model: Arc<dyn ChatModel>,
    words_model: Arc<dyn ChatModel>,
    vocabulary: Arc<dyn VocabularyStore>,
    language: LanguageSettings,
}

impl TranslationService {
    pub fn new(
        translate_model: Arc<dyn ChatModel>,
        words_model: Arc<dyn ChatModel>,
        vocabulary: Arc<dyn VocabularyStore>,
        language: LanguageSettings,
    ) -> Self {
        Self {
            translate_model,
            words_model,
            vocabulary,
            language,
        }
    }

    /// Simplified retelling of `text`. Empty output is an error.
    pub async fn translate(&self, text: &str) -> Result<String> {
        let prompt = prompts::simplify_prompt(text, &self.language);
        let raw = self.translate_model.complete(&prompt).await?;
        let translation = sanitize_output(&raw);
        if translation.is_empty() {
            return Err(Error::Model(format!(
                "model {} returned an empty translation",
                self.translate_model.model_name()
            )));
        }
        Ok(translation)
    }

    /// Glossary for the words of `translation`, consulting and filling the
    /// vocabulary cache.
    pub async fn build_glossary(&self, translation: &str) -> Result<Glossary> {
        let tokens = glossary_tokens(translation);
        if tokens.is_empty() {
            return Ok(Glossary::new());
        }

        let mut keys: Vec<String> = Vec::with_capacity(tokens.len());
        for t in &tokens {
            if !keys.contains(&t.key) {
                keys.push(t.key.clone());
            }
        }

        let mut known = self.vocabulary.lookup_words(&keys).await?;
        let unknown: Vec<String> = keys
            .into_iter()
            .filter(|k| !known.contains_key(k))
            .collect();
        debug!(
            cached = known.len(),
            unknown = unknown.len(),
            "vocabulary lookup"
        );

        if !unknown.is_empty() {
            for entry in self.lookup_unknown(&unknown, translation).await? {
                known.entry(entry.word.clone()).or_insert(entry);
            }
        }

        Ok(select_glossary(&tokens, &known))
    }

    async fn lookup_unknown(&self, words: &[String], context: &str) -> Result<Vec<WordEntry>> {
        let prompt = prompts::words_prompt(words, context, &self.language);
        let raw = self.words_model.complete(&prompt).await?;
        let reply = sanitize_output(&raw);

        let Some(map) = extract_latest_json_object(&reply) else {
            warn!(raw = %truncate_text(&raw, RAW_SNIPPET_LEN), "no JSON object in words response");
            return Err(Error::Parse {
                reason: "words response contains no JSON object".to_string(),
                raw: truncate_text(&raw, RAW_SNIPPET_LEN),
            });
        };

        let entries = parse_word_entries(&map);
        // A failed cache write is logged; the entries are still used.
        match self.vocabulary.insert_words(&entries).await {
            Ok(inserted) => info!(
                requested = words.len(),
                received = entries.len(),
                inserted,
                "vocabulary updated"
            ),
            Err(e) => warn!(error = %e, "failed to cache vocabulary entries"),
        }
        Ok(entries)
    }

    /// Translation followed by glossary. A glossary failure is logged and
    /// reported as `glossary: None`; a translation failure is an error.
    pub async fn simplify(&self, text: &str) -> Result<Simplified> {
        let translation = self.translate(text).await?;
        let glossary = match self.build_glossary(&translation).await {
            Ok(g) => Some(g),
            Err(e) => {
                warn!(error = %e, "glossary generation failed");
                None
            }
        };
        Ok(Simplified {
            translation,
            glossary,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, sync::Mutex};

    use async_trait::async_trait;

    use super::*;

    struct FakeModel {
        replies: Mutex<Vec<Result<String>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeModel {
        fn new(replies: Vec<Result<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        fn model_name(&self) -> &str {
            "fake"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                return Err(Error::Model("no scripted reply".to_string()));
            }
            replies.remove(0)
        }
    }

    #[derive(Default)]
    struct FakeVocabulary {
        words: Mutex<HashMap<String, WordEntry>>,
    }

    #[async_trait]
    impl VocabularyStore for FakeVocabulary {
        async fn lookup_words(&self, words: &[String]) -> Result<HashMap<String, WordEntry>> {
            let map = self.words.lock().unwrap();
            Ok(words
                .iter()
                .filter_map(|w| map.get(w).map(|e| (w.clone(), e.clone())))
                .collect())
        }

        async fn insert_words(&self, entries: &[WordEntry]) -> Result<usize> {
            let mut map = self.words.lock().unwrap();
            let mut n = 0;
            for e in entries {
                if !map.contains_key(&e.word) {
                    map.insert(e.word.clone(), e.clone());
                    n += 1;
                }
            }
            Ok(n)
        }
    }

    fn entry(word: &str, translation: &str, pos: &str) -> WordEntry {
        WordEntry {
            word: word.to_string(),
            translation: translation.to_string(),
            part_of_speech: pos.to_string(),
        }
    }

    fn service(
        translate: Arc<FakeModel>,
        words: Arc<FakeModel>,
        vocab: Arc<FakeVocabulary>,
    ) -> TranslationService {
        TranslationService::new(translate, words, vocab, LanguageSettings::default())
    }

    #[test]
    fn sanitize_strips_reasoning_and_fences() {
        let raw = "<think>\nlet me think {\"x\": 1}\n</think>\n```\nΗ γάτα τρώει.\n```\n";
        assert_eq!(sanitize_output(raw), "Η γάτα τρώει.");
        assert_eq!(sanitize_output("  plain  "), "plain");
        assert_eq!(sanitize_output("<think>only thoughts</think>"), "");
    }

    #[tokio::test]
    async fn empty_translation_is_an_error() {
        let translate = FakeModel::new(vec![Ok("<think>hmm</think>".to_string())]);
        let words = FakeModel::new(vec![]);
        let svc = service(translate, words, Arc::new(FakeVocabulary::default()));
        let err = svc.translate("news").await.unwrap_err();
        assert!(matches!(err, Error::Model(_)));
    }

    #[tokio::test]
    async fn glossary_uses_cache_and_asks_only_for_unknown_words() {
        let vocab = Arc::new(FakeVocabulary::default());
        vocab
            .insert_words(&[entry("γάτα", "cat", "noun")])
            .await
            .unwrap();

        let words = FakeModel::new(vec![Ok(
            r#"Sure! {"τρώει": ["eats", "verb"], "η": ["the", "article"]}"#.to_string(),
        )]);
        let translate = FakeModel::new(vec![]);
        let svc = service(translate, words.clone(), vocab.clone());

        let glossary = svc.build_glossary("Η γάτα τρώει.").await.unwrap();
        assert_eq!(glossary.len(), 2);
        assert_eq!(glossary["γάτα"], "cat");
        assert_eq!(glossary["τρώει"], "eats");

        let prompt = words.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("Words: η, τρώει"));
        assert!(vocab.words.lock().unwrap().contains_key("τρώει"));

        // Everything is cached now.
        let again = svc.build_glossary("Η γάτα τρώει.").await.unwrap();
        assert_eq!(again, glossary);
        assert_eq!(words.calls(), 1);
    }

    #[tokio::test]
    async fn unparseable_words_response_fails_glossary_only() {
        let translate = FakeModel::new(vec![Ok("Η γάτα τρώει.".to_string())]);
        let words = FakeModel::new(vec![Ok("I cannot help with that".to_string())]);
        let svc = service(translate, words, Arc::new(FakeVocabulary::default()));

        let err = svc.build_glossary("Η γάτα").await.unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));

        let translate = FakeModel::new(vec![Ok("Η γάτα τρώει.".to_string())]);
        let words = FakeModel::new(vec![Ok("still no json".to_string())]);
        let svc = service(translate, words, Arc::new(FakeVocabulary::default()));
        let out = svc.simplify("The cat eats.").await.unwrap();
        assert_eq!(out.translation, "Η γάτα τρώει.");
        assert!(out.glossary.is_none());
    }

    #[tokio::test]
    async fn words_reply_is_sanitized_before_parsing() {
        let words = FakeModel::new(vec![Ok(concat!(
            "{\"τρώει\": [\"eats\", \"verb\"]}\n",
            "<think>or maybe {\"τρώει\": [\"drinks\", \"verb\"]}</think>\n",
            "```",
        )
        .to_string())]);
        let vocab = Arc::new(FakeVocabulary::default());
        let svc = service(FakeModel::new(vec![]), words, vocab.clone());

        let glossary = svc.build_glossary("τρώει").await.unwrap();
        assert_eq!(glossary["τρώει"], "eats");
        assert_eq!(vocab.words.lock().unwrap()["τρώει"].translation, "eats");
    }

    #[tokio::test]
    async fn latin_only_translation_needs_no_model_call() {
        let words = FakeModel::new(vec![]);
        let svc = service(
            FakeModel::new(vec![]),
            words.clone(),
            Arc::new(FakeVocabulary::default()),
        );
        let glossary = svc.build_glossary("Nintendo Switch 2").await.unwrap();
        assert!(glossary.is_empty());
        assert_eq!(words.calls(), 0);
    }
}
