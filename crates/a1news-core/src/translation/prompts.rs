use crate::config::LanguageSettings;

pub fn simplify_prompt(text: &str, lang: &LanguageSettings) -> String {
    format!(
        "Retell this news in {target} using basic language of level {level}. \
Use short, simple sentences, not more than {max} sentences. \
Reply with the retelling only, without a title, notes or explanations.\n\n\
News:\n{text}",
        target = lang.target_language,
        level = lang.level,
        max = lang.max_sentences,
        text = text.trim(),
    )
}

pub fn words_prompt(words: &[String], context: &str, lang: &LanguageSettings) -> String {
    format!(
        "Translate each of the following {target} words into {gloss} and give its part of speech \
(noun, verb, adjective, adverb, pronoun, preposition, article, conjunction, particle, \
proper noun, auxiliary verb, symbol, numeral, interjection).\n\
Translate the word as it is used in the text below.\n\
Answer with one JSON object only, in exactly this shape:\n\
{{\"word1\": [\"translation\", \"part of speech\"], \"word2\": [\"translation\", \"part of speech\"]}}\n\n\
Words: {words}\n\n\
Text:\n{context}",
        target = lang.target_language,
        gloss = lang.gloss_language,
        words = words.join(", "),
        context = context.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simplify_prompt_is_parameterized() {
        let lang = LanguageSettings {
            target_language: "Spanish".to_string(),
            level: "A2".to_string(),
            gloss_language: "German".to_string(),
            max_sentences: 4,
        };
        let p = simplify_prompt("  Big news  ", &lang);
        assert!(p.contains("in Spanish"));
        assert!(p.contains("level A2"));
        assert!(p.contains("not more than 4 sentences"));
        assert!(p.ends_with("Big news"));
    }

    #[test]
    fn words_prompt_lists_words_and_shape() {
        let lang = LanguageSettings::default();
        let p = words_prompt(
            &["σπίτι".to_string(), "γάτα".to_string()],
            "Η γάτα στο σπίτι.",
            &lang,
        );
        assert!(p.contains("Words: σπίτι, γάτα"));
        assert!(p.contains(r#"{"word1": ["translation", "part of speech"]"#));
        assert!(p.contains("into English"));
    }
}
