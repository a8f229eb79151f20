//! Maps a parsed, already cleaned article onto the index field schema.

use crate::document::{self, Document, FieldOptions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Infobox {
    pub name: String,
    pub description: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Link {
    pub description: String,
    /// Normalized target name, words joined by underscores.
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Article {
    pub wid: u32,
    pub title: String,
    pub wiki_title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub lists: Vec<Vec<String>>,
    pub infobox: Infobox,
    pub highlights: Vec<String>,
    pub sections: Vec<String>,
    pub links: Vec<Link>,
    pub text: String,
    pub summary: String,
}

impl Article {
    /// An article carrying only an id and body text.
    pub fn with_content(wid: u32, text: impl Into<String>) -> Self {
        Self { wid, text: text.into(), ..Self::default() }
    }
}

/// Builds the index document for an article. Multi-valued sources become
/// repeated values of one field, duplicates included.
pub fn build(article: &Article) -> Document {
    let mut d = Document::new();
    d.add_text(document::TITLE, &article.title, FieldOptions::TEXT_STORED);
    d.add_int(document::WIKI_ID, i64::from(article.wid));
    d.add_text(document::WIKI_TITLE, &article.wiki_title, FieldOptions::KEYWORD_STORED);
    d.add_text(document::TYPE, &article.kind, FieldOptions::KEYWORD_STORED);
    for item in article.lists.iter().flatten() {
        d.add_text(document::LISTS, item, FieldOptions::TEXT);
    }
    d.add_text(document::INFOBOX, &article.infobox.name, FieldOptions::TEXT_STORED);
    for e in &article.infobox.description {
        d.add_text(document::INFOBOX, e, FieldOptions::TEXT_STORED);
    }
    for e in &article.highlights {
        d.add_text(document::EMPH, e, FieldOptions::VECTORS_STORED);
    }
    for e in &article.sections {
        d.add_text(document::SECTIONS, e, FieldOptions::TEXT);
    }
    for l in &article.links {
        d.add_text(document::DESC, &l.description, FieldOptions::VECTORS_STORED);
        d.add_text(document::LINK, l.id.replace('_', " "), FieldOptions::VECTORS_STORED);
    }
    d.add_text(document::CONTENT, &article.text, FieldOptions::VECTORS);
    d.add_text(document::SUMMARY, &article.summary, FieldOptions::VECTORS_STORED);
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::FieldValue;

    fn sample() -> Article {
        Article {
            wid: 534366,
            title: "Barack Obama".into(),
            wiki_title: "Barack_Obama".into(),
            kind: "ARTICLE".into(),
            lists: vec![vec!["a".into(), "b".into()], vec!["a".into()]],
            infobox: Infobox { name: "officeholder".into(), description: vec!["44th president".into()] },
            highlights: vec!["Barack Hussein Obama II".into()],
            sections: vec!["Early life".into(), "Presidency".into()],
            links: vec![
                Link { description: "Honolulu".into(), id: "Honolulu".into() },
                Link { description: "Democratic Party".into(), id: "Democratic_Party_(United_States)".into() },
            ],
            text: "Barack Obama served as president.".into(),
            summary: "44th president of the United States".into(),
        }
    }

    #[test]
    fn maps_every_field() {
        let d = build(&sample());
        assert_eq!(d.values(document::WIKI_ID).next(), Some(&FieldValue::Int(534366)));
        assert_eq!(d.values(document::INFOBOX).count(), 2);
        assert_eq!(d.values(document::SECTIONS).count(), 2);
        assert_eq!(d.values(document::DESC).count(), 2);
        let links: Vec<_> = d.values(document::LINK).filter_map(FieldValue::as_text).collect();
        assert_eq!(links[1], "Democratic Party (United States)");
        assert_eq!(d.values(document::CONTENT).count(), 1);
    }

    #[test]
    fn keeps_duplicate_values() {
        let d = build(&sample());
        let lists: Vec<_> = d.values(document::LISTS).filter_map(FieldValue::as_text).collect();
        assert_eq!(lists, vec!["a", "b", "a"]);
    }

    #[test]
    fn content_is_not_stored() {
        let d = build(&Article::with_content(7, "body"));
        let content = d.fields.iter().find(|f| f.name == document::CONTENT).unwrap();
        assert!(!content.options.stored);
        assert!(content.options.term_vectors);
    }
}
