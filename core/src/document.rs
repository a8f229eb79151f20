use serde::{Deserialize, Serialize};

pub const TITLE: &str = "title";
pub const WIKI_ID: &str = "wiki-id";
pub const WIKI_TITLE: &str = "wiki-title";
pub const TYPE: &str = "type";
pub const LISTS: &str = "lists";
pub const INFOBOX: &str = "infobox";
pub const EMPH: &str = "emph";
pub const SECTIONS: &str = "sections";
pub const DESC: &str = "desc";
pub const LINK: &str = "link";
pub const CONTENT: &str = "content";
pub const SUMMARY: &str = "summary";

/// How a field is indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOptions {
    pub indexed: bool,
    /// Analyzed into terms; otherwise the whole value is a single term.
    pub tokenized: bool,
    pub stored: bool,
    pub term_vectors: bool,
}

impl FieldOptions {
    pub const TEXT_STORED: Self = Self { indexed: true, tokenized: true, stored: true, term_vectors: false };
    pub const TEXT: Self = Self { indexed: true, tokenized: true, stored: false, term_vectors: false };
    pub const KEYWORD_STORED: Self = Self { indexed: true, tokenized: false, stored: true, term_vectors: false };
    pub const VECTORS_STORED: Self = Self { indexed: true, tokenized: true, stored: true, term_vectors: true };
    pub const VECTORS: Self = Self { indexed: true, tokenized: true, stored: false, term_vectors: true };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Int(i64),
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Int(_) => None,
        }
    }

    /// Integer view; text values are parsed.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            FieldValue::Text(s) => s.trim().parse().ok(),
        }
    }

    /// The string indexed for non-tokenized values.
    pub fn to_term(&self) -> String {
        match self {
            FieldValue::Int(v) => v.to_string(),
            FieldValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub value: FieldValue,
    pub options: FieldOptions,
}

/// A document ready to be indexed. Field names may repeat; every value is
/// indexed.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self { Self::default() }

    pub fn add_text(&mut self, name: &str, value: impl Into<String>, options: FieldOptions) {
        self.fields.push(Field { name: name.to_string(), value: FieldValue::Text(value.into()), options });
    }

    pub fn add_int(&mut self, name: &str, value: i64) {
        self.fields.push(Field { name: name.to_string(), value: FieldValue::Int(value), options: FieldOptions::KEYWORD_STORED });
    }

    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields.iter().filter(move |f| f.name == name).map(|f| &f.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredField {
    pub name: String,
    pub value: FieldValue,
}

/// The stored part of an indexed document, as returned by fetches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub fields: Vec<StoredField>,
}

impl StoredDocument {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldValue> + 'a {
        self.fields.iter().filter(move |f| f.name == name).map(|f| &f.value)
    }

    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }
}
