//! History search: `date:` and `type:` filters plus free text.

use super::HistoryStore;
use crate::crypto::KeyMaterial;
use crate::database::HistoryEntry;
use crate::Result;
use regex::Regex;
use std::sync::LazyLock;

static DATE_FILTER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)date:\s*(\d{4}-\d{2}-\d{2})").ok());

static TYPE_FILTER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)type:\s*(code|text)").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Code,
    Text,
}

/// Parsed search query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistorySearch {
    /// `YYYY-MM-DD` prefix the timestamp must start with
    pub date: Option<String>,
    pub kind: Option<EntryKind>,
    /// Lower-cased substring matched against decrypted text
    pub text: String,
}

/// Pull the first match of `re` out of `query`, returning its capture
fn take_filter(re: &Option<Regex>, query: &mut String) -> Option<String> {
    let re = re.as_ref()?;
    let value = re.captures(query)?.get(1)?.as_str().to_lowercase();
    *query = re.replace_all(query, "").into_owned();
    Some(value)
}

impl HistorySearch {
    /// Parse `date:2024-01-31 type:code needle` style queries
    pub fn parse(query: &str) -> Self {
        let mut rest = query.to_string();
        let date = take_filter(&DATE_FILTER, &mut rest);
        let kind = take_filter(&TYPE_FILTER, &mut rest).map(|k| match k.as_str() {
            "code" => EntryKind::Code,
            _ => EntryKind::Text,
        });
        Self {
            date,
            kind,
            text: rest.trim().to_lowercase(),
        }
    }

    /// Whether an entry with `plaintext` passes every filter
    pub fn matches(&self, entry: &HistoryEntry, plaintext: &str) -> bool {
        if let Some(date) = &self.date {
            if !entry.timestamp.starts_with(date.as_str()) {
                return false;
            }
        }
        match self.kind {
            Some(EntryKind::Code) if !entry.is_code => return false,
            Some(EntryKind::Text) if entry.is_code => return false,
            _ => {}
        }
        self.text.is_empty() || plaintext.to_lowercase().contains(&self.text)
    }
}

impl HistoryStore {
    /// Entries matching `search` in display order, with their decrypted text.
    ///
    /// Undecryptable entries have empty text and only match queries
    /// without a text term.
    pub fn search(&self, search: &HistorySearch, keys: &KeyMaterial) -> Result<Vec<(HistoryEntry, String)>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|entry| search.date.as_deref().map_or(true, |d| entry.timestamp.starts_with(d)))
            .map(|entry| {
                let text = keys.decrypt(&entry.ciphertext);
                (entry, text)
            })
            .filter(|(entry, text)| search.matches(entry, text))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TokenKey;

    fn store() -> (HistoryStore, KeyMaterial) {
        let keys = KeyMaterial::fixed(TokenKey::generate());
        let store = HistoryStore::in_memory().unwrap();
        for (text, ts, code) in [
            ("Grocery list", "2024-01-31 08:00:00", false),
            ("fn main() {\n}", "2024-01-31 09:00:00", true),
            ("def grocery():\n    pass", "2024-02-01 10:00:00", true),
            ("Meeting notes", "2024-02-01 11:00:00", false),
        ] {
            store.append(&keys.encrypt(text).unwrap(), ts, code).unwrap();
        }
        (store, keys)
    }

    fn texts(store: &HistoryStore, keys: &KeyMaterial, query: &str) -> Vec<String> {
        store
            .search(&HistorySearch::parse(query), keys)
            .unwrap()
            .into_iter()
            .map(|(_, text)| text)
            .collect()
    }

    #[test]
    fn test_parse() {
        let search = HistorySearch::parse("  DATE: 2024-01-31 Type:Code  Needle ");
        assert_eq!(search.date.as_deref(), Some("2024-01-31"));
        assert_eq!(search.kind, Some(EntryKind::Code));
        assert_eq!(search.text, "needle");

        assert_eq!(HistorySearch::parse(""), HistorySearch::default());
        assert_eq!(HistorySearch::parse("date:yesterday").text, "date:yesterday");
    }

    #[test]
    fn test_text_is_case_insensitive() {
        let (store, keys) = store();
        assert_eq!(
            texts(&store, &keys, "GROCERY"),
            vec!["def grocery():\n    pass".to_string(), "Grocery list".to_string()]
        );
        assert_eq!(texts(&store, &keys, "").len(), 4);
    }

    #[test]
    fn test_date_filter() {
        let (store, keys) = store();
        assert_eq!(
            texts(&store, &keys, "date:2024-02-01"),
            vec!["Meeting notes".to_string(), "def grocery():\n    pass".to_string()]
        );
    }

    #[test]
    fn test_type_filter() {
        let (store, keys) = store();
        assert_eq!(
            texts(&store, &keys, "type:text"),
            vec!["Meeting notes".to_string(), "Grocery list".to_string()]
        );
        assert_eq!(texts(&store, &keys, "type:code").len(), 2);
    }

    #[test]
    fn test_filters_combine() {
        let (store, keys) = store();
        assert_eq!(texts(&store, &keys, "type:code date:2024-02-01 grocery"), vec!["def grocery():\n    pass".to_string()]);
        assert!(texts(&store, &keys, "type:text date:2024-02-01 grocery").is_empty());
    }

    #[test]
    fn test_undecryptable_entries_need_no_text_term() {
        let (store, keys) = store();
        store.append(b"garbage", "2024-03-01 00:00:00", false).unwrap();
        assert_eq!(texts(&store, &keys, "date:2024-03-01"), vec![String::new()]);
        assert!(texts(&store, &keys, "date:2024-03-01 garbage").is_empty());
    }
}
