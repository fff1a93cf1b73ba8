use serde::{Deserialize, Serialize};

use crate::model::CodeKind;

/// Recognized code prefixes per kind.
///
/// Deserializes from a `[vocabulary]` TOML table; missing lists fall back to
/// the price-book defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Vocabulary {
    pub work_a: Vec<String>,
    pub work_b: Vec<String>,
    pub material_a: Vec<String>,
    pub material_b: Vec<String>,
    pub excluded: Vec<String>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self {
            work_a: vec!["ФЕР".into()],
            work_b: vec!["ТЕР".into()],
            material_a: vec!["ФССЦпг".into(), "ФССЦ".into()],
            material_b: vec!["ТССЦ".into()],
            excluded: vec!["ФСЭМ".into()],
        }
    }
}

impl Vocabulary {
    /// Every (prefix, kind) pair, longest prefix first.
    ///
    /// Ties keep declaration order (work, material, excluded), so the result
    /// is deterministic for any configuration.
    pub fn prefixes(&self) -> Vec<(&str, CodeKind)> {
        let mut out: Vec<(&str, CodeKind)> = Vec::new();
        let groups = [
            (&self.work_a, CodeKind::WorkA),
            (&self.work_b, CodeKind::WorkB),
            (&self.material_a, CodeKind::MaterialA),
            (&self.material_b, CodeKind::MaterialB),
            (&self.excluded, CodeKind::Excluded),
        ];
        for (list, kind) in groups {
            for prefix in list.iter().filter(|p| !p.is_empty()) {
                out.push((prefix.as_str(), kind));
            }
        }
        out.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));
        out
    }
}

/// Classify a position by the prefix of its code string.
pub fn classify(code: &str, vocabulary: &Vocabulary) -> CodeKind {
    Classifier::new(vocabulary).classify(code)
}

/// Prefix table resolved once, for classifying many codes in a walk.
#[derive(Debug, Clone)]
pub struct Classifier {
    prefixes: Vec<(String, CodeKind)>,
}

impl Classifier {
    pub fn new(vocabulary: &Vocabulary) -> Self {
        Self {
            prefixes: vocabulary
                .prefixes()
                .into_iter()
                .map(|(p, k)| (p.to_string(), k))
                .collect(),
        }
    }

    pub fn classify(&self, code: &str) -> CodeKind {
        let code = code.trim_start();
        if code.is_empty() {
            return CodeKind::Unclassified;
        }
        self.prefixes
            .iter()
            .find(|(prefix, _)| code.starts_with(prefix.as_str()))
            .map(|(_, kind)| *kind)
            .unwrap_or(CodeKind::Unclassified)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(code: &str) -> CodeKind {
        classify(code, &Vocabulary::default())
    }

    #[test]
    fn default_prefixes() {
        assert_eq!(kind("ФЕР01-01-003-02"), CodeKind::WorkA);
        assert_eq!(kind("ТЕР06-01-001-01"), CodeKind::WorkB);
        assert_eq!(kind("ФССЦ-101-0782"), CodeKind::MaterialA);
        assert_eq!(kind("ФССЦпг-01-01-01-041"), CodeKind::MaterialA);
        assert_eq!(kind("ТССЦ-401-0006"), CodeKind::MaterialB);
        assert_eq!(kind("ФСЭМ-91.05.05-015"), CodeKind::Excluded);
    }

    #[test]
    fn unknown_and_empty_codes() {
        assert_eq!(kind(""), CodeKind::Unclassified);
        assert_eq!(kind("   "), CodeKind::Unclassified);
        assert_eq!(kind("Прайс"), CodeKind::Unclassified);
        // prefix must be at the start
        assert_eq!(kind("xФЕР01"), CodeKind::Unclassified);
    }

    #[test]
    fn leading_whitespace_is_ignored() {
        assert_eq!(kind("  ТЕР01-01"), CodeKind::WorkB);
    }

    #[test]
    fn longer_prefix_wins_regardless_of_order() {
        // A generic "ФССЦ" listed as MaterialB must not shadow the more
        // specific "ФССЦпг" listed as MaterialA.
        let vocabulary = Vocabulary {
            work_a: vec![],
            work_b: vec![],
            material_a: vec!["ФССЦпг".into()],
            material_b: vec!["ФССЦ".into()],
            excluded: vec![],
        };
        assert_eq!(classify("ФССЦпг-01", &vocabulary), CodeKind::MaterialA);
        assert_eq!(classify("ФССЦ-01", &vocabulary), CodeKind::MaterialB);
    }

    #[test]
    fn empty_prefixes_are_ignored() {
        let vocabulary = Vocabulary {
            work_a: vec![String::new()],
            ..Vocabulary::default()
        };
        assert_eq!(classify("ABC", &vocabulary), CodeKind::Unclassified);
        assert_eq!(vocabulary.prefixes().len(), 5);
    }

    #[test]
    fn missing_vocabulary_lists_use_defaults() {
        let parsed: Vocabulary = serde_json::from_str(r#"{"work_b": ["ТЕР", "ТЕРр"]}"#).unwrap();
        assert_eq!(parsed.work_a, vec!["ФЕР".to_string()]);
        assert_eq!(parsed.work_b.len(), 2);
        assert_eq!(parsed.excluded, vec!["ФСЭМ".to_string()]);
    }
}
