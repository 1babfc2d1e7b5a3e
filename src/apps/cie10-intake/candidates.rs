// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

// Keyword heuristic standing in for a text-classification service.
// Maps free-text clinical input to ordered CIE-10 candidates.

use super::types::Candidate;
use crate::IntakeError;
use async_trait::async_trait;

/// Source of CIE-10 candidates for a piece of submitted text.
///
/// Implementations return an ordered list; an empty list is a valid answer and
/// must not be turned into an error.
#[async_trait]
pub trait CandidateGenerator: Send + Sync {
    async fn generate(&self, texto: &str) -> Result<Vec<Candidate>, IntakeError>;

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

/// A group of trigger keywords and the candidates appended when any of them matches.
pub struct KeywordCategory {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
    pub candidates: &'static [(&'static str, &'static str)],
}

/// Evaluated in declaration order. Categories may share codes.
pub const KEYWORD_CATEGORIES: &[KeywordCategory] = &[
    KeywordCategory {
        name: "dolor",
        keywords: &["dolor"],
        candidates: &[
            ("R52", "Dolor, no clasificado en otra parte"),
            ("R51", "Cefalea"),
            ("R10.4", "Otros dolores abdominales y los no especificados"),
        ],
    },
    KeywordCategory {
        name: "cefalea",
        keywords: &["cabeza", "cefalea", "migraña"],
        candidates: &[
            ("R51", "Cefalea"),
            ("G44.2", "Cefalea debida a tensión"),
            ("G43.9", "Migraña, no especificada"),
        ],
    },
    KeywordCategory {
        name: "fiebre",
        keywords: &["fiebre", "febril"],
        candidates: &[
            ("R50.9", "Fiebre, no especificada"),
            ("R50.8", "Otras fiebres especificadas"),
        ],
    },
    KeywordCategory {
        name: "tos",
        keywords: &["tos"],
        candidates: &[
            ("R05", "Tos"),
            ("J20.9", "Bronquitis aguda, no especificada"),
        ],
    },
    KeywordCategory {
        name: "diabetes",
        keywords: &["diabetes", "diabético", "diabética"],
        candidates: &[
            ("E11.9", "Diabetes mellitus tipo 2, sin mención de complicación"),
            ("E10.9", "Diabetes mellitus tipo 1, sin mención de complicación"),
            (
                "E14.9",
                "Diabetes mellitus, no especificada, sin mención de complicación",
            ),
        ],
    },
];

/// Deterministic keyword matcher over `KEYWORD_CATEGORIES`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordCandidateGenerator;

impl KeywordCandidateGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Concatenate the candidates of every matching category, without de-duplication.
    pub fn candidates_for(&self, texto: &str) -> Vec<Candidate> {
        let folded = texto.to_lowercase();
        KEYWORD_CATEGORIES
            .iter()
            .filter(|category| category.keywords.iter().any(|kw| folded.contains(kw)))
            .flat_map(|category| category.candidates.iter())
            .map(|(codigo, desc)| Candidate::new(*codigo, *desc))
            .collect()
    }
}

#[async_trait]
impl CandidateGenerator for KeywordCandidateGenerator {
    async fn generate(&self, texto: &str) -> Result<Vec<Candidate>, IntakeError> {
        Ok(self.candidates_for(texto))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn codes(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.codigo.as_str()).collect()
    }

    #[test]
    fn test_pain_candidates() {
        let candidates = KeywordCandidateGenerator::new().candidates_for("dolor de cabeza");
        assert!(!candidates.is_empty());
        assert!(candidates
            .iter()
            .any(|c| c.desc.to_lowercase().contains("dolor")));
    }

    #[test]
    fn test_diabetes_candidates() {
        let candidates = KeywordCandidateGenerator::new().candidates_for("Diabetes tipo 2");
        assert_eq!(codes(&candidates), vec!["E11.9", "E10.9", "E14.9"]);
        assert!(candidates
            .iter()
            .all(|c| c.desc.to_lowercase().contains("diabetes")));
    }

    #[test]
    fn test_no_keywords() {
        let candidates =
            KeywordCandidateGenerator::new().candidates_for("texto desconocido sin palabras clave");
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_categories_concatenate_in_declaration_order() {
        // Output follows the table, not the order of words in the text.
        let candidates = KeywordCandidateGenerator::new().candidates_for("FIEBRE y dolor");
        assert_eq!(
            codes(&candidates),
            vec!["R52", "R51", "R10.4", "R50.9", "R50.8"]
        );
    }

    #[test]
    fn test_shared_codes_are_not_deduplicated() {
        let candidates = KeywordCandidateGenerator::new().candidates_for("dolor de cabeza");
        let r51 = candidates.iter().filter(|c| c.codigo == "R51").count();
        assert_eq!(r51, 2);
        assert_eq!(
            codes(&candidates),
            vec!["R52", "R51", "R10.4", "R51", "G44.2", "G43.9"]
        );
    }

    #[test]
    fn test_category_appended_once() {
        let candidates =
            KeywordCandidateGenerator::new().candidates_for("cefalea y migraña, dolor de cabeza");
        assert_eq!(candidates.len(), 6);
    }

    #[tokio::test]
    async fn test_generate_is_deterministic() {
        let generator = KeywordCandidateGenerator::new();
        let first = generator.generate("tos con fiebre").await.unwrap();
        let second = generator.generate("tos con fiebre").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(codes(&first), vec!["R50.9", "R50.8", "R05", "J20.9"]);
    }
}
