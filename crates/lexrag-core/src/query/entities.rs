//! Entity Extraction
//!
//! Pulls structured mentions out of normalized query text using ordered
//! lexical pattern tables: article/chapter/section numbers, named laws
//! (with a special case for the constitution), dates and quoted phrases.
//!
//! Pure function, no I/O. An empty result is a valid result.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// ENTITY TYPES
// ============================================================================

/// Types of structured mentions found in a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// An article number ("artículo 76", "art. 76")
    Article,
    /// A chapter number, arabic or roman ("capítulo ii")
    Chapter,
    /// A section or title number
    Section,
    /// A named law, code or the constitution
    Law,
    /// A calendar date
    Date,
    /// A quoted phrase with no more specific type
    Entity,
}

impl EntityType {
    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Article => "article",
            EntityType::Chapter => "chapter",
            EntityType::Section => "section",
            EntityType::Law => "law",
            EntityType::Date => "date",
            EntityType::Entity => "entity",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One structured mention extracted from the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEntity {
    /// What kind of mention this is
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    /// Raw matched substring
    pub value: String,
    /// Canonical form (digits only for numbers, lowercase for names)
    pub normalized_value: String,
    /// Character offset of the match in the normalized query
    pub position: usize,
}

// ============================================================================
// PATTERN TABLES
// ============================================================================

static ARTICLE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bart(?:[íi]culo|\.)\s*(\d+)\b",
        r"\bart\s+(\d+)\b",
        r"\barticle\s+(\d+)\b",
    ])
});

static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bcap(?:[íi]tulo|\.)\s*(\d+|[mdclxvi]+)\b",
        r"\bchapter\s+(\d+|[mdclxvi]+)\b",
    ])
});

static SECTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bsecci[óo]n\s+(\d+|[mdclxvi]+)\b",
        r"\bt[íi]tulo\s+(\d+|[mdclxvi]+)\b",
        r"\bsection\s+(\d+)\b",
    ])
});

static LAW_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        // The constitution rarely appears with a full title; match it alone.
        r"\bconstituci[óo]n(?:\s+pol[íi]tica)?(?:\s+de\s+la\s+rep[úu]blica)?\b",
        r"\bley\s+(?:org[áa]nica\s+)?(?:de[l]?\s+)?[a-záéíóúñ]+(?:\s+[a-záéíóúñ]+){0,3}",
        r"\bc[óo]digo\s+[a-záéíóúñ]+(?:\s+[a-záéíóúñ]+){0,2}",
    ])
});

static DATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\b\d{1,2}\s+de\s+[a-záéíóúñ]+\s+(?:de\s+)?\d{4}\b",
        r"\b\d{4}-\d{2}-\d{2}\b",
    ])
});

static QUOTED_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r#""([^"]{2,80})""#, r"'([^']{2,80})'"]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("entity pattern is valid"))
        .collect()
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Extract all structured mentions from a normalized query.
///
/// Matches are returned in order of first occurrence. Overlapping matches of
/// the same type at the same position are de-duplicated (the earlier pattern
/// in the table wins).
pub fn extract_entities(normalized_query: &str) -> Vec<QueryEntity> {
    let mut entities: Vec<QueryEntity> = Vec::new();
    let mut seen: HashSet<(EntityType, usize)> = HashSet::new();

    let tables: [(EntityType, &[Regex]); 6] = [
        (EntityType::Article, &ARTICLE_PATTERNS),
        (EntityType::Chapter, &CHAPTER_PATTERNS),
        (EntityType::Section, &SECTION_PATTERNS),
        (EntityType::Law, &LAW_PATTERNS),
        (EntityType::Date, &DATE_PATTERNS),
        (EntityType::Entity, &QUOTED_PATTERNS),
    ];

    for (entity_type, patterns) in tables {
        for regex in patterns {
            for caps in regex.captures_iter(normalized_query) {
                let Some(whole) = caps.get(0) else { continue };
                if !seen.insert((entity_type, whole.start())) {
                    continue;
                }
                let value = whole.as_str().to_string();
                let normalized_value = normalize_value(entity_type, &caps, &value);
                entities.push(QueryEntity {
                    entity_type,
                    value,
                    normalized_value,
                    position: whole.start(),
                });
            }
        }
    }

    entities.sort_by_key(|e| e.position);
    entities
}

/// Canonical form per entity type
fn normalize_value(entity_type: EntityType, caps: &regex::Captures<'_>, value: &str) -> String {
    match entity_type {
        EntityType::Article | EntityType::Chapter | EntityType::Section | EntityType::Entity => {
            caps.get(1)
                .map(|g| g.as_str().trim().to_string())
                .unwrap_or_else(|| value.trim().to_string())
        }
        EntityType::Law => {
            if value.contains("constituc") {
                "constitución".to_string()
            } else {
                value.trim().to_string()
            }
        }
        EntityType::Date => value.trim().to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
