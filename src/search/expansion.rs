//! Query expansion
//!
//! Normalizes the raw query, fixes a handful of frequent typos, and widens
//! code-flavored queries with domain synonyms so "csharp", "c#", and
//! Spanish-language phrasing all reach the same items.

/// Frequent misspellings mapped to their intended term
const TYPO_MAP: &[(&str, &str)] = &[
    ("chsarp", "csharp"),
    ("cahrp", "csharp"),
    ("javascritp", "javascript"),
    ("pyhton", "python"),
];

/// Ways people ask for C# content
const CSHARP_TRIGGERS: &[&str] = &["c#", "csharp", "c sharp", "cs"];

/// Synonyms added for C#-flavored queries
const CSHARP_FAMILY: &[&str] = &[
    "c#", "csharp", "c sharp", "cs", "dotnet", ".net", "code", "codigo",
];

/// Ways people ask for code in general, English and Spanish
const CODE_TRIGGERS: &[&str] = &["code", "codigo", "código"];

/// Synonyms added for generic code queries
const CODE_FAMILY: &[&str] = &["code", "codigo", "código", "snippet", "programming"];

/// Tokens that signal the user is looking for code: popular language
/// names plus the code synonyms themselves
const CODE_INTENT: &[&str] = &[
    "code",
    "codigo",
    "código",
    "snippet",
    "programming",
    "c#",
    "csharp",
    "python",
    "javascript",
    "typescript",
    "java",
    "rust",
    "golang",
    "cpp",
    "c++",
    "ruby",
    "php",
    "sql",
    "html",
    "css",
    "bash",
    "kotlin",
    "swift",
];

/// Expand a raw query into search terms.
///
/// The result always contains the trimmed lower-cased input, starts with
/// the normalized (typo-corrected) form, and never repeats a term.
pub fn expand(query: &str) -> Vec<String> {
    let raw = query.trim().to_lowercase();

    let normalized = TYPO_MAP
        .iter()
        .find(|(typo, _)| *typo == raw)
        .map(|(_, fixed)| fixed.to_string())
        .unwrap_or_else(|| raw.clone());

    let mut terms: Vec<String> = Vec::new();
    let mut push = |term: &str, terms: &mut Vec<String>| {
        if !term.is_empty() && !terms.iter().any(|t| t == term) {
            terms.push(term.to_string());
        }
    };

    push(&normalized, &mut terms);
    push(&raw, &mut terms);

    if CSHARP_TRIGGERS.contains(&normalized.as_str()) {
        for term in CSHARP_FAMILY {
            push(term, &mut terms);
        }
    }

    if CODE_TRIGGERS.contains(&normalized.as_str()) {
        for term in CODE_FAMILY {
            push(term, &mut terms);
        }
    }

    if CODE_INTENT.iter().any(|token| normalized.contains(token)) {
        for term in ["code", "codigo", "programming"] {
            push(term, &mut terms);
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expansion_contains_normalized_input() {
        // expand(q) always includes q.trim().lower()
        for query in ["  Hello World  ", "chsarp", "PYTHON", "x"] {
            let terms = expand(query);
            let raw = query.trim().to_lowercase();
            assert!(terms.contains(&raw), "missing {:?} in {:?}", raw, terms);
        }
    }

    #[test]
    fn test_typo_correction_leads() {
        let terms = expand("chsarp");
        assert_eq!(terms[0], "csharp");
        assert!(terms.contains(&"chsarp".to_string()));

        let terms = expand("javascritp");
        assert_eq!(terms[0], "javascript");
    }

    #[test]
    fn test_csharp_family() {
        let terms = expand("c#");
        for expected in ["csharp", "c sharp", "dotnet", ".net", "codigo"] {
            assert!(terms.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_code_family_spanish_and_english() {
        let terms = expand("codigo");
        for expected in ["code", "código", "snippet", "programming"] {
            assert!(terms.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_code_intent_extension() {
        let terms = expand("rust error handling");
        for expected in ["code", "codigo", "programming"] {
            assert!(terms.contains(&expected.to_string()), "missing {}", expected);
        }

        // A query with no code flavor stays narrow
        let terms = expand("grocery list");
        assert_eq!(terms, vec!["grocery list".to_string()]);
    }

    #[test]
    fn test_no_duplicate_terms() {
        for query in ["csharp", "code", "chsarp", "c#"] {
            let terms = expand(query);
            let mut unique = terms.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), terms.len(), "duplicates in {:?}", terms);
        }
    }
}
