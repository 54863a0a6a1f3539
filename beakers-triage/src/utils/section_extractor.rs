//! Heuristic section extraction from paper full text
//!
//! Pulls out the methods section and figure/table captions, the two parts the
//! evidence upgrade prompt re-scores from. Extraction is line-oriented:
//! headings are whole lines, optionally numbered ("2.", "2.1", "II."), and a
//! substring search is the fallback when the text has lost its line breaks.

use regex::Regex;
use std::sync::OnceLock;

pub const MAX_METHODS_CHARS: usize = 5000;
pub const MAX_CAPTIONS: usize = 10;
pub const METHODS_PLACEHOLDER: &str = "Methods section not clearly identified.";
pub const CAPTIONS_PLACEHOLDER: &str = "Figure captions not clearly identified.";

/// Sections handed to the evidence prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSections {
    pub methods: String,
    pub captions: String,
    pub methods_found: bool,
    pub caption_count: usize,
}

fn methods_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^[ \t]*(?:\d+(?:\.\d+)*\.?|[IVX]+\.)?[ \t]*(?:materials[ \t]+and[ \t]+methods|methods|methodology|experimental(?:[ \t]+(?:section|procedures))?)[ \t]*:?[ \t]*$",
        )
        .expect("methods heading pattern is valid")
    })
}

fn methods_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)materials and methods|methodology|methods|experimental")
            .expect("methods keyword pattern is valid")
    })
}

fn end_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?im)^[ \t]*(?:\d+(?:\.\d+)*\.?|[IVX]+\.)?[ \t]*(?:results(?:[ \t]+and[ \t]+discussion)?|discussion|conclusions?)[ \t]*:?[ \t]*$",
        )
        .expect("end heading pattern is valid")
    })
}

fn caption_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*((?:fig\.?|figure|table)[ \t]*\d+[a-z]?[.:|][ \t]*\S[^\n]*)")
            .expect("caption pattern is valid")
    })
}

fn take_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Locate the methods section
pub fn extract_methods(text: &str) -> Option<String> {
    let (start, body_start) = match methods_heading().find(text) {
        Some(m) => (m.start(), m.end()),
        None => {
            let m = methods_keyword().find(text)?;
            (m.start(), m.start())
        }
    };

    let end = end_heading()
        .find_at(text, body_start)
        .map(|m| m.start())
        .unwrap_or(text.len());

    let section = text[start..end].trim();
    if section.is_empty() {
        return None;
    }
    Some(take_chars(section, MAX_METHODS_CHARS))
}

/// Collect up to [`MAX_CAPTIONS`] caption lines
pub fn extract_captions(text: &str) -> Vec<String> {
    caption_line()
        .captures_iter(text)
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim().to_string()))
        .take(MAX_CAPTIONS)
        .collect()
}

/// Extract both sections, substituting placeholders for missing ones
pub fn extract_sections(text: &str) -> ExtractedSections {
    let methods = extract_methods(text);
    let captions = extract_captions(text);

    ExtractedSections {
        methods_found: methods.is_some(),
        methods: methods.unwrap_or_else(|| METHODS_PLACEHOLDER.to_string()),
        caption_count: captions.len(),
        captions: if captions.is_empty() {
            CAPTIONS_PLACEHOLDER.to_string()
        } else {
            captions.join("\n\n")
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAPER: &str = "\
Abstract
We report a nickel catalyst.

1. Introduction
Water splitting matters, as shown in Fig. 1.

2. Materials and Methods
Catalysts were prepared by co-precipitation.
Each measurement was repeated five times with error bars reported.

3. Results
Activity was stable for 100 h.

Figure 1: Current density versus time for three catalysts.
Fig. 2. Tafel slopes with 95% confidence intervals.
Table 1: Comparison with baseline platinum catalyst.
";

    #[test]
    fn test_methods_bounded_by_results() {
        let methods = extract_methods(PAPER).unwrap();
        assert!(methods.starts_with("2. Materials and Methods"));
        assert!(methods.contains("repeated five times"));
        assert!(!methods.contains("Activity was stable"));
    }

    #[test]
    fn test_captions_skip_inline_references() {
        let captions = extract_captions(PAPER);
        assert_eq!(captions.len(), 3);
        assert!(captions[0].starts_with("Figure 1:"));
        assert!(captions[2].starts_with("Table 1:"));
    }

    #[test]
    fn test_methods_capped() {
        let text = format!("Methods\n{}\nResults\n", "x".repeat(8000));
        assert_eq!(extract_methods(&text).unwrap().chars().count(), MAX_METHODS_CHARS);
    }

    #[test]
    fn test_captions_capped() {
        let text: String = (1..=15).map(|i| format!("Figure {}: panel {}\n", i, i)).collect();
        assert_eq!(extract_captions(&text).len(), MAX_CAPTIONS);
    }

    #[test]
    fn test_flattened_text_falls_back_to_keyword() {
        let text = "intro text. methods we sampled twelve sites. results were clear.";
        let methods = extract_methods(text).unwrap();
        assert!(methods.starts_with("methods we sampled"));
    }

    #[test]
    fn test_keyword_fallback_with_case_changing_text() {
        let text = format!("{}methodsé{}", "İ".repeat(8), "ẞ".repeat(8));
        let methods = extract_methods(&text).unwrap();
        assert!(methods.starts_with("methodsé"));

        let text = "ÉTUDE İSTANBUL. METHODOLOGY: samples were drawn weekly.";
        let methods = extract_methods(text).unwrap();
        assert!(methods.starts_with("METHODOLOGY: samples"));
    }

    #[test]
    fn test_placeholders_when_missing() {
        let sections = extract_sections("Just an abstract with nothing else.");
        assert_eq!(sections.methods, METHODS_PLACEHOLDER);
        assert_eq!(sections.captions, CAPTIONS_PLACEHOLDER);
        assert!(!sections.methods_found);
        assert_eq!(sections.caption_count, 0);
    }
}
