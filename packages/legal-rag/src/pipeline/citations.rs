//! Citation extraction and normalization.
//!
//! Turns a raw model answer into `(citations, cleaned_text)`:
//! 1. Any citations section the model wrote itself is removed.
//! 2. Inline `[n]` markers in what remains are resolved against the numbered
//!    documents sent to generation. Out-of-range and duplicate markers are
//!    skipped.
//! 3. Each citation gets a display title and a short excerpt.
//!
//! Extraction is pure; running it on its own cleaned output yields the same
//! citations and the same text.
//!
//! # Citations-section grammar
//!
//! A section starts at a line that is one of (case-insensitive, the word being
//! `Citas`, `Citations` or `Referencias`):
//! - a numbered heading `N. Citas` (optionally `#`/`**` wrapped, any trailing text)
//! - a markdown heading `## Citas`
//! - a bold or plain line `**Citas**` / `Citas:`
//!
//! A numbered heading directly under another top-level numbered line is a
//! table-of-contents entry, not a heading.
//!
//! The section ends at the end of the text or at the next boundary: a
//! top-level numbered line that is not an entry of the list right under the
//! heading, or a markdown heading (same or higher level for markdown sections).

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::answer::Citation;
use crate::types::config::{CompiledTitleRules, TitleRules};
use crate::types::document::{truncate_chars, RetrievedDocument};

/// Characters of passage text kept in a citation excerpt.
pub const EXCERPT_CHARS: usize = 200;

/// Heading of the rendered citation block.
pub const CITATION_BLOCK_HEADING: &str = "### Citas";

lazy_static! {
    static ref MARKER_REGEX: Regex = Regex::new(r"\[(\d+)\]").unwrap();

    // `6. Citas`, `## 6. Citas`, `**6. Citas**`, with any trailing text
    static ref NUMBERED_HEADING_REGEX: Regex = Regex::new(
        r"(?mi)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?[ \t]*(\d+)\.[ \t]*(?:citas|citations|referencias)\b[^\n]*$"
    ).unwrap();

    // `### Citas`
    static ref MARKDOWN_HEADING_REGEX: Regex = Regex::new(
        r"(?mi)^[ \t]*(#{1,6})[ \t]*(?:\*\*)?(?:citas|citations|referencias)[ \t]*:?[ \t]*(?:\*\*)?[ \t\r]*$"
    ).unwrap();

    // `Citas:` or `**Citas**` alone on a line
    static ref PLAIN_HEADING_REGEX: Regex = Regex::new(
        r"(?mi)^[ \t]*(?:\*\*)?(?:citas|citations|referencias)[ \t]*:?[ \t]*(?:\*\*)?[ \t]*:?[ \t\r]*$"
    ).unwrap();

    // Top-level `M.` heading; `6.1.` does not match
    static ref NUMBERED_BOUNDARY_REGEX: Regex = Regex::new(
        r"(?m)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*)?[ \t]*(\d+)\.(?:[ \t]|\*\*|\r?$)"
    ).unwrap();

    static ref MARKDOWN_BOUNDARY_REGEX: Regex = Regex::new(r"(?m)^[ \t]*(#{1,6})[ \t]").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Numbered,
    Markdown(usize),
    Plain,
}

/// Byte range of the first citations section, if any.
fn find_section(text: &str) -> Option<(usize, usize)> {
    let numbered = NUMBERED_HEADING_REGEX
        .find_iter(text)
        .map(|m| (m.start(), m.end(), SectionKind::Numbered))
        .find(|(start, _, _)| !follows_numbered_line(text, *start));
    let markdown = MARKDOWN_HEADING_REGEX.captures(text).and_then(|c| {
        let m = c.get(0)?;
        Some((m.start(), m.end(), SectionKind::Markdown(c.get(1)?.len())))
    });
    let plain = PLAIN_HEADING_REGEX
        .find(text)
        .map(|m| (m.start(), m.end(), SectionKind::Plain));

    let (start, heading_end, kind) = [numbered, markdown, plain]
        .into_iter()
        .flatten()
        .min_by_key(|(start, _, _)| *start)?;

    let end = section_end(&text[heading_end..], kind).map(|e| heading_end + e);
    Some((start, end.unwrap_or(text.len())))
}

/// Whether the line starting at `start` sits right under a top-level
/// numbered line, as entries of a table of contents do.
fn follows_numbered_line(text: &str, start: usize) -> bool {
    let Some(before) = text[..start].strip_suffix('\n') else {
        return false;
    };
    let previous = before.rsplit('\n').next().unwrap_or_default();
    NUMBERED_BOUNDARY_REGEX.is_match(previous.trim_end_matches('\r'))
}

/// Offset in `rest` (the text after the heading) where the section stops.
///
/// Numbered lines in the list right under the heading are entries, and so
/// is a numbered line continuing that list after a blank line. Any other
/// top-level numbered line ends the section, as does a markdown heading
/// (for markdown sections, one of the same or a higher level).
fn section_end(rest: &str, kind: SectionKind) -> Option<usize> {
    let mut offset = 0;
    let mut in_list = true;
    let mut seen_entry = false;
    let mut last_number: Option<u64> = None;

    for raw_line in rest.split_inclusive('\n') {
        let line_start = offset;
        offset += raw_line.len();
        let line = raw_line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            if seen_entry {
                in_list = false;
            }
            continue;
        }
        seen_entry = true;

        if let Some(level) = MARKDOWN_BOUNDARY_REGEX
            .captures(line)
            .and_then(|c| c.get(1))
            .map(|m| m.len())
        {
            match kind {
                SectionKind::Markdown(own) if level > own => continue,
                _ => return Some(line_start),
            }
        }

        let Some(number) = NUMBERED_BOUNDARY_REGEX
            .captures(line)
            .and_then(|c| c.get(1)?.as_str().parse::<u64>().ok())
        else {
            continue;
        };

        let continues_list = last_number.is_some_and(|last| number == last + 1);
        if in_list || continues_list {
            in_list = true;
            last_number = Some(number);
        } else {
            return Some(line_start);
        }
    }
    None
}

/// Remove every model-written citations section.
///
/// Text without one is returned unchanged.
pub fn strip_citations_section(text: &str) -> String {
    let mut current = text.to_string();
    while let Some((start, end)) = find_section(&current) {
        let before = current[..start].trim_end();
        let after = current[end..].trim_start_matches(['\r', '\n']);

        let mut joined = before.to_string();
        if !after.trim().is_empty() {
            if !joined.is_empty() {
                joined.push_str("\n\n");
            }
            joined.push_str(after.trim_end());
        }
        current = joined;
    }
    current
}

/// Distinct valid marker numbers in order of first appearance.
pub fn marker_numbers(text: &str, document_count: usize) -> Vec<usize> {
    let mut seen = Vec::new();
    for caps in MARKER_REGEX.captures_iter(text) {
        let Some(n) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) else {
            continue;
        };
        if (1..=document_count).contains(&n) && !seen.contains(&n) {
            seen.push(n);
        }
    }
    seen
}

/// Display title for the n-th (1-based) document.
///
/// Metadata title first, then the cleaned source path, then `Document n`.
pub fn resolve_title(doc: &RetrievedDocument, n: usize, titles: &CompiledTitleRules) -> String {
    if let Some(title) = doc.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    let cleaned = titles.clean(&doc.source);
    if cleaned.is_empty() {
        format!("Document {}", n)
    } else {
        cleaned
    }
}

/// Resolve markers in `raw_answer` against `documents`.
pub fn extract(
    raw_answer: &str,
    documents: &[RetrievedDocument],
    titles: &CompiledTitleRules,
) -> (Vec<Citation>, String) {
    let cleaned = strip_citations_section(raw_answer);

    let by_index: BTreeMap<usize, &RetrievedDocument> = marker_numbers(&cleaned, documents.len())
        .into_iter()
        .map(|n| (n, &documents[n - 1]))
        .collect();

    let citations = by_index
        .into_iter()
        .map(|(n, doc)| {
            Citation::new(
                n,
                resolve_title(doc, n, titles),
                truncate_chars(&doc.content, EXCERPT_CHARS),
                doc.clone(),
            )
        })
        .collect();

    (citations, cleaned)
}

/// Canonical citation block: a heading and one `n. title (Pág. p) [index]` line per citation.
///
/// Empty when there are no citations.
pub fn render_citation_block(citations: &[Citation]) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let lines = citations
        .iter()
        .map(|c| format!("{}. {}", c.index(), c.display_label()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{}\n\n{}", CITATION_BLOCK_HEADING, lines)
}

/// [`extract`] bound to a set of title rules.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    titles: CompiledTitleRules,
}

impl CitationExtractor {
    /// Compile `rules` and build an extractor.
    pub fn new(rules: &TitleRules) -> Result<Self> {
        Ok(Self {
            titles: rules.compile()?,
        })
    }

    /// The compiled title rules.
    pub fn titles(&self) -> &CompiledTitleRules {
        &self.titles
    }

    /// See [`extract`].
    pub fn extract(&self, raw_answer: &str, documents: &[RetrievedDocument]) -> (Vec<Citation>, String) {
        extract(raw_answer, documents, &self.titles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> CitationExtractor {
        CitationExtractor::new(&TitleRules::default()).unwrap()
    }

    fn docs(n: usize) -> Vec<RetrievedDocument> {
        (1..=n)
            .map(|i| RetrievedDocument::new(format!("contenido {}", i), format!("data/iva/doc_{}.pdf", i)))
            .collect()
    }

    fn indices(citations: &[Citation]) -> Vec<usize> {
        citations.iter().map(Citation::index).collect()
    }

    #[test]
    fn test_duplicates_collapse_in_ascending_order() {
        let (citations, _) = extractor().extract("A [5]. B [2]. C [2]. D [2].", &docs(5));
        assert_eq!(indices(&citations), vec![2, 5]);
    }

    #[test]
    fn test_out_of_range_markers_are_ignored() {
        let text = "Cero [0], nueve [9], enorme [99999999999999999999999], válido [1][2].";
        let (citations, cleaned) = extractor().extract(text, &docs(3));

        assert_eq!(indices(&citations), vec![1, 2]);
        assert_eq!(cleaned, text);
    }

    #[test]
    fn test_no_documents_no_citations() {
        let (citations, _) = extractor().extract("Según [1].", &[]);
        assert!(citations.is_empty());
    }

    #[test]
    fn test_citation_fields() {
        let mut documents = docs(2);
        documents[1] = RetrievedDocument::new("x".repeat(300), "pinecone_iva/data/iva/concepto_1163.pdf")
            .with_page(4)
            .with_source_index("IVA");

        let (citations, _) = extractor().extract("Tarifa [2].", &documents);
        let c = &citations[0];

        assert_eq!(c.index(), 2);
        assert_eq!(c.document_title(), "concepto_1163");
        assert_eq!(c.excerpt(), format!("{}...", "x".repeat(200)));
        assert_eq!(c.source_document(), &documents[1]);
        assert_eq!(c.display_label(), "concepto_1163 (Pág. 4) [IVA]");
    }

    #[test]
    fn test_title_precedence() {
        let rules = TitleRules::default().compile().unwrap();

        let titled = RetrievedDocument::new("", "data/iva/x.pdf").with_title("Ley 2277 de 2022");
        assert_eq!(resolve_title(&titled, 1, &rules), "Ley 2277 de 2022");

        let path = RetrievedDocument::new("", "Pinecone: pinecone_docs/oficio.html");
        assert_eq!(resolve_title(&path, 1, &rules), "oficio");

        let blank = RetrievedDocument::new("", "").with_title("  ");
        assert_eq!(resolve_title(&blank, 3, &rules), "Document 3");
    }

    #[test]
    fn test_strips_numbered_section_to_end() {
        let raw = "5. ANÁLISIS\nLa tarifa es 19% [1].\n\n6. Citas\n6.1. concepto_1163 [3]\n6.2. oficio";
        let (citations, cleaned) = extractor().extract(raw, &docs(3));

        assert_eq!(cleaned, "5. ANÁLISIS\nLa tarifa es 19% [1].");
        assert_eq!(indices(&citations), vec![1]);
    }

    #[test]
    fn test_numbered_section_ends_at_next_top_level_heading() {
        let raw = "6. Citas:\n6.1. a\n6.2. b\n\n7. Anexos\nTexto [2].";
        assert_eq!(strip_citations_section(raw), "7. Anexos\nTexto [2].");
    }

    #[test]
    fn test_table_of_contents_entry_is_not_a_section() {
        let raw = "1. REFERENCIA\nIVA.\n\n2. CONTENIDO\n1. Referencia\n2. Contenido\n3. Entendimiento\n\
                   4. Conclusión\n5. Análisis\n6. Citas\n\n3. ENTENDIMIENTO\nLa tarifa es 19% [1].\n\n\
                   4. CONCLUSIÓN\nAplica [2].\n\n6. Citas\n6.1. d1";
        let (citations, cleaned) = extractor().extract(raw, &docs(3));

        assert_eq!(indices(&citations), vec![1, 2]);
        assert!(cleaned.starts_with("1. REFERENCIA\nIVA.\n\n2. CONTENIDO\n1. Referencia"));
        assert!(cleaned.contains("5. Análisis\n6. Citas\n\n3. ENTENDIMIENTO"));
        assert!(cleaned.ends_with("4. CONCLUSIÓN\nAplica [2]."));
        assert_eq!(strip_citations_section(&cleaned), cleaned);
    }

    #[test]
    fn test_lower_numbered_heading_ends_section() {
        let raw = "6. Citas\n6.1. d1\n\n3. ENTENDIMIENTO\nTexto [2].";
        assert_eq!(strip_citations_section(raw), "3. ENTENDIMIENTO\nTexto [2].");
    }

    #[test]
    fn test_plain_section_ends_at_numbered_heading() {
        let raw = "Respuesta [1].\n\nReferencias:\n- d1\n\n7. CONCLUSIÓN\nFinal [2].";
        let (citations, cleaned) = extractor().extract(raw, &docs(3));

        assert_eq!(cleaned, "Respuesta [1].\n\n7. CONCLUSIÓN\nFinal [2].");
        assert_eq!(indices(&citations), vec![1, 2]);
    }

    #[test]
    fn test_markdown_section_ends_at_numbered_heading() {
        let raw = "Respuesta [1].\n\n### Citas\n- d1\n\n5. ANÁLISIS\nDetalle [3].";
        assert_eq!(strip_citations_section(raw), "Respuesta [1].\n\n5. ANÁLISIS\nDetalle [3].");
    }

    #[test]
    fn test_numbered_entries_under_heading_stay_in_section() {
        let raw = "Respuesta [1].\n\n6. Citas\n\n1. a\n2. b\n7. c\n8. d";
        assert_eq!(strip_citations_section(raw), "Respuesta [1].");

        let raw = "Respuesta [1].\n\nCitas:\n\n1. a [2]\n\n2. b [3]";
        assert_eq!(strip_citations_section(raw), "Respuesta [1].");
    }

    #[test]
    fn test_numbered_section_variants() {
        for heading in ["6.Citas", "6. citas:", "## 6. Citas", "**6. Citas**"] {
            let raw = format!("Respuesta [1].\n\n{}\n6.1. doc", heading);
            assert_eq!(strip_citations_section(&raw), "Respuesta [1].", "heading {heading}");
        }
    }

    #[test]
    fn test_markdown_and_plain_sections() {
        let raw = "Texto.\n\n### Citas\n1. a\n2. b\n## Nota\nFin.";
        assert_eq!(strip_citations_section(raw), "Texto.\n\n## Nota\nFin.");

        let raw = "Texto.\n\nCitas:\n- a\n- b";
        assert_eq!(strip_citations_section(raw), "Texto.");

        let raw = "Texto.\n\n**Referencias**\n- a";
        assert_eq!(strip_citations_section(raw), "Texto.");
    }

    #[test]
    fn test_prose_mentioning_citas_is_kept() {
        let raw = "Citas textuales del artículo 468 confirman la tarifa [1].\n6.1. no es encabezado";
        assert_eq!(strip_citations_section(raw), raw);
    }

    #[test]
    fn test_markers_inside_stripped_section_do_not_count() {
        let (citations, _) = extractor().extract("Respuesta [1].\n\n6. Citas\n[2] documento", &docs(3));
        assert_eq!(indices(&citations), vec![1]);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let raw = "1. REFERENCIA\nIVA [2][1].\n\n6. Citas\n6.1. x [3]\n\n### Citas\n1. y";
        let (first, cleaned) = extractor().extract(raw, &docs(3));
        let (second, cleaned_again) = extractor().extract(&cleaned, &docs(3));

        assert_eq!(first, second);
        assert_eq!(cleaned, cleaned_again);
        assert_eq!(cleaned, "1. REFERENCIA\nIVA [2][1].");
    }

    #[test]
    fn test_render_citation_block() {
        let documents = vec![RetrievedDocument::new("t", "data/renta/oficio_9.pdf").with_source_index("Renta")];
        let (citations, _) = extractor().extract("Dato [1].", &documents);

        assert_eq!(render_citation_block(&citations), "### Citas\n\n1. oficio_9 [Renta]");
        assert_eq!(render_citation_block(&[]), "");
    }

    #[test]
    fn test_rendered_block_is_stripped_again() {
        let documents = docs(1);
        let (citations, cleaned) = extractor().extract("Dato [1].", &documents);
        let displayed = format!("{}\n\n{}", cleaned, render_citation_block(&citations));

        assert_eq!(strip_citations_section(&displayed), cleaned);
    }
}
