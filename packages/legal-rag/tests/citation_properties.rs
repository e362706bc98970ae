//! Property tests for citation extraction.

use legal_rag::pipeline::citations::extract;
use legal_rag::{RetrievedDocument, TitleRules};
use proptest::prelude::*;

fn documents(n: usize) -> Vec<RetrievedDocument> {
    (1..=n)
        .map(|i| RetrievedDocument::new(format!("Pasaje número {}", i), format!("data/iva/doc_{}.pdf", i)))
        .collect()
}

/// Answer-like text: prose fragments interleaved with `[n]` markers,
/// sometimes followed by a model-written citations section.
fn answer_text() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-zA-Záéíóú ,.]{0,20}",
        (0usize..15).prop_map(|n| format!("[{}]", n)),
        Just("\n".to_string()),
    ];
    let section = prop_oneof![
        Just(String::new()),
        Just("\n\n### Citas\n1. doc_1 [1]".to_string()),
        Just("\n\n5. Citas\n[2] doc_2".to_string()),
        Just("\n\n**Referencias**\n- [4]".to_string()),
    ];
    (prop::collection::vec(piece, 0..20), section).prop_map(|(pieces, section)| pieces.concat() + &section)
}

proptest! {
    #[test]
    fn citations_point_inside_the_document_list(text in answer_text(), n in 0usize..10) {
        let titles = TitleRules::default().compile().unwrap();
        let docs = documents(n);

        let (citations, _) = extract(&text, &docs, &titles);

        for c in &citations {
            prop_assert!(c.index() >= 1 && c.index() <= n);
            prop_assert_eq!(c.source_document(), &docs[c.index() - 1]);
        }
    }

    #[test]
    fn citations_are_ascending_and_distinct(text in answer_text(), n in 0usize..10) {
        let titles = TitleRules::default().compile().unwrap();

        let (citations, _) = extract(&text, &documents(n), &titles);

        let indexes: Vec<usize> = citations.iter().map(|c| c.index()).collect();
        prop_assert!(indexes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn extraction_is_idempotent(text in answer_text(), n in 0usize..10) {
        let titles = TitleRules::default().compile().unwrap();
        let docs = documents(n);

        let (first, cleaned) = extract(&text, &docs, &titles);
        let (second, cleaned_again) = extract(&cleaned, &docs, &titles);

        prop_assert_eq!(first, second);
        prop_assert_eq!(cleaned, cleaned_again);
    }
}
