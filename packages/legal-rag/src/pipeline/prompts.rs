//! LLM prompts for relevance judgment, answer generation and grounding.
//!
//! Prompts are in Spanish because the knowledge bases and the users are.
//! Documents are always numbered from 1 in the order they are sent; the
//! citation extractor relies on that numbering.

use indexmap::IndexMap;

use super::citations::resolve_title;
use crate::types::config::CompiledTitleRules;
use crate::types::document::RetrievedDocument;

/// System prompt for scoring candidate passages.
pub const RERANK_SYSTEM_PROMPT: &str = r#"Eres un experto en derecho tributario colombiano. Tu tarea es evaluar la relevancia de varios documentos para responder a una consulta específica.

Para cada documento, asigna una puntuación entera de relevancia del 0 al 10, donde:
- 0: Completamente irrelevante
- 5: Parcialmente relevante
- 10: Extremadamente relevante y responde directamente a la consulta

Evalúa cada documento por su número. Responde en JSON:
{
  "evaluations": [
    {"document": 1, "score": 7, "justification": "Breve explicación"}
  ]
}"#;

/// User prompt for scoring candidate passages.
pub const RERANK_USER_PROMPT: &str = r#"Consulta: {question}

Documentos a evaluar:
{documents}

Evalúa la relevancia de cada documento para responder a la consulta."#;

/// System prompt for conversational answers.
pub const CONVERSATIONAL_SYSTEM_PROMPT: &str = r#"Eres un asistente jurídico tributario experto que proporciona respuestas claras y concisas basadas en la documentación oficial.

Ofrece información precisa y bien fundamentada en un formato conversacional y directo.

INSTRUCCIONES:
1. Responde con lenguaje claro y precisión técnica.
2. Después de cada afirmación basada en un documento escribe su número entre corchetes: [1], [2].
3. Si una afirmación se apoya en varios documentos, incluye todas las citas: [1][2].
4. Cita solo documentos que aparecen en la lista. Nunca inventes números de cita.
5. Si una afirmación no proviene de los documentos, no la cites.
6. Señala las controversias y los cambios normativos recientes.
7. No uses secciones formales (REFERENCIA, CONTENIDO, ENTENDIMIENTO).
8. No incluyas una sección de citas al final; se añade automáticamente.

Ejemplo:
"La tarifa general de retención para pagos al exterior es del 20% [1]. Para servicios técnicos la tarifa es del 15% según el artículo 408 del Estatuto Tributario [2]."#;

/// User prompt for conversational answers.
pub const CONVERSATIONAL_USER_PROMPT: &str = r#"Pregunta: {question}

{indices}

DOCUMENTOS PARA CONSULTA:
{documents}

Responde de manera conversacional pero precisa, con citas [n] después de cada afirmación. No incluyas una sección de citas al final."#;

/// System prompt for formal legal opinions.
pub const STRUCTURED_SYSTEM_PROMPT: &str = r#"Eres un asistente jurídico experto en derecho tributario colombiano. Proporcionas respuestas precisas, detalladas y fundamentadas, con especial atención a los cambios normativos y jurisprudenciales.

ESTRUCTURA OBLIGATORIA:

1. REFERENCIA: tema principal y aspectos secundarios.
2. CONTENIDO: índice de las secciones de la respuesta.
3. ENTENDIMIENTO: cómo interpretas la consulta y la normativa principal aplicable.
4. CONCLUSIÓN: opinión jurídica definitiva y directrices de acción.
5. ANÁLISIS:
   5.1. Marco Normativo Vigente
   5.2. Evolución y Cambios Normativos
   5.3. Jurisprudencia Relevante
   5.4. Doctrina y Controversias
   5.5. Consideraciones Prácticas
6. Citas: lista de los documentos citados en el formato "6.n. nombre_del_documento".

INSTRUCCIONES SOBRE CITAS:
1. Usa [n] después de cada afirmación basada en el documento n.
2. Si una afirmación se apoya en varios documentos, incluye todas las citas: [1][2].
3. Cita solo documentos que aparecen en la lista. Nunca inventes números de cita.
4. Si una afirmación no proviene de los documentos, no la cites.

Destaca cuándo el Consejo de Estado ha anulado una interpretación de la DIAN y toma una posición clara cuando existan interpretaciones divergentes."#;

/// User prompt for formal legal opinions.
pub const STRUCTURED_USER_PROMPT: &str = r#"Pregunta: {question}

DOCUMENTOS PARA CONSULTA:
{documents}

Responde siguiendo ESTRICTAMENTE la estructura (1. a 6.), con citas [n] después de cada afirmación y numeración clara (5.1., 5.2., ...)."#;

/// System prompt for the grounding check.
pub const GROUNDING_SYSTEM_PROMPT: &str = r#"Eres un evaluador que determina si una respuesta generada está fundamentada en un conjunto de documentos recuperados.

Responde con "grounded": true si cada afirmación de la respuesta está respaldada por los documentos, y false en caso contrario."#;

/// User prompt for the grounding check.
pub const GROUNDING_USER_PROMPT: &str = r#"Documentos:

{documents}

Respuesta generada:

{generation}"#;

const DOCUMENT_SEPARATOR_WIDTH: usize = 50;

/// Number documents for a generation or grounding prompt.
///
/// Each block is headed `DOCUMENTO [n]: <title>`, using the same title the
/// citation list will show.
pub fn format_documents(documents: &[RetrievedDocument], titles: &CompiledTitleRules) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "DOCUMENTO [{}]: {}\n{}\n{}",
                i + 1,
                resolve_title(doc, i + 1, titles),
                doc.content,
                "-".repeat(DOCUMENT_SEPARATOR_WIDTH)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Number candidate excerpts for a judgment prompt, starting at `first_ordinal`.
pub fn format_rerank_documents(
    documents: &[RetrievedDocument],
    first_ordinal: usize,
    excerpt_chars: usize,
) -> String {
    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("Documento {}:\n{}", first_ordinal + i, doc.excerpt(excerpt_chars)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Sentence describing where the documents came from.
pub fn format_indices_message(counts: &IndexMap<String, usize>) -> String {
    if counts.is_empty() {
        return "No se especificó el origen de los documentos.".to_string();
    }
    let parts = counts
        .iter()
        .map(|(name, count)| format!("{} de {}", count, name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("Se encontraron documentos relevantes en: {}.", parts)
}

/// Fill `{name}` placeholders in one pass over the template.
///
/// Substituted values are never scanned again, so a passage or question that
/// contains `{question}` or `{documents}` is inserted literally.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() + values.iter().map(|(_, v)| v.len()).sum::<usize>());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        match values.iter().find(|(placeholder, _)| tail.starts_with(placeholder)) {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Format the judgment prompt.
pub fn format_rerank_prompt(question: &str, numbered_documents: &str) -> String {
    fill_template(
        RERANK_USER_PROMPT,
        &[("{documents}", numbered_documents), ("{question}", question)],
    )
}

/// Format the conversational answer prompt.
pub fn format_conversational_prompt(question: &str, indices: &str, documents: &str) -> String {
    fill_template(
        CONVERSATIONAL_USER_PROMPT,
        &[("{documents}", documents), ("{indices}", indices), ("{question}", question)],
    )
}

/// Format the structured answer prompt.
pub fn format_structured_prompt(question: &str, documents: &str) -> String {
    fill_template(
        STRUCTURED_USER_PROMPT,
        &[("{documents}", documents), ("{question}", question)],
    )
}

/// Format the grounding prompt.
pub fn format_grounding_prompt(documents: &str, generation: &str) -> String {
    fill_template(
        GROUNDING_USER_PROMPT,
        &[("{documents}", documents), ("{generation}", generation)],
    )
}
