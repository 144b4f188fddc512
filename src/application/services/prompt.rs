use crate::domain::{ConversationMemory, SearchResult};

/// Substitutes `{name}` placeholders in a single left-to-right pass, so
/// placeholder-like text inside substituted values is left untouched.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Numbered context blocks with their citations, or `fallback` when empty.
pub fn format_context(sources: &[SearchResult], fallback: &str) -> String {
    if sources.is_empty() {
        return fallback.to_string();
    }

    sources
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "[{}] ({})\n{}",
                i + 1,
                r.chunk.metadata.citation(),
                r.chunk.content.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn format_history(memory: &ConversationMemory, fallback: &str) -> String {
    if memory.is_empty() {
        fallback.to_string()
    } else {
        memory.transcript()
    }
}
