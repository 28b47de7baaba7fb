use dxrag_core::types::SelectedProtocol;

pub const PROTOCOL_SEPARATOR: &str = "\n\n---\n\n";

/// Render the selected protocols as the generator's context block.
///
/// Codes are listed exactly as stored; content is cut at `content_chars`
/// characters.
pub fn assemble_context(selected: &[SelectedProtocol], content_chars: usize) -> String {
    selected
        .iter()
        .map(|protocol| {
            format!(
                "PROTOCOL: {}\nSECTION: {}\nICD-10 CODES: {}\nCONTENT: {}",
                protocol.title(),
                protocol.section_type().as_str(),
                protocol.codes().join(", "),
                truncate_chars(protocol.content(), content_chars)
            )
        })
        .collect::<Vec<_>>()
        .join(PROTOCOL_SEPARATOR)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
