use docqa_core::types::RetrievalMatch;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Join match texts in the given (ranked) order until the next one would push
/// the context past `max_chars`. Matches are never split; everything from the
/// first one that does not fit is dropped.
pub fn assemble_context(matches: &[RetrievalMatch], max_chars: usize) -> String {
    let sep_len = CONTEXT_SEPARATOR.chars().count();
    let mut out = String::new();
    let mut used = 0usize;
    for (i, m) in matches.iter().enumerate() {
        let extra = m.text.chars().count() + if i == 0 { 0 } else { sep_len };
        if used + extra > max_chars {
            break;
        }
        if i > 0 {
            out.push_str(CONTEXT_SEPARATOR);
        }
        out.push_str(&m.text);
        used += extra;
    }
    out
}
