// Markers stripped from generated SQL, longest fence variants first
const MARKERS: [&str; 6] = ["```sql", "```json", "\"\"\"", "'''", "```", ";"];

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn strip_markers(text: &str) -> String {
    let mut out = text.replace("\\n", " ");
    for marker in MARKERS {
        out = out.replace(marker, "");
    }
    out
}

/// Turns raw model output into a single-line SQL string with no code fences,
/// quote markers or semicolons. Idempotent; does not validate the SQL.
pub fn clean_generation_result(raw: &str) -> String {
    let mut text = normalize_whitespace(raw);

    // Removing one marker can join the halves of another
    loop {
        let stripped = strip_markers(&text);
        if stripped == text {
            break;
        }
        text = stripped;
    }

    normalize_whitespace(&text)
}
