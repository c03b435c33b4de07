//! Text helpers for prompts and log lines

/// Shorten text for a log line without slicing inside a UTF-8 character.
///
/// Keeps at most `max_chars` characters and appends `...` when anything was
/// dropped. Newlines are flattened so one log record stays on one line.
pub fn preview(s: &str, max_chars: usize) -> String {
    let flat = s.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let truncated: String = flat.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Render lines as a `- ` bulleted list, or `empty` when there is nothing.
pub fn bulleted<I, S>(lines: I, empty: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let rendered: Vec<String> = lines
        .into_iter()
        .map(|line| format!("- {}", line.as_ref().trim()))
        .collect();

    if rendered.is_empty() {
        empty.to_string()
    } else {
        rendered.join("\n")
    }
}
