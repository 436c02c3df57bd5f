//! Bound tool output before it is embedded in an error message.

/// Truncate `output` to roughly `max_chars` characters, keeping the head and
/// the tail (where git prints the actual failure) around a marker.
pub fn truncate_output(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }

    let head_size = max_chars * 40 / 100;
    let tail_size = max_chars - head_size;
    let removed = total - head_size - tail_size;
    let head: String = output.chars().take(head_size).collect();
    let tail: String = output.chars().skip(total - tail_size).collect();
    format!("{head}\n[... {removed} characters omitted ...]\n{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_truncation_when_within_limit() {
        assert_eq!(truncate_output("short", 100), "short");
    }

    #[test]
    fn keeps_head_and_tail() {
        let input: String = (0..100).map(|i| char::from(b'a' + (i % 26))).collect();
        let result = truncate_output(&input, 50);

        assert!(result.contains("[... 50 characters omitted ...]"));
        assert!(result.starts_with(&input[..20]));
        assert!(result.ends_with(&input[70..]));
    }

    #[test]
    fn multibyte_input_does_not_panic() {
        let input = "é".repeat(300);
        let result = truncate_output(&input, 10);
        assert!(result.starts_with("éééé\n"));
    }
}
