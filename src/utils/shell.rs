// Helpers for text spliced into generated bash and Slurm scripts

use std::path::Path;

/// Quote a word for bash so it is passed through literally
///
/// Plain words are left alone to keep generated scripts readable.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '.' | '_' | '-' | '+' | ',' | ':' | '='));
    if plain {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', "'\\''"))
}

pub fn shell_quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

/// Slurm job names stay within `[A-Za-z0-9._-]`; anything else becomes `_`
pub fn job_name(prefix: &str, name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' })
        .collect();
    format!("{}-{}", prefix, name)
}
