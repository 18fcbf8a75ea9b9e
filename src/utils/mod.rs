const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Formats a byte count as mebibytes with two decimals, e.g. `52.43`.
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / BYTES_PER_MB)
}

/// Turns a media title into something safe to use as an attachment name.
pub fn attachment_name(title: &str, extension: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = stem.trim().trim_matches('.').trim();
    let stem: String = stem.chars().take(100).collect();

    if stem.is_empty() {
        format!("media.{extension}")
    } else {
        format!("{}.{extension}", stem.trim_end())
    }
}
