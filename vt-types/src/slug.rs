use lazy_regex::regex;

/// Canonical slug form of a free-text catalog label.
///
/// This is the single normalization used both when generating URLs and when
/// matching incoming URL segments back to catalog records. Two labels are
/// "the same slug" iff their normalized forms are character-equal.
pub fn normalize(input: &str) -> String {
    let lowered = input
        .trim()
        .to_lowercase()
        .replace(['→', '–', '/'], "-")
        .replace('.', "");
    let stripped = regex!(r"[^\w\s-]").replace_all(&lowered, "");
    let hyphenated = regex!(r"\s+").replace_all(&stripped, "-");
    regex!(r"-+").replace_all(&hyphenated, "-").into_owned()
}
