use chrono::NaiveDate;
use rand::distributions::Alphanumeric;
use rand::Rng;

const DOCUMENT_SUFFIX_LEN: usize = 6;

/// Human-facing document number such as `B-20240131-7QX2K9`.
///
/// Numbers are random, not sequential; inserts must tolerate a collision and retry.
pub fn generate_document_number(prefix: &str, date: NaiveDate) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DOCUMENT_SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();

    format!("{}-{}-{}", prefix, date.format("%Y%m%d"), suffix)
}

/// Escape `%` and `_` so user input can be embedded in an ILIKE pattern.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_number_has_prefix_date_and_suffix() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let number = generate_document_number("B", date);
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "B");
        assert_eq!(parts[1], "20240131");
        assert_eq!(parts[2].len(), DOCUMENT_SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" 50%_off "), "%50\\%\\_off%");
        assert_eq!(like_pattern("ann"), "%ann%");
    }
}
