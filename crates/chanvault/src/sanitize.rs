//! Helpers for redacting credentials before they reach log output.

/// Keeps the first two characters of a secret and masks the rest.
///
/// - `0123456789abcdef` → `01****`
/// - `ab` → `****`
pub fn redact_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(2).collect();
    if secret.chars().count() <= 4 {
        "****".to_string()
    } else {
        format!("{}****", visible)
    }
}

/// Keeps only the last two digits of a phone number.
///
/// - `+15551234567` → `+*********67`
pub fn redact_phone(phone: &str) -> String {
    let total = phone.chars().count();
    phone
        .chars()
        .enumerate()
        .map(|(i, c)| {
            if c == '+' || i + 2 >= total {
                c
            } else {
                '*'
            }
        })
        .collect()
}
