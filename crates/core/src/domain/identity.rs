//! Normalization for caller-supplied identity numbers and one-time
//! verification codes.

/// Strips everything but digits from a DNI/CUIT and collapses the
/// doubled-string artifact produced by an upstream duplication bug
/// (`"59820155982015"` arrives for a caller who typed `5982015`).
///
/// The collapse fires only when the cleaned digit string has even
/// length and its first half equals its second half, which makes the
/// function idempotent: a collapsed value never collapses again unless
/// it is itself a doubled string, in which case collapsing once more is
/// the correct reading of the input.
pub fn normalize_identity_number(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(char::is_ascii_digit).collect();

    if cleaned.len() % 2 == 0 && !cleaned.is_empty() {
        let (first_half, second_half) = cleaned.split_at(cleaned.len() / 2);
        if first_half == second_half {
            return first_half.to_string();
        }
    }

    cleaned
}

/// Reduces a caller-supplied verification code to digits and accepts it
/// only when exactly 6 remain. Anything else is rejected before any
/// backend call is made.
pub fn normalize_verification_code(raw: &str) -> Option<String> {
    let cleaned: String = raw.chars().filter(char::is_ascii_digit).collect();
    (cleaned.len() == 6).then_some(cleaned)
}
