//! Structural checks shared by all stage validators.
//!
//! Two invariants hold for every committed collection: names are unique
//! within their kind, and every reference field names an entity that
//! exists in the expected prior stage's namespace. Stage validators
//! compose these helpers and add their own domain checks. Reasons are
//! human-readable, one per violation, in detection order — they go back
//! to the model verbatim as a corrective turn.

/// Check that every name in `names` is unique within its kind.
pub fn check_unique_names<'a>(
    names: impl IntoIterator<Item = &'a str>,
    kind: &str,
    reasons: &mut Vec<String>,
) {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if seen.contains(&name) {
            reasons.push(format!("{kind} name '{name}' is not unique"));
        }
        seen.push(name);
    }
}

/// Check that `reference` names an entity in `namespace`.
pub fn check_reference(
    reference: &str,
    namespace: &[&str],
    ref_kind: &str,
    reasons: &mut Vec<String>,
) {
    if !namespace.contains(&reference) {
        reasons.push(format!("{ref_kind} instance '{reference}' does not exist"));
    }
}

/// Fold a non-empty reason list into one corrective turn, in the wording
/// the extraction model is prompted to expect.
pub fn corrective_turn(reasons: &[String]) -> String {
    let mut text = String::from("Your previous response was invalid for the following reason(s):");
    for reason in reasons {
        text.push_str("\n-");
        text.push_str(reason);
    }
    text
}
