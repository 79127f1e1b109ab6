//! # Cache Key Resolution
//!
//! Deterministic lookup keys for the AI-summary cache.
//!
//! A summary is identified by a food-log id when one is available, falling
//! back to the image URL otherwise. The food-log id branch deliberately
//! ignores the image URL: signed URLs rotate, food-log ids do not, so the
//! same meal must resolve to the same key across URL refreshes.

use xxhash_rust::xxh3::xxh3_128;

/// Normalize patient notes: empty or whitespace-only notes count as absent.
pub fn normalize_notes(patient_notes: Option<&str>) -> Option<&str> {
    patient_notes.filter(|notes| !notes.trim().is_empty())
}

/// Resolve the storage key for a cached AI summary.
///
/// Precedence: `food_log_id` wins when present (with notes appended when
/// given); otherwise the key is derived from `image_url` (empty string if
/// absent). The key material is digested to a fixed-width 128-bit hex
/// string. Collisions are accepted as negligible for this use case.
pub fn resolve_summary_key(
    food_log_id: Option<&str>,
    image_url: Option<&str>,
    patient_notes: Option<&str>,
) -> String {
    let patient_notes = normalize_notes(patient_notes);

    let key_material = match food_log_id {
        Some(id) => match patient_notes {
            Some(notes) => format!("food_log_id:{id}|notes:{notes}"),
            None => format!("food_log_id:{id}"),
        },
        None => {
            let url = image_url.unwrap_or("");
            match patient_notes {
                Some(notes) => format!("{url}|{notes}"),
                None => url.to_string(),
            }
        }
    };

    digest(&key_material)
}

/// Standalone digest of the patient notes alone, used for the secondary
/// index and for debugging which notes a summary was generated against.
pub fn notes_hash(patient_notes: Option<&str>) -> Option<String> {
    normalize_notes(patient_notes).map(digest)
}

fn digest(data: &str) -> String {
    format!("{:032x}", xxh3_128(data.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_url_when_food_log_id_present() {
        let with_url = resolve_summary_key(Some("F1"), Some("https://x/a.jpg"), None);
        let other_url = resolve_summary_key(Some("F1"), Some("https://y/b.jpg"), None);
        let no_url = resolve_summary_key(Some("F1"), None, None);

        assert_eq!(with_url, other_url);
        assert_eq!(with_url, no_url);
    }

    #[test]
    fn key_falls_back_to_url_without_food_log_id() {
        let a = resolve_summary_key(None, Some("https://x/a.jpg"), None);
        let b = resolve_summary_key(None, Some("https://x/b.jpg"), None);

        assert_ne!(a, b);
    }

    #[test]
    fn notes_change_the_key() {
        let without = resolve_summary_key(Some("F1"), None, None);
        let with = resolve_summary_key(Some("F1"), None, Some("no dairy"));

        assert_ne!(without, with);
    }

    #[test]
    fn blank_notes_are_treated_as_absent() {
        let none = resolve_summary_key(Some("F1"), Some("https://x/a.jpg"), None);
        let empty = resolve_summary_key(Some("F1"), Some("https://x/a.jpg"), Some(""));
        let spaces = resolve_summary_key(Some("F1"), Some("https://x/a.jpg"), Some("   "));

        assert_eq!(none, empty);
        assert_eq!(none, spaces);
    }

    #[test]
    fn key_is_fixed_width_hex() {
        let key = resolve_summary_key(None, None, None);

        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn notes_hash_is_independent_of_identity() {
        let hash = notes_hash(Some("no dairy")).unwrap();

        assert_eq!(hash, notes_hash(Some("no dairy")).unwrap());
        assert_eq!(hash.len(), 32);
        assert!(notes_hash(Some("  ")).is_none());
        assert!(notes_hash(None).is_none());
    }
}
