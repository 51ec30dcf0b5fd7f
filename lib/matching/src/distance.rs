//! String similarity functions used by the pair scorer
//!
//! All functions return a similarity score in range [0.0, 1.0] where 1.0
//! means identical, and all of them are symmetric in their arguments.

use ahash::AHashSet;

/// Jaccard index of two token lists, treated as sets.
///
/// Two empty lists are identical.
pub fn jaccard_tokens<S: AsRef<str>>(a: &[S], b: &[S]) -> f32 {
    let set_a: AHashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: AHashSet<&str> = b.iter().map(AsRef::as_ref).collect();

    if set_a.is_empty() && set_b.is_empty() {
        return 1.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Normalized Levenshtein similarity over characters.
#[inline]
pub fn edit_ratio(a: &str, b: &str) -> f32 {
    strsim::normalized_levenshtein(a, b) as f32
}

/// Character trigram similarity for fuzzy street names.
pub fn trigram_similarity(a: &str, b: &str) -> f32 {
    let trigrams_a = generate_trigrams(&a.to_lowercase());
    let trigrams_b = generate_trigrams(&b.to_lowercase());

    if trigrams_a.is_empty() && trigrams_b.is_empty() {
        return 1.0;
    }

    if trigrams_a.is_empty() || trigrams_b.is_empty() {
        return 0.0;
    }

    let intersection = trigrams_a.intersection(&trigrams_b).count();
    let union = trigrams_a.len() + trigrams_b.len() - intersection;

    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Generate character trigrams from a string, padded so that short
/// strings still produce a few grams.
pub fn generate_trigrams(s: &str) -> AHashSet<String> {
    let padded = format!("  {}  ", s);
    let chars: Vec<char> = padded.chars().collect();

    if chars.len() < 3 {
        return AHashSet::new();
    }

    chars.windows(3).map(|w| w.iter().collect::<String>()).collect()
}

/// Blend of token-set overlap and edit distance.
///
/// Token overlap forgives reordering ("pizza joe's" vs "joe's pizza") while
/// the edit ratio catches typos inside a token. `jaccard_weight` is the
/// share given to the token overlap.
pub fn name_similarity(
    a_name: &str,
    a_tokens: &[String],
    b_name: &str,
    b_tokens: &[String],
    jaccard_weight: f32,
) -> f32 {
    let jaccard = jaccard_tokens(a_tokens, b_tokens);
    let edit = edit_ratio(a_name, b_name);
    (jaccard_weight * jaccard + (1.0 - jaccard_weight) * edit).clamp(0.0, 1.0)
}
