//! Neighborhood mentions in free-text queries.

use regex::Regex;
use std::collections::HashMap;

/// Alias (lowercase) to canonical neighborhood name. Landmarks resolve to
/// the neighborhood that contains them.
const NEIGHBORHOOD_ALIASES: &[(&str, &str)] = &[
    ("nyc", "New York City"),
    ("new york", "New York City"),
    ("new york city", "New York City"),
    ("manhattan", "Manhattan"),
    ("downtown", "Manhattan"),
    ("brooklyn", "Brooklyn"),
    ("queens", "Queens"),
    ("bronx", "Bronx"),
    ("staten island", "Staten Island"),
    ("soho", "SoHo"),
    ("noho", "NoHo"),
    ("greenpoint", "Greenpoint"),
    ("east village", "East Village"),
    ("west village", "West Village"),
    ("greenwich village", "Greenwich Village"),
    ("lower east side", "Lower East Side"),
    ("les", "Lower East Side"),
    ("upper east side", "Upper East Side"),
    ("ues", "Upper East Side"),
    ("upper west side", "Upper West Side"),
    ("uws", "Upper West Side"),
    ("chelsea", "Chelsea District"),
    ("hudson yards", "Chelsea District"),
    ("high line", "Chelsea District"),
    ("chinatown", "Chinatown"),
    ("tribeca", "Tribeca"),
    ("little italy", "Little Italy"),
    ("nolita", "Little Italy"),
    ("midtown", "Midtown"),
    ("midtown east", "Midtown East"),
    ("midtown west", "Midtown West"),
    ("flatiron", "Flatiron District"),
    ("union square", "Flatiron District"),
    ("gramercy", "Gramercy"),
    ("fidi", "Financial District"),
    ("financial district", "Financial District"),
    ("alphabet city", "Alphabet City"),
    ("hell's kitchen", "Hell's Kitchen"),
    ("hells kitchen", "Hell's Kitchen"),
    ("williamsburg", "Brooklyn"),
    ("dumbo", "Brooklyn"),
    ("downtown brooklyn", "Brooklyn"),
    ("boerum hill", "Brooklyn"),
    ("fort greene", "Brooklyn"),
    ("park slope", "Brooklyn"),
    ("cobble hill", "Brooklyn"),
    ("prospect heights", "Brooklyn"),
    ("bk heights", "Brooklyn Heights"),
    ("brooklyn heights", "Brooklyn Heights"),
    ("ktown", "Koreatown"),
    ("korea town", "Koreatown"),
    ("koreatown", "Koreatown"),
    ("theatre district", "Theater District"),
    ("theater district", "Theater District"),
    ("meatpacking", "Meatpacking District"),
    ("meat packing", "Meatpacking District"),
    ("meatpacking district", "Meatpacking District"),
    ("central park", "Upper East Side"),
    ("bryant park", "Midtown"),
    ("times square", "Midtown"),
    ("washington square park", "Greenwich Village"),
];

/// Canonical neighborhood to the neighborhoods around it, used to widen a
/// location filter that finds too little.
const ADJACENT_NEIGHBORHOODS: &[(&str, &[&str])] = &[
    ("SoHo", &["NoHo", "Little Italy", "Tribeca", "Greenwich Village"]),
    ("NoHo", &["SoHo", "East Village", "Greenwich Village"]),
    ("East Village", &["NoHo", "Lower East Side", "Alphabet City", "Gramercy"]),
    ("West Village", &["Greenwich Village", "Chelsea District", "Meatpacking District"]),
    ("Lower East Side", &["East Village", "Chinatown", "Little Italy"]),
    ("Tribeca", &["SoHo", "Financial District", "Chinatown"]),
    ("Midtown", &["Chelsea District", "Midtown East", "Midtown West", "Theater District"]),
    ("Brooklyn", &["Brooklyn Heights", "Greenpoint"]),
    ("Chinatown", &["Little Italy", "Lower East Side", "Financial District"]),
    ("Chelsea District", &["West Village", "Midtown", "Meatpacking District"]),
    ("Greenwich Village", &["West Village", "SoHo", "NoHo"]),
];

/// Finds a neighborhood mention in a query, with or without a leading
/// preposition ("in soho", "near Brooklyn", "ktown").
#[derive(Debug, Clone)]
pub struct LocationExtractor {
    aliases: HashMap<&'static str, &'static str>,
    pattern: Regex,
}

impl LocationExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        let aliases: HashMap<&'static str, &'static str> = NEIGHBORHOOD_ALIASES.iter().copied().collect();

        // longest alias first so "midtown east" wins over "midtown"
        let mut keys: Vec<&str> = aliases.keys().copied().collect();
        keys.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        let alternation = keys.iter().map(|k| regex::escape(k)).collect::<Vec<_>>().join("|");

        let pattern = Regex::new(&format!(
            r"(?i)\b(?:(?:in|near|around|at|by|within)\s+(?:the\s+)?)?({alternation})\b"
        ))?;
        Ok(Self { aliases, pattern })
    }

    /// Canonical name for an alias or an already-canonical name.
    pub fn canonical(&self, name: &str) -> Option<&'static str> {
        let lowered = name.trim().to_lowercase();
        if let Some(canonical) = self.aliases.get(lowered.as_str()) {
            return Some(*canonical);
        }
        self.aliases
            .values()
            .find(|canonical| canonical.eq_ignore_ascii_case(name.trim()))
            .copied()
    }

    /// Split a query into the text without its location and the canonical
    /// neighborhood, if one was mentioned. Only the first mention is used.
    pub fn extract(&self, query: &str) -> (String, Option<&'static str>) {
        let Some(captures) = self.pattern.captures(query) else {
            return (query.to_string(), None);
        };
        let (Some(whole), Some(alias)) = (captures.get(0), captures.get(1)) else {
            return (query.to_string(), None);
        };
        let Some(canonical) = self.canonical(alias.as_str()) else {
            return (query.to_string(), None);
        };

        let remainder = format!("{} {}", &query[..whole.start()], &query[whole.end()..]);
        let stripped = remainder.split_whitespace().collect::<Vec<_>>().join(" ");
        (stripped, Some(canonical))
    }

    /// Neighborhoods next to a canonical one; empty when none are known.
    pub fn adjacent(&self, canonical: &str) -> &'static [&'static str] {
        ADJACENT_NEIGHBORHOODS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(canonical))
            .map(|(_, around)| *around)
            .unwrap_or(&[])
    }

    /// Whether a stored neighborhood falls under `canonical`.
    pub fn matches(&self, neighborhood: &str, canonical: &str) -> bool {
        match self.canonical(neighborhood) {
            Some(resolved) => resolved.eq_ignore_ascii_case(canonical),
            None => neighborhood.trim().eq_ignore_ascii_case(canonical),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> LocationExtractor {
        LocationExtractor::new().unwrap()
    }

    #[test]
    fn test_preposition_mentions() {
        let x = extractor();
        assert_eq!(x.extract("ramen in SoHo"), ("ramen".to_string(), Some("SoHo")));
        assert_eq!(x.extract("late night pizza near Brooklyn"), ("late night pizza".to_string(), Some("Brooklyn")));
        assert_eq!(x.extract("dumplings around the LES"), ("dumplings".to_string(), Some("Lower East Side")));
        assert_eq!(x.extract("sushi in the west village"), ("sushi".to_string(), Some("West Village")));
        assert_eq!(x.extract("the soho house bar"), ("the house bar".to_string(), Some("SoHo")));
    }

    #[test]
    fn test_bare_mentions_and_longest_alias() {
        let x = extractor();
        assert_eq!(x.extract("east village wine bar"), ("wine bar".to_string(), Some("East Village")));
        assert_eq!(x.extract("brunch upper east side"), ("brunch".to_string(), Some("Upper East Side")));
        assert_eq!(x.extract("bbq in hell's kitchen"), ("bbq".to_string(), Some("Hell's Kitchen")));
    }

    #[test]
    fn test_no_mention() {
        let x = extractor();
        assert_eq!(x.extract("sohoish noodles"), ("sohoish noodles".to_string(), None));
        assert_eq!(x.extract("cheap tacos"), ("cheap tacos".to_string(), None));
    }

    #[test]
    fn test_landmarks_and_matching() {
        let x = extractor();
        assert_eq!(x.extract("coffee by times square").1, Some("Midtown"));
        assert_eq!(x.canonical("Williamsburg"), Some("Brooklyn"));
        assert_eq!(x.canonical("soho"), Some("SoHo"));
        assert!(x.matches("Williamsburg", "Brooklyn"));
        assert!(x.matches("West Village", "West Village"));
        assert!(x.matches("Astoria", "astoria"));
        assert!(!x.matches("Tribeca", "SoHo"));
    }

    #[test]
    fn test_adjacent_neighborhoods() {
        let x = extractor();
        assert_eq!(x.adjacent("West Village"), ["Greenwich Village", "Chelsea District", "Meatpacking District"]);
        assert_eq!(x.adjacent("soho").len(), 4);
        assert!(x.adjacent("Astoria").is_empty());
        for (name, around) in ADJACENT_NEIGHBORHOODS {
            assert!(!around.contains(name));
            assert!(around.iter().all(|n| x.canonical(n) == Some(*n)), "{name}");
        }
    }
}
