//! Keyword ranking of site documents and team-directory lookup.

use promptx_types::SearchHit;

use super::site_knowledge::{SiteDoc, TeamMember};

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "to", "of", "in", "on", "for", "with", "is", "are", "was", "were", "be",
    "about", "me", "i", "you", "we", "our",
];

/// Maximum number of `/search` results.
pub const MAX_SEARCH_RESULTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ranked<'a> {
    pub doc: &'a SiteDoc,
    pub score: u32,
}

/// Lowercase, map everything but `[a-z0-9]` and whitespace to spaces, and
/// collapse runs of whitespace.
pub fn normalize(text: &str) -> String {
    let mapped: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace() { c } else { ' ' })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split(' ')
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(str::to_owned)
        .collect()
}

/// +1 per query token found in title, tags or content, +2 more per token
/// found in the title. Stable on ties. An empty query keeps catalogue order
/// with score 0.
pub fn rank_docs<'a>(query: &str, docs: &'a [SiteDoc], limit: usize) -> Vec<Ranked<'a>> {
    let tokens = tokenize(query);
    if tokens.is_empty() {
        return docs.iter().take(limit).map(|doc| Ranked { doc, score: 0 }).collect();
    }

    let mut ranked: Vec<Ranked<'a>> = docs
        .iter()
        .map(|doc| {
            let hay = normalize(&format!("{} {} {}", doc.title, doc.tags.join(" "), doc.content));
            let title = normalize(doc.title);
            let body_hits = tokens.iter().filter(|t| hay.contains(t.as_str())).count() as u32;
            let title_hits = tokens.iter().filter(|t| title.contains(t.as_str())).count() as u32;
            Ranked { doc, score: body_hits + 2 * title_hits }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked.truncate(limit);
    ranked
}

/// Documents with a positive score, or the first three when none match.
pub fn best_docs<'a>(ranked: &[Ranked<'a>]) -> Vec<&'a SiteDoc> {
    if ranked.iter().any(|r| r.score > 0) {
        ranked.iter().filter(|r| r.score > 0).map(|r| r.doc).collect()
    } else {
        ranked.iter().take(3).map(|r| r.doc).collect()
    }
}

/// Case-insensitive substring match over name, role and bio.
pub fn search_team(query: &str, team: &[TeamMember]) -> Vec<SearchHit> {
    let q = query.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }
    team.iter()
        .filter(|m| {
            m.name.to_lowercase().contains(&q) || m.role.to_lowercase().contains(&q) || m.bio.to_lowercase().contains(&q)
        })
        .take(MAX_SEARCH_RESULTS)
        .map(|m| SearchHit {
            id: m.id.to_owned(),
            title: m.name.to_owned(),
            subtitle: m.role.to_owned(),
            href: format!("/Teams#{}", m.id),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::site_knowledge::{SITE_DOCS, TEAM};

    #[test]
    fn normalize_strips_punctuation() {
        assert_eq!(normalize("  Who BUILT\tPromptX?! "), "who built promptx");
        assert_eq!(tokenize("Who is the founder of PromptX?"), vec!["who", "founder", "promptx"]);
    }

    #[test]
    fn title_matches_rank_highest() {
        let ranked = rank_docs("pricing plans", SITE_DOCS, 5);
        assert_eq!(ranked[0].doc.id, "pricing");
        // "pricing" and "plans" hit the body (+2), "pricing" hits the title (+2).
        assert_eq!(ranked[0].score, 4);
        assert!(ranked[1..].iter().all(|r| r.score < 4));
    }

    #[test]
    fn empty_query_keeps_catalogue_order() {
        let ranked = rank_docs("the a of", SITE_DOCS, 2);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|r| r.score == 0));
        assert_eq!(ranked[0].doc.id, "team");
        assert_eq!(best_docs(&ranked).len(), 2);
    }

    #[test]
    fn best_docs_drops_zero_scores_when_anything_matches() {
        let ranked = rank_docs("founder", SITE_DOCS, 5);
        let best = best_docs(&ranked);
        assert_eq!(best.iter().map(|d| d.id).collect::<Vec<_>>(), vec!["team"]);
    }

    #[test]
    fn team_search_is_case_insensitive() {
        let hits = search_team("FRONT", TEAM);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].href, "/Teams#dev1");
        assert!(search_team("   ", TEAM).is_empty());
        assert_eq!(search_team("promptx", TEAM)[0].title, "Jay Patel");
    }
}
