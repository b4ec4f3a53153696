use std::ops::Range;

use regex::Regex;
use serde::Serialize;

use crate::model::card::Card;
use crate::model::project::Project;

/// Which field of a card or registry entry matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    Title,
    Description,
    Draft,
    /// Character or location name
    Name,
}

/// What kind of record a hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitSource {
    Card,
    Character,
    Location,
    Loop,
}

/// A search hit
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub source: HitSource,
    pub id: String,
    pub field: MatchField,
    #[serde(skip)]
    pub spans: Vec<Range<usize>>,
}

/// Collect all non-overlapping match byte-ranges for a regex in the given text.
fn find_matches(re: &Regex, text: &str) -> Vec<Range<usize>> {
    re.find_iter(text).map(|m| m.start()..m.end()).collect()
}

fn push_hit(
    hits: &mut Vec<SearchHit>,
    re: &Regex,
    source: HitSource,
    id: &str,
    field: MatchField,
    text: &str,
) {
    let spans = find_matches(re, text);
    if !spans.is_empty() {
        hits.push(SearchHit {
            source,
            id: id.to_string(),
            field,
            spans,
        });
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// Search cards in reading order, then the registries in display order.
pub fn search_project(project: &Project, re: &Regex) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    for card in project.walk() {
        search_card(re, card, &mut hits);
    }

    for character in project
        .character_order
        .iter()
        .filter_map(|id| project.characters.get(id))
    {
        push_hit(
            &mut hits,
            re,
            HitSource::Character,
            &character.id,
            MatchField::Name,
            &character.name,
        );
        push_hit(
            &mut hits,
            re,
            HitSource::Character,
            &character.id,
            MatchField::Description,
            &character.description,
        );
    }

    for location in project
        .location_order
        .iter()
        .filter_map(|id| project.locations.get(id))
    {
        push_hit(
            &mut hits,
            re,
            HitSource::Location,
            &location.id,
            MatchField::Name,
            &location.name,
        );
        push_hit(
            &mut hits,
            re,
            HitSource::Location,
            &location.id,
            MatchField::Description,
            &location.description,
        );
    }

    for entry in project.loop_order.iter().filter_map(|id| project.loops.get(id)) {
        push_hit(&mut hits, re, HitSource::Loop, &entry.id, MatchField::Title, &entry.title);
        push_hit(
            &mut hits,
            re,
            HitSource::Loop,
            &entry.id,
            MatchField::Description,
            &entry.description,
        );
    }

    hits
}

fn search_card(re: &Regex, card: &Card, hits: &mut Vec<SearchHit>) {
    push_hit(hits, re, HitSource::Card, &card.id, MatchField::Title, &card.title);
    push_hit(hits, re, HitSource::Card, &card.id, MatchField::Description, &card.description);
    if let Some(draft) = &card.draft {
        push_hit(hits, re, HitSource::Card, &card.id, MatchField::Draft, draft);
    }
}
