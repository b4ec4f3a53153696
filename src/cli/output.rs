use serde::Serialize;

use crate::model::beat::Beat;
use crate::model::card::{Card, CardKind, LoopClaim, LoopPart, Polarity};
use crate::model::project::Project;
use crate::ops::index::{BeatIndex, LoopIndex};

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CardJson {
    pub id: String,
    pub kind: CardKind,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub polarity: Option<Polarity>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflict: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<Beat>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub loops: Vec<LoopClaim>,
}

#[derive(Serialize)]
pub struct TreeSceneJson {
    pub position: usize,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<Beat>,
    pub chapters: Vec<TreeChapterJson>,
}

#[derive(Serialize)]
pub struct TreeChapterJson {
    pub position: usize,
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub beats: Vec<Beat>,
}

#[derive(Serialize)]
pub struct BeatRowJson {
    pub number: usize,
    pub beat: Beat,
    pub label: &'static str,
    pub holder: Option<String>,
    /// Every card claiming the beat, when more than one does
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contested_by: Vec<String>,
}

#[derive(Serialize)]
pub struct LoopRowJson {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub setup: Option<String>,
    pub bump: Option<String>,
    pub payoff: Option<String>,
}

#[derive(Serialize)]
pub struct CreatedJson {
    pub id: String,
}

#[derive(Serialize)]
pub struct ChangedJson {
    pub changed: bool,
}

#[derive(Serialize)]
pub struct DeletedJson {
    pub deleted: Vec<String>,
}

#[derive(Serialize)]
pub struct ClaimJson {
    pub card: String,
    pub changed: bool,
    /// Cards that lost the claim under the steal policy
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub revoked: Vec<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

pub fn card_to_json(card: &Card) -> CardJson {
    CardJson {
        id: card.id.clone(),
        kind: card.kind,
        title: card.title.clone(),
        description: card.description.clone(),
        draft: card.draft.clone(),
        polarity: card.polarity,
        conflict: card.conflict_subjects().cloned().collect(),
        location: card.location.clone(),
        parent: card.parent.clone(),
        children: card.children.clone(),
        beats: card.beats.clone(),
        loops: card.loops.clone(),
    }
}

pub fn tree_to_json(project: &Project) -> Vec<TreeSceneJson> {
    project
        .scenes()
        .enumerate()
        .map(|(i, scene)| TreeSceneJson {
            position: i + 1,
            id: scene.id.clone(),
            title: scene.title.clone(),
            beats: scene.beats.clone(),
            chapters: project
                .chapters_of(scene)
                .enumerate()
                .map(|(j, chapter)| TreeChapterJson {
                    position: j + 1,
                    id: chapter.id.clone(),
                    title: chapter.title.clone(),
                    beats: chapter.beats.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn beats_to_json(index: &BeatIndex) -> Vec<BeatRowJson> {
    Beat::ALL
        .iter()
        .map(|beat| {
            let claimants = index.claimants(beat);
            BeatRowJson {
                number: beat.number(),
                beat: *beat,
                label: beat.label(),
                holder: index.holder(beat).map(str::to_string),
                contested_by: if claimants.len() > 1 {
                    claimants.to_vec()
                } else {
                    Vec::new()
                },
            }
        })
        .collect()
}

pub fn loops_to_json(project: &Project, index: &LoopIndex) -> Vec<LoopRowJson> {
    project
        .loop_order
        .iter()
        .filter_map(|id| project.loops.get(id))
        .map(|entry| {
            let holder = |part| index.holder_of(&entry.id, part).map(str::to_string);
            LoopRowJson {
                id: entry.id.clone(),
                title: entry.title.clone(),
                description: entry.description.clone(),
                setup: holder(LoopPart::Setup),
                bump: holder(LoopPart::Bump),
                payoff: holder(LoopPart::Payoff),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn beat_tags(beats: &[Beat]) -> String {
    if beats.is_empty() {
        return String::new();
    }
    let keys: Vec<String> = beats.iter().map(|b| format!("[{}]", b.key())).collect();
    format!(" {}", keys.join(" "))
}

/// `<id>  <title> <polarity> [beat]...` on one line
pub fn format_card_line(card: &Card) -> String {
    let polarity = card
        .polarity
        .map(|p| format!(" ({})", p.symbol()))
        .unwrap_or_default();
    format!("{}  {}{}{}", card.id, card.title, polarity, beat_tags(&card.beats))
}

/// Scenes numbered on the board, chapters numbered within their scene
pub fn format_tree(project: &Project) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, scene) in project.scenes().enumerate() {
        lines.push(format!("{:>2}. {}", i + 1, format_card_line(scene)));
        for (j, chapter) in project.chapters_of(scene).enumerate() {
            lines.push(format!("      {}. {}", j + 1, format_card_line(chapter)));
        }
    }
    lines
}

/// Full card view with resolved names. Dangling references are shown by id.
pub fn format_card_detail(project: &Project, card: &Card) -> Vec<String> {
    let mut lines = vec![format!("{} {}", card.kind, format_card_line(card))];

    if let Some(parent) = card.parent.as_deref() {
        let title = project.card(parent).map(|c| c.title.as_str()).unwrap_or("?");
        lines.push(format!("scene: {} ({})", title, parent));
    }
    let subjects: Vec<String> = card
        .conflict_subjects()
        .map(|id| match project.character_name(id) {
            Some(name) => name.to_string(),
            None => format!("{} (missing)", id),
        })
        .collect();
    if !subjects.is_empty() {
        lines.push(format!("conflict: {}", subjects.join(" vs ")));
    }
    if let Some(loc) = card.location.as_deref() {
        match project.location_name(loc) {
            Some(name) => lines.push(format!("location: {}", name)),
            None => lines.push(format!("location: {} (missing)", loc)),
        }
    }
    for claim in &card.loops {
        let title = project
            .loops
            .get(&claim.loop_id)
            .map(|l| l.title.as_str())
            .unwrap_or("?");
        lines.push(format!("loop: {} ({})", title, claim.part));
    }
    if !card.children.is_empty() {
        lines.push("chapters:".to_string());
        for chapter in project.chapters_of(card) {
            lines.push(format!("  {}", format_card_line(chapter)));
        }
    }
    if !card.description.is_empty() {
        lines.push(String::new());
        lines.extend(card.description.lines().map(str::to_string));
    }
    if let Some(draft) = &card.draft {
        lines.push(String::new());
        lines.push("draft:".to_string());
        lines.extend(draft.lines().map(|l| format!("  {}", l)));
    }
    lines
}

pub fn format_beats(project: &Project, index: &BeatIndex) -> Vec<String> {
    Beat::ALL
        .iter()
        .map(|beat| {
            let holder = match index.holder(beat) {
                Some(id) => {
                    let title = project.card(id).map(|c| c.title.as_str()).unwrap_or("?");
                    format!("{} ({})", title, id)
                }
                None => "-".to_string(),
            };
            let contested = if index.claimants(beat).len() > 1 {
                format!("  !! also {}", index.claimants(beat).join(", "))
            } else {
                String::new()
            };
            format!("{:>2}. {:<24} {}{}", beat.number(), beat.label(), holder, contested)
        })
        .collect()
}

pub fn format_loops(project: &Project, index: &LoopIndex) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in project.loop_order.iter().filter_map(|id| project.loops.get(id)) {
        lines.push(format!("{}  {}", entry.id, entry.title));
        for (part, holder) in index.parts_of(&entry.id) {
            lines.push(format!("    {:<7} {}", part.to_string(), holder.unwrap_or("-")));
        }
    }
    lines
}
