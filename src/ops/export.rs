//! Markdown outline of a story, in reading order.
//!
//! Weak references that no longer resolve (deleted characters, locations,
//! or loops) are left out rather than printed as raw ids.

use std::fmt::Write;

use crate::model::card::Card;
use crate::model::project::Project;

pub fn export_markdown(project: &Project) -> String {
    let mut out = String::new();
    let title = if project.title.is_empty() {
        "Untitled"
    } else {
        project.title.as_str()
    };
    let _ = writeln!(out, "# {}", title);
    if !project.logline.is_empty() {
        let _ = writeln!(out, "\n> {}", project.logline);
    }

    for (i, scene) in project.scenes().enumerate() {
        let _ = writeln!(out, "\n## {}. {}", i + 1, heading(scene));
        write_card_body(&mut out, project, scene);
        for (j, chapter) in project.chapters_of(scene).enumerate() {
            let _ = writeln!(out, "\n### {}.{} {}", i + 1, j + 1, heading(chapter));
            write_card_body(&mut out, project, chapter);
        }
    }
    out
}

fn heading(card: &Card) -> String {
    match card.polarity {
        Some(p) => format!("{} ({})", card.title, p.symbol()),
        None => card.title.clone(),
    }
}

fn write_card_body(out: &mut String, project: &Project, card: &Card) {
    let mut facts = Vec::new();
    if !card.beats.is_empty() {
        let labels: Vec<&str> = card.beats.iter().map(|b| b.label()).collect();
        facts.push(format!("Beats: {}", labels.join(", ")));
    }
    let names: Vec<&str> = card
        .conflict_subjects()
        .filter_map(|id| project.character_name(id))
        .collect();
    if !names.is_empty() {
        facts.push(format!("Conflict: {}", names.join(" vs ")));
    }
    if let Some(name) = card.location.as_deref().and_then(|id| project.location_name(id)) {
        facts.push(format!("Location: {}", name));
    }
    let loops: Vec<String> = card
        .loops
        .iter()
        .filter_map(|claim| {
            project
                .loops
                .get(&claim.loop_id)
                .map(|l| format!("{} ({})", l.title, claim.part))
        })
        .collect();
    if !loops.is_empty() {
        facts.push(format!("Loops: {}", loops.join(", ")));
    }

    if !facts.is_empty() {
        out.push('\n');
        for fact in facts {
            let _ = writeln!(out, "- {}", fact);
        }
    }
    if !card.description.trim().is_empty() {
        let _ = writeln!(out, "\n{}", card.description.trim_end());
    }
    if let Some(draft) = card.draft.as_deref().filter(|d| !d.trim().is_empty()) {
        let _ = writeln!(out, "\n{}", draft.trim_end());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::beat::Beat;
    use crate::model::card::{CardPatch, LoopClaim, LoopPart, Polarity};
    use crate::model::ids::SequentialIds;
    use crate::ops::registry_ops::{add_character, add_location, add_loop};
    use crate::ops::tree_ops::{add_child, add_scene, update_card};

    #[test]
    fn test_export_outline() {
        let mut p = Project::new("Heist");
        p.logline = "A crew robs the bank that ruined them.".into();
        let mut ids = SequentialIds::new("c");
        let s1 = add_scene(&mut p, &mut ids, "Opening".into());
        let ch = add_child(&mut p, &mut ids, &s1, "Casing the bank".into()).unwrap();
        let s2 = add_scene(&mut p, &mut ids, "The job".into());
        let mara = add_character(&mut p, &mut ids, "Mara".into());
        let vault = add_location(&mut p, &mut ids, "The vault".into());
        let gun = add_loop(&mut p, &mut ids, "The gun in the drawer".into());

        p.card_mut(&s1).unwrap().beats.push(Beat::OpeningImage);
        update_card(
            &mut p,
            &ch,
            CardPatch {
                description: Some("Mara walks the floor.".into()),
                draft: Some(Some("The bank smelled of floor wax.".into())),
                polarity: Some(Some(Polarity::Negative)),
                conflict: Some([Some(mara), Some("ghost".into())]),
                location: Some(Some(vault)),
                ..Default::default()
            },
        )
        .unwrap();
        p.card_mut(&ch).unwrap().loops.push(LoopClaim::new(gun, LoopPart::Setup));
        p.card_mut(&s2).unwrap().beats.push(Beat::Catalyst);

        insta::assert_snapshot!(export_markdown(&p), @r"
        # Heist

        > A crew robs the bank that ruined them.

        ## 1. Opening

        - Beats: Opening Image

        ### 1.1 Casing the bank (-)

        - Conflict: Mara
        - Location: The vault
        - Loops: The gun in the drawer (setup)

        Mara walks the floor.

        The bank smelled of floor wax.

        ## 2. The job

        - Beats: Catalyst
        ");
    }

    #[test]
    fn test_export_empty_project() {
        assert_eq!(export_markdown(&Project::default()), "# Untitled\n");
    }
}
