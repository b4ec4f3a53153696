//! Text-service helpers layered on top of the card tree.
//!
//! The tree and the claim indexes never call out; these operations build a
//! prompt from the project, ask an injected [`CompletionService`], and apply
//! the answer through [`update_card`]. A failed or malformed answer leaves
//! the project untouched.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::model::card::CardPatch;
use crate::model::project::Project;
use crate::ops::tree_ops::{TreeError, require_scene, update_card};

/// A prompt plus an optional JSON schema the answer must follow
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: String,
    pub schema: Option<serde_json::Value>,
}

/// What a completion service hands back
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Structured(serde_json::Value),
}

/// A generative text backend. Implementations own transport and auth.
pub trait CompletionService {
    fn complete(&self, request: &CompletionRequest) -> Result<Completion, AssistError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("completion service failed: {0}")]
    Service(String),
    #[error("malformed completion: {0}")]
    Malformed(String),
    #[error("card {0} has no text to work from")]
    NothingToWorkWith(String),
    #[error(transparent)]
    Tree(#[from] TreeError),
}

// ---------------------------------------------------------------------------
// Draft polish
// ---------------------------------------------------------------------------

/// Rewrite a card's draft (or its description, if it has no draft yet) and
/// store the result as the new draft. Returns the new draft text.
pub fn polish_draft(
    project: &mut Project,
    card_id: &str,
    service: &dyn CompletionService,
) -> Result<String, AssistError> {
    let card = project
        .card(card_id)
        .ok_or_else(|| TreeError::NotFound(card_id.to_string()))?;
    let source = card
        .draft
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(card.description.as_str());
    if source.trim().is_empty() {
        return Err(AssistError::NothingToWorkWith(card_id.to_string()));
    }

    let mut prompt = format!(
        "Clean up the following story draft. Keep the events, voice, and tense; \
         fix grammar and flow.\n\nTitle: {}\n",
        card.title
    );
    if !card.beats.is_empty() {
        let beats: Vec<&str> = card.beats.iter().map(|b| b.label()).collect();
        prompt.push_str(&format!("Beats: {}\n", beats.join(", ")));
    }
    prompt.push('\n');
    prompt.push_str(source);

    let request = CompletionRequest {
        prompt,
        schema: None,
    };
    let text = match service.complete(&request)? {
        Completion::Text(t) => t.trim().to_string(),
        Completion::Structured(_) => {
            return Err(AssistError::Malformed("expected plain text".into()));
        }
    };
    if text.is_empty() {
        return Err(AssistError::Malformed("empty draft".into()));
    }

    update_card(
        project,
        card_id,
        CardPatch {
            draft: Some(Some(text.clone())),
            ..Default::default()
        },
    )?;
    debug!(card = %card_id, "polished draft");
    Ok(text)
}

// ---------------------------------------------------------------------------
// Chapter summaries
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    summaries: Vec<ChapterSummary>,
}

#[derive(Debug, Deserialize)]
struct ChapterSummary {
    id: String,
    description: String,
}

fn summary_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "summaries": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "id": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["id", "description"]
                }
            }
        },
        "required": ["summaries"]
    })
}

/// Ask for a one-paragraph description of every chapter in a scene and
/// write each into the chapter's description. Summaries naming ids that
/// are not chapters of the scene are ignored. Returns how many were applied.
pub fn summarize_chapters(
    project: &mut Project,
    scene_id: &str,
    service: &dyn CompletionService,
) -> Result<usize, AssistError> {
    let scene = require_scene(project, scene_id)?;
    let mut prompt = format!(
        "Summarize each chapter of the scene \"{}\" in one paragraph. Answer with JSON.\n",
        scene.title
    );
    let mut any = false;
    for chapter in project.chapters_of(scene) {
        any = true;
        prompt.push_str(&format!("\n[{}] {}\n", chapter.id, chapter.title));
        if let Some(draft) = &chapter.draft {
            prompt.push_str(draft);
            prompt.push('\n');
        } else if !chapter.description.is_empty() {
            prompt.push_str(&chapter.description);
            prompt.push('\n');
        }
    }
    if !any {
        return Ok(0);
    }

    let request = CompletionRequest {
        prompt,
        schema: Some(summary_schema()),
    };
    let value = match service.complete(&request)? {
        Completion::Structured(v) => v,
        Completion::Text(t) => serde_json::from_str(&t)
            .map_err(|e| AssistError::Malformed(format!("not JSON: {}", e)))?,
    };
    let response: SummaryResponse =
        serde_json::from_value(value).map_err(|e| AssistError::Malformed(e.to_string()))?;

    let owned: Vec<String> = scene.children.clone();
    let mut applied = 0;
    for summary in response.summaries {
        if !owned.contains(&summary.id) {
            warn!(card = %summary.id, scene = %scene_id, "ignoring summary for card outside scene");
            continue;
        }
        update_card(
            project,
            &summary.id,
            CardPatch {
                description: Some(summary.description),
                ..Default::default()
            },
        )?;
        applied += 1;
    }
    debug!(scene = %scene_id, applied, "summarized chapters");
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::SequentialIds;
    use crate::ops::tree_ops::{add_child, add_scene};
    use std::cell::RefCell;

    /// Replays canned answers and remembers the prompts it saw.
    struct Scripted {
        answer: Result<Completion, String>,
        seen: RefCell<Vec<CompletionRequest>>,
    }

    impl Scripted {
        fn new(answer: Result<Completion, String>) -> Self {
            Scripted {
                answer,
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl CompletionService for Scripted {
        fn complete(&self, request: &CompletionRequest) -> Result<Completion, AssistError> {
            self.seen.borrow_mut().push(request.clone());
            self.answer.clone().map_err(AssistError::Service)
        }
    }

    fn sample() -> Project {
        let mut p = Project::new("t");
        let mut ids = SequentialIds::new("t");
        let s = add_scene(&mut p, &mut ids, "Heist".into());
        add_child(&mut p, &mut ids, &s, "Casing".into()).unwrap();
        add_child(&mut p, &mut ids, &s, "Break-in".into()).unwrap();
        p.card_mut("t-2").unwrap().draft = Some("they looks at the bank".into());
        p
    }

    #[test]
    fn test_polish_draft_replaces_draft() {
        let mut p = sample();
        let svc = Scripted::new(Ok(Completion::Text(" They look at the bank. \n".into())));
        let text = polish_draft(&mut p, "t-2", &svc).unwrap();
        assert_eq!(text, "They look at the bank.");
        assert_eq!(p.card("t-2").unwrap().draft.as_deref(), Some("They look at the bank."));
        let seen = svc.seen.borrow();
        assert!(seen[0].prompt.contains("they looks at the bank"));
        assert!(seen[0].schema.is_none());
    }

    #[test]
    fn test_polish_draft_failure_leaves_card_untouched() {
        let mut p = sample();
        let before = p.clone();
        let svc = Scripted::new(Err("quota exceeded".into()));
        assert!(matches!(
            polish_draft(&mut p, "t-2", &svc),
            Err(AssistError::Service(_))
        ));
        let svc = Scripted::new(Ok(Completion::Text("   ".into())));
        assert!(matches!(
            polish_draft(&mut p, "t-2", &svc),
            Err(AssistError::Malformed(_))
        ));
        assert_eq!(p, before);
    }

    #[test]
    fn test_polish_draft_needs_text() {
        let mut p = sample();
        let svc = Scripted::new(Ok(Completion::Text("x".into())));
        assert!(matches!(
            polish_draft(&mut p, "t-3", &svc),
            Err(AssistError::NothingToWorkWith(_))
        ));
        assert!(svc.seen.borrow().is_empty());
    }

    #[test]
    fn test_summarize_chapters_applies_known_ids() {
        let mut p = sample();
        let svc = Scripted::new(Ok(Completion::Structured(json!({
            "summaries": [
                { "id": "t-2", "description": "The crew scouts the bank." },
                { "id": "t-1", "description": "not a chapter" },
                { "id": "t-3", "description": "They get inside." }
            ]
        }))));
        assert_eq!(summarize_chapters(&mut p, "t-1", &svc).unwrap(), 2);
        assert_eq!(p.card("t-2").unwrap().description, "The crew scouts the bank.");
        assert_eq!(p.card("t-3").unwrap().description, "They get inside.");
        assert_eq!(p.card("t-1").unwrap().description, "");
        assert!(svc.seen.borrow()[0].schema.is_some());
    }

    #[test]
    fn test_summarize_chapters_accepts_json_text_and_rejects_garbage() {
        let mut p = sample();
        let svc = Scripted::new(Ok(Completion::Text(
            r#"{"summaries":[{"id":"t-3","description":"In."}]}"#.into(),
        )));
        assert_eq!(summarize_chapters(&mut p, "t-1", &svc).unwrap(), 1);

        let before = p.clone();
        let svc = Scripted::new(Ok(Completion::Text("Sure! Here you go".into())));
        assert!(matches!(
            summarize_chapters(&mut p, "t-1", &svc),
            Err(AssistError::Malformed(_))
        ));
        assert_eq!(p, before);
    }

    #[test]
    fn test_summarize_requires_scene() {
        let mut p = sample();
        let svc = Scripted::new(Ok(Completion::Text("{}".into())));
        assert!(matches!(
            summarize_chapters(&mut p, "t-2", &svc),
            Err(AssistError::Tree(TreeError::NotAScene(_)))
        ));
    }
}
