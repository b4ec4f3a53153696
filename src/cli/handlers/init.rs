use crate::cli::commands::InitArgs;
use crate::cli::handlers::Ctx;
use crate::io::project_io;
use crate::io::store::Session;
use crate::model::project::Project;

const PROJECT_TOML_TEMPLATE: &str = r##"[project]
title = "{title}"

# What happens when a card claims a beat (or loop part) another card holds:
#   exclusive  refuse the second claim
#   steal      move the claim to the new card
#   shared     allow both; `bb check` reports the overlap
[claims]
beats = "exclusive"
loops = "exclusive"

# uuid ids are safe to merge; sequential ids (c-1, c-2, ...) are easier to type.
[ids]
generator = "{generator}"
prefix = "c"

[defaults]
scene_title = "New Beat"
chapter_title = "New Chapter"
"##;

/// Infer a story title from a directory name: replace hyphens with spaces, title-case.
fn infer_title(dir_name: &str) -> String {
    dir_name
        .split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(c) => {
                    let upper: String = c.to_uppercase().collect();
                    upper + chars.as_str()
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn render_project_toml(title: &str, sequential: bool) -> String {
    let escaped = title.replace('\\', "\\\\").replace('"', "\\\"");
    PROJECT_TOML_TEMPLATE
        .replace("{title}", &escaped)
        .replace("{generator}", if sequential { "sequential" } else { "uuid" })
}

pub fn cmd_init(ctx: &Ctx, args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let root = &ctx.start;

    if let Some(parent) = root.parent()
        && let Ok(parent_root) = project_io::discover_project(parent)
    {
        eprintln!(
            "Note: parent board found at {}/",
            parent_root.join(project_io::BOARD_DIR).display()
        );
        eprintln!("Creating new board in ./board/");
    }

    let title = args.title.unwrap_or_else(|| {
        root.file_name()
            .and_then(|n| n.to_str())
            .map(infer_title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    });

    let ws = project_io::create_board(root, &render_project_toml(&title, args.sequential))?;
    let mut session = Session::create(ws.store(), Project::new(title.clone()));
    session.save()?;

    println!("Initialized beatboard project: {}", title);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::config::{IdStyle, ProjectConfig};

    #[test]
    fn test_infer_title() {
        assert_eq!(infer_title("my-heist-story"), "My Heist Story");
        assert_eq!(infer_title("novel_draft"), "Novel Draft");
        assert_eq!(infer_title("--"), "");
    }

    #[test]
    fn test_rendered_template_parses() {
        let text = render_project_toml("The \"Big\" Job", true);
        let config: ProjectConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.project.title, "The \"Big\" Job");
        assert_eq!(config.ids.generator, IdStyle::Sequential);
        assert_eq!(config.defaults.scene_title, "New Beat");

        let config: ProjectConfig = toml::from_str(&render_project_toml("x", false)).unwrap();
        assert_eq!(config.ids.generator, IdStyle::Uuid);
    }
}
