mod init;
pub use init::cmd_init;

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::io::config_io;
use crate::io::lock::BoardLock;
use crate::io::project_io::{self, ProjectError, Workspace};
use crate::io::recovery;
use crate::io::store::{JsonFileStore, Session};
use crate::model::beat::Beat;
use crate::model::card::{CardPatch, LoopPart, Polarity};
use crate::model::config::ProjectConfig;
use crate::model::ids::{IdGenerator, generator_for};
use crate::model::project::Project;
use crate::ops::index::{BeatIndex, LoopIndex};
use crate::ops::tree_ops::Direction;
use crate::ops::{check, claim_ops, export, registry_ops, search, tree_ops};

type CmdResult = Result<(), Box<dyn std::error::Error>>;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings shared by every command
pub struct Ctx {
    /// Where project discovery starts (cwd or `-C`)
    pub start: PathBuf,
    pub json: bool,
}

impl Ctx {
    pub fn from_cli(cli: &Cli) -> Result<Self, Box<dyn std::error::Error>> {
        let start = match &cli.project_dir {
            Some(dir) => std::fs::canonicalize(dir)
                .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
            None => std::env::current_dir()?,
        };
        Ok(Ctx {
            start,
            json: cli.json,
        })
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let ctx = Ctx::from_cli(&cli)?;

    match cli.command {
        Commands::Init(args) => cmd_init(&ctx, args),

        // Read commands
        Commands::Tree => cmd_tree(&ctx),
        Commands::Show(args) => cmd_show(&ctx, args),
        Commands::Beats => cmd_beats(&ctx),
        Commands::Loops => cmd_loops(&ctx),
        Commands::Characters => cmd_characters(&ctx),
        Commands::Locations => cmd_locations(&ctx),
        Commands::Check => cmd_check(&ctx),
        Commands::Search(args) => cmd_search(&ctx, args),
        Commands::Export => cmd_export(&ctx),

        // Card commands
        Commands::Scene(cmd) => match cmd.action {
            SceneAction::Add(args) => cmd_scene_add(&ctx, args),
        },
        Commands::Chapter(cmd) => match cmd.action {
            ChapterAction::Add(args) => cmd_chapter_add(&ctx, args),
        },
        Commands::Edit(args) => cmd_edit(&ctx, args),
        Commands::Rm(args) => cmd_rm(&ctx, args),
        Commands::Mv(cmd) => cmd_mv(&ctx, cmd.action),
        Commands::Reassign(args) => cmd_reassign(&ctx, args),

        // Claims
        Commands::Beat(cmd) => cmd_beat(&ctx, cmd.action),
        Commands::Loop(cmd) => cmd_loop(&ctx, cmd.action),

        // Registries
        Commands::Character(cmd) => cmd_character(&ctx, cmd.action),
        Commands::Location(cmd) => cmd_location(&ctx, cmd.action),

        // Maintenance
        Commands::Config(cmd) => cmd_config(&ctx, cmd.action),
        Commands::Recovery(cmd) => cmd_recovery(&ctx, cmd),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// An open board. Write handles hold the board lock until dropped.
struct Board {
    ws: Workspace,
    session: Session<JsonFileStore>,
    _lock: Option<BoardLock>,
}

impl Board {
    fn project(&self) -> &Project {
        self.session.project()
    }

    fn project_mut(&mut self) -> &mut Project {
        self.session.project_mut()
    }

    fn ids(&self) -> Box<dyn IdGenerator> {
        generator_for(&self.ws.config.ids, self.session.project())
    }

    fn save(&mut self) -> CmdResult {
        self.session.save()?;
        Ok(())
    }
}

fn open_workspace(ctx: &Ctx) -> Result<Workspace, ProjectError> {
    let root = project_io::discover_project(&ctx.start)?;
    project_io::load_workspace(&root)
}

fn open_board(ctx: &Ctx) -> Result<Board, Box<dyn std::error::Error>> {
    let ws = open_workspace(ctx)?;
    let session = ws.open_session()?;
    Ok(Board {
        ws,
        session,
        _lock: None,
    })
}

/// Lock first, then load, so the snapshot cannot change under the edit.
fn open_board_for_write(ctx: &Ctx) -> Result<Board, Box<dyn std::error::Error>> {
    let ws = open_workspace(ctx)?;
    let lock = BoardLock::acquire(&ws.board_dir, LOCK_TIMEOUT)?;
    let session = ws.open_session()?;
    Ok(Board {
        ws,
        session,
        _lock: Some(lock),
    })
}

/// Resolve a full id or a unique prefix of one.
fn resolve_id<'a>(
    candidates: impl Iterator<Item = &'a String>,
    given: &str,
    what: &str,
) -> Result<String, String> {
    let mut matches = Vec::new();
    for id in candidates {
        if id == given {
            return Ok(id.clone());
        }
        if id.starts_with(given) {
            matches.push(id.clone());
        }
    }
    match matches.len() {
        0 => Err(format!("no {} matches '{}'", what, given)),
        1 => Ok(matches.remove(0)),
        _ => {
            matches.sort();
            Err(format!(
                "'{}' is ambiguous; it matches {}s: {}",
                given,
                what,
                matches.join(", ")
            ))
        }
    }
}

fn resolve_card(project: &Project, given: &str) -> Result<String, String> {
    resolve_id(project.cards.keys(), given, "card")
}

fn resolve_character(project: &Project, given: &str) -> Result<String, String> {
    resolve_id(project.characters.keys(), given, "character")
}

fn resolve_location(project: &Project, given: &str) -> Result<String, String> {
    resolve_id(project.locations.keys(), given, "location")
}

fn resolve_loop(project: &Project, given: &str) -> Result<String, String> {
    resolve_id(project.loops.keys(), given, "loop")
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    Direction::parse_direction(s)
        .ok_or_else(|| format!("unknown direction '{}' (expected: up, down)", s))
}

fn parse_beat(s: &str) -> Result<Beat, String> {
    Beat::parse_beat(s).ok_or_else(|| {
        format!(
            "unknown beat '{}' (use a key like 'catalyst', a label, or 1-15)",
            s
        )
    })
}

fn parse_part(s: &str) -> Result<LoopPart, String> {
    LoopPart::parse_part(s)
        .ok_or_else(|| format!("unknown loop part '{}' (expected: setup, bump, payoff)", s))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a freshly created id (bare, so scripts can capture it)
fn report_created(ctx: &Ctx, id: &str) -> CmdResult {
    if ctx.json {
        print_json(&CreatedJson { id: id.to_string() })
    } else {
        println!("{}", id);
        Ok(())
    }
}

fn report_changed(ctx: &Ctx, changed: bool, done: &str, noop: &str) -> CmdResult {
    if ctx.json {
        print_json(&ChangedJson { changed })
    } else {
        println!("{}", if changed { done } else { noop });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Read command handlers
// ---------------------------------------------------------------------------

fn cmd_tree(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let project = board.project();
    if ctx.json {
        return print_json(&tree_to_json(project));
    }
    let lines = format_tree(project);
    if lines.is_empty() {
        println!("(no scenes yet; add one with `bb scene add`)");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_show(ctx: &Ctx, args: IdArg) -> CmdResult {
    let board = open_board(ctx)?;
    let project = board.project();
    let id = resolve_card(project, &args.id)?;
    let card = project
        .card(&id)
        .ok_or_else(|| format!("card not found: {}", id))?;
    if ctx.json {
        return print_json(&card_to_json(card));
    }
    for line in format_card_detail(project, card) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_beats(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let index = BeatIndex::build(board.project());
    if ctx.json {
        return print_json(&beats_to_json(&index));
    }
    for line in format_beats(board.project(), &index) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_loops(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let project = board.project();
    let index = LoopIndex::build(project);
    if ctx.json {
        return print_json(&loops_to_json(project, &index));
    }
    let lines = format_loops(project, &index);
    if lines.is_empty() {
        println!("(no loops)");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_characters(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let project = board.project();
    let cast: Vec<_> = project
        .character_order
        .iter()
        .filter_map(|id| project.characters.get(id))
        .collect();
    if ctx.json {
        return print_json(&cast);
    }
    for c in cast {
        if c.role.is_empty() {
            println!("{}  {}", c.id, c.name);
        } else {
            println!("{}  {} ({})", c.id, c.name, c.role);
        }
    }
    Ok(())
}

fn cmd_locations(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let project = board.project();
    let places: Vec<_> = project
        .location_order
        .iter()
        .filter_map(|id| project.locations.get(id))
        .collect();
    if ctx.json {
        return print_json(&places);
    }
    for l in places {
        println!("{}  {}", l.id, l.name);
    }
    Ok(())
}

fn cmd_check(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    let result = check::check_project(board.project());

    if ctx.json {
        return print_json(&result);
    }
    if !result.errors.is_empty() {
        println!("Errors:");
        for err in &result.errors {
            let text = match err {
                check::CheckError::OrphanChapter { card_id } => {
                    format!("{} is a chapter with no scene", card_id)
                }
                check::CheckError::BadParent { card_id, parent_id } => {
                    format!("{} names {} as its scene, which is not a scene", card_id, parent_id)
                }
                check::CheckError::NotListedByParent { card_id, parent_id } => {
                    format!("{} is missing from the chapter list of {}", card_id, parent_id)
                }
                check::CheckError::StrayChild { scene_id, child_id } => {
                    format!("{} lists {}, which is not one of its chapters", scene_id, child_id)
                }
                check::CheckError::ChapterListedTwice { card_id, count } => {
                    format!("{} is listed by {} scenes", card_id, count)
                }
                check::CheckError::SceneNotInOrder { card_id } => {
                    format!("scene {} is missing from the board order", card_id)
                }
                check::CheckError::BadOrderEntry { id } => {
                    format!("board order entry {} is not a scene or is repeated", id)
                }
                check::CheckError::UnknownLoop { card_id, loop_id } => {
                    format!("{} claims part of unknown loop {}", card_id, loop_id)
                }
            };
            println!("  {}", text);
        }
    }
    if !result.warnings.is_empty() {
        if !result.errors.is_empty() {
            println!();
        }
        println!("Warnings:");
        for warn in &result.warnings {
            let text = match warn {
                check::CheckWarning::DuplicateBeatClaim { beat, card_ids } => {
                    format!("beat {} is claimed by {}", beat.label(), card_ids.join(", "))
                }
                check::CheckWarning::DuplicateLoopClaim {
                    loop_id,
                    part,
                    card_ids,
                } => format!("{} of loop {} is claimed by {}", part, loop_id, card_ids.join(", ")),
                check::CheckWarning::DanglingCharacter {
                    card_id,
                    character_id,
                } => format!("{} refers to missing character {}", card_id, character_id),
                check::CheckWarning::DanglingLocation {
                    card_id,
                    location_id,
                } => format!("{} refers to missing location {}", card_id, location_id),
                check::CheckWarning::LegacyBeatCard { card_id } => {
                    format!("{} is an old-style beat card", card_id)
                }
                check::CheckWarning::EmptyTitle { card_id } => {
                    format!("{} has no title", card_id)
                }
            };
            println!("  {}", text);
        }
    }
    if result.valid {
        println!("✓ board is valid");
    } else {
        println!("✗ board has errors");
    }
    Ok(())
}

fn cmd_search(ctx: &Ctx, args: SearchArgs) -> CmdResult {
    let re = Regex::new(&args.pattern).map_err(|e| format!("invalid regex: {}", e))?;
    let board = open_board(ctx)?;
    let hits = search::search_project(board.project(), &re);
    if ctx.json {
        return print_json(&hits);
    }
    let project = board.project();
    for hit in &hits {
        let label = match hit.source {
            search::HitSource::Card => project.card(&hit.id).map(|c| c.title.as_str()),
            search::HitSource::Character => project.character_name(&hit.id),
            search::HitSource::Location => project.location_name(&hit.id),
            search::HitSource::Loop => project.loops.get(&hit.id).map(|l| l.title.as_str()),
        };
        let field = serde_json::to_value(hit.field)?;
        println!(
            "{}  {} [{}]",
            hit.id,
            label.unwrap_or(""),
            field.as_str().unwrap_or("")
        );
    }
    if hits.is_empty() {
        println!("no matches");
    }
    Ok(())
}

fn cmd_export(ctx: &Ctx) -> CmdResult {
    let board = open_board(ctx)?;
    print!("{}", export::export_markdown(board.project()));
    Ok(())
}

// ---------------------------------------------------------------------------
// Card handlers
// ---------------------------------------------------------------------------

fn cmd_scene_add(ctx: &Ctx, args: TitleOpt) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let title = args
        .title
        .unwrap_or_else(|| board.ws.config.defaults.scene_title.clone());
    let mut ids = board.ids();
    let id = tree_ops::add_scene(board.project_mut(), ids.as_mut(), title);
    board.save()?;
    report_created(ctx, &id)
}

fn cmd_chapter_add(ctx: &Ctx, args: ChapterAddArgs) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let title = args
        .title
        .unwrap_or_else(|| board.ws.config.defaults.chapter_title.clone());
    let mut ids = board.ids();
    let id = match (args.target.scene, args.target.after) {
        (Some(scene), _) => {
            let scene = resolve_card(board.project(), &scene)?;
            tree_ops::add_child(board.project_mut(), ids.as_mut(), &scene, title)?
        }
        (None, Some(after)) => {
            let after = resolve_card(board.project(), &after)?;
            tree_ops::add_sibling_chapter(board.project_mut(), ids.as_mut(), &after, title)?
        }
        (None, None) => return Err("give --scene or --after".into()),
    };
    board.save()?;
    report_created(ctx, &id)
}

fn cmd_edit(ctx: &Ctx, args: EditArgs) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let project = board.project();
    let id = resolve_card(project, &args.id)?;

    let mut patch = CardPatch {
        title: args.title,
        description: args.description,
        draft: args.draft.map(|d| if d.is_empty() { None } else { Some(d) }),
        ..Default::default()
    };
    if let Some(p) = args.polarity {
        patch.polarity = Some(if p == "none" {
            None
        } else {
            Some(Polarity::parse_polarity(&p).ok_or_else(|| {
                format!("unknown polarity '{}' (expected: positive, negative, none)", p)
            })?)
        });
    }
    if let Some(pair) = args.conflict {
        let mut subjects: [Option<String>; 2] = [None, None];
        for (slot, given) in subjects.iter_mut().zip(&pair) {
            if given != "none" {
                *slot = Some(resolve_character(project, given)?);
            }
        }
        patch.conflict = Some(subjects);
    } else if args.clear_conflict {
        patch.conflict = Some([None, None]);
    }
    if let Some(loc) = args.location {
        patch.location = Some(if loc == "none" {
            None
        } else {
            Some(resolve_location(project, &loc)?)
        });
    }
    if patch.is_empty() {
        return Err("nothing to change; pass at least one field flag".into());
    }

    tree_ops::update_card(board.project_mut(), &id, patch)?;
    board.save()?;
    report_changed(ctx, true, &format!("updated {}", id), "")
}

fn cmd_rm(ctx: &Ctx, args: RmArgs) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let id = resolve_card(board.project(), &args.id)?;
    if !args.yes {
        let card = board
            .project()
            .card(&id)
            .ok_or_else(|| format!("card not found: {}", id))?;
        return Err(format!(
            "refusing to delete \"{}\" and its {} chapter(s) without --yes",
            card.title,
            card.children.len()
        )
        .into());
    }

    let deleted = delete_and_log(&mut board, &id)?;
    if ctx.json {
        return print_json(&DeletedJson { deleted });
    }
    println!("deleted {} card(s)", deleted.len());
    Ok(())
}

/// Delete a subtree and, once the save has landed, log the removed cards.
fn delete_and_log(board: &mut Board, id: &str) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let removed = tree_ops::delete_card(board.project_mut(), id)?;
    board.save()?;
    recovery::log_deleted_cards(&board.ws.board_dir, &removed);
    Ok(removed.into_iter().map(|c| c.id).collect())
}

fn cmd_mv(ctx: &Ctx, action: MvAction) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    // Positions are 1-based on the command line; 0 can never move.
    let moved = match action {
        MvAction::Scene(args) => {
            let dir = parse_direction(&args.direction)?;
            args.position
                .checked_sub(1)
                .is_some_and(|i| tree_ops::move_scene(board.project_mut(), i, dir))
        }
        MvAction::Chapter(args) => {
            let dir = parse_direction(&args.direction)?;
            let scene = resolve_card(board.project(), &args.scene)?;
            match args.position.checked_sub(1) {
                Some(i) => tree_ops::move_chapter(board.project_mut(), &scene, i, dir)?,
                None => false,
            }
        }
        MvAction::Character(args) => {
            let dir = parse_direction(&args.direction)?;
            args.position
                .checked_sub(1)
                .is_some_and(|i| registry_ops::move_character(board.project_mut(), i, dir))
        }
        MvAction::Location(args) => {
            let dir = parse_direction(&args.direction)?;
            args.position
                .checked_sub(1)
                .is_some_and(|i| registry_ops::move_location(board.project_mut(), i, dir))
        }
        MvAction::Loop(args) => {
            let dir = parse_direction(&args.direction)?;
            args.position
                .checked_sub(1)
                .is_some_and(|i| registry_ops::move_loop(board.project_mut(), i, dir))
        }
    };
    if moved {
        board.save()?;
    }
    report_changed(ctx, moved, "moved", "already at the edge; nothing moved")
}

fn cmd_reassign(ctx: &Ctx, args: ReassignArgs) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let project = board.project();
    let chapter = resolve_card(project, &args.chapter)?;
    let from = resolve_card(project, &args.from)?;
    let to = resolve_card(project, &args.to)?;
    let moved = tree_ops::reassign_chapter(board.project_mut(), &chapter, &from, &to)?;
    if moved {
        board.save()?;
    }
    report_changed(ctx, moved, &format!("moved {} to {}", chapter, to), "already there")
}

// ---------------------------------------------------------------------------
// Claim handlers
// ---------------------------------------------------------------------------

fn report_claim(ctx: &Ctx, card: String, changed: bool, revoked: Vec<String>) -> CmdResult {
    if ctx.json {
        return print_json(&ClaimJson {
            card,
            changed,
            revoked,
        });
    }
    if !changed {
        println!("no change");
    } else if revoked.is_empty() {
        println!("ok");
    } else {
        println!("ok (taken from {})", revoked.join(", "));
    }
    Ok(())
}

fn cmd_beat(ctx: &Ctx, action: BeatAction) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    let policy = board.ws.config.claims.beats;
    match action {
        BeatAction::Assign(args) => {
            let card = resolve_card(board.project(), &args.card)?;
            let beat = parse_beat(&args.beat)?;
            let already = board
                .project()
                .card(&card)
                .is_some_and(|c| c.claims_beat(beat));
            let revoked = claim_ops::assign_beat(board.project_mut(), &card, beat, policy)?;
            if !already {
                board.save()?;
            }
            report_claim(ctx, card, !already, revoked)
        }
        BeatAction::Unassign(args) => {
            let card = resolve_card(board.project(), &args.card)?;
            let beat = parse_beat(&args.beat)?;
            let changed = claim_ops::unassign_beat(board.project_mut(), &card, beat)?;
            if changed {
                board.save()?;
            }
            report_claim(ctx, card, changed, Vec::new())
        }
    }
}

fn cmd_loop(ctx: &Ctx, action: LoopAction) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    match action {
        LoopAction::New(args) => {
            let mut ids = board.ids();
            let id = registry_ops::add_loop(board.project_mut(), ids.as_mut(), args.title);
            if let Some(description) = args.description {
                registry_ops::update_loop(board.project_mut(), &id, |l| {
                    l.description = description
                })?;
            }
            board.save()?;
            report_created(ctx, &id)
        }
        LoopAction::Edit(args) => {
            let id = resolve_loop(board.project(), &args.id)?;
            if args.title.is_none() && args.description.is_none() {
                return Err("nothing to change; pass --title or --description".into());
            }
            registry_ops::update_loop(board.project_mut(), &id, |l| {
                if let Some(title) = args.title {
                    l.title = title;
                }
                if let Some(description) = args.description {
                    l.description = description;
                }
            })?;
            board.save()?;
            report_changed(ctx, true, &format!("updated {}", id), "")
        }
        LoopAction::Rm(args) => {
            let id = resolve_loop(board.project(), &args.id)?;
            let swept = registry_ops::delete_loop(board.project_mut(), &id)?;
            board.save()?;
            report_changed(
                ctx,
                true,
                &format!("deleted {} ({} claim(s) removed)", id, swept),
                "",
            )
        }
        LoopAction::Claim(args) => {
            let card = resolve_card(board.project(), &args.card)?;
            let loop_id = resolve_loop(board.project(), &args.loop_id)?;
            let part = parse_part(&args.part)?;
            let already = board
                .project()
                .card(&card)
                .is_some_and(|c| c.claims_loop_part(&loop_id, part));
            let policy = board.ws.config.claims.loops;
            let revoked =
                claim_ops::assign_loop_part(board.project_mut(), &card, &loop_id, part, policy)?;
            if !already {
                board.save()?;
            }
            report_claim(ctx, card, !already, revoked)
        }
        LoopAction::Unclaim(args) => {
            let card = resolve_card(board.project(), &args.card)?;
            // The loop may already be gone; fall back to the literal id.
            let loop_id = resolve_loop(board.project(), &args.loop_id).unwrap_or(args.loop_id);
            let part = parse_part(&args.part)?;
            let changed =
                claim_ops::unassign_loop_part(board.project_mut(), &card, &loop_id, part)?;
            if changed {
                board.save()?;
            }
            report_claim(ctx, card, changed, Vec::new())
        }
    }
}

// ---------------------------------------------------------------------------
// Registry handlers
// ---------------------------------------------------------------------------

fn cmd_character(ctx: &Ctx, action: CharacterAction) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    match action {
        CharacterAction::New(args) => {
            let mut ids = board.ids();
            let id = registry_ops::add_character(board.project_mut(), ids.as_mut(), args.name);
            registry_ops::update_character(board.project_mut(), &id, |c| {
                c.role = args.role.unwrap_or_default();
                c.description = args.description.unwrap_or_default();
            })?;
            board.save()?;
            report_created(ctx, &id)
        }
        CharacterAction::Edit(args) => {
            let id = resolve_character(board.project(), &args.id)?;
            registry_ops::update_character(board.project_mut(), &id, |c| {
                if let Some(name) = args.name {
                    c.name = name;
                }
                if let Some(role) = args.role {
                    c.role = role;
                }
                if let Some(description) = args.description {
                    c.description = description;
                }
            })?;
            board.save()?;
            report_changed(ctx, true, &format!("updated {}", id), "")
        }
        CharacterAction::Rm(args) => {
            let id = resolve_character(board.project(), &args.id)?;
            let removed = registry_ops::delete_character(board.project_mut(), &id)?;
            board.save()?;
            report_changed(ctx, true, &format!("deleted {}", removed.name), "")
        }
    }
}

fn cmd_location(ctx: &Ctx, action: LocationAction) -> CmdResult {
    let mut board = open_board_for_write(ctx)?;
    match action {
        LocationAction::New(args) => {
            let mut ids = board.ids();
            let id = registry_ops::add_location(board.project_mut(), ids.as_mut(), args.name);
            if let Some(description) = args.description {
                registry_ops::update_location(board.project_mut(), &id, |l| {
                    l.description = description
                })?;
            }
            board.save()?;
            report_created(ctx, &id)
        }
        LocationAction::Edit(args) => {
            let id = resolve_location(board.project(), &args.id)?;
            registry_ops::update_location(board.project_mut(), &id, |l| {
                if let Some(name) = args.name {
                    l.name = name;
                }
                if let Some(description) = args.description {
                    l.description = description;
                }
            })?;
            board.save()?;
            report_changed(ctx, true, &format!("updated {}", id), "")
        }
        LocationAction::Rm(args) => {
            let id = resolve_location(board.project(), &args.id)?;
            let removed = registry_ops::delete_location(board.project_mut(), &id)?;
            board.save()?;
            report_changed(ctx, true, &format!("deleted {}", removed.name), "")
        }
    }
}

// ---------------------------------------------------------------------------
// Config / recovery
// ---------------------------------------------------------------------------

fn cmd_config(ctx: &Ctx, action: ConfigAction) -> CmdResult {
    match action {
        ConfigAction::Show => {
            let ws = open_workspace(ctx)?;
            if ctx.json {
                print_json(&ws.config)
            } else {
                print!("{}", toml::to_string_pretty(&ws.config)?);
                Ok(())
            }
        }
        ConfigAction::Set(args) => {
            let mut board = open_board_for_write(ctx)?;
            let (_, mut doc) = config_io::read_config(&board.ws.board_dir)?;
            config_io::set_config_value(&mut doc, &args.key, &args.value)?;
            // Refuse to write a document the next command could not load.
            let _: ProjectConfig = toml::from_str(&doc.to_string())?;
            config_io::write_config(&board.ws.board_dir, &doc)?;
            if args.key == "project.title" {
                board.project_mut().title = args.value.clone();
                board.save()?;
            }
            report_changed(ctx, true, &format!("{} = {}", args.key, args.value), "")
        }
    }
}

fn cmd_recovery(ctx: &Ctx, cmd: RecoveryCmd) -> CmdResult {
    let ws = open_workspace(ctx)?;
    match cmd.action {
        None => {
            let limit = Some(cmd.limit.unwrap_or(10));
            let entries = recovery::read_recovery_entries(&ws.board_dir, limit);
            if ctx.json {
                let items: Vec<_> = entries.iter().map(|e| e.to_json()).collect();
                return print_json(&items);
            }
            if entries.is_empty() {
                println!("recovery log is empty");
            }
            for entry in entries {
                print!("{}", entry.to_markdown());
            }
            Ok(())
        }
        Some(RecoveryAction::Path) => {
            println!("{}", recovery::recovery_log_path(&ws.board_dir).display());
            Ok(())
        }
        Some(RecoveryAction::Prune(args)) => {
            let before = match args.before {
                Some(ts) => Some(
                    chrono::DateTime::parse_from_rfc3339(&ts)
                        .map_err(|e| format!("invalid --before timestamp '{}': {}", ts, e))?
                        .with_timezone(&chrono::Utc),
                ),
                None => None,
            };
            let removed = recovery::prune_recovery(&ws.board_dir, before, args.all)?;
            if ctx.json {
                return print_json(&serde_json::json!({ "removed": removed }));
            }
            println!("pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_exact_and_prefix() {
        let cards = ids(&["c-1", "c-12", "c-2"]);
        assert_eq!(resolve_id(cards.iter(), "c-1", "card").unwrap(), "c-1");
        assert_eq!(resolve_id(cards.iter(), "c-2", "card").unwrap(), "c-2");
        assert_eq!(resolve_id(cards.iter(), "c-12", "card").unwrap(), "c-12");
    }

    fn temp_board(tmp: &std::path::Path) -> Board {
        let ws = project_io::create_board(tmp, "[project]\ntitle = \"t\"\n").unwrap();
        let mut project = Project::new("t");
        let mut ids = crate::model::ids::SequentialIds::new("c");
        let scene = tree_ops::add_scene(&mut project, &mut ids, "Doomed".into());
        tree_ops::add_child(&mut project, &mut ids, &scene, "x".into()).unwrap();
        Session::create(ws.store(), project).save().unwrap();
        let session = ws.open_session().unwrap();
        Board {
            ws,
            session,
            _lock: None,
        }
    }

    #[test]
    fn test_delete_logs_after_save() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut board = temp_board(tmp.path());
        assert_eq!(delete_and_log(&mut board, "c-1").unwrap(), ids(&["c-1", "c-2"]));
        let entries = recovery::read_recovery_entries(&board.ws.board_dir, None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].category, recovery::RecoveryCategory::Delete);
    }

    #[test]
    fn test_failed_delete_save_logs_no_deletion() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut board = temp_board(tmp.path());
        // A directory in place of the snapshot makes the save fail.
        let story = board.ws.board_dir.join("story.json");
        std::fs::remove_file(&story).unwrap();
        std::fs::create_dir(&story).unwrap();

        assert!(delete_and_log(&mut board, "c-1").is_err());
        let entries = recovery::read_recovery_entries(&board.ws.board_dir, None);
        assert!(
            entries
                .iter()
                .all(|e| e.category != recovery::RecoveryCategory::Delete)
        );
    }

    #[test]
    fn test_resolve_ambiguous_and_missing() {
        let cards = ids(&["3f9a1", "3f2b0", "77aa"]);
        assert_eq!(resolve_id(cards.iter(), "77", "card").unwrap(), "77aa");
        let err = resolve_id(cards.iter(), "3f", "card").unwrap_err();
        assert!(err.contains("ambiguous"));
        assert!(err.contains("3f2b0, 3f9a1"));
        assert!(resolve_id(cards.iter(), "zz", "card").unwrap_err().contains("no card"));
    }
}
