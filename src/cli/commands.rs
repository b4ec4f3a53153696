use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "bb",
    about = concat!("beatboard v", env!("CARGO_PKG_VERSION"), " - plot a story beat by beat"),
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a board in the current directory
    Init(InitArgs),
    /// Show scenes and their chapters
    Tree,
    /// Show one card in full
    Show(IdArg),
    /// List the 15 beats and which card holds each
    Beats,
    /// List setup/payoff loops and which cards hold each part
    Loops,
    /// List characters
    Characters,
    /// List locations
    Locations,
    /// Validate board integrity
    Check,
    /// Search cards and registries by regex
    Search(SearchArgs),
    /// Print the story as a markdown outline
    Export,
    /// Scene management
    Scene(SceneCmd),
    /// Chapter management
    Chapter(ChapterCmd),
    /// Change a card's fields
    Edit(EditArgs),
    /// Delete a card and everything under it
    Rm(RmArgs),
    /// Move a scene, chapter, or registry entry one step
    Mv(MvCmd),
    /// Move a chapter to another scene
    Reassign(ReassignArgs),
    /// Claim or release a beat
    Beat(BeatCmd),
    /// Setup/payoff loop management
    Loop(LoopCmd),
    /// Character management
    Character(CharacterCmd),
    /// Location management
    Location(LocationCmd),
    /// Change project.toml settings
    Config(ConfigCmd),
    /// View or manage the recovery log
    Recovery(RecoveryCmd),
}

// ---------------------------------------------------------------------------
// Init / read args
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Story title (default: inferred from directory name)
    #[arg(long)]
    pub title: Option<String>,
    /// Use short sequential ids (c-1, c-2, ...) instead of uuids
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Args)]
pub struct IdArg {
    /// Id (or unique id prefix)
    pub id: String,
}

#[derive(Args)]
pub struct SearchArgs {
    /// Regex pattern to search for
    pub pattern: String,
}

// ---------------------------------------------------------------------------
// Cards
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct SceneCmd {
    #[command(subcommand)]
    pub action: SceneAction,
}

#[derive(Subcommand)]
pub enum SceneAction {
    /// Append a scene to the board
    Add(TitleOpt),
}

#[derive(Args)]
pub struct TitleOpt {
    /// Title (default from project.toml)
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args)]
pub struct ChapterCmd {
    #[command(subcommand)]
    pub action: ChapterAction,
}

#[derive(Subcommand)]
pub enum ChapterAction {
    /// Append a chapter to a scene
    Add(ChapterAddArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
pub struct ChapterTarget {
    /// Scene to add the chapter to
    #[arg(long)]
    pub scene: Option<String>,
    /// Add to the same scene as this chapter
    #[arg(long)]
    pub after: Option<String>,
}

#[derive(Args)]
pub struct ChapterAddArgs {
    #[command(flatten)]
    pub target: ChapterTarget,
    /// Title (default from project.toml)
    #[arg(long)]
    pub title: Option<String>,
}

#[derive(Args)]
pub struct EditArgs {
    /// Card id
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    /// Draft text ("" clears it)
    #[arg(long)]
    pub draft: Option<String>,
    /// positive, negative, or none
    #[arg(long)]
    pub polarity: Option<String>,
    /// The two characters in conflict
    #[arg(long, num_args = 2, value_names = ["A", "B"])]
    pub conflict: Option<Vec<String>>,
    /// Remove both conflict subjects
    #[arg(long, conflicts_with = "conflict")]
    pub clear_conflict: bool,
    /// Location id, or "none"
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Args)]
pub struct RmArgs {
    /// Card id
    pub id: String,
    /// Confirm the deletion
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct MvCmd {
    #[command(subcommand)]
    pub action: MvAction,
}

#[derive(Subcommand)]
pub enum MvAction {
    /// Move a scene (1-based position on the board)
    Scene(MvIndexArgs),
    /// Move a chapter within its scene
    Chapter(MvChapterArgs),
    /// Move a character in the cast list
    Character(MvIndexArgs),
    /// Move a location in the location list
    Location(MvIndexArgs),
    /// Move a loop in the loop list
    Loop(MvIndexArgs),
}

#[derive(Args)]
pub struct MvIndexArgs {
    /// 1-based position
    pub position: usize,
    /// up or down
    pub direction: String,
}

#[derive(Args)]
pub struct MvChapterArgs {
    /// Scene id
    pub scene: String,
    /// 1-based position within the scene
    pub position: usize,
    /// up or down
    pub direction: String,
}

#[derive(Args)]
pub struct ReassignArgs {
    /// Chapter id
    pub chapter: String,
    /// Current scene
    #[arg(long)]
    pub from: String,
    /// New scene
    #[arg(long)]
    pub to: String,
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct BeatCmd {
    #[command(subcommand)]
    pub action: BeatAction,
}

#[derive(Subcommand)]
pub enum BeatAction {
    /// Claim a beat for a card
    Assign(BeatArgs),
    /// Release a card's claim on a beat
    Unassign(BeatArgs),
}

#[derive(Args)]
pub struct BeatArgs {
    /// Card id
    pub card: String,
    /// Beat key, label, or number (e.g. catalyst, "All Is Lost", 4)
    pub beat: String,
}

#[derive(Args)]
pub struct LoopCmd {
    #[command(subcommand)]
    pub action: LoopAction,
}

#[derive(Subcommand)]
pub enum LoopAction {
    /// Create a loop
    New(LoopNewArgs),
    /// Change a loop's title or description
    Edit(LoopEditArgs),
    /// Delete a loop and every claim on it
    Rm(IdArg),
    /// Claim a loop part for a card
    Claim(LoopPartArgs),
    /// Release a card's claim on a loop part
    Unclaim(LoopPartArgs),
}

#[derive(Args)]
pub struct LoopNewArgs {
    pub title: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LoopEditArgs {
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LoopPartArgs {
    /// Card id
    pub card: String,
    /// Loop id
    #[arg(value_name = "LOOP")]
    pub loop_id: String,
    /// setup, bump, or payoff
    pub part: String,
}

// ---------------------------------------------------------------------------
// Registries
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CharacterCmd {
    #[command(subcommand)]
    pub action: CharacterAction,
}

#[derive(Subcommand)]
pub enum CharacterAction {
    /// Add a character
    New(CharacterArgs),
    /// Change a character
    Edit(CharacterEditArgs),
    /// Delete a character (cards keep their references)
    Rm(IdArg),
}

#[derive(Args)]
pub struct CharacterArgs {
    pub name: String,
    #[arg(long)]
    pub role: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct CharacterEditArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub role: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LocationCmd {
    #[command(subcommand)]
    pub action: LocationAction,
}

#[derive(Subcommand)]
pub enum LocationAction {
    /// Add a location
    New(LocationArgs),
    /// Change a location
    Edit(LocationEditArgs),
    /// Delete a location (cards keep their references)
    Rm(IdArg),
}

#[derive(Args)]
pub struct LocationArgs {
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Args)]
pub struct LocationEditArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Config / recovery
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Set a value (e.g. claims.beats steal)
    Set(ConfigSetArgs),
    /// Print the effective configuration
    Show,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}

#[derive(Args)]
pub struct RecoveryCmd {
    #[command(subcommand)]
    pub action: Option<RecoveryAction>,
    /// Maximum number of entries to show (default: 10)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Subcommand)]
pub enum RecoveryAction {
    /// Remove old entries
    Prune(RecoveryPruneArgs),
    /// Print the absolute path to the recovery log
    Path,
}

#[derive(Args)]
pub struct RecoveryPruneArgs {
    /// Remove entries older than this timestamp (default: 30 days ago)
    #[arg(long)]
    pub before: Option<String>,
    /// Remove all entries
    #[arg(long)]
    pub all: bool,
}
