use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use mixgraph::collection::{CollectionInfo, CollectionRef};
use mixgraph::db::Database;
use mixgraph::db::models::{NewTrack, NewTransition};
use mixgraph::export::GraphSnapshot;
use mixgraph::graph::TransitionGraph;
use mixgraph::key::HarmonicKey;
use mixgraph::loader;
use mixgraph::model::{HotCue, Transition, TransitionType};
use mixgraph::navigator::{NavState, Navigator};
use mixgraph::repository::TrackRecord;
use mixgraph::session::{self, ChoiceView, Presenter, SessionOptions, TrackView};
use mixgraph::subset::{self, Subgraph};
use std::io::{Read, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mixgraph", version, about = "DJ transition graph")]
struct Cli {
    /// Path to the SQLite database
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Restrict a command to one folder or playlist.
#[derive(clap::Args)]
struct Scope {
    /// Only tracks in this folder
    #[arg(long, conflicts_with = "playlist")]
    folder: Option<i64>,

    /// Only tracks in this playlist
    #[arg(long)]
    playlist: Option<i64>,
}

impl Scope {
    fn collection(&self) -> Option<CollectionRef> {
        self.folder
            .map(CollectionRef::Folder)
            .or(self.playlist.map(CollectionRef::Playlist))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Import tracks from a Rekordbox "Export playlist to .txt" file
    Import {
        file: PathBuf,

        /// Also put every imported track in this folder
        #[arg(long)]
        folder: Option<i64>,

        /// Write the parsed rows to this JSON file
        #[arg(long)]
        json: Option<PathBuf>,

        /// Parse only, don't touch the database
        #[arg(long)]
        dry_run: bool,
    },

    /// List tracks, optionally filtered by title/artist
    Tracks {
        search: Option<String>,

        /// Maximum rows (defaults to config list_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Add a single track
    AddTrack {
        title: String,
        artist: String,
        #[arg(long)]
        bpm: Option<f64>,
        /// Camelot ("8A") or standard ("Am") notation
        #[arg(long)]
        key: Option<String>,
        /// Length in seconds
        #[arg(long)]
        duration: Option<i64>,
        #[arg(long)]
        genre: Option<String>,
    },

    /// Delete a track and every transition touching it
    RemoveTrack { id: i64 },

    /// Record a transition between two tracks (by id or exact title)
    Add {
        from: String,
        to: String,

        /// 1-5
        #[arg(short, long)]
        rating: i64,

        /// blend, echo_out, drop_swap, wordplay or loop
        #[arg(short = 't', long = "type", default_value = "blend")]
        transition_type: String,

        #[arg(long)]
        notes: Option<String>,

        /// Hot cue (A-J) to leave the first track on
        #[arg(long)]
        out_cue: Option<String>,

        /// Hot cue (A-J) to enter the second track on
        #[arg(long)]
        in_cue: Option<String>,
    },

    /// List recorded transitions
    Transitions {
        /// Only transitions leaving this track (id or exact title)
        #[arg(long)]
        from: Option<String>,
    },

    /// Delete a transition
    RemoveTransition { from: String, to: String },

    /// Walk the graph interactively
    Navigate {
        #[command(flatten)]
        scope: Scope,

        /// Title to start from
        #[arg(long)]
        start: Option<String>,
    },

    /// Export the graph as {nodes, edges} JSON
    Graph {
        #[command(flatten)]
        scope: Scope,

        /// Write here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// Manage folders
    Folder {
        #[command(subcommand)]
        command: FolderCommand,
    },

    /// Manage playlists
    Playlist {
        #[command(subcommand)]
        command: PlaylistCommand,
    },

    /// Check key compatibility, or list the keys that mix with one
    Key { key: String, other: Option<String> },

    /// Show library statistics
    Stats,
}

#[derive(Subcommand)]
enum FolderCommand {
    Create {
        name: String,
        #[arg(long)]
        parent: Option<i64>,
    },
    Rename { id: i64, name: String },
    Delete { id: i64 },
    List,
    Show { id: i64 },
    /// Add a track (id or exact title)
    Add { id: i64, track: String },
    /// Remove a track (id or exact title)
    Remove { id: i64, track: String },
}

#[derive(Subcommand)]
enum PlaylistCommand {
    Create { name: String },
    Rename { id: i64, name: String },
    Delete { id: i64 },
    List,
    Show { id: i64 },
    /// Append a track (id or exact title); repeats are allowed
    Add { id: i64, track: String },
    /// Remove the entry at a position
    Remove { id: i64, position: i64 },
    /// Swap the tracks at two positions
    Swap { id: i64, a: i64, b: i64 },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = mixgraph::config::AppConfig::load();

    // Key lookups need no database
    if let Commands::Key { key, other } = &cli.command {
        return key_command(key, other.as_deref());
    }

    // Resolve database path: CLI > config > XDG default
    let db_path = cli.db_path
        .or(config.db_path.clone())
        .unwrap_or_else(mixgraph::config::default_db_path);
    log::info!("Database: {}", db_path.display());

    let db = Database::open(&db_path)
        .context("Failed to open database")?;

    match cli.command {
        Commands::Import { file, folder, json, dry_run } => {
            let rows = mixgraph::import::read_export(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            println!("Parsed {} tracks from {}", rows.len(), file.display());

            if let Some(path) = json {
                let text = serde_json::to_string_pretty(&rows)?;
                std::fs::write(&path, text)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Wrote parsed rows to {}", path.display());
            }
            if dry_run {
                return Ok(());
            }

            let tracks: Vec<NewTrack> = rows.into_iter().map(NewTrack::from).collect();
            let pb = ProgressBar::new(tracks.len() as u64);
            pb.set_style(
                ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                    .progress_chars("=> "),
            );
            pb.set_message("Importing...");

            let result = db.import_tracks(&tracks, folder, &pb)
                .context("Import failed")?;
            pb.finish_with_message("Done");

            println!(
                "Import complete: {} in file, {} new, {} already present, {} invalid",
                result.total_in_file, result.inserted, result.existing, result.invalid
            );
            if let Some(id) = folder {
                println!("Added {} tracks to folder {}", result.added_to_folder, id);
            }
        }

        Commands::Tracks { search, limit } => {
            let limit = limit.unwrap_or(config.list_limit);
            let tracks = db.search_tracks(search.as_deref(), limit)
                .context("Failed to list tracks")?;
            if tracks.is_empty() {
                println!("No tracks found.");
            } else {
                print_track_table(&tracks);
            }
        }

        Commands::AddTrack { title, artist, bpm, key, duration, genre } => {
            let key = key
                .map(|k| k.parse::<HarmonicKey>().map(|h| h.to_string()))
                .transpose()?;
            let track = NewTrack {
                title,
                artist,
                bpm,
                key,
                duration_seconds: duration,
                genre,
                location: None,
            };
            if let Err(reason) = track.validate() {
                bail!("Invalid track: {reason}");
            }
            if let Some(id) = db.find_track_by_identity(&track.title, &track.artist)? {
                bail!("\"{}\" by {} already exists (id {})", track.title, track.artist, id);
            }
            let id = db.insert_track(&track).context("Failed to add track")?;
            println!("Added track {}: {} - {}", id, track.title, track.artist);
        }

        Commands::RemoveTrack { id } => {
            let track = db.get_track(id)?;
            db.delete_track(id).context("Failed to remove track")?;
            println!("Removed track {}: {} - {}", id, track.title, track.artist);
        }

        Commands::Add { from, to, rating, transition_type, notes, out_cue, in_cue } => {
            let from = resolve_track(&db, &from)?;
            let to = resolve_track(&db, &to)?;
            let transition_type: TransitionType = transition_type.parse()?;
            let out_cue = out_cue.map(|c| c.parse::<HotCue>()).transpose()?;
            let in_cue = in_cue.map(|c| c.parse::<HotCue>()).transpose()?;

            let mut transition = Transition::new(from.id, to.id, rating, transition_type)?
                .with_cues(out_cue, in_cue);
            if let Some(notes) = notes {
                transition = transition.with_notes(notes);
            }

            db.insert_transition(&NewTransition::from(&transition))
                .context("Failed to add transition")?;
            println!(
                "{} -> {}  {} {}",
                from.title, to.title, transition.transition_type(), transition.stars()
            );
        }

        Commands::Transitions { from } => {
            let from = from.map(|f| resolve_track(&db, &f)).transpose()?;
            let rows = db.list_transition_listings(from.map(|t| t.id))
                .context("Failed to list transitions")?;
            if rows.is_empty() {
                println!("No transitions recorded.");
            } else {
                println!(
                    "{:>5}  {:<30} {:<30} {:<10} {:<6} Notes",
                    "ID", "From", "To", "Type", "Rating"
                );
                println!("{}", "-".repeat(95));
                for r in &rows {
                    println!(
                        "{:>5}  {:<30} {:<30} {:<10} {:<6} {}",
                        r.id,
                        truncate(&r.from_title, 30),
                        truncate(&r.to_title, 30),
                        r.transition_type,
                        "★".repeat(r.rating.clamp(0, 5) as usize),
                        r.notes.as_deref().unwrap_or(""),
                    );
                }
            }
        }

        Commands::RemoveTransition { from, to } => {
            let from = resolve_track(&db, &from)?;
            let to = resolve_track(&db, &to)?;
            if db.delete_transition(from.id, to.id)? {
                println!("Removed {} -> {}", from.title, to.title);
            } else {
                println!("No transition from {} to {}", from.title, to.title);
            }
        }

        Commands::Navigate { scope, start } => {
            let loaded = loader::load_graph(&db).context("Failed to load graph")?;
            let graph = match scope.collection() {
                Some(c) => subset::collection_subgraph(&db, &loaded.graph, c)
                    .with_context(|| format!("Failed to load {c}"))?
                    .to_graph(),
                None => loaded.graph,
            };
            if graph.track_count() == 0 {
                bail!("No tracks to navigate. Import some first.");
            }
            println!(
                "{} tracks, {} transitions. Type a title to start.",
                graph.track_count(),
                graph.transition_count()
            );

            let mut nav = Navigator::new(&graph);
            let mut presenter = ConsolePresenter;
            let options = SessionOptions { show_key_match: config.navigator.show_key_match };
            let preset = start.map(|s| format!("{s}\n")).unwrap_or_default();
            let input = std::io::Cursor::new(preset).chain(std::io::stdin().lock());
            session::run(&mut nav, input, &mut presenter, options)
                .context("Failed to read input")?;

            let history = nav.history_titles();
            if !history.is_empty() {
                println!();
                println!("Set: {}", history.join(" -> "));
            }
        }

        Commands::Graph { scope, output, compact } => {
            let loaded = loader::load_graph(&db).context("Failed to load graph")?;
            let snapshot = match scope.collection() {
                Some(c) => {
                    let sub: Subgraph = subset::collection_subgraph(&db, &loaded.graph, c)
                        .with_context(|| format!("Failed to load {c}"))?;
                    GraphSnapshot::from_subgraph(&sub)
                }
                None => GraphSnapshot::from_graph(&loaded.graph),
            };
            let json = snapshot.to_json(config.export.pretty && !compact)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Wrote {} nodes and {} edges to {}",
                        snapshot.nodes.len(),
                        snapshot.edges.len(),
                        path.display()
                    );
                }
                None => println!("{json}"),
            }
        }

        Commands::Folder { command } => folder_command(&db, command)?,

        Commands::Playlist { command } => playlist_command(&db, command)?,

        Commands::Key { .. } => unreachable!("key is handled before the database is opened"),

        Commands::Stats => {
            let stats = db.stats().context("Failed to get stats")?;
            let loaded = loader::load_graph(&db).context("Failed to load graph")?;
            println!("Library Statistics");
            println!("==================");
            println!("Total tracks:       {}", stats.total_tracks);
            println!("Tracks without key: {}", stats.tracks_without_key);
            println!("Transitions:        {}", stats.total_transitions);
            if let Some(avg) = stats.avg_rating {
                println!("Average rating:     {:.2}", avg);
            }
            println!("Folders:            {}", stats.folders);
            println!("Playlists:          {}", stats.playlists);
            println!();

            if !stats.transition_types.is_empty() {
                println!("Transition types:");
                for (kind, count) in &stats.transition_types {
                    println!("  {:<10} {}", kind, count);
                }
                println!();
            }

            let dead_ends = dead_ends(&loaded.graph);
            if !dead_ends.is_empty() {
                println!("Dead ends (no way out): {}", dead_ends.len());
                for title in dead_ends.iter().take(10) {
                    println!("  {}", title);
                }
            }
        }
    }

    Ok(())
}

fn key_command(key: &str, other: Option<&str>) -> Result<()> {
    let key: HarmonicKey = key.parse()?;
    match other {
        Some(other) => {
            let other: HarmonicKey = other.parse()?;
            let verdict = if key.is_compatible(&other) { "compatible" } else { "not compatible" };
            println!("{key} -> {other}: {verdict}");
        }
        None => {
            let keys: Vec<String> = key.compatible_keys().iter().map(|k| k.to_string()).collect();
            println!("{key} mixes with: {}", keys.join(", "));
        }
    }
    Ok(())
}

fn folder_command(db: &Database, command: FolderCommand) -> Result<()> {
    match command {
        FolderCommand::Create { name, parent } => {
            let id = db.create_folder(&name, parent).context("Failed to create folder")?;
            println!("Created folder {id}: {name}");
        }
        FolderCommand::Rename { id, name } => {
            db.rename_collection(CollectionRef::Folder(id), &name)?;
            println!("Renamed folder {id} to {name}");
        }
        FolderCommand::Delete { id } => {
            db.delete_collection(CollectionRef::Folder(id))?;
            println!("Deleted folder {id}");
        }
        FolderCommand::List => print_collections(&db.list_folders()?),
        FolderCommand::Show { id } => show_collection(db, CollectionRef::Folder(id))?,
        FolderCommand::Add { id, track } => {
            let track = resolve_track(db, &track)?;
            db.add_to_collection(CollectionRef::Folder(id), track.id)?;
            println!("Added {} to folder {id}", track.title);
        }
        FolderCommand::Remove { id, track } => {
            let track = resolve_track(db, &track)?;
            db.remove_from_folder(id, track.id)?;
            println!("Removed {} from folder {id}", track.title);
        }
    }
    Ok(())
}

fn playlist_command(db: &Database, command: PlaylistCommand) -> Result<()> {
    match command {
        PlaylistCommand::Create { name } => {
            let id = db.create_playlist(&name).context("Failed to create playlist")?;
            println!("Created playlist {id}: {name}");
        }
        PlaylistCommand::Rename { id, name } => {
            db.rename_collection(CollectionRef::Playlist(id), &name)?;
            println!("Renamed playlist {id} to {name}");
        }
        PlaylistCommand::Delete { id } => {
            db.delete_collection(CollectionRef::Playlist(id))?;
            println!("Deleted playlist {id}");
        }
        PlaylistCommand::List => print_collections(&db.list_playlists()?),
        PlaylistCommand::Show { id } => show_collection(db, CollectionRef::Playlist(id))?,
        PlaylistCommand::Add { id, track } => {
            let track = resolve_track(db, &track)?;
            let position = db.add_to_collection(CollectionRef::Playlist(id), track.id)?;
            println!("Added {} to playlist {id} at position {position}", track.title);
        }
        PlaylistCommand::Remove { id, position } => {
            let track_id = db.remove_from_playlist(id, position)?;
            println!("Removed track {track_id} from position {position}");
        }
        PlaylistCommand::Swap { id, a, b } => {
            db.swap_playlist_positions(id, a, b)?;
            println!("Swapped positions {a} and {b}");
        }
    }
    Ok(())
}

/// Find a track by id, falling back to an exact title match.
fn resolve_track(db: &Database, reference: &str) -> Result<TrackRecord> {
    if let Ok(id) = reference.trim().parse::<i64>() {
        if let Ok(track) = db.get_track(id) {
            return Ok(track);
        }
    }
    let mut matches = db.tracks_titled(reference)?;
    if matches.len() > 1 {
        log::warn!(
            "{} tracks titled \"{}\"; using id {} by {}",
            matches.len(), reference, matches[0].id, matches[0].artist
        );
    }
    if matches.is_empty() {
        bail!("No track with id or title \"{reference}\"");
    }
    Ok(matches.swap_remove(0))
}

fn show_collection(db: &Database, c: CollectionRef) -> Result<()> {
    let collection = db.load_collection(c)?;
    if collection.is_empty() {
        println!("{c} is empty.");
        return Ok(());
    }
    println!("{:>4}  {:>5}  {:<35} {:<25}", "Pos", "ID", "Title", "Artist");
    println!("{}", "-".repeat(72));
    for entry in collection.entries() {
        let track = db.get_track(entry.track_id)?;
        println!(
            "{:>4}  {:>5}  {:<35} {:<25}",
            entry.position,
            track.id,
            truncate(&track.title, 35),
            truncate(&track.artist, 25)
        );
    }
    Ok(())
}

fn print_collections(items: &[CollectionInfo]) {
    if items.is_empty() {
        println!("None yet.");
        return;
    }
    println!("{:>5}  {:<30} {:>7}  {:>6}  {}", "ID", "Name", "Tracks", "Parent", "Created");
    println!("{}", "-".repeat(72));
    for c in items {
        println!(
            "{:>5}  {:<30} {:>7}  {:>6}  {}",
            c.collection.id(),
            truncate(&c.name, 30),
            c.track_count,
            c.parent_id.map(|p| p.to_string()).unwrap_or_default(),
            c.created_at.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default()
        );
    }
}

fn print_track_table(tracks: &[TrackRecord]) {
    println!(
        "{:>5}  {:<35} {:<25} {:>6} {:>4} {:>6}",
        "ID", "Title", "Artist", "BPM", "Key", "Time"
    );
    println!("{}", "-".repeat(88));
    for t in tracks {
        println!(
            "{:>5}  {:<35} {:<25} {:>6} {:>4} {:>6}",
            t.id,
            truncate(&t.title, 35),
            truncate(&t.artist, 25),
            t.bpm.map(|b| format!("{b:.1}")).unwrap_or_default(),
            t.key.as_deref().unwrap_or(""),
            t.duration_seconds
                .map(|d| format!("{}:{:02}", d / 60, d % 60))
                .unwrap_or_default(),
        );
    }
}

/// Titles of tracks with no outgoing transition, in insertion order.
fn dead_ends(graph: &TransitionGraph) -> Vec<&str> {
    graph
        .all_tracks()
        .into_iter()
        .filter(|t| graph.outgoing_transitions(t.id()).is_ok_and(|out| out.is_empty()))
        .map(|t| t.title())
        .collect()
}

/// Truncate long strings for table columns.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        s.to_string()
    }
}

/// Prints navigation to the terminal.
struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn prompt(&mut self, state: NavState) {
        match state {
            NavState::AwaitingStart => print!("start> "),
            NavState::Positioned => print!("[number | title | =title | h | q]> "),
            NavState::Ended => return,
        }
        std::io::stdout().flush().ok();
    }

    fn current(&mut self, track: &TrackView) {
        let mut details = Vec::new();
        if let Some(bpm) = track.bpm {
            details.push(format!("{bpm:.1} BPM"));
        }
        if let Some(key) = &track.key {
            details.push(key.clone());
        }
        println!();
        if details.is_empty() {
            println!("Now playing: {} - {}", track.title, track.artist);
        } else {
            println!("Now playing: {} - {} [{}]", track.title, track.artist, details.join(", "));
        }
    }

    fn choices(&mut self, choices: &[ChoiceView]) {
        if choices.is_empty() {
            println!("  No transitions out of this track. Type a title to jump.");
            return;
        }
        for c in choices {
            let key_flag = match c.key_match {
                Some(true) => " ✓key",
                Some(false) => " ✗key",
                None => "",
            };
            println!(
                "  {:>2}. {:<30} {:<20} {:<10} {:<5}{}",
                c.position,
                truncate(&c.title, 30),
                truncate(&c.artist, 20),
                c.transition_type,
                c.stars,
                key_flag
            );
            if let Some(notes) = &c.notes {
                println!("      {notes}");
            }
        }
    }

    fn history(&mut self, titles: &[String]) {
        if titles.is_empty() {
            println!("  (nothing played yet)");
        } else {
            for (i, title) in titles.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, title);
            }
        }
    }

    fn notice(&mut self, message: &str) {
        println!("  {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_key_command_runs_without_database() {
        let cli = Cli::try_parse_from(["mixgraph", "key", "8A", "9A"]).unwrap();
        let Commands::Key { key, other } = cli.command else {
            panic!("expected the key command");
        };
        key_command(&key, other.as_deref()).unwrap();
        assert!(key_command("13Z", None).is_err());
    }
}
