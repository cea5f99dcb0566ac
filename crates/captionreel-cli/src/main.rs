//! CaptionReel CLI
//!
//! Headless front end over the composition engine: create projects,
//! import or generate captions, export subtitles and dump composite frames
//! as JSON. Logs go to stderr so stdout stays machine readable.

use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use captionreel_lib::core::{
    captions::{self, CaptionPatch, StyleScope, SubtitleFormat},
    fs::{atomic_write_text, validate_output_path},
    generation::{DemoCaptionGenerator, GenerationOutcome},
    project::ProjectDocument,
    session::{EditSession, ValidationWarning},
    settings::{EditorSettings, SettingsManager},
    timecode::{format_clock, parse_timestamp},
    timeline::{build, BRollPatch, PlaybackCursor, RectPreset, TransitionKind},
    MediaRef, TimeSec, VideoRef,
};
use captionreel_lib::{CoreError, Workspace};

/// CaptionReel command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an empty project for a video
    New {
        /// Video location (path or URL)
        source: String,
        /// Video duration in seconds
        #[arg(long, value_parser = parse_time)]
        duration: TimeSec,
        /// Project name (defaults to the video file name)
        #[arg(long)]
        name: Option<String>,
        /// Project file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace a project's captions with an SRT or VTT file
    Import {
        project: PathBuf,
        subtitles: PathBuf,
        /// Subtitle format (inferred from the file extension otherwise)
        #[arg(long)]
        format: Option<SubtitleFormat>,
    },

    /// Generate captions for a project
    Generate {
        project: PathBuf,
        /// Use the built-in sample transcript
        #[arg(long)]
        demo: bool,
        /// Simulated transcription latency in milliseconds
        #[arg(long, default_value_t = 0)]
        delay_ms: u64,
    },

    /// Add a caption with the default style and animation
    AddCaption {
        project: PathBuf,
        #[arg(long, value_parser = parse_time)]
        start: TimeSec,
        #[arg(long, value_parser = parse_time)]
        end: TimeSec,
        #[arg(long)]
        text: String,
    },

    /// Change a caption's text or timing
    EditCaption {
        project: PathBuf,
        id: String,
        #[arg(long)]
        text: Option<String>,
        #[arg(long, value_parser = parse_time)]
        start: Option<TimeSec>,
        #[arg(long, value_parser = parse_time)]
        end: Option<TimeSec>,
    },

    /// Copy one caption's style and animation onto every caption
    ApplyStyle {
        project: PathBuf,
        /// Caption whose style is copied
        source: String,
        /// style, animation or all
        #[arg(long, default_value = "all", value_parser = parse_name::<StyleScope>)]
        scope: StyleScope,
    },

    /// Place B-roll media at a playhead position
    AddBroll {
        project: PathBuf,
        /// Media location (path or URL)
        media: String,
        /// Playhead position
        #[arg(long, value_parser = parse_time)]
        at: TimeSec,
        /// Media duration in seconds
        #[arg(long, value_parser = parse_time)]
        length: TimeSec,
        /// top-left, top-right, bottom-left, bottom-right, center or full-screen
        #[arg(long, value_parser = parse_name::<RectPreset>)]
        preset: Option<RectPreset>,
    },

    /// Add a transition with its kind's default duration
    AddTransition {
        project: PathBuf,
        #[arg(long, value_parser = parse_time)]
        at: TimeSec,
        /// cut, fade, slide, zoom, wipe or dissolve (settings default otherwise)
        #[arg(long, value_parser = parse_name::<TransitionKind>)]
        kind: Option<TransitionKind>,
    },

    /// Move a B-roll clip in the draw stack (0 is the bottom)
    ReorderBroll {
        project: PathBuf,
        id: String,
        index: usize,
    },

    /// Remove a caption, B-roll clip or transition by id
    Remove { project: PathBuf, id: String },

    /// Export captions as subtitle text
    Export {
        project: PathBuf,
        /// Subtitle format (settings default otherwise)
        #[arg(long)]
        format: Option<SubtitleFormat>,
        /// Output file (stdout otherwise)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Print the composite frame at one instant as JSON
    Frame {
        project: PathBuf,
        /// Playback time (seconds or HH:MM:SS.mmm)
        #[arg(long, value_parser = parse_time)]
        time: TimeSec,
        /// Caption active on the previous tick
        #[arg(long)]
        previous: Option<String>,
    },

    /// Print one composite frame per tick over the whole video as JSON lines
    Frames {
        project: PathBuf,
        /// Ticks per second
        #[arg(long, default_value_t = 30.0)]
        fps: f64,
    },

    /// List overlapping captions and transitions
    Check { project: PathBuf },
}

fn parse_time(text: &str) -> Result<TimeSec, String> {
    parse_timestamp(text)
        .filter(|t| t.is_finite() && *t >= 0.0)
        .ok_or_else(|| format!("invalid time '{text}'"))
}

/// Parses a kebab-case name into a camelCase serde enum
fn parse_name<T: DeserializeOwned>(text: &str) -> Result<T, String> {
    let mut camel = String::with_capacity(text.len());
    let mut upper = false;
    for c in text.trim().chars() {
        match c {
            '-' | '_' => upper = true,
            c if upper => {
                camel.extend(c.to_uppercase());
                upper = false;
            }
            c => camel.push(c),
        }
    }
    serde_json::from_value(serde_json::Value::String(camel))
        .map_err(|_| format!("unknown value '{text}'"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn load_settings(path: Option<&Path>) -> Result<EditorSettings> {
    let manager = match path {
        Some(path) => SettingsManager::at_path(path.to_path_buf()),
        None => SettingsManager::from_default_location()
            .context("Failed to locate the settings directory")?,
    };
    debug!(path = %manager.settings_path().display(), "Loading settings");
    Ok(manager.load())
}

fn open_project(path: &Path, settings: &EditorSettings) -> Result<(ProjectDocument, EditSession)> {
    let doc = ProjectDocument::load(path)
        .with_context(|| format!("Failed to load project {}", path.display()))?;
    let session = doc
        .to_session(settings.clone())
        .with_context(|| format!("Project {} holds invalid entities", path.display()))?;
    Ok((doc, session))
}

fn save_project(path: &Path, doc: &mut ProjectDocument, session: &EditSession) -> Result<()> {
    doc.capture(session);
    doc.save(path)
        .with_context(|| format!("Failed to save project {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport {
    warnings: Vec<ValidationWarning>,
    messages: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::New {
            source,
            duration,
            name,
            output,
        } => {
            let display_name = Path::new(&source)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| source.clone());
            let video = VideoRef::new(&source, duration, &display_name);
            let session = EditSession::open_with_settings(video, settings)
                .map_err(|e| anyhow::anyhow!(e.to_user_message()))
                .context("Cannot create project")?;

            let name = name.unwrap_or(display_name);
            let mut doc = ProjectDocument::from_session(&name, &session);
            save_project(&output, &mut doc, &session)?;
            println!(
                "Created project '{}' ({}) -> {}",
                name,
                format_clock(duration),
                output.display()
            );
        }

        Commands::Import {
            project,
            subtitles,
            format,
        } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let format = match format.or_else(|| SubtitleFormat::from_path(&subtitles)) {
                Some(format) => format,
                None => bail!(
                    "Cannot infer subtitle format of {}; pass --format",
                    subtitles.display()
                ),
            };

            let content = std::fs::read_to_string(&subtitles)
                .with_context(|| format!("Failed to read {}", subtitles.display()))?;
            let segments = captions::parse(&content, format)
                .with_context(|| format!("Failed to parse {}", subtitles.display()))?;
            let (count, skipped) = session.insert_segments(segments)?;

            save_project(&project, &mut doc, &session)?;
            info!(count, skipped, "Subtitles imported");
            println!("Imported {count} captions ({skipped} skipped)");
        }

        Commands::Generate {
            project,
            demo,
            delay_ms,
        } => {
            if !demo {
                bail!("No transcription service is configured; pass --demo");
            }
            let (mut doc, session) = open_project(&project, &settings)?;

            let workspace = Workspace::new(settings);
            workspace.install(session).await;

            let generator = DemoCaptionGenerator::new().with_delay(Duration::from_millis(delay_ms));
            let outcome = workspace
                .generate_captions(&generator)
                .await
                .map_err(|e: CoreError| anyhow::anyhow!(e.to_user_message()))?;

            match outcome {
                GenerationOutcome::Applied { count, skipped } => {
                    workspace
                        .read(|s| save_project(&project, &mut doc, s))
                        .await??;
                    println!("Generated {count} captions ({skipped} skipped)");
                }
                GenerationOutcome::Discarded => return Err(CoreError::StaleGeneration.into()),
            }
        }

        Commands::AddCaption {
            project,
            start,
            end,
            text,
        } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let id = session
                .add_caption_at(start, end, &text)
                .context("Cannot add caption")?;
            save_project(&project, &mut doc, &session)?;
            println!("{id}");
        }

        Commands::EditCaption {
            project,
            id,
            text,
            start,
            end,
        } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let patch = CaptionPatch {
                text,
                start_time: start,
                end_time: end,
                ..Default::default()
            };
            let report = session.update_caption(&id, patch);
            if !report.found {
                bail!("No caption with id {id}");
            }
            save_project(&project, &mut doc, &session)?;
            match report.rejection_message() {
                Some(message) => bail!("Some changes were rejected: {message}"),
                None => println!("Updated {}", report.changed.join(", ")),
            }
        }

        Commands::ApplyStyle {
            project,
            source,
            scope,
        } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            if session.find_caption(&source).is_none() {
                bail!("No caption with id {source}");
            }
            let count = session.apply_to_all(&source, scope);
            save_project(&project, &mut doc, &session)?;
            println!("Applied to {count} captions");
        }

        Commands::AddBroll {
            project,
            media,
            at,
            length,
            preset,
        } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let mut source = MediaRef::new(&media);
            if let Some(name) = Path::new(&media).file_name() {
                source = source.with_name(&name.to_string_lossy());
            }
            let id = session
                .add_broll_at_playhead(source, at, length)
                .context("Cannot add B-roll")?;
            if let Some(preset) = preset {
                let report = session.update_broll(
                    &id,
                    BRollPatch {
                        position: Some(preset.rect()),
                        ..Default::default()
                    },
                );
                debug!(changed = ?report.changed, "B-roll placed");
            }
            save_project(&project, &mut doc, &session)?;
            println!("{id}");
        }

        Commands::AddTransition { project, at, kind } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let id = session
                .add_transition_at(kind, at)
                .context("Cannot add transition")?;
            save_project(&project, &mut doc, &session)?;
            println!("{id}");
        }

        Commands::ReorderBroll { project, id, index } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            if !session.reorder_broll(&id, index)? {
                bail!("No B-roll clip with id {id}");
            }
            save_project(&project, &mut doc, &session)?;
            println!("Moved {id}");
        }

        Commands::Remove { project, id } => {
            let (mut doc, mut session) = open_project(&project, &settings)?;
            let kind = if session.remove_caption(&id).is_some() {
                "caption"
            } else if session.remove_broll(&id).is_some() {
                "B-roll clip"
            } else if session.remove_transition(&id).is_some() {
                "transition"
            } else {
                bail!("Nothing with id {id}");
            };
            save_project(&project, &mut doc, &session)?;
            println!("Removed {kind} {id}");
        }

        Commands::Export {
            project,
            format,
            output,
        } => {
            let (_, session) = open_project(&project, &settings)?;
            let format = format.unwrap_or(settings.export.default_format);
            let text = session.export_subtitles(format);

            match output {
                Some(output) => {
                    let path = validate_output_path(&output, "output")?;
                    atomic_write_text(&path, &text)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Exported {} captions as {} -> {}",
                        session.captions().len(),
                        format.mime_type(),
                        path.display()
                    );
                }
                None => print!("{text}"),
            }
        }

        Commands::Frame {
            project,
            time,
            previous,
        } => {
            let (_, session) = open_project(&project, &settings)?;
            print_json(&session.frame(time, previous.as_deref()))?;
        }

        Commands::Frames { project, fps } => {
            if !fps.is_finite() || fps <= 0.0 {
                bail!("--fps must be a positive number");
            }
            let (_, session) = open_project(&project, &settings)?;
            let duration = session.video_duration();
            let ticks = (duration * fps).floor() as u64;

            let mut cursor = PlaybackCursor::new();
            let stdout = io::stdout();
            let mut out = BufWriter::new(stdout.lock());
            for tick in 0..=ticks {
                let time = (tick as f64 / fps).min(duration);
                let state = cursor.advance(
                    time,
                    session.captions().as_slice(),
                    session.brolls().as_slice(),
                    session.transitions().as_slice(),
                );
                let frame = build(&state, &session.settings().composite);
                serde_json::to_writer(&mut out, &frame)?;
                writeln!(out)?;
            }
            out.flush()?;
            debug!(ticks = ticks + 1, fps, "Frames written");
        }

        Commands::Check { project } => {
            let (_, session) = open_project(&project, &settings)?;
            let warnings = session.overlap_warnings();
            let messages = warnings.iter().map(ToString::to_string).collect();
            print_json(&CheckReport { warnings, messages })?;
        }
    }

    Ok(())
}
