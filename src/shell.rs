//! Terminal front end
//!
//! Reads one command per line from stdin, forwards it to the app controller,
//! and redraws the slide whenever the published snapshot changes what would
//! be on screen.

use crate::app::{Command, ListenTarget, Snapshot};
use crate::content::ContentStore;
use crate::narration::prompts::{
    CONCLUSION_HEADING, CONCLUSION_TEXT, MAIN_DESCRIPTION, MAIN_HEADING,
};
use crate::narration::NarrationPhase;
use crate::navigation::Position;
use anyhow::Context;
use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};

pub const HELP: &str = "\
Commands:
  n | next              next slide
  p | prev              previous slide
  t | title             return to the title
  a | auto              toggle autoplay
  l | listen [phase]    narrate the slide, or sanskrit|meaning|lesson
  x | stop              stop audio and autoplay
  f | fav               toggle favorite for this verse
  g | grid              open the chapter grid
  c | chapter <n>       go to chapter n
  j | jump <verse>      go to a verse id, e.g. 2.47
  s | search <query>    search by verse (e.g. 2.47) or keyword (e.g. duty, soul)
  o | open <n>          open search result n
  esc | close           close overlays
  z | focus             toggle focus mode
  h | help              show this help
  q | quit              exit";

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Command(Command),
    Help,
    Empty,
}

/// Parse one line against the current snapshot
pub fn parse_line(
    line: &str,
    snapshot: &Snapshot,
    content: &ContentStore,
) -> Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_lowercase().as_str() {
        "" => return Ok(Input::Empty),
        "h" | "help" | "?" => return Ok(Input::Help),
        "n" | "next" => Command::Advance,
        "p" | "prev" | "back" => Command::Retreat,
        "t" | "title" => Command::ReturnToTitle,
        "a" | "auto" => Command::ToggleAutoplay,
        "x" | "stop" => Command::StopAudio,
        "f" | "fav" => Command::ToggleFavorite,
        "g" | "grid" => Command::OpenGrid,
        "z" | "focus" => Command::ToggleFocus,
        "esc" | "close" => Command::CloseOverlays,
        "q" | "quit" | "exit" => Command::Shutdown,
        "l" | "listen" => {
            if rest.is_empty() {
                Command::Listen(ListenTarget::Slide)
            } else {
                let phase = NarrationPhase::parse(rest).ok_or_else(|| {
                    format!("Unknown phase '{}' (sanskrit, meaning, lesson)", rest)
                })?;
                Command::Listen(ListenTarget::Phase(phase))
            }
        }
        "c" | "chapter" => {
            let number: usize = rest
                .parse()
                .map_err(|_| format!("Expected a chapter number, got '{}'", rest))?;
            if number == 0 || number > content.chapter_count() {
                return Err(format!(
                    "Chapter {} does not exist (1-{})",
                    number,
                    content.chapter_count()
                ));
            }
            Command::JumpTo {
                chapter: number - 1,
                verse: None,
            }
        }
        "j" | "jump" => {
            let (chapter, verse) = content
                .locate(rest)
                .ok_or_else(|| format!("No verse '{}'", rest))?;
            Command::JumpTo {
                chapter,
                verse: Some(verse),
            }
        }
        "s" | "search" if rest.is_empty() => Command::OpenSearch,
        "s" | "search" => Command::Search(rest.to_string()),
        "o" | "open" => {
            let hit = rest
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|i| snapshot.search_results.get(i))
                .ok_or_else(|| format!("No search result '{}'", rest))?;
            Command::JumpTo {
                chapter: hit.chapter_index,
                verse: Some(hit.verse_index),
            }
        }
        other => return Err(format!("Unknown command '{}' (h for help)", other)),
    };

    Ok(Input::Command(command))
}

/// Text drawn for a snapshot
pub fn render(snapshot: &Snapshot, content: &ContentStore) -> String {
    let mut out = String::new();

    if !snapshot.focus_mode {
        let _ = writeln!(out, "{}", status_line(snapshot));
    }

    match snapshot.position {
        Position::Title => {
            let _ = writeln!(out, "\n  {}\n  {}", MAIN_HEADING, MAIN_DESCRIPTION);
        }
        Position::Overview { chapter } => {
            if let Some(chapter) = content.chapter(chapter) {
                let _ = writeln!(
                    out,
                    "\n  CHAPTER {}: {}\n  {}\n\n  {}",
                    chapter.id, chapter.name, chapter.meaning, chapter.summary
                );
                if !chapter.themes.is_empty() {
                    let _ = writeln!(out, "  Themes: {}", chapter.themes.join(", "));
                }
                if !chapter.featured_verse.is_empty() {
                    let _ = writeln!(out, "  Featured verse: {}", chapter.featured_verse);
                }
            }
        }
        Position::Verse { chapter, verse } => {
            if let Some(verse) = content.verse(chapter, verse) {
                let star = if snapshot.is_favorite { " *" } else { "" };
                let _ = writeln!(
                    out,
                    "\n  VERSE {}{}\n\n  {}\n  {}\n\n  Meaning: {}\n  Lesson: {}",
                    verse.verse,
                    star,
                    verse.sanskrit,
                    verse.transliteration,
                    verse.meaning,
                    verse.lesson
                );
            }
        }
        Position::Conclusion => {
            let _ = writeln!(out, "\n  {}\n  {}", CONCLUSION_HEADING, CONCLUSION_TEXT);
        }
    }

    if snapshot.grid_open {
        let _ = writeln!(out, "\n  Chapters:");
        for chapter in content.chapters() {
            let _ = writeln!(
                out,
                "    {:>2}. {} ({})",
                chapter.id, chapter.name, chapter.meaning
            );
        }
    }

    if snapshot.search_open {
        let _ = writeln!(out, "\n  Search: {}", snapshot.search_query);
        if snapshot.search_query.trim().is_empty() {
            let _ = writeln!(
                out,
                "    Search by verse (e.g. 2.47) or keyword (e.g. duty, soul)..."
            );
        } else if snapshot.search_results.is_empty() {
            let _ = writeln!(out, "    No slokas found for this query...");
        } else {
            for (i, hit) in snapshot.search_results.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "    {:>2}. {} ({})",
                    i + 1,
                    hit.verse_id,
                    hit.chapter_name
                );
            }
        }
    }

    out
}

fn status_line(snapshot: &Snapshot) -> String {
    let mut line = format!(
        "[{}] {} | {}",
        snapshot.progress_label(),
        snapshot.chapter_name,
        snapshot.view.description()
    );

    if snapshot.autoplay.enabled {
        let _ = write!(line, " | autoplay: {}", snapshot.autoplay.phase);
    }
    if let Some(key) = &snapshot.active_key {
        let state = if snapshot.audio_loading { "loading" } else { "playing" };
        let _ = write!(line, " | {} {}", state, key);
    }
    let _ = write!(line, " | favorites: {}", snapshot.favorite_count);
    line
}

fn prompt() {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "> ");
    let _ = stdout.flush();
}

/// Read commands until quit or end of input, drawing every new frame
pub async fn run(
    content: Arc<ContentStore>,
    commands: mpsc::UnboundedSender<Command>,
    mut snapshots: watch::Receiver<Snapshot>,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut last_frame = render(&snapshots.borrow_and_update(), &content);
    println!("{}", last_frame);
    println!("Type h for help.");
    prompt();

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let frame = render(&snapshots.borrow_and_update(), &content);
                if frame != last_frame {
                    println!("\n{}", frame);
                    prompt();
                    last_frame = frame;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read from stdin")? else {
                    let _ = commands.send(Command::Shutdown);
                    break;
                };

                let snapshot = snapshots.borrow().clone();
                match parse_line(&line, &snapshot, &content) {
                    Ok(Input::Command(command)) => {
                        if commands.send(command).is_err() {
                            break;
                        }
                    }
                    Ok(Input::Help) => {
                        println!("{}", HELP);
                        prompt();
                    }
                    Ok(Input::Empty) => prompt(),
                    Err(message) => {
                        println!("{}", message);
                        prompt();
                    }
                }
            }
        }
    }

    Ok(())
}
