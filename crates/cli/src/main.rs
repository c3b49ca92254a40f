mod settings;

use std::error::Error;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use crossbeam_channel::Receiver;

use annotime_core::annotation::domain::annotation::Annotation;
use annotime_core::annotation::domain::word_editor::{
    EditOutcome, EditResult, Nudge, WordEditor,
};
use annotime_core::shared::time::TimeInMovie;
use annotime_core::sync::catalog::Catalog;
use annotime_core::sync::domain::annotation_store::AnnotationStore;
use annotime_core::sync::domain::notice::{MessageLevel, Notice};
use annotime_core::sync::infrastructure::http_annotation_store::HttpAnnotationStore;
use annotime_core::sync::infrastructure::view_query;
use annotime_core::sync::sync_engine::{
    Dispatch, EngineConfig, SaveRequest, SyncEngine, SyncOutcome,
};

use crate::settings::Settings;

/// Inspect and edit word timing annotations on an annotation server.
#[derive(Parser)]
#[command(name = "annotime")]
struct Cli {
    /// Annotation server root (overrides the saved setting).
    #[arg(long, global = true)]
    api_host: Option<String>,

    /// Keyboard nudge step in seconds (overrides the saved setting).
    #[arg(long, global = true)]
    keyboard_step: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the primary and reference annotations of a segment.
    Show {
        /// Editor query string, e.g. "movie=m&startTime=10&endTime=14&user=u&references=gold&defaultReference=gold".
        #[arg(long)]
        location: String,
    },
    /// Replace the primary annotator's transcript, keeping surviving timings.
    Transcript {
        #[arg(long)]
        location: String,
        /// New transcript words.
        #[arg(required = true)]
        words: Vec<String>,
    },
    /// Move a placed word by one keyboard step.
    Nudge {
        #[arg(long)]
        location: String,
        #[arg(long)]
        index: usize,
        /// start-earlier, start-later, end-earlier, end-later, shift-earlier or shift-later.
        #[arg(long, value_parser = parse_nudge)]
        direction: Nudge,
    },
    /// Remove the timing of a word.
    Clear {
        #[arg(long)]
        location: String,
        #[arg(long)]
        index: usize,
    },
    /// List workers and movies, and the references available for a movie.
    Catalog {
        #[arg(long)]
        movie: Option<String>,
    },
    /// Print the effective settings.
    Config {
        /// Write the effective settings to the config file.
        #[arg(long)]
        save: bool,
    },
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut settings = Settings::load();
    if let Some(host) = cli.api_host {
        settings.api_host = host;
    }
    if let Some(step) = cli.keyboard_step {
        settings.keyboard_step = step;
    }

    match cli.command {
        Command::Show { location } => {
            let session = Session::open(&settings, &location)?;
            session.print();
        }
        Command::Transcript { location, words } => {
            let mut session = Session::open(&settings, &location)?;
            let user = session.user();
            session.engine.update_transcript(&user, words.as_slice());
            session.save()?;
            session.print();
        }
        Command::Nudge {
            location,
            index,
            direction,
        } => {
            let mut session = Session::open(&settings, &location)?;
            let bounds = session.engine.bounds();
            let step = session.engine.config().keyboard_step;
            session.edit(|seq| WordEditor::nudge(seq, index, direction, step, bounds))?;
            session.save()?;
            session.print();
        }
        Command::Clear { location, index } => {
            let mut session = Session::open(&settings, &location)?;
            session.edit(|seq| WordEditor::clear(seq, index))?;
            session.save()?;
            session.print();
        }
        Command::Catalog { movie } => {
            let store = connect(&settings)?;
            let catalog = Catalog::fetch(store.as_ref())?;
            println!("Workers: {}", catalog.workers.join(", "));
            println!("Movies: {}", catalog.movies.join(", "));
            if let Some(movie) = movie {
                let references = catalog.references_for_movie(store.as_ref(), &movie)?;
                println!("References for {movie}: {}", references.join(", "));
            }
        }
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            if save {
                let path = settings.save()?;
                println!("Saved to {}", path.display());
            } else if let Some(path) = Settings::config_path() {
                println!("Config file: {}", path.display());
            }
        }
    }

    Ok(())
}

/// One loaded view, driven synchronously.
struct Session {
    engine: SyncEngine,
    notices: Receiver<Notice>,
    timeout: Duration,
}

impl Session {
    fn open(settings: &Settings, location: &str) -> Result<Self, Box<dyn Error>> {
        let view = view_query::from_query(location)?;
        let config = EngineConfig {
            keyboard_step: TimeInMovie::try_from_secs(settings.keyboard_step)?,
            ..EngineConfig::default()
        };
        let (engine, notices) = SyncEngine::new(connect(settings)?, view, config);
        let mut session = Self {
            engine,
            notices,
            // Leave room for the worker thread beyond the HTTP timeout.
            timeout: settings.request_timeout() + Duration::from_secs(1),
        };
        let dispatch = session.engine.load(false);
        session.finish(dispatch)?;
        Ok(session)
    }

    fn user(&self) -> String {
        self.engine.view().user.clone()
    }

    fn edit<F>(&mut self, edit: F) -> Result<(), Box<dyn Error>>
    where
        F: FnOnce(&[Annotation]) -> EditOutcome,
    {
        let user = self.user();
        let result = self.engine.apply_edit(&user, edit);
        self.report_notices();
        match result {
            EditResult::Committed { .. } => Ok(()),
            EditResult::Rejected(reason) => Err(format!("edit rejected: {reason}").into()),
            EditResult::NoTarget(reason) => Err(reason.to_string().into()),
        }
    }

    fn save(&mut self) -> Result<(), Box<dyn Error>> {
        let dispatch = self.engine.save(SaveRequest::save_only());
        self.finish(dispatch)
    }

    fn finish(&mut self, dispatch: Dispatch) -> Result<(), Box<dyn Error>> {
        let result: Result<(), Box<dyn Error>> = match dispatch {
            Dispatch::Started { .. } => match self.engine.wait(self.timeout) {
                Some(SyncOutcome::Failed { error, .. }) => Err(error.into()),
                Some(_) => Ok(()),
                None => Err("timed out waiting for the annotation server".into()),
            },
            Dispatch::Skipped => Ok(()),
            Dispatch::Busy | Dispatch::Queued => Err("another request is in flight".into()),
        };
        self.report_notices();
        result
    }

    fn report_notices(&self) {
        for notice in self.notices.try_iter() {
            if notice.level != MessageLevel::Closed {
                eprintln!("{notice}");
            }
        }
    }

    fn print(&self) {
        let view = self.engine.view();
        println!("{}", view.segment_key());
        print_sequence(&view.user, self.engine.sequence(&view.user));
        for reference in &view.references {
            print_sequence(reference, self.engine.sequence(reference));
        }
    }
}

fn connect(settings: &Settings) -> Result<Arc<dyn AnnotationStore>, Box<dyn Error>> {
    let store = HttpAnnotationStore::new(&settings.api_host, settings.request_timeout())?;
    Ok(Arc::new(store))
}

fn print_sequence(annotator: &str, sequence: &[Annotation]) {
    println!("\n{annotator} ({} words)", sequence.len());
    for a in sequence {
        match a.interval() {
            Some((start, end)) => println!(
                "  {:>3}  {:<20} {:>9.3} {:>9.3}",
                a.index,
                a.word,
                start.secs(),
                end.secs()
            ),
            None => println!("  {:>3}  {:<20} {:>9} {:>9}", a.index, a.word, "-", "-"),
        }
    }
}

fn parse_nudge(s: &str) -> Result<Nudge, String> {
    Nudge::ALL
        .iter()
        .copied()
        .find(|n| n.to_string() == s)
        .ok_or_else(|| format!("unknown direction '{s}'"))
}
