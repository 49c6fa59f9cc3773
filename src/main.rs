use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use echo_atlas::demiurge::ExportFormat;
use echo_atlas::initiation::config::{BackendChoice, SystemConfig, DEFAULT_CONFIG_PATH};
use echo_atlas::initiation::EchoAtlas;
use echo_atlas::totems::LocationKey;

#[derive(Parser, Debug)]
#[command(author, version, about = "Culture and etiquette assistant with location-scoped memory")]
struct Args {
    /// Configuration file, created with defaults when missing
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long)]
    tracing: bool,

    /// Run the embedding model on CPU rather than on GPU.
    #[arg(long)]
    cpu: bool,

    /// Use lexical similarity instead of the embedding model
    #[arg(long)]
    lexical: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug, Clone)]
struct LocationArgs {
    /// Country, e.g. "Japan"
    #[arg(long)]
    country: String,

    /// State, province or region
    #[arg(long)]
    state: Option<String>,

    #[arg(long)]
    city: Option<String>,
}

impl LocationArgs {
    fn key(&self) -> LocationKey {
        LocationKey::new(&self.country, self.state.as_ref(), self.city.as_ref())
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask one question about a place
    Ask {
        #[command(flatten)]
        location: LocationArgs,
        question: Vec<String>,
    },
    /// Interactive conversation about a place
    Chat {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// List remembered exchanges of a place
    Memories {
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Remembered exchanges of a place most similar to a text
    Similar {
        #[command(flatten)]
        location: LocationArgs,
        text: Vec<String>,
        #[arg(short, default_value_t = 3)]
        k: usize,
    },
    /// Forget every exchange of a place
    Delete {
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Forget everything
    Reset {
        /// Wipe the store on the next start instead of now
        #[arg(long)]
        on_restart: bool,
    },
    /// Cultural playbook of a place
    Playbook {
        #[command(flatten)]
        location: LocationArgs,
        #[arg(long, value_enum, default_value_t = ExportFormat::Markdown)]
        format: ExportFormat,
        /// Write to a file instead of stdout; the format's extension is added when missing
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Places with memories and store statistics
    Locations,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let _guard = if args.tracing {
        let (chrome_layer, guard) = ChromeLayerBuilder::new().build();
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .with(chrome_layer)
            .init();
        Some(guard)
    } else {
        tracing_subscriber::registry().with(filter).with(fmt_layer).init();
        None
    };

    let mut config = SystemConfig::load_from(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    if args.cpu {
        config.embedding.force_cpu = true;
    }
    if args.lexical {
        config.embedding.backend = BackendChoice::Lexical;
    }

    let atlas = EchoAtlas::initiate(config)?;

    match args.command {
        Command::Ask { location, question } => {
            let location = location.key();
            ask(&atlas, &location, &question.join(" "))?;
        }
        Command::Chat { location } => chat(&atlas, &location.key())?,
        Command::Memories { location, limit } => {
            let location = location.key();
            let mut memories = atlas.list_memories(&location);
            if let Some(limit) = limit {
                memories.truncate(limit);
            }
            if memories.is_empty() {
                println!("📭 No memories for {}", location.label());
            }
            for memory in memories {
                println!(
                    "#{} [{}] {}\n   ↳ {}",
                    memory.id,
                    memory.created_at.format("%Y-%m-%d %H:%M"),
                    memory.question,
                    memory.answer.replace('\n', "\n     ")
                );
            }
        }
        Command::Similar { location, text, k } => {
            let location = location.key();
            let related = atlas.related_memories(&location, &text.join(" "), k);
            if related.is_empty() {
                println!("📭 No memories for {}", location.label());
            }
            for scored in related {
                println!(
                    "{:.3}  #{} {}",
                    scored.score,
                    scored.record.id,
                    scored.record.preview(80)
                );
            }
        }
        Command::Delete { location } => {
            let location = location.key();
            let removed = atlas.delete_memories(&location)?;
            println!("🗑️ Deleted {} memories for {}", removed, location.label());
        }
        Command::Reset { on_restart } => {
            if on_restart {
                atlas.schedule_reset()?;
                println!("⏳ Memory will be wiped on next start");
            } else {
                atlas.reset_memory()?;
                println!("🔥 All memories deleted");
            }
        }
        Command::Playbook {
            location,
            format,
            output,
        } => {
            let rendered = atlas.get_playbook(&location.key(), format)?;
            match output {
                Some(mut path) => {
                    if path.extension().is_none() {
                        path.set_extension(format.extension());
                    }
                    std::fs::write(&path, rendered)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("📄 Playbook written to {}", path.display());
                }
                None => println!("{rendered}"),
            }
        }
        Command::Locations => {
            let stats = atlas.stats();
            println!(
                "💾 {} memories in {} places ({} backend, next id {})",
                stats.records, stats.locations, stats.backend, stats.next_record_id
            );
            for location in atlas.list_locations() {
                let count = atlas.list_memories(&location).len();
                println!("  📍 {} ({})", location.label(), count);
            }
        }
    }

    Ok(())
}

fn ask(atlas: &EchoAtlas, location: &LocationKey, question: &str) -> Result<()> {
    let answer = atlas.ask_question(location, question)?;
    println!("\n🌍 {}", answer.location.label());
    println!(
        "🎭 Tone: {} | Gesture: {}",
        answer.profile.tone, answer.profile.gesture
    );
    println!("💡 {}", answer.profile.tip);
    println!("\n{}", answer.answer_text);
    if answer.recalled > 0 {
        println!("\n🧠 Drew on {} earlier conversation(s)", answer.recalled);
    }
    Ok(())
}

fn chat(atlas: &EchoAtlas, location: &LocationKey) -> Result<()> {
    println!("\n🗣️ Chatting about {} - type 'quit' to exit", location.label());
    println!("========================================");

    loop {
        print!("\n📝 You: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("quit") || input.eq_ignore_ascii_case("exit") {
            println!("👋 Goodbye!");
            break;
        }

        if let Err(e) = ask(atlas, location, input) {
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}
