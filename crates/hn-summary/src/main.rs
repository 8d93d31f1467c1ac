use anyhow::{Context, Result};
use clap::Parser;
use shared::{
    request_summary, AppSettings, ArticleSummarizer, ArticleSummary, Cache, Config, GeminiClient,
    HackerNewsClient, Pending, Story, SummaryFailure, SummaryModel, TranslationStyle,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hn-summary")]
#[command(about = "Summarize a Hacker News story with Gemini and Google Search grounding")]
struct Args {
    /// Hacker News item id
    #[arg(short, long, conflicts_with = "url", required_unless_present = "url")]
    id: Option<u64>,

    /// Article URL to summarize directly
    #[arg(short, long)]
    url: Option<String>,

    /// Article title, used with --url
    #[arg(short, long, requires = "url")]
    title: Option<String>,

    /// Summary model for this run (flash, pro); defaults to the saved setting
    #[arg(short, long)]
    model: Option<SummaryModel>,

    /// Style for this run; defaults to the saved setting
    #[arg(short, long)]
    style: Option<TranslationStyle>,

    /// Ignore the cached summary and generate a new one
    #[arg(short, long)]
    refresh: bool,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn story_from_url(url: String, title: Option<String>) -> Story {
    Story {
        id: 0,
        title: title.unwrap_or_else(|| url.clone()),
        url: Some(url),
        author: String::new(),
        created_at: 0,
        score: 0,
        comment_count: None,
        child_ids: None,
        kind: "story".to_string(),
        translated_title: None,
        translation_state: None,
    }
}

fn render(state: &Pending<ArticleSummary, SummaryFailure>) {
    match state {
        Pending::Loading => println!("\n🤖 Generating summary..."),
        Pending::Ready(summary) => {
            println!("\n💡 {}\n", summary.tldr);
            for point in &summary.key_points {
                println!("  - {}", point);
            }
            println!("\n{}", summary.analysis);
        }
        Pending::Failed(reason) => {
            println!("\n⚠ {}", reason);
            println!("  Run again with --refresh to retry.");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::from_env()?;

    let saved = AppSettings::load(&AppSettings::default_path()?);
    let settings = AppSettings {
        translation_style: args.style.unwrap_or(saved.translation_style),
        summary_model: args.model.unwrap_or(saved.summary_model),
        ..saved
    };

    let story = match (args.id, args.url) {
        (Some(id), _) => {
            let hn = HackerNewsClient::new(&config)?;
            hn.fetch_item(id)
                .await
                .with_context(|| format!("Could not fetch Hacker News item {}", id))?
        }
        (None, Some(url)) => story_from_url(url, args.title),
        (None, None) => anyhow::bail!("Provide either --id or --url"),
    };

    println!("📰 {}", story.title);
    if let Some(url) = &story.url {
        println!("   {}", url);
    }

    let cache = Cache::open(&Config::default_cache_path()?);
    let summarizer = ArticleSummarizer::new(GeminiClient::new(&config)?, cache);

    let mut state = Pending::Loading;
    render(&state);
    state = request_summary(&summarizer, &story, &settings, args.refresh).await;
    render(&state);

    Ok(())
}
