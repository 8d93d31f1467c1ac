use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use shared::{
    AppSettings, Cache, Config, Feed, GeminiClient, HackerNewsClient, Story, SummaryModel, Theme,
    TitleTranslator, TranslationStyle,
};
use tracing_subscriber::EnvFilter;

const RESET: &str = "\x1b[0m";

#[derive(Parser)]
#[command(name = "hn-digest")]
#[command(about = "List Hacker News top stories with titles translated into Chinese")]
struct Args {
    /// Number of 24-story batches to load
    #[arg(short, long, default_value = "1")]
    batches: usize,

    /// Translation style (tech, concise, professional, fun); saved to settings
    #[arg(short, long)]
    style: Option<TranslationStyle>,

    /// Summary model (flash, pro); saved to settings
    #[arg(short, long)]
    model: Option<SummaryModel>,

    /// Color theme (light, dark); saved to settings
    #[arg(long)]
    theme: Option<Theme>,

    /// Switch between the light and dark theme
    #[arg(long, conflicts_with = "theme")]
    toggle_theme: bool,

    /// Ignore cached translations and translate every title again
    #[arg(short, long)]
    retranslate: bool,

    /// Translate the title of one loaded story again, ignoring its cached entry
    #[arg(long, value_name = "ID")]
    retranslate_id: Option<u64>,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Apply command-line overrides and persist them when anything changed.
/// Returns the settings in effect and whether loaded titles must be
/// translated again.
fn update_settings(args: &Args) -> Result<(AppSettings, bool)> {
    let path = AppSettings::default_path()?;
    let current = AppSettings::load(&path);

    let mut next = current;
    if let Some(style) = args.style {
        next.translation_style = style;
    }
    if let Some(model) = args.model {
        next.summary_model = model;
    }
    if let Some(theme) = args.theme {
        next.theme = theme;
    }
    if args.toggle_theme {
        next.theme = next.theme.toggle();
    }

    if next != current {
        next.save(&path).context("Failed to save settings")?;
        println!("✓ Settings saved to {}", path.display());
    }

    Ok((next, current.requires_retranslation(&next)))
}

fn print_story(rank: usize, story: &Story, theme: Theme) {
    let muted = theme.muted_color();
    println!(
        "{:>3}. {}{}{}",
        rank,
        theme.title_color(),
        story.display_title(),
        RESET
    );
    if story.translated_title.is_some() {
        println!("     {}{}{}", muted, story.title, RESET);
    }

    let mut meta = Vec::new();
    if let Some(domain) = story.domain() {
        meta.push(domain);
    }
    meta.push(format!("{} points", story.score));
    meta.push(format!("by {}", story.author));
    meta.push(format!("{} ago", story.time_ago(Utc::now())));
    meta.push(format!("{} comments", story.comment_count.unwrap_or(0)));

    println!("     {}{}{}", muted, meta.join(" · "), RESET);
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let config = Config::from_env()?;
    let (settings, style_changed) = update_settings(&args)?;

    let cache = Cache::open(&Config::default_cache_path()?);
    let hn = HackerNewsClient::new(&config)?;
    let translator = TitleTranslator::new(GeminiClient::new(&config)?, cache);

    println!("\n📚 Fetching top stories from Hacker News...");
    let mut feed = Feed::default();
    feed.load_initial(&hn).await;
    for _ in 1..args.batches.max(1) {
        if !feed.has_more() {
            break;
        }
        feed.load_more(&hn).await;
    }

    if feed.stories().is_empty() {
        println!("No stories loaded.");
        return Ok(());
    }

    println!(
        "✓ Loaded {} stories ({} ranked in total)",
        feed.stories().len(),
        feed.total_ids()
    );

    let force = args.retranslate || style_changed;
    let (ticket, to_translate) = feed.stories_to_translate(force);
    if !to_translate.is_empty() {
        println!("\n🤖 Translating ({})...", settings.translation_style);
        let translations = translator
            .translate(&to_translate, settings.translation_style, force)
            .await;
        feed.apply_translations(ticket, &translations);
        println!(
            "✓ Translated {}/{} titles",
            translations.len(),
            to_translate.len()
        );
    }

    if let Some(id) = args.retranslate_id {
        match feed.story_to_retranslate(id) {
            Some((ticket, story)) => {
                println!("\n🔄 Retranslating story {}...", id);
                let translations = translator
                    .translate(&[story], settings.translation_style, true)
                    .await;
                feed.apply_translations(ticket, &translations);
                if translations.is_empty() {
                    println!("⚠ Could not retranslate story {}", id);
                }
            }
            None => println!("⚠ Story {} is not among the loaded stories", id),
        }
    }

    println!(
        "\nStyle: {} · Model: {} · Theme: {}\n",
        settings.translation_style, settings.summary_model, settings.theme
    );
    for (index, story) in feed.stories().iter().enumerate() {
        print_story(index + 1, story, settings.theme);
    }

    if feed.has_more() {
        println!(
            "\nShowing {} stories. Use --batches {} to load more.",
            feed.stories().len(),
            args.batches.max(1) + 1
        );
    }

    Ok(())
}
