// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use jpod::{
    Feed, HttpClient, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient,
    SharedProgressReporter, default_config_path, load_config,
};

// Emoji with fallback for terminals without Unicode support
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[-] ");

/// JPod - a primitive podcatcher
///
/// The feeds are read from the .jpodconf file in the current user's home
/// directory unless --config is given.
#[derive(Parser, Debug)]
#[command(name = "jpod")]
#[command(about = "JPod - a primitive podcatcher")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the configuration file (defaults to ~/.jpodconf)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the uids of all feeds
    List,

    /// Show information about the given feed
    Info {
        /// UID of the feed
        uid: String,
    },

    /// List all the episodes (that get past the filter) of the given feed
    Episodes {
        /// UID of the feed
        uid: String,
    },

    /// Update one or all feeds and download new episodes
    Update {
        /// UID of the feed; all feeds are updated if omitted
        uid: Option<String>,
    },
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .expect("valid progress template");

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn start_bar(&self, length: Option<u64>) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .expect("valid progress template")
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);

        if let Some(old) = self.download_bar.lock().unwrap().replace(bar.clone()) {
            old.finish_and_clear();
        }
        bar
    }

    fn current_bar(&self) -> Option<ProgressBar> {
        self.download_bar.lock().unwrap().clone()
    }

    fn clear_bar(&self) {
        if let Some(bar) = self.download_bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }

    fn println(&self, line: String) {
        let _ = self.multi.println(line);
    }

    /// Print to stderr without tearing the progress bars
    fn eprintln(&self, line: String) {
        self.multi.suspend(|| eprintln!("{line}"));
    }

    fn finish(&self) {
        self.clear_bar();
        self.main_bar.finish_and_clear();
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { uid, uri } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}Fetching feed {}: {}",
                    uid.bold(),
                    uri.cyan()
                ));
            }

            ProgressEvent::FeedUpdated {
                feed_title,
                total_items,
                episodes,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} items, {} episodes after filtering",
                    feed_title.bold().green(),
                    total_items.to_string().cyan(),
                    episodes.to_string().yellow()
                ));
            }

            ProgressEvent::EpisodeAlreadyPresent { .. } => {}

            ProgressEvent::DownloadStarting {
                episode_title,
                episode_index,
                total_to_download,
                content_length,
            } => {
                let bar = self.start_bar(content_length);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total_to_download.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                if let Some(bar) = self.current_bar() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted { filename, .. } => {
                self.clear_bar();
                self.println(format!("  {SUCCESS}{}", filename.green()));
            }

            ProgressEvent::DownloadFailed {
                feed_title,
                episode_title,
                error,
            } => {
                self.clear_bar();
                self.eprintln(format!(
                    "  {FAILURE}The episode \"{}\" from the feed \"{}\" could not be downloaded: {}",
                    episode_title.yellow(),
                    feed_title,
                    error.red()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { count } => {
                self.println(format!(
                    "  {BROOM}{}",
                    format!("Removed {count} unfinished download(s)").dimmed()
                ));
            }

            ProgressEvent::SyncCompleted {
                feed_title,
                downloaded_count,
                skipped_count,
                failed_count,
            } => {
                self.println(format!(
                    "{PARTY}{} {} downloaded, {} skipped, {} failed",
                    format!("{feed_title}:").bold().green(),
                    downloaded_count.to_string().green().bold(),
                    skipped_count.to_string().yellow(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                ));
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

fn find_feed<'a>(feeds: &'a mut [Feed], uid: &str) -> Result<&'a mut Feed> {
    feeds.iter_mut().find(|feed| feed.uid() == uid).with_context(|| {
        format!("No feed with UID \"{uid}\" exists. Use \"jpod list\" for a list of all UIDs.")
    })
}

fn print_info(feed: &Feed) {
    println!("{}\t{}", "UID:".bold(), feed.uid());
    println!("{}\t{}", "URI:".bold(), feed.uri());
    println!(
        "{}\t{}",
        "Download directory:".bold(),
        feed.base_path().display()
    );
    println!("{}\t{}", "Filename pattern:".bold(), feed.filename_pattern());
    println!("{}\t{}", "Title:".bold(), feed.title());
    println!("{}\t{}", "Description:".bold(), feed.description());
}

fn print_episodes(feed: &Feed) {
    for episode in feed.episodes() {
        println!("{}\t{}", "Title:".bold(), episode.title());
        println!("{}\t{}", "URI:".bold(), episode.uri());
        println!("{}\t{}", "Published:".bold(), episode.pub_date().format("%c"));
        println!("{}\t{}", "Description:".bold(), episode.description());
        println!();
    }
}

async fn update_feeds<C: HttpClient>(
    client: &C,
    feeds: &mut [Feed],
    uid: Option<&str>,
    quiet: bool,
) -> Result<()> {
    let selected: Vec<&mut Feed> = match uid {
        Some(uid) => vec![find_feed(feeds, uid)?],
        None => feeds.iter_mut().collect(),
    };

    let indicatif = (!quiet).then(|| Arc::new(IndicatifReporter::new()));
    let reporter: SharedProgressReporter = match &indicatif {
        Some(indicatif) => indicatif.clone() as SharedProgressReporter,
        None => NoopReporter::shared(),
    };

    for feed in selected {
        match feed.sync(client, &reporter).await {
            // Live progress already reported failures unless running quietly
            Ok(result) if quiet => {
                for (title, error) in &result.failed_episodes {
                    eprintln!(
                        "The episode \"{}\" from the feed \"{}\" could not be downloaded: {}",
                        title,
                        feed.title(),
                        error
                    );
                }
            }
            Ok(_) => {}
            Err(e) => {
                let line = format!(
                    "{FAILURE}A problem occurred when updating the feed with UID \"{}\": {}",
                    feed.uid(),
                    e
                );
                match &indicatif {
                    Some(indicatif) => indicatif.eprintln(line),
                    None => eprintln!("{line}"),
                }
            }
        }
    }

    if let Some(indicatif) = indicatif {
        indicatif.finish();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            // Help and version go to stdout and are not failures
            return Ok(if e.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            });
        }
    };

    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config_path = match args.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    let mut feeds = load_config(&config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.display()
        )
    })?;

    let client = ReqwestClient::new();

    match command {
        Command::List => {
            let uids: Vec<&str> = feeds.iter().map(Feed::uid).collect();
            println!("{}", uids.join(" "));
        }

        Command::Info { uid } => {
            let feed = find_feed(&mut feeds, &uid)?;
            feed.update(&client, &NoopReporter::shared())
                .await
                .with_context(|| format!("Failed to update feed \"{uid}\""))?;
            print_info(feed);
        }

        Command::Episodes { uid } => {
            let feed = find_feed(&mut feeds, &uid)?;
            feed.update(&client, &NoopReporter::shared())
                .await
                .with_context(|| format!("Failed to update feed \"{uid}\""))?;
            print_episodes(feed);
        }

        Command::Update { uid } => {
            update_feeds(&client, &mut feeds, uid.as_deref(), args.quiet).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
