use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use feedsweep::config::{self, Config};
use feedsweep::feed::Fetcher;
use feedsweep::scheduler::Poller;
use feedsweep::shutdown::{self, ShutdownTrigger};
use feedsweep::storage::{Database, DatabaseError, Feed};
use feedsweep::util::validate_feed_url;

#[derive(Parser, Debug)]
#[command(name = "feedsweep", version, about = "Polls RSS/Atom feeds and stores new posts")]
struct Args {
    /// Config file (default: ~/.config/feedsweep/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user who can add and follow feeds
    Register { name: String },
    /// List users
    Users,
    /// Register a feed url
    Addfeed {
        name: String,
        url: String,
        /// User who owns the feed; they also start following it
        #[arg(long)]
        owner: Option<String>,
    },
    /// List registered feeds
    Feeds,
    /// Follow a registered feed
    Follow {
        url: String,
        #[arg(long)]
        user: String,
    },
    /// Stop following a feed
    Unfollow {
        url: String,
        #[arg(long)]
        user: String,
    },
    /// List the feeds a user follows
    Following {
        #[arg(long)]
        user: String,
    },
    /// Poll feeds every INTERVAL (e.g. 30s, 1m, 1h30m) until interrupted
    Agg { interval: String },
    /// Show the newest posts
    Browse {
        #[arg(long, default_value_t = 2)]
        limit: u32,
        /// Only posts from feeds this user follows
        #[arg(long, alias = "owner")]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Item titles are logged at info, so that is the floor when RUST_LOG is unset
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    let config_dir = config::config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // A bad interval is a startup error, before anything is opened
    let interval = match &args.command {
        Command::Agg { interval } => Some(config::parse_interval(interval)?),
        _ => None,
    };

    let db = open_database(&config.database_path_in(&config_dir)).await?;

    match args.command {
        Command::Register { name } => {
            let id = db
                .create_user(&name)
                .await
                .with_context(|| format!("Failed to register user '{}'", name))?;
            println!("Registered user {} (id {})", name, id);
        }
        Command::Users => {
            for user in db.list_users().await.context("Failed to list users")? {
                println!("* {}", user.name);
            }
        }
        Command::Addfeed { name, url, owner } => {
            let url = validate_feed_url(&url).context("Refusing feed url")?;
            let owner_id = match owner {
                Some(owner) => Some(lookup_user(&db, &owner).await?),
                None => None,
            };
            let id = db
                .insert_feed(&name, url.as_str(), owner_id)
                .await
                .context("Failed to add feed")?;
            println!("Added feed {} (id {}): {}", name, id, url);
            if let Some(owner_id) = owner_id {
                db.follow_feed(owner_id, id)
                    .await
                    .context("Failed to follow the new feed")?;
            }
        }
        Command::Feeds => {
            let feeds = db.list_feeds().await.context("Failed to list feeds")?;
            if feeds.is_empty() {
                println!("No feeds registered. Add one with: feedsweep addfeed <NAME> <URL>");
            }
            for feed in feeds {
                println!(
                    "{:>4}  {}  {}  owner: {}  last fetched: {}",
                    feed.id,
                    feed.name,
                    feed.url,
                    feed.owner.as_deref().unwrap_or("-"),
                    format_timestamp(feed.last_fetched_at, "never")
                );
            }
        }
        Command::Follow { url, user } => {
            let user_id = lookup_user(&db, &user).await?;
            let feed = lookup_feed(&db, &url).await?;
            if db.follow_feed(user_id, feed.id).await.context("Failed to follow feed")? {
                println!("{} now follows {}", user, feed.name);
            } else {
                println!("{} already follows {}", user, feed.name);
            }
        }
        Command::Unfollow { url, user } => {
            let user_id = lookup_user(&db, &user).await?;
            let feed = lookup_feed(&db, &url).await?;
            if db
                .unfollow_feed(user_id, feed.id)
                .await
                .context("Failed to unfollow feed")?
            {
                println!("{} no longer follows {}", user, feed.name);
            } else {
                println!("{} was not following {}", user, feed.name);
            }
        }
        Command::Following { user } => {
            let user_id = lookup_user(&db, &user).await?;
            let feeds = db
                .list_following(user_id)
                .await
                .context("Failed to list followed feeds")?;
            if feeds.is_empty() {
                println!("{} follows no feeds", user);
            }
            for feed in feeds {
                println!("* {}  {}", feed.name, feed.url);
            }
        }
        Command::Agg { .. } => {
            let interval = interval.context("interval was not parsed")?;
            let fetcher = Fetcher::from_config(&config).context("Failed to build HTTP client")?;
            let poller = Poller::new(db, fetcher, &config);

            let (trigger, shutdown) = shutdown::channel();
            tokio::spawn(forward_signals(trigger));
            poller.run(interval, &shutdown).await;
        }
        Command::Browse { limit, user } => {
            let user_id = match user {
                Some(user) => Some(lookup_user(&db, &user).await?),
                None => None,
            };
            let posts = db
                .get_recent_posts(user_id, limit)
                .await
                .context("Failed to load posts")?;
            for post in posts {
                println!("{}  {}", format_timestamp(post.published_at, "undated"), post.title);
                println!("    {}", post.url);
                if let Some(description) = post.description.as_deref() {
                    println!("    {}", description);
                }
            }
        }
    }

    Ok(())
}

async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory {}", parent.display())
            })?;
        }
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!("The database is locked by another process. Is another feedsweep running?")
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn lookup_user(db: &Database, name: &str) -> Result<i64> {
    db.get_user_by_name(name)
        .await
        .context("Failed to look up user")?
        .map(|user| user.id)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No user named '{}'. Create one with: feedsweep register {}",
                name,
                name
            )
        })
}

async fn lookup_feed(db: &Database, url: &str) -> Result<Feed> {
    // addfeed stores the parsed form, e.g. with a trailing slash on a bare host
    let normalized = url::Url::parse(url.trim())
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string());
    db.get_feed_by_url(&normalized)
        .await
        .context("Failed to look up feed")?
        .ok_or_else(|| anyhow::anyhow!("No feed registered for {}", url))
}

fn format_timestamp(secs: Option<i64>, missing: &str) -> String {
    secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| missing.to_string())
}

/// Fire the shutdown trigger on Ctrl-C, or SIGTERM on Unix.
async fn forward_signals(trigger: ShutdownTrigger) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown requested");
    trigger.trigger();
}
