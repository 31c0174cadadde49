mod api;
mod cache;
mod config;
mod error;
mod event;
mod logging;
mod poller;
mod repository;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use api::{HttpPostsApi, Post};
use cache::SqliteStore;
use config::{Config, SyncConfig};
use event::SyncEvent;
use repository::PostRepository;

#[derive(Parser, Debug)]
#[command(name = "feedsync")]
#[command(about = "Keeps a local post feed cache in sync with a remote posts service")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/feedsync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch every post from the server into the cache
  Refresh,
  /// Print the cached feed
  List,
  /// Like a post
  Like { id: i64 },
  /// Delete a post on the server and from the cache
  Remove { id: i64 },
  /// Show posts that arrived hidden
  Reveal,
  /// Publish a new post
  Post {
    content: String,
    #[arg(short, long, default_value = "me")]
    author: String,
  },
  /// Refresh, then keep polling for newer posts until Ctrl+C
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let cache_path = match &config.cache.path {
    Some(path) => path.clone(),
    None => SqliteStore::default_path()?,
  };
  let store = SqliteStore::open(&cache_path)?;
  let api = HttpPostsApi::new(&config.server)?;
  let repo = PostRepository::new(Arc::new(api), Arc::new(store));

  match args.command {
    Command::Refresh => {
      repo.refresh().await?;
      print_feed(&current_feed(&repo).await);
    }
    Command::List => print_feed(&current_feed(&repo).await),
    Command::Like { id } => repo.like(id).await?,
    Command::Remove { id } => repo.remove(id).await?,
    Command::Reveal => repo.reveal_hidden(),
    Command::Post { content, author } => {
      let saved = repo.save(&Post::draft(&author, &content)).await?;
      println!("Published post {}", saved.id);
    }
    Command::Watch => watch(&repo, &config.sync).await?,
  }

  Ok(())
}

async fn current_feed(repo: &PostRepository) -> Vec<Post> {
  repo.posts().boxed().next().await.unwrap_or_default()
}

/// Print the feed on every change while the poller runs in the background.
async fn watch(repo: &PostRepository, sync: &SyncConfig) -> Result<()> {
  if let Err(err) = repo.refresh().await {
    warn!(error = %err, "initial refresh failed, serving cached posts");
  }

  let (tx, mut events) = event::channel();
  let cancel = CancellationToken::new();
  let poller = repo
    .poller(tx)
    .with_interval(sync.poll_interval())
    .with_hidden_arrivals(sync.hide_new_posts)
    .spawn(cancel.child_token());

  let mut feed = repo.posts().boxed();
  let mut hidden = repo.hidden_count().boxed();
  let shutdown = tokio::signal::ctrl_c();
  tokio::pin!(shutdown);

  loop {
    tokio::select! {
      _ = &mut shutdown => break,
      Some(posts) = feed.next() => print_feed(&posts),
      Some(count) = hidden.next() => {
        if count > 0 {
          println!("{} new post(s) hidden, run `feedsync reveal` to show them", count);
        }
      }
      Some(event) = events.next() => match event {
        SyncEvent::NewPosts { count } if count > 0 => info!(count, "pulled newer posts"),
        SyncEvent::NewPosts { .. } => {}
        SyncEvent::PollFailed(err) => eprintln!("Sync failed, retrying: {}", err),
      },
    }
  }

  info!("Shutting down poller...");
  cancel.cancel();
  poller
    .await
    .map_err(|e| eyre!("Poller task failed: {}", e))?;

  Ok(())
}

fn print_feed(posts: &[Post]) {
  println!("--- {} post(s) ---", posts.len());
  for post in posts {
    let published = post
      .published_at()
      .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
      .unwrap_or_default();
    let liked = if post.liked_by_me { "♥" } else { "♡" };

    println!(
      "#{:<5} {:<16} {}  {} {}\n       {}",
      post.id, post.author, published, liked, post.likes, post.content
    );
  }
}
