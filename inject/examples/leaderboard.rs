use fibre_inject::{global, inject, Args, ContainerType, Injectable};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// --- Configuration ---

#[derive(Clone)]
struct LeaderboardConfig {
  store_url: String,
}

fn config_for_environment(env: &str) -> fibre_inject::Result<LeaderboardConfig> {
  let store_url = match env {
    "development" => "memory://localhost:6379",
    "production" => "memory://somethingelse.supercool:6379",
    other => return Err(fibre_inject::Error::factory(format!("unknown environment '{}'", other))),
  };
  Ok(LeaderboardConfig {
    store_url: store_url.to_string(),
  })
}

// --- Components ---

/// An in-memory key-value store standing in for a networked one.
struct MemoryStore {
  url: String,
  entries: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
  fn connect(url: &str) -> Self {
    tracing::info!(url, "connecting to store");
    Self {
      url: url.to_string(),
      entries: Mutex::new(HashMap::new()),
    }
  }
}

struct Database {
  store: Arc<MemoryStore>,
}

impl Database {
  fn set(&self, key: &str, value: i64) {
    self.store.entries.lock().insert(key.to_string(), value);
  }

  fn get_all(&self) -> HashMap<String, i64> {
    self.store.entries.lock().clone()
  }
}

// --- Containers ---

struct Leaderboard {
  container: ContainerType,
  database: Injectable,
}

fn declare_containers(env: &'static str) -> fibre_inject::Result<Leaderboard> {
  let mut decl = global().declare("LeaderboardContainer");
  let config = decl.bind(
    "config",
    Injectable::new(move |_: &Args| config_for_environment(env)),
  )?;
  let store = decl.bind(
    "store",
    Injectable::new(|args: &Args| Ok(MemoryStore::connect(args.get::<String>(0)?)))
      .arg(config.attr("store_url", |c: &LeaderboardConfig| c.store_url.clone())),
  )?;
  let database = decl.bind(
    "database",
    Injectable::new(|args: &Args| Ok(Database { store: args.get_arc(0)? })).arg(&store),
  )?;
  let container = decl.finish()?;
  Ok(Leaderboard { container, database })
}

// --- Application ---

struct Application {
  name: String,
  db: Arc<Database>,
}

impl Application {
  fn new(name: &str, database: &Injectable) -> Self {
    Self {
      name: name.to_string(),
      db: inject!(database, Database),
    }
  }

  fn set_points(&self, player: &str, points: i64) {
    self.db.set(player, points);
  }

  fn winner(&self) -> Option<(String, i64)> {
    self.db.get_all().into_iter().max_by_key(|(_, points)| *points)
  }
}

fn main() -> fibre_inject::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
    .init();

  let leaderboard = declare_containers("development")?;

  // Initialize containers on the entry point, before anything injects from them.
  println!("Initializing containers...");
  global().instantiate(&leaderboard.container)?.initialize()?;
  println!("Containers initialized.");

  let app = Application::new("my-app", &leaderboard.database);
  app.set_points("player1", 100);
  app.set_points("player2", 500);
  app.set_points("player3", 300);

  let winner = app.winner();
  println!("[{}] store at {}: winner {:?}", app.name, app.db.store.url, winner);
  assert_eq!(winner, Some(("player2".to_string(), 500)));
  Ok(())
}
