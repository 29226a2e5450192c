use clap::Subcommand;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::filter::FilterSpec;
use crate::profile::ProfileScope;
use crate::remote::{validate_base_url, Remote, RemoteGateway};
use crate::store::{LocalStore, LocalStoreExt, MemoryStore, SqliteStore, StoreKey};
use crate::sync::{DataSource, LoadState, SyncCoordinator, SyncError};
use crate::tags::{TagCatalog, TagList};
use crate::types::Mix;

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List mixes of the active profile, ready ones first
  Mixes {
    /// Case-insensitive match against name, composition and notes
    #[arg(short, long)]
    search: Option<String>,
    /// Required tag (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,
    /// Required guest (repeatable)
    #[arg(short, long = "guest")]
    guests: Vec<String>,
    #[arg(long)]
    min_strength: Option<u8>,
    #[arg(long)]
    max_strength: Option<u8>,
    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,
  },
  /// Print a mix as shareable text
  Show { id: String },
  /// Create a mix in the active profile
  Add {
    name: String,
    #[arg(short, long, default_value = "")]
    composition: String,
    #[arg(short, long, default_value_t = 5)]
    strength: i64,
    #[arg(short, long, default_value = "")]
    notes: String,
    #[arg(short, long = "tag")]
    tags: Vec<String>,
    #[arg(short, long = "guest")]
    guests: Vec<String>,
    /// Add straight to the ready list instead of in development
    #[arg(long)]
    ready: bool,
  },
  /// Change fields of an existing mix
  Edit {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(short, long)]
    composition: Option<String>,
    #[arg(short, long)]
    strength: Option<i64>,
    #[arg(short, long)]
    notes: Option<String>,
    /// Replace the tag set (repeatable)
    #[arg(short, long = "tag")]
    tags: Option<Vec<String>>,
    /// Replace the guest set (repeatable)
    #[arg(short, long = "guest")]
    guests: Option<Vec<String>>,
  },
  /// Flip a mix between ready and in development
  Move { id: String },
  Delete { id: String },
  /// Write the active profile's mixes as JSON
  Export {
    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
  },
  /// Create mixes from an exported JSON file, skipping known ids
  Import { file: PathBuf },
  Profiles {
    #[command(subcommand)]
    command: ProfileCommand,
  },
  Tags {
    #[command(subcommand)]
    command: TagCommand,
  },
  Server {
    #[command(subcommand)]
    command: ServerCommand,
  },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
  List,
  Create { name: String },
  Rename { id: String, name: String },
  /// Make a profile the active one and load its mixes
  Activate { id: String },
  Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
  List,
  Add {
    tag: String,
    /// Act on the guest list
    #[arg(long)]
    guest: bool,
  },
  Remove {
    tag: String,
    #[arg(long)]
    guest: bool,
  },
}

#[derive(Subcommand, Debug)]
pub enum ServerCommand {
  /// Print the base URL in use
  Show,
  /// Persist a base URL override
  SetUrl { url: String },
  /// Probe the health endpoint once
  Health,
}

/// Startup options that are not part of the config file.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
  /// Keep all state in memory
  pub ephemeral: bool,
  /// Serve reads from the local store only
  pub offline: bool,
}

pub struct App {
  store: Arc<dyn LocalStore>,
  gateway: Arc<RemoteGateway>,
  coordinator: Arc<SyncCoordinator>,
  scope: ProfileScope,
  tags: TagCatalog,
  offline: bool,
}

impl App {
  pub fn new(config: &Config, options: RunOptions) -> Result<Self> {
    let store: Arc<dyn LocalStore> = if options.ephemeral {
      Arc::new(MemoryStore::new())
    } else {
      Arc::new(SqliteStore::open(config.store.path.as_deref())?)
    };

    let base_url = match store.load::<String>(&StoreKey::BaseUrl) {
      Ok(Some(stored)) => stored.value,
      Ok(None) => config.server_url(),
      Err(e) => {
        warn!(error = %e, "ignoring unreadable base url override");
        config.server_url()
      }
    };
    info!(%base_url, "using server");

    let gateway = Arc::new(RemoteGateway::new(
      base_url,
      config.timeouts(),
      config.cold_start_policy(),
    )?);
    let remote: Arc<dyn Remote> = gateway.clone();
    let coordinator = Arc::new(SyncCoordinator::new(
      remote.clone(),
      store.clone(),
      config.reload_policy(),
    ));

    let mut scope = ProfileScope::new(remote, store.clone(), coordinator.clone());
    scope.restore();
    let tags = TagCatalog::load(store.clone());

    Ok(Self {
      store,
      gateway,
      coordinator,
      scope,
      tags,
      offline: options.offline,
    })
  }

  pub async fn run(&mut self, command: Command) -> Result<()> {
    match command {
      Command::Mixes {
        search,
        tags,
        guests,
        min_strength,
        max_strength,
        json,
      } => {
        self.load_active().await?;
        let mut spec = FilterSpec {
          search_text: search.unwrap_or_default(),
          ..FilterSpec::default()
        };
        for tag in &tags {
          spec.toggle_tag(tag);
        }
        for guest in &guests {
          spec.toggle_guest_tag(guest);
        }
        if let Some(min) = min_strength {
          spec.min_strength = min;
        }
        if let Some(max) = max_strength {
          spec.max_strength = max;
        }
        self.print_mixes(&spec, json)
      }
      Command::Show { id } => {
        self.load_active().await?;
        let mix = self.find(&id)?;
        println!("{}", mix.share_text());
        Ok(())
      }
      Command::Add {
        name,
        composition,
        strength,
        notes,
        tags,
        guests,
        ready,
      } => {
        self.require_online()?;
        let profile_id = self.load_active().await?;
        let mut mix = Mix::new(profile_id, name);
        mix.composition = composition;
        mix.notes = notes;
        mix.set_strength(strength);
        mix.set_tags(tags);
        mix.set_guest_tags(guests);
        mix.is_in_development = !ready;
        let id = mix.id.clone();
        self.coordinator.save(mix).await?;
        println!("created {id}");
        Ok(())
      }
      Command::Edit {
        id,
        name,
        composition,
        strength,
        notes,
        tags,
        guests,
      } => {
        self.require_online()?;
        self.load_active().await?;
        let mut mix = self.find(&id)?;
        if let Some(name) = name {
          mix.name = name;
        }
        if let Some(composition) = composition {
          mix.composition = composition;
        }
        if let Some(strength) = strength {
          mix.set_strength(strength);
        }
        if let Some(notes) = notes {
          mix.notes = notes;
        }
        if let Some(tags) = tags {
          mix.set_tags(tags);
        }
        if let Some(guests) = guests {
          mix.set_guest_tags(guests);
        }
        self.coordinator.save(mix).await?;
        println!("updated {id}");
        Ok(())
      }
      Command::Move { id } => {
        self.require_online()?;
        self.load_active().await?;
        self.coordinator.move_mix(&id).await?;
        let state = match self.coordinator.get(&id) {
          Some(m) if m.is_in_development => "in development",
          Some(_) => "ready",
          None => "moved",
        };
        println!("{id}: {state}");
        Ok(())
      }
      Command::Delete { id } => {
        self.require_online()?;
        self.load_active().await?;
        self.find(&id)?;
        self.coordinator.delete(&id).await?;
        println!("deleted {id}");
        Ok(())
      }
      Command::Export { output } => {
        self.load_active().await?;
        let json = self.coordinator.export_json()?;
        match output {
          Some(path) => {
            std::fs::write(&path, json)
              .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
            println!("exported {} mixes to {}", self.coordinator.snapshot().mixes.len(), path.display());
          }
          None => println!("{json}"),
        }
        Ok(())
      }
      Command::Import { file } => {
        self.require_online()?;
        let contents = std::fs::read_to_string(&file)
          .map_err(|e| eyre!("Failed to read {}: {}", file.display(), e))?;
        let mixes: Vec<Mix> = serde_json::from_str(&contents)
          .map_err(|e| eyre!("Failed to parse {}: {}", file.display(), e))?;
        self.load_active().await?;
        let created = self.coordinator.import(mixes).await?;
        println!("imported {created} mixes");
        Ok(())
      }
      Command::Profiles { command } => self.run_profiles(command).await,
      Command::Tags { command } => self.run_tags(command),
      Command::Server { command } => self.run_server(command).await,
    }
  }

  async fn run_profiles(&mut self, command: ProfileCommand) -> Result<()> {
    if !matches!(command, ProfileCommand::List) {
      self.require_online()?;
    }
    self.refresh_profiles().await;

    match command {
      ProfileCommand::List => {
        if self.scope.profiles().is_empty() {
          println!("no profiles; create one with `mth profiles create <name>`");
        }
        for profile in self.scope.profiles() {
          let marker = if profile.is_active { "*" } else { " " };
          println!("{marker} {}  {}", profile.id, profile.name);
        }
      }
      ProfileCommand::Create { name } => {
        let profile = self.scope.create(&name).await?;
        println!("created {} ({})", profile.name, profile.id);
      }
      ProfileCommand::Rename { id, name } => {
        let profile = self.scope.rename(&id, &name).await?;
        println!("renamed {} to {}", profile.id, profile.name);
      }
      ProfileCommand::Activate { id } => {
        self.scope.activate(&id).await?;
        self.report_load_state();
        if self.coordinator.state() == LoadState::Loaded {
          let count = self.coordinator.snapshot().mixes.len();
          println!("active profile: {id} ({count} mixes)");
        } else {
          println!("active profile: {id}");
        }
      }
      ProfileCommand::Delete { id } => {
        self.scope.delete(&id).await?;
        match self.scope.current_active() {
          Some(active) => println!("deleted {id}; active profile: {}", active.name),
          None => println!("deleted {id}; no profiles left"),
        }
      }
    }
    Ok(())
  }

  fn run_tags(&mut self, command: TagCommand) -> Result<()> {
    match command {
      TagCommand::List => {
        println!("tags:   {}", self.tags.all_tags().join(", "));
        println!("guests: {}", self.tags.guest_tags().join(", "));
      }
      TagCommand::Add { tag, guest } => {
        if !self.tags.add(tag_list(guest), &tag)? {
          println!("{tag} is already listed");
        }
      }
      TagCommand::Remove { tag, guest } => {
        if !self.tags.remove(tag_list(guest), &tag)? {
          println!("{tag} is not a custom entry");
        }
      }
    }
    Ok(())
  }

  async fn run_server(&mut self, command: ServerCommand) -> Result<()> {
    match command {
      ServerCommand::Show => println!("{}", self.gateway.base_url()),
      ServerCommand::SetUrl { url } => {
        let url = validate_base_url(&url)?.to_string();
        let url = url.trim_end_matches('/').to_string();
        self.gateway.set_base_url(&url)?;
        self.store.save(&StoreKey::BaseUrl, &url)?;
        info!(%url, "base url override saved");
        println!("server url set to {url}");
      }
      ServerCommand::Health => {
        if self.gateway.health().await? {
          println!("{} is up", self.gateway.base_url());
        } else {
          println!("{} is asleep or unreachable", self.gateway.base_url());
        }
      }
    }
    Ok(())
  }

  /// Bring the active profile's mixes up to date and return its id.
  ///
  /// Offline, or when the server cannot be reached, whatever the local store
  /// holds is used instead.
  async fn load_active(&mut self) -> Result<String> {
    self.refresh_profiles().await;
    let profile_id = self
      .scope
      .current_active()
      .map(|p| p.id.clone())
      .ok_or(SyncError::NoActiveProfile)?;

    if !self.offline {
      let snapshot = self.coordinator.snapshot();
      let fresh = snapshot.profile_id.as_deref() == Some(profile_id.as_str())
        && matches!(snapshot.source, DataSource::Network { .. });
      if !fresh {
        self.coordinator.load(&profile_id).await;
      }
    }
    self.report_load_state();
    Ok(profile_id)
  }

  async fn refresh_profiles(&mut self) {
    if self.offline {
      return;
    }
    if let Err(e) = self.scope.refresh().await {
      warn!(error = %e, "profile refresh failed, using cached profiles");
      eprintln!("warning: could not refresh profiles: {e}");
    }
  }

  fn report_load_state(&self) {
    let snapshot = self.coordinator.snapshot();
    if let Some(message) = snapshot.state.error() {
      eprintln!("warning: {message}");
    }
    if let DataSource::Cache { stored_at } = snapshot.source {
      eprintln!(
        "showing cached data from {}",
        stored_at.format("%Y-%m-%d %H:%M")
      );
    }
  }

  fn find(&self, id: &str) -> Result<Mix> {
    Ok(
      self
        .coordinator
        .get(id)
        .ok_or_else(|| SyncError::UnknownMix(id.to_string()))?,
    )
  }

  fn require_online(&self) -> Result<()> {
    if self.offline {
      return Err(eyre!("This command changes the server catalog and cannot run with --offline"));
    }
    Ok(())
  }

  fn print_mixes(&self, spec: &FilterSpec, json: bool) -> Result<()> {
    let view = self.coordinator.view(spec);

    if json {
      let out = serde_json::json!({
        "ready": view.ready,
        "inDevelopment": view.in_development,
      });
      println!("{}", serde_json::to_string_pretty(&out)?);
      return Ok(());
    }

    if view.is_empty() {
      println!("no mixes match");
      return Ok(());
    }
    for (title, mixes) in [("Ready", &view.ready), ("In development", &view.in_development)] {
      if mixes.is_empty() {
        continue;
      }
      println!("{title}:");
      for mix in mixes {
        println!("{}", mix_line(mix));
      }
    }
    Ok(())
  }
}

fn tag_list(guest: bool) -> TagList {
  if guest {
    TagList::Guest
  } else {
    TagList::Mix
  }
}

fn mix_line(mix: &Mix) -> String {
  let mut line = format!("  {}  {} ({}/10)", mix.id, mix.name, mix.strength);
  if !mix.tags.is_empty() {
    line.push_str(&format!("  [{}]", mix.tags.join(", ")));
  }
  if !mix.guest_tags.is_empty() {
    line.push_str(&format!("  guests: {}", mix.guest_tags.join(", ")));
  }
  line
}
