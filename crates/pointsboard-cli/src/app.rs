use anyhow::{Context, Result};
use futures::StreamExt;
use tracing::{debug, info, warn};

use pointsboard_core::cache::CacheStore;
use pointsboard_core::config::Config;
use pointsboard_core::models::{ChunkDancer, Dataset};
use pointsboard_core::preferences::FavoritesStore;
use pointsboard_core::utils::{format_date, format_placement_result, truncate_string};
use pointsboard_core::{AssetClient, CacheWorker, DatasetFetcher};

/// Gainers listed per division and role in the summary
const TOP_GAINERS_SHOWN: usize = 3;

/// Widest event name printed in the placement table
const EVENT_NAME_WIDTH: usize = 32;

pub struct App {
    worker: CacheWorker<AssetClient>,
    fetcher: DatasetFetcher<AssetClient>,
}

impl App {
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        let store = CacheStore::open(config.cache_root()?, &config.cache_name)?;
        let fresh_generation = store.entries()?.is_empty();

        let client = AssetClient::new(config.request_timeout())?;
        let worker = CacheWorker::new(client, store, config.worker_options());
        if fresh_generation && !config.precache.is_empty() {
            worker.install(&config.precache).await;
        }

        let fetcher = DatasetFetcher::new(worker.clone(), &config.base_url)
            .with_context(|| format!("Invalid base URL: {}", config.base_url))?;
        info!(base_url = %config.base_url, cache = %config.cache_name, "App initialized");

        Ok(Self {
            worker,
            fetcher,
        })
    }

    /// Print the current dataset. When the background refresh finds a newer
    /// one, print that too.
    pub async fn summary(&self) -> Result<()> {
        let mut changes = self.fetcher.client().listen();
        let mut subscription = self.fetcher.subscribe();

        let dataset = subscription
            .recv()
            .await
            .context("Dataset subscription closed")??;
        print_summary(&dataset);

        self.fetcher.finish_revalidations().await;
        if changes.try_recv().is_ok() {
            debug!("Dataset changed upstream while loading");
            let updated = subscription
                .recv()
                .await
                .context("Dataset subscription closed")??;
            println!("\nDataset updated upstream:");
            print_summary(&updated);
        }
        Ok(())
    }

    /// Print a summary for every emission until interrupted.
    pub async fn watch(&self) -> Result<()> {
        let mut updates = Box::pin(self.fetcher.subscribe().into_stream());
        while let Some(update) = updates.next().await {
            match update {
                Ok(dataset) => print_summary(&dataset),
                Err(e) => eprintln!("Failed to load dataset: {}", e),
            }
        }
        Ok(())
    }

    pub async fn show_dancer(&self, id: u32) -> Result<()> {
        match self.fetcher.dancer(id).await? {
            Some(dancer) => {
                let favorite = self.favorites()?.is_favorite(id);
                print_dancer(&dancer, favorite);
            }
            None => println!("No dancer with id {}", id),
        }
        Ok(())
    }

    pub fn toggle_favorite(&self, id: u32) -> Result<()> {
        let mut favorites = self.favorites()?;
        let added = favorites.toggle(id);
        favorites.save()?;
        if added {
            println!("Added dancer {} to favorites", id);
        } else {
            println!("Removed dancer {} from favorites", id);
        }
        Ok(())
    }

    pub async fn list_favorites(&self) -> Result<()> {
        let favorites = self.favorites()?;
        if favorites.ids().is_empty() {
            println!("No favorite dancers yet (add one with --favorite <id>)");
            return Ok(());
        }

        // Names come from the dataset; list bare ids if it can't be loaded
        let dataset = match self.fetcher.subscribe().recv().await {
            Some(Ok(dataset)) => Some(dataset),
            Some(Err(e)) => {
                warn!(error = %e, "Could not load dataset for favorite names");
                None
            }
            None => None,
        };

        for &id in favorites.ids() {
            let name = dataset
                .as_ref()
                .and_then(|d| d.dancer(id))
                .map(|d| d.display_name())
                .unwrap_or_else(|| "(unknown)".to_string());
            println!("{:>7}  {}", id, name);
        }
        Ok(())
    }

    pub fn cache_status(&self) -> Result<()> {
        let store = self.worker.store();
        let entries = store.entries()?;
        println!("Cache {} at {}", store.name(), store.dir().display());
        if entries.is_empty() {
            println!("  (empty)");
        }
        for entry in entries {
            println!(
                "  {:<60} {:>10} bytes  {:>10}  {}",
                entry.data.url,
                entry.data.len,
                entry.age_display(),
                entry.data.last_modified.as_deref().unwrap_or("-"),
            );
        }
        Ok(())
    }

    pub fn prune_caches(&self) -> Result<()> {
        let removed = self.worker.activate()?;
        if removed.is_empty() {
            println!("No old caches to delete");
        } else {
            println!("Deleted {} old cache(s): {}", removed.len(), removed.join(", "));
        }
        Ok(())
    }

    /// Wait for pending background refreshes.
    pub async fn finish(&self) {
        self.fetcher.finish_revalidations().await;
    }

    fn favorites(&self) -> Result<FavoritesStore> {
        let mut favorites = FavoritesStore::new(Config::config_dir()?);
        favorites.load()?;
        debug!(count = favorites.ids().len(), "Loaded favorites");
        Ok(favorites)
    }
}

fn print_summary(dataset: &Dataset) {
    println!("Points as of {}", format_date(&dataset.last_updated));
    println!("  {} dancers, {} events", dataset.dancers_count, dataset.events_count);

    if !dataset.top_dancers_by_points_gained_recently.is_empty() {
        println!("\nTop recent gainers:");
    }
    for division in &dataset.top_dancers_by_points_gained_recently {
        for role in &division.roles {
            let names: Vec<String> = role
                .dancers
                .iter()
                .take(TOP_GAINERS_SHOWN)
                .map(|gainer| {
                    let name = dataset
                        .dancer(gainer.wscdid)
                        .map(|d| d.display_name())
                        .unwrap_or_else(|| format!("#{}", gainer.wscdid));
                    format!("{} (+{})", name, gainer.points)
                })
                .collect();
            println!(
                "  {} {}: {}",
                dataset.division_name(division.division),
                dataset.role_name(role.role),
                names.join(", ")
            );
        }
    }

    if !dataset.upcoming_events.is_empty() {
        println!("\nUpcoming events:");
    }
    for event in &dataset.upcoming_events {
        println!(
            "  {} - {}  {}  {}",
            format_date(&event.start_date),
            format_date(&event.end_date),
            event.name,
            event.location.as_deref().unwrap_or(""),
        );
    }
}

fn print_dancer(dancer: &ChunkDancer, favorite: bool) {
    let star = if favorite { " *" } else { "" };
    println!("{} (#{}){} - {}", dancer.name, dancer.id, star, dancer.primary_role);
    for (role, divisions) in &dancer.divisions {
        println!("  Eligible as {}: {}", role, divisions.join(", "));
    }

    println!();
    for placement in &dancer.placements {
        println!(
            "  {}  {:<width$}  {:<12} {:<10} {:>5}  {:>3} pts",
            format_date(&placement.date),
            truncate_string(&placement.event.name, EVENT_NAME_WIDTH),
            placement.division,
            placement.role,
            format_placement_result(&placement.result),
            placement.points,
            width = EVENT_NAME_WIDTH,
        );
    }
}
