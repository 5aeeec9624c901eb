// In-process multi-client simulation
//
// Several independent stores share one in-memory backing store and draw at
// random until they run out of attempts or prizes. Afterwards every client
// must show the same version and counts, and the drawn total must match the
// number of successful draws.

use anyhow::{bail, Context};
use countkun_core::{CounterVector, Rank, StoreError, Version};
use countkun_effects::{MemoryDocumentStore, RealTimeHandler, SessionGate};
use countkun_sync::{SharedCounterStore, StoreConfig, StoreView};
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::print_inventory;

/// Parameters for one simulation run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub clients: usize,
    pub draws: usize,
    pub initial: CounterVector,
    pub seed: u64,
}

/// Outcome counts for one client
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClientTally {
    pub drawn: usize,
    pub already_zero: usize,
    pub contention: usize,
}

impl ClientTally {
    fn merge(self, other: Self) -> Self {
        Self {
            drawn: self.drawn + other.drawn,
            already_zero: self.already_zero + other.already_zero,
            contention: self.contention + other.contention,
        }
    }
}

/// Result of a simulation run
#[derive(Debug)]
pub struct SimulationReport {
    pub tally: ClientTally,
    pub views: Vec<StoreView>,
}

impl SimulationReport {
    /// Whether every client ended on the same document
    pub fn converged(&self) -> bool {
        self.views
            .windows(2)
            .all(|pair| pair[0].document == pair[1].document)
    }
}

/// Run the simulation and print a summary
pub async fn simulate(config: &StoreConfig, options: SimulateOptions) -> anyhow::Result<()> {
    let initial = options.initial;
    let report = run(config, options).await?;

    let Some(view) = report.views.first() else {
        bail!("Simulation ran without clients");
    };
    print_inventory(view, config.low_stock_threshold);
    println!();
    println!("Clients:       {}", report.views.len());
    println!("Drawn:         {}", report.tally.drawn);
    println!("Already zero:  {}", report.tally.already_zero);
    println!("Contention:    {}", report.tally.contention);
    println!(
        "Converged:     {}",
        if report.converged() { "yes" } else { "no" }
    );

    let expected = initial.total() - report.tally.drawn as u64;
    if view.counts().total() != expected {
        bail!(
            "Lost update: expected {expected} items left, found {}",
            view.counts().total()
        );
    }
    if !report.converged() {
        bail!("Clients did not converge on one document");
    }
    Ok(())
}

/// Run the simulation without printing
pub async fn run(config: &StoreConfig, options: SimulateOptions) -> anyhow::Result<SimulationReport> {
    let documents = MemoryDocumentStore::new();
    let time = RealTimeHandler::new();

    let mut clients = Vec::with_capacity(options.clients);
    for index in 0..options.clients {
        let store = SharedCounterStore::new(
            config.clone(),
            documents.clone(),
            time,
            SessionGate::signed_in(format!("client-{index}")),
        )?;
        let mut subscription = store.subscribe();
        subscription
            .next_snapshot()
            .await
            .context("Client was torn down before it synchronized")?;
        clients.push((store, subscription));
    }

    let Some((first, _)) = clients.first() else {
        return Ok(SimulationReport {
            tally: ClientTally::default(),
            views: Vec::new(),
        });
    };
    let round = first
        .reseed(options.initial)
        .await
        .context("Failed to start the round")?;
    for (store, _) in &clients {
        store
            .observed(round)
            .await
            .context("Client missed the new round")?;
    }
    info!(clients = clients.len(), %round, "Round started");

    let tallies = join_all(clients.iter().enumerate().map(|(index, (store, _))| {
        let seed = options.seed.wrapping_add(index as u64);
        run_client(store, &documents, options.draws, seed)
    }))
    .await;
    let tally = tallies
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .fold(ClientTally::default(), ClientTally::merge);

    let last = documents
        .version(&config.document_key)
        .await
        .unwrap_or(Version::FIRST);
    let mut views = Vec::with_capacity(clients.len());
    for (store, _) in &clients {
        let view = store
            .observed(last)
            .await
            .context("Client was torn down before the last commit arrived")?;
        views.push(view);
    }

    Ok(SimulationReport { tally, views })
}

async fn run_client(
    store: &SharedCounterStore,
    documents: &MemoryDocumentStore,
    draws: usize,
    seed: u64,
) -> Result<ClientTally, StoreError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut tally = ClientTally::default();

    for _ in 0..draws {
        let available: Vec<Rank> = store
            .counts()
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(rank, _)| rank)
            .collect();
        if available.is_empty() {
            break;
        }
        let rank = available[rng.gen_range(0..available.len())];

        match store.draw_one(rank).await {
            Ok(version) => {
                tally.drawn += 1;
                catch_up(store, Some(version)).await;
            }
            Err(StoreError::AlreadyZero { .. }) => {
                tally.already_zero += 1;
                let latest = documents.version(&store.config().document_key).await;
                catch_up(store, latest).await;
            }
            Err(StoreError::Contention { attempts }) => {
                debug!(attempts, "Client gave up on a draw");
                tally.contention += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(tally)
}

/// Wait until the client's view includes `version`, so the next pick sees it.
async fn catch_up(store: &SharedCounterStore, version: Option<Version>) {
    if let Some(version) = version {
        if store.observed(version).await.is_none() {
            debug!(%version, "Client torn down while catching up");
        }
    }
}
