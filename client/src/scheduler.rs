//! # Polling
//!
//! One task per data kind, each on its own fixed interval. The first tick fires right
//! away, which doubles as the initial load.
//!
//! | Kind | Default | Endpoint |
//! |---|---|---|
//! | Users | 30s | `/live-locations/` |
//! | Alerts | 15s | `/alerts/` |
//! | Banner | 5s | `/alerts/` |
//! | Location | 30s | `/update-location/` |
//!
//! Nearby services are fetched once, when the position is known.
//!
//! Every tick spawns its fetch instead of awaiting it, so a slow backend never stretches
//! the cadence. Overlapping responses are sorted out by the tickets taken before each
//! fetch. A failed fetch is logged and dropped; the next tick is the retry.
//!
//! Fetches belong to the interval task that started them, so aborting that task on
//! shutdown cancels whatever it still has in flight.
use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::Mutex,
    task::{JoinHandle, JoinSet},
    time::interval,
};
use tracing::{debug, error, info, warn};

use crate::{
    api::Feed,
    map::MapView,
    models::LatLng,
    notify::{AlertWatcher, EmergencyNotification, Notifier},
    reconciler::{Collection, MapController, Outcome, Ticket},
    snapshot::{MarkerSnapshotEntry, alerts_snapshot, services_snapshot, users_snapshot},
};

pub type Shared<T> = Arc<Mutex<T>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollingPolicy {
    pub users: Duration,
    pub alerts: Duration,
    pub banner: Duration,
    pub location: Duration,
}

impl Default for PollingPolicy {
    fn default() -> Self {
        Self {
            users: Duration::from_secs(30),
            alerts: Duration::from_secs(15),
            banner: Duration::from_secs(5),
            location: Duration::from_secs(30),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Refresh {
    Applied,
    Stale,
    Failed,
}

impl From<Outcome> for Refresh {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Applied => Refresh::Applied,
            Outcome::Stale => Refresh::Stale,
        }
    }
}

pub async fn refresh_users<F: Feed, V: MapView>(
    feed: &F,
    map: &Mutex<MapController<V>>,
    ticket: Ticket,
) -> Refresh {
    match feed.live_locations().await {
        Ok(locations) => settle(map, ticket, &users_snapshot(&locations)).await,
        Err(e) => {
            error!("User location error: {e}");
            Refresh::Failed
        }
    }
}

pub async fn refresh_alerts<F: Feed, V: MapView>(
    feed: &F,
    map: &Mutex<MapController<V>>,
    ticket: Ticket,
) -> Refresh {
    match feed.alerts().await {
        Ok(alerts) => settle(map, ticket, &alerts_snapshot(&alerts)).await,
        Err(e) => {
            error!("Alert fetch error: {e}");
            Refresh::Failed
        }
    }
}

pub async fn refresh_services<F: Feed, V: MapView>(
    feed: &F,
    map: &Mutex<MapController<V>>,
    ticket: Ticket,
    around: LatLng,
) -> Refresh {
    match feed.nearby_services(around).await {
        Ok(services) => settle(map, ticket, &services_snapshot(&services)).await,
        Err(e) => {
            error!("Nearby services error: {e}");
            Refresh::Failed
        }
    }
}

pub async fn check_alerts<F: Feed, N: Notifier>(
    feed: &F,
    watcher: &Mutex<AlertWatcher>,
    notifier: &N,
) -> Option<EmergencyNotification> {
    let seq = watcher.lock().await.issue();

    let alerts = match feed.alerts().await {
        Ok(alerts) => alerts,
        Err(e) => {
            error!("Alert check error: {e}");
            return None;
        }
    };

    let notification = watcher.lock().await.observe(seq, &alerts)?;
    notifier.notify(&notification);

    Some(notification)
}

async fn settle<V: MapView>(
    map: &Mutex<MapController<V>>,
    ticket: Ticket,
    snapshot: &[MarkerSnapshotEntry],
) -> Refresh {
    let outcome = map.lock().await.apply(ticket, snapshot);

    if outcome == Outcome::Stale {
        debug!("Discarding stale {:?} snapshot #{}", ticket.collection, ticket.seq);
    }

    outcome.into()
}

pub struct Scheduler<F, V: MapView, N> {
    policy: PollingPolicy,
    feed: Arc<F>,
    map: Shared<MapController<V>>,
    watcher: Shared<AlertWatcher>,
    notifier: Arc<N>,
    position: Option<LatLng>,
}

impl<F, V, N> Scheduler<F, V, N>
where
    F: Feed,
    V: MapView + Send + 'static,
    N: Notifier,
{
    pub fn new(
        policy: PollingPolicy,
        feed: Arc<F>,
        map: Shared<MapController<V>>,
        watcher: Shared<AlertWatcher>,
        notifier: Arc<N>,
    ) -> Self {
        Self {
            policy,
            feed,
            map,
            watcher,
            notifier,
            position: None,
        }
    }

    /// Enables the nearby-services fetch and the location reports.
    pub fn with_position(mut self, position: Option<LatLng>) -> Self {
        self.position = position;
        self
    }

    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![
            self.poll_collection(Collection::Users, self.policy.users),
            self.poll_collection(Collection::Alerts, self.policy.alerts),
            self.poll_banner(),
        ];

        match self.position {
            Some(position) => {
                let feed = self.feed.clone();
                let map = self.map.clone();

                tasks.push(tokio::spawn(async move {
                    let ticket = map.lock().await.issue(Collection::Services);
                    refresh_services(&*feed, &map, ticket, position).await;
                }));

                tasks.push(self.report_location(position));
            }
            None => warn!("Location permission is required to show nearby services."),
        }

        tasks
    }

    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let tasks = self.spawn();
        info!("Polling started");

        shutdown.await;

        for task in tasks {
            task.abort();
            let _ = task.await;
        }
        info!("Polling stopped");
    }

    fn poll_collection(&self, collection: Collection, period: Duration) -> JoinHandle<()> {
        let feed = self.feed.clone();
        let map = self.map.clone();

        every(period, move || {
            let feed = feed.clone();
            let map = map.clone();

            async move {
                let ticket = map.lock().await.issue(collection);

                match collection {
                    Collection::Users => refresh_users(&*feed, &map, ticket).await,
                    Collection::Alerts => refresh_alerts(&*feed, &map, ticket).await,
                    Collection::Services => return,
                };
            }
        })
    }

    fn poll_banner(&self) -> JoinHandle<()> {
        let feed = self.feed.clone();
        let watcher = self.watcher.clone();
        let notifier = self.notifier.clone();

        every(self.policy.banner, move || {
            let feed = feed.clone();
            let watcher = watcher.clone();
            let notifier = notifier.clone();

            async move {
                check_alerts(&*feed, &watcher, &*notifier).await;
            }
        })
    }

    fn report_location(&self, position: LatLng) -> JoinHandle<()> {
        let feed = self.feed.clone();

        every(self.policy.location, move || {
            let feed = feed.clone();

            async move {
                if let Err(e) = feed.update_location(position).await {
                    warn!("Location update error: {e}");
                }
            }
        })
    }
}

fn every<T, Fut>(period: Duration, mut tick: T) -> JoinHandle<()>
where
    T: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        // dropped with this task, which aborts every fetch still running
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    in_flight.spawn(tick());
                }
                Some(_) = in_flight.join_next() => {}
            }
        }
    })
}
