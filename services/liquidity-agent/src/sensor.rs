//! Market Sensor
//!
//! Holds one event-stream connection at a time and cycles
//! `Connecting -> Open -> Backoff -> Connecting` forever. Each event refreshes
//! the market activity clock, may enqueue a reactive trade signal, and feeds
//! the counterparty book.

use futures::{SinkExt, StreamExt};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::amount::short_address;
use crate::backoff::Backoff;
use crate::config::SensorConfig;
use crate::counterparties::CounterpartyBook;
use crate::error::{AgentError, Result};
use crate::events::{parse_message, subscribe_request, MarketEvent};
use crate::ledger::LedgerRpc;
use crate::position::MarketActivity;
use crate::signal::{SignalSender, TradeSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Backoff(Duration),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Open => f.write_str("open"),
            ConnectionState::Backoff(d) => write!(f, "backoff {}s", d.as_secs()),
        }
    }
}

pub struct MarketSensor {
    config: SensorConfig,
    url: String,
    mint: String,
    signals: SignalSender,
    activity: MarketActivity,
    counterparties: CounterpartyBook,
    rpc: Arc<dyn LedgerRpc>,
    lookups: Arc<Semaphore>,
    backoff: Backoff,
    state: ConnectionState,
}

impl MarketSensor {
    pub fn new(
        config: SensorConfig,
        url: &str,
        mint: &str,
        signals: SignalSender,
        activity: MarketActivity,
        counterparties: CounterpartyBook,
        rpc: Arc<dyn LedgerRpc>,
    ) -> Self {
        Self {
            backoff: Backoff::new(config.backoff),
            lookups: Arc::new(Semaphore::new(config.lookup_concurrency.max(1))),
            config,
            url: url.to_string(),
            mint: mint.to_string(),
            signals,
            activity,
            counterparties,
            rpc,
            state: ConnectionState::Connecting,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);
            info!(tag = "SYSTEM", "Sensor connecting to {}", self.url);

            match self.session().await {
                Ok(()) => info!(tag = "SENSOR", "Stream closed"),
                Err(e) => warn!(tag = e.tag(), "Stream disconnected: {}", e),
            }

            let delay = self.backoff.next_delay();
            self.set_state(ConnectionState::Backoff(delay));
            info!(tag = "WARN", "Reconnecting in {}s", delay.as_secs());
            sleep(delay).await;
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!(tag = "SENSOR", "state {} -> {}", self.state, state);
        self.state = state;
    }

    /// One connection lifetime. `Ok` on orderly close.
    ///
    /// A stream that stays silent for `idle_timeout` is pinged; if nothing
    /// arrives for another `idle_timeout` the session ends with `Timeout`.
    async fn session(&mut self) -> Result<()> {
        let connect_timeout = self.config.connect_timeout;
        let (stream, _) = timeout(connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                AgentError::Timeout(format!("stream connect after {}ms", connect_timeout.as_millis()))
            })?
            .map_err(|e| AgentError::Network(format!("stream connect failed: {}", e)))?;

        self.set_state(ConnectionState::Open);
        self.backoff.reset();

        let (mut sink, mut reader) = stream.split();

        sink.send(Message::Text(subscribe_request(self.config.mode, &self.mint)))
            .await
            .map_err(|e| AgentError::Network(format!("subscribe failed: {}", e)))?;
        info!(tag = "SYSTEM", "Connected to market stream, subscribed to {}", short_address(&self.mint));

        let idle_timeout = self.config.idle_timeout;
        let mut awaiting_pong = false;
        loop {
            let msg = match timeout(idle_timeout, reader.next()).await {
                Ok(Some(msg)) => msg,
                Ok(None) => return Ok(()),
                Err(_) if awaiting_pong => {
                    return Err(AgentError::Timeout(format!(
                        "stream idle for {}ms",
                        idle_timeout.as_millis() * 2
                    )));
                }
                Err(_) => {
                    debug!(tag = "SENSOR", "Stream quiet, sending ping");
                    sink.send(Message::Ping(Vec::new()))
                        .await
                        .map_err(|e| AgentError::Network(format!("ping failed: {}", e)))?;
                    awaiting_pong = true;
                    continue;
                }
            };
            awaiting_pong = false;

            match msg {
                Ok(Message::Text(text)) => self.on_text(&text).await,
                Ok(Message::Ping(data)) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        return Err(AgentError::Network(format!("pong failed: {}", e)));
                    }
                }
                Ok(Message::Close(_)) => return Ok(()),
                Ok(_) => {}
                Err(e) => return Err(AgentError::Network(e.to_string())),
            }
        }
    }

    async fn on_text(&self, text: &str) {
        let parsed = {
            let mut rng = rand::thread_rng();
            parse_message(self.config.mode, text, self.config.heuristic_buy_probability, &mut rng)
        };

        match parsed {
            Ok(Some(event)) => self.on_event(event).await,
            Ok(None) => debug!(tag = "SENSOR", "control frame ignored"),
            Err(e) => warn!(tag = e.tag(), "Stream parse: {}", e),
        }
    }

    /// Handle one classified event
    pub async fn on_event(&self, event: MarketEvent) {
        self.activity.touch().await;

        if event.trader.as_deref().is_some_and(|t| self.counterparties.is_own(t)) {
            debug!(tag = "SENSOR", "Own trade observed, no reaction");
            return;
        }

        let Some(side) = event.side else {
            debug!(tag = "SENSOR", "Non-trade event, activity refreshed");
            return;
        };

        let react = rand::thread_rng().gen_bool(self.config.reaction_probability.clamp(0.0, 1.0));
        if react {
            let action = side.opposite();
            let sig = event
                .signature
                .as_deref()
                .map(|s| s.chars().take(8).collect::<String>())
                .unwrap_or_else(|| "-".to_string());
            info!(tag = "SENSOR", "Activity detected ({} {}), queueing {}", side, sig, action);
            self.signals.enqueue(TradeSignal::new(
                action,
                format!("Reactive {} (market {})", action, side),
            ));
        }

        match (event.trader, event.signature) {
            (Some(trader), _) => {
                if self.counterparties.insert(&trader) {
                    debug!(tag = "SENSOR", "Counterparty {} recorded", short_address(&trader));
                }
            }
            (None, Some(signature)) => self.spawn_signer_lookup(signature),
            (None, None) => {}
        }
    }

    /// Resolve the transaction's fee payer after a random delay. Lookups over
    /// the concurrency bound, and failed lookups, are dropped.
    fn spawn_signer_lookup(&self, signature: String) {
        let Ok(permit) = self.lookups.clone().try_acquire_owned() else {
            debug!(tag = "SENSOR", "Signer lookup skipped, {} in flight", self.config.lookup_concurrency);
            return;
        };

        let delay = random_delay(self.config.lookup_delay_min, self.config.lookup_delay_max);
        let rpc = self.rpc.clone();
        let book = self.counterparties.clone();

        tokio::spawn(async move {
            let _permit = permit;
            sleep(delay).await;
            match rpc.transaction_accounts(&signature).await {
                Ok(Some(accounts)) => {
                    if let Some(signer) = accounts.first() {
                        if book.insert(signer) {
                            debug!(tag = "SENSOR", "Counterparty {} recorded", short_address(signer));
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(tag = e.tag(), "Signer lookup failed: {}", e),
            }
        });
    }
}

fn random_delay(min: Duration, max: Duration) -> Duration {
    let lo = min.as_millis() as u64;
    let hi = (max.as_millis() as u64).max(lo);
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}
