//! Heartbeat Controller
//!
//! On every poll tick: force an exit once the hold target has elapsed, or
//! force an entry once the market has been silent too long. A forced signal
//! is issued once per condition; it is only repeated after `retry_after` if
//! the condition still holds (e.g. the executor dropped it).

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::HeartbeatConfig;
use crate::gateway::LedgerGateway;
use crate::position::{MarketActivity, SharedPosition};
use crate::signal::{SignalSender, TradeAction, TradeSignal};

pub const HOLD_EXIT_REASON: &str = "Organic heartbeat";
pub const SILENCE_ENTRY_REASON: &str = "Silence breaker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Forced {
    action: TradeAction,
    at: Instant,
    /// Entry time of the position the exit was forced for
    position: Option<Instant>,
}

pub struct HeartbeatController {
    config: HeartbeatConfig,
    position: SharedPosition,
    activity: MarketActivity,
    signals: SignalSender,
    last_forced: Option<Forced>,
}

impl HeartbeatController {
    pub fn new(
        config: HeartbeatConfig,
        position: SharedPosition,
        activity: MarketActivity,
        signals: SignalSender,
    ) -> Self {
        Self {
            config,
            position,
            activity,
            signals,
            last_forced: None,
        }
    }

    /// Run both checks once. Returns the action enqueued, if any.
    pub async fn tick(&mut self, now: Instant) -> Option<TradeAction> {
        let position = self.position.snapshot().await;

        if let Some(entry) = position.entry() {
            if !position.hold_elapsed(now) {
                return None;
            }
            if !self.should_force(TradeAction::Sell, Some(entry.entry_time), now) {
                return None;
            }
            let held = now.saturating_duration_since(entry.entry_time);
            info!(tag = "HEARTBEAT", "Organic hold ({}s) finished", held.as_secs());
            return self.force(TradeAction::Sell, HOLD_EXIT_REASON, Some(entry.entry_time), now);
        }

        let silence = self.activity.silence(now).await;
        if silence <= self.config.silence_timeout {
            return None;
        }
        if !self.should_force(TradeAction::Buy, None, now) {
            return None;
        }
        info!(tag = "HEARTBEAT", "Market silent for {}s. Injecting volume.", silence.as_secs());
        self.force(TradeAction::Buy, SILENCE_ENTRY_REASON, None, now)
    }

    fn should_force(&self, action: TradeAction, position: Option<Instant>, now: Instant) -> bool {
        match self.last_forced {
            Some(last) if last.action == action && last.position == position => {
                now.saturating_duration_since(last.at) >= self.config.retry_after
            }
            _ => true,
        }
    }

    fn force(
        &mut self,
        action: TradeAction,
        reason: &str,
        position: Option<Instant>,
        now: Instant,
    ) -> Option<TradeAction> {
        if !self.signals.enqueue(TradeSignal::new(action, reason)) {
            warn!(tag = "HEARTBEAT", "Signal queue closed, {} not queued", action);
            return None;
        }
        self.last_forced = Some(Forced {
            action,
            at: now,
            position,
        });
        Some(action)
    }

    /// Tick forever on the poll interval; log the wallet balance on the
    /// monitor interval while flat.
    pub async fn run(mut self, gateway: Arc<LedgerGateway>) {
        info!(tag = "SYSTEM", "Heartbeat active (poll {}s)", self.config.poll_interval.as_secs());

        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let monitor_every = self.config.monitor_interval.max(Duration::from_secs(1));
        let mut monitor = interval(monitor_every);
        monitor.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    self.tick(Instant::now()).await;
                }
                _ = monitor.tick() => {
                    if self.position.snapshot().await.is_active() {
                        continue;
                    }
                    // a slow RPC must not hold up the poll tick
                    let gateway = gateway.clone();
                    let deadline = monitor_every;
                    tokio::spawn(async move {
                        match timeout(deadline, gateway.balance()).await {
                            Ok(Ok(balance)) => info!(tag = "MONITOR", "Pulse check | Worker balance: {:.4} SOL", balance),
                            Ok(Err(e)) => warn!(tag = e.tag(), "Balance check failed: {}", e),
                            Err(_) => debug!(tag = "MONITOR", "Balance check timed out after {}s", deadline.as_secs()),
                        }
                    });
                }
            }
        }
    }
}
