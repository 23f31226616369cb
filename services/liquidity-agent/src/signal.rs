//! Trade signal queue
//!
//! Producers (sensor, heartbeat) only enqueue. The executor is the single
//! consumer and drains signals in arrival order.

use std::fmt;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
        }
    }

    /// The reactive counter-side
    pub fn opposite(&self) -> Self {
        match self {
            TradeAction::Buy => TradeAction::Sell,
            TradeAction::Sell => TradeAction::Buy,
        }
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable (action, reason) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSignal {
    pub action: TradeAction,
    pub reason: String,
}

impl TradeSignal {
    pub fn new(action: TradeAction, reason: impl Into<String>) -> Self {
        Self {
            action,
            reason: reason.into(),
        }
    }

    pub fn buy(reason: impl Into<String>) -> Self {
        Self::new(TradeAction::Buy, reason)
    }

    pub fn sell(reason: impl Into<String>) -> Self {
        Self::new(TradeAction::Sell, reason)
    }
}

/// Producer handle, cheap to clone
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: mpsc::UnboundedSender<TradeSignal>,
}

impl SignalSender {
    /// Returns false once the executor has gone away
    pub fn enqueue(&self, signal: TradeSignal) -> bool {
        self.tx.send(signal).is_ok()
    }
}

pub type SignalReceiver = mpsc::UnboundedReceiver<TradeSignal>;

/// Unbounded FIFO, multi-producer single-consumer
pub fn signal_queue() -> (SignalSender, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SignalSender { tx }, rx)
}
