//! Executor harness: drives the trade executor against the in-memory ledger
//! and venue, checking routing, sizing and the single-flight guarantee.


use liquidity_agent::config::ExecutionConfig;
use liquidity_agent::error::AgentError;
use liquidity_agent::position::SharedPosition;
use liquidity_agent::{
    signal_queue, LedgerGateway, TradeAction, TradeExecutor, TradeOutcome, TradeSignal,
};
use mock_ledger::{sol, FakeSigner, MockLedger, MockTradeProvider};
use std::sync::Arc;
use std::time::Duration;

const WORKER: &str = "Worker1111111111111111111111111111111111111";
const MINT: &str = "Mint11111111111111111111111111111111111pump";

struct Harness {
    ledger: Arc<MockLedger>,
    provider: Arc<MockTradeProvider>,
    position: SharedPosition,
    executor: TradeExecutor,
}

fn harness(config: ExecutionConfig, dry_run: bool) -> Harness {
    let ledger = Arc::new(MockLedger::new());
    ledger.set_balance(WORKER, "1.0");
    let provider = Arc::new(MockTradeProvider::new());
    let position = SharedPosition::new();
    let gateway = Arc::new(LedgerGateway::new(ledger.clone(), Arc::new(FakeSigner::new(WORKER)), dry_run));
    let executor = TradeExecutor::new(config, MINT, gateway, provider.clone(), position.clone());
    Harness {
        ledger,
        provider,
        position,
        executor,
    }
}

fn no_cooldown() -> ExecutionConfig {
    ExecutionConfig {
        reaction_cooldown: Duration::ZERO,
        ..ExecutionConfig::default()
    }
}

#[tokio::test]
async fn test_buy_spends_balance_minus_gas_reserve() {
    let mut h = harness(ExecutionConfig::default(), false);

    let outcome = h.executor.handle(&TradeSignal::buy("Reactive BUY")).await.unwrap();
    assert!(outcome.is_executed());

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].action, TradeAction::Buy);
    assert_eq!(requests[0].amount, sol("0.98"));
    assert_eq!(requests[0].payer, WORKER);
    assert_eq!(requests[0].mint, MINT);
    assert_eq!(requests[0].pool, "pump");
    assert_eq!(h.ledger.trade_count(), 1);

    let state = h.position.snapshot().await;
    assert!(state.is_active());
    let hold = state.hold_target().unwrap();
    assert!(hold >= Duration::from_secs(45) && hold <= Duration::from_secs(90));
}

#[tokio::test]
async fn test_buy_below_threshold_is_skipped() {
    let mut h = harness(ExecutionConfig::default(), false);
    h.ledger.set_balance(WORKER, "0.4");

    let outcome = h.executor.handle(&TradeSignal::buy("Silence breaker")).await.unwrap();
    match outcome {
        TradeOutcome::Skipped(AgentError::InsufficientFunds { available, required }) => {
            assert_eq!(available, sol("0.4"));
            assert_eq!(required, sol("0.52"));
        }
        other => panic!("expected insufficient funds, got {:?}", other),
    }
    assert!(h.provider.requests().is_empty());
    assert!(!h.position.snapshot().await.is_active());
}

#[tokio::test]
async fn test_sell_sizes_from_token_balance() {
    let mut h = harness(
        ExecutionConfig {
            sell_pct: 50,
            ..no_cooldown()
        },
        false,
    );
    h.ledger.set_token_balance(1_500_000);

    h.executor.handle(&TradeSignal::buy("entry")).await.unwrap();
    let outcome = h.executor.handle(&TradeSignal::sell("Organic heartbeat")).await.unwrap();
    assert!(outcome.is_executed());

    let sell = &h.provider.requests()[1];
    assert_eq!(sell.action, TradeAction::Sell);
    assert_eq!(sell.amount, sol("0.75"));
    assert!(!h.position.snapshot().await.is_active());
}

#[tokio::test]
async fn test_sell_without_position_dumps_inventory() {
    let mut h = harness(ExecutionConfig::default(), false);
    h.ledger.set_token_balance(10_000_000);

    let outcome = h.executor.handle(&TradeSignal::sell("Reactive SELL")).await.unwrap();
    assert!(outcome.is_executed());
    assert_eq!(h.provider.requests()[0].amount, sol("10"));

    let state = h.position.snapshot().await;
    assert!(!state.is_active());
    assert!(state.entry_time().is_none());
}

#[tokio::test]
async fn test_sell_with_no_tokens_does_not_stamp_cooldown() {
    let mut h = harness(ExecutionConfig::default(), false);
    h.ledger.set_token_balance(0);

    let outcome = h.executor.handle(&TradeSignal::sell("Reactive SELL")).await.unwrap();
    assert!(matches!(outcome, TradeOutcome::NothingToSell));
    assert!(h.executor.last_action().is_none());

    // nothing reached the venue, so a buy right after is not gated
    let outcome = h.executor.handle(&TradeSignal::buy("Reactive BUY")).await.unwrap();
    assert!(outcome.is_executed());
}

#[tokio::test]
async fn test_fallback_pool_graduates_on_rejection() {
    let mut h = harness(
        ExecutionConfig {
            fallback_pool: Some("raydium".to_string()),
            ..no_cooldown()
        },
        false,
    );
    h.provider.reject_pool("pump");

    let outcome = h.executor.handle(&TradeSignal::buy("entry")).await.unwrap();
    match outcome {
        TradeOutcome::Executed { pool, .. } => assert_eq!(pool, "raydium"),
        other => panic!("expected execution, got {:?}", other),
    }
    assert_eq!(h.executor.pools().current(), "raydium");

    // later orders go straight to the graduated pool
    h.ledger.set_token_balance(1_000_000);
    h.executor.handle(&TradeSignal::sell("exit")).await.unwrap();

    let pools: Vec<String> = h.provider.requests().into_iter().map(|r| r.pool).collect();
    assert_eq!(pools, vec!["pump", "raydium", "raydium"]);
    assert_eq!(h.ledger.trade_count(), 2);
}

#[tokio::test]
async fn test_rejection_without_fallback_is_dropped() {
    let mut h = harness(ExecutionConfig::default(), false);
    h.provider.reject_pool("pump");

    let err = h.executor.handle(&TradeSignal::buy("entry")).await.unwrap_err();
    assert!(err.is_venue_rejection());
    assert_eq!(h.provider.requests().len(), 1);
    assert_eq!(h.ledger.trade_count(), 0);
    assert!(!h.position.snapshot().await.is_active());

    // the attempt reached the venue, so it counts against the cooldown
    assert!(h.executor.last_action().is_some());
    let outcome = h.executor.handle(&TradeSignal::buy("retry")).await.unwrap();
    assert!(matches!(outcome, TradeOutcome::Skipped(AgentError::Cooldown { .. })));
}

#[tokio::test]
async fn test_dry_run_never_submits() {
    let mut h = harness(no_cooldown(), true);
    h.ledger.set_token_balance(0);

    assert!(h.executor.handle(&TradeSignal::buy("entry")).await.unwrap().is_executed());
    assert!(h.position.snapshot().await.is_active());

    let outcome = h.executor.handle(&TradeSignal::sell("exit")).await.unwrap();
    match outcome {
        TradeOutcome::Executed { signature, .. } => assert!(signature.starts_with("DRYRUN")),
        other => panic!("expected simulated execution, got {:?}", other),
    }
    assert!(!h.position.snapshot().await.is_active());

    assert!(h.provider.requests().is_empty());
    assert_eq!(h.ledger.trade_count(), 0);
}

#[tokio::test]
async fn test_queue_is_drained_one_submission_at_a_time() {
    let h = harness(no_cooldown(), false);
    h.ledger.set_balance(WORKER, "5.0");
    h.ledger.set_token_balance(1_000_000);
    h.ledger.set_send_delay(Duration::from_millis(20));

    let (tx, rx) = signal_queue();
    let producer = tx.clone();
    for i in 0..6 {
        let signal = if i % 2 == 0 {
            TradeSignal::buy(format!("buy {}", i))
        } else {
            TradeSignal::sell(format!("sell {}", i))
        };
        if i % 3 == 0 {
            assert!(producer.enqueue(signal));
        } else {
            assert!(tx.enqueue(signal));
        }
    }
    drop(tx);
    drop(producer);

    let executor = h.executor;
    tokio::time::timeout(Duration::from_secs(5), executor.run(rx))
        .await
        .expect("executor should stop once producers are gone");

    assert_eq!(h.ledger.trade_count(), 6);
    assert_eq!(h.ledger.max_in_flight(), 1);
}

#[tokio::test]
async fn test_failures_do_not_stop_the_loop() {
    let h = harness(no_cooldown(), false);
    h.provider.reject_pool("pump");

    let (tx, rx) = signal_queue();
    tx.enqueue(TradeSignal::buy("rejected"));
    tx.enqueue(TradeSignal::sell("also rejected"));
    drop(tx);

    h.ledger.set_token_balance(1_000_000);
    tokio::time::timeout(Duration::from_secs(5), h.executor.run(rx))
        .await
        .expect("executor should drain the queue");

    assert_eq!(h.provider.requests().len(), 2);
    assert_eq!(h.ledger.trade_count(), 0);
}

#[tokio::test]
async fn test_unsupported_token_decimals_fail_the_sell_only() {
    let h = harness(
        ExecutionConfig {
            token_decimals: 25,
            ..no_cooldown()
        },
        false,
    );
    h.ledger.set_token_balance(1_000_000);

    let (tx, rx) = signal_queue();
    tx.enqueue(TradeSignal::sell("oversized scale"));
    tx.enqueue(TradeSignal::buy("after the failed sell"));
    drop(tx);

    tokio::time::timeout(Duration::from_secs(5), h.executor.run(rx))
        .await
        .expect("executor should drain the queue");

    let requests = h.provider.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].action, TradeAction::Buy);
    assert_eq!(h.ledger.trade_count(), 1);
}
