//! End-to-end rounds of the ping/pong harness
//!
//! Every round must exchange exactly `2 x repeat` messages, in process and
//! over loopback TCP, in both actor styles.

use courier_actors::ExecutorSettings;
use courier_pingpong::{bench, run_round, BenchConfig, Mode, Style};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(30);

fn small_config(mode: Mode, style: Style) -> BenchConfig {
    BenchConfig {
        repeat: 20_000,
        clients: 4,
        initial_burst: 100,
        max_rounds: 2,
        mode,
        style,
        ..BenchConfig::default()
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_local_round_counts_every_message() {
    for style in [Style::Post, Style::Await] {
        let config = small_config(Mode::Local, style);
        let report = timeout(WAIT, run_round(&config, 1)).await.unwrap().unwrap();

        assert_eq!(report.clients, 4);
        assert_eq!(report.messages, 2 * config.repeat, "style {:?}", style);
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_tcp_round_counts_every_message() {
    for style in [Style::Post, Style::Await] {
        let config = small_config(Mode::Tcp, style);
        let report = timeout(WAIT, run_round(&config, 1)).await.unwrap().unwrap();

        assert_eq!(report.messages, 2 * config.repeat, "style {:?}", style);
    }
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_uneven_split_reports_measured_count() {
    let config = BenchConfig {
        repeat: 10_003,
        clients: 4,
        ..small_config(Mode::Local, Style::Post)
    };
    let report = timeout(WAIT, run_round(&config, 1)).await.unwrap().unwrap();

    assert_eq!(report.messages, 2 * 4 * 2_500);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_bounded_mailboxes_complete() {
    let config = BenchConfig {
        executor: ExecutorSettings::bounded(4_096),
        ..small_config(Mode::Local, Style::Post)
    };
    let report = timeout(WAIT, run_round(&config, 1)).await.unwrap().unwrap();

    assert_eq!(report.messages, 2 * config.repeat);
}

#[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 2))]
async fn test_run_stops_at_max_rounds() {
    let config = BenchConfig {
        repeat: 2_000,
        max_rounds: 2,
        ..small_config(Mode::Local, Style::Post)
    };

    let mut rounds = Vec::new();
    let tracker = timeout(WAIT, bench::run(&config, |report, _| rounds.push(report.round)))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(rounds, vec![1, 2]);
    assert_eq!(tracker.rounds(), 2);
}

#[tokio::test]
async fn test_zero_clients_rejected() {
    let config = BenchConfig {
        clients: 0,
        ..BenchConfig::default()
    };
    assert!(run_round(&config, 1).await.is_err());
}

#[tokio::test]
async fn test_mailbox_smaller_than_burst_rejected_before_wiring() {
    let config = BenchConfig {
        executor: ExecutorSettings::bounded(50),
        ..small_config(Mode::Local, Style::Post)
    };
    let err = run_round(&config, 1).await.unwrap_err();
    assert!(err.to_string().contains("queue_capacity"));
}
