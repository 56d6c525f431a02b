//! Price-chart loader backed by the `tradesAggregated` view.
//!
//! Queries are re-issued whenever the network configuration or the block
//! tick emits. A new trigger aborts the query in flight, so the output only
//! ever carries the result of the latest query.

pub mod latest;
pub mod parse;

use std::sync::Arc;

use chrono::{DateTime, Days, LocalResult, Months, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::{ChartClock, NetworkConfig};
use crate::constants;
use crate::http::client::RequestError;
use crate::model::{IntervalUnit, PriceChartDataPoint, TradingPair};
use crate::vulcan0x::api_caller::QueryService;
use crate::vulcan0x::query::ViewQuery;
use latest::LatestTask;

pub type ChartUpdate = Result<Vec<PriceChartDataPoint>, LoaderError>;

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Query failed: {0}")]
    Request(#[from] RequestError),
    #[error("Cannot look back {0} {1} from now")]
    InvalidWindow(u32, IntervalUnit),
    #[error("Query task failed: {0}")]
    TaskFailed(String),
}

/// Start of the day `interval` units before `now`, on `now`'s calendar.
pub fn lower_bound<Tz: TimeZone>(
    now: &DateTime<Tz>,
    interval: u32,
    unit: IntervalUnit,
) -> Result<DateTime<Utc>, LoaderError> {
    let invalid = || LoaderError::InvalidWindow(interval, unit);
    let shifted = match unit {
        IntervalUnit::Hour => now
            .clone()
            .checked_sub_signed(TimeDelta::hours(interval as i64)),
        IntervalUnit::Day => now.clone().checked_sub_days(Days::new(interval as u64)),
        IntervalUnit::Week => now
            .clone()
            .checked_sub_days(Days::new(interval as u64 * 7)),
        IntervalUnit::Month => now.clone().checked_sub_months(Months::new(interval)),
    }
    .ok_or_else(invalid)?;

    let midnight = shifted.date_naive().and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
    start_of_day(&now.timezone(), midnight).ok_or_else(invalid)
}

const MAX_DST_GAP_MINUTES: i64 = 24 * 60;

// First existing instant of the day. Where a DST switch skips midnight the
// day starts at the end of the gap, e.g. 01:00.
fn start_of_day<Tz: TimeZone>(tz: &Tz, midnight: chrono::NaiveDateTime) -> Option<DateTime<Utc>> {
    for minutes in 0..=MAX_DST_GAP_MINUTES {
        let local = midnight.checked_add_signed(TimeDelta::minutes(minutes))?;
        match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => return Some(earliest.with_timezone(&Utc)),
            LocalResult::None => continue,
        }
    }
    None
}

/// ISO-8601 in UTC with milliseconds, e.g. `2018-05-01T22:00:00.000Z`.
pub fn to_iso_string(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Builds the `tradesAggregated` query for one market and window.
pub fn aggregated_trades_query(
    pair: &TradingPair,
    unit: IntervalUnit,
    borderline: &DateTime<Utc>,
    tz_offset_minutes: i32,
) -> ViewQuery {
    let mut options = Map::new();
    options.insert("timeUnit".into(), json!(unit.as_str()));
    options.insert("tzOffset".into(), json!({ "minutes": tz_offset_minutes }));

    ViewQuery {
        view: constants::TRADES_AGGREGATED_VIEW.into(),
        options,
        filter: json!({
            "market": { "equalTo": pair.market() },
            "date": { "greaterThan": to_iso_string(borderline) },
        }),
        fields: constants::TRADES_AGGREGATED_FIELDS
            .iter()
            .map(|f| f.to_string())
            .collect(),
        order_by: None,
    }
}

/// Streams price-chart points for `pair` over the last `interval` units.
///
/// Nothing is queried until both `config_rx` and `tick_rx` have produced a
/// value; after that every value on either of them issues a fresh query
/// against the latest config. A failing query is delivered as the final
/// `Err`. Dropping the returned receiver stops the loader.
pub fn load_aggregated_trades(
    service: Arc<dyn QueryService>,
    interval: u32,
    unit: IntervalUnit,
    clock: ChartClock,
    config_rx: mpsc::Receiver<NetworkConfig>,
    tick_rx: mpsc::Receiver<u64>,
    pair: TradingPair,
) -> mpsc::Receiver<ChartUpdate> {
    let (tx, rx) = mpsc::channel(constants::LOADER_OUTPUT_BUFFER);

    let now = Utc::now();
    let query = match clock {
        ChartClock::Local => lower_bound(&now.with_timezone(&chrono::Local), interval, unit),
        ChartClock::Named(tz) => lower_bound(&now.with_timezone(&tz), interval, unit),
    }
    .map(|borderline| aggregated_trades_query(&pair, unit, &borderline, clock.offset_minutes(&now)));

    match query {
        Ok(query) => {
            log::info!(
                "loading {} bars for {} since {}",
                unit,
                pair,
                query.filter["date"]["greaterThan"]
            );
            tokio::spawn(run(service, query, clock, config_rx, tick_rx, tx));
        }
        Err(err) => {
            log::error!("not loading {}: {}", pair, err);
            // capacity is at least one, the receiver is still held here
            let _ = tx.try_send(Err(err));
        }
    }
    rx
}

async fn run(
    service: Arc<dyn QueryService>,
    query: ViewQuery,
    clock: ChartClock,
    mut config_rx: mpsc::Receiver<NetworkConfig>,
    mut tick_rx: mpsc::Receiver<u64>,
    tx: mpsc::Sender<ChartUpdate>,
) {
    let mut in_flight: LatestTask<Result<Vec<Value>, RequestError>> = LatestTask::new();
    let mut config: Option<NetworkConfig> = None;
    let mut ticked = false;
    let mut config_open = true;
    let mut tick_open = true;

    loop {
        let inputs_done = (!config_open && (!tick_open || config.is_none()))
            || (!tick_open && !ticked);
        if inputs_done && !in_flight.is_running() {
            break;
        }

        // Inputs are drained before results so a newer trigger always wins.
        let triggered = tokio::select! {
            biased;
            _ = tx.closed() => {
                in_flight.cancel();
                log::debug!("chart consumer went away, stopping loader");
                break;
            }
            msg = config_rx.recv(), if config_open && !inputs_done => match msg {
                Some(c) => {
                    config = Some(c);
                    true
                }
                None => {
                    config_open = false;
                    false
                }
            },
            msg = tick_rx.recv(), if tick_open && !inputs_done => match msg {
                Some(_) => {
                    ticked = true;
                    true
                }
                None => {
                    tick_open = false;
                    false
                }
            },
            joined = in_flight.join(), if in_flight.is_running() => {
                let update = match joined {
                    Ok(Ok(rows)) => Ok(rows
                        .iter()
                        .map(|row| parse::parse_aggregated_data(row, &clock))
                        .collect::<Vec<_>>()),
                    Ok(Err(err)) => Err(LoaderError::Request(err)),
                    Err(err) => Err(LoaderError::TaskFailed(err.to_string())),
                };
                let failed = update.is_err();
                if let Err(err) = &update {
                    log::error!("{} query failed: {}", query.view, err);
                }
                if tx.send(update).await.is_err() || failed {
                    break;
                }
                false
            }
        };

        if !triggered || !ticked {
            continue;
        }
        if let Some(config) = &config {
            let url = &config.oasis_data_service.url;
            if in_flight.replace(service.query(url, query.clone())) {
                log::debug!("superseded in-flight {} query", query.view);
            }
            log::debug!("issued {} query to {}", query.view, url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vulcan0x::api_caller::QueryFuture;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    enum Reply {
        Now(Result<Vec<Value>, RequestError>),
        After(oneshot::Receiver<()>, Vec<Value>),
    }

    struct FakeService {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<(String, ViewQuery)>>,
    }

    impl FakeService {
        fn with(replies: Vec<Reply>) -> Arc<Self> {
            Arc::new(FakeService {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, ViewQuery)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl QueryService for FakeService {
        fn query(&self, url: &str, query: ViewQuery) -> QueryFuture {
            self.calls.lock().unwrap().push((url.to_string(), query));
            let reply = self.replies.lock().unwrap().pop_front();
            Box::pin(async move {
                match reply {
                    Some(Reply::Now(result)) => result,
                    Some(Reply::After(gate, rows)) => {
                        let _ = gate.await;
                        Ok(rows)
                    }
                    None => Ok(Vec::new()),
                }
            })
        }
    }

    fn row(close: &str) -> Value {
        json!({
            "date": "2018-05-02T00:00:00Z",
            "open": "1", "close": close, "min": "0.5", "max": "2", "volumeBase": "10",
        })
    }

    fn network(url: &str) -> NetworkConfig {
        NetworkConfig::new(url).unwrap()
    }

    fn utc() -> ChartClock {
        ChartClock::parse("UTC").unwrap()
    }

    #[test]
    fn lower_bound_is_start_of_day_in_iso() {
        let warsaw: chrono_tz::Tz = "Europe/Warsaw".parse().unwrap();
        let now = warsaw.with_ymd_and_hms(2018, 5, 31, 15, 30, 0).unwrap();

        let days = lower_bound(&now, 30, IntervalUnit::Day).unwrap();
        assert_eq!(to_iso_string(&days), "2018-04-30T22:00:00.000Z");

        let hours = lower_bound(&now, 16, IntervalUnit::Hour).unwrap();
        assert_eq!(to_iso_string(&hours), "2018-05-29T22:00:00.000Z");

        let weeks = lower_bound(&now, 2, IntervalUnit::Week).unwrap();
        assert_eq!(to_iso_string(&weeks), "2018-05-16T22:00:00.000Z");

        // month arithmetic clamps to the shorter month, winter time in February
        let months = lower_bound(&now, 3, IntervalUnit::Month).unwrap();
        assert_eq!(to_iso_string(&months), "2018-02-27T23:00:00.000Z");
    }

    #[test]
    fn lower_bound_skips_dst_gap_at_midnight() {
        // Beirut moves to summer time at midnight, 2018-03-25 starts at 01:00 +03:00
        let beirut: chrono_tz::Tz = "Asia/Beirut".parse().unwrap();
        let now = beirut.with_ymd_and_hms(2018, 3, 26, 12, 0, 0).unwrap();

        let start = lower_bound(&now, 1, IntervalUnit::Day).unwrap();
        assert_eq!(to_iso_string(&start), "2018-03-24T22:00:00.000Z");
        assert_eq!(
            start.with_timezone(&beirut).format("%Y-%m-%d %H:%M").to_string(),
            "2018-03-25 01:00"
        );

        // the day after the switch is unaffected
        let today = lower_bound(&now, 0, IntervalUnit::Day).unwrap();
        assert_eq!(to_iso_string(&today), "2018-03-25T21:00:00.000Z");
    }

    #[test]
    fn query_filters_market_and_window() {
        let borderline = Utc.with_ymd_and_hms(2018, 4, 30, 22, 0, 0).unwrap();
        let query = aggregated_trades_query(
            &TradingPair::new("WETH", "DAI"),
            IntervalUnit::Day,
            &borderline,
            120,
        );
        assert_eq!(query.view, "tradesAggregated");
        assert_eq!(query.options["timeUnit"], json!("day"));
        assert_eq!(query.options["tzOffset"], json!({ "minutes": 120 }));
        assert_eq!(
            query.filter,
            json!({
                "market": { "equalTo": "WETHDAI" },
                "date": { "greaterThan": "2018-04-30T22:00:00.000Z" },
            })
        );
        assert_eq!(
            query.fields,
            vec!["date", "open", "close", "min", "max", "volumeBase"]
        );
        assert_eq!(query.order_by, None);
    }

    #[tokio::test]
    async fn waits_for_both_inputs_then_requeries_on_each() {
        let service = FakeService::with(vec![
            Reply::Now(Ok(vec![row("1")])),
            Reply::Now(Ok(vec![row("2")])),
            Reply::Now(Ok(vec![row("3")])),
        ]);
        let (config_tx, config_rx) = mpsc::channel(4);
        let (tick_tx, tick_rx) = mpsc::channel(4);
        let mut out = load_aggregated_trades(
            service.clone(),
            30,
            IntervalUnit::Day,
            utc(),
            config_rx,
            tick_rx,
            TradingPair::new("WETH", "DAI"),
        );

        config_tx.send(network("https://a.example/")).await.unwrap();
        tick_tx.send(1).await.unwrap();
        let first = out.recv().await.unwrap().unwrap();
        assert_eq!(first[0].close, 1.0);

        tick_tx.send(2).await.unwrap();
        assert_eq!(out.recv().await.unwrap().unwrap()[0].close, 2.0);

        config_tx.send(network("https://b.example/")).await.unwrap();
        assert_eq!(out.recv().await.unwrap().unwrap()[0].close, 3.0);

        drop(config_tx);
        drop(tick_tx);
        assert!(out.recv().await.is_none());

        let urls: Vec<String> = service.calls().into_iter().map(|(url, _)| url).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/", "https://a.example/", "https://b.example/"]
        );
    }

    #[tokio::test]
    async fn later_trigger_discards_earlier_result() {
        let (release_first, first_gate) = oneshot::channel();
        let service = FakeService::with(vec![
            Reply::After(first_gate, vec![row("111")]),
            Reply::Now(Ok(vec![row("222")])),
        ]);
        let (config_tx, config_rx) = mpsc::channel(4);
        let (tick_tx, tick_rx) = mpsc::channel(4);
        let mut out = load_aggregated_trades(
            service.clone(),
            7,
            IntervalUnit::Day,
            utc(),
            config_rx,
            tick_rx,
            TradingPair::new("WETH", "DAI"),
        );

        config_tx.send(network("https://a.example/")).await.unwrap();
        tick_tx.send(1).await.unwrap();
        tick_tx.send(2).await.unwrap();

        let update = out.recv().await.unwrap().unwrap();
        assert_eq!(update.len(), 1);
        assert_eq!(update[0].close, 222.0);

        // the first query was aborted, releasing it produces nothing
        let _ = release_first.send(());
        drop(config_tx);
        drop(tick_tx);
        assert!(out.recv().await.is_none());
        assert_eq!(service.calls().len(), 2);
    }

    #[tokio::test]
    async fn failed_query_terminates_stream() {
        let service = FakeService::with(vec![Reply::Now(Err(RequestError::QueryError(
            "boom".into(),
        )))]);
        let (config_tx, config_rx) = mpsc::channel(4);
        let (tick_tx, tick_rx) = mpsc::channel(4);
        let mut out = load_aggregated_trades(
            service.clone(),
            1,
            IntervalUnit::Hour,
            utc(),
            config_rx,
            tick_rx,
            TradingPair::new("MKR", "DAI"),
        );

        config_tx.send(network("https://a.example/")).await.unwrap();
        tick_tx.send(1).await.unwrap();

        match out.recv().await {
            Some(Err(LoaderError::Request(RequestError::QueryError(msg)))) => {
                assert_eq!(msg, "boom")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(out.recv().await.is_none());
        assert!(tick_tx.send(2).await.is_err());
        assert!(config_tx.send(network("https://b.example/")).await.is_err());
        assert_eq!(service.calls().len(), 1);
    }

    #[tokio::test]
    async fn input_closing_before_emitting_completes_stream() {
        let service = FakeService::with(Vec::new());
        let (config_tx, config_rx) = mpsc::channel(4);
        let (tick_tx, tick_rx) = mpsc::channel::<u64>(4);
        let mut out = load_aggregated_trades(
            service.clone(),
            1,
            IntervalUnit::Day,
            utc(),
            config_rx,
            tick_rx,
            TradingPair::new("WETH", "DAI"),
        );

        config_tx.send(network("https://a.example/")).await.unwrap();
        drop(tick_tx);
        assert!(out.recv().await.is_none());
        assert!(service.calls().is_empty());
    }
}
