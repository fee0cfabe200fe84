use std::io::Write;

use tracing::{debug, info};

use crate::{
    error::TaxLotError,
    feed::{OrderRecord, TradeAction},
    manager::{LotManager, OversellPolicy},
    report::write_report,
};

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub buys: usize,
    pub sells: usize,
    pub skipped: usize,
    pub records_written: usize,
}

/// Applies a single order to `manager`. Returns false if the order was skipped.
pub fn apply_order(manager: &mut LotManager, order: &OrderRecord) -> Result<bool, TaxLotError> {
    match &order.trade_action {
        TradeAction::Buy => {
            info!(symbol = %order.symbol, date = %order.trade_date, "BUY {}@{}", order.price, order.qty);
            manager.open(&order.symbol, order.price()?, order.trade_date()?, order.qty()?)?;
        }
        TradeAction::Sell => {
            info!(symbol = %order.symbol, date = %order.trade_date, "SELL {}@{}", order.price, order.qty);
            manager.close(&order.symbol, order.price()?, order.trade_date()?, order.qty()?)?;
        }
        TradeAction::Other(action) => {
            debug!(%action, symbol = %order.symbol, "Skipping order with unrecognized trade action");
            return Ok(false);
        }
    }
    Ok(true)
}

/// Runs a whole batch: applies every order of `orders` in sequence, then writes the report to
/// `sink`. The first error aborts the run.
pub fn run<I, W>(
    orders: I,
    sink: &mut W,
    oversell_policy: OversellPolicy,
) -> Result<RunStats, TaxLotError>
where
    I: IntoIterator<Item = Result<(usize, OrderRecord), TaxLotError>>,
    W: Write,
{
    let mut manager = LotManager::new(oversell_policy);
    let mut stats = RunStats::default();

    for order in orders {
        let (line, order) = order?;
        let applied = apply_order(&mut manager, &order).map_err(|e| e.at_line(line))?;
        match (applied, &order.trade_action) {
            (false, _) => stats.skipped += 1,
            (true, TradeAction::Sell) => stats.sells += 1,
            (true, _) => stats.buys += 1,
        }
    }

    for asset in manager.summary()? {
        info!(
            asset = %asset.asset,
            open = asset.open_units,
            closed = asset.closed_units,
            realized = %asset.realized_profit_or_loss,
            "Asset summary"
        );
    }

    stats.records_written = write_report(&manager, sink)?;
    info!(?stats, "Run complete");

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::{apply_order, run, RunStats};
    use crate::{
        error::TaxLotError,
        feed::{OrderFeed, OrderRecord, TradeAction},
        manager::{LotManager, OversellPolicy},
    };

    const HEADER: &str = "Trade Action,Symbol,Trade Date,Price,Qty\n";

    fn run_feed(body: &str, policy: OversellPolicy) -> Result<(RunStats, String), TaxLotError> {
        let feed = OrderFeed::new(Cursor::new(format!("{HEADER}{body}")))?;
        let mut out = Vec::new();
        let stats = run(feed, &mut out, policy)?;
        Ok((stats, String::from_utf8(out).expect("Report is not UTF-8")))
    }

    #[test]
    fn test_unknown_action_is_noop() -> Result<(), TaxLotError> {
        let mut manager = LotManager::default();
        let hold = OrderRecord {
            trade_action: TradeAction::from("HOLD"),
            symbol: "AAPL".to_string(),
            trade_date: "not a date".to_string(),
            price: "oops".to_string(),
            qty: "10".to_string(),
        };

        assert!(!apply_order(&mut manager, &hold)?);
        assert_eq!(manager.open_lots().iter().count(), 0);
        assert_eq!(manager.closed_lots().iter().count(), 0);

        Ok(())
    }

    #[test]
    fn test_run_writes_report() -> Result<(), TaxLotError> {
        let body = "BUY,AAPL,2024-01-01,100.00,3\n\
                    buy,MSFT,2024-01-01 10:00:00,300.00,1\n\
                    HOLD,AAPL,2024-01-15,105.00,3\n\
                    SELL,AAPL,2024-02-01,90.00,-2\n";
        let (stats, report) = run_feed(body, OversellPolicy::Truncate)?;

        assert_eq!(
            stats,
            RunStats {
                buys: 2,
                sells: 1,
                skipped: 1,
                records_written: 4,
            }
        );
        let lines: Vec<_> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "asset,open_date,open_time,open_price,close_date,close_time,close_price,profit_or_loss,profit,loss",
                "AAPL,2024-01-01,00:00:00,100.00,2024-02-01,00:00:00,90.00,-10.00,,-10.00",
                "AAPL,2024-01-01,00:00:00,100.00,2024-02-01,00:00:00,90.00,-10.00,,-10.00",
                "AAPL,2024-01-01,00:00:00,100.00,,,,0,,",
                "MSFT,2024-01-01,10:00:00,300.00,,,,0,,",
            ]
        );

        Ok(())
    }

    #[test]
    fn test_run_under_fulfilled_sell() -> Result<(), TaxLotError> {
        let body = "BUY,AAPL,2024-01-01,100.00,2\nSELL,AAPL,2024-02-01,90.00,5\n";

        let (stats, _) = run_feed(body, OversellPolicy::Truncate)?;
        assert_eq!(stats.records_written, 2);

        let err = run_feed(body, OversellPolicy::Fail).expect_err("Oversold under the fail policy");
        assert_eq!(
            err.to_string(),
            "Line 3: Cannot sell 5 units of AAPL: only 2 open"
        );

        Ok(())
    }

    #[test]
    fn test_run_with_quoted_description_column() -> Result<(), TaxLotError> {
        let input = "Type,Trade Date,Settle Date,Symbol,Description,Trade Action,Qty,Price\n\
                     order,2024-01-01T15:00:00Z,,AAPL,\"Apple, Inc.\",buy,5,100\n\
                     order,2024-02-01T15:00:00Z,,AAPL,\"Apple, Inc.\",sell,2,\"1,000.00\"\n";
        let feed = OrderFeed::new(Cursor::new(input))?;
        let mut out = Vec::new();
        let stats = run(feed, &mut out, OversellPolicy::Truncate)?;

        assert_eq!(
            stats,
            RunStats {
                buys: 1,
                sells: 1,
                skipped: 0,
                records_written: 5,
            }
        );
        let report = String::from_utf8(out).expect("Report is not UTF-8");
        assert_eq!(
            report.lines().nth(1),
            Some("AAPL,2024-01-01,15:00:00,100,2024-02-01,15:00:00,1000.00,900.00,900.00,")
        );

        Ok(())
    }

    #[test]
    fn test_run_aborts_on_bad_record() {
        let err = run_feed(
            "BUY,AAPL,2024-01-01,100.00,2\nBUY,AAPL,2024-99-01,100.00,2\n",
            OversellPolicy::Truncate,
        )
        .expect_err("Ran a feed with an invalid date");
        assert!(matches!(err, TaxLotError::Record { line: 3, .. }));

        run_feed("SELL,AAPL,2024-01-01,abc,2\n", OversellPolicy::Truncate)
            .expect_err("Ran a feed with an invalid price");

        let err = run_feed("BUY,AAPL,2024-01-01,100.00\n", OversellPolicy::Truncate)
            .expect_err("Ran a feed with a short record");
        assert!(matches!(err, TaxLotError::Record { line: 2, .. }));
    }
}
