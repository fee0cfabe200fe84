use std::{fmt::Display, io::Write};

use rust_decimal::Decimal;

use crate::{error::TaxLotError, lot::Lot, manager::LotManager};

pub const HEADER: &str = "asset,open_date,open_time,open_price,close_date,close_time,close_price,profit_or_loss,profit,loss";

/// One output row. Values that do not apply to the lot (close side of an open lot, profit of a
/// losing lot, ...) are `None` and render as empty cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotRecord {
    pub asset: String,
    pub open_date: Option<String>,
    pub open_time: Option<String>,
    pub open_price: Option<Decimal>,
    pub close_date: Option<String>,
    pub close_time: Option<String>,
    pub close_price: Option<Decimal>,
    pub profit_or_loss: Decimal,
    pub profit: Option<Decimal>,
    pub loss: Option<Decimal>,
}

impl TryFrom<&Lot> for LotRecord {
    type Error = TaxLotError;

    fn try_from(lot: &Lot) -> Result<Self, Self::Error> {
        Ok(LotRecord {
            asset: lot.asset().to_string(),
            open_date: lot.open_date(),
            open_time: lot.open_time(),
            open_price: lot.open_price(),
            close_date: lot.close_date(),
            close_time: lot.close_time(),
            close_price: lot.close_price(),
            profit_or_loss: lot.profit_or_loss()?,
            profit: lot.profit()?,
            loss: lot.loss()?,
        })
    }
}

struct Cell<'a, T>(&'a Option<T>);

impl<T: Display> Display for Cell<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => write!(f, "{value}"),
            None => Ok(()),
        }
    }
}

impl Display for LotRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{}",
            self.asset,
            Cell(&self.open_date),
            Cell(&self.open_time),
            Cell(&self.open_price),
            Cell(&self.close_date),
            Cell(&self.close_time),
            Cell(&self.close_price),
            self.profit_or_loss,
            Cell(&self.profit),
            Cell(&self.loss),
        )
    }
}

/// Output rows for every lot: closed lots first, then open lots. Within each book assets come in
/// first-seen order and lots in `Lot` order.
pub fn records(manager: &LotManager) -> Result<Vec<LotRecord>, TaxLotError> {
    manager
        .closed_lots()
        .lots()
        .chain(manager.open_lots().lots())
        .map(LotRecord::try_from)
        .collect()
}

/// Writes the header and one CSV row per lot to `sink`. Returns the number of rows written.
pub fn write_report<W: Write>(manager: &LotManager, sink: &mut W) -> Result<usize, TaxLotError> {
    let records = records(manager)?;

    writeln!(sink, "{HEADER}")?;
    for record in &records {
        writeln!(sink, "{record}")?;
    }
    sink.flush()?;

    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::{records, write_report, LotRecord};
    use crate::{error::TaxLotError, lot::tests::ts, lot::Lot, manager::LotManager};

    #[test]
    fn test_record_from_open_lot() -> Result<(), TaxLotError> {
        let lot = Lot::new("AAPL", Decimal::from_str("100.00")?, ts("2024-01-01 09:30:00"))?;
        let record = LotRecord::try_from(&lot)?;

        assert_eq!(record.to_string(), "AAPL,2024-01-01,09:30:00,100.00,,,,0,,");

        Ok(())
    }

    #[test]
    fn test_record_from_closed_lots() -> Result<(), TaxLotError> {
        let mut gain = Lot::new("AAPL", Decimal::from_str("100.00")?, ts("2024-01-01"))?;
        gain.close(Decimal::from_str("110.00")?, ts("2024-02-01 16:00:00"))?;
        assert_eq!(
            LotRecord::try_from(&gain)?.to_string(),
            "AAPL,2024-01-01,00:00:00,100.00,2024-02-01,16:00:00,110.00,10.00,10.00,"
        );

        let mut loss = Lot::new("AAPL", Decimal::from_str("100.00")?, ts("2024-01-01"))?;
        loss.close(Decimal::from_str("90.50")?, ts("2024-02-01"))?;
        assert_eq!(
            LotRecord::try_from(&loss)?.to_string(),
            "AAPL,2024-01-01,00:00:00,100.00,2024-02-01,00:00:00,90.50,-9.50,,-9.50"
        );

        Ok(())
    }

    #[test]
    fn test_closed_lots_written_before_open_lots() -> Result<(), TaxLotError> {
        let mut manager = LotManager::default();
        manager.open("MSFT", Decimal::from_str("300")?, ts("2024-01-01"), Decimal::ONE)?;
        manager.open("AAPL", Decimal::from_str("100")?, ts("2024-01-02"), Decimal::from(2))?;
        manager.close("AAPL", Decimal::from_str("120")?, ts("2024-01-03"), Decimal::ONE)?;

        let records = records(&manager)?;
        let order: Vec<_> = records
            .iter()
            .map(|r| (r.asset.as_str(), r.close_price.is_some()))
            .collect();
        assert_eq!(order, vec![("AAPL", true), ("MSFT", false), ("AAPL", false)]);

        let mut out = Vec::new();
        let written = write_report(&manager, &mut out)?;
        assert_eq!(written, 3);
        let text = String::from_utf8(out).expect("Report is not UTF-8");
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], super::HEADER);
        assert_eq!(lines[1], "AAPL,2024-01-02,00:00:00,100,2024-01-03,00:00:00,120,20,20,");

        Ok(())
    }
}
