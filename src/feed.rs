use std::{
    io::{BufRead, Lines},
    str::FromStr,
};

use rust_decimal::Decimal;

use crate::{
    error::TaxLotError,
    timestamp::{parse_timestamp, Timestamp},
};

/// The side of an order. Anything other than buy or sell is carried through as `Other` and
/// skipped by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeAction {
    Buy,
    Sell,
    Other(String),
}

impl From<&str> for TradeAction {
    fn from(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "buy" => TradeAction::Buy,
            "sell" => TradeAction::Sell,
            _ => TradeAction::Other(s.trim().to_string()),
        }
    }
}

/// One row of the order feed.
///
/// Price, quantity and date are kept as text and only parsed when the order is applied, so rows
/// that get skipped never fail on malformed numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub trade_action: TradeAction,
    pub symbol: String,
    pub trade_date: String,
    pub price: String,
    pub qty: String,
}

impl OrderRecord {
    pub fn price(&self) -> Result<Decimal, TaxLotError> {
        parse_decimal(&self.price)
    }

    pub fn qty(&self) -> Result<Decimal, TaxLotError> {
        parse_decimal(&self.qty)
    }

    pub fn trade_date(&self) -> Result<Timestamp, TaxLotError> {
        parse_timestamp(&self.trade_date)
    }
}

/// Parses a number that may carry thousands separators, e.g. `1,000.00`.
fn parse_decimal(text: &str) -> Result<Decimal, TaxLotError> {
    let digits: String = text.trim().chars().filter(|c| *c != ',').collect();
    Ok(Decimal::from_str(&digits)?)
}

/// Positions of the columns we need, resolved from the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Columns {
    width: usize,
    trade_action: usize,
    symbol: usize,
    trade_date: usize,
    price: usize,
    qty: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self, TaxLotError> {
        let names: Vec<String> = split_fields(header.trim_start_matches('\u{feff}'))?
            .iter()
            .map(|name| normalize(name))
            .collect();

        // An exact match on the canonical name wins over any alias, wherever the alias sits.
        let find = |canonical: &str, aliases: &[&str], field_name: &str| -> Result<usize, TaxLotError> {
            names
                .iter()
                .position(|name| name == canonical)
                .or_else(|| names.iter().position(|name| aliases.contains(&name.as_str())))
                .ok_or_else(|| TaxLotError::MissingColumn(field_name.to_string()))
        };

        Ok(Columns {
            width: names.len(),
            trade_action: find("tradeaction", &["action"], "Trade Action")?,
            symbol: find("symbol", &["asset", "ticker"], "Symbol")?,
            trade_date: find("tradedate", &["date"], "Trade Date")?,
            price: find("price", &[], "Price")?,
            qty: find("qty", &["quantity"], "Qty")?,
        })
    }

    fn parse_record(&self, line: &str) -> Result<OrderRecord, TaxLotError> {
        let parts = split_fields(line)?;
        if parts.len() != self.width {
            return Err(TaxLotError::FieldCountMismatch {
                expected: self.width,
                found: parts.len(),
            });
        }

        Ok(OrderRecord {
            trade_action: TradeAction::from(get_field_from_parts(&parts, self.trade_action, "Trade Action")?),
            symbol: get_field_from_parts(&parts, self.symbol, "Symbol")?.to_string(),
            trade_date: get_field_from_parts(&parts, self.trade_date, "Trade Date")?.to_string(),
            price: get_field_from_parts(&parts, self.price, "Price")?.to_string(),
            qty: get_field_from_parts(&parts, self.qty, "Qty")?.to_string(),
        })
    }
}

/// Lower-cases a header name and drops everything that is not alphanumeric, so `Trade Action`,
/// `trade_action` and `tradeAction` all resolve to the same column.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Splits one CSV line into trimmed fields.
///
/// Inside double quotes a comma is part of the field and `""` stands for a literal quote. A quote
/// left open at the end of the line is an error.
fn split_fields(line: &str) -> Result<Vec<String>, TaxLotError> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field.clear();
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(TaxLotError::UnterminatedQuote);
    }
    fields.push(field.trim().to_string());
    Ok(fields)
}

/// Returns a `&str` from the vector of fields according to the given index. Performs error
/// checking to validate that the field exists.
fn get_field_from_parts<'a>(
    parts: &'a [String],
    index: usize,
    field_name: &str,
) -> Result<&'a str, TaxLotError> {
    match parts.get(index) {
        Some(field) => Ok(field),
        None => Err(TaxLotError::FieldDoesntExist(field_name.to_string())),
    }
}

/// Reads order records from CSV text with a header row.
///
/// Yields `(line_number, record)` pairs. Blank lines are skipped. Errors carry the 1-based line
/// number they were raised on.
pub struct OrderFeed<R> {
    lines: Lines<R>,
    columns: Columns,
    line_number: usize,
}

impl<R: BufRead> OrderFeed<R> {
    pub fn new(reader: R) -> Result<Self, TaxLotError> {
        let mut lines = reader.lines();
        let mut line_number = 0;

        loop {
            let Some(line) = lines.next() else {
                return Err(TaxLotError::EmptyFeed);
            };
            line_number += 1;
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let columns = Columns::from_header(&line).map_err(|e| e.at_line(line_number))?;
            return Ok(OrderFeed {
                lines,
                columns,
                line_number,
            });
        }
    }
}

impl<R: BufRead> Iterator for OrderFeed<R> {
    type Item = Result<(usize, OrderRecord), TaxLotError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = self.lines.next()?;
            self.line_number += 1;
            let line_number = self.line_number;

            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(TaxLotError::from(e).at_line(line_number))),
            };
            if line.trim().is_empty() {
                continue;
            }

            return Some(
                self.columns
                    .parse_record(&line)
                    .map(|record| (line_number, record))
                    .map_err(|e| e.at_line(line_number)),
            );
        }
    }
}
