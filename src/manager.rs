use std::collections::HashMap;

use clap::ValueEnum;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use tracing::{debug, warn};

use crate::{
    error::{checked_add, TaxLotError},
    lot::Lot,
    queue::LotQueue,
    timestamp::Timestamp,
};

/// Most units a single buy may open. Every unit becomes its own `Lot`, so this bounds the memory one
/// order can claim.
pub const MAX_UNITS_PER_ORDER: u64 = 1_000_000;

/// What `close` does when asked to sell more units than are open.
///
/// truncate: close whatever is open and carry on
/// fail: reject the sell and leave every queue untouched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OversellPolicy {
    #[default]
    Truncate,
    Fail,
}

/// Map from asset to `LotQueue` that remembers the order in which assets were first seen.
///
/// Assets are only ever added through `get_or_create`, so a lookup of an unknown asset behaves like
/// an empty queue.
#[derive(Debug, Default)]
pub struct AssetBook {
    index: HashMap<String, usize>,
    queues: Vec<(String, LotQueue)>,
}

impl AssetBook {
    pub fn get_or_create(&mut self, asset: &str) -> &mut LotQueue {
        let idx = match self.index.get(asset) {
            Some(idx) => *idx,
            None => {
                self.queues.push((asset.to_string(), LotQueue::new()));
                let idx = self.queues.len() - 1;
                self.index.insert(asset.to_string(), idx);
                idx
            }
        };
        &mut self.queues[idx].1
    }

    pub fn get(&self, asset: &str) -> Option<&LotQueue> {
        self.index.get(asset).map(|idx| &self.queues[*idx].1)
    }

    /// Number of lots held for `asset`, zero for unseen assets.
    pub fn count(&self, asset: &str) -> usize {
        self.get(asset).map_or(0, LotQueue::len)
    }

    /// Iterates assets in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &LotQueue)> {
        self.queues.iter().map(|(asset, queue)| (asset.as_str(), queue))
    }

    /// All lots, grouped by asset in first-seen order and sorted within each asset.
    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.queues.iter().flat_map(|(_, queue)| queue.items())
    }
}

/// Per-asset totals reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSummary {
    pub asset: String,
    pub open_units: usize,
    pub closed_units: usize,
    pub realized_profit_or_loss: Decimal,
}

/// Owns every lot of a run, split into open and closed books.
///
/// A lot is in exactly one queue at a time. It moves from `open_lots[asset]` to
/// `closed_lots[asset]` once, when it is sold.
#[derive(Debug, Default)]
pub struct LotManager {
    open_lots: AssetBook,
    closed_lots: AssetBook,
    oversell_policy: OversellPolicy,
}

impl LotManager {
    pub fn new(oversell_policy: OversellPolicy) -> Self {
        LotManager {
            open_lots: AssetBook::default(),
            closed_lots: AssetBook::default(),
            oversell_policy,
        }
    }

    pub fn open_lots(&self) -> &AssetBook {
        &self.open_lots
    }

    pub fn closed_lots(&self) -> &AssetBook {
        &self.closed_lots
    }

    /// Opens one lot per unit bought. `units` is truncated toward zero; a negative count opens
    /// nothing.
    pub fn open(
        &mut self,
        asset: &str,
        open_price: Decimal,
        open_timestamp: Timestamp,
        units: Decimal,
    ) -> Result<(), TaxLotError> {
        let units = units_to_open(units)?;
        let lots = (0..units)
            .map(|_| Lot::new(asset, open_price, open_timestamp))
            .collect::<Result<Vec<_>, _>>()?;

        self.open_lots.get_or_create(asset).push(lots);
        Ok(())
    }

    /// Closes the oldest open lots of `asset`. The sign of `units` is ignored.
    ///
    /// When fewer lots are open than requested, `OversellPolicy` decides between closing what is
    /// there and failing without touching any queue.
    pub fn close(
        &mut self,
        asset: &str,
        close_price: Decimal,
        close_timestamp: Timestamp,
        units: Decimal,
    ) -> Result<(), TaxLotError> {
        let requested = units_to_close(units)?;
        let open = self.open_lots.get_or_create(asset);
        let available = open.len();

        if (available as u64) < requested {
            match self.oversell_policy {
                OversellPolicy::Fail => {
                    return Err(TaxLotError::InsufficientLots {
                        asset: asset.to_string(),
                        requested,
                        available,
                    })
                }
                OversellPolicy::Truncate => {
                    warn!(%asset, requested, available, "Selling more units than are open, closing what is available");
                }
            }
        }

        // `take_oldest` clamps to the queue length, so saturating here is safe.
        let n = usize::try_from(requested).unwrap_or(usize::MAX);
        let mut lots = open.take_oldest(n);
        for lot in lots.iter_mut() {
            lot.close(close_price, close_timestamp)?;
            debug!(%lot, held_for = ?lot.held_for(), "Closed lot");
        }

        self.closed_lots.get_or_create(asset).push(lots);
        Ok(())
    }

    /// Sum of realized profit and loss over every closed lot of `asset`.
    pub fn realized_profit_or_loss(&self, asset: &str) -> Result<Decimal, TaxLotError> {
        let mut total = Decimal::ZERO;
        if let Some(queue) = self.closed_lots.get(asset) {
            for lot in queue.items() {
                total = checked_add(total, lot.profit_or_loss()?)?;
            }
        }
        Ok(total)
    }

    /// Totals for every asset seen so far, in first-seen order.
    pub fn summary(&self) -> Result<Vec<AssetSummary>, TaxLotError> {
        // `close` registers its asset in the open book too, so the open book lists every asset.
        self.open_lots
            .iter()
            .map(|(asset, queue)| {
                Ok(AssetSummary {
                    asset: asset.to_string(),
                    open_units: queue.len(),
                    closed_units: self.closed_lots.count(asset),
                    realized_profit_or_loss: self.realized_profit_or_loss(asset)?,
                })
            })
            .collect()
    }
}

/// Units bought: truncated toward zero, negative counts become zero. Counts above
/// `MAX_UNITS_PER_ORDER` are rejected.
fn units_to_open(units: Decimal) -> Result<u64, TaxLotError> {
    let truncated = units.trunc();
    if truncated <= Decimal::ZERO {
        return Ok(0);
    }
    match truncated.to_u64() {
        Some(count) if count <= MAX_UNITS_PER_ORDER => Ok(count),
        _ => Err(TaxLotError::QuantityOutOfRange(units)),
    }
}

/// Units sold: absolute value of the truncated quantity.
fn units_to_close(units: Decimal) -> Result<u64, TaxLotError> {
    units
        .trunc()
        .abs()
        .to_u64()
        .ok_or(TaxLotError::QuantityOutOfRange(units))
}
