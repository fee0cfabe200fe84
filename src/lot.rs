use std::{cmp::Ordering, fmt::Display};

use chrono::Duration;
use rust_decimal::Decimal;
use tracing::trace;

use crate::{
    error::{checked_sub, TaxLotError},
    timestamp::Timestamp,
};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";
const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Lifecycle of a single share unit.
///
/// `New -> Opened -> Closed`. Transitions never go backwards and each one happens at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LotState {
    New,
    Opened {
        open_price: Decimal,
        open_timestamp: Timestamp,
    },
    Closed {
        open_price: Decimal,
        open_timestamp: Timestamp,
        close_price: Decimal,
        close_timestamp: Timestamp,
    },
}

/// Events that drive a `LotState` forward.
#[derive(Debug, Clone, Copy)]
pub enum LotEvent {
    Open {
        price: Decimal,
        timestamp: Timestamp,
    },
    Close {
        price: Decimal,
        timestamp: Timestamp,
    },
}

impl LotEvent {
    fn name(&self) -> &'static str {
        match self {
            LotEvent::Open { .. } => "open",
            LotEvent::Close { .. } => "close",
        }
    }
}

impl LotState {
    pub fn name(&self) -> &'static str {
        match self {
            LotState::New => "new",
            LotState::Opened { .. } => "opened",
            LotState::Closed { .. } => "closed",
        }
    }

    /// Returns the state reached by applying `event`, or `InvalidTransition` if the event is not
    /// accepted in the current state.
    pub fn transition(&self, event: LotEvent) -> Result<LotState, TaxLotError> {
        match (*self, event) {
            (LotState::New, LotEvent::Open { price, timestamp }) => Ok(LotState::Opened {
                open_price: price,
                open_timestamp: timestamp,
            }),
            (
                LotState::Opened {
                    open_price,
                    open_timestamp,
                },
                LotEvent::Close { price, timestamp },
            ) => Ok(LotState::Closed {
                open_price,
                open_timestamp,
                close_price: price,
                close_timestamp: timestamp,
            }),
            (state, event) => Err(TaxLotError::InvalidTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

/// Represents one unit (one share) of an asset, tracked from purchase to sale.
///
/// Lots are ordered by `(asset, open_timestamp, open_price, close_timestamp, close_price)`.
/// Missing fields sort before present ones, so an open lot sorts before an otherwise identical
/// closed lot.
#[derive(Debug, Clone)]
pub struct Lot {
    asset: String,
    state: LotState,
}

impl Lot {
    /// Creates a lot that has already been opened at `open_price` on `open_timestamp`.
    pub fn new(
        asset: impl Into<String>,
        open_price: Decimal,
        open_timestamp: Timestamp,
    ) -> Result<Self, TaxLotError> {
        let state = LotState::New.transition(LotEvent::Open {
            price: open_price,
            timestamp: open_timestamp,
        })?;
        let lot = Lot {
            asset: asset.into(),
            state,
        };
        trace!(%lot, "New lot");
        Ok(lot)
    }

    /// Closes the lot. Fails unless the lot is currently opened.
    pub fn close(
        &mut self,
        close_price: Decimal,
        close_timestamp: Timestamp,
    ) -> Result<(), TaxLotError> {
        self.state = self.state.transition(LotEvent::Close {
            price: close_price,
            timestamp: close_timestamp,
        })?;
        Ok(())
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn state(&self) -> &LotState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, LotState::Opened { .. })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, LotState::Closed { .. })
    }

    pub fn open_price(&self) -> Option<Decimal> {
        match self.state {
            LotState::New => None,
            LotState::Opened { open_price, .. } | LotState::Closed { open_price, .. } => {
                Some(open_price)
            }
        }
    }

    pub fn open_timestamp(&self) -> Option<Timestamp> {
        match self.state {
            LotState::New => None,
            LotState::Opened { open_timestamp, .. } | LotState::Closed { open_timestamp, .. } => {
                Some(open_timestamp)
            }
        }
    }

    pub fn close_price(&self) -> Option<Decimal> {
        match self.state {
            LotState::Closed { close_price, .. } => Some(close_price),
            _ => None,
        }
    }

    pub fn close_timestamp(&self) -> Option<Timestamp> {
        match self.state {
            LotState::Closed {
                close_timestamp, ..
            } => Some(close_timestamp),
            _ => None,
        }
    }

    pub fn open_date(&self) -> Option<String> {
        self.open_timestamp()
            .map(|t| t.format(DATE_FORMAT).to_string())
    }

    pub fn open_time(&self) -> Option<String> {
        self.open_timestamp()
            .map(|t| t.format(TIME_FORMAT).to_string())
    }

    pub fn close_date(&self) -> Option<String> {
        self.close_timestamp()
            .map(|t| t.format(DATE_FORMAT).to_string())
    }

    pub fn close_time(&self) -> Option<String> {
        self.close_timestamp()
            .map(|t| t.format(TIME_FORMAT).to_string())
    }

    /// Realized gain per unit: `close_price - open_price` once closed, zero before that.
    pub fn profit_or_loss(&self) -> Result<Decimal, TaxLotError> {
        match self.state {
            LotState::Closed {
                open_price,
                close_price,
                ..
            } => checked_sub(close_price, open_price),
            _ => Ok(Decimal::ZERO),
        }
    }

    pub fn profit(&self) -> Result<Option<Decimal>, TaxLotError> {
        let pnl = self.profit_or_loss()?;
        Ok((pnl > Decimal::ZERO).then_some(pnl))
    }

    pub fn loss(&self) -> Result<Option<Decimal>, TaxLotError> {
        let pnl = self.profit_or_loss()?;
        Ok((pnl < Decimal::ZERO).then_some(pnl))
    }

    /// How long the lot was held. Only defined once closed.
    pub fn held_for(&self) -> Option<Duration> {
        match self.state {
            LotState::Closed {
                open_timestamp,
                close_timestamp,
                ..
            } => Some(close_timestamp - open_timestamp),
            _ => None,
        }
    }

    fn sort_key(
        &self,
    ) -> (
        &str,
        Option<Timestamp>,
        Option<Decimal>,
        Option<Timestamp>,
        Option<Decimal>,
    ) {
        (
            &self.asset,
            self.open_timestamp(),
            self.open_price(),
            self.close_timestamp(),
            self.close_price(),
        )
    }
}

impl Display for Lot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.state {
            LotState::New => write!(f, "{} (new)", self.asset),
            LotState::Opened {
                open_price,
                open_timestamp,
            } => write!(
                f,
                "{} {}@{}",
                self.asset,
                open_timestamp.format(DISPLAY_FORMAT),
                open_price
            ),
            LotState::Closed {
                open_price,
                open_timestamp,
                close_price,
                close_timestamp,
            } => write!(
                f,
                "{} {}@{} / {}@{}",
                self.asset,
                open_timestamp.format(DISPLAY_FORMAT),
                open_price,
                close_timestamp.format(DISPLAY_FORMAT),
                close_price
            ),
        }
    }
}

impl Ord for Lot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Lot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Lot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Lot {}
