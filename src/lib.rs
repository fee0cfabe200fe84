//! FIFO tax-lot matching.
//!
//! Every share bought becomes its own [`lot::Lot`]. Sells close the oldest open lots of the same
//! asset first, and the closed lots carry the realized profit or loss.

pub mod cli;
pub mod driver;
pub mod error;
pub mod feed;
pub mod lot;
pub mod manager;
pub mod queue;
pub mod report;
pub mod timestamp;
