//! Payment-and-refund reconciliation for an event-ticketing marketplace.
//!
//! Tracks a mobile-money purchase from initiation through webhook-confirmed
//! settlement, and performs bulk ticket refunds for a canceled event: one
//! disbursement request per ticket, each tracked to its asynchronous,
//! webhook-delivered completion, with partial success aggregated across the
//! batch.

pub mod adapter;
pub mod domain;
pub mod port;
pub mod service;
