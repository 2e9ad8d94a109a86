pub mod authenticator;
pub mod calendar;
pub mod list_controller;
pub mod pagination;
pub mod payout_stats;
pub mod session_store;
pub mod session_timer;
pub mod stats_aggregator;
