//! EVE Industry Calculator
//!
//! Resolves manufacturing dependency trees for EVE Online blueprints,
//! taking on-hand assets, efficiency research, facilities and skills
//! into account.
//!
//! [`calculator::ManufacturingSetupModel`] is the entry point for views:
//! it owns the tree and asset ledger, exposes row/path navigation and
//! per-role data, and queues [`changes::ModelChange`] notifications.

// Resolver core
pub mod assets;
pub mod calculator;
pub mod changes;
pub mod industry;
pub mod models;
pub mod providers;
pub mod tree;

// Storage and import
pub mod db;
pub mod import;

// Output, errors and logging
pub mod error;
pub mod logging;
pub mod report;
