//! Rule-driven changelog assembly from pull request records.
//!
//! [`changelog::Pipeline`] sorts, links, deduplicates, labels, classifies and
//! renders records into a single document. [`pr`] loads the input records,
//! [`config`] the rules, and [`report`] writes the result.

pub mod changelog;
pub mod config;
pub mod pr;
pub mod report;
