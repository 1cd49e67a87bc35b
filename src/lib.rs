//! followratio scrapes public follower/following counts for a roster of
//! usernames by driving a headless browser against the mobile site variant,
//! and appends one CSV row per profile (plus a negative-ratio subset).

pub mod config;
pub mod error;
pub mod extract;
pub mod input;
pub mod output;
pub mod runner;
pub mod session;
