//! Robots.txt and robots meta handling
//!
//! This module provides fetching, parsing and caching of robots.txt files,
//! plus the in-document `noindex`/`nofollow` directives. Robots.txt rules
//! reach the admission pipeline as ordinary exclude URL filters.

mod cache;
mod meta;
mod parser;
mod provider;

pub use cache::CachedRobots;
pub use meta::{RobotsMeta, RobotsMetaProvider, StandardRobotsMetaProvider};
pub use parser::RobotsTxt;
pub use provider::{HttpRobotsTxtProvider, RobotsTxtProvider};
