//! Hacker News alerts library.
//!
//! A service that watches subscribers' Hacker News activity and emails them a
//! digest whenever new replies appear on their comments or new comments appear
//! on their posts.

pub mod alerts;
pub mod config;
pub mod constants;
pub mod db;
pub mod digest;
pub mod hn;
pub mod mailer;
pub mod token;
