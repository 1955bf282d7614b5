//! Client-side analytics core for the game-economy dashboard.
//!
//! Result sets from the fetch layer are decoded into typed records
//! ([`record`]), turned into derived rows ([`derive`]) and shown through a
//! filtered, sorted view ([`view`]). Keyboard navigation runs through
//! [`shortcuts`].

pub mod config;
pub mod derive;
pub mod logging;
pub mod record;
pub mod shortcuts;
pub mod verify;
pub mod view;
