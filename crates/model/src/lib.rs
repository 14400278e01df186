#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod activity;
pub mod attempt;
pub mod category;
pub mod chat;
pub mod conference;
pub mod dashboard;
pub mod material;
pub mod media;
pub mod progress;
pub mod quiz;
pub mod roster;

pub use category::{Category, MaterialKind, TestKind};
pub use chrono::{DateTime, Utc};
pub use quiz::Question;
