//! `chronod-cron` — cron schedule expressions and fire-time computation.
//!
//! # Overview
//!
//! A [`Schedule`] is parsed from one of three expression forms and answers a
//! single question: given an instant, when is the next fire strictly after
//! it?
//!
//! | Form                 | Example           | Behaviour                            |
//! |----------------------|-------------------|--------------------------------------|
//! | five-field cron      | `*/10 2 * * 1-5`  | independent integer-set constraints  |
//! | `@` macro            | `@daily`          | canonical five-field equivalent      |
//! | `@every <duration>`  | `@every 1h30m`    | fixed interval, not calendar-aligned |
//!
//! Field schedules treat day-of-month and day-of-week with classic cron
//! semantics: when both are restricted a day matching *either* fires; when
//! one is `*` the other alone decides. The forward search is bounded at
//! five years so an impossible combination (`30 2 30 2 *`) is reported at
//! registration instead of looping forever.

pub mod error;
pub mod parse;
pub mod schedule;

pub use error::{CronError, Result};
pub use schedule::{FieldSchedule, Schedule};
