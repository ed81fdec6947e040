//! The four pipeline stages and their shared helpers.
//!
//! Each submodule owns exactly one transformation:
//!
//! | Module    | In                     | Out                         |
//! |-----------|------------------------|-----------------------------|
//! | `fetch`   | document URL           | [`fetch::FetchedDocument`]  |
//! | `extract` | document bytes         | [`extract::RawLineItems`]   |
//! | `ratios`  | line items + rent      | [`ratios::RatioBundle`]     |
//! | `narrate` | ratio bundle + rent    | [`narrate::RiskAssessment`] |
//!
//! `figures` is not a stage: it is a local projection of stage outputs into
//! display strings, run after narration succeeds. `sanitize` holds the
//! model-output cleanup shared by every stage that parses model JSON.
//!
//! Stages validate their own outputs. A provider client only moves bytes;
//! whether a response means anything is decided here, so swapping providers
//! can never weaken the contract checks.

pub mod extract;
pub mod fetch;
pub mod figures;
pub mod narrate;
pub mod ratios;
pub(crate) mod sanitize;
