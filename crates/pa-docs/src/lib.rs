//! Authorized document calls made once a portal session is open
//!
//! - [`ScheduleClient`]: URSSAF yearly contribution schedule, with
//!   [`ScheduleSummary`] totals.
//! - [`KbisClient`]: monidenum company listing and KBIS extract download.

pub mod directory;
pub mod errors;
pub mod kbis;
pub mod schedule;

pub use directory::{Company, DirectoryParser, HtmlTableDirectoryParser, find_company};
pub use errors::{DocsError, Result};
pub use kbis::{KbisClient, save_document};
pub use schedule::{Echeance, ScheduleClient, ScheduleSummary};
