//! Presentation models read by a renderer.

pub mod context;
pub mod current;
pub mod history;
pub mod rig_profile_editor;
pub mod wallet;

pub use context::{filter_name_options, ContextPanel, SORTED_FILTER_NAMES};
pub use current::{relative_age, CurrentTable, TableOptions, TableRow};
pub use history::{export_csv, ChartSeries, HistoryPanel};
pub use rig_profile_editor::RigProfileForm;
pub use wallet::{balances, Balances, WalletPanel};
