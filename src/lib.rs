//! Host side of dotconverge
//!
//! The [`declarative`] crate decides what has to change for each
//! (target, destination) pair. This crate supplies the pieces that touch the
//! machine: [`RealSystem`] performs filesystem changes and runs scripts,
//! [`PersistentState`] keeps the once-script ledger on disk, and [`Config`]
//! with [`paths`] locate both.
//!
//! ```no_run
//! use declarative::{ExecuteOptions, LazyContents, ReconcilePlan, System, TargetStateEntry};
//! use dotconverge::{Config, RealSystem, ui};
//!
//! # fn main() -> anyhow::Result<()> {
//! dotconverge::logging::init(1, false);
//! let config = Config::load()?;
//! let system = RealSystem::from_config(&config)?;
//! // Keep other runs out of the ledger until this batch is done
//! let _session = system.state().lock_session()?;
//!
//! let path = dirs::home_dir().unwrap_or_default().join(".gitconfig");
//! let target = TargetStateEntry::file(
//!     LazyContents::from_bytes("[user]\n\tname = me\n"),
//!     config.mask(0o644),
//! );
//! let mut plan = ReconcilePlan::new();
//! plan.push(target, system.read_dest_state(&path)?);
//!
//! let summary = declarative::execute(
//!     &system,
//!     &plan,
//!     &ExecuteOptions::default(),
//!     &mut ui::BarProgress::new(),
//!     &mut ui::TerminalConfirm::new(false),
//! )?;
//! ui::print_summary(&summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod logging;
pub mod paths;
pub mod runner;
pub mod state;
pub mod system;
pub mod ui;

pub use config::Config;
pub use runner::ScriptRunner;
pub use state::PersistentState;
pub use system::RealSystem;
