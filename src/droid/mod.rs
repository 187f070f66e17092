//! Droid session data management modules
//!
//! Reads the per-project session directories written by the Factory Droid
//! agent, turns them into [`Session`] records and derives the groupings,
//! statistics and cost estimates shown by the dashboard.

pub mod aggregator;
pub mod data_manager;
pub mod error;
pub mod export;
pub mod favorites;
pub mod grouping;
pub mod models;
pub mod path_codec;
pub mod pricing;
pub mod session_parser;
pub mod session_view;
pub mod title_editor;

pub use aggregator::{DailyStats, MonthlyStats, SessionAggregator, SessionFilter, WeeklyStats};
pub use data_manager::DroidDataManager;
pub use error::{ParseError, TitleUpdateError};
pub use favorites::FavoritesStore;
pub use grouping::ProjectGrouper;
pub use models::{DashboardStats, Project, ProjectGroup, Session, TokenUsage, UserPrompt};
pub use pricing::{CostEstimator, ModelPricing};
pub use session_parser::SessionParser;
pub use session_view::{GroupBy, SessionSort};
pub use title_editor::TitleEditor;
