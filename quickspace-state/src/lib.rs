//! # Quickspace State
//!
//! Aggregation core for the launcher's quickspace widget: folds media,
//! notification and weather events into one view-model and tells observers
//! when it changed.
//!
//! # Architecture
//!
//! ```text
//! provider callbacks (any thread)
//!         │
//!         ▼
//!   source adapters ──▶ dispatch queue ──▶ StateReconciler ──▶ watch channel
//!                            │                                     │
//!                            └──────▶ ListenerRegistry ──▶ on_data_updated()
//! ```
//!
//! The dispatch queue is a single thread. It alone mutates the view-model
//! and invokes listeners, so applies and deliveries never interleave.
//! Observers get no payload; they read through the controller accessors.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quickspace_state::{AggregationController, QuickspaceConfig};
//!
//! let controller = Arc::new(
//!     AggregationController::builder()
//!         .config(QuickspaceConfig::new().with_weather_detailed(true))
//!         .media_provider(media)
//!         .notification_provider(notifications)
//!         .weather_provider(weather)
//!         .build()?,
//! );
//!
//! // Listeners hold a weak handle; a strong one would form a cycle
//! let view = Arc::downgrade(&controller);
//! controller.add_listener(Arc::new(move || {
//!     if let Some(view) = view.upgrade() {
//!         println!("{:?} / {:?}", view.current_track(), view.weather_text());
//!     }
//! }));
//! ```
//!
//! # Async consumers
//!
//! ```rust,ignore
//! let mut snapshots = controller.watch();
//! while snapshots.changed().await.is_ok() {
//!     let model = snapshots.borrow().clone();
//!     println!("playing: {}", model.is_playing());
//! }
//! ```

pub mod condition;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod reconciler;
pub mod registry;

mod worker;

pub use condition::normalize_condition;
pub use config::QuickspaceConfig;
pub use controller::{AggregationController, ControllerBuilder};
pub use error::{Result, StateError};
pub use logging::{init_logging, init_logging_from_env, init_silent, LoggingError, LoggingMode};
pub use model::{ViewModel, WeatherTemp};
pub use reconciler::StateReconciler;
pub use registry::{Added, ListenerRegistry, OnDataListener};

pub use quickspace_sources::{NormalizedEvent, SourceKind};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::config::QuickspaceConfig;
    pub use crate::controller::AggregationController;
    pub use crate::model::{ViewModel, WeatherTemp};
    pub use crate::registry::OnDataListener;
    pub use quickspace_sources::{MediaProvider, NotificationProvider, WeatherProvider};
}
