//! Virtualized source viewer with a per-line coverage overlay.
//!
//! [`viewer::Viewer`] is the core: it windows a [`lines::LineModel`] through
//! [`window`], composes the text and overlay layers in [`layers`], mirrors
//! horizontal scroll ([`hscroll`]), drives line highlighting from the address
//! fragment ([`fragment`]) and suspends pointer handling while scrolling
//! ([`guard`]). [`widget`] and [`syntax`] paint it in a terminal.

pub mod config;
pub mod coverage;
pub mod diagnostics;
pub mod fragment;
pub mod guard;
pub mod hscroll;
pub mod layers;
pub mod lines;
pub mod syntax;
pub mod viewer;
pub mod widget;
pub mod window;

pub use coverage::{Coverage, CoverageMap, CoverageStatus, CoverageSummary};
pub use fragment::{HighlightState, MemoryNavigation, Navigation};
pub use layers::CoverageToggles;
pub use lines::{LineModel, SourceLine};
pub use viewer::{Capabilities, Viewer, ViewerOptions};
pub use window::{compute_visible_range, ViewportState, VisibleRange};
