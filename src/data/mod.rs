//! Data layer: core types, loading, and grid bookkeeping.
//!
//! Architecture:
//! ```text
//!  cov_bkg_<i>/cov_all.*  +  cov_sig_makross_<i>/cov_all.*      selection_counts.csv
//!                 │                                                    │
//!                 ▼                                                    ▼
//!   ┌──────────┐                                              ┌──────────┐
//!   │  loader   │  → CovarianceBundle                          │  loader   │  → SelectionCounts
//!   └──────────┘                                              └──────────┘
//!                 │
//!                 ▼
//!   ┌──────────┐
//!   │  grid     │  enumerate points, assemble SignificanceMatrix
//!   └──────────┘
//! ```

pub mod grid;
pub mod loader;
pub mod model;
