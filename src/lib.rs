//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`bridge-desktop`, `provider-woocommerce`). Host
//! applications can depend on `catalog-mirror-workspace` and enable the
//! documented features without needing to wire each crate individually.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "woocommerce")]
pub use provider_woocommerce;
