//! Workspace umbrella crate.
//!
//! Re-exports the transfer engine together with the store adapters enabled
//! through feature flags, so host applications can depend on a single crate:
//!
//! - `desktop-shims` exposes [`bridge_desktop`] (local folder store, reqwest client)
//! - `google-drive` exposes [`provider_google_drive`]
//! - `s3` exposes [`provider_s3`]

pub use bridge_traits;
pub use core_transfer;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;

#[cfg(feature = "google-drive")]
pub use provider_google_drive;

#[cfg(feature = "s3")]
pub use provider_s3;
