// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Architecture-specific support.
//!
//! In practice, this works by
//!
//! - Conditionally defining a nested module (below).
//! - `pub use`-ing its contents
//!
//! Thus, all architecture-specific types and functions show up right here in
//! the `arch` module, tailored for the current target.
//!
//! For this to work, each architecture support module must define the same
//! set of names: a `Context` type (the per-task save area a [`Descriptor`]
//! carries as its `ctx` field) and the three switch primitives named in
//! `spec.md` §4.5 -- `context_start`, `context_switch`, `context_switch2`.
//!
//! [`Descriptor`]: kerncore::task::Descriptor

cfg_if::cfg_if! {
    if #[cfg(feature = "arm_m")] {
        pub mod arm_m;
        pub use arm_m::*;
    } else {
        pub mod sim;
        pub use sim::*;
    }
}
