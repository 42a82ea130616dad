// SPDX-License-Identifier: MIT

//! Declarative macros for reducing boilerplate.
//!
//! - [`simple_display!`] — `Display` impl mapping enum variants to string literals
//! - [`builder!`] — test builder struct with Default, setters, and `build()`

/// Generate a `Display` impl that maps enum variants to string literals.
///
/// Unit variants match directly; data-carrying variants use `(..)` to ignore fields.
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident $(( $($ignore:tt)* ))? => $str:expr ),+ $(,)? }) => {
        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $( Self::$variant $(( $($ignore)* ))? => $str, )+
                })
            }
        }
    };
}

/// Generate a test builder (struct + Default + setters + build).
///
/// All generated items are gated behind `#[cfg(any(test, feature = "test-support"))]`.
#[macro_export]
macro_rules! builder {
    (
        pub struct $builder:ident => $target:ident {
            $( into { $($ifield:ident : $itype:ty = $idefault:expr),* $(,)? } )?
            $( set { $($sfield:ident : $stype:ty = $sdefault:expr),* $(,)? } )?
        }
    ) => {
        #[cfg(any(test, feature = "test-support"))]
        #[derive(Debug, Clone)]
        pub struct $builder {
            $( $( $ifield: $itype, )* )?
            $( $( $sfield: $stype, )* )?
        }

        #[cfg(any(test, feature = "test-support"))]
        impl Default for $builder {
            fn default() -> Self {
                Self {
                    $( $( $ifield: $idefault, )* )?
                    $( $( $sfield: $sdefault, )* )?
                }
            }
        }

        #[cfg(any(test, feature = "test-support"))]
        impl $builder {
            $( $(
                pub fn $ifield(mut self, v: impl Into<$itype>) -> Self {
                    self.$ifield = v.into();
                    self
                }
            )* )?
            $( $(
                pub fn $sfield(mut self, v: $stype) -> Self {
                    self.$sfield = v;
                    self
                }
            )* )?
        }
    };
}

/// Define a monotonically-allocated 32-bit ID wrapper plus its generator.
///
/// The generated type wraps a `u32`; 0 is reserved to mean "unassigned on
/// the wire" (matching §3's `session_id` convention — 0 until assigned).
/// `$gen` is a process-lifetime `AtomicU32`-backed allocator starting at 1.
#[macro_export]
macro_rules! define_seq_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident, $gen:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            /// Sentinel for "no id assigned yet" (used on the wire before a session exists).
            pub const NONE: Self = Self(0);

            pub fn is_none(&self) -> bool {
                self.0 == 0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        /// Process-lifetime monotonic generator for [`$name`].
        pub struct $gen {
            next: std::sync::atomic::AtomicU32,
        }

        impl Default for $gen {
            fn default() -> Self {
                Self { next: std::sync::atomic::AtomicU32::new(1) }
            }
        }

        impl $gen {
            pub fn new() -> Self {
                Self::default()
            }

            /// Allocate the next id. Monotonic for the process lifetime; wraps
            /// (silently, per spec §3 "monotonic 32-bit") only after 2^32
            /// allocations, which no single engine lifetime reaches in practice.
            pub fn next(&self) -> $name {
                $name(self.next.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
            }
        }
    };
}
