#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A shared, reference-counted handle to a heap-allocated value, with a family of pointer
//! casts whose results keep sharing one counter.
//!
//! [`Shared<T>`] lets any number of owners share a value. The value is dropped exactly when
//! the last owner goes away, on whichever thread that happens. Ownership is tracked by a
//! [`SharedCount`], an atomic counter that lives in a small control block next to the
//! information needed to drop the value.
//!
//! # Key Features
//!
//! - **Deterministic release**: the value is dropped as soon as the last handle is dropped,
//!   reset or reassigned, including during unwinding
//! - **Empty handles**: a handle may own nothing, costing no allocation
//! - **Copy-and-swap assignment**: [`Shared::assign()`] handles copy, move and self assignment
//!   with one code path
//! - **Casts that share ownership**: [`static_pointer_cast()`], [`const_pointer_cast()`],
//!   [`reinterpret_pointer_cast()`] and [`dynamic_pointer_cast()`] produce handles of another
//!   view type that count towards the same value
//! - **Release through the original type**: whatever type the last surviving handle views the
//!   value as, the value is dropped as the type it was created with
//!
//! # Examples
//!
//! ## Sharing a value
//!
//! ```rust
//! use shared_ptr::Shared;
//!
//! let h1 = Shared::new(String::from("value"));
//! assert_eq!(h1.use_count(), 1);
//!
//! let mut h2 = h1.clone();
//! assert_eq!(h1.use_count(), 2);
//!
//! // Moving out leaves the source empty and does not change the count.
//! let h3 = h2.take();
//! assert!(h2.is_empty());
//! assert_eq!(h2.use_count(), 0);
//! assert_eq!(h3.use_count(), 2);
//!
//! drop(h1);
//! assert_eq!(h3.use_count(), 1);
//!
//! // Dropping the last handle drops the string.
//! drop(h3);
//! ```
//!
//! ## Casting between views
//!
//! ```rust
//! use shared_ptr::{AsAny, Shared, dynamic_pointer_cast, static_pointer_cast};
//!
//! trait Animal: AsAny {
//!     fn speak(&self) -> String;
//! }
//!
//! struct Dog;
//! struct Cat;
//!
//! impl Animal for Dog {
//!     fn speak(&self) -> String {
//!         "Woof".to_string()
//!     }
//! }
//!
//! impl Animal for Cat {
//!     fn speak(&self) -> String {
//!         "Meow".to_string()
//!     }
//! }
//!
//! let dog = Shared::new(Dog);
//! let animal: Shared<dyn Animal> = static_pointer_cast(&dog, |d| d as &dyn Animal);
//! assert_eq!(animal.speak(), "Woof");
//! assert_eq!(dog.use_count(), 2);
//!
//! // The runtime-checked cast succeeds for the real type...
//! let back: Shared<Dog> = dynamic_pointer_cast(&animal);
//! assert!(!back.is_empty());
//!
//! // ...and produces an empty handle for any other type.
//! let not_a_cat: Shared<Cat> = dynamic_pointer_cast(&animal);
//! assert!(not_a_cat.is_empty());
//! assert_eq!(dog.use_count(), 3);
//! ```
//!
//! # Thread safety
//!
//! The counter is atomic, so handles that refer to the same value may be cloned and dropped
//! concurrently from any number of threads. Each handle instance has no synchronization of its
//! own: changing a handle (assigning, swapping, resetting) requires `&mut`, which the borrow
//! checker keeps exclusive.

mod block;
mod casts;
mod counter;
mod error;
mod shared;

pub use crate::casts::{
    AsAny, const_pointer_cast, dynamic_pointer_cast, reinterpret_pointer_cast,
    static_pointer_cast, try_dynamic_pointer_cast,
};
pub use crate::counter::SharedCount;
pub use crate::error::Error;
pub use crate::shared::{Shared, swap};
