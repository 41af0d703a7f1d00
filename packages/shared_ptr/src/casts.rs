//! Conversions between handles of related types that keep sharing one counter.
//!
//! Every function here takes a handle by reference and returns a new handle of a different
//! view type. The new handle is one more owner of the same value: the counter is incremented
//! and nothing is allocated. Casting an empty handle always produces an empty handle.

use std::any::{Any, type_name};
use std::ptr::NonNull;

use crate::Shared;
use crate::error::{Error, Result};

/// Exposes a value as [`dyn Any`](Any) so its concrete type can be checked at runtime.
///
/// Implemented for every `'static` sized type and for the `dyn Any` trait objects. To make
/// [`dynamic_pointer_cast()`] work on handles to your own trait objects, declare `AsAny` as a
/// supertrait of your trait:
///
/// ```
/// use shared_ptr::{AsAny, Shared, dynamic_pointer_cast, static_pointer_cast};
///
/// trait Shape: AsAny {
///     fn area(&self) -> f64;
/// }
///
/// struct Square(f64);
///
/// impl Shape for Square {
///     fn area(&self) -> f64 {
///         self.0 * self.0
///     }
/// }
///
/// let square = Shared::new(Square(2.0));
/// let shape: Shared<dyn Shape> = static_pointer_cast(&square, |s| s as &dyn Shape);
/// assert_eq!(shape.area(), 4.0);
///
/// let again: Shared<Square> = dynamic_pointer_cast(&shape);
/// assert_eq!(again.0, 2.0);
/// assert_eq!(square.use_count(), 3);
/// ```
pub trait AsAny {
    /// Returns the value as a `dyn Any` that carries its concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any + Send {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AsAny for dyn Any + Send + Sync {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Converts a handle into a view of a related type that is known to be valid at compile time.
///
/// The conversion is a reference projection: `cast` receives the value as `U` and returns a
/// reference of type `T` derived from it, for example the value as a trait object or one of
/// its fields. The cast cannot fail.
///
/// # Examples
///
/// ```
/// use std::fmt::Debug;
///
/// use shared_ptr::{Shared, static_pointer_cast};
///
/// let numbers = Shared::new(vec![1, 2, 3]);
/// let debug: Shared<dyn Debug> = static_pointer_cast(&numbers, |v| v as &dyn Debug);
///
/// assert_eq!(format!("{:?}", &*debug), "[1, 2, 3]");
/// assert_eq!(numbers.use_count(), 2);
/// ```
#[must_use]
pub fn static_pointer_cast<T: ?Sized, U: ?Sized, F>(other: &Shared<U>, cast: F) -> Shared<T>
where
    F: for<'a> FnOnce(&'a U) -> &'a T,
{
    let Some(value) = other.get() else {
        return Shared::empty();
    };

    let view = NonNull::from(cast(value));

    // SAFETY: `view` was derived from a shared borrow of the value that `other` owns, and
    // values are `'static`, so it stays valid for as long as that value is alive.
    unsafe { Shared::aliasing(other, view) }
}

/// Creates another handle to the same value through the same pointer.
///
/// Rust raw pointers do not carry a `const` qualifier on the pointee type: mutability is a
/// property of the reference handed out, and handles only ever hand out shared references.
/// Removing or adding constness therefore leaves the pointer unchanged, and the result is
/// equivalent to [`Clone::clone()`]. The function completes the set of casts so code written
/// against the whole family keeps its shape.
///
/// # Examples
///
/// ```
/// use shared_ptr::{Shared, const_pointer_cast};
///
/// let original = Shared::new(1_u8);
/// let recast = const_pointer_cast(&original);
///
/// assert!(Shared::ptr_eq(&original, &recast));
/// assert_eq!(original.use_count(), 2);
/// ```
#[must_use]
pub fn const_pointer_cast<T: ?Sized>(other: &Shared<T>) -> Shared<T> {
    let Some(view) = other.as_ptr() else {
        return Shared::empty();
    };

    // SAFETY: Same pointer as the one `other` already uses.
    unsafe { Shared::aliasing(other, view) }
}

/// Reinterprets the memory a handle points at as a different type.
///
/// This is the handle-level counterpart of a raw pointer cast and is used to go from a general
/// view back to a specific one when the caller knows the concrete type, without paying for
/// a runtime check.
///
/// # Safety
///
/// The memory viewed by `other` must be a valid, properly aligned `T` for as long as the value
/// is alive, and it must be valid to create shared references of type `&T` to it.
///
/// # Examples
///
/// ```
/// use std::fmt::Display;
///
/// use shared_ptr::{Shared, reinterpret_pointer_cast, static_pointer_cast};
///
/// let number = Shared::new(17_u32);
/// let display: Shared<dyn Display> = static_pointer_cast(&number, |n| n as &dyn Display);
///
/// // SAFETY: The value behind the trait object is known to be a `u32`.
/// let back: Shared<u32> = unsafe { reinterpret_pointer_cast(&display) };
/// assert_eq!(*back, 17);
/// assert_eq!(number.use_count(), 3);
/// ```
#[must_use]
pub unsafe fn reinterpret_pointer_cast<T, U: ?Sized>(other: &Shared<U>) -> Shared<T> {
    let Some(view) = other.as_ptr() else {
        return Shared::empty();
    };

    // SAFETY: Forwarding the guarantees of the caller.
    unsafe { Shared::aliasing(other, view.cast::<T>()) }
}

/// Converts a handle into a view of `T` if the value is a `T`, checked at runtime.
///
/// On a type mismatch the result is an empty handle: it owns nothing and reports a use
/// count of 0, just like a failed check on a raw pointer produces a null pointer. The handle
/// passed in is not affected. Use [`try_dynamic_pointer_cast()`] to learn why a cast failed.
///
/// # Examples
///
/// ```
/// use std::any::Any;
///
/// use shared_ptr::{Shared, dynamic_pointer_cast};
///
/// let boxed: Box<dyn Any + Send + Sync> = Box::new(String::from("text"));
/// let any = Shared::from_box(boxed);
///
/// let text: Shared<String> = dynamic_pointer_cast(&any);
/// assert_eq!(&*text, "text");
///
/// let number: Shared<u32> = dynamic_pointer_cast(&any);
/// assert!(number.is_empty());
/// assert_eq!(number.use_count(), 0);
/// assert_eq!(any.use_count(), 2);
/// ```
#[must_use]
pub fn dynamic_pointer_cast<T: Any, U: ?Sized + AsAny>(other: &Shared<U>) -> Shared<T> {
    try_dynamic_pointer_cast(other).unwrap_or_default()
}

/// Converts a handle into a view of `T` if the value is a `T`, checked at runtime, reporting
/// why the conversion failed otherwise.
///
/// # Errors
///
/// Returns [`Error::EmptySource`] if `other` is empty and [`Error::TypeMismatch`] if the value
/// is not a `T`. The handle passed in is not affected either way.
///
/// # Examples
///
/// ```
/// use std::any::Any;
///
/// use shared_ptr::{Error, Shared, try_dynamic_pointer_cast};
///
/// let boxed: Box<dyn Any + Send + Sync> = Box::new(5_i64);
/// let any = Shared::from_box(boxed);
///
/// let number = try_dynamic_pointer_cast::<i64, _>(&any).unwrap();
/// assert_eq!(*number, 5);
///
/// let error = try_dynamic_pointer_cast::<u8, _>(&any).unwrap_err();
/// assert!(matches!(error, Error::TypeMismatch { .. }));
/// ```
pub fn try_dynamic_pointer_cast<T: Any, U: ?Sized + AsAny>(
    other: &Shared<U>,
) -> Result<Shared<T>> {
    let value = other.get().ok_or_else(|| Error::EmptySource {
        target: type_name::<T>(),
    })?;

    let view = AsAny::as_any(value)
        .downcast_ref::<T>()
        .ok_or_else(|| Error::TypeMismatch {
            view: type_name::<U>(),
            target: type_name::<T>(),
        })?;

    let view = NonNull::from(view);

    // SAFETY: The runtime check proved `view` points at the value that `other` owns.
    Ok(unsafe { Shared::aliasing(other, view) })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::fmt::Display;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    trait Shape: AsAny + Send + Sync {
        fn name(&self) -> String;
    }

    struct Circle {
        radius: u32,
        drops: Arc<AtomicUsize>,
    }

    impl Shape for Circle {
        fn name(&self) -> String {
            format!("circle({})", self.radius)
        }
    }

    impl Drop for Circle {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::Relaxed);
        }
    }

    struct Triangle;

    impl Shape for Triangle {
        fn name(&self) -> String {
            "triangle".to_string()
        }
    }

    fn circle(radius: u32, drops: &Arc<AtomicUsize>) -> Shared<Circle> {
        Shared::new(Circle {
            radius,
            drops: Arc::clone(drops),
        })
    }

    fn as_shape(circle: &Shared<Circle>) -> Shared<dyn Shape> {
        static_pointer_cast(circle, |c| c as &dyn Shape)
    }

    #[test]
    fn static_cast_shares_counter() {
        let drops = Arc::new(AtomicUsize::new(0));
        let concrete = circle(2, &drops);

        let shape = as_shape(&concrete);

        assert_eq!(shape.name(), "circle(2)");
        assert_eq!(concrete.use_count(), 2);
        assert_eq!(shape.use_count(), 2);
        assert!(Shared::same_owner(&concrete, &shape));

        drop(concrete);
        assert_eq!(drops.load(Ordering::Relaxed), 0);
        assert_eq!(shape.use_count(), 1);

        drop(shape);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn static_cast_to_field() {
        let drops = Arc::new(AtomicUsize::new(0));
        let concrete = circle(5, &drops);

        let radius: Shared<u32> = static_pointer_cast(&concrete, |c| &c.radius);
        drop(concrete);

        assert_eq!(*radius, 5);
        assert_eq!(drops.load(Ordering::Relaxed), 0);

        drop(radius);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn casts_of_empty_are_empty() {
        let empty = Shared::<Circle>::empty();

        let shape: Shared<dyn Shape> = static_pointer_cast(&empty, |c| c as &dyn Shape);
        assert!(shape.is_empty());

        assert!(const_pointer_cast(&empty).is_empty());

        // SAFETY: Nothing is dereferenced, the source is empty.
        let reinterpreted: Shared<u64> = unsafe { reinterpret_pointer_cast(&empty) };
        assert!(reinterpreted.is_empty());

        let dynamic: Shared<Circle> = dynamic_pointer_cast(&shape);
        assert!(dynamic.is_empty());
    }

    #[test]
    fn const_cast_is_same_pointer() {
        let text: Shared<str> = Shared::from_box(Box::from("abc"));
        let recast = const_pointer_cast(&text);

        assert!(Shared::ptr_eq(&text, &recast));
        assert_eq!(&*recast, "abc");
        assert_eq!(text.use_count(), 2);
    }

    #[test]
    fn reinterpret_back_to_concrete() {
        let drops = Arc::new(AtomicUsize::new(0));
        let concrete = circle(3, &drops);
        let shape = as_shape(&concrete);
        drop(concrete);

        // SAFETY: The shape is known to be a circle.
        let back: Shared<Circle> = unsafe { reinterpret_pointer_cast(&shape) };

        assert_eq!(back.radius, 3);
        assert_eq!(back.use_count(), 2);

        drop(shape);
        drop(back);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn reinterpret_between_same_layout() {
        let signed = Shared::new(-1_i32);

        // SAFETY: `i32` and `u32` have the same size and alignment and every bit pattern is valid.
        let unsigned: Shared<u32> = unsafe { reinterpret_pointer_cast(&signed) };

        assert_eq!(*unsigned, u32::MAX);
        assert_eq!(signed.use_count(), 2);
    }

    #[test]
    fn dynamic_cast_success() {
        let drops = Arc::new(AtomicUsize::new(0));
        let shape = as_shape(&circle(4, &drops));

        let back: Shared<Circle> = dynamic_pointer_cast(&shape);

        assert_eq!(back.radius, 4);
        assert_eq!(shape.use_count(), 2);
        assert!(Shared::same_owner(&shape, &back));
    }

    // A failed runtime check yields a fully empty handle, not a handle that still shares the
    // counter while viewing nothing. The source keeps its count unchanged.
    #[test]
    fn dynamic_cast_failure_yields_empty_handle() {
        let drops = Arc::new(AtomicUsize::new(0));
        let shape = as_shape(&circle(4, &drops));
        assert_eq!(shape.use_count(), 1);

        let wrong: Shared<Triangle> = dynamic_pointer_cast(&shape);

        assert!(wrong.is_empty());
        assert_eq!(wrong.use_count(), 0);
        assert!(!Shared::same_owner(&shape, &wrong));

        assert_eq!(shape.use_count(), 1);
        assert_eq!(shape.name(), "circle(4)");
        assert_eq!(drops.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn dynamic_cast_from_concrete() {
        let number = Shared::new(8_u16);

        let same: Shared<u16> = dynamic_pointer_cast(&number);
        let other: Shared<i16> = dynamic_pointer_cast(&number);

        assert_eq!(*same, 8);
        assert!(other.is_empty());
        assert_eq!(number.use_count(), 2);
    }

    #[test]
    fn dynamic_cast_from_any() {
        let boxed: Box<dyn Any + Send + Sync> = Box::new(3.5_f64);
        let any = Shared::from_box(boxed);
        let plain: Shared<dyn Any> = static_pointer_cast(&any, |a| a as &dyn Any);

        let float: Shared<f64> = dynamic_pointer_cast(&plain);
        assert!(float.get().is_some_and(|f| (*f - 3.5).abs() < f64::EPSILON));
        assert_eq!(any.use_count(), 3);
    }

    #[test]
    fn try_dynamic_cast_reports_reason() {
        let shape = as_shape(&circle(1, &Arc::new(AtomicUsize::new(0))));

        let mismatch = try_dynamic_pointer_cast::<Triangle, _>(&shape);
        assert!(matches!(
            mismatch,
            Err(Error::TypeMismatch { view, target })
                if view.contains("Shape") && target.contains("Triangle")
        ));

        let empty = try_dynamic_pointer_cast::<Circle, _>(&Shared::<dyn Shape>::empty());
        assert!(matches!(
            empty,
            Err(Error::EmptySource { target }) if target.contains("Circle")
        ));

        let found = try_dynamic_pointer_cast::<Circle, _>(&shape);
        assert!(found.is_ok_and(|c| c.radius == 1));
        assert_eq!(shape.use_count(), 1);
    }

    #[test]
    fn views_of_different_types_release_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let concrete = circle(6, &drops);

        let shape = as_shape(&concrete);
        let display: Shared<dyn Display> =
            static_pointer_cast(&concrete, |c| &c.radius as &dyn Display);
        let radius: Shared<u32> = static_pointer_cast(&concrete, |c| &c.radius);
        let back: Shared<Circle> = dynamic_pointer_cast(&shape);

        assert_eq!(concrete.use_count(), 5);

        drop(concrete);
        drop(back);
        drop(shape);
        drop(radius);
        assert_eq!(drops.load(Ordering::Relaxed), 0);
        assert_eq!(display.to_string(), "6");

        drop(display);
        assert_eq!(drops.load(Ordering::Relaxed), 1);
    }
}
