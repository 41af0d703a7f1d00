use std::borrow::Borrow;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr::{self, NonNull};

use crate::block::Header;

const ERR_EMPTY_DEREF: &str = "dereferenced an empty Shared handle";

/// A shared, reference-counted handle to a heap-allocated value.
///
/// Any number of handles may own the same value. Cloning a handle registers one more owner,
/// dropping a handle unregisters one, and the value is dropped exactly when the last owner
/// goes away, on whichever thread that happens.
///
/// A handle may also be empty, in which case it owns nothing, reports a use count of 0 and
/// returns `None` from [`get()`](Self::get).
///
/// Handles can be converted into views of a different type that keep sharing the same
/// counter, using [`Shared::map()`] or the cast functions ([`static_pointer_cast`],
/// [`const_pointer_cast`], [`reinterpret_pointer_cast`], [`dynamic_pointer_cast`]). The value
/// is always dropped through the type it was created with, whatever type the last surviving
/// handle views it as.
///
/// # Examples
///
/// ```
/// use shared_ptr::Shared;
///
/// let first = Shared::new(String::from("hello"));
/// let second = first.clone();
///
/// assert_eq!(first.use_count(), 2);
/// assert_eq!(&*second, "hello");
///
/// drop(first);
/// assert_eq!(second.use_count(), 1);
/// ```
///
/// # Thread safety
///
/// Values must be [`Send`] and [`Sync`] to be placed into a handle, because the last owner to
/// let go may live on any thread. A handle is itself thread-safe if the type it views the value
/// as is `Send + Sync`. Trait object views such as `Shared<dyn Trait>` are single-threaded
/// unless the trait object type carries those bounds.
///
/// [`static_pointer_cast`]: crate::static_pointer_cast
/// [`const_pointer_cast`]: crate::const_pointer_cast
/// [`reinterpret_pointer_cast`]: crate::reinterpret_pointer_cast
/// [`dynamic_pointer_cast`]: crate::dynamic_pointer_cast
pub struct Shared<T: ?Sized> {
    // The view pointer and the block pointer are only ever present together.
    inner: Option<Inner<T>>,

    _owns: PhantomData<T>,
}

struct Inner<T: ?Sized> {
    view: NonNull<T>,
    block: NonNull<Header>,
}

impl<T: ?Sized> Clone for Inner<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Inner<T> {}

impl<T: Send + Sync + 'static> Shared<T> {
    /// Moves `value` to the heap and creates the first handle to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let handle = Shared::new(42);
    /// assert_eq!(*handle, 42);
    /// assert_eq!(handle.use_count(), 1);
    /// ```
    #[must_use]
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized + Send + Sync + 'static> Shared<T> {
    /// Takes ownership of an already boxed value and creates the first handle to it.
    ///
    /// This works for unsized values such as slices, strings and trait objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let handle: Shared<[u8]> = Shared::from_box(vec![1, 2, 3].into_boxed_slice());
    /// assert_eq!(handle.len(), 3);
    /// ```
    #[must_use]
    pub fn from_box(value: Box<T>) -> Self {
        let view = NonNull::from(Box::leak(value));

        // SAFETY: The value was leaked from a box just now and nothing else owns it.
        let block = unsafe { Header::allocate(view) };

        Self::from_inner(Inner { view, block })
    }

    /// Creates the first handle to a value that was allocated with `Box` and turned into a
    /// raw pointer.
    ///
    /// A null pointer produces an empty handle and allocates nothing.
    ///
    /// # Safety
    ///
    /// `ptr` must either be null or have come from [`Box::into_raw`], and nothing else may
    /// own the allocation. Passing the same pointer to this function twice causes a double
    /// free.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let raw = Box::into_raw(Box::new(7_u64));
    ///
    /// // SAFETY: The pointer came from `Box::into_raw` and is passed in only once.
    /// let handle = unsafe { Shared::from_raw(raw) };
    /// assert_eq!(*handle, 7);
    ///
    /// // SAFETY: A null pointer is always accepted.
    /// let empty = unsafe { Shared::<u64>::from_raw(std::ptr::null_mut()) };
    /// assert!(empty.is_empty());
    /// ```
    #[must_use]
    pub unsafe fn from_raw(ptr: *mut T) -> Self {
        let Some(view) = NonNull::new(ptr) else {
            return Self::empty();
        };

        // SAFETY: Forwarding the ownership guarantee of the caller.
        let block = unsafe { Header::allocate(view) };

        Self::from_inner(Inner { view, block })
    }
}

impl<T: ?Sized> Shared<T> {
    /// Creates a handle that owns nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let empty = Shared::<String>::empty();
    /// assert!(empty.is_empty());
    /// assert_eq!(empty.use_count(), 0);
    /// assert!(empty.get().is_none());
    /// ```
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            inner: None,
            _owns: PhantomData,
        }
    }

    const fn from_inner(inner: Inner<T>) -> Self {
        Self {
            inner: Some(inner),
            _owns: PhantomData,
        }
    }

    /// Creates a new owner of the value that `source` owns, viewing it through `view`.
    ///
    /// Registers one more owner on the counter of `source`. If `source` is empty, the result
    /// is empty as well and `view` is ignored.
    ///
    /// # Safety
    ///
    /// `view` must point to memory that stays valid and is never mutably aliased for as long
    /// as the value owned by `source` is alive, and it must be valid to create shared
    /// references of type `&T` to it.
    #[must_use]
    pub(crate) unsafe fn aliasing<U: ?Sized>(source: &Shared<U>, view: NonNull<T>) -> Self {
        let Some(block) = source.inner.map(|inner| inner.block) else {
            return Self::empty();
        };

        // SAFETY: `source` owns a reference, so the block is alive.
        unsafe { block.as_ref() }.count().increment();

        Self::from_inner(Inner { view, block })
    }

    /// Converts the handle into a view of a different type, keeping ownership of the value.
    ///
    /// The counter is transferred, not incremented: this is the cross-type counterpart of a
    /// move. The closure receives the current view and returns a reference derived from it,
    /// for example a field of the value or the value as a trait object.
    ///
    /// An empty handle converts into an empty handle without calling `f`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::fmt::Display;
    ///
    /// use shared_ptr::Shared;
    ///
    /// struct Point {
    ///     x: i32,
    ///     y: i32,
    /// }
    ///
    /// let point = Shared::new(Point { x: 3, y: 4 });
    /// let y: Shared<i32> = Shared::map(point, |p| &p.y);
    /// assert_eq!(*y, 4);
    /// assert_eq!(y.use_count(), 1);
    ///
    /// let text: Shared<dyn Display> = Shared::map(y, |y| y as &dyn Display);
    /// assert_eq!(text.to_string(), "4");
    /// ```
    #[must_use]
    pub fn map<U: ?Sized, F>(mut this: Self, f: F) -> Shared<U>
    where
        F: for<'a> FnOnce(&'a T) -> &'a U,
    {
        let Some(value) = this.get() else {
            return Shared::empty();
        };

        let view = NonNull::from(f(value));

        // `this` gives up its reference without decrementing, the new handle takes it over.
        Shared {
            inner: this.inner.take().map(|inner| Inner {
                view,
                block: inner.block,
            }),
            _owns: PhantomData,
        }
    }

    /// Returns a reference to the value, or `None` if the handle is empty.
    #[must_use]
    #[inline]
    pub fn get(&self) -> Option<&T> {
        // SAFETY: While this handle owns a reference the value is alive, and handles only
        // ever hand out shared references to it.
        self.inner.map(|inner| unsafe { inner.view.as_ref() })
    }

    /// Returns a pointer to the value, or `None` if the handle is empty.
    #[must_use]
    #[inline]
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.inner.map(|inner| inner.view)
    }

    /// Whether the handle owns nothing.
    ///
    /// This is the inverse of the "truthiness" of a pointer: a handle that is not empty
    /// can be dereferenced.
    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    /// Returns the number of handles that currently share ownership of the value, or 0 if
    /// the handle is empty.
    ///
    /// Other threads may change the count at any time, so the result is only a snapshot.
    #[must_use]
    pub fn use_count(&self) -> usize {
        self.header()
            .map_or(0, |header| header.count().current_count())
    }

    /// Exchanges the contents of two handles.
    ///
    /// No counter is touched and nothing is allocated or released.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let mut a = Shared::new(1);
    /// let mut b = Shared::new(2);
    ///
    /// a.swap(&mut b);
    /// assert_eq!((*a, *b), (2, 1));
    /// ```
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(&mut self.inner, &mut other.inner);
    }

    /// Replaces the contents of this handle with `rhs`.
    ///
    /// Pass a clone to copy-assign or a moved handle to move-assign. The previous contents of
    /// this handle are swapped into `rhs` and released when it goes out of scope at the end
    /// of the call. Assigning a clone of a handle to itself leaves the handle unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let mut target = Shared::new("old");
    /// let source = Shared::new("new");
    ///
    /// target.assign(source.clone());
    /// assert_eq!(*target, "new");
    /// assert_eq!(source.use_count(), 2);
    ///
    /// target.assign(target.clone());
    /// assert_eq!(target.use_count(), 2);
    /// ```
    pub fn assign(&mut self, mut rhs: Self) {
        rhs.swap(self);
    }

    /// Moves the contents out of this handle, leaving it empty.
    ///
    /// The counter is not touched: the returned handle takes over the reference.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let mut source = Shared::new(5);
    /// let target = source.take();
    ///
    /// assert!(source.is_empty());
    /// assert_eq!(target.use_count(), 1);
    /// ```
    #[must_use]
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }

    /// Gives up ownership of the value, leaving the handle empty.
    ///
    /// The value is released if this was its last owner.
    pub fn reset(&mut self) {
        self.assign(Self::empty());
    }

    /// Whether two handles view the same value through the same pointer.
    ///
    /// Two empty handles are considered equal.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        match (this.inner, other.inner) {
            (Some(a), Some(b)) => {
                a.block == b.block && ptr::addr_eq(a.view.as_ptr(), b.view.as_ptr())
            }
            (None, None) => true,
            _ => false,
        }
    }

    /// Whether two handles, possibly of different view types, share ownership of the same
    /// value and therefore the same counter.
    ///
    /// # Examples
    ///
    /// ```
    /// use shared_ptr::Shared;
    ///
    /// let pair = Shared::new((1_u8, 2_u16));
    /// let second = Shared::map(pair.clone(), |p| &p.1);
    ///
    /// assert!(Shared::same_owner(&pair, &second));
    /// assert!(!Shared::same_owner(&pair, &Shared::new((1_u8, 2_u16))));
    /// ```
    #[must_use]
    pub fn same_owner<U: ?Sized>(this: &Self, other: &Shared<U>) -> bool {
        match (this.inner, other.inner) {
            (Some(a), Some(b)) => a.block == b.block,
            _ => false,
        }
    }

    fn header(&self) -> Option<&Header> {
        // SAFETY: While this handle owns a reference the block is alive.
        self.inner.map(|inner| unsafe { inner.block.as_ref() })
    }
}

/// Exchanges the contents of two handles. See [`Shared::swap()`].
pub fn swap<T: ?Sized>(lhs: &mut Shared<T>, rhs: &mut Shared<T>) {
    lhs.swap(rhs);
}

impl<T: ?Sized> Clone for Shared<T> {
    /// Creates another owner of the same value, incrementing the counter.
    ///
    /// Cloning an empty handle produces another empty handle. Never allocates.
    fn clone(&self) -> Self {
        if let Some(header) = self.header() {
            header.count().increment();
        }

        Self {
            inner: self.inner,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Shared<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            // SAFETY: This handle owned one reference to the block and gives it up here.
            unsafe {
                Header::release_ref(inner.block);
            }
        }
    }
}

impl<T: ?Sized> Default for Shared<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for Shared<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty.
    fn deref(&self) -> &T {
        self.get().expect(ERR_EMPTY_DEREF)
    }
}

impl<T: ?Sized> Borrow<T> for Shared<T> {
    fn borrow(&self) -> &T {
        self
    }
}

impl<T: ?Sized> AsRef<T> for Shared<T> {
    fn as_ref(&self) -> &T {
        self
    }
}

impl<T: Send + Sync + 'static> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized + Send + Sync + 'static> From<Box<T>> for Shared<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("value", &self.get())
            .field("use_count", &self.use_count())
            .finish()
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let address = self
            .as_ptr()
            .map_or(ptr::null(), |view| view.as_ptr().cast_const().cast::<()>());

        fmt::Pointer::fmt(&address, f)
    }
}

// SAFETY: Every value is required to be `Send + Sync` when the first handle to it is created,
// so it may be dropped from any thread. Through the view, handles only hand out shared
// references, which may cross threads if the view type is `Sync`. The counter is atomic.
unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T> {}

// SAFETY: See above. A `&Shared<T>` only permits cloning (atomic) and shared access.
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T> {}
