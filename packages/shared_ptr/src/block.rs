//! The control block that every handle to one value points at.
//!
//! Handles of different view types (after casts) share one block, so the block has to
//! remember how to drop the value through its original type. That knowledge lives in a
//! monomorphized release function stored next to the counter.

use std::ptr::NonNull;

use tracing::trace;

use crate::SharedCount;

/// Type-erased head of a control block.
///
/// Always the first field of an [`Owned<O>`], so a pointer to the header is also a pointer
/// to the whole block.
#[repr(C)]
pub(crate) struct Header {
    count: SharedCount,

    /// Drops the value and frees the block. Only ever called once, by the owner whose
    /// decrement observed zero.
    release: unsafe fn(NonNull<Header>),
}

#[repr(C)]
struct Owned<O: ?Sized> {
    header: Header,

    /// The value, as it was allocated by `Box`.
    value: NonNull<O>,
}

impl Header {
    /// Allocates a control block that takes ownership of the boxed value at `value`.
    ///
    /// The returned block starts with one reference, owned by the caller.
    ///
    /// # Safety
    ///
    /// `value` must come from `Box::into_raw` (or `Box::leak`) and nothing else may own it.
    pub(crate) unsafe fn allocate<O: ?Sized>(value: NonNull<O>) -> NonNull<Self> {
        let block = Box::new(Owned {
            header: Self {
                count: SharedCount::new(),
                release: release_owned::<O>,
            },
            value,
        });

        let block = NonNull::from(Box::leak(block)).cast::<Self>();
        trace!(?block, "allocated shared counter");

        block
    }

    pub(crate) fn count(&self) -> &SharedCount {
        &self.count
    }

    /// Gives up one reference to the block, releasing the value if it was the last one.
    ///
    /// # Safety
    ///
    /// `this` must point to a live block and the caller must own one of its references.
    /// That reference is consumed by this call and must not be used afterwards.
    pub(crate) unsafe fn release_ref(this: NonNull<Self>) {
        // SAFETY: The caller owns a reference, so the block is still alive.
        let header = unsafe { this.as_ref() };

        if header.count.decrement() != 0 {
            return;
        }

        let release = header.release;

        // SAFETY: The count just reached zero, so no other reference to the block exists
        // and nobody else will ever call `release`.
        unsafe {
            release(this);
        }
    }
}

/// # Safety
///
/// `header` must be the header of an `Owned<O>` created by `Header::allocate::<O>()`, whose
/// count has reached zero.
unsafe fn release_owned<O: ?Sized>(header: NonNull<Header>) {
    trace!(block = ?header, "releasing shared value");

    // SAFETY: `Header` is the first field of the `#[repr(C)]` `Owned<O>` that was leaked from
    // a `Box` in `allocate()`, so casting back recovers that box.
    let block = unsafe { Box::from_raw(header.cast::<Owned<O>>().as_ptr()) };

    // SAFETY: The value came from `Box::into_raw` and the block was its only owner.
    let value = unsafe { Box::from_raw(block.value.as_ptr()) };

    // The block goes first so it is freed even if dropping the value panics.
    drop(block);
    drop(value);
}
