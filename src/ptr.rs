use crate::domain::RcuDomain;
use crate::participant::ReadSection;
use crate::state::EpochRegistry;
use crate::sync::{Arc, AtomicPtr, Ordering};
use std::boxed::Box;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

/// An RCU-protected slot holding at most one value.
///
/// `RcuSlot<T>` is an atomic pointer that many readers can load concurrently
/// (via [`read`](Self::read) inside a [`ReadSection`]) while writers swap in
/// new values (via [`replace`](Self::replace) / [`remove`](Self::remove)).
/// A null pointer means the slot is empty.
///
/// Every slot belongs to the [`RcuDomain`] it was created in. Only sections
/// and participants of that domain may read from or write to it; anything
/// else panics, since another domain's grace periods never wait for this
/// domain's readers.
///
/// **Safety Contract**:
/// - Readers must be inside a `ReadSection` when calling `read()`. The
///   returned reference outlives neither the section nor the slot.
/// - A displaced value comes back as a [`Retired`] owned by the writer, who
///   must hand it to `Participant::retire` before it is freed.
///
/// **Typical Usage**:
/// ```
/// use epoch_rcu::{RcuDomain, RcuSlot};
///
/// let domain = RcuDomain::new();
/// let slot = RcuSlot::new(&domain);
/// let me = domain.join().unwrap();
///
/// // Writer path:
/// let retired = me.publish(&slot, 42u32);
/// me.retire(retired);
///
/// // Reader path:
/// let section = me.enter();
/// assert_eq!(slot.read(&section), Some(&42));
/// drop(section);
/// ```
///
/// 一个受 RCU 保护、最多持有一个值的槽。
/// `RcuSlot<T>` 是一个原子指针：多个读者可以在 [`ReadSection`] 内通过
/// [`read`](Self::read) 并发读取，写入者通过 [`replace`](Self::replace) /
/// [`remove`](Self::remove) 换入新值。空指针表示槽为空。
/// 每个槽都属于创建它的 [`RcuDomain`]，只有该域的临界区和参与者可以读写它，否则 panic。
/// **安全合约**：
/// - 读者调用 `read()` 时必须处于 `ReadSection` 内。返回的引用既不能比临界区活得更久，也不能比槽活得更久。
/// - 被替换的值以 [`Retired`] 的形式归写入者所有，写入者必须在释放前把它交给
///   `Participant::retire`。
pub struct RcuSlot<T> {
    ptr: AtomicPtr<T>,
    registry: Arc<EpochRegistry>,
    _owns: PhantomData<*const T>,
}

// Values move between threads on replace and are shared by reference on read.
unsafe impl<T: Send> Send for RcuSlot<T> {}
unsafe impl<T: Send + Sync> Sync for RcuSlot<T> {}

impl<T> RcuSlot<T> {
    /// Create an empty slot guarded by `domain`.
    /// 创建一个受 `domain` 保护的空槽。
    #[inline]
    pub fn new(domain: &RcuDomain) -> Self {
        Self::from_raw(domain, ptr::null_mut())
    }

    /// Create a slot guarded by `domain` and holding `value`.
    /// 创建一个受 `domain` 保护并持有 `value` 的槽。
    #[inline]
    pub fn with_value(domain: &RcuDomain, value: T) -> Self {
        Self::from_raw(domain, Box::into_raw(Box::new(value)))
    }

    #[inline]
    fn from_raw(domain: &RcuDomain, ptr: *mut T) -> Self {
        Self {
            ptr: AtomicPtr::new(ptr),
            registry: domain.registry().clone(),
            _owns: PhantomData,
        }
    }

    /// Whether this slot is guarded by `registry`.
    #[inline]
    pub(crate) fn is_guarded_by(&self, registry: &EpochRegistry) -> bool {
        self.registry.is(registry)
    }

    /// Reader load: the current value, or `None` if the slot is empty.
    ///
    /// The returned reference borrows both the slot and the section, so it
    /// cannot be used after the section exits or the slot is dropped:
    ///
    /// ```compile_fail
    /// use epoch_rcu::{RcuDomain, RcuSlot};
    ///
    /// let domain = RcuDomain::new();
    /// let me = domain.join().unwrap();
    /// let section = me.enter();
    /// let escaped;
    /// {
    ///     let slot = RcuSlot::with_value(&domain, 7u32);
    ///     escaped = slot.read(&section);
    /// }
    /// assert_eq!(escaped, Some(&7));
    /// ```
    ///
    /// # Panics
    /// Panics if `section` belongs to a different domain than this slot.
    ///
    /// 读取者 load：当前值；槽为空时返回 `None`。
    /// 返回的引用同时借用槽和临界区，因此不能在临界区退出或槽被 drop 之后使用。
    /// 如果 `section` 属于与此槽不同的域，则 panic。
    #[inline]
    pub fn read<'s>(&'s self, section: &'s ReadSection<'_>) -> Option<&'s T> {
        assert!(
            self.is_guarded_by(section.registry()),
            "BUG: RcuSlot read through a ReadSection of another RcuDomain. \
             That domain's grace periods do not protect this slot."
        );

        let ptr = self.ptr.load(Ordering::Acquire);
        // SAFETY:
        // 1. A non-null `ptr` came from `Box::into_raw` in `replace` or `with_value`.
        // 2. `section` is open in this slot's domain, so no writer frees a value
        //    displaced after the section published its epoch.
        // 3. The slot is borrowed for `'s`, so its own drop cannot free the value.
        unsafe { ptr.as_ref() }
    }

    /// Writer swap: install `value` (or empty the slot) and return the old value.
    ///
    /// Retries a compare-and-swap against the last observed pointer, so
    /// concurrent writers each receive exactly the value they displaced.
    ///
    /// 写入者交换：安装 `value`（或清空槽）并返回旧值。
    /// 对上次观察到的指针重试比较交换，因此并发写入者各自恰好拿到自己替换掉的值。
    pub fn replace(&self, value: Option<Box<T>>) -> Retired<T> {
        let new_ptr = value.map_or(ptr::null_mut(), Box::into_raw);

        let mut current = self.ptr.load(Ordering::Relaxed);
        loop {
            // Release publishes the new value's contents to readers; acquire
            // makes the displaced value's contents ours to drop.
            match self.ptr.compare_exchange_weak(
                current,
                new_ptr,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(old) => return Retired::from_raw(old, self.registry.clone()),
                Err(actual) => current = actual,
            }
        }
    }

    /// Writer delete: empty the slot and return the old value.
    #[inline]
    pub fn remove(&self) -> Retired<T> {
        self.replace(None)
    }

    /// Racy snapshot of whether the slot is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.load(Ordering::Relaxed).is_null()
    }
}

impl<T> std::fmt::Debug for RcuSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ptr = self.ptr.load(Ordering::Relaxed);
        f.debug_tuple("RcuSlot").field(&ptr).finish()
    }
}

impl<T> Drop for RcuSlot<T> {
    /// When an `RcuSlot` is dropped, it drops the current value.
    ///
    /// `&mut self` means no reader can still hold a section borrowing this slot.
    ///
    /// 当 `RcuSlot` 被 drop 时，它会 drop 当前值。
    /// `&mut self` 意味着没有读者仍持有借用此槽的临界区。
    fn drop(&mut self) {
        let ptr = self.ptr.load(Ordering::Relaxed);
        if !ptr.is_null() {
            unsafe {
                drop(Box::from_raw(ptr));
            }
        }
    }
}

/// A value displaced from an [`RcuSlot`], waiting for its grace period.
///
/// Exclusively owned by the writer that displaced it. Pass it to
/// `Participant::retire` to free it once no reader can still see it.
/// Dropping it any other way leaks the value instead of freeing it early.
///
/// 从 [`RcuSlot`] 中被替换出来、正在等待宽限期的值。
/// 由替换它的写入者独占。把它交给 `Participant::retire`，在没有读者能看到它之后释放。
/// 以其他方式 drop 它会泄漏该值，而不是提前释放。
#[must_use = "a retired value must be passed to `Participant::retire`"]
pub struct Retired<T> {
    ptr: Option<NonNull<T>>,
    registry: Arc<EpochRegistry>,
}

unsafe impl<T: Send> Send for Retired<T> {}

impl<T> Retired<T> {
    #[inline]
    fn from_raw(ptr: *mut T, registry: Arc<EpochRegistry>) -> Self {
        Self {
            ptr: NonNull::new(ptr),
            registry,
        }
    }

    /// Whether this value was displaced from a slot guarded by `registry`.
    #[inline]
    pub(crate) fn is_guarded_by(&self, registry: &EpochRegistry) -> bool {
        self.registry.is(registry)
    }

    /// Whether the slot was already empty when this value was displaced.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Free the value. Callers must have waited out a grace period.
    pub(crate) fn reclaim(mut self) {
        if let Some(ptr) = self.ptr.take() {
            // SAFETY: `ptr` came from `Box::into_raw` and was swapped out of
            // the slot, so this is its only owner.
            unsafe {
                drop(Box::from_raw(ptr.as_ptr()));
            }
        }
    }
}

impl<T> std::fmt::Debug for Retired<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Retired").field(&self.ptr).finish()
    }
}

impl<T> Drop for Retired<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr.take() {
            tracing::warn!(
                ptr = ?ptr,
                "retired value dropped without a grace period; leaking it"
            );
        }
    }
}
