//! Epoch-based RCU for a single shared pointer slot.
//!
//! Many reader threads and a few writer threads share one [`RcuSlot`]. Readers
//! never lock: they open a [`ReadSection`], load the pointer and exit. Writers
//! swap in a new value, wait for a grace period and then free the displaced
//! one, proving along the way that no reader can still be looking at it.
//!
//! The spin locks in [`lock`] protect the same kind of slot by mutual
//! exclusion and serve as the baseline the RCU path is measured against.
//!
//! ```
//! use epoch_rcu::{RcuDomain, RcuSlot};
//! use std::sync::Arc;
//! use std::thread;
//!
//! let domain = RcuDomain::builder().capacity(4).build();
//! let slot = Arc::new(RcuSlot::with_value(&domain, String::from("v0")));
//!
//! let reader = {
//!     let domain = domain.clone();
//!     let slot = slot.clone();
//!     thread::spawn(move || {
//!         let me = domain.join().unwrap();
//!         for _ in 0..100 {
//!             let section = me.enter();
//!             if let Some(value) = slot.read(&section) {
//!                 assert!(value.starts_with('v'));
//!             }
//!         }
//!     })
//! };
//!
//! let writer = domain.join().unwrap();
//! for i in 1..10 {
//!     let retired = writer.publish(&slot, format!("v{i}"));
//!     writer.retire(retired);
//! }
//! reader.join().unwrap();
//! ```
//!
//! 单个共享指针槽上的基于纪元的 RCU。
//! 多个读者线程和少量写入者线程共享一个 [`RcuSlot`]。读者从不加锁：
//! 它们打开一个 [`ReadSection`]，读取指针后退出。写入者换入新值，等待一个宽限期，
//! 然后释放被替换的值，并在此过程中证明没有读者仍在访问它。

mod detector;
mod domain;
mod error;
mod participant;
mod ptr;
mod state;
mod sync;

pub mod lock;
pub mod telemetry;

#[cfg(not(feature = "loom"))]
pub mod harness;

pub use detector::{Advance, GracePeriod};
pub use domain::{RcuDomain, RcuDomainBuilder};
pub use error::{HarnessError, RegistryError};
pub use lock::{LockedSlot, RawSpinLock, ReadWriteSpinLock, SpinLock};
pub use participant::{Participant, ReadSection};
pub use ptr::{RcuSlot, Retired};
pub use telemetry::{OpTotals, Operation, ProgressSample, Telemetry, TelemetryConfig};

#[cfg(all(test, not(feature = "loom")))]
mod tests;
