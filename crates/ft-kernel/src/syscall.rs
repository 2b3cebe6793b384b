//! Fixed-address syscall jump table for the separately-linked user
//! application.
//!
//! The user app is built and flashed independently from the kernel, entered
//! at a known address. It has no way to link against kernel code directly,
//! so the kernel publishes a pointer to a jump table at a fixed address; the
//! user app dereferences it once at startup and calls kernel services by
//! table index from then on. Indices are append-only — never reorder or
//! remove an entry, or a user app built against an older kernel silently
//! calls the wrong service.

/// Pixel coordinate and target state for [`SyscallTable::put_pixel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pixel {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
    /// Set/clear.
    pub state: bool,
}

/// A rectangular region for [`SyscallTable::fill_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Left edge, inclusive.
    pub x_start: u16,
    /// Top edge, inclusive.
    pub y_start: u16,
    /// Right edge, exclusive.
    pub x_end: u16,
    /// Bottom edge, exclusive.
    pub y_end: u16,
    /// Set/clear.
    pub state: bool,
}

/// Selects which front-panel LED [`SyscallTable::set_led`] addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LedIndex(pub u8);

/// A delay request, in microseconds, for [`SyscallTable::start_delay`] /
/// [`SyscallTable::test_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DelayRequest {
    /// Requested duration.
    pub duration_us: u32,
}

/// Identifies a registered callback slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallbackId(pub u8);

/// A callback registration: an opaque argument plus the handler to invoke
/// with it.
#[derive(Clone, Copy)]
pub struct Callback {
    /// Which slot this callback occupies.
    pub id: CallbackId,
    /// Opaque argument passed back to `handler` unmodified.
    pub arg: u32,
    /// Handler invoked by the kernel when `id` fires.
    pub handler: extern "C" fn(u32),
}

/// The jump table itself: one function pointer slot per service, in
/// ABI-stable, append-only order.
///
/// Every slot is `Option<extern "C" fn(...)>` rather than a bare function
/// pointer so an unimplemented service on a given build is represented as a
/// real null rather than a pointer to a panicking stub — callers must check
/// before calling, matching the source's "unused entries are null" rule.
#[repr(C)]
pub struct SyscallTable {
    print: Option<extern "C" fn(*const u8)>,
    put_pixel: Option<extern "C" fn(Pixel)>,
    fill_frame: Option<extern "C" fn(Frame)>,
    set_led: Option<extern "C" fn(LedIndex, u8)>,
    start_delay: Option<extern "C" fn(DelayRequest)>,
    test_delay: Option<extern "C" fn(DelayRequest) -> bool>,
    register_callback: Option<extern "C" fn(Callback)>,
    shutdown: Option<extern "C" fn()>,
}

impl SyscallTable {
    /// A table with every slot null. The kernel fills in slots it supports
    /// during init; a user app built against a kernel that never filled a
    /// given slot sees it as absent rather than crashing into garbage.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            print: None,
            put_pixel: None,
            fill_frame: None,
            set_led: None,
            start_delay: None,
            test_delay: None,
            register_callback: None,
            shutdown: None,
        }
    }

    /// Installs the `print` service.
    pub fn set_print(&mut self, f: extern "C" fn(*const u8)) {
        self.print = Some(f);
    }

    /// Installs the `put_pixel` service.
    pub fn set_put_pixel(&mut self, f: extern "C" fn(Pixel)) {
        self.put_pixel = Some(f);
    }

    /// Installs the `fill_frame` service.
    pub fn set_fill_frame(&mut self, f: extern "C" fn(Frame)) {
        self.fill_frame = Some(f);
    }

    /// Installs the `set_led` service.
    pub fn set_set_led(&mut self, f: extern "C" fn(LedIndex, u8)) {
        self.set_led = Some(f);
    }

    /// Installs the `start_delay` service.
    pub fn set_start_delay(&mut self, f: extern "C" fn(DelayRequest)) {
        self.start_delay = Some(f);
    }

    /// Installs the `test_delay` service.
    pub fn set_test_delay(&mut self, f: extern "C" fn(DelayRequest) -> bool) {
        self.test_delay = Some(f);
    }

    /// Installs the `register_callback` service.
    pub fn set_register_callback(&mut self, f: extern "C" fn(Callback)) {
        self.register_callback = Some(f);
    }

    /// Installs the `shutdown` service.
    pub fn set_shutdown(&mut self, f: extern "C" fn()) {
        self.shutdown = Some(f);
    }

    /// Calls `print` if installed; a no-op otherwise.
    pub fn print(&self, text: *const u8) {
        if let Some(f) = self.print {
            f(text);
        }
    }

    /// Calls `put_pixel` if installed; a no-op otherwise.
    pub fn put_pixel(&self, pixel: Pixel) {
        if let Some(f) = self.put_pixel {
            f(pixel);
        }
    }

    /// Calls `fill_frame` if installed; a no-op otherwise.
    pub fn fill_frame(&self, frame: Frame) {
        if let Some(f) = self.fill_frame {
            f(frame);
        }
    }

    /// Calls `set_led` if installed; a no-op otherwise.
    pub fn set_led(&self, index: LedIndex, value: u8) {
        if let Some(f) = self.set_led {
            f(index, value);
        }
    }

    /// Calls `start_delay` if installed; a no-op otherwise.
    pub fn start_delay(&self, delay: DelayRequest) {
        if let Some(f) = self.start_delay {
            f(delay);
        }
    }

    /// Calls `test_delay` if installed, returning whether it reports
    /// expired. Returns `true` (expired) if the service was never
    /// installed, so a caller polling an unsupported delay does not spin
    /// forever.
    #[must_use]
    pub fn test_delay(&self, delay: DelayRequest) -> bool {
        self.test_delay.is_none_or(|f| f(delay))
    }

    /// Calls `register_callback` if installed; a no-op otherwise.
    pub fn register_callback(&self, callback: Callback) {
        if let Some(f) = self.register_callback {
            f(callback);
        }
    }

    /// Calls `shutdown` if installed; a no-op otherwise.
    pub fn shutdown(&self) {
        if let Some(f) = self.shutdown {
            f();
        }
    }
}

impl Default for SyscallTable {
    fn default() -> Self {
        Self::empty()
    }
}

/// Zero-cost proof token: the syscall table has been published and is safe
/// for a user application to dereference.
///
/// Mirrors the boot-sequence ordering tokens used elsewhere in this
/// firmware: there is no runtime representation, only a compile-time
/// guarantee that [`publish`] ran before whatever hands control to the user
/// application.
#[must_use = "a published syscall table must be passed on to user-app entry"]
pub struct TablePublished {
    _private: (),
}

/// Installs `table` at the fixed address the user application is built to
/// expect, and returns a token proving it happened.
///
/// `slot` is the kernel-owned static the fixed address actually points at —
/// on hardware this is a linker-placed symbol (e.g. via
/// `#[unsafe(link_section = ".syscall_ptr")]`); here it is passed in so this
/// function stays testable on the host.
pub fn publish(slot: &mut Option<&'static SyscallTable>, table: &'static SyscallTable) -> TablePublished {
    *slot = Some(table);
    TablePublished { _private: () }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn empty_table_calls_are_all_no_ops() {
        let table = SyscallTable::empty();
        table.print(core::ptr::null());
        table.put_pixel(Pixel { x: 0, y: 0, state: true });
        table.shutdown();
        assert!(table.test_delay(DelayRequest { duration_us: 0 }), "an uninstalled delay service must report expired");
    }

    static LAST_LED_VALUE: AtomicU32 = AtomicU32::new(0);

    extern "C" fn record_led(_index: LedIndex, value: u8) {
        LAST_LED_VALUE.store(u32::from(value), Ordering::SeqCst);
    }

    #[test]
    fn installed_service_is_invoked() {
        let mut table = SyscallTable::empty();
        table.set_set_led(record_led);
        table.set_led(LedIndex(2), 200);
        assert_eq!(LAST_LED_VALUE.load(Ordering::SeqCst), 200);
    }

    extern "C" fn always_expired(_delay: DelayRequest) -> bool {
        true
    }

    #[test]
    fn publish_returns_a_token_and_sets_the_slot() {
        static TABLE: SyscallTable = SyscallTable {
            print: None,
            put_pixel: None,
            fill_frame: None,
            set_led: None,
            start_delay: None,
            test_delay: Some(always_expired),
            register_callback: None,
            shutdown: None,
        };
        let mut slot: Option<&'static SyscallTable> = None;
        let _token = publish(&mut slot, &TABLE);
        let published = slot.expect("publish must populate the slot");
        assert!(published.test_delay(DelayRequest { duration_us: 5 }));
    }
}
