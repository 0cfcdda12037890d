//! The generic interception and reversal primitive.
//!
//! Adapted libraries expose their entry points as named [`HookSlot`]s
//! (grouped in a [`HookTarget`]), each holding the callable invoked by the
//! library. Instrumentation wraps a slot by swapping in a new handler built
//! from the original; reversal restores the original exactly, and refuses to
//! clobber a handler it did not install.
//!
//! Call sites fetch the handler through [`HookSlot::handler`] on every call,
//! so interception and reversal take effect without the library restarting.
use log::{debug, warn};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};

/// The record kept while a slot is intercepted, enabling exact reversal.
///
/// At most one live record exists per slot; `installed` doubles as the
/// wrapper identity [`revert`](HookSlot::revert) checks before restoring.
struct PatchRecord<F: ?Sized> {
    original: Arc<F>,
    installed: Arc<F>,
}

/// A single named, interceptable entry point.
///
/// `F` is the callable trait-object type of the entry point, chosen by the
/// adapted library (e.g. `dyn Fn(&Command) -> Reply + Send + Sync`).
pub struct HookSlot<F: ?Sized> {
    name: Cow<'static, str>,
    current: RwLock<Arc<F>>,
    record: Mutex<Option<PatchRecord<F>>>,
}

impl<F: ?Sized> HookSlot<F> {
    /// Create a slot with its initial (unwrapped) handler.
    pub fn new(name: impl Into<Cow<'static, str>>, initial: Arc<F>) -> Self {
        HookSlot {
            name: name.into(),
            current: RwLock::new(initial),
            record: Mutex::new(None),
        }
    }

    /// The slot's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The handler currently installed. Call sites must resolve through this
    /// on every invocation rather than caching the result.
    pub fn handler(&self) -> Arc<F> {
        self.current
            .read()
            .expect("HookSlot RwLock poisoned")
            .clone()
    }

    /// Whether a patch record is live for this slot.
    pub fn is_intercepted(&self) -> bool {
        self.record
            .lock()
            .expect("HookSlot Mutex poisoned")
            .is_some()
    }

    /// Replace the handler directly, bypassing interception bookkeeping.
    ///
    /// This is the adapted library's own rebinding path; handlers installed
    /// this way are foreign to [`revert`](Self::revert).
    pub fn replace_handler(&self, handler: Arc<F>) -> Arc<F> {
        let mut current = self.current.write().expect("HookSlot RwLock poisoned");
        std::mem::replace(&mut *current, handler)
    }

    /// Wrap the current handler.
    ///
    /// `wrapper_factory` receives the original handler and returns the
    /// wrapper to install. Returns `false` (and leaves the slot untouched)
    /// if the slot is already intercepted; callers keep this idempotent at
    /// the library level by checking the instrumented marker first.
    pub fn intercept<W>(&self, wrapper_factory: W) -> bool
    where
        W: FnOnce(Arc<F>) -> Arc<F>,
    {
        let mut record = self.record.lock().expect("HookSlot Mutex poisoned");
        if record.is_some() {
            debug!("hook slot '{}' is already intercepted", self.name);
            return false;
        }

        let original = self.handler();
        let installed = wrapper_factory(original.clone());
        *self
            .current
            .write()
            .expect("HookSlot RwLock poisoned") = installed.clone();
        *record = Some(PatchRecord {
            original,
            installed,
        });
        true
    }

    /// Restore the original handler.
    ///
    /// A no-op when the slot is not intercepted, and when the live handler
    /// is not the one interception installed (someone re-bound the slot
    /// since) — reversal never clobbers state it did not install. In the
    /// foreign-handler case the patch record is retained so a later revert,
    /// after the foreign layer unwinds, can still restore the original.
    pub fn revert(&self) -> bool {
        let mut record = self.record.lock().expect("HookSlot Mutex poisoned");
        let Some(live) = record.as_ref() else {
            debug!("hook slot '{}' is not intercepted", self.name);
            return false;
        };

        let mut current = self.current.write().expect("HookSlot RwLock poisoned");
        if !Arc::ptr_eq(&*current, &live.installed) {
            debug!(
                "hook slot '{}' was re-bound since interception, leaving it alone",
                self.name
            );
            return false;
        }

        *current = live.original.clone();
        drop(current);
        *record = None;
        true
    }
}

impl<F: ?Sized> fmt::Debug for HookSlot<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookSlot")
            .field("name", &self.name)
            .field("intercepted", &self.is_intercepted())
            .finish()
    }
}

/// The named table of [`HookSlot`]s an adapted library exposes.
pub struct HookTarget<F: ?Sized> {
    name: Cow<'static, str>,
    slots: RwLock<HashMap<Cow<'static, str>, Arc<HookSlot<F>>>>,
}

impl<F: ?Sized> HookTarget<F> {
    /// Create an empty target.
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        HookTarget {
            name: name.into(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// The target's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register an entry point under `attribute` with its initial handler.
    ///
    /// Re-exposing an existing attribute keeps the current slot (and any
    /// interception state it carries) and returns it unchanged.
    pub fn expose(
        &self,
        attribute: impl Into<Cow<'static, str>>,
        initial: Arc<F>,
    ) -> Arc<HookSlot<F>> {
        let attribute = attribute.into();
        let mut slots = self.slots.write().expect("HookTarget RwLock poisoned");
        slots
            .entry(attribute.clone())
            .or_insert_with(|| Arc::new(HookSlot::new(attribute, initial)))
            .clone()
    }

    /// Look up the slot registered under `attribute`.
    pub fn slot(&self, attribute: &str) -> Option<Arc<HookSlot<F>>> {
        self.slots
            .read()
            .expect("HookTarget RwLock poisoned")
            .get(attribute)
            .cloned()
    }

    /// The current handler for `attribute`, resolved at call time.
    pub fn handler(&self, attribute: &str) -> Option<Arc<F>> {
        self.slot(attribute).map(|slot| slot.handler())
    }

    /// Intercept the slot registered under `attribute`.
    ///
    /// Returns `false` if no such slot exists (logged at warn — a wrong
    /// attribute name is an adapter bug worth surfacing) or if the slot is
    /// already intercepted.
    pub fn intercept<W>(&self, attribute: &str, wrapper_factory: W) -> bool
    where
        W: FnOnce(Arc<F>) -> Arc<F>,
    {
        match self.slot(attribute) {
            Some(slot) => slot.intercept(wrapper_factory),
            None => {
                warn!(
                    "no hook slot '{}' exposed on target '{}'",
                    attribute, self.name
                );
                false
            }
        }
    }

    /// Revert the slot registered under `attribute`, if intercepted by us.
    pub fn revert(&self, attribute: &str) -> bool {
        match self.slot(attribute) {
            Some(slot) => slot.revert(),
            None => {
                debug!(
                    "no hook slot '{}' exposed on target '{}'",
                    attribute, self.name
                );
                false
            }
        }
    }

    /// Revert every intercepted slot on this target.
    pub fn revert_all(&self) {
        let slots = self
            .slots
            .read()
            .expect("HookTarget RwLock poisoned")
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for slot in slots {
            if slot.is_intercepted() {
                slot.revert();
            }
        }
    }
}

impl<F: ?Sized> fmt::Debug for HookTarget<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTarget").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Callable = dyn Fn(i64) -> i64 + Send + Sync;

    fn base_handler() -> Arc<Callable> {
        Arc::new(|x| x + 1)
    }

    #[test]
    fn intercept_delegates_to_original() {
        let slot = HookSlot::new("execute", base_handler());
        assert_eq!(slot.handler()(1), 2);

        assert!(slot.intercept(|original| {
            Arc::new(move |x| original(x) * 10) as Arc<Callable>
        }));
        assert!(slot.is_intercepted());
        assert_eq!(slot.handler()(1), 20);
    }

    #[test]
    fn revert_restores_exact_original() {
        let original = base_handler();
        let slot = HookSlot::new("execute", original.clone());

        assert!(slot.intercept(|orig| Arc::new(move |x| orig(x) * 10) as Arc<Callable>));
        assert!(slot.revert());

        assert!(Arc::ptr_eq(&slot.handler(), &original));
        assert!(!slot.is_intercepted());
        assert_eq!(slot.handler()(1), 2);
    }

    #[test]
    fn double_intercept_is_a_noop() {
        let slot = HookSlot::new("execute", base_handler());
        assert!(slot.intercept(|orig| Arc::new(move |x| orig(x) * 10) as Arc<Callable>));
        assert!(!slot.intercept(|orig| Arc::new(move |x| orig(x) * 100) as Arc<Callable>));
        assert_eq!(slot.handler()(1), 20);
    }

    #[test]
    fn double_revert_is_a_noop() {
        let slot = HookSlot::new("execute", base_handler());
        assert!(!slot.revert());
        assert!(slot.intercept(|orig| Arc::new(move |x| orig(x) * 10) as Arc<Callable>));
        assert!(slot.revert());
        assert!(!slot.revert());
        assert_eq!(slot.handler()(1), 2);
    }

    #[test]
    fn revert_leaves_foreign_handlers_alone() {
        let slot = HookSlot::new("execute", base_handler());
        assert!(slot.intercept(|orig| Arc::new(move |x| orig(x) * 10) as Arc<Callable>));

        // The library re-binds the slot underneath us.
        let ours = slot.replace_handler(Arc::new(|x| x - 1));
        assert!(!slot.revert());
        assert_eq!(slot.handler()(1), 0);

        // Once our wrapper is back in place the record still applies.
        slot.replace_handler(ours);
        assert!(slot.revert());
        assert_eq!(slot.handler()(1), 2);
    }

    #[test]
    fn target_slot_registration() {
        let target: HookTarget<Callable> = HookTarget::new("fakedb.client");
        target.expose("get", Arc::new(|x| x));
        target.expose("set", Arc::new(|x| x * 2));

        // Re-exposing keeps the existing slot.
        target.expose("get", Arc::new(|_| -1));
        assert_eq!(target.handler("get").unwrap()(3), 3);
        assert_eq!(target.handler("set").unwrap()(3), 6);
        assert!(target.handler("del").is_none());
    }

    #[test]
    fn target_intercept_and_revert_all() {
        let target: HookTarget<Callable> = HookTarget::new("fakedb.client");
        target.expose("get", Arc::new(|x| x));
        target.expose("set", Arc::new(|x| x));

        assert!(target.intercept("get", |orig| Arc::new(move |x| orig(x) + 100) as Arc<Callable>));
        assert!(target.intercept("set", |orig| Arc::new(move |x| orig(x) + 200) as Arc<Callable>));
        assert!(!target.intercept("del", |orig| orig));

        assert_eq!(target.handler("get").unwrap()(1), 101);
        target.revert_all();
        assert_eq!(target.handler("get").unwrap()(1), 1);
        assert_eq!(target.handler("set").unwrap()(1), 1);
    }
}
