use std::cell::RefCell;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use crate::value::Repr;
use crate::{Json, Number};

/// Construction seam for fresh values.
///
/// Every constructor on [`Json`] and the text reader allocate through the
/// factory currently in effect, so swapping the factory changes what all
/// newly built values look like (interned strings, shared singletons,
/// preallocated containers, ...). The process-wide slot is consulted
/// unless the current thread has attached its own factory with
/// [`attach_factory`].
pub trait Factory: Send + Sync {
    /// The JSON `null` value.
    fn nil(&self) -> Json;
    fn bool(&self, value: bool) -> Json;
    fn number(&self, value: Number) -> Json;
    fn string(&self, value: &str) -> Json;
    fn object(&self) -> Json;
    fn array(&self) -> Json;

    /// Build a value from a JSON-compatible input, dispatching on its tag:
    /// mappings become objects, sequences arrays, primitives their
    /// corresponding kind.
    ///
    /// # Panics
    ///
    /// The default implementation fills containers obtained from
    /// [`Factory::array`] and [`Factory::object`]; a factory whose
    /// container constructors return values of another kind violates the
    /// trait contract and panics here.
    fn make(&self, value: serde_json::Value) -> Json {
        match value {
            serde_json::Value::Null => self.nil(),
            serde_json::Value::Bool(b) => self.bool(b),
            serde_json::Value::Number(n) => self.number(convert_number(&n)),
            serde_json::Value::String(s) => self.string(&s),
            serde_json::Value::Array(items) => {
                let array = self.array();
                for item in items {
                    array
                        .push(self.make(item))
                        .expect("Factory::array must construct an array value");
                }
                array
            }
            serde_json::Value::Object(map) => {
                let object = self.object();
                for (key, item) in map {
                    object
                        .set(key, self.make(item))
                        .expect("Factory::object must construct an object value");
                }
                object
            }
        }
    }
}

fn convert_number(n: &serde_json::Number) -> Number {
    if let Some(i) = n.as_i64() {
        Number::Int(i)
    } else if let Some(u) = n.as_u64() {
        Number::from(u)
    } else {
        Number::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// The stock factory: plain heap-allocated nodes, nothing shared.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFactory;

impl Factory for DefaultFactory {
    fn nil(&self) -> Json {
        Json::from_repr(Repr::Null)
    }

    fn bool(&self, value: bool) -> Json {
        Json::from_repr(Repr::Bool(value))
    }

    fn number(&self, value: Number) -> Json {
        Json::from_repr(Repr::Number(value))
    }

    fn string(&self, value: &str) -> Json {
        Json::from_repr(Repr::String(value.to_string()))
    }

    fn object(&self) -> Json {
        Json::from_repr(Repr::Object(RefCell::new(ahash::AHashMap::new())))
    }

    fn array(&self) -> Json {
        Json::from_repr(Repr::Array(RefCell::new(Vec::new())))
    }
}

static GLOBAL_FACTORY: LazyLock<RwLock<Arc<dyn Factory>>> =
    LazyLock::new(|| RwLock::new(Arc::new(DefaultFactory)));

thread_local! {
    static THREAD_FACTORY: RefCell<Option<Arc<dyn Factory>>> = const { RefCell::new(None) };
}

/// The factory currently in effect: the thread-local one when attached,
/// otherwise the process-wide one.
pub fn factory() -> Arc<dyn Factory> {
    if let Some(local) = THREAD_FACTORY.with(|slot| slot.borrow().clone()) {
        return local;
    }
    GLOBAL_FACTORY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide factory used by threads without a thread-local
/// override. Expected to happen during process initialisation.
pub fn set_global_factory(factory: Arc<dyn Factory>) {
    *GLOBAL_FACTORY
        .write()
        .unwrap_or_else(PoisonError::into_inner) = factory;
}

/// Attach a factory to the current thread. It takes precedence over the
/// process-wide factory until [`detach_factory`] is called.
pub fn attach_factory(factory: Arc<dyn Factory>) {
    THREAD_FACTORY.with(|slot| *slot.borrow_mut() = Some(factory));
}

/// Remove the current thread's factory; the process-wide one takes effect
/// again.
pub fn detach_factory() {
    THREAD_FACTORY.with(|slot| *slot.borrow_mut() = None);
}
