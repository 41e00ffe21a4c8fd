use crate::error;
use crate::prog::Error;
use std::any::Any;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

/// Per-VM state owned by a set of builtins. `clear` runs before every
/// load so nothing outlives the image it was made for.
pub trait Resource: Any + Send {
    fn clear(&mut self);
}

type ClearFn = fn(&mut (dyn Any + Send + 'static));

fn clear_thunk<R: Resource>(data: &mut (dyn Any + Send + 'static)) {
    if let Some(r) = data.downcast_mut::<R>() {
        r.clear();
    }
}

struct Entry {
    data: Box<dyn Any + Send>,
    clear: ClearFn,
}

/// ## Resources keyed by name

#[derive(Default)]
pub struct Resources {
    map: HashMap<String, Entry>,
    order: Vec<String>,
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Resources {:?}", self.order)
    }
}

impl Resources {
    pub fn register<R: Resource>(&mut self, name: &str, resource: R) -> Result<()> {
        if self.map.contains_key(name) {
            return Err(error!(DuplicateResource; "{}", name));
        }
        self.map.insert(
            name.to_string(),
            Entry {
                data: Box::new(resource),
                clear: clear_thunk::<R>,
            },
        );
        self.order.push(name.to_string());
        log::debug!("resource {} registered", name);
        Ok(())
    }

    pub fn find<R: Resource>(&self, name: &str) -> Option<&R> {
        self.map.get(name)?.data.downcast_ref::<R>()
    }

    pub fn find_mut<R: Resource>(&mut self, name: &str) -> Option<&mut R> {
        self.map.get_mut(name)?.data.downcast_mut::<R>()
    }

    /// Runs every clear callback in registration order.
    pub fn clear(&mut self) {
        for name in &self.order {
            if let Some(entry) = self.map.get_mut(name) {
                (entry.clear)(entry.data.as_mut());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Counter {
        hits: u32,
        cleared: u32,
    }

    impl Resource for Counter {
        fn clear(&mut self) {
            self.hits = 0;
            self.cleared += 1;
        }
    }

    #[test]
    fn test_register_find_clear() {
        let mut res = Resources::default();
        res.register("counter", Counter::default()).unwrap();
        res.find_mut::<Counter>("counter").unwrap().hits = 3;
        assert!(res.register("counter", Counter::default()).is_err());
        res.clear();
        let c = res.find::<Counter>("counter").unwrap();
        assert_eq!((c.hits, c.cleared), (0, 1));
        assert!(res.find::<Counter>("other").is_none());
    }
}
