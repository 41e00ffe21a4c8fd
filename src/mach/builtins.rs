use super::Progs;
use crate::error;
use crate::prog::Error;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, Error>;

/// Native code callable from progs. Arguments are read with
/// `Progs::param` and the result written with `Progs::set_return`.
pub type BuiltinFn = fn(&mut Progs) -> Result<()>;

/// Ids handed out by `BuiltinId::Auto` start here, above any number a
/// progs image is likely to use.
pub const AUTO_BUILTIN_BASE: i32 = 0x1000 << 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinId {
    Auto,
    Fixed(i32),
}

#[derive(Clone)]
pub struct Builtin {
    pub name: String,
    pub id: i32,
    pub func: BuiltinFn,
}

impl std::fmt::Debug for Builtin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Builtin {{ name: {:?}, id: {} }}", self.name, self.id)
    }
}

/// ## Builtin registry
///
/// Survives loads; an image binds to it when it is linked.

#[derive(Debug)]
pub struct Builtins {
    list: Vec<Builtin>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<i32, usize>,
    next_auto: i32,
}

impl Default for Builtins {
    fn default() -> Builtins {
        Builtins {
            list: vec![],
            by_name: HashMap::new(),
            by_id: HashMap::new(),
            next_auto: AUTO_BUILTIN_BASE,
        }
    }
}

impl Builtins {
    pub fn new() -> Builtins {
        Builtins::default()
    }

    /// Adds a builtin and returns its id. A clash on name or id leaves
    /// the registry as it was.
    pub fn register(&mut self, name: &str, id: BuiltinId, func: BuiltinFn) -> Result<i32> {
        if let Some(old) = self.by_name(name) {
            return Err(error!(BuiltinCollision; "builtin {} already registered as #{}", name, old.id));
        }
        let id = match id {
            BuiltinId::Fixed(id) if id <= 0 => {
                return Err(error!(BuiltinCollision; "builtin {} has invalid number {}", name, id));
            }
            BuiltinId::Fixed(id) => {
                if let Some(old) = self.by_id(id) {
                    return Err(error!(BuiltinCollision;
                        "builtin {} #{} collides with {}", name, id, old.name
                    ));
                }
                id
            }
            BuiltinId::Auto => {
                while self.by_id.contains_key(&self.next_auto) {
                    self.next_auto += 1;
                }
                self.next_auto
            }
        };
        let index = self.list.len();
        self.list.push(Builtin {
            name: name.to_string(),
            id,
            func,
        });
        self.by_name.insert(name.to_string(), index);
        self.by_id.insert(id, index);
        log::debug!("builtin {} registered as #{}", name, id);
        Ok(id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Builtin> {
        self.by_name.get(name).map(|&i| &self.list[i])
    }

    pub fn by_id(&self, id: i32) -> Option<&Builtin> {
        self.by_id.get(&id).map(|&i| &self.list[i])
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Builtin> {
        self.list.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(_progs: &mut Progs) -> Result<()> {
        Ok(())
    }

    fn two(_progs: &mut Progs) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_id_collision() {
        let mut b = Builtins::new();
        b.register("one", BuiltinId::Fixed(7), one).unwrap();
        let err = b.register("two", BuiltinId::Fixed(7), two).unwrap_err();
        assert_eq!(err.code(), crate::prog::ErrorCode::BuiltinCollision);
        assert_eq!(b.len(), 1);
        assert_eq!(b.by_id(7).unwrap().name, "one");
        assert!(b.by_name("two").is_none());
    }

    #[test]
    fn test_name_collision() {
        let mut b = Builtins::new();
        b.register("one", BuiltinId::Fixed(7), one).unwrap();
        assert!(b.register("one", BuiltinId::Fixed(8), two).is_err());
        assert!(b.by_id(8).is_none());
    }

    #[test]
    fn test_auto_ids() {
        let mut b = Builtins::new();
        assert!(b.register("zero", BuiltinId::Fixed(0), one).is_err());
        b.register("taken", BuiltinId::Fixed(AUTO_BUILTIN_BASE), one).unwrap();
        let id = b.register("auto", BuiltinId::Auto, two).unwrap();
        assert_eq!(id, AUTO_BUILTIN_BASE + 1);
        let id = b.register("auto2", BuiltinId::Auto, two).unwrap();
        assert_eq!(id, AUTO_BUILTIN_BASE + 2);
    }
}
