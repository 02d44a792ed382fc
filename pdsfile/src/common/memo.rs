use std::fmt::{Debug, Formatter};
use std::sync::OnceLock;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A compute-once cell for lazily derived node attributes.
///
/// Once filled, the value never changes. Concurrent initialisers may both run
/// but only the first stored value is kept.
pub struct Memo<T> {
    cell: OnceLock<T>,
}

impl<T> Memo<T> {
    pub const fn new() -> Self {
        Self { cell: OnceLock::new() }
    }

    /// A memo that is already filled.
    pub fn filled(value: T) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(value);
        Self { cell }
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_filled(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn get_or_init(&self, f: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(f)
    }

    /// Like [`Memo::get_or_init`], but leaves the cell empty when `f` fails.
    pub fn get_or_try_init<E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }
        let value = f()?;
        Ok(self.cell.get_or_init(|| value))
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        match self.cell.get() {
            Some(value) => Self::filled(value.clone()),
            None => Self::new(),
        }
    }
}

impl<T: Debug> Debug for Memo<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.cell.get() {
            Some(value) => write!(f, "Memo({:?})", value),
            None => f.write_str("Memo(<empty>)"),
        }
    }
}

/// 序列化为 Option，未计算的值写为 null
impl<T: Serialize> Serialize for Memo<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.cell.get().serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Memo<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Self::filled(value),
            None => Self::new(),
        })
    }
}
