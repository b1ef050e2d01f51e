/// Outcome of a lookup that may legitimately match nothing.
///
/// `NotFound` means there was nothing to compute; `Found(vec![])` would mean a
/// computation ran and produced an empty result. Callers skip a map layer on
/// `NotFound`.
#[must_use]
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }

    /// Converts into an `Option`, discarding the distinction from an empty value.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NotFound => None,
        }
    }

    pub fn as_ref(&self) -> Lookup<&T> {
        match self {
            Lookup::Found(value) => Lookup::Found(value),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NotFound => Lookup::NotFound,
        }
    }

    /// Chains a fallible step that only runs when something was found.
    pub fn try_map<U, E, F>(self, f: F) -> Result<Lookup<U>, E>
    where
        F: FnOnce(T) -> Result<U, E>,
    {
        match self {
            Lookup::Found(value) => f(value).map(Lookup::Found),
            Lookup::NotFound => Ok(Lookup::NotFound),
        }
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}
