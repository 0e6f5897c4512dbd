//! Lifecycle hooks and the per-suite hook registry.

use std::fmt;
use std::time::Duration;

use crate::body::Body;

/// The four lifecycle hook kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeAll => write!(f, "beforeAll"),
            Self::BeforeEach => write!(f, "beforeEach"),
            Self::AfterEach => write!(f, "afterEach"),
            Self::AfterAll => write!(f, "afterAll"),
        }
    }
}

/// A registered hook: a body plus an optional per-hook timeout override.
#[derive(Debug)]
pub struct Hook {
    pub body: Body,
    pub timeout: Option<Duration>,
}

impl Hook {
    pub fn new(body: Body) -> Self {
        Self {
            body,
            timeout: None,
        }
    }

    pub fn with_timeout(body: Body, timeout: Duration) -> Self {
        Self {
            body,
            timeout: Some(timeout),
        }
    }
}

/// Ordered hook lists for one suite. Registration order is execution order.
#[derive(Debug, Default)]
pub struct HookRegistry {
    before_all: Vec<Hook>,
    before_each: Vec<Hook>,
    after_each: Vec<Hook>,
    after_all: Vec<Hook>,
}

impl HookRegistry {
    pub fn push(&mut self, kind: HookKind, hook: Hook) {
        self.list_mut(kind).push(hook);
    }

    pub fn list(&self, kind: HookKind) -> &[Hook] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
            HookKind::AfterAll => &self.after_all,
        }
    }

    fn list_mut(&mut self, kind: HookKind) -> &mut Vec<Hook> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
            HookKind::AfterAll => &mut self.after_all,
        }
    }

    pub fn len(&self, kind: HookKind) -> usize {
        self.list(kind).len()
    }

    pub fn is_empty(&self) -> bool {
        self.before_all.is_empty()
            && self.before_each.is_empty()
            && self.after_each.is_empty()
            && self.after_all.is_empty()
    }

    pub fn get_mut(&mut self, kind: HookKind, index: usize) -> Option<&mut Hook> {
        self.list_mut(kind).get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_order_is_preserved() {
        let mut registry = HookRegistry::default();
        registry.push(HookKind::BeforeEach, Hook::new(Body::sync(|| {})));
        registry.push(
            HookKind::BeforeEach,
            Hook::with_timeout(Body::sync(|| {}), Duration::from_millis(10)),
        );

        let hooks = registry.list(HookKind::BeforeEach);
        assert_eq!(hooks.len(), 2);
        assert_eq!(hooks[0].timeout, None);
        assert_eq!(hooks[1].timeout, Some(Duration::from_millis(10)));
        assert!(registry.list(HookKind::AfterEach).is_empty());
    }

    #[test]
    fn test_kind_display_matches_registration_names() {
        assert_eq!(HookKind::BeforeAll.to_string(), "beforeAll");
        assert_eq!(HookKind::AfterEach.to_string(), "afterEach");
    }
}
