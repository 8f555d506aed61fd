//! Payload interceptors.
//!
//! Interceptors belong to an event name rather than to a handler. After a
//! handler's middleware chain passes, every interceptor of the emitted event
//! runs against that handler's payload, in registration order.
//!
//! - A **mutable** interceptor edits the live payload; the handler and all
//!   later interceptors see the change.
//! - A **read-only** interceptor gets a private clone, so nothing it does
//!   (including through interior mutability) leaks out.

use std::fmt;
use std::sync::Arc;

/// Token identifying an interceptor, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterceptorId(pub(crate) u64);

impl InterceptorId {
    /// The raw numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InterceptorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type MutableFn<P> = dyn Fn(&mut P) + Send + Sync;
type ReadOnlyFn<P> = dyn Fn(&P) + Send + Sync;

enum Access<P> {
    Mutable(Arc<MutableFn<P>>),
    ReadOnly(Arc<ReadOnlyFn<P>>),
}

/// A registered interceptor.
pub(crate) struct Interceptor<P> {
    id: InterceptorId,
    access: Access<P>,
}

impl<P> Clone for Interceptor<P> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            access: match &self.access {
                Access::Mutable(f) => Access::Mutable(Arc::clone(f)),
                Access::ReadOnly(f) => Access::ReadOnly(Arc::clone(f)),
            },
        }
    }
}

impl<P> Interceptor<P> {
    pub fn id(&self) -> InterceptorId {
        self.id
    }
}

impl<P: Clone> Interceptor<P> {
    pub fn mutable<F>(id: InterceptorId, f: F) -> Self
    where
        F: Fn(&mut P) + Send + Sync + 'static,
    {
        Self {
            id,
            access: Access::Mutable(Arc::new(f)),
        }
    }

    pub fn read_only<F>(id: InterceptorId, f: F) -> Self
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        Self {
            id,
            access: Access::ReadOnly(Arc::new(f)),
        }
    }

    /// Runs the interceptor against a handler's payload.
    pub fn apply(&self, payload: &mut P) {
        match &self.access {
            Access::Mutable(f) => f(payload),
            Access::ReadOnly(f) => {
                let snapshot = payload.clone();
                f(&snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_mutable_interceptor_edits_payload() {
        let square = Interceptor::mutable(InterceptorId(1), |n: &mut i64| *n *= *n);
        let mut payload = 7;
        square.apply(&mut payload);
        assert_eq!(payload, 49);
    }

    #[test]
    fn test_read_only_interceptor_sees_a_clone() {
        // Cell lets a `&P` callback attempt a write; the clone must absorb it.
        let tamper = Interceptor::read_only(InterceptorId(2), |c: &Cell<u8>| c.set(99));
        let mut payload = Cell::new(1);
        tamper.apply(&mut payload);
        assert_eq!(payload.get(), 1);
        assert_eq!(tamper.id(), InterceptorId(2));
    }

    #[test]
    fn test_clone_does_not_need_clone_payload() {
        struct Opaque(u8);

        let bump = Interceptor {
            id: InterceptorId(3),
            access: Access::Mutable(Arc::new(|o: &mut Opaque| o.0 += 1)),
        };
        let copy = bump.clone();
        let mut payload = Opaque(1);
        if let Access::Mutable(f) = &copy.access {
            f(&mut payload);
        }
        assert_eq!(payload.0, 2);
        assert_eq!(copy.id(), InterceptorId(3));
    }
}
