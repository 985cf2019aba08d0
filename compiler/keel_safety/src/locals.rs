//! Escape tags of the locals of one unit.

use keel_ir::{LocalDecl, LocalId, LocalRefKind};

use crate::{Escape, EscapeOrigin, EscapeScope};

#[derive(Copy, Clone, Debug)]
struct LocalEscape {
    /// Bound on references to the local (or, for a ref local, to what it
    /// refers to).
    by_ref: Escape,
    /// Bound on the local's value, for reference-like values.
    by_value: Escape,
}

/// Tracks how far each local, and what it holds, may escape.
///
/// By-value locals start with their block scope for references and an
/// unrestricted value. Initializing a `ref` local or a reference-like local
/// narrows it to the initializer's scope.
#[derive(Clone, Debug, Default)]
pub struct LocalScopes {
    locals: Vec<LocalEscape>,
}

impl LocalScopes {
    pub fn new(decls: &[LocalDecl]) -> Self {
        let locals = decls
            .iter()
            .map(|decl| {
                let scope = EscapeScope::block(decl.depth);
                let by_ref = match decl.ref_kind {
                    LocalRefKind::Value => Escape::new(
                        scope,
                        EscapeOrigin::Local {
                            name: decl.name,
                            span: decl.span,
                        },
                    ),
                    // An unbound ref local refers to nothing yet.
                    LocalRefKind::Ref | LocalRefKind::RefReadonly => Escape::HEAP,
                };
                LocalEscape {
                    by_ref,
                    by_value: Escape::HEAP,
                }
            })
            .collect();
        LocalScopes { locals }
    }

    pub fn ref_escape(&self, local: LocalId) -> Escape {
        self.locals
            .get(local.index())
            .map_or(Escape::TEMPORARY, |l| l.by_ref)
    }

    pub fn value_escape(&self, local: LocalId) -> Escape {
        self.locals
            .get(local.index())
            .map_or(Escape::HEAP, |l| l.by_value)
    }

    /// `ref T local = ref init;`
    pub fn bind_ref(&mut self, local: LocalId, decl: &LocalDecl, init: Escape) {
        if let Some(entry) = self.locals.get_mut(local.index()) {
            entry.by_ref = Self::through(decl, init);
        }
    }

    /// `View local = init;` for a reference-like value.
    pub fn bind_value(&mut self, local: LocalId, decl: &LocalDecl, init: Escape) {
        if let Some(entry) = self.locals.get_mut(local.index()) {
            entry.by_value = Self::through(decl, init);
            tracing::trace!(?local, scope = ?init.scope, "reference-like local bound");
        }
    }

    /// Returnable initializers keep their origin; anything narrower is
    /// reported against the local that captured it.
    fn through(decl: &LocalDecl, init: Escape) -> Escape {
        if init.is_returnable() {
            init
        } else {
            Escape::new(
                init.scope,
                EscapeOrigin::ScopedLocal {
                    name: decl.name,
                    span: decl.span,
                },
            )
        }
    }
}
