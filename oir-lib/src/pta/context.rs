use core::fmt::{self, Display};
use core::str::FromStr;
use std::collections::HashMap;

use itertools::Itertools;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    heap::{Heap, ObjId, ObjKind},
    ir::{ClassId, MethodId, Program, StmtRef},
};

/// An interned context. The empty context always has id 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(pub usize);

impl ContextId {
    pub const EMPTY: ContextId = ContextId(0);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextElem {
    CallSite(StmtRef),
    Obj(ObjId),
    Type(ClassId),
}

/// Interns contexts, i.e., sequences of context elements, oldest first.
#[derive(Clone, Debug)]
pub struct ContextArena {
    contexts: Vec<Vec<ContextElem>>,
    index: HashMap<Vec<ContextElem>, ContextId>,
}

impl Default for ContextArena {
    fn default() -> Self {
        Self {
            contexts: vec![Vec::new()],
            index: HashMap::from([(Vec::new(), ContextId::EMPTY)]),
        }
    }
}

impl ContextArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, elems: Vec<ContextElem>) -> ContextId {
        if let Some(&id) = self.index.get(&elems) {
            return id;
        }
        let id = ContextId(self.contexts.len());
        self.contexts.push(elems.clone());
        self.index.insert(elems, id);
        id
    }

    pub fn elements(&self, context: ContextId) -> &[ContextElem] {
        &self.contexts[context.0]
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// `context` extended with `elem`, keeping the `limit` most recent
    /// elements.
    pub fn append(&mut self, context: ContextId, elem: ContextElem, limit: usize) -> ContextId {
        let mut elems = self.elements(context).to_vec();
        elems.push(elem);
        self.truncated(elems, limit)
    }

    /// The `limit` most recent elements of `context`.
    pub fn suffix(&mut self, context: ContextId, limit: usize) -> ContextId {
        let elems = self.elements(context).to_vec();
        self.truncated(elems, limit)
    }

    fn truncated(&mut self, mut elems: Vec<ContextElem>, limit: usize) -> ContextId {
        let start = elems.len().saturating_sub(limit);
        elems.drain(..start);
        self.intern(elems)
    }

    /// E.g., `[<A: void main()>[2@L4] virtualinvoke b.<B: void m()>();]`.
    pub fn describe(&self, program: &Program, heap: &Heap, context: ContextId) -> String {
        let elems = self
            .elements(context)
            .iter()
            .map(|elem| match elem {
                ContextElem::CallSite(site) => program.describe_stmt(*site),
                ContextElem::Obj(obj) => heap.describe(program, *obj),
                ContextElem::Type(class) => program.class(*class).name.clone(),
            })
            .join(", ");
        format!("[{elems}]")
    }
}

/// An object qualified by its heap context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsObj {
    pub context: ContextId,
    pub obj: ObjId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsMethod {
    pub context: ContextId,
    pub method: MethodId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CsCallSite {
    pub context: ContextId,
    pub call_site: StmtRef,
}

/// What a selector may look at and the arena it interns contexts in.
pub struct SelectorEnv<'a> {
    pub program: &'a Program,
    pub heap: &'a Heap,
    pub contexts: &'a mut ContextArena,
}

/// Chooses the contexts of callees and of allocated objects.
pub trait ContextSelector {
    /// The context of the entry method.
    fn empty_context(&self) -> ContextId {
        ContextId::EMPTY
    }

    /// The context of `callee` when called from `call_site`. `receiver` is
    /// `None` for static calls.
    fn select_context(
        &self,
        env: &mut SelectorEnv<'_>,
        call_site: CsCallSite,
        receiver: Option<CsObj>,
        callee: MethodId,
    ) -> ContextId;

    /// The heap context of `obj` allocated in `method`.
    fn select_heap_context(
        &self,
        env: &mut SelectorEnv<'_>,
        method: CsMethod,
        obj: ObjId,
    ) -> ContextId;
}

/// Every method and object has the empty context.
#[derive(Clone, Copy, Debug, Default)]
pub struct Insensitive;

impl ContextSelector for Insensitive {
    fn select_context(
        &self,
        _: &mut SelectorEnv<'_>,
        _: CsCallSite,
        _: Option<CsObj>,
        _: MethodId,
    ) -> ContextId {
        ContextId::EMPTY
    }

    fn select_heap_context(&self, _: &mut SelectorEnv<'_>, _: CsMethod, _: ObjId) -> ContextId {
        ContextId::EMPTY
    }
}

/// Contexts are the `k` most recent call sites.
#[derive(Clone, Copy, Debug)]
pub struct KCallSite {
    pub k: usize,
}

impl ContextSelector for KCallSite {
    fn select_context(
        &self,
        env: &mut SelectorEnv<'_>,
        call_site: CsCallSite,
        _: Option<CsObj>,
        _: MethodId,
    ) -> ContextId {
        env.contexts.append(
            call_site.context,
            ContextElem::CallSite(call_site.call_site),
            self.k,
        )
    }

    fn select_heap_context(
        &self,
        env: &mut SelectorEnv<'_>,
        method: CsMethod,
        _: ObjId,
    ) -> ContextId {
        env.contexts.suffix(method.context, self.k.saturating_sub(1))
    }
}

/// Contexts are the `k` most recent receiver objects. Static calls keep the
/// caller's context.
#[derive(Clone, Copy, Debug)]
pub struct KObject {
    pub k: usize,
}

impl ContextSelector for KObject {
    fn select_context(
        &self,
        env: &mut SelectorEnv<'_>,
        call_site: CsCallSite,
        receiver: Option<CsObj>,
        _: MethodId,
    ) -> ContextId {
        match receiver {
            Some(recv) => env
                .contexts
                .append(recv.context, ContextElem::Obj(recv.obj), self.k),
            None => call_site.context,
        }
    }

    fn select_heap_context(
        &self,
        env: &mut SelectorEnv<'_>,
        method: CsMethod,
        _: ObjId,
    ) -> ContextId {
        env.contexts.suffix(method.context, self.k.saturating_sub(1))
    }
}

/// Contexts are the classes containing the allocation sites of the `k`
/// most recent receiver objects. Static calls keep the caller's context.
#[derive(Clone, Copy, Debug)]
pub struct KType {
    pub k: usize,
}

impl ContextSelector for KType {
    fn select_context(
        &self,
        env: &mut SelectorEnv<'_>,
        call_site: CsCallSite,
        receiver: Option<CsObj>,
        _: MethodId,
    ) -> ContextId {
        let Some(recv) = receiver else {
            return call_site.context;
        };
        match allocation_class(env.program, env.heap, recv.obj) {
            Some(class) => env
                .contexts
                .append(recv.context, ContextElem::Type(class), self.k),
            None => call_site.context,
        }
    }

    fn select_heap_context(
        &self,
        env: &mut SelectorEnv<'_>,
        method: CsMethod,
        _: ObjId,
    ) -> ContextId {
        env.contexts.suffix(method.context, self.k.saturating_sub(1))
    }
}

/// The class whose method allocated `obj`. Merged objects have no single
/// allocation site and fall back to their own class.
fn allocation_class(program: &Program, heap: &Heap, obj: ObjId) -> Option<ClassId> {
    let obj = heap.obj(obj);
    match obj.kind {
        ObjKind::Alloc(site) | ObjKind::Taint { source: site } => {
            Some(program.method(site.method).class)
        }
        ObjKind::Merged => obj.ty.class(),
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectorParseError {
    #[error("unknown context sensitivity '{0}', expected 'ci', 'k-call', 'k-obj', or 'k-type'")]
    Unknown(String),
    #[error("context depth must be at least 1 in '{0}'")]
    ZeroDepth(String),
}

/// A context selector by name: `ci`, `2-call`, `1-obj`, `2-type`, ...
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum SelectorKind {
    #[default]
    Insensitive,
    CallSite(usize),
    Object(usize),
    Type(usize),
}

impl SelectorKind {
    pub fn build(self) -> Box<dyn ContextSelector> {
        match self {
            SelectorKind::Insensitive => Box::new(Insensitive),
            SelectorKind::CallSite(k) => Box::new(KCallSite { k }),
            SelectorKind::Object(k) => Box::new(KObject { k }),
            SelectorKind::Type(k) => Box::new(KType { k }),
        }
    }
}

impl FromStr for SelectorKind {
    type Err = SelectorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name == "ci" || name == "insensitive" {
            return Ok(SelectorKind::Insensitive);
        }
        let unknown = || SelectorParseError::Unknown(s.to_owned());
        let (depth, kind) = name.split_once('-').ok_or_else(unknown)?;
        let k: usize = depth.parse().map_err(|_| unknown())?;
        let selector = match kind {
            "call" => SelectorKind::CallSite(k),
            "obj" => SelectorKind::Object(k),
            "type" => SelectorKind::Type(k),
            _ => return Err(unknown()),
        };
        if k == 0 {
            return Err(SelectorParseError::ZeroDepth(s.to_owned()));
        }
        Ok(selector)
    }
}

impl TryFrom<String> for SelectorKind {
    type Error = SelectorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorKind::Insensitive => write!(f, "ci"),
            SelectorKind::CallSite(k) => write!(f, "{k}-call"),
            SelectorKind::Object(k) => write!(f, "{k}-obj"),
            SelectorKind::Type(k) => write!(f, "{k}-type"),
        }
    }
}
