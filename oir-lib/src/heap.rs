use std::collections::HashMap;

use serde::Deserialize;

use crate::ir::{Program, Stmt, StmtRef, Type};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjId(pub usize);

/// How allocations are abstracted into heap objects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HeapPolicy {
    /// One object per allocation statement.
    #[default]
    AllocationSite,
    /// One object per allocated type.
    Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ObjKind {
    Alloc(StmtRef),
    /// Every allocation of a type, under [`HeapPolicy::Type`].
    Merged,
    /// Tainted data produced by the call at `source`.
    Taint { source: StmtRef },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Obj {
    pub kind: ObjKind,
    pub ty: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum ObjKey {
    Site(StmtRef),
    Type(Type),
    Taint(StmtRef, Type),
}

/// Interns abstract objects. Asking twice for the object of the same
/// allocation (or taint source and type) yields the same id.
#[derive(Clone, Debug, Default)]
pub struct Heap {
    policy: HeapPolicy,
    objs: Vec<Obj>,
    index: HashMap<ObjKey, ObjId>,
}

impl Heap {
    pub fn new(policy: HeapPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    fn intern(&mut self, key: ObjKey, obj: Obj) -> ObjId {
        let next = ObjId(self.objs.len());
        let id = *self.index.entry(key).or_insert(next);
        if id == next {
            self.objs.push(obj);
        }
        id
    }

    /// The object abstracting the allocation at `site`.
    ///
    /// # Panics
    ///
    /// When `site` is not an allocation.
    pub fn obj_for_alloc(&mut self, program: &Program, site: StmtRef) -> ObjId {
        let Stmt::New { ty, .. } = program.stmt(site) else {
            panic!("Statement {site:?} is not an allocation.");
        };
        match self.policy {
            HeapPolicy::AllocationSite => self.intern(
                ObjKey::Site(site),
                Obj {
                    kind: ObjKind::Alloc(site),
                    ty: ty.clone(),
                },
            ),
            HeapPolicy::Type => self.intern(
                ObjKey::Type(ty.clone()),
                Obj {
                    kind: ObjKind::Merged,
                    ty: ty.clone(),
                },
            ),
        }
    }

    /// The taint object for data of type `ty` coming from `source`.
    pub fn taint_obj(&mut self, source: StmtRef, ty: Type) -> ObjId {
        self.intern(
            ObjKey::Taint(source, ty.clone()),
            Obj {
                kind: ObjKind::Taint { source },
                ty,
            },
        )
    }

    pub fn obj(&self, id: ObjId) -> &Obj {
        &self.objs[id.0]
    }

    pub fn len(&self) -> usize {
        self.objs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objs.is_empty()
    }

    pub fn is_taint(&self, id: ObjId) -> bool {
        self.taint_source(id).is_some()
    }

    pub fn taint_source(&self, id: ObjId) -> Option<StmtRef> {
        match self.obj(id).kind {
            ObjKind::Taint { source } => Some(source),
            _ => None,
        }
    }

    /// A readable name, e.g., `NewObj{<A: void main()>[0@L3] a = new A;}`.
    pub fn describe(&self, program: &Program, id: ObjId) -> String {
        let obj = self.obj(id);
        match &obj.kind {
            ObjKind::Alloc(site) => format!("NewObj{{{}}}", program.describe_stmt(*site)),
            ObjKind::Merged => format!("MergedObj{{{}}}", program.type_name(&obj.ty)),
            ObjKind::Taint { source } => format!(
                "TaintObj{{{}, {}}}",
                program.type_name(&obj.ty),
                program.describe_stmt(*source)
            ),
        }
    }
}
